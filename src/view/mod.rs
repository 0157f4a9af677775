//! Subscribable views: a store handle plus a mapping function.

mod view;

pub use view::StateView;
