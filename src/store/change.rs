use crate::options::ChangeDetection;
use crate::state::State;

/// Decides whether a freshly merged snapshot differs from the stored one.
///
/// `changed` is only called on the commit path, so a detector may cache
/// whatever it derives from `next` whenever it answers `true`.
pub trait ChangeDetector: Send {
    /// Called once with the initial snapshot.
    fn prime(&mut self, _initial: &State) {}

    fn changed(&mut self, previous: &State, next: &State) -> bool;
}

/// Structural equality. Key order never matters.
#[derive(Debug, Default, Clone, Copy)]
pub struct StructuralEq;

impl ChangeDetector for StructuralEq {
    fn changed(&mut self, previous: &State, next: &State) -> bool {
        previous != next
    }
}

/// Compares canonical JSON text against the cached text of the last
/// committed snapshot. Keys serialize sorted, so the text is stable.
#[derive(Debug, Default, Clone)]
pub struct SerializedEq {
    last: String,
}

impl ChangeDetector for SerializedEq {
    fn prime(&mut self, initial: &State) {
        self.last = serde_json::to_string(initial).unwrap_or_default();
    }

    fn changed(&mut self, _previous: &State, next: &State) -> bool {
        let Ok(text) = serde_json::to_string(next) else {
            return true;
        };
        if text == self.last {
            return false;
        }
        self.last = text;
        true
    }
}

pub(crate) fn detector_for(mode: ChangeDetection) -> Box<dyn ChangeDetector> {
    match mode {
        ChangeDetection::Structural => Box::new(StructuralEq),
        ChangeDetection::Serialized => Box::new(SerializedEq::default()),
    }
}
