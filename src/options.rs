use serde::{Deserialize, Serialize};
use std::env;

use crate::error::{Result, StoreError};

/// Strategy used to decide whether a dispatch produced a new state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeDetection {
    /// Structural equality of the JSON values.
    #[default]
    Structural,
    /// Compare canonical serialized snapshots.
    Serialized,
}

/// Options fixed for the lifetime of a store.
///
/// Deserializing a partial object keeps the defaults for missing fields:
///
/// ```
/// use statex::StoreOptions;
///
/// let opts = StoreOptions::from_json(r#"{ "slices": true }"#).unwrap();
/// assert!(opts.slices);
/// assert!(!opts.debug);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreOptions {
    /// Verbose logging of subscribe/unsubscribe/dispatch/notify events and timing.
    pub debug: bool,
    /// Treat top-level keys as independently reducible and watchable slices.
    pub slices: bool,
    pub change_detection: ChangeDetection,
}

impl StoreOptions {
    pub fn debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn slices(mut self, slices: bool) -> Self {
        self.slices = slices;
        self
    }

    pub fn change_detection(mut self, change_detection: ChangeDetection) -> Self {
        self.change_detection = change_detection;
        self
    }

    /// Parse options from a JSON object, defaulting missing fields.
    pub fn from_json(raw: &str) -> Result<Self> {
        serde_json::from_str(raw)
            .map_err(|e| StoreError::invalid(format!("store options: {e}")))
    }

    /// Read options from the environment.
    ///
    /// # Environment Variables
    ///
    /// - `STATEX_DEBUG`: enable debug logging (default: false)
    /// - `STATEX_SLICES`: enable slice mode (default: false)
    /// - `STATEX_CHANGE_DETECTION`: `structural` or `serialized` (default: structural)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            debug: env_flag("STATEX_DEBUG").unwrap_or(defaults.debug),
            slices: env_flag("STATEX_SLICES").unwrap_or(defaults.slices),
            change_detection: match env::var("STATEX_CHANGE_DETECTION").as_deref() {
                Ok("serialized") => ChangeDetection::Serialized,
                Ok("structural") => ChangeDetection::Structural,
                _ => defaults.change_detection,
            },
        }
    }
}

fn env_flag(name: &str) -> Option<bool> {
    parse_flag(&env::var(name).ok()?)
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flag_parsing() {
        for raw in ["1", "true", "YES", " on "] {
            assert_eq!(parse_flag(raw), Some(true), "{raw:?}");
        }
        for raw in ["0", "False", "no", "off\n"] {
            assert_eq!(parse_flag(raw), Some(false), "{raw:?}");
        }
        for raw in ["", "2", "enabled", "tru"] {
            assert_eq!(parse_flag(raw), None, "{raw:?}");
        }
    }

    // The only test touching STATEX_* variables, so it cannot race another.
    #[test]
    fn from_env_reads_flags_and_falls_back_on_garbage() {
        env::set_var("STATEX_DEBUG", "yes");
        env::set_var("STATEX_SLICES", "maybe");
        env::set_var("STATEX_CHANGE_DETECTION", "serialized");
        let opts = StoreOptions::from_env();
        assert!(opts.debug);
        assert!(!opts.slices);
        assert_eq!(opts.change_detection, ChangeDetection::Serialized);

        env::set_var("STATEX_DEBUG", "off");
        env::set_var("STATEX_SLICES", "1");
        env::set_var("STATEX_CHANGE_DETECTION", "fuzzy");
        let opts = StoreOptions::from_env();
        assert!(!opts.debug);
        assert!(opts.slices);
        assert_eq!(opts.change_detection, ChangeDetection::Structural);

        for name in ["STATEX_DEBUG", "STATEX_SLICES", "STATEX_CHANGE_DETECTION"] {
            env::remove_var(name);
        }
        assert_eq!(StoreOptions::from_env(), StoreOptions::default());
    }

    #[test]
    fn defaults_are_flat_and_quiet() {
        let opts = StoreOptions::default();
        assert!(!opts.debug);
        assert!(!opts.slices);
        assert_eq!(opts.change_detection, ChangeDetection::Structural);
    }

    #[test]
    fn partial_json_overrides_defaults() {
        let opts = StoreOptions::from_json(r#"{"debug": true, "change_detection": "serialized"}"#)
            .unwrap();
        assert!(opts.debug);
        assert!(!opts.slices);
        assert_eq!(opts.change_detection, ChangeDetection::Serialized);
    }

    #[test]
    fn malformed_json_is_invalid_argument() {
        let err = StoreOptions::from_json("[1, 2]").unwrap_err();
        assert!(matches!(err, StoreError::InvalidArgument(_)));
    }

    #[test]
    fn builder_chain() {
        let opts = StoreOptions::default().debug(true).slices(true);
        assert!(opts.debug && opts.slices);
    }
}
