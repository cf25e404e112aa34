//! Component descriptors.
//!
//! A component is a partial with multiple named "states" (variants), each
//! backed by a template file plus state-specific data. The descriptor is a
//! JSON file next to the component's templates:
//!
//! ```json
//! {
//!   "type": "d",
//!   "template": "spinner.hbs",
//!   "states": {
//!     "default": { "__file__": "spinner.hbs", "size": "medium" },
//!     "large":   { "__file__": "spinner-large.hbs", "size": "large" }
//!   }
//! }
//! ```
//!
//! `states.default` is the fallback when a render does not ask for a state.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{EngineError, Result};

/// Name of the fallback state.
pub const DEFAULT_STATE: &str = "default";

/// A parsed component descriptor file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentDescriptor {
    /// Descriptor kind marker, opaque to the engine.
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    /// Optional primary template, informational only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<String>,
    /// Named variants of the component.
    pub states: Map<String, Value>,
}

/// One variant of a component.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentState {
    /// Template file backing this state, relative to the descriptor.
    #[serde(rename = "__file__")]
    pub file: String,
    /// State-specific data merged into the render data.
    #[serde(flatten)]
    pub data: Map<String, Value>,
}

impl ComponentDescriptor {
    /// Look up a state by name, falling back to [`DEFAULT_STATE`] when
    /// `requested` is `None`.
    pub fn select_state(&self, name: &str, requested: Option<&str>) -> Result<ComponentState> {
        let state_name = requested.unwrap_or(DEFAULT_STATE);
        let value = self.states.get(state_name).ok_or_else(|| EngineError::UnknownState {
            component: name.to_string(),
            state: state_name.to_string(),
        })?;
        serde_json::from_value(value.clone()).map_err(|source| EngineError::Json {
            path: std::path::PathBuf::from(name),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn descriptor() -> ComponentDescriptor {
        serde_json::from_value(json!({
            "type": "d",
            "states": {
                "default": { "__file__": "spinner.hbs", "size": "medium" },
                "large": { "__file__": "spinner-large.hbs" }
            }
        }))
        .unwrap()
    }

    #[test]
    fn selects_requested_state() {
        let state = descriptor().select_state("spinner", Some("large")).unwrap();
        assert_eq!(state.file, "spinner-large.hbs");
        assert!(state.data.is_empty());
    }

    #[test]
    fn falls_back_to_default_state() {
        let state = descriptor().select_state("spinner", None).unwrap();
        assert_eq!(state.file, "spinner.hbs");
        assert_eq!(state.data.get("size"), Some(&json!("medium")));
    }

    #[test]
    fn unknown_state_is_an_error() {
        let err = descriptor().select_state("spinner", Some("huge")).unwrap_err();
        assert!(matches!(err, EngineError::UnknownState { .. }));
    }
}
