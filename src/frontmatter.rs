//! Front-matter extraction for views.
//!
//! Views may begin with a YAML block delimited by `---` lines. Two keys are
//! meaningful to the pipeline: `layout` (a layout name, or a boolean — `true`
//! for the engine default, `false` for no layout) and `data` (the logical
//! name of a JSON data file). Any remaining keys are carried along and merged
//! into the render data after the data file, so front matter can override
//! file-loaded values.

use std::path::Path;

use gray_matter::{Matter, engine::YAML};
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::{EngineError, Result};

/// Front-matter `layout` value: a name, or an on/off switch.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum LayoutSetting {
    Enabled(bool),
    Named(String),
}

/// Metadata extracted from a view's front-matter block.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ViewMetadata {
    /// Layout selection; absent means the engine default.
    #[serde(default)]
    pub layout: Option<LayoutSetting>,
    /// Logical name of an external JSON data file to load.
    #[serde(default)]
    pub data: Option<String>,
    /// Remaining front-matter fields, merged into the render data.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A view split into metadata and template body.
#[derive(Debug, Clone)]
pub struct ViewDocument {
    pub metadata: ViewMetadata,
    pub body: String,
}

/// Splits raw view text into front matter and body.
pub struct FrontMatterSplitter {
    matter: Matter<YAML>,
}

impl FrontMatterSplitter {
    pub fn new() -> Self {
        Self {
            matter: Matter::new(),
        }
    }

    /// Split `raw` into metadata and body.
    ///
    /// A missing block yields default metadata; a present but malformed
    /// block fails the render.
    pub fn split(&self, raw: &str, origin: &Path) -> Result<ViewDocument> {
        let parsed =
            self.matter.parse::<ViewMetadata>(raw).map_err(|err| EngineError::FrontMatter {
                path: origin.to_path_buf(),
                message: err.to_string(),
            })?;

        Ok(ViewDocument {
            metadata: parsed.data.unwrap_or_default(),
            body: parsed.content,
        })
    }
}

impl Default for FrontMatterSplitter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn split(raw: &str) -> ViewDocument {
        FrontMatterSplitter::new().split(raw, Path::new("views/home.hbs")).unwrap()
    }

    #[test]
    fn absent_front_matter_yields_defaults() {
        let doc = split("<h1>{{title}}</h1>");
        assert!(doc.metadata.layout.is_none());
        assert!(doc.metadata.data.is_none());
        assert_eq!(doc.body, "<h1>{{title}}</h1>");
    }

    #[test]
    fn layout_accepts_name_and_boolean() {
        let doc = split("---\nlayout: wide\n---\nbody");
        assert_eq!(doc.metadata.layout, Some(LayoutSetting::Named("wide".into())));

        let doc = split("---\nlayout: false\n---\nbody");
        assert_eq!(doc.metadata.layout, Some(LayoutSetting::Enabled(false)));
        assert_eq!(doc.body, "body");
    }

    #[test]
    fn extra_fields_are_preserved() {
        let doc = split("---\ndata: home\ntitle: Home\ncount: 3\n---\nbody");
        assert_eq!(doc.metadata.data.as_deref(), Some("home"));
        assert_eq!(doc.metadata.extra.get("title"), Some(&json!("Home")));
        assert_eq!(doc.metadata.extra.get("count"), Some(&json!(3)));
    }
}
