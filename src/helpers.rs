//! Helper modules and dynamic partial selectors.
//!
//! Templates reference helpers by name; when the scanner finds one that is
//! not yet registered, the loader asks the configured [`HelperSource`] for an
//! implementation. Loading is synchronous and a failure never aborts the
//! compile pass: it is logged, and the template fails at render time only if
//! the missing helper is actually invoked.
//!
//! Dynamic partials use a second, narrower capability: a [`PartialSelector`]
//! maps a render-time data value to the concrete partial name to load. The
//! two are kept as separate typed lookups rather than one duck-typed bag so
//! a selector cannot be registered where a render helper is expected.

use std::collections::HashMap;
use std::sync::Arc;

use handlebars::HelperDef;
use serde_json::Value;

/// Boxed render helper, as the Handlebars registry consumes it.
pub type BoxedHelper = Box<dyn HelperDef + Send + Sync>;

/// Maps a render-time data value to the concrete partial name to install.
pub type PartialSelector = Arc<dyn Fn(&Value) -> Option<String> + Send + Sync>;

/// Outcome of loading a helper module by name.
///
/// Distinguishes "no such helper" from "the source failed while producing
/// one"; both are logged and swallowed at install time.
pub enum HelperLoad {
    /// The source produced a helper ready for registration.
    Loaded(BoxedHelper),
    /// The source has no helper under this name.
    Missing,
    /// The source failed while loading the helper.
    Failed(String),
}

/// A provider of lazily installed helpers and partial selectors.
///
/// This is the seam where host applications plug in their helper modules.
/// Both methods default to "not available" so implementors can supply only
/// the capability they have.
pub trait HelperSource: Send + Sync {
    /// Load a render helper by name.
    fn load_helper(&self, _name: &str) -> HelperLoad {
        HelperLoad::Missing
    }

    /// Load a dynamic partial selector by name.
    fn load_selector(&self, _name: &str) -> Option<PartialSelector> {
        None
    }
}

/// Builder used to assemble a [`StaticHelperSource`].
///
/// Helpers are consumed on load (the Handlebars registry takes ownership),
/// so the map stores factories rather than boxed helpers.
type HelperFactory = Arc<dyn Fn() -> BoxedHelper + Send + Sync>;

/// A [`HelperSource`] backed by in-memory maps.
///
/// Suits hosts whose helpers are known at startup, and tests.
#[derive(Default)]
pub struct StaticHelperSource {
    helpers: HashMap<String, HelperFactory>,
    selectors: HashMap<String, PartialSelector>,
}

impl StaticHelperSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a helper factory under `name`.
    #[must_use]
    pub fn with_helper<F>(mut self, name: impl Into<String>, factory: F) -> Self
    where
        F: Fn() -> BoxedHelper + Send + Sync + 'static,
    {
        self.helpers.insert(name.into(), Arc::new(factory));
        self
    }

    /// Add a partial selector under `name`.
    #[must_use]
    pub fn with_selector<F>(mut self, name: impl Into<String>, selector: F) -> Self
    where
        F: Fn(&Value) -> Option<String> + Send + Sync + 'static,
    {
        self.selectors.insert(name.into(), Arc::new(selector));
        self
    }
}

impl HelperSource for StaticHelperSource {
    fn load_helper(&self, name: &str) -> HelperLoad {
        match self.helpers.get(name) {
            Some(factory) => HelperLoad::Loaded(factory()),
            None => HelperLoad::Missing,
        }
    }

    fn load_selector(&self, name: &str) -> Option<PartialSelector> {
        self.selectors.get(name).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use handlebars::handlebars_helper;

    handlebars_helper!(shout: |value: String| value.to_uppercase());

    #[test]
    fn static_source_loads_registered_helper() {
        let source = StaticHelperSource::new().with_helper("shout", || Box::new(shout));
        assert!(matches!(source.load_helper("shout"), HelperLoad::Loaded(_)));
        assert!(matches!(source.load_helper("whisper"), HelperLoad::Missing));
    }

    #[test]
    fn static_source_loads_selector() {
        let source = StaticHelperSource::new()
            .with_selector("pick", |value| value.as_str().map(|s| format!("{s}-partial")));
        let selector = source.load_selector("pick").unwrap();
        assert_eq!(
            selector(&serde_json::json!("spinner")),
            Some("spinner-partial".to_string())
        );
        assert!(source.load_selector("other").is_none());
    }
}
