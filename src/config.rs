//! Engine configuration.
//!
//! [`EngineOptions`] carries everything the resolver and render pipeline need
//! to turn logical names into file locations: the template root, the shared
//! project namespace, per-kind subdirectory names, the default layout, and
//! the cache-disable switch. All fields have working defaults except `root`.

use std::path::PathBuf;
use std::sync::Arc;

use crate::helpers::HelperSource;

/// Default template file extension, applied when a logical name carries none.
pub const DEFAULT_EXTNAME: &str = ".hbs";

/// Default layout name used when front matter does not pick one.
pub const DEFAULT_LAYOUT: &str = "default";

/// Configuration for an [`Engine`](crate::Engine) instance.
#[derive(Clone)]
pub struct EngineOptions {
    /// Root directory all logical names resolve under.
    pub root: PathBuf,
    /// Directory name of the shared project namespace. A bare name prefixed
    /// with `shared/` resolves inside this namespace instead of the current
    /// project.
    pub shared: String,
    /// Extension appended to extension-less logical names.
    pub extname: String,
    /// When set, every cache lookup is treated as a miss: views are re-read,
    /// recompiled, and re-rendered on each request. Writes still happen.
    pub disable_cache: bool,
    /// Layout used when front matter omits `layout` or sets it to `true`.
    pub default_layout: String,
    /// Subdirectory for views.
    pub views_dir: String,
    /// Subdirectory for layouts.
    pub layouts_dir: String,
    /// Subdirectory for partials.
    pub partials_dir: String,
    /// Subdirectory for JSON data files.
    pub data_dir: String,
    /// Subdirectory for helper modules.
    pub helpers_dir: String,
    /// Subdirectory for component descriptors.
    pub components_dir: String,
    /// Pre-installed helper modules, consulted when a template references a
    /// helper that is not yet registered.
    pub helper_source: Option<Arc<dyn HelperSource>>,
}

impl EngineOptions {
    /// Options with defaults for everything but the root directory.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ..Self::default()
        }
    }

    /// Disable the serve-from-cache shortcut for every lookup.
    #[must_use]
    pub fn with_disabled_cache(mut self) -> Self {
        self.disable_cache = true;
        self
    }

    /// Set the default layout name.
    #[must_use]
    pub fn with_default_layout(mut self, name: impl Into<String>) -> Self {
        self.default_layout = name.into();
        self
    }

    /// Attach a helper source for lazy helper installation.
    #[must_use]
    pub fn with_helper_source(mut self, source: Arc<dyn HelperSource>) -> Self {
        self.helper_source = Some(source);
        self
    }
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            root: PathBuf::new(),
            shared: "shared".to_string(),
            extname: DEFAULT_EXTNAME.to_string(),
            disable_cache: false,
            default_layout: DEFAULT_LAYOUT.to_string(),
            views_dir: "views".to_string(),
            layouts_dir: "layouts".to_string(),
            partials_dir: "partials".to_string(),
            data_dir: "data".to_string(),
            helpers_dir: "helpers".to_string(),
            components_dir: "components".to_string(),
            helper_source: None,
        }
    }
}

impl std::fmt::Debug for EngineOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineOptions")
            .field("root", &self.root)
            .field("shared", &self.shared)
            .field("extname", &self.extname)
            .field("disable_cache", &self.disable_cache)
            .field("default_layout", &self.default_layout)
            .field("views_dir", &self.views_dir)
            .field("layouts_dir", &self.layouts_dir)
            .field("partials_dir", &self.partials_dir)
            .field("data_dir", &self.data_dir)
            .field("helpers_dir", &self.helpers_dir)
            .field("components_dir", &self.components_dir)
            .field("helper_source", &self.helper_source.as_ref().map(|_| "<source>"))
            .finish()
    }
}
