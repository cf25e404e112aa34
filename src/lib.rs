//! Viewmill - Template Resolution and Rendering Engine
//!
//! An async view engine on top of Handlebars: views are documents with an
//! optional YAML front-matter block, rendered through a recursively loaded
//! chain of partials and helpers, wrapped in a layout, and fed by external
//! JSON data files. Multi-state components and data-dependent partial
//! selection sit on the same pipeline.
//!
//! # Architecture Overview
//!
//! Rendering a view runs through a fixed pipeline:
//! - the resolver maps the logical view name to a file under the engine root
//! - a rendered-output cache hit short-circuits everything below
//! - front matter is split off and parsed (layout choice, data file, extras)
//! - the body is compiled and scanned; every unregistered partial and helper
//!   it references is installed, recursively and concurrently
//! - the data file, the layout, and any data-dependent partials are prepared
//!   concurrently
//! - the body renders, then the layout renders with the body under `body`
//!
//! # Core Modules
//!
//! - [`engine`] - the render pipeline and public entry points
//! - [`resolver`] - logical-name to file-location mapping
//! - [`scanner`] - template AST traversal for unregistered dependencies
//! - [`registry`] - the append-only partial/helper registry
//! - [`cache`] - compiled-template, rendered-output, and data caching
//! - [`frontmatter`] - YAML front-matter extraction for views
//! - [`component`] - multi-state component descriptors
//! - [`helpers`] - helper sources and dynamic partial selectors
//! - [`config`] - engine options
//! - [`error`] - the error type every operation surfaces
//!
//! # Example
//!
//! ```no_run
//! use serde_json::json;
//! use viewmill::{Engine, EngineOptions, RenderState};
//!
//! # async fn run() -> viewmill::Result<()> {
//! let engine = Engine::new(EngineOptions::new("/srv/templates"));
//! let html = engine
//!     .render("home", json!({ "title": "Hello" }), RenderState::for_project("site"))
//!     .await?;
//! # let _ = html;
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod component;
pub mod config;
pub mod engine;
pub mod error;
pub mod frontmatter;
pub mod helpers;
pub mod registry;
pub mod resolver;
pub mod scanner;

pub use cache::{CacheEntry, RenderCache};
pub use component::{ComponentDescriptor, ComponentState, DEFAULT_STATE};
pub use config::{DEFAULT_EXTNAME, DEFAULT_LAYOUT, EngineOptions};
pub use engine::{Engine, IDENTITY_LAYOUT, PartialRequest, RenderState};
pub use error::{EngineError, Result};
pub use frontmatter::{LayoutSetting, ViewDocument, ViewMetadata};
pub use helpers::{BoxedHelper, HelperLoad, HelperSource, PartialSelector, StaticHelperSource};
pub use registry::Registry;
pub use resolver::{PathResolver, ResourceKind};
pub use scanner::{DisplayOptions, PathStyle, ScanReport};
