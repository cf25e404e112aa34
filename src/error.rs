//! Error types for the view engine.
//!
//! Every failure mode the render pipeline can surface is a distinct variant,
//! so callers can match on the class of failure (I/O vs parse vs render)
//! without string inspection. Helper-load failures are intentionally absent:
//! they are logged at install time and only resurface as an
//! unregistered-helper render error if the helper is actually invoked.

use std::path::PathBuf;

use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, EngineError>;

/// Failures surfaced by [`Engine::render`](crate::Engine::render) and
/// [`Engine::render_partial`](crate::Engine::render_partial).
#[derive(Debug, Error)]
pub enum EngineError {
    /// A view, layout, partial, data, or component file could not be read.
    #[error("failed to read {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Template source failed to compile.
    #[error("failed to compile template {path}")]
    Compile {
        path: PathBuf,
        #[source]
        source: Box<handlebars::TemplateError>,
    },

    /// A compiled template failed at render time (including unregistered
    /// helpers that were skipped during install).
    #[error("render failed")]
    Render(#[from] Box<handlebars::RenderError>),

    /// The front-matter block could not be parsed as YAML.
    #[error("malformed front matter in {path}: {message}")]
    FrontMatter { path: PathBuf, message: String },

    /// A data or component descriptor file was not valid JSON, or did not
    /// match the expected shape.
    #[error("invalid JSON in {path}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// A JSON data file parsed to something other than an object.
    #[error("data file {path} must contain a JSON object")]
    DataNotObject { path: PathBuf },

    /// The render data passed by the caller was neither an object nor null.
    #[error("render data must be a JSON object")]
    ContextNotObject,

    /// A component descriptor has no state under the requested name.
    #[error("component '{component}' has no state '{state}'")]
    UnknownState { component: String, state: String },

    /// An opaque placeholder name (`__ident__`) was referenced but never
    /// seeded into the cache.
    #[error("builtin template '{name}' is not present in the cache")]
    MissingBuiltin { name: String },

    /// A dynamic partial binding named a selector that is neither registered
    /// nor loadable from the helper source.
    #[error("no selector available for dynamic partial '{name}'")]
    SelectorUnavailable { name: String },

    /// A selector ran but did not produce a partial name.
    #[error("selector '{selector}' returned no partial name for '{name}'")]
    SelectorFailed { selector: String, name: String },
}

impl EngineError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn compile(path: impl Into<PathBuf>, source: handlebars::TemplateError) -> Self {
        Self::Compile {
            path: path.into(),
            source: Box::new(source),
        }
    }
}

impl From<handlebars::RenderError> for EngineError {
    fn from(err: handlebars::RenderError) -> Self {
        Self::Render(Box::new(err))
    }
}
