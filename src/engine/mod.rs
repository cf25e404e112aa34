//! The render engine.
//!
//! [`Engine`] ties the pipeline together: resolve the view, split front
//! matter, compile and register the body, install its dependency graph, then
//! concurrently load the external data file, prepare the layout, and resolve
//! any dynamic partials before the final two-stage render (body, then layout
//! with the body under `body`).
//!
//! One engine instance serves many concurrent renders; all per-call state
//! lives in a [`RenderContext`] created at the top of each entry point.

mod context;
mod loader;

pub use context::RenderState;
pub(crate) use context::{PendingPartial, RenderContext};

use std::path::Path;
use std::sync::Arc;

use dashmap::DashMap;
use handlebars::template::Template;
use serde_json::{Map, Value};

use crate::cache::{CacheEntry, RenderCache};
use crate::component::ComponentDescriptor;
use crate::config::EngineOptions;
use crate::error::{EngineError, Result};
use crate::frontmatter::{FrontMatterSplitter, LayoutSetting, ViewDocument};
use crate::helpers::{BoxedHelper, PartialSelector};
use crate::registry::Registry;
use crate::resolver::{ResourceKind, is_placeholder};
use crate::scanner::{self, COMPONENT_CONTEXT, DisplayOptions};

use loader::Loader;

/// Placeholder name of the pass-through layout used when front matter sets
/// `layout: false`.
pub const IDENTITY_LAYOUT: &str = "__identity__";

/// Data key the view template receives the rendered body under.
const BODY_KEY: &str = "body";

/// A request to render one component state outside a view.
#[derive(Debug, Clone)]
pub struct PartialRequest {
    /// Logical component name.
    pub name: String,
    /// State to render; `None` falls back to the component's default state.
    pub state: Option<String>,
}

impl PartialRequest {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: None,
        }
    }

    #[must_use]
    pub fn with_state(mut self, state: impl Into<String>) -> Self {
        self.state = Some(state.into());
        self
    }
}

/// Template resolution and rendering engine.
pub struct Engine {
    options: Arc<EngineOptions>,
    registry: Arc<Registry>,
    cache: Arc<RenderCache>,
    loader: Loader,
    selectors: DashMap<String, PartialSelector>,
    splitter: FrontMatterSplitter,
}

impl Engine {
    pub fn new(options: EngineOptions) -> Self {
        let options = Arc::new(options);
        let registry = Arc::new(Registry::new());
        let cache = Arc::new(RenderCache::new(options.disable_cache));

        // The identity layout is synthetic: seeded once, served through the
        // cache tier that ignores bypass mode.
        let identity = Template::compile("{{{body}}}").expect("identity layout source is static");
        cache.insert(IDENTITY_LAYOUT, CacheEntry::Compiled(identity.clone()));
        registry.register_template(IDENTITY_LAYOUT, identity);

        let loader = Loader::new(options.clone(), registry.clone(), cache.clone());
        Self {
            options,
            registry,
            cache,
            loader,
            selectors: DashMap::new(),
            splitter: FrontMatterSplitter::new(),
        }
    }

    /// Render `view` with `data` under the addressing `state`.
    ///
    /// `data` must be a JSON object or `null`.
    pub async fn render(&self, view: &str, data: Value, state: RenderState) -> Result<String> {
        let ctx = RenderContext::new(state, view);
        let view_path = self.loader.resolver().resolve(
            &ctx.state,
            view,
            view,
            ResourceKind::View,
            None,
            None,
        );
        let view_key = view_path.to_string_lossy().into_owned();

        // A rendered-output hit skips everything, the front-matter parse
        // included.
        if let Some(CacheEntry::Rendered(output)) = self.cache.get(&view_key) {
            tracing::debug!(view, "serving rendered output from cache");
            return Ok(output);
        }

        let raw = tokio::fs::read_to_string(&view_path)
            .await
            .map_err(|err| EngineError::io(&view_path, err))?;
        let document = self.splitter.split(&raw, &view_path)?;

        self.compile_view(&ctx, &view_path, &view_key, &document.body).await?;

        let layout = layout_name(&document, &self.options.default_layout);
        let (file_data, layout_key, ()) = tokio::try_join!(
            self.load_data(&ctx, document.metadata.data.as_deref()),
            self.prepare_layout(&ctx, &layout),
            self.resolve_dynamic_partials(&ctx, &data),
        )?;

        let mut merged = object_data(data)?;
        if let Some(file_data) = file_data {
            merged.extend(file_data);
        }
        merged.extend(document.metadata.extra.clone());

        let body = self.registry.render(&view_key, &Value::Object(merged.clone()))?;
        merged.insert(BODY_KEY.to_string(), Value::String(body));
        let output = self.registry.render(&layout_key, &Value::Object(merged))?;

        self.cache.insert(view_key, CacheEntry::Rendered(output.clone()));
        Ok(output)
    }

    /// Render one state of a component directly, without a view or layout.
    ///
    /// The state's template file is rendered with the caller data merged
    /// under the state's own data, and the full descriptor available under
    /// `component`.
    pub async fn render_partial(
        &self,
        request: &PartialRequest,
        data: Value,
        state: RenderState,
    ) -> Result<String> {
        let ctx = RenderContext::new(state, &request.name);

        let descriptor_path = self.loader.resolver().resolve(
            &ctx.state,
            &request.name,
            &request.name,
            ResourceKind::Component,
            Some(".json"),
            None,
        );
        let descriptor = self.load_descriptor(&descriptor_path).await?;
        let component_state = descriptor.select_state(&request.name, request.state.as_deref())?;

        // State files live next to their descriptor.
        let file_path = self.loader.resolver().resolve(
            &ctx.state,
            &request.name,
            &sibling(&component_state.file),
            ResourceKind::Partial,
            None,
            Some(&descriptor_path),
        );
        let file_key = file_path.to_string_lossy().into_owned();

        let raw = tokio::fs::read_to_string(&file_path)
            .await
            .map_err(|err| EngineError::io(&file_path, err))?;
        let template =
            Template::compile(&raw).map_err(|err| EngineError::compile(&file_path, err))?;
        let report = scanner::scan(&template, &self.registry);
        self.registry.register_template(&file_key, template);
        self.loader.install_report(&ctx, report, Some(&file_path)).await?;

        let mut merged = object_data(data)?;
        merged.extend(component_state.data.clone());
        merged.insert(
            "component".to_string(),
            serde_json::to_value(&descriptor).map_err(|source| EngineError::Json {
                path: descriptor_path.clone(),
                source,
            })?,
        );

        let merged = Value::Object(merged);
        self.resolve_dynamic_partials(&ctx, &merged).await?;
        Ok(self.registry.render(&file_key, &merged)?)
    }

    /// Register a render helper. No-op if the name is taken.
    pub fn register_helper(&self, name: &str, helper: BoxedHelper) {
        self.registry.register_helper(name, helper);
    }

    /// Forget a helper name so a later registration (or helper-source load)
    /// can replace it.
    pub fn unregister_helper(&self, name: &str) {
        self.registry.unregister_helper(name);
    }

    /// Compile `source` and register it as a partial. No-op if the name is
    /// taken.
    pub fn register_partial(&self, name: &str, source: &str) -> Result<()> {
        let template = Template::compile(source).map_err(|err| EngineError::compile(name, err))?;
        self.registry.register_partial(name, template);
        Ok(())
    }

    pub fn unregister_partial(&self, name: &str) {
        self.registry.unregister_partial(name);
    }

    /// Register a dynamic-partial selector under `name`.
    pub fn register_selector<F>(&self, name: impl Into<String>, selector: F)
    where
        F: Fn(&Value) -> Option<String> + Send + Sync + 'static,
    {
        self.selectors.insert(name.into(), Arc::new(selector));
    }

    /// (hits, misses) recorded by the render cache.
    pub fn cache_stats(&self) -> (usize, usize) {
        self.cache.stats()
    }

    async fn compile_view(
        &self,
        ctx: &RenderContext,
        view_path: &Path,
        view_key: &str,
        body: &str,
    ) -> Result<()> {
        let template = Template::compile(body).map_err(|err| EngineError::compile(view_path, err))?;
        let report = scanner::scan(&template, &self.registry);
        self.registry.register_template(view_key, template);
        self.loader.install_report(ctx, report, Some(view_path)).await
    }

    /// Load the front-matter-named JSON data file, which must hold an object.
    async fn load_data(
        &self,
        ctx: &RenderContext,
        name: Option<&str>,
    ) -> Result<Option<Map<String, Value>>> {
        let Some(name) = name else {
            return Ok(None);
        };
        let path = self.loader.resolver().resolve(
            &ctx.state,
            &ctx.view,
            name,
            ResourceKind::Data,
            Some(".json"),
            None,
        );
        match self.loader.load_json(&path).await? {
            Value::Object(map) => Ok(Some(map)),
            _ => Err(EngineError::DataNotObject { path }),
        }
    }

    /// Ensure the layout is compiled and registered; returns its registry
    /// key.
    async fn prepare_layout(&self, ctx: &RenderContext, name: &str) -> Result<String> {
        if is_placeholder(name) {
            // Seeded at construction, registered for the engine's lifetime.
            if self.cache.get_always(name).is_none() {
                return Err(EngineError::MissingBuiltin {
                    name: name.to_string(),
                });
            }
            return Ok(name.to_string());
        }

        let path = self.loader.resolver().resolve(
            &ctx.state,
            &ctx.view,
            name,
            ResourceKind::Layout,
            None,
            None,
        );
        let key = path.to_string_lossy().into_owned();

        if let Some(CacheEntry::Compiled(template)) = self.cache.get(&key) {
            self.registry.register_template(&key, template);
            return Ok(key);
        }

        let raw = tokio::fs::read_to_string(&path)
            .await
            .map_err(|err| EngineError::io(&path, err))?;
        let template = Template::compile(&raw).map_err(|err| EngineError::compile(&path, err))?;
        let report = scanner::scan(&template, &self.registry);
        self.registry.register_template(&key, template.clone());
        self.loader.install_report(ctx, report, Some(&path)).await?;
        self.cache.insert(key.clone(), CacheEntry::Compiled(template));
        Ok(key)
    }

    /// Resolve every dynamic partial queued during the compile pass against
    /// the caller-supplied data.
    ///
    /// The queue is drained exactly once, covering the view body and the
    /// partial chain below it. Layouts are prepared concurrently with this
    /// drain, so a `$$dynamic` inclusion inside a layout is queued too late
    /// to be resolved and fails at render time as an unregistered partial.
    /// Dynamic inclusions belong in views and partials, not layouts.
    async fn resolve_dynamic_partials(&self, ctx: &RenderContext, data: &Value) -> Result<()> {
        for pending in ctx.drain_pending() {
            if pending.context == COMPONENT_CONTEXT {
                self.resolve_component_partial(ctx, pending, data).await?;
            } else {
                self.resolve_selected_partial(ctx, pending, data).await?;
            }
        }
        Ok(())
    }

    /// Component mode: the inclusion names a component; its descriptor and
    /// the requested state pick the file to install.
    async fn resolve_component_partial(
        &self,
        ctx: &RenderContext,
        pending: PendingPartial,
        data: &Value,
    ) -> Result<()> {
        // A render_partial call pre-supplies the descriptor in the data, so
        // nested bindings skip the descriptor read.
        let (descriptor, base) = match data
            .get("component")
            .cloned()
            .and_then(|value| serde_json::from_value::<ComponentDescriptor>(value).ok())
        {
            Some(descriptor) => (descriptor, pending.base.clone()),
            None => {
                let path = self.loader.resolver().resolve(
                    &ctx.state,
                    &ctx.view,
                    &pending.name,
                    ResourceKind::Component,
                    Some(".json"),
                    pending.base.as_deref(),
                );
                let descriptor = self.load_descriptor(&path).await?;
                (descriptor, Some(path))
            }
        };
        let requested = data.get("state").and_then(Value::as_str);
        let component_state = descriptor.select_state(&pending.name, requested)?;

        let source = match self.selector(&pending.selector) {
            Some(selector) => {
                let input = serde_json::to_value(&component_state).unwrap_or(Value::Null);
                selector(&input).ok_or_else(|| EngineError::SelectorFailed {
                    selector: pending.selector.clone(),
                    name: pending.name.clone(),
                })?
            }
            // Without a selector the state's own file wins.
            None => sibling(&component_state.file),
        };

        let display = DisplayOptions::from_hash(&pending.hash);
        self.loader
            .install_partial_as(ctx, &pending.name, &source, display, base.as_deref())
            .await
    }

    /// Plain mode: a registered selector maps the value under the bound data
    /// key to a concrete partial name.
    async fn resolve_selected_partial(
        &self,
        ctx: &RenderContext,
        pending: PendingPartial,
        data: &Value,
    ) -> Result<()> {
        let selector =
            self.selector(&pending.selector).ok_or_else(|| EngineError::SelectorUnavailable {
                name: pending.selector.clone(),
            })?;
        let input = data.get(&pending.context).cloned().unwrap_or(Value::Null);
        let source = selector(&input).ok_or_else(|| EngineError::SelectorFailed {
            selector: pending.selector.clone(),
            name: pending.name.clone(),
        })?;

        let display = DisplayOptions::from_hash(&pending.hash);
        self.loader
            .install_partial_as(ctx, &pending.name, &source, display, pending.base.as_deref())
            .await
    }

    /// Look up a selector, falling back to the helper source and memoizing
    /// what it returns.
    fn selector(&self, name: &str) -> Option<PartialSelector> {
        if let Some(existing) = self.selectors.get(name) {
            return Some(existing.clone());
        }
        let loaded = self.options.helper_source.as_ref()?.load_selector(name)?;
        self.selectors.insert(name.to_string(), loaded.clone());
        Some(loaded)
    }

    async fn load_descriptor(&self, path: &Path) -> Result<ComponentDescriptor> {
        let value = self.loader.load_json(path).await?;
        serde_json::from_value(value).map_err(|source| EngineError::Json {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Layout to use for a view document.
fn layout_name(document: &ViewDocument, default_layout: &str) -> String {
    match &document.metadata.layout {
        None | Some(LayoutSetting::Enabled(true)) => default_layout.to_string(),
        Some(LayoutSetting::Enabled(false)) => IDENTITY_LAYOUT.to_string(),
        Some(LayoutSetting::Named(name)) => name.clone(),
    }
}

/// Caller data as a mutable object.
fn object_data(data: Value) -> Result<Map<String, Value>> {
    match data {
        Value::Null => Ok(Map::new()),
        Value::Object(map) => Ok(map),
        _ => Err(EngineError::ContextNotObject),
    }
}

/// Make a file name resolve next to its base location rather than in the
/// kind directory.
fn sibling(file: &str) -> String {
    if file.starts_with('/') || file.starts_with("./") || file.starts_with("../") {
        file.to_string()
    } else {
        format!("./{file}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_selection_covers_all_settings() {
        let doc = |layout| ViewDocument {
            metadata: crate::frontmatter::ViewMetadata {
                layout,
                data: None,
                extra: Map::new(),
            },
            body: String::new(),
        };

        assert_eq!(layout_name(&doc(None), "default"), "default");
        assert_eq!(layout_name(&doc(Some(LayoutSetting::Enabled(true))), "default"), "default");
        assert_eq!(
            layout_name(&doc(Some(LayoutSetting::Enabled(false))), "default"),
            IDENTITY_LAYOUT
        );
        assert_eq!(layout_name(&doc(Some(LayoutSetting::Named("wide".into()))), "default"), "wide");
    }

    #[test]
    fn non_object_data_is_rejected() {
        assert!(object_data(Value::Null).is_ok());
        assert!(object_data(serde_json::json!({"a": 1})).is_ok());
        assert!(matches!(
            object_data(serde_json::json!([1, 2])),
            Err(EngineError::ContextNotObject)
        ));
    }

    #[test]
    fn sibling_prefixes_bare_names_only() {
        assert_eq!(sibling("spinner.hbs"), "./spinner.hbs");
        assert_eq!(sibling("./spinner.hbs"), "./spinner.hbs");
        assert_eq!(sibling("/opt/spinner.hbs"), "/opt/spinner.hbs");
    }

    #[test]
    fn selectors_resolve_from_the_typed_map() {
        let engine = Engine::new(EngineOptions::new("/tmp/never-read"));
        engine.register_selector("pick", |value: &Value| {
            value.as_str().map(|s| format!("{s}-impl"))
        });

        let selector = engine.selector("pick").unwrap();
        assert_eq!(selector(&serde_json::json!("spinner")), Some("spinner-impl".into()));
        assert!(engine.selector("absent").is_none());
    }
}
