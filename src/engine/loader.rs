//! Recursive dependency installation.
//!
//! Given a scan report for a freshly compiled template, the loader brings
//! every referenced partial and helper into the registry before the template
//! renders. Static partials are resolved, read, wrapped, compiled, registered
//! and then scanned themselves, so a chain of includes is installed to
//! arbitrary depth. Sibling installs at each level fan out concurrently.
//!
//! Dynamic references cannot be installed during the compile pass (their
//! concrete name depends on render data), so they are queued on the render
//! context and resolved later through [`install_partial_as`], which installs
//! a concrete source under the inclusion's own name.
//!
//! Helper installation is synchronous and never fails the pass: a missing or
//! broken helper module is logged and the render only errors if the helper
//! is actually invoked.
//!
//! [`install_partial_as`]: Loader::install_partial_as

use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::future::{BoxFuture, try_join_all};
use handlebars::template::Template;
use serde_json::Value;

use crate::cache::{CacheEntry, RenderCache};
use crate::config::EngineOptions;
use crate::engine::context::{PendingPartial, RenderContext};
use crate::error::{EngineError, Result};
use crate::helpers::HelperLoad;
use crate::registry::Registry;
use crate::resolver::{PathResolver, ResourceKind, is_placeholder};
use crate::scanner::{self, DisplayOptions, PartialRef, PathStyle, ScanReport};

pub(crate) struct Loader {
    options: Arc<EngineOptions>,
    resolver: PathResolver,
    registry: Arc<Registry>,
    cache: Arc<RenderCache>,
}

impl Loader {
    pub fn new(
        options: Arc<EngineOptions>,
        registry: Arc<Registry>,
        cache: Arc<RenderCache>,
    ) -> Self {
        let resolver = PathResolver::new(options.clone());
        Self {
            options,
            resolver,
            registry,
            cache,
        }
    }

    pub fn resolver(&self) -> &PathResolver {
        &self.resolver
    }

    /// Install everything a scan reported: helpers first (synchronously),
    /// then all partials concurrently.
    pub async fn install_report(
        &self,
        ctx: &RenderContext,
        report: ScanReport,
        base: Option<&Path>,
    ) -> Result<()> {
        for name in &report.helpers {
            self.install_helper(name);
        }
        let installs = report
            .partials
            .into_iter()
            .map(|reference| self.install_partial(ctx, reference, base.map(Path::to_path_buf)));
        try_join_all(installs).await?;
        Ok(())
    }

    /// Install one scanned partial reference.
    ///
    /// Dynamic references are queued on the context instead; everything else
    /// registers under its own logical name.
    pub fn install_partial<'a>(
        &'a self,
        ctx: &'a RenderContext,
        reference: PartialRef,
        base: Option<PathBuf>,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            if let Some(dynamic) = reference.dynamic {
                tracing::debug!(name = %reference.name, context = %dynamic.context, "deferring dynamic partial");
                ctx.queue_dynamic(PendingPartial {
                    name: reference.name,
                    hash: reference.hash,
                    base,
                    context: dynamic.context,
                    selector: dynamic.name,
                });
                return Ok(());
            }
            if self.registry.has_partial(&reference.name) {
                return Ok(());
            }
            let display = DisplayOptions::from_hash(&reference.hash);
            self.install_partial_as(ctx, &reference.name, &reference.name, display, base.as_deref())
                .await
        })
    }

    /// Install the partial file behind `source` under the registry name
    /// `register_as`. The two differ for dynamic references, where the
    /// inclusion name stays stable while the source is data-selected.
    pub async fn install_partial_as(
        &self,
        ctx: &RenderContext,
        register_as: &str,
        source: &str,
        display: DisplayOptions,
        base: Option<&Path>,
    ) -> Result<()> {
        if is_placeholder(source) {
            return self.install_builtin(register_as, source);
        }

        let path =
            self.resolver.resolve(&ctx.state, &ctx.view, source, ResourceKind::Partial, None, base);
        let key = path.to_string_lossy().into_owned();

        if let Some(CacheEntry::Compiled(template)) = self.cache.get(&key) {
            self.registry.register_partial(register_as, template);
            return Ok(());
        }

        let raw = tokio::fs::read_to_string(&path)
            .await
            .map_err(|err| EngineError::io(&path, err))?;
        let wrapped = wrap_partial(&raw, display, &path, source);
        let template =
            Template::compile(&wrapped).map_err(|err| EngineError::compile(&path, err))?;

        // Register before scanning so include cycles terminate: the scanner
        // filters names that are already registered.
        if self.registry.register_partial(register_as, template.clone()) {
            let report = scanner::scan(&template, &self.registry);
            self.install_report(ctx, report, Some(&path)).await?;
        }
        self.cache.insert(key, CacheEntry::Compiled(template));
        Ok(())
    }

    /// Serve a synthetic template (identity layout and friends) from the
    /// cache's always-visible tier.
    fn install_builtin(&self, register_as: &str, source: &str) -> Result<()> {
        match self.cache.get_always(source) {
            Some(CacheEntry::Compiled(template)) => {
                self.registry.register_partial(register_as, template);
                Ok(())
            }
            _ => Err(EngineError::MissingBuiltin {
                name: source.to_string(),
            }),
        }
    }

    /// Ask the helper source for `name` and register the result. Failures
    /// are logged, never propagated.
    pub fn install_helper(&self, name: &str) {
        if self.registry.has_helper(name) {
            return;
        }
        let Some(source) = &self.options.helper_source else {
            tracing::warn!(name, "template references a helper but no helper source is configured");
            return;
        };
        match source.load_helper(name) {
            HelperLoad::Loaded(helper) => {
                self.registry.register_helper(name, helper);
                tracing::debug!(name, "helper installed");
            }
            HelperLoad::Missing => {
                tracing::warn!(name, "helper not found in helper source");
            }
            HelperLoad::Failed(message) => {
                tracing::warn!(name, %message, "helper failed to load");
            }
        }
    }

    /// Read and parse a JSON file, serving repeats from the cache.
    pub async fn load_json(&self, path: &Path) -> Result<Value> {
        let key = path.to_string_lossy().into_owned();
        if let Some(CacheEntry::Data(value)) = self.cache.get(&key) {
            return Ok(value);
        }
        let raw = tokio::fs::read_to_string(path)
            .await
            .map_err(|err| EngineError::io(path, err))?;
        let value: Value = serde_json::from_str(&raw).map_err(|source| EngineError::Json {
            path: path.to_path_buf(),
            source,
        })?;
        self.cache.insert(key, CacheEntry::Data(value.clone()));
        Ok(value)
    }
}

/// Surround partial content with an HTML comment naming where it came from.
fn wrap_partial(raw: &str, display: DisplayOptions, path: &Path, logical: &str) -> String {
    if display.hide {
        return raw.to_string();
    }
    let label = match display.path {
        PathStyle::Absolute => format!(":{}", path.display()),
        PathStyle::Relative => format!(":{logical}"),
        PathStyle::Hidden => String::new(),
    };
    format!("<!-- partial{label} -->\n{raw}\n<!-- /partial{label} -->")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::context::RenderState;
    use std::fs;

    fn loader_for(root: &Path) -> Loader {
        let options = Arc::new(EngineOptions::new(root));
        Loader::new(options, Arc::new(Registry::new()), Arc::new(RenderCache::new(false)))
    }

    fn ctx() -> RenderContext {
        RenderContext::new(RenderState::default(), "home")
    }

    #[tokio::test]
    async fn installs_a_chain_of_partials() {
        let dir = tempfile::tempdir().unwrap();
        let partials = dir.path().join("partials");
        fs::create_dir_all(&partials).unwrap();
        fs::write(partials.join("outer.hbs"), "o {{> inner}}").unwrap();
        fs::write(partials.join("inner.hbs"), "i").unwrap();

        let loader = loader_for(dir.path());
        let ctx = ctx();
        let reference = PartialRef {
            name: "outer".to_string(),
            hash: Vec::new(),
            dynamic: None,
        };
        loader.install_partial(&ctx, reference, None).await.unwrap();

        let names = loader.registry.partial_names();
        assert!(names.contains("outer"));
        assert!(names.contains("inner"));
    }

    #[tokio::test]
    async fn dynamic_references_are_queued_not_installed() {
        let dir = tempfile::tempdir().unwrap();
        let loader = loader_for(dir.path());
        let ctx = ctx();
        let reference = PartialRef {
            name: "widget".to_string(),
            hash: Vec::new(),
            dynamic: Some(crate::scanner::DynamicBinding {
                context: "widget".to_string(),
                name: "pick".to_string(),
            }),
        };
        loader.install_partial(&ctx, reference, None).await.unwrap();

        assert!(loader.registry.partial_names().is_empty());
        assert_eq!(ctx.pending_len(), 1);
    }

    #[tokio::test]
    async fn missing_partial_file_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let loader = loader_for(dir.path());
        let reference = PartialRef {
            name: "ghost".to_string(),
            hash: Vec::new(),
            dynamic: None,
        };
        let err = loader.install_partial(&ctx(), reference, None).await.unwrap_err();
        assert!(matches!(err, EngineError::Io { .. }));
    }

    #[tokio::test]
    async fn missing_helper_is_swallowed() {
        let dir = tempfile::tempdir().unwrap();
        let loader = loader_for(dir.path());
        loader.install_helper("nonexistent");
        assert!(!loader.registry.has_helper("nonexistent"));
    }

    #[test]
    fn wrapper_styles() {
        let path = Path::new("/srv/t/partials/nav.hbs");
        let abs = wrap_partial("x", DisplayOptions::default(), path, "nav");
        assert!(abs.starts_with("<!-- partial:/srv/t/partials/nav.hbs -->"));

        let rel = wrap_partial(
            "x",
            DisplayOptions {
                path: PathStyle::Relative,
                hide: false,
            },
            path,
            "nav",
        );
        assert!(rel.starts_with("<!-- partial:nav -->"));

        let unlabeled = wrap_partial(
            "x",
            DisplayOptions {
                path: PathStyle::Hidden,
                hide: false,
            },
            path,
            "nav",
        );
        assert_eq!(unlabeled, "<!-- partial -->\nx\n<!-- /partial -->");

        let hidden = wrap_partial(
            "x",
            DisplayOptions {
                path: PathStyle::Absolute,
                hide: true,
            },
            path,
            "nav",
        );
        assert_eq!(hidden, "x");
    }
}
