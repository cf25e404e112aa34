//! The per-engine registry of partials, helpers, and view templates.
//!
//! Wraps a single `Handlebars` instance. Partials and helpers are
//! append-only: registering a name that already exists is a no-op, which is
//! what makes concurrent installs of the same dependency idempotent. Views
//! and layouts register under their resolved location key and may be
//! overwritten freely.

use std::collections::HashSet;
use std::sync::RwLock;

use dashmap::DashSet;
use handlebars::template::Template;
use handlebars::{Context, Handlebars, Helper, HelperResult, Output, RenderContext, RenderErrorReason};
use serde_json::Value;

use crate::helpers::BoxedHelper;

/// Helper names Handlebars provides out of the box. The scanner must not
/// report these as missing dependencies.
const BUILTIN_HELPERS: &[&str] =
    &["if", "unless", "each", "with", "lookup", "log", "len", "raw"];

pub struct Registry {
    handlebars: RwLock<Handlebars<'static>>,
    partials: DashSet<String>,
    helpers: DashSet<String>,
}

impl Registry {
    pub fn new() -> Self {
        let helpers = DashSet::new();
        for name in BUILTIN_HELPERS {
            helpers.insert((*name).to_string());
        }
        Self {
            handlebars: RwLock::new(Handlebars::new()),
            partials: DashSet::new(),
            helpers,
        }
    }

    pub fn has_partial(&self, name: &str) -> bool {
        self.partials.contains(name)
    }

    pub fn has_helper(&self, name: &str) -> bool {
        self.helpers.contains(name)
    }

    /// Register a partial under `name`. Returns `false` (and leaves the
    /// existing registration untouched) if the name is already taken.
    pub fn register_partial(&self, name: &str, template: Template) -> bool {
        if !self.partials.insert(name.to_string()) {
            tracing::debug!(name, "partial already registered, skipping");
            return false;
        }
        self.handlebars.write().expect("registry lock").register_template(name, template);
        true
    }

    pub fn unregister_partial(&self, name: &str) {
        if self.partials.remove(name).is_some() {
            self.handlebars.write().expect("registry lock").unregister_template(name);
        }
    }

    /// Register a helper under `name`. No-op if already registered.
    pub fn register_helper(&self, name: &str, helper: BoxedHelper) -> bool {
        if !self.helpers.insert(name.to_string()) {
            tracing::debug!(name, "helper already registered, skipping");
            return false;
        }
        self.handlebars.write().expect("registry lock").register_helper(name, helper);
        true
    }

    /// Forget a helper name.
    ///
    /// Handlebars has no removal API for helpers, so the slot is overwritten
    /// with a stub that fails exactly like an unknown helper would.
    pub fn unregister_helper(&self, name: &str) {
        if self.helpers.remove(name).is_none() {
            return;
        }
        let missing = name.to_string();
        let stub = move |_: &Helper,
                         _: &Handlebars,
                         _: &Context,
                         _: &mut RenderContext,
                         _: &mut dyn Output|
              -> HelperResult {
            Err(RenderErrorReason::Other(format!("helper '{missing}' is not registered")).into())
        };
        self.handlebars.write().expect("registry lock").register_helper(name, Box::new(stub));
    }

    /// Register a view or layout template under its location key,
    /// overwriting any previous registration for that key.
    pub fn register_template(&self, key: &str, template: Template) {
        self.handlebars.write().expect("registry lock").register_template(key, template);
    }

    /// Render the template registered under `key` with `data`.
    pub fn render(&self, key: &str, data: &Value) -> Result<String, handlebars::RenderError> {
        self.handlebars.read().expect("registry lock").render(key, data)
    }

    /// Snapshot of registered partial names, for diagnostics and tests.
    pub fn partial_names(&self) -> HashSet<String> {
        self.partials.iter().map(|entry| entry.key().clone()).collect()
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compile(source: &str) -> Template {
        Template::compile(source).unwrap()
    }

    #[test]
    fn partial_registration_is_idempotent() {
        let registry = Registry::new();
        assert!(registry.register_partial("header", compile("first")));
        assert!(!registry.register_partial("header", compile("second")));

        registry.register_template("page", compile("{{> header}}"));
        let out = registry.render("page", &serde_json::json!({})).unwrap();
        assert_eq!(out, "first");
    }

    #[test]
    fn builtins_count_as_registered_helpers() {
        let registry = Registry::new();
        assert!(registry.has_helper("if"));
        assert!(registry.has_helper("each"));
        assert!(!registry.has_helper("shout"));
    }

    #[test]
    fn unregistered_helper_fails_at_render() {
        let registry = Registry::new();
        let noop = |_: &Helper,
                    _: &Handlebars,
                    _: &Context,
                    _: &mut RenderContext,
                    out: &mut dyn Output|
              -> HelperResult {
            out.write("ok")?;
            Ok(())
        };
        registry.register_helper("probe", Box::new(noop));
        registry.register_template("page", compile("{{probe}}"));
        assert_eq!(registry.render("page", &serde_json::json!({})).unwrap(), "ok");

        registry.unregister_helper("probe");
        assert!(registry.render("page", &serde_json::json!({})).is_err());
    }
}
