//! Template dependency scanning.
//!
//! Walks a compiled template's AST and reports every partial inclusion and
//! block-helper reference that is not yet registered, so the loader knows
//! what to install before the template can render. The traversal is a plain
//! recursive function over node kinds; no state survives a call, so scanning
//! is trivially reusable and idempotent: once the reported names are
//! registered, a re-scan yields empty sets.
//!
//! Partial inclusions carry their hash arguments. Two hash keys are
//! directives for the engine rather than template data:
//! - `$$dynamic` marks the inclusion as data-dependent; its value is the
//!   data key (or the `__component__` marker) whose render-time value picks
//!   the concrete partial
//! - `$$selector` optionally names the selector invoked with that value,
//!   defaulting to the inclusion's own logical name
//!
//! A third key, `$$info`, tunes the HTML-comment wrapper the loader puts
//! around partial content; it is parsed here but applied by the loader.

use std::collections::HashSet;

use handlebars::template::{DecoratorTemplate, HelperTemplate, Parameter, Template, TemplateElement};

use crate::registry::Registry;

/// Hash key marking a partial inclusion as data-dependent.
pub const DYNAMIC_KEY: &str = "$$dynamic";
/// Hash key naming the selector for a dynamic inclusion.
pub const SELECTOR_KEY: &str = "$$selector";
/// Hash key carrying display-wrapper directives.
pub const INFO_KEY: &str = "$$info";
/// `$$dynamic` context value selecting component-variant mode.
pub const COMPONENT_CONTEXT: &str = "__component__";

/// A partial inclusion found in a template.
#[derive(Debug, Clone, PartialEq)]
pub struct PartialRef {
    /// Logical name of the inclusion.
    pub name: String,
    /// Hash arguments as key-sorted literal pairs, directives included,
    /// `$$dynamic`/`$$selector` excluded (they are consumed into `dynamic`).
    pub hash: Vec<(String, String)>,
    /// Present when the concrete partial is only known at render time.
    pub dynamic: Option<DynamicBinding>,
}

/// A data-dependent partial binding.
#[derive(Debug, Clone, PartialEq)]
pub struct DynamicBinding {
    /// Data key (or [`COMPONENT_CONTEXT`]) supplying the selector's input.
    pub context: String,
    /// Selector name.
    pub name: String,
}

/// Unregistered references found by one scan.
#[derive(Debug, Clone, Default)]
pub struct ScanReport {
    pub partials: Vec<PartialRef>,
    pub helpers: Vec<String>,
}

impl ScanReport {
    pub fn is_empty(&self) -> bool {
        self.partials.is_empty() && self.helpers.is_empty()
    }
}

/// Scan `template` for partial and block-helper references absent from
/// `registry`.
pub fn scan(template: &Template, registry: &Registry) -> ScanReport {
    let mut report = ScanReport::default();
    let mut seen_partials = HashSet::new();
    let mut seen_helpers = HashSet::new();
    walk(template, registry, &mut report, &mut seen_partials, &mut seen_helpers);
    report
}

fn walk(
    template: &Template,
    registry: &Registry,
    report: &mut ScanReport,
    seen_partials: &mut HashSet<String>,
    seen_helpers: &mut HashSet<String>,
) {
    for element in &template.elements {
        match element {
            TemplateElement::HelperBlock(helper) => {
                collect_helper(helper, registry, report, seen_helpers);
                if let Some(inner) = &helper.template {
                    walk(inner, registry, report, seen_partials, seen_helpers);
                }
                if let Some(inverse) = &helper.inverse {
                    walk(inverse, registry, report, seen_partials, seen_helpers);
                }
            }
            TemplateElement::PartialExpression(partial)
            | TemplateElement::PartialBlock(partial) => {
                collect_partial(partial, registry, report, seen_partials);
                if let Some(inner) = &partial.template {
                    walk(inner, registry, report, seen_partials, seen_helpers);
                }
            }
            TemplateElement::DecoratorBlock(decorator) => {
                if let Some(inner) = &decorator.template {
                    walk(inner, registry, report, seen_partials, seen_helpers);
                }
            }
            _ => {}
        }
    }
}

fn collect_helper(
    helper: &HelperTemplate,
    registry: &Registry,
    report: &mut ScanReport,
    seen: &mut HashSet<String>,
) {
    let Some(name) = parameter_name(&helper.name) else {
        return;
    };
    if registry.has_helper(&name) || !seen.insert(name.clone()) {
        return;
    }
    report.helpers.push(name);
}

fn collect_partial(
    partial: &DecoratorTemplate,
    registry: &Registry,
    report: &mut ScanReport,
    seen: &mut HashSet<String>,
) {
    let Some(name) = parameter_name(&partial.name) else {
        // Subexpression-named partials are outside the loader's reach.
        return;
    };
    if registry.has_partial(&name) || !seen.insert(name.clone()) {
        return;
    }

    let mut hash = Vec::new();
    let mut context = None;
    let mut selector = None;
    for (key, value) in &partial.hash {
        let Some(value) = parameter_value(value) else {
            continue;
        };
        match key.as_str() {
            DYNAMIC_KEY => context = Some(value),
            SELECTOR_KEY => selector = Some(value),
            _ => hash.push((key.clone(), value)),
        }
    }
    hash.sort_by(|a, b| a.0.cmp(&b.0));

    let dynamic = context.map(|context| DynamicBinding {
        context,
        name: selector.unwrap_or_else(|| name.clone()),
    });

    report.partials.push(PartialRef {
        name,
        hash,
        dynamic,
    });
}

fn path_raw(path: &handlebars::Path) -> &str {
    match path {
        handlebars::Path::Relative((_, raw)) => raw,
        handlebars::Path::Local((_, _, raw)) => raw,
    }
}

fn parameter_name(parameter: &Parameter) -> Option<String> {
    match parameter {
        Parameter::Name(name) => Some(name.clone()),
        Parameter::Path(path) => Some(path_raw(path).to_string()),
        Parameter::Literal(value) => value.as_str().map(str::to_string),
        Parameter::Subexpression(_) => None,
        _ => None,
    }
}

fn parameter_value(parameter: &Parameter) -> Option<String> {
    match parameter {
        Parameter::Name(name) => Some(name.clone()),
        Parameter::Path(path) => Some(path_raw(path).to_string()),
        Parameter::Literal(value) => match value.as_str() {
            Some(s) => Some(s.to_string()),
            None => Some(value.to_string()),
        },
        Parameter::Subexpression(_) => None,
        _ => None,
    }
}

/// How a loaded partial is labeled in the rendered output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PathStyle {
    /// Show the resolved location.
    #[default]
    Absolute,
    /// Show the logical name instead.
    Relative,
    /// Wrap, but show no location at all.
    Hidden,
}

/// Parsed `$$info` directive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DisplayOptions {
    pub path: PathStyle,
    pub hide: bool,
}

impl DisplayOptions {
    /// Parse a `key=value` directive string. Malformed or unknown entries
    /// fall back to the defaults silently.
    pub fn parse(raw: &str) -> Self {
        let mut options = Self::default();
        for entry in raw.split_whitespace() {
            let Some((key, value)) = entry.split_once('=') else {
                continue;
            };
            match (key, value) {
                ("path", "absolute") => options.path = PathStyle::Absolute,
                ("path", "relative") => options.path = PathStyle::Relative,
                ("path", "false") => options.path = PathStyle::Hidden,
                ("status", "show") => options.hide = false,
                ("status", "hide") => options.hide = true,
                _ => {}
            }
        }
        options
    }

    /// Options for a partial reference's hash, reading the `$$info` key.
    pub fn from_hash(hash: &[(String, String)]) -> Self {
        hash.iter()
            .find(|(key, _)| key == INFO_KEY)
            .map(|(_, value)| Self::parse(value))
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compile(source: &str) -> Template {
        Template::compile(source).unwrap()
    }

    #[test]
    fn reports_unregistered_partials_and_block_helpers() {
        let registry = Registry::new();
        let template = compile(
            "{{#markdown}}{{> sidebar}}{{/markdown}}{{#if admin}}{{> admin-nav}}{{/if}}",
        );
        let report = scan(&template, &registry);

        let names: Vec<_> = report.partials.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["sidebar", "admin-nav"]);
        assert_eq!(report.helpers, vec!["markdown"]);
    }

    #[test]
    fn registered_names_are_filtered() {
        let registry = Registry::new();
        registry.register_partial("sidebar", compile("side"));
        let template = compile("{{> sidebar}}{{> footer}}");

        let report = scan(&template, &registry);
        let names: Vec<_> = report.partials.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["footer"]);

        registry.register_partial("footer", compile("foot"));
        assert!(scan(&template, &registry).is_empty());
    }

    #[test]
    fn duplicate_references_are_reported_once() {
        let registry = Registry::new();
        let template = compile("{{> row}}{{> row}}{{> row}}");
        let report = scan(&template, &registry);
        assert_eq!(report.partials.len(), 1);
    }

    #[test]
    fn dynamic_key_defers_the_partial() {
        let registry = Registry::new();
        let template = compile(r#"{{> spinner $$dynamic="widget" $$selector="pickWidget"}}"#);
        let report = scan(&template, &registry);

        let partial = &report.partials[0];
        assert_eq!(partial.name, "spinner");
        assert_eq!(
            partial.dynamic,
            Some(DynamicBinding {
                context: "widget".to_string(),
                name: "pickWidget".to_string(),
            })
        );
        assert!(partial.hash.is_empty());
    }

    #[test]
    fn selector_defaults_to_the_partial_name() {
        let registry = Registry::new();
        let template = compile(r#"{{> spinner $$dynamic="__component__"}}"#);
        let report = scan(&template, &registry);

        let binding = report.partials[0].dynamic.as_ref().unwrap();
        assert_eq!(binding.context, COMPONENT_CONTEXT);
        assert_eq!(binding.name, "spinner");
    }

    #[test]
    fn hash_pairs_are_key_sorted_and_keep_info() {
        let registry = Registry::new();
        let template = compile(r#"{{> card title="Hi" $$info="status=hide" kind=compact}}"#);
        let report = scan(&template, &registry);

        assert_eq!(
            report.partials[0].hash,
            vec![
                ("$$info".to_string(), "status=hide".to_string()),
                ("kind".to_string(), "compact".to_string()),
                ("title".to_string(), "Hi".to_string()),
            ]
        );
    }

    #[test]
    fn info_directive_parses_with_silent_fallback() {
        assert_eq!(DisplayOptions::parse("status=hide"), DisplayOptions {
            path: PathStyle::Absolute,
            hide: true
        });
        assert_eq!(DisplayOptions::parse("path=relative"), DisplayOptions {
            path: PathStyle::Relative,
            hide: false
        });
        assert_eq!(DisplayOptions::parse("path=false"), DisplayOptions {
            path: PathStyle::Hidden,
            hide: false
        });
        // Garbage falls back to defaults.
        assert_eq!(DisplayOptions::parse("???"), DisplayOptions::default());
        assert_eq!(DisplayOptions::parse("path=upside-down"), DisplayOptions::default());
    }
}
