//! Logical-name resolution.
//!
//! Maps a logical name plus a resource kind to the concrete location it
//! loads from. Resolution is purely lexical: no filesystem probing, no
//! errors. A downstream read failure is reported by the loader, not here.
//!
//! Addressing forms, in the order they are tried:
//! - opaque placeholders (`__ident__`) pass through untouched; they name
//!   synthetic cache entries such as the identity layout
//! - absolute paths pass through (extension-adjusted only)
//! - `.`/`..`-prefixed names resolve against the directory of the supplied
//!   base location, else against `root/project/<current view>`
//! - bare names prefixed with `shared/` resolve inside the configured shared
//!   namespace using the kind's instance-level subdirectory
//! - all other bare names resolve to `root/project/<kind dir>/name`, with
//!   per-render subdirectory overrides taking precedence

use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, LazyLock};

use regex::Regex;

use crate::config::EngineOptions;
use crate::engine::RenderState;

/// Pattern for synthetic, non-file-backed template names.
static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^__[A-Za-z][A-Za-z0-9_]*__$").expect("placeholder pattern"));

/// True when `name` is an opaque placeholder that must never touch the
/// filesystem.
pub fn is_placeholder(name: &str) -> bool {
    PLACEHOLDER.is_match(name)
}

/// The kind of resource being resolved; selects the subdirectory for bare
/// logical names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    View,
    Layout,
    Partial,
    Data,
    Helper,
    Component,
}

pub struct PathResolver {
    options: Arc<EngineOptions>,
}

impl PathResolver {
    pub fn new(options: Arc<EngineOptions>) -> Self {
        Self { options }
    }

    /// Resolve `name` to a loadable location.
    ///
    /// `current_view` anchors relative names when no `base` is given;
    /// `extension` overrides the configured default for kinds with a
    /// different on-disk format (JSON data files).
    pub fn resolve(
        &self,
        state: &RenderState,
        current_view: &str,
        name: &str,
        kind: ResourceKind,
        extension: Option<&str>,
        base: Option<&Path>,
    ) -> PathBuf {
        if is_placeholder(name) {
            return PathBuf::from(name);
        }

        let name = name.replace('\\', "/");
        let named = self.with_extension(&name, extension);

        let path = Path::new(&named);
        if path.is_absolute() {
            return normalize(path);
        }

        if is_relative_marker(&name) {
            let anchor = match base {
                Some(base) => base.to_path_buf(),
                None => {
                    let mut anchor = self.options.root.clone();
                    push_segment(&mut anchor, &state.project);
                    anchor.push(current_view);
                    anchor
                }
            };
            let dir = anchor.parent().unwrap_or(Path::new(""));
            return normalize(&dir.join(&named));
        }

        let shared_prefix = format!("{}/", self.options.shared);
        let (project, subdir, remainder) = if let Some(rest) = named.strip_prefix(&shared_prefix) {
            // Shared namespace always uses the instance-level kind directory.
            (self.options.shared.as_str(), self.kind_dir(kind), rest)
        } else {
            (state.project.as_str(), self.effective_dir(state, kind), named.as_str())
        };

        let mut resolved = self.options.root.clone();
        push_segment(&mut resolved, project);
        push_segment(&mut resolved, subdir);
        resolved.push(remainder);
        normalize(&resolved)
    }

    fn with_extension(&self, name: &str, extension: Option<&str>) -> String {
        if Path::new(name).extension().is_some() {
            return name.to_string();
        }
        let ext = extension.unwrap_or(&self.options.extname);
        format!("{name}{ext}")
    }

    fn kind_dir(&self, kind: ResourceKind) -> &str {
        match kind {
            ResourceKind::View => &self.options.views_dir,
            ResourceKind::Layout => &self.options.layouts_dir,
            ResourceKind::Partial => &self.options.partials_dir,
            ResourceKind::Data => &self.options.data_dir,
            ResourceKind::Helper => &self.options.helpers_dir,
            ResourceKind::Component => &self.options.components_dir,
        }
    }

    fn effective_dir<'a>(&'a self, state: &'a RenderState, kind: ResourceKind) -> &'a str {
        let override_dir = match kind {
            ResourceKind::View => state.views_dir.as_deref(),
            ResourceKind::Layout => state.layouts_dir.as_deref(),
            ResourceKind::Partial => state.partials_dir.as_deref(),
            ResourceKind::Data => state.data_dir.as_deref(),
            ResourceKind::Component => state.components_dir.as_deref(),
            ResourceKind::Helper => None,
        };
        override_dir.unwrap_or_else(|| self.kind_dir(kind))
    }
}

fn is_relative_marker(name: &str) -> bool {
    name == "." || name == ".." || name.starts_with("./") || name.starts_with("../")
}

fn push_segment(path: &mut PathBuf, segment: &str) {
    if !segment.is_empty() {
        path.push(segment);
    }
}

/// Lexical normalization: collapses `.` and `..` without touching the
/// filesystem.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolver() -> PathResolver {
        PathResolver::new(Arc::new(EngineOptions::new("/srv/templates")))
    }

    fn state() -> RenderState {
        RenderState::for_project("site")
    }

    #[test]
    fn placeholder_names_pass_through() {
        let resolved = resolver().resolve(
            &state(),
            "home",
            "__identity__",
            ResourceKind::Layout,
            None,
            None,
        );
        assert_eq!(resolved, PathBuf::from("__identity__"));
    }

    #[test]
    fn bare_names_join_root_project_and_kind_dir() {
        let resolved =
            resolver().resolve(&state(), "home", "nav", ResourceKind::Partial, None, None);
        assert_eq!(resolved, PathBuf::from("/srv/templates/site/partials/nav.hbs"));
    }

    #[test]
    fn extension_is_appended_only_when_absent() {
        let r = resolver();
        let with = r.resolve(&state(), "home", "nav.html", ResourceKind::Partial, None, None);
        assert_eq!(with, PathBuf::from("/srv/templates/site/partials/nav.html"));

        let data = r.resolve(&state(), "home", "home", ResourceKind::Data, Some(".json"), None);
        assert_eq!(data, PathBuf::from("/srv/templates/site/data/home.json"));
    }

    #[test]
    fn absolute_names_pass_through_with_extension() {
        let resolved = resolver().resolve(
            &state(),
            "home",
            "/opt/shared/nav",
            ResourceKind::Partial,
            None,
            None,
        );
        assert_eq!(resolved, PathBuf::from("/opt/shared/nav.hbs"));
    }

    #[test]
    fn relative_names_resolve_against_the_base_location() {
        let r = resolver();
        let a = r.resolve(
            &state(),
            "home",
            "./item",
            ResourceKind::Partial,
            None,
            Some(Path::new("/srv/templates/site/partials/list.hbs")),
        );
        let b = r.resolve(
            &state(),
            "home",
            "./item",
            ResourceKind::Partial,
            None,
            Some(Path::new("/srv/templates/site/widgets/grid.hbs")),
        );
        assert_eq!(a, PathBuf::from("/srv/templates/site/partials/item.hbs"));
        assert_eq!(b, PathBuf::from("/srv/templates/site/widgets/item.hbs"));
        assert_ne!(a, b);
    }

    #[test]
    fn relative_names_fall_back_to_the_current_view() {
        let resolved = resolver().resolve(
            &state(),
            "admin/dashboard",
            "../widgets/chart",
            ResourceKind::Partial,
            None,
            None,
        );
        assert_eq!(resolved, PathBuf::from("/srv/templates/site/widgets/chart.hbs"));
    }

    #[test]
    fn shared_prefix_switches_namespace() {
        let resolved = resolver().resolve(
            &state(),
            "home",
            "shared/header",
            ResourceKind::Partial,
            None,
            None,
        );
        assert_eq!(resolved, PathBuf::from("/srv/templates/shared/partials/header.hbs"));
    }

    #[test]
    fn state_overrides_win_over_instance_dirs() {
        let mut state = state();
        state.partials_dir = Some("fragments".to_string());
        let resolved = resolver().resolve(&state, "home", "nav", ResourceKind::Partial, None, None);
        assert_eq!(resolved, PathBuf::from("/srv/templates/site/fragments/nav.hbs"));
    }
}
