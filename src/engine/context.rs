//! Per-render state.
//!
//! Earlier view engines of this shape kept the current view identity and the
//! pending dynamic-partial queue as engine-level mutable fields, which made
//! two in-flight renders on one instance a data race. Here both live in a
//! [`RenderContext`] created per call and threaded through every internal
//! step, so the queue is structurally scoped to the render that filled it.

use std::path::PathBuf;
use std::sync::Mutex;

/// Caller-supplied addressing state for one render.
#[derive(Debug, Clone, Default)]
pub struct RenderState {
    /// Project namespace under the engine root. Empty means the root itself.
    pub project: String,
    /// Per-render overrides of the engine's kind subdirectories.
    pub views_dir: Option<String>,
    pub layouts_dir: Option<String>,
    pub partials_dir: Option<String>,
    pub data_dir: Option<String>,
    pub components_dir: Option<String>,
}

impl RenderState {
    pub fn for_project(project: impl Into<String>) -> Self {
        Self {
            project: project.into(),
            ..Self::default()
        }
    }
}

/// A dynamic partial reference collected during the compile pass, resolved
/// once render-time data is available.
#[derive(Debug, Clone)]
pub struct PendingPartial {
    /// Name the partial will be registered under (the inclusion's name).
    pub name: String,
    /// Hash pairs captured from the inclusion, key-sorted.
    pub hash: Vec<(String, String)>,
    /// Location of the template that contained the inclusion.
    pub base: Option<PathBuf>,
    /// Data key (or component marker) selecting the value fed to the
    /// selector.
    pub context: String,
    /// Selector name.
    pub selector: String,
}

/// Transient state for one render call.
#[derive(Debug)]
pub(crate) struct RenderContext {
    pub state: RenderState,
    /// Logical name of the view being rendered.
    pub view: String,
    /// Dynamic partial bindings queued by the compile pass, drained exactly
    /// once before the template is invoked.
    pending: Mutex<Vec<PendingPartial>>,
}

impl RenderContext {
    pub fn new(state: RenderState, view: impl Into<String>) -> Self {
        Self {
            state,
            view: view.into(),
            pending: Mutex::new(Vec::new()),
        }
    }

    pub fn queue_dynamic(&self, pending: PendingPartial) {
        self.pending.lock().expect("pending queue lock").push(pending);
    }

    pub fn drain_pending(&self) -> Vec<PendingPartial> {
        std::mem::take(&mut *self.pending.lock().expect("pending queue lock"))
    }

    #[cfg(test)]
    pub fn pending_len(&self) -> usize {
        self.pending.lock().expect("pending queue lock").len()
    }
}
