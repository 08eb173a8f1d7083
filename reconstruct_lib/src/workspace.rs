//! Workspace for reusing allocated memory between multiple surface reconstructions.

use std::cell::RefCell;
use std::fmt;
use std::fmt::Debug;

use thread_local::ThreadLocal;

use crate::mesh::HalfEdgeMesh;
use crate::numeric_types::Real;
use crate::tangent_plane::TangentFrame;

/// Collection of thread-local workspaces used to reduce allocations across repeated calls to
/// [`crate::reconstruct_surface_inplace`].
#[derive(Default)]
pub struct ReconstructionWorkspace<R: Real> {
    local_workspaces: ThreadLocal<RefCell<LocalReconstructionWorkspace<R>>>,
}

impl<R: Real> ReconstructionWorkspace<R> {
    /// Returns a reference to a thread-local workspace, initializing it with the given
    /// capacity if not already initialized.
    pub(crate) fn get_local_with_capacity(
        &self,
        capacity: usize,
    ) -> &RefCell<LocalReconstructionWorkspace<R>> {
        self.local_workspaces
            .get_or(|| RefCell::new(LocalReconstructionWorkspace::with_capacity(capacity)))
    }
}

impl<R: Real> Clone for ReconstructionWorkspace<R> {
    /// Returns a new default workspace without any allocated memory.
    fn clone(&self) -> Self {
        ReconstructionWorkspace::default()
    }
}

impl<R: Real> Debug for ReconstructionWorkspace<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReconstructionWorkspace").finish()
    }
}

/// Scratch storage reused by [`crate::reconstruct_surface_inplace`] across calls.
pub(crate) struct LocalReconstructionWorkspace<R: Real> {
    /// Tangent frames estimated in the current run, one per input sample.
    pub frames: Vec<TangentFrame<R>>,
    /// Degenerate-neighborhood flags, aligned with `frames`.
    pub degenerate: Vec<bool>,
    /// Tangent-plane origins, kept as a separate buffer to back the origin spatial index
    /// without re-allocating it from `frames` on every call.
    pub origins: Vec<nalgebra::Vector3<R>>,
    /// The reconstructed mesh from the current run.
    pub mesh: HalfEdgeMesh<R>,
}

impl<R: Real> Default for LocalReconstructionWorkspace<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Real> LocalReconstructionWorkspace<R> {
    pub(crate) fn new() -> Self {
        Self {
            frames: Vec::new(),
            degenerate: Vec::new(),
            origins: Vec::new(),
            mesh: HalfEdgeMesh::new(),
        }
    }

    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self {
            frames: Vec::with_capacity(capacity),
            degenerate: Vec::with_capacity(capacity),
            origins: Vec::with_capacity(capacity),
            mesh: HalfEdgeMesh::new(),
        }
    }
}
