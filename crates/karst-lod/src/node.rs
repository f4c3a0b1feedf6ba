use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;

use karst_chunk::ChunkPos;
use karst_mesh::ChunkMesh;

/// The window's wrapper around one mesh. `should_be_removed` is raised for
/// every resident node at the start of a window pass and lowered when the
/// pass still wants it; whatever stays raised exits in the sweep.
pub struct ChunkMeshNode {
    pub mesh: Arc<ChunkMesh>,
    should_be_removed: AtomicBool,
    /// How many of the eight higher-detail children are currently drawable.
    drawable_children: AtomicU8,
}

impl ChunkMeshNode {
    pub fn new(pos: ChunkPos) -> Arc<Self> {
        Arc::new(Self {
            mesh: ChunkMesh::new(pos),
            should_be_removed: AtomicBool::new(true),
            drawable_children: AtomicU8::new(0),
        })
    }

    #[inline]
    pub fn pos(&self) -> ChunkPos {
        self.mesh.pos()
    }

    #[inline]
    pub fn should_be_removed(&self) -> bool {
        self.should_be_removed.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn set_should_be_removed(&self, v: bool) {
        self.should_be_removed.store(v, Ordering::Relaxed);
    }

    #[inline]
    pub fn drawable_children(&self) -> u8 {
        self.drawable_children.load(Ordering::Relaxed)
    }

    /// Cleared when the window pass visits this node; the children counted
    /// into it again are the finer nodes visited afterwards.
    #[inline]
    pub fn reset_drawable_children(&self) {
        self.drawable_children.store(0, Ordering::Relaxed);
    }

    #[inline]
    pub fn add_drawable_child(&self) {
        self.drawable_children.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn remove_drawable_child(&self) {
        let prev = self.drawable_children.fetch_sub(1, Ordering::Relaxed);
        debug_assert!(prev > 0);
    }
}
