use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, AtomicU8, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, TryLockError};

use karst_chunk::{Chunk, ChunkPos};
use karst_gpu::{
    bindings, ChunkDescriptor, GpuDevice, LightCube, SlabAllocation, SlabBuffer,
    CHUNK_DATA_CAPACITY, FACE_BUFFER_CAPACITY, LIGHTMAP_SLOTS, LIGHT_BUFFER_CAPACITY,
};

use super::face::Face;
use super::face::FaceData;
use super::primitive::PrimitiveMesh;

/// Transient failures while finalizing a mesh; the window manager re-queues
/// the entry and tries again next frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StitchError {
    /// A neighbor this seam references has been evicted mid-flight.
    LodMissing,
    /// A worker currently holds a mesh lock this pass needs.
    Busy,
}

impl std::fmt::Display for StitchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StitchError::LodMissing => write!(f, "neighbor LOD missing"),
            StitchError::Busy => write!(f, "mesh busy"),
        }
    }
}

impl std::error::Error for StitchError {}

/// Resolves chunk positions to live meshes; implemented by the LOD window.
/// Entries are non-owning from the mesher's point of view: a returned mesh
/// may be evicted right after, which every caller tolerates.
pub trait MeshLookup {
    fn mesh_at(&self, pos: ChunkPos) -> Option<Arc<ChunkMesh>>;
}

/// Min/max rectangle of boundary cells that expose the neighbor chunk (air,
/// view-through, or freestanding model). Lets seam passes skip fully closed
/// faces without walking 32x32 cells.
#[derive(Clone, Copy, Debug)]
pub struct BorderRect {
    pub min_u: i32,
    pub min_v: i32,
    pub max_u: i32,
    pub max_v: i32,
}

impl Default for BorderRect {
    fn default() -> Self {
        Self::EMPTY
    }
}

impl BorderRect {
    pub const EMPTY: BorderRect = BorderRect {
        min_u: i32::MAX,
        min_v: i32::MAX,
        max_u: i32::MIN,
        max_v: i32::MIN,
    };

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.min_u > self.max_u
    }

    #[inline]
    pub fn include(&mut self, u: i32, v: i32) {
        self.min_u = self.min_u.min(u);
        self.min_v = self.min_v.min(v);
        self.max_u = self.max_u.max(u);
        self.max_v = self.max_v.max(v);
    }

    pub fn union(self, other: BorderRect) -> BorderRect {
        if self.is_empty() {
            return other;
        }
        if other.is_empty() {
            return self;
        }
        BorderRect {
            min_u: self.min_u.min(other.min_u),
            min_v: self.min_v.min(other.min_v),
            max_u: self.max_u.max(other.max_u),
            max_v: self.max_v.max(other.max_v),
        }
    }
}

/// Snapshot of the neighbor a seam was last stitched against.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NeighborStamp {
    pub pos: ChunkPos,
    pub revision: u64,
}

/// Everything a worker mutates under the mesh lock.
pub struct MeshState {
    pub chunk: Chunk,
    pub primitives: [PrimitiveMesh; 3],
    pub border: [BorderRect; 6],
    pub last_neighbor: [Option<NeighborStamp>; 6],
    /// Per coarse light cell: the slab slot holding its compressed cube.
    /// Unallocated entries read as the shared zero cube.
    pub lightmap: Vec<SlabAllocation>,
    pub descriptor: SlabAllocation,
}

impl MeshState {
    fn new(chunk: Chunk) -> Self {
        Self {
            chunk,
            primitives: Default::default(),
            border: [BorderRect::EMPTY; 6],
            last_neighbor: [None; 6],
            lightmap: vec![SlabAllocation::NONE; LIGHTMAP_SLOTS],
            descriptor: SlabAllocation::NONE,
        }
    }
}

/// One chunk's render state: the grid, the three primitive face lists, seam
/// bookkeeping, and the GPU slots. Workers hold the state mutex while
/// meshing; the render thread only ever `try_lock`s it.
pub struct ChunkMesh {
    pos: ChunkPos,
    state: Mutex<MeshState>,
    /// One bit per octant; cleared while a higher-detail child covers it.
    visibility_mask: AtomicU8,
    generated: AtomicBool,
    /// Bumped whenever the grid re-meshes; neighbors compare stamps to skip
    /// stitched seams.
    revision: AtomicU64,
    /// Uploaded face counts per primitive, the draw-time gate: a mesh is
    /// never drawn before its first finish stores them.
    face_counts: [AtomicU32; 3],
    /// Slab start of each primitive's face run, mirrored out of the state so
    /// draw calls never take the mesh lock.
    face_starts: [AtomicU32; 3],
    /// Slot of the chunk descriptor in the chunk-data buffer.
    chunk_data_index: AtomicU32,
}

impl ChunkMesh {
    pub fn new(pos: ChunkPos) -> Arc<Self> {
        Self::with_chunk(Chunk::empty(pos))
    }

    pub fn with_chunk(chunk: Chunk) -> Arc<Self> {
        let pos = chunk.pos;
        let generated = chunk.is_generated();
        Arc::new(Self {
            pos,
            state: Mutex::new(MeshState::new(chunk)),
            visibility_mask: AtomicU8::new(0xFF),
            generated: AtomicBool::new(generated),
            revision: AtomicU64::new(0),
            face_counts: Default::default(),
            face_starts: Default::default(),
            chunk_data_index: AtomicU32::new(0),
        })
    }

    #[inline]
    pub fn pos(&self) -> ChunkPos {
        self.pos
    }

    pub fn lock(&self) -> MutexGuard<'_, MeshState> {
        match self.state.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn try_lock(&self) -> Option<MutexGuard<'_, MeshState>> {
        match self.state.try_lock() {
            Ok(g) => Some(g),
            Err(TryLockError::Poisoned(p)) => Some(p.into_inner()),
            Err(TryLockError::WouldBlock) => None,
        }
    }

    #[inline]
    pub fn visibility_mask(&self) -> u8 {
        self.visibility_mask.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn clear_octant(&self, octant: u8) {
        self.visibility_mask
            .fetch_and(!(1u8 << octant), Ordering::Relaxed);
    }

    #[inline]
    pub fn set_octant(&self, octant: u8) {
        self.visibility_mask
            .fetch_or(1u8 << octant, Ordering::Relaxed);
    }

    #[inline]
    pub fn is_generated(&self) -> bool {
        self.generated.load(Ordering::Acquire)
    }

    #[inline]
    pub fn mark_generated(&self) {
        self.generated.store(true, Ordering::Release);
    }

    #[inline]
    pub fn revision(&self) -> u64 {
        self.revision.load(Ordering::Acquire)
    }

    #[inline]
    pub fn bump_revision(&self) {
        self.revision.fetch_add(1, Ordering::AcqRel);
    }

    #[inline]
    pub fn face_count(&self, kind: usize) -> u32 {
        self.face_counts[kind].load(Ordering::Acquire)
    }

    #[inline]
    pub(crate) fn set_face_count(&self, kind: usize, count: u32) {
        self.face_counts[kind].store(count, Ordering::Release);
    }

    #[inline]
    pub fn face_start(&self, kind: usize) -> u32 {
        self.face_starts[kind].load(Ordering::Acquire)
    }

    #[inline]
    pub(crate) fn set_face_start(&self, kind: usize, start: u32) {
        self.face_starts[kind].store(start, Ordering::Release);
    }

    #[inline]
    pub fn chunk_data_index(&self) -> u32 {
        self.chunk_data_index.load(Ordering::Acquire)
    }

    #[inline]
    pub(crate) fn set_chunk_data_index(&self, slot: u32) {
        self.chunk_data_index.store(slot, Ordering::Release);
    }

    /// Shrinks the drawn transparent run to the sorted prefix; the suffix
    /// bytes stay in the buffer but are skipped by the draw call.
    pub fn set_transparent_drawn(&self, count: u32) {
        self.face_counts[2].store(count, Ordering::Release);
    }

    /// Total uploaded faces across the three primitives.
    pub fn total_faces(&self) -> u32 {
        (0..3).map(|k| self.face_count(k)).sum()
    }

    /// Draw gate: something uploaded and at least one octant visible.
    pub fn is_drawable(&self) -> bool {
        self.visibility_mask() != 0 && self.total_faces() != 0
    }
}

/// The three process-wide slabs every mesh uploads through, plus the shared
/// zero light cube at slot 0.
pub struct MeshBuffers {
    pub faces: SlabBuffer<FaceData>,
    pub chunk_data: SlabBuffer<ChunkDescriptor>,
    pub light: SlabBuffer<LightCube>,
    zero_light: SlabAllocation,
}

impl MeshBuffers {
    pub fn new(device: &mut dyn GpuDevice) -> Self {
        let faces = SlabBuffer::new(
            device,
            "face",
            bindings::FACE_BUFFER_BINDING,
            FACE_BUFFER_CAPACITY,
            FACE_BUFFER_CAPACITY << 4,
        );
        let chunk_data = SlabBuffer::new(
            device,
            "chunk-data",
            bindings::CHUNK_DATA_BINDING,
            CHUNK_DATA_CAPACITY,
            CHUNK_DATA_CAPACITY << 4,
        );
        let mut light = SlabBuffer::new(
            device,
            "light",
            bindings::LIGHT_BUFFER_BINDING,
            LIGHT_BUFFER_CAPACITY,
            LIGHT_BUFFER_CAPACITY << 4,
        );
        // Slot 0 stays a zero-filled cube forever so that lightmap pointer 0
        // reads as darkness.
        let mut zero_light = SlabAllocation::NONE;
        let uploaded = light.upload(device, &[[0u32; 512]], &mut zero_light);
        assert!(uploaded && zero_light.start == 0);
        Self {
            faces,
            chunk_data,
            light,
            zero_light,
        }
    }

    #[inline]
    pub fn zero_light_slot(&self) -> u32 {
        self.zero_light.start
    }

    pub fn begin_render(&mut self, device: &mut dyn GpuDevice) {
        self.faces.begin_render(device);
        self.chunk_data.begin_render(device);
        self.light.begin_render(device);
    }

    pub fn end_render(&mut self) {
        self.faces.end_render();
        self.chunk_data.end_render();
        self.light.end_render();
    }

    /// Returns every GPU slot a mesh holds; called when a node is destroyed.
    pub fn release(&mut self, state: &mut MeshState) {
        for pm in &mut state.primitives {
            self.faces.free(&mut pm.alloc);
        }
        for slot in &mut state.lightmap {
            self.light.free(slot);
        }
        self.chunk_data.free(&mut state.descriptor);
    }
}

/// Direction-dependent (u, v) plane axes for boundary walks: X faces use
/// (y, z), Y faces (x, z), Z faces (x, y).
pub(crate) fn boundary_cell(dir: Face, u: i32, v: i32, layer: i32) -> (i32, i32, i32) {
    match dir.axis() {
        0 => (layer, u, v),
        1 => (u, layer, v),
        _ => (u, v, layer),
    }
}
