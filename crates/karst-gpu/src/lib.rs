//! GPU storage plumbing: opaque device handles and slab-allocated buffers.
#![forbid(unsafe_code)]

mod device;
mod slab;

pub mod bindings {
    //! Stable shader-storage binding indices shared with the chunk shaders.
    pub const ANIMATION_TIME_BINDING: u32 = 0;
    pub const ANIMATION_FRAME_BINDING: u32 = 1;
    pub const FACE_BUFFER_BINDING: u32 = 3;
    pub const MATERIAL_BUFFER_BINDING: u32 = 5;
    pub const PALETTE_BUFFER_BINDING: u32 = 6;
    pub const CHUNK_DATA_BINDING: u32 = 7;
    pub const LIGHT_BUFFER_BINDING: u32 = 8;
}

pub use device::{BufferHandle, GpuDevice, HeadlessDevice};
pub use slab::{SlabAllocation, SlabBuffer};

use bytemuck::{Pod, Zeroable};

/// One compressed 8x8x8 light cube: a packed 32-bit word per light voxel.
pub type LightCube = [u32; 512];

/// Cells per axis of a mesh's lightmap pointer grid.
pub const LIGHTMAP_GRID: usize = 6;
/// Slots in one mesh's lightmap pointer grid.
pub const LIGHTMAP_SLOTS: usize = LIGHTMAP_GRID * LIGHTMAP_GRID * LIGHTMAP_GRID;

/// Per-chunk record in the chunk-data buffer; the fragment shader resolves a
/// face's light cube through the pointer grid. Slot value 0 is the shared
/// all-zero cube.
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct ChunkDescriptor {
    pub lightmap: [u32; LIGHTMAP_SLOTS],
}

impl ChunkDescriptor {
    pub const fn empty() -> Self {
        Self {
            lightmap: [0; LIGHTMAP_SLOTS],
        }
    }
}

/// Default element capacities for the three engine slabs.
pub const FACE_BUFFER_CAPACITY: u32 = 1 << 20;
pub const CHUNK_DATA_CAPACITY: u32 = 1 << 10;
pub const LIGHT_BUFFER_CAPACITY: u32 = 1 << 10;
