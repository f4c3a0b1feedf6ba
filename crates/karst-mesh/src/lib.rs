//! CPU mesher: per-face primitives, seam stitching, light cubes, edit diffs.
#![forbid(unsafe_code)]

mod face;
mod finish;
mod light;
mod mesh;
mod mesher;
mod primitive;
mod stitch;
mod update;

pub use face::{Face, FaceData, FACES};
pub use finish::finish;
pub use light::{pack_light, LightResolver, LIGHT_CELL, LIGHT_HALO};
pub use mesh::{
    BorderRect, ChunkMesh, MeshBuffers, MeshLookup, MeshState, NeighborStamp, StitchError,
};
pub use mesher::{can_be_seen_through, regenerate_main_mesh};
pub use primitive::{PrimitiveKind, PrimitiveMesh, PRIMITIVE_KINDS};
pub use stitch::{stitch_coarse, stitch_pair, upload_data_and_finish_neighbors};
pub use update::update_block;
