//! Chunk storage: dense voxel grids, chunk-position identity, downsampling.
#![forbid(unsafe_code)]

mod downsample;
mod grid;
mod pos;

pub use grid::{Chunk, LIGHT_CHANNELS};
pub use pos::{ChunkPos, CHUNK_SHIFT, CHUNK_SIZE, CHUNK_VOLUME};
