//! Client glue: configuration and the per-frame driver tying the LOD window,
//! mesh upload budget, and render passes together.
#![forbid(unsafe_code)]

mod client;
mod config;

pub use client::Client;
pub use config::RenderConfig;

pub use karst_blocks::{Block, BlockRegistry};
pub use karst_chunk::{Chunk, ChunkPos};
pub use karst_gpu::{GpuDevice, HeadlessDevice};
pub use karst_lod::{ChunkPayload, ChunkSource, LodWindow, QueuedBlockUpdate, Runtime};
pub use karst_mesh::MeshBuffers;
pub use karst_render::{Camera, FogSettings, Frustum, Renderer};
