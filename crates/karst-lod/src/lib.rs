//! LOD window manager: the resident set of chunks around the player.
#![forbid(unsafe_code)]

mod node;
mod runtime;
mod source;
mod window;

pub use node::ChunkMeshNode;
pub use runtime::{ChunkPayload, Runtime};
pub use source::{ChunkSource, NullChunkSource};
pub use window::{Culling, LodWindow, NoCull, QueuedBlockUpdate};
