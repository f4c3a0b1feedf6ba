//! Render loop: frustum culling, chunk passes, transparent sorting, overlays.
#![forbid(unsafe_code)]

mod frustum;
mod raycast;
mod renderer;
mod shader;
mod sorter;

pub use frustum::Frustum;
pub use raycast::{raycast_first_hit, selection_edges, RayHit, SELECTION_RANGE};
pub use renderer::{Camera, FogSettings, Renderer};
pub use shader::{uniforms, ChunkShader, FrameTargets, HeadlessTargets, RecordingShader};
pub use sorter::sort_transparent;
