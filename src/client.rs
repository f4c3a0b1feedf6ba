use std::sync::Arc;
use std::time::{Duration, Instant};

use karst_blocks::BlockRegistry;
use karst_gpu::GpuDevice;
use karst_lod::{ChunkPayload, ChunkMeshNode, ChunkSource, LodWindow, QueuedBlockUpdate, Runtime};
use karst_mesh::MeshBuffers;
use karst_render::{Camera, Frustum, Renderer};

use super::config::RenderConfig;

/// Wall-clock slice each frame may spend finalizing and stitching meshes.
/// Everything else waits for the next frame; this is what keeps chunk churn
/// from eating the frame budget.
const MESH_UPLOAD_BUDGET: Duration = Duration::from_millis(4);

/// The client core: owns the LOD window, the worker runtime, the GPU slabs,
/// and the renderer, and drives them once per frame from the render thread.
pub struct Client {
    pub window: Arc<LodWindow>,
    pub runtime: Runtime,
    pub renderer: Renderer,
    pub bufs: MeshBuffers,
    config: RenderConfig,
    nodes: Vec<Arc<ChunkMeshNode>>,
}

impl Client {
    pub fn new(
        registry: Arc<BlockRegistry>,
        source: Arc<dyn ChunkSource>,
        renderer: Renderer,
        config: RenderConfig,
        device: &mut dyn GpuDevice,
    ) -> Self {
        let config = config.validated();
        let window = Arc::new(LodWindow::new(registry, source, config.highest_lod));
        let runtime = Runtime::new(window.clone());
        let bufs = MeshBuffers::new(device);
        let mut renderer = renderer;
        renderer.bloom = config.bloom;
        Self {
            window,
            runtime,
            renderer,
            bufs,
            config,
            nodes: Vec::new(),
        }
    }

    #[inline]
    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    /// Queues a world edit; it lands at the start of the next frame.
    pub fn queue_block_update(&self, update: QueuedBlockUpdate) {
        self.window.queue_block_update(update);
    }

    /// Entry point for the network collaborator's chunk payloads.
    pub fn submit_payload(&self, payload: ChunkPayload) {
        self.runtime.submit_payload(payload);
    }

    /// One frame: window update under the camera frustum, queued edits and
    /// budgeted mesh uploads, then the render passes.
    pub fn frame(&mut self, device: &mut dyn GpuDevice, camera: &Camera, ambient: [f32; 3]) {
        let frustum = Frustum::new(
            camera.position,
            camera.forward,
            camera.up,
            camera.fov_y,
            camera.aspect,
            camera.z_far,
        );
        self.nodes.clear();
        self.window.update_and_get_render_chunks(
            camera.position,
            self.config.render_distance,
            self.config.lod_factor,
            &frustum,
            &mut self.bufs,
            &mut self.nodes,
        );

        self.window.update_meshes(
            Instant::now() + MESH_UPLOAD_BUDGET,
            camera.position,
            &mut self.bufs,
            device,
        );

        self.renderer.render_frame(
            &mut self.nodes,
            &self.window,
            &mut self.bufs,
            device,
            camera,
            ambient,
        );
    }
}
