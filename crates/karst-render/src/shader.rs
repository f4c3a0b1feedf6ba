use karst_geom::{Mat4, Vec3};

/// Uniform names shared by the chunk shaders; kept in one place so the real
/// driver wrapper and this crate agree on spelling.
pub mod uniforms {
    pub const PROJECTION_MATRIX: &str = "projectionMatrix";
    pub const VIEW_MATRIX: &str = "viewMatrix";
    pub const MODEL_POSITION: &str = "modelPosition";
    pub const AMBIENT_LIGHT: &str = "ambientLight";
    pub const FOG_COLOR: &str = "fog.color";
    pub const FOG_DENSITY: &str = "fog.density";
    pub const TEXTURE_SAMPLER: &str = "texture_sampler";
    pub const EMISSION_SAMPLER: &str = "emissionSampler";
    pub const REFLECTION_MAP: &str = "reflectionMap";
    pub const REFLECTION_MAP_SIZE: &str = "reflectionMapSize";
    pub const VISIBILITY_MASK: &str = "visibilityMask";
    pub const VOXEL_SIZE: &str = "voxelSize";
    pub const Z_NEAR: &str = "zNear";
    pub const Z_FAR: &str = "zFar";
    pub const CHUNK_DATA_INDEX: &str = "chunkDataIndex";
}

/// Opaque handle onto one compiled chunk shader. The GPU collaborator
/// implements these verbs; the renderer only sequences them.
pub trait ChunkShader {
    fn bind(&mut self);
    fn set_mat4(&mut self, name: &str, value: &Mat4);
    fn set_vec3(&mut self, name: &str, value: Vec3);
    fn set_f32(&mut self, name: &str, value: f32);
    fn set_i32(&mut self, name: &str, value: i32);
    /// `DrawElementsBaseVertex` over the shared quad index stream: six
    /// indices per face, four generated vertices per face record.
    fn draw_elements_base_vertex(&mut self, index_count: u32, base_vertex: u32);
}

/// Framebuffer-level verbs: the multi-render-target geometry buffer, the
/// deferred composition resolve, the bloom chain, and line overlays.
pub trait FrameTargets {
    /// Binds the RGB10A2 + RGBA32I geometry targets for the chunk passes.
    fn begin_geometry(&mut self);
    /// Resolves per-fragment block colors from the integer target.
    fn run_composition(&mut self);
    fn downscale(&mut self);
    fn blur_pass(&mut self, horizontal: bool);
    fn composite_bloom(&mut self);
    fn draw_overlay_lines(&mut self, segments: &[[Vec3; 2]]);
}

/// Do-nothing targets for headless runs.
#[derive(Default)]
pub struct HeadlessTargets {
    pub overlay_segments: usize,
}

impl FrameTargets for HeadlessTargets {
    fn begin_geometry(&mut self) {}
    fn run_composition(&mut self) {}
    fn downscale(&mut self) {}
    fn blur_pass(&mut self, _horizontal: bool) {}
    fn composite_bloom(&mut self) {}
    fn draw_overlay_lines(&mut self, segments: &[[Vec3; 2]]) {
        self.overlay_segments += segments.len();
    }
}

/// Shader stub that records draw calls; test suites assert against it.
#[derive(Default)]
pub struct RecordingShader {
    pub binds: usize,
    pub draws: Vec<(u32, u32)>,
}

impl ChunkShader for RecordingShader {
    fn bind(&mut self) {
        self.binds += 1;
    }
    fn set_mat4(&mut self, _name: &str, _value: &Mat4) {}
    fn set_vec3(&mut self, _name: &str, _value: Vec3) {}
    fn set_f32(&mut self, _name: &str, _value: f32) {}
    fn set_i32(&mut self, _name: &str, _value: i32) {}
    fn draw_elements_base_vertex(&mut self, index_count: u32, base_vertex: u32) {
        self.draws.push((index_count, base_vertex));
    }
}
