use std::sync::Arc;

use karst_chunk::ChunkPos;
use karst_geom::{Mat4, Vec3};
use karst_gpu::GpuDevice;
use karst_lod::{ChunkMeshNode, LodWindow};
use karst_mesh::{MeshBuffers, PrimitiveKind};

use super::raycast::{raycast_first_hit, selection_edges, SELECTION_RANGE};
use super::shader::{uniforms, ChunkShader, FrameTargets};
use super::sorter::sort_transparent;

#[derive(Clone, Copy, Debug)]
pub struct FogSettings {
    pub color: [f32; 3],
    pub density: f32,
}

#[derive(Clone, Copy, Debug)]
pub struct Camera {
    pub position: Vec3,
    pub forward: Vec3,
    pub up: Vec3,
    /// Vertical field of view in radians.
    pub fov_y: f32,
    pub aspect: f32,
    pub z_near: f32,
    pub z_far: f32,
}

impl Camera {
    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at(self.position, self.position + self.forward, self.up)
    }

    pub fn projection_matrix(&self) -> Mat4 {
        Mat4::perspective(self.fov_y, self.aspect, self.z_near, self.z_far)
    }
}

/// Chunk origin relative to the player, subtracted in integer space before
/// the f32 cast so distant chunks keep sub-voxel precision.
fn model_position(pos: ChunkPos, player: Vec3) -> Vec3 {
    let ix = player.x.floor();
    let iy = player.y.floor();
    let iz = player.z.floor();
    Vec3::new(
        (pos.wx - ix as i32) as f32 - (player.x - ix),
        (pos.wy - iy as i32) as f32 - (player.y - iy),
        (pos.wz - iz as i32) as f32 - (player.z - iz),
    )
}

/// Walks the frame's visible meshes through the opaque, voxel-model, and
/// transparent passes, plus composition, block selection, and bloom. All GPU
/// work goes through the opaque shader and target handles.
pub struct Renderer {
    pub opaque: Box<dyn ChunkShader>,
    pub voxel: Box<dyn ChunkShader>,
    pub transparent: Box<dyn ChunkShader>,
    pub targets: Box<dyn FrameTargets>,
    pub fog: FogSettings,
    pub bloom: bool,
}

impl Renderer {
    /// Draws one frame over the node list the window produced. The list is
    /// sorted in place, near to far; under typical movement it is already
    /// almost ordered, which is what the insertion sort is counting on.
    pub fn render_frame(
        &mut self,
        nodes: &mut Vec<Arc<ChunkMeshNode>>,
        window: &LodWindow,
        bufs: &mut MeshBuffers,
        device: &mut dyn GpuDevice,
        camera: &Camera,
        ambient: [f32; 3],
    ) {
        let player = camera.position;
        insertion_sort_by_distance(nodes, player);

        let view = camera.view_matrix();
        let proj = camera.projection_matrix();

        self.targets.begin_geometry();
        bufs.begin_render(device);

        Self::chunk_pass(
            &mut self.opaque,
            PrimitiveKind::Opaque,
            nodes,
            player,
            &view,
            &proj,
            ambient,
            self.fog,
            camera,
        );
        Self::chunk_pass(
            &mut self.voxel,
            PrimitiveKind::Voxel,
            nodes,
            player,
            &view,
            &proj,
            ambient,
            self.fog,
            camera,
        );

        self.targets.run_composition();

        self.sort_transparent_meshes(nodes, player, bufs, device);
        Self::chunk_pass(
            &mut self.transparent,
            PrimitiveKind::Transparent,
            nodes,
            player,
            &view,
            &proj,
            ambient,
            self.fog,
            camera,
        );

        self.draw_selection(window, camera);

        if self.bloom {
            self.targets.downscale();
            self.targets.blur_pass(true);
            self.targets.blur_pass(false);
            self.targets.composite_bloom();
        }

        bufs.end_render();
    }

    #[allow(clippy::too_many_arguments)]
    fn chunk_pass(
        shader: &mut Box<dyn ChunkShader>,
        kind: PrimitiveKind,
        nodes: &[Arc<ChunkMeshNode>],
        player: Vec3,
        view: &Mat4,
        proj: &Mat4,
        ambient: [f32; 3],
        fog: FogSettings,
        camera: &Camera,
    ) {
        shader.bind();
        shader.set_mat4(uniforms::PROJECTION_MATRIX, proj);
        shader.set_mat4(uniforms::VIEW_MATRIX, view);
        shader.set_vec3(
            uniforms::AMBIENT_LIGHT,
            Vec3::new(ambient[0], ambient[1], ambient[2]),
        );
        shader.set_vec3(
            uniforms::FOG_COLOR,
            Vec3::new(fog.color[0], fog.color[1], fog.color[2]),
        );
        shader.set_f32(uniforms::FOG_DENSITY, fog.density);
        shader.set_i32(uniforms::TEXTURE_SAMPLER, 0);
        shader.set_i32(uniforms::EMISSION_SAMPLER, 1);
        shader.set_i32(uniforms::REFLECTION_MAP, 2);
        shader.set_f32(uniforms::Z_NEAR, camera.z_near);
        shader.set_f32(uniforms::Z_FAR, camera.z_far);

        let k = kind.index();
        for node in nodes {
            let mesh = &node.mesh;
            let count = mesh.face_count(k);
            let mask = mesh.visibility_mask();
            if count == 0 || mask == 0 {
                continue;
            }
            shader.set_vec3(uniforms::MODEL_POSITION, model_position(mesh.pos(), player));
            shader.set_i32(uniforms::VISIBILITY_MASK, i32::from(mask));
            shader.set_i32(uniforms::VOXEL_SIZE, mesh.pos().voxel_size);
            shader.set_i32(uniforms::CHUNK_DATA_INDEX, mesh.chunk_data_index() as i32);
            // Six indices per face; four generated vertices per face record.
            shader.draw_elements_base_vertex(count * 6, mesh.face_start(k) * 4);
        }
    }

    /// Re-sorts each mesh's transparent run when its list changed or the
    /// player crossed a cell boundary since the last sort. Sub-cell motion
    /// never triggers a sort.
    fn sort_transparent_meshes(
        &mut self,
        nodes: &[Arc<ChunkMeshNode>],
        player: Vec3,
        bufs: &mut MeshBuffers,
        device: &mut dyn GpuDevice,
    ) {
        for node in nodes {
            let mesh = &node.mesh;
            if mesh.face_count(PrimitiveKind::Transparent.index()) == 0 {
                continue;
            }
            let pos = mesh.pos();
            let vs = pos.voxel_size as f32;
            let cell = [
                ((player.x - pos.wx as f32) / vs).floor() as i32,
                ((player.y - pos.wy as f32) / vs).floor() as i32,
                ((player.z - pos.wz as f32) / vs).floor() as i32,
            ];
            let Some(mut state) = mesh.try_lock() else {
                continue;
            };
            let pm = &mut state.primitives[PrimitiveKind::Transparent.index()];
            if !pm.alloc.is_allocated() || pm.last_sort_cell == Some(cell) {
                continue;
            }
            let prefix = sort_transparent(&pm.complete, cell);
            bufs.faces.write_prefix(device, pm.alloc, &prefix);
            pm.last_sort_cell = Some(cell);
            mesh.set_transparent_drawn(prefix.len() as u32);
        }
    }

    fn draw_selection(&mut self, window: &LodWindow, camera: &Camera) {
        let reg = window.registry().clone();
        let hit = raycast_first_hit(
            camera.position,
            camera.forward,
            SELECTION_RANGE,
            &reg,
            |x, y, z| window.get_block(x, y, z),
        );
        if let Some(hit) = hit {
            self.targets
                .draw_overlay_lines(&selection_edges(hit.bx, hit.by, hit.bz));
        }
    }
}

fn insertion_sort_by_distance(nodes: &mut [Arc<ChunkMeshNode>], player: Vec3) {
    for i in 1..nodes.len() {
        let mut j = i;
        while j > 0
            && nodes[j].pos().center_distance_sq(player)
                < nodes[j - 1].pos().center_distance_sq(player)
        {
            nodes.swap(j - 1, j);
            j -= 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_position_keeps_fractional_precision() {
        let pos = ChunkPos::new(1 << 20, 0, -(1 << 20), 1);
        let player = Vec3::new((1 << 20) as f32 + 10.25, 5.5, -((1 << 20) as f32) - 3.75);
        let mp = model_position(pos, player);
        assert!((mp.x - (-10.25)).abs() < 1e-4);
        assert!((mp.y - (-5.5)).abs() < 1e-4);
        assert!((mp.z - 3.75).abs() < 1e-4);
    }

    #[test]
    fn insertion_sort_orders_near_to_far() {
        let player = Vec3::ZERO;
        let mk = |x: i32| {
            let node = karst_lod::ChunkMeshNode::new(ChunkPos::new(x, 0, 0, 1));
            node
        };
        let mut nodes = vec![mk(320), mk(0), mk(-640), mk(32)];
        insertion_sort_by_distance(&mut nodes, player);
        let xs: Vec<i32> = nodes.iter().map(|n| n.pos().wx).collect();
        assert_eq!(xs, vec![0, 32, 320, -640]);
    }
}
