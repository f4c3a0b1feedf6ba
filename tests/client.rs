use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use karst::{
    Block, BlockRegistry, Camera, Chunk, ChunkPayload, ChunkPos, ChunkSource, Client, FogSettings,
    HeadlessDevice, RenderConfig, Renderer,
};
use karst_chunk::CHUNK_VOLUME;
use karst_geom::{Mat4, Vec3};
use karst_render::{ChunkShader, HeadlessTargets};

/// Shader stub whose draw count survives being boxed into the renderer.
#[derive(Clone, Default)]
struct CountingShader {
    draws: Arc<AtomicUsize>,
}

impl ChunkShader for CountingShader {
    fn bind(&mut self) {}
    fn set_mat4(&mut self, _: &str, _: &Mat4) {}
    fn set_vec3(&mut self, _: &str, _: Vec3) {}
    fn set_f32(&mut self, _: &str, _: f32) {}
    fn set_i32(&mut self, _: &str, _: i32) {}
    fn draw_elements_base_vertex(&mut self, _index_count: u32, _base_vertex: u32) {
        self.draws.fetch_add(1, Ordering::Relaxed);
    }
}

/// Records what the window asked for so the test can answer it.
#[derive(Default)]
struct RecordingSource {
    requested: Mutex<Vec<ChunkPos>>,
}

impl ChunkSource for RecordingSource {
    fn request_chunks(&self, positions: &[ChunkPos]) {
        self.requested.lock().unwrap().extend_from_slice(positions);
    }
}

fn registry() -> Arc<BlockRegistry> {
    Arc::new(
        BlockRegistry::from_toml_str(
            r#"
            [[blocks]]
            name = "stone"
            "#,
        )
        .unwrap(),
    )
}

fn camera() -> Camera {
    Camera {
        position: Vec3::new(16.0, 16.0, 16.0),
        forward: Vec3::new(0.0, 0.0, -1.0),
        up: Vec3::UP,
        fov_y: 1.2,
        aspect: 16.0 / 9.0,
        z_near: 0.1,
        z_far: 2000.0,
    }
}

#[test]
fn requested_chunks_get_meshed_and_drawn() {
    let reg = registry();
    let source = Arc::new(RecordingSource::default());
    let draws = Arc::new(AtomicUsize::new(0));
    let shader = CountingShader { draws: draws.clone() };
    let renderer = Renderer {
        opaque: Box::new(shader.clone()),
        voxel: Box::new(shader.clone()),
        transparent: Box::new(shader),
        targets: Box::<HeadlessTargets>::default(),
        fog: FogSettings {
            color: [0.6, 0.7, 0.9],
            density: 0.002,
        },
        bloom: false,
    };
    let mut dev = HeadlessDevice::new();
    let config = RenderConfig::from_toml_str("render_distance = 1\nhighest_lod = 0").unwrap();
    let mut client = Client::new(reg.clone(), source.clone(), renderer, config, &mut dev);

    let cam = camera();
    client.frame(&mut dev, &cam, [1.0, 1.0, 1.0]);
    let requested: Vec<ChunkPos> = source.requested.lock().unwrap().clone();
    assert!(requested.contains(&ChunkPos::new(0, 0, 0, 1)));

    // Answer the request for the player's own chunk with one stone block.
    let stone = Block::new(reg.id_by_name("stone").unwrap(), 0);
    let mut blocks = vec![0u32; CHUNK_VOLUME];
    blocks[Chunk::idx(16, 8, 16)] = stone.to_word();
    client.submit_payload(ChunkPayload {
        pos: ChunkPos::new(0, 0, 0, 1),
        blocks,
        light: None,
    });

    let node = client.window.node_at(ChunkPos::new(0, 0, 0, 1)).unwrap();
    let started = Instant::now();
    while !node.mesh.is_generated() && started.elapsed() < Duration::from_secs(5) {
        thread::sleep(Duration::from_millis(2));
    }
    assert!(node.mesh.is_generated());

    // A few frames later the mesh is finalized and draw calls flow.
    for _ in 0..3 {
        client.frame(&mut dev, &cam, [1.0, 1.0, 1.0]);
    }
    assert_eq!(node.mesh.face_count(0), 6);
    assert!(draws.load(Ordering::Relaxed) > 0);
}
