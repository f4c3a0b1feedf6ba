use criterion::{black_box, criterion_group, criterion_main, Criterion};
use karst_blocks::{Block, BlockRegistry};
use karst_chunk::{Chunk, ChunkPos, CHUNK_SIZE};
use karst_mesh::{regenerate_main_mesh, BorderRect, MeshState};

fn registry() -> BlockRegistry {
    BlockRegistry::from_toml_str(
        r#"
        [[blocks]]
        name = "stone"

        [[blocks]]
        name = "water"
        solid = false
        transparent = true
        view_through = true
        back_face = true
        "#,
    )
    .unwrap()
}

/// Rolling-hills fill: solid below a sine surface, a water band above it.
fn terrain_chunk(reg: &BlockRegistry) -> Chunk {
    let stone = Block::new(reg.id_by_name("stone").unwrap(), 0);
    let water = Block::new(reg.id_by_name("water").unwrap(), 0);
    let mut chunk = Chunk::empty(ChunkPos::new(0, 0, 0, 1));
    for x in 0..CHUNK_SIZE {
        for z in 0..CHUNK_SIZE {
            let h = 12.0
                + 6.0 * (x as f32 * 0.37).sin()
                + 4.0 * (z as f32 * 0.23).cos();
            let h = h as i32;
            for y in 0..CHUNK_SIZE {
                if y < h {
                    chunk.set(x, y, z, stone);
                } else if y < 14 {
                    chunk.set(x, y, z, water);
                }
            }
        }
    }
    chunk.mark_generated();
    chunk
}

fn bench_remesh(c: &mut Criterion) {
    let reg = registry();
    let chunk = terrain_chunk(&reg);
    c.bench_function("regenerate_main_mesh/terrain", |b| {
        b.iter(|| {
            let mut state = MeshState {
                chunk: chunk.clone(),
                primitives: Default::default(),
                border: [BorderRect::EMPTY; 6],
                last_neighbor: [None; 6],
                lightmap: vec![karst_gpu::SlabAllocation::NONE; karst_gpu::LIGHTMAP_SLOTS],
                descriptor: karst_gpu::SlabAllocation::NONE,
            };
            regenerate_main_mesh(&mut state, &reg);
            black_box(state.primitives[0].core.len())
        })
    });
}

criterion_group!(benches, bench_remesh);
criterion_main!(benches);
