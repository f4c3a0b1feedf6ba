use karst_gpu::{ChunkDescriptor, GpuDevice, LIGHTMAP_GRID, LIGHTMAP_SLOTS};

use super::light::{pack_light, LightResolver, LIGHT_CELL, LIGHT_HALO};
use super::mesh::{ChunkMesh, MeshBuffers, MeshLookup, MeshState};

#[inline]
fn grid_slot(gx: i32, gy: i32, gz: i32) -> usize {
    ((gx as usize * LIGHTMAP_GRID) + gy as usize) * LIGHTMAP_GRID + gz as usize
}

#[inline]
fn grid_cell_of(c: i32) -> i32 {
    (c + LIGHT_HALO).div_euclid(LIGHT_CELL)
}

/// Finalizes a mesh: concatenates each primitive's core and seam lists into
/// its upload buffer, pushes the face records through the slab, synthesizes
/// the compressed light cubes the faces touch, and rewrites the chunk
/// descriptor. Setting the face counts at the end is what makes the mesh
/// drawable.
pub fn finish(
    mesh: &ChunkMesh,
    state: &mut MeshState,
    bufs: &mut MeshBuffers,
    device: &mut dyn GpuDevice,
    lookup: &dyn MeshLookup,
) {
    let mut flagged = [false; LIGHTMAP_SLOTS];

    for k in 0..3 {
        let pm = &mut state.primitives[k];
        if pm.was_changed {
            pm.build_complete();
            if bufs.faces.upload(device, &pm.complete, &mut pm.alloc) {
                mesh.set_face_start(k, pm.alloc.start);
                mesh.set_face_count(k, pm.complete.len() as u32);
                pm.was_changed = false;
                pm.last_sort_cell = None;
            }
            // On slab exhaustion the old upload (and count) stays in place.
        }
        for f in &pm.complete {
            let (cx, cy, cz) = f.exposed_cell();
            let (gx, gy, gz) = (grid_cell_of(cx), grid_cell_of(cy), grid_cell_of(cz));
            for dx in -1..=1 {
                for dy in -1..=1 {
                    for dz in -1..=1 {
                        let (fx, fy, fz) = (gx + dx, gy + dy, gz + dz);
                        let max = LIGHTMAP_GRID as i32;
                        if (0..max).contains(&fx) && (0..max).contains(&fy) && (0..max).contains(&fz)
                        {
                            flagged[grid_slot(fx, fy, fz)] = true;
                        }
                    }
                }
            }
        }
    }

    let mut resolver = LightResolver::new(mesh.pos(), lookup);
    for gx in 0..LIGHTMAP_GRID as i32 {
        for gy in 0..LIGHTMAP_GRID as i32 {
            for gz in 0..LIGHTMAP_GRID as i32 {
                let slot = grid_slot(gx, gy, gz);
                if !flagged[slot] {
                    // Nothing samples this region; point it back at the
                    // shared zero cube.
                    bufs.light.free(&mut state.lightmap[slot]);
                    continue;
                }
                let base = (
                    gx * LIGHT_CELL - LIGHT_HALO,
                    gy * LIGHT_CELL - LIGHT_HALO,
                    gz * LIGHT_CELL - LIGHT_HALO,
                );
                let mut cube = [0u32; 512];
                for lx in 0..LIGHT_CELL {
                    for ly in 0..LIGHT_CELL {
                        for lz in 0..LIGHT_CELL {
                            let channels = resolver.sample(
                                &state.chunk,
                                base.0 + lx,
                                base.1 + ly,
                                base.2 + lz,
                            );
                            cube[((lx << 6) | (ly << 3) | lz) as usize] = pack_light(channels);
                        }
                    }
                }
                bufs.light.upload(device, &[cube], &mut state.lightmap[slot]);
            }
        }
    }

    let mut desc = ChunkDescriptor::empty();
    for (i, slot) in state.lightmap.iter().enumerate() {
        desc.lightmap[i] = if slot.is_allocated() {
            slot.start
        } else {
            bufs.zero_light_slot()
        };
    }
    if bufs.chunk_data.upload(device, &[desc], &mut state.descriptor) {
        mesh.set_chunk_data_index(state.descriptor.start);
    }

    state.chunk.mark_cleaned();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::face::{Face, FaceData};
    use crate::mesher::regenerate_main_mesh;
    use crate::primitive::PrimitiveKind;
    use karst_blocks::{Block, BlockRegistry};
    use karst_chunk::{Chunk, ChunkPos};
    use karst_gpu::{HeadlessDevice, SlabAllocation};

    struct NoNeighbors;
    impl MeshLookup for NoNeighbors {
        fn mesh_at(&self, _pos: ChunkPos) -> Option<std::sync::Arc<ChunkMesh>> {
            None
        }
    }

    fn registry() -> BlockRegistry {
        BlockRegistry::from_toml_str(
            r#"
            [[blocks]]
            name = "stone"
            "#,
        )
        .unwrap()
    }

    #[test]
    fn grid_cells_cover_the_halo() {
        assert_eq!(grid_cell_of(-8), 0);
        assert_eq!(grid_cell_of(-1), 0);
        assert_eq!(grid_cell_of(0), 1);
        assert_eq!(grid_cell_of(31), 4);
        assert_eq!(grid_cell_of(32), 5);
        assert_eq!(grid_cell_of(39), 5);
    }

    #[test]
    fn finish_uploads_faces_and_descriptor() {
        let reg = registry();
        let mut dev = HeadlessDevice::new();
        let mut bufs = MeshBuffers::new(&mut dev);
        let mut chunk = Chunk::empty(ChunkPos::new(0, 0, 0, 1));
        chunk.mark_generated();
        chunk.set(16, 16, 16, Block::new(reg.id_by_name("stone").unwrap(), 0));
        let mesh = ChunkMesh::with_chunk(chunk);
        let mut state = mesh.try_lock().unwrap();
        regenerate_main_mesh(&mut state, &reg);
        finish(&mesh, &mut state, &mut bufs, &mut dev, &NoNeighbors);

        assert_eq!(mesh.face_count(PrimitiveKind::Opaque.index()), 6);
        assert!(state.descriptor.is_allocated());
        assert!(state.primitives[0].alloc.is_allocated());
        assert!(mesh.is_drawable());
        // Light cells around the cube got their own slots; far corners kept
        // the zero pointer.
        assert!(state.lightmap[grid_slot(2, 2, 2)].is_allocated());
        assert!(!state.lightmap[grid_slot(0, 0, 0)].is_allocated());
        assert!(state.chunk.was_cleaned());
    }

    #[test]
    fn refinishing_after_clear_frees_the_lightmap() {
        let reg = registry();
        let mut dev = HeadlessDevice::new();
        let mut bufs = MeshBuffers::new(&mut dev);
        let mut chunk = Chunk::empty(ChunkPos::new(0, 0, 0, 1));
        chunk.mark_generated();
        chunk.set(16, 16, 16, Block::new(reg.id_by_name("stone").unwrap(), 0));
        let mesh = ChunkMesh::with_chunk(chunk);
        let mut state = mesh.try_lock().unwrap();
        regenerate_main_mesh(&mut state, &reg);
        finish(&mesh, &mut state, &mut bufs, &mut dev, &NoNeighbors);
        let used_after_first = bufs.light.used();
        assert!(used_after_first > 1);

        state.chunk.update_block(16, 16, 16, Block::AIR);
        regenerate_main_mesh(&mut state, &reg);
        finish(&mesh, &mut state, &mut bufs, &mut dev, &NoNeighbors);
        assert_eq!(mesh.face_count(PrimitiveKind::Opaque.index()), 0);
        // Only the reserved zero cube remains.
        assert_eq!(bufs.light.used(), 1);
        assert_eq!(
            state.lightmap,
            vec![SlabAllocation::NONE; karst_gpu::LIGHTMAP_SLOTS]
        );
    }

    #[test]
    fn seam_face_flags_the_halo_cells() {
        // A +X seam face at wrapped x=0 unwraps to 32 and must flag the
        // high-x halo column, not the low-x one.
        let f = FaceData::pack(32, 16, 16, false, Face::PosX, 0, 1, 0);
        let (cx, _, _) = f.exposed_cell();
        assert_eq!(grid_cell_of(cx), 5);
    }
}
