use std::sync::Arc;
use std::sync::MutexGuard;

use karst_blocks::{Block, BlockRegistry};
use karst_chunk::CHUNK_SIZE;

use super::face::{Face, FaceData, FACES};
use super::mesh::{ChunkMesh, MeshLookup, MeshState, StitchError};
use super::mesher::can_be_seen_through;
use super::primitive::{PrimitiveKind, PrimitiveMesh};

fn in_grid(x: i32, y: i32, z: i32) -> bool {
    (0..CHUNK_SIZE).contains(&x) && (0..CHUNK_SIZE).contains(&y) && (0..CHUNK_SIZE).contains(&z)
}

/// Adds or removes one block's face (and its transparent back face) in the
/// right list of `primitives`.
fn apply_face_change(
    primitives: &mut [PrimitiveMesh; 3],
    reg: &BlockRegistry,
    b: Block,
    dir: Face,
    ex: i32,
    ey: i32,
    ez: i32,
    seam: Option<Face>,
    add: bool,
) {
    let model = reg.model(b);
    let perm = model.permutation.bits();
    let kind = PrimitiveKind::classify(reg, b);
    let front = FaceData::pack(ex, ey, ez, false, dir, perm, b.id, model.index);
    let back = FaceData::pack(ex, ey, ez, true, dir.opposite(), perm, b.id, model.index);
    let has_back = reg.has_back_face(b.id);
    match (add, seam) {
        (true, Some(d)) => {
            primitives[kind.index()].push_neighbor(d, front);
            if has_back {
                primitives[PrimitiveKind::Transparent.index()].push_neighbor(d, back);
            }
        }
        (true, None) => {
            primitives[kind.index()].push_core(front);
            if has_back {
                primitives[PrimitiveKind::Transparent.index()].push_core(back);
            }
        }
        (false, Some(d)) => {
            primitives[kind.index()].remove_neighbor(d, front);
            if has_back {
                primitives[PrimitiveKind::Transparent.index()].remove_neighbor(d, back);
            }
        }
        (false, None) => {
            primitives[kind.index()].remove_core(front);
            if has_back {
                primitives[PrimitiveKind::Transparent.index()].remove_core(back);
            }
        }
    }
}

/// Precise diff of the faces around one changed cell: only the records on
/// both sides of each affected boundary are rewritten, so an edit never costs
/// a full re-mesh. Returns the neighbor meshes whose lists were edited (self
/// excluded); the caller finalizes each of them plus self.
///
/// All neighbor locks are taken before any list is touched, so a `Busy`
/// failure leaves every mesh exactly as it was and the queued update can
/// retry next frame.
pub fn update_block(
    mesh: &Arc<ChunkMesh>,
    state: &mut MeshState,
    reg: &BlockRegistry,
    lookup: &dyn MeshLookup,
    wx: i32,
    wy: i32,
    wz: i32,
    new: Block,
) -> Result<Vec<Arc<ChunkMesh>>, StitchError> {
    debug_assert!(state.chunk.lies_in_chunk(wx, wy, wz));
    let (x, y, z) = state.chunk.cell_of(wx, wy, wz);
    let old = state.chunk.get(x, y, z);
    if old == new {
        return Ok(Vec::new());
    }

    // Resolve and pin every cross-chunk neighbor first.
    let mut neighbor_mesh: [Option<Arc<ChunkMesh>>; 6] = Default::default();
    for dir in FACES {
        let (dx, dy, dz) = dir.delta();
        if !in_grid(x + dx, y + dy, z + dz) {
            neighbor_mesh[dir.index()] = lookup.mesh_at(mesh.pos().neighbor(dir.index() as u8));
        }
    }
    let mut neighbor_state: [Option<MutexGuard<'_, MeshState>>; 6] = Default::default();
    for dir in FACES {
        if let Some(nm) = &neighbor_mesh[dir.index()] {
            neighbor_state[dir.index()] = Some(nm.try_lock().ok_or(StitchError::Busy)?);
        }
    }

    let mut edited: Vec<Arc<ChunkMesh>> = Vec::new();
    for dir in FACES {
        let (dx, dy, dz) = dir.delta();
        let (nx, ny, nz) = (x + dx, y + dy, z + dz);
        let local = in_grid(nx, ny, nz);
        let nb = if local {
            state.chunk.get(nx, ny, nz)
        } else {
            match &neighbor_state[dir.index()] {
                Some(ns) => {
                    let (lx, ly, lz) = (
                        nx.rem_euclid(CHUNK_SIZE),
                        ny.rem_euclid(CHUNK_SIZE),
                        nz.rem_euclid(CHUNK_SIZE),
                    );
                    ns.chunk.get(lx, ly, lz)
                }
                // An absent neighbor reads as air, matching the seam pass.
                None => Block::AIR,
            }
        };

        // This block's face toward `dir`, at the exposed cell.
        let seam = if local { None } else { Some(dir) };
        let was = can_be_seen_through(reg, old, nb, dir);
        let will = can_be_seen_through(reg, new, nb, dir);
        if was {
            apply_face_change(&mut state.primitives, reg, old, dir, nx, ny, nz, seam, false);
        }
        if will {
            apply_face_change(&mut state.primitives, reg, new, dir, nx, ny, nz, seam, true);
        }

        // The neighbor block's face back toward this cell; its exposed cell
        // is the edited cell itself.
        let back = dir.opposite();
        let nb_was = can_be_seen_through(reg, nb, old, back);
        let nb_will = can_be_seen_through(reg, nb, new, back);
        if nb_was != nb_will {
            if local {
                if nb_was {
                    apply_face_change(&mut state.primitives, reg, nb, back, x, y, z, None, false);
                }
                if nb_will {
                    apply_face_change(&mut state.primitives, reg, nb, back, x, y, z, None, true);
                }
            } else if let Some(ns) = neighbor_state[dir.index()].as_mut() {
                // The edited cell in the neighbor's frame: one step past its
                // grid, which pack records as a wrapped seam address.
                let (ex, ey, ez) = (x - dx * CHUNK_SIZE, y - dy * CHUNK_SIZE, z - dz * CHUNK_SIZE);
                if nb_was {
                    apply_face_change(&mut ns.primitives, reg, nb, back, ex, ey, ez, Some(back), false);
                }
                if nb_will {
                    apply_face_change(&mut ns.primitives, reg, nb, back, ex, ey, ez, Some(back), true);
                }
                let nm = neighbor_mesh[dir.index()].clone().unwrap();
                if !edited.iter().any(|m| Arc::ptr_eq(m, &nm)) {
                    edited.push(nm);
                }
            }
        }
    }

    // Keep the boundary open-rectangles conservative: a cell that opened up
    // must join its face's rectangle or later seam walks would skip it.
    for dir in FACES {
        let layer = if dir.is_positive() { CHUNK_SIZE - 1 } else { 0 };
        let on_layer = match dir.axis() {
            0 => x == layer,
            1 => y == layer,
            _ => z == layer,
        };
        if on_layer {
            let (u, v) = match dir.axis() {
                0 => (y, z),
                1 => (x, z),
                _ => (x, y),
            };
            state.border[dir.index()].include(u, v);
        }
    }

    state.chunk.update_block(wx, wy, wz, new);
    Ok(edited)
}
