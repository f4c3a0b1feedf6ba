use std::sync::Arc;

use karst_blocks::BlockRegistry;
use karst_chunk::{Chunk, CHUNK_SIZE};
use karst_gpu::GpuDevice;

use super::face::{Face, FACES};
use super::finish::finish;
use super::mesh::{
    boundary_cell, ChunkMesh, MeshBuffers, MeshLookup, MeshState, NeighborStamp, StitchError,
};
use super::mesher::{can_be_seen_through, emit_face};

/// How many coarser levels the seam fallback climbs before giving up.
const COARSE_CLIMB: usize = 5;

/// Rewrites both sides of the seam between `a` and its neighbor `b` across
/// `dir`. Both face lists for the direction are rebuilt from scratch; each
/// face lands in the mesh owning the solid block, addressed at the exposed
/// cell (masked into grid range for the cross-chunk step).
pub fn stitch_pair(a: &mut MeshState, b: &mut MeshState, dir: Face, reg: &BlockRegistry) {
    let back = dir.opposite();
    for pm in &mut a.primitives {
        pm.clear_neighbor(dir);
    }
    for pm in &mut b.primitives {
        pm.clear_neighbor(back);
    }

    let walk = a.border[dir.index()].union(b.border[back.index()]);
    if walk.is_empty() {
        return;
    }

    let (a_layer, b_layer) = if dir.is_positive() {
        (CHUNK_SIZE - 1, 0)
    } else {
        (0, CHUNK_SIZE - 1)
    };
    let (dx, dy, dz) = dir.delta();

    for u in walk.min_u..=walk.max_u {
        for v in walk.min_v..=walk.max_v {
            let (ax, ay, az) = boundary_cell(dir, u, v, a_layer);
            let (bx, by, bz) = boundary_cell(dir, u, v, b_layer);
            let ba = a.chunk.get(ax, ay, az);
            let bb = b.chunk.get(bx, by, bz);
            if can_be_seen_through(reg, ba, bb, dir) {
                emit_face(a, reg, ba, dir, ax + dx, ay + dy, az + dz, Some(dir));
            }
            if can_be_seen_through(reg, bb, ba, back) {
                emit_face(b, reg, bb, back, bx - dx, by - dy, bz - dz, Some(back));
            }
        }
    }
}

/// Rebuilds this mesh's seam list against a coarser stand-in when the
/// same-LOD neighbor is absent. Only faces pointing into this mesh are
/// produced, derived from the coarse cells covering the missing chunk; the
/// coarser mesh itself is never written, so detail transitions degrade
/// gracefully. Emission is unconditional on this mesh's own content, which
/// keeps the replacement surface hole-free at every LOD border.
pub fn stitch_coarse(state: &mut MeshState, coarse: &Chunk, dir: Face, reg: &BlockRegistry) {
    for pm in &mut state.primitives {
        pm.clear_neighbor(dir);
    }
    let layer = if dir.is_positive() { CHUNK_SIZE - 1 } else { 0 };
    let (dx, dy, dz) = dir.delta();
    let own = state.chunk.pos;
    let shift = own.size_shift();
    let back = dir.opposite();

    for u in 0..CHUNK_SIZE {
        for v in 0..CHUNK_SIZE {
            let (x, y, z) = boundary_cell(dir, u, v, layer);
            // World position of the exposed cell one step past the border.
            let wx = own.wx + ((x + dx) << shift);
            let wy = own.wy + ((y + dy) << shift);
            let wz = own.wz + ((z + dz) << shift);
            let (cx, cy, cz) = coarse.cell_of(wx, wy, wz);
            if !(0..CHUNK_SIZE).contains(&cx)
                || !(0..CHUNK_SIZE).contains(&cy)
                || !(0..CHUNK_SIZE).contains(&cz)
            {
                continue;
            }
            let cb = coarse.get(cx, cy, cz);
            if cb.is_air() {
                continue;
            }
            emit_face(state, reg, cb, back, x, y, z, Some(dir));
        }
    }
}

/// The per-mesh upload step of `update_meshes`: refresh every stale seam,
/// then finalize. Neighbors stitched here are finalized too, since their face
/// lists changed under them; any neighbor whose lock was lost to a worker
/// before its finish comes back in the result for re-queueing.
pub fn upload_data_and_finish_neighbors(
    mesh: &Arc<ChunkMesh>,
    lookup: &dyn MeshLookup,
    reg: &BlockRegistry,
    bufs: &mut MeshBuffers,
    device: &mut dyn GpuDevice,
) -> Result<Vec<Arc<ChunkMesh>>, StitchError> {
    let mut state = mesh.try_lock().ok_or(StitchError::Busy)?;
    let mut stitched: Vec<Arc<ChunkMesh>> = Vec::new();

    for dir in FACES {
        let npos = mesh.pos().neighbor(dir.index() as u8);
        if let Some(nmesh) = lookup.mesh_at(npos) {
            let stamp = NeighborStamp {
                pos: npos,
                revision: nmesh.revision(),
            };
            if state.last_neighbor[dir.index()] == Some(stamp) {
                continue;
            }
            {
                let mut nstate = nmesh.try_lock().ok_or(StitchError::Busy)?;
                stitch_pair(&mut state, &mut nstate, dir, reg);
                nstate.last_neighbor[dir.opposite().index()] = Some(NeighborStamp {
                    pos: mesh.pos(),
                    revision: mesh.revision(),
                });
            }
            state.last_neighbor[dir.index()] = Some(stamp);
            stitched.push(nmesh);
        } else if let Some((cmesh, stamp)) = find_coarser(lookup, npos) {
            if state.last_neighbor[dir.index()] == Some(stamp) {
                continue;
            }
            let cstate = cmesh.try_lock().ok_or(StitchError::Busy)?;
            stitch_coarse(&mut state, &cstate.chunk, dir, reg);
            drop(cstate);
            state.last_neighbor[dir.index()] = Some(stamp);
        } else {
            // Outer border of the window: nothing to face.
            for pm in &mut state.primitives {
                pm.clear_neighbor(dir);
            }
            state.last_neighbor[dir.index()] = None;
        }
    }

    finish(mesh, &mut state, bufs, device, lookup);
    // Release this mesh before finalizing neighbors so their light sampling
    // can cross back into it.
    drop(state);

    let mut requeue = Vec::new();
    for nmesh in stitched {
        let mut needs_requeue = false;
        match nmesh.try_lock() {
            Some(mut nstate) => finish(&nmesh, &mut nstate, bufs, device, lookup),
            None => needs_requeue = true,
        }
        if needs_requeue {
            requeue.push(nmesh);
        }
    }
    Ok(requeue)
}

fn find_coarser(
    lookup: &dyn MeshLookup,
    pos: karst_chunk::ChunkPos,
) -> Option<(Arc<ChunkMesh>, NeighborStamp)> {
    let mut probe = pos.parent();
    for _ in 0..COARSE_CLIMB {
        if let Some(mesh) = lookup.mesh_at(probe) {
            if mesh.is_generated() {
                let stamp = NeighborStamp {
                    pos: probe,
                    revision: mesh.revision(),
                };
                return Some((mesh, stamp));
            }
        }
        probe = probe.parent();
    }
    None
}
