use karst_blocks::{Block, BlockRegistry};
use karst_chunk::CHUNK_SIZE;

use super::face::{Face, FaceData, FACES};
use super::mesh::{BorderRect, MeshState};
use super::primitive::PrimitiveKind;

/// Whether `b`'s face toward `dir` shows when `other` stands on the far side.
///
/// Any non-cube model exposes every face it does not fill; an air neighbor
/// always exposes; a view-through neighbor of a *different* block exposes
/// (air or glass against water), while two identical view-through blocks hide
/// the shared face; and any neighbor with a non-cube model leaves the face
/// visible around its model.
pub fn can_be_seen_through(reg: &BlockRegistry, b: Block, other: Block, dir: Face) -> bool {
    if b.id == 0 {
        return false;
    }
    let model = reg.model(b);
    let freestanding = !model.is_full_cube() && !model.fills_face(dir.index() as u8);
    freestanding
        || other.id == 0
        || (b != other && reg.view_through(other.id))
        || !reg.model(other).is_full_cube()
}

/// A cell the seam pass can see through from the far side: air, view-through,
/// or occupied by a model that leaves the boundary face open.
fn opens_boundary(reg: &BlockRegistry, b: Block, dir: Face) -> bool {
    if b.id == 0 || reg.view_through(b.id) {
        return true;
    }
    let model = reg.model(b);
    !model.is_full_cube() && !model.fills_face(dir.index() as u8)
}

/// Emits one face (plus its back face for blocks that carry one) into the
/// right primitive list through `push`.
pub(crate) fn emit_face(
    state: &mut MeshState,
    reg: &BlockRegistry,
    b: Block,
    dir: Face,
    ex: i32,
    ey: i32,
    ez: i32,
    seam: Option<Face>,
) {
    let model = reg.model(b);
    let perm = model.permutation.bits();
    let kind = PrimitiveKind::classify(reg, b);
    let face = FaceData::pack(ex, ey, ez, false, dir, perm, b.id, model.index);
    match seam {
        Some(d) => state.primitives[kind.index()].push_neighbor(d, face),
        None => state.primitives[kind.index()].push_core(face),
    }
    if reg.has_back_face(b.id) {
        let back = FaceData::pack(ex, ey, ez, true, dir.opposite(), perm, b.id, model.index);
        let t = &mut state.primitives[PrimitiveKind::Transparent.index()];
        match seam {
            Some(d) => t.push_neighbor(d, back),
            None => t.push_core(back),
        }
    }
}

/// Full-chunk enumeration: rebuilds the three core face lists and the six
/// boundary view-through rectangles from the grid. Seam lists are left to the
/// stitching pass; the cleared neighbor stamps force it to run.
pub fn regenerate_main_mesh(state: &mut MeshState, reg: &BlockRegistry) {
    for pm in &mut state.primitives {
        pm.clear_core();
        pm.was_changed = true;
    }
    state.last_neighbor = [None; 6];

    for x in 0..CHUNK_SIZE {
        for y in 0..CHUNK_SIZE {
            for z in 0..CHUNK_SIZE {
                let b = state.chunk.get(x, y, z);
                if b.is_air() {
                    continue;
                }
                for dir in FACES {
                    let (dx, dy, dz) = dir.delta();
                    let (nx, ny, nz) = (x + dx, y + dy, z + dz);
                    if !(0..CHUNK_SIZE).contains(&nx)
                        || !(0..CHUNK_SIZE).contains(&ny)
                        || !(0..CHUNK_SIZE).contains(&nz)
                    {
                        continue;
                    }
                    let other = state.chunk.get(nx, ny, nz);
                    if can_be_seen_through(reg, b, other, dir) {
                        emit_face(state, reg, b, dir, nx, ny, nz, None);
                    }
                }
            }
        }
    }

    for dir in FACES {
        state.border[dir.index()] = boundary_open_rect(state, reg, dir);
    }
}

fn boundary_open_rect(state: &MeshState, reg: &BlockRegistry, dir: Face) -> BorderRect {
    let layer = if dir.is_positive() { CHUNK_SIZE - 1 } else { 0 };
    let mut rect = BorderRect::EMPTY;
    for u in 0..CHUNK_SIZE {
        for v in 0..CHUNK_SIZE {
            let (x, y, z) = super::mesh::boundary_cell(dir, u, v, layer);
            if opens_boundary(reg, state.chunk.get(x, y, z), dir) {
                rect.include(u, v);
            }
        }
    }
    rect
}
