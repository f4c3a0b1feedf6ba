use std::sync::Arc;

use hashbrown::HashMap;
use karst_chunk::{Chunk, ChunkPos, CHUNK_SIZE};

use super::mesh::{ChunkMesh, MeshLookup};

/// Voxels of out-of-chunk halo covered by the lightmap grid on each side.
pub const LIGHT_HALO: i32 = 8;
/// Voxels per edge of one compressed light cube.
pub const LIGHT_CELL: i32 = 8;

const CHANNEL_SHIFTS: [u32; 6] = [25, 20, 15, 10, 5, 0];

/// Packs six 8-bit channels into the 32-bit word the fragment shader unpacks:
/// five bits per channel, sun RGB in the high half, block RGB in the low.
#[inline]
pub fn pack_light(channels: [u8; 6]) -> u32 {
    let mut w = 0u32;
    for (c, shift) in channels.into_iter().zip(CHANNEL_SHIFTS) {
        w |= u32::from(c >> 3) << shift;
    }
    w
}

/// Resolves light reads that cross out of one chunk, walking into neighbor
/// meshes at the same LOD and climbing to coarser ones when the fine chunk is
/// not resident. Absent or busy neighbors read as darkness.
pub struct LightResolver<'a> {
    pos: ChunkPos,
    lookup: &'a dyn MeshLookup,
    cache: HashMap<ChunkPos, Option<Arc<ChunkMesh>>>,
}

impl<'a> LightResolver<'a> {
    pub fn new(pos: ChunkPos, lookup: &'a dyn MeshLookup) -> Self {
        Self {
            pos,
            lookup,
            cache: HashMap::new(),
        }
    }

    /// Six channels at a cell coordinate of the owning chunk; coordinates
    /// outside `[0, 32)` cross into whatever mesh covers them.
    pub fn sample(&mut self, own: &Chunk, cx: i32, cy: i32, cz: i32) -> [u8; 6] {
        if (0..CHUNK_SIZE).contains(&cx)
            && (0..CHUNK_SIZE).contains(&cy)
            && (0..CHUNK_SIZE).contains(&cz)
        {
            return own.light_at(cx, cy, cz);
        }
        let s = self.pos.size_shift();
        let wx = self.pos.wx + (cx << s);
        let wy = self.pos.wy + (cy << s);
        let wz = self.pos.wz + (cz << s);

        let e = self.pos.extent();
        let mut probe = ChunkPos::new(
            wx.div_euclid(e) * e,
            wy.div_euclid(e) * e,
            wz.div_euclid(e) * e,
            self.pos.voxel_size,
        );
        for _ in 0..5 {
            if let Some(mesh) = self.mesh_cached(probe) {
                if let Some(state) = mesh.try_lock() {
                    let (lx, ly, lz) = state.chunk.cell_of(wx, wy, wz);
                    return state.chunk.light_at(lx, ly, lz);
                }
                return [0; 6];
            }
            probe = probe.parent();
        }
        [0; 6]
    }

    fn mesh_cached(&mut self, pos: ChunkPos) -> Option<Arc<ChunkMesh>> {
        if let Some(hit) = self.cache.get(&pos) {
            return hit.clone();
        }
        let found = self.lookup.mesh_at(pos);
        self.cache.insert(pos, found.clone());
        found
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pack_drops_low_three_bits() {
        assert_eq!(pack_light([0; 6]), 0);
        assert_eq!(pack_light([255; 6]), 0x3FFF_FFFF);
        // Channel order: the first channel lands at the top shift.
        assert_eq!(pack_light([8, 0, 0, 0, 0, 0]), 1 << 25);
        assert_eq!(pack_light([0, 0, 0, 0, 0, 8]), 1);
        // Values below the 5-bit step vanish.
        assert_eq!(pack_light([7, 0, 0, 0, 0, 0]), 0);
    }
}
