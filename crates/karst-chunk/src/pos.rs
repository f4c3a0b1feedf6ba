use std::hash::{Hash, Hasher};

use karst_geom::{Aabb, Vec3};

/// Cells per chunk edge.
pub const CHUNK_SIZE: i32 = 32;
/// `log2(CHUNK_SIZE)`.
pub const CHUNK_SHIFT: u32 = 5;
/// Cells per chunk.
pub const CHUNK_VOLUME: usize = 32 * 32 * 32;

/// Identity of one chunk: world origin plus the voxel size of its cells.
/// `voxel_size` is a power of two; doubling it halves the level of detail.
/// World coordinates are multiples of the chunk extent `32 * voxel_size`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChunkPos {
    pub wx: i32,
    pub wy: i32,
    pub wz: i32,
    pub voxel_size: i32,
}

impl Hash for ChunkPos {
    fn hash<H: Hasher>(&self, state: &mut H) {
        // Spread the low coordinate bits across the word; chunk coordinates
        // cluster around the player, so a plain xor would collide heavily.
        let mut h = (self.wx as u32 as u64).wrapping_mul(0x8DA6_B343);
        h = h.wrapping_add((self.wy as u32 as u64).wrapping_mul(0xD816_3841));
        h = h.wrapping_add((self.wz as u32 as u64).wrapping_mul(0xCB1A_B31F));
        h = h.wrapping_add((self.voxel_size as u64) << 58);
        h ^= h >> 29;
        h = h.wrapping_mul(0x94D0_49BB_1331_11EB);
        h ^= h >> 32;
        state.write_u64(h);
    }
}

impl ChunkPos {
    #[inline]
    pub const fn new(wx: i32, wy: i32, wz: i32, voxel_size: i32) -> Self {
        Self {
            wx,
            wy,
            wz,
            voxel_size,
        }
    }

    /// `log2(voxel_size)`, the shift converting voxel to cell coordinates.
    #[inline]
    pub fn size_shift(self) -> u32 {
        self.voxel_size.trailing_zeros()
    }

    /// Edge length in world units.
    #[inline]
    pub fn extent(self) -> i32 {
        CHUNK_SIZE * self.voxel_size
    }

    #[inline]
    pub fn aabb(self) -> Aabb {
        let min = Vec3::new(self.wx as f32, self.wy as f32, self.wz as f32);
        Aabb::new(min, min + Vec3::splat(self.extent() as f32))
    }

    #[inline]
    pub fn contains(self, wx: i32, wy: i32, wz: i32) -> bool {
        let e = self.extent();
        wx >= self.wx
            && wx < self.wx + e
            && wy >= self.wy
            && wy < self.wy + e
            && wz >= self.wz
            && wz < self.wz + e
    }

    /// Chunk origin shifted one chunk along face direction `dir`
    /// (0=+Y, 1=-Y, 2=+X, 3=-X, 4=+Z, 5=-Z).
    pub fn neighbor(self, dir: u8) -> ChunkPos {
        let e = self.extent();
        let (dx, dy, dz) = match dir {
            0 => (0, e, 0),
            1 => (0, -e, 0),
            2 => (e, 0, 0),
            3 => (-e, 0, 0),
            4 => (0, 0, e),
            _ => (0, 0, -e),
        };
        ChunkPos::new(self.wx + dx, self.wy + dy, self.wz + dz, self.voxel_size)
    }

    /// Position of the coarser chunk covering this one.
    pub fn parent(self) -> ChunkPos {
        let pe = self.extent() * 2;
        ChunkPos::new(
            self.wx.div_euclid(pe) * pe,
            self.wy.div_euclid(pe) * pe,
            self.wz.div_euclid(pe) * pe,
            self.voxel_size * 2,
        )
    }

    /// Which octant of its parent this chunk occupies:
    /// bit 0 = x, bit 1 = y, bit 2 = z.
    pub fn octant_in_parent(self) -> u8 {
        let e = self.extent();
        let bx = (self.wx.div_euclid(e) & 1) as u8;
        let by = (self.wy.div_euclid(e) & 1) as u8;
        let bz = (self.wz.div_euclid(e) & 1) as u8;
        bx | (by << 1) | (bz << 2)
    }

    /// Squared distance from `p` to the nearest point of the chunk, zero for
    /// points inside.
    #[inline]
    pub fn min_distance_sq(self, p: Vec3) -> f32 {
        self.aabb().distance_sq(p)
    }

    /// Squared distance from `p` to the farthest corner.
    pub fn max_distance_sq(self, p: Vec3) -> f32 {
        let bb = self.aabb();
        let dx = (p.x - bb.min.x).abs().max((p.x - bb.max.x).abs());
        let dy = (p.y - bb.min.y).abs().max((p.y - bb.max.y).abs());
        let dz = (p.z - bb.min.z).abs().max((p.z - bb.max.z).abs());
        dx * dx + dy * dy + dz * dz
    }

    #[inline]
    pub fn center_distance_sq(self, p: Vec3) -> f32 {
        (self.aabb().center() - p).length_sq()
    }

    /// Rendering priority: near chunks first, finer detail winning over
    /// coarser at equal distance.
    pub fn priority(self, p: Vec3) -> f32 {
        let vs = self.voxel_size as f32;
        let side = CHUNK_SIZE as f32;
        -self.min_distance_sq(p) / (vs * vs) + 2.0 * self.size_shift() as f32 * side * side
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn neighbor_steps_one_extent() {
        let p = ChunkPos::new(64, 0, -64, 2);
        assert_eq!(p.extent(), 64);
        assert_eq!(p.neighbor(2), ChunkPos::new(128, 0, -64, 2));
        assert_eq!(p.neighbor(1), ChunkPos::new(64, -64, -64, 2));
    }

    #[test]
    fn parent_aligns_down() {
        let p = ChunkPos::new(32, -32, 96, 1);
        let parent = p.parent();
        assert_eq!(parent, ChunkPos::new(0, -64, 64, 2));
        assert_eq!(p.octant_in_parent(), 0b101 | 0b010); // x=1, y=1, z=1
    }

    #[test]
    fn octant_bits_follow_axis_order() {
        let base = ChunkPos::new(0, 0, 0, 1);
        assert_eq!(base.octant_in_parent(), 0);
        assert_eq!(ChunkPos::new(32, 0, 0, 1).octant_in_parent(), 1);
        assert_eq!(ChunkPos::new(0, 32, 0, 1).octant_in_parent(), 2);
        assert_eq!(ChunkPos::new(0, 0, 32, 1).octant_in_parent(), 4);
    }

    #[test]
    fn priority_prefers_near_and_fine() {
        let p = Vec3::ZERO;
        let near_fine = ChunkPos::new(0, 0, 0, 1);
        let near_coarse = ChunkPos::new(0, 0, 0, 2);
        let far_fine = ChunkPos::new(512, 0, 0, 1);
        assert!(near_fine.priority(p) > far_fine.priority(p));
        // At zero distance the coarser chunk carries the LOD bonus.
        assert!(near_coarse.priority(p) > near_fine.priority(p));
    }
}
