use karst_blocks::{Block, BlockRegistry};

use super::grid::Chunk;
use super::pos::CHUNK_SIZE;

// Exposure weights for the sub-cell score: a transparent neighbor inside the
// chunk dominates, an out-of-chunk neighbor counts a little, an opaque
// interior neighbor not at all.
const SCORE_TRANSPARENT: u32 = 5;
const SCORE_BORDER: u32 = 1;

const NEIGHBOR_DELTAS: [(i32, i32, i32); 6] = [
    (0, 1, 0),
    (0, -1, 0),
    (1, 0, 0),
    (-1, 0, 0),
    (0, 0, 1),
    (0, 0, -1),
];

fn exposure_score(child: &Chunk, reg: &BlockRegistry, x: i32, y: i32, z: i32) -> u32 {
    let mut score = 0;
    for (dx, dy, dz) in NEIGHBOR_DELTAS {
        let (nx, ny, nz) = (x + dx, y + dy, z + dz);
        if nx < 0
            || ny < 0
            || nz < 0
            || nx >= CHUNK_SIZE
            || ny >= CHUNK_SIZE
            || nz >= CHUNK_SIZE
        {
            score += SCORE_BORDER;
        } else if reg.transparent(child.get(nx, ny, nz).id) {
            score += SCORE_TRANSPARENT;
        }
    }
    score
}

impl Chunk {
    /// Absorbs one octant of this chunk from the next-finer chunk covering
    /// it. Every 2x2x2 group of child cells collapses to the sub-cell that is
    /// most exposed (within one point of the best score), walked in a parity
    /// permutation of the parent coordinate so high-frequency patterns keep
    /// their phase across the detail boundary.
    pub fn update_from_lower_resolution(&mut self, child: &Chunk, reg: &BlockRegistry) {
        debug_assert_eq!(child.pos.voxel_size * 2, self.pos.voxel_size);
        debug_assert!(self.pos.contains(child.pos.wx, child.pos.wy, child.pos.wz));

        let shift = self.pos.size_shift();
        let ox = (child.pos.wx - self.pos.wx) >> shift;
        let oy = (child.pos.wy - self.pos.wy) >> shift;
        let oz = (child.pos.wz - self.pos.wz) >> shift;
        let half = CHUNK_SIZE / 2;

        for qz in 0..half {
            for qy in 0..half {
                for qx in 0..half {
                    let px = ox + qx;
                    let py = oy + qy;
                    let pz = oz + qz;

                    let mut scores = [0u32; 8];
                    let mut blocks = [Block::AIR; 8];
                    let mut max_score = 0u32;
                    let mut any = false;
                    for sub in 0..8usize {
                        let dx = (sub >> 2) as i32 & 1;
                        let dz = (sub >> 1) as i32 & 1;
                        let dy = sub as i32 & 1;
                        let cx = qx * 2 + dx;
                        let cy = qy * 2 + dy;
                        let cz = qz * 2 + dz;
                        let b = child.get(cx, cy, cz);
                        blocks[sub] = b;
                        if b.is_air() {
                            continue;
                        }
                        any = true;
                        let s = exposure_score(child, reg, cx, cy, cz);
                        scores[sub] = s;
                        max_score = max_score.max(s);
                    }

                    if !any {
                        self.set(px, py, pz, Block::AIR);
                        continue;
                    }

                    let base = ((px & 1) * 4 + (pz & 1) * 2 + (py & 1)) as usize;
                    for i in 0..8usize {
                        let cand = base ^ i;
                        if blocks[cand].is_air() {
                            continue;
                        }
                        if scores[cand] + 1 >= max_score {
                            self.set(px, py, pz, blocks[cand]);
                            break;
                        }
                    }
                }
            }
        }
        self.set_changed();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pos::ChunkPos;

    fn registry() -> BlockRegistry {
        BlockRegistry::from_toml_str(
            r#"
            [[blocks]]
            name = "stone"

            [[blocks]]
            name = "glass"
            transparent = true
            view_through = true
            "#,
        )
        .unwrap()
    }

    #[test]
    fn all_air_groups_stay_air() {
        let reg = registry();
        let child = Chunk::empty(ChunkPos::new(0, 0, 0, 1));
        let mut parent = Chunk::empty(ChunkPos::new(0, 0, 0, 2));
        parent.update_from_lower_resolution(&child, &reg);
        assert!(parent.is_all_air());
        assert!(parent.was_changed());
    }

    #[test]
    fn lone_block_survives_downsampling() {
        let reg = registry();
        let stone = Block::new(reg.id_by_name("stone").unwrap(), 0);
        let mut child = Chunk::empty(ChunkPos::new(0, 0, 0, 1));
        child.set(5, 9, 13, stone);
        let mut parent = Chunk::empty(ChunkPos::new(0, 0, 0, 2));
        parent.update_from_lower_resolution(&child, &reg);
        assert_eq!(parent.get(2, 4, 6), stone);
    }

    #[test]
    fn octant_offset_lands_in_parent_half() {
        let reg = registry();
        let stone = Block::new(reg.id_by_name("stone").unwrap(), 0);
        let mut child = Chunk::empty(ChunkPos::new(32, 32, 32, 1));
        child.set(0, 0, 0, stone);
        let mut parent = Chunk::empty(ChunkPos::new(0, 0, 0, 2));
        parent.update_from_lower_resolution(&child, &reg);
        assert_eq!(parent.get(16, 16, 16), stone);
    }

    #[test]
    fn candidate_walk_starts_at_parent_parity() {
        let reg = registry();
        let stone = Block::new(reg.id_by_name("stone").unwrap(), 0);
        let glass = Block::new(reg.id_by_name("glass").unwrap(), 0);
        let mut child = Chunk::empty(ChunkPos::new(0, 0, 0, 1));
        // Fill one 2x2x2 group: glass everywhere except one stone cell, then
        // bury the stone so its score stays at zero transparent neighbors.
        for z in 8..16 {
            for y in 8..16 {
                for x in 8..16 {
                    child.set(x, y, z, stone);
                }
            }
        }
        for d in 0..8 {
            let (dx, dz, dy) = ((d >> 2) & 1, (d >> 1) & 1, d & 1);
            child.set(10 + dx, 10 + dy, 10 + dz, glass);
        }
        child.set(10, 10, 10, stone); // buried corner inside the glass pocket
        let mut parent = Chunk::empty(ChunkPos::new(0, 0, 0, 2));
        parent.update_from_lower_resolution(&child, &reg);
        // Parent parity (5,5,5) starts the candidate walk at sub-cell 7,
        // which is glass and within one point of the best score.
        assert_eq!(parent.get(5, 5, 5).id, glass.id);
    }
}
