use std::collections::HashSet;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use karst_blocks::Block;
use karst_chunk::{Chunk, ChunkPos, CHUNK_SIZE, CHUNK_VOLUME};
use karst_geom::Vec3;
use proptest::prelude::*;

fn chunk_pos() -> impl Strategy<Value = ChunkPos> {
    (-64i32..64, -64i32..64, -64i32..64, 0u32..5).prop_map(|(cx, cy, cz, shift)| {
        let e = CHUNK_SIZE << shift;
        ChunkPos::new(cx * e, cy * e, cz * e, 1 << shift)
    })
}

fn hash_of(p: ChunkPos) -> u64 {
    let mut h = DefaultHasher::new();
    p.hash(&mut h);
    h.finish()
}

proptest! {
    // idx maps each cell to a unique in-range slot.
    #[test]
    fn idx_is_a_bijection(_seed in 0u8..1) {
        let mut seen = vec![false; CHUNK_VOLUME];
        for y in 0..CHUNK_SIZE { for z in 0..CHUNK_SIZE { for x in 0..CHUNK_SIZE {
            let i = Chunk::idx(x, y, z);
            prop_assert!(i < CHUNK_VOLUME);
            prop_assert!(!seen[i]);
            seen[i] = true;
        }}}
    }

    // Neighboring positions in a dense cluster hash without mass collisions.
    #[test]
    fn hash_spreads_clustered_positions(shift in 0u32..5) {
        let e = CHUNK_SIZE << shift;
        let mut hashes = HashSet::new();
        let mut count = 0usize;
        for x in -4i32..4 { for y in -4i32..4 { for z in -4i32..4 {
            hashes.insert(hash_of(ChunkPos::new(x * e, y * e, z * e, 1 << shift)));
            count += 1;
        }}}
        prop_assert_eq!(hashes.len(), count);
    }

    // min distance is zero exactly for points inside, and never exceeds the
    // center or max distances.
    #[test]
    fn distances_are_ordered(pos in chunk_pos(), px in -4096f32..4096.0, py in -4096f32..4096.0, pz in -4096f32..4096.0) {
        let p = Vec3::new(px, py, pz);
        let min = pos.min_distance_sq(p);
        let center = pos.center_distance_sq(p);
        let max = pos.max_distance_sq(p);
        // Squared distances reach ~1e9 here; compare with a relative slack.
        let slack = |v: f32| v.max(1.0) * 1e-4;
        prop_assert!(min >= 0.0);
        prop_assert!(min <= center + slack(center));
        prop_assert!(center <= max + slack(max));
        if pos.aabb().contains(p) {
            prop_assert_eq!(min, 0.0);
        }
    }

    // parent() contains the child and the octant index matches the offset.
    #[test]
    fn parent_covers_child(pos in chunk_pos()) {
        let parent = pos.parent();
        prop_assert_eq!(parent.voxel_size, pos.voxel_size * 2);
        prop_assert!(parent.contains(pos.wx, pos.wy, pos.wz));
        let oct = pos.octant_in_parent();
        let e = pos.extent();
        prop_assert_eq!(oct & 1 != 0, pos.wx - parent.wx == e);
        prop_assert_eq!(oct & 2 != 0, pos.wy - parent.wy == e);
        prop_assert_eq!(oct & 4 != 0, pos.wz - parent.wz == e);
    }

    // The unconditional mutator round-trips through world coordinates.
    #[test]
    fn update_block_round_trips(pos in chunk_pos(), x in 0i32..CHUNK_SIZE, y in 0i32..CHUNK_SIZE, z in 0i32..CHUNK_SIZE, id in 0u16..8, data in any::<u16>()) {
        let mut c = Chunk::empty(pos);
        let s = pos.size_shift();
        let (wx, wy, wz) = (pos.wx + (x << s), pos.wy + (y << s), pos.wz + (z << s));
        prop_assert!(c.lies_in_chunk(wx, wy, wz));
        c.update_block(wx, wy, wz, Block::new(id, data));
        prop_assert_eq!(c.get(x, y, z), Block::new(id, data));
        prop_assert!(c.was_changed());
    }
}
