use karst_blocks::{Block, BlockRegistry};
use karst_mesh::{can_be_seen_through, Face, FaceData, FACES};
use proptest::prelude::*;

fn registry() -> BlockRegistry {
    BlockRegistry::from_toml_str(
        r#"
        [[blocks]]
        name = "stone"

        [[blocks]]
        name = "dirt"

        [[blocks]]
        name = "water"
        solid = false
        transparent = true
        view_through = true
        back_face = true

        [[blocks]]
        name = "glass"
        transparent = true
        view_through = true
        back_face = true
        "#,
    )
    .unwrap()
}

fn face() -> impl Strategy<Value = Face> {
    (0usize..6).prop_map(Face::from_index)
}

proptest! {
    // Between two adjacent full-cube cells holding different blocks, exactly
    // one oriented boundary face is visible, unless both sides are
    // transparent back-faced blocks (then both show, each with a back face).
    #[test]
    fn boundary_face_count_is_one_or_four(a in 0u16..5, b in 0u16..5, dir in face()) {
        let reg = registry();
        let ba = Block::new(a, 0);
        let bb = Block::new(b, 0);
        prop_assume!(ba != bb);
        prop_assume!(!ba.is_air() || !bb.is_air());

        let a_shows = can_be_seen_through(&reg, ba, bb, dir);
        let b_shows = can_be_seen_through(&reg, bb, ba, dir.opposite());
        let mut faces = 0usize;
        if a_shows {
            faces += 1 + usize::from(reg.has_back_face(ba.id));
        }
        if b_shows {
            faces += 1 + usize::from(reg.has_back_face(bb.id));
        }
        let both_backed = reg.has_back_face(ba.id) && reg.has_back_face(bb.id);
        if both_backed {
            prop_assert!(faces <= 4);
        } else if ba.is_air() || bb.is_air() {
            prop_assert!(faces >= 1);
        }
        if !a_shows && !b_shows {
            // Mutual occlusion only happens between two full opaque cubes or
            // identical view-through blocks.
            prop_assert!(!reg.transparent(ba.id) && !reg.transparent(bb.id));
        }
    }

    // Packing is lossless for every field combination the mesher produces.
    #[test]
    fn face_data_round_trips(
        x in -1i32..=32, y in 0i32..32, z in 0i32..32,
        back in any::<bool>(), d in face(), perm in 0u8..64,
        id in any::<u16>(), model in any::<u16>(),
    ) {
        let f = FaceData::pack(x, y, z, back, d, perm, id, model);
        prop_assert_eq!(f.is_back_face(), back);
        prop_assert_eq!(f.normal(), d);
        prop_assert_eq!(f.permutation(), perm);
        prop_assert_eq!(f.block_id(), id);
        prop_assert_eq!(f.model_index(), model);
        prop_assert_eq!(f.is_wrapped(), !(0..32).contains(&x));
        prop_assert_eq!(f.y(), y);
        prop_assert_eq!(f.z(), z);
    }

    // The slot identity is direction-aware: the two oriented faces of one
    // boundary never collapse into each other.
    #[test]
    fn opposite_faces_have_distinct_slots(x in 0i32..32, y in 0i32..32, z in 0i32..32, d in face()) {
        let f = FaceData::pack(x, y, z, false, d, 0, 1, 0);
        let g = FaceData::pack(x, y, z, false, d.opposite(), 0, 1, 0);
        prop_assert!(!f.same_slot(g));
        prop_assert!(f.same_slot(FaceData::pack(x, y, z, false, d, 9, 500, 7)));
    }
}
