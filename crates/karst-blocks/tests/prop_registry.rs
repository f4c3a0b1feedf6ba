use karst_blocks::model::{BlockModel, Permutation};
use proptest::prelude::*;

proptest! {
    // Every permutation maps the six directions onto the six directions.
    #[test]
    fn permutation_is_a_bijection(bits in 0u8..64) {
        let p = Permutation(bits);
        let mut seen = [false; 6];
        for d in 0..6u8 {
            let out = p.apply(d) as usize;
            prop_assert!(out < 6);
            prop_assert!(!seen[out]);
            seen[out] = true;
        }
    }

    // Opposite directions stay opposite under any permutation.
    #[test]
    fn permutation_preserves_opposites(bits in 0u8..64, d in 0u8..6) {
        let p = Permutation(bits);
        prop_assert_eq!(p.apply(d) ^ 1, p.apply(d ^ 1));
    }

    // A model that fills a face must touch that face's plane.
    #[test]
    fn filled_faces_touch_their_plane(
        min in prop::array::uniform3(0u8..=16),
        span in prop::array::uniform3(0u8..=16),
        d in 0u8..6,
    ) {
        let max = [
            (min[0] + span[0]).min(16),
            (min[1] + span[1]).min(16),
            (min[2] + span[2]).min(16),
        ];
        let m = BlockModel { index: 1, permutation: Permutation::IDENTITY, min, max };
        if m.fills_local_face(d) {
            let axis = match d { 0 | 1 => 1usize, 2 | 3 => 0, _ => 2 };
            if d & 1 == 0 {
                prop_assert_eq!(m.max[axis], 16);
            } else {
                prop_assert_eq!(m.min[axis], 0);
            }
        }
    }
}
