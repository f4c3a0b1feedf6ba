use karst_geom::{Aabb, Vec3};
use proptest::prelude::*;

fn finite() -> impl Strategy<Value = f32> {
    -1.0e4f32..=1.0e4
}

fn vec3() -> impl Strategy<Value = Vec3> {
    (finite(), finite(), finite()).prop_map(|(x, y, z)| Vec3::new(x, y, z))
}

proptest! {
    #[test]
    fn dot_is_commutative(a in vec3(), b in vec3()) {
        prop_assert_eq!(a.dot(b), b.dot(a));
    }

    #[test]
    fn cross_is_orthogonal(a in vec3(), b in vec3()) {
        let c = a.cross(b);
        let scale = (a.length() * b.length()).max(1.0);
        prop_assert!((c.dot(a) / (scale * scale.max(1.0))).abs() < 1e-3);
        prop_assert!((c.dot(b) / (scale * scale.max(1.0))).abs() < 1e-3);
    }

    #[test]
    fn aabb_distance_is_zero_iff_inside(p in vec3(), q in vec3(), probe in vec3()) {
        let bb = Aabb::new(p.min(q), p.max(q));
        let d = bb.distance_sq(probe);
        prop_assert!(d >= 0.0);
        if bb.contains(probe) {
            prop_assert_eq!(d, 0.0);
        } else {
            prop_assert!(d > 0.0);
        }
    }
}
