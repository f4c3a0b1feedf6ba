use karst_geom::{Aabb, Vec3};
use karst_lod::Culling;

/// Slack applied to every plane test, in world units. Chunk meshes can spill
/// a little past their box (seam faces, models), and a too-eager cull pops
/// geometry at the screen edge.
const FRUSTUM_MARGIN: f32 = 128.0;

#[derive(Clone, Copy, Debug)]
struct Plane {
    point: Vec3,
    normal: Vec3,
}

/// Five view planes: far, right, left, top, bottom. The near plane is left
/// out on purpose; chunks straddling the camera must not vanish.
pub struct Frustum {
    planes: [Plane; 5],
}

impl Frustum {
    pub fn new(pos: Vec3, forward: Vec3, up: Vec3, fov_y: f32, aspect: f32, z_far: f32) -> Self {
        let fwd = forward.normalized();
        let right = fwd.cross(up).normalized();
        let upv = right.cross(fwd);

        let half_v = (fov_y * 0.5).tan();
        let half_h = half_v * aspect;

        let d_right = (fwd + right * half_h).normalized();
        let d_left = (fwd - right * half_h).normalized();
        let d_top = (fwd + upv * half_v).normalized();
        let d_bottom = (fwd - upv * half_v).normalized();

        let planes = [
            Plane {
                point: pos + fwd * z_far,
                normal: -fwd,
            },
            Plane {
                point: pos,
                normal: upv.cross(d_right),
            },
            Plane {
                point: pos,
                normal: d_left.cross(upv),
            },
            Plane {
                point: pos,
                normal: d_top.cross(right),
            },
            Plane {
                point: pos,
                normal: right.cross(d_bottom),
            },
        ];
        Self { planes }
    }

    /// Point-and-normal test of the most-positive AABB corner against each
    /// plane, with the safety margin.
    pub fn test_aabb(&self, pos: Vec3, dims: Vec3) -> bool {
        for plane in &self.planes {
            let corner = Vec3::new(
                if plane.normal.x > 0.0 { pos.x + dims.x } else { pos.x },
                if plane.normal.y > 0.0 { pos.y + dims.y } else { pos.y },
                if plane.normal.z > 0.0 { pos.z + dims.z } else { pos.z },
            );
            if (corner - plane.point).dot(plane.normal) + FRUSTUM_MARGIN < 0.0 {
                return false;
            }
        }
        true
    }
}

impl Culling for Frustum {
    fn test_aabb(&self, aabb: Aabb) -> bool {
        Frustum::test_aabb(self, aabb.min, aabb.dims())
    }
}
