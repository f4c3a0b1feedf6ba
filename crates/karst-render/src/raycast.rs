use karst_blocks::{Block, BlockRegistry};
use karst_geom::Vec3;

/// Reach of the block-selection ray, world units.
pub const SELECTION_RANGE: f32 = 6.0;

#[derive(Clone, Copy, Debug)]
pub struct RayHit {
    /// The selected cell.
    pub bx: i32,
    pub by: i32,
    pub bz: i32,
    /// The cell the ray came from (placement target).
    pub px: i32,
    pub py: i32,
    pub pz: i32,
    /// Entry face normal.
    pub nx: i32,
    pub ny: i32,
    pub nz: i32,
}

#[inline]
fn inv_or_max(v: f32) -> f32 {
    if v.abs() < 1e-8 { f32::MAX } else { 1.0 / v.abs() }
}

fn ray_hits_box(origin: Vec3, dir: Vec3, min: Vec3, max: Vec3, max_dist: f32) -> bool {
    let mut t0 = 0.0f32;
    let mut t1 = max_dist;
    for axis in 0..3 {
        let (o, d, lo, hi) = match axis {
            0 => (origin.x, dir.x, min.x, max.x),
            1 => (origin.y, dir.y, min.y, max.y),
            _ => (origin.z, dir.z, min.z, max.z),
        };
        if d.abs() < 1e-8 {
            if o < lo || o > hi {
                return false;
            }
            continue;
        }
        let inv = 1.0 / d;
        let (mut ta, mut tb) = ((lo - o) * inv, (hi - o) * inv);
        if ta > tb {
            std::mem::swap(&mut ta, &mut tb);
        }
        t0 = t0.max(ta);
        t1 = t1.min(tb);
        if t0 > t1 {
            return false;
        }
    }
    true
}

/// Amanatides & Woo voxel walk from the camera. Each non-air cell is tested
/// against its block model's scaled box, so a ray slips past a torch's empty
/// corners onto whatever stands behind it.
pub fn raycast_first_hit<F>(
    origin: Vec3,
    dir: Vec3,
    max_dist: f32,
    reg: &BlockRegistry,
    mut block_at: F,
) -> Option<RayHit>
where
    F: FnMut(i32, i32, i32) -> Option<Block>,
{
    let len = dir.length();
    if len < 1e-6 {
        return None;
    }
    let d = dir / len;

    let mut vx = origin.x.floor() as i32;
    let mut vy = origin.y.floor() as i32;
    let mut vz = origin.z.floor() as i32;

    let stepx = if d.x > 0.0 { 1 } else if d.x < 0.0 { -1 } else { 0 };
    let stepy = if d.y > 0.0 { 1 } else if d.y < 0.0 { -1 } else { 0 };
    let stepz = if d.z > 0.0 { 1 } else if d.z < 0.0 { -1 } else { 0 };

    let tdx = if stepx == 0 { f32::MAX } else { inv_or_max(d.x) };
    let tdy = if stepy == 0 { f32::MAX } else { inv_or_max(d.y) };
    let tdz = if stepz == 0 { f32::MAX } else { inv_or_max(d.z) };

    let fx = origin.x - origin.x.floor();
    let fy = origin.y - origin.y.floor();
    let fz = origin.z - origin.z.floor();
    let mut tmx = if stepx > 0 {
        (1.0 - fx) * tdx
    } else if stepx < 0 {
        fx * tdx
    } else {
        f32::MAX
    };
    let mut tmy = if stepy > 0 {
        (1.0 - fy) * tdy
    } else if stepy < 0 {
        fy * tdy
    } else {
        f32::MAX
    };
    let mut tmz = if stepz > 0 {
        (1.0 - fz) * tdz
    } else if stepz < 0 {
        fz * tdz
    } else {
        f32::MAX
    };

    let mut prevx = vx;
    let mut prevy = vy;
    let mut prevz = vz;
    let mut t = 0.0f32;

    for _ in 0..64 {
        if t > max_dist {
            break;
        }
        if let Some(b) = block_at(vx, vy, vz) {
            if !b.is_air() {
                let (bmin, bmax) = reg.model(b).unit_aabb();
                let cell = Vec3::new(vx as f32, vy as f32, vz as f32);
                let min = cell + Vec3::new(bmin[0], bmin[1], bmin[2]);
                let max = cell + Vec3::new(bmax[0], bmax[1], bmax[2]);
                if ray_hits_box(origin, d, min, max, max_dist) {
                    let dx = vx - prevx;
                    let dy = vy - prevy;
                    let dz = vz - prevz;
                    let (mut nx, mut ny, mut nz) = (0, 0, 0);
                    if dx == 1 {
                        nx = -1;
                    } else if dx == -1 {
                        nx = 1;
                    } else if dy == 1 {
                        ny = -1;
                    } else if dy == -1 {
                        ny = 1;
                    } else if dz == 1 {
                        nz = -1;
                    } else if dz == -1 {
                        nz = 1;
                    }
                    return Some(RayHit {
                        bx: vx,
                        by: vy,
                        bz: vz,
                        px: prevx,
                        py: prevy,
                        pz: prevz,
                        nx,
                        ny,
                        nz,
                    });
                }
            }
        }
        prevx = vx;
        prevy = vy;
        prevz = vz;
        if tmx < tmy {
            if tmx < tmz {
                vx += stepx;
                t = tmx;
                tmx += tdx;
            } else {
                vz += stepz;
                t = tmz;
                tmz += tdz;
            }
        } else if tmy < tmz {
            vy += stepy;
            t = tmy;
            tmy += tdy;
        } else {
            vz += stepz;
            t = tmz;
            tmz += tdz;
        }
    }
    None
}

/// The 12 edges of the selected cell, for the wireframe overlay.
pub fn selection_edges(bx: i32, by: i32, bz: i32) -> [[Vec3; 2]; 12] {
    let o = Vec3::new(bx as f32, by as f32, bz as f32);
    let c = |x: i32, y: i32, z: i32| o + Vec3::new(x as f32, y as f32, z as f32);
    [
        [c(0, 0, 0), c(1, 0, 0)],
        [c(0, 1, 0), c(1, 1, 0)],
        [c(0, 0, 1), c(1, 0, 1)],
        [c(0, 1, 1), c(1, 1, 1)],
        [c(0, 0, 0), c(0, 1, 0)],
        [c(1, 0, 0), c(1, 1, 0)],
        [c(0, 0, 1), c(0, 1, 1)],
        [c(1, 0, 1), c(1, 1, 1)],
        [c(0, 0, 0), c(0, 0, 1)],
        [c(1, 0, 0), c(1, 0, 1)],
        [c(0, 1, 0), c(0, 1, 1)],
        [c(1, 1, 0), c(1, 1, 1)],
    ]
}
