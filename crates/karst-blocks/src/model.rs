//! Voxel models: 16-unit-cell extents plus a packed face permutation.
//!
//! Face direction indices match the mesher: 0=+Y, 1=-Y, 2=+X, 3=-X, 4=+Z,
//! 5=-Z. The opposite of `d` is always `d ^ 1`.

/// Model index of the canonical full cube. Blocks with this model occupy the
/// whole cell and take the fast meshing path.
pub const MODEL_FULL_CUBE: u16 = 0;

const AXIS_X: usize = 0;
const AXIS_Y: usize = 1;
const AXIS_Z: usize = 2;

// axis order tables for the low three permutation bits
const AXIS_ORDERS: [[usize; 3]; 6] = [
    [AXIS_X, AXIS_Y, AXIS_Z],
    [AXIS_X, AXIS_Z, AXIS_Y],
    [AXIS_Y, AXIS_X, AXIS_Z],
    [AXIS_Y, AXIS_Z, AXIS_X],
    [AXIS_Z, AXIS_X, AXIS_Y],
    [AXIS_Z, AXIS_Y, AXIS_X],
];

#[inline]
fn axis_of(dir: u8) -> usize {
    match dir {
        0 | 1 => AXIS_Y,
        2 | 3 => AXIS_X,
        _ => AXIS_Z,
    }
}

#[inline]
fn dir_from(axis: usize, positive: bool) -> u8 {
    let base = match axis {
        AXIS_Y => 0,
        AXIS_X => 2,
        _ => 4,
    };
    if positive { base } else { base | 1 }
}

/// Six-bit block rotation: bits 0..3 select one of the six axis orders, bits
/// 3..6 flip the mapped X/Y/Z axes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Permutation(pub u8);

impl Permutation {
    pub const IDENTITY: Permutation = Permutation(0);

    #[inline]
    pub fn bits(self) -> u8 {
        self.0 & 0x3F
    }

    /// Maps a world face direction into the model's local frame.
    pub fn apply(self, dir: u8) -> u8 {
        debug_assert!(dir < 6);
        let order = &AXIS_ORDERS[(self.0 & 0x07).min(5) as usize];
        let axis = order[axis_of(dir)];
        let mut positive = dir & 1 == 0;
        if self.0 >> (3 + axis as u8) & 1 == 1 {
            positive = !positive;
        }
        dir_from(axis, positive)
    }
}

/// Extents and orientation of one voxel model, in 16-unit cells of the block
/// cube. The full cube is `min = (0,0,0)`, `max = (16,16,16)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BlockModel {
    pub index: u16,
    pub permutation: Permutation,
    pub min: [u8; 3],
    pub max: [u8; 3],
}

impl BlockModel {
    pub const FULL_CUBE: BlockModel = BlockModel {
        index: MODEL_FULL_CUBE,
        permutation: Permutation::IDENTITY,
        min: [0, 0, 0],
        max: [16, 16, 16],
    };

    #[inline]
    pub fn is_full_cube(&self) -> bool {
        self.index == MODEL_FULL_CUBE
    }

    /// Whether the model covers the entire cube face behind `local_dir`.
    /// A freestanding model (one that leaves any part of a face open) always
    /// exposes the neighbor across that face.
    pub fn fills_local_face(&self, local_dir: u8) -> bool {
        debug_assert!(local_dir < 6);
        let axis = axis_of(local_dir);
        let touches = if local_dir & 1 == 0 {
            self.max[axis] == 16
        } else {
            self.min[axis] == 0
        };
        if !touches {
            return false;
        }
        (0..3)
            .filter(|a| *a != axis)
            .all(|a| self.min[a] == 0 && self.max[a] == 16)
    }

    /// Face coverage for a world direction, after rotating into model space.
    #[inline]
    pub fn fills_face(&self, dir: u8) -> bool {
        self.fills_local_face(self.permutation.apply(dir))
    }

    /// Model AABB in world units for a unit cell (16-unit extents scaled by
    /// 1/16), used by the block-selection ray cast.
    pub fn unit_aabb(&self) -> ([f32; 3], [f32; 3]) {
        let s = 1.0 / 16.0;
        (
            [
                f32::from(self.min[0]) * s,
                f32::from(self.min[1]) * s,
                f32::from(self.min[2]) * s,
            ],
            [
                f32::from(self.max[0]) * s,
                f32::from(self.max[1]) * s,
                f32::from(self.max[2]) * s,
            ],
        )
    }
}
