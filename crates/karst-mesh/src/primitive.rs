use karst_blocks::{Block, BlockRegistry, MODEL_FULL_CUBE};
use karst_gpu::SlabAllocation;

use super::face::{Face, FaceData};

/// The three per-chunk face lists. Selection needs no dispatch: it falls out
/// of the transparency flag and the model index.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PrimitiveKind {
    Opaque = 0,
    Voxel = 1,
    Transparent = 2,
}

pub const PRIMITIVE_KINDS: [PrimitiveKind; 3] = [
    PrimitiveKind::Opaque,
    PrimitiveKind::Voxel,
    PrimitiveKind::Transparent,
];

impl PrimitiveKind {
    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    /// Destination list for a block's faces.
    pub fn classify(reg: &BlockRegistry, b: Block) -> PrimitiveKind {
        if reg.transparent(b.id) {
            PrimitiveKind::Transparent
        } else if reg.model(b).index != MODEL_FULL_CUBE {
            PrimitiveKind::Voxel
        } else {
            PrimitiveKind::Opaque
        }
    }
}

/// One face list: same-chunk core faces plus six per-direction seam lists,
/// concatenated into `complete` at finish time and uploaded through the face
/// slab.
#[derive(Debug, Default)]
pub struct PrimitiveMesh {
    pub core: Vec<FaceData>,
    pub neighbor: [Vec<FaceData>; 6],
    pub complete: Vec<FaceData>,
    pub alloc: SlabAllocation,
    pub was_changed: bool,
    /// Player cell of the last transparent sort, used to skip re-sorts during
    /// sub-cell motion.
    pub last_sort_cell: Option<[i32; 3]>,
}

impl PrimitiveMesh {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear_core(&mut self) {
        if !self.core.is_empty() {
            self.core.clear();
            self.was_changed = true;
        }
    }

    pub fn clear_neighbor(&mut self, dir: Face) {
        let list = &mut self.neighbor[dir.index()];
        if !list.is_empty() {
            list.clear();
            self.was_changed = true;
        }
    }

    #[inline]
    pub fn push_core(&mut self, f: FaceData) {
        self.core.push(f);
        self.was_changed = true;
    }

    #[inline]
    pub fn push_neighbor(&mut self, dir: Face, f: FaceData) {
        self.neighbor[dir.index()].push(f);
        self.was_changed = true;
    }

    /// Removes the face occupying `slot`'s cell/orientation from the core
    /// list; returns whether one was there.
    pub fn remove_core(&mut self, slot: FaceData) -> bool {
        if let Some(i) = self.core.iter().position(|f| f.same_slot(slot)) {
            self.core.swap_remove(i);
            self.was_changed = true;
            return true;
        }
        false
    }

    pub fn remove_neighbor(&mut self, dir: Face, slot: FaceData) -> bool {
        let list = &mut self.neighbor[dir.index()];
        if let Some(i) = list.iter().position(|f| f.same_slot(slot)) {
            list.swap_remove(i);
            self.was_changed = true;
            return true;
        }
        false
    }

    /// Faces across core and seam lists.
    pub fn face_count(&self) -> usize {
        self.core.len() + self.neighbor.iter().map(Vec::len).sum::<usize>()
    }

    /// Rebuilds the contiguous upload buffer: core first, then the six
    /// neighbor lists in direction order.
    pub fn build_complete(&mut self) {
        self.complete.clear();
        self.complete.reserve(self.face_count());
        self.complete.extend_from_slice(&self.core);
        for list in &self.neighbor {
            self.complete.extend_from_slice(list);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.face_count() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> BlockRegistry {
        BlockRegistry::from_toml_str(
            r#"
            [[blocks]]
            name = "stone"

            [[blocks]]
            name = "water"
            solid = false
            transparent = true
            view_through = true
            back_face = true

            [[blocks]]
            name = "torch"
            solid = false
            model = { index = 3, min = [6, 0, 6], max = [10, 12, 10] }
            "#,
        )
        .unwrap()
    }

    #[test]
    fn classification_follows_flags_and_model() {
        let reg = registry();
        let id = |n: &str| Block::new(reg.id_by_name(n).unwrap(), 0);
        assert_eq!(PrimitiveKind::classify(&reg, id("stone")), PrimitiveKind::Opaque);
        assert_eq!(
            PrimitiveKind::classify(&reg, id("water")),
            PrimitiveKind::Transparent
        );
        assert_eq!(PrimitiveKind::classify(&reg, id("torch")), PrimitiveKind::Voxel);
    }

    #[test]
    fn complete_concatenates_core_then_seams() {
        let mut pm = PrimitiveMesh::new();
        let a = FaceData::pack(1, 2, 3, false, Face::PosY, 0, 1, 0);
        let b = FaceData::pack(0, 2, 3, false, Face::PosX, 0, 1, 0);
        pm.push_core(a);
        pm.push_neighbor(Face::PosX, b);
        pm.build_complete();
        assert_eq!(pm.complete, vec![a, b]);
        assert_eq!(pm.face_count(), 2);
    }

    #[test]
    fn remove_matches_slot_not_payload() {
        let mut pm = PrimitiveMesh::new();
        pm.push_core(FaceData::pack(4, 5, 6, false, Face::NegZ, 9, 77, 3));
        // Same cell and orientation, different block payload.
        let probe = FaceData::pack(4, 5, 6, false, Face::NegZ, 0, 1, 0);
        assert!(pm.remove_core(probe));
        assert!(!pm.remove_core(probe));
    }
}
