use karst_blocks::{Block, BlockRegistry};

use super::pos::{ChunkPos, CHUNK_SHIFT, CHUNK_SIZE, CHUNK_VOLUME};

/// Light channels per voxel: RGB sun light then RGB block light.
pub const LIGHT_CHANNELS: usize = 6;

/// Dense 32^3 voxel grid at one level of detail. Each cell spans
/// `voxel_size` world units; coordinates passed in world units are reduced
/// through the position's shift.
#[derive(Clone, Debug)]
pub struct Chunk {
    pub pos: ChunkPos,
    blocks: Vec<Block>,
    /// Six bytes per voxel, produced by the lighting collaborator. Absent
    /// until delivered; reads then yield darkness.
    light: Option<Vec<u8>>,
    was_changed: bool,
    was_cleaned: bool,
    generated: bool,
}

impl Chunk {
    /// Creates an all-air chunk that is positioned but not yet generated.
    pub fn empty(pos: ChunkPos) -> Self {
        Self {
            pos,
            blocks: vec![Block::AIR; CHUNK_VOLUME],
            light: None,
            was_changed: false,
            was_cleaned: false,
            generated: false,
        }
    }

    /// Builds a chunk from a network payload of packed 32-bit words. Unknown
    /// block ids are scrubbed to air rather than poisoning the mesher.
    pub fn from_payload(pos: ChunkPos, words: &[u32], reg: &BlockRegistry) -> Self {
        let mut blocks = Vec::with_capacity(CHUNK_VOLUME);
        let mut unknown = 0usize;
        for i in 0..CHUNK_VOLUME {
            let b = words.get(i).copied().map(Block::from_word).unwrap_or(Block::AIR);
            if reg.is_known(b.id) {
                blocks.push(b);
            } else {
                unknown += 1;
                blocks.push(Block::AIR);
            }
        }
        if unknown > 0 {
            log::warn!(
                "chunk payload at ({},{},{})x{} held {} unknown block ids; substituted air",
                pos.wx,
                pos.wy,
                pos.wz,
                pos.voxel_size,
                unknown
            );
        }
        if words.len() != CHUNK_VOLUME {
            log::warn!(
                "chunk payload at ({},{},{}) had {} words, expected {}",
                pos.wx,
                pos.wy,
                pos.wz,
                words.len(),
                CHUNK_VOLUME
            );
        }
        Self {
            pos,
            blocks,
            light: None,
            was_changed: false,
            was_cleaned: false,
            generated: true,
        }
    }

    #[inline]
    pub fn idx(x: i32, y: i32, z: i32) -> usize {
        debug_assert!((0..CHUNK_SIZE).contains(&x));
        debug_assert!((0..CHUNK_SIZE).contains(&y));
        debug_assert!((0..CHUNK_SIZE).contains(&z));
        ((x << CHUNK_SHIFT) | (y << (CHUNK_SHIFT * 2)) | z) as usize
    }

    #[inline]
    pub fn get(&self, x: i32, y: i32, z: i32) -> Block {
        self.blocks[Self::idx(x, y, z)]
    }

    #[inline]
    pub fn set(&mut self, x: i32, y: i32, z: i32, b: Block) {
        self.blocks[Self::idx(x, y, z)] = b;
    }

    #[inline]
    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    /// Whether a world-unit coordinate falls inside this chunk. Callers are
    /// expected to check this before the mutators below.
    #[inline]
    pub fn lies_in_chunk(&self, wx: i32, wy: i32, wz: i32) -> bool {
        self.pos.contains(wx, wy, wz)
    }

    /// World units to cell coordinates within this chunk.
    #[inline]
    pub fn cell_of(&self, wx: i32, wy: i32, wz: i32) -> (i32, i32, i32) {
        let s = self.pos.size_shift();
        (
            (wx - self.pos.wx) >> s,
            (wy - self.pos.wy) >> s,
            (wz - self.pos.wz) >> s,
        )
    }

    /// Unconditional write; records the change for remeshing.
    pub fn update_block(&mut self, wx: i32, wy: i32, wz: i32, b: Block) {
        debug_assert!(self.lies_in_chunk(wx, wy, wz));
        let (x, y, z) = self.cell_of(wx, wy, wz);
        self.set(x, y, z, b);
        self.was_changed = true;
    }

    /// Writes only over air or degradable blocks (foliage, snow layers);
    /// returns whether the write happened.
    pub fn update_block_if_degradable(
        &mut self,
        wx: i32,
        wy: i32,
        wz: i32,
        b: Block,
        reg: &BlockRegistry,
    ) -> bool {
        debug_assert!(self.lies_in_chunk(wx, wy, wz));
        let (x, y, z) = self.cell_of(wx, wy, wz);
        let cur = self.get(x, y, z);
        if !cur.is_air() && !reg.degradable(cur.id) {
            return false;
        }
        self.set(x, y, z, b);
        self.was_changed = true;
        true
    }

    /// Write used while a generation pipeline is still filling the chunk; the
    /// change flag stays untouched so no remesh is queued.
    pub fn update_block_in_generation(&mut self, wx: i32, wy: i32, wz: i32, b: Block) {
        debug_assert!(self.lies_in_chunk(wx, wy, wz));
        let (x, y, z) = self.cell_of(wx, wy, wz);
        self.set(x, y, z, b);
    }

    /// Installs the per-voxel light volume delivered by the lighting
    /// collaborator (six bytes per voxel).
    pub fn set_light(&mut self, data: Vec<u8>) {
        if data.len() != CHUNK_VOLUME * LIGHT_CHANNELS {
            log::warn!(
                "light volume for ({},{},{}) had {} bytes, expected {}; dropped",
                self.pos.wx,
                self.pos.wy,
                self.pos.wz,
                data.len(),
                CHUNK_VOLUME * LIGHT_CHANNELS
            );
            return;
        }
        self.light = Some(data);
    }

    /// Six light channels at one cell; darkness when no volume is present.
    #[inline]
    pub fn light_at(&self, x: i32, y: i32, z: i32) -> [u8; LIGHT_CHANNELS] {
        match &self.light {
            Some(l) => {
                let base = Self::idx(x, y, z) * LIGHT_CHANNELS;
                [
                    l[base],
                    l[base + 1],
                    l[base + 2],
                    l[base + 3],
                    l[base + 4],
                    l[base + 5],
                ]
            }
            None => [0; LIGHT_CHANNELS],
        }
    }

    #[inline]
    pub fn was_changed(&self) -> bool {
        self.was_changed
    }

    #[inline]
    pub fn set_changed(&mut self) {
        self.was_changed = true;
        self.was_cleaned = false;
    }

    /// Marks the current contents as consumed by the mesher.
    #[inline]
    pub fn mark_cleaned(&mut self) {
        self.was_changed = false;
        self.was_cleaned = true;
    }

    #[inline]
    pub fn was_cleaned(&self) -> bool {
        self.was_cleaned
    }

    #[inline]
    pub fn is_generated(&self) -> bool {
        self.generated
    }

    #[inline]
    pub fn mark_generated(&mut self) {
        self.generated = true;
    }

    #[inline]
    pub fn is_all_air(&self) -> bool {
        self.blocks.iter().all(|b| b.is_air())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idx_matches_bit_layout() {
        assert_eq!(Chunk::idx(0, 0, 0), 0);
        assert_eq!(Chunk::idx(1, 0, 0), 1 << 5);
        assert_eq!(Chunk::idx(0, 1, 0), 1 << 10);
        assert_eq!(Chunk::idx(0, 0, 1), 1);
        assert_eq!(Chunk::idx(31, 31, 31), CHUNK_VOLUME - 1);
    }

    #[test]
    fn update_policies_differ_only_in_bookkeeping() {
        let reg = BlockRegistry::new();
        let mut c = Chunk::empty(ChunkPos::new(0, 0, 0, 1));
        c.update_block_in_generation(1, 2, 3, Block::new(0, 7));
        assert!(!c.was_changed());
        c.update_block(1, 2, 3, Block::new(0, 9));
        assert!(c.was_changed());
        // Air is always overwritable by the degradable path.
        assert!(c.update_block_if_degradable(4, 4, 4, Block::AIR, &reg));
    }

    #[test]
    fn coarse_chunk_reduces_world_units() {
        let mut c = Chunk::empty(ChunkPos::new(64, 0, 0, 2));
        c.update_block(70, 2, 5, Block::new(0, 1));
        assert_eq!(c.get(3, 1, 2).data, 1);
    }

    #[test]
    fn payload_scrubs_unknown_ids() {
        let reg = BlockRegistry::new(); // air only
        let mut words = vec![0u32; CHUNK_VOLUME];
        words[0] = Block::new(500, 0).to_word();
        let c = Chunk::from_payload(ChunkPos::new(0, 0, 0, 1), &words, &reg);
        assert!(c.get(0, 0, 0).is_air());
        assert!(c.is_generated());
    }
}
