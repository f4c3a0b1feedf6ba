use std::collections::HashMap;
use std::error::Error;
use std::fs;
use std::path::Path;

use super::config::BlocksConfig;
use super::model::{BlockModel, Permutation, MODEL_FULL_CUBE};
use super::types::{Block, BlockId};

/// Compiled per-type attributes. The mesher only ever reads these through the
/// registry accessors below.
#[derive(Clone, Debug)]
pub struct BlockType {
    pub name: String,
    pub solid: bool,
    pub transparent: bool,
    pub view_through: bool,
    pub degradable: bool,
    pub has_back_face: bool,
    pub light: u8,
    pub absorption: u8,
    pub model: BlockModel,
}

impl BlockType {
    fn air() -> Self {
        Self {
            name: "air".to_string(),
            solid: false,
            transparent: true,
            view_through: true,
            degradable: true,
            has_back_face: false,
            light: 0,
            absorption: 0,
            model: BlockModel::FULL_CUBE,
        }
    }
}

#[derive(Clone, Debug)]
pub struct BlockRegistry {
    pub blocks: Vec<BlockType>,
    pub by_name: HashMap<String, BlockId>,
}

impl Default for BlockRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl BlockRegistry {
    /// Registry holding only air (id 0).
    pub fn new() -> Self {
        let mut by_name = HashMap::new();
        by_name.insert("air".to_string(), 0);
        Self {
            blocks: vec![BlockType::air()],
            by_name,
        }
    }

    #[inline]
    pub fn get(&self, id: BlockId) -> Option<&BlockType> {
        self.blocks.get(id as usize)
    }

    #[inline]
    pub fn is_known(&self, id: BlockId) -> bool {
        (id as usize) < self.blocks.len()
    }

    pub fn id_by_name(&self, name: &str) -> Option<BlockId> {
        self.by_name.get(name).copied()
    }

    #[inline]
    pub fn transparent(&self, id: BlockId) -> bool {
        self.get(id).map(|t| t.transparent).unwrap_or(true)
    }

    #[inline]
    pub fn view_through(&self, id: BlockId) -> bool {
        self.get(id).map(|t| t.view_through).unwrap_or(true)
    }

    #[inline]
    pub fn solid(&self, id: BlockId) -> bool {
        self.get(id).map(|t| t.solid).unwrap_or(false)
    }

    #[inline]
    pub fn degradable(&self, id: BlockId) -> bool {
        self.get(id).map(|t| t.degradable).unwrap_or(false)
    }

    #[inline]
    pub fn has_back_face(&self, id: BlockId) -> bool {
        self.get(id).map(|t| t.has_back_face).unwrap_or(false)
    }

    #[inline]
    pub fn light(&self, id: BlockId) -> u8 {
        self.get(id).map(|t| t.light).unwrap_or(0)
    }

    #[inline]
    pub fn absorption(&self, id: BlockId) -> u8 {
        self.get(id).map(|t| t.absorption).unwrap_or(0)
    }

    /// Resolves the rotated model of `b`. Unknown ids fall back to the full
    /// cube, the one substitution the mesher is allowed to draw for garbage.
    pub fn model(&self, b: Block) -> BlockModel {
        match self.get(b.id) {
            Some(ty) => ty.model,
            None => {
                log::warn!("unknown model for block id {}; drawing a full cube", b.id);
                BlockModel::FULL_CUBE
            }
        }
    }

    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self, Box<dyn Error>> {
        let text = fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    pub fn from_toml_str(text: &str) -> Result<Self, Box<dyn Error>> {
        let cfg: BlocksConfig = toml::from_str(text)?;
        Self::from_config(cfg)
    }

    pub fn from_config(cfg: BlocksConfig) -> Result<Self, Box<dyn Error>> {
        let mut reg = BlockRegistry::new();
        for def in cfg.blocks.into_iter() {
            let id = def.id.unwrap_or(reg.blocks.len() as u16);
            if id == 0 {
                // id 0 is always air; a config row naming it only renames.
                continue;
            }
            let solid = def.solid.unwrap_or(true);
            let model = match def.model {
                Some(m) => BlockModel {
                    index: m.index,
                    permutation: Permutation(m.permutation.unwrap_or(0) & 0x3F),
                    min: m.min.unwrap_or([0, 0, 0]),
                    max: m.max.unwrap_or([16, 16, 16]),
                },
                None => BlockModel::FULL_CUBE,
            };
            let ty = BlockType {
                name: def.name.clone(),
                solid,
                transparent: def.transparent.unwrap_or(false),
                view_through: def.view_through.unwrap_or(false),
                degradable: def.degradable.unwrap_or(false),
                has_back_face: def.back_face.unwrap_or(false),
                light: def.light.unwrap_or(0),
                absorption: def.absorption.unwrap_or(if solid { 255 } else { 0 }),
                model,
            };
            let slot = id as usize;
            if slot >= reg.blocks.len() {
                reg.blocks.resize_with(slot + 1, BlockType::air);
            }
            reg.blocks[slot] = ty;
            reg.by_name.insert(def.name, id);
        }
        Ok(reg)
    }

    /// True when the model index marks a non-cube shape that always exposes
    /// its neighbors.
    #[inline]
    pub fn has_freestanding_model(&self, b: Block) -> bool {
        self.model(b).index != MODEL_FULL_CUBE
    }
}
