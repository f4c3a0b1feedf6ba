use serde::Deserialize;

/// Top-level `blocks.toml` document.
#[derive(Deserialize)]
pub struct BlocksConfig {
    pub blocks: Vec<BlockDef>,
}

#[derive(Deserialize)]
pub struct BlockDef {
    pub name: String,
    /// Explicit id; defaults to the declaration index.
    pub id: Option<u16>,
    pub solid: Option<bool>,
    pub transparent: Option<bool>,
    /// Faces against a same-typed neighbor are hidden, everything else shows
    /// through (glass, water).
    pub view_through: Option<bool>,
    pub degradable: Option<bool>,
    pub back_face: Option<bool>,
    pub light: Option<u8>,
    pub absorption: Option<u8>,
    pub model: Option<ModelDef>,
}

#[derive(Deserialize)]
pub struct ModelDef {
    pub index: u16,
    pub permutation: Option<u8>,
    pub min: Option<[u8; 3]>,
    pub max: Option<[u8; 3]>,
}
