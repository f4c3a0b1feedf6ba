use std::error::Error;
use std::fs;
use std::path::Path;

use serde::Deserialize;

/// Client rendering settings, loaded from `render.toml`. Every field has a
/// playable default so a missing file or key never blocks startup.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Render radius at full detail, in chunks.
    pub render_distance: i32,
    /// Scale applied to the coarser LOD radii.
    pub lod_factor: f32,
    /// Power-of-two exponent of the coarsest LOD.
    pub highest_lod: u8,
    pub bloom: bool,
    /// Vertical field of view in degrees.
    pub fov: f32,
    pub vsync: bool,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            render_distance: 8,
            lod_factor: 1.0,
            highest_lod: 3,
            bloom: true,
            fov: 80.0,
            vsync: true,
        }
    }
}

impl RenderConfig {
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self, Box<dyn Error>> {
        let text = fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    pub fn from_toml_str(text: &str) -> Result<Self, Box<dyn Error>> {
        let cfg: RenderConfig = toml::from_str(text)?;
        Ok(cfg.validated())
    }

    /// Clamps out-of-range values instead of failing: a hand-edited config
    /// should degrade, not crash.
    pub fn validated(mut self) -> Self {
        if self.highest_lod > 5 {
            log::warn!("highest_lod {} capped to 5", self.highest_lod);
            self.highest_lod = 5;
        }
        self.render_distance = self.render_distance.max(1);
        self.lod_factor = self.lod_factor.clamp(0.25, 4.0);
        self.fov = self.fov.clamp(30.0, 120.0);
        self
    }

    #[inline]
    pub fn fov_radians(&self) -> f32 {
        self.fov.to_radians()
    }
}
