use serde::Serialize;

/// Colour part of a scene preset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SceneColor {
    /// Colour temperature in kelvin
    ColorTemp { kelvin: u16 },
    Rgb { r: u8, g: u8, b: u8 },
}

/// A light preset applied by the Pico's middle button.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ScenePreset {
    pub color: SceneColor,
    pub brightness_pct: u8,
}

impl ScenePreset {
    pub const fn kelvin(kelvin: u16, brightness_pct: u8) -> Self {
        Self {
            color: SceneColor::ColorTemp { kelvin },
            brightness_pct,
        }
    }

    pub const fn rgb(r: u8, g: u8, b: u8, brightness_pct: u8) -> Self {
        Self {
            color: SceneColor::Rgb { r, g, b },
            brightness_pct,
        }
    }
}

pub const DEFAULT_SCENES: [ScenePreset; 5] = [
    ScenePreset::kelvin(3500, 100),
    ScenePreset::kelvin(2500, 100),
    ScenePreset::rgb(255, 0, 0, 100),
    ScenePreset::rgb(0, 255, 0, 100),
    ScenePreset::rgb(0, 0, 255, 100),
];

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("scene list must contain at least one scene")]
pub struct EmptySceneList;

/// Fixed, non-empty, ordered list of scene presets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SceneCycle {
    scenes: Vec<ScenePreset>,
}

impl SceneCycle {
    pub fn new(scenes: Vec<ScenePreset>) -> Result<Self, EmptySceneList> {
        if scenes.is_empty() {
            return Err(EmptySceneList);
        }
        Ok(Self { scenes })
    }

    pub fn len(&self) -> usize {
        self.scenes.len()
    }

    pub fn scenes(&self) -> &[ScenePreset] {
        &self.scenes
    }

    /// Advance from `previous` to the next preset, wrapping at the end.
    ///
    /// With no previous index the first preset is chosen.
    pub fn next(&self, previous: Option<usize>) -> (usize, &ScenePreset) {
        let index = match previous {
            Some(previous) => (previous + 1) % self.scenes.len(),
            None => 0,
        };
        (index, &self.scenes[index])
    }
}

impl Default for SceneCycle {
    fn default() -> Self {
        Self {
            scenes: DEFAULT_SCENES.to_vec(),
        }
    }
}
