use crate::foundation::core::{Color, Resolution};
use crate::foundation::error::{SlidesError, SlidesResult};
use crate::slides::model::BaseSlideConfig;
use anyhow::Context as _;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// What the assembler needs from whatever rendered the scene.
pub trait SceneRenderer {
    /// Scene name, used for the output config and clip folder.
    fn scene_name(&self) -> &str;
    /// Pixel resolution of the rendered clips.
    fn resolution(&self) -> Resolution;
    fn background_color(&self) -> Color;
    /// One entry per `play` call, in order. `None` marks animations skipped by a partial render.
    fn partial_movie_files(&self) -> Vec<Option<PathBuf>>;
    /// Animation index the render was restarted at, if any.
    fn start_at_animation_number(&self) -> Option<usize> {
        None
    }
    fn show_progress(&self) -> bool {
        false
    }
    fn leave_progress(&self) -> bool {
        false
    }
}

/// One recorded scene-script call.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum SceneEvent {
    Play {
        #[serde(default = "one")]
        count: usize,
    },
    NextSlide(BaseSlideConfig),
    StartLoop,
    EndLoop,
}

fn one() -> usize {
    1
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProgressMode {
    #[default]
    None,
    Display,
    Leave,
}

/// JSON handoff from a renderer: clip files, scene metadata and the recorded event script.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SceneManifest {
    pub scene: String,
    #[serde(default)]
    pub resolution: Resolution,
    #[serde(default)]
    pub background_color: Color,
    pub partial_movie_files: Vec<Option<PathBuf>>,
    #[serde(default)]
    pub start_at_animation_number: Option<usize>,
    #[serde(default)]
    pub progress: ProgressMode,
    pub events: Vec<SceneEvent>,
}

impl SceneManifest {
    /// Read a manifest, resolving relative clip paths against its directory.
    pub fn from_file(path: &Path) -> SlidesResult<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("read scene manifest '{}'", path.display()))?;
        let mut manifest: Self = serde_json::from_str(&text).map_err(|e| {
            SlidesError::serde(format!("invalid scene manifest '{}': {e}", path.display()))
        })?;

        if manifest.scene.trim().is_empty() {
            return Err(SlidesError::validation("scene manifest has an empty scene name"));
        }

        let base = path.parent().unwrap_or_else(|| Path::new(""));
        for file in manifest.partial_movie_files.iter_mut().flatten() {
            if file.is_relative() {
                *file = base.join(&*file);
            }
        }
        Ok(manifest)
    }
}

impl SceneRenderer for SceneManifest {
    fn scene_name(&self) -> &str {
        &self.scene
    }

    fn resolution(&self) -> Resolution {
        self.resolution
    }

    fn background_color(&self) -> Color {
        self.background_color
    }

    fn partial_movie_files(&self) -> Vec<Option<PathBuf>> {
        self.partial_movie_files.clone()
    }

    fn start_at_animation_number(&self) -> Option<usize> {
        self.start_at_animation_number
    }

    fn show_progress(&self) -> bool {
        self.progress != ProgressMode::None
    }

    fn leave_progress(&self) -> bool {
        self.progress == ProgressMode::Leave
    }
}

#[cfg(test)]
#[path = "../../tests/unit/record/renderer.rs"]
mod tests;
