use crate::foundation::core::{Color, Resolution};
use crate::foundation::error::{SlidesError, SlidesResult};
use anyhow::Context as _;
use serde::{Deserialize, Serialize};
use std::ops::Range;
use std::path::{Path, PathBuf};

/// Slide kind tag, serialized as `"slide"`, `"loop"` or `"last"`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SlideKind {
    #[default]
    Slide,
    Loop,
    Last,
}

impl std::fmt::Display for SlideKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Slide => "slide",
            Self::Loop => "loop",
            Self::Last => "last",
        })
    }
}

/// Per-slide playback options shared by descriptors and records.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BaseSlideConfig {
    /// Repeat the slide until the presenter moves on.
    #[serde(rename = "loop")]
    pub looping: bool,
    /// Advance to the next slide as soon as this one ends.
    pub auto_next: bool,
    /// Forward playback speed multiplier.
    pub playback_rate: f64,
    /// Reversed playback speed multiplier.
    pub reversed_playback_rate: f64,
    /// Speaker notes.
    pub notes: String,
    /// Strip common leading indentation from `notes`.
    pub dedent_notes: bool,
}

impl Default for BaseSlideConfig {
    fn default() -> Self {
        Self {
            looping: false,
            auto_next: false,
            playback_rate: 1.0,
            reversed_playback_rate: 1.0,
            notes: String::new(),
            dedent_notes: true,
        }
    }
}

impl BaseSlideConfig {
    /// Config for a looping slide.
    pub fn looping() -> Self {
        Self {
            looping: true,
            ..Self::default()
        }
    }

    /// Validate rates and apply notes dedenting.
    pub fn normalized(mut self) -> SlidesResult<Self> {
        for (name, rate) in [
            ("playback_rate", self.playback_rate),
            ("reversed_playback_rate", self.reversed_playback_rate),
        ] {
            if !rate.is_finite() || rate <= 0.0 {
                return Err(SlidesError::validation(format!(
                    "{name} must be a positive finite number, got {rate}"
                )));
            }
        }
        if self.dedent_notes {
            self.notes = dedent(&self.notes);
        }
        Ok(self)
    }
}

/// Remove the longest whitespace prefix common to every non-blank line.
///
/// Tabs and spaces are not interchangeable: `"\tfoo\n  bar"` has no common prefix.
/// Whitespace-only lines are emptied.
pub fn dedent(text: &str) -> String {
    let mut margin: Option<&str> = None;
    for line in text.split('\n').filter(|l| !l.trim().is_empty()) {
        let indent = &line[..line.len() - line.trim_start_matches([' ', '\t']).len()];
        margin = Some(match margin {
            None => indent,
            Some(m) => common_prefix(m, indent),
        });
    }
    let margin = margin.unwrap_or("");

    let mut out = String::with_capacity(text.len());
    for (i, line) in text.split('\n').enumerate() {
        if i > 0 {
            out.push('\n');
        }
        if line.trim().is_empty() {
            out.push_str(line.trim_start_matches([' ', '\t']));
        } else {
            out.push_str(&line[margin.len()..]);
        }
    }
    out
}

fn common_prefix<'a>(a: &'a str, b: &str) -> &'a str {
    let len = a
        .bytes()
        .zip(b.bytes())
        .take_while(|(x, y)| x == y)
        .count();
    &a[..len]
}

/// Pre-assembly slide: a half-open range of animation indices.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SlideDescriptor {
    #[serde(rename = "type", alias = "kind")]
    pub kind: SlideKind,
    /// 1-based sequence number.
    pub number: usize,
    pub start_animation: usize,
    /// Exclusive.
    pub end_animation: usize,
    #[serde(flatten)]
    pub config: BaseSlideConfig,
}

impl SlideDescriptor {
    pub fn new(
        kind: SlideKind,
        number: usize,
        start_animation: usize,
        end_animation: usize,
        config: BaseSlideConfig,
    ) -> SlidesResult<Self> {
        validate_animation_range(start_animation, end_animation)?;
        Ok(Self {
            kind,
            number,
            start_animation,
            end_animation,
            config: config.normalized()?,
        })
    }

    pub fn range(&self) -> Range<usize> {
        self.start_animation..self.end_animation
    }

    pub fn animation_count(&self) -> usize {
        self.end_animation.saturating_sub(self.start_animation)
    }

    pub fn is_loop(&self) -> bool {
        self.kind == SlideKind::Loop || self.config.looping
    }
}

/// Check `start < end`, with a dedicated message for the empty-scene case.
pub fn validate_animation_range(start: usize, end: usize) -> SlidesResult<()> {
    if start < end {
        return Ok(());
    }
    if start == 0 && end == 0 {
        return Err(SlidesError::validation(
            "you have to play at least one animation before pausing; \
             to start paused, use the start-paused option when presenting",
        ));
    }
    Err(SlidesError::validation(format!(
        "start animation index must be strictly lower than end animation index \
         (got {start}..{end})"
    )))
}

/// Post-assembly slide: one forward clip and its reversed counterpart.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SlideRecord {
    #[serde(rename = "type", alias = "kind")]
    pub kind: SlideKind,
    #[serde(default)]
    pub number: usize,
    pub file: PathBuf,
    pub rev_file: PathBuf,
    #[serde(flatten)]
    pub config: BaseSlideConfig,
    /// Runtime-only flag of the terminal slide.
    #[serde(skip)]
    pub terminated: bool,
}

impl SlideRecord {
    pub fn from_descriptor(
        desc: &SlideDescriptor,
        file: impl Into<PathBuf>,
        rev_file: impl Into<PathBuf>,
    ) -> Self {
        Self {
            kind: desc.kind,
            number: desc.number,
            file: file.into(),
            rev_file: rev_file.into(),
            config: desc.config.clone(),
            terminated: false,
        }
    }

    pub fn is_slide(&self) -> bool {
        self.kind == SlideKind::Slide
    }

    pub fn is_loop(&self) -> bool {
        self.kind == SlideKind::Loop || self.config.looping
    }

    pub fn is_last(&self) -> bool {
        self.kind == SlideKind::Last
    }
}

/// Everything the player needs to present one rendered scene.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PresentationConfig {
    pub slides: Vec<SlideRecord>,
    #[serde(default)]
    pub resolution: Resolution,
    #[serde(default)]
    pub background_color: Color,
}

impl PresentationConfig {
    pub fn new(
        slides: Vec<SlideRecord>,
        resolution: Resolution,
        background_color: Color,
    ) -> SlidesResult<Self> {
        let cfg = Self {
            slides,
            resolution,
            background_color,
        };
        cfg.validate()?;
        Ok(cfg)
    }

    /// Structural checks (no filesystem access).
    pub fn validate(&self) -> SlidesResult<()> {
        if self.slides.is_empty() {
            return Err(SlidesError::validation(
                "presentation config must contain at least one slide",
            ));
        }
        for slide in &self.slides {
            slide.config.clone().normalized()?;
        }
        Ok(())
    }

    /// Fail with [`SlidesError::MissingAnimationFile`] on the first clip that does not exist.
    pub fn check_files(&self) -> SlidesResult<()> {
        for slide in &self.slides {
            for p in [&slide.file, &slide.rev_file] {
                if !p.is_file() {
                    return Err(SlidesError::missing_file(p.clone()));
                }
            }
        }
        Ok(())
    }

    /// Read a config, resolving relative clip paths against the config file's directory.
    pub fn from_file(path: &Path) -> SlidesResult<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("read presentation config '{}'", path.display()))?;
        let mut cfg: Self = serde_json::from_str(&text).map_err(|e| {
            SlidesError::serde(format!(
                "invalid presentation config '{}': {e}",
                path.display()
            ))
        })?;

        let base = path.parent().unwrap_or_else(|| Path::new(""));
        for slide in &mut cfg.slides {
            slide.file = resolve_against(base, &slide.file);
            slide.rev_file = resolve_against(base, &slide.rev_file);
        }

        cfg.validate()?;
        cfg.check_files()?;
        Ok(cfg)
    }

    /// Write the config as pretty JSON, storing clip paths relative to the file's directory.
    pub fn to_file(&self, path: &Path) -> SlidesResult<()> {
        self.validate()?;
        ensure_parent_dir(path)?;

        let base = path.parent().unwrap_or_else(|| Path::new(""));
        let mut out = self.clone();
        for slide in &mut out.slides {
            slide.file = relative_to(base, &slide.file);
            slide.rev_file = relative_to(base, &slide.rev_file);
        }

        let json = serde_json::to_string_pretty(&out)
            .map_err(|e| SlidesError::serde(format!("serialize presentation config: {e}")))?;
        std::fs::write(path, json)
            .with_context(|| format!("write presentation config '{}'", path.display()))?;
        Ok(())
    }

    /// Copy every clip into `folder` and return the config pointing at the copies.
    pub fn copy_to(
        &self,
        folder: &Path,
        use_cached: bool,
        include_reversed: bool,
        prefix: &str,
    ) -> SlidesResult<Self> {
        std::fs::create_dir_all(folder)
            .with_context(|| format!("create folder '{}'", folder.display()))?;

        let mut slides = Vec::with_capacity(self.slides.len());
        for slide in &self.slides {
            let dest = folder.join(prefixed_name(prefix, &slide.file)?);
            let rev_dest = folder.join(prefixed_name(prefix, &slide.rev_file)?);

            if !use_cached || !dest.exists() {
                copy_file(&slide.file, &dest)?;
            }
            if include_reversed && (!use_cached || !rev_dest.exists()) {
                copy_file(&slide.rev_file, &rev_dest)?;
            }

            slides.push(SlideRecord {
                file: dest,
                rev_file: if include_reversed {
                    rev_dest
                } else {
                    slide.rev_file.clone()
                },
                ..slide.clone()
            });
        }

        Ok(Self {
            slides,
            ..self.clone()
        })
    }
}

/// Scene name of a config path (its file stem).
pub fn scene_name(path: &Path) -> Option<String> {
    path.file_stem().map(|s| s.to_string_lossy().into_owned())
}

/// List every loadable `*.json` presentation config in `folder`, sorted by path.
///
/// Files that fail to parse or validate are logged and skipped.
pub fn list_presentation_configs(folder: &Path) -> SlidesResult<Vec<PathBuf>> {
    let entries = std::fs::read_dir(folder)
        .with_context(|| format!("read slides folder '{}'", folder.display()))?;

    let mut candidates = Vec::new();
    for entry in entries {
        let entry = entry.with_context(|| format!("list '{}'", folder.display()))?;
        let path = entry.path();
        if path.is_file() && path.extension().is_some_and(|e| e == "json") {
            candidates.push(path);
        }
    }
    candidates.sort();

    let mut paths = Vec::with_capacity(candidates.len());
    for path in candidates {
        match PresentationConfig::from_file(&path) {
            Ok(_) => paths.push(path),
            Err(e) => {
                tracing::warn!(
                    "something went wrong with parsing presentation config '{}': {e}",
                    path.display()
                );
            }
        }
    }

    tracing::debug!(
        "found {} valid presentation configuration files in '{}'",
        paths.len(),
        folder.display()
    );
    Ok(paths)
}

/// Ensure the parent directory of `path` exists.
pub fn ensure_parent_dir(path: &Path) -> SlidesResult<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create output directory '{}'", parent.display()))?;
    }
    Ok(())
}

fn resolve_against(base: &Path, p: &Path) -> PathBuf {
    if p.is_absolute() {
        p.to_path_buf()
    } else {
        base.join(p)
    }
}

fn relative_to(base: &Path, p: &Path) -> PathBuf {
    if let Ok(rel) = p.strip_prefix(base) {
        return rel.to_path_buf();
    }
    std::path::absolute(p).unwrap_or_else(|_| p.to_path_buf())
}

fn prefixed_name(prefix: &str, p: &Path) -> SlidesResult<String> {
    let name = p
        .file_name()
        .ok_or_else(|| SlidesError::validation(format!("'{}' has no file name", p.display())))?;
    Ok(format!("{prefix}{}", name.to_string_lossy()))
}

fn copy_file(src: &Path, dest: &Path) -> SlidesResult<()> {
    if !src.is_file() {
        return Err(SlidesError::missing_file(src));
    }
    std::fs::copy(src, dest)
        .with_context(|| format!("copy '{}' to '{}'", src.display(), dest.display()))?;
    Ok(())
}

#[cfg(test)]
#[path = "../../tests/unit/slides/model.rs"]
mod tests;
