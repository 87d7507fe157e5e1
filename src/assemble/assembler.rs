use crate::assemble::media::MediaTools;
use crate::foundation::error::{SlidesError, SlidesResult};
use crate::record::renderer::SceneRenderer;
use crate::slides::model::{PresentationConfig, SlideDescriptor, SlideRecord};
use anyhow::Context as _;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

/// Output layout and caching policy for one assembly run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AssembleOpts {
    /// Slides folder; clips go to `files/<scene>/`, the config to `<scene>.json`.
    pub folder: PathBuf,
    /// Skip merge/reverse work when the destination file already exists.
    pub use_cache: bool,
    /// Use the forward clip as the reverse clip.
    pub skip_reversing: bool,
}

impl Default for AssembleOpts {
    fn default() -> Self {
        Self {
            folder: PathBuf::from(crate::config::DEFAULT_FOLDER_PATH),
            use_cache: true,
            skip_reversing: false,
        }
    }
}

/// A slide whose merge or reverse step failed.
#[derive(Debug)]
pub struct SlideFailure {
    pub number: usize,
    pub error: SlidesError,
}

/// Result of [`Assembler::assemble`].
#[derive(Debug)]
pub struct AssembleReport {
    pub config_path: PathBuf,
    pub config: PresentationConfig,
    pub failures: Vec<SlideFailure>,
}

impl AssembleReport {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Merges per-animation clips into per-slide clips and writes the presentation config.
#[derive(Debug)]
pub struct Assembler<M> {
    tools: M,
    opts: AssembleOpts,
}

impl<M: MediaTools> Assembler<M> {
    pub fn new(tools: M, opts: AssembleOpts) -> Self {
        Self { tools, opts }
    }

    pub fn opts(&self) -> &AssembleOpts {
        &self.opts
    }

    pub fn tools(&self) -> &M {
        &self.tools
    }

    /// Folder receiving the merged and reversed clips of `scene`.
    pub fn scene_files_folder(&self, scene: &str) -> PathBuf {
        self.opts.folder.join("files").join(scene)
    }

    pub fn config_path(&self, scene: &str) -> PathBuf {
        self.opts.folder.join(format!("{scene}.json"))
    }

    /// Merge the clips of `desc` into one file in `dest_dir` and return its path.
    ///
    /// A single-clip range is copied byte for byte.
    pub fn merge(
        &self,
        desc: &SlideDescriptor,
        clips: &[PathBuf],
        dest_dir: &Path,
    ) -> SlidesResult<PathBuf> {
        let slide_files = clips.get(desc.range()).ok_or_else(|| {
            SlidesError::validation(format!(
                "slide {} covers animations {}..{} but only {} clips were rendered",
                desc.number,
                desc.start_animation,
                desc.end_animation,
                clips.len()
            ))
        })?;
        let name = merge_basenames(slide_files)?;
        let dest = dest_dir.join(name);

        if self.opts.use_cache && dest.exists() {
            tracing::debug!("using cached merged clip '{}'", dest.display());
            return Ok(dest);
        }

        if let [only] = slide_files {
            std::fs::copy(only, &dest)
                .with_context(|| format!("copy '{}' to '{}'", only.display(), dest.display()))?;
        } else {
            self.tools.concatenate(slide_files, &dest)?;
        }
        Ok(dest)
    }

    /// Produce the reverse clip of `file`, or alias it when reversing is skipped.
    pub fn reverse(&self, file: &Path) -> SlidesResult<PathBuf> {
        if self.opts.skip_reversing {
            return Ok(file.to_path_buf());
        }
        let dest = reversed_name(file)?;
        if self.opts.use_cache && dest.exists() {
            tracing::debug!("using cached reversed clip '{}'", dest.display());
            return Ok(dest);
        }
        self.tools.reverse(file, &dest)?;
        Ok(dest)
    }

    /// Turn descriptors and rendered clips into slide records and persist the config.
    ///
    /// A missing clip aborts the run. A failed merge or reverse only drops its slide.
    #[tracing::instrument(skip_all, fields(scene = renderer.scene_name()))]
    pub fn assemble(
        &self,
        descriptors: &[SlideDescriptor],
        renderer: &dyn SceneRenderer,
    ) -> SlidesResult<AssembleReport> {
        let scene = renderer.scene_name();
        let files: Vec<PathBuf> = renderer
            .partial_movie_files()
            .into_iter()
            .flatten()
            .collect();
        for file in &files {
            if !file.is_file() {
                return Err(SlidesError::missing_file(file.clone()));
            }
        }

        let descriptors = apply_offset(descriptors, renderer.start_at_animation_number());
        let scene_dir = self.scene_files_folder(scene);
        std::fs::create_dir_all(&scene_dir)
            .with_context(|| format!("create folder '{}'", scene_dir.display()))?;

        let total = descriptors.len();
        let show_progress = renderer.show_progress();
        let mut slides = Vec::with_capacity(total);
        let mut failures = Vec::new();

        for (i, desc) in descriptors.iter().enumerate() {
            match self
                .merge(desc, &files, &scene_dir)
                .and_then(|file| self.reverse(&file).map(|rev| (file, rev)))
            {
                Ok((file, rev)) => slides.push(SlideRecord::from_descriptor(desc, file, rev)),
                Err(e @ SlidesError::MissingAnimationFile { .. })
                | Err(e @ SlidesError::Validation(_)) => return Err(e),
                Err(error) => {
                    tracing::error!("slide {} of '{scene}' failed: {error}", desc.number);
                    failures.push(SlideFailure {
                        number: desc.number,
                        error,
                    });
                }
            }
            if show_progress {
                tracing::info!("{scene}: processed slide {}/{total}", i + 1);
            }
        }
        if show_progress && !renderer.leave_progress() {
            tracing::debug!("{scene}: slide processing finished");
        }

        if slides.is_empty() {
            return Err(SlidesError::media(format!(
                "no slide of '{scene}' could be assembled ({} failures)",
                failures.len()
            )));
        }

        tracing::info!(
            "generated {} slides to '{}'",
            slides.len(),
            scene_dir.display()
        );

        let config = PresentationConfig::new(
            slides,
            renderer.resolution(),
            renderer.background_color(),
        )?;
        let config_path = self.config_path(scene);
        persist(&config, &config_path)?;
        tracing::info!(
            "slide '{scene}' configuration written in '{}'",
            config_path.display()
        );

        Ok(AssembleReport {
            config_path,
            config,
            failures,
        })
    }
}

/// Serialize `config` to `path`.
pub fn persist(config: &PresentationConfig, path: &Path) -> SlidesResult<()> {
    config.to_file(path)
}

/// Drop descriptors that end at or before `offset` and shift the rest down by it.
pub fn apply_offset(descriptors: &[SlideDescriptor], offset: Option<usize>) -> Vec<SlideDescriptor> {
    let Some(offset) = offset.filter(|&o| o > 0) else {
        return descriptors.to_vec();
    };
    descriptors
        .iter()
        .filter(|d| d.end_animation > offset)
        .map(|d| SlideDescriptor {
            start_animation: d.start_animation.saturating_sub(offset),
            end_animation: d.end_animation - offset,
            ..d.clone()
        })
        .collect()
}

/// File name of a merged clip: SHA-256 of the `len:stem` list plus the first clip's extension.
pub fn merge_basenames(files: &[PathBuf]) -> SlidesResult<String> {
    let first = files
        .first()
        .ok_or_else(|| SlidesError::validation("cannot merge an empty list of files"))?;

    let joined = files
        .iter()
        .map(|f| {
            let stem = f
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default();
            format!("{}:{stem}", stem.len())
        })
        .collect::<Vec<_>>()
        .join(",");

    let digest = Sha256::digest(joined.as_bytes());
    let mut name: String = digest.iter().map(|b| format!("{b:02x}")).collect();
    if let Some(ext) = first.extension() {
        name.push('.');
        name.push_str(&ext.to_string_lossy());
    }
    tracing::debug!("generated basename '{name}' for {} clips", files.len());
    Ok(name)
}

/// `<stem>_reversed<ext>` next to `file`.
pub fn reversed_name(file: &Path) -> SlidesResult<PathBuf> {
    let stem = file
        .file_stem()
        .ok_or_else(|| SlidesError::validation(format!("'{}' has no file name", file.display())))?
        .to_string_lossy();
    let name = match file.extension() {
        Some(ext) => format!("{stem}_reversed.{}", ext.to_string_lossy()),
        None => format!("{stem}_reversed"),
    };
    Ok(file.with_file_name(name))
}

#[cfg(test)]
#[path = "../../tests/unit/assemble/assembler.rs"]
mod tests;
