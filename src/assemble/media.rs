use crate::foundation::error::{SlidesError, SlidesResult};
use anyhow::Context as _;
use rayon::prelude::*;
use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

/// Default segment length (seconds) above which reversal is split into chunks.
pub const DEFAULT_MAX_SEGMENT_DURATION: f64 = 4.0;

/// Clip operations the assembler delegates to an external tool.
pub trait MediaTools: Send + Sync {
    /// Concatenate `inputs` (in order) into `dest`, skipping empty segments.
    fn concatenate(&self, inputs: &[PathBuf], dest: &Path) -> SlidesResult<()>;
    /// Write a frame-reversed copy of `src` to `dest`.
    fn reverse(&self, src: &Path, dest: &Path) -> SlidesResult<()>;
}

/// Reversal tunables.
#[derive(Clone, Debug, PartialEq)]
pub struct ReverseOpts {
    /// Clips longer than this are reversed segment by segment. `None` always reverses in one pass.
    pub max_segment_duration: Option<f64>,
    /// Worker count for segment reversal. `None` uses the available parallelism.
    pub threads: Option<usize>,
}

impl Default for ReverseOpts {
    fn default() -> Self {
        Self {
            max_segment_duration: Some(DEFAULT_MAX_SEGMENT_DURATION),
            threads: None,
        }
    }
}

/// Video stream properties reported by `ffprobe`.
#[derive(Clone, Debug, PartialEq)]
pub struct VideoStreamInfo {
    pub width: u32,
    pub height: u32,
    /// Average frame rate, 0.0 when unknown.
    pub fps: f64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct MediaInfo {
    pub source_path: PathBuf,
    pub video: Option<VideoStreamInfo>,
    pub has_audio: bool,
    pub duration_sec: Option<f64>,
}

impl MediaInfo {
    /// No video stream, or a known zero duration.
    pub fn is_empty(&self) -> bool {
        self.video.is_none() || self.duration_sec.is_some_and(|d| d <= 0.0)
    }
}

/// Probe a media file with `ffprobe`.
pub fn probe_media(source_path: &Path) -> SlidesResult<MediaInfo> {
    #[derive(serde::Deserialize)]
    struct ProbeStream {
        codec_type: Option<String>,
        width: Option<u32>,
        height: Option<u32>,
        avg_frame_rate: Option<String>,
        r_frame_rate: Option<String>,
    }
    #[derive(serde::Deserialize)]
    struct ProbeFormat {
        duration: Option<String>,
    }
    #[derive(serde::Deserialize)]
    struct ProbeOut {
        #[serde(default)]
        streams: Vec<ProbeStream>,
        format: Option<ProbeFormat>,
    }

    let out = Command::new("ffprobe")
        .args([
            "-v",
            "error",
            "-print_format",
            "json",
            "-show_streams",
            "-show_format",
        ])
        .arg(source_path)
        .output()
        .map_err(|e| SlidesError::media(format!("failed to run ffprobe: {e}")))?;
    if !out.status.success() {
        return Err(SlidesError::media(format!(
            "ffprobe failed for '{}': {}",
            source_path.display(),
            String::from_utf8_lossy(&out.stderr).trim()
        )));
    }

    let parsed: ProbeOut = serde_json::from_slice(&out.stdout)
        .map_err(|e| SlidesError::media(format!("ffprobe json parse failed: {e}")))?;

    let video = parsed
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("video"))
        .and_then(|s| {
            let fps = s
                .avg_frame_rate
                .as_deref()
                .and_then(parse_ff_ratio)
                .or_else(|| s.r_frame_rate.as_deref().and_then(parse_ff_ratio))
                .unwrap_or(0.0);
            Some(VideoStreamInfo {
                width: s.width?,
                height: s.height?,
                fps,
            })
        });
    let has_audio = parsed
        .streams
        .iter()
        .any(|s| s.codec_type.as_deref() == Some("audio"));
    let duration_sec = parsed
        .format
        .as_ref()
        .and_then(|f| f.duration.as_deref())
        .and_then(|s| s.parse::<f64>().ok());

    Ok(MediaInfo {
        source_path: source_path.to_path_buf(),
        video,
        has_audio,
        duration_sec,
    })
}

/// Parse an ffmpeg rational such as `30000/1001`.
pub(crate) fn parse_ff_ratio(s: &str) -> Option<f64> {
    let (a, b) = s.split_once('/').unwrap_or((s, "1"));
    let a = a.trim().parse::<f64>().ok()?;
    let b = b.trim().parse::<f64>().ok()?;
    if b == 0.0 || !a.is_finite() {
        return None;
    }
    Some(a / b)
}

/// Return `true` when `tool -version` runs successfully from `PATH`.
pub fn is_tool_on_path(tool: &str) -> bool {
    Command::new(tool)
        .arg("-version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

pub fn is_ffmpeg_on_path() -> bool {
    is_tool_on_path("ffmpeg")
}

/// [`MediaTools`] backed by the system `ffmpeg`/`ffprobe` binaries.
pub struct FfmpegTools {
    opts: ReverseOpts,
    pool: rayon::ThreadPool,
}

impl std::fmt::Debug for FfmpegTools {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FfmpegTools")
            .field("opts", &self.opts)
            .field("threads", &self.pool.current_num_threads())
            .finish()
    }
}

impl FfmpegTools {
    pub fn new(opts: ReverseOpts) -> SlidesResult<Self> {
        if let Some(max) = opts.max_segment_duration
            && (!max.is_finite() || max <= 0.0)
        {
            return Err(SlidesError::validation(format!(
                "max segment duration must be a positive number of seconds, got {max}"
            )));
        }
        let pool = build_thread_pool(opts.threads)?;
        Ok(Self { opts, pool })
    }

    pub fn opts(&self) -> &ReverseOpts {
        &self.opts
    }

    fn reverse_in_one_chunk(src: &Path, dest: &Path) -> SlidesResult<()> {
        let mut cmd = ffmpeg();
        cmd.arg("-i")
            .arg(src)
            .args(["-vf", "reverse", "-an", "-c:v", "libx264", "-pix_fmt", "yuv420p"])
            .arg(dest);
        run(cmd, &format!("reverse '{}'", src.display()))
    }

    fn reverse_segmented(&self, src: &Path, dest: &Path, segment: f64) -> SlidesResult<()> {
        let scratch = tempfile::tempdir().context("create segment scratch directory")?;
        let ext = src
            .extension()
            .map(|e| e.to_string_lossy().into_owned())
            .unwrap_or_else(|| "mp4".to_owned());
        let pattern = scratch.path().join(format!("%05d.{ext}"));

        let mut cmd = ffmpeg();
        cmd.arg("-i")
            .arg(src)
            .args([
                "-map",
                "0:v:0",
                "-c",
                "copy",
                "-f",
                "segment",
                "-segment_time",
                &format!("{segment}"),
                "-reset_timestamps",
                "1",
            ])
            .arg(&pattern);
        run(cmd, &format!("split '{}' into segments", src.display()))?;

        let mut segments: Vec<PathBuf> = std::fs::read_dir(scratch.path())
            .with_context(|| format!("list '{}'", scratch.path().display()))?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.extension().is_some_and(|e| e.to_string_lossy() == ext))
            .collect();
        segments.sort();
        if segments.is_empty() {
            return Err(SlidesError::media(format!(
                "splitting '{}' produced no segments",
                src.display()
            )));
        }
        tracing::debug!(
            "reversing {} segments of '{}' on {} threads",
            segments.len(),
            src.display(),
            self.pool.current_num_threads()
        );

        let reversed: Vec<PathBuf> = self.pool.install(|| {
            segments
                .par_iter()
                .map(|seg| {
                    let out = seg.with_file_name(format!(
                        "rev_{}",
                        seg.file_name().map(|n| n.to_string_lossy()).unwrap_or_default()
                    ));
                    Self::reverse_in_one_chunk(seg, &out).map(|()| out)
                })
                .collect::<SlidesResult<Vec<_>>>()
        })?;

        // Last segment first.
        let ordered: Vec<PathBuf> = reversed.into_iter().rev().collect();
        self.concatenate(&ordered, dest)
    }
}

impl MediaTools for FfmpegTools {
    fn concatenate(&self, inputs: &[PathBuf], dest: &Path) -> SlidesResult<()> {
        let mut kept = Vec::with_capacity(inputs.len());
        for input in inputs {
            match probe_media(input) {
                Ok(info) if !info.is_empty() => kept.push(input.clone()),
                Ok(_) => tracing::warn!(
                    "skipping video file '{}' because it does not contain any video frames",
                    input.display()
                ),
                Err(e) => tracing::warn!("skipping unreadable video file '{}': {e}", input.display()),
            }
        }
        if kept.is_empty() {
            return Err(SlidesError::media(format!(
                "nothing to concatenate into '{}': every input was empty",
                dest.display()
            )));
        }

        let mut list = tempfile::Builder::new()
            .suffix(".txt")
            .tempfile()
            .context("create concat list")?;
        for file in &kept {
            let abs = std::path::absolute(file).unwrap_or_else(|_| file.clone());
            writeln!(list, "file '{}'", escape_concat_path(&abs)).context("write concat list")?;
        }
        list.flush().context("flush concat list")?;

        let mut cmd = ffmpeg();
        cmd.args(["-f", "concat", "-safe", "0", "-i"])
            .arg(list.path())
            .args(["-c", "copy"])
            .arg(dest);
        run(cmd, &format!("concatenate into '{}'", dest.display()))
    }

    fn reverse(&self, src: &Path, dest: &Path) -> SlidesResult<()> {
        let Some(max) = self.opts.max_segment_duration else {
            return Self::reverse_in_one_chunk(src, dest);
        };
        let duration = probe_media(src).ok().and_then(|i| i.duration_sec);
        match duration {
            Some(d) if d <= max => Self::reverse_in_one_chunk(src, dest),
            _ => self.reverse_segmented(src, dest, max),
        }
    }
}

fn build_thread_pool(threads: Option<usize>) -> SlidesResult<rayon::ThreadPool> {
    let n = threads
        .filter(|&n| n > 0)
        .unwrap_or_else(|| std::thread::available_parallelism().map_or(1, |n| n.get()));
    rayon::ThreadPoolBuilder::new()
        .num_threads(n)
        .thread_name(|i| format!("wavyte-slides-reverse-{i}"))
        .build()
        .map_err(|e| SlidesError::media(format!("failed to build rayon thread pool: {e}")))
}

fn ffmpeg() -> Command {
    let mut cmd = Command::new("ffmpeg");
    cmd.args(["-y", "-loglevel", "error"])
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped());
    cmd
}

fn run(mut cmd: Command, what: &str) -> SlidesResult<()> {
    let out = cmd.output().map_err(|e| {
        SlidesError::media(format!(
            "failed to spawn ffmpeg (is it installed and on PATH?): {e}"
        ))
    })?;
    if !out.status.success() {
        let stderr = String::from_utf8_lossy(&out.stderr);
        tracing::error!("ffmpeg failed to {what}: {}", stderr.trim());
        return Err(SlidesError::media(format!(
            "ffmpeg failed to {what} (status {}): {}",
            out.status,
            stderr.trim()
        )));
    }
    Ok(())
}

fn escape_concat_path(p: &Path) -> String {
    p.to_string_lossy().replace('\'', r"'\''")
}

#[cfg(test)]
#[path = "../../tests/unit/assemble/media.rs"]
mod tests;
