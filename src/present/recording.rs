use crate::assemble::media::is_ffmpeg_on_path;
use crate::foundation::core::{Color, FrameRGBA};
use crate::foundation::error::{SlidesError, SlidesResult};
use crate::present::display::{DisplayInfo, DisplaySink};
use crate::slides::model::{PresentationConfig, ensure_parent_dir};
use std::io::{Read as _, Write as _};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, Command, Stdio};

/// Options for [`FfmpegRecorder`] MP4 output.
#[derive(Clone, Debug)]
pub struct FfmpegRecorderOpts {
    pub out_path: PathBuf,
    /// Overwrite the output file if it already exists.
    pub overwrite: bool,
    /// Colour that translucent pixels are flattened over.
    pub background: Color,
}

impl FfmpegRecorderOpts {
    pub fn new(out_path: impl Into<PathBuf>) -> Self {
        Self {
            out_path: out_path.into(),
            overwrite: true,
            background: Color::BLACK,
        }
    }

    /// Flatten over the scene's own background colour.
    pub fn for_presentation(out_path: impl Into<PathBuf>, config: &PresentationConfig) -> Self {
        Self {
            background: config.background_color,
            ..Self::new(out_path)
        }
    }
}

struct Encoder {
    child: Child,
    stdin: Option<ChildStdin>,
    stderr_drain: Option<std::thread::JoinHandle<std::io::Result<Vec<u8>>>>,
    width: u32,
    height: u32,
}

/// Display sink that forwards to `inner` and streams every frame into an MP4 via `ffmpeg`.
///
/// The encoder starts on the first frame (its size and pacing rate fix the output format) and is
/// finalized by [`DisplaySink::finish`] or, failing that, on drop.
pub struct FfmpegRecorder<D> {
    opts: FfmpegRecorderOpts,
    inner: D,
    encoder: Option<Encoder>,
    scratch: Vec<u8>,
    frames_written: u64,
}

impl<D: DisplaySink> FfmpegRecorder<D> {
    pub fn new(opts: FfmpegRecorderOpts, inner: D) -> SlidesResult<Self> {
        if !opts.overwrite && opts.out_path.exists() {
            return Err(SlidesError::validation(format!(
                "output file '{}' already exists",
                opts.out_path.display()
            )));
        }
        if !is_ffmpeg_on_path() {
            return Err(SlidesError::media(
                "ffmpeg is required for recording, but was not found on PATH",
            ));
        }
        Ok(Self {
            opts,
            inner,
            encoder: None,
            scratch: Vec::new(),
            frames_written: 0,
        })
    }

    pub fn frames_written(&self) -> u64 {
        self.frames_written
    }

    fn start(&mut self, width: u32, height: u32, fps: f64) -> SlidesResult<()> {
        if !width.is_multiple_of(2) || !height.is_multiple_of(2) {
            return Err(SlidesError::validation(
                "recording width/height must be even (required for yuv420p mp4 output)",
            ));
        }
        ensure_parent_dir(&self.opts.out_path)?;

        let mut cmd = Command::new("ffmpeg");
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .arg(if self.opts.overwrite { "-y" } else { "-n" })
            .args([
                "-loglevel",
                "error",
                "-f",
                "rawvideo",
                "-pix_fmt",
                "rgba",
                "-s",
                &format!("{width}x{height}"),
                "-r",
                &format!("{fps:.6}"),
                "-i",
                "pipe:0",
                "-an",
                "-c:v",
                "libx264",
                "-pix_fmt",
                "yuv420p",
                "-movflags",
                "+faststart",
            ])
            .arg(&self.opts.out_path);

        let mut child = cmd.spawn().map_err(|e| {
            SlidesError::media(format!(
                "failed to spawn ffmpeg (is it installed and on PATH?): {e}"
            ))
        })?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| SlidesError::media("failed to open ffmpeg stdin (unexpected)"))?;
        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| SlidesError::media("failed to open ffmpeg stderr (unexpected)"))?;
        let stderr_drain = std::thread::spawn(move || {
            let mut bytes = Vec::new();
            stderr.read_to_end(&mut bytes)?;
            Ok(bytes)
        });

        tracing::info!(
            "recording {width}x{height} @ {fps:.2} fps to '{}'",
            self.opts.out_path.display()
        );
        self.scratch = vec![0u8; width as usize * height as usize * 4];
        self.encoder = Some(Encoder {
            child,
            stdin: Some(stdin),
            stderr_drain: Some(stderr_drain),
            width,
            height,
        });
        Ok(())
    }

    fn write(&mut self, frame: &FrameRGBA) -> SlidesResult<()> {
        let Some(enc) = self.encoder.as_mut() else {
            return Err(SlidesError::media("recorder not started"));
        };
        if frame.width != enc.width || frame.height != enc.height {
            tracing::warn!(
                "dropping {}x{} frame from recording (expected {}x{})",
                frame.width,
                frame.height,
                enc.width,
                enc.height
            );
            return Ok(());
        }
        flatten_over_background(&mut self.scratch, &frame.data, self.opts.background)?;
        let Some(stdin) = enc.stdin.as_mut() else {
            return Err(SlidesError::media("recorder is already finalized"));
        };
        stdin.write_all(&self.scratch).map_err(|e| {
            SlidesError::media(format!("failed to write frame to ffmpeg stdin: {e}"))
        })?;
        self.frames_written += 1;
        Ok(())
    }

    fn finalize(&mut self) -> SlidesResult<()> {
        let Some(mut enc) = self.encoder.take() else {
            return Ok(());
        };
        drop(enc.stdin.take());
        let status = enc.child.wait().map_err(|e| {
            SlidesError::media(format!("failed to wait for ffmpeg to finish: {e}"))
        })?;
        let stderr = match enc.stderr_drain.take() {
            Some(handle) => handle
                .join()
                .map_err(|_| SlidesError::media("ffmpeg stderr drain thread panicked"))?
                .map_err(|e| SlidesError::media(format!("ffmpeg stderr read failed: {e}")))?,
            None => Vec::new(),
        };
        if !status.success() {
            let stderr = String::from_utf8_lossy(&stderr);
            tracing::error!("ffmpeg recording failed: {}", stderr.trim());
            return Err(SlidesError::media(format!(
                "ffmpeg exited with status {status}: {}",
                stderr.trim()
            )));
        }
        tracing::info!(
            "wrote {} frames to '{}'",
            self.frames_written,
            self.opts.out_path.display()
        );
        Ok(())
    }
}

impl<D: DisplaySink> DisplaySink for FfmpegRecorder<D> {
    fn show(&mut self, frame: Option<&FrameRGBA>, info: &DisplayInfo) -> SlidesResult<()> {
        self.inner.show(frame, info)?;
        let Some(frame) = frame else {
            return Ok(());
        };
        if self.encoder.is_none() {
            self.start(frame.width, frame.height, info.fps)?;
        }
        self.write(frame)
    }

    fn toggle_full_screen(&mut self) {
        self.inner.toggle_full_screen();
    }

    fn toggle_mouse(&mut self) {
        self.inner.toggle_mouse();
    }

    fn finish(&mut self) -> SlidesResult<()> {
        let inner = self.inner.finish();
        self.finalize()?;
        inner
    }
}

impl<D> Drop for FfmpegRecorder<D> {
    fn drop(&mut self) {
        if let Some(mut enc) = self.encoder.take() {
            drop(enc.stdin.take());
            if let Err(e) = enc.child.wait() {
                tracing::error!("failed to wait for ffmpeg recording to finish: {e}");
            }
        }
    }
}

/// Composite straight-alpha RGBA8 over an opaque background.
fn flatten_over_background(dst: &mut [u8], src: &[u8], bg: Color) -> SlidesResult<()> {
    if dst.len() != src.len() || !dst.len().is_multiple_of(4) {
        return Err(SlidesError::validation(
            "frame data size does not match the recording frame size",
        ));
    }
    let bg = [bg.r as u16, bg.g as u16, bg.b as u16];
    for (d, s) in dst.chunks_exact_mut(4).zip(src.chunks_exact(4)) {
        let a = s[3] as u16;
        if a == 255 {
            d.copy_from_slice(s);
            continue;
        }
        let inv = 255 - a;
        for c in 0..3 {
            d[c] = ((s[c] as u16 * a + bg[c] * inv + 127) / 255) as u8;
        }
        d[3] = 255;
    }
    Ok(())
}

#[cfg(test)]
#[path = "../../tests/unit/present/recording.rs"]
mod tests;
