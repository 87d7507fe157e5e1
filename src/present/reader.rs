use crate::assemble::media::probe_media;
use crate::foundation::core::FrameRGBA;
use crate::foundation::error::{SlidesError, SlidesResult};
use std::collections::HashMap;
use std::io::Read as _;
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdout, Command, Stdio};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Sequential frame source for one clip. Owned by the playback loop.
pub trait ClipReader: Send {
    /// Next decoded frame, `None` at the end of the clip.
    fn next_frame(&mut self) -> SlidesResult<Option<FrameRGBA>>;
    /// Seek back to the first frame.
    fn rewind(&mut self) -> SlidesResult<()>;
    /// Native frame rate of the clip (may be 0.0 when unknown).
    fn fps(&self) -> f64;
}

/// Factory for [`ClipReader`]s.
pub trait ClipOpener: Send + Sync {
    fn open(&self, path: &Path) -> SlidesResult<Box<dyn ClipReader>>;
}

/// Opens clips by streaming raw RGBA frames out of the system `ffmpeg`.
#[derive(Clone, Copy, Debug, Default)]
pub struct FfmpegClipOpener;

impl ClipOpener for FfmpegClipOpener {
    fn open(&self, path: &Path) -> SlidesResult<Box<dyn ClipReader>> {
        Ok(Box::new(FfmpegClipReader::open(path)?))
    }
}

pub struct FfmpegClipReader {
    path: PathBuf,
    width: u32,
    height: u32,
    fps: f64,
    child: Option<Child>,
    stdout: Option<ChildStdout>,
}

impl FfmpegClipReader {
    pub fn open(path: &Path) -> SlidesResult<Self> {
        if !path.is_file() {
            return Err(SlidesError::missing_file(path));
        }
        let info = probe_media(path)?;
        let video = info.video.ok_or_else(|| {
            SlidesError::playback(format!("'{}' has no video stream", path.display()))
        })?;
        if video.width == 0 || video.height == 0 {
            return Err(SlidesError::playback(format!(
                "'{}' reports an empty frame size",
                path.display()
            )));
        }
        let mut reader = Self {
            path: path.to_path_buf(),
            width: video.width,
            height: video.height,
            fps: video.fps,
            child: None,
            stdout: None,
        };
        reader.spawn()?;
        Ok(reader)
    }

    fn spawn(&mut self) -> SlidesResult<()> {
        self.kill();
        let mut child = Command::new("ffmpeg")
            .args(["-v", "error", "-i"])
            .arg(&self.path)
            .args(["-f", "rawvideo", "-pix_fmt", "rgba", "pipe:1"])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| {
                SlidesError::playback(format!(
                    "failed to spawn ffmpeg for '{}' (is it installed and on PATH?): {e}",
                    self.path.display()
                ))
            })?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| SlidesError::playback("failed to open ffmpeg stdout (unexpected)"))?;
        self.child = Some(child);
        self.stdout = Some(stdout);
        Ok(())
    }

    fn kill(&mut self) {
        drop(self.stdout.take());
        if let Some(mut child) = self.child.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}

impl ClipReader for FfmpegClipReader {
    fn next_frame(&mut self) -> SlidesResult<Option<FrameRGBA>> {
        let Some(stdout) = self.stdout.as_mut() else {
            return Ok(None);
        };
        let len = self.width as usize * self.height as usize * 4;
        let mut data = vec![0u8; len];
        match stdout.read_exact(&mut data) {
            Ok(()) => Ok(Some(FrameRGBA {
                width: self.width,
                height: self.height,
                data,
            })),
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                self.kill();
                Ok(None)
            }
            Err(e) => Err(SlidesError::playback(format!(
                "failed to read frame from '{}': {e}",
                self.path.display()
            ))),
        }
    }

    fn rewind(&mut self) -> SlidesResult<()> {
        self.spawn()
    }

    fn fps(&self) -> f64 {
        self.fps
    }
}

impl Drop for FfmpegClipReader {
    fn drop(&mut self) {
        self.kill();
    }
}

/// Scripted clips for tests and dry runs.
///
/// Every frame is a 2x1 image whose bytes encode `(clip id, frame index)`, see [`InMemoryClips::marker`].
#[derive(Clone, Debug, Default)]
pub struct InMemoryClips {
    clips: HashMap<PathBuf, (u32, usize, f64)>,
    open_readers: Arc<AtomicUsize>,
}

impl InMemoryClips {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a clip of `frames` frames and return its id.
    pub fn add(&mut self, path: impl Into<PathBuf>, frames: usize, fps: f64) -> u32 {
        let id = self.clips.len() as u32;
        self.clips.insert(path.into(), (id, frames, fps));
        id
    }

    /// Number of readers currently alive.
    pub fn open_readers(&self) -> usize {
        self.open_readers.load(Ordering::SeqCst)
    }

    /// Decode `(clip id, frame index)` from a frame produced by these clips.
    pub fn marker(frame: &FrameRGBA) -> Option<(u32, u32)> {
        let bytes: [u8; 8] = frame.data.get(..8)?.try_into().ok()?;
        let [a, b, c, d, e, f, g, h] = bytes;
        Some((u32::from_le_bytes([a, b, c, d]), u32::from_le_bytes([e, f, g, h])))
    }
}

impl ClipOpener for InMemoryClips {
    fn open(&self, path: &Path) -> SlidesResult<Box<dyn ClipReader>> {
        let &(id, frames, fps) = self
            .clips
            .get(path)
            .ok_or_else(|| SlidesError::missing_file(path))?;
        self.open_readers.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(InMemoryReader {
            id,
            frames,
            fps,
            pos: 0,
            open_readers: Arc::clone(&self.open_readers),
        }))
    }
}

struct InMemoryReader {
    id: u32,
    frames: usize,
    fps: f64,
    pos: usize,
    open_readers: Arc<AtomicUsize>,
}

impl ClipReader for InMemoryReader {
    fn next_frame(&mut self) -> SlidesResult<Option<FrameRGBA>> {
        if self.pos >= self.frames {
            return Ok(None);
        }
        let mut data = Vec::with_capacity(8);
        data.extend_from_slice(&self.id.to_le_bytes());
        data.extend_from_slice(&(self.pos as u32).to_le_bytes());
        self.pos += 1;
        Ok(Some(FrameRGBA {
            width: 2,
            height: 1,
            data,
        }))
    }

    fn rewind(&mut self) -> SlidesResult<()> {
        self.pos = 0;
        Ok(())
    }

    fn fps(&self) -> f64 {
        self.fps
    }
}

impl Drop for InMemoryReader {
    fn drop(&mut self) {
        self.open_readers.fetch_sub(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
#[path = "../../tests/unit/present/reader.rs"]
mod tests;
