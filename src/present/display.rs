use crate::foundation::core::{Direction, FrameRGBA};
use crate::foundation::error::SlidesResult;
use crate::present::presentation::State;
use crate::slides::model::SlideKind;
use std::sync::{Arc, Mutex, MutexGuard};

/// What the player knows about the current cycle, emitted alongside each frame.
#[derive(Clone, Debug, PartialEq)]
pub struct DisplayInfo {
    pub scene_name: String,
    pub scene_index: usize,
    pub scene_count: usize,
    pub slide_index: usize,
    pub slide_count: usize,
    pub slide_number: usize,
    pub kind: SlideKind,
    pub state: State,
    pub direction: Direction,
    pub notes: String,
    /// Effective pacing rate in frames per second.
    pub fps: f64,
}

/// Output side of the player: a window, a recorder, a log.
pub trait DisplaySink: Send {
    /// Emit one cycle. `frame` is `None` until the first frame has been decoded.
    fn show(&mut self, frame: Option<&FrameRGBA>, info: &DisplayInfo) -> SlidesResult<()>;

    fn toggle_full_screen(&mut self) {}

    fn toggle_mouse(&mut self) {}

    /// Called once when the run ends, whatever the exit path.
    fn finish(&mut self) -> SlidesResult<()> {
        Ok(())
    }
}

impl<D: DisplaySink + ?Sized> DisplaySink for Box<D> {
    fn show(&mut self, frame: Option<&FrameRGBA>, info: &DisplayInfo) -> SlidesResult<()> {
        (**self).show(frame, info)
    }

    fn toggle_full_screen(&mut self) {
        (**self).toggle_full_screen();
    }

    fn toggle_mouse(&mut self) {
        (**self).toggle_mouse();
    }

    fn finish(&mut self) -> SlidesResult<()> {
        (**self).finish()
    }
}

/// Logs slide changes and ignores pixels.
#[derive(Debug, Default)]
pub struct NullDisplay {
    last: Option<(usize, usize, State, Direction)>,
}

impl NullDisplay {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DisplaySink for NullDisplay {
    fn show(&mut self, _frame: Option<&FrameRGBA>, info: &DisplayInfo) -> SlidesResult<()> {
        let key = (info.scene_index, info.slide_index, info.state, info.direction);
        if self.last != Some(key) {
            self.last = Some(key);
            tracing::info!(
                "{} ({}/{}): slide {}/{} [{}] {}{}",
                info.scene_name,
                info.scene_index + 1,
                info.scene_count,
                info.slide_index + 1,
                info.slide_count,
                info.kind,
                info.state,
                if info.direction.is_reversed() {
                    " (reversed)"
                } else {
                    ""
                }
            );
            if !info.notes.is_empty() {
                tracing::info!("notes: {}", info.notes);
            }
        }
        Ok(())
    }

    fn toggle_full_screen(&mut self) {
        tracing::debug!("full screen toggled (no window)");
    }

    fn toggle_mouse(&mut self) {
        tracing::debug!("mouse visibility toggled (no window)");
    }
}

/// Everything an [`InMemoryDisplay`] has seen.
#[derive(Clone, Debug, Default)]
pub struct DisplayLog {
    pub frames: Vec<Option<FrameRGBA>>,
    pub infos: Vec<DisplayInfo>,
    pub full_screen: bool,
    pub mouse_hidden: bool,
    pub finished: bool,
}

/// Capturing display for tests. Clones share one log.
#[derive(Clone, Debug, Default)]
pub struct InMemoryDisplay {
    log: Arc<Mutex<DisplayLog>>,
}

impl InMemoryDisplay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn log(&self) -> DisplayLog {
        self.lock().clone()
    }

    pub fn infos(&self) -> Vec<DisplayInfo> {
        self.lock().infos.clone()
    }

    fn lock(&self) -> MutexGuard<'_, DisplayLog> {
        self.log.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl DisplaySink for InMemoryDisplay {
    fn show(&mut self, frame: Option<&FrameRGBA>, info: &DisplayInfo) -> SlidesResult<()> {
        let mut log = self.lock();
        log.frames.push(frame.cloned());
        log.infos.push(info.clone());
        Ok(())
    }

    fn toggle_full_screen(&mut self) {
        let mut log = self.lock();
        log.full_screen = !log.full_screen;
    }

    fn toggle_mouse(&mut self) {
        let mut log = self.lock();
        log.mouse_hidden = !log.mouse_hidden;
    }

    fn finish(&mut self) -> SlidesResult<()> {
        self.lock().finished = true;
        Ok(())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/present/display.rs"]
mod tests;
