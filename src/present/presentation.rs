use crate::foundation::core::{Direction, FrameRGBA};
use crate::foundation::error::SlidesResult;
use crate::present::reader::{ClipOpener, ClipReader};
use crate::slides::model::{PresentationConfig, SlideKind, SlideRecord};
use std::path::PathBuf;
use std::sync::Arc;

/// Lowest frame rate used for pacing.
pub const MIN_FPS: f64 = 1.0;

/// Playback mode of the active presentation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum State {
    #[default]
    Playing,
    Paused,
    Wait,
    End,
}

impl std::fmt::Display for State {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Playing => "PLAYING",
            Self::Paused => "PAUSED",
            Self::Wait => "WAIT",
            Self::End => "END",
        })
    }
}

/// Playback cursor over one scene's slides.
///
/// Owns the active [`ClipReader`]; the reader is opened lazily and dropped whenever the cursor
/// moves, so at most one clip is open per presentation.
pub struct Presentation {
    name: String,
    config: PresentationConfig,
    opener: Arc<dyn ClipOpener>,
    current_slide_index: usize,
    direction: Direction,
    reader: Option<Box<dyn ClipReader>>,
    last_frame: Option<FrameRGBA>,
    repeat_loops: bool,
    loop_broken: bool,
    fps_warned: bool,
    last_fps: Option<f64>,
}

impl std::fmt::Debug for Presentation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Presentation")
            .field("name", &self.name)
            .field("slides", &self.config.slides.len())
            .field("current_slide_index", &self.current_slide_index)
            .field("direction", &self.direction)
            .field("reader_open", &self.reader.is_some())
            .finish()
    }
}

impl Presentation {
    /// Wrap a validated config, making sure it ends with exactly one `last` record.
    pub fn new(
        name: impl Into<String>,
        mut config: PresentationConfig,
        opener: Arc<dyn ClipOpener>,
    ) -> SlidesResult<Self> {
        config.validate()?;
        ensure_terminal_slide(&mut config.slides);
        Ok(Self {
            name: name.into(),
            config,
            opener,
            current_slide_index: 0,
            direction: Direction::Forward,
            reader: None,
            last_frame: None,
            repeat_loops: true,
            loop_broken: false,
            fps_warned: false,
            last_fps: None,
        })
    }

    /// Disable loop auto-repeat (used when skipping through every slide).
    pub fn set_repeat_loops(&mut self, repeat: bool) {
        self.repeat_loops = repeat;
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &PresentationConfig {
        &self.config
    }

    pub fn len(&self) -> usize {
        self.config.slides.len()
    }

    pub fn is_empty(&self) -> bool {
        self.config.slides.is_empty()
    }

    pub fn current_slide_index(&self) -> usize {
        self.current_slide_index
    }

    pub fn current_slide(&self) -> &SlideRecord {
        &self.config.slides[self.current_slide_index]
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn is_last_slide(&self) -> bool {
        self.current_slide_index + 1 == self.len()
    }

    pub fn is_terminated(&self) -> bool {
        let slide = self.current_slide();
        slide.is_last() && slide.terminated
    }

    pub fn is_loop_broken(&self) -> bool {
        self.loop_broken
    }

    pub fn is_reader_open(&self) -> bool {
        self.reader.is_some()
    }

    /// Most recently decoded frame.
    pub fn frame(&self) -> Option<&FrameRGBA> {
        self.last_frame.as_ref()
    }

    /// Per-direction rate of the active slide.
    pub fn playback_rate(&self) -> f64 {
        let cfg = &self.current_slide().config;
        match self.direction {
            Direction::Forward => cfg.playback_rate,
            Direction::Reversed => cfg.reversed_playback_rate,
        }
    }

    /// Pacing frame rate: clip fps times the slide rate and `global_rate`, clamped to [`MIN_FPS`].
    ///
    /// Opens the current clip when the cursor has just moved, so pacing follows the clip that
    /// plays next. If it cannot be opened, the last known clip rate is used.
    pub fn frame_rate(&mut self, global_rate: f64) -> f64 {
        let native = match self.reader() {
            Ok(reader) => Some(reader.fps()),
            Err(e) => {
                tracing::debug!("no clip open for pacing: {e}");
                self.last_fps
            }
        };
        let Some(native) = native else {
            return MIN_FPS;
        };
        let fps = native * self.playback_rate() * global_rate;
        if fps.is_finite() && fps >= MIN_FPS {
            return fps;
        }
        if !self.fps_warned {
            tracing::warn!(
                "slide {} of '{}' has an unusable frame rate ({fps}), clamping to {MIN_FPS} fps",
                self.current_slide_index,
                self.name
            );
            self.fps_warned = true;
        }
        MIN_FPS
    }

    /// Clip path for the current slide and direction.
    pub fn current_file(&self) -> PathBuf {
        let slide = self.current_slide();
        match self.direction {
            Direction::Forward => slide.file.clone(),
            Direction::Reversed => slide.rev_file.clone(),
        }
    }

    /// Advance one decode cycle and return the next state.
    pub fn update_state(&mut self, state: State) -> SlidesResult<State> {
        match state {
            State::End => return Ok(State::End),
            State::Paused => {
                if self.last_frame.is_none()
                    && let Some(frame) = self.reader()?.next_frame()?
                {
                    self.last_frame = Some(frame);
                }
                return Ok(State::Paused);
            }
            State::Playing | State::Wait => {}
        }

        if let Some(frame) = self.reader()?.next_frame()? {
            self.last_frame = Some(frame);
            return Ok(state);
        }

        // End of the current clip.
        if state == State::Wait {
            return Ok(State::Wait);
        }
        if self.is_terminated() {
            return Ok(State::End);
        }

        let forward = !self.direction.is_reversed();
        let (looping, auto_next) = {
            let slide = self.current_slide();
            (slide.is_loop(), slide.config.auto_next)
        };
        if forward && looping && self.repeat_loops && !self.loop_broken {
            tracing::trace!("looping slide {}", self.current_slide_index);
            self.reader()?.rewind()?;
            return Ok(State::Playing);
        }
        if forward && auto_next && !self.is_last_slide() {
            self.next_slide();
            return Ok(State::Playing);
        }
        Ok(State::Wait)
    }

    /// Move to the next slide; on the last slide, mark it terminated instead.
    pub fn next_slide(&mut self) {
        if self.is_last_slide() {
            self.config.slides[self.current_slide_index].terminated = true;
            return;
        }
        self.set_slide(self.current_slide_index + 1);
    }

    pub fn prev_slide(&mut self) {
        self.set_slide(self.current_slide_index.saturating_sub(1));
    }

    pub fn go_to_first_slide(&mut self) {
        self.set_slide(0);
    }

    pub fn go_to_last_slide(&mut self) {
        self.set_slide(self.len() - 1);
    }

    /// Jump to `index` (clamped), forward, from the start of its clip.
    pub fn set_slide(&mut self, index: usize) {
        for slide in &mut self.config.slides {
            slide.terminated = false;
        }
        self.current_slide_index = index.min(self.len() - 1);
        self.direction = Direction::Forward;
        self.reload();
    }

    /// Play the current slide backwards from its end. Returns `false` on the last slide.
    pub fn reverse(&mut self) -> bool {
        if self.current_slide().kind == SlideKind::Last {
            tracing::debug!("reverse ignored on the last slide");
            return false;
        }
        self.direction = Direction::Reversed;
        self.reload();
        true
    }

    /// Restart the current slide forward.
    pub fn replay(&mut self) {
        self.direction = Direction::Forward;
        self.reload();
    }

    /// Return to forward playback if reversed. Returns whether anything changed.
    pub fn cancel_reverse(&mut self) -> bool {
        if !self.direction.is_reversed() {
            return false;
        }
        self.replay();
        true
    }

    /// Let the running loop iteration finish, then wait.
    pub fn break_loop(&mut self) {
        self.loop_broken = true;
    }

    /// Drop the open clip reader.
    pub fn release(&mut self) {
        self.reader = None;
    }

    fn reload(&mut self) {
        self.reader = None;
        self.loop_broken = false;
        self.fps_warned = false;
    }

    fn reader(&mut self) -> SlidesResult<&mut Box<dyn ClipReader>> {
        let reader = match self.reader.take() {
            Some(reader) => reader,
            None => {
                let path = self.current_file();
                tracing::debug!("opening '{}'", path.display());
                let reader = self.opener.open(&path)?;
                self.last_fps = Some(reader.fps());
                reader
            }
        };
        Ok(self.reader.insert(reader))
    }
}

/// Promote a trailing `slide` to `last`, or append a `last` aliasing a trailing loop.
fn ensure_terminal_slide(slides: &mut Vec<SlideRecord>) {
    let Some(tail) = slides.last_mut() else {
        return;
    };
    match tail.kind {
        SlideKind::Last => {}
        SlideKind::Slide => tail.kind = SlideKind::Last,
        SlideKind::Loop => {
            let mut last = tail.clone();
            last.kind = SlideKind::Last;
            last.number = tail.number + 1;
            last.config.looping = false;
            last.config.auto_next = false;
            slides.push(last);
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/present/presentation.rs"]
mod tests;
