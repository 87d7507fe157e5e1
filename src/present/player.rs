use crate::config::keys::{Action, KeyDispatch, Keys};
use crate::foundation::error::{SlidesError, SlidesResult};
use crate::present::display::{DisplayInfo, DisplaySink};
use crate::present::presentation::{Presentation, State};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Single-slot "latest key" exchange between the event thread and the playback loop.
///
/// A newer key overwrites an unread one.
#[derive(Debug, Default)]
pub struct KeyRelay {
    slot: Mutex<Option<u32>>,
}

impl KeyRelay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&self, code: u32) {
        *self.slot.lock().unwrap_or_else(|e| e.into_inner()) = Some(code);
    }

    /// Read and clear the slot.
    pub fn take(&self) -> Option<u32> {
        self.slot.lock().unwrap_or_else(|e| e.into_inner()).take()
    }
}

/// Cooperative stop flag, checked once per playback cycle.
#[derive(Clone, Debug, Default)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct PlayerOpts {
    pub start_paused: bool,
    /// Advance through every slide without input; implies `exit_after_last`.
    pub skip_all: bool,
    pub exit_after_last: bool,
    /// Multiplies every slide's own playback rate.
    pub playback_rate: f64,
    /// Next on a playing loop finishes the iteration, then waits.
    pub next_terminates_loop: bool,
    /// Start scene; negative values count from the end.
    pub start_at_scene_number: isize,
    /// Start slide within the start scene; negative values count from the end.
    pub start_at_slide_number: isize,
    /// Sleep between cycles to match the clip frame rate.
    pub realtime: bool,
}

impl Default for PlayerOpts {
    fn default() -> Self {
        Self {
            start_paused: false,
            skip_all: false,
            exit_after_last: false,
            playback_rate: 1.0,
            next_terminates_loop: false,
            start_at_scene_number: 0,
            start_at_slide_number: 0,
            realtime: true,
        }
    }
}

/// How a playback run ended.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RunOutcome {
    /// Quit key.
    Quit,
    /// Stop flag set from outside.
    Stopped,
    /// Reached the end of the last presentation with exit-after-last enabled.
    Finished,
    /// The loop hit an error and stopped.
    Failed(String),
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PlayerStats {
    pub cycles: u64,
    /// Next actions applied, from keys or from skip-all.
    pub next_events: u64,
}

/// Drives a sequence of presentations from key events and clip ends.
pub struct Player<D> {
    presentations: Vec<Presentation>,
    index: usize,
    state: State,
    opts: PlayerOpts,
    dispatch: KeyDispatch,
    relay: Arc<KeyRelay>,
    stop: StopHandle,
    display: D,
    pause_pending: bool,
    stats: PlayerStats,
}

impl<D: DisplaySink> Player<D> {
    pub fn new(
        mut presentations: Vec<Presentation>,
        keys: &Keys,
        display: D,
        mut opts: PlayerOpts,
    ) -> SlidesResult<Self> {
        if presentations.is_empty() {
            return Err(SlidesError::validation("no presentation to play"));
        }
        if !opts.playback_rate.is_finite() || opts.playback_rate <= 0.0 {
            return Err(SlidesError::validation(format!(
                "playback rate must be a positive number, got {}",
                opts.playback_rate
            )));
        }
        keys.validate()?;
        if opts.skip_all {
            opts.exit_after_last = true;
            for p in &mut presentations {
                p.set_repeat_loops(false);
            }
        }

        let index = resolve_index(opts.start_at_scene_number, presentations.len(), "scene");
        let slide = resolve_index(
            opts.start_at_slide_number,
            presentations[index].len(),
            "slide",
        );
        presentations[index].set_slide(slide);

        Ok(Self {
            presentations,
            index,
            state: State::Playing,
            pause_pending: opts.start_paused,
            opts,
            dispatch: keys.dispatch(),
            relay: Arc::new(KeyRelay::new()),
            stop: StopHandle::default(),
            display,
            stats: PlayerStats::default(),
        })
    }

    pub fn relay(&self) -> Arc<KeyRelay> {
        Arc::clone(&self.relay)
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn stats(&self) -> PlayerStats {
        self.stats
    }

    pub fn display(&self) -> &D {
        &self.display
    }

    pub fn current_presentation_index(&self) -> usize {
        self.index
    }

    pub fn current_presentation(&self) -> &Presentation {
        &self.presentations[self.index]
    }

    /// Run cycles until quit, stop, exit-after-last or an error.
    ///
    /// Errors are logged and reported as [`RunOutcome::Failed`]. The display is always finished
    /// and every clip reader released before returning.
    pub fn run(&mut self) -> RunOutcome {
        let outcome = loop {
            if self.stop.is_stopped() {
                break RunOutcome::Stopped;
            }
            let started = Instant::now();
            match self.step() {
                Ok(Some(outcome)) => break outcome,
                Ok(None) => {}
                Err(e) => {
                    tracing::error!("playback stopped: {e}");
                    break RunOutcome::Failed(e.to_string());
                }
            }
            if self.opts.realtime {
                let fps = self.presentations[self.index].frame_rate(self.opts.playback_rate);
                let frame = Duration::from_secs_f64(1.0 / fps);
                if let Some(rest) = frame.checked_sub(started.elapsed()) {
                    std::thread::sleep(rest);
                }
            }
        };

        for p in &mut self.presentations {
            p.release();
        }
        if let Err(e) = self.display.finish() {
            tracing::error!("failed to finish display: {e}");
            if outcome != RunOutcome::Quit && !matches!(outcome, RunOutcome::Failed(_)) {
                return RunOutcome::Failed(e.to_string());
            }
        }
        tracing::debug!("playback ended: {outcome:?} after {} cycles", self.stats.cycles);
        outcome
    }

    /// One cycle: decode transition, then the pending key, then emit.
    pub fn step(&mut self) -> SlidesResult<Option<RunOutcome>> {
        self.stats.cycles += 1;
        self.state = self.presentations[self.index].update_state(self.state)?;

        if self.pause_pending && self.state == State::Playing {
            self.pause_pending = false;
            self.state = State::Paused;
        }

        if self.state == State::End {
            if self.index + 1 < self.presentations.len() {
                self.presentations[self.index].release();
                self.index += 1;
                self.state = State::Playing;
                tracing::debug!("moving to presentation {}", self.index);
            } else if self.opts.exit_after_last {
                return Ok(Some(RunOutcome::Finished));
            }
        }

        let mut action = self
            .relay
            .take()
            .and_then(|code| self.dispatch.action_for(code));
        if action.is_none() && self.opts.skip_all && self.state == State::Wait {
            action = Some(Action::Next);
        }
        if let Some(action) = action
            && let Some(outcome) = self.apply(action)
        {
            return Ok(Some(outcome));
        }

        let info = self.info();
        self.display
            .show(self.presentations[self.index].frame(), &info)?;
        Ok(None)
    }

    fn apply(&mut self, action: Action) -> Option<RunOutcome> {
        let state = self.state;
        let pres = &mut self.presentations[self.index];
        match action {
            Action::Quit => return Some(RunOutcome::Quit),
            Action::PlayPause => match state {
                State::Playing => self.state = State::Paused,
                State::Paused => self.state = State::Playing,
                State::Wait => {
                    pres.next_slide();
                    self.state = State::Playing;
                }
                State::End => {}
            },
            Action::Next => {
                self.stats.next_events += 1;
                match state {
                    State::Wait => {
                        pres.next_slide();
                        self.state = State::Playing;
                    }
                    State::Playing => {
                        if pres.direction().is_reversed() {
                            pres.replay();
                        } else if self.opts.next_terminates_loop && pres.current_slide().is_loop()
                        {
                            pres.break_loop();
                        } else {
                            pres.next_slide();
                        }
                    }
                    State::Paused => {
                        if pres.direction().is_reversed() {
                            pres.replay();
                        }
                        self.state = State::Playing;
                    }
                    State::End => {}
                }
            }
            Action::Previous => self.previous(),
            Action::Reverse => {
                if pres.reverse() {
                    self.state = State::Playing;
                }
            }
            Action::Replay => {
                pres.replay();
                self.state = State::Playing;
            }
            Action::FullScreen => self.display.toggle_full_screen(),
            Action::HideMouse => self.display.toggle_mouse(),
        }
        None
    }

    fn previous(&mut self) {
        let pres = &mut self.presentations[self.index];
        pres.cancel_reverse();
        self.state = State::Playing;
        if pres.current_slide_index() > 0 {
            pres.prev_slide();
        } else if self.index > 0 {
            pres.release();
            self.index -= 1;
            self.presentations[self.index].go_to_last_slide();
        }
    }

    fn info(&mut self) -> DisplayInfo {
        let scene_count = self.presentations.len();
        let rate = self.opts.playback_rate;
        let pres = &mut self.presentations[self.index];
        let fps = pres.frame_rate(rate);
        let slide = pres.current_slide();
        DisplayInfo {
            scene_name: pres.name().to_owned(),
            scene_index: self.index,
            scene_count,
            slide_index: pres.current_slide_index(),
            slide_count: pres.len(),
            slide_number: slide.number,
            kind: slide.kind,
            state: self.state,
            direction: pres.direction(),
            notes: slide.config.notes.clone(),
            fps,
        }
    }
}

/// Resolve a possibly negative start index, falling back to 0 when out of range.
fn resolve_index(requested: isize, len: usize, what: &str) -> usize {
    let resolved = if requested < 0 {
        len.checked_sub(requested.unsigned_abs())
    } else {
        Some(requested as usize).filter(|&i| i < len)
    };
    resolved.unwrap_or_else(|| {
        tracing::warn!("start {what} number {requested} is out of range (0..{len}), using 0");
        0
    })
}

#[cfg(test)]
#[path = "../../tests/unit/present/player.rs"]
mod tests;
