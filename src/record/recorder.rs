use crate::foundation::error::{SlidesError, SlidesResult};
use crate::record::renderer::SceneEvent;
use crate::slides::model::{BaseSlideConfig, SlideDescriptor, SlideKind, validate_animation_range};

/// Turns a scene's sequence of `play` calls and slide markers into [`SlideDescriptor`]s.
///
/// Spans are contiguous: every boundary (`next_slide`, `start_loop`, `end_loop`) closes the open
/// span at the current animation count, so the finalized list covers `[0, N)` exactly.
#[derive(Debug, Default)]
pub struct Recorder {
    descriptors: Vec<SlideDescriptor>,
    current_animation: usize,
    span_start: usize,
    loop_start: Option<usize>,
    pending: BaseSlideConfig,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one rendered animation clip.
    pub fn play(&mut self) {
        self.current_animation += 1;
    }

    pub fn current_animation(&self) -> usize {
        self.current_animation
    }

    pub fn is_loop_open(&self) -> bool {
        self.loop_start.is_some()
    }

    pub fn descriptors(&self) -> &[SlideDescriptor] {
        &self.descriptors
    }

    /// Close the open span as a `slide` and carry `config` to the next span.
    ///
    /// An empty span produces no descriptor.
    pub fn next_slide(&mut self, config: BaseSlideConfig) -> SlidesResult<()> {
        if self.loop_start.is_some() {
            return Err(SlidesError::configuration(
                "cannot call next_slide while a loop is open; call end_loop first",
            ));
        }
        let config = config.normalized()?;
        self.close_open_span(SlideKind::Slide)?;
        self.pending = config;
        Ok(())
    }

    pub fn start_loop(&mut self) -> SlidesResult<()> {
        if self.loop_start.is_some() {
            return Err(SlidesError::NestedLoop);
        }
        self.close_open_span(SlideKind::Slide)?;
        self.pending = BaseSlideConfig::default();
        self.loop_start = Some(self.current_animation);
        Ok(())
    }

    pub fn end_loop(&mut self) -> SlidesResult<()> {
        let start = self.loop_start.ok_or(SlidesError::NoOpenLoop)?;
        if start == self.current_animation {
            return Err(SlidesError::validation(
                "a loop must play at least one animation before it is ended",
            ));
        }
        self.push(
            SlideKind::Loop,
            start,
            self.current_animation,
            BaseSlideConfig::looping(),
        )?;
        self.loop_start = None;
        self.span_start = self.current_animation;
        Ok(())
    }

    /// Apply one recorded scene event.
    pub fn apply(&mut self, event: &SceneEvent) -> SlidesResult<()> {
        match event {
            SceneEvent::Play { count } => {
                for _ in 0..*count {
                    self.play();
                }
                Ok(())
            }
            SceneEvent::NextSlide(config) => self.next_slide(config.clone()),
            SceneEvent::StartLoop => self.start_loop(),
            SceneEvent::EndLoop => self.end_loop(),
        }
    }

    /// Replay a whole event script and finalize it.
    pub fn replay<'a>(
        events: impl IntoIterator<Item = &'a SceneEvent>,
    ) -> SlidesResult<Vec<SlideDescriptor>> {
        let mut rec = Self::new();
        for event in events {
            rec.apply(event)?;
        }
        rec.finalize()
    }

    /// Close the trailing span and make sure the list ends in exactly one `last` descriptor.
    pub fn finalize(mut self) -> SlidesResult<Vec<SlideDescriptor>> {
        if self.loop_start.is_some() {
            return Err(SlidesError::configuration(
                "a loop was started but never ended; call end_loop before the scene ends",
            ));
        }
        validate_animation_range(0, self.current_animation)?;

        if self.span_start < self.current_animation {
            let pending = std::mem::take(&mut self.pending);
            self.push(
                SlideKind::Last,
                self.span_start,
                self.current_animation,
                pending,
            )?;
        } else if let Some(last) = self.descriptors.last_mut() {
            debug_assert_eq!(last.end_animation, self.current_animation);
            last.kind = SlideKind::Last;
        }

        Ok(self.descriptors)
    }

    fn close_open_span(&mut self, kind: SlideKind) -> SlidesResult<()> {
        if self.current_animation > self.span_start {
            let config = std::mem::take(&mut self.pending);
            self.push(kind, self.span_start, self.current_animation, config)?;
        }
        self.span_start = self.current_animation;
        Ok(())
    }

    fn push(
        &mut self,
        kind: SlideKind,
        start: usize,
        end: usize,
        config: BaseSlideConfig,
    ) -> SlidesResult<()> {
        let number = self.descriptors.len() + 1;
        self.descriptors
            .push(SlideDescriptor::new(kind, number, start, end, config)?);
        Ok(())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/record/recorder.rs"]
mod tests;
