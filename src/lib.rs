//! Wavyte Slides turns a scene's rendered animation clips into keyboard-driven slides.
//!
//! - Record slide boundaries from a scene script with a [`Recorder`]
//! - Merge and reverse clips into a [`PresentationConfig`] with an [`Assembler`]
//! - Present one or more configs with a [`Player`]
#![forbid(unsafe_code)]

mod foundation;

/// Merging, reversing and persisting slide clips.
pub mod assemble;
/// Keybinding configuration.
pub mod config;
/// Playback.
pub mod present;
/// Scene recording.
pub mod record;
/// Slide data model.
pub mod slides;

pub use crate::foundation::core::{Color, Direction, FrameRGBA, Resolution};
pub use crate::foundation::error::{SlidesError, SlidesResult};

pub use crate::assemble::assembler::{
    AssembleOpts, AssembleReport, Assembler, SlideFailure, merge_basenames, persist,
};
pub use crate::assemble::media::{FfmpegTools, MediaTools, ReverseOpts};
pub use crate::config::Config;
pub use crate::config::keys::{Action, Key, KeyDispatch, Keys};
pub use crate::present::display::{DisplayInfo, DisplaySink, InMemoryDisplay, NullDisplay};
pub use crate::present::player::{KeyRelay, Player, PlayerOpts, PlayerStats, RunOutcome, StopHandle};
pub use crate::present::presentation::{Presentation, State};
pub use crate::present::reader::{ClipOpener, ClipReader, FfmpegClipOpener, InMemoryClips};
pub use crate::present::recording::{FfmpegRecorder, FfmpegRecorderOpts};
pub use crate::record::recorder::Recorder;
pub use crate::record::renderer::{ProgressMode, SceneEvent, SceneManifest, SceneRenderer};
pub use crate::slides::model::{
    BaseSlideConfig, PresentationConfig, SlideDescriptor, SlideKind, SlideRecord,
};
