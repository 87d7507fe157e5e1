//! Presentation side: clip readers, the per-scene state machine, the player loop and its sinks.

/// Output sinks.
pub mod display;
/// Key-driven playback across presentations.
pub mod player;
/// Per-scene playback cursor and `update_state`.
pub mod presentation;
/// Recording display sink.
pub mod recording;
/// Clip decoding.
pub mod reader;
