//! Slide data model shared by the recorder, the assembler and the player.

/// Descriptors, records and presentation configs.
pub mod model;
