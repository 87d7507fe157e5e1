//! Assembly: per-animation clips in, per-slide clips and a presentation config out.

/// Descriptor-driven merging, reversal and persistence.
pub mod assembler;
/// External media tooling (ffmpeg/ffprobe).
pub mod media;
