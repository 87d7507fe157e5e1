//! Recording side: scene scripts in, slide descriptors out.

/// Slide boundary recorder.
pub mod recorder;
/// Renderer capability trait and the JSON scene manifest.
pub mod renderer;
