use std::path::PathBuf;

/// Crate-wide result alias.
pub type SlidesResult<T> = Result<T, SlidesError>;

/// Errors produced while recording, assembling, loading or presenting slides.
#[derive(thiserror::Error, Debug)]
pub enum SlidesError {
    /// Bad user input or a violated data-model invariant.
    #[error("validation error: {0}")]
    Validation(String),

    /// Scene script used in an order the recorder does not accept.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// `start_loop` while another loop is still open.
    #[error("nested loop error: cannot start a loop while another loop is open")]
    NestedLoop,

    /// `end_loop` without a matching `start_loop`.
    #[error("no open loop error: a loop must be started before it can be ended")]
    NoOpenLoop,

    /// A clip referenced by a descriptor or a config does not exist on disk.
    #[error("missing animation file: '{}'", path.display())]
    MissingAnimationFile {
        /// Path that was expected to exist.
        path: PathBuf,
    },

    /// An external media tool (ffmpeg/ffprobe) failed.
    #[error("media error: {0}")]
    Media(String),

    /// Runtime failure inside the playback loop.
    #[error("playback error: {0}")]
    Playback(String),

    #[error("serialization error: {0}")]
    Serde(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl SlidesError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn missing_file(path: impl Into<PathBuf>) -> Self {
        Self::MissingAnimationFile { path: path.into() }
    }

    pub fn media(msg: impl Into<String>) -> Self {
        Self::Media(msg.into())
    }

    pub fn playback(msg: impl Into<String>) -> Self {
        Self::Playback(msg.into())
    }

    pub fn serde(msg: impl Into<String>) -> Self {
        Self::Serde(msg.into())
    }

    /// `true` for errors that come from user input rather than the environment.
    pub fn is_usage_error(&self) -> bool {
        matches!(
            self,
            Self::Validation(_)
                | Self::Configuration(_)
                | Self::NestedLoop
                | Self::NoOpenLoop
                | Self::Serde(_)
        )
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/error.rs"]
mod tests;
