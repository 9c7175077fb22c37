use thiserror::Error;

/// Library error type for frame-cycler operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Discovery produced no frames to cycle through.
    #[error("no frames found to animate")]
    EmptySequence,

    /// The configured playback range does not fit the sequence.
    #[error("invalid playback range {first}..={last} for {len} frames")]
    BadRange { first: usize, last: usize, len: usize },

    /// A frame index outside `[0, len)`.
    #[error("frame {index} out of range for {len} frames")]
    FrameOutOfRange { index: usize, len: usize },

    /// Operator input that does not name a control.
    #[error("unknown command: {0:?}")]
    UnknownCommand(String),

    /// Underlying IO error.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// YAML/serde configuration error.
    #[error(transparent)]
    Config(#[from] serde_yaml::Error),
}
