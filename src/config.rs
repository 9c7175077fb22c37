use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Result, ensure};
use serde::Deserialize;

use crate::cycler::{Direction, FrameRange};
use crate::error::Error;

/// What `animate` does when the frame it advanced to has not finished loading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum StallPolicy {
    /// Keep the timer running; the next tick moves past the frame.
    Retry,
    /// Arm nothing and stop playing until the operator plays again.
    #[default]
    Stall,
}

/// 1-based inclusive playback bounds. Missing ends default to the sequence ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "kebab-case", default)]
pub struct RangeOptions {
    pub first: Option<usize>,
    pub last: Option<usize>,
}

impl RangeOptions {
    /// Resolve against a sequence of `len` frames into 0-based bounds.
    ///
    /// `last` beyond the sequence is clamped; `first` beyond it is an error.
    pub fn resolve(&self, len: usize) -> Result<FrameRange, Error> {
        if len == 0 {
            return Err(Error::EmptySequence);
        }
        let first = self.first.unwrap_or(1);
        let last = self.last.unwrap_or(len).min(len);
        if first == 0 || first > last {
            return Err(Error::BadRange { first, last, len });
        }
        FrameRange::new(first - 1, last - 1, len)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct Configuration {
    /// Directory scanned recursively for frames when `frames` is empty.
    pub frames_path: PathBuf,
    /// Explicit ordered frame list; takes precedence over `frames-path`.
    pub frames: Vec<PathBuf>,
    /// Time each frame stays up while playing.
    #[serde(with = "humantime_serde")]
    pub delay: Duration,
    /// Initial direction of travel.
    pub direction: Direction,
    /// Bounce between the range ends instead of wrapping.
    pub swing: bool,
    /// Playback bounds.
    pub range: RangeOptions,
    /// Start playing once every frame has finished loading.
    pub autoplay: bool,
    /// Behaviour when a tick lands on a frame that is not loaded.
    pub on_unloaded: StallPolicy,
    /// Maximum number of concurrent image decodes in the loader.
    pub loader_max_concurrent_decodes: usize,
    /// Write the displayed frame to this PNG instead of only logging swaps.
    pub output_path: Option<PathBuf>,
}

impl Configuration {
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, Error> {
        let s = std::fs::read_to_string(path)?;
        Ok(serde_yaml::from_str(&s)?)
    }

    /// Validate runtime invariants that cannot be expressed via serde defaults alone.
    pub fn validated(self) -> Result<Self> {
        ensure!(
            !self.frames_path.as_os_str().is_empty() || !self.frames.is_empty(),
            "either frames-path or frames must be set"
        );
        ensure!(self.delay > Duration::ZERO, "delay must be greater than zero");
        ensure!(
            self.loader_max_concurrent_decodes > 0,
            "loader-max-concurrent-decodes must be greater than zero"
        );
        if let Some(first) = self.range.first {
            ensure!(first >= 1, "range.first is 1-based and must be >= 1");
        }
        if let (Some(first), Some(last)) = (self.range.first, self.range.last) {
            ensure!(first <= last, "range.first must not exceed range.last");
        }
        Ok(self)
    }
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            frames_path: PathBuf::new(),
            frames: Vec::new(),
            delay: Duration::from_millis(250),
            direction: Direction::Forward,
            swing: false,
            range: RangeOptions::default(),
            autoplay: true,
            on_unloaded: StallPolicy::default(),
            loader_max_concurrent_decodes: 4,
            output_path: None,
        }
    }
}
