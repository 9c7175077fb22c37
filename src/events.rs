use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use crate::error::Error;

/// Files -> Loader: decode the image backing slot `index`.
#[derive(Debug, Clone)]
pub struct LoadFrame {
    pub index: usize,
    pub path: PathBuf,
}

/// Decoded RGBA8 pixels for one frame.
#[derive(Debug, Clone)]
pub struct PreparedFrame {
    pub path: PathBuf,
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

/// Loader -> Player: outcome of a decode.
#[derive(Debug, Clone)]
pub enum FrameEvent {
    Loaded { index: usize, frame: Arc<PreparedFrame> },
    Failed { index: usize, path: PathBuf },
}

/// Emitted by the player after a frame reaches the surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Displayed {
    pub index: usize,
    pub path: PathBuf,
}

/// Operator commands accepted by the player.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    Play,
    Step,
    Reverse,
    Stop,
    Toggle,
    Faster,
    Slower,
    Swing,
    /// Jump to a 1-based frame number.
    Seek(usize),
}

impl FromStr for Control {
    type Err = Error;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        // A bare space is the toggle key; anything else is trimmed.
        if raw == " " {
            return Ok(Self::Toggle);
        }
        let line = raw.trim().to_ascii_lowercase();
        let mut words = line.split_whitespace();
        let head = words.next().unwrap_or_default();
        let arg = words.next();
        if words.next().is_some() {
            return Err(Error::UnknownCommand(raw.to_string()));
        }

        let control = match (head, arg) {
            ("play" | "p", None) => Self::Play,
            ("step" | "s" | "n", None) => Self::Step,
            ("reverse" | "r", None) => Self::Reverse,
            ("stop" | "x", None) => Self::Stop,
            ("toggle" | "t" | "space", None) => Self::Toggle,
            ("faster" | "+", None) => Self::Faster,
            ("slower" | "-", None) => Self::Slower,
            ("swing" | "w", None) => Self::Swing,
            ("seek" | "g", Some(n)) => match n.parse::<usize>() {
                Ok(n) if n >= 1 => Self::Seek(n),
                _ => return Err(Error::UnknownCommand(raw.to_string())),
            },
            _ => return Err(Error::UnknownCommand(raw.to_string())),
        };
        Ok(control)
    }
}
