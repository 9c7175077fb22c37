//! Display boundary: whatever shows the current frame and its status label.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use image::{ImageFormat, RgbaImage};
use tracing::{debug, info};

use crate::events::PreparedFrame;

/// Text shown next to the frame, `index` being 0-based.
#[must_use]
pub fn status_label(index: usize, len: usize) -> String {
    format!("Displaying {} of {}", index + 1, len)
}

pub trait Surface {
    /// Swap the displayed image for `frame`.
    fn replace(&mut self, index: usize, frame: &PreparedFrame) -> Result<()>;

    fn set_status(&mut self, status: &str) -> Result<()>;
}

/// Reports swaps through tracing only.
#[derive(Debug, Default)]
pub struct LogSurface {
    current: Option<usize>,
}

impl Surface for LogSurface {
    fn replace(&mut self, index: usize, frame: &PreparedFrame) -> Result<()> {
        debug!(
            from = ?self.current,
            to = index,
            path = %frame.path.display(),
            width = frame.width,
            height = frame.height,
            "swap frame"
        );
        self.current = Some(index);
        Ok(())
    }

    fn set_status(&mut self, status: &str) -> Result<()> {
        info!("{status}");
        Ok(())
    }
}

/// Writes the displayed frame to a PNG so other programs can pick it up.
#[derive(Debug)]
pub struct FileSurface {
    target: PathBuf,
    staging: PathBuf,
}

impl FileSurface {
    pub fn new(target: impl Into<PathBuf>) -> Self {
        let target = target.into();
        let mut staging = target.clone().into_os_string();
        staging.push(".partial");
        Self {
            target,
            staging: PathBuf::from(staging),
        }
    }

    #[must_use]
    pub fn target(&self) -> &Path {
        &self.target
    }
}

impl Surface for FileSurface {
    fn replace(&mut self, index: usize, frame: &PreparedFrame) -> Result<()> {
        let img = RgbaImage::from_raw(frame.width, frame.height, frame.pixels.clone())
            .ok_or_else(|| {
                anyhow!(
                    "frame {} has {} bytes, expected {}x{} rgba",
                    frame.path.display(),
                    frame.pixels.len(),
                    frame.width,
                    frame.height
                )
            })?;
        // Readers only ever see a whole file.
        img.save_with_format(&self.staging, ImageFormat::Png)
            .with_context(|| format!("writing {}", self.staging.display()))?;
        std::fs::rename(&self.staging, &self.target)
            .with_context(|| format!("replacing {}", self.target.display()))?;
        debug!(index, file = %self.target.display(), "frame written");
        Ok(())
    }

    fn set_status(&mut self, status: &str) -> Result<()> {
        info!(file = %self.target.display(), "{status}");
        Ok(())
    }
}

/// In-memory surface for tests: records every swap and label.
pub mod testkit {
    use std::sync::{Arc, Mutex};

    use anyhow::{Result, bail};

    use super::Surface;
    use crate::events::PreparedFrame;

    #[derive(Debug, Default)]
    struct Record {
        swaps: Vec<usize>,
        labels: Vec<String>,
        fail_next: bool,
    }

    /// Cloning shares the record, so a test can keep one handle while the
    /// player owns another.
    #[derive(Debug, Clone, Default)]
    pub struct RecordingSurface {
        inner: Arc<Mutex<Record>>,
    }

    impl RecordingSurface {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn swaps(&self) -> Vec<usize> {
            self.inner.lock().unwrap().swaps.clone()
        }

        pub fn labels(&self) -> Vec<String> {
            self.inner.lock().unwrap().labels.clone()
        }

        /// Make the next `replace` fail once.
        pub fn fail_next(&self) {
            self.inner.lock().unwrap().fail_next = true;
        }
    }

    impl Surface for RecordingSurface {
        fn replace(&mut self, index: usize, _frame: &PreparedFrame) -> Result<()> {
            let mut rec = self.inner.lock().unwrap();
            if std::mem::take(&mut rec.fail_next) {
                bail!("surface unavailable");
            }
            rec.swaps.push(index);
            Ok(())
        }

        fn set_status(&mut self, status: &str) -> Result<()> {
            self.inner.lock().unwrap().labels.push(status.to_string());
            Ok(())
        }
    }
}
