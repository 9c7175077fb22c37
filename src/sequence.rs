//! Fixed-length, ordered list of frames with a load-complete flag per slot.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::Error;
use crate::events::PreparedFrame;

#[derive(Debug, Clone)]
pub enum SlotState {
    Pending,
    Ready(Arc<PreparedFrame>),
    Failed,
}

#[derive(Debug, Clone)]
struct Slot {
    path: PathBuf,
    state: SlotState,
}

/// The image sequence the cycler walks. Its length never changes.
#[derive(Debug, Clone)]
pub struct FrameSequence {
    slots: Vec<Slot>,
}

impl FrameSequence {
    /// Construct a sequence with every slot pending.
    ///
    /// # Errors
    /// Returns [`Error::EmptySequence`] if `paths` is empty.
    pub fn new(paths: Vec<PathBuf>) -> Result<Self, Error> {
        if paths.is_empty() {
            return Err(Error::EmptySequence);
        }
        let slots = paths
            .into_iter()
            .map(|path| Slot {
                path,
                state: SlotState::Pending,
            })
            .collect();
        Ok(Self { slots })
    }

    /// Number of frames (`imax`).
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Always false; construction rejects empty sequences.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    #[must_use]
    pub fn path(&self, index: usize) -> Option<&Path> {
        self.slots.get(index).map(|s| s.path.as_path())
    }

    #[must_use]
    pub fn state(&self, index: usize) -> Option<&SlotState> {
        self.slots.get(index).map(|s| &s.state)
    }

    /// The decoded frame at `index`, if it has finished loading.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Arc<PreparedFrame>> {
        match self.state(index) {
            Some(SlotState::Ready(frame)) => Some(frame),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_complete(&self, index: usize) -> bool {
        self.get(index).is_some()
    }

    pub fn mark_ready(&mut self, index: usize, frame: Arc<PreparedFrame>) -> Result<(), Error> {
        self.slot_mut(index)?.state = SlotState::Ready(frame);
        Ok(())
    }

    pub fn mark_failed(&mut self, index: usize) -> Result<(), Error> {
        self.slot_mut(index)?.state = SlotState::Failed;
        Ok(())
    }

    /// True once no slot is still pending.
    #[must_use]
    pub fn settled(&self) -> bool {
        !self
            .slots
            .iter()
            .any(|s| matches!(s.state, SlotState::Pending))
    }

    #[must_use]
    pub fn ready_count(&self) -> usize {
        self.slots
            .iter()
            .filter(|s| matches!(s.state, SlotState::Ready(_)))
            .count()
    }

    /// Borrow the frame paths in order.
    pub fn paths(&self) -> impl Iterator<Item = &Path> {
        self.slots.iter().map(|s| s.path.as_path())
    }

    fn slot_mut(&mut self, index: usize) -> Result<&mut Slot, Error> {
        let len = self.slots.len();
        self.slots
            .get_mut(index)
            .ok_or(Error::FrameOutOfRange { index, len })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(path: &str) -> Arc<PreparedFrame> {
        Arc::new(PreparedFrame {
            path: PathBuf::from(path),
            width: 1,
            height: 1,
            pixels: vec![0, 0, 0, 255],
        })
    }

    #[test]
    fn rejects_empty_sequence() {
        assert!(matches!(
            FrameSequence::new(Vec::new()),
            Err(Error::EmptySequence)
        ));
    }

    #[test]
    fn tracks_slot_completion() {
        let mut seq =
            FrameSequence::new(vec![PathBuf::from("a.png"), PathBuf::from("b.png")]).unwrap();
        assert_eq!(seq.len(), 2);
        assert!(!seq.is_complete(0));
        assert!(!seq.settled());

        seq.mark_ready(0, frame("a.png")).unwrap();
        assert!(seq.is_complete(0));
        assert_eq!(seq.ready_count(), 1);
        assert!(!seq.settled());

        seq.mark_failed(1).unwrap();
        assert!(!seq.is_complete(1));
        assert!(seq.settled());
        assert_eq!(seq.ready_count(), 1);
    }

    #[test]
    fn marking_out_of_range_is_an_error() {
        let mut seq = FrameSequence::new(vec![PathBuf::from("a.png")]).unwrap();
        assert!(matches!(
            seq.mark_failed(3),
            Err(Error::FrameOutOfRange { index: 3, len: 1 })
        ));
        assert!(!seq.is_complete(3));
        assert!(seq.path(3).is_none());
    }
}
