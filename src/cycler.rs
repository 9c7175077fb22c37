//! The frame cycler: a cursor over a [`FrameSequence`] plus the single
//! timer that drives playback.
//!
//! Rules:
//! - `frame` never leaves `[0, len)`.
//! - At most one tick is pending; it is held as a deadline the caller awaits.
//! - The surface only ever receives frames whose slot finished loading.

use std::time::{Duration, Instant};

use serde::Deserialize;
use tracing::{debug, trace};

use crate::config::StallPolicy;
use crate::error::Error;
use crate::sequence::FrameSequence;
use crate::surface::{Surface, status_label};

pub const MIN_DELAY: Duration = Duration::from_millis(10);
pub const MAX_DELAY: Duration = Duration::from_secs(10);
// faster/slower scale the delay by 2/3 and 3/2.
const DELAY_NUM: u32 = 3;
const DELAY_DEN: u32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum Direction {
    #[default]
    Forward,
    Backward,
}

impl Direction {
    #[must_use]
    pub const fn flipped(self) -> Self {
        match self {
            Self::Forward => Self::Backward,
            Self::Backward => Self::Forward,
        }
    }
}

/// Inclusive 0-based playback bounds inside a sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameRange {
    start: usize,
    stop: usize,
}

impl FrameRange {
    pub fn new(start: usize, stop: usize, len: usize) -> Result<Self, Error> {
        if start > stop || stop >= len {
            return Err(Error::BadRange {
                first: start + 1,
                last: stop + 1,
                len,
            });
        }
        Ok(Self { start, stop })
    }

    /// The whole sequence.
    pub fn full(len: usize) -> Result<Self, Error> {
        if len == 0 {
            return Err(Error::EmptySequence);
        }
        Ok(Self {
            start: 0,
            stop: len - 1,
        })
    }

    #[must_use]
    pub const fn start(&self) -> usize {
        self.start
    }

    #[must_use]
    pub const fn stop(&self) -> usize {
        self.stop
    }

    #[must_use]
    pub const fn contains(&self, index: usize) -> bool {
        index >= self.start && index <= self.stop
    }
}

/// Result of trying to put the current frame on the surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Render {
    Shown,
    NotReady,
}

#[derive(Debug, Clone)]
pub struct FrameCycler {
    len: usize,
    frame: usize,
    direction: Direction,
    swing: bool,
    range: FrameRange,
    delay: Duration,
    policy: StallPolicy,
    playing: bool,
    timer: Option<Instant>,
    started: bool,
}

impl FrameCycler {
    /// The first `animate`/`step` lands on the range start (or the range
    /// stop when running backward at that moment).
    pub fn new(len: usize, range: FrameRange, direction: Direction) -> Result<Self, Error> {
        if len == 0 {
            return Err(Error::EmptySequence);
        }
        if range.stop >= len {
            return Err(Error::BadRange {
                first: range.start + 1,
                last: range.stop + 1,
                len,
            });
        }
        let frame = match direction {
            Direction::Forward => range.start,
            Direction::Backward => range.stop,
        };
        Ok(Self {
            len,
            frame,
            direction,
            swing: false,
            range,
            delay: Duration::from_millis(250),
            policy: StallPolicy::default(),
            playing: false,
            timer: None,
            started: false,
        })
    }

    #[must_use]
    pub fn with_swing(mut self, swing: bool) -> Self {
        self.swing = swing;
        self
    }

    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.set_delay(delay);
        self
    }

    #[must_use]
    pub fn with_policy(mut self, policy: StallPolicy) -> Self {
        self.policy = policy;
        self
    }

    #[must_use]
    pub const fn frame(&self) -> usize {
        self.frame
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[must_use]
    pub const fn direction(&self) -> Direction {
        self.direction
    }

    #[must_use]
    pub const fn swing(&self) -> bool {
        self.swing
    }

    #[must_use]
    pub const fn range(&self) -> FrameRange {
        self.range
    }

    #[must_use]
    pub const fn delay(&self) -> Duration {
        self.delay
    }

    #[must_use]
    pub const fn policy(&self) -> StallPolicy {
        self.policy
    }

    #[must_use]
    pub const fn is_playing(&self) -> bool {
        self.playing
    }

    /// When the pending tick is due, if one is armed.
    #[must_use]
    pub const fn deadline(&self) -> Option<Instant> {
        self.timer
    }

    /// Move one frame in the current direction, wrapping inside the range.
    ///
    /// In swing mode the cursor never wraps: arriving at the bound ahead
    /// flips the direction, and a cursor already sitting on the bound ahead
    /// (after a seek or a reverse) bounces back inward.
    pub fn advance(&mut self) {
        let FrameRange { start, stop } = self.range;
        let bouncing = self.swing && start != stop;

        if !self.started {
            self.started = true;
            self.frame = match self.direction {
                Direction::Forward => start,
                Direction::Backward => stop,
            };
        } else {
            let outside = !self.range.contains(self.frame);
            let at_bound_ahead = match self.direction {
                Direction::Forward => self.frame == stop,
                Direction::Backward => self.frame == start,
            };
            if bouncing && !outside && at_bound_ahead {
                self.reverse();
            }
            self.frame = match self.direction {
                Direction::Forward if outside || self.frame >= stop => start,
                Direction::Forward => self.frame + 1,
                Direction::Backward if outside || self.frame <= start => stop,
                Direction::Backward => self.frame - 1,
            };
        }

        if bouncing {
            let bound = match self.direction {
                Direction::Forward => stop,
                Direction::Backward => start,
            };
            if self.frame == bound {
                self.reverse();
            }
        }
        trace!(frame = self.frame, direction = ?self.direction, "advanced");
    }

    /// Show the current frame if its image has finished loading.
    pub fn render_current<S: Surface + ?Sized>(
        &self,
        sequence: &FrameSequence,
        surface: &mut S,
    ) -> anyhow::Result<Render> {
        let Some(image) = sequence.get(self.frame) else {
            debug!(frame = self.frame, "frame not loaded; skipping render");
            return Ok(Render::NotReady);
        };
        surface.replace(self.frame, image)?;
        surface.set_status(&status_label(self.frame, self.len))?;
        Ok(Render::Shown)
    }

    /// One playback tick: advance, render, and arm the next tick.
    ///
    /// Any pending tick is replaced, never stacked.
    pub fn animate<S: Surface + ?Sized>(
        &mut self,
        sequence: &FrameSequence,
        surface: &mut S,
        now: Instant,
    ) -> anyhow::Result<Render> {
        self.timer = None;
        self.advance();
        let rendered = match self.render_current(sequence, surface) {
            Ok(r) => r,
            Err(err) => {
                self.playing = false;
                return Err(err);
            }
        };
        match (rendered, self.policy) {
            (Render::Shown, _) | (Render::NotReady, StallPolicy::Retry) => {
                self.timer = Some(now + self.delay);
                self.playing = true;
            }
            (Render::NotReady, StallPolicy::Stall) => {
                debug!(frame = self.frame, "playback stalled on unloaded frame");
                self.playing = false;
            }
        }
        Ok(rendered)
    }

    /// Cancel playback and move exactly one frame.
    pub fn step<S: Surface + ?Sized>(
        &mut self,
        sequence: &FrameSequence,
        surface: &mut S,
    ) -> anyhow::Result<Render> {
        self.stop();
        self.advance();
        self.render_current(sequence, surface)
    }

    pub fn reverse(&mut self) {
        self.direction = self.direction.flipped();
    }

    pub fn stop(&mut self) {
        self.timer = None;
        self.playing = false;
    }

    /// Cancel playback and jump to `index` (0-based).
    pub fn seek<S: Surface + ?Sized>(
        &mut self,
        index: usize,
        sequence: &FrameSequence,
        surface: &mut S,
    ) -> anyhow::Result<Render> {
        if index >= self.len {
            return Err(Error::FrameOutOfRange {
                index,
                len: self.len,
            }
            .into());
        }
        self.stop();
        self.frame = index;
        self.started = true;
        self.render_current(sequence, surface)
    }

    pub fn set_swing(&mut self, swing: bool) {
        self.swing = swing;
    }

    pub fn toggle_swing(&mut self) -> bool {
        self.swing = !self.swing;
        self.swing
    }

    /// Clamped to `[MIN_DELAY, MAX_DELAY]`. A pending tick keeps its deadline.
    pub fn set_delay(&mut self, delay: Duration) {
        self.delay = delay.clamp(MIN_DELAY, MAX_DELAY);
    }

    pub fn faster(&mut self) -> Duration {
        self.set_delay(self.delay * DELAY_DEN / DELAY_NUM);
        self.delay
    }

    pub fn slower(&mut self) -> Duration {
        self.set_delay(self.delay * DELAY_NUM / DELAY_DEN);
        self.delay
    }

    /// The next `ticks` frames `advance` would visit, leaving `self` untouched.
    #[must_use]
    pub fn plan(&self, ticks: usize) -> Vec<usize> {
        let mut cursor = self.clone();
        (0..ticks)
            .map(|_| {
                cursor.advance();
                cursor.frame
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::PreparedFrame;
    use crate::surface::testkit::RecordingSurface;
    use std::path::PathBuf;
    use std::sync::Arc;

    fn sequence(len: usize, loaded: &[usize]) -> FrameSequence {
        let paths = (0..len)
            .map(|i| PathBuf::from(format!("frame{i}.png")))
            .collect();
        let mut seq = FrameSequence::new(paths).unwrap();
        for &i in loaded {
            let frame = PreparedFrame {
                path: PathBuf::from(format!("frame{i}.png")),
                width: 1,
                height: 1,
                pixels: vec![0, 0, 0, 255],
            };
            seq.mark_ready(i, Arc::new(frame)).unwrap();
        }
        seq
    }

    fn all(len: usize) -> Vec<usize> {
        (0..len).collect()
    }

    fn cycler(len: usize) -> FrameCycler {
        FrameCycler::new(len, FrameRange::full(len).unwrap(), Direction::Forward).unwrap()
    }

    #[test]
    fn first_tick_lands_on_range_start() {
        let mut c = cycler(4);
        c.advance();
        assert_eq!(c.frame(), 0);

        let range = FrameRange::new(1, 2, 4).unwrap();
        let mut back = FrameCycler::new(4, range, Direction::Backward).unwrap();
        back.advance();
        assert_eq!(back.frame(), 2);
    }

    #[test]
    fn forward_and_backward_wrap() {
        let c = cycler(3);
        assert_eq!(c.plan(7), vec![0, 1, 2, 0, 1, 2, 0]);

        let mut c = cycler(3);
        c.reverse();
        assert_eq!(c.plan(5), vec![2, 1, 0, 2, 1]);
    }

    #[test]
    fn advance_stays_in_bounds_from_every_frame() {
        for len in 1..6 {
            for start in 0..len {
                for stop in start..len {
                    let range = FrameRange::new(start, stop, len).unwrap();
                    for swing in [false, true] {
                        for dir in [Direction::Forward, Direction::Backward] {
                            for frame in 0..len {
                                let mut c = FrameCycler::new(len, range, dir)
                                    .unwrap()
                                    .with_swing(swing);
                                c.frame = frame;
                                c.started = true;
                                for _ in 0..(2 * len + 2) {
                                    c.advance();
                                    assert!(c.frame() < len);
                                    assert!(range.contains(c.frame()));
                                }
                            }
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn swing_bounces_between_range_ends() {
        let range = FrameRange::new(1, 3, 5).unwrap();
        let c = FrameCycler::new(5, range, Direction::Forward)
            .unwrap()
            .with_swing(true);
        assert_eq!(c.plan(9), vec![1, 2, 3, 2, 1, 2, 3, 2, 1]);
    }

    #[test]
    fn swing_flips_once_per_bound() {
        let mut c = cycler(4).with_swing(true);
        let mut flips = 0;
        let mut last = c.direction();
        for _ in 0..12 {
            c.advance();
            if c.direction() != last {
                flips += 1;
                let bound = match last {
                    Direction::Forward => 3,
                    Direction::Backward => 0,
                };
                assert_eq!(c.frame(), bound, "flip only on arriving at a bound");
                last = c.direction();
            }
        }
        // 0,1,2,3|2,1,0|1,2,3|2,1
        assert_eq!(flips, 3);
    }

    #[test]
    fn swing_bounces_after_seek_to_stop() {
        let seq = sequence(4, &all(4));
        let mut surface = RecordingSurface::new();
        let mut c = cycler(4).with_swing(true);
        c.seek(3, &seq, &mut surface).unwrap();
        assert_eq!(c.direction(), Direction::Forward);
        assert_eq!(c.plan(5), vec![2, 1, 0, 1, 2]);

        c.seek(0, &seq, &mut surface).unwrap();
        c.reverse();
        assert_eq!(c.plan(4), vec![1, 2, 3, 2]);
    }

    #[test]
    fn swing_bounces_after_reverse_at_stop() {
        let mut c = cycler(4).with_swing(true);
        for _ in 0..4 {
            c.advance();
        }
        assert_eq!((c.frame(), c.direction()), (3, Direction::Backward));

        c.reverse();
        assert_eq!(c.plan(4), vec![2, 1, 0, 1]);
    }

    #[test]
    fn swing_starting_backward_begins_at_stop() {
        let c = FrameCycler::new(4, FrameRange::full(4).unwrap(), Direction::Backward)
            .unwrap()
            .with_swing(true);
        assert_eq!(c.plan(8), vec![3, 2, 1, 0, 1, 2, 3, 2]);
    }

    #[test]
    fn swing_never_wraps_from_any_state() {
        for frame in 0..5 {
            for dir in [Direction::Forward, Direction::Backward] {
                let mut c = cycler(5).with_swing(true);
                c.frame = frame;
                c.direction = dir;
                c.started = true;
                let mut prev = c.frame();
                for next in c.plan(12) {
                    assert_eq!(next.abs_diff(prev), 1, "{prev} -> {next} is not a single step");
                    prev = next;
                }
            }
        }
    }

    #[test]
    fn single_frame_range_never_flips() {
        let range = FrameRange::new(2, 2, 4).unwrap();
        let mut c = FrameCycler::new(4, range, Direction::Forward)
            .unwrap()
            .with_swing(true);
        for _ in 0..5 {
            c.advance();
            assert_eq!(c.frame(), 2);
            assert_eq!(c.direction(), Direction::Forward);
        }
    }

    #[test]
    fn animate_arms_one_timer_and_renders() {
        let seq = sequence(3, &all(3));
        let mut surface = RecordingSurface::new();
        let mut c = cycler(3).with_delay(Duration::from_millis(100));
        let now = Instant::now();

        assert_eq!(c.animate(&seq, &mut surface, now).unwrap(), Render::Shown);
        assert!(c.is_playing());
        assert_eq!(c.deadline(), Some(now + Duration::from_millis(100)));

        let later = now + Duration::from_millis(100);
        c.animate(&seq, &mut surface, later).unwrap();
        assert_eq!(c.deadline(), Some(later + Duration::from_millis(100)));

        assert_eq!(surface.swaps(), vec![0, 1]);
        assert_eq!(
            surface.labels(),
            vec!["Displaying 1 of 3".to_string(), "Displaying 2 of 3".to_string()]
        );
    }

    #[test]
    fn renders_only_loaded_frames() {
        let seq = sequence(3, &[0, 2]);
        let mut surface = RecordingSurface::new();
        let mut c = cycler(3);
        for _ in 0..3 {
            c.step(&seq, &mut surface).unwrap();
        }
        assert_eq!(surface.swaps(), vec![0, 2]);
        assert_eq!(surface.labels().len(), 2);
    }

    #[test]
    fn retry_policy_keeps_ticking_past_unloaded_frames() {
        let seq = sequence(3, &[0, 2]);
        let mut surface = RecordingSurface::new();
        let mut c = cycler(3).with_policy(StallPolicy::Retry);
        let now = Instant::now();

        c.animate(&seq, &mut surface, now).unwrap();
        assert_eq!(c.animate(&seq, &mut surface, now).unwrap(), Render::NotReady);
        assert!(c.is_playing());
        assert!(c.deadline().is_some());

        c.animate(&seq, &mut surface, now).unwrap();
        assert_eq!(surface.swaps(), vec![0, 2]);
    }

    #[test]
    fn stall_policy_stops_on_unloaded_frame() {
        let seq = sequence(3, &[0]);
        let mut surface = RecordingSurface::new();
        let mut c = cycler(3).with_policy(StallPolicy::Stall);
        let now = Instant::now();

        c.animate(&seq, &mut surface, now).unwrap();
        assert!(c.deadline().is_some());
        assert_eq!(c.animate(&seq, &mut surface, now).unwrap(), Render::NotReady);
        assert!(c.deadline().is_none());
        assert!(!c.is_playing());
        assert_eq!(c.frame(), 1);
    }

    #[test]
    fn default_policy_stalls_on_unloaded_frame() {
        let seq = sequence(2, &[]);
        let mut surface = RecordingSurface::new();
        let mut c = cycler(2);
        assert_eq!(c.policy(), StallPolicy::Stall);

        assert_eq!(
            c.animate(&seq, &mut surface, Instant::now()).unwrap(),
            Render::NotReady
        );
        assert!(c.deadline().is_none());
        assert!(!c.is_playing());
        assert!(surface.swaps().is_empty());
    }

    #[test]
    fn step_never_leaves_a_timer() {
        let seq = sequence(3, &all(3));
        let mut surface = RecordingSurface::new();
        let mut c = cycler(3);
        c.animate(&seq, &mut surface, Instant::now()).unwrap();
        assert!(c.deadline().is_some());

        c.step(&seq, &mut surface).unwrap();
        assert!(c.deadline().is_none());
        assert!(!c.is_playing());

        let unloaded = sequence(3, &[]);
        c.step(&unloaded, &mut surface).unwrap();
        assert!(c.deadline().is_none());
    }

    #[test]
    fn reverse_only_flips_direction() {
        let seq = sequence(4, &all(4));
        let mut surface = RecordingSurface::new();
        let mut c = cycler(4);
        let now = Instant::now();
        c.animate(&seq, &mut surface, now).unwrap();
        c.animate(&seq, &mut surface, now).unwrap();
        let deadline = c.deadline();

        c.reverse();
        assert_eq!(c.direction(), Direction::Backward);
        assert_eq!(c.frame(), 1);
        assert_eq!(c.deadline(), deadline);

        c.step(&seq, &mut surface).unwrap();
        assert_eq!(c.frame(), 0);
    }

    #[test]
    fn surface_failure_stops_playback() {
        let seq = sequence(2, &all(2));
        let mut surface = RecordingSurface::new();
        let mut c = cycler(2);
        surface.fail_next();
        assert!(c.animate(&seq, &mut surface, Instant::now()).is_err());
        assert!(!c.is_playing());
        assert!(c.deadline().is_none());
    }

    #[test]
    fn seek_checks_bounds_and_cancels_timer() {
        let seq = sequence(3, &all(3));
        let mut surface = RecordingSurface::new();
        let mut c = cycler(3);
        c.animate(&seq, &mut surface, Instant::now()).unwrap();

        assert_eq!(c.seek(2, &seq, &mut surface).unwrap(), Render::Shown);
        assert_eq!(c.frame(), 2);
        assert!(c.deadline().is_none());
        assert!(c.seek(3, &seq, &mut surface).is_err());
        assert_eq!(c.frame(), 2);
    }

    #[test]
    fn delay_adjustments_are_clamped() {
        let mut c = cycler(2).with_delay(Duration::from_millis(150));
        assert_eq!(c.faster(), Duration::from_millis(100));
        assert_eq!(c.slower(), Duration::from_millis(150));

        c.set_delay(Duration::ZERO);
        assert_eq!(c.delay(), MIN_DELAY);
        c.set_delay(Duration::from_secs(60));
        assert_eq!(c.delay(), MAX_DELAY);
        assert_eq!(c.slower(), MAX_DELAY);
    }

    #[test]
    fn plan_does_not_move_the_cursor() {
        let c = cycler(5);
        let before = c.frame();
        let _ = c.plan(3);
        assert_eq!(c.frame(), before);
    }

    #[test]
    fn range_must_fit_sequence() {
        assert!(FrameRange::new(2, 1, 4).is_err());
        assert!(FrameRange::new(0, 4, 4).is_err());
        assert!(FrameRange::full(0).is_err());
        assert!(FrameCycler::new(0, FrameRange::new(0, 0, 1).unwrap(), Direction::Forward).is_err());
    }
}
