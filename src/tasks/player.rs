use crate::cycler::{FrameCycler, Render};
use crate::events::{Control, Displayed, FrameEvent};
use crate::sequence::FrameSequence;
use crate::surface::Surface;
use anyhow::Result;
use humantime::format_duration;
use std::time::Instant;
use tokio::select;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::mpsc::{Receiver, Sender};
use tokio::time::{Instant as TokioInstant, sleep_until};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, trace, warn};

/// Owns the cycler and everything it mutates. Only the player task touches it.
pub struct Player<S> {
    cycler: FrameCycler,
    sequence: FrameSequence,
    surface: S,
    displayed_tx: Sender<Displayed>,
}

impl<S: Surface> Player<S> {
    pub fn new(
        cycler: FrameCycler,
        sequence: FrameSequence,
        surface: S,
        displayed_tx: Sender<Displayed>,
    ) -> Self {
        Self {
            cycler,
            sequence,
            surface,
            displayed_tx,
        }
    }

    fn tick(&mut self) {
        let res = self
            .cycler
            .animate(&self.sequence, &mut self.surface, Instant::now());
        self.after_render(res);
    }

    fn after_render(&mut self, res: Result<Render>) {
        match res {
            Ok(Render::Shown) => self.notify_displayed(),
            Ok(Render::NotReady) => {}
            Err(err) => warn!(frame = self.cycler.frame(), "render failed: {err:#}"),
        }
    }

    fn notify_displayed(&self) {
        let index = self.cycler.frame();
        let Some(path) = self.sequence.path(index) else {
            return;
        };
        let event = Displayed {
            index,
            path: path.to_path_buf(),
        };
        // Observers never hold up playback.
        match self.displayed_tx.try_send(event) {
            Ok(()) | Err(TrySendError::Closed(_)) => {}
            Err(TrySendError::Full(_)) => trace!(index, "displayed channel full; dropping"),
        }
    }

    fn on_frame_event(&mut self, event: FrameEvent) {
        let res = match event {
            FrameEvent::Loaded { index, frame } => self.sequence.mark_ready(index, frame),
            FrameEvent::Failed { index, path } => {
                warn!(index, path = %path.display(), "frame failed to load; it will be skipped");
                self.sequence.mark_failed(index)
            }
        };
        if let Err(err) = res {
            warn!("ignoring frame event: {err}");
        }
    }

    fn apply(&mut self, control: Control) {
        debug!(?control, frame = self.cycler.frame(), "control");
        match control {
            Control::Play => {
                self.cycler.stop();
                self.tick();
            }
            Control::Toggle if self.cycler.is_playing() => self.cycler.stop(),
            Control::Toggle => self.tick(),
            Control::Step => {
                let res = self.cycler.step(&self.sequence, &mut self.surface);
                self.after_render(res);
            }
            Control::Reverse => {
                self.cycler.reverse();
                info!(direction = ?self.cycler.direction(), "direction reversed");
            }
            Control::Stop => self.cycler.stop(),
            Control::Faster => {
                let delay = self.cycler.faster();
                info!(delay = %format_duration(delay), "faster");
            }
            Control::Slower => {
                let delay = self.cycler.slower();
                info!(delay = %format_duration(delay), "slower");
            }
            Control::Swing => {
                let swing = self.cycler.toggle_swing();
                info!(swing, "swing mode");
            }
            Control::Seek(n) => {
                let Some(index) = n.checked_sub(1) else {
                    warn!("frame numbers start at 1");
                    return;
                };
                let res = self.cycler.seek(index, &self.sequence, &mut self.surface);
                self.after_render(res);
            }
        }
    }

    /// Drives the cycler until cancelled.
    ///
    /// Rules:
    /// - A due deadline runs one `animate`; `animate` arms the next one.
    /// - Operator controls apply immediately.
    /// - Load notifications update the sequence; with `autoplay`, playback
    ///   starts once no frame is still loading.
    #[instrument(skip(self, control_rx, frames_rx, cancel))]
    pub async fn run(
        mut self,
        autoplay: bool,
        mut control_rx: Receiver<Control>,
        mut frames_rx: Receiver<FrameEvent>,
        cancel: CancellationToken,
    ) -> Result<()> {
        let mut autoplay_pending = autoplay;
        let mut frames_open = true;
        let mut controls_open = true;

        loop {
            if autoplay_pending && self.sequence.settled() {
                autoplay_pending = false;
                info!(
                    ready = self.sequence.ready_count(),
                    delay = %format_duration(self.cycler.delay()),
                    "frames settled; starting playback"
                );
                if !self.cycler.is_playing() {
                    self.tick();
                }
            }

            let deadline = self.cycler.deadline();
            let wake = deadline.map_or_else(TokioInstant::now, TokioInstant::from_std);

            select! {
                _ = cancel.cancelled() => {
                    debug!("cancel received; exiting player");
                    break;
                }

                _ = sleep_until(wake), if deadline.is_some() => self.tick(),

                maybe_ev = frames_rx.recv(), if frames_open => match maybe_ev {
                    Some(ev) => self.on_frame_event(ev),
                    None => {
                        // Loader finished or died; anything still pending stays unloaded.
                        frames_open = false;
                        if autoplay_pending && !self.sequence.settled() {
                            warn!("loader ended before every frame settled; starting anyway");
                            autoplay_pending = false;
                            self.tick();
                        }
                    }
                },

                maybe_cmd = control_rx.recv(), if controls_open => match maybe_cmd {
                    Some(control) => self.apply(control),
                    None => {
                        debug!("control channel closed");
                        controls_open = false;
                    }
                },
            }
        }
        Ok(())
    }
}
