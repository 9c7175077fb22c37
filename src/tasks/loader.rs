use crate::events::{FrameEvent, LoadFrame, PreparedFrame};
use anyhow::Result;
use std::collections::HashSet;
use std::fs::File;
use std::io::BufReader;
use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::select;
use tokio::sync::mpsc::{Receiver, Sender};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

// Decodes an image to RGBA8 and applies EXIF orientation if available.
// Missing or unreadable metadata leaves the pixels as stored.
fn decode_rgba8_apply_exif(path: &Path) -> Result<image::RgbaImage> {
    let img = image::ImageReader::open(path)?
        .with_guessed_format()?
        .decode()?;
    let img = img.to_rgba8();

    let orientation = read_orientation(path).unwrap_or(1);
    Ok(match orientation {
        2 => image::imageops::flip_horizontal(&img),
        3 => image::imageops::rotate180(&img),
        4 => image::imageops::flip_vertical(&img),
        // transpose
        5 => image::imageops::flip_horizontal(&image::imageops::rotate90(&img)),
        6 => image::imageops::rotate90(&img),
        // transverse
        7 => image::imageops::flip_horizontal(&image::imageops::rotate270(&img)),
        8 => image::imageops::rotate270(&img),
        _ => img,
    })
}

fn read_orientation(path: &Path) -> Option<u16> {
    let file = File::open(path).ok()?;
    let mut buf = BufReader::new(file);
    let exif = exif::Reader::new().read_from_container(&mut buf).ok()?;
    let field = exif.get_field(exif::Tag::Orientation, exif::In::PRIMARY)?;
    let o = u16::try_from(field.value.get_uint(0)?).ok()?;
    debug!("exif orientation {} for {}", o, path.display());
    Some(o)
}

fn prepare(path: PathBuf) -> Result<PreparedFrame> {
    let rgba8 = decode_rgba8_apply_exif(&path)?;
    let (width, height) = rgba8.dimensions();
    Ok(PreparedFrame {
        path,
        width,
        height,
        pixels: rgba8.into_raw(),
    })
}

/// Decode one slot, turning errors and decoder panics into `None` so the
/// slot index always comes back to the loader.
fn decode_slot<F>(
    index: usize,
    path: PathBuf,
    decode: F,
) -> (usize, PathBuf, Option<PreparedFrame>)
where
    F: FnOnce(PathBuf) -> Result<PreparedFrame>,
{
    let p = path.clone();
    let frame = match std::panic::catch_unwind(AssertUnwindSafe(move || decode(p))) {
        Ok(Ok(frame)) => Some(frame),
        Ok(Err(err)) => {
            warn!(path = %path.display(), "decode failed: {err:#}");
            None
        }
        Err(_) => {
            warn!(path = %path.display(), "decoder panicked");
            None
        }
    };
    (index, path, frame)
}

/// Decodes requested frames on blocking threads, at most `max_in_flight` at a
/// time, and reports each slot as loaded or failed.
#[instrument(skip(load_rx, to_player, cancel))]
pub async fn run(
    mut load_rx: Receiver<LoadFrame>,
    to_player: Sender<FrameEvent>,
    cancel: CancellationToken,
    max_in_flight: usize,
) -> Result<()> {
    let max_in_flight = max_in_flight.max(1);
    let mut in_flight: HashSet<usize> = HashSet::new();
    let mut tasks: JoinSet<(usize, PathBuf, Option<PreparedFrame>)> = JoinSet::new();
    let mut requests_open = true;

    loop {
        if !requests_open && tasks.is_empty() {
            debug!("all requested frames decoded");
            break;
        }
        select! {
            _ = cancel.cancelled() => break,

            // Accept new load requests while under limit
            request = load_rx.recv(), if requests_open && in_flight.len() < max_in_flight => {
                let Some(LoadFrame { index, path }) = request else {
                    requests_open = false;
                    continue;
                };
                if in_flight.insert(index) {
                    tasks.spawn_blocking(move || decode_slot(index, path, prepare));
                } else {
                    debug!(index, "already loading; ignoring duplicate request");
                }
            }

            Some(join_res) = tasks.join_next() => {
                // Only cancellation at runtime shutdown lands here
                let (index, path, maybe_frame) = match join_res {
                    Ok(slot) => slot,
                    Err(err) => {
                        warn!("decode task did not complete: {err}");
                        continue;
                    }
                };
                in_flight.remove(&index);
                let event = match maybe_frame {
                    Some(frame) => {
                        debug!(index, "loaded (rgba8): {}", path.display());
                        FrameEvent::Loaded { index, frame: Arc::new(frame) }
                    }
                    None => FrameEvent::Failed { index, path },
                };
                if to_player.send(event).await.is_err() {
                    debug!("player channel closed; stopping loader");
                    break;
                }
            }

        }
    }
    Ok(())
}
