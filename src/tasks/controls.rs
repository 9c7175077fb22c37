use crate::events::Control;
use anyhow::Result;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::mpsc::Sender;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Reads one command per line and forwards it to the player.
/// Blank lines are ignored; unknown commands are reported and skipped.
pub async fn run<R>(reader: R, to_player: Sender<Control>, cancel: CancellationToken) -> Result<()>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            line = lines.next_line() => {
                let Some(line) = line? else {
                    info!("control input closed");
                    break;
                };
                if line.trim().is_empty() && line != " " {
                    continue;
                }
                match line.parse::<Control>() {
                    Ok(control) => {
                        debug!(?control, "operator command");
                        if to_player.send(control).await.is_err() {
                            debug!("player gone; stopping control reader");
                            break;
                        }
                    }
                    Err(err) => warn!("{err}; try play, step, reverse, stop, faster, slower, swing, seek N"),
                }
            }
        }
    }
    Ok(())
}
