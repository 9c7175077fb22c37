use anyhow::Result;
use tokio::task::{JoinError, JoinSet};
use tokio_util::sync::CancellationToken;

/// Wait on the pipeline tasks until shutdown, then drain them.
///
/// A task that returns an error or panics cancels the whole pipeline.
/// Tasks that finish cleanly (the preload queue, the loader once its input
/// closes) leave the others running.
pub async fn run(mut tasks: JoinSet<Result<()>>, cancel: CancellationToken) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            joined = tasks.join_next() => match joined {
                Some(res) => {
                    if !report(res) {
                        tracing::warn!("task failed; initiating shutdown");
                        cancel.cancel();
                    }
                }
                None => break,
            },
        }
    }

    // Drain JoinSet (wait for other tasks to complete)
    while let Some(res) = tasks.join_next().await {
        report(res);
    }
}

fn report(res: Result<Result<()>, JoinError>) -> bool {
    match res {
        Ok(Ok(())) => true,
        Ok(Err(e)) => {
            tracing::error!("task error: {e:?}");
            false
        }
        Err(e) => {
            tracing::error!("join error: {e}");
            false
        }
    }
}
