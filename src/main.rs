use std::io::IsTerminal;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser};
use frame_cycler::config::Configuration;
use frame_cycler::cycler::{Direction, FrameCycler};
use frame_cycler::events::{Control, Displayed, FrameEvent, LoadFrame};
use frame_cycler::sequence::FrameSequence;
use frame_cycler::surface::{FileSurface, LogSurface, Surface};
use frame_cycler::tasks;
use frame_cycler::tasks::player::Player;
use humantime::format_duration;
use tokio::io::BufReader;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

#[derive(Debug, Parser)]
#[command(
    name = "frame-cycler",
    version,
    about = "Cycle through an image sequence with play, step and reverse controls"
)]
struct Args {
    /// Path to YAML config
    #[arg(value_name = "CONFIG")]
    config: PathBuf,
    /// Override the per-frame delay (e.g. "120ms")
    #[arg(long, value_name = "DURATION", value_parser = humantime::parse_duration)]
    delay: Option<Duration>,
    /// Bounce between the range ends instead of wrapping
    #[arg(long)]
    swing: bool,
    /// Print the frame order for N ticks without loading anything
    #[arg(long = "dry-run", value_name = "TICKS")]
    dry_run: Option<usize>,
    /// Increase log verbosity (repeatable)
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
    verbose: u8,
}

fn init_tracing(verbosity: u8) {
    // RUST_LOG wins; otherwise -v raises the default
    let fallback = match verbosity {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback)),
        )
        .with_target(false)
        .compact()
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let Args {
        config,
        delay,
        swing,
        dry_run,
        verbose,
    } = Args::parse();
    init_tracing(verbose);

    let mut cfg = Configuration::from_yaml_file(&config)
        .with_context(|| format!("failed to load configuration from {}", config.display()))?;
    if let Some(delay) = delay {
        cfg.delay = delay;
    }
    cfg.swing |= swing;
    let cfg = cfg.validated().context("invalid configuration values")?;
    tracing::debug!("Loaded configuration from {}:\n{:#?}", config.display(), cfg);

    let frames = tasks::files::discover_frames(&cfg).context("frame discovery failed")?;
    let sequence = FrameSequence::new(frames.clone()).context("nothing to animate")?;
    let range = cfg
        .range
        .resolve(sequence.len())
        .context("invalid playback range")?;
    let cycler = FrameCycler::new(sequence.len(), range, cfg.direction)?
        .with_swing(cfg.swing)
        .with_delay(cfg.delay)
        .with_policy(cfg.on_unloaded);
    tracing::info!(
        frames = sequence.len(),
        first = range.start() + 1,
        last = range.stop() + 1,
        delay = %format_duration(cycler.delay()),
        swing = cycler.swing(),
        "sequence ready"
    );

    if let Some(ticks) = dry_run {
        print_dry_run(&cycler, &sequence, ticks);
        return Ok(());
    }

    // Channels (small/bounded)
    let (load_tx, load_rx) = mpsc::channel::<LoadFrame>(cfg.loader_max_concurrent_decodes); // Files -> Loader
    let (frames_tx, frames_rx) = mpsc::channel::<FrameEvent>(16); // Loader -> Player
    let (control_tx, control_rx) = mpsc::channel::<Control>(16); // Operator -> Player
    let (displayed_tx, _displayed_rx) = mpsc::channel::<Displayed>(64); // Player -> observers

    let cancel = CancellationToken::new();

    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if let Err(err) = tokio::signal::ctrl_c().await {
                tracing::warn!("ctrl-c handler failed: {err}");
                return;
            }
            tracing::info!("ctrl-c received; initiating shutdown");
            cancel.cancel();
        });
    }

    #[cfg(unix)]
    {
        let cancel = cancel.clone();
        let control = control_tx.clone();
        tokio::spawn(async move {
            match signal(SignalKind::user_defined1()) {
                Ok(mut sigusr1) => loop {
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        received = sigusr1.recv() => {
                            if received.is_none() {
                                break;
                            }
                            tracing::info!("SIGUSR1 received; toggling playback");
                            if let Err(err) = control.send(Control::Toggle).await {
                                tracing::warn!("failed to forward toggle request: {err}");
                                break;
                            }
                        }
                    }
                },
                Err(err) => tracing::warn!("failed to register SIGUSR1 handler: {err}"),
            }
        });
    }

    let mut tasks = JoinSet::new();

    // Operator controls on stdin; closing an interactive stdin (Ctrl-D) shuts down
    tasks.spawn({
        let control_tx = control_tx.clone();
        let cancel = cancel.clone();
        let interactive = std::io::stdin().is_terminal();
        async move {
            let stdin = BufReader::new(tokio::io::stdin());
            let res = tasks::controls::run(stdin, control_tx, cancel.clone())
                .await
                .context("controls task failed");
            if interactive {
                tracing::info!("stdin closed; initiating shutdown");
                cancel.cancel();
            }
            res
        }
    });

    // Preload queue
    tasks.spawn({
        let cancel = cancel.clone();
        let first = match cfg.direction {
            Direction::Forward => range.start(),
            Direction::Backward => range.stop(),
        };
        async move {
            tasks::files::run(frames, first, load_tx, cancel)
                .await
                .context("files task failed")
        }
    });

    // Loader
    tasks.spawn({
        let cancel = cancel.clone();
        let max_in_flight = cfg.loader_max_concurrent_decodes;
        async move {
            tasks::loader::run(load_rx, frames_tx, cancel, max_in_flight)
                .await
                .context("loader task failed")
        }
    });

    // Player
    match &cfg.output_path {
        Some(path) => {
            tracing::info!(output = %path.display(), "writing frames to file");
            spawn_player(
                &mut tasks,
                Player::new(cycler, sequence, FileSurface::new(path), displayed_tx),
                cfg.autoplay,
                control_rx,
                frames_rx,
                cancel.clone(),
            );
        }
        None => spawn_player(
            &mut tasks,
            Player::new(cycler, sequence, LogSurface::default(), displayed_tx),
            cfg.autoplay,
            control_rx,
            frames_rx,
            cancel.clone(),
        ),
    }
    drop(control_tx);

    tasks::supervisor::run(tasks, cancel).await;

    Ok(())
}

fn spawn_player<S>(
    tasks: &mut JoinSet<Result<()>>,
    player: Player<S>,
    autoplay: bool,
    control_rx: mpsc::Receiver<Control>,
    frames_rx: mpsc::Receiver<FrameEvent>,
    cancel: CancellationToken,
) where
    S: Surface + Send + 'static,
{
    tasks.spawn(async move {
        let res = player
            .run(autoplay, control_rx, frames_rx, cancel.clone())
            .await
            .context("player task failed");
        // Nothing is shown once the player is gone
        cancel.cancel();
        res
    });
}

fn print_dry_run(cycler: &FrameCycler, sequence: &FrameSequence, ticks: usize) {
    println!(
        "# dry run\n# frames: {}\n# delay: {}\n# direction: {:?}\n# swing: {}\n",
        sequence.len(),
        format_duration(cycler.delay()),
        cycler.direction(),
        cycler.swing()
    );
    for (tick, index) in cycler.plan(ticks).into_iter().enumerate() {
        let path = sequence
            .path(index)
            .map(|p| p.display().to_string())
            .unwrap_or_default();
        println!("  {:>4}: {:>4}  {}", tick + 1, index + 1, path);
    }
}
