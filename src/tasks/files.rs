use crate::config::Configuration;
use crate::events::LoadFrame;
use anyhow::Result;
use std::cmp::Ordering;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use tokio::sync::mpsc::Sender;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};
use walkdir::WalkDir;

/// Build the ordered frame list.
///
/// An explicit `frames` list wins and is kept as written, so a missing entry
/// surfaces later as a failed slot rather than shifting every index after it.
/// Otherwise `frames-path` is walked recursively and images are sorted in
/// natural order (`frame2` before `frame10`).
pub fn discover_frames(cfg: &Configuration) -> Result<Vec<PathBuf>> {
    if !cfg.frames.is_empty() {
        let base = &cfg.frames_path;
        let frames: Vec<PathBuf> = cfg
            .frames
            .iter()
            .map(|p| {
                if p.is_relative() && !base.as_os_str().is_empty() {
                    base.join(p)
                } else {
                    p.clone()
                }
            })
            .collect();
        for missing in frames.iter().filter(|p| !p.exists()) {
            warn!(path = %missing.display(), "listed frame does not exist");
        }
        info!(count = frames.len(), "using configured frame list");
        return Ok(frames);
    }

    if !cfg.frames_path.is_dir() {
        anyhow::bail!("frames-path {} is not a directory", cfg.frames_path.display());
    }

    let mut frames = Vec::<PathBuf>::new();
    for entry in WalkDir::new(&cfg.frames_path)
        .follow_links(true)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
    {
        let path = entry.path().to_path_buf();
        if is_image(&path) {
            frames.push(path);
        } else {
            debug!(path = %path.display(), "skipping non-image");
        }
    }
    frames.sort_by(|a, b| natural_cmp(&a.to_string_lossy(), &b.to_string_lossy()));
    info!(
        discovered = frames.len(),
        root = %cfg.frames_path.display(),
        "frame scan complete"
    );
    Ok(frames)
}

/// Queue every frame for decoding, beginning at `first` and wrapping, so the
/// frames shown first are loaded first.
#[instrument(skip(paths, to_loader, cancel), fields(frames = paths.len()))]
pub async fn run(
    paths: Vec<PathBuf>,
    first: usize,
    to_loader: Sender<LoadFrame>,
    cancel: CancellationToken,
) -> Result<()> {
    let len = paths.len();
    let first = if first < len { first } else { 0 };
    for index in (first..len).chain(0..first) {
        let request = LoadFrame {
            index,
            path: paths[index].clone(),
        };
        tokio::select! {
            _ = cancel.cancelled() => {
                debug!("cancel received; stopping preload queue");
                return Ok(());
            }
            sent = to_loader.send(request) => {
                if sent.is_err() {
                    warn!("loader channel closed");
                    return Ok(());
                }
            }
        }
    }
    debug!("all frames queued");
    Ok(())
}

#[inline]
fn is_image(p: &Path) -> bool {
    matches!(
        p.extension()
            .and_then(OsStr::to_str)
            .map(|s| s.to_ascii_lowercase()),
        Some(ref e) if ["jpg", "jpeg", "png", "webp", "gif"].contains(&e.as_str())
    )
}

/// Compare strings treating runs of ASCII digits as numbers.
fn natural_cmp(a: &str, b: &str) -> Ordering {
    let mut a = a.chars().peekable();
    let mut b = b.chars().peekable();
    loop {
        match (a.peek().copied(), b.peek().copied()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(x), Some(y)) if x.is_ascii_digit() && y.is_ascii_digit() => {
                let na = take_number(&mut a);
                let nb = take_number(&mut b);
                // Longer digit runs (after stripping zeros) are larger.
                let ord = na
                    .trim_start_matches('0')
                    .len()
                    .cmp(&nb.trim_start_matches('0').len())
                    .then_with(|| na.trim_start_matches('0').cmp(nb.trim_start_matches('0')))
                    .then_with(|| na.len().cmp(&nb.len()));
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            (Some(x), Some(y)) => {
                if x != y {
                    return x.cmp(&y);
                }
                a.next();
                b.next();
            }
        }
    }
}

fn take_number(it: &mut std::iter::Peekable<std::str::Chars<'_>>) -> String {
    let mut digits = String::new();
    while let Some(c) = it.peek().copied().filter(char::is_ascii_digit) {
        digits.push(c);
        it.next();
    }
    digits
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn natural_order_compares_digit_runs_numerically() {
        let mut names = vec!["f10.png", "f2.png", "f1.png", "f02.png", "e9.png"];
        names.sort_by(|a, b| natural_cmp(a, b));
        assert_eq!(names, vec!["e9.png", "f1.png", "f2.png", "f02.png", "f10.png"]);
    }

    #[test]
    fn recognises_image_extensions() {
        assert!(is_image(Path::new("a.JPG")));
        assert!(is_image(Path::new("dir/b.gif")));
        assert!(!is_image(Path::new("notes.txt")));
        assert!(!is_image(Path::new("noext")));
    }
}
