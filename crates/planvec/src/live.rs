//! Simulated capture loop.
//!
//! A capture thread decodes the images of a directory in name order at
//! a fixed interval and publishes each one to a [`FrameSlot`]. The
//! worker on the calling thread always processes the newest frame; any
//! frame it was too slow for is dropped. A frame that fails to
//! vectorize is logged and skipped, and the loop keeps going.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use clap::Args;
use planvec_pipeline::{ColorRangeTable, FrameSlot, Outcome, PipelineConfig, RgbImage};

use crate::{CliError, PipelineArgs};

/// How long the worker waits for a frame before checking for shutdown.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Args)]
pub struct LiveArgs {
    /// Directory of captured frames, processed in file name order.
    dir: PathBuf,

    #[command(flatten)]
    pipeline: PipelineArgs,

    /// Delay between captured frames in milliseconds.
    #[arg(long, default_value_t = 200)]
    interval_ms: u64,

    /// Write a cut file per vectorized frame into this directory.
    #[arg(long)]
    out_dir: Option<PathBuf>,
}

/// What the worker did with the frames it received.
#[derive(Debug, Default, PartialEq, Eq)]
struct Tally {
    vectorized: u64,
    passthrough: u64,
    failed: u64,
}

impl Tally {
    const fn processed(&self) -> u64 {
        self.vectorized + self.passthrough + self.failed
    }
}

type Frame = (PathBuf, RgbImage);

/// Image files in `dir`, sorted by name.
fn frame_paths(dir: &Path) -> Result<Vec<PathBuf>, CliError> {
    let read_err = |source| CliError::Read {
        path: dir.to_path_buf(),
        source,
    };
    let mut paths = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(read_err)? {
        let path = entry.map_err(read_err)?.path();
        let is_image = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| {
                matches!(
                    e.to_ascii_lowercase().as_str(),
                    "png" | "jpg" | "jpeg" | "bmp" | "webp"
                )
            });
        if is_image {
            paths.push(path);
        }
    }
    paths.sort();
    Ok(paths)
}

/// Decode each path and publish it, then close the slot.
fn capture(paths: Vec<PathBuf>, slot: &FrameSlot<Frame>, interval: Duration) {
    for path in paths {
        match crate::load_frame(&path) {
            Ok(frame) => {
                tracing::debug!(path = %path.display(), "frame captured");
                slot.put((path, frame));
            }
            Err(e) => tracing::warn!("skipping frame: {e}"),
        }
        thread::sleep(interval);
    }
    slot.close();
}

/// Process frames from `slot` until it is closed and drained.
fn work(
    slot: &FrameSlot<Frame>,
    config: &PipelineConfig,
    table: &ColorRangeTable,
    out_dir: Option<&Path>,
) -> Tally {
    let mut tally = Tally::default();
    loop {
        let Some((path, frame)) = slot.wait_take(POLL_INTERVAL) else {
            if slot.is_closed() {
                break;
            }
            continue;
        };

        match planvec_pipeline::run(frame, config, table) {
            Ok(Outcome::Vectorized(output)) => {
                tally.vectorized += 1;
                tracing::info!(
                    path = %path.display(),
                    polylines = output.polylines.len(),
                    "frame vectorized"
                );
                if let Some(dir) = out_dir {
                    let stem = path
                        .file_stem()
                        .and_then(|s| s.to_str())
                        .unwrap_or("frame");
                    let svg_path = dir.join(format!("{stem}.svg"));
                    if let Err(e) = crate::write_svg(&svg_path, &output, stem, config) {
                        tracing::warn!("{e}");
                    }
                }
            }
            Ok(Outcome::Passthrough(_)) => {
                tally.passthrough += 1;
                tracing::info!(path = %path.display(), "markers not found, showing raw frame");
            }
            Err(e) => {
                tally.failed += 1;
                tracing::warn!(path = %path.display(), "frame failed: {e}");
            }
        }
    }
    tally
}

pub fn run_live(args: &LiveArgs) -> Result<(), CliError> {
    let config = crate::config_from_cli(&args.pipeline)?;
    let table = crate::table_from_cli(&args.pipeline)?;
    let paths = frame_paths(&args.dir)?;
    let total = paths.len();

    if let Some(dir) = &args.out_dir {
        std::fs::create_dir_all(dir).map_err(|source| CliError::Write {
            path: dir.clone(),
            source,
        })?;
    }

    tracing::info!(dir = %args.dir.display(), frames = total, "starting capture loop");

    let slot = Arc::new(FrameSlot::new());
    let capture_slot = Arc::clone(&slot);
    let interval = Duration::from_millis(args.interval_ms);
    let capture_thread = thread::spawn(move || capture(paths, &capture_slot, interval));

    let tally = work(&slot, &config, &table, args.out_dir.as_deref());

    capture_thread
        .join()
        .map_err(|_| CliError::ThreadPanicked("capture"))?;

    println!(
        "{total} frames: {} processed ({} vectorized, {} passthrough, {} failed), {} dropped",
        tally.processed(),
        tally.vectorized,
        tally.passthrough,
        tally.failed,
        slot.dropped(),
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn worker_drains_a_closed_slot() {
        let slot = FrameSlot::new();
        slot.put((PathBuf::from("blank.png"), RgbImage::new(32, 24)));
        slot.close();

        let tally = work(
            &slot,
            &PipelineConfig::default(),
            &ColorRangeTable::default(),
            None,
        );
        assert_eq!(
            tally,
            Tally {
                passthrough: 1,
                ..Tally::default()
            }
        );
    }

    #[test]
    fn worker_survives_a_failing_frame() {
        let slot = FrameSlot::new();
        slot.put((PathBuf::from("a.png"), RgbImage::new(32, 24)));
        slot.close();

        let config = PipelineConfig {
            blur_kernel: 4,
            ..PipelineConfig::default()
        };
        let tally = work(&slot, &config, &ColorRangeTable::default(), None);
        assert_eq!(tally.failed, 1);
        assert_eq!(tally.processed(), 1);
    }

    #[test]
    fn missing_directory_is_a_read_error() {
        assert!(matches!(
            frame_paths(Path::new("/nonexistent/frames")),
            Err(CliError::Read { .. })
        ));
    }
}
