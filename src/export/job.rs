//! Background export: runs the pipeline on its own thread.
//!
//! The worker renders from a timeline snapshot, so the host keeps editing
//! and playing while frames are produced. Progress arrives on a channel after
//! every frame; the cancel flag is checked between frames.

use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, unbounded};
use log::{info, trace};

use super::images::ImageResolver;
use super::{ExportArtifact, ExportError, ExportFormat, ExportProgress, ExportSettings, export};
use crate::entities::Timeline;

/// Running export job.
pub struct ExportHandle {
    progress: Receiver<ExportProgress>,
    cancel_flag: Arc<AtomicBool>,
    handle: JoinHandle<Result<ExportArtifact, ExportError>>,
}

impl ExportHandle {
    /// Progress updates, in order. Disconnects when the worker exits.
    pub fn progress(&self) -> &Receiver<ExportProgress> {
        &self.progress
    }

    /// Request cancellation; the worker stops before its next frame.
    pub fn cancel(&self) {
        self.cancel_flag.store(true, Ordering::Relaxed);
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Block until the worker exits and return its result.
    pub fn wait(self) -> Result<ExportArtifact, ExportError> {
        self.handle.join().unwrap_or(Err(ExportError::WorkerPanicked))
    }
}

/// Start an export of `timeline` on a background thread.
pub fn spawn_export(
    timeline: Timeline,
    settings: ExportSettings,
    format: ExportFormat,
    resolver: Arc<dyn ImageResolver>,
) -> io::Result<ExportHandle> {
    let (tx, rx) = unbounded();
    let cancel_flag = Arc::new(AtomicBool::new(false));
    let worker_cancel = Arc::clone(&cancel_flag);

    let handle = thread::Builder::new()
        .name("loom-export".into())
        .spawn(move || {
            info!("Export worker started");
            let mut report = |p: ExportProgress| {
                trace!("Export progress {}/{} {:?}", p.current_frame, p.total_frames, p.stage);
                // Receiver gone = nobody watching; keep going
                let _ = tx.send(p);
                thread::yield_now();
            };
            export(
                &timeline,
                &settings,
                format,
                resolver.as_ref(),
                &mut report,
                Some(worker_cancel.as_ref()),
            )
        })?;

    Ok(ExportHandle {
        progress: rx,
        cancel_flag,
        handle,
    })
}
