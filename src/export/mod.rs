//! Export pipeline - renders the timeline frame by frame and encodes it.
//!
//! Every rasterized mode runs the same loop: for each frame in range, ask the
//! compositor for the tweened render list, rasterize it onto an off-screen
//! RGBA surface, hand the surface to the format's encoder, report progress.
//!
//! Modes:
//! - `Gif` - animated GIF at the timeline fps
//! - `SpriteSheet` - all frames tiled into one PNG
//! - `Archive` - ZIP of `frame_NNNN.png` plus `manifest.json`
//! - `Manifest` - project JSON only, nothing rasterized
//!
//! Export is read-only with respect to the timeline. Any per-frame failure
//! aborts the whole export; partial artifacts are never returned.

mod archive;
mod gif;
pub mod images;
mod job;
mod manifest;
pub mod raster;
mod sheet;

use std::fmt;
use std::fs;
use std::io;
use std::ops::Range;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

use image::RgbaImage;
use log::{info, trace};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::entities::Timeline;

pub use archive::{MANIFEST_ENTRY, frame_entry_name};
pub use images::{FileImageResolver, ImageResolver, MemoryImageResolver};
pub use job::{ExportHandle, spawn_export};
pub use raster::rasterize;
pub use sheet::sheet_grid;

/// Largest RGBA surface an export will allocate (1 GiB)
pub const MAX_SURFACE_BYTES: u64 = 1 << 30;

/// Reject empty surfaces and surfaces over `MAX_SURFACE_BYTES`.
pub(crate) fn check_surface(width: u32, height: u32) -> Result<(), ExportError> {
    let bytes = width as u64 * height as u64 * 4;
    if bytes == 0 || bytes > MAX_SURFACE_BYTES {
        return Err(ExportError::InvalidSurface { width, height });
    }
    Ok(())
}

/// Export failures. Fatal to the export, never to the timeline.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("Invalid export surface {width}x{height}")]
    InvalidSurface { width: u32, height: u32 },
    #[error("Image '{image_id}' unavailable: {reason}")]
    ImageUnavailable { image_id: String, reason: String },
    #[error("Failed to decode image '{image_id}': {reason}")]
    ImageDecode { image_id: String, reason: String },
    #[error("Encoding failed: {0}")]
    Encode(#[from] image::ImageError),
    #[error("Archive error: {0}")]
    Archive(#[from] zip::result::ZipError),
    #[error("Manifest serialization failed: {0}")]
    Json(#[from] serde_json::Error),
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Export cancelled by user")]
    Cancelled,
    #[error("Frame {frame} failed: {source}")]
    FrameFailed {
        frame: u32,
        #[source]
        source: Box<ExportError>,
    },
    #[error("Export worker panicked")]
    WorkerPanicked,
}

/// Progress update, sent after every frame.
#[derive(Clone, Debug, PartialEq)]
pub struct ExportProgress {
    pub current_frame: u32,
    pub total_frames: u32,
    pub stage: ExportStage,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExportStage {
    Preparing, // Validating settings
    Rendering, // Rasterizing + encoding frames
    Encoding,  // Finalizing the container
    Complete,
}

impl ExportProgress {
    /// Progress in 0..1.
    pub fn fraction(&self) -> f32 {
        match self.stage {
            ExportStage::Complete => 1.0,
            _ if self.total_frames == 0 => 0.0,
            _ => self.current_frame as f32 / self.total_frames as f32,
        }
    }
}

/// Pixel sampling used when sprites are scaled or rotated.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sampling {
    /// Hard pixel edges (pixel art)
    #[default]
    Nearest,
    Bilinear,
}

/// Which frames to export.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportRange {
    /// `0..frame_count`
    #[default]
    Full,
    /// `0..=last keyframe index` (at least one frame)
    Content,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExportFormat {
    Gif,
    SpriteSheet,
    Archive,
    Manifest,
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExportFormat::Gif => write!(f, "GIF"),
            ExportFormat::SpriteSheet => write!(f, "Sprite sheet"),
            ExportFormat::Archive => write!(f, "Frame archive"),
            ExportFormat::Manifest => write!(f, "JSON manifest"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExportSettings {
    /// Canvas (and per-cell) width in pixels
    pub width: u32,
    pub height: u32,
    /// Fill color; `None` = transparent
    pub background: Option<[u8; 4]>,
    pub sampling: Sampling,
    pub range: ExportRange,
    /// Sprite sheet columns; `None` = square-ish grid
    pub sheet_columns: Option<u32>,
    /// GIF loops forever when the timeline loops
    pub gif_repeat_infinite: bool,
}

impl Default for ExportSettings {
    fn default() -> Self {
        Self {
            width: 128,
            height: 128,
            background: None,
            sampling: Sampling::Nearest,
            range: ExportRange::Full,
            sheet_columns: None,
            gif_repeat_infinite: true,
        }
    }
}

impl ExportSettings {
    pub fn with_size(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            ..Default::default()
        }
    }

    fn validate(&self) -> Result<(), ExportError> {
        check_surface(self.width, self.height)
    }
}

/// Encoded export result, handed to the host's save collaborator.
#[derive(Clone, Debug, PartialEq)]
pub enum ExportArtifact {
    Gif(Vec<u8>),
    SpriteSheet {
        png: Vec<u8>,
        frames: u32,
        columns: u32,
        rows: u32,
        cell_width: u32,
        cell_height: u32,
    },
    Archive(Vec<u8>),
    Manifest(String),
}

impl ExportArtifact {
    pub fn bytes(&self) -> &[u8] {
        match self {
            ExportArtifact::Gif(b) | ExportArtifact::Archive(b) => b,
            ExportArtifact::SpriteSheet { png, .. } => png,
            ExportArtifact::Manifest(s) => s.as_bytes(),
        }
    }

    /// File extension without the dot.
    pub fn extension(&self) -> &'static str {
        match self {
            ExportArtifact::Gif(_) => "gif",
            ExportArtifact::SpriteSheet { .. } => "png",
            ExportArtifact::Archive(_) => "zip",
            ExportArtifact::Manifest(_) => "json",
        }
    }

    pub fn write_to(&self, path: &Path) -> io::Result<()> {
        fs::write(path, self.bytes())
    }
}

/// Frames covered by `range` for this timeline. Never empty.
pub fn frame_range(timeline: &Timeline, range: ExportRange) -> Range<u32> {
    match range {
        ExportRange::Full => 0..timeline.frame_count(),
        ExportRange::Content => {
            let last = timeline
                .last_keyframe_index()
                .unwrap_or(0)
                .min(timeline.frame_count() - 1);
            0..last + 1
        }
    }
}

/// Shared frame loop state for the rasterizing encoders.
pub(crate) struct FrameRenderer<'a> {
    timeline: &'a Timeline,
    settings: &'a ExportSettings,
    resolver: &'a dyn ImageResolver,
    cancel: Option<&'a AtomicBool>,
}

impl<'a> FrameRenderer<'a> {
    pub(crate) fn new(
        timeline: &'a Timeline,
        settings: &'a ExportSettings,
        resolver: &'a dyn ImageResolver,
        cancel: Option<&'a AtomicBool>,
    ) -> Self {
        Self {
            timeline,
            settings,
            resolver,
            cancel,
        }
    }

    pub(crate) fn frames(&self) -> Range<u32> {
        frame_range(self.timeline, self.settings.range)
    }

    /// Rasterize every frame in range and pass it to `sink`.
    ///
    /// Checks for cancellation before each frame; wraps any failure in
    /// `FrameFailed` and stops.
    pub(crate) fn for_each_frame(
        &self,
        progress: &mut dyn FnMut(ExportProgress),
        mut sink: impl FnMut(u32, RgbaImage) -> Result<(), ExportError>,
    ) -> Result<(), ExportError> {
        let frames = self.frames();
        let total = frames.len() as u32;

        for (i, frame) in frames.enumerate() {
            if self.cancel.is_some_and(|c| c.load(Ordering::Relaxed)) {
                info!("Export cancelled at frame {}", frame);
                return Err(ExportError::Cancelled);
            }

            let items = self.timeline.composite_frame_states(frame as f32);
            trace!("Export frame {}: {} layers", frame, items.len());

            rasterize(&items, self.resolver, self.settings)
                .and_then(|image| sink(frame, image))
                .map_err(|e| ExportError::FrameFailed {
                    frame,
                    source: Box::new(e),
                })?;

            progress(ExportProgress {
                current_frame: i as u32 + 1,
                total_frames: total,
                stage: ExportStage::Rendering,
            });
        }
        Ok(())
    }
}

/// Run one export synchronously.
///
/// `progress` is called after every frame. `cancel`, when set, is checked
/// between frames.
pub fn export(
    timeline: &Timeline,
    settings: &ExportSettings,
    format: ExportFormat,
    resolver: &dyn ImageResolver,
    progress: &mut dyn FnMut(ExportProgress),
    cancel: Option<&AtomicBool>,
) -> Result<ExportArtifact, ExportError> {
    settings.validate()?;

    let renderer = FrameRenderer::new(timeline, settings, resolver, cancel);
    let total = match format {
        ExportFormat::Manifest => 0,
        _ => renderer.frames().len() as u32,
    };
    info!(
        "Export started: {} {}x{}, {} frames",
        format, settings.width, settings.height, total
    );
    progress(ExportProgress {
        current_frame: 0,
        total_frames: total,
        stage: ExportStage::Preparing,
    });

    let artifact = match format {
        ExportFormat::Gif => gif::encode_gif(&renderer, progress)?,
        ExportFormat::SpriteSheet => sheet::encode_sheet(&renderer, progress)?,
        ExportFormat::Archive => archive::encode_archive(&renderer, progress)?,
        ExportFormat::Manifest => {
            ExportArtifact::Manifest(manifest::encode_manifest(timeline, settings)?)
        }
    };

    progress(ExportProgress {
        current_frame: total,
        total_frames: total,
        stage: ExportStage::Complete,
    });
    info!("Export finished: {} ({} bytes)", format, artifact.bytes().len());
    Ok(artifact)
}

/// Progress hook for encoders that finish with a container pass.
pub(crate) fn report_encoding(progress: &mut dyn FnMut(ExportProgress), total: u32) {
    progress(ExportProgress {
        current_frame: total,
        total_frames: total,
        stage: ExportStage::Encoding,
    });
}


#[cfg(test)]
mod tests {
    use super::test_util::*;
    use super::*;

    #[test]
    fn test_frame_range() {
        let mut tl = Timeline::with_params(20, 12, true);
        assert_eq!(frame_range(&tl, ExportRange::Full), 0..20);
        assert_eq!(frame_range(&tl, ExportRange::Content), 0..1);
        tl.add_keyframe(7, "a", "u", None);
        assert_eq!(frame_range(&tl, ExportRange::Content), 0..8);
    }

    #[test]
    fn test_zero_surface_rejected() {
        let (tl, resolver) = two_sprite_scene();
        let settings = ExportSettings::with_size(0, 16);
        let err = export_quiet(&tl, &settings, ExportFormat::Gif, &resolver).unwrap_err();
        assert!(matches!(err, ExportError::InvalidSurface { width: 0, .. }));
    }

    #[test]
    fn test_oversized_surface_rejected() {
        let (tl, resolver) = two_sprite_scene();
        for format in [ExportFormat::Gif, ExportFormat::SpriteSheet, ExportFormat::Archive] {
            let settings = ExportSettings::with_size(3_000_000_000 / 2 + 1, 1);
            let err = export_quiet(&tl, &settings, format, &resolver).unwrap_err();
            assert!(matches!(err, ExportError::InvalidSurface { height: 1, .. }));
        }
        assert!(check_surface(16_384, 16_384).is_ok());
        assert!(check_surface(16_384, 16_385).is_err());
        assert!(check_surface(u32::MAX, u32::MAX).is_err());
    }

    #[test]
    fn test_progress_reported_per_frame() {
        let (tl, resolver) = two_sprite_scene();
        let settings = ExportSettings::with_size(4, 4);
        let mut seen = Vec::new();
        export(
            &tl,
            &settings,
            ExportFormat::SpriteSheet,
            &resolver,
            &mut |p| seen.push(p),
            None,
        )
        .unwrap();

        assert_eq!(seen.first().unwrap().stage, ExportStage::Preparing);
        let rendering: Vec<_> = seen.iter().filter(|p| p.stage == ExportStage::Rendering).collect();
        assert_eq!(rendering.len(), 4);
        assert_eq!(rendering[1].fraction(), 0.5);
        assert_eq!(seen.last().unwrap().stage, ExportStage::Complete);
        assert_eq!(seen.last().unwrap().fraction(), 1.0);
    }

    #[test]
    fn test_missing_image_aborts_with_frame() {
        let (mut tl, resolver) = two_sprite_scene();
        tl.add_keyframe(3, "ghost", "mem:ghost", None);
        let settings = ExportSettings::with_size(4, 4);
        let err = export_quiet(&tl, &settings, ExportFormat::Gif, &resolver).unwrap_err();
        match err {
            ExportError::FrameFailed { frame, source } => {
                assert_eq!(frame, 3);
                assert!(matches!(*source, ExportError::ImageUnavailable { .. }));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_cancel_flag_stops_export() {
        let (tl, resolver) = two_sprite_scene();
        let settings = ExportSettings::with_size(4, 4);
        let cancel = AtomicBool::new(true);
        let err = export(
            &tl,
            &settings,
            ExportFormat::Archive,
            &resolver,
            &mut |_| {},
            Some(&cancel),
        )
        .unwrap_err();
        assert!(matches!(err, ExportError::Cancelled));
    }

    #[test]
    fn test_artifact_write_to() {
        let artifact = ExportArtifact::Manifest("{}".into());
        assert_eq!(artifact.extension(), "json");
        let path = std::env::temp_dir().join(format!("loom_artifact_{}.json", std::process::id()));
        artifact.write_to(&path).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "{}");
        let _ = fs::remove_file(&path);
    }
}
