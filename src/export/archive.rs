//! Per-frame archive: one PNG per frame plus the project manifest, zipped.

use std::io::{Cursor, Write};

use image::ImageFormat;
use log::debug;
use zip::CompressionMethod;
use zip::write::{SimpleFileOptions, ZipWriter};

use super::manifest::encode_manifest;
use super::{ExportArtifact, ExportError, ExportProgress, FrameRenderer, report_encoding};

pub const MANIFEST_ENTRY: &str = "manifest.json";

/// Archive entry name for a frame (`frame_0007.png`).
pub fn frame_entry_name(frame: u32) -> String {
    format!("frame_{:04}.png", frame)
}

pub(super) fn encode_archive(
    renderer: &FrameRenderer<'_>,
    progress: &mut dyn FnMut(ExportProgress),
) -> Result<ExportArtifact, ExportError> {
    let total = renderer.frames().len() as u32;
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    // PNG is already compressed
    let stored = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
    let deflated = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    renderer.for_each_frame(progress, |frame, image| {
        let mut png = Cursor::new(Vec::new());
        image.write_to(&mut png, ImageFormat::Png)?;
        zip.start_file(frame_entry_name(frame), stored)?;
        zip.write_all(png.get_ref())?;
        Ok(())
    })?;

    report_encoding(progress, total);
    let manifest = encode_manifest(renderer.timeline, renderer.settings)?;
    zip.start_file(MANIFEST_ENTRY, deflated)?;
    zip.write_all(manifest.as_bytes())?;

    let bytes = zip.finish()?.into_inner();
    debug!("Archive: {} frames, {} bytes", total, bytes.len());
    Ok(ExportArtifact::Archive(bytes))
}

#[cfg(test)]
mod tests {
    use std::io::Read;

    use zip::ZipArchive;

    use super::*;
    use crate::entities::Project;
    use crate::export::test_util::*;
    use crate::export::{ExportFormat, ExportSettings};

    #[test]
    fn test_archive_entries() {
        let (tl, resolver) = two_sprite_scene();
        let settings = ExportSettings::with_size(2, 2);
        let artifact = export_quiet(&tl, &settings, ExportFormat::Archive, &resolver).unwrap();
        let ExportArtifact::Archive(bytes) = artifact else {
            panic!("expected archive");
        };

        let mut zip = ZipArchive::new(Cursor::new(bytes)).unwrap();
        assert_eq!(zip.len(), 5);
        let names: Vec<String> = zip.file_names().map(String::from).collect();
        for f in 0..4 {
            assert!(names.contains(&frame_entry_name(f)));
        }

        let mut png = Vec::new();
        zip.by_name("frame_0002.png").unwrap().read_to_end(&mut png).unwrap();
        let frame = image::load_from_memory(&png).unwrap().to_rgba8();
        assert_eq!(frame.get_pixel(1, 1), &BLUE);

        let mut json = String::new();
        zip.by_name(MANIFEST_ENTRY).unwrap().read_to_string(&mut json).unwrap();
        let project = Project::from_json(&json).unwrap();
        assert_eq!(project.timeline.threads().len(), 2);
    }

    #[test]
    fn test_entry_names_are_padded() {
        assert_eq!(frame_entry_name(0), "frame_0000.png");
        assert_eq!(frame_entry_name(123), "frame_0123.png");
    }
}
