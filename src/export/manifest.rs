//! JSON manifest: the project document with the export canvas, no pixels.

use super::{ExportError, ExportSettings};
use crate::entities::{Canvas, ProjectDocument, Timeline};

/// Pretty JSON re-importable with `Project::from_json`.
pub(super) fn encode_manifest(
    timeline: &Timeline,
    settings: &ExportSettings,
) -> Result<String, ExportError> {
    let canvas = Canvas {
        width: settings.width,
        height: settings.height,
    };
    Ok(serde_json::to_string_pretty(&ProjectDocument::of(timeline, Some(canvas)))?)
}

#[cfg(test)]
mod tests {
    use crate::entities::{Canvas, Easing, Project, Timeline};
    use crate::export::test_util::export_quiet;
    use crate::export::{ExportArtifact, ExportFormat, ExportSettings, MemoryImageResolver};

    #[test]
    fn test_manifest_reimports() {
        let mut tl = Timeline::with_params(24, 8, false);
        tl.add_keyframe(0, "a", "https://cdn/a.png", None);
        tl.add_keyframe(6, "b", "https://cdn/b.png", None);
        tl.update_keyframe_tween(0, true, Some(Easing::Bounce), None);
        let hidden = tl.add_thread();
        tl.toggle_visibility(&hidden);

        // No images needed: nothing is rasterized
        let resolver = MemoryImageResolver::new();
        let settings = ExportSettings::with_size(32, 16);
        let artifact = export_quiet(&tl, &settings, ExportFormat::Manifest, &resolver).unwrap();
        let ExportArtifact::Manifest(json) = artifact else {
            panic!("expected manifest");
        };

        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["fps"], 8);
        assert_eq!(value["frameCount"], 24);
        assert_eq!(value["canvas"]["width"], 32);
        assert_eq!(value["threads"][1]["visible"], false);

        let back = Project::from_json(&json).unwrap();
        assert_eq!(back.timeline.threads(), tl.threads());
        assert_eq!(
            back.canvas,
            Some(Canvas {
                width: 32,
                height: 16
            })
        );
    }
}
