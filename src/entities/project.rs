//! Project: the unit of serialization.
//!
//! Wraps a Timeline with the canvas size and save path. Scenes are saved and
//! loaded via `Project::to_json` / `Project::from_json`. Loading always runs
//! the save-format migration, so projects from older versions come back
//! valid under current invariants.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::info;
use serde::{Deserialize, Serialize};

use super::migrate::{SCHEMA_VERSION, SavedThread};
use super::thread::Thread;
use super::timeline::{Timeline, TimelineDefaults};

/// Target canvas size in pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Canvas {
    pub width: u32,
    pub height: u32,
}

impl Default for Canvas {
    fn default() -> Self {
        Self {
            width: 128,
            height: 128,
        }
    }
}

/// Current-schema document (written by save and by the manifest export).
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectDocument<'a> {
    pub version: u32,
    pub fps: u32,
    pub frame_count: u32,
    #[serde(rename = "loop")]
    pub looping: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub canvas: Option<Canvas>,
    pub threads: &'a [Thread],
}

impl<'a> ProjectDocument<'a> {
    /// Current-schema view of `timeline`, borrowed for serialization.
    pub fn of(timeline: &'a Timeline, canvas: Option<Canvas>) -> Self {
        Self {
            version: SCHEMA_VERSION,
            fps: timeline.fps(),
            frame_count: timeline.frame_count(),
            looping: timeline.looping(),
            canvas,
            threads: timeline.threads(),
        }
    }
}

/// Document as found on disk, any version. Missing version = v1.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SavedDocument {
    pub version: Option<u32>,
    pub fps: Option<u32>,
    pub frame_count: Option<u32>,
    #[serde(rename = "loop")]
    pub looping: Option<bool>,
    pub canvas: Option<Canvas>,
    pub threads: Vec<SavedThread>,
}

#[derive(Clone, Debug, Default)]
pub struct Project {
    pub timeline: Timeline,
    pub canvas: Option<Canvas>,
    /// Last save/load path for quick save (runtime-only)
    last_path: Option<PathBuf>,
}

impl Project {
    pub fn new(timeline: Timeline) -> Self {
        Self {
            timeline,
            canvas: None,
            last_path: None,
        }
    }

    pub fn document(&self) -> ProjectDocument<'_> {
        ProjectDocument::of(&self.timeline, self.canvas)
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(&self.document()).context("Failed to serialize project")
    }

    /// Parse any document version and migrate it to the current schema.
    pub fn from_json(json: &str) -> Result<Self> {
        Self::from_json_with(json, TimelineDefaults::default())
    }

    /// Like `from_json`; playback fields missing from the document come from
    /// `defaults`.
    pub fn from_json_with(json: &str, defaults: TimelineDefaults) -> Result<Self> {
        let doc: SavedDocument =
            serde_json::from_str(json).context("Failed to parse project JSON")?;
        Ok(Self::from_document(doc, defaults))
    }

    pub fn from_document(doc: SavedDocument, defaults: TimelineDefaults) -> Self {
        let version = doc.version.unwrap_or(1);
        if version > SCHEMA_VERSION {
            log::warn!(
                "Project schema v{} is newer than supported v{}, unknown fields ignored",
                version,
                SCHEMA_VERSION
            );
        } else if version < SCHEMA_VERSION {
            info!("Migrating project from schema v{} to v{}", version, SCHEMA_VERSION);
        }

        let mut timeline = Timeline::with_params(
            doc.frame_count.unwrap_or(defaults.frame_count),
            doc.fps.unwrap_or(defaults.fps),
            doc.looping.unwrap_or(defaults.looping),
        );
        timeline.load_threads(doc.threads);

        Self {
            timeline,
            canvas: doc.canvas,
            last_path: None,
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        Self::load_with(path, TimelineDefaults::default())
    }

    pub fn load_with(path: &Path, defaults: TimelineDefaults) -> Result<Self> {
        let json = fs::read_to_string(path)
            .with_context(|| format!("Failed to read project: {}", path.display()))?;
        let mut project = Self::from_json_with(&json, defaults)
            .with_context(|| format!("Invalid project: {}", path.display()))?;
        project.last_path = Some(path.to_path_buf());
        info!("Project loaded from {}", path.display());
        Ok(project)
    }

    pub fn save(&mut self, path: &Path) -> Result<()> {
        let json = self.to_json()?;
        fs::write(path, json)
            .with_context(|| format!("Failed to write project: {}", path.display()))?;
        self.last_path = Some(path.to_path_buf());
        info!("Project saved to {}", path.display());
        Ok(())
    }

    pub fn last_path(&self) -> Option<&Path> {
        self.last_path.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::easing::Easing;
    use crate::entities::timeline::{DEFAULT_FPS, DEFAULT_FRAME_COUNT};

    #[test]
    fn test_v1_document_defaults() {
        let json = r#"{"threads":[{"name":"Body",
            "keyframes":[{"frameIndex":0,"imageId":"a","imageUrl":"u"}]}]}"#;
        let project = Project::from_json(json).unwrap();
        let tl = &project.timeline;
        assert_eq!(tl.fps(), DEFAULT_FPS);
        assert_eq!(tl.frame_count(), DEFAULT_FRAME_COUNT);
        assert!(tl.looping());
        assert_eq!(tl.threads()[0].name, "Body");
        assert!(project.canvas.is_none());
    }

    #[test]
    fn test_v1_document_takes_supplied_defaults() {
        let json = r#"{"threads":[{"keyframes":[
            {"frameIndex":20,"imageId":"a","imageUrl":"u"}]}]}"#;
        let defaults = TimelineDefaults {
            frame_count: 24,
            fps: 30,
            looping: false,
        };
        let tl = Project::from_json_with(json, defaults).unwrap().timeline;
        assert_eq!((tl.frame_count(), tl.fps(), tl.looping()), (24, 30, false));
        assert!(tl.keyframe_at(20, None).is_some());

        // Fields present in the document win over the defaults
        let json = r#"{"version":3,"fps":6,"frameCount":8,"loop":true,"threads":[]}"#;
        let tl = Project::from_json_with(json, defaults).unwrap().timeline;
        assert_eq!((tl.frame_count(), tl.fps(), tl.looping()), (8, 6, true));
    }

    #[test]
    fn test_document_round_trip() {
        let mut tl = Timeline::with_params(24, 8, false);
        tl.add_keyframe(0, "a", "url:a", None);
        tl.add_keyframe(12, "b", "url:b", None);
        tl.update_keyframe_tween(0, true, Some(Easing::EaseInOut), None);
        let mut project = Project::new(tl);
        project.canvas = Some(Canvas {
            width: 64,
            height: 32,
        });

        let json = project.to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["version"], SCHEMA_VERSION);
        assert_eq!(value["loop"], false);
        assert_eq!(value["frameCount"], 24);
        assert_eq!(value["threads"][0]["keyframes"][0]["easing"], "ease-in-out");

        let back = Project::from_json(&json).unwrap();
        assert_eq!(back.timeline.threads(), project.timeline.threads());
        assert_eq!(back.timeline.fps(), 8);
        assert!(!back.timeline.looping());
        assert_eq!(back.canvas, project.canvas);
    }

    #[test]
    fn test_save_and_load_file() {
        let dir = std::env::temp_dir().join(format!("loom_project_test_{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("scene.json");

        let mut project = Project::default();
        project.timeline.add_keyframe(3, "a", "url:a", None);
        project.save(&path).unwrap();
        assert_eq!(project.last_path(), Some(path.as_path()));

        let loaded = Project::load(&path).unwrap();
        assert_eq!(loaded.timeline.threads(), project.timeline.threads());

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_garbage_is_an_error() {
        assert!(Project::from_json("not json").is_err());
    }
}
