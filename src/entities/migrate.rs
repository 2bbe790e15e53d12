//! Save-format migration.
//!
//! Saved threads are read into permissive `Saved*` shapes where every field
//! is optional, then migrated once into fully-populated current-schema
//! values. Nothing downstream ever checks whether a field was present.
//!
//! # Schema history
//!
//! - v1: keyframes carry only `frameIndex`, `imageId`, `imageUrl`
//! - v2: adds `transform` (may lack `scaleX`/`scaleY`/`opacity`),
//!   `tweenToNext`, `easing`
//! - v3: fully populated (current)

use log::warn;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::easing::Easing;
use super::keyframe::Keyframe;
use super::thread::Thread;
use super::transform::{Transform, TransformPatch};

/// Current save-file schema version.
pub const SCHEMA_VERSION: u32 = 3;

/// Keyframe as found in any save-file version.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SavedKeyframe {
    pub id: Option<String>,
    /// Numbers only; written by older tools as floats sometimes
    pub frame_index: Option<f64>,
    pub image_id: Option<String>,
    pub image_url: Option<String>,
    pub transform: Option<TransformPatch>,
    pub tween_to_next: Option<bool>,
    pub easing: Option<String>,
}

/// Thread as found in any save-file version.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SavedThread {
    pub id: Option<String>,
    pub name: Option<String>,
    pub visible: Option<bool>,
    pub locked: Option<bool>,
    pub keyframes: Vec<SavedKeyframe>,
}

impl From<&Keyframe> for SavedKeyframe {
    fn from(k: &Keyframe) -> Self {
        let t = k.transform;
        Self {
            id: Some(k.id.clone()),
            frame_index: Some(k.frame_index as f64),
            image_id: Some(k.image_id.clone()),
            image_url: Some(k.image_url.clone()),
            transform: Some(TransformPatch {
                x: Some(t.x),
                y: Some(t.y),
                scale: Some(t.scale),
                scale_x: Some(t.scale_x),
                scale_y: Some(t.scale_y),
                rotation: Some(t.rotation),
                opacity: Some(t.opacity),
            }),
            tween_to_next: Some(k.tween_to_next),
            easing: Some(k.easing.name().to_string()),
        }
    }
}

impl From<&Thread> for SavedThread {
    fn from(t: &Thread) -> Self {
        Self {
            id: Some(t.id.clone()),
            name: Some(t.name.clone()),
            visible: Some(t.visible),
            locked: Some(t.locked),
            keyframes: t.keyframes().iter().map(SavedKeyframe::from).collect(),
        }
    }
}

fn non_empty(s: Option<String>) -> Option<String> {
    s.filter(|v| !v.trim().is_empty())
}

/// Migrate one keyframe. Returns `None` when it has no usable frame index.
pub fn migrate_keyframe(saved: SavedKeyframe) -> Option<Keyframe> {
    let frame_index = match saved.frame_index {
        Some(f) if f.is_finite() && f >= 0.0 && f <= u32::MAX as f64 => f.round() as u32,
        other => {
            warn!("Dropping keyframe with invalid frameIndex {:?}", other);
            return None;
        }
    };

    let mut transform = Transform::default();
    if let Some(patch) = &saved.transform {
        transform.apply_patch(patch);
    }

    let easing = match saved.easing.as_deref() {
        None => Easing::Linear,
        Some(name) => Easing::from_name(name).unwrap_or_else(|| {
            warn!("Unknown easing '{}' at frame {}, using linear", name, frame_index);
            Easing::Linear
        }),
    };

    Some(Keyframe {
        id: non_empty(saved.id).unwrap_or_else(|| Uuid::new_v4().to_string()),
        frame_index,
        image_id: saved.image_id.unwrap_or_default(),
        image_url: saved.image_url.unwrap_or_default(),
        transform,
        tween_to_next: saved.tween_to_next.unwrap_or(false),
        easing,
    })
}

/// Migrate a list of saved threads into current-schema threads.
///
/// Missing ids are regenerated (and duplicates re-keyed), missing names get
/// `"Thread N"`, keyframes are sorted and de-duplicated (last write wins).
pub fn migrate_threads(saved: Vec<SavedThread>) -> Vec<Thread> {
    let mut out: Vec<Thread> = Vec::with_capacity(saved.len());

    for (i, st) in saved.into_iter().enumerate() {
        let mut id = non_empty(st.id).unwrap_or_else(|| Uuid::new_v4().to_string());
        if out.iter().any(|t| t.id == id) {
            warn!("Duplicate thread id '{}', assigning a fresh one", id);
            id = Uuid::new_v4().to_string();
        }
        let name = non_empty(st.name).unwrap_or_else(|| format!("Thread {}", i + 1));
        let keyframes: Vec<Keyframe> =
            st.keyframes.into_iter().filter_map(migrate_keyframe).collect();

        out.push(Thread::from_parts(
            id,
            name,
            st.visible.unwrap_or(true),
            st.locked.unwrap_or(false),
            keyframes,
        ));
    }

    out
}
