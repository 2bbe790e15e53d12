//! Keyframe: an image placed on one frame slot of a thread.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::easing::Easing;
use super::transform::Transform;

/// Opaque reference to a sliced sprite supplied by the library.
///
/// The engine never decodes or re-derives `url`; it only hands it to an
/// image resolver at render time.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageRef {
    pub image_id: String,
    pub image_url: String,
}

impl ImageRef {
    pub fn new(image_id: impl Into<String>, image_url: impl Into<String>) -> Self {
        Self {
            image_id: image_id.into(),
            image_url: image_url.into(),
        }
    }
}

/// Anchored transform snapshot at an integer frame index.
///
/// Serialized shape is the save-file contract:
/// `{id, frameIndex, imageId, imageUrl, transform, tweenToNext, easing}`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Keyframe {
    pub id: String,
    pub frame_index: u32,
    pub image_id: String,
    pub image_url: String,
    pub transform: Transform,
    pub tween_to_next: bool,
    pub easing: Easing,
}

impl Keyframe {
    /// New keyframe with a fresh id, default transform, no tween.
    pub fn new(
        frame_index: u32,
        image_id: impl Into<String>,
        image_url: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            frame_index,
            image_id: image_id.into(),
            image_url: image_url.into(),
            transform: Transform::default(),
            tween_to_next: false,
            easing: Easing::Linear,
        }
    }

    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.transform = transform;
        self
    }

    pub fn with_tween(mut self, easing: Easing) -> Self {
        self.tween_to_next = true;
        self.easing = easing;
        self
    }

    pub fn image(&self) -> ImageRef {
        ImageRef::new(self.image_id.clone(), self.image_url.clone())
    }
}
