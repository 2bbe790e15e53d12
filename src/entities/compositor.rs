//! Frame compositor - resolves which keyframe each thread shows at a frame.
//!
//! Two views of the same resolution step:
//! - `composite_frame` - static, raw stored transforms (timeline thumbnails)
//! - `composite_frame_states` - tweened transforms (preview, scrubbing, export)
//!
//! Both are pure: they read threads and never mutate them. Output order is
//! thread order (bottom -> top); later entries paint over earlier ones.
//! Hidden threads and threads with no keyframe at or before the frame are
//! skipped.

use serde::{Deserialize, Serialize};

use super::keyframe::Keyframe;
use super::thread::Thread;
use super::transform::{Transform, interpolate};

/// Static composite entry: the active keyframe of one visible thread.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CompositeLayer<'a> {
    pub thread_id: &'a str,
    pub keyframe: &'a Keyframe,
}

/// Render list entry consumed by the preview and the export rasterizer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderItem {
    pub thread_id: String,
    pub image_id: String,
    pub image_url: String,
    pub transform: Transform,
}

/// Active keyframe for `frame`: the last keyframe with `frame_index <= frame`.
pub fn resolve_active_keyframe(thread: &Thread, frame: f32) -> Option<&Keyframe> {
    thread.active_index(frame).map(|i| &thread.keyframes()[i])
}

/// Tweened transform of `thread` at `frame`, with the keyframe that supplies
/// the image.
///
/// Tweening applies only when the active keyframe has `tween_to_next` and a
/// later keyframe exists; otherwise the stored transform is returned as-is.
pub fn resolve_transform(thread: &Thread, frame: f32) -> Option<(&Keyframe, Transform)> {
    let i = thread.active_index(frame)?;
    let keyframes = thread.keyframes();
    let k = &keyframes[i];

    let transform = match keyframes.get(i + 1) {
        Some(next) if k.tween_to_next => {
            let span = (next.frame_index - k.frame_index) as f32;
            let t = ((frame - k.frame_index as f32) / span).clamp(0.0, 1.0);
            interpolate(&k.transform, &next.transform, t, k.easing)
        }
        _ => k.transform,
    };
    Some((k, transform))
}

/// Static composite: raw keyframes per visible thread, in paint order.
pub fn composite_frame(threads: &[Thread], frame: u32) -> Vec<CompositeLayer<'_>> {
    threads
        .iter()
        .filter(|t| t.visible)
        .filter_map(|t| {
            resolve_active_keyframe(t, frame as f32).map(|keyframe| CompositeLayer {
                thread_id: t.id.as_str(),
                keyframe,
            })
        })
        .collect()
}

/// Tweened composite: resolved render list per visible thread, in paint order.
///
/// Accepts fractional frames for sub-frame scrubbing.
pub fn composite_frame_states(threads: &[Thread], frame: f32) -> Vec<RenderItem> {
    threads
        .iter()
        .filter(|t| t.visible)
        .filter_map(|t| {
            resolve_transform(t, frame).map(|(k, transform)| RenderItem {
                thread_id: t.id.clone(),
                image_id: k.image_id.clone(),
                image_url: k.image_url.clone(),
                transform,
            })
        })
        .collect()
}
