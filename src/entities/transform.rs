//! 2D sprite transforms and tween interpolation.
//!
//! Uses glam::Affine2 for matrix math in y-down canvas space.
//! Forward transform (sprite pixel -> canvas pixel):
//! canvas = center + offset + R * S * (pixel - half_size)
//!
//! Rotation sign: clockwise-positive on screen (y-down), degrees.
//! Scale: uniform `scale` times the independent `scale_x`/`scale_y`
//! multipliers; a negative multiplier mirrors the sprite on that axis.

use glam::{Affine2, Vec2};
use serde::{Deserialize, Serialize};

use super::easing::Easing;

/// Transform snapshot stored on a keyframe.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transform {
    /// Offset from canvas center, pixels
    pub x: f32,
    pub y: f32,
    /// Uniform scale factor
    pub scale: f32,
    /// Horizontal multiplier (sign = mirror)
    pub scale_x: f32,
    /// Vertical multiplier (sign = flip)
    pub scale_y: f32,
    /// Degrees, unconstrained
    pub rotation: f32,
    /// 0.0-1.0
    pub opacity: f32,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            scale: 1.0,
            scale_x: 1.0,
            scale_y: 1.0,
            rotation: 0.0,
            opacity: 1.0,
        }
    }
}

/// Partial transform edit: only `Some` fields are merged.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TransformPatch {
    pub x: Option<f32>,
    pub y: Option<f32>,
    pub scale: Option<f32>,
    pub scale_x: Option<f32>,
    pub scale_y: Option<f32>,
    pub rotation: Option<f32>,
    pub opacity: Option<f32>,
}

impl TransformPatch {
    pub fn position(x: f32, y: f32) -> Self {
        Self {
            x: Some(x),
            y: Some(y),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

impl Transform {
    pub fn at(x: f32, y: f32) -> Self {
        Self {
            x,
            y,
            ..Default::default()
        }
    }

    /// Merge the provided fields of `patch` into this transform.
    pub fn apply_patch(&mut self, patch: &TransformPatch) {
        if let Some(v) = patch.x {
            self.x = v;
        }
        if let Some(v) = patch.y {
            self.y = v;
        }
        if let Some(v) = patch.scale {
            self.scale = v;
        }
        if let Some(v) = patch.scale_x {
            self.scale_x = v;
        }
        if let Some(v) = patch.scale_y {
            self.scale_y = v;
        }
        if let Some(v) = patch.rotation {
            self.rotation = v;
        }
        if let Some(v) = patch.opacity {
            self.opacity = v;
        }
    }

    /// True if drawing with this transform is a plain centered blit.
    pub fn is_identity(&self) -> bool {
        *self == Transform::default()
    }

    /// Effective per-axis scale (`scale * scale_x`, `scale * scale_y`).
    pub fn effective_scale(&self) -> Vec2 {
        Vec2::new(self.scale * self.scale_x, self.scale * self.scale_y)
    }

    /// Opacity clamped for compositing.
    pub fn alpha(&self) -> f32 {
        if self.opacity.is_nan() {
            return 0.0;
        }
        self.opacity.clamp(0.0, 1.0)
    }
}

#[inline]
fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

/// Blend two transforms by eased progress.
///
/// `ease` is applied once to `t`; every field is then interpolated linearly,
/// including `scale_x`/`scale_y` (a mirror flip passes through zero).
/// `t <= 0` returns `a` and `t >= 1` returns `b` exactly.
pub fn interpolate(a: &Transform, b: &Transform, t: f32, ease: Easing) -> Transform {
    if t.is_nan() || t <= 0.0 {
        return *a;
    }
    if t >= 1.0 {
        return *b;
    }

    let e = ease.apply(t);
    Transform {
        x: lerp(a.x, b.x, e),
        y: lerp(a.y, b.y, e),
        scale: lerp(a.scale, b.scale, e),
        scale_x: lerp(a.scale_x, b.scale_x, e),
        scale_y: lerp(a.scale_y, b.scale_y, e),
        rotation: lerp(a.rotation, b.rotation, e),
        opacity: lerp(a.opacity, b.opacity, e),
    }
}

/// Build model matrix (sprite pixel space -> canvas pixel space).
///
/// # Arguments
/// - `transform` - keyframe transform (offset relative to canvas center)
/// - `src_size` - sprite size in pixels `(w, h)`
/// - `canvas` - canvas size in pixels `(w, h)`
pub fn build_model_matrix(
    transform: &Transform,
    src_size: (u32, u32),
    canvas: (u32, u32),
) -> Affine2 {
    let half_src = Vec2::new(src_size.0 as f32 * 0.5, src_size.1 as f32 * 0.5);
    let center = Vec2::new(canvas.0 as f32 * 0.5, canvas.1 as f32 * 0.5);
    let offset = Vec2::new(transform.x, transform.y);

    // In y-down space a positive angle turns clockwise on screen
    Affine2::from_translation(center + offset)
        * Affine2::from_angle(transform.rotation.to_radians())
        * Affine2::from_scale(transform.effective_scale())
        * Affine2::from_translation(-half_src)
}

/// Build inverse matrix (canvas pixel -> sprite pixel) for sampling.
///
/// Returns `None` for degenerate transforms (any effective scale axis is 0),
/// which cover no canvas pixels.
pub fn build_inverse_matrix(
    transform: &Transform,
    src_size: (u32, u32),
    canvas: (u32, u32),
) -> Option<Affine2> {
    let scale = transform.effective_scale();
    if scale.x.abs() <= f32::EPSILON || scale.y.abs() <= f32::EPSILON || !scale.is_finite() {
        return None;
    }
    let model = build_model_matrix(transform, src_size, canvas);
    Some(model.inverse())
}
