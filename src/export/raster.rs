//! Off-screen rasterizer for render lists.
//!
//! Each item is inverse-mapped: for every canvas pixel inside the sprite's
//! bounding box, the pixel center is taken back to sprite space through the
//! inverse model matrix and sampled there. Rows are processed in parallel.
//! Layers are composited straight-alpha source-over in list order, so the
//! output matches the on-screen preview for the same render list.

use glam::Vec2;
use image::{Rgba, RgbaImage};
use rayon::prelude::*;

use super::images::ImageResolver;
use super::{ExportError, ExportSettings, Sampling};
use crate::entities::RenderItem;
use crate::entities::transform::{build_inverse_matrix, build_model_matrix};

/// Rasterize `items` (bottom -> top) onto a fresh surface of the export size.
pub fn rasterize(
    items: &[RenderItem],
    resolver: &dyn ImageResolver,
    settings: &ExportSettings,
) -> Result<RgbaImage, ExportError> {
    let (w, h) = (settings.width, settings.height);
    let mut canvas = match settings.background {
        Some(color) => RgbaImage::from_pixel(w, h, Rgba(color)),
        None => RgbaImage::new(w, h),
    };

    for item in items {
        let opacity = item.transform.alpha();
        if opacity <= 0.0 {
            continue;
        }
        let sprite = resolver.resolve(&item.image_id, &item.image_url)?;
        draw_sprite(&mut canvas, &sprite, item, opacity, settings.sampling);
    }
    Ok(canvas)
}

/// Canvas rows/cols `[x0, x1) x [y0, y1)` the transformed sprite can touch.
fn pixel_bounds(
    item: &RenderItem,
    src: (u32, u32),
    canvas: (u32, u32),
) -> Option<(u32, u32, u32, u32)> {
    let model = build_model_matrix(&item.transform, src, canvas);
    let (sw, sh) = (src.0 as f32, src.1 as f32);
    let corners = [
        Vec2::ZERO,
        Vec2::new(sw, 0.0),
        Vec2::new(0.0, sh),
        Vec2::new(sw, sh),
    ]
    .map(|c| model.transform_point2(c));

    let min = corners.iter().fold(Vec2::splat(f32::INFINITY), |a, c| a.min(*c));
    let max = corners.iter().fold(Vec2::splat(f32::NEG_INFINITY), |a, c| a.max(*c));
    if !min.is_finite() || !max.is_finite() {
        return None;
    }

    let x0 = min.x.floor().max(0.0) as u32;
    let y0 = min.y.floor().max(0.0) as u32;
    let x1 = (max.x.ceil().max(0.0) as u32).min(canvas.0);
    let y1 = (max.y.ceil().max(0.0) as u32).min(canvas.1);
    (x0 < x1 && y0 < y1).then_some((x0, y0, x1, y1))
}

fn draw_sprite(
    canvas: &mut RgbaImage,
    sprite: &RgbaImage,
    item: &RenderItem,
    opacity: f32,
    sampling: Sampling,
) {
    let canvas_size = canvas.dimensions();
    let src_size = sprite.dimensions();
    if src_size.0 == 0 || src_size.1 == 0 {
        return;
    }
    // Zero scale covers nothing
    let Some(inv) = build_inverse_matrix(&item.transform, src_size, canvas_size) else {
        return;
    };
    let Some((x0, y0, x1, y1)) = pixel_bounds(item, src_size, canvas_size) else {
        return;
    };

    let stride = canvas_size.0 as usize * 4;
    let buf: &mut [u8] = canvas;
    let rows = &mut buf[y0 as usize * stride..y1 as usize * stride];

    rows.par_chunks_mut(stride).enumerate().for_each(|(i, row)| {
        let y = y0 + i as u32;
        for x in x0..x1 {
            let p = inv.transform_point2(Vec2::new(x as f32 + 0.5, y as f32 + 0.5));
            let src = match sampling {
                Sampling::Nearest => sample_nearest(sprite, p),
                Sampling::Bilinear => sample_bilinear(sprite, p),
            };
            let Some(src) = src else { continue };
            let idx = x as usize * 4;
            blend_over(&mut row[idx..idx + 4], src, opacity);
        }
    });
}

/// Nearest texel containing `p`, or `None` outside the sprite.
#[inline]
fn sample_nearest(sprite: &RgbaImage, p: Vec2) -> Option<[f32; 4]> {
    let (w, h) = sprite.dimensions();
    if p.x < 0.0 || p.y < 0.0 || p.x >= w as f32 || p.y >= h as f32 {
        return None;
    }
    let px = sprite.get_pixel(p.x as u32, p.y as u32).0;
    Some(px.map(|c| c as f32 / 255.0))
}

/// Bilinear sample at `p` (texel centers at +0.5), edges clamped.
#[inline]
fn sample_bilinear(sprite: &RgbaImage, p: Vec2) -> Option<[f32; 4]> {
    let (w, h) = sprite.dimensions();
    if p.x < 0.0 || p.y < 0.0 || p.x >= w as f32 || p.y >= h as f32 {
        return None;
    }

    let fx = (p.x - 0.5).max(0.0);
    let fy = (p.y - 0.5).max(0.0);
    let x0 = (fx.floor() as u32).min(w - 1);
    let y0 = (fy.floor() as u32).min(h - 1);
    let x1 = (x0 + 1).min(w - 1);
    let y1 = (y0 + 1).min(h - 1);
    let tx = fx - x0 as f32;
    let ty = fy - y0 as f32;

    let c00 = sprite.get_pixel(x0, y0).0;
    let c10 = sprite.get_pixel(x1, y0).0;
    let c01 = sprite.get_pixel(x0, y1).0;
    let c11 = sprite.get_pixel(x1, y1).0;

    let mut result = [0.0f32; 4];
    for c in 0..4 {
        let top = c00[c] as f32 * (1.0 - tx) + c10[c] as f32 * tx;
        let bottom = c01[c] as f32 * (1.0 - tx) + c11[c] as f32 * tx;
        result[c] = (top * (1.0 - ty) + bottom * ty) / 255.0;
    }
    Some(result)
}

/// Straight-alpha source-over of `src` (0..1) onto the u8 pixel `dst`.
#[inline]
fn blend_over(dst: &mut [u8], src: [f32; 4], opacity: f32) {
    let sa = src[3] * opacity;
    if sa <= 0.0 {
        return;
    }
    let da = dst[3] as f32 / 255.0;
    let out_a = sa + da * (1.0 - sa);

    for c in 0..3 {
        let s = src[c];
        let d = dst[c] as f32 / 255.0;
        let out = (s * sa + d * da * (1.0 - sa)) / out_a;
        dst[c] = (out * 255.0).round().clamp(0.0, 255.0) as u8;
    }
    dst[3] = (out_a * 255.0).round().clamp(0.0, 255.0) as u8;
}
