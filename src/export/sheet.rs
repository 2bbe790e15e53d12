//! Sprite sheet encoder - frames tiled left-to-right, top-to-bottom.

use std::io::Cursor;

use image::{ImageFormat, Rgba, RgbaImage, imageops};
use log::debug;

use super::{
    ExportArtifact, ExportError, ExportProgress, FrameRenderer, check_surface, report_encoding,
};

/// Grid for `frames` cells: `columns` (default `ceil(sqrt(n))`) and
/// `rows = ceil(n / columns)`.
pub fn sheet_grid(frames: u32, columns: Option<u32>) -> (u32, u32) {
    let frames = frames.max(1);
    let columns = columns
        .filter(|&c| c > 0)
        .unwrap_or_else(|| (frames as f64).sqrt().ceil() as u32)
        .min(frames);
    (columns, frames.div_ceil(columns))
}

/// Pixel size of the whole sheet, or `InvalidSurface` if it does not fit.
fn sheet_size(
    columns: u32,
    rows: u32,
    cell_w: u32,
    cell_h: u32,
) -> Result<(u32, u32), ExportError> {
    let (Some(width), Some(height)) = (columns.checked_mul(cell_w), rows.checked_mul(cell_h)) else {
        return Err(ExportError::InvalidSurface {
            width: columns.saturating_mul(cell_w),
            height: rows.saturating_mul(cell_h),
        });
    };
    check_surface(width, height)?;
    Ok((width, height))
}

pub(super) fn encode_sheet(
    renderer: &FrameRenderer<'_>,
    progress: &mut dyn FnMut(ExportProgress),
) -> Result<ExportArtifact, ExportError> {
    let settings = renderer.settings;
    let (cell_w, cell_h) = (settings.width, settings.height);
    let frames = renderer.frames();
    let total = frames.len() as u32;
    let first = frames.start;
    let (columns, rows) = sheet_grid(total, settings.sheet_columns);
    debug!(
        "Sprite sheet: {} frames in {}x{} grid of {}x{} cells",
        total, columns, rows, cell_w, cell_h
    );

    let (sheet_w, sheet_h) = sheet_size(columns, rows, cell_w, cell_h)?;
    let mut sheet = match settings.background {
        Some(color) => RgbaImage::from_pixel(sheet_w, sheet_h, Rgba(color)),
        None => RgbaImage::new(sheet_w, sheet_h),
    };
    let mut written = 0;

    renderer.for_each_frame(progress, |frame, image| {
        let cell = frame - first;
        let x = (cell % columns) * cell_w;
        let y = (cell / columns) * cell_h;
        imageops::replace(&mut sheet, &image, x as i64, y as i64);
        written += 1;
        Ok(())
    })?;

    report_encoding(progress, total);
    let mut png = Cursor::new(Vec::new());
    sheet.write_to(&mut png, ImageFormat::Png)?;

    Ok(ExportArtifact::SpriteSheet {
        png: png.into_inner(),
        frames: written,
        columns,
        rows,
        cell_width: cell_w,
        cell_height: cell_h,
    })
}
