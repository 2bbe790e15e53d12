//! Animated GIF encoder.

use image::codecs::gif::{GifEncoder, Repeat};
use image::{Delay, Frame};
use log::debug;

use super::{ExportArtifact, ExportError, ExportProgress, FrameRenderer, report_encoding};

pub(super) fn encode_gif(
    renderer: &FrameRenderer<'_>,
    progress: &mut dyn FnMut(ExportProgress),
) -> Result<ExportArtifact, ExportError> {
    let timeline = renderer.timeline;
    let fps = timeline.fps().max(1);
    let delay = Delay::from_numer_denom_ms(1000, fps);
    let total = renderer.frames().len() as u32;

    let mut bytes = Vec::new();
    {
        let mut encoder = GifEncoder::new(&mut bytes);
        let repeat = if timeline.looping() && renderer.settings.gif_repeat_infinite {
            Repeat::Infinite
        } else {
            Repeat::Finite(0)
        };
        encoder.set_repeat(repeat)?;
        debug!("GIF: {} frames at {} fps, repeat {:?}", total, fps, repeat);

        renderer.for_each_frame(progress, |_, image| {
            encoder.encode_frame(Frame::from_parts(image, 0, 0, delay))?;
            Ok(())
        })?;
        report_encoding(progress, total);
    }
    Ok(ExportArtifact::Gif(bytes))
}
