use crate::error::RunnerError;
use papergb_core::framebuffer::{SCREEN_HEIGHT, SCREEN_WIDTH};
use std::{fs::File, io::BufWriter, path::Path};

/// Write one RGBA frame as an 8-bit PNG.
pub fn write_png(path: &Path, rgba: &[u8]) -> Result<(), RunnerError> {
    let wrap = |source: png::EncodingError| RunnerError::Screenshot {
        path: path.to_path_buf(),
        source,
    };
    let file = File::create(path).map_err(|e| wrap(e.into()))?;
    let w = BufWriter::new(file);
    let mut encoder = png::Encoder::new(w, SCREEN_WIDTH as u32, SCREEN_HEIGHT as u32);
    encoder.set_color(png::ColorType::Rgba);
    encoder.set_depth(png::BitDepth::Eight);
    let mut writer = encoder.write_header().map_err(wrap)?;
    writer.write_image_data(rgba).map_err(wrap)?;
    writer.finish().map_err(wrap)
}
