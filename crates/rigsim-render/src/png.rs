//! PNG output for captured frames.

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use bevy::log::info;
use png::{BitDepth, ColorType, Encoder};

use crate::buffer::{DepthFrameBuffer, FrameBuffer};
use crate::config::PixelFormat;
use crate::error::RenderError;

/// Write an 8-bit RGB or RGBA PNG.
pub fn save_png_image(path: impl AsRef<Path>, frame: &FrameBuffer) -> Result<(), RenderError> {
    let color = match frame.format() {
        PixelFormat::Rgb8 => ColorType::Rgb,
        PixelFormat::Rgba8 => ColorType::Rgba,
    };
    write_png(
        path.as_ref(),
        frame.width(),
        frame.height(),
        color,
        BitDepth::Eight,
        frame.data(),
    )
}

/// Write depth as a 16-bit grayscale PNG in millimetres. Depths beyond
/// 65.535 m saturate.
pub fn save_depth_image(
    path: impl AsRef<Path>,
    frame: &DepthFrameBuffer,
) -> Result<(), RenderError> {
    let bytes: Vec<u8> = frame
        .data()
        .iter()
        .flat_map(|&d| depth_to_millimetres(d).to_be_bytes())
        .collect();
    write_png(
        path.as_ref(),
        frame.width(),
        frame.height(),
        ColorType::Grayscale,
        BitDepth::Sixteen,
        &bytes,
    )
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn depth_to_millimetres(depth: f32) -> u16 {
    if depth.is_nan() {
        return 0;
    }
    (depth * 1000.0).round().clamp(0.0, f32::from(u16::MAX)) as u16
}

fn write_png(
    path: &Path,
    width: u32,
    height: u32,
    color: ColorType,
    depth: BitDepth,
    data: &[u8],
) -> Result<(), RenderError> {
    if width == 0 || height == 0 {
        return Err(RenderError::EmptyImage);
    }
    let io_error = |source| RenderError::Io {
        path: path.to_path_buf(),
        source,
    };

    let file = File::create(path).map_err(io_error)?;
    let mut encoder = Encoder::new(BufWriter::new(file), width, height);
    encoder.set_color(color);
    encoder.set_depth(depth);

    let mut writer = encoder.write_header()?;
    writer.write_image_data(data)?;
    writer.finish()?;

    info!("Saved {width}x{height} image to {}", path.display());
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("rigsim-render-{}-{name}", std::process::id()))
    }

    fn decode(path: &Path) -> (png::OutputInfo, Vec<u8>) {
        let decoder = png::Decoder::new(File::open(path).unwrap());
        let mut reader = decoder.read_info().unwrap();
        let mut buf = vec![0; reader.output_buffer_size()];
        let info = reader.next_frame(&mut buf).unwrap();
        buf.truncate(info.buffer_size());
        (info, buf)
    }

    #[test]
    fn rgb_frame_round_trips_through_file() {
        let mut frame = FrameBuffer::new(2, 1, PixelFormat::Rgb8);
        frame.write_frame(vec![255, 0, 0, 0, 0, 255]);
        let path = temp_path("rgb.png");

        save_png_image(&path, &frame).unwrap();
        let (info, data) = decode(&path);
        assert_eq!((info.width, info.height), (2, 1));
        assert_eq!(info.color_type, ColorType::Rgb);
        assert_eq!(data, frame.data());
        std::fs::remove_file(path).unwrap();
    }

    #[test]
    fn depth_is_sixteen_bit_millimetres() {
        let mut frame = DepthFrameBuffer::new(3, 1, 200.0);
        frame.write_depth_frame(vec![1.25, 200.0, -1.0]);
        let path = temp_path("depth.png");

        save_depth_image(&path, &frame).unwrap();
        let (info, data) = decode(&path);
        assert_eq!(info.bit_depth, BitDepth::Sixteen);
        assert_eq!(info.color_type, ColorType::Grayscale);
        let values: Vec<u16> = data
            .chunks(2)
            .map(|b| u16::from_be_bytes([b[0], b[1]]))
            .collect();
        assert_eq!(values, vec![1250, u16::MAX, 0]);
        std::fs::remove_file(path).unwrap();
    }

    #[test]
    fn missing_directory_is_an_io_error() {
        let frame = FrameBuffer::new(1, 1, PixelFormat::Rgb8);
        let path = temp_path("no-such-dir").join("camera.png");
        let err = save_png_image(&path, &frame).unwrap_err();
        assert!(matches!(err, RenderError::Io { .. }));
    }

    #[test]
    fn empty_frame_is_rejected() {
        let frame = FrameBuffer::new(0, 4, PixelFormat::Rgb8);
        let err = save_png_image(temp_path("empty.png"), &frame).unwrap_err();
        assert!(matches!(err, RenderError::EmptyImage));
    }
}
