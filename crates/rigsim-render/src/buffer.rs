//! Frame buffers for captured images.
//!
//! Every camera entity carries one [`FrameBuffer`] for colour and one
//! [`DepthFrameBuffer`] for metric depth. The capture system overwrites both
//! whenever the camera fires.

use bevy::prelude::*;

use crate::config::{CameraIntrinsics, PixelFormat};

/// Element count of a `width x height` image with `channels` values per
/// pixel, computed in `usize` so large resolutions do not overflow `u32`.
pub(crate) const fn frame_len(width: u32, height: u32, channels: u32) -> usize {
    width as usize * height as usize * channels as usize
}

// ---------------------------------------------------------------------------
// FrameBuffer
// ---------------------------------------------------------------------------

/// A single captured frame of pixel data, row-major from the top-left.
///
/// # Example
///
/// ```
/// use rigsim_render::FrameBuffer;
/// use rigsim_render::config::PixelFormat;
///
/// let buf = FrameBuffer::new(4, 2, PixelFormat::Rgb8);
/// assert_eq!(buf.width(), 4);
/// assert_eq!(buf.height(), 2);
/// assert_eq!(buf.data().len(), 4 * 2 * 3);
/// ```
#[derive(Component, Clone, Debug)]
pub struct FrameBuffer {
    width: u32,
    height: u32,
    format: PixelFormat,
    data: Vec<u8>,
    frame_counter: u64,
}

impl FrameBuffer {
    /// Create a zero-filled frame buffer.
    #[must_use]
    pub fn new(width: u32, height: u32, format: PixelFormat) -> Self {
        Self {
            width,
            height,
            format,
            data: vec![0; frame_len(width, height, format.bytes_per_pixel())],
            frame_counter: 0,
        }
    }

    /// RGB buffer sized for a camera.
    #[must_use]
    pub fn for_camera(intrinsics: &CameraIntrinsics) -> Self {
        Self::new(intrinsics.width, intrinsics.height, PixelFormat::Rgb8)
    }

    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    #[must_use]
    pub const fn height(&self) -> u32 {
        self.height
    }

    #[must_use]
    pub const fn format(&self) -> PixelFormat {
        self.format
    }

    /// Raw pixel data as a byte slice.
    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Replace the entire frame data and increment the frame counter.
    ///
    /// # Panics
    ///
    /// Panics if `data.len()` does not match the expected frame size.
    pub fn write_frame(&mut self, data: Vec<u8>) {
        let expected = self.expected_len();
        assert_eq!(
            data.len(),
            expected,
            "frame data length {actual} does not match expected {expected}",
            actual = data.len(),
        );
        self.data = data;
        self.frame_counter += 1;
    }

    /// Number of frames written since creation. Zero means nothing has been
    /// captured yet.
    #[must_use]
    pub const fn frame_counter(&self) -> u64 {
        self.frame_counter
    }

    /// Access a single pixel by (x, y) coordinates. Returns a slice of
    /// `bytes_per_pixel` bytes.
    ///
    /// # Panics
    ///
    /// Panics if coordinates are out of bounds.
    #[must_use]
    pub fn pixel(&self, x: u32, y: u32) -> &[u8] {
        assert!(x < self.width, "x={x} out of bounds (width={})", self.width);
        assert!(
            y < self.height,
            "y={y} out of bounds (height={})",
            self.height
        );
        let bpp = self.format.bytes_per_pixel() as usize;
        let offset = (y as usize * self.width as usize + x as usize) * bpp;
        &self.data[offset..offset + bpp]
    }

    fn expected_len(&self) -> usize {
        frame_len(self.width, self.height, self.format.bytes_per_pixel())
    }
}

// ---------------------------------------------------------------------------
// DepthFrameBuffer
// ---------------------------------------------------------------------------

/// Metric z-depth per pixel, in metres along the camera's viewing axis.
///
/// Pixels that see nothing hold the camera's far plane distance.
#[derive(Component, Clone, Debug)]
pub struct DepthFrameBuffer {
    width: u32,
    height: u32,
    data: Vec<f32>,
    frame_counter: u64,
}

impl DepthFrameBuffer {
    /// Create a buffer filled with `far`.
    #[must_use]
    pub fn new(width: u32, height: u32, far: f32) -> Self {
        Self {
            width,
            height,
            data: vec![far; frame_len(width, height, 1)],
            frame_counter: 0,
        }
    }

    #[must_use]
    pub fn for_camera(intrinsics: &CameraIntrinsics) -> Self {
        Self::new(intrinsics.width, intrinsics.height, intrinsics.far)
    }

    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    #[must_use]
    pub const fn height(&self) -> u32 {
        self.height
    }

    /// Length is always `width * height`.
    #[must_use]
    pub fn data(&self) -> &[f32] {
        &self.data
    }

    /// Depth at (x, y).
    #[must_use]
    pub fn depth(&self, x: u32, y: u32) -> f32 {
        self.data[y as usize * self.width as usize + x as usize]
    }

    /// Replace the entire depth frame and increment the frame counter.
    ///
    /// # Panics
    ///
    /// Panics if `data.len()` does not equal `width * height`.
    pub fn write_depth_frame(&mut self, data: Vec<f32>) {
        let expected = frame_len(self.width, self.height, 1);
        assert_eq!(
            data.len(),
            expected,
            "depth frame length {actual} does not match expected {expected}",
            actual = data.len(),
        );
        self.data = data;
        self.frame_counter += 1;
    }

    #[must_use]
    pub const fn frame_counter(&self) -> u64 {
        self.frame_counter
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_buffer_is_zeroed() {
        let buf = FrameBuffer::new(3, 2, PixelFormat::Rgba8);
        assert_eq!(buf.data().len(), 3 * 2 * 4);
        assert!(buf.data().iter().all(|&b| b == 0));
        assert_eq!(buf.frame_counter(), 0);
    }

    #[test]
    fn camera_buffer_matches_intrinsics() {
        let intrinsics = CameraIntrinsics::new(8, 4);
        let buf = FrameBuffer::for_camera(&intrinsics);
        assert_eq!((buf.width(), buf.height()), (8, 4));
        assert_eq!(buf.format(), PixelFormat::Rgb8);
    }

    #[test]
    fn write_frame_and_read_pixel() {
        let mut buf = FrameBuffer::new(2, 2, PixelFormat::Rgb8);
        buf.write_frame(vec![
            1, 2, 3, 4, 5, 6, //
            7, 8, 9, 10, 11, 12,
        ]);
        assert_eq!(buf.frame_counter(), 1);
        assert_eq!(buf.pixel(0, 0), &[1, 2, 3]);
        assert_eq!(buf.pixel(1, 1), &[10, 11, 12]);
    }

    #[test]
    #[should_panic(expected = "does not match expected")]
    fn write_frame_wrong_size_panics() {
        let mut buf = FrameBuffer::new(2, 2, PixelFormat::Rgb8);
        buf.write_frame(vec![0; 5]);
    }

    #[test]
    #[should_panic(expected = "out of bounds")]
    fn pixel_out_of_bounds_panics() {
        let buf = FrameBuffer::new(2, 2, PixelFormat::Rgb8);
        let _ = buf.pixel(2, 0);
    }

    #[test]
    #[cfg(target_pointer_width = "64")]
    fn frame_len_does_not_overflow_u32() {
        // 70000^2 * 4 bytes is far beyond u32::MAX
        assert_eq!(frame_len(70_000, 70_000, 4), 19_600_000_000);
        assert_eq!(frame_len(65_536, 65_536, 1), 1 << 32);
    }

    #[test]
    fn depth_starts_at_far_plane() {
        let buf = DepthFrameBuffer::for_camera(&CameraIntrinsics::new(4, 4));
        assert!(buf.data().iter().all(|&d| (d - 200.0).abs() < f32::EPSILON));
    }

    #[test]
    fn depth_write_and_read() {
        let mut buf = DepthFrameBuffer::new(2, 1, 10.0);
        buf.write_depth_frame(vec![0.5, 1.5]);
        assert_eq!(buf.frame_counter(), 1);
        assert!((buf.depth(1, 0) - 1.5).abs() < f32::EPSILON);
    }
}
