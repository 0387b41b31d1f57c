//! Render configuration types.
//!
//! [`GraphicsConfiguration`] mirrors the window-level settings of a graphics
//! object (resolution, shadows, lights). [`CameraIntrinsics`] holds the
//! projection parameters of a single camera.

use bevy::prelude::*;

use rigsim_core::config::GraphicsConfig;

/// Widest horizontal field of view a camera accepts, in radians.
pub const MAX_FOV: f32 = 3.0;

// ---------------------------------------------------------------------------
// PixelFormat
// ---------------------------------------------------------------------------

/// Pixel storage format for captured frames.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum PixelFormat {
    /// 3 bytes per pixel (red, green, blue).
    #[default]
    Rgb8,
    /// 4 bytes per pixel (red, green, blue, alpha).
    Rgba8,
}

impl PixelFormat {
    /// Number of bytes per pixel.
    #[must_use]
    pub const fn bytes_per_pixel(self) -> u32 {
        match self {
            Self::Rgb8 => 3,
            Self::Rgba8 => 4,
        }
    }
}

// ---------------------------------------------------------------------------
// CameraIntrinsics
// ---------------------------------------------------------------------------

/// Resolution and projection of a camera.
///
/// The field of view is horizontal; the vertical one follows from the aspect
/// ratio.
///
/// # Example
///
/// ```
/// use rigsim_render::config::CameraIntrinsics;
///
/// let intrinsics = CameraIntrinsics::new(256, 128).with_fov(10.0);
/// assert_eq!(intrinsics.aspect(), 2.0);
/// assert_eq!(intrinsics.fov, 3.0);
/// ```
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CameraIntrinsics {
    pub width: u32,
    pub height: u32,
    /// Horizontal field of view in radians, within `[0, MAX_FOV]`.
    pub fov: f32,
    pub near: f32,
    pub far: f32,
}

impl CameraIntrinsics {
    /// Intrinsics with a 60 degree field of view and `[0.01, 200]` clipping.
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            fov: std::f32::consts::FRAC_PI_3,
            near: 0.01,
            far: 200.0,
        }
    }

    /// Set the horizontal field of view, clamped to `[0, MAX_FOV]`.
    #[must_use]
    pub fn with_fov(mut self, fov: f32) -> Self {
        self.set_fov(fov);
        self
    }

    pub fn set_fov(&mut self, fov: f32) {
        self.fov = fov.clamp(0.0, MAX_FOV);
    }

    #[must_use]
    pub const fn with_clipping(mut self, near: f32, far: f32) -> Self {
        self.near = near;
        self.far = far;
        self
    }

    /// Width over height.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn aspect(&self) -> f32 {
        self.width as f32 / self.height.max(1) as f32
    }

    /// Tangents of the half field of view, horizontally and vertically.
    #[must_use]
    pub fn half_extents(&self) -> (f32, f32) {
        let tan_x = (self.fov / 2.0).tan();
        (tan_x, tan_x / self.aspect())
    }
}

impl Default for CameraIntrinsics {
    fn default() -> Self {
        Self::new(256, 256)
    }
}

// ---------------------------------------------------------------------------
// GraphicsConfiguration
// ---------------------------------------------------------------------------

/// Settings of a graphics object. Rendering is always offscreen, the window
/// fields only size the main camera.
#[derive(Clone, Debug, PartialEq)]
pub struct GraphicsConfiguration {
    pub width: u32,
    pub height: u32,
    pub title: String,
    pub shadowed: bool,
    /// Translucent objects cast lighter shadows.
    pub transparent_shadows: bool,
    pub specular_strength: f32,
    pub max_lights: usize,
    pub draw_main_camera: bool,
    pub bg_color: [f32; 4],
}

impl Default for GraphicsConfiguration {
    fn default() -> Self {
        Self {
            width: 640,
            height: 480,
            title: "rigsim".into(),
            shadowed: true,
            transparent_shadows: true,
            specular_strength: 0.25,
            max_lights: 3,
            draw_main_camera: true,
            bg_color: [0.0, 0.0, 0.0, 1.0],
        }
    }
}

impl From<&GraphicsConfig> for GraphicsConfiguration {
    fn from(config: &GraphicsConfig) -> Self {
        Self {
            width: config.width,
            height: config.height,
            shadowed: config.shadowed,
            transparent_shadows: config.transparent_shadows,
            bg_color: config.bg_color,
            ..Self::default()
        }
    }
}

// ---------------------------------------------------------------------------
// RenderSettings
// ---------------------------------------------------------------------------

/// Global switch for camera capture.
#[derive(Resource, Clone, Copy, Debug)]
pub struct RenderSettings {
    pub enabled: bool,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self { enabled: true }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    #[test]
    fn pixel_format_bytes_per_pixel() {
        assert_eq!(PixelFormat::Rgb8.bytes_per_pixel(), 3);
        assert_eq!(PixelFormat::Rgba8.bytes_per_pixel(), 4);
        assert_eq!(PixelFormat::default(), PixelFormat::Rgb8);
    }

    #[test]
    fn intrinsics_defaults() {
        let intrinsics = CameraIntrinsics::default();
        assert_eq!((intrinsics.width, intrinsics.height), (256, 256));
        assert_relative_eq!(intrinsics.fov, 60f32.to_radians(), epsilon = 1e-6);
        assert_relative_eq!(intrinsics.near, 0.01);
        assert_relative_eq!(intrinsics.far, 200.0);
    }

    #[test]
    fn fov_is_clamped() {
        assert_relative_eq!(CameraIntrinsics::default().with_fov(-1.0).fov, 0.0);
        assert_relative_eq!(CameraIntrinsics::default().with_fov(4.0).fov, MAX_FOV);
        assert_relative_eq!(CameraIntrinsics::default().with_fov(1.2).fov, 1.2);
    }

    #[test]
    fn vertical_extent_follows_aspect() {
        let intrinsics = CameraIntrinsics::new(640, 480).with_fov(std::f32::consts::FRAC_PI_2);
        let (x, y) = intrinsics.half_extents();
        assert_relative_eq!(x, 1.0, epsilon = 1e-6);
        assert_relative_eq!(y, 0.75, epsilon = 1e-6);
    }

    #[test]
    fn graphics_defaults() {
        let config = GraphicsConfiguration::default();
        assert_eq!((config.width, config.height), (640, 480));
        assert!(config.shadowed);
        assert!(config.transparent_shadows);
        assert_relative_eq!(config.specular_strength, 0.25);
        assert_eq!(config.max_lights, 3);
        assert!(config.draw_main_camera);
    }

    #[test]
    fn graphics_from_scene_config() {
        let scene = GraphicsConfig {
            transparent_shadows: false,
            width: 320,
            ..GraphicsConfig::default()
        };
        let config = GraphicsConfiguration::from(&scene);
        assert_eq!(config.width, 320);
        assert!(!config.transparent_shadows);
        assert_eq!(config.max_lights, 3);
    }
}
