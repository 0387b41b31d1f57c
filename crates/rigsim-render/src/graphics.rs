//! The graphics object of a simulation.
//!
//! Rendering is always offscreen: [`Graphics`] holds the configuration, the
//! lights and the main camera that a simulation spawns when the graphics are
//! attached. There is no window, so [`Graphics::done`] never reports one
//! being closed.

use nalgebra::{Point3, Vector3};

use rigsim_core::config::GraphicsConfig;

use crate::camera::SimCamera;
use crate::config::{CameraIntrinsics, GraphicsConfiguration};
use crate::lighting::{Light, Lighting};

/// Name of the camera spawned by [`Graphics`].
pub const MAIN_CAMERA_NAME: &str = "main";

#[derive(Clone, Debug)]
pub struct Graphics {
    configuration: GraphicsConfiguration,
    lighting: Lighting,
    camera: SimCamera,
    enabled: bool,
}

impl Graphics {
    pub fn new(configuration: GraphicsConfiguration) -> Self {
        let camera = SimCamera::new(
            MAIN_CAMERA_NAME,
            CameraIntrinsics::new(configuration.width, configuration.height),
        );
        Self {
            lighting: Lighting::from_configuration(&configuration),
            configuration,
            camera,
            enabled: true,
        }
    }

    pub fn from_config(config: &GraphicsConfig) -> Self {
        let mut graphics = Self::new(GraphicsConfiguration::from(config));
        graphics.enabled = config.enabled;
        graphics
    }

    pub const fn configuration(&self) -> &GraphicsConfiguration {
        &self.configuration
    }

    pub const fn lighting(&self) -> &Lighting {
        &self.lighting
    }

    pub const fn lighting_mut(&mut self) -> &mut Lighting {
        &mut self.lighting
    }

    pub fn add_light(&mut self, light: Light) -> bool {
        self.lighting.add_light(light)
    }

    pub fn clear_lights(&mut self) {
        self.lighting.clear_lights();
    }

    /// Whether cameras capture images at all.
    pub const fn enabled(&self) -> bool {
        self.enabled
    }

    pub const fn set_enable(&mut self, enable: bool) {
        self.enabled = enable;
    }

    /// Point the main camera.
    pub fn look_at(&mut self, eye: Point3<f32>, center: Point3<f32>, up: Vector3<f32>) {
        self.camera.look_at(eye, center, up);
    }

    /// Main camera as it will be spawned. `None` when the main camera is not
    /// drawn.
    pub fn main_camera(&self) -> Option<&SimCamera> {
        self.configuration.draw_main_camera.then_some(&self.camera)
    }

    /// Always `false`: offscreen graphics have no window to close.
    pub const fn done(&self) -> bool {
        false
    }
}

impl Default for Graphics {
    fn default() -> Self {
        Self::new(GraphicsConfiguration::default())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
