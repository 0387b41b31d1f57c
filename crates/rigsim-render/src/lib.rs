//! Offscreen cameras and a CPU ray-cast renderer.
//!
//! This crate turns the simulated world into images without a GPU:
//!
//! - [`SceneVisuals`] - the visual shapes of robots and floors
//! - [`camera::SimCamera`] - a camera component, optionally mounted on a link
//! - [`Lighting`] - lights, shadow flags and the background colour
//! - [`raycast::render_frame`] - per-pixel ray casting with parry, rows in
//!   parallel via rayon, Blinn-Phong shading and (translucent) shadows
//! - [`FrameBuffer`] / [`DepthFrameBuffer`] - the latest capture of a camera
//! - [`png`] - PNG output of colour and depth frames
//! - [`Graphics`] - graphics object holding the configuration, lights and the
//!   main camera
//!
//! # Example
//!
//! ```no_run
//! use bevy::prelude::*;
//! use rigsim_render::prelude::*;
//!
//! let mut app = App::new();
//! app.add_plugins(rigsim_core::RigsimCorePlugin)
//!     .add_plugins(rigsim_physics::RigsimPhysicsPlugin)
//!     .add_plugins(RigsimRenderPlugin);
//! app.world_mut()
//!     .spawn(camera_bundle(SimCamera::new("front", CameraIntrinsics::new(256, 256))));
//! app.update();
//! ```

pub mod buffer;
pub mod camera;
pub mod config;
pub mod error;
pub mod graphics;
pub mod lighting;
pub mod png;
pub mod raycast;
pub mod scene;
pub mod systems;

use bevy::prelude::*;

use rigsim_core::RigsimSet;

// ---------------------------------------------------------------------------
// Re-exports
// ---------------------------------------------------------------------------

pub use buffer::{DepthFrameBuffer, FrameBuffer};
pub use config::{CameraIntrinsics, GraphicsConfiguration, RenderSettings};
pub use error::RenderError;
pub use graphics::Graphics;
pub use lighting::{Light, Lighting};
pub use scene::SceneVisuals;

// ---------------------------------------------------------------------------
// RigsimRenderPlugin
// ---------------------------------------------------------------------------

/// Registers the render resources and the capture system in
/// [`RigsimSet::Sense`].
///
/// Requires the physics plugin, whose `RapierContext` supplies body poses.
pub struct RigsimRenderPlugin;

impl Plugin for RigsimRenderPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<RenderSettings>()
            .init_resource::<Lighting>()
            .init_resource::<SceneVisuals>()
            .add_systems(
                Update,
                systems::camera_capture_system.in_set(RigsimSet::Sense),
            );
    }
}

// ---------------------------------------------------------------------------
// Prelude
// ---------------------------------------------------------------------------

pub mod prelude {
    pub use crate::{
        RigsimRenderPlugin,
        buffer::{DepthFrameBuffer, FrameBuffer},
        camera::{CameraAttachment, MainCamera, SimCamera, camera_bundle},
        config::{CameraIntrinsics, GraphicsConfiguration, PixelFormat, RenderSettings},
        error::RenderError,
        graphics::Graphics,
        lighting::{Light, Lighting},
        png::{save_depth_image, save_png_image},
        scene::{Appearance, SceneVisuals, VisualOwner, VisualShape},
    };
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use rigsim_physics::RigsimPhysicsPlugin;
    use rigsim_test_utils::test_app_with;

    use super::*;

    #[test]
    fn plugin_initialises_resources() {
        let mut app = test_app_with(0.001, (RigsimPhysicsPlugin, RigsimRenderPlugin));
        app.update();

        assert!(app.world().resource::<RenderSettings>().enabled);
        assert!(app.world().resource::<SceneVisuals>().is_empty());
        assert_eq!(app.world().resource::<Lighting>().lights().len(), 2);
    }
}
