//! Robot simulation driver integrating all rigsim crates.
//!
//! [`RigsimSimPlugin`] is a meta-plugin that adds the core, physics and
//! render plugins plus controller evaluation and descriptors. [`Simu`] wraps
//! an app running it behind a RobotDART-style API, and [`SceneBuilder`]
//! creates one from a TOML scene.
//!
//! # Example
//!
//! ```no_run
//! use nalgebra::{Isometry3, Translation3, UnitQuaternion, Vector3};
//! use rigsim_control::PdControl;
//! use rigsim_render::camera::SimCamera;
//! use rigsim_render::config::CameraIntrinsics;
//! use rigsim_physics::floor::FloorSpec;
//! use rigsim_sim::{Robot, Simu};
//!
//! let mut robot = Robot::from_urdf("res/models/arm.urdf", "arm").unwrap();
//! robot.fix_to_world();
//! robot.add_controller(PdControl::new(&[0.0, 2.0, -0.5, 0.7]), 1.0);
//!
//! let mut simu = Simu::new(0.001).unwrap();
//! simu.add_robot(robot).unwrap();
//! simu.add_checkerboard_floor(FloorSpec::default());
//!
//! let mut camera = SimCamera::new("tip", CameraIntrinsics::new(256, 256));
//! let rotation = UnitQuaternion::from_axis_angle(&Vector3::x_axis(), 3.14)
//!     * UnitQuaternion::from_axis_angle(&Vector3::z_axis(), 1.57);
//! camera.attach_to("arm_link_5", Isometry3::from_parts(Translation3::new(0.0, 0.0, 0.1), rotation));
//! let handle = simu.add_camera(camera).unwrap();
//!
//! simu.run(5.0, false).unwrap();
//! simu.save_camera_image(handle, "camera.png").unwrap();
//! ```

pub mod builder;
pub mod control;
pub mod descriptor;
pub mod error;
pub mod robot;
pub mod simu;

use bevy::prelude::*;
use rigsim_core::RigsimSet;

// ---------------------------------------------------------------------------
// Re-exports
// ---------------------------------------------------------------------------

pub use builder::{BuiltScene, SceneBuilder};
pub use error::SimuError;
pub use robot::Robot;
pub use simu::{CameraHandle, RobotHandle, RobotRef, Simu};

// ---------------------------------------------------------------------------
// RigsimSimPlugin
// ---------------------------------------------------------------------------

/// Meta-plugin that adds the full rigsim simulation stack.
///
/// Includes:
/// - [`RigsimCorePlugin`](rigsim_core::RigsimCorePlugin): phase ordering, clock and scheduler
/// - [`RigsimPhysicsPlugin`](rigsim_physics::RigsimPhysicsPlugin): the rapier world
/// - [`RigsimRenderPlugin`](rigsim_render::RigsimRenderPlugin): cameras
/// - controller evaluation in [`RigsimSet::Control`]
/// - [`Descriptors`](descriptor::Descriptors) fed in [`RigsimSet::Sense`]
pub struct RigsimSimPlugin;

impl Plugin for RigsimSimPlugin {
    fn build(&self, app: &mut App) {
        app.add_plugins(rigsim_core::RigsimCorePlugin)
            .add_plugins(rigsim_physics::RigsimPhysicsPlugin)
            .add_plugins(rigsim_render::RigsimRenderPlugin)
            .init_resource::<descriptor::Descriptors>()
            .add_systems(
                Update,
                control::robot_control_system.in_set(RigsimSet::Control),
            )
            .add_systems(
                Update,
                descriptor::descriptor_system.in_set(RigsimSet::Sense),
            );
    }
}

// ---------------------------------------------------------------------------
// Prelude
// ---------------------------------------------------------------------------

pub mod prelude {
    pub use crate::{
        BuiltScene, CameraHandle, RigsimSimPlugin, Robot, RobotHandle, RobotRef, SceneBuilder,
        Simu, SimuError,
        control::Controllers,
        descriptor::{Descriptor, Descriptors, RobotSnapshot, StateDescriptor},
    };
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
