// rigsim-physics: rapier3d dynamics for URDF robots.
//
// We own the rapier pipeline in a single `RapierContext` resource, build
// bodies and impulse joints from `RobotModel`s, apply joint commands through
// the configured actuators and read joint states back after every step.

pub mod actuation;
pub mod bridge;
pub mod components;
pub mod context;
pub mod floor;
pub mod plugin;
pub mod shapes;
pub mod systems;

// ---------------------------------------------------------------------------
// Prelude
// ---------------------------------------------------------------------------

pub mod prelude {
    pub use crate::{
        bridge::{RobotSpec, register_robot},
        components::{Actuation, JointCommands, JointStates, RobotId},
        context::{RapierContext, RobotBodies},
        floor::{FloorSpec, add_floor},
        plugin::RigsimPhysicsPlugin,
    };
    pub use rigsim_core::config::ActuatorType;
}

pub use plugin::RigsimPhysicsPlugin;
pub use rigsim_core::config::ActuatorType;
