//! URDF parsing, robot model representation and forward kinematics.
//!
//! The model produced here is the single description every other crate works
//! from: physics builds bodies and joints from it, the renderer picks up its
//! visual geometry and controllers see its degrees of freedom in declaration
//! order.

pub mod error;
pub mod kinematics;
pub mod parser;
pub mod types;

// ---------------------------------------------------------------------------
// Re-exports
// ---------------------------------------------------------------------------

pub use error::UrdfError;
pub use kinematics::{forward_kinematics, joint_motion, joint_transform};
pub use parser::{parse_file, parse_string};
pub use types::{
    Collision, Geometry, Inertial, JointData, JointDynamics, JointLimits, JointType, LinkData,
    Material, Origin, RobotModel, Visual,
};
