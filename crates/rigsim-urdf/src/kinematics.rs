//! Forward kinematics over the URDF tree.

use std::collections::HashMap;

use nalgebra::{Isometry3, Translation3, UnitQuaternion};

use crate::types::{JointData, JointType, RobotModel};

/// Motion of the child frame relative to the joint frame at position `q`.
///
/// Rotational joints turn about their axis, prismatic joints slide along it.
/// Every other joint type is rigid.
pub fn joint_motion(joint: &JointData, q: f32) -> Isometry3<f32> {
    let axis = joint.unit_axis();
    match joint.joint_type {
        JointType::Revolute | JointType::Continuous => Isometry3::from_parts(
            Translation3::identity(),
            UnitQuaternion::from_axis_angle(&axis, q),
        ),
        JointType::Prismatic => Isometry3::from_parts(
            Translation3::from(axis.into_inner() * q),
            UnitQuaternion::identity(),
        ),
        JointType::Fixed | JointType::Floating | JointType::Planar => Isometry3::identity(),
    }
}

/// Pose of the child link frame in the parent link frame.
pub fn joint_transform(joint: &JointData, q: f32) -> Isometry3<f32> {
    joint.origin.isometry() * joint_motion(joint, q)
}

/// World pose of every link given the root pose and joint positions.
///
/// Joints missing from `positions` are taken at zero.
pub fn forward_kinematics(
    model: &RobotModel,
    base: &Isometry3<f32>,
    positions: &HashMap<String, f32>,
) -> HashMap<String, Isometry3<f32>> {
    let mut poses = HashMap::with_capacity(model.links.len());
    poses.insert(model.root_link.clone(), *base);

    for joint in model.joints_tree_order() {
        let Some(parent) = poses.get(&joint.parent).copied() else {
            continue;
        };
        let q = positions.get(&joint.name).copied().unwrap_or(0.0);
        poses.insert(joint.child.clone(), parent * joint_transform(joint, q));
    }

    poses
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
