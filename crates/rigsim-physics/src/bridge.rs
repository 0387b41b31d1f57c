//! URDF-to-Rapier bridge: converts a [`RobotModel`] into rapier rigid bodies,
//! colliders and impulse joints.

use std::collections::{HashMap, HashSet};

use bevy::log::{debug, warn};
use nalgebra::{Isometry3, Matrix3, Point3, Unit, UnitQuaternion, Vector3};
use rapier3d::prelude::{
    ColliderBuilder, GenericJoint, GenericJointBuilder, InteractionGroups, JointAxesMask,
    JointAxis, MassProperties, MotorModel, RigidBodyBuilder, RigidBodyHandle,
};

use rigsim_core::SimError;
use rigsim_urdf::{JointData, JointType, LinkData, RobotModel, forward_kinematics};

use crate::context::{JointRecord, RapierContext, RobotBodies};
use crate::shapes::geometry_shape;

/// Mass given to links without inertial data.
pub const FALLBACK_MASS: f32 = 1.0e-3;
/// Principal inertia given to links without inertial data.
pub const FALLBACK_INERTIA: f32 = 1.0e-6;

const LINK_FRICTION: f32 = 0.8;

// ---------------------------------------------------------------------------
// RobotSpec
// ---------------------------------------------------------------------------

/// How to place a robot in the world.
#[derive(Debug, Clone)]
pub struct RobotSpec {
    /// Unique name in the world.
    pub name: String,
    /// World pose of the root link.
    pub base_pose: Isometry3<f32>,
    /// Weld the root link to the world.
    pub fixed_base: bool,
    /// Initial joint positions by joint name. Missing joints start at zero.
    pub initial_positions: HashMap<String, f32>,
    /// Let the robot's own links collide with each other.
    pub self_collision: bool,
    /// Joints whose position limits are not enforced.
    pub unlimited_joints: HashSet<String>,
}

impl RobotSpec {
    /// Fixed base at the origin, zero configuration, no self-collision.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            base_pose: Isometry3::identity(),
            fixed_base: true,
            initial_positions: HashMap::new(),
            self_collision: false,
            unlimited_joints: HashSet::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// register_robot
// ---------------------------------------------------------------------------

/// Register a robot's links and joints with the rapier physics context.
///
/// Each link becomes a rigid body at its forward-kinematics pose for the
/// initial configuration. Links with inertial data use the URDF mass and
/// full inertia tensor, and their colliders carry no density.
pub fn register_robot(
    context: &mut RapierContext,
    model: &RobotModel,
    spec: &RobotSpec,
) -> Result<(), SimError> {
    if context.has_robot(&spec.name) {
        return Err(SimError::DuplicateRobot(spec.name.clone()));
    }

    let groups = context.next_robot_groups(spec.self_collision)?;
    let poses = forward_kinematics(model, &spec.base_pose, &spec.initial_positions);

    // 1. One rigid body per link, root first.
    let mut links = HashMap::with_capacity(model.links.len());
    for name in model.link_names() {
        let Some(link) = model.links.get(name) else {
            continue;
        };
        let Some(pose) = poses.get(name) else {
            warn!("Link '{name}' of '{}' is not connected to the root", spec.name);
            continue;
        };
        let is_root = name == model.root_link;
        let handle = insert_link(context, link, *pose, is_root && spec.fixed_base, groups);
        links.insert(name.to_string(), handle);
    }
    let root = links
        .get(&model.root_link)
        .copied()
        .ok_or_else(|| SimError::LinkNotFound(model.root_link.clone()))?;

    // 2. Joints in tree order.
    let mut joints = Vec::with_capacity(model.joints.len());
    for joint in model.joints_tree_order() {
        let (Some(&parent), Some(&child)) = (links.get(&joint.parent), links.get(&joint.child))
        else {
            continue;
        };
        let enforce_limits = !spec.unlimited_joints.contains(&joint.name);
        let Some(data) = build_joint(joint, enforce_limits) else {
            warn!(
                "Joint '{}' of type {:?} is not simulated, welding it",
                joint.name, joint.joint_type
            );
            let weld = fixed_joint(joint.origin.isometry());
            context.impulse_joint_set.insert(parent, child, weld, true);
            continue;
        };
        let handle = context.impulse_joint_set.insert(parent, child, data, true);
        joints.push(JointRecord {
            name: joint.name.clone(),
            kind: joint.joint_type,
            handle,
            parent,
            child,
            origin: joint.origin.isometry(),
            axis: joint.unit_axis(),
            dof: None,
        });
    }

    // 3. Degrees of freedom in declaration order.
    let mut dof_joints = Vec::with_capacity(model.dof());
    for (dof, name) in model.dof_names().into_iter().enumerate() {
        let index = joints
            .iter()
            .position(|j| j.name == name)
            .ok_or_else(|| SimError::UnknownDof(name.to_string()))?;
        joints[index].dof = Some(dof);
        dof_joints.push(index);
    }

    debug!(
        "Registered robot '{}': {} bodies, {} joints, {} dofs",
        spec.name,
        links.len(),
        joints.len(),
        dof_joints.len()
    );

    context.insert_robot(RobotBodies {
        name: spec.name.clone(),
        model: model.clone(),
        links,
        root,
        joints,
        dof_joints,
        fixed_base: spec.fixed_base,
        groups,
    });
    Ok(())
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn insert_link(
    context: &mut RapierContext,
    link: &LinkData,
    pose: Isometry3<f32>,
    fixed: bool,
    groups: InteractionGroups,
) -> RigidBodyHandle {
    let builder = if fixed {
        RigidBodyBuilder::fixed()
    } else {
        RigidBodyBuilder::dynamic()
    };
    let body = builder
        .position(pose)
        .can_sleep(false)
        .additional_mass_properties(link_mass(link))
        .build();
    let handle = context.rigid_body_set.insert(body);

    for collision in &link.collisions {
        let Some((shape, align)) = geometry_shape(&collision.geometry) else {
            continue;
        };
        let collider = ColliderBuilder::new(shape)
            .position(collision.origin.isometry() * align)
            .density(0.0)
            .friction(LINK_FRICTION)
            .collision_groups(groups)
            .build();
        context
            .collider_set
            .insert_with_parent(collider, handle, &mut context.rigid_body_set);
    }
    handle
}

/// Mass properties in the link frame. The inertia tensor is rotated out of
/// the inertial frame.
pub fn link_mass(link: &LinkData) -> MassProperties {
    let Some(inertial) = link.inertial.as_ref() else {
        return MassProperties::new(
            Point3::origin(),
            FALLBACK_MASS,
            Vector3::repeat(FALLBACK_INERTIA),
        );
    };

    let [ixx, ixy, ixz, iyy, iyz, izz] = inertial.inertia;
    let tensor = Matrix3::new(ixx, ixy, ixz, ixy, iyy, iyz, ixz, iyz, izz);
    let frame = inertial.origin.isometry();
    let rotation = frame.rotation.to_rotation_matrix();
    let in_link = rotation.matrix() * tensor * rotation.matrix().transpose();

    MassProperties::with_inertia_matrix(
        Point3::from(frame.translation.vector),
        inertial.mass,
        in_link,
    )
}

/// Rotation taking +x onto `axis`.
fn axis_alignment(axis: &Unit<Vector3<f32>>) -> UnitQuaternion<f32> {
    UnitQuaternion::rotation_between(&Vector3::x(), &axis.into_inner()).unwrap_or_else(|| {
        UnitQuaternion::from_axis_angle(&Vector3::z_axis(), std::f32::consts::PI)
    })
}

fn fixed_joint(origin: Isometry3<f32>) -> GenericJoint {
    GenericJointBuilder::new(JointAxesMask::LOCKED_FIXED_AXES)
        .local_frame1(origin)
        .local_frame2(Isometry3::identity())
        .contacts_enabled(false)
        .build()
}

/// Rapier joint for a URDF joint. Both joint frames put the URDF axis on
/// rapier's local x so the free axis is `AngX` or `LinX`.
fn build_joint(joint: &JointData, enforce_limits: bool) -> Option<GenericJoint> {
    let origin = joint.origin.isometry();
    if joint.joint_type == JointType::Fixed {
        return Some(fixed_joint(origin));
    }

    let (mask, axis) = match joint.joint_type {
        JointType::Revolute | JointType::Continuous => {
            (JointAxesMask::LOCKED_REVOLUTE_AXES, JointAxis::AngX)
        }
        JointType::Prismatic => (JointAxesMask::LOCKED_PRISMATIC_AXES, JointAxis::LinX),
        JointType::Fixed | JointType::Floating | JointType::Planar => return None,
    };

    let align = Isometry3::from_parts(
        Vector3::zeros().into(),
        axis_alignment(&joint.unit_axis()),
    );
    let mut builder = GenericJointBuilder::new(mask)
        .local_frame1(origin * align)
        .local_frame2(align)
        .contacts_enabled(false)
        .motor_model(axis, MotorModel::ForceBased);

    if enforce_limits
        && joint.joint_type != JointType::Continuous
        && let (Some(lower), Some(upper)) = (joint.limits.lower, joint.limits.upper)
    {
        builder = builder.limits(axis, [lower, upper]);
    }

    Some(builder.build())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use rapier3d::prelude::Group;

    use super::*;
    use crate::context::{FLOOR_GROUP, MAX_ROBOTS};
    use rigsim_test_utils::{arm_model, pendulum_model, slider_model};

    fn context() -> RapierContext {
        RapierContext::new(Vector3::new(0.0, 0.0, -9.81), 0.001)
    }

    #[test]
    fn arm_bodies_and_dofs() {
        let mut ctx = context();
        register_robot(&mut ctx, &arm_model(), &RobotSpec::new("arm")).unwrap();

        let arm = ctx.robot("arm").unwrap();
        assert_eq!(arm.links.len(), 6);
        assert_eq!(arm.joints.len(), 5);
        assert_eq!(arm.dof_joints.len(), 4);
        assert_eq!(arm.dof_joint(1).unwrap().name, "arm_joint_2");
        assert!(ctx.rigid_body_set[arm.root].is_fixed());
        assert_eq!(ctx.impulse_joint_set.len(), 5);
    }

    #[test]
    fn links_start_at_forward_kinematics_poses() {
        let mut ctx = context();
        register_robot(&mut ctx, &arm_model(), &RobotSpec::new("arm")).unwrap();
        // Straight up: 0.1 + 0.2 + 0.3 + 0.25 + 0.15
        let tip = ctx.link_pose("arm", "arm_link_5").unwrap();
        assert_relative_eq!(tip.translation.z, 1.0, epsilon = 1e-5);
        assert_relative_eq!(ctx.find_link("arm_link_5").unwrap(), tip);
    }

    #[test]
    fn base_pose_and_initial_positions_apply() {
        let mut ctx = context();
        let mut spec = RobotSpec::new("pendulum");
        spec.base_pose = Isometry3::translation(1.0, 0.0, 0.0);
        spec.initial_positions.insert("hinge".into(), std::f32::consts::FRAC_PI_2);
        register_robot(&mut ctx, &pendulum_model(), &spec).unwrap();

        let bob = ctx.link_pose("pendulum", "bob").unwrap();
        assert_relative_eq!(bob.translation.x, 1.0, epsilon = 1e-6);
        let com = bob * Point3::new(0.0, 0.0, -0.5);
        assert_relative_eq!(com.x, 0.5, epsilon = 1e-5);
        assert_relative_eq!(com.z, 1.0, epsilon = 1e-5);
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let mut ctx = context();
        register_robot(&mut ctx, &slider_model(), &RobotSpec::new("a")).unwrap();
        let err = register_robot(&mut ctx, &slider_model(), &RobotSpec::new("a")).unwrap_err();
        assert!(matches!(err, SimError::DuplicateRobot(name) if name == "a"));
    }

    #[test]
    fn free_base_is_dynamic() {
        let mut ctx = context();
        let mut spec = RobotSpec::new("slider");
        spec.fixed_base = false;
        register_robot(&mut ctx, &slider_model(), &spec).unwrap();
        let robot = ctx.robot("slider").unwrap();
        assert!(ctx.rigid_body_set[robot.root].is_dynamic());
    }

    #[test]
    fn urdf_mass_is_used() {
        let model = pendulum_model();
        let mass = link_mass(model.link("bob").unwrap());
        assert_relative_eq!(mass.mass(), 1.0);
        assert_relative_eq!(mass.local_com, Point3::new(0.0, 0.0, -0.5));

        let massless = link_mass(model.link("base").unwrap());
        assert_relative_eq!(massless.mass(), FALLBACK_MASS);
    }

    #[test]
    fn colliders_add_no_mass() {
        let mut ctx = context();
        register_robot(&mut ctx, &slider_model(), &RobotSpec::new("slider")).unwrap();
        // mass properties are refreshed from the colliders on the first step
        ctx.step();
        let robot = ctx.robot("slider").unwrap();
        // the carriage has a 10 cm box collider on top of its 2 kg inertial
        let carriage = &ctx.rigid_body_set[robot.links["carriage"]];
        assert_eq!(carriage.colliders().len(), 1);
        assert_relative_eq!(carriage.mass(), 2.0, epsilon = 1e-6);
    }

    #[test]
    fn remove_robot_clears_bodies() {
        let mut ctx = context();
        register_robot(&mut ctx, &arm_model(), &RobotSpec::new("arm")).unwrap();
        assert!(ctx.remove_robot("arm"));
        assert_eq!(ctx.rigid_body_set.len(), 0);
        assert_eq!(ctx.collider_set.len(), 0);
        assert_eq!(ctx.impulse_joint_set.len(), 0);
        assert_eq!(ctx.num_robots(), 0);
    }

    #[test]
    fn robot_count_is_bounded_by_group_bits() {
        let mut ctx = context();
        for i in 0..MAX_ROBOTS {
            register_robot(&mut ctx, &slider_model(), &RobotSpec::new(format!("s{i}"))).unwrap();
        }
        let err =
            register_robot(&mut ctx, &slider_model(), &RobotSpec::new("extra")).unwrap_err();
        assert!(matches!(err, SimError::TooManyRobots(MAX_ROBOTS)));

        // Removing a robot frees its bit for the next one
        let freed = ctx.robot("s7").unwrap().groups.memberships;
        assert!(ctx.remove_robot("s7"));
        register_robot(&mut ctx, &slider_model(), &RobotSpec::new("extra")).unwrap();
        assert_eq!(ctx.robot("extra").unwrap().groups.memberships, freed);

        let all = ctx
            .robot_names()
            .map(|n| ctx.robot(n).unwrap().groups.memberships)
            .fold(Group::empty(), |acc, g| {
                assert!(!acc.intersects(g));
                acc | g
            });
        assert!(!all.intersects(FLOOR_GROUP));
    }

    #[test]
    fn position_limits_can_be_dropped() {
        let model = slider_model();
        let rail = model.joint("rail_joint").unwrap();
        let limited = build_joint(rail, true).unwrap();
        let limits = limited.limits(JointAxis::LinX).unwrap();
        assert_relative_eq!(limits.min, -1.0);
        assert_relative_eq!(limits.max, 1.0);
        assert!(build_joint(rail, false).unwrap().limits(JointAxis::LinX).is_none());

        let mut ctx = context();
        let mut spec = RobotSpec::new("slider");
        spec.unlimited_joints.insert("rail_joint".into());
        register_robot(&mut ctx, &model, &spec).unwrap();
        let record = ctx.robot("slider").unwrap().dof_joint(0).unwrap();
        let joint = ctx.impulse_joint_set.get(record.handle).unwrap();
        assert!(joint.data.limits(JointAxis::LinX).is_none());
    }

    #[test]
    fn axis_alignment_maps_x() {
        for axis in [Vector3::y_axis(), Vector3::z_axis(), -Vector3::x_axis()] {
            let q = axis_alignment(&axis);
            assert_relative_eq!(q * Vector3::x(), axis.into_inner(), epsilon = 1e-6);
        }
    }
}
