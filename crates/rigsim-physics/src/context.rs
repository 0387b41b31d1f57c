//! Bevy resource wrapping all rapier3d pipeline state.

use std::collections::HashMap;
use std::f32::consts::{PI, TAU};

use bevy::prelude::Resource;
use nalgebra::{Isometry3, Unit, Vector3};
use rapier3d::prelude::{
    BroadPhaseMultiSap, CCDSolver, ColliderSet, Group, ImpulseJointHandle, ImpulseJointSet,
    IntegrationParameters, InteractionGroups, IslandManager, JointAxis, MultibodyJointSet,
    NarrowPhase, PhysicsPipeline, QueryPipeline, RigidBodyHandle, RigidBodySet,
};

use rigsim_core::SimError;
use rigsim_urdf::{JointType, RobotModel, forward_kinematics};

use crate::actuation::JointDrive;
use crate::components::{Actuation, JointCommands, JointStates};

/// Collision group of floors. Robots take the remaining bits in turn.
pub const FLOOR_GROUP: Group = Group::GROUP_1;

/// Robots that can share one world: one collision group bit each, the floor
/// bit excluded.
pub const MAX_ROBOTS: usize = 31;

// ---------------------------------------------------------------------------
// JointRecord
// ---------------------------------------------------------------------------

/// A URDF joint as built in rapier.
#[derive(Debug, Clone)]
pub struct JointRecord {
    pub name: String,
    pub kind: JointType,
    pub handle: ImpulseJointHandle,
    pub parent: RigidBodyHandle,
    pub child: RigidBodyHandle,
    /// Joint frame in the parent link frame.
    pub origin: Isometry3<f32>,
    /// Unit axis in the joint frame.
    pub axis: Unit<Vector3<f32>>,
    /// Degree-of-freedom index for actuated joints.
    pub dof: Option<usize>,
}

impl JointRecord {
    /// Rapier axis carrying this joint's free motion.
    pub const fn motor_axis(&self) -> JointAxis {
        match self.kind {
            JointType::Prismatic => JointAxis::LinX,
            _ => JointAxis::AngX,
        }
    }

    /// Joint position and velocity measured from the two bodies.
    ///
    /// Rotational joints report the angle in `[-pi, pi)` of the child about
    /// the axis, relative to the joint frame. Prismatic joints report the
    /// displacement along the axis.
    pub fn measure(&self, bodies: &RigidBodySet) -> Option<(f32, f32)> {
        let parent = bodies.get(self.parent)?;
        let child = bodies.get(self.child)?;

        let frame = parent.position() * self.origin;
        let relative = frame.inverse() * child.position();
        let world_axis = frame.rotation * self.axis.into_inner();

        if self.kind == JointType::Prismatic {
            let position = relative.translation.vector.dot(&self.axis.into_inner());
            let velocity = (child.linvel() - parent.linvel()).dot(&world_axis);
            Some((position, velocity))
        } else {
            let rotation = relative.rotation;
            let sin_half = rotation.imag().dot(&self.axis.into_inner());
            let position = 2.0 * f32::atan2(sin_half, rotation.w);
            let velocity = (child.angvel() - parent.angvel()).dot(&world_axis);
            Some((wrap_angle(position), velocity))
        }
    }
}

/// Wrap an angle into `[-pi, pi)`.
pub fn wrap_angle(angle: f32) -> f32 {
    (angle + PI).rem_euclid(TAU) - PI
}

// ---------------------------------------------------------------------------
// RobotBodies
// ---------------------------------------------------------------------------

/// Rapier handles of one registered robot.
#[derive(Debug, Clone)]
pub struct RobotBodies {
    pub name: String,
    pub model: RobotModel,
    /// Link name to body.
    pub links: HashMap<String, RigidBodyHandle>,
    pub root: RigidBodyHandle,
    /// Joints in tree order (parents before children).
    pub joints: Vec<JointRecord>,
    /// Index into `joints` for each degree of freedom.
    pub dof_joints: Vec<usize>,
    pub fixed_base: bool,
    pub groups: InteractionGroups,
}

impl RobotBodies {
    pub fn dof_joint(&self, dof: usize) -> Option<&JointRecord> {
        self.dof_joints.get(dof).and_then(|&j| self.joints.get(j))
    }
}

// ---------------------------------------------------------------------------
// RapierContext
// ---------------------------------------------------------------------------

/// All rapier state in a single Bevy resource.
///
/// `PhysicsPipeline::step()` requires mutable access to every set
/// simultaneously, so they must all live together.
#[derive(Resource)]
pub struct RapierContext {
    // -- Rapier sets --
    pub rigid_body_set: RigidBodySet,
    pub collider_set: ColliderSet,
    pub impulse_joint_set: ImpulseJointSet,
    pub multibody_joint_set: MultibodyJointSet,

    // -- Pipeline objects --
    pub physics_pipeline: PhysicsPipeline,
    pub island_manager: IslandManager,
    pub broad_phase: BroadPhaseMultiSap,
    pub narrow_phase: NarrowPhase,
    pub ccd_solver: CCDSolver,
    pub query_pipeline: QueryPipeline,

    // -- Parameters --
    pub integration_parameters: IntegrationParameters,
    pub gravity: Vector3<f32>,

    // -- Registered objects --
    robots: Vec<RobotBodies>,
    floors: HashMap<String, RigidBodyHandle>,
    next_group: u32,
}

impl RapierContext {
    /// Create an empty world with the given gravity and timestep.
    pub fn new(gravity: Vector3<f32>, dt: f32) -> Self {
        let integration_parameters = IntegrationParameters {
            dt,
            ..IntegrationParameters::default()
        };

        Self {
            rigid_body_set: RigidBodySet::new(),
            collider_set: ColliderSet::new(),
            impulse_joint_set: ImpulseJointSet::new(),
            multibody_joint_set: MultibodyJointSet::new(),
            physics_pipeline: PhysicsPipeline::new(),
            island_manager: IslandManager::new(),
            broad_phase: BroadPhaseMultiSap::new(),
            narrow_phase: NarrowPhase::new(),
            ccd_solver: CCDSolver::new(),
            query_pipeline: QueryPipeline::new(),
            integration_parameters,
            gravity,
            robots: Vec::new(),
            floors: HashMap::new(),
            next_group: 0,
        }
    }

    pub const fn dt(&self) -> f32 {
        self.integration_parameters.dt
    }

    /// Run one physics step.
    pub fn step(&mut self) {
        self.physics_pipeline.step(
            &self.gravity,
            &self.integration_parameters,
            &mut self.island_manager,
            &mut self.broad_phase,
            &mut self.narrow_phase,
            &mut self.rigid_body_set,
            &mut self.collider_set,
            &mut self.impulse_joint_set,
            &mut self.multibody_joint_set,
            &mut self.ccd_solver,
            Some(&mut self.query_pipeline),
            &(),
            &(),
        );
    }

    // -- Robots --

    /// Collision groups for the next robot. Each robot owns one group bit
    /// that no registered robot holds; without self-collision its links
    /// ignore that bit. Bits of removed robots are reused.
    pub fn next_robot_groups(
        &mut self,
        self_collision: bool,
    ) -> Result<InteractionGroups, SimError> {
        const SLOTS: u32 = MAX_ROBOTS as u32;
        let in_use = self
            .robots
            .iter()
            .fold(Group::empty(), |used, r| used | r.groups.memberships);
        let bit = (0..SLOTS)
            .map(|i| Group::from_bits_truncate(1 << (1 + (self.next_group + i) % SLOTS)))
            .find(|bit| !in_use.intersects(*bit))
            .ok_or(SimError::TooManyRobots(MAX_ROBOTS))?;
        // bit index is 1 + slot, so the slot after it is `trailing_zeros`
        self.next_group = bit.bits().trailing_zeros() % SLOTS;
        let filter = if self_collision {
            Group::ALL
        } else {
            Group::ALL.difference(bit)
        };
        Ok(InteractionGroups::new(bit, filter))
    }

    pub(crate) fn insert_robot(&mut self, bodies: RobotBodies) {
        self.robots.push(bodies);
    }

    pub fn robot(&self, name: &str) -> Option<&RobotBodies> {
        self.robots.iter().find(|r| r.name == name)
    }

    pub fn has_robot(&self, name: &str) -> bool {
        self.robot(name).is_some()
    }

    /// Robot names in registration order.
    pub fn robot_names(&self) -> impl Iterator<Item = &str> {
        self.robots.iter().map(|r| r.name.as_str())
    }

    pub fn num_robots(&self) -> usize {
        self.robots.len()
    }

    /// Remove a robot's bodies, colliders and joints. Returns `false` when
    /// no robot has that name.
    pub fn remove_robot(&mut self, name: &str) -> bool {
        let Some(index) = self.robots.iter().position(|r| r.name == name) else {
            return false;
        };
        let robot = self.robots.remove(index);
        for handle in robot.links.into_values() {
            self.remove_body(handle);
        }
        true
    }

    fn remove_body(&mut self, handle: RigidBodyHandle) {
        self.rigid_body_set.remove(
            handle,
            &mut self.island_manager,
            &mut self.collider_set,
            &mut self.impulse_joint_set,
            &mut self.multibody_joint_set,
            true,
        );
    }

    // -- Floors --

    pub(crate) fn insert_floor(&mut self, name: String, handle: RigidBodyHandle) {
        if let Some(previous) = self.floors.insert(name, handle) {
            self.remove_body(previous);
        }
    }

    pub fn floor(&self, name: &str) -> Option<RigidBodyHandle> {
        self.floors.get(name).copied()
    }

    pub fn remove_floor(&mut self, name: &str) -> bool {
        match self.floors.remove(name) {
            Some(handle) => {
                self.remove_body(handle);
                true
            }
            None => false,
        }
    }

    // -- Poses --

    /// World pose of a robot link.
    pub fn link_pose(&self, robot: &str, link: &str) -> Option<Isometry3<f32>> {
        let handle = self.robot(robot)?.links.get(link)?;
        self.rigid_body_set.get(*handle).map(|b| *b.position())
    }

    /// World pose of `link` on the first registered robot that has it.
    pub fn find_link(&self, link: &str) -> Option<Isometry3<f32>> {
        self.robots
            .iter()
            .find_map(|r| r.links.get(link))
            .and_then(|&h| self.rigid_body_set.get(h))
            .map(|b| *b.position())
    }

    /// Pose of any body by handle.
    pub fn body_pose(&self, handle: RigidBodyHandle) -> Option<Isometry3<f32>> {
        self.rigid_body_set.get(handle).map(|b| *b.position())
    }

    /// Whether any body pose or velocity became non-finite.
    pub fn has_diverged(&self) -> bool {
        self.rigid_body_set.iter().any(|(_, body)| {
            let pose = body.position();
            !(pose.translation.vector.iter().all(|v| v.is_finite())
                && pose.rotation.coords.iter().all(|v| v.is_finite())
                && body.linvel().iter().all(|v| v.is_finite())
                && body.angvel().iter().all(|v| v.is_finite()))
        })
    }

    /// Move every link of `robot` to the configuration `positions` (by
    /// joint name, missing joints at zero) and stop all motion. The base
    /// keeps its current pose.
    pub fn teleport(&mut self, robot: &str, positions: &HashMap<String, f32>) -> bool {
        let Some(bodies) = self.robots.iter().find(|r| r.name == robot) else {
            return false;
        };
        let Some(base) = self.rigid_body_set.get(bodies.root).map(|b| *b.position()) else {
            return false;
        };

        let poses = forward_kinematics(&bodies.model, &base, positions);
        for (link, pose) in poses {
            let Some(&handle) = bodies.links.get(&link) else {
                continue;
            };
            if let Some(body) = self.rigid_body_set.get_mut(handle) {
                body.set_position(pose, true);
                body.set_linvel(Vector3::zeros(), true);
                body.set_angvel(Vector3::zeros(), true);
            }
        }
        true
    }

    // -- Joint I/O --

    /// Program every joint motor of `robot` from its commands and actuators.
    pub fn apply_actuation(
        &mut self,
        robot: &str,
        commands: &JointCommands,
        actuation: &Actuation,
        states: &JointStates,
    ) {
        let Some(bodies) = self.robots.iter().find(|r| r.name == robot) else {
            return;
        };

        for (dof, &joint_index) in bodies.dof_joints.iter().enumerate() {
            let record = &bodies.joints[joint_index];
            let drive = JointDrive {
                actuator: actuation.types.get(dof).copied().unwrap_or_default(),
                command: commands.0.get(dof).copied().unwrap_or(0.0),
                position: states.positions.get(dof).copied().unwrap_or(0.0),
                velocity: states.velocities.get(dof).copied().unwrap_or(0.0),
                damping: actuation.damping.get(dof).copied().unwrap_or(0.0),
                friction: actuation.friction.get(dof).copied().unwrap_or(0.0),
                stiffness: actuation.stiffness.get(dof).copied().unwrap_or(0.0),
                effort: actuation.effort.get(dof).copied().unwrap_or(0.0),
            };
            if let Some(joint) = self.impulse_joint_set.get_mut(record.handle, true) {
                drive.apply(&mut joint.data, record.motor_axis());
            }
        }
    }

    /// Measure joint positions and velocities of `robot` into `states`.
    ///
    /// Continuous joints are unwrapped against the previous position so
    /// they can turn past `pi`.
    pub fn read_joint_states(&self, robot: &str, states: &mut JointStates) -> bool {
        let Some(bodies) = self.robot(robot) else {
            return false;
        };

        for (dof, &joint_index) in bodies.dof_joints.iter().enumerate() {
            let record = &bodies.joints[joint_index];
            let Some((raw, velocity)) = record.measure(&self.rigid_body_set) else {
                continue;
            };
            let (Some(position), Some(speed)) =
                (states.positions.get_mut(dof), states.velocities.get_mut(dof))
            else {
                continue;
            };
            *position = if record.kind == JointType::Continuous {
                *position + wrap_angle(raw - *position)
            } else {
                raw
            };
            *speed = velocity;
        }
        true
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
