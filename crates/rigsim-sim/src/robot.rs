//! Robot descriptions, assembled before a robot enters a simulation.

use std::collections::HashMap;
use std::path::Path;

use nalgebra::{Isometry3, Vector3, Vector6};

use rigsim_control::{ControlError, ControllerSet, RobotControl};
use rigsim_core::config::ActuatorType;
use rigsim_core::{ConfigError, SimError};
use rigsim_physics::bridge::RobotSpec;
use rigsim_physics::components::Actuation;
use rigsim_urdf::{
    Collision, Geometry, Inertial, LinkData, Material, Origin, RobotModel, UrdfError, Visual,
    parse_file, parse_string,
};

use crate::error::SimuError;

// ---------------------------------------------------------------------------
// Robot
// ---------------------------------------------------------------------------

/// A robot model together with where and how it is placed, its actuators
/// and its controllers.
///
/// # Example
///
/// ```
/// use rigsim_control::SimpleControl;
/// use rigsim_sim::Robot;
/// use rigsim_test_utils::ARM_URDF;
///
/// let mut robot = Robot::from_urdf_str(ARM_URDF, "arm").unwrap();
/// robot.fix_to_world();
/// robot.add_controller(SimpleControl::new(&[0.0; 4]), 1.0);
/// assert_eq!(robot.num_dofs(), 4);
/// assert_eq!(robot.controllers().len(), 1);
/// ```
#[derive(Debug, Clone)]
pub struct Robot {
    name: String,
    model: RobotModel,
    base_pose: Isometry3<f32>,
    fixed: bool,
    initial_positions: HashMap<String, f32>,
    actuation: Actuation,
    /// Per degree of freedom: keep the URDF position limits.
    position_enforced: Vec<bool>,
    controllers: ControllerSet,
    self_collision: bool,
}

impl Robot {
    /// Load a URDF file. The robot starts fixed to the world at the origin,
    /// torque controlled and without controllers.
    pub fn from_urdf(path: impl AsRef<Path>, name: impl Into<String>) -> Result<Self, UrdfError> {
        Ok(Self::from_model(parse_file(path)?, name))
    }

    pub fn from_urdf_str(xml: &str, name: impl Into<String>) -> Result<Self, UrdfError> {
        Ok(Self::from_model(parse_string(xml)?, name))
    }

    pub fn from_model(model: RobotModel, name: impl Into<String>) -> Self {
        let actuation = Actuation::from_model(&model, ActuatorType::default());
        Self {
            name: name.into(),
            position_enforced: vec![true; model.dof()],
            model,
            base_pose: Isometry3::identity(),
            fixed: true,
            initial_positions: HashMap::new(),
            actuation,
            controllers: ControllerSet::new(),
            self_collision: false,
        }
    }

    /// A free-floating box of `size` (full extents) with uniform density.
    ///
    /// `pose` is `[rx, ry, rz, x, y, z]`: a rotation vector followed by the
    /// position. Call [`fix_to_world`](Self::fix_to_world) to weld it.
    pub fn create_box(
        size: Vector3<f32>,
        pose: &Vector6<f32>,
        mass: f32,
        color: [f32; 4],
        name: impl Into<String>,
    ) -> Result<Self, SimuError> {
        let [x, y, z] = [size.x * size.x, size.y * size.y, size.z * size.z];
        let inertia = [mass * (y + z) / 12.0, mass * (x + z) / 12.0, mass * (x + y) / 12.0];
        let geometry = Geometry::Box { size: size.into() };
        Self::primitive(geometry, inertia, pose, mass, color, name.into())
    }

    /// A free-floating ellipsoid given by its three `diameters`. `pose` reads
    /// as in [`create_box`](Self::create_box).
    pub fn create_ellipsoid(
        diameters: Vector3<f32>,
        pose: &Vector6<f32>,
        mass: f32,
        color: [f32; 4],
        name: impl Into<String>,
    ) -> Result<Self, SimuError> {
        let r = diameters / 2.0;
        let [x, y, z] = [r.x * r.x, r.y * r.y, r.z * r.z];
        let inertia = [mass * (y + z) / 5.0, mass * (x + z) / 5.0, mass * (x + y) / 5.0];
        let geometry = Geometry::Ellipsoid {
            diameters: diameters.into(),
        };
        Self::primitive(geometry, inertia, pose, mass, color, name.into())
    }

    /// One-link robot whose link is named after the robot.
    fn primitive(
        geometry: Geometry,
        [ixx, iyy, izz]: [f32; 3],
        pose: &Vector6<f32>,
        mass: f32,
        color: [f32; 4],
        name: String,
    ) -> Result<Self, SimuError> {
        geometry.validate()?;
        if !(mass.is_finite() && mass > 0.0) {
            return Err(ConfigError::InvalidValue {
                field: "mass".into(),
                message: format!("{mass} kg is not a positive mass"),
            }
            .into());
        }

        let mut link = LinkData::new(name.clone());
        link.inertial = Some(Inertial {
            origin: Origin::default(),
            mass,
            inertia: [ixx, 0.0, 0.0, iyy, 0.0, izz],
        });
        link.visuals.push(Visual {
            origin: Origin::default(),
            geometry: geometry.clone(),
            material: Some(Material {
                name: String::new(),
                color: Some(color),
            }),
        });
        link.collisions.push(Collision {
            origin: Origin::default(),
            geometry,
        });
        let model = RobotModel {
            name: name.clone(),
            links: HashMap::from([(name.clone(), link)]),
            joints: HashMap::new(),
            joint_order: Vec::new(),
            materials: HashMap::new(),
            root_link: name.clone(),
        };

        let mut robot = Self::from_model(model, name);
        robot.free_from_world(pose_from_vector(pose));
        Ok(robot)
    }

    // -- Placement --

    /// Weld the root link to the world.
    pub fn fix_to_world(&mut self) {
        self.fixed = true;
    }

    /// Let the root link move freely, starting at `pose`.
    pub fn free_from_world(&mut self, pose: Isometry3<f32>) {
        self.fixed = false;
        self.base_pose = pose;
    }

    pub const fn fixed(&self) -> bool {
        self.fixed
    }

    pub const fn free(&self) -> bool {
        !self.fixed
    }

    pub fn set_base_pose(&mut self, pose: Isometry3<f32>) {
        self.base_pose = pose;
    }

    pub const fn base_pose(&self) -> &Isometry3<f32> {
        &self.base_pose
    }

    pub const fn set_self_collision(&mut self, enable: bool) {
        self.self_collision = enable;
    }

    pub const fn self_collision(&self) -> bool {
        self.self_collision
    }

    // -- Controllers --

    pub fn add_controller<C: RobotControl>(&mut self, controller: C, weight: f32) {
        self.controllers.add(Box::new(controller), weight);
    }

    pub fn add_boxed_controller(&mut self, controller: Box<dyn RobotControl>, weight: f32) {
        self.controllers.add(controller, weight);
    }

    pub const fn controllers(&self) -> &ControllerSet {
        &self.controllers
    }

    pub const fn controllers_mut(&mut self) -> &mut ControllerSet {
        &mut self.controllers
    }

    // -- Actuators --

    pub fn set_actuator_types(&mut self, actuator: ActuatorType) {
        self.actuation.set_all(actuator);
    }

    /// Change the actuator of one degree of freedom, by joint name.
    pub fn set_actuator_type(&mut self, dof: &str, actuator: ActuatorType) -> Result<(), SimError> {
        let index = self
            .dof_index(dof)
            .ok_or_else(|| SimError::UnknownDof(dof.to_string()))?;
        self.actuation.set(index, actuator);
        Ok(())
    }

    pub const fn actuation(&self) -> &Actuation {
        &self.actuation
    }

    // -- Joint dynamics --

    /// Viscous damping per degree of freedom. An empty `dof_names`
    /// addresses every degree of freedom in order.
    pub fn set_damping_coeffs(
        &mut self,
        values: &[f32],
        dof_names: &[&str],
    ) -> Result<(), SimuError> {
        let indices = self.dof_indices(values.len(), dof_names)?;
        scatter(&mut self.actuation.damping, &indices, values);
        Ok(())
    }

    pub fn damping_coeffs(&self) -> &[f32] {
        &self.actuation.damping
    }

    /// Coulomb friction per degree of freedom, addressed like
    /// [`set_damping_coeffs`](Self::set_damping_coeffs).
    pub fn set_coulomb_coeffs(
        &mut self,
        values: &[f32],
        dof_names: &[&str],
    ) -> Result<(), SimuError> {
        let indices = self.dof_indices(values.len(), dof_names)?;
        scatter(&mut self.actuation.friction, &indices, values);
        Ok(())
    }

    pub fn coulomb_coeffs(&self) -> &[f32] {
        &self.actuation.friction
    }

    /// Stiffness of a spring pulling each joint back to zero.
    pub fn set_spring_stiffnesses(
        &mut self,
        values: &[f32],
        dof_names: &[&str],
    ) -> Result<(), SimuError> {
        let indices = self.dof_indices(values.len(), dof_names)?;
        scatter(&mut self.actuation.stiffness, &indices, values);
        Ok(())
    }

    pub fn spring_stiffnesses(&self) -> &[f32] {
        &self.actuation.stiffness
    }

    /// Whether the URDF position limits of each degree of freedom are
    /// enforced. Continuous joints have no limits either way.
    pub fn set_position_enforced(
        &mut self,
        values: &[bool],
        dof_names: &[&str],
    ) -> Result<(), SimuError> {
        let indices = self.dof_indices(values.len(), dof_names)?;
        scatter(&mut self.position_enforced, &indices, values);
        Ok(())
    }

    pub fn position_enforced(&self) -> &[bool] {
        &self.position_enforced
    }

    // -- Configuration --

    /// Initial joint positions. An empty `dof_names` addresses every degree
    /// of freedom in order.
    pub fn set_positions(&mut self, values: &[f32], dof_names: &[&str]) -> Result<(), SimuError> {
        let indices = self.dof_indices(values.len(), dof_names)?;
        let names = self.model.dof_names();
        for (index, &value) in indices.into_iter().zip(values) {
            self.initial_positions.insert(names[index].to_string(), value);
        }
        Ok(())
    }

    /// Indices addressed by `dof_names` (every degree of freedom when
    /// empty), checked against `count` values. Nothing is returned unless
    /// every name is known.
    fn dof_indices(&self, count: usize, dof_names: &[&str]) -> Result<Vec<usize>, SimuError> {
        let indices: Vec<usize> = if dof_names.is_empty() {
            (0..self.num_dofs()).collect()
        } else {
            dof_names
                .iter()
                .map(|name| {
                    self.dof_index(name)
                        .ok_or_else(|| SimError::UnknownDof((*name).to_string()))
                })
                .collect::<Result<_, _>>()?
        };
        if indices.len() != count {
            return Err(ControlError::DimensionMismatch {
                expected: indices.len(),
                got: count,
            }
            .into());
        }
        Ok(indices)
    }

    pub const fn initial_positions(&self) -> &HashMap<String, f32> {
        &self.initial_positions
    }

    // -- Model queries --

    pub fn name(&self) -> &str {
        &self.name
    }

    pub const fn model(&self) -> &RobotModel {
        &self.model
    }

    pub fn dof_names(&self) -> Vec<&str> {
        self.model.dof_names()
    }

    pub fn link_names(&self) -> Vec<&str> {
        self.model.link_names()
    }

    pub fn num_dofs(&self) -> usize {
        self.model.dof()
    }

    fn dof_index(&self, name: &str) -> Option<usize> {
        self.model.dof_names().iter().position(|n| *n == name)
    }

    /// Placement handed to the physics bridge.
    pub(crate) fn spec(&self) -> RobotSpec {
        RobotSpec {
            name: self.name.clone(),
            base_pose: self.base_pose,
            fixed_base: self.fixed,
            initial_positions: self.initial_positions.clone(),
            self_collision: self.self_collision,
            unlimited_joints: self
                .model
                .dof_names()
                .into_iter()
                .zip(&self.position_enforced)
                .filter(|(_, enforced)| !**enforced)
                .map(|(name, _)| name.to_string())
                .collect(),
        }
    }

    pub(crate) fn into_parts(self) -> (RobotModel, Actuation, ControllerSet) {
        (self.model, self.actuation, self.controllers)
    }
}

fn scatter<T: Copy>(target: &mut [T], indices: &[usize], values: &[T]) {
    for (&index, &value) in indices.iter().zip(values) {
        target[index] = value;
    }
}

/// Pose from `[rx, ry, rz, x, y, z]`: a rotation vector, then the position.
pub fn pose_from_vector(pose: &Vector6<f32>) -> Isometry3<f32> {
    Isometry3::new(
        Vector3::new(pose[3], pose[4], pose[5]),
        Vector3::new(pose[0], pose[1], pose[2]),
    )
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
