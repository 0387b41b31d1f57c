//! Per-robot ECS components.
//!
//! Every simulated robot is one entity carrying [`RobotId`],
//! [`JointStates`], [`JointCommands`] and [`Actuation`]. All vectors are
//! indexed by degree of freedom in the model's declaration order.

use bevy::prelude::*;
use nalgebra::DVector;

use rigsim_control::RobotView;
use rigsim_core::config::ActuatorType;
use rigsim_urdf::RobotModel;

// ---------------------------------------------------------------------------
// RobotId
// ---------------------------------------------------------------------------

/// Unique robot name, the key into [`RapierContext`](crate::context::RapierContext).
#[derive(Component, Debug, Clone, PartialEq, Eq, Hash)]
pub struct RobotId(pub String);

// ---------------------------------------------------------------------------
// JointStates
// ---------------------------------------------------------------------------

/// Measured joint positions and velocities, written after every physics step.
#[derive(Component, Debug, Clone, Default)]
pub struct JointStates {
    pub names: Vec<String>,
    pub positions: DVector<f32>,
    pub velocities: DVector<f32>,
}

impl JointStates {
    /// Zero state for the model's degrees of freedom.
    pub fn for_model(model: &RobotModel) -> Self {
        let names: Vec<String> = model.dof_names().into_iter().map(String::from).collect();
        let n = names.len();
        Self {
            names,
            positions: DVector::zeros(n),
            velocities: DVector::zeros(n),
        }
    }

    pub fn dofs(&self) -> usize {
        self.names.len()
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }

    /// Controller view over this state, restricted by the actuation mask.
    pub fn view<'a>(&'a self, actuation: &'a Actuation) -> RobotView<'a> {
        RobotView::new(&self.names, &self.positions, &self.velocities)
            .with_actuated(&actuation.actuated)
    }
}

// ---------------------------------------------------------------------------
// JointCommands
// ---------------------------------------------------------------------------

/// Commands for the next physics step: torques (forces for prismatic
/// joints) or, for servo joints, velocities.
#[derive(Component, Debug, Clone, Default)]
pub struct JointCommands(pub DVector<f32>);

impl JointCommands {
    pub fn zeros(n: usize) -> Self {
        Self(DVector::zeros(n))
    }

    pub fn reset(&mut self) {
        self.0.fill(0.0);
    }
}

// ---------------------------------------------------------------------------
// Actuation
// ---------------------------------------------------------------------------

/// Actuator type and joint dynamics of every degree of freedom.
#[derive(Component, Debug, Clone, Default)]
pub struct Actuation {
    pub types: Vec<ActuatorType>,
    /// Viscous damping (Nm s/rad or N s/m).
    pub damping: Vec<f32>,
    /// Coulomb friction (Nm or N).
    pub friction: Vec<f32>,
    /// Spring stiffness pulling the joint back to zero (Nm/rad or N/m).
    pub stiffness: Vec<f32>,
    /// Effort limit. Zero means unlimited.
    pub effort: Vec<f32>,
    actuated: Vec<bool>,
}

impl Actuation {
    /// Dynamics from the URDF, every joint using `actuator`.
    pub fn from_model(model: &RobotModel, actuator: ActuatorType) -> Self {
        let joints: Vec<_> = model.actuated_joints().collect();
        let mut actuation = Self {
            types: vec![actuator; joints.len()],
            damping: joints.iter().map(|j| j.dynamics.damping).collect(),
            friction: joints.iter().map(|j| j.dynamics.friction).collect(),
            stiffness: vec![0.0; joints.len()],
            effort: joints.iter().map(|j| j.limits.effort.max(0.0)).collect(),
            actuated: Vec::new(),
        };
        actuation.refresh_mask();
        actuation
    }

    pub fn dofs(&self) -> usize {
        self.types.len()
    }

    pub fn set_all(&mut self, actuator: ActuatorType) {
        self.types.fill(actuator);
        self.refresh_mask();
    }

    /// Change one joint's actuator. Returns `false` for an out-of-range dof.
    pub fn set(&mut self, dof: usize, actuator: ActuatorType) -> bool {
        let Some(slot) = self.types.get_mut(dof) else {
            return false;
        };
        *slot = actuator;
        self.refresh_mask();
        true
    }

    /// Which degrees of freedom accept commands.
    pub fn actuated(&self) -> &[bool] {
        &self.actuated
    }

    fn refresh_mask(&mut self) {
        self.actuated = self
            .types
            .iter()
            .map(|t| matches!(t, ActuatorType::Torque | ActuatorType::Servo))
            .collect();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use rigsim_test_utils::arm_model;

    fn assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn components_are_send_sync() {
        assert_send_sync::<RobotId>();
        assert_send_sync::<JointStates>();
        assert_send_sync::<JointCommands>();
        assert_send_sync::<Actuation>();
    }

    #[test]
    fn states_follow_dof_order() {
        let states = JointStates::for_model(&arm_model());
        assert_eq!(states.dofs(), 4);
        assert_eq!(states.index_of("arm_joint_3"), Some(2));
        assert_eq!(states.index_of("arm_joint_5"), None);
    }

    #[test]
    fn actuation_reads_urdf_dynamics() {
        let actuation = Actuation::from_model(&arm_model(), ActuatorType::Torque);
        assert_eq!(actuation.dofs(), 4);
        assert!((actuation.damping[0] - 0.5).abs() < f32::EPSILON);
        assert!((actuation.effort[3] - 50.0).abs() < f32::EPSILON);
        assert_eq!(actuation.stiffness, vec![0.0; 4]);
        assert!(actuation.actuated().iter().all(|&a| a));
    }

    #[test]
    fn passive_and_locked_joints_are_not_actuated() {
        let mut actuation = Actuation::from_model(&arm_model(), ActuatorType::Servo);
        assert!(actuation.set(1, ActuatorType::Passive));
        assert!(actuation.set(2, ActuatorType::Locked));
        assert!(!actuation.set(9, ActuatorType::Locked));
        assert_eq!(actuation.actuated(), &[true, false, false, true]);
    }

    #[test]
    fn view_carries_mask() {
        let model = arm_model();
        let states = JointStates::for_model(&model);
        let mut actuation = Actuation::from_model(&model, ActuatorType::Torque);
        actuation.set_all(ActuatorType::Passive);
        let view = states.view(&actuation);
        assert_eq!(view.dofs(), 4);
        assert!(!view.is_actuated(0));
    }

    #[test]
    fn commands_reset_to_zero() {
        let mut cmd = JointCommands(DVector::from_vec(vec![1.0, 2.0]));
        cmd.reset();
        assert_eq!(cmd.0, DVector::zeros(2));
    }
}
