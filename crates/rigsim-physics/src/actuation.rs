//! Turning joint commands into rapier joint motor settings.
//!
//! Torque-driven and passive joints use a force-based motor with a huge
//! target velocity whose force is capped at the desired torque, so rapier
//! applies exactly that torque along the joint axis. Servo and locked joints
//! use the motor as a velocity tracker and ignore the passive terms
//! (damping, Coulomb friction and spring).

use rapier3d::prelude::{GenericJoint, JointAxis};

use rigsim_core::config::ActuatorType;

/// Velocity scale of the smooth Coulomb friction term (rad/s or m/s).
pub const FRICTION_VELOCITY: f32 = 0.01;

/// Damping gain of the velocity motor used by servo and locked joints.
pub const SERVO_GAIN: f32 = 1.0e3;

/// Target velocity of the torque motor. Only its sign matters.
const TORQUE_MOTOR_VELOCITY: f32 = 1.0e10;

/// Joint dynamics and command for one degree of freedom.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JointDrive {
    pub actuator: ActuatorType,
    /// Torque, force or velocity, depending on `actuator`.
    pub command: f32,
    /// Current joint position, the spring's deflection.
    pub position: f32,
    /// Current joint velocity.
    pub velocity: f32,
    pub damping: f32,
    pub friction: f32,
    pub stiffness: f32,
    /// Zero means unlimited.
    pub effort: f32,
}

impl JointDrive {
    /// Net generalized force for torque and passive joints: the (clamped)
    /// command plus viscous damping, smooth Coulomb friction and the spring.
    pub fn net_effort(&self) -> f32 {
        let command = match self.actuator {
            ActuatorType::Torque => clamp_effort(self.command, self.effort),
            ActuatorType::Servo | ActuatorType::Passive | ActuatorType::Locked => 0.0,
        };
        command + joint_friction(self.damping, self.friction, self.velocity)
            - self.stiffness * self.position
    }

    /// Program the motor of `joint` along `axis`.
    pub fn apply(&self, joint: &mut GenericJoint, axis: JointAxis) {
        match self.actuator {
            ActuatorType::Torque | ActuatorType::Passive => {
                set_torque(joint, axis, self.net_effort());
            }
            ActuatorType::Servo => {
                joint.set_motor_velocity(axis, self.command, SERVO_GAIN);
                joint.set_motor_max_force(axis, limit_or_max(self.effort));
            }
            ActuatorType::Locked => {
                joint.set_motor_velocity(axis, 0.0, SERVO_GAIN);
                joint.set_motor_max_force(axis, f32::MAX);
            }
        }
    }
}

/// Viscous damping plus a `tanh`-smoothed Coulomb term, both opposing
/// `velocity`.
pub fn joint_friction(damping: f32, coulomb: f32, velocity: f32) -> f32 {
    let v_norm = velocity / FRICTION_VELOCITY;
    (-coulomb).mul_add(v_norm.tanh(), -(damping * velocity))
}

/// Clamp to `[-effort, effort]`. A non-positive limit leaves `value` as is.
pub fn clamp_effort(value: f32, effort: f32) -> f32 {
    if effort > 0.0 {
        value.clamp(-effort, effort)
    } else {
        value
    }
}

fn limit_or_max(effort: f32) -> f32 {
    if effort > 0.0 { effort } else { f32::MAX }
}

fn set_torque(joint: &mut GenericJoint, axis: JointAxis, torque: f32) {
    if torque.abs() > 1e-10 {
        joint.set_motor(axis, 0.0, torque.signum() * TORQUE_MOTOR_VELOCITY, 0.0, 1.0);
        joint.set_motor_max_force(axis, torque.abs());
    } else {
        joint.set_motor(axis, 0.0, 0.0, 0.0, 0.0);
        joint.set_motor_max_force(axis, 0.0);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
