//! Proportional joint-position controller used by the arm scene.

use nalgebra::DVector;

use rigsim_control::{ControlBase, ControlError, RobotControl, RobotView};
use rigsim_core::config::{ControllerConfig, ControllerKind};

/// Gain of the arm scene's controller.
pub const DEFAULT_GAIN: f32 = 100.0;

/// `cmd = gain * (target - q)` on the actuated joints.
///
/// Unlike [`PdControl`](rigsim_control::PdControl) it activates on
/// configure without checking dimensions; a target of the wrong length
/// surfaces as an error on every step instead.
#[derive(Debug, Clone)]
pub struct PositionController {
    base: ControlBase,
    gain: f32,
}

impl PositionController {
    pub fn new(target: &[f32]) -> Self {
        Self::with_gain(target, DEFAULT_GAIN)
    }

    pub fn with_gain(target: &[f32], gain: f32) -> Self {
        Self {
            base: ControlBase::new(target, false),
            gain,
        }
    }

    pub const fn gain(&self) -> f32 {
        self.gain
    }

    pub const fn set_gain(&mut self, gain: f32) {
        self.gain = gain;
    }
}

impl RobotControl for PositionController {
    fn base(&self) -> &ControlBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ControlBase {
        &mut self.base
    }

    fn configure(&mut self) {
        self.base.set_active(true);
    }

    fn calculate(&mut self, _t: f64, view: &RobotView<'_>) -> Result<DVector<f32>, ControlError> {
        let target = self.base.parameters();
        let q = self.positions(view);
        if q.len() != target.len() {
            return Err(ControlError::DimensionMismatch {
                expected: target.len(),
                got: q.len(),
            });
        }
        Ok((target - q) * self.gain)
    }

    fn clone_control(&self) -> Box<dyn RobotControl> {
        Box::new(self.clone())
    }
}

/// Scene factory hook: claims `position` entries, leaves the rest to the
/// built-in controllers.
pub fn factory(config: &ControllerConfig) -> Option<Box<dyn RobotControl>> {
    if config.kind != ControllerKind::Position {
        return None;
    }
    Some(Box::new(PositionController::with_gain(
        &config.target,
        config.gain,
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names() -> Vec<String> {
        (0..4).map(|i| format!("arm_joint_{}", i + 1)).collect()
    }

    #[test]
    fn proportional_law() {
        let names = names();
        let q = DVector::from_vec(vec![0.0, 1.0, 0.0, 0.7]);
        let dq = DVector::from_element(4, 3.0);
        let view = RobotView::new(&names, &q, &dq);

        let mut ctrl = PositionController::new(&[0.0, 2.0, -0.5, 0.7]);
        ctrl.init(&view);
        assert!(ctrl.active());

        let cmd = ctrl.calculate(0.0, &view).unwrap();
        let expected = [0.0, 100.0, -50.0, 0.0];
        for (c, e) in cmd.iter().zip(expected) {
            assert!((c - e).abs() < 1e-4, "cmd = {cmd}");
        }
    }

    #[test]
    fn wrong_target_length_stays_active_but_fails() {
        let names = names();
        let q = DVector::zeros(4);
        let dq = DVector::zeros(4);
        let view = RobotView::new(&names, &q, &dq);

        let mut ctrl = PositionController::new(&[1.0, 2.0]);
        ctrl.init(&view);
        assert!(ctrl.active());
        assert_eq!(
            ctrl.calculate(0.0, &view).unwrap_err(),
            ControlError::DimensionMismatch {
                expected: 2,
                got: 4
            }
        );
    }

    #[test]
    fn passive_joints_are_skipped() {
        let names = names();
        let q = DVector::zeros(4);
        let dq = DVector::zeros(4);
        let actuated = [true, false, true, true];
        let view = RobotView::new(&names, &q, &dq).with_actuated(&actuated);

        let mut ctrl = PositionController::with_gain(&[1.0, 1.0, 1.0], 2.0);
        ctrl.init(&view);
        assert_eq!(ctrl.controlled_dofs(), &[0, 2, 3]);
        assert_eq!(ctrl.calculate(0.0, &view).unwrap().len(), 3);
    }

    #[test]
    fn factory_claims_position_only() {
        let mut config = ControllerConfig {
            kind: ControllerKind::Position,
            target: vec![0.0; 4],
            gain: 50.0,
            kd: None,
            weight: 1.0,
            full_control: false,
        };
        let ctrl = factory(&config).unwrap();
        let any: &dyn std::any::Any = &*ctrl;
        assert_eq!(any.downcast_ref::<PositionController>().unwrap().gain(), 50.0);

        config.kind = ControllerKind::Pd;
        assert!(factory(&config).is_none());
    }

    #[test]
    fn clones_are_independent() {
        let mut ctrl = PositionController::new(&[0.0]);
        let copy = ctrl.clone_control();
        ctrl.set_gain(1.0);
        let any: &dyn std::any::Any = &*copy;
        assert_eq!(
            any.downcast_ref::<PositionController>().unwrap().gain(),
            DEFAULT_GAIN
        );
    }
}
