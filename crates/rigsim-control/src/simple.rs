use nalgebra::DVector;

use crate::control::{ControlBase, RobotControl};
use crate::error::ControlError;
use crate::view::RobotView;

/// Feed-forward controller returning its parameters as the command.
#[derive(Debug, Clone)]
pub struct SimpleControl {
    base: ControlBase,
}

impl SimpleControl {
    pub fn new(commands: &[f32]) -> Self {
        Self::with_full_control(commands, false)
    }

    pub fn with_full_control(commands: &[f32], full_control: bool) -> Self {
        Self {
            base: ControlBase::new(commands, full_control),
        }
    }
}

impl RobotControl for SimpleControl {
    fn base(&self) -> &ControlBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ControlBase {
        &mut self.base
    }

    fn calculate(&mut self, _t: f64, _view: &RobotView<'_>) -> Result<DVector<f32>, ControlError> {
        if !self.base.is_bound() {
            return Err(ControlError::NotConfigured);
        }
        Ok(self.base.parameters().clone())
    }

    fn clone_control(&self) -> Box<dyn RobotControl> {
        Box::new(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn returns_parameters_unchanged() {
        let names = vec!["a".to_string(), "b".to_string()];
        let q = DVector::zeros(2);
        let view = RobotView::new(&names, &q, &q);

        let mut ctrl = SimpleControl::new(&[0.5, -0.5]);
        ctrl.init(&view);
        assert!(ctrl.active());
        let cmd = ctrl.calculate(1.0, &view).unwrap();
        assert_eq!(cmd.as_slice(), &[0.5, -0.5]);
    }

    #[test]
    fn new_parameters_take_effect() {
        let names = vec!["a".to_string()];
        let q = DVector::zeros(1);
        let view = RobotView::new(&names, &q, &q);

        let mut ctrl = SimpleControl::new(&[0.0]);
        ctrl.init(&view);
        ctrl.set_parameters(&[3.0]);
        assert_eq!(ctrl.calculate(0.0, &view).unwrap()[0], 3.0);
    }
}
