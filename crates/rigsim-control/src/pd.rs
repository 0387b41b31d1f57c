//! Joint-space PD position control.

use nalgebra::DVector;

use crate::control::{ControlBase, RobotControl};
use crate::error::ControlError;
use crate::view::RobotView;

/// Default proportional gain.
pub const DEFAULT_KP: f32 = 10.0;
/// Default derivative gain.
pub const DEFAULT_KD: f32 = 0.1;

/// A gain shared by every joint, or one value per controlled joint.
#[derive(Debug, Clone, PartialEq)]
pub enum Gain {
    Uniform(f32),
    PerDof(DVector<f32>),
}

impl Gain {
    fn expand(&self, n: usize) -> Result<DVector<f32>, ControlError> {
        match self {
            Self::Uniform(g) => Ok(DVector::from_element(n, *g)),
            Self::PerDof(v) if v.len() == n => Ok(v.clone()),
            Self::PerDof(v) => Err(ControlError::DimensionMismatch {
                expected: n,
                got: v.len(),
            }),
        }
    }

    fn fits(&self, n: usize) -> bool {
        match self {
            Self::Uniform(_) => true,
            Self::PerDof(v) => v.len() == n,
        }
    }
}

/// PD controller tracking fixed joint targets:
/// `cmd = kp .* (target - q) - kd .* dq`.
///
/// The target vector is the controller's parameter vector.
#[derive(Debug, Clone)]
pub struct PdControl {
    base: ControlBase,
    kp: Gain,
    kd: Gain,
}

impl PdControl {
    /// Track `target` on the actuated joints with the default gains.
    pub fn new(target: &[f32]) -> Self {
        Self::with_full_control(target, false)
    }

    /// Like [`new`](Self::new), optionally also driving passive and locked
    /// joints.
    pub fn with_full_control(target: &[f32], full_control: bool) -> Self {
        Self {
            base: ControlBase::new(target, full_control),
            kp: Gain::Uniform(DEFAULT_KP),
            kd: Gain::Uniform(DEFAULT_KD),
        }
    }

    /// Same gains for every joint.
    pub fn set_pd(&mut self, kp: f32, kd: f32) {
        self.kp = Gain::Uniform(kp);
        self.kd = Gain::Uniform(kd);
        self.reconfigure();
    }

    /// One gain pair per controlled joint.
    pub fn set_pd_per_dof(&mut self, kp: &[f32], kd: &[f32]) {
        self.kp = Gain::PerDof(DVector::from_column_slice(kp));
        self.kd = Gain::PerDof(DVector::from_column_slice(kd));
        self.reconfigure();
    }

    pub const fn kp(&self) -> &Gain {
        &self.kp
    }

    pub const fn kd(&self) -> &Gain {
        &self.kd
    }

    fn reconfigure(&mut self) {
        if self.base.is_bound() {
            self.configure();
        }
    }
}

impl RobotControl for PdControl {
    fn base(&self) -> &ControlBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ControlBase {
        &mut self.base
    }

    fn configure(&mut self) {
        let n = self.base.controlled_dofs().len();
        let ok = self.base.is_bound()
            && self.base.parameters().len() == n
            && self.kp.fits(n)
            && self.kd.fits(n);
        self.base.set_active(ok);
    }

    fn calculate(&mut self, _t: f64, view: &RobotView<'_>) -> Result<DVector<f32>, ControlError> {
        if !self.base.is_bound() {
            return Err(ControlError::NotConfigured);
        }
        let target = self.base.parameters();
        let n = target.len();
        let q = self.positions(view);
        let dq = self.velocities(view);
        if q.len() != n {
            return Err(ControlError::DimensionMismatch {
                expected: n,
                got: q.len(),
            });
        }

        let kp = self.kp.expand(n)?;
        let kd = self.kd.expand(n)?;
        Ok(kp.component_mul(&(target - q)) - kd.component_mul(&dq))
    }

    fn clone_control(&self) -> Box<dyn RobotControl> {
        Box::new(self.clone())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    fn names(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("joint_{i}")).collect()
    }

    #[test]
    fn default_gains() {
        let pd = PdControl::new(&[0.0]);
        assert_eq!(pd.kp(), &Gain::Uniform(10.0));
        assert_eq!(pd.kd(), &Gain::Uniform(0.1));
    }

    #[test]
    fn pd_law() {
        let names = names(2);
        let q = DVector::from_vec(vec![0.5, -0.5]);
        let dq = DVector::from_vec(vec![1.0, 0.0]);
        let view = RobotView::new(&names, &q, &dq);

        let mut pd = PdControl::new(&[1.0, 0.0]);
        pd.init(&view);
        assert!(pd.active());

        let cmd = pd.calculate(0.0, &view).unwrap();
        assert_relative_eq!(cmd[0], 10.0 * 0.5 - 0.1 * 1.0, epsilon = 1e-6);
        assert_relative_eq!(cmd[1], 10.0 * 0.5, epsilon = 1e-6);
    }

    #[test]
    fn per_dof_gains() {
        let names = names(2);
        let q = DVector::zeros(2);
        let view = RobotView::new(&names, &q, &q);

        let mut pd = PdControl::new(&[1.0, 1.0]);
        pd.init(&view);
        pd.set_pd_per_dof(&[1.0, 2.0], &[0.0, 0.0]);
        assert!(pd.active());
        let cmd = pd.calculate(0.0, &view).unwrap();
        assert_relative_eq!(cmd[0], 1.0);
        assert_relative_eq!(cmd[1], 2.0);
    }

    #[test]
    fn mismatched_gains_deactivate() {
        let names = names(2);
        let q = DVector::zeros(2);
        let view = RobotView::new(&names, &q, &q);

        let mut pd = PdControl::new(&[1.0, 1.0]);
        pd.init(&view);
        pd.set_pd_per_dof(&[1.0], &[0.0]);
        assert!(!pd.active());
    }

    #[test]
    fn wrong_target_length_deactivates() {
        let names = names(3);
        let q = DVector::zeros(3);
        let view = RobotView::new(&names, &q, &q);

        let mut pd = PdControl::new(&[1.0]);
        pd.init(&view);
        assert!(!pd.active());
    }

    #[test]
    fn only_actuated_joints_are_controlled() {
        let names = names(3);
        let q = DVector::from_vec(vec![0.0, 5.0, 0.0]);
        let mask = [true, false, true];
        let view = RobotView::new(&names, &q, &q).with_actuated(&mask);

        let mut pd = PdControl::new(&[1.0, 1.0]);
        pd.set_pd(1.0, 0.0);
        pd.init(&view);
        assert!(pd.active());
        assert_eq!(pd.controlled_dofs(), &[0, 2]);
    }

    #[test]
    fn calculate_before_init_fails() {
        let names = names(1);
        let q = DVector::zeros(1);
        let view = RobotView::new(&names, &q, &q);
        let mut pd = PdControl::new(&[1.0]);
        assert_eq!(
            pd.calculate(0.0, &view).unwrap_err(),
            ControlError::NotConfigured
        );
    }
}
