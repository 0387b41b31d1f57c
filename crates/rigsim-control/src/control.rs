//! The controller interface.

use std::any::Any;

use nalgebra::DVector;

use crate::error::ControlError;
use crate::view::RobotView;

// ---------------------------------------------------------------------------
// ControlBase
// ---------------------------------------------------------------------------

/// State shared by every controller: parameters, weight, activation and the
/// degrees of freedom it drives.
#[derive(Debug, Clone)]
pub struct ControlBase {
    ctrl: DVector<f32>,
    weight: f32,
    active: bool,
    full_control: bool,
    dofs: Option<Vec<usize>>,
}

impl ControlBase {
    /// New inactive base with weight 1. `full_control` also drives passive
    /// and locked joints.
    pub fn new(ctrl: &[f32], full_control: bool) -> Self {
        Self {
            ctrl: DVector::from_column_slice(ctrl),
            weight: 1.0,
            active: false,
            full_control,
            dofs: None,
        }
    }

    /// Attach to a robot: record which of its degrees of freedom this
    /// controller drives.
    pub fn bind(&mut self, view: &RobotView<'_>) {
        let dofs = (0..view.dofs())
            .filter(|&i| self.full_control || view.is_actuated(i))
            .collect();
        self.dofs = Some(dofs);
    }

    pub const fn is_bound(&self) -> bool {
        self.dofs.is_some()
    }

    /// Indices of the controlled degrees of freedom. Empty until bound.
    pub fn controlled_dofs(&self) -> &[usize] {
        self.dofs.as_deref().unwrap_or(&[])
    }

    pub const fn parameters(&self) -> &DVector<f32> {
        &self.ctrl
    }

    pub fn set_parameters(&mut self, ctrl: &[f32]) {
        self.ctrl = DVector::from_column_slice(ctrl);
    }

    pub const fn weight(&self) -> f32 {
        self.weight
    }

    pub const fn set_weight(&mut self, weight: f32) {
        self.weight = weight;
    }

    pub const fn active(&self) -> bool {
        self.active
    }

    pub const fn set_active(&mut self, active: bool) {
        self.active = active;
    }

    pub const fn full_control(&self) -> bool {
        self.full_control
    }

    /// Entries of a full-robot vector at the controlled degrees of freedom.
    pub fn select(&self, full: &DVector<f32>) -> DVector<f32> {
        let dofs = self.controlled_dofs();
        DVector::from_iterator(dofs.len(), dofs.iter().map(|&i| full[i]))
    }
}

// ---------------------------------------------------------------------------
// RobotControl
// ---------------------------------------------------------------------------

/// A controller attached to a robot.
///
/// `calculate` returns one command per controlled degree of freedom (see
/// [`ControlBase::controlled_dofs`]). Commands are interpreted by the
/// robot's actuators: torques by default, velocities for servo joints.
///
/// Implementations downcast through `&dyn Any`, so concrete controllers can
/// be retrieved from a [`ControllerSet`](crate::ControllerSet).
pub trait RobotControl: Any + Send + Sync {
    fn base(&self) -> &ControlBase;

    fn base_mut(&mut self) -> &mut ControlBase;

    /// Commands at simulated time `t` (seconds).
    fn calculate(&mut self, t: f64, view: &RobotView<'_>) -> Result<DVector<f32>, ControlError>;

    /// An independent copy, state included.
    fn clone_control(&self) -> Box<dyn RobotControl>;

    /// Validate parameters against the bound degrees of freedom and decide
    /// whether the controller is active. The default activates when there is
    /// one parameter per controlled degree of freedom.
    fn configure(&mut self) {
        let base = self.base();
        let ok = base.is_bound() && base.parameters().len() == base.controlled_dofs().len();
        self.base_mut().set_active(ok);
    }

    /// Bind to a robot and configure.
    fn init(&mut self, view: &RobotView<'_>) {
        self.base_mut().bind(view);
        self.configure();
    }

    fn weight(&self) -> f32 {
        self.base().weight()
    }

    fn set_weight(&mut self, weight: f32) {
        self.base_mut().set_weight(weight);
    }

    fn active(&self) -> bool {
        self.base().active()
    }

    /// Force activation on or off.
    fn activate(&mut self, enable: bool) {
        self.base_mut().set_active(enable);
    }

    fn fully_controlled(&self) -> bool {
        self.base().full_control()
    }

    fn parameters(&self) -> &DVector<f32> {
        self.base().parameters()
    }

    /// Replace the parameters, re-running [`configure`](Self::configure)
    /// when already bound.
    fn set_parameters(&mut self, ctrl: &[f32]) {
        self.base_mut().set_parameters(ctrl);
        if self.base().is_bound() {
            self.configure();
        }
    }

    fn controlled_dofs(&self) -> &[usize] {
        self.base().controlled_dofs()
    }

    /// Positions of the controlled degrees of freedom.
    fn positions(&self, view: &RobotView<'_>) -> DVector<f32> {
        self.base().select(view.positions())
    }

    /// Velocities of the controlled degrees of freedom.
    fn velocities(&self, view: &RobotView<'_>) -> DVector<f32> {
        self.base().select(view.velocities())
    }
}

impl Clone for Box<dyn RobotControl> {
    fn clone(&self) -> Self {
        self.clone_control()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
