//! Weighted combination of a robot's controllers.

use std::any::Any;

use nalgebra::DVector;

use crate::control::RobotControl;
use crate::error::ControlError;
use crate::view::RobotView;

/// Ordered controllers of one robot.
///
/// [`compute`](Self::compute) starts from a zero command and adds
/// `weight * output` of every active controller at the degrees of freedom it
/// controls.
#[derive(Default, Clone)]
pub struct ControllerSet {
    controllers: Vec<Box<dyn RobotControl>>,
}

impl ControllerSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a controller with the given weight. It stays unbound until
    /// [`init_all`](Self::init_all).
    pub fn add(&mut self, mut controller: Box<dyn RobotControl>, weight: f32) {
        controller.set_weight(weight);
        self.controllers.push(controller);
    }

    /// Bind and configure every controller against the robot.
    pub fn init_all(&mut self, view: &RobotView<'_>) {
        for controller in &mut self.controllers {
            controller.init(view);
        }
    }

    pub fn remove(&mut self, index: usize) -> Option<Box<dyn RobotControl>> {
        (index < self.controllers.len()).then(|| self.controllers.remove(index))
    }

    pub fn clear(&mut self) {
        self.controllers.clear();
    }

    pub fn len(&self) -> usize {
        self.controllers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.controllers.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&dyn RobotControl> {
        self.controllers.get(index).map(|c| &**c)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut dyn RobotControl> {
        self.controllers.get_mut(index).map(|c| &mut **c)
    }

    /// The controller at `index` as its concrete type.
    pub fn downcast_ref<T: RobotControl>(&self, index: usize) -> Option<&T> {
        let controller: &dyn Any = &**self.controllers.get(index)?;
        controller.downcast_ref::<T>()
    }

    pub fn downcast_mut<T: RobotControl>(&mut self, index: usize) -> Option<&mut T> {
        let controller: &mut dyn Any = &mut **self.controllers.get_mut(index)?;
        controller.downcast_mut::<T>()
    }

    pub fn iter(&self) -> impl Iterator<Item = &dyn RobotControl> {
        self.controllers.iter().map(|c| &**c)
    }

    /// Weighted sum of every active controller's output, one entry per
    /// degree of freedom of the robot.
    pub fn compute(&mut self, t: f64, view: &RobotView<'_>) -> Result<DVector<f32>, ControlError> {
        let mut commands = DVector::zeros(view.dofs());

        for controller in &mut self.controllers {
            if !controller.active() {
                continue;
            }
            let output = controller.calculate(t, view)?;
            let dofs = controller.controlled_dofs();
            if output.len() != dofs.len() {
                return Err(ControlError::DimensionMismatch {
                    expected: dofs.len(),
                    got: output.len(),
                });
            }
            let weight = controller.weight();
            for (value, &dof) in output.iter().zip(dofs) {
                commands[dof] += weight * value;
            }
        }

        if let Some(dof) = commands.iter().position(|c: &f32| !c.is_finite()) {
            return Err(ControlError::NonFinite { dof });
        }
        Ok(commands)
    }
}

impl std::fmt::Debug for ControllerSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ControllerSet")
            .field("len", &self.controllers.len())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
