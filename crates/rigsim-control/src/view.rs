use nalgebra::DVector;

/// Read-only snapshot of a robot's joint state handed to controllers.
///
/// All vectors are indexed by degree of freedom, in the order of
/// [`dof_names`](Self::dof_names).
#[derive(Debug, Clone, Copy)]
pub struct RobotView<'a> {
    dof_names: &'a [String],
    positions: &'a DVector<f32>,
    velocities: &'a DVector<f32>,
    actuated: Option<&'a [bool]>,
}

impl<'a> RobotView<'a> {
    /// View in which every degree of freedom is actuated.
    pub const fn new(
        dof_names: &'a [String],
        positions: &'a DVector<f32>,
        velocities: &'a DVector<f32>,
    ) -> Self {
        Self {
            dof_names,
            positions,
            velocities,
            actuated: None,
        }
    }

    /// Mark which degrees of freedom accept commands. Passive and locked
    /// joints are `false`.
    #[must_use]
    pub const fn with_actuated(mut self, actuated: &'a [bool]) -> Self {
        self.actuated = Some(actuated);
        self
    }

    /// Number of degrees of freedom.
    pub fn dofs(&self) -> usize {
        self.dof_names.len()
    }

    pub const fn dof_names(&self) -> &'a [String] {
        self.dof_names
    }

    pub const fn positions(&self) -> &'a DVector<f32> {
        self.positions
    }

    pub const fn velocities(&self) -> &'a DVector<f32> {
        self.velocities
    }

    pub fn is_actuated(&self, dof: usize) -> bool {
        self.actuated
            .is_none_or(|a| a.get(dof).copied().unwrap_or(false))
    }

    /// Index of the degree of freedom called `name`.
    pub fn dof_index(&self, name: &str) -> Option<usize> {
        self.dof_names.iter().position(|n| n == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_fully_actuated() {
        let names = vec!["a".to_string(), "b".to_string()];
        let q = DVector::from_vec(vec![1.0, 2.0]);
        let dq = DVector::zeros(2);
        let view = RobotView::new(&names, &q, &dq);
        assert_eq!(view.dofs(), 2);
        assert!(view.is_actuated(0));
        assert!(view.is_actuated(1));
        assert_eq!(view.dof_index("b"), Some(1));
        assert_eq!(view.dof_index("c"), None);
    }

    #[test]
    fn actuation_mask_is_respected() {
        let names = vec!["a".to_string(), "b".to_string()];
        let q = DVector::zeros(2);
        let mask = [true, false];
        let view = RobotView::new(&names, &q, &q).with_actuated(&mask);
        assert!(view.is_actuated(0));
        assert!(!view.is_actuated(1));
        assert!(!view.is_actuated(5));
    }
}
