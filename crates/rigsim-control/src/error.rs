use thiserror::Error;

/// Controller evaluation errors.
///
/// Copy + static messages so the control loop can report them without
/// allocating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ControlError {
    #[error("Command dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("Command contains a non-finite value at dof {dof}")]
    NonFinite { dof: usize },

    #[error("Controller is not attached to a robot")]
    NotConfigured,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn control_error_is_copy() {
        let err = ControlError::NonFinite { dof: 1 };
        let err2 = err;
        assert_eq!(err, err2);
    }

    #[test]
    fn display_messages() {
        assert_eq!(
            ControlError::DimensionMismatch {
                expected: 4,
                got: 3
            }
            .to_string(),
            "Command dimension mismatch: expected 4, got 3"
        );
        assert_eq!(
            ControlError::NonFinite { dof: 2 }.to_string(),
            "Command contains a non-finite value at dof 2"
        );
        assert_eq!(
            ControlError::NotConfigured.to_string(),
            "Controller is not attached to a robot"
        );
    }
}
