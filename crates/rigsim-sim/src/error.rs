use thiserror::Error;

use rigsim_control::ControlError;
use rigsim_core::{ConfigError, SimError};
use rigsim_render::RenderError;
use rigsim_urdf::UrdfError;

/// Errors surfaced by [`Simu`](crate::Simu) and the scene builder.
#[derive(Debug, Error)]
pub enum SimuError {
    #[error(transparent)]
    Urdf(#[from] UrdfError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Sim(#[from] SimError),

    #[error("Controller error: {0}")]
    Control(#[from] ControlError),

    #[error(transparent)]
    Render(#[from] RenderError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wraps_every_layer() {
        let err: SimuError = SimError::RobotNotFound("arm".into()).into();
        assert_eq!(err.to_string(), "Robot not found: arm");

        let err: SimuError = ControlError::DimensionMismatch {
            expected: 4,
            got: 3,
        }
        .into();
        assert!(matches!(err, SimuError::Control(_)));
        assert!(err.to_string().starts_with("Controller error"));

        let err: SimuError = ConfigError::InvalidPhysicsDt(0.0).into();
        assert!(matches!(err, SimuError::Config(_)));
    }
}
