use thiserror::Error;

/// Top-level error type for rigsim-core.
#[derive(Debug, Error)]
pub enum RigsimError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Simulation error: {0}")]
    Simulation(#[from] SimError),
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Invalid physics_dt: {0} (must be > 0)")]
    InvalidPhysicsDt(f64),

    #[error("Frequency {freq} Hz exceeds the physics rate of {physics_hz} Hz")]
    FrequencyTooHigh { freq: f64, physics_hz: f64 },

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },

    #[error("Duplicate {kind} name: {name}")]
    DuplicateName { kind: &'static str, name: String },
}

/// Simulation runtime errors.
#[derive(Debug, Error)]
pub enum SimError {
    #[error("Physics diverged: NaN detected in state")]
    PhysicsDiverged,

    #[error("Robot not found: {0}")]
    RobotNotFound(String),

    #[error("Link not found: {0}")]
    LinkNotFound(String),

    #[error("Camera not found: {0}")]
    CameraNotFound(usize),

    #[error("A robot named {0} is already in the simulation")]
    DuplicateRobot(String),

    #[error("At most {0} robots can share a world")]
    TooManyRobots(usize),

    #[error("Unknown degree of freedom: {0}")]
    UnknownDof(String),

    #[error("Robot load failed: {0}")]
    RobotLoad(String),

    #[error("Image write failed: {0}")]
    ImageWrite(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rigsim_error_from_config_error() {
        let err: RigsimError = ConfigError::InvalidPhysicsDt(-1.0).into();
        assert!(matches!(err, RigsimError::Config(_)));
        assert!(err.to_string().contains("-1"));
    }

    #[test]
    fn rigsim_error_from_sim_error() {
        let err: RigsimError = SimError::PhysicsDiverged.into();
        assert!(matches!(err, RigsimError::Simulation(_)));
        assert!(err.to_string().contains("NaN"));
    }

    #[test]
    fn config_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let config_err: ConfigError = io_err.into();
        assert!(matches!(config_err, ConfigError::Io(_)));
    }

    #[test]
    fn display_messages() {
        assert_eq!(
            ConfigError::InvalidPhysicsDt(0.0).to_string(),
            "Invalid physics_dt: 0 (must be > 0)"
        );
        assert_eq!(
            ConfigError::FrequencyTooHigh {
                freq: 2000.0,
                physics_hz: 1000.0
            }
            .to_string(),
            "Frequency 2000 Hz exceeds the physics rate of 1000 Hz"
        );
        assert_eq!(
            ConfigError::DuplicateName {
                kind: "robot",
                name: "arm".into()
            }
            .to_string(),
            "Duplicate robot name: arm"
        );
        assert_eq!(
            SimError::PhysicsDiverged.to_string(),
            "Physics diverged: NaN detected in state"
        );
        assert_eq!(
            SimError::LinkNotFound("arm_link_5".into()).to_string(),
            "Link not found: arm_link_5"
        );
        assert_eq!(SimError::CameraNotFound(3).to_string(), "Camera not found: 3");
    }
}
