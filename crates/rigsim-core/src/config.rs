use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use bevy::prelude::Resource;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::time::Scheduler;

// ---------------------------------------------------------------------------
// Serde default functions
// ---------------------------------------------------------------------------

const fn default_physics_dt() -> f64 {
    0.001
}
const fn default_graphics_freq() -> f64 {
    40.0
}
const fn default_gravity() -> [f32; 3] {
    [0.0, 0.0, -9.81]
}
const fn default_orientation() -> [f32; 4] {
    [0.0, 0.0, 0.0, 1.0]
}
const fn default_true() -> bool {
    true
}
const fn default_duration() -> f64 {
    5.0
}
const fn default_gain() -> f32 {
    100.0
}
const fn default_weight() -> f32 {
    1.0
}
const fn default_floor_width() -> f32 {
    10.0
}
const fn default_floor_thickness() -> f32 {
    0.1
}
const fn default_square_size() -> f32 {
    1.0
}
const fn default_first_color() -> [f32; 4] {
    [1.0, 1.0, 1.0, 1.0]
}
const fn default_second_color() -> [f32; 4] {
    [0.5, 0.5, 0.5, 1.0]
}
const fn default_window_width() -> u32 {
    640
}
const fn default_window_height() -> u32 {
    480
}
const fn default_bg_color() -> [f32; 4] {
    [0.0, 0.0, 0.0, 1.0]
}
const fn default_camera_resolution() -> u32 {
    256
}
const fn default_fov_deg() -> f32 {
    60.0
}
const fn default_near() -> f32 {
    0.01
}
const fn default_far() -> f32 {
    200.0
}
const fn default_up() -> [f32; 3] {
    [0.0, 0.0, 1.0]
}
fn default_floor_name() -> String {
    "checkerboard_floor".into()
}

// ---------------------------------------------------------------------------
// SimConfig
// ---------------------------------------------------------------------------

/// Main simulation configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Resource)]
pub struct SimConfig {
    /// Physics timestep in seconds (default: 0.001 = 1000 Hz).
    #[serde(default = "default_physics_dt")]
    pub physics_dt: f64,

    /// Controller update rate in Hz. `None` runs controllers every step.
    #[serde(default)]
    pub control_freq: Option<f64>,

    /// Rate at which cameras without their own frequency capture (default: 40 Hz).
    #[serde(default = "default_graphics_freq")]
    pub graphics_freq: f64,

    /// Gravity vector [x, y, z] in m/s^2. The world is z-up.
    #[serde(default = "default_gravity")]
    pub gravity: [f32; 3],

    /// Throttle stepping to wall-clock time.
    #[serde(default)]
    pub sync: bool,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            physics_dt: default_physics_dt(),
            control_freq: None,
            graphics_freq: default_graphics_freq(),
            gravity: default_gravity(),
            sync: false,
        }
    }
}

impl SimConfig {
    /// Configuration with the given timestep and defaults elsewhere.
    pub fn with_dt(physics_dt: f64) -> Self {
        Self {
            physics_dt,
            ..Self::default()
        }
    }

    /// Validate configuration. Returns Err on invalid values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.physics_dt.is_finite() && self.physics_dt > 0.0) {
            return Err(ConfigError::InvalidPhysicsDt(self.physics_dt));
        }
        let scheduler = Scheduler::new(self.physics_dt);
        scheduler.period_steps(self.control_hz())?;
        scheduler.period_steps(self.graphics_freq)?;
        if self.gravity.iter().any(|g| !g.is_finite()) {
            return Err(ConfigError::InvalidValue {
                field: "gravity".into(),
                message: "must be finite".into(),
            });
        }
        Ok(())
    }

    /// Physics rate in Hz.
    pub fn physics_hz(&self) -> f64 {
        1.0 / self.physics_dt
    }

    /// Controller rate in Hz (the physics rate unless configured).
    pub fn control_hz(&self) -> f64 {
        self.control_freq.unwrap_or_else(|| self.physics_hz())
    }

    /// Load from TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }
}

// ---------------------------------------------------------------------------
// ActuatorType
// ---------------------------------------------------------------------------

/// How joint commands are interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActuatorType {
    /// Commands are joint torques (forces for prismatic joints).
    #[default]
    Torque,
    /// Commands are joint velocities tracked by a motor.
    Servo,
    /// The joint is unactuated.
    Passive,
    /// The joint is held still.
    Locked,
}

// ---------------------------------------------------------------------------
// ControllerConfig
// ---------------------------------------------------------------------------

/// Which controller implementation a scene asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControllerKind {
    /// Pure proportional position control.
    Position,
    /// Proportional-derivative position control.
    Pd,
    /// Feed-forward commands, passed through unchanged.
    Simple,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControllerConfig {
    pub kind: ControllerKind,
    /// Target positions (position/pd) or constant commands (simple).
    pub target: Vec<f32>,
    #[serde(default = "default_gain")]
    pub gain: f32,
    /// Derivative gain, pd only.
    #[serde(default)]
    pub kd: Option<f32>,
    #[serde(default = "default_weight")]
    pub weight: f32,
    #[serde(default)]
    pub full_control: bool,
}

// ---------------------------------------------------------------------------
// RobotConfig
// ---------------------------------------------------------------------------

/// Configuration for a robot instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RobotConfig {
    pub name: String,
    pub urdf_path: PathBuf,
    #[serde(default)]
    pub base_position: [f32; 3],
    /// Quaternion `[x, y, z, w]`.
    #[serde(default = "default_orientation")]
    pub base_orientation: [f32; 4],
    #[serde(default = "default_true")]
    pub fixed_base: bool,
    #[serde(default)]
    pub initial_joint_positions: HashMap<String, f32>,
    #[serde(default)]
    pub actuator_type: ActuatorType,
    #[serde(default)]
    pub self_collision: bool,
    #[serde(default)]
    pub controller: Option<ControllerConfig>,
}

impl Default for RobotConfig {
    fn default() -> Self {
        Self {
            name: "robot".into(),
            urdf_path: PathBuf::new(),
            base_position: [0.0; 3],
            base_orientation: default_orientation(),
            fixed_base: true,
            initial_joint_positions: HashMap::default(),
            actuator_type: ActuatorType::default(),
            self_collision: false,
            controller: None,
        }
    }
}

// ---------------------------------------------------------------------------
// FloorConfig
// ---------------------------------------------------------------------------

/// Ground box whose top face lies at the pose.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FloorConfig {
    #[serde(default = "default_floor_name")]
    pub name: String,
    #[serde(default = "default_floor_width")]
    pub width: f32,
    #[serde(default = "default_floor_thickness")]
    pub thickness: f32,
    #[serde(default = "default_square_size")]
    pub square_size: f32,
    /// `[rx, ry, rz, x, y, z]`: axis-angle rotation followed by translation.
    #[serde(default)]
    pub pose: [f32; 6],
    #[serde(default = "default_true")]
    pub checkerboard: bool,
    #[serde(default = "default_first_color")]
    pub first_color: [f32; 4],
    #[serde(default = "default_second_color")]
    pub second_color: [f32; 4],
}

impl Default for FloorConfig {
    fn default() -> Self {
        Self {
            name: default_floor_name(),
            width: default_floor_width(),
            thickness: default_floor_thickness(),
            square_size: default_square_size(),
            pose: [0.0; 6],
            checkerboard: true,
            first_color: default_first_color(),
            second_color: default_second_color(),
        }
    }
}

// ---------------------------------------------------------------------------
// GraphicsConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphicsConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_window_width")]
    pub width: u32,
    #[serde(default = "default_window_height")]
    pub height: u32,
    #[serde(default = "default_true")]
    pub shadowed: bool,
    #[serde(default = "default_true")]
    pub transparent_shadows: bool,
    #[serde(default = "default_bg_color")]
    pub bg_color: [f32; 4],
    /// Where to save the main camera's last image.
    #[serde(default)]
    pub output: Option<PathBuf>,
}

impl Default for GraphicsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            width: default_window_width(),
            height: default_window_height(),
            shadowed: true,
            transparent_shadows: true,
            bg_color: default_bg_color(),
            output: None,
        }
    }
}

// ---------------------------------------------------------------------------
// CameraConfig
// ---------------------------------------------------------------------------

/// Rigid mount of a camera on a robot link.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttachConfig {
    pub link: String,
    #[serde(default)]
    pub xyz: [f32; 3],
    /// Roll-pitch-yaw in radians.
    #[serde(default)]
    pub rpy: [f32; 3],
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LookAtConfig {
    pub eye: [f32; 3],
    #[serde(default)]
    pub target: [f32; 3],
    #[serde(default = "default_up")]
    pub up: [f32; 3],
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CameraConfig {
    pub name: String,
    #[serde(default = "default_camera_resolution")]
    pub width: u32,
    #[serde(default = "default_camera_resolution")]
    pub height: u32,
    /// Horizontal field of view in degrees.
    #[serde(default = "default_fov_deg")]
    pub fov_deg: f32,
    #[serde(default = "default_near")]
    pub near: f32,
    #[serde(default = "default_far")]
    pub far: f32,
    /// Capture rate in Hz. Falls back to `SimConfig::graphics_freq`.
    #[serde(default)]
    pub frequency: Option<f64>,
    #[serde(default)]
    pub attach: Option<AttachConfig>,
    #[serde(default)]
    pub look_at: Option<LookAtConfig>,
    #[serde(default)]
    pub output: Option<PathBuf>,
    #[serde(default)]
    pub depth_output: Option<PathBuf>,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            name: "camera".into(),
            width: default_camera_resolution(),
            height: default_camera_resolution(),
            fov_deg: default_fov_deg(),
            near: default_near(),
            far: default_far(),
            frequency: None,
            attach: None,
            look_at: None,
            output: None,
            depth_output: None,
        }
    }
}

// ---------------------------------------------------------------------------
// SceneConfig
// ---------------------------------------------------------------------------

/// A complete runnable scene: simulation settings, robots, floor, graphics
/// and cameras.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SceneConfig {
    #[serde(default)]
    pub simulation: SimConfig,
    /// Simulated seconds to run.
    #[serde(default = "default_duration")]
    pub duration: f64,
    #[serde(default)]
    pub robots: Vec<RobotConfig>,
    #[serde(default)]
    pub floor: Option<FloorConfig>,
    #[serde(default)]
    pub graphics: Option<GraphicsConfig>,
    #[serde(default)]
    pub cameras: Vec<CameraConfig>,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            simulation: SimConfig::default(),
            duration: default_duration(),
            robots: Vec::new(),
            floor: None,
            graphics: None,
            cameras: Vec::new(),
        }
    }
}

impl SceneConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.simulation.validate()?;

        if !(self.duration.is_finite() && self.duration >= 0.0) {
            return Err(invalid("duration", "must be a non-negative number of seconds"));
        }
        if self.robots.is_empty() {
            return Err(invalid("robots", "at least one robot is required"));
        }

        let mut robot_names = HashSet::new();
        for robot in &self.robots {
            if !robot_names.insert(robot.name.as_str()) {
                return Err(ConfigError::DuplicateName {
                    kind: "robot",
                    name: robot.name.clone(),
                });
            }
        }

        let scheduler = Scheduler::new(self.simulation.physics_dt);
        let mut camera_names = HashSet::new();
        for camera in &self.cameras {
            if !camera_names.insert(camera.name.as_str()) {
                return Err(ConfigError::DuplicateName {
                    kind: "camera",
                    name: camera.name.clone(),
                });
            }
            if camera.width == 0 || camera.height == 0 {
                return Err(invalid("camera resolution", "must be non-zero"));
            }
            if camera.attach.is_some() && camera.look_at.is_some() {
                return Err(invalid(
                    "camera placement",
                    "attach and look_at are mutually exclusive",
                ));
            }
            if let Some(freq) = camera.frequency {
                scheduler.period_steps(freq)?;
            }
        }

        if let Some(floor) = &self.floor
            && (floor.width <= 0.0 || floor.thickness <= 0.0 || floor.square_size <= 0.0)
        {
            return Err(invalid("floor", "dimensions must be positive"));
        }

        Ok(())
    }

    /// Load from TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse and validate a TOML document.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }
}

fn invalid(field: &str, message: &str) -> ConfigError {
    ConfigError::InvalidValue {
        field: field.into(),
        message: message.into(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
