//! Scene builder: a [`Simu`] from a [`SceneConfig`].
//!
//! [`SceneBuilder`] turns a TOML scene into a ready-to-run simulation:
//! robots with their controllers, the floor, the graphics and the cameras.
//! Controllers named in the scene are created by the built-in mapping
//! unless a custom factory claims them first.
//!
//! # Example
//!
//! ```no_run
//! use rigsim_sim::SceneBuilder;
//!
//! let mut scene = SceneBuilder::from_file("res/scenes/arm.toml")
//!     .unwrap()
//!     .build()
//!     .unwrap();
//! scene.run().unwrap();
//! scene.save_outputs().unwrap();
//! ```

use std::path::{Path, PathBuf};

use bevy::log::{debug, info};
use nalgebra::{Isometry3, Point3, Quaternion, Translation3, UnitQuaternion, Vector3};

use rigsim_control::pd::DEFAULT_KD;
use rigsim_control::{PdControl, RobotControl, SimpleControl};
use rigsim_core::config::{
    AttachConfig, CameraConfig, ControllerConfig, ControllerKind, RobotConfig, SceneConfig,
};
use rigsim_physics::floor::FloorSpec;
use rigsim_render::camera::SimCamera;
use rigsim_render::config::CameraIntrinsics;
use rigsim_render::Graphics;

use crate::error::SimuError;
use crate::robot::Robot;
use crate::simu::{CameraHandle, Simu};

/// Creates a controller for a scene entry, or declines with `None`.
pub type ControllerFactory = Box<dyn Fn(&ControllerConfig) -> Option<Box<dyn RobotControl>>>;

// ---------------------------------------------------------------------------
// BuiltScene
// ---------------------------------------------------------------------------

/// A camera created from the scene and where its images go.
#[derive(Debug, Clone)]
pub struct SceneCamera {
    pub name: String,
    pub handle: CameraHandle,
    pub output: Option<PathBuf>,
    pub depth_output: Option<PathBuf>,
}

/// Result of building a scene: the simulation plus its cameras.
pub struct BuiltScene {
    pub simu: Simu,
    pub cameras: Vec<SceneCamera>,
    /// Where to save the main camera's image.
    pub graphics_output: Option<PathBuf>,
    /// Simulated seconds to run.
    pub duration: f64,
}

impl BuiltScene {
    pub fn camera(&self, name: &str) -> Option<CameraHandle> {
        self.cameras.iter().find(|c| c.name == name).map(|c| c.handle)
    }

    /// Run for the scene's duration.
    pub fn run(&mut self) -> Result<(), SimuError> {
        self.simu.run(self.duration, false)?;
        Ok(())
    }

    /// Save every configured image. Returns the paths written.
    pub fn save_outputs(&self) -> Result<Vec<PathBuf>, SimuError> {
        let mut written = Vec::new();
        for camera in &self.cameras {
            if let Some(path) = &camera.output {
                self.simu.save_camera_image(camera.handle, path)?;
                written.push(path.clone());
            }
            if let Some(path) = &camera.depth_output {
                self.simu.save_camera_depth(camera.handle, path)?;
                written.push(path.clone());
            }
        }
        if let Some(path) = &self.graphics_output {
            self.simu.save_graphics_image(path)?;
            written.push(path.clone());
        }
        Ok(written)
    }
}

// ---------------------------------------------------------------------------
// SceneBuilder
// ---------------------------------------------------------------------------

pub struct SceneBuilder {
    config: SceneConfig,
    base_dir: PathBuf,
    factory: Option<ControllerFactory>,
}

impl SceneBuilder {
    /// URDF paths are resolved against the working directory.
    pub fn new(config: SceneConfig) -> Self {
        Self {
            config,
            base_dir: PathBuf::from("."),
            factory: None,
        }
    }

    /// Load a scene file. Its URDF paths are relative to the file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, SimuError> {
        let path = path.as_ref();
        let config = SceneConfig::from_file(path)?;
        let base_dir = path.parent().map_or_else(|| PathBuf::from("."), Path::to_path_buf);
        Ok(Self::new(config).with_base_dir(base_dir))
    }

    #[must_use]
    pub fn with_base_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.base_dir = dir.into();
        self
    }

    /// Consult `factory` before the built-in controllers.
    #[must_use]
    pub fn with_controller_factory(
        mut self,
        factory: impl Fn(&ControllerConfig) -> Option<Box<dyn RobotControl>> + 'static,
    ) -> Self {
        self.factory = Some(Box::new(factory));
        self
    }

    pub const fn config(&self) -> &SceneConfig {
        &self.config
    }

    pub const fn config_mut(&mut self) -> &mut SceneConfig {
        &mut self.config
    }

    pub fn build(self) -> Result<BuiltScene, SimuError> {
        self.config.validate()?;
        let mut simu = Simu::with_config(self.config.simulation.clone())?;

        for config in &self.config.robots {
            simu.add_robot(self.robot(config)?)?;
        }

        if let Some(floor) = &self.config.floor {
            let spec = FloorSpec::from_config(floor);
            if spec.checkerboard {
                simu.add_checkerboard_floor(spec);
            } else {
                simu.add_floor(spec);
            }
        }

        let mut graphics_output = None;
        if let Some(config) = &self.config.graphics {
            simu.set_graphics(Graphics::from_config(config));
            graphics_output.clone_from(&config.output);
            // nothing reads the main camera without an output
            if graphics_output.is_none()
                && let Some(main) = simu.main_camera_mut()
            {
                debug!("Main camera has no output, not rendering it");
                main.active = false;
            }
        }

        let cameras = self
            .config
            .cameras
            .iter()
            .map(|config| {
                Ok(SceneCamera {
                    name: config.name.clone(),
                    handle: simu.add_camera(camera_from_config(config))?,
                    output: config.output.clone(),
                    depth_output: config.depth_output.clone(),
                })
            })
            .collect::<Result<Vec<_>, SimuError>>()?;

        info!(
            "Built scene with {} robot(s) and {} camera(s)",
            simu.num_robots(),
            simu.num_cameras()
        );
        Ok(BuiltScene {
            simu,
            cameras,
            graphics_output,
            duration: self.config.duration,
        })
    }

    fn robot(&self, config: &RobotConfig) -> Result<Robot, SimuError> {
        let path = if config.urdf_path.is_absolute() {
            config.urdf_path.clone()
        } else {
            self.base_dir.join(&config.urdf_path)
        };
        let mut robot = Robot::from_urdf(&path, config.name.clone())?;

        let [x, y, z] = config.base_position;
        let [qx, qy, qz, qw] = config.base_orientation;
        let pose = Isometry3::from_parts(
            Translation3::new(x, y, z),
            UnitQuaternion::from_quaternion(Quaternion::new(qw, qx, qy, qz)),
        );
        if config.fixed_base {
            robot.set_base_pose(pose);
            robot.fix_to_world();
        } else {
            robot.free_from_world(pose);
        }
        robot.set_actuator_types(config.actuator_type);
        robot.set_self_collision(config.self_collision);

        if !config.initial_joint_positions.is_empty() {
            let mut entries: Vec<(&str, f32)> = config
                .initial_joint_positions
                .iter()
                .map(|(name, &value)| (name.as_str(), value))
                .collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            let (names, values): (Vec<&str>, Vec<f32>) = entries.into_iter().unzip();
            robot.set_positions(&values, &names)?;
        }

        if let Some(controller) = &config.controller {
            robot.add_boxed_controller(self.controller(controller), controller.weight);
        }
        Ok(robot)
    }

    fn controller(&self, config: &ControllerConfig) -> Box<dyn RobotControl> {
        self.factory
            .as_ref()
            .and_then(|factory| factory(config))
            .unwrap_or_else(|| default_controller(config))
    }
}

/// The built-in controller for a scene entry.
///
/// `position` is a pure proportional controller (`kd = 0`), `pd` adds the
/// derivative gain and `simple` replays its target as commands.
pub fn default_controller(config: &ControllerConfig) -> Box<dyn RobotControl> {
    match config.kind {
        ControllerKind::Position | ControllerKind::Pd => {
            let mut pd = PdControl::with_full_control(&config.target, config.full_control);
            let kd = match config.kind {
                ControllerKind::Pd => config.kd.unwrap_or(DEFAULT_KD),
                _ => 0.0,
            };
            pd.set_pd(config.gain, kd);
            Box::new(pd)
        }
        ControllerKind::Simple => Box::new(SimpleControl::with_full_control(
            &config.target,
            config.full_control,
        )),
    }
}

/// Camera as described by the scene.
pub fn camera_from_config(config: &CameraConfig) -> SimCamera {
    let intrinsics = CameraIntrinsics::new(config.width, config.height)
        .with_fov(config.fov_deg.to_radians())
        .with_clipping(config.near, config.far);
    let mut camera = SimCamera::new(config.name.clone(), intrinsics);
    camera.frequency = config.frequency;
    camera.record_depth = config.depth_output.is_some();

    if let Some(look_at) = &config.look_at {
        camera.look_at(
            Point3::from(look_at.eye),
            Point3::from(look_at.target),
            Vector3::from(look_at.up),
        );
    }
    if let Some(attach) = &config.attach {
        camera.attach_to(attach.link.clone(), attach_offset(attach));
    }
    camera
}

/// Mount offset from `xyz` and roll-pitch-yaw (applied as `Rz * Ry * Rx`).
pub fn attach_offset(attach: &AttachConfig) -> Isometry3<f32> {
    let [x, y, z] = attach.xyz;
    let [roll, pitch, yaw] = attach.rpy;
    Isometry3::from_parts(
        Translation3::new(x, y, z),
        UnitQuaternion::from_euler_angles(roll, pitch, yaw),
    )
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::f32::consts::PI;

    use approx::assert_relative_eq;
    use nalgebra::DVector;
    use rigsim_control::{ControlBase, ControlError, RobotView};
    use rigsim_core::config::{FloorConfig, GraphicsConfig};
    use rigsim_test_utils::arm_urdf_path;

    use super::*;

    fn arm_config() -> RobotConfig {
        RobotConfig {
            name: "arm".into(),
            urdf_path: arm_urdf_path(),
            ..RobotConfig::default()
        }
    }

    fn controller_config(kind: ControllerKind) -> ControllerConfig {
        ControllerConfig {
            kind,
            target: vec![0.0, 2.0, -0.5, 0.7],
            gain: 100.0,
            kd: None,
            weight: 1.0,
            full_control: false,
        }
    }

    fn scene() -> SceneConfig {
        let mut robot = arm_config();
        robot.controller = Some(controller_config(ControllerKind::Position));
        SceneConfig {
            robots: vec![robot],
            ..SceneConfig::default()
        }
    }

    /// Always commands the same value on every dof.
    #[derive(Clone)]
    struct Constant {
        base: ControlBase,
    }

    impl RobotControl for Constant {
        fn base(&self) -> &ControlBase {
            &self.base
        }
        fn base_mut(&mut self) -> &mut ControlBase {
            &mut self.base
        }
        fn configure(&mut self) {
            self.base.set_active(true);
        }
        fn calculate(
            &mut self,
            _t: f64,
            view: &RobotView<'_>,
        ) -> Result<DVector<f32>, ControlError> {
            Ok(DVector::from_element(view.dofs(), 3.0))
        }
        fn clone_control(&self) -> Box<dyn RobotControl> {
            Box::new(self.clone())
        }
    }

    #[test]
    fn position_controller_is_pure_proportional() {
        let names: Vec<String> = (0..4).map(|i| format!("j{i}")).collect();
        let q = DVector::zeros(4);
        let dq = DVector::from_element(4, 1.0);
        let view = RobotView::new(&names, &q, &dq);

        let mut controller = default_controller(&controller_config(ControllerKind::Position));
        controller.init(&view);
        let cmd = controller.calculate(0.0, &view).unwrap();
        assert_relative_eq!(cmd, DVector::from_vec(vec![0.0, 200.0, -50.0, 70.0]), epsilon = 1e-4);

        let mut pd = controller_config(ControllerKind::Pd);
        pd.kd = Some(2.0);
        let mut controller = default_controller(&pd);
        controller.init(&view);
        assert_relative_eq!(controller.calculate(0.0, &view).unwrap()[0], -2.0);

        let mut controller = default_controller(&controller_config(ControllerKind::Simple));
        controller.init(&view);
        assert_relative_eq!(controller.calculate(0.0, &view).unwrap()[1], 2.0);
    }

    #[test]
    fn builds_robots_with_controllers() {
        let built = SceneBuilder::new(scene()).build().unwrap();
        assert_eq!(built.simu.num_robots(), 1);
        let arm = built.simu.robot("arm").unwrap();
        assert_eq!(arm.num_controllers(), 1);
        assert!(arm.controller(0).unwrap().active());
        assert!(built.cameras.is_empty());
        assert_relative_eq!(built.duration, 5.0);
    }

    #[test]
    fn factory_overrides_built_in_controllers() {
        let built = SceneBuilder::new(scene())
            .with_controller_factory(|config| {
                (config.kind == ControllerKind::Position).then(|| {
                    Box::new(Constant {
                        base: ControlBase::new(&config.target, false),
                    }) as Box<dyn RobotControl>
                })
            })
            .build()
            .unwrap();
        let arm = built.simu.robot("arm").unwrap();
        let controller = arm.controller(0).unwrap();
        let any: &dyn std::any::Any = controller;
        assert!(any.downcast_ref::<Constant>().is_some());
    }

    #[test]
    fn robot_placement_and_initial_positions() {
        let mut config = scene();
        let robot = &mut config.robots[0];
        robot.base_position = [1.0, 0.0, 0.5];
        robot.initial_joint_positions.insert("arm_joint_2".into(), 0.4);
        let built = SceneBuilder::new(config).build().unwrap();

        let arm = built.simu.robot("arm").unwrap();
        let base = arm.base_pose().unwrap();
        assert_relative_eq!(base.translation.vector, Vector3::new(1.0, 0.0, 0.5), epsilon = 1e-5);
        assert_relative_eq!(arm.positions()[1], 0.4, epsilon = 1e-4);
    }

    #[test]
    fn unknown_initial_joint_is_an_error() {
        let mut config = scene();
        config.robots[0]
            .initial_joint_positions
            .insert("no_such_joint".into(), 1.0);
        assert!(matches!(
            SceneBuilder::new(config).build(),
            Err(SimuError::Sim(_))
        ));
    }

    #[test]
    fn missing_urdf_is_an_error() {
        let mut config = scene();
        config.robots[0].urdf_path = "missing/arm.urdf".into();
        assert!(matches!(
            SceneBuilder::new(config).build(),
            Err(SimuError::Urdf(_))
        ));
    }

    #[test]
    fn cameras_floor_and_graphics() {
        let mut config = scene();
        config.floor = Some(FloorConfig::default());
        config.graphics = Some(GraphicsConfig::default());
        config.cameras.push(CameraConfig {
            name: "tip".into(),
            frequency: Some(10.0),
            attach: Some(AttachConfig {
                link: "arm_link_5".into(),
                xyz: [0.0, 0.0, 0.1],
                rpy: [PI, 0.0, -PI / 2.0],
            }),
            ..CameraConfig::default()
        });
        let mut built = SceneBuilder::new(config).build().unwrap();
        let handle = built.camera("tip").unwrap();
        let camera = built.simu.camera(handle).unwrap();
        assert_eq!(camera.frequency, Some(10.0));
        assert_eq!(camera.attachment().unwrap().link, "arm_link_5");
        assert!(built.simu.graphics().is_some());
        // no graphics output configured, so the main camera stays idle
        assert!(!built.simu.main_camera_mut().unwrap().active);
        assert_eq!(built.save_outputs().unwrap(), Vec::<PathBuf>::new());
    }

    #[test]
    fn attach_offset_matches_axis_angle_product() {
        // Rx(pi) * Rz(pi/2) expressed as roll-pitch-yaw
        let offset = attach_offset(&AttachConfig {
            link: "l".into(),
            xyz: [0.0, 0.0, 0.1],
            rpy: [PI, 0.0, -PI / 2.0],
        });
        let expected = UnitQuaternion::from_axis_angle(&Vector3::x_axis(), PI)
            * UnitQuaternion::from_axis_angle(&Vector3::z_axis(), PI / 2.0);
        assert!(offset.rotation.angle_to(&expected) < 1e-5);
        assert_relative_eq!(offset.translation.vector.z, 0.1);
    }

    #[test]
    fn camera_settings_come_from_config() {
        let camera = camera_from_config(&CameraConfig {
            name: "side".into(),
            width: 64,
            height: 32,
            fov_deg: 90.0,
            look_at: Some(rigsim_core::config::LookAtConfig {
                eye: [0.0, -3.0, 1.0],
                target: [0.0, 0.0, 1.0],
                up: [0.0, 0.0, 1.0],
            }),
            depth_output: Some("depth.png".into()),
            ..CameraConfig::default()
        });
        assert_eq!((camera.intrinsics.width, camera.intrinsics.height), (64, 32));
        assert_relative_eq!(camera.intrinsics.fov, PI / 2.0, epsilon = 1e-6);
        assert!(camera.record_depth);
        assert_relative_eq!(camera.forward(), Vector3::y(), epsilon = 1e-6);
    }
}
