//! The simulation driver.
//!
//! [`Simu`] owns a bevy [`App`] running the full rigsim stack and exposes a
//! RobotDART-like API on top of it: add robots, floors, graphics and
//! cameras, then [`step_world`](Simu::step_world) or [`run`](Simu::run).
//!
//! One step runs the controllers (at the control frequency), the physics
//! step, the sensors (cameras and descriptors) and finally advances the
//! clock.

use std::collections::HashMap;
use std::path::Path;

use bevy::prelude::*;
use nalgebra::{DVector, Isometry3, Vector3};
use rapier3d::prelude::RigidBodyHandle;

use rigsim_control::{ControlError, RobotControl};
use rigsim_core::SimError;
use rigsim_core::config::SimConfig;
use rigsim_core::time::Scheduler;
use rigsim_physics::bridge::register_robot;
use rigsim_physics::components::{JointCommands, JointStates, RobotId};
use rigsim_physics::context::RapierContext;
use rigsim_physics::floor::{FloorSpec, add_floor};
use rigsim_render::camera::{MainCamera, SimCamera, camera_bundle};
use rigsim_render::graphics::MAIN_CAMERA_NAME;
use rigsim_render::png::{save_depth_image, save_png_image};
use rigsim_render::scene::VisualOwner;
use rigsim_render::{
    DepthFrameBuffer, FrameBuffer, Graphics, Lighting, RenderError, RenderSettings, SceneVisuals,
};

use crate::RigsimSimPlugin;
use crate::control::Controllers;
use crate::descriptor::{Descriptor, Descriptors};
use crate::error::SimuError;
use crate::robot::Robot;

// ---------------------------------------------------------------------------
// Handles
// ---------------------------------------------------------------------------

/// A robot inside a [`Simu`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RobotHandle {
    pub name: String,
    pub entity: Entity,
}

/// Index of a camera added with [`Simu::add_camera`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CameraHandle(pub usize);

// ---------------------------------------------------------------------------
// RobotRef
// ---------------------------------------------------------------------------

/// Read access to a simulated robot.
pub struct RobotRef<'a> {
    name: &'a str,
    states: &'a JointStates,
    commands: &'a JointCommands,
    controllers: &'a Controllers,
    context: &'a RapierContext,
}

impl<'a> RobotRef<'a> {
    pub const fn name(&self) -> &'a str {
        self.name
    }

    pub fn dof_names(&self) -> &'a [String] {
        &self.states.names
    }

    pub const fn positions(&self) -> &'a DVector<f32> {
        &self.states.positions
    }

    pub const fn velocities(&self) -> &'a DVector<f32> {
        &self.states.velocities
    }

    /// Commands applied on the last step.
    pub const fn commands(&self) -> &'a DVector<f32> {
        &self.commands.0
    }

    pub fn link_pose(&self, link: &str) -> Option<Isometry3<f32>> {
        self.context.link_pose(self.name, link)
    }

    /// World pose of the root link.
    pub fn base_pose(&self) -> Option<Isometry3<f32>> {
        let root = self.context.robot(self.name)?.root;
        self.context.body_pose(root)
    }

    pub fn num_controllers(&self) -> usize {
        self.controllers.0.len()
    }

    pub fn controller(&self, index: usize) -> Option<&'a dyn RobotControl> {
        self.controllers.0.get(index)
    }
}

// ---------------------------------------------------------------------------
// Simu
// ---------------------------------------------------------------------------

/// # Example
///
/// ```no_run
/// use rigsim_sim::{Robot, Simu};
///
/// let mut simu = Simu::new(0.001).unwrap();
/// let robot = Robot::from_urdf("res/models/arm.urdf", "arm").unwrap();
/// simu.add_robot(robot).unwrap();
/// simu.run(1.0, false).unwrap();
/// println!("{}", simu.robot("arm").unwrap().positions());
/// ```
pub struct Simu {
    app: App,
    robots: Vec<(String, Entity)>,
    cameras: Vec<Entity>,
    main_camera: Option<Entity>,
    graphics: Option<Graphics>,
    stopped: bool,
}

impl Simu {
    /// Simulation with default settings and the given timestep.
    pub fn new(dt: f64) -> Result<Self, SimuError> {
        Self::with_config(SimConfig::with_dt(dt))
    }

    pub fn with_config(config: SimConfig) -> Result<Self, SimuError> {
        config.validate()?;

        let mut app = App::new();
        app.insert_resource(config).add_plugins(RigsimSimPlugin);
        app.finish();
        app.cleanup();

        Ok(Self {
            app,
            robots: Vec::new(),
            cameras: Vec::new(),
            main_camera: None,
            graphics: None,
            stopped: false,
        })
    }

    // -- Rates --

    pub fn timestep(&self) -> f64 {
        self.scheduler().dt()
    }

    pub fn physics_freq(&self) -> f64 {
        1.0 / self.timestep()
    }

    pub fn control_freq(&self) -> f64 {
        self.config().control_hz()
    }

    /// Run the controllers at `freq` Hz. Must not exceed the physics rate.
    pub fn set_control_freq(&mut self, freq: f64) -> Result<(), SimuError> {
        self.scheduler().period_steps(freq)?;
        self.app.world_mut().resource_mut::<SimConfig>().control_freq = Some(freq);
        Ok(())
    }

    pub fn graphics_freq(&self) -> f64 {
        self.config().graphics_freq
    }

    /// Default capture rate of cameras without their own frequency.
    pub fn set_graphics_freq(&mut self, freq: f64) -> Result<(), SimuError> {
        self.scheduler().period_steps(freq)?;
        self.app.world_mut().resource_mut::<SimConfig>().graphics_freq = freq;
        Ok(())
    }

    pub fn gravity(&self) -> Vector3<f32> {
        self.context().gravity
    }

    pub fn set_gravity(&mut self, gravity: Vector3<f32>) {
        let world = self.app.world_mut();
        world.resource_mut::<RapierContext>().gravity = gravity;
        world.resource_mut::<SimConfig>().gravity = [gravity.x, gravity.y, gravity.z];
    }

    // -- Robots --

    /// Put `robot` into the world.
    ///
    /// Its bodies are created at the initial configuration, its controllers
    /// are bound to its degrees of freedom and its visuals become visible to
    /// every camera.
    pub fn add_robot(&mut self, robot: Robot) -> Result<RobotHandle, SimuError> {
        let name = robot.name().to_string();
        if self.robots.iter().any(|(n, _)| *n == name) {
            return Err(SimError::DuplicateRobot(name).into());
        }

        let spec = robot.spec();
        let (model, actuation, mut controllers) = robot.into_parts();

        let mut states = JointStates::for_model(&model);
        for (dof, position) in states.names.iter().zip(states.positions.iter_mut()) {
            *position = spec.initial_positions.get(dof).copied().unwrap_or(0.0);
        }

        let world = self.app.world_mut();
        {
            let mut context = world.resource_mut::<RapierContext>();
            register_robot(&mut context, &model, &spec)?;
            context.read_joint_states(&name, &mut states);
        }
        world.resource_scope(|world, mut visuals: Mut<SceneVisuals>| {
            if let Some(bodies) = world.resource::<RapierContext>().robot(&name) {
                visuals.add_robot(bodies);
            }
        });

        controllers.init_all(&states.view(&actuation));
        let inactive = controllers.iter().filter(|c| !c.active()).count();
        if inactive > 0 {
            warn!("{inactive} controller(s) of robot '{name}' did not activate");
        }

        let entity = world
            .spawn((
                RobotId(name.clone()),
                JointCommands::zeros(model.dof()),
                actuation,
                states,
                Controllers(controllers),
            ))
            .id();
        info!("Added robot '{name}' with {} degrees of freedom", model.dof());

        self.robots.push((name.clone(), entity));
        Ok(RobotHandle { name, entity })
    }

    pub fn remove_robot(&mut self, name: &str) -> Result<(), SimuError> {
        let index = self
            .robots
            .iter()
            .position(|(n, _)| n == name)
            .ok_or_else(|| SimError::RobotNotFound(name.to_string()))?;
        let (name, entity) = self.robots.remove(index);
        self.despawn_robot(name, entity);
        Ok(())
    }

    pub fn clear_robots(&mut self) {
        for (name, entity) in std::mem::take(&mut self.robots) {
            self.despawn_robot(name, entity);
        }
    }

    fn despawn_robot(&mut self, name: String, entity: Entity) {
        let world = self.app.world_mut();
        world.despawn(entity);
        world.resource_mut::<RapierContext>().remove_robot(&name);
        world
            .resource_mut::<SceneVisuals>()
            .remove_owner(&VisualOwner::Robot(name));
    }

    pub fn num_robots(&self) -> usize {
        self.robots.len()
    }

    pub fn robot_names(&self) -> impl Iterator<Item = &str> {
        self.robots.iter().map(|(n, _)| n.as_str())
    }

    pub fn robot(&self, name: &str) -> Option<RobotRef<'_>> {
        let (name, entity) = self.robots.iter().find(|(n, _)| n == name)?;
        let world = self.app.world();
        Some(RobotRef {
            name,
            states: world.get::<JointStates>(*entity)?,
            commands: world.get::<JointCommands>(*entity)?,
            controllers: world.get::<Controllers>(*entity)?,
            context: world.resource::<RapierContext>(),
        })
    }

    /// Set the commands of a robot by hand. Controllers, if any, overwrite
    /// them on the next control step.
    pub fn set_commands(&mut self, name: &str, values: &[f32]) -> Result<(), SimuError> {
        let entity = self.entity(name)?;
        let mut commands = self
            .app
            .world_mut()
            .get_mut::<JointCommands>(entity)
            .ok_or_else(|| SimError::RobotNotFound(name.to_string()))?;
        if commands.0.len() != values.len() {
            return Err(ControlError::DimensionMismatch {
                expected: commands.0.len(),
                got: values.len(),
            }
            .into());
        }
        commands.0.copy_from_slice(values);
        Ok(())
    }

    /// Move a robot to the joint configuration `values` and stop it.
    pub fn set_positions(&mut self, name: &str, values: &[f32]) -> Result<(), SimuError> {
        let entity = self.entity(name)?;
        let world = self.app.world_mut();
        let mut states = world
            .get::<JointStates>(entity)
            .cloned()
            .ok_or_else(|| SimError::RobotNotFound(name.to_string()))?;
        if states.dofs() != values.len() {
            return Err(ControlError::DimensionMismatch {
                expected: states.dofs(),
                got: values.len(),
            }
            .into());
        }

        let positions: HashMap<String, f32> = states
            .names
            .iter()
            .cloned()
            .zip(values.iter().copied())
            .collect();
        world.resource_mut::<RapierContext>().teleport(name, &positions);

        states.positions.copy_from_slice(values);
        states.velocities.fill(0.0);
        world
            .resource::<RapierContext>()
            .read_joint_states(name, &mut states);
        world.entity_mut(entity).insert(states);
        Ok(())
    }

    /// Controller `index` of a robot as its concrete type.
    pub fn controller_mut<T: RobotControl>(&mut self, name: &str, index: usize) -> Option<&mut T> {
        let entity = self.entity(name).ok()?;
        let controllers = self
            .app
            .world_mut()
            .get_mut::<Controllers>(entity)?
            .into_inner();
        controllers.0.downcast_mut::<T>(index)
    }

    fn entity(&self, name: &str) -> Result<Entity, SimError> {
        self.robots
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, e)| *e)
            .ok_or_else(|| SimError::RobotNotFound(name.to_string()))
    }

    // -- Floors --

    /// Single-colour floor. A floor with the same name is replaced.
    pub fn add_floor(&mut self, spec: FloorSpec) -> RigidBodyHandle {
        self.insert_floor(&spec.plain())
    }

    pub fn add_checkerboard_floor(&mut self, mut spec: FloorSpec) -> RigidBodyHandle {
        spec.checkerboard = true;
        self.insert_floor(&spec)
    }

    fn insert_floor(&mut self, spec: &FloorSpec) -> RigidBodyHandle {
        let world = self.app.world_mut();
        let handle = add_floor(&mut world.resource_mut::<RapierContext>(), spec);
        world.resource_mut::<SceneVisuals>().add_floor(spec, handle);
        handle
    }

    // -- Graphics --

    /// Attach a graphics object: its lights and flags drive every camera, and
    /// its main camera is spawned unless disabled. Replaces earlier graphics.
    pub fn set_graphics(&mut self, graphics: Graphics) {
        let world = self.app.world_mut();
        world.insert_resource(graphics.lighting().clone());
        world.resource_mut::<RenderSettings>().enabled = graphics.enabled();

        if let Some(entity) = self.main_camera.take() {
            world.despawn(entity);
        }
        if let Some(camera) = graphics.main_camera() {
            let entity = world.spawn((camera_bundle(camera.clone()), MainCamera)).id();
            self.main_camera = Some(entity);
        }
        self.graphics = Some(graphics);
    }

    pub const fn graphics(&self) -> Option<&Graphics> {
        self.graphics.as_ref()
    }

    /// Latest image of the main camera, once one was captured.
    pub fn graphics_image(&self) -> Option<&FrameBuffer> {
        let frame = self.app.world().get::<FrameBuffer>(self.main_camera?)?;
        (frame.frame_counter() > 0).then_some(frame)
    }

    /// The main camera of the graphics, if it is drawn.
    pub fn main_camera_mut(&mut self) -> Option<&mut SimCamera> {
        let entity = self.main_camera?;
        Some(self.app.world_mut().get_mut::<SimCamera>(entity)?.into_inner())
    }

    pub fn graphics_enabled(&self) -> bool {
        self.app.world().resource::<RenderSettings>().enabled
    }

    /// Turn every camera capture on or off.
    pub fn set_graphics_enabled(&mut self, enable: bool) {
        self.app.world_mut().resource_mut::<RenderSettings>().enabled = enable;
        if let Some(graphics) = &mut self.graphics {
            graphics.set_enable(enable);
        }
    }

    pub fn lighting(&self) -> &Lighting {
        self.app.world().resource::<Lighting>()
    }

    // -- Cameras --

    /// Add a camera. Its own frequency, if any, must be reachable at the
    /// physics rate.
    pub fn add_camera(&mut self, camera: SimCamera) -> Result<CameraHandle, SimuError> {
        if let Some(freq) = camera.frequency {
            self.scheduler().period_steps(freq)?;
        }
        debug!("Adding camera '{}'", camera.name);
        let entity = self.app.world_mut().spawn(camera_bundle(camera)).id();
        self.cameras.push(entity);
        Ok(CameraHandle(self.cameras.len() - 1))
    }

    pub fn num_cameras(&self) -> usize {
        self.cameras.len()
    }

    pub fn camera(&self, handle: CameraHandle) -> Option<&SimCamera> {
        self.app.world().get::<SimCamera>(*self.cameras.get(handle.0)?)
    }

    pub fn camera_mut(&mut self, handle: CameraHandle) -> Option<&mut SimCamera> {
        let entity = *self.cameras.get(handle.0)?;
        Some(self.app.world_mut().get_mut::<SimCamera>(entity)?.into_inner())
    }

    /// Latest colour image of a camera, once one was captured.
    pub fn camera_image(&self, handle: CameraHandle) -> Option<&FrameBuffer> {
        let frame = self.app.world().get::<FrameBuffer>(*self.cameras.get(handle.0)?)?;
        (frame.frame_counter() > 0).then_some(frame)
    }

    /// Latest depth image of a camera recording depth.
    pub fn camera_depth(&self, handle: CameraHandle) -> Option<&DepthFrameBuffer> {
        let depth = self
            .app
            .world()
            .get::<DepthFrameBuffer>(*self.cameras.get(handle.0)?)?;
        (depth.frame_counter() > 0).then_some(depth)
    }

    /// Write the latest image of a camera to a PNG file.
    pub fn save_camera_image(
        &self,
        handle: CameraHandle,
        path: impl AsRef<Path>,
    ) -> Result<(), SimuError> {
        let camera = self.camera(handle).ok_or(SimError::CameraNotFound(handle.0))?;
        let frame = self
            .camera_image(handle)
            .ok_or_else(|| RenderError::NoImage(camera.name.clone()))?;
        save_png_image(path, frame)?;
        Ok(())
    }

    /// Write the latest depth image of a camera to a 16-bit PNG file.
    pub fn save_camera_depth(
        &self,
        handle: CameraHandle,
        path: impl AsRef<Path>,
    ) -> Result<(), SimuError> {
        let camera = self.camera(handle).ok_or(SimError::CameraNotFound(handle.0))?;
        let depth = self
            .camera_depth(handle)
            .ok_or_else(|| RenderError::NoImage(camera.name.clone()))?;
        save_depth_image(path, depth)?;
        Ok(())
    }

    /// Write the latest image of the main camera to a PNG file.
    pub fn save_graphics_image(&self, path: impl AsRef<Path>) -> Result<(), SimuError> {
        let frame = self
            .graphics_image()
            .ok_or_else(|| RenderError::NoImage(MAIN_CAMERA_NAME.into()))?;
        save_png_image(path, frame)?;
        Ok(())
    }

    // -- Descriptors --

    /// Record with `descriptor` every `period` steps. Returns its index.
    pub fn add_descriptor(&mut self, descriptor: Box<dyn Descriptor>, period: u64) -> usize {
        let mut descriptors = self.app.world_mut().resource_mut::<Descriptors>();
        descriptors.add(descriptor, period);
        descriptors.len() - 1
    }

    pub fn descriptor<T: Descriptor>(&self, index: usize) -> Option<&T> {
        self.app.world().resource::<Descriptors>().get::<T>(index)
    }

    /// Stop recording with the descriptor at `index` and hand it back.
    /// Later descriptors move down one index.
    pub fn remove_descriptor(&mut self, index: usize) -> Option<Box<dyn Descriptor>> {
        self.app.world_mut().resource_mut::<Descriptors>().remove(index)
    }

    pub fn clear_descriptors(&mut self) {
        self.app.world_mut().resource_mut::<Descriptors>().clear();
    }

    // -- Stepping --

    /// Advance the world by one timestep. With `reset_commands` every
    /// robot's commands are zeroed afterwards.
    pub fn step_world(&mut self, reset_commands: bool) -> Result<(), SimError> {
        self.app.update();

        if self.context().has_diverged() {
            warn!("Physics diverged at t = {:.3}", self.scheduler().current_time());
            return Err(SimError::PhysicsDiverged);
        }
        if reset_commands {
            let world = self.app.world_mut();
            let mut commands = world.query::<&mut JointCommands>();
            for mut command in commands.iter_mut(world) {
                command.reset();
            }
        }
        Ok(())
    }

    /// Step until `max_duration` seconds have passed or the simulation is
    /// stopped.
    pub fn run(&mut self, max_duration: f64, reset_commands: bool) -> Result<(), SimError> {
        let end = self.scheduler().current_time() + max_duration;
        let mut steps = 0_u64;
        while !self.stopped && self.scheduler().next_time() <= end + 1e-9 {
            self.step_world(reset_commands)?;
            steps += 1;
            if self.graphics.as_ref().is_some_and(Graphics::done) {
                break;
            }
        }
        info!(
            "Ran {steps} steps, t = {:.3} s, real-time factor {:.2}",
            self.scheduler().current_time(),
            self.scheduler().real_time_factor().unwrap_or(0.0)
        );
        Ok(())
    }

    /// Request [`run`](Self::run) to return, or clear the request.
    pub const fn stop_sim(&mut self, stop: bool) {
        self.stopped = stop;
    }

    pub const fn halted_sim(&self) -> bool {
        self.stopped
    }

    pub fn scheduler(&self) -> &Scheduler {
        self.app.world().resource::<Scheduler>()
    }

    fn config(&self) -> &SimConfig {
        self.app.world().resource::<SimConfig>()
    }

    fn context(&self) -> &RapierContext {
        self.app.world().resource::<RapierContext>()
    }

    pub const fn app(&self) -> &App {
        &self.app
    }

    pub const fn app_mut(&mut self) -> &mut App {
        &mut self.app
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
