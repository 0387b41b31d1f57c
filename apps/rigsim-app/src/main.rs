//! rigsim command-line runner.
//!
//! Runs a robot scene for a fixed simulated duration and saves the camera
//! images. Without `--scene` it runs the built-in arm scene: a four-joint
//! arm driven to a fixed pose under proportional control, photographed by a
//! camera mounted on its wrist.

mod controller;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use bevy::log::{Level, LogPlugin, info};
use bevy::prelude::App;
use clap::{Parser, Subcommand};
use nalgebra::{Isometry3, Translation3, UnitQuaternion, Vector3};

use rigsim_physics::floor::FloorSpec;
use rigsim_render::Graphics;
use rigsim_render::camera::SimCamera;
use rigsim_render::config::{CameraIntrinsics, GraphicsConfiguration};
use rigsim_sim::{CameraHandle, Robot, SceneBuilder, Simu};

use crate::controller::PositionController;

const DEFAULT_URDF: &str = "res/models/arm.urdf";
const ROBOT_NAME: &str = "arm";
const TARGET: [f32; 4] = [0.0, 2.0, -0.5, 0.7];
const DT: f64 = 0.001;

// ---------------------------------------------------------------------------
// CLI
// ---------------------------------------------------------------------------

#[derive(Parser)]
#[command(version, about = "rigsim robot simulation runner")]
struct Cli {
    /// Minimum level of log messages
    #[arg(long, global = true, default_value = "info")]
    log_level: Level,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a scene and save its camera images
    Run {
        /// TOML scene file; the built-in arm scene when omitted
        #[arg(long)]
        scene: Option<PathBuf>,

        /// Arm model for the built-in scene
        #[arg(long, default_value = DEFAULT_URDF)]
        urdf: PathBuf,

        /// Simulated seconds to run (built-in scene)
        #[arg(long, default_value_t = 5.0)]
        duration: f64,

        /// Where the built-in scene saves the wrist camera image
        #[arg(long, default_value = "camera.png")]
        output: PathBuf,

        /// Also render the main view and save it here
        #[arg(long, conflicts_with = "no_graphics")]
        graphics_output: Option<PathBuf>,

        /// Run without graphics settings; only the cameras render
        #[arg(long)]
        no_graphics: bool,
    },
    /// Print the joints and links of a URDF model
    Info {
        #[arg(long, default_value = DEFAULT_URDF)]
        urdf: PathBuf,
    },
}

// ---------------------------------------------------------------------------
// Logging
// ---------------------------------------------------------------------------

/// `LogPlugin` installs the global subscriber; every app created afterwards
/// logs through it.
fn init_logging(level: Level) {
    let mut app = App::new();
    app.add_plugins(LogPlugin {
        level,
        ..Default::default()
    });
}

// ---------------------------------------------------------------------------
// Modes
// ---------------------------------------------------------------------------

fn print_joints(simu: &Simu, name: &str) {
    let Some(robot) = simu.robot(name) else {
        return;
    };
    for (dof, q) in robot.dof_names().iter().zip(robot.positions().iter()) {
        println!("  {dof:<16} {q:>9.4}");
    }
}

#[allow(clippy::approx_constant)]
fn wrist_camera() -> SimCamera {
    let rotation = UnitQuaternion::from_axis_angle(&Vector3::x_axis(), 3.14)
        * UnitQuaternion::from_axis_angle(&Vector3::z_axis(), 1.57);
    let mut camera = SimCamera::new("camera", CameraIntrinsics::new(256, 256));
    camera.attach_to(
        "arm_link_5",
        Isometry3::from_parts(Translation3::new(0.0, 0.0, 0.1), rotation),
    );
    camera
}

/// Builds the arm scene. The main view only renders with `draw_main`.
fn arm_scene(urdf: &Path, no_graphics: bool, draw_main: bool) -> Result<(Simu, CameraHandle)> {
    let mut robot = Robot::from_urdf(urdf, ROBOT_NAME)
        .with_context(|| format!("failed to load {}", urdf.display()))?;
    robot.fix_to_world();
    robot.add_controller(PositionController::new(&TARGET), 1.0);

    let mut simu = Simu::new(DT)?;
    simu.add_robot(robot)?;
    if !no_graphics {
        simu.set_graphics(Graphics::new(GraphicsConfiguration {
            width: 640,
            height: 480,
            shadowed: true,
            transparent_shadows: false,
            ..GraphicsConfiguration::default()
        }));
        if let Some(main) = simu.main_camera_mut() {
            main.active = draw_main;
        }
    }
    simu.add_checkerboard_floor(FloorSpec::default());
    let camera = simu.add_camera(wrist_camera())?;
    Ok((simu, camera))
}

fn run_arm(
    urdf: &Path,
    duration: f64,
    output: &Path,
    graphics_output: Option<&Path>,
    no_graphics: bool,
) -> Result<()> {
    let (mut simu, camera) = arm_scene(urdf, no_graphics, graphics_output.is_some())?;

    println!("initial joint positions:");
    print_joints(&simu, ROBOT_NAME);

    simu.run(duration, false)?;

    println!("final joint positions (target {TARGET:?}):");
    print_joints(&simu, ROBOT_NAME);

    simu.save_camera_image(camera, output)
        .with_context(|| format!("failed to save {}", output.display()))?;
    println!("saved {}", output.display());
    if let Some(path) = graphics_output {
        simu.save_graphics_image(path)
            .with_context(|| format!("failed to save {}", path.display()))?;
        println!("saved {}", path.display());
    }
    Ok(())
}

fn run_scene(path: &Path, graphics_output: Option<PathBuf>, no_graphics: bool) -> Result<()> {
    let mut scene = SceneBuilder::from_file(path)
        .with_context(|| format!("failed to load scene {}", path.display()))?
        .with_controller_factory(controller::factory)
        .build()?;
    if no_graphics {
        if let Some(main) = scene.simu.main_camera_mut() {
            main.active = false;
        }
        scene.graphics_output = None;
    } else if let Some(output) = graphics_output {
        if let Some(main) = scene.simu.main_camera_mut() {
            main.active = true;
        }
        scene.graphics_output = Some(output);
    }

    let names: Vec<String> = scene.simu.robot_names().map(str::to_owned).collect();
    for name in &names {
        println!("{name}: initial joint positions:");
        print_joints(&scene.simu, name);
    }

    scene.run()?;
    info!("scene finished after {:.3} s", scene.simu.scheduler().current_time());

    for name in &names {
        println!("{name}: final joint positions:");
        print_joints(&scene.simu, name);
    }
    for path in scene.save_outputs()? {
        println!("saved {}", path.display());
    }
    Ok(())
}

fn run_info(urdf: &Path) -> Result<()> {
    let robot = Robot::from_urdf(urdf, ROBOT_NAME)
        .with_context(|| format!("failed to load {}", urdf.display()))?;
    let model = robot.model();

    println!("rigsim v{}", env!("CARGO_PKG_VERSION"));
    println!();
    println!("model: {} (root link {})", model.name, model.root_link);
    println!("dofs ({}):", robot.num_dofs());
    for name in robot.dof_names() {
        let joint = model.joint(name)?;
        let lower = joint.limits.lower.unwrap_or(f32::NEG_INFINITY);
        let upper = joint.limits.upper.unwrap_or(f32::INFINITY);
        println!("  {name:<16} {:?} [{lower}, {upper}]", joint.joint_type);
    }
    println!("links:");
    for name in robot.link_names() {
        println!("  {name}");
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_level);

    match cli.command {
        Some(Commands::Run {
            scene: Some(scene),
            graphics_output,
            no_graphics,
            ..
        }) => run_scene(&scene, graphics_output, no_graphics),
        Some(Commands::Run {
            scene: None,
            urdf,
            duration,
            output,
            graphics_output,
            no_graphics,
        }) => run_arm(&urdf, duration, &output, graphics_output.as_deref(), no_graphics),
        Some(Commands::Info { urdf }) => run_info(&urdf),
        None => {
            // Default: the built-in arm scene
            run_arm(Path::new(DEFAULT_URDF), 5.0, Path::new("camera.png"), None, false)
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
