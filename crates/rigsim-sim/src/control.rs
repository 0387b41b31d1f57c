//! Controller evaluation inside the simulation loop.

use bevy::prelude::*;

use rigsim_control::ControllerSet;
use rigsim_core::config::SimConfig;
use rigsim_core::time::Scheduler;
use rigsim_physics::components::{Actuation, JointCommands, JointStates, RobotId};

/// The controllers of a simulated robot.
#[derive(Component, Debug, Clone, Default)]
pub struct Controllers(pub ControllerSet);

/// Compute every robot's commands from its controllers.
///
/// Runs in [`RigsimSet::Control`](rigsim_core::RigsimSet::Control) on steps
/// where the control frequency fires. Robots without controllers keep the
/// commands set by hand. When a controller fails the previous commands stay
/// in place.
#[allow(clippy::needless_pass_by_value)] // Bevy system parameters are extracted by value
pub fn robot_control_system(
    scheduler: Res<Scheduler>,
    config: Res<SimConfig>,
    mut robots: Query<(
        &RobotId,
        &JointStates,
        &Actuation,
        &mut Controllers,
        &mut JointCommands,
    )>,
) {
    if !scheduler.schedule(config.control_hz()) {
        return;
    }
    let t = scheduler.current_time();

    for (id, states, actuation, mut controllers, mut commands) in &mut robots {
        if controllers.0.is_empty() {
            continue;
        }
        let view = states.view(actuation);
        match controllers.0.compute(t, &view) {
            Ok(cmd) => commands.0 = cmd,
            Err(err) => warn!("Controllers of robot '{}' failed at t = {t:.3}: {err}", id.0),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use nalgebra::DVector;
    use rigsim_control::{PdControl, SimpleControl};
    use rigsim_core::RigsimSet;
    use rigsim_core::config::ActuatorType;
    use rigsim_test_utils::{arm_model, minimal_test_app};

    use super::*;

    fn spawn_arm(app: &mut App, controllers: ControllerSet) -> Entity {
        let model = arm_model();
        let actuation = Actuation::from_model(&model, ActuatorType::Torque);
        let states = JointStates::for_model(&model);
        let mut controllers = Controllers(controllers);
        controllers.0.init_all(&states.view(&actuation));
        app.world_mut()
            .spawn((
                RobotId("arm".into()),
                JointCommands::zeros(model.dof()),
                actuation,
                states,
                controllers,
            ))
            .id()
    }

    fn control_app(dt: f64, control_freq: Option<f64>) -> App {
        let mut app = minimal_test_app(dt);
        app.world_mut().resource_mut::<SimConfig>().control_freq = control_freq;
        app.add_systems(Update, robot_control_system.in_set(RigsimSet::Control));
        app
    }

    #[test]
    fn proportional_commands_follow_the_error() {
        let mut app = control_app(0.001, None);
        let mut set = ControllerSet::new();
        let mut pd = PdControl::new(&[0.0, 2.0, -0.5, 0.7]);
        pd.set_pd(100.0, 0.0);
        set.add(Box::new(pd), 1.0);
        let arm = spawn_arm(&mut app, set);
        app.update();

        let cmd = &app.world().get::<JointCommands>(arm).unwrap().0;
        let expected = DVector::from_vec(vec![0.0, 200.0, -50.0, 70.0]);
        assert_relative_eq!(*cmd, expected, epsilon = 1e-4);
    }

    #[test]
    fn robots_without_controllers_keep_manual_commands() {
        let mut app = control_app(0.001, None);
        let arm = spawn_arm(&mut app, ControllerSet::new());
        app.world_mut().get_mut::<JointCommands>(arm).unwrap().0 = DVector::from_element(4, 1.5);
        app.update();
        let cmd = &app.world().get::<JointCommands>(arm).unwrap().0;
        assert_eq!(*cmd, DVector::from_element(4, 1.5));
    }

    #[test]
    fn control_runs_at_its_own_rate() {
        // 100 Hz control on a 1 kHz physics clock
        let mut app = control_app(0.001, Some(100.0));
        let mut set = ControllerSet::new();
        set.add(Box::new(SimpleControl::new(&[1.0; 4])), 1.0);
        let arm = spawn_arm(&mut app, set);

        app.update();
        assert_eq!(app.world().get::<JointCommands>(arm).unwrap().0[0], 1.0);

        app.world_mut().get_mut::<JointCommands>(arm).unwrap().0.fill(0.0);
        for _ in 0..9 {
            app.update();
        }
        assert_eq!(app.world().get::<JointCommands>(arm).unwrap().0[0], 0.0);
        app.update();
        assert_eq!(app.world().get::<JointCommands>(arm).unwrap().0[0], 1.0);
    }

    #[test]
    fn failing_controller_keeps_previous_commands() {
        let mut app = control_app(0.001, None);
        let mut set = ControllerSet::new();
        set.add(Box::new(SimpleControl::new(&[f32::NAN, 0.0, 0.0, 0.0])), 1.0);
        let arm = spawn_arm(&mut app, set);
        app.world_mut().get_mut::<JointCommands>(arm).unwrap().0 = DVector::from_element(4, 2.0);
        app.update();
        let cmd = &app.world().get::<JointCommands>(arm).unwrap().0;
        assert_eq!(*cmd, DVector::from_element(4, 2.0));
    }
}
