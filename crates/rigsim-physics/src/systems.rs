//! Rapier physics step system.

use bevy::prelude::*;

use crate::components::{Actuation, JointCommands, JointStates, RobotId};
use crate::context::RapierContext;

/// Apply joint commands, step physics, read back joint state.
#[allow(clippy::needless_pass_by_value)]
pub fn physics_step_system(
    mut context: ResMut<RapierContext>,
    mut robots: Query<(&RobotId, &JointCommands, &Actuation, &mut JointStates)>,
) {
    // 1. Program joint motors from the commands of this step.
    for (id, commands, actuation, states) in &robots {
        context.apply_actuation(&id.0, commands, actuation, states);
    }

    // 2. Step physics.
    context.step();

    // 3. Read back joint state from rigid body transforms.
    for (id, _, _, mut states) in &mut robots {
        context.read_joint_states(&id.0, &mut states);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
