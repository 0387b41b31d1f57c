//! The physics plugin.

use bevy::prelude::*;
use nalgebra::Vector3;

use rigsim_core::RigsimSet;
use rigsim_core::config::SimConfig;

use crate::context::RapierContext;
use crate::systems::physics_step_system;

/// Inserts a [`RapierContext`] built from [`SimConfig`] and registers the
/// physics step in [`RigsimSet::Simulate`].
///
/// Add after `RigsimCorePlugin`, which provides the configuration.
pub struct RigsimPhysicsPlugin;

impl Plugin for RigsimPhysicsPlugin {
    fn build(&self, app: &mut App) {
        let config = app
            .world()
            .get_resource::<SimConfig>()
            .cloned()
            .unwrap_or_default();

        let [gx, gy, gz] = config.gravity;
        #[allow(clippy::cast_possible_truncation)]
        let dt = config.physics_dt as f32;

        app.insert_resource(RapierContext::new(Vector3::new(gx, gy, gz), dt))
            .add_systems(Update, physics_step_system.in_set(RigsimSet::Simulate));
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
