// rigsim-core: system ordering, config, clock and errors shared by every rigsim crate.

pub mod config;
pub mod error;
pub mod time;

use bevy::prelude::*;

use crate::config::SimConfig;
use crate::time::{Scheduler, SimTime};

// ---------------------------------------------------------------------------
// Re-exports
// ---------------------------------------------------------------------------

pub use error::{ConfigError, RigsimError, SimError};

// ---------------------------------------------------------------------------
// RigsimSet
// ---------------------------------------------------------------------------

/// Ordered phases of one simulation step.
///
/// Every `App::update()` runs the sets in declaration order, and one update
/// corresponds to exactly one physics step of `SimConfig::physics_dt`.
#[derive(SystemSet, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RigsimSet {
    /// Controllers turn joint state into joint commands.
    Control,
    /// Commands are applied and the physics world is integrated.
    Simulate,
    /// Cameras and descriptors observe the freshly integrated state.
    Sense,
    /// The clock moves forward by one timestep.
    Advance,
}

// ---------------------------------------------------------------------------
// RigsimCorePlugin
// ---------------------------------------------------------------------------

/// Installs the clock, the scheduler and the phase ordering.
///
/// A [`SimConfig`] inserted before this plugin is kept; otherwise the
/// default configuration is used.
pub struct RigsimCorePlugin;

impl Plugin for RigsimCorePlugin {
    fn build(&self, app: &mut App) {
        let config = app
            .world()
            .get_resource::<SimConfig>()
            .cloned()
            .unwrap_or_default();

        app.insert_resource(Scheduler::new(config.physics_dt).with_sync(config.sync))
            .init_resource::<SimTime>()
            .insert_resource(config)
            .configure_sets(
                Update,
                (
                    RigsimSet::Control,
                    RigsimSet::Simulate,
                    RigsimSet::Sense,
                    RigsimSet::Advance,
                )
                    .chain(),
            )
            .add_systems(Update, advance_clock_system.in_set(RigsimSet::Advance));
    }
}

/// Advance the scheduler by one step and mirror its time into [`SimTime`].
pub fn advance_clock_system(mut scheduler: ResMut<Scheduler>, mut time: ResMut<SimTime>) {
    scheduler.step();
    *time = scheduler.time();
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
