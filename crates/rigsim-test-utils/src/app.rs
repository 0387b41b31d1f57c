//! Bevy test app builders.

use bevy::app::Plugins;
use bevy::prelude::*;
use rigsim_core::config::SimConfig;

/// Create a minimal test app with only the core plugin.
///
/// Provides `RigsimSet` system ordering, the scheduler and the clock, with
/// the given physics timestep.
pub fn minimal_test_app(dt: f64) -> App {
    let mut app = App::new();
    app.insert_resource(SimConfig::with_dt(dt));
    app.add_plugins(rigsim_core::RigsimCorePlugin);
    app.finish();
    app.cleanup();
    app
}

/// Create a test app with the core plugin followed by `plugins`.
///
/// Plugins cannot be added once an app is finished, so crates that need their
/// own plugin in a test build it through here.
pub fn test_app_with<M>(dt: f64, plugins: impl Plugins<M>) -> App {
    let mut app = App::new();
    app.insert_resource(SimConfig::with_dt(dt));
    app.add_plugins(rigsim_core::RigsimCorePlugin);
    app.add_plugins(plugins);
    app.finish();
    app.cleanup();
    app
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
