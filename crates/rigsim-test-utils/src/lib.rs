//! Shared test fixtures and utilities for rigsim crates.
//!
//! Provides URDF fixtures (the bundled arm plus small single-joint robots)
//! and Bevy test app builders.

pub mod app;
pub mod fixtures;

// ---------------------------------------------------------------------------
// Re-exports for convenience
// ---------------------------------------------------------------------------

pub use app::{minimal_test_app, test_app_with};
pub use fixtures::{
    ARM_URDF, PENDULUM_URDF, SLIDER_URDF, WHEEL_URDF, arm_model, arm_urdf_path, pendulum_model,
    slider_model, wheel_model,
};
