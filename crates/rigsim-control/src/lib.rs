//! Framework-agnostic robot controllers.
//!
//! Pure Rust library with no engine dependencies. A controller reads a
//! [`RobotView`] (joint names, positions, velocities) and returns one
//! command per controlled degree of freedom. A robot combines its
//! controllers through a [`ControllerSet`], which scales each output by the
//! controller's weight and sums them into the full command vector.
//!
//! # Quick Start
//!
//! ```
//! use nalgebra::DVector;
//! use rigsim_control::prelude::*;
//!
//! let names = vec!["shoulder".to_string(), "elbow".to_string()];
//! let q = DVector::from_vec(vec![0.0, 0.0]);
//! let dq = DVector::zeros(2);
//! let view = RobotView::new(&names, &q, &dq);
//!
//! let mut set = ControllerSet::new();
//! set.add(Box::new(PdControl::new(&[1.0, -1.0])), 1.0);
//! set.init_all(&view);
//! let cmd = set.compute(0.0, &view).unwrap();
//! assert_eq!(cmd.len(), 2);
//! ```

pub mod control;
pub mod error;
pub mod pd;
pub mod set;
pub mod simple;
pub mod view;

pub use control::{ControlBase, RobotControl};
pub use error::ControlError;
pub use pd::PdControl;
pub use set::ControllerSet;
pub use simple::SimpleControl;
pub use view::RobotView;

/// Convenience re-exports for common usage.
pub mod prelude {
    pub use crate::control::{ControlBase, RobotControl};
    pub use crate::error::ControlError;
    pub use crate::pd::PdControl;
    pub use crate::set::ControllerSet;
    pub use crate::simple::SimpleControl;
    pub use crate::view::RobotView;
}
