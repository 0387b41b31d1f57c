//! Static floors.

use nalgebra::{Isometry3, Translation3, UnitQuaternion, Vector3};
use rapier3d::prelude::{
    ColliderBuilder, Group, InteractionGroups, RigidBodyBuilder, RigidBodyHandle,
};

use rigsim_core::config::FloorConfig;

use crate::context::{FLOOR_GROUP, RapierContext};

const FLOOR_FRICTION: f32 = 1.0;

/// A square floor slab. Its top face lies at `pose`, centred on it.
#[derive(Debug, Clone, PartialEq)]
pub struct FloorSpec {
    pub name: String,
    pub width: f32,
    pub thickness: f32,
    pub square_size: f32,
    pub pose: Isometry3<f32>,
    pub checkerboard: bool,
    pub first_color: [f32; 4],
    pub second_color: [f32; 4],
}

impl Default for FloorSpec {
    fn default() -> Self {
        Self::from_config(&FloorConfig::default())
    }
}

impl FloorSpec {
    pub fn from_config(config: &FloorConfig) -> Self {
        Self {
            name: config.name.clone(),
            width: config.width,
            thickness: config.thickness,
            square_size: config.square_size,
            pose: pose_from_vector(&config.pose),
            checkerboard: config.checkerboard,
            first_color: config.first_color,
            second_color: config.second_color,
        }
    }

    /// Plain single-colour floor.
    #[must_use]
    pub fn plain(mut self) -> Self {
        self.checkerboard = false;
        self
    }

    /// Half extents of the slab.
    pub fn half_extents(&self) -> Vector3<f32> {
        Vector3::new(self.width / 2.0, self.width / 2.0, self.thickness / 2.0)
    }

    /// Offset of the slab centre from `pose`.
    pub fn slab_offset(&self) -> Isometry3<f32> {
        Isometry3::translation(0.0, 0.0, -self.thickness / 2.0)
    }
}

/// Pose from `[rx, ry, rz, x, y, z]`: an axis-angle rotation vector followed
/// by a translation.
pub fn pose_from_vector(v: &[f32; 6]) -> Isometry3<f32> {
    Isometry3::from_parts(
        Translation3::new(v[3], v[4], v[5]),
        UnitQuaternion::from_scaled_axis(Vector3::new(v[0], v[1], v[2])),
    )
}

/// Add a fixed floor slab that collides with every robot. A floor with the
/// same name is replaced.
pub fn add_floor(context: &mut RapierContext, spec: &FloorSpec) -> RigidBodyHandle {
    let body = RigidBodyBuilder::fixed().position(spec.pose).build();
    let handle = context.rigid_body_set.insert(body);

    let half = spec.half_extents();
    let collider = ColliderBuilder::cuboid(half.x, half.y, half.z)
        .position(spec.slab_offset())
        .friction(FLOOR_FRICTION)
        .collision_groups(InteractionGroups::new(FLOOR_GROUP, Group::ALL))
        .build();
    context
        .collider_set
        .insert_with_parent(collider, handle, &mut context.rigid_body_set);
    context.insert_floor(spec.name.clone(), handle);
    handle
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
