//! Visual geometry known to the renderer.
//!
//! Visual shapes are kept separately from the physics colliders: a link may
//! look different from how it collides, and purely visual links (no collision
//! element) must still be drawn.

use bevy::log::debug;
use bevy::prelude::*;
use nalgebra::{Isometry3, Point3};
use rapier3d::parry::bounding_volume::Aabb;
use rapier3d::prelude::{RigidBodyHandle, SharedShape};

use rigsim_physics::context::{RapierContext, RobotBodies};
use rigsim_physics::floor::FloorSpec;
use rigsim_physics::shapes::geometry_shape;

/// Colour of robot visuals without a material.
pub const DEFAULT_COLOR: [f32; 4] = [0.7, 0.7, 0.7, 1.0];

// ---------------------------------------------------------------------------
// Appearance
// ---------------------------------------------------------------------------

/// Surface colouring of a visual shape. Colours are linear RGBA in `[0, 1]`.
#[derive(Clone, Debug, PartialEq)]
pub enum Appearance {
    Solid([f32; 4]),
    /// Squares on the shape's local x-y plane.
    Checker {
        square_size: f32,
        first: [f32; 4],
        second: [f32; 4],
    },
}

impl Appearance {
    /// Colour at a point in the shape's local frame.
    pub fn color_at(&self, local: &Point3<f32>) -> [f32; 4] {
        match self {
            Self::Solid(color) => *color,
            Self::Checker {
                square_size,
                first,
                second,
            } => {
                let size = square_size.max(f32::EPSILON);
                #[allow(clippy::cast_possible_truncation)]
                let parity = ((local.x / size).floor() as i64 + (local.y / size).floor() as i64)
                    .rem_euclid(2);
                if parity == 0 { *first } else { *second }
            }
        }
    }

    /// Opacity used for shadows; checkerboards use their first colour.
    pub const fn alpha(&self) -> f32 {
        match self {
            Self::Solid(color) => color[3],
            Self::Checker { first, .. } => first[3],
        }
    }
}

// ---------------------------------------------------------------------------
// VisualShape
// ---------------------------------------------------------------------------

/// Who added a visual, so it can be removed together with its source.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum VisualOwner {
    Robot(String),
    Floor(String),
}

#[derive(Clone, Debug)]
pub struct VisualShape {
    pub owner: VisualOwner,
    /// Body the shape moves with. `None` for static shapes placed in the
    /// world frame.
    pub body: Option<RigidBodyHandle>,
    /// Shape pose in the body (or world) frame.
    pub offset: Isometry3<f32>,
    pub shape: SharedShape,
    pub appearance: Appearance,
}

/// A visual shape resolved to its world pose for one frame.
#[derive(Clone, Debug)]
pub struct PlacedShape<'a> {
    pub pose: Isometry3<f32>,
    pub aabb: Aabb,
    pub shape: &'a SharedShape,
    pub appearance: &'a Appearance,
}

// ---------------------------------------------------------------------------
// SceneVisuals
// ---------------------------------------------------------------------------

/// Every shape the cameras can see.
#[derive(Resource, Default, Clone, Debug)]
pub struct SceneVisuals {
    shapes: Vec<VisualShape>,
}

impl SceneVisuals {
    pub fn push(&mut self, shape: VisualShape) {
        self.shapes.push(shape);
    }

    pub fn len(&self) -> usize {
        self.shapes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shapes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &VisualShape> {
        self.shapes.iter()
    }

    /// Drop every shape added by `owner`. Returns how many were removed.
    pub fn remove_owner(&mut self, owner: &VisualOwner) -> usize {
        let before = self.shapes.len();
        self.shapes.retain(|s| &s.owner != owner);
        before - self.shapes.len()
    }

    /// Add the URDF visual elements of a registered robot.
    ///
    /// Links without visual elements fall back to their collision geometry.
    pub fn add_robot(&mut self, bodies: &RobotBodies) -> usize {
        let owner = VisualOwner::Robot(bodies.name.clone());
        let model = &bodies.model;
        let mut added = 0;

        for (link_name, &handle) in &bodies.links {
            let Some(link) = model.links.get(link_name) else {
                continue;
            };

            let elements: Vec<_> = if link.visuals.is_empty() {
                link.collisions
                    .iter()
                    .map(|c| (&c.origin, &c.geometry, None))
                    .collect()
            } else {
                link.visuals
                    .iter()
                    .map(|v| (&v.origin, &v.geometry, v.material.as_ref()))
                    .collect()
            };

            for (origin, geometry, material) in elements {
                let Some((shape, alignment)) = geometry_shape(geometry) else {
                    continue;
                };
                let color = material
                    .and_then(|m| model.material_color(m))
                    .unwrap_or(DEFAULT_COLOR);
                self.shapes.push(VisualShape {
                    owner: owner.clone(),
                    body: Some(handle),
                    offset: origin.isometry() * alignment,
                    shape,
                    appearance: Appearance::Solid(color),
                });
                added += 1;
            }
        }

        debug!("Added {added} visual shapes for robot '{}'", bodies.name);
        added
    }

    /// Add the slab of a floor created with `add_floor`. A floor with the
    /// same name is replaced.
    pub fn add_floor(&mut self, spec: &FloorSpec, body: RigidBodyHandle) {
        let owner = VisualOwner::Floor(spec.name.clone());
        self.remove_owner(&owner);

        let half = spec.half_extents();
        let appearance = if spec.checkerboard {
            Appearance::Checker {
                square_size: spec.square_size,
                first: spec.first_color,
                second: spec.second_color,
            }
        } else {
            Appearance::Solid(spec.first_color)
        };
        self.shapes.push(VisualShape {
            owner,
            body: Some(body),
            offset: spec.slab_offset(),
            shape: SharedShape::cuboid(half.x, half.y, half.z),
            appearance,
        });
    }

    /// World poses and bounds of all shapes whose body still exists.
    pub fn place<'a>(&'a self, context: &RapierContext) -> Vec<PlacedShape<'a>> {
        self.shapes
            .iter()
            .filter_map(|visual| {
                let pose = match visual.body {
                    Some(handle) => context.body_pose(handle)? * visual.offset,
                    None => visual.offset,
                };
                Some(PlacedShape {
                    pose,
                    aabb: visual.shape.compute_aabb(&pose),
                    shape: &visual.shape,
                    appearance: &visual.appearance,
                })
            })
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use nalgebra::Vector3;
    use rigsim_physics::bridge::{RobotSpec, register_robot};
    use rigsim_physics::floor::add_floor;
    use rigsim_test_utils::arm_model;

    use super::*;

    fn context() -> RapierContext {
        RapierContext::new(Vector3::new(0.0, 0.0, -9.81), 0.001)
    }

    #[test]
    fn checker_alternates() {
        let checker = Appearance::Checker {
            square_size: 1.0,
            first: [1.0; 4],
            second: [0.0, 0.0, 0.0, 1.0],
        };
        assert_eq!(checker.color_at(&Point3::new(0.5, 0.5, 0.0)), [1.0; 4]);
        assert_eq!(checker.color_at(&Point3::new(1.5, 0.5, 0.0))[0], 0.0);
        assert_eq!(checker.color_at(&Point3::new(-0.5, 0.5, 0.0))[0], 0.0);
        assert_eq!(checker.color_at(&Point3::new(-0.5, -0.5, 0.0)), [1.0; 4]);
    }

    #[test]
    fn alpha_of_appearances() {
        assert_relative_eq!(Appearance::Solid([1.0, 0.0, 0.0, 0.4]).alpha(), 0.4);
    }

    #[test]
    fn robot_visuals_follow_bodies() {
        let mut ctx = context();
        let model = arm_model();
        register_robot(&mut ctx, &model, &RobotSpec::new("arm")).unwrap();

        let mut visuals = SceneVisuals::default();
        let added = visuals.add_robot(ctx.robot("arm").unwrap());
        assert!(added >= 6);
        assert_eq!(visuals.len(), added);

        let placed = visuals.place(&ctx);
        assert_eq!(placed.len(), added);
        // the tip sphere sits 1 m above the base when the arm is straight
        let highest = placed
            .iter()
            .map(|p| p.aabb.maxs.z)
            .fold(f32::MIN, f32::max);
        assert_relative_eq!(highest, 1.025, epsilon = 1e-3);
    }

    #[test]
    fn floor_is_replaced_and_removed() {
        let mut ctx = context();
        let spec = FloorSpec::default();
        let mut visuals = SceneVisuals::default();

        let handle = add_floor(&mut ctx, &spec);
        visuals.add_floor(&spec, handle);
        let handle = add_floor(&mut ctx, &spec);
        visuals.add_floor(&spec, handle);
        assert_eq!(visuals.len(), 1);

        let placed = visuals.place(&ctx);
        assert_relative_eq!(placed[0].aabb.maxs.z, 0.0, epsilon = 1e-6);
        assert!(matches!(placed[0].appearance, Appearance::Checker { .. }));

        let owner = VisualOwner::Floor(spec.name.clone());
        assert_eq!(visuals.remove_owner(&owner), 1);
        assert!(visuals.is_empty());
    }

    #[test]
    fn shapes_of_removed_bodies_are_skipped() {
        let mut ctx = context();
        let model = arm_model();
        register_robot(&mut ctx, &model, &RobotSpec::new("arm")).unwrap();
        let mut visuals = SceneVisuals::default();
        visuals.add_robot(ctx.robot("arm").unwrap());

        ctx.remove_robot("arm");
        assert!(visuals.place(&ctx).is_empty());
    }
}
