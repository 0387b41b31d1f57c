//! URDF geometry to parry shapes.

use std::f32::consts::FRAC_PI_2;

use bevy::log::warn;
use nalgebra::{Isometry3, Point3, UnitQuaternion, Vector3};
use rapier3d::prelude::SharedShape;

use rigsim_urdf::Geometry;

/// Shape for a URDF geometry, plus the rotation that aligns parry's
/// y-aligned cylinders and capsules with the URDF z-axis.
///
/// Ellipsoids become the convex hull of a sampled surface. Meshes are not
/// supported and yield `None`.
pub fn geometry_shape(geometry: &Geometry) -> Option<(SharedShape, Isometry3<f32>)> {
    let z_aligned = Isometry3::from_parts(
        Vector3::zeros().into(),
        UnitQuaternion::from_axis_angle(&Vector3::x_axis(), FRAC_PI_2),
    );
    match geometry {
        Geometry::Sphere { radius } => Some((SharedShape::ball(*radius), Isometry3::identity())),
        Geometry::Box { size } => Some((
            SharedShape::cuboid(size[0] / 2.0, size[1] / 2.0, size[2] / 2.0),
            Isometry3::identity(),
        )),
        Geometry::Ellipsoid { diameters } => {
            let radii = Vector3::from(*diameters) / 2.0;
            let shape = SharedShape::convex_hull(&ellipsoid_points(&radii));
            if shape.is_none() {
                warn!("Ellipsoid {diameters:?} has no volume, skipping");
            }
            Some((shape?, Isometry3::identity()))
        }
        Geometry::Cylinder { radius, length } => {
            Some((SharedShape::cylinder(length / 2.0, *radius), z_aligned))
        }
        Geometry::Capsule { radius, length } => {
            Some((SharedShape::capsule_y(length / 2.0, *radius), z_aligned))
        }
        Geometry::Mesh { filename, .. } => {
            warn!("Mesh geometry '{filename}' is not supported, skipping");
            None
        }
    }
}

const ELLIPSOID_RINGS: usize = 12;
const ELLIPSOID_SEGMENTS: usize = 24;

/// Points on the surface of an ellipsoid with the given radii: both poles
/// plus a latitude/longitude grid.
#[allow(clippy::cast_precision_loss)]
fn ellipsoid_points(radii: &Vector3<f32>) -> Vec<Point3<f32>> {
    let mut points = vec![Point3::new(0.0, 0.0, radii.z), Point3::new(0.0, 0.0, -radii.z)];
    for ring in 1..ELLIPSOID_RINGS {
        let polar = std::f32::consts::PI * ring as f32 / ELLIPSOID_RINGS as f32;
        for segment in 0..ELLIPSOID_SEGMENTS {
            let azimuth = std::f32::consts::TAU * segment as f32 / ELLIPSOID_SEGMENTS as f32;
            points.push(Point3::new(
                radii.x * polar.sin() * azimuth.cos(),
                radii.y * polar.sin() * azimuth.sin(),
                radii.z * polar.cos(),
            ));
        }
    }
    points
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use rapier3d::parry::query::PointQuery;

    use super::*;

    #[test]
    fn box_uses_half_extents() {
        let (shape, offset) = geometry_shape(&Geometry::Box {
            size: [2.0, 4.0, 6.0],
        })
        .unwrap();
        let cuboid = shape.as_cuboid().unwrap();
        assert_relative_eq!(cuboid.half_extents, Vector3::new(1.0, 2.0, 3.0));
        assert_eq!(offset, Isometry3::identity());
    }

    #[test]
    fn cylinder_is_z_aligned() {
        let (shape, offset) = geometry_shape(&Geometry::Cylinder {
            radius: 0.1,
            length: 2.0,
        })
        .unwrap();
        let top = Point3::new(0.0, 0.0, 0.95);
        let side = Point3::new(0.0, 0.95, 0.0);
        assert!(shape.contains_point(&offset, &top));
        assert!(!shape.contains_point(&offset, &side));
    }

    #[test]
    fn capsule_is_z_aligned() {
        let (shape, offset) = geometry_shape(&Geometry::Capsule {
            radius: 0.1,
            length: 1.0,
        })
        .unwrap();
        assert!(shape.contains_point(&offset, &Point3::new(0.0, 0.0, 0.55)));
    }

    #[test]
    fn ellipsoid_spans_its_diameters() {
        let (shape, offset) = geometry_shape(&Geometry::Ellipsoid {
            diameters: [1.0, 2.0, 3.0],
        })
        .unwrap();
        let aabb = shape.compute_aabb(&offset);
        assert_relative_eq!(aabb.maxs, Point3::new(0.5, 1.0, 1.5), epsilon = 1e-5);
        assert!(shape.contains_point(&offset, &Point3::new(0.0, 0.9, 0.0)));
        assert!(!shape.contains_point(&offset, &Point3::new(0.45, 0.9, 0.0)));
    }

    #[test]
    fn mesh_is_skipped() {
        let mesh = Geometry::Mesh {
            filename: "part.stl".into(),
            scale: [1.0; 3],
        };
        assert!(geometry_shape(&mesh).is_none());
    }
}
