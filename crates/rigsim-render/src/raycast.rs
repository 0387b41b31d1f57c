//! CPU ray-cast renderer.
//!
//! One primary ray per pixel is cast against the placed visual shapes using
//! parry's ray queries. Each shape's world bounding box is tested first, so
//! only shapes the ray can reach run the exact query. Hits are shaded with a
//! Blinn-Phong model; shadow rays toward each light decide visibility.

use nalgebra::{Point3, Vector3};
use rapier3d::parry::query::{Ray, RayCast};
use rayon::prelude::*;

use crate::camera::SimCamera;
use crate::config::PixelFormat;
use crate::lighting::Lighting;
use crate::scene::PlacedShape;

/// Offset applied along the normal before casting secondary rays.
const SURFACE_EPSILON: f32 = 1e-4;
/// Longest distance a shadow ray travels toward a directional light.
const SHADOW_RANGE: f32 = 1.0e3;
/// Translucent surfaces a primary ray may pass through.
const MAX_LAYERS: u32 = 4;

/// Colour and depth images produced by [`render_frame`].
#[derive(Debug, Clone)]
pub struct RenderedFrame {
    pub color: Vec<u8>,
    /// Z-depth along the camera axis, `far` where nothing was hit.
    pub depth: Vec<f32>,
}

#[derive(Debug, Clone, Copy)]
struct Hit {
    index: usize,
    toi: f32,
    normal: Vector3<f32>,
}

/// Render one frame of `shapes` as seen by `camera`.
pub fn render_frame(
    camera: &SimCamera,
    shapes: &[PlacedShape<'_>],
    lighting: &Lighting,
    format: PixelFormat,
) -> RenderedFrame {
    let width = camera.intrinsics.width as usize;
    let height = camera.intrinsics.height as usize;
    let bpp = format.bytes_per_pixel() as usize;

    let mut color = vec![0u8; width * height * bpp];
    let mut depth = vec![camera.intrinsics.far; width * height];
    if width == 0 || height == 0 {
        return RenderedFrame { color, depth };
    }

    let forward = camera.forward();
    let tracer = Tracer { shapes, lighting };

    color
        .par_chunks_mut(width * bpp)
        .zip(depth.par_chunks_mut(width))
        .enumerate()
        .for_each(|(y, (row, depth_row))| {
            #[allow(clippy::cast_precision_loss)]
            let v = (y as f32 + 0.5) / height as f32;
            for x in 0..width {
                #[allow(clippy::cast_precision_loss)]
                let u = (x as f32 + 0.5) / width as f32;
                let ray = camera.primary_ray(u, v);
                let cos = ray.dir.dot(&forward).max(f32::EPSILON);
                let near = camera.intrinsics.near / cos;
                let far = camera.intrinsics.far / cos;

                let (seen, toi) = tracer.trace(&ray, near, far, 0);
                if let Some(toi) = toi {
                    depth_row[x] = toi * cos;
                }

                let pixel = &mut row[x * bpp..(x + 1) * bpp];
                pixel[0] = to_byte(seen.x);
                pixel[1] = to_byte(seen.y);
                pixel[2] = to_byte(seen.z);
                if bpp == 4 {
                    pixel[3] = u8::MAX;
                }
            }
        });

    RenderedFrame { color, depth }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn to_byte(channel: f32) -> u8 {
    (channel.clamp(0.0, 1.0) * 255.0).round() as u8
}

fn rgb(color: [f32; 4]) -> Vector3<f32> {
    Vector3::new(color[0], color[1], color[2])
}

struct Tracer<'s, 'a> {
    shapes: &'s [PlacedShape<'a>],
    lighting: &'s Lighting,
}

impl Tracer<'_, '_> {
    /// Closest surface along `ray`. Non-solid queries report where a ray
    /// starting inside a shape leaves it.
    fn nearest_hit(&self, ray: &Ray, min_toi: f32, max_toi: f32, solid: bool) -> Option<Hit> {
        let mut best: Option<Hit> = None;
        let mut limit = max_toi;
        for (index, placed) in self.shapes.iter().enumerate() {
            if !placed.aabb.intersects_local_ray(ray, limit) {
                continue;
            }
            let Some(hit) = placed
                .shape
                .cast_ray_and_get_normal(&placed.pose, ray, limit, solid)
            else {
                continue;
            };
            if hit.time_of_impact < min_toi || hit.time_of_impact > limit {
                continue;
            }
            limit = hit.time_of_impact;
            best = Some(Hit {
                index,
                toi: hit.time_of_impact,
                normal: hit.normal,
            });
        }
        best
    }

    /// Colour seen along `ray` and the distance of the first surface.
    fn trace(
        &self,
        ray: &Ray,
        min_toi: f32,
        max_toi: f32,
        layer: u32,
    ) -> (Vector3<f32>, Option<f32>) {
        let Some(hit) = self.nearest_hit(ray, min_toi, max_toi, layer == 0) else {
            return (rgb(self.lighting.background), None);
        };

        let placed = &self.shapes[hit.index];
        let point = ray.point_at(hit.toi);
        let normal = if hit.normal.dot(&ray.dir) > 0.0 {
            -hit.normal
        } else {
            hit.normal
        };
        let local = placed.pose.inverse_transform_point(&point);
        let base = placed.appearance.color_at(&local);
        let mut color = self.shade(&point, &normal, &ray.dir, rgb(base));

        let alpha = base[3];
        if alpha < 1.0 && layer < MAX_LAYERS {
            let next = Ray::new(point + ray.dir * SURFACE_EPSILON, ray.dir);
            let (behind, _) = self.trace(&next, 0.0, max_toi - hit.toi, layer + 1);
            color = color * alpha + behind * (1.0 - alpha);
        }
        (color, Some(hit.toi))
    }

    fn shade(
        &self,
        point: &Point3<f32>,
        normal: &Vector3<f32>,
        view_dir: &Vector3<f32>,
        base: Vector3<f32>,
    ) -> Vector3<f32> {
        let lighting = self.lighting;
        let mut color = base * lighting.ambient;
        let origin = point + normal * SURFACE_EPSILON;

        for light in lighting.lights() {
            let (to_light, distance, radiance) = light.incidence(point);
            let n_dot_l = normal.dot(&to_light);
            if n_dot_l <= 0.0 {
                continue;
            }
            let visibility = if lighting.shadowed {
                self.visibility(&origin, &to_light, distance.min(SHADOW_RANGE))
            } else {
                1.0
            };
            if visibility <= 0.0 {
                continue;
            }

            let half = (to_light - view_dir).normalize();
            let specular =
                lighting.specular_strength * normal.dot(&half).max(0.0).powf(lighting.shininess);
            let lit = base * n_dot_l + Vector3::repeat(specular);
            color += lit.component_mul(&radiance) * visibility;
        }
        color
    }

    /// Fraction of light reaching `origin` from direction `dir`.
    fn visibility(&self, origin: &Point3<f32>, dir: &Vector3<f32>, distance: f32) -> f32 {
        let ray = Ray::new(*origin, *dir);
        let mut transmitted = 1.0;
        for placed in self.shapes {
            if !placed.aabb.intersects_local_ray(&ray, distance)
                || !placed.shape.intersects_ray(&placed.pose, &ray, distance)
            {
                continue;
            }
            let alpha = placed.appearance.alpha();
            if alpha >= 1.0 || !self.lighting.transparent_shadows {
                return 0.0;
            }
            transmitted *= 1.0 - alpha;
        }
        transmitted
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use nalgebra::Isometry3;
    use rapier3d::prelude::SharedShape;

    use super::*;
    use crate::config::{CameraIntrinsics, GraphicsConfiguration};
    use crate::lighting::Light;
    use crate::scene::Appearance;

    struct Fixture {
        shapes: Vec<(Isometry3<f32>, SharedShape, Appearance)>,
    }

    impl Fixture {
        fn placed(&self) -> Vec<PlacedShape<'_>> {
            self.shapes
                .iter()
                .map(|(pose, shape, appearance)| PlacedShape {
                    pose: *pose,
                    aabb: shape.compute_aabb(pose),
                    shape,
                    appearance,
                })
                .collect()
        }
    }

    fn top_down_camera(size: u32) -> SimCamera {
        let mut camera = SimCamera::new("test", CameraIntrinsics::new(size, size));
        camera.look_at(Point3::new(0.0, 0.0, 5.0), Point3::origin(), Vector3::y());
        camera
    }

    fn lighting(shadowed: bool, transparent: bool) -> Lighting {
        let mut lighting = Lighting::from_configuration(&GraphicsConfiguration {
            shadowed,
            transparent_shadows: transparent,
            ..GraphicsConfiguration::default()
        });
        lighting.clear_lights();
        lighting.add_light(Light::directional(-Vector3::z(), 1.0));
        lighting.specular_strength = 0.0;
        lighting
    }

    fn floor(color: [f32; 4]) -> (Isometry3<f32>, SharedShape, Appearance) {
        (
            Isometry3::translation(0.0, 0.0, -0.05),
            SharedShape::cuboid(5.0, 5.0, 0.05),
            Appearance::Solid(color),
        )
    }

    fn centre(frame: &RenderedFrame, size: usize) -> &[u8] {
        let i = (size / 2 * size + size / 2) * 3;
        &frame.color[i..i + 3]
    }

    #[test]
    fn empty_scene_is_background() {
        let camera = top_down_camera(4);
        let mut lighting = lighting(true, true);
        lighting.background = [0.0, 0.0, 1.0, 1.0];
        let frame = render_frame(&camera, &[], &lighting, PixelFormat::Rgb8);
        assert_eq!(frame.color.len(), 4 * 4 * 3);
        assert!(frame.color.chunks(3).all(|p| p == [0, 0, 255]));
        assert!(frame.depth.iter().all(|&d| (d - 200.0).abs() < f32::EPSILON));
    }

    #[test]
    fn lit_floor_is_bright_with_metric_depth() {
        let fixture = Fixture {
            shapes: vec![floor([1.0, 1.0, 1.0, 1.0])],
        };
        let camera = top_down_camera(9);
        let frame = render_frame(&camera, &fixture.placed(), &lighting(true, true), PixelFormat::Rgb8);

        // ambient 0.3 + full diffuse, clamped
        assert_eq!(centre(&frame, 9), &[255, 255, 255]);
        assert_relative_eq!(frame.depth[4 * 9 + 4], 5.0, epsilon = 1e-3);
        // z-depth is constant across a plane facing the camera
        assert_relative_eq!(frame.depth[0], 5.0, epsilon = 1e-3);
    }

    #[test]
    fn opaque_occluder_casts_shadow() {
        let fixture = Fixture {
            shapes: vec![
                floor([0.5, 0.5, 0.5, 1.0]),
                (
                    Isometry3::translation(0.0, 0.0, 1.0),
                    SharedShape::ball(0.2),
                    Appearance::Solid([1.0, 0.0, 0.0, 1.0]),
                ),
            ],
        };
        let mut camera = top_down_camera(21);
        camera.look_at(Point3::new(0.0, -3.0, 3.0), Point3::origin(), Vector3::z());

        let shadowed = render_frame(&camera, &fixture.placed(), &lighting(true, true), PixelFormat::Rgb8);
        let unshadowed =
            render_frame(&camera, &fixture.placed(), &lighting(false, true), PixelFormat::Rgb8);
        assert_eq!(centre(&shadowed, 21), &[38, 38, 38]);
        assert_eq!(centre(&unshadowed, 21), &[166, 166, 166]);
    }

    #[test]
    fn translucent_occluder_shadow_depends_on_flag() {
        let fixture = Fixture {
            shapes: vec![
                floor([1.0, 1.0, 1.0, 1.0]),
                (
                    Isometry3::translation(0.0, 0.0, 1.0),
                    SharedShape::ball(0.2),
                    Appearance::Solid([0.0, 0.0, 1.0, 0.5]),
                ),
            ],
        };
        let mut camera = top_down_camera(21);
        camera.look_at(Point3::new(0.0, -3.0, 3.0), Point3::origin(), Vector3::z());

        let soft = render_frame(&camera, &fixture.placed(), &lighting(true, true), PixelFormat::Rgb8);
        let hard = render_frame(&camera, &fixture.placed(), &lighting(true, false), PixelFormat::Rgb8);
        // 0.3 + 0.5 transmitted vs ambient only
        assert_eq!(centre(&soft, 21), &[204, 204, 204]);
        assert_eq!(centre(&hard, 21), &[77, 77, 77]);
    }

    #[test]
    fn translucent_surface_blends_with_background() {
        let fixture = Fixture {
            shapes: vec![(
                Isometry3::identity(),
                SharedShape::ball(1.0),
                Appearance::Solid([1.0, 1.0, 1.0, 0.5]),
            )],
        };
        let camera = top_down_camera(9);
        let frame = render_frame(&camera, &fixture.placed(), &lighting(false, true), PixelFormat::Rgb8);
        let pixel = centre(&frame, 9);
        // white shaded surface over a black background, seen through twice
        assert!(pixel[0] > 100 && pixel[0] < 255, "{pixel:?}");
        assert_relative_eq!(frame.depth[4 * 9 + 4], 4.0, epsilon = 1e-3);
    }

    #[test]
    fn near_plane_clips_and_rgba_is_opaque() {
        let fixture = Fixture {
            shapes: vec![floor([1.0, 0.0, 0.0, 1.0])],
        };
        let mut camera = top_down_camera(3);
        camera.intrinsics.near = 6.0;
        let clipped = render_frame(&camera, &fixture.placed(), &lighting(true, true), PixelFormat::Rgba8);
        assert_eq!(clipped.color.len(), 3 * 3 * 4);
        assert!(clipped.color.chunks(4).all(|p| p == [0, 0, 0, 255]));
    }
}
