//! Scene lights.

use bevy::log::warn;
use bevy::prelude::*;
use nalgebra::{Point3, Vector3};

use crate::config::GraphicsConfiguration;

/// Ambient term applied to every surface.
pub const DEFAULT_AMBIENT: f32 = 0.3;

#[derive(Clone, Debug, PartialEq)]
pub enum Light {
    /// Parallel light travelling along `direction`.
    Directional {
        direction: Vector3<f32>,
        color: [f32; 3],
        intensity: f32,
    },
    /// Point light with `1 / (c + l * d + q * d^2)` falloff.
    Point {
        position: Point3<f32>,
        color: [f32; 3],
        intensity: f32,
        attenuation: [f32; 3],
    },
}

impl Light {
    pub fn directional(direction: Vector3<f32>, intensity: f32) -> Self {
        Self::Directional {
            direction: direction.normalize(),
            color: [1.0; 3],
            intensity,
        }
    }

    pub const fn point(position: Point3<f32>, intensity: f32) -> Self {
        Self::Point {
            position,
            color: [1.0; 3],
            intensity,
            attenuation: [1.0, 0.0, 0.0],
        }
    }

    /// Unit direction from `point` toward the light, the distance to the
    /// light and the light's radiance reaching `point`.
    pub fn incidence(&self, point: &Point3<f32>) -> (Vector3<f32>, f32, Vector3<f32>) {
        match self {
            Self::Directional {
                direction,
                color,
                intensity,
            } => (
                -direction.normalize(),
                f32::INFINITY,
                Vector3::from(*color) * *intensity,
            ),
            Self::Point {
                position,
                color,
                intensity,
                attenuation,
            } => {
                let to_light = position - point;
                let d = to_light.norm();
                let falloff = attenuation[0] + attenuation[1] * d + attenuation[2] * d * d;
                let dir = if d > 0.0 { to_light / d } else { Vector3::z() };
                (
                    dir,
                    d,
                    Vector3::from(*color) * (*intensity / falloff.max(f32::EPSILON)),
                )
            }
        }
    }
}

/// Lights and shading settings used by every camera.
#[derive(Resource, Clone, Debug)]
pub struct Lighting {
    lights: Vec<Light>,
    pub max_lights: usize,
    pub ambient: f32,
    pub specular_strength: f32,
    pub shininess: f32,
    pub shadowed: bool,
    pub transparent_shadows: bool,
    pub background: [f32; 4],
}

impl Lighting {
    pub fn from_configuration(config: &GraphicsConfiguration) -> Self {
        let mut lighting = Self {
            lights: Vec::new(),
            max_lights: config.max_lights,
            ambient: DEFAULT_AMBIENT,
            specular_strength: config.specular_strength,
            shininess: 32.0,
            shadowed: config.shadowed,
            transparent_shadows: config.transparent_shadows,
            background: config.bg_color,
        };
        for light in default_lights() {
            lighting.add_light(light);
        }
        lighting
    }

    pub fn lights(&self) -> &[Light] {
        &self.lights
    }

    /// Add a light. Returns `false` when `max_lights` is already reached.
    pub fn add_light(&mut self, light: Light) -> bool {
        if self.lights.len() >= self.max_lights {
            warn!("Light ignored: at most {} lights are supported", self.max_lights);
            return false;
        }
        self.lights.push(light);
        true
    }

    pub fn clear_lights(&mut self) {
        self.lights.clear();
    }
}

impl Default for Lighting {
    fn default() -> Self {
        Self::from_configuration(&GraphicsConfiguration::default())
    }
}

/// Key light from above and a weaker fill from the opposite side.
pub fn default_lights() -> Vec<Light> {
    vec![
        Light::directional(Vector3::new(-0.3, -0.4, -1.0), 0.8),
        Light::directional(Vector3::new(0.5, 0.6, -0.6), 0.3),
    ]
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    #[test]
    fn default_lighting() {
        let lighting = Lighting::default();
        assert_eq!(lighting.lights().len(), 2);
        assert!(lighting.shadowed);
        assert_relative_eq!(lighting.ambient, DEFAULT_AMBIENT);
    }

    #[test]
    fn lights_are_capped() {
        let mut lighting = Lighting::default();
        assert!(lighting.add_light(Light::point(Point3::new(0.0, 0.0, 2.0), 1.0)));
        assert!(!lighting.add_light(Light::point(Point3::new(0.0, 0.0, 3.0), 1.0)));
        assert_eq!(lighting.lights().len(), 3);
        lighting.clear_lights();
        assert!(lighting.lights().is_empty());
    }

    #[test]
    fn directional_incidence_points_against_travel() {
        let light = Light::directional(Vector3::new(0.0, 0.0, -2.0), 0.5);
        let (dir, distance, radiance) = light.incidence(&Point3::origin());
        assert_relative_eq!(dir, Vector3::z());
        assert!(distance.is_infinite());
        assert_relative_eq!(radiance, Vector3::repeat(0.5));
    }

    #[test]
    fn point_light_falls_off() {
        let light = Light::Point {
            position: Point3::new(0.0, 0.0, 2.0),
            color: [1.0; 3],
            intensity: 1.0,
            attenuation: [0.0, 0.0, 1.0],
        };
        let (dir, distance, radiance) = light.incidence(&Point3::origin());
        assert_relative_eq!(dir, Vector3::z());
        assert_relative_eq!(distance, 2.0);
        assert_relative_eq!(radiance.x, 0.25);
    }
}
