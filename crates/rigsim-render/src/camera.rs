//! Offscreen cameras.
//!
//! A [`SimCamera`] follows the OpenGL convention: it looks down its local -Z
//! axis with +Y up. Its pose is either set directly (`look_at`) or derived
//! every frame from the pose of a robot link it is attached to.

use bevy::prelude::*;
use nalgebra::{Isometry3, Point3, Vector3};
use rapier3d::parry::query::Ray;

use crate::buffer::{DepthFrameBuffer, FrameBuffer};
use crate::config::CameraIntrinsics;

/// Eye position of a freshly created camera.
pub const DEFAULT_EYE: [f32; 3] = [0.0, 2.0, 1.0];

// ---------------------------------------------------------------------------
// CameraAttachment
// ---------------------------------------------------------------------------

/// Rigid mount of a camera on a robot link.
#[derive(Clone, Debug, PartialEq)]
pub struct CameraAttachment {
    pub link: String,
    /// Camera pose in the link frame.
    pub offset: Isometry3<f32>,
    pub(crate) missing_reported: bool,
}

impl CameraAttachment {
    pub fn new(link: impl Into<String>, offset: Isometry3<f32>) -> Self {
        Self {
            link: link.into(),
            offset,
            missing_reported: false,
        }
    }
}

// ---------------------------------------------------------------------------
// SimCamera
// ---------------------------------------------------------------------------

/// Camera sensor component.
///
/// # Example
///
/// ```
/// use nalgebra::{Isometry3, Point3, Vector3};
/// use rigsim_render::camera::SimCamera;
/// use rigsim_render::config::CameraIntrinsics;
///
/// let mut camera = SimCamera::new("tip", CameraIntrinsics::new(256, 256));
/// camera.attach_to("arm_link_5", Isometry3::translation(0.0, 0.0, 0.1));
/// assert_eq!(camera.attachment().map(|a| a.link.as_str()), Some("arm_link_5"));
///
/// camera.detach();
/// camera.look_at(Point3::new(0.0, 0.0, 5.0), Point3::origin(), Vector3::y());
/// assert!((camera.forward() + Vector3::z()).norm() < 1e-6);
/// ```
#[derive(Component, Clone, Debug)]
pub struct SimCamera {
    pub name: String,
    pub intrinsics: CameraIntrinsics,
    pose: Isometry3<f32>,
    attachment: Option<CameraAttachment>,
    /// Capture rate in Hz. `None` follows the simulation's graphics rate.
    pub frequency: Option<f64>,
    pub active: bool,
    pub record_depth: bool,
}

impl SimCamera {
    /// Active camera at the default viewpoint, looking at the origin.
    pub fn new(name: impl Into<String>, intrinsics: CameraIntrinsics) -> Self {
        let mut camera = Self {
            name: name.into(),
            intrinsics,
            pose: Isometry3::identity(),
            attachment: None,
            frequency: None,
            active: true,
            record_depth: false,
        };
        camera.look_at(Point3::from(DEFAULT_EYE), Point3::origin(), Vector3::z());
        camera
    }

    #[must_use]
    pub const fn with_frequency(mut self, hz: f64) -> Self {
        self.frequency = Some(hz);
        self
    }

    #[must_use]
    pub const fn with_depth(mut self, record: bool) -> Self {
        self.record_depth = record;
        self
    }

    /// Camera-to-world pose.
    pub const fn pose(&self) -> &Isometry3<f32> {
        &self.pose
    }

    pub fn set_pose(&mut self, pose: Isometry3<f32>) {
        self.pose = pose;
    }

    /// Place the camera at `eye`, looking at `center`.
    ///
    /// When `up` is parallel to the viewing direction another axis is used,
    /// so the pose stays well defined.
    pub fn look_at(&mut self, eye: Point3<f32>, center: Point3<f32>, up: Vector3<f32>) {
        let view = center - eye;
        if view.norm_squared() < f32::EPSILON {
            self.pose = Isometry3::translation(eye.x, eye.y, eye.z);
            return;
        }
        let up = if view.cross(&up).norm_squared() < 1e-10 {
            if view.cross(&Vector3::x()).norm_squared() < 1e-10 {
                Vector3::y()
            } else {
                Vector3::x()
            }
        } else {
            up
        };
        self.pose = Isometry3::look_at_rh(&eye, &center, &up).inverse();
    }

    /// Mount the camera on `link`. Its pose is recomputed at every capture.
    pub fn attach_to(&mut self, link: impl Into<String>, offset: Isometry3<f32>) {
        self.attachment = Some(CameraAttachment::new(link, offset));
    }

    /// Release the mount. The camera keeps its last pose.
    pub fn detach(&mut self) {
        self.attachment = None;
    }

    pub const fn attachment(&self) -> Option<&CameraAttachment> {
        self.attachment.as_ref()
    }

    pub(crate) const fn attachment_mut(&mut self) -> Option<&mut CameraAttachment> {
        self.attachment.as_mut()
    }

    /// Unit viewing direction in world coordinates.
    pub fn forward(&self) -> Vector3<f32> {
        self.pose.rotation * -Vector3::z()
    }

    /// World position of the optical centre.
    pub fn eye(&self) -> Point3<f32> {
        Point3::from(self.pose.translation.vector)
    }

    /// Ray through normalized image coordinates: `u` from the left edge and
    /// `v` from the top edge, both in `[0, 1]`. The direction is unit length.
    pub fn primary_ray(&self, u: f32, v: f32) -> Ray {
        let (tan_x, tan_y) = self.intrinsics.half_extents();
        let local = Vector3::new((2.0 * u - 1.0) * tan_x, (1.0 - 2.0 * v) * tan_y, -1.0);
        Ray::new(self.eye(), (self.pose.rotation * local).normalize())
    }
}

/// Marker for the camera owned by the graphics object.
#[derive(Component, Debug, Clone, Copy, Default)]
pub struct MainCamera;

/// Components of a camera entity: the camera and its colour and depth
/// buffers, sized from its intrinsics.
pub fn camera_bundle(camera: SimCamera) -> (SimCamera, FrameBuffer, DepthFrameBuffer) {
    let frame = FrameBuffer::for_camera(&camera.intrinsics);
    let depth = DepthFrameBuffer::for_camera(&camera.intrinsics);
    (camera, frame, depth)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
