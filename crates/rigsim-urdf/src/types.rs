//! In-memory robot model.
//!
//! These types are independent of the XML layer. They follow URDF concepts
//! closely but use `f32` and nalgebra poses, which is what the physics and
//! rendering crates consume.

use std::collections::{HashMap, VecDeque};

use nalgebra::{Isometry3, Translation3, Unit, UnitQuaternion, Vector3};

use crate::error::UrdfError;

// ---------------------------------------------------------------------------
// JointType
// ---------------------------------------------------------------------------

/// URDF joint type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JointType {
    /// Rotation about a single axis, with position limits.
    Revolute,
    /// Unlimited rotation about a single axis.
    Continuous,
    /// Translation along an axis, with position limits.
    Prismatic,
    /// No relative motion between parent and child.
    Fixed,
    /// Unconstrained 6-DOF joint.
    Floating,
    /// Planar motion.
    Planar,
}

impl JointType {
    /// Whether this joint contributes a controllable degree of freedom.
    pub const fn is_actuated(self) -> bool {
        matches!(self, Self::Revolute | Self::Continuous | Self::Prismatic)
    }

    pub const fn is_rotational(self) -> bool {
        matches!(self, Self::Revolute | Self::Continuous)
    }
}

// ---------------------------------------------------------------------------
// JointLimits / JointDynamics
// ---------------------------------------------------------------------------

/// Limits on a joint's motion, effort, and velocity.
#[derive(Debug, Clone, Default)]
pub struct JointLimits {
    /// Lower position limit (rad or m). `None` means unbounded.
    pub lower: Option<f32>,
    /// Upper position limit (rad or m). `None` means unbounded.
    pub upper: Option<f32>,
    /// Maximum effort (Nm or N). Zero means unspecified.
    pub effort: f32,
    /// Maximum velocity (rad/s or m/s). Zero means unspecified.
    pub velocity: f32,
}

/// Viscous damping and Coulomb friction of a joint.
#[derive(Debug, Clone, Default)]
pub struct JointDynamics {
    pub damping: f32,
    pub friction: f32,
}

// ---------------------------------------------------------------------------
// Origin
// ---------------------------------------------------------------------------

/// A 3D pose specified as position + roll-pitch-yaw.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Origin {
    /// Translation `[x, y, z]` in meters.
    pub xyz: [f32; 3],
    /// Fixed-axis rotation `[roll, pitch, yaw]` in radians.
    pub rpy: [f32; 3],
}

impl Origin {
    pub const fn new(xyz: [f32; 3], rpy: [f32; 3]) -> Self {
        Self { xyz, rpy }
    }

    /// The pose as a rigid transform (`Rz(yaw) * Ry(pitch) * Rx(roll)`).
    pub fn isometry(&self) -> Isometry3<f32> {
        Isometry3::from_parts(
            Translation3::new(self.xyz[0], self.xyz[1], self.xyz[2]),
            UnitQuaternion::from_euler_angles(self.rpy[0], self.rpy[1], self.rpy[2]),
        )
    }
}

// ---------------------------------------------------------------------------
// Inertial
// ---------------------------------------------------------------------------

/// Inertial properties of a link.
#[derive(Debug, Clone, Default)]
pub struct Inertial {
    /// Pose of the centre of mass frame in the link frame.
    pub origin: Origin,
    /// Mass in kilograms.
    pub mass: f32,
    /// Inertia tensor elements `[ixx, ixy, ixz, iyy, iyz, izz]`.
    pub inertia: [f32; 6],
}

// ---------------------------------------------------------------------------
// Geometry
// ---------------------------------------------------------------------------

/// Shape used for visual or collision elements.
///
/// Cylinders and capsules are aligned with the local z-axis. URDF has no
/// ellipsoid; it only comes from programmatically built robots.
#[derive(Debug, Clone, PartialEq)]
pub enum Geometry {
    Sphere { radius: f32 },
    Box { size: [f32; 3] },
    /// Axis-aligned ellipsoid given by its three diameters.
    Ellipsoid { diameters: [f32; 3] },
    Cylinder { radius: f32, length: f32 },
    Capsule { radius: f32, length: f32 },
    Mesh { filename: String, scale: [f32; 3] },
}

impl Geometry {
    /// Reject degenerate primitive dimensions.
    pub fn validate(&self) -> Result<(), UrdfError> {
        let positive = |v: f32| v.is_finite() && v > 0.0;
        let ok = match self {
            Self::Sphere { radius } => positive(*radius),
            Self::Box { size } => size.iter().all(|s| positive(*s)),
            Self::Ellipsoid { diameters } => diameters.iter().all(|d| positive(*d)),
            Self::Cylinder { radius, length } | Self::Capsule { radius, length } => {
                positive(*radius) && positive(*length)
            }
            Self::Mesh { filename, .. } => !filename.is_empty(),
        };
        if ok {
            Ok(())
        } else {
            Err(UrdfError::InvalidGeometry(format!("{self:?}")))
        }
    }
}

// ---------------------------------------------------------------------------
// Material / Visual / Collision
// ---------------------------------------------------------------------------

/// Visual material, either inline or a reference to a robot-level material.
#[derive(Debug, Clone)]
pub struct Material {
    pub name: String,
    /// RGBA color `[r, g, b, a]`, each in `0.0..=1.0`.
    pub color: Option<[f32; 4]>,
}

#[derive(Debug, Clone)]
pub struct Visual {
    pub origin: Origin,
    pub geometry: Geometry,
    pub material: Option<Material>,
}

#[derive(Debug, Clone)]
pub struct Collision {
    pub origin: Origin,
    pub geometry: Geometry,
}

// ---------------------------------------------------------------------------
// LinkData
// ---------------------------------------------------------------------------

/// In-memory representation of a URDF link.
#[derive(Debug, Clone)]
pub struct LinkData {
    pub name: String,
    /// `None` when the URDF gives no (or zero) mass.
    pub inertial: Option<Inertial>,
    pub visuals: Vec<Visual>,
    pub collisions: Vec<Collision>,
}

impl LinkData {
    /// Create a link with only a name (no geometry or inertia).
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            inertial: None,
            visuals: Vec::new(),
            collisions: Vec::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// JointData
// ---------------------------------------------------------------------------

/// In-memory representation of a URDF joint.
#[derive(Debug, Clone)]
pub struct JointData {
    pub name: String,
    pub joint_type: JointType,
    pub parent: String,
    pub child: String,
    /// Pose of the joint frame in the parent link frame.
    pub origin: Origin,
    /// Joint axis in the joint frame (default `[1, 0, 0]`).
    pub axis: [f32; 3],
    pub limits: JointLimits,
    pub dynamics: JointDynamics,
}

impl JointData {
    /// Normalized axis. Falls back to +x for a zero vector.
    pub fn unit_axis(&self) -> Unit<Vector3<f32>> {
        let v = Vector3::new(self.axis[0], self.axis[1], self.axis[2]);
        Unit::try_new(v, 1.0e-9).unwrap_or_else(Vector3::x_axis)
    }
}

// ---------------------------------------------------------------------------
// RobotModel
// ---------------------------------------------------------------------------

/// Complete kinematic tree of a robot.
#[derive(Debug, Clone)]
pub struct RobotModel {
    pub name: String,
    /// All links, keyed by name.
    pub links: HashMap<String, LinkData>,
    /// All joints, keyed by name.
    pub joints: HashMap<String, JointData>,
    /// Joint names in declaration order.
    pub joint_order: Vec<String>,
    /// Robot-level named materials.
    pub materials: HashMap<String, [f32; 4]>,
    /// Name of the root link (the one never referenced as a child).
    pub root_link: String,
}

impl RobotModel {
    /// Get a link by name.
    pub fn link(&self, name: &str) -> Result<&LinkData, UrdfError> {
        self.links
            .get(name)
            .ok_or_else(|| UrdfError::MissingLink(name.into()))
    }

    /// Get a joint by name.
    pub fn joint(&self, name: &str) -> Result<&JointData, UrdfError> {
        self.joints
            .get(name)
            .ok_or_else(|| UrdfError::MissingJoint(name.into()))
    }

    /// Joints in declaration order.
    pub fn ordered_joints(&self) -> impl Iterator<Item = &JointData> {
        self.joint_order
            .iter()
            .filter_map(|name| self.joints.get(name))
    }

    /// Actuated joints (revolute, continuous, prismatic) in declaration order.
    pub fn actuated_joints(&self) -> impl Iterator<Item = &JointData> {
        self.ordered_joints().filter(|j| j.joint_type.is_actuated())
    }

    /// Number of actuated degrees of freedom.
    pub fn dof(&self) -> usize {
        self.actuated_joints().count()
    }

    /// Degree-of-freedom names. Command and state vectors use this order.
    pub fn dof_names(&self) -> Vec<&str> {
        self.actuated_joints().map(|j| j.name.as_str()).collect()
    }

    /// Joints whose parent is `link`, in declaration order.
    pub fn children(&self, link: &str) -> impl Iterator<Item = &JointData> {
        self.ordered_joints().filter(move |j| j.parent == link)
    }

    /// Joints in breadth-first order from the root. Parents always come
    /// before their children.
    pub fn joints_tree_order(&self) -> Vec<&JointData> {
        let mut order = Vec::with_capacity(self.joints.len());
        let mut queue = VecDeque::from([self.root_link.as_str()]);
        while let Some(link) = queue.pop_front() {
            for joint in self.children(link) {
                order.push(joint);
                queue.push_back(joint.child.as_str());
            }
        }
        order
    }

    /// Link names in breadth-first order from the root.
    pub fn link_names(&self) -> Vec<&str> {
        std::iter::once(self.root_link.as_str())
            .chain(self.joints_tree_order().into_iter().map(|j| j.child.as_str()))
            .collect()
    }

    /// Colour of a visual material, resolving named robot-level materials.
    pub fn material_color(&self, material: &Material) -> Option<[f32; 4]> {
        material
            .color
            .or_else(|| self.materials.get(&material.name).copied())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
