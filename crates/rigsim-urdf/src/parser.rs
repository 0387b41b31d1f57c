//! URDF XML parsing using `urdf-rs`.
//!
//! Converts `urdf_rs` types into the crate's [`RobotModel`] and checks that
//! the joints form a single tree.

// All conversions from urdf-rs f64 to f32 are intentional truncations.
#![allow(clippy::cast_possible_truncation)]

use std::collections::{HashMap, HashSet};
use std::path::Path;

use crate::error::UrdfError;
use crate::types::{
    Collision, Geometry, Inertial, JointData, JointDynamics, JointLimits, JointType, LinkData,
    Material, Origin, RobotModel, Visual,
};

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Parse a URDF file from disk into a [`RobotModel`].
pub fn parse_file(path: impl AsRef<Path>) -> Result<RobotModel, UrdfError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| UrdfError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    parse_string(&content)
}

/// Parse a URDF XML string into a [`RobotModel`].
pub fn parse_string(xml: &str) -> Result<RobotModel, UrdfError> {
    let robot = urdf_rs::read_from_string(xml).map_err(|e| UrdfError::Parse(e.to_string()))?;
    convert_robot(&robot)
}

// ---------------------------------------------------------------------------
// Conversion
// ---------------------------------------------------------------------------

fn convert_robot(robot: &urdf_rs::Robot) -> Result<RobotModel, UrdfError> {
    let links: HashMap<String, LinkData> = robot
        .links
        .iter()
        .map(|l| convert_link(l).map(|ld| (ld.name.clone(), ld)))
        .collect::<Result<_, _>>()?;

    let mut joints = HashMap::with_capacity(robot.joints.len());
    let mut joint_order = Vec::with_capacity(robot.joints.len());
    for joint in &robot.joints {
        let data = convert_joint(joint)?;
        for link in [&data.parent, &data.child] {
            if !links.contains_key(link) {
                return Err(UrdfError::MissingLink(link.clone()));
            }
        }
        joint_order.push(data.name.clone());
        joints.insert(data.name.clone(), data);
    }

    let materials = robot
        .materials
        .iter()
        .filter_map(|m| convert_material(m).color.map(|c| (m.name.clone(), c)))
        .collect();

    let root_link = find_root(robot, &joints)?;

    Ok(RobotModel {
        name: robot.name.clone(),
        links,
        joints,
        joint_order,
        materials,
        root_link,
    })
}

/// The unique link that is never a child. Links are checked in declaration
/// order so the result is deterministic.
fn find_root(
    robot: &urdf_rs::Robot,
    joints: &HashMap<String, JointData>,
) -> Result<String, UrdfError> {
    let child_links: HashSet<&str> = joints.values().map(|j| j.child.as_str()).collect();
    let mut roots: Vec<String> = robot
        .links
        .iter()
        .map(|l| l.name.clone())
        .filter(|name| !child_links.contains(name.as_str()))
        .collect();

    if roots.len() > 1 {
        return Err(UrdfError::MultipleRootLinks(roots));
    }
    roots.pop().ok_or(UrdfError::NoRootLink)
}

fn convert_link(link: &urdf_rs::Link) -> Result<LinkData, UrdfError> {
    let inertial = convert_inertial(&link.inertial);
    let visuals = link
        .visual
        .iter()
        .map(convert_visual)
        .collect::<Result<_, _>>()?;
    let collisions = link
        .collision
        .iter()
        .map(convert_collision)
        .collect::<Result<_, _>>()?;

    Ok(LinkData {
        name: link.name.clone(),
        inertial: (inertial.mass > 0.0).then_some(inertial),
        visuals,
        collisions,
    })
}

fn convert_joint(joint: &urdf_rs::Joint) -> Result<JointData, UrdfError> {
    let joint_type = convert_joint_type(&joint.joint_type)?;

    let dynamics = joint
        .dynamics
        .as_ref()
        .map(convert_dynamics)
        .unwrap_or_default();

    Ok(JointData {
        name: joint.name.clone(),
        joint_type,
        parent: joint.parent.link.clone(),
        child: joint.child.link.clone(),
        origin: convert_pose(&joint.origin),
        axis: vec3_to_f32(&joint.axis.xyz),
        limits: convert_limits(&joint.limit, joint_type),
        dynamics,
    })
}

fn convert_joint_type(jt: &urdf_rs::JointType) -> Result<JointType, UrdfError> {
    match jt {
        urdf_rs::JointType::Revolute => Ok(JointType::Revolute),
        urdf_rs::JointType::Continuous => Ok(JointType::Continuous),
        urdf_rs::JointType::Prismatic => Ok(JointType::Prismatic),
        urdf_rs::JointType::Fixed => Ok(JointType::Fixed),
        urdf_rs::JointType::Floating => Ok(JointType::Floating),
        urdf_rs::JointType::Planar => Ok(JointType::Planar),
        urdf_rs::JointType::Spherical => Err(UrdfError::UnsupportedJointType("spherical".into())),
    }
}

fn convert_limits(limit: &urdf_rs::JointLimit, joint_type: JointType) -> JointLimits {
    // urdf-rs reports 0/0 for a missing <limit>; continuous joints ignore
    // position limits altogether.
    let bounded = joint_type != JointType::Continuous
        && (limit.lower - limit.upper).abs() > f64::EPSILON;
    JointLimits {
        lower: bounded.then_some(limit.lower as f32),
        upper: bounded.then_some(limit.upper as f32),
        effort: limit.effort as f32,
        velocity: limit.velocity as f32,
    }
}

const fn convert_dynamics(dyn_: &urdf_rs::Dynamics) -> JointDynamics {
    JointDynamics {
        damping: dyn_.damping as f32,
        friction: dyn_.friction as f32,
    }
}

fn convert_pose(pose: &urdf_rs::Pose) -> Origin {
    Origin::new(vec3_to_f32(&pose.xyz), vec3_to_f32(&pose.rpy))
}

fn convert_inertial(inertial: &urdf_rs::Inertial) -> Inertial {
    let i = &inertial.inertia;
    Inertial {
        origin: convert_pose(&inertial.origin),
        mass: inertial.mass.value as f32,
        inertia: [
            i.ixx as f32,
            i.ixy as f32,
            i.ixz as f32,
            i.iyy as f32,
            i.iyz as f32,
            i.izz as f32,
        ],
    }
}

fn convert_visual(visual: &urdf_rs::Visual) -> Result<Visual, UrdfError> {
    Ok(Visual {
        origin: convert_pose(&visual.origin),
        geometry: convert_geometry(&visual.geometry)?,
        material: visual.material.as_ref().map(convert_material),
    })
}

fn convert_collision(collision: &urdf_rs::Collision) -> Result<Collision, UrdfError> {
    Ok(Collision {
        origin: convert_pose(&collision.origin),
        geometry: convert_geometry(&collision.geometry)?,
    })
}

fn convert_geometry(geom: &urdf_rs::Geometry) -> Result<Geometry, UrdfError> {
    let geometry = match geom {
        urdf_rs::Geometry::Sphere { radius } => Geometry::Sphere {
            radius: *radius as f32,
        },
        urdf_rs::Geometry::Box { size } => Geometry::Box {
            size: vec3_to_f32(size),
        },
        urdf_rs::Geometry::Cylinder { radius, length } => Geometry::Cylinder {
            radius: *radius as f32,
            length: *length as f32,
        },
        urdf_rs::Geometry::Capsule { radius, length } => Geometry::Capsule {
            radius: *radius as f32,
            length: *length as f32,
        },
        urdf_rs::Geometry::Mesh { filename, scale } => Geometry::Mesh {
            filename: filename.clone(),
            scale: scale.as_ref().map_or([1.0, 1.0, 1.0], |s| vec3_to_f32(s)),
        },
    };
    geometry.validate()?;
    Ok(geometry)
}

fn convert_material(mat: &urdf_rs::Material) -> Material {
    Material {
        name: mat.name.clone(),
        color: mat.color.as_ref().map(|c| {
            [
                c.rgba[0] as f32,
                c.rgba[1] as f32,
                c.rgba[2] as f32,
                c.rgba[3] as f32,
            ]
        }),
    }
}

const fn vec3_to_f32(v: &[f64; 3]) -> [f32; 3] {
    [v[0] as f32, v[1] as f32, v[2] as f32]
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL_URDF: &str = r#"
        <robot name="test_robot">
            <link name="base_link"/>
        </robot>
    "#;

    const ARM_URDF: &str = r#"
        <robot name="arm">
            <material name="orange">
                <color rgba="1.0 0.5 0.0 1.0"/>
            </material>
            <link name="base">
                <inertial>
                    <mass value="1.0"/>
                    <inertia ixx="0.01" ixy="0" ixz="0" iyy="0.01" iyz="0" izz="0.01"/>
                </inertial>
                <visual>
                    <geometry>
                        <cylinder radius="0.05" length="0.5"/>
                    </geometry>
                    <material name="orange"/>
                </visual>
            </link>
            <link name="link1">
                <collision>
                    <geometry>
                        <capsule radius="0.03" length="0.2"/>
                    </geometry>
                </collision>
            </link>
            <link name="link2"/>
            <link name="link3"/>
            <joint name="joint2" type="continuous">
                <parent link="link1"/>
                <child link="link2"/>
                <axis xyz="0 1 0"/>
            </joint>
            <joint name="joint1" type="revolute">
                <parent link="base"/>
                <child link="link1"/>
                <origin xyz="0 0 0.5" rpy="0 0 0"/>
                <axis xyz="0 0 1"/>
                <limit lower="-1.57" upper="1.57" effort="100" velocity="5"/>
                <dynamics damping="0.5" friction="0.1"/>
            </joint>
            <joint name="fixed_end" type="fixed">
                <parent link="link2"/>
                <child link="link3"/>
            </joint>
        </robot>
    "#;

    #[test]
    fn parse_minimal_urdf() {
        let model = parse_string(MINIMAL_URDF).unwrap();
        assert_eq!(model.name, "test_robot");
        assert_eq!(model.links.len(), 1);
        assert!(model.joints.is_empty());
        assert_eq!(model.root_link, "base_link");
        assert_eq!(model.dof(), 0);
    }

    #[test]
    fn parse_arm_structure() {
        let model = parse_string(ARM_URDF).unwrap();
        assert_eq!(model.links.len(), 4);
        assert_eq!(model.joints.len(), 3);
        assert_eq!(model.root_link, "base");
        assert_eq!(model.joint_order, vec!["joint2", "joint1", "fixed_end"]);
        assert_eq!(model.dof_names(), vec!["joint2", "joint1"]);
    }

    #[test]
    fn joint_fields_parsed() {
        let model = parse_string(ARM_URDF).unwrap();
        let joint = model.joint("joint1").unwrap();
        assert_eq!(joint.joint_type, JointType::Revolute);
        assert_eq!(joint.parent, "base");
        assert_eq!(joint.child, "link1");
        assert!((joint.origin.xyz[2] - 0.5).abs() < f32::EPSILON);
        assert!((joint.axis[2] - 1.0).abs() < f32::EPSILON);
        assert!((joint.limits.lower.unwrap() + 1.57).abs() < 1e-6);
        assert!((joint.limits.effort - 100.0).abs() < f32::EPSILON);
        assert!((joint.dynamics.damping - 0.5).abs() < f32::EPSILON);
        assert!((joint.dynamics.friction - 0.1).abs() < f32::EPSILON);
    }

    #[test]
    fn continuous_joint_has_no_position_limits() {
        let model = parse_string(ARM_URDF).unwrap();
        let joint = model.joint("joint2").unwrap();
        assert!(joint.limits.lower.is_none());
        assert!(joint.limits.upper.is_none());
    }

    #[test]
    fn link_without_mass_has_no_inertial() {
        let model = parse_string(ARM_URDF).unwrap();
        assert!(model.link("base").unwrap().inertial.is_some());
        assert!(model.link("link2").unwrap().inertial.is_none());
    }

    #[test]
    fn capsule_geometry_kept() {
        let model = parse_string(ARM_URDF).unwrap();
        let link = model.link("link1").unwrap();
        assert!(matches!(
            link.collisions[0].geometry,
            Geometry::Capsule { .. }
        ));
    }

    #[test]
    fn named_material_resolved() {
        let model = parse_string(ARM_URDF).unwrap();
        let visual = &model.link("base").unwrap().visuals[0];
        let material = visual.material.as_ref().unwrap();
        assert_eq!(model.material_color(material), Some([1.0, 0.5, 0.0, 1.0]));
    }

    #[test]
    fn joint_to_unknown_link_fails() {
        let xml = r#"
            <robot name="broken">
                <link name="a"/>
                <joint name="j" type="fixed">
                    <parent link="a"/>
                    <child link="ghost"/>
                </joint>
            </robot>
        "#;
        assert!(matches!(
            parse_string(xml),
            Err(UrdfError::MissingLink(name)) if name == "ghost"
        ));
    }

    #[test]
    fn disconnected_links_fail() {
        let xml = r#"
            <robot name="two_roots">
                <link name="a"/>
                <link name="b"/>
            </robot>
        "#;
        assert!(matches!(
            parse_string(xml),
            Err(UrdfError::MultipleRootLinks(_))
        ));
    }

    #[test]
    fn degenerate_geometry_fails() {
        let xml = r#"
            <robot name="flat">
                <link name="a">
                    <visual>
                        <geometry><box size="1 0 1"/></geometry>
                    </visual>
                </link>
            </robot>
        "#;
        assert!(matches!(
            parse_string(xml),
            Err(UrdfError::InvalidGeometry(_))
        ));
    }

    #[test]
    fn parse_invalid_xml() {
        assert!(matches!(
            parse_string("<not valid urdf>"),
            Err(UrdfError::Parse(_))
        ));
    }

    #[test]
    fn parse_file_not_found() {
        let err = parse_file("/nonexistent/robot.urdf").unwrap_err();
        assert!(matches!(err, UrdfError::Io { .. }));
    }
}
