//! URDF fixtures.

use std::path::PathBuf;

use rigsim_urdf::{RobotModel, parse_string};

/// The four-joint arm shipped with the application.
pub const ARM_URDF: &str = include_str!("../../../apps/rigsim-app/res/models/arm.urdf");

/// Single revolute pendulum hanging from a fixed base. The bob is a 1 kg
/// point-like mass 0.5 m below the pivot, swinging about +y.
pub const PENDULUM_URDF: &str = r#"
<robot name="pendulum">
    <link name="base"/>
    <link name="bob">
        <inertial>
            <origin xyz="0 0 -0.5"/>
            <mass value="1.0"/>
            <inertia ixx="0.0001" ixy="0" ixz="0" iyy="0.0001" iyz="0" izz="0.0001"/>
        </inertial>
        <visual>
            <origin xyz="0 0 -0.5"/>
            <geometry><sphere radius="0.05"/></geometry>
        </visual>
    </link>
    <joint name="hinge" type="revolute">
        <parent link="base"/>
        <child link="bob"/>
        <origin xyz="0 0 1"/>
        <axis xyz="0 1 0"/>
        <limit lower="-3.1" upper="3.1" effort="1000" velocity="100"/>
    </joint>
</robot>
"#;

/// A 2 kg carriage on a horizontal prismatic rail along +x.
pub const SLIDER_URDF: &str = r#"
<robot name="slider">
    <link name="rail"/>
    <link name="carriage">
        <inertial>
            <mass value="2.0"/>
            <inertia ixx="0.01" ixy="0" ixz="0" iyy="0.01" iyz="0" izz="0.01"/>
        </inertial>
        <collision>
            <geometry><box size="0.1 0.1 0.1"/></geometry>
        </collision>
    </link>
    <joint name="rail_joint" type="prismatic">
        <parent link="rail"/>
        <child link="carriage"/>
        <origin xyz="0 0 0.5"/>
        <axis xyz="1 0 0"/>
        <limit lower="-1.0" upper="1.0" effort="100" velocity="10"/>
    </joint>
</robot>
"#;

/// A wheel spinning freely about the vertical axis.
pub const WHEEL_URDF: &str = r#"
<robot name="wheel">
    <link name="hub"/>
    <link name="disk">
        <inertial>
            <mass value="1.0"/>
            <inertia ixx="0.01" ixy="0" ixz="0" iyy="0.01" iyz="0" izz="0.02"/>
        </inertial>
        <visual>
            <geometry><cylinder radius="0.2" length="0.05"/></geometry>
        </visual>
    </link>
    <joint name="spin" type="continuous">
        <parent link="hub"/>
        <child link="disk"/>
        <origin xyz="0 0 1"/>
        <axis xyz="0 0 1"/>
    </joint>
</robot>
"#;

/// Absolute path of the bundled arm URDF.
pub fn arm_urdf_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../apps/rigsim-app/res/models/arm.urdf")
}

fn parse(xml: &str, name: &str) -> RobotModel {
    parse_string(xml).unwrap_or_else(|e| panic!("fixture {name} must parse: {e}"))
}

pub fn arm_model() -> RobotModel {
    parse(ARM_URDF, "arm")
}

pub fn pendulum_model() -> RobotModel {
    parse(PENDULUM_URDF, "pendulum")
}

pub fn slider_model() -> RobotModel {
    parse(SLIDER_URDF, "slider")
}

pub fn wheel_model() -> RobotModel {
    parse(WHEEL_URDF, "wheel")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
