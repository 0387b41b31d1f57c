//! Descriptors: periodic recorders of robot state.
//!
//! A [`Descriptor`] is called every `period` steps with the simulated time
//! and a snapshot of every robot. [`StateDescriptor`] keeps the joint
//! positions of one robot over time.

use std::any::Any;

use bevy::prelude::*;
use nalgebra::DVector;

use rigsim_core::time::Scheduler;
use rigsim_physics::components::{JointCommands, JointStates, RobotId};

// ---------------------------------------------------------------------------
// Descriptor
// ---------------------------------------------------------------------------

/// Joint state and commands of one robot at a step.
#[derive(Debug, Clone)]
pub struct RobotSnapshot {
    pub name: String,
    pub positions: DVector<f32>,
    pub velocities: DVector<f32>,
    pub commands: DVector<f32>,
}

pub trait Descriptor: Any + Send + Sync {
    /// Called at time `t` with every robot, ordered by name.
    fn record(&mut self, t: f64, robots: &[RobotSnapshot]);
}

struct Entry {
    descriptor: Box<dyn Descriptor>,
    period: u64,
}

/// Registered descriptors with their periods in steps.
#[derive(Resource, Default)]
pub struct Descriptors {
    entries: Vec<Entry>,
}

impl Descriptors {
    /// Register a descriptor. A period of zero is treated as one.
    pub fn add(&mut self, descriptor: Box<dyn Descriptor>, period: u64) {
        self.entries.push(Entry {
            descriptor,
            period: period.max(1),
        });
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Take the descriptor at `index` out. Later descriptors move down one
    /// index.
    pub fn remove(&mut self, index: usize) -> Option<Box<dyn Descriptor>> {
        (index < self.entries.len()).then(|| self.entries.remove(index).descriptor)
    }

    /// The descriptor at `index` as its concrete type.
    pub fn get<T: Descriptor>(&self, index: usize) -> Option<&T> {
        let descriptor: &dyn Any = &*self.entries.get(index)?.descriptor;
        descriptor.downcast_ref::<T>()
    }

    pub fn get_mut<T: Descriptor>(&mut self, index: usize) -> Option<&mut T> {
        let descriptor: &mut dyn Any = &mut *self.entries.get_mut(index)?.descriptor;
        descriptor.downcast_mut::<T>()
    }
}

impl std::fmt::Debug for Descriptors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Descriptors")
            .field("len", &self.entries.len())
            .finish()
    }
}

/// Feed every due descriptor. Runs in
/// [`RigsimSet::Sense`](rigsim_core::RigsimSet::Sense), after physics.
#[allow(clippy::needless_pass_by_value)] // Bevy system parameters are extracted by value
pub fn descriptor_system(
    scheduler: Res<Scheduler>,
    mut descriptors: ResMut<Descriptors>,
    robots: Query<(&RobotId, &JointStates, &JointCommands)>,
) {
    let step = scheduler.current_step();
    if !descriptors.entries.iter().any(|e| step % e.period == 0) {
        return;
    }

    let mut snapshots: Vec<RobotSnapshot> = robots
        .iter()
        .map(|(id, states, commands)| RobotSnapshot {
            name: id.0.clone(),
            positions: states.positions.clone(),
            velocities: states.velocities.clone(),
            commands: commands.0.clone(),
        })
        .collect();
    snapshots.sort_by(|a, b| a.name.cmp(&b.name));

    // state is read after the physics step, so it belongs to the next instant
    let t = scheduler.next_time();
    for entry in &mut descriptors.entries {
        if step % entry.period == 0 {
            entry.descriptor.record(t, &snapshots);
        }
    }
}

// ---------------------------------------------------------------------------
// StateDescriptor
// ---------------------------------------------------------------------------

/// Records `(t, positions)` of one robot.
#[derive(Debug, Clone, Default)]
pub struct StateDescriptor {
    pub robot: String,
    pub data: Vec<(f64, DVector<f32>)>,
}

impl StateDescriptor {
    pub fn new(robot: impl Into<String>) -> Self {
        Self {
            robot: robot.into(),
            data: Vec::new(),
        }
    }
}

impl Descriptor for StateDescriptor {
    fn record(&mut self, t: f64, robots: &[RobotSnapshot]) {
        if let Some(robot) = robots.iter().find(|r| r.name == self.robot) {
            self.data.push((t, robot.positions.clone()));
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
