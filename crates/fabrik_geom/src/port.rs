//! Port derivation: where belts attach to machines.
//!
//! Inputs sit on the face the machine's orientation points at; outputs on
//! the opposite face. Anchors expose a single output centered on the
//! facing face and no inputs. Every port's approach direction is the
//! outward normal of its face: belts arrive from (inputs) or leave in
//! (outputs) that direction, and the port's external tile is one step
//! outside along it.

use crate::direction::Direction;
use crate::ids::MachineId;
use crate::machine::{Machine, MachineKind};
use serde::{Deserialize, Serialize};

/// Whether a port consumes or produces.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PortRole {
    /// The port consumes from a belt.
    Input,
    /// The port feeds a belt.
    Output,
}

/// A single port on a machine face.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct Port {
    /// The machine this port belongs to.
    pub machine: MachineId,
    /// Input or output.
    pub role: PortRole,
    /// Index along the face, in face-tile order.
    pub index: usize,
    /// Absolute x of the face tile the port sits on.
    pub x: i32,
    /// Absolute y of the face tile the port sits on.
    pub y: i32,
    /// Outward normal of the face: the direction a belt arrives from
    /// (inputs) or leaves in (outputs).
    pub approach: Direction,
}

impl Port {
    /// The tile one step outside the port along its approach direction.
    /// Belt paths start and end here.
    pub fn external_tile(&self) -> (i32, i32) {
        let (dx, dy) = self.approach.delta();
        (self.x + dx, self.y + dy)
    }
}

/// The derived input and output ports of a machine.
#[derive(Clone, Debug, Default)]
pub struct MachinePorts {
    /// Input ports in face order.
    pub inputs: Vec<Port>,
    /// Output ports in face order.
    pub outputs: Vec<Port>,
}

/// Derives all ports of a machine from its kind, pose, and orientation.
pub fn machine_ports(machine: &Machine) -> MachinePorts {
    match machine.kind {
        MachineKind::Anchor => MachinePorts {
            inputs: Vec::new(),
            outputs: face_ports(machine, machine.orientation, PortRole::Output, 1),
        },
        _ => {
            let input_face = machine.orientation;
            let output_face = machine.orientation.opposite();
            MachinePorts {
                inputs: face_ports(machine, input_face, PortRole::Input, face_span(machine, input_face)),
                outputs: face_ports(machine, output_face, PortRole::Output, face_span(machine, output_face)),
            }
        }
    }
}

/// Number of input ports a machine exposes.
pub fn input_port_count(machine: &Machine) -> usize {
    match machine.kind {
        MachineKind::Anchor => 0,
        _ => face_span(machine, machine.orientation) as usize,
    }
}

/// Number of output ports a machine exposes.
pub fn output_port_count(machine: &Machine) -> usize {
    match machine.kind {
        MachineKind::Anchor => 1,
        _ => face_span(machine, machine.orientation.opposite()) as usize,
    }
}

/// The number of tiles along the given face.
fn face_span(machine: &Machine, face: Direction) -> i32 {
    let (w, h) = machine.oriented_dims();
    match face.axis() {
        crate::direction::Axis::Vertical => w,   // north/south faces run horizontally
        crate::direction::Axis::Horizontal => h, // east/west faces run vertically
    }
}

/// Builds `count` ports evenly distributed along the given face.
///
/// Offsets follow `round(i·(span−1)/(count−1))` for `count ≥ 2` and the
/// face center for a single port.
fn face_ports(machine: &Machine, face: Direction, role: PortRole, count: i32) -> Vec<Port> {
    let span = face_span(machine, face);
    if count <= 0 || span <= 0 {
        return Vec::new();
    }
    (0..count)
        .map(|i| {
            let offset = if count == 1 {
                ((span - 1) as f64 / 2.0).round() as i32
            } else {
                (i as f64 * (span - 1) as f64 / (count - 1) as f64).round() as i32
            };
            let (x, y) = face_tile(machine, face, offset);
            Port {
                machine: machine.id,
                role,
                index: i as usize,
                x,
                y,
                approach: face,
            }
        })
        .collect()
}

/// The absolute tile at `offset` along the given face.
fn face_tile(machine: &Machine, face: Direction, offset: i32) -> (i32, i32) {
    let (w, h) = machine.oriented_dims();
    match face {
        Direction::North => (machine.x + offset, machine.y),
        Direction::South => (machine.x + offset, machine.y + h - 1),
        Direction::West => (machine.x, machine.y + offset),
        Direction::East => (machine.x + w - 1, machine.y + offset),
    }
}
