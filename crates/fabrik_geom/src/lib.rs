//! Core geometry for the Fabrik layout toolkit.
//!
//! Defines the entity vocabulary shared by every other crate: opaque ids,
//! cardinal directions, machine kinds with oriented footprints, derived
//! ports with approach directions, and port-to-port connections. All types
//! here are plain data; grids, belts, and optimization live upstream.

#![warn(missing_docs)]

pub mod connection;
pub mod direction;
pub mod ids;
pub mod machine;
pub mod port;

pub use connection::Connection;
pub use direction::{Axis, Direction};
pub use ids::{ConnectionId, MachineId};
pub use machine::{Machine, MachineKind};
pub use port::{
    input_port_count, machine_ports, output_port_count, MachinePorts, Port, PortRole,
};

/// Manhattan distance between two tiles.
pub fn manhattan(a: (i32, i32), b: (i32, i32)) -> i32 {
    (a.0 - b.0).abs() + (a.1 - b.1).abs()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manhattan_distance() {
        assert_eq!(manhattan((0, 0), (3, 4)), 7);
        assert_eq!(manhattan((2, 2), (2, 2)), 0);
        assert_eq!(manhattan((-1, 0), (1, 0)), 2);
    }
}
