//! Directed port-to-port connections.

use crate::ids::{ConnectionId, MachineId};
use serde::{Deserialize, Serialize};

/// A directed connection from one machine's output port to another
/// machine's input port.
///
/// A given `(machine, port index, role)` pair appears in at most one
/// connection; the grid enforces this at construction and the optimizer
/// preserves it.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct Connection {
    /// The unique ID of this connection.
    pub id: ConnectionId,
    /// The machine whose output feeds the belt.
    pub source: MachineId,
    /// Output-port index on the source machine.
    pub source_port: usize,
    /// The machine whose input the belt feeds.
    pub target: MachineId,
    /// Input-port index on the target machine.
    pub target_port: usize,
}
