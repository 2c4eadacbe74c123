//! Opaque ID newtypes for layout entities.
//!
//! [`MachineId`] and [`ConnectionId`] are thin `u32` wrappers used as keys
//! into the grid's entity maps. They are `Copy`, `Ord`, `Hash`, and
//! `Serialize`/`Deserialize`. Fresh ids are allocated by grid-scoped
//! monotonic counters so tests stay reproducible.

use serde::{Deserialize, Serialize};

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(u32);

        impl $name {
            /// Creates an ID from a raw `u32` index.
            pub fn from_raw(index: u32) -> Self {
                Self(index)
            }

            /// Returns the raw `u32` index.
            pub fn as_raw(self) -> u32 {
                self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

define_id!(
    /// Opaque, copyable ID for a machine placed on the grid.
    MachineId
);

define_id!(
    /// Opaque, copyable ID for a port-to-port connection.
    ConnectionId
);

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn machine_id_roundtrip() {
        let id = MachineId::from_raw(42);
        assert_eq!(id.as_raw(), 42);
    }

    #[test]
    fn connection_id_roundtrip() {
        let id = ConnectionId::from_raw(7);
        assert_eq!(id.as_raw(), 7);
    }

    #[test]
    fn id_ordering() {
        let a = MachineId::from_raw(1);
        let b = MachineId::from_raw(2);
        assert!(a < b);
    }

    #[test]
    fn id_hash_in_set() {
        let mut set = HashSet::new();
        set.insert(ConnectionId::from_raw(1));
        set.insert(ConnectionId::from_raw(2));
        set.insert(ConnectionId::from_raw(1));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn id_serde_roundtrip() {
        let id = MachineId::from_raw(55);
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "55");
        let restored: MachineId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, restored);
    }

    #[test]
    fn id_display() {
        assert_eq!(format!("{}", ConnectionId::from_raw(9)), "9");
    }
}
