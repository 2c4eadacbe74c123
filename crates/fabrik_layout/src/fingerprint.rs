//! Layout fingerprints and diversity distance.
//!
//! The fingerprint is a canonical string over machine poses used to
//! deduplicate elite-archive entries; the diversity distance measures how
//! far apart two layouts' shared machines sit, used to keep the archive
//! from filling with near-identical layouts.

use fabrik_geom::{Machine, MachineId};
use std::collections::BTreeMap;

/// Canonical pose fingerprint: `id:x,y,orient|…` sorted by machine id.
pub fn fingerprint<'a>(machines: impl IntoIterator<Item = &'a Machine>) -> String {
    let mut entries: Vec<&Machine> = machines.into_iter().collect();
    entries.sort_by_key(|m| m.id);
    entries
        .iter()
        .map(|m| format!("{}:{},{},{}", m.id, m.x, m.y, m.orientation.tag()))
        .collect::<Vec<_>>()
        .join("|")
}

/// Average pose distance over machines present in both layouts: L1
/// position distance plus 1 for an orientation mismatch. Zero when the
/// layouts share no machines.
pub fn diversity_distance(
    a: &BTreeMap<MachineId, Machine>,
    b: &BTreeMap<MachineId, Machine>,
) -> f64 {
    let mut total = 0.0;
    let mut shared = 0usize;
    for (id, ma) in a {
        if let Some(mb) = b.get(id) {
            total += ((ma.x - mb.x).abs() + (ma.y - mb.y).abs()) as f64;
            if ma.orientation != mb.orientation {
                total += 1.0;
            }
            shared += 1;
        }
    }
    if shared == 0 {
        0.0
    } else {
        total / shared as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fabrik_geom::{Direction, MachineKind};

    fn machine(id: u32, x: i32, y: i32, orientation: Direction) -> Machine {
        Machine {
            id: MachineId::from_raw(id),
            kind: MachineKind::Compact,
            x,
            y,
            orientation,
        }
    }

    #[test]
    fn fingerprint_is_sorted_by_id() {
        let b = machine(2, 5, 6, Direction::East);
        let a = machine(1, 0, 0, Direction::North);
        let fp = fingerprint([&b, &a]);
        assert_eq!(fp, "1:0,0,north|2:5,6,east");
    }

    #[test]
    fn fingerprint_distinguishes_poses() {
        let a = machine(1, 0, 0, Direction::North);
        let moved = machine(1, 1, 0, Direction::North);
        let rotated = machine(1, 0, 0, Direction::South);
        assert_ne!(fingerprint([&a]), fingerprint([&moved]));
        assert_ne!(fingerprint([&a]), fingerprint([&rotated]));
    }

    #[test]
    fn identical_layouts_have_zero_distance() {
        let mut m = BTreeMap::new();
        m.insert(MachineId::from_raw(1), machine(1, 3, 3, Direction::North));
        assert_eq!(diversity_distance(&m, &m.clone()), 0.0);
    }

    #[test]
    fn distance_averages_over_shared_machines() {
        let mut a = BTreeMap::new();
        a.insert(MachineId::from_raw(1), machine(1, 0, 0, Direction::North));
        a.insert(MachineId::from_raw(2), machine(2, 10, 0, Direction::North));
        let mut b = BTreeMap::new();
        // Moved 4 tiles, same orientation.
        b.insert(MachineId::from_raw(1), machine(1, 2, 2, Direction::North));
        // Same position, rotated.
        b.insert(MachineId::from_raw(2), machine(2, 10, 0, Direction::East));
        // (4 + 1) / 2
        assert_eq!(diversity_distance(&a, &b), 2.5);
    }

    #[test]
    fn disjoint_layouts_have_zero_distance() {
        let mut a = BTreeMap::new();
        a.insert(MachineId::from_raw(1), machine(1, 0, 0, Direction::North));
        let mut b = BTreeMap::new();
        b.insert(MachineId::from_raw(2), machine(2, 0, 0, Direction::North));
        assert_eq!(diversity_distance(&a, &b), 0.0);
    }
}
