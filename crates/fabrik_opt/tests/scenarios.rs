//! End-to-end scenarios exercising the full core surface: grid
//! construction, routing, scoring, and the optimizer pipeline.

use fabrik_geom::{Direction, MachineKind};
use fabrik_grid::{evaluate_grid, ConnectError, GridState};
use fabrik_opt::{Candidate, OptimizeControl, OptimizerConfig, run_optimizer};
use fabrik_route::route_all;
use std::time::Instant;

/// Scenario 1: one connection with a clear corridor routes straight.
#[test]
fn single_connection_clear_path() {
    let mut g = GridState::new(10, 10);
    let a = g.add_machine(MachineKind::Compact, 0, 0, Direction::North).unwrap();
    let b = g.add_machine(MachineKind::Compact, 0, 6, Direction::North).unwrap();
    g.connect(a, 1, b, 1).unwrap();

    let report = route_all(&mut g);
    assert!(report.is_fully_routed());

    let score = evaluate_grid(&g);
    assert_eq!(score.belts, 4.0);
    assert_eq!(score.corners, 0.0);
    assert!(score.area >= 27.0);
}

/// Scenario 2: two belts forced across one corridor cross on exactly one
/// tile, perpendicular, with no corner there.
#[test]
fn crossing_corridor() {
    let mut g = GridState::new(20, 20);
    let west = g.add_machine(MachineKind::Compact, 0, 8, Direction::West).unwrap();
    let east = g.add_machine(MachineKind::Compact, 17, 8, Direction::West).unwrap();
    let north = g.add_machine(MachineKind::Compact, 8, 0, Direction::North).unwrap();
    let south = g.add_machine(MachineKind::Compact, 8, 17, Direction::North).unwrap();
    let horizontal = g.connect(west, 1, east, 1).unwrap();
    let vertical = g.connect(north, 1, south, 1).unwrap();

    assert!(route_all(&mut g).is_fully_routed());
    let score = evaluate_grid(&g);
    assert_eq!(score.corners, 0.0);

    let hp = g.belt_path(horizontal).unwrap();
    let vp = g.belt_path(vertical).unwrap();
    let ht: std::collections::HashSet<_> = hp.segments.iter().map(|s| s.tile()).collect();
    let shared: Vec<_> = vp
        .segments
        .iter()
        .map(|s| s.tile())
        .filter(|t| ht.contains(t))
        .collect();
    assert_eq!(shared.len(), 1, "belts cross exactly once");
    let usage = g.usage_at(shared[0]);
    assert_eq!(usage.horizontal, 1);
    assert_eq!(usage.vertical, 1);
    assert_eq!(usage.corner, 0);
}

/// Scenario 3: self-connections are rejected at connect time, and the
/// optimizer on the pre-connect grid returns the baseline.
#[test]
fn self_connection_rejected() {
    let mut g = GridState::new(5, 5);
    let a = g.add_machine(MachineKind::Compact, 0, 0, Direction::North).unwrap();
    assert_eq!(g.connect(a, 0, a, 0), Err(ConnectError::SelfConnection(a)));

    let baseline = evaluate_grid(&g);
    let out = run_optimizer(&g, &OptimizerConfig::normal(), OptimizeControl::default());
    assert_eq!(out.score.belts, baseline.belts);
    assert_eq!(out.score.area, baseline.area);
}

fn six_machine_grid() -> GridState {
    let mut g = GridState::new(50, 50);
    let a = g.add_machine(MachineKind::Compact, 2, 2, Direction::North).unwrap();
    let b = g.add_machine(MachineKind::Compact, 40, 4, Direction::North).unwrap();
    let c = g.add_machine(MachineKind::Compact, 8, 24, Direction::East).unwrap();
    let d = g.add_machine(MachineKind::Compact, 40, 40, Direction::North).unwrap();
    let e = g.add_machine(MachineKind::Compact, 22, 10, Direction::South).unwrap();
    let f = g.add_machine(MachineKind::Compact, 4, 42, Direction::North).unwrap();
    g.connect(a, 0, e, 0).unwrap();
    g.connect(e, 0, b, 0).unwrap();
    g.connect(b, 1, d, 0).unwrap();
    g.connect(c, 0, d, 1).unwrap();
    g.connect(f, 0, c, 0).unwrap();
    g.connect(a, 1, f, 1).unwrap();
    g
}

/// Scenario 4: the optimizer never returns a score above the baseline.
#[test]
fn optimizer_monotonicity() {
    let g = six_machine_grid();
    let baseline = Candidate::from_grid(&g)
        .routed()
        .expect("the spread layout routes")
        .1;

    let mut cfg = OptimizerConfig::normal();
    cfg.seed = Some(42);
    let out = run_optimizer(&g, &cfg, OptimizeControl::default());
    assert!(
        out.score.total <= baseline.total + 1e-9,
        "optimized {} vs baseline {}",
        out.score.total,
        baseline.total
    );
    assert!(out.iterations > 0);
}

/// Scenario 5: deep mode honors the wall-clock budget within 2×.
#[test]
fn deep_mode_honors_budget() {
    let g = six_machine_grid();
    let mut cfg = OptimizerConfig::deep();
    cfg.seed = Some(42);
    cfg.time_budget_ms = Some(200);

    let started = Instant::now();
    let out = run_optimizer(&g, &cfg, OptimizeControl::default());
    let elapsed = started.elapsed().as_millis();
    assert!(out.iterations > 0);
    assert!(elapsed < 400, "budget 200ms, ran {elapsed}ms");
}

/// Scenario 6: feeding the persisted elite archive back in never loses
/// ground.
#[test]
fn archive_continuity() {
    let g = six_machine_grid();
    let mut cfg = OptimizerConfig::deep();
    cfg.seed = Some(7);
    cfg.time_budget_ms = Some(500);
    cfg.persist_elite_archive = true;

    let first = run_optimizer(&g, &cfg, OptimizeControl::default());
    let archive = first.elite_archive.clone().expect("archive persisted");
    assert!(!archive.is_empty());

    let mut cfg2 = cfg.clone();
    cfg2.seed = Some(8);
    cfg2.incoming_elite_archive = Some(archive);
    let second = run_optimizer(&g, &cfg2, OptimizeControl::default());
    assert!(second.score.total <= first.score.total + 1e-9);
}

/// Determinism: identical (config, seed, grid) gives identical results.
#[test]
fn identical_runs_are_identical() {
    let g = six_machine_grid();
    let mut cfg = OptimizerConfig::normal();
    cfg.seed = Some(1234);

    let a = run_optimizer(&g, &cfg, OptimizeControl::default());
    let b = run_optimizer(&g, &cfg, OptimizeControl::default());
    assert_eq!(a.score.total, b.score.total);
    assert_eq!(a.iterations, b.iterations);
    assert_eq!(
        Candidate::from_grid(&a.grid).fingerprint(),
        Candidate::from_grid(&b.grid).fingerprint()
    );
}

/// Export → import → rebuild preserves the routed score.
#[test]
fn layout_roundtrip_preserves_score() {
    let mut g = six_machine_grid();
    assert!(route_all(&mut g).is_fully_routed());
    let score = evaluate_grid(&g);

    let file = fabrik_layout::LayoutFile::from_grid(&g);
    let mut rebuilt = file.to_grid().expect("round-trip");
    assert!(route_all(&mut rebuilt).is_fully_routed());
    assert_eq!(evaluate_grid(&rebuilt), score);
}
