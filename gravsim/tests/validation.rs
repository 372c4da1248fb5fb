use std::path::PathBuf;

use gravsim::simulation::constants::*;
use gravsim::simulation::validation;
use gravsim::{
    run_all_checks, BodyParams, BodyType, DiagnosticsMonitor, EnergyTrend, IntegratorType, NVec3, PhysicsMode,
    Proximity, Scenario, ScenarioConfig, SimError, Simulation,
};

fn scenario_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("scenarios").join(name)
}

// ==================================================================================
// Validation battery
// ==================================================================================

#[test]
fn every_check_passes() {
    let results = run_all_checks();
    assert_eq!(results.len(), 8);
    for r in &results {
        assert!(r.passed, "{r}");
    }
}

#[test]
fn kepler_check_reports_each_radius() {
    let result = validation::check_kepler_third_law();
    assert!(result.passed, "{result}");
    for key in ["error_0.5au", "error_1au", "error_2au", "measured_period_1au"] {
        assert!(result.data.contains_key(key), "missing {key}");
    }
    let period = result.data["measured_period_1au"];
    assert!((period / YEAR - 1.0).abs() < 0.01);
}

#[test]
fn check_results_display_status() {
    let result = validation::check_momentum_conservation();
    assert!(result.to_string().starts_with("[PASS] Momentum Conservation:"));
}

// ==================================================================================
// Diagnostics
// ==================================================================================

#[test]
fn quiet_orbit_has_no_findings() {
    let scenario = Scenario::build_scenario(ScenarioConfig::from_yaml_file(scenario_path("two_body.yaml")).unwrap())
        .unwrap();
    let mut sim = scenario.simulation;
    let mut monitor = DiagnosticsMonitor::new();
    sim.start();
    for _ in 0..20 {
        sim.advance().unwrap();
        monitor.update(&sim);
    }

    let report = monitor.report(&sim);
    assert!(!report.has_errors(), "{:?}", report.errors);
    assert!(!report.has_warnings(), "{:?}", report.warnings);
    assert_eq!(report.energy_trend, EnergyTrend::Stable);
    assert_eq!(monitor.energy_history().count(), 20);
    assert!(report.summary().contains("Bodies: 2"));
}

#[test]
fn overlapping_bodies_are_a_collision() {
    let mut sim = Simulation::default();
    sim.add_body(BodyParams::planet().name("A").build().unwrap()).unwrap();
    sim.add_body(BodyParams::planet().name("B").at(NVec3::new(EARTH_RADIUS, 0.0, 0.0)).build().unwrap())
        .unwrap();
    sim.add_body(BodyParams::planet().name("C").at(NVec3::new(-9.5 * EARTH_RADIUS, 0.0, 0.0)).build().unwrap())
        .unwrap();

    let mut monitor = DiagnosticsMonitor::new();
    monitor.update(&sim);

    let classes: Vec<Proximity> = monitor.encounters().iter().map(|e| e.proximity).collect();
    assert_eq!(classes, vec![Proximity::Collision, Proximity::Approach]);
    assert!(monitor.errors().iter().any(|e| e.contains("Collision: A and B")));
}

#[test]
fn proximity_classes() {
    assert_eq!(Proximity::classify(0.5), Some(Proximity::Collision));
    assert_eq!(Proximity::classify(1.5), Some(Proximity::Close));
    assert_eq!(Proximity::classify(3.0), Some(Proximity::Approach));
    assert_eq!(Proximity::classify(5.0), None);
}

#[test]
fn relativistic_speeds_are_flagged() {
    let mut sim = Simulation::default();
    sim.add_body(
        BodyParams::spaceship()
            .name("Probe")
            .moving(NVec3::new(0.6 * C, 0.0, 0.0))
            .build()
            .unwrap(),
    )
    .unwrap();

    let mut monitor = DiagnosticsMonitor::new();
    monitor.update(&sim);
    assert!(monitor.warnings().iter().any(|w| w.contains("Probe")));
    assert!(monitor.errors().iter().any(|e| e.contains("50% c")));
}

fn sun_and_earth() -> (Simulation, gravsim::BodyId) {
    let mut sim = Simulation::default();
    sim.add_body(BodyParams::star().name("Sun").build().unwrap()).unwrap();
    let earth = BodyParams::planet()
        .name("Earth")
        .at(NVec3::new(AU, 0.0, 0.0))
        .moving(NVec3::new(0.0, (G * SOLAR_MASS / AU).sqrt(), 0.0))
        .build()
        .unwrap();
    let id = sim.add_body(earth).unwrap();
    (sim, id)
}

/// Feed the monitor ten samples, scaling Earth's speed before each one after the first
fn trend_after_scaling(factor: f64) -> EnergyTrend {
    let (mut sim, earth) = sun_and_earth();
    let mut monitor = DiagnosticsMonitor::new();
    for i in 0..10 {
        if i > 0 {
            sim.get_body_mut(earth).unwrap().velocity *= factor;
        }
        monitor.update(&sim);
    }
    monitor.energy_trend()
}

#[test]
fn energy_trend_classes() {
    assert_eq!(trend_after_scaling(1.0), EnergyTrend::Stable);
    assert_eq!(trend_after_scaling(1.01), EnergyTrend::Increasing);
    assert_eq!(trend_after_scaling(0.99), EnergyTrend::Decreasing);
}

#[test]
fn non_finite_energy_is_unstable() {
    let (mut sim, earth) = sun_and_earth();
    let mut monitor = DiagnosticsMonitor::new();
    for _ in 0..9 {
        monitor.update(&sim);
    }
    assert_eq!(monitor.energy_trend(), EnergyTrend::Stable);

    sim.get_body_mut(earth).unwrap().velocity = NVec3::new(f64::NAN, 0.0, 0.0);
    monitor.update(&sim);
    assert_eq!(monitor.energy_trend(), EnergyTrend::Unstable);
    assert!(monitor.errors().iter().any(|e| e.contains("Earth velocity")));
}

#[test]
fn momentum_drift_is_flagged() {
    let (mut sim, earth) = sun_and_earth();
    let mut monitor = DiagnosticsMonitor::new();
    monitor.update(&sim);
    assert!(monitor.warnings().is_empty(), "{:?}", monitor.warnings());

    sim.get_body_mut(earth).unwrap().velocity *= 1.05;
    monitor.update(&sim);
    assert!(monitor.warnings().iter().any(|w| w.starts_with("Momentum drift: 5.00%")), "{:?}", monitor.warnings());
    assert!(monitor.warnings().iter().any(|w| w.starts_with("Angular momentum drift")));
}

#[test]
fn clear_forgets_history() {
    let mut sim = Simulation::default();
    sim.add_body(BodyParams::star().build().unwrap()).unwrap();
    let mut monitor = DiagnosticsMonitor::new();
    monitor.update(&sim);
    monitor.clear();
    assert_eq!(monitor.energy_history().count(), 0);
}

// ==================================================================================
// Scenarios
// ==================================================================================

const YAML: &str = r#"
engine:
  integrator: "rk45"
  physics_mode: "pseudo-newtonian"
parameters:
  timestep: 30.0
  softening: 0.0
  min_dt: 0.5
run:
  steps: 10
bodies:
  - name: "Hole"
    type: blackhole
    mass: 1.98892e31
  - type: star
    x: [ 1.0e9, 0.0, 0.0 ]
    v: [ 0.0, 1.152e6, 0.0 ]
    gravity_source: false
"#;

#[test]
fn yaml_scenario_builds_a_simulation() {
    let cfg = ScenarioConfig::from_yaml_str(YAML).unwrap();
    let Scenario { simulation, steps } = Scenario::build_scenario(cfg).unwrap();

    assert_eq!(steps, 10);
    assert_eq!(simulation.engine().integrator, IntegratorType::Rk45);
    assert_eq!(simulation.engine().physics_mode, PhysicsMode::PseudoNewtonian);
    assert_eq!(simulation.params().timestep, 30.0);
    assert_eq!(simulation.params().min_dt, 0.5);
    assert_eq!(simulation.params().substeps, 1);

    let hole = &simulation.bodies()[0];
    assert_eq!(hole.body_type(), BodyType::BlackHole);
    assert_eq!(hole.schwarzschild_radius(), Some(hole.radius));
    let star = &simulation.bodies()[1];
    assert_eq!(star.mass, SOLAR_MASS);
    assert!(!star.is_gravity_source);
}

#[test]
fn bad_scenarios_are_rejected() {
    let unknown_type = "bodies:\n  - type: quasar\n";
    assert!(matches!(ScenarioConfig::from_yaml_str(unknown_type), Err(SimError::Yaml(_))));

    let cfg = ScenarioConfig::from_yaml_str("parameters:\n  timestep: -1.0\nbodies: []\n").unwrap();
    assert!(matches!(Scenario::build_scenario(cfg), Err(SimError::InvalidParameter(_))));

    let cfg = ScenarioConfig::from_yaml_str("parameters:\n  min_dt: 10.0\n  max_dt: 1.0\nbodies: []\n").unwrap();
    assert!(matches!(Scenario::build_scenario(cfg), Err(SimError::InvalidParameter(_))));

    let cfg = ScenarioConfig::from_yaml_str("bodies:\n  - type: planet\n    mass: 0.0\n").unwrap();
    assert!(matches!(Scenario::build_scenario(cfg), Err(SimError::InvalidBody(_))));
}

#[test]
fn bundled_scenarios_run_cleanly() {
    for name in ["two_body.yaml", "inner_solar_system.yaml", "black_hole.yaml", "binary_pulsar.yaml"] {
        let cfg = ScenarioConfig::from_yaml_file(scenario_path(name)).unwrap();
        let Scenario { mut simulation, .. } = Scenario::build_scenario(cfg).unwrap();
        simulation.start();
        for _ in 0..50 {
            simulation.advance().unwrap();
        }
        assert!(simulation.bodies().iter().all(|b| b.has_finite_state()), "{name}");
        assert!(simulation.energy_error() < 0.01, "{name}: {}", simulation.energy_error());
    }
}
