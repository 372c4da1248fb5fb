use approx::assert_relative_eq;

use gravsim::simulation::constants::*;
use gravsim::{
    generate_body_id, Body, BodyId, BodyParams, BodySnapshot, Engine, IntegratorType, NVec3, Parameters, PhysicsMode,
    RunState, Severity, SimError, Simulation, SimulationState, StateSnapshot, VecRecord, VectorExt, FORMAT_VERSION,
};

fn sun() -> Body {
    BodyParams::star().name("Sun").build().unwrap()
}

fn earth() -> Body {
    let v = (G * SOLAR_MASS / AU).sqrt();
    BodyParams::planet()
        .name("Earth")
        .at(NVec3::new(AU, 0.0, 0.0))
        .moving(NVec3::new(0.0, v, 0.0))
        .build()
        .unwrap()
}

/// Sun–Earth controller with zero softening
pub fn sun_earth_sim(integrator: IntegratorType) -> Simulation {
    let params = Parameters {
        softening: 0.0,
        ..Parameters::default()
    };
    let mut sim = Simulation::new(Engine::new(integrator, PhysicsMode::Newtonian), params);
    sim.add_body(sun()).unwrap();
    sim.add_body(earth()).unwrap();
    sim
}

// ==================================================================================
// Body management
// ==================================================================================

#[test]
fn add_and_remove_bodies() {
    let mut sim = Simulation::default();
    let id = sim.add_body(sun()).unwrap();
    assert_eq!(sim.body_count(), 1);
    assert_eq!(sim.get_body(id).map(|b| b.name.as_str()), Some("Sun"));

    let removed = sim.remove_body(id).unwrap();
    assert_eq!(removed.id, id);
    assert!(sim.get_body(id).is_none());
    assert!(sim.remove_body(id).is_none());
    assert!(sim.baseline().is_none());

    sim.add_body(sun()).unwrap();
    sim.add_body(earth()).unwrap();
    sim.clear_bodies();
    assert_eq!(sim.body_count(), 0);
    assert_eq!(sim.total_energy(), 0.0);
}

#[test]
fn duplicate_ids_are_rejected() {
    let mut sim = Simulation::default();
    let body = sun();
    sim.add_body(body.clone()).unwrap();
    let err = sim.add_body(body.clone()).unwrap_err();
    assert!(matches!(err, SimError::DuplicateBodyId(id) if id == body.id.0));
    assert_eq!(sim.body_count(), 1);
}

#[test]
fn bodies_are_stamped_when_added() {
    let mut sim = sun_earth_sim(IntegratorType::Verlet);
    sim.step(3).unwrap();

    let id = sim.add_body(BodyParams::moon().at(NVec3::new(0.0, AU, 0.0)).build().unwrap()).unwrap();
    let moon = sim.get_body(id).unwrap();
    assert_eq!(moon.created_at, 3.0 * HOUR);
    assert_eq!(moon.max_trail_points(), sim.params().max_trail_points);
}

#[test]
fn adding_a_body_rebaselines() {
    let mut sim = sun_earth_sim(IntegratorType::Verlet);
    let before = sim.baseline().unwrap().total_energy;
    sim.add_body(BodyParams::planet().at(NVec3::new(0.0, 2.0 * AU, 0.0)).build().unwrap()).unwrap();
    assert!(sim.baseline().unwrap().total_energy < before);
    assert_eq!(sim.energy_error(), 0.0);
}

// ==================================================================================
// Run control
// ==================================================================================

#[test]
fn start_refuses_an_empty_simulation() {
    let mut sim = Simulation::default();
    sim.start();
    assert!(!sim.is_running());
    assert_eq!(sim.last_issues().len(), 1);
    assert_eq!(sim.last_issues()[0].severity, Severity::Warning);
}

#[test]
fn advance_does_nothing_while_paused() {
    let mut sim = sun_earth_sim(IntegratorType::Verlet);
    assert_eq!(sim.run_state(), RunState::Paused);
    assert!(sim.advance().unwrap().is_none());
    assert_eq!(sim.step_count(), 0);

    assert!(sim.toggle());
    let report = sim.advance().unwrap().unwrap();
    assert_eq!(report.step_count, 1);
    assert!(!sim.toggle());
}

#[test]
fn advance_runs_every_substep() {
    let mut sim = sun_earth_sim(IntegratorType::Rk4);
    sim.set_substeps(4).unwrap();
    sim.set_time_scale(2.0).unwrap();
    sim.start();

    let report = sim.advance().unwrap().unwrap();
    assert_eq!(report.step_count, 4);
    assert_eq!(sim.step_count(), 4);
    assert_relative_eq!(report.dt, 8.0 * HOUR);
    assert_relative_eq!(sim.time(), 8.0 * HOUR);
}

#[test]
fn single_step_ignores_run_state() {
    let mut sim = sun_earth_sim(IntegratorType::Verlet);
    let report = sim.single_step().unwrap();
    assert_eq!(report.dt, HOUR);
    assert_eq!(sim.time(), HOUR);
    assert!(!sim.is_running());
}

#[test]
fn reset_keeps_positions() {
    let mut sim = sun_earth_sim(IntegratorType::Verlet);
    sim.step(10).unwrap();
    let positions = sim.positions_flat();

    sim.reset();

    assert_eq!(sim.time(), 0.0);
    assert_eq!(sim.step_count(), 0);
    assert_eq!(sim.positions_flat(), positions);
    assert!(sim.bodies().iter().all(|b| b.trail_len() == 0));
}

#[test]
fn run_for_lands_on_the_requested_time() {
    let mut sim = sun_earth_sim(IntegratorType::Verlet);
    let report = sim.run_for(10.5 * HOUR).unwrap();
    assert_eq!(report.step_count, 11);
    assert_relative_eq!(sim.time(), 10.5 * HOUR, max_relative = 1e-12);

    let mut adaptive = sun_earth_sim(IntegratorType::Rk45);
    adaptive.run_for(30.0 * DAY).unwrap();
    assert!((adaptive.time() - 30.0 * DAY).abs() <= adaptive.params().min_dt);
}

#[test]
fn adaptive_controller_carries_its_step_size() {
    let mut sim = sun_earth_sim(IntegratorType::Rk45);
    sim.set_adaptive_tolerance(1e-6).unwrap();
    let first = sim.single_step().unwrap();
    assert_eq!(first.dt, HOUR);
    assert_eq!(first.rejected, 0);

    // an easy orbit lets the step grow
    let suggested = sim.adaptive_next_dt();
    assert!(suggested > HOUR);
    let second = sim.single_step().unwrap();
    if second.rejected == 0 {
        assert_eq!(second.dt, suggested);
    } else {
        assert!(second.dt < suggested);
    }
}

#[test]
fn energy_stays_bounded_over_a_year() {
    let mut sim = sun_earth_sim(IntegratorType::Verlet);
    sim.step(8766).unwrap();
    assert!(sim.energy_error() < 1e-5);
    assert!(sim.last_issues().is_empty());

    let stats = sim.stats();
    assert_eq!(stats.step_count, 8766);
    assert_eq!(stats.body_count, 2);
    assert_relative_eq!(stats.time_years, 8766.0 * HOUR / YEAR);
    assert_eq!(stats.integrator, IntegratorType::Verlet);
}

#[test]
fn fixed_body_stays_put_in_the_controller() {
    let mut sim = Simulation::default();
    let anchor = sim.add_body(BodyParams::star().fixed(true).build().unwrap()).unwrap();
    sim.add_body(earth()).unwrap();
    sim.step(100).unwrap();
    assert_eq!(sim.get_body(anchor).unwrap().position, NVec3::zeros());
}

#[test]
fn pulsars_spin_with_the_clock() {
    let mut sim = Simulation::default();
    let id = sim.add_body(BodyParams::pulsar().rotation_period(HOUR * 4.0).build().unwrap()).unwrap();
    sim.step(1).unwrap();
    let phase = sim.get_body(id).unwrap().rotation().unwrap().phase;
    assert_relative_eq!(phase, std::f64::consts::FRAC_PI_2, max_relative = 1e-12);
}

fn with_comet(mut sim: Simulation) -> Simulation {
    let comet = BodyParams::comet()
        .name("Comet")
        .mass(1.0e13)
        .at(NVec3::new(-5.0 * AU, 0.0, 0.0))
        .moving(NVec3::new(0.0, -12_000.0, 0.0))
        .build()
        .unwrap();
    sim.add_body(comet).unwrap();
    sim
}

#[test]
fn non_finite_bodies_are_reset_and_reported() {
    let mut reference = with_comet(sun_earth_sim(IntegratorType::Verlet));
    let mut sim = with_comet(sun_earth_sim(IntegratorType::Verlet));
    let comet_id = sim.bodies()[2].id;
    sim.get_body_mut(comet_id).unwrap().velocity = NVec3::new(f64::NAN, 0.0, 0.0);

    reference.single_step().unwrap();
    let err = sim.single_step().unwrap_err();

    assert!(matches!(err, SimError::NonFiniteState { count: 1, ref names } if names.contains("Comet")));
    assert!(sim.bodies().iter().all(|b| b.has_finite_state()));
    let comet = sim.get_body(comet_id).unwrap();
    assert_eq!(comet.position, NVec3::zeros());
    assert_eq!(comet.velocity, NVec3::zeros());
    assert!(sim.last_issues().iter().any(|i| i.severity == Severity::Error));

    // the others keep integrating as if nothing happened
    for (b, r) in sim.bodies()[..2].iter().zip(&reference.bodies()[..2]) {
        assert!((b.position - r.position).norm() <= 1e-9 * r.position.norm().max(1.0), "{}", b.name);
        assert!((b.velocity - r.velocity).norm() <= 1e-9 * r.velocity.norm().max(1.0), "{}", b.name);
    }
    assert_eq!(sim.step_count(), 1);
}

#[test]
fn non_finite_trail_points_are_not_kept() {
    let mut sim = with_comet(sun_earth_sim(IntegratorType::Verlet));
    let comet_id = sim.bodies()[2].id;
    sim.get_body_mut(comet_id).unwrap().position = NVec3::new(f64::INFINITY, 0.0, 0.0);

    assert!(sim.single_step().is_err());
    let comet = sim.get_body(comet_id).unwrap();
    assert_eq!(comet.trail_len(), 1);
    assert!(comet.trail().all(|p| p.is_finite()));
}

#[test]
fn energy_drift_raises_issues_by_severity() {
    let mut sim = sun_earth_sim(IntegratorType::Verlet);
    let earth_id = sim.bodies()[1].id;

    // +3% speed: ~6% energy error, above the warning level
    sim.get_body_mut(earth_id).unwrap().velocity *= 1.03;
    let report = sim.single_step().unwrap();
    assert!(report.energy_error > ELEVATED_ENERGY_ERROR && report.energy_error < CRITICAL_ENERGY_ERROR);
    let issues = sim.last_issues();
    assert_eq!(issues.len(), 1);
    assert_eq!(issues[0].severity, Severity::Warning);
    assert!(issues[0].message.contains("exceeds threshold"));

    // +20% on top: far past the critical level
    sim.get_body_mut(earth_id).unwrap().velocity *= 1.2;
    let report = sim.single_step().unwrap();
    assert!(report.energy_error > CRITICAL_ENERGY_ERROR);
    let issues = sim.last_issues();
    assert_eq!(issues.len(), 1);
    assert_eq!(issues[0].severity, Severity::Error);
    assert!(issues[0].message.starts_with("Critical energy error"));

    sim.rebaseline();
    sim.single_step().unwrap();
    assert!(sim.last_issues().is_empty());
}

#[test]
fn invalid_settings_are_rejected() {
    let mut sim = sun_earth_sim(IntegratorType::Verlet);
    assert!(matches!(sim.set_timestep(0.0), Err(SimError::InvalidParameter(_))));
    assert!(matches!(sim.set_timestep(f64::NAN), Err(SimError::InvalidParameter(_))));
    assert!(matches!(sim.set_time_scale(-1.0), Err(SimError::InvalidParameter(_))));
    assert!(matches!(sim.set_substeps(0), Err(SimError::InvalidParameter(_))));
    assert!(matches!(sim.set_softening(-1.0), Err(SimError::InvalidParameter(_))));
    assert!(matches!(sim.set_adaptive_tolerance(0.0), Err(SimError::InvalidParameter(_))));
    assert_eq!(sim.params().timestep, HOUR);
}

#[test]
fn changing_physics_mode_rebaselines() {
    let mut sim = sun_earth_sim(IntegratorType::Verlet);
    sim.step(100).unwrap();
    assert!(sim.energy_error() > 0.0);
    sim.set_physics_mode(PhysicsMode::PostNewtonian1);
    assert_eq!(sim.energy_error(), 0.0);
    assert_eq!(sim.engine().physics_mode, PhysicsMode::PostNewtonian1);
}

#[test]
fn identical_runs_hash_identically() {
    let mut a = sun_earth_sim(IntegratorType::Rk4);
    let mut b = Simulation::from_state(&a.to_state()).unwrap();
    assert_eq!(a.state_hash(), b.state_hash());

    a.step(50).unwrap();
    b.step(50).unwrap();
    assert_eq!(a.state_hash(), b.state_hash());

    b.single_step().unwrap();
    assert_ne!(a.state_hash(), b.state_hash());
}

// ==================================================================================
// Persistence
// ==================================================================================

#[test]
fn state_round_trips_through_json() {
    let mut sim = sun_earth_sim(IntegratorType::Rk45);
    sim.set_softening(1e6).unwrap();
    sim.step(5).unwrap();

    let json = sim.to_json().unwrap();
    let mut restored = Simulation::default();
    restored.load_json(&json).unwrap();

    assert_eq!(restored.time(), sim.time());
    assert_eq!(restored.positions_flat(), sim.positions_flat());
    assert_eq!(restored.velocities_flat(), sim.velocities_flat());
    assert_eq!(restored.engine(), sim.engine());
    assert_eq!(restored.params().softening, 1e6);
    assert_eq!(restored.step_count(), 0);
    for (a, b) in restored.bodies().iter().zip(sim.bodies()) {
        assert_eq!(a.id, b.id);
        assert_eq!(a.name, b.name);
        assert_eq!(a.kind, b.kind);
    }
}

#[test]
fn state_json_uses_camel_case() {
    let sim = sun_earth_sim(IntegratorType::Rk45);
    let value: serde_json::Value = serde_json::from_str(&sim.to_json().unwrap()).unwrap();
    assert_eq!(value["version"], FORMAT_VERSION);
    assert_eq!(value["integratorType"], "rk45");
    assert_eq!(value["physicsMode"], "newtonian");
    assert!(value.get("timeScale").is_some());
    assert_eq!(value["bodies"][0]["type"], "star");
    assert!(value["bodies"][0].get("isFixed").is_some());
}

#[test]
fn future_versions_are_rejected() {
    let json = r#"{"version": 2, "time": 0.0, "bodies": []}"#;
    let err = SimulationState::from_json(json).unwrap_err();
    assert!(matches!(err, SimError::UnsupportedVersion { found: 2, supported: 1 }));
}

#[test]
fn missing_version_is_rejected() {
    let err = SimulationState::from_json(r#"{"time": 0.0, "bodies": []}"#).unwrap_err();
    assert!(matches!(err, SimError::MissingVersion));

    let err = SimulationState::from_json(r#"{"version": "one", "bodies": []}"#).unwrap_err();
    assert!(matches!(err, SimError::MalformedState(_)));
}

#[test]
fn optional_state_fields_take_defaults() {
    let json = r#"{
        "version": 1,
        "bodies": [
            {"id": 4000001, "type": "planet", "mass": 1.0e24,
             "position": {"x": 1.0e11, "y": 0.0, "z": 0.0},
             "velocity": {"x": 0.0, "y": 3.0e4, "z": 0.0}}
        ]
    }"#;
    let sim = Simulation::from_state(&SimulationState::from_json(json).unwrap()).unwrap();
    assert_eq!(sim.params().timestep, DEFAULT_TIMESTEP);
    assert_eq!(sim.params().softening, DEFAULT_SOFTENING);
    assert_eq!(sim.engine(), Engine::default());
    let body = &sim.bodies()[0];
    assert!(body.is_gravity_source && body.is_gravity_target);
    assert_eq!(body.radius, EARTH_RADIUS);
}

#[test]
fn failed_load_leaves_simulation_untouched() {
    let mut sim = sun_earth_sim(IntegratorType::Verlet);
    sim.step(2).unwrap();
    let hash = sim.state_hash();

    let mut state = sim.to_state();
    state.bodies[1].id = state.bodies[0].id;
    assert!(matches!(sim.load_state(&state), Err(SimError::DuplicateBodyId(_))));

    let mut state = sim.to_state();
    state.bodies[1].mass = -1.0;
    assert!(matches!(sim.load_state(&state), Err(SimError::InvalidBody(_))));

    let mut state = sim.to_state();
    state.timestep = 0.0;
    assert!(matches!(sim.load_state(&state), Err(SimError::MalformedState(_))));

    assert_eq!(sim.state_hash(), hash);
    assert_eq!(sim.step_count(), 2);
}

#[test]
fn loading_reserves_ids() {
    let mut state = sun_earth_sim(IntegratorType::Verlet).to_state();
    state.bodies[0].id = BodyId(9_000_000);
    state.bodies[1].id = BodyId(9_000_001);
    let _sim = Simulation::from_state(&state).unwrap();
    assert!(generate_body_id() > BodyId(9_000_001));
}

#[test]
fn snapshot_restores_positions() {
    let mut sim = sun_earth_sim(IntegratorType::Verlet);
    sim.step(3).unwrap();
    let snapshot = sim.snapshot();
    let positions = sim.positions_flat();
    let json = snapshot.to_json().unwrap();
    assert!(!json.contains("mass"));

    sim.step(20).unwrap();
    let updated = sim.apply_snapshot(&StateSnapshot::from_json(&json).unwrap()).unwrap();

    assert_eq!(updated, 2);
    assert_eq!(sim.time(), 3.0 * HOUR);
    assert_eq!(sim.positions_flat(), positions);
}

#[test]
fn snapshot_ignores_unknown_ids_and_rejects_nan() {
    let mut sim = sun_earth_sim(IntegratorType::Verlet);
    let stranger = BodySnapshot {
        id: BodyId(u64::MAX),
        position: VecRecord { x: 1.0, y: 2.0, z: 3.0 },
        velocity: VecRecord { x: 0.0, y: 0.0, z: 0.0 },
    };
    let snapshot = StateSnapshot {
        time: 42.0,
        bodies: vec![stranger],
    };
    assert_eq!(sim.apply_snapshot(&snapshot).unwrap(), 0);
    assert_eq!(sim.time(), 42.0);

    let bad = StateSnapshot {
        time: 50.0,
        bodies: vec![BodySnapshot {
            id: sim.bodies()[0].id,
            position: VecRecord { x: f64::NAN, y: 0.0, z: 0.0 },
            velocity: VecRecord { x: 0.0, y: 0.0, z: 0.0 },
        }],
    };
    assert!(matches!(sim.apply_snapshot(&bad), Err(SimError::MalformedState(_))));
    assert_eq!(sim.time(), 42.0);
}

#[test]
fn stats_serialize_in_camel_case() {
    let mut sim = sun_earth_sim(IntegratorType::Verlet);
    sim.step(24).unwrap();
    let value = serde_json::to_value(sim.stats()).unwrap();
    assert_eq!(value["stepCount"], 24);
    assert_eq!(value["timeDays"], 1.0);
    assert_eq!(value["physicsMode"], "newtonian");
    assert_eq!(value["isRunning"], false);
}
