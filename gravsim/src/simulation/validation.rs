//! Self-contained physics checks
//!
//! Each check builds its own small scenario, integrates it with zero global
//! softening and reports pass/fail with a message and the raw numbers. None of
//! them touch a `Simulation`; they drive the integrators directly.

use std::collections::BTreeMap;
use std::f64::consts::PI;
use std::fmt;

use log::info;

use crate::error::Result;
use crate::simulation::body::{Body, BodyParams};
use crate::simulation::constants::*;
use crate::simulation::forces::{center_of_mass, relative_error, ConservationQuantities, Gravity};
use crate::simulation::integrator::{self, AdaptiveOptions};
use crate::simulation::vector::{NVec3, VectorExt};

#[derive(Debug, Clone, PartialEq)]
pub struct CheckResult {
    pub name: String,
    pub passed: bool,
    pub message: String,
    pub data: BTreeMap<String, f64>,
}

impl CheckResult {
    fn new(name: &str, passed: bool, message: String, data: &[(&str, f64)]) -> Self {
        Self {
            name: name.to_string(),
            passed,
            message,
            data: data.iter().map(|(k, v)| (k.to_string(), *v)).collect(),
        }
    }

    /// Failed result for a check that could not even set itself up
    fn failed(name: &str, err: impl fmt::Display) -> Self {
        Self::new(name, false, format!("Error: {err}"), &[])
    }
}

impl fmt::Display for CheckResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = if self.passed { "PASS" } else { "FAIL" };
        write!(f, "[{status}] {}: {}", self.name, self.message)
    }
}

fn run_check(name: &str, check: impl FnOnce() -> Result<CheckResult>) -> CheckResult {
    check().unwrap_or_else(|err| CheckResult::failed(name, err))
}

fn body(params: BodyParams, mass: f64, position: NVec3, velocity: NVec3) -> Result<Body> {
    params.mass(mass).at(position).moving(velocity).build()
}

fn verlet_run(bodies: &mut [Body], dt: f64, steps: usize, gravity: &Gravity) {
    integrator::initialize_accelerations(bodies, gravity);
    for _ in 0..steps {
        integrator::velocity_verlet_step(bodies, dt, gravity);
    }
}

/// Circular Sun–Earth orbit over one period: radius within 1%, energy within 0.1%
pub fn check_two_body_orbit() -> CheckResult {
    let name = "Two-Body Orbit Stability";
    run_check(name, || {
        let r = AU;
        let v = (G * SOLAR_MASS / r).sqrt();
        let mut bodies = vec![
            body(BodyParams::star().radius(SOLAR_RADIUS), SOLAR_MASS, NVec3::zeros(), NVec3::zeros())?,
            body(BodyParams::planet(), EARTH_MASS, NVec3::new(r, 0.0, 0.0), NVec3::new(0.0, v, 0.0))?,
        ];
        let gravity = Gravity::newtonian(0.0);

        let initial_r = bodies[1].position.distance(&bodies[0].position);
        let initial_energy = ConservationQuantities::measure(&bodies, 0.0).total_energy;

        let period = 2.0 * PI * (r * r * r / (G * SOLAR_MASS)).sqrt();
        let dt = HOUR;
        let steps = (period / dt).floor() as usize;
        verlet_run(&mut bodies, dt, steps, &gravity);

        let final_r = bodies[1].position.distance(&bodies[0].position);
        let radius_error = relative_error(final_r, initial_r);
        let energy_error = relative_error(ConservationQuantities::measure(&bodies, 0.0).total_energy, initial_energy);

        Ok(CheckResult::new(
            name,
            radius_error < 0.01 && energy_error < 0.001,
            format!(
                "Radius error: {:.4}%, Energy error: {:.6}%",
                radius_error * 100.0,
                energy_error * 100.0
            ),
            &[("radius_error", radius_error), ("energy_error", energy_error), ("steps", steps as f64)],
        ))
    })
}

/// Three bodies, 10 000 one-hour steps, energy drift under 0.1%
pub fn check_energy_conservation() -> CheckResult {
    let name = "Energy Conservation";
    run_check(name, || {
        let mut bodies = vec![
            body(BodyParams::star(), 1e30, NVec3::zeros(), NVec3::zeros())?,
            body(BodyParams::planet(), 1e26, NVec3::new(1e11, 0.0, 0.0), NVec3::new(0.0, 2e4, 0.0))?,
            body(BodyParams::planet(), 1e25, NVec3::new(0.0, 2e11, 0.0), NVec3::new(-1.5e4, 0.0, 0.0))?,
        ];
        let gravity = Gravity::newtonian(0.0);
        let initial = ConservationQuantities::measure(&bodies, 0.0).total_energy;

        let steps = 10_000;
        verlet_run(&mut bodies, HOUR, steps, &gravity);

        let final_energy = ConservationQuantities::measure(&bodies, 0.0).total_energy;
        let error = relative_error(final_energy, initial);
        Ok(CheckResult::new(
            name,
            error < 0.001,
            format!("Energy drift: {:.6}% after {steps} steps", error * 100.0),
            &[("initial_energy", initial), ("final_energy", final_energy), ("error", error)],
        ))
    })
}

/// Two equal masses with opposite momenta keep zero net momentum
pub fn check_momentum_conservation() -> CheckResult {
    let name = "Momentum Conservation";
    run_check(name, || {
        let mut bodies = vec![
            body(BodyParams::planet(), 1e20, NVec3::new(-1e9, 0.0, 0.0), NVec3::new(1000.0, 500.0, 0.0))?,
            body(BodyParams::planet(), 1e20, NVec3::new(1e9, 0.0, 0.0), NVec3::new(-1000.0, -500.0, 0.0))?,
        ];
        let gravity = Gravity::newtonian(0.0);
        let initial = ConservationQuantities::measure(&bodies, 0.0).momentum.norm();

        verlet_run(&mut bodies, 1000.0, 5000, &gravity);

        let final_momentum = ConservationQuantities::measure(&bodies, 0.0).momentum.norm();
        let error = relative_error(final_momentum, initial);
        // around zero net momentum only an absolute bound makes sense
        let passed = if initial > 1e-10 {
            error < 1e-10
        } else {
            final_momentum < 1e5
        };
        Ok(CheckResult::new(
            name,
            passed,
            format!("Momentum: initial {initial:.3e}, final {final_momentum:.3e} kg m/s"),
            &[("initial_momentum", initial), ("final_momentum", final_momentum), ("error", error)],
        ))
    })
}

/// Elliptical orbit (1.3× circular speed) for a year, |L| within 0.01%
pub fn check_angular_momentum_conservation() -> CheckResult {
    let name = "Angular Momentum Conservation";
    run_check(name, || {
        let m = 1e30;
        let r = 1e11;
        let v = (G * m / r).sqrt() * 1.3;
        let mut bodies = vec![
            body(BodyParams::star(), m, NVec3::zeros(), NVec3::zeros())?,
            body(BodyParams::planet(), 1e24, NVec3::new(r, 0.0, 0.0), NVec3::new(0.0, v, 0.0))?,
        ];
        let gravity = Gravity::newtonian(0.0);
        let initial = ConservationQuantities::measure(&bodies, 0.0).angular_momentum.norm();

        verlet_run(&mut bodies, HOUR, 8760, &gravity);

        let final_l = ConservationQuantities::measure(&bodies, 0.0).angular_momentum.norm();
        let error = relative_error(final_l, initial);
        Ok(CheckResult::new(
            name,
            error < 1e-4,
            format!("Angular momentum drift: {:.6}%", error * 100.0),
            &[("initial_l", initial), ("final_l", final_l), ("error", error)],
        ))
    })
}

/// Star and planet with zero net momentum: centre of mass moves < 1000 km
pub fn check_center_of_mass() -> CheckResult {
    let name = "Center of Mass Motion";
    run_check(name, || {
        let star_mass = 2e30;
        let planet_mass = 1e28;
        let planet_v = 4e4;
        let mut bodies = vec![
            body(
                BodyParams::star(),
                star_mass,
                NVec3::zeros(),
                NVec3::new(0.0, -planet_mass * planet_v / star_mass, 0.0),
            )?,
            body(
                BodyParams::planet(),
                planet_mass,
                NVec3::new(5e10, 0.0, 0.0),
                NVec3::new(0.0, planet_v, 0.0),
            )?,
        ];
        let gravity = Gravity::newtonian(0.0);
        let (initial, _) = center_of_mass(&bodies);

        verlet_run(&mut bodies, 1000.0, 5000, &gravity);

        let (final_com, _) = center_of_mass(&bodies);
        let drift = final_com.distance(&initial);
        Ok(CheckResult::new(
            name,
            drift < 1e6,
            format!("Center of mass drift: {}", units::format_distance(drift)),
            &[("drift", drift)],
        ))
    })
}

/// Forward N steps, flip velocities, N more, flip back: within 1% of the start
pub fn check_time_reversal() -> CheckResult {
    let name = "Integrator Time Reversibility";
    run_check(name, || {
        let mut bodies = vec![
            body(BodyParams::star(), 1e30, NVec3::zeros(), NVec3::zeros())?,
            body(BodyParams::planet(), 1e24, NVec3::new(1e11, 0.0, 0.0), NVec3::new(0.0, 3e4, 0.0))?,
        ];
        let gravity = Gravity::newtonian(0.0);
        let initial_x: Vec<NVec3> = bodies.iter().map(|b| b.position).collect();
        let initial_v: Vec<NVec3> = bodies.iter().map(|b| b.velocity).collect();

        let dt = HOUR;
        let steps = 1000;
        verlet_run(&mut bodies, dt, steps, &gravity);
        for b in &mut bodies {
            b.velocity = -b.velocity;
        }
        verlet_run(&mut bodies, dt, steps, &gravity);
        for b in &mut bodies {
            b.velocity = -b.velocity;
        }

        let mut max_pos_error: f64 = 0.0;
        let mut max_vel_error: f64 = 0.0;
        for (i, b) in bodies.iter().enumerate() {
            max_pos_error = max_pos_error.max(b.position.distance(&initial_x[i]));
            max_vel_error = max_vel_error.max(b.velocity.distance(&initial_v[i]));
        }
        let rel_pos = max_pos_error / initial_x[1].norm();
        let rel_vel = max_vel_error / initial_v[1].norm();

        Ok(CheckResult::new(
            name,
            rel_pos < 0.01 && rel_vel < 0.01,
            format!(
                "Position error: {:.4}%, Velocity error: {:.4}%",
                rel_pos * 100.0,
                rel_vel * 100.0
            ),
            &[
                ("max_pos_error", max_pos_error),
                ("max_vel_error", max_vel_error),
                ("rel_pos_error", rel_pos),
                ("rel_vel_error", rel_vel),
            ],
        ))
    })
}

/// Measured period between two upward y-crossings, `None` if fewer than two
/// crossings happen within `max_steps`
fn measure_period(bodies: &mut [Body], dt: f64, max_steps: usize, gravity: &Gravity) -> Option<f64> {
    integrator::initialize_accelerations(bodies, gravity);
    let mut crossings = Vec::with_capacity(2);
    let mut last_y = bodies[1].position.y - bodies[0].position.y;

    for step in 0..max_steps {
        integrator::velocity_verlet_step(bodies, dt, gravity);
        let y = bodies[1].position.y - bodies[0].position.y;
        if last_y < 0.0 && y >= 0.0 {
            // linear interpolation inside the step
            let frac = -last_y / (y - last_y);
            crossings.push((step as f64 + frac) * dt);
            if crossings.len() == 2 {
                return Some(crossings[1] - crossings[0]);
            }
        }
        last_y = y;
    }
    None
}

/// Periods at 0.5, 1 and 2 AU match `2π√(r³/GM)` within 1%
pub fn check_kepler_third_law() -> CheckResult {
    let name = "Kepler's Third Law";
    run_check(name, || {
        let gravity = Gravity::newtonian(0.0);
        let dt = HOUR;
        let mut data = Vec::new();
        let mut details = Vec::new();
        let mut max_error: f64 = 0.0;

        for factor in [0.5, 1.0, 2.0] {
            let r = AU * factor;
            let v = (G * SOLAR_MASS / r).sqrt();
            let mut bodies = vec![
                body(BodyParams::star(), SOLAR_MASS, NVec3::zeros(), NVec3::zeros())?,
                body(BodyParams::planet(), 1e24, NVec3::new(r, 0.0, 0.0), NVec3::new(0.0, v, 0.0))?,
            ];
            let expected = 2.0 * PI * (r * r * r / (G * SOLAR_MASS)).sqrt();
            let max_steps = (2.5 * expected / dt).ceil() as usize;

            let error = match measure_period(&mut bodies, dt, max_steps, &gravity) {
                Some(measured) => {
                    data.push((format!("measured_period_{factor}au"), measured));
                    relative_error(measured, expected)
                }
                None => f64::INFINITY,
            };
            data.push((format!("expected_period_{factor}au"), expected));
            data.push((format!("error_{factor}au"), error));
            details.push(format!("r={factor}AU: error={:.3}%", error * 100.0));
            max_error = max_error.max(error);
        }

        let mut result = CheckResult::new(
            name,
            max_error < 0.01,
            format!("Max period error: {:.3}% ({})", max_error * 100.0, details.join(", ")),
            &[("max_error", max_error)],
        );
        result.data.extend(data);
        Ok(result)
    })
}

/// RK45 over a fixed duration lands on the requested time
pub fn check_adaptive_duration() -> CheckResult {
    let name = "Adaptive Step Landing";
    run_check(name, || {
        let r = AU;
        let v = (G * SOLAR_MASS / r).sqrt();
        let mut bodies = vec![
            body(BodyParams::star(), SOLAR_MASS, NVec3::zeros(), NVec3::zeros())?,
            body(BodyParams::planet(), EARTH_MASS, NVec3::new(r, 0.0, 0.0), NVec3::new(0.0, v, 0.0))?,
        ];
        let gravity = Gravity::newtonian(0.0);
        let options = AdaptiveOptions {
            tolerance: 1e-6,
            ..AdaptiveOptions::default()
        };
        integrator::initialize_accelerations(&mut bodies, &gravity);

        let duration = 30.0 * DAY;
        let summary = integrator::integrate_for(&mut bodies, duration, HOUR, &gravity, &options);
        let miss = (summary.elapsed - duration).abs();
        Ok(CheckResult::new(
            name,
            miss <= options.min_dt,
            format!(
                "Elapsed {:.3} s of {duration:.0} s in {} steps ({} rejected)",
                summary.elapsed, summary.steps, summary.rejected
            ),
            &[
                ("elapsed", summary.elapsed),
                ("steps", summary.steps as f64),
                ("rejected", summary.rejected as f64),
                ("miss", miss),
            ],
        ))
    })
}

/// Run the whole battery
pub fn run_all_checks() -> Vec<CheckResult> {
    let results = vec![
        check_two_body_orbit(),
        check_energy_conservation(),
        check_momentum_conservation(),
        check_angular_momentum_conservation(),
        check_center_of_mass(),
        check_time_reversal(),
        check_kepler_third_law(),
        check_adaptive_duration(),
    ];
    let passed = results.iter().filter(|r| r.passed).count();
    info!("Validation complete: {passed}/{} checks passed", results.len());
    results
}
