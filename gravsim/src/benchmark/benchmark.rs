use std::time::Instant;

use crate::error::Result;
use crate::simulation::body::{Body, BodyParams};
use crate::simulation::constants::*;
use crate::simulation::forces::{relative_error, total_energy, Acceleration, Gravity, PhysicsMode};
use crate::simulation::integrator::{self, AdaptiveOptions, IntegratorType};
use crate::simulation::vector::NVec3;

/// Deterministic cloud of `n` roughly solar-system-scale bodies, no rand needed
fn body_cloud(n: usize) -> Result<Vec<Body>> {
    let mut bodies = Vec::with_capacity(n);
    for i in 0..n {
        let i_f = i as f64;
        let x = NVec3::new(
            (i_f * 0.37).sin() * 5.0 * AU,
            (i_f * 0.13).cos() * 5.0 * AU,
            (i_f * 0.07).sin() * 0.5 * AU,
        );
        bodies.push(BodyParams::planet().mass(JUPITER_MASS).at(x).build()?);
    }
    Ok(bodies)
}

fn sun_earth() -> Result<Vec<Body>> {
    let v = (G * SOLAR_MASS / AU).sqrt();
    Ok(vec![
        BodyParams::star().build()?,
        BodyParams::planet()
            .at(NVec3::new(AU, 0.0, 0.0))
            .moving(NVec3::new(0.0, v, 0.0))
            .build()?,
    ])
}

/// Time one direct-summation force evaluation per physics mode over growing N
pub fn bench_gravity() -> Result<()> {
    let ns = [50, 100, 200, 400, 800];
    let modes = [PhysicsMode::Newtonian, PhysicsMode::PseudoNewtonian, PhysicsMode::PostNewtonian1];

    for n in ns {
        let bodies = body_cloud(n)?;
        let positions: Vec<NVec3> = bodies.iter().map(|b| b.position).collect();
        let velocities: Vec<NVec3> = bodies.iter().map(|b| b.velocity).collect();
        let mut out = vec![NVec3::zeros(); n];

        let mut timings = Vec::with_capacity(modes.len());
        for mode in modes {
            let gravity = Gravity::new(mode, DEFAULT_SOFTENING);
            // Warm up
            gravity.evaluate(&bodies, &positions, &velocities, &mut out);

            let t0 = Instant::now();
            gravity.evaluate(&bodies, &positions, &velocities, &mut out);
            timings.push(t0.elapsed().as_secs_f64());
        }

        println!(
            "N = {n:5}, newtonian = {:8.6} s, pseudo-newtonian = {:8.6} s, 1pn = {:8.6} s",
            timings[0], timings[1], timings[2]
        );
    }
    Ok(())
}

/// Mean wall time of one step for each integrator
pub fn bench_integrators() -> Result<()> {
    let ns = [50, 100, 200];
    let steps = 5;
    let options = AdaptiveOptions::default();

    for n in ns {
        let template = body_cloud(n)?;
        let gravity = Gravity::newtonian(DEFAULT_SOFTENING);

        for kind in [IntegratorType::Verlet, IntegratorType::Rk4, IntegratorType::Rk45] {
            let mut bodies = template.clone();
            integrator::initialize_accelerations(&mut bodies, &gravity);

            let t0 = Instant::now();
            for _ in 0..steps {
                integrator::step(kind, &mut bodies, HOUR, &gravity, &options);
            }
            let per_step = t0.elapsed().as_secs_f64() / steps as f64;
            println!("N = {n:5}, {kind:>6}: {per_step:10.6} s/step");
        }
    }
    Ok(())
}

/// One comparison row: how well an integrator held energy over a simulated year
#[derive(Debug, Clone, PartialEq)]
pub struct IntegratorComparison {
    pub integrator: IntegratorType,
    pub steps: usize,
    pub energy_error: f64,
    pub wall_seconds: f64,
}

/// Sun–Earth orbit for one year with each integrator at dt = 1 h
pub fn compare_integrators() -> Result<Vec<IntegratorComparison>> {
    let gravity = Gravity::newtonian(0.0);
    let options = AdaptiveOptions {
        tolerance: 1e-6,
        ..AdaptiveOptions::default()
    };
    let mut rows = Vec::new();

    for kind in [IntegratorType::Verlet, IntegratorType::Rk4, IntegratorType::Rk45] {
        let mut bodies = sun_earth()?;
        integrator::initialize_accelerations(&mut bodies, &gravity);
        let initial = total_energy(&bodies, 0.0);

        let t0 = Instant::now();
        let steps = match kind {
            IntegratorType::Rk45 => {
                integrator::integrate_for(&mut bodies, YEAR, HOUR, &gravity, &options).steps
            }
            _ => {
                let n = (YEAR / HOUR).round() as usize;
                for _ in 0..n {
                    integrator::step(kind, &mut bodies, HOUR, &gravity, &options);
                }
                n
            }
        };
        let wall_seconds = t0.elapsed().as_secs_f64();
        let energy_error = relative_error(total_energy(&bodies, 0.0), initial);

        println!(
            "{kind:>6}: {steps:6} steps, energy error {:.3e}, {wall_seconds:.4} s",
            energy_error
        );
        rows.push(IntegratorComparison {
            integrator: kind,
            steps,
            energy_error,
            wall_seconds,
        });
    }
    Ok(rows)
}
