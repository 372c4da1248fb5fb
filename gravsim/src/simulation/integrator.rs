//! Time integrators for the N-body system
//!
//! Velocity Verlet (symplectic, the default), classical RK4, and adaptive
//! Dormand–Prince RK45. All of them advance every non-fixed body in place and
//! return with accelerations consistent with the new positions.

use std::fmt;
use std::str::FromStr;

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use super::body::Body;
use super::constants::*;
use super::forces::Acceleration;
use super::vector::{NVec3, VectorExt};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntegratorType {
    #[default]
    Verlet,
    Rk4,
    Rk45,
}

impl IntegratorType {
    pub fn as_str(self) -> &'static str {
        match self {
            IntegratorType::Verlet => "verlet",
            IntegratorType::Rk4 => "rk4",
            IntegratorType::Rk45 => "rk45",
        }
    }

    pub fn is_adaptive(self) -> bool {
        matches!(self, IntegratorType::Rk45)
    }
}

impl fmt::Display for IntegratorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for IntegratorType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "verlet" | "velocity-verlet" => Ok(IntegratorType::Verlet),
            "rk4" => Ok(IntegratorType::Rk4),
            "rk45" | "dopri" => Ok(IntegratorType::Rk45),
            other => Err(format!("unknown integrator '{other}'")),
        }
    }
}

/// Step-size control for the adaptive integrator
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AdaptiveOptions {
    pub tolerance: f64,
    pub min_dt: f64,
    pub max_dt: f64,
    pub safety_factor: f64,
    pub max_retries: usize,
}

impl Default for AdaptiveOptions {
    fn default() -> Self {
        Self {
            tolerance: DEFAULT_ADAPTIVE_TOLERANCE,
            min_dt: DEFAULT_MIN_DT,
            max_dt: DEFAULT_MAX_DT,
            safety_factor: DEFAULT_SAFETY_FACTOR,
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }
}

/// What one accepted step actually did
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepOutcome {
    /// simulated time consumed
    pub dt: f64,
    /// normalized error estimate (0 for fixed-step methods)
    pub error: f64,
    /// suggested size of the next step
    pub next_dt: f64,
    /// attempts rejected before this one was accepted
    pub rejected: usize,
    /// retry bound hit; the last attempt was accepted over tolerance
    pub degraded: bool,
}

impl StepOutcome {
    fn fixed(dt: f64) -> Self {
        Self {
            dt,
            error: 0.0,
            next_dt: dt,
            rejected: 0,
            degraded: false,
        }
    }
}

/// Evaluate accelerations for the current body state before the first step
pub fn initialize_accelerations(bodies: &mut [Body], forces: &dyn Acceleration) {
    forces.apply(bodies);
}

/// Advance one step with the selected method
pub fn step(
    integrator: IntegratorType,
    bodies: &mut [Body],
    dt: f64,
    forces: &dyn Acceleration,
    options: &AdaptiveOptions,
) -> StepOutcome {
    match integrator {
        IntegratorType::Verlet => velocity_verlet_step(bodies, dt, forces),
        IntegratorType::Rk4 => rk4_step(bodies, dt, forces),
        IntegratorType::Rk45 => rk45_step(bodies, dt, forces, options),
    }
}

/// Velocity Verlet, relying on the accelerations already stored on the bodies
pub fn velocity_verlet_step(bodies: &mut [Body], dt: f64, forces: &dyn Acceleration) -> StepOutcome {
    if bodies.is_empty() {
        return StepOutcome::fixed(dt);
    }
    let half_dt = 0.5 * dt;
    let half_dt_sq = 0.5 * dt * dt;

    // Drift: x_n+1 = x_n + v_n dt + ½ a_n dt²
    for b in bodies.iter_mut().filter(|b| !b.is_fixed) {
        b.prev_acceleration = b.acceleration;
        let v = b.velocity;
        let a = b.acceleration;
        b.position.add_scaled_mut(&v, dt);
        b.position.add_scaled_mut(&a, half_dt_sq);
    }

    // a_n+1 at the new positions
    forces.apply(bodies);

    // Kick: v_n+1 = v_n + ½ (a_n + a_n+1) dt
    for b in bodies.iter_mut().filter(|b| !b.is_fixed) {
        let a_old = b.prev_acceleration;
        let a_new = b.acceleration;
        b.velocity.add_scaled_mut(&a_old, half_dt);
        b.velocity.add_scaled_mut(&a_new, half_dt);
    }

    StepOutcome::fixed(dt)
}

/// Phase-space state of every body at one integration stage
struct Stage {
    positions: Vec<NVec3>,
    velocities: Vec<NVec3>,
}

impl Stage {
    fn of(bodies: &[Body]) -> Self {
        Self {
            positions: bodies.iter().map(|b| b.position).collect(),
            velocities: bodies.iter().map(|b| b.velocity).collect(),
        }
    }

    /// x0 + dt Σ w_j kx_j (same for v); fixed bodies stay at x0
    fn offset(base: &Stage, bodies: &[Body], dt: f64, terms: &[(f64, &Derivative)]) -> Self {
        let mut next = Stage {
            positions: base.positions.clone(),
            velocities: base.velocities.clone(),
        };
        for (i, body) in bodies.iter().enumerate() {
            if body.is_fixed {
                continue;
            }
            for (weight, k) in terms {
                if *weight == 0.0 {
                    continue;
                }
                next.positions[i].add_scaled_mut(&k.dx[i], dt * weight);
                next.velocities[i].add_scaled_mut(&k.dv[i], dt * weight);
            }
        }
        next
    }
}

/// (dx/dt, dv/dt) at one stage
struct Derivative {
    dx: Vec<NVec3>,
    dv: Vec<NVec3>,
}

impl Derivative {
    fn at(stage: &Stage, bodies: &[Body], forces: &dyn Acceleration) -> Self {
        let mut dv = vec![NVec3::zeros(); bodies.len()];
        forces.evaluate(bodies, &stage.positions, &stage.velocities, &mut dv);
        Self {
            dx: stage.velocities.clone(),
            dv,
        }
    }
}

fn commit(bodies: &mut [Body], stage: Stage, forces: &dyn Acceleration) {
    for ((b, x), v) in bodies.iter_mut().zip(stage.positions).zip(stage.velocities) {
        if b.is_fixed {
            continue;
        }
        b.prev_acceleration = b.acceleration;
        b.position = x;
        b.velocity = v;
    }
    forces.apply(bodies);
}

/// Classical fourth-order Runge–Kutta, weights 1, 2, 2, 1
pub fn rk4_step(bodies: &mut [Body], dt: f64, forces: &dyn Acceleration) -> StepOutcome {
    if bodies.is_empty() {
        return StepOutcome::fixed(dt);
    }
    let base = Stage::of(bodies);

    let k1 = Derivative::at(&base, bodies, forces);
    let s2 = Stage::offset(&base, bodies, dt, &[(0.5, &k1)]);
    let k2 = Derivative::at(&s2, bodies, forces);
    let s3 = Stage::offset(&base, bodies, dt, &[(0.5, &k2)]);
    let k3 = Derivative::at(&s3, bodies, forces);
    let s4 = Stage::offset(&base, bodies, dt, &[(1.0, &k3)]);
    let k4 = Derivative::at(&s4, bodies, forces);

    let sixth = 1.0 / 6.0;
    let end = Stage::offset(
        &base,
        bodies,
        dt,
        &[(sixth, &k1), (2.0 * sixth, &k2), (2.0 * sixth, &k3), (sixth, &k4)],
    );
    commit(bodies, end, forces);

    StepOutcome::fixed(dt)
}

// Dormand–Prince 5(4) tableau
const DP_A: [[f64; 6]; 7] = [
    [0.0, 0.0, 0.0, 0.0, 0.0, 0.0],
    [1.0 / 5.0, 0.0, 0.0, 0.0, 0.0, 0.0],
    [3.0 / 40.0, 9.0 / 40.0, 0.0, 0.0, 0.0, 0.0],
    [44.0 / 45.0, -56.0 / 15.0, 32.0 / 9.0, 0.0, 0.0, 0.0],
    [19372.0 / 6561.0, -25360.0 / 2187.0, 64448.0 / 6561.0, -212.0 / 729.0, 0.0, 0.0],
    [9017.0 / 3168.0, -355.0 / 33.0, 46732.0 / 5247.0, 49.0 / 176.0, -5103.0 / 18656.0, 0.0],
    [35.0 / 384.0, 0.0, 500.0 / 1113.0, 125.0 / 192.0, -2187.0 / 6784.0, 11.0 / 84.0],
];
const DP_B5: [f64; 7] = [35.0 / 384.0, 0.0, 500.0 / 1113.0, 125.0 / 192.0, -2187.0 / 6784.0, 11.0 / 84.0, 0.0];
const DP_B4: [f64; 7] = [
    5179.0 / 57600.0,
    0.0,
    7571.0 / 16695.0,
    393.0 / 640.0,
    -92097.0 / 339200.0,
    187.0 / 2100.0,
    1.0 / 40.0,
];

/// One Dormand–Prince attempt: the 5th-order end state and its error estimate
fn dormand_prince_attempt(bodies: &[Body], base: &Stage, dt: f64, forces: &dyn Acceleration) -> (Stage, f64) {
    let mut ks: Vec<Derivative> = Vec::with_capacity(7);
    ks.push(Derivative::at(base, bodies, forces));
    for s in 1..7 {
        let terms: Vec<(f64, &Derivative)> = (0..s).map(|j| (DP_A[s][j], &ks[j])).collect();
        let stage = Stage::offset(base, bodies, dt, &terms);
        let k = Derivative::at(&stage, bodies, forces);
        ks.push(k);
    }

    let fifth: Vec<(f64, &Derivative)> = DP_B5.iter().copied().zip(ks.iter()).collect();
    let fourth: Vec<(f64, &Derivative)> = DP_B4.iter().copied().zip(ks.iter()).collect();
    let x5 = Stage::offset(base, bodies, dt, &fifth);
    let x4 = Stage::offset(base, bodies, dt, &fourth);

    // per-body error, normalized by max(|v0|, 1), worst body wins
    let mut max_error: f64 = 0.0;
    for (i, body) in bodies.iter().enumerate() {
        if body.is_fixed {
            continue;
        }
        let err_x = x5.positions[i].distance(&x4.positions[i]);
        let err_v = x5.velocities[i].distance(&x4.velocities[i]);
        let scale = base.velocities[i].norm().max(1.0);
        let err = err_x.max(err_v) / scale;
        if !err.is_finite() {
            max_error = f64::INFINITY;
            break;
        }
        max_error = max_error.max(err);
    }

    (x5, max_error)
}

/// `safety · dt · (tol/err)^(1/5)`, doubled on zero error, clamped to the bounds
pub fn suggest_next_dt(dt: f64, error: f64, options: &AdaptiveOptions) -> f64 {
    let optimal = if !error.is_finite() {
        0.1 * dt
    } else if error > 0.0 {
        options.safety_factor * dt * (options.tolerance / error).powf(0.2)
    } else {
        2.0 * dt
    };
    optimal.max(options.min_dt).min(options.max_dt)
}

/// Adaptive Dormand–Prince step.
///
/// Attempts that exceed the tolerance are discarded (the bodies are never
/// touched by a rejected attempt) and retried with the suggested smaller `dt`,
/// at most `max_retries` times. When the bound is exhausted the last attempt
/// is accepted and the outcome is flagged `degraded`.
pub fn rk45_step(bodies: &mut [Body], dt: f64, forces: &dyn Acceleration, options: &AdaptiveOptions) -> StepOutcome {
    if bodies.is_empty() {
        return StepOutcome::fixed(dt);
    }
    let base = Stage::of(bodies);
    let mut dt = dt;
    let mut rejected = 0;

    loop {
        let (end, error) = dormand_prince_attempt(bodies, &base, dt, forces);
        let next_dt = suggest_next_dt(dt, error, options);
        let too_large = error.is_nan() || error > options.tolerance;

        let mut degraded = false;
        if too_large && dt > options.min_dt {
            if rejected < options.max_retries {
                rejected += 1;
                debug!("rk45 rejected dt={dt:.3e} error={error:.3e}, retrying with {next_dt:.3e}");
                dt = next_dt;
                continue;
            }
            warn!("rk45 gave up after {rejected} rejections, accepting dt={dt:.3e} with error={error:.3e}");
            degraded = true;
        }

        commit(bodies, end, forces);
        return StepOutcome {
            dt,
            error,
            next_dt,
            rejected,
            degraded,
        };
    }
}

/// Totals from driving the adaptive integrator over a fixed duration
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct IntegrationSummary {
    pub elapsed: f64,
    pub steps: usize,
    pub rejected: usize,
    pub degraded_steps: usize,
    pub next_dt: f64,
}

/// Advance by exactly `duration` of simulated time with RK45, shortening the
/// final step to the remaining time
pub fn integrate_for(
    bodies: &mut [Body],
    duration: f64,
    initial_dt: f64,
    forces: &dyn Acceleration,
    options: &AdaptiveOptions,
) -> IntegrationSummary {
    let mut summary = IntegrationSummary {
        next_dt: initial_dt,
        ..Default::default()
    };
    if duration <= 0.0 || bodies.is_empty() {
        return summary;
    }

    // below this the remainder is float noise, not a step
    let epsilon = duration * 1e-12;
    let mut dt = initial_dt.max(options.min_dt);
    while duration - summary.elapsed > epsilon {
        let remaining = duration - summary.elapsed;
        let outcome = rk45_step(bodies, dt.min(remaining), forces, options);
        summary.elapsed += outcome.dt;
        summary.steps += 1;
        summary.rejected += outcome.rejected;
        if outcome.degraded {
            summary.degraded_steps += 1;
        }
        dt = outcome.next_dt;
        summary.next_dt = outcome.next_dt;
    }
    summary
}
