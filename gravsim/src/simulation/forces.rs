//! Force / acceleration contributors for the n-body engine
//!
//! Pairwise gravitational kernels for the three physics modes, the
//! `Acceleration` trait that integrators drive, direct O(N²) summation as its
//! implementation, and the conservation quantities derived from a body set.

use std::fmt;
use std::str::FromStr;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::simulation::body::Body;
use crate::simulation::constants::{C_SQUARED, G};
use crate::simulation::vector::{NVec3, VectorExt};

/// Force law selection, fixed per simulation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PhysicsMode {
    #[default]
    #[serde(rename = "newtonian")]
    Newtonian,
    /// Paczyński–Wiita potential around black holes
    #[serde(rename = "pseudo-newtonian")]
    PseudoNewtonian,
    /// First post-Newtonian correction
    #[serde(rename = "1pn")]
    PostNewtonian1,
}

impl PhysicsMode {
    pub fn as_str(self) -> &'static str {
        match self {
            PhysicsMode::Newtonian => "newtonian",
            PhysicsMode::PseudoNewtonian => "pseudo-newtonian",
            PhysicsMode::PostNewtonian1 => "1pn",
        }
    }
}

impl fmt::Display for PhysicsMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for PhysicsMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "newtonian" => Ok(PhysicsMode::Newtonian),
            "pseudo-newtonian" | "pw" => Ok(PhysicsMode::PseudoNewtonian),
            "1pn" | "post-newtonian" => Ok(PhysicsMode::PostNewtonian1),
            other => Err(format!("unknown physics mode '{other}'")),
        }
    }
}

// pair kernels ===============================================================

/// Newtonian acceleration on a body at `pos_a` due to mass `mass_b` at `pos_b`
pub fn newtonian_acceleration(pos_a: &NVec3, pos_b: &NVec3, mass_b: f64, softening: f64) -> NVec3 {
    // r points from the accelerated body toward the source
    let r = pos_b - pos_a;
    let softened_dist_sq = r.norm_squared() + softening * softening;
    let dist = softened_dist_sq.sqrt();
    if dist == 0.0 {
        return NVec3::zeros();
    }

    // |a| = GM / (d² + s²), direction r / dist
    let accel_mag = G * mass_b / softened_dist_sq;
    r * (accel_mag / dist)
}

/// Paczyński–Wiita acceleration, `GM/(r - r_s)²` with `r` the softened distance
pub fn paczynski_wiita_acceleration(
    pos_a: &NVec3,
    pos_b: &NVec3,
    mass_b: f64,
    schwarzschild_radius: f64,
    softening: f64,
) -> NVec3 {
    let r = pos_b - pos_a;
    let dist = (r.norm_squared() + softening * softening).sqrt();

    // capture safeguard at or inside the horizon: fixed inward pull of GM/r_s²
    if dist <= schwarzschild_radius * 1.001 {
        let max_accel = G * mass_b / (schwarzschild_radius * schwarzschild_radius);
        if r.norm_squared() == 0.0 {
            debug!("pseudo-Newtonian capture at zero separation, direction undefined");
        }
        return r.normalized_or_zero() * max_accel;
    }

    let r_eff = dist - schwarzschild_radius;
    let accel_mag = G * mass_b / (r_eff * r_eff);
    r * (accel_mag / dist)
}

/// Newtonian acceleration with first post-Newtonian corrections
pub fn post_newtonian_acceleration(
    pos_a: &NVec3,
    pos_b: &NVec3,
    vel_a: &NVec3,
    vel_b: &NVec3,
    mass_b: f64,
    softening: f64,
) -> NVec3 {
    let r = pos_b - pos_a;
    let dist_sq = r.norm_squared() + softening * softening;
    let dist = dist_sq.sqrt();
    if dist == 0.0 {
        return NVec3::zeros();
    }

    let r_hat = r / dist;
    let v_rel = vel_a - vel_b;
    let v_sq = v_rel.norm_squared();
    let v_radial = v_rel.dot(&r_hat);

    let a_n = G * mass_b / dist_sq;
    let gm_over_r = G * mass_b / dist;

    // 1 + (4GM/r - v² + 4 v_r²) / c²
    let correction = 1.0 + (4.0 * gm_over_r - v_sq + 4.0 * v_radial * v_radial) / C_SQUARED;

    // tangential cross term, scaled by 4 v_r a_N / c²
    let v_tangent = v_rel - r_hat * v_radial;
    let cross = 4.0 * v_radial * a_n / C_SQUARED;

    r_hat * (a_n * correction) - v_tangent * (cross / dist)
}

/// Softening used for one pair: the largest of the global and both per-body values
pub fn pair_softening(global: f64, a: &Body, b: &Body) -> f64 {
    global.max(a.softening).max(b.softening)
}

/// Acceleration of `target` due to `source`, at explicit trial states
pub fn pair_acceleration(
    mode: PhysicsMode,
    target: &Body,
    source: &Body,
    target_state: (&NVec3, &NVec3),
    source_state: (&NVec3, &NVec3),
    global_softening: f64,
) -> NVec3 {
    let softening = pair_softening(global_softening, target, source);
    let (pos_a, vel_a) = target_state;
    let (pos_b, vel_b) = source_state;

    match mode {
        PhysicsMode::Newtonian => newtonian_acceleration(pos_a, pos_b, source.mass, softening),
        PhysicsMode::PseudoNewtonian => match source.schwarzschild_radius() {
            Some(rs) if rs > 0.0 => {
                paczynski_wiita_acceleration(pos_a, pos_b, source.mass, rs, softening)
            }
            _ => newtonian_acceleration(pos_a, pos_b, source.mass, softening),
        },
        PhysicsMode::PostNewtonian1 => {
            post_newtonian_acceleration(pos_a, pos_b, vel_a, vel_b, source.mass, softening)
        }
    }
}

// acceleration seam ==========================================================

/// Anything that can produce per-body accelerations for a body set.
///
/// `evaluate` works on explicit trial positions/velocities so multi-stage
/// integrators never have to mutate the bodies mid-step. Bodies that do not
/// respond to gravity (fixed, or not a gravity target) get a zero entry.
pub trait Acceleration {
    fn evaluate(&self, bodies: &[Body], positions: &[NVec3], velocities: &[NVec3], out: &mut [NVec3]);

    /// Evaluate at the bodies' current state and store the result in each
    /// responding body's acceleration slot; others are left untouched
    fn apply(&self, bodies: &mut [Body]) {
        let positions: Vec<NVec3> = bodies.iter().map(|b| b.position).collect();
        let velocities: Vec<NVec3> = bodies.iter().map(|b| b.velocity).collect();
        let mut out = vec![NVec3::zeros(); bodies.len()];
        self.evaluate(bodies, &positions, &velocities, &mut out);

        for (body, a) in bodies.iter_mut().zip(out) {
            if body.responds_to_gravity() {
                body.acceleration = a;
            }
        }
    }
}

/// Direct-summation gravity under one physics mode
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Gravity {
    pub mode: PhysicsMode,
    pub softening: f64, // global softening, m
}

impl Gravity {
    pub fn new(mode: PhysicsMode, softening: f64) -> Self {
        Self { mode, softening }
    }

    pub fn newtonian(softening: f64) -> Self {
        Self::new(PhysicsMode::Newtonian, softening)
    }
}

impl Acceleration for Gravity {
    fn evaluate(&self, bodies: &[Body], positions: &[NVec3], velocities: &[NVec3], out: &mut [NVec3]) {
        let n = bodies.len();
        for a in out.iter_mut() {
            *a = NVec3::zeros();
        }

        // a source in a NaN/Infinity state pulls on nobody
        let usable: Vec<bool> = (0..n)
            .map(|j| bodies[j].is_gravity_source && positions[j].is_finite() && velocities[j].is_finite())
            .collect();

        for i in 0..n {
            let target = &bodies[i];
            if !target.responds_to_gravity() {
                continue;
            }

            let mut acc = NVec3::zeros();
            for (j, source) in bodies.iter().enumerate() {
                if i == j || !usable[j] {
                    continue;
                }
                acc += pair_acceleration(
                    self.mode,
                    target,
                    source,
                    (&positions[i], &velocities[i]),
                    (&positions[j], &velocities[j]),
                    self.softening,
                );
            }
            out[i] = acc;
        }
    }
}

// conservation quantities ====================================================

/// Potential energy of one pair, `-G m1 m2 / sqrt(r² + s²)`
pub fn pair_potential_energy(a: &Body, b: &Body, softening: f64) -> f64 {
    let dist = (a.position.distance_squared(&b.position) + softening * softening).sqrt();
    if dist == 0.0 {
        return 0.0;
    }
    -G * a.mass * b.mass / dist
}

/// Sum over unique pairs
pub fn total_potential_energy(bodies: &[Body], softening: f64) -> f64 {
    let mut u = 0.0;
    for (i, a) in bodies.iter().enumerate() {
        for b in &bodies[i + 1..] {
            u += pair_potential_energy(a, b, softening);
        }
    }
    u
}

pub fn total_kinetic_energy(bodies: &[Body]) -> f64 {
    bodies.iter().map(Body::kinetic_energy).sum()
}

pub fn total_energy(bodies: &[Body], softening: f64) -> f64 {
    total_kinetic_energy(bodies) + total_potential_energy(bodies, softening)
}

pub fn total_momentum(bodies: &[Body]) -> NVec3 {
    bodies.iter().fold(NVec3::zeros(), |p, b| p + b.momentum())
}

/// About the origin
pub fn total_angular_momentum(bodies: &[Body]) -> NVec3 {
    bodies.iter().fold(NVec3::zeros(), |l, b| l + b.angular_momentum())
}

/// Mass-weighted mean position and total mass; origin for a massless set
pub fn center_of_mass(bodies: &[Body]) -> (NVec3, f64) {
    let mut total_mass = 0.0;
    let mut weighted = NVec3::zeros();
    for b in bodies {
        total_mass += b.mass;
        weighted += b.position * b.mass;
    }
    if total_mass == 0.0 {
        return (NVec3::zeros(), 0.0);
    }
    (weighted / total_mass, total_mass)
}

/// Two bodies closer than `threshold` × their summed radii
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CollisionPair {
    pub first: usize,
    pub second: usize,
    pub distance: f64,
    pub min_distance: f64,
}

impl CollisionPair {
    /// distance / (summed radii × threshold); < 1 means inside the threshold
    pub fn ratio(&self) -> f64 {
        if self.min_distance == 0.0 {
            return f64::INFINITY;
        }
        self.distance / self.min_distance
    }
}

pub fn detect_collisions(bodies: &[Body], threshold: f64) -> Vec<CollisionPair> {
    let mut pairs = Vec::new();
    for (i, a) in bodies.iter().enumerate() {
        for (j, b) in bodies.iter().enumerate().skip(i + 1) {
            let distance = a.position.distance(&b.position);
            let min_distance = (a.radius + b.radius) * threshold;
            if distance < min_distance {
                pairs.push(CollisionPair {
                    first: i,
                    second: j,
                    distance,
                    min_distance,
                });
            }
        }
    }
    pairs
}

/// Energy, momentum and angular momentum measured together
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ConservationQuantities {
    pub kinetic: f64,
    pub potential: f64,
    pub total_energy: f64,
    pub momentum: NVec3,
    pub angular_momentum: NVec3,
}

impl ConservationQuantities {
    pub fn measure(bodies: &[Body], softening: f64) -> Self {
        let kinetic = total_kinetic_energy(bodies);
        let potential = total_potential_energy(bodies, softening);
        Self {
            kinetic,
            potential,
            total_energy: kinetic + potential,
            momentum: total_momentum(bodies),
            angular_momentum: total_angular_momentum(bodies),
        }
    }

    /// Relative energy drift against `baseline`, absolute when the baseline is ~0
    pub fn energy_error(&self, baseline: &ConservationQuantities) -> f64 {
        relative_error(self.total_energy, baseline.total_energy)
    }

    pub fn momentum_drift(&self, baseline: &ConservationQuantities) -> f64 {
        relative_error(self.momentum.norm(), baseline.momentum.norm())
    }

    pub fn angular_momentum_drift(&self, baseline: &ConservationQuantities) -> f64 {
        relative_error(self.angular_momentum.norm(), baseline.angular_momentum.norm())
    }
}

/// `|current - initial| / |initial|`, or the absolute difference near zero
pub fn relative_error(current: f64, initial: f64) -> f64 {
    if initial.abs() > 1e-20 {
        (current - initial).abs() / initial.abs()
    } else {
        (current - initial).abs()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_error_falls_back_to_absolute() {
        assert_eq!(relative_error(3.0, 0.0), 3.0);
        assert!((relative_error(1.1, 1.0) - 0.1).abs() < 1e-12);
    }

    #[test]
    fn physics_mode_parses_its_names() {
        for mode in [PhysicsMode::Newtonian, PhysicsMode::PseudoNewtonian, PhysicsMode::PostNewtonian1] {
            assert_eq!(mode.as_str().parse::<PhysicsMode>(), Ok(mode));
        }
        assert!("mond".parse::<PhysicsMode>().is_err());
    }
}
