//! Live health monitoring for a running simulation
//!
//! The monitor is fed an explicit `&Simulation` after each tick. It keeps
//! short conservation histories and classifies energy drift, momentum drift,
//! relativistic speeds, close encounters and non-finite state.

use std::collections::VecDeque;
use std::fmt;

use serde::Serialize;

use crate::simulation::body::BodyId;
use crate::simulation::constants::{units, C, CRITICAL_ENERGY_ERROR, ELEVATED_ENERGY_ERROR};
use crate::simulation::controller::{Simulation, SimulationStats};
use crate::simulation::forces::{detect_collisions, ConservationQuantities};
use crate::simulation::vector::VectorExt;

const HISTORY_LEN: usize = 300;
const TREND_WINDOW: usize = 10;
const MOMENTUM_DRIFT_WARNING: f64 = 0.01;
const SPEED_WARNING: f64 = 0.1; // fraction of c
const SPEED_ERROR: f64 = 0.5;
const APPROACH_RADII: f64 = 5.0;
const CLOSE_RADII: f64 = 2.0;
const FAR_DISTANCE: f64 = 1.0e20; // m

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EnergyTrend {
    Stable,
    Increasing,
    Decreasing,
    Unstable,
}

impl fmt::Display for EnergyTrend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EnergyTrend::Stable => "stable",
            EnergyTrend::Increasing => "increasing",
            EnergyTrend::Decreasing => "decreasing",
            EnergyTrend::Unstable => "unstable",
        };
        f.write_str(s)
    }
}

/// Separation class in units of combined radii
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Proximity {
    Approach,  // < 5×
    Close,     // < 2×
    Collision, // < 1×
}

impl Proximity {
    pub fn classify(separation_ratio: f64) -> Option<Proximity> {
        if separation_ratio < 1.0 {
            Some(Proximity::Collision)
        } else if separation_ratio < CLOSE_RADII {
            Some(Proximity::Close)
        } else if separation_ratio < APPROACH_RADII {
            Some(Proximity::Approach)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Encounter {
    pub first: BodyId,
    pub second: BodyId,
    pub first_name: String,
    pub second_name: String,
    pub proximity: Proximity,
    /// separation / combined radii
    pub ratio: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiagnosticReport {
    pub stats: SimulationStats,
    pub energy_trend: EnergyTrend,
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
    pub encounters: Vec<Encounter>,
}

impl DiagnosticReport {
    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Short multi-line status block
    pub fn summary(&self) -> String {
        let mut lines = vec![
            format!(
                "Time: {:.2} days ({:.4} years), {} steps",
                self.stats.time_days, self.stats.time_years, self.stats.step_count
            ),
            format!("Bodies: {}", self.stats.body_count),
            format!(
                "Energy: {:.6e} J (error {:.4}%, {})",
                self.stats.total_energy,
                self.stats.energy_error * 100.0,
                self.energy_trend
            ),
            format!("Angular momentum: {:.6e} kg m²/s", self.stats.angular_momentum),
            format!("Integrator: {} | Physics: {}", self.stats.integrator, self.stats.physics_mode),
        ];
        lines.extend(self.errors.iter().map(|e| format!("ERROR: {e}")));
        lines.extend(self.warnings.iter().map(|w| format!("WARNING: {w}")));
        lines.join("\n")
    }
}

#[derive(Debug, Clone, Default)]
pub struct DiagnosticsMonitor {
    energy_history: VecDeque<f64>,
    momentum_history: VecDeque<f64>,
    angular_momentum_history: VecDeque<f64>,

    warnings: Vec<String>,
    errors: Vec<String>,
    encounters: Vec<Encounter>,
}

fn push_bounded(history: &mut VecDeque<f64>, value: f64) {
    history.push_back(value);
    while history.len() > HISTORY_LEN {
        history.pop_front();
    }
}

impl DiagnosticsMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sample the simulation and rerun every check
    pub fn update(&mut self, sim: &Simulation) {
        self.warnings.clear();
        self.errors.clear();
        self.encounters.clear();

        if sim.body_count() > 0 {
            let q = ConservationQuantities::measure(sim.bodies(), sim.params().softening);
            push_bounded(&mut self.energy_history, q.total_energy);
            push_bounded(&mut self.momentum_history, q.momentum.norm());
            push_bounded(&mut self.angular_momentum_history, q.angular_momentum.norm());
            self.check_momentum(sim, &q);
        }

        self.check_energy(sim);
        self.check_speeds(sim);
        self.check_proximity(sim);
        self.check_numerical_state(sim);
    }

    fn check_energy(&mut self, sim: &Simulation) {
        let err = sim.energy_error();
        if err > CRITICAL_ENERGY_ERROR {
            self.errors.push(format!("Energy drift: {:.2}%", err * 100.0));
        } else if err > ELEVATED_ENERGY_ERROR {
            self.warnings.push(format!("Energy drift: {:.2}%", err * 100.0));
        }
    }

    fn check_momentum(&mut self, sim: &Simulation, current: &ConservationQuantities) {
        let Some(baseline) = sim.baseline() else {
            return;
        };
        if sim.body_count() < 2 {
            return;
        }
        // relative drift is meaningless around zero
        if baseline.momentum.norm() >= 1e-10 {
            let drift = current.momentum_drift(baseline);
            if drift > MOMENTUM_DRIFT_WARNING {
                self.warnings.push(format!("Momentum drift: {:.2}%", drift * 100.0));
            }
        }
        if baseline.angular_momentum.norm() >= 1e-10 {
            let drift = current.angular_momentum_drift(baseline);
            if drift > MOMENTUM_DRIFT_WARNING {
                self.warnings.push(format!("Angular momentum drift: {:.2}%", drift * 100.0));
            }
        }
    }

    fn check_speeds(&mut self, sim: &Simulation) {
        for body in sim.bodies() {
            let fraction = body.velocity.norm() / C;
            if fraction > SPEED_WARNING {
                self.warnings
                    .push(format!("{} at {:.1}% speed of light", body.name, fraction * 100.0));
            }
            if fraction > SPEED_ERROR {
                self.errors
                    .push(format!("{} exceeds 50% c - physics inaccurate", body.name));
            }
        }
    }

    fn check_proximity(&mut self, sim: &Simulation) {
        let bodies = sim.bodies();
        for pair in detect_collisions(bodies, APPROACH_RADII) {
            let (a, b) = (&bodies[pair.first], &bodies[pair.second]);
            let ratio = pair.distance / (a.radius + b.radius);
            let Some(proximity) = Proximity::classify(ratio) else {
                continue;
            };
            match proximity {
                Proximity::Collision => self.errors.push(format!("Collision: {} and {}", a.name, b.name)),
                Proximity::Close => self.warnings.push(format!("Near collision: {} / {}", a.name, b.name)),
                Proximity::Approach => {}
            }
            self.encounters.push(Encounter {
                first: a.id,
                second: b.id,
                first_name: a.name.clone(),
                second_name: b.name.clone(),
                proximity,
                ratio,
            });
        }
    }

    fn check_numerical_state(&mut self, sim: &Simulation) {
        for body in sim.bodies() {
            if !body.position.is_finite() {
                self.errors.push(format!("{} position is NaN/Infinity", body.name));
            }
            if !body.velocity.is_finite() {
                self.errors.push(format!("{} velocity is NaN/Infinity", body.name));
            }
            if !body.acceleration.is_finite() {
                self.errors.push(format!("{} acceleration is NaN/Infinity", body.name));
            }
            let distance = body.position.norm();
            if distance > FAR_DISTANCE {
                self.warnings.push(format!(
                    "{} very far ({})",
                    body.name,
                    units::format_distance(distance)
                ));
            }
        }
    }

    /// Trend of total energy over the last few samples
    pub fn energy_trend(&self) -> EnergyTrend {
        if self.energy_history.len() < TREND_WINDOW {
            return EnergyTrend::Stable;
        }
        let first = self.energy_history[self.energy_history.len() - TREND_WINDOW];
        let last = self.energy_history[self.energy_history.len() - 1];
        if !first.is_finite() || !last.is_finite() {
            return EnergyTrend::Unstable;
        }

        let change = (last - first) / first.abs();
        if change.abs() < 0.001 {
            EnergyTrend::Stable
        } else if change > 0.01 {
            EnergyTrend::Increasing
        } else if change < -0.01 {
            EnergyTrend::Decreasing
        } else {
            EnergyTrend::Stable
        }
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    pub fn encounters(&self) -> &[Encounter] {
        &self.encounters
    }

    pub fn energy_history(&self) -> impl Iterator<Item = &f64> {
        self.energy_history.iter()
    }

    pub fn momentum_history(&self) -> impl Iterator<Item = &f64> {
        self.momentum_history.iter()
    }

    pub fn angular_momentum_history(&self) -> impl Iterator<Item = &f64> {
        self.angular_momentum_history.iter()
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Stats plus the findings of the last `update`
    pub fn report(&self, sim: &Simulation) -> DiagnosticReport {
        DiagnosticReport {
            stats: sim.stats(),
            energy_trend: self.energy_trend(),
            warnings: self.warnings.clone(),
            errors: self.errors.clone(),
            encounters: self.encounters.clone(),
        }
    }
}
