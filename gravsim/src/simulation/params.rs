//! Numerical parameters for the simulation
//!
//! `Parameters` holds runtime settings:
//! - base timestep, time-scale multiplier and substep count,
//! - global softening,
//! - adaptive step bounds and tolerance (rk45 only),
//! - trail length applied to bodies added to the simulation

use crate::simulation::constants::*;
use crate::simulation::integrator::AdaptiveOptions;

#[derive(Debug, Clone, PartialEq)]
pub struct Parameters {
    pub timestep: f64,           // base step, s
    pub time_scale: f64,         // multiplier on the base step
    pub substeps: usize,         // single steps per advance()
    pub softening: f64,          // global softening, m
    pub adaptive_tolerance: f64, // rk45 error tolerance
    pub min_dt: f64,             // rk45 lower step bound, s
    pub max_dt: f64,             // rk45 upper step bound, s
    pub max_trail_points: usize, // trail cap for added bodies
}

impl Default for Parameters {
    fn default() -> Self {
        Self {
            timestep: DEFAULT_TIMESTEP,
            time_scale: 1.0,
            substeps: 1,
            softening: DEFAULT_SOFTENING,
            adaptive_tolerance: DEFAULT_ADAPTIVE_TOLERANCE,
            min_dt: DEFAULT_MIN_DT,
            max_dt: DEFAULT_MAX_DT,
            max_trail_points: DEFAULT_MAX_TRAIL_POINTS,
        }
    }
}

impl Parameters {
    /// Step size actually requested from a fixed-step integrator
    pub fn effective_timestep(&self) -> f64 {
        self.timestep * self.time_scale
    }

    pub fn adaptive_options(&self) -> AdaptiveOptions {
        AdaptiveOptions {
            tolerance: self.adaptive_tolerance,
            min_dt: self.min_dt,
            max_dt: self.max_dt,
            ..AdaptiveOptions::default()
        }
    }
}
