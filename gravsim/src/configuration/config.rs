//! Configuration types for loading simulation scenarios from YAML.
//!
//! This module defines a thin, `serde`-deserializable representation of a
//! simulation scenario. A scenario consists of:
//!
//! - [`EngineConfig`]     – integrator and force law
//! - [`ParametersConfig`] – numerical parameters, every field optional
//! - [`RunConfig`]        – how long the CLI runs the scenario
//! - [`BodyConfig`]       – initial state for each body
//! - [`ScenarioConfig`]   – top-level wrapper used to load a scenario from YAML
//!
//! # YAML format
//! All quantities are SI (kg, m, m/s, s):
//!
//! ```yaml
//! engine:
//!   integrator: "verlet"          # verlet | rk4 | rk45
//!   physics_mode: "newtonian"     # newtonian | pseudo-newtonian | 1pn
//!
//! parameters:
//!   timestep: 3600.0
//!   softening: 1.0e7
//!
//! run:
//!   steps: 8766
//!
//! bodies:
//!   - name: "Sun"
//!     type: star
//!     x: [ 0.0, 0.0, 0.0 ]
//!     v: [ 0.0, 0.0, 0.0 ]
//!   - name: "Earth"
//!     type: planet
//!     mass: 5.9722e24
//!     x: [ 1.495978707e11, 0.0, 0.0 ]
//!     v: [ 0.0, 29784.7, 0.0 ]
//! ```
//!
//! `Scenario::build_scenario` maps this onto a ready `Simulation`.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use serde::Deserialize;

use crate::error::Result;
use crate::simulation::body::BodyType;
use crate::simulation::forces::PhysicsMode;
use crate::simulation::integrator::IntegratorType;

/// Which integrator and force law the engine uses
#[derive(Deserialize, Debug, Clone, Copy, Default)]
pub struct EngineConfig {
    #[serde(default)]
    pub integrator: IntegratorType, // time integrator used for advancing the system state
    #[serde(default)]
    pub physics_mode: PhysicsMode, // force law applied between every pair
}

/// Numerical parameters; anything missing keeps its default
#[derive(Deserialize, Debug, Clone, Default)]
pub struct ParametersConfig {
    pub timestep: Option<f64>,           // base step, s
    pub time_scale: Option<f64>,         // multiplier on the base step
    pub substeps: Option<usize>,         // steps per advance
    pub softening: Option<f64>,          // global softening, m
    pub adaptive_tolerance: Option<f64>, // rk45 error tolerance
    pub min_dt: Option<f64>,             // rk45 lower step bound
    pub max_dt: Option<f64>,             // rk45 upper step bound
    pub max_trail_points: Option<usize>, // trail cap per body
}

#[derive(Deserialize, Debug, Clone, Copy)]
pub struct RunConfig {
    pub steps: usize, // number of advance() calls
}

impl Default for RunConfig {
    fn default() -> Self {
        Self { steps: 1000 }
    }
}

/// Configuration for a single body's initial state
#[derive(Deserialize, Debug, Clone)]
pub struct BodyConfig {
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub body_type: BodyType,
    pub mass: Option<f64>,   // kg, type default when missing
    pub radius: Option<f64>, // m, type default when missing
    #[serde(default)]
    pub x: [f64; 3], // initial position, m
    #[serde(default)]
    pub v: [f64; 3], // initial velocity, m/s
    pub softening: Option<f64>,
    #[serde(default)]
    pub fixed: bool,
    pub gravity_source: Option<bool>,
    pub gravity_target: Option<bool>,

    // type-specific, ignored where they do not apply
    pub luminosity: Option<f64>,
    pub rotation_period: Option<f64>,
    pub magnetic_field_strength: Option<f64>,
    pub color: Option<u32>,
}

/// Top-level scenario configuration loaded from YAML.
#[derive(Deserialize, Debug, Clone)]
pub struct ScenarioConfig {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub parameters: ParametersConfig,
    #[serde(default)]
    pub run: RunConfig,
    pub bodies: Vec<BodyConfig>,
}

impl ScenarioConfig {
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        let reader = BufReader::new(file);
        Ok(serde_yaml::from_reader(reader)?)
    }
}
