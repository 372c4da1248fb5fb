//! Build fully-initialized simulations from configuration
//!
//! Takes a `ScenarioConfig` (YAML-facing) and produces a runtime bundle
//! (`Scenario`) containing:
//! - the `Simulation` controller with engine and parameters applied
//! - every configured body, validated and added at t = 0
//! - how many ticks the scenario wants to run

use log::debug;

use crate::configuration::config::{BodyConfig, ScenarioConfig};
use crate::error::{Result, SimError};
use crate::simulation::body::{Body, BodyParams};
use crate::simulation::controller::Simulation;
use crate::simulation::engine::Engine;
use crate::simulation::params::Parameters;
use crate::simulation::vector::NVec3;

pub struct Scenario {
    pub simulation: Simulation,
    pub steps: usize,
}

impl Scenario {
    pub fn build_scenario(cfg: ScenarioConfig) -> Result<Self> {
        // Parameters (runtime) from ParametersConfig, defaults where missing
        let p_cfg = cfg.parameters;
        let defaults = Parameters::default();
        let parameters = Parameters {
            timestep: p_cfg.timestep.unwrap_or(defaults.timestep),
            time_scale: p_cfg.time_scale.unwrap_or(defaults.time_scale),
            substeps: p_cfg.substeps.unwrap_or(defaults.substeps),
            softening: p_cfg.softening.unwrap_or(defaults.softening),
            adaptive_tolerance: p_cfg.adaptive_tolerance.unwrap_or(defaults.adaptive_tolerance),
            min_dt: p_cfg.min_dt.unwrap_or(defaults.min_dt),
            max_dt: p_cfg.max_dt.unwrap_or(defaults.max_dt),
            max_trail_points: p_cfg.max_trail_points.unwrap_or(defaults.max_trail_points),
        };
        if parameters.min_dt <= 0.0 || parameters.max_dt < parameters.min_dt {
            return Err(SimError::InvalidParameter(format!(
                "adaptive step bounds must satisfy 0 < min_dt <= max_dt, got [{}, {}]",
                parameters.min_dt, parameters.max_dt
            )));
        }

        // Engine (runtime) from EngineConfig
        let engine = Engine::new(cfg.engine.integrator, cfg.engine.physics_mode);

        // step bounds and trail cap are not settable afterwards
        let mut simulation = Simulation::new(
            engine,
            Parameters {
                min_dt: parameters.min_dt,
                max_dt: parameters.max_dt,
                max_trail_points: parameters.max_trail_points,
                ..Parameters::default()
            },
        );
        simulation.set_timestep(parameters.timestep)?;
        simulation.set_time_scale(parameters.time_scale)?;
        simulation.set_substeps(parameters.substeps)?;
        simulation.set_softening(parameters.softening)?;
        simulation.set_adaptive_tolerance(parameters.adaptive_tolerance)?;

        for bc in &cfg.bodies {
            let body = build_body(bc)?;
            debug!("scenario body {} ({}) mass {:.3e} kg", body.name, body.body_type(), body.mass);
            simulation.add_body(body)?;
        }

        Ok(Self {
            simulation,
            steps: cfg.run.steps,
        })
    }
}

/// Map `BodyConfig` -> runtime `Body`
fn build_body(bc: &BodyConfig) -> Result<Body> {
    let mut params = BodyParams::new(bc.body_type)
        .at(NVec3::from(bc.x))
        .moving(NVec3::from(bc.v))
        .fixed(bc.fixed);

    params.name = bc.name.clone();
    params.mass = bc.mass;
    params.radius = bc.radius;
    params.softening = bc.softening;
    params.luminosity = bc.luminosity;
    params.rotation_period = bc.rotation_period;
    params.magnetic_field_strength = bc.magnetic_field_strength;
    params.color = bc.color;
    if let Some(source) = bc.gravity_source {
        params.is_gravity_source = source;
    }
    if let Some(target) = bc.gravity_target {
        params.is_gravity_target = target;
    }

    params.build()
}
