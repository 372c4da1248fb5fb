//! Persisted state types for the simulation.
//!
//! - `SimulationState`: versioned full dump of a controller and its bodies
//! - `StateSnapshot` / `BodySnapshot`: minimal `{time, bodies: [{id, position, velocity}]}`
//!   payload for fast sync, with no mass/radius/type fields
//!
//! Loading always probes `version` on the raw JSON first, so a future format is
//! rejected with a clear error instead of being half-parsed.

use serde::{Deserialize, Serialize};

use crate::error::{Result, SimError};
use crate::simulation::body::{BodyId, BodyRecord};
use crate::simulation::constants::*;
use crate::simulation::forces::PhysicsMode;
use crate::simulation::integrator::IntegratorType;
use crate::simulation::vector::VecRecord;

/// Newest state format this build reads and the one it writes
pub const FORMAT_VERSION: u32 = 1;

fn default_timestep() -> f64 {
    DEFAULT_TIMESTEP
}
fn default_time_scale() -> f64 {
    1.0
}
fn default_softening() -> f64 {
    DEFAULT_SOFTENING
}
fn default_substeps() -> usize {
    1
}
fn default_tolerance() -> f64 {
    DEFAULT_ADAPTIVE_TOLERANCE
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SimulationState {
    pub version: u32,
    #[serde(default)]
    pub time: f64,
    #[serde(default = "default_timestep")]
    pub timestep: f64,
    #[serde(default = "default_time_scale")]
    pub time_scale: f64,
    #[serde(default = "default_softening")]
    pub softening: f64,
    #[serde(default)]
    pub physics_mode: PhysicsMode,
    #[serde(default)]
    pub integrator_type: IntegratorType,
    #[serde(default = "default_substeps")]
    pub substeps: usize,
    #[serde(default = "default_tolerance")]
    pub adaptive_tolerance: f64,
    pub bodies: Vec<BodyRecord>,
}

impl SimulationState {
    /// Parse and version-check a serialized state
    pub fn from_json(json: &str) -> Result<Self> {
        let raw: serde_json::Value = serde_json::from_str(json)?;
        let obj = raw
            .as_object()
            .ok_or_else(|| SimError::MalformedState("expected a JSON object".into()))?;

        let version = match obj.get("version") {
            None | Some(serde_json::Value::Null) => return Err(SimError::MissingVersion),
            Some(v) => v
                .as_u64()
                .ok_or_else(|| SimError::MalformedState(format!("version must be a non-negative integer, got {v}")))?,
        };
        if version == 0 {
            return Err(SimError::MissingVersion);
        }
        if version > u64::from(FORMAT_VERSION) {
            return Err(SimError::UnsupportedVersion {
                found: u32::try_from(version).unwrap_or(u32::MAX),
                supported: FORMAT_VERSION,
            });
        }

        let state: SimulationState = serde_json::from_value(raw)
            .map_err(|e| SimError::MalformedState(e.to_string()))?;
        Ok(state)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct BodySnapshot {
    pub id: BodyId,
    pub position: VecRecord,
    pub velocity: VecRecord,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct StateSnapshot {
    pub time: f64,
    pub bodies: Vec<BodySnapshot>,
}

impl StateSnapshot {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}
