//! Simulation controller
//!
//! `Simulation` owns the body set, the clock, the engine selection and the
//! numerical parameters. It drives the integrators, keeps the conservation
//! baselines and reports numerical trouble after every step.

use std::collections::hash_map::DefaultHasher;
use std::collections::HashSet;
use std::fmt;
use std::hash::{Hash, Hasher};

use log::{error, info, warn};
use serde::Serialize;

use crate::error::{Result, SimError};
use crate::simulation::body::{reserve_body_ids_through, Body, BodyId};
use crate::simulation::constants::{units, CRITICAL_ENERGY_ERROR, ELEVATED_ENERGY_ERROR};
use crate::simulation::engine::Engine;
use crate::simulation::forces::{ConservationQuantities, Gravity, PhysicsMode};
use crate::simulation::integrator::{self, IntegratorType};
use crate::simulation::params::Parameters;
use crate::simulation::states::{BodySnapshot, SimulationState, StateSnapshot, FORMAT_VERSION};
use crate::simulation::vector::{NVec3, VectorExt};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunState {
    Running,
    #[default]
    Paused,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
    Error,
}

/// One problem found after a step
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Issue {
    pub severity: Severity,
    pub message: String,
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.severity {
            Severity::Warning => write!(f, "warning: {}", self.message),
            Severity::Error => write!(f, "error: {}", self.message),
        }
    }
}

/// Result of one or more controller steps
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct StepReport {
    pub dt: f64, // simulated time consumed
    pub time: f64,
    pub step_count: u64,
    pub energy_error: f64,
    pub error_estimate: f64, // rk45 only
    pub rejected: usize,     // rk45 only
    pub degraded: bool,      // rk45 only
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationStats {
    pub time: f64,
    pub time_days: f64,
    pub time_years: f64,
    pub step_count: u64,
    pub body_count: usize,
    pub timestep: f64,
    pub total_energy: f64,
    pub energy_error: f64,
    pub angular_momentum: f64,
    pub is_running: bool,
    pub physics_mode: PhysicsMode,
    pub integrator: IntegratorType,
}

impl fmt::Display for SimulationStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "t = {:.3} d ({} steps, {} bodies) | E = {:.6e} J | dE/E = {:.3e} | L = {:.6e} | {} / {}",
            self.time_days,
            self.step_count,
            self.body_count,
            self.total_energy,
            self.energy_error,
            self.angular_momentum,
            self.integrator,
            self.physics_mode,
        )
    }
}

#[derive(Debug, Clone)]
pub struct Simulation {
    bodies: Vec<Body>,
    engine: Engine,
    params: Parameters,

    time: f64,
    step_count: u64,
    run_state: RunState,
    adaptive_next_dt: f64,

    baseline: Option<ConservationQuantities>,
    current: Option<ConservationQuantities>,
    energy_error: f64,
    last_issues: Vec<Issue>,
}

impl Default for Simulation {
    fn default() -> Self {
        Self::new(Engine::default(), Parameters::default())
    }
}

impl Simulation {
    pub fn new(engine: Engine, params: Parameters) -> Self {
        let adaptive_next_dt = params.timestep;
        Self {
            bodies: Vec::new(),
            engine,
            params,
            time: 0.0,
            step_count: 0,
            run_state: RunState::Paused,
            adaptive_next_dt,
            baseline: None,
            current: None,
            energy_error: 0.0,
            last_issues: Vec::new(),
        }
    }

    fn gravity(&self) -> Gravity {
        self.engine.gravity(self.params.softening)
    }

    // body management ==========================================================

    /// Add a body, stamping its creation time and trail cap; ids must be unique
    pub fn add_body(&mut self, mut body: Body) -> Result<BodyId> {
        if self.bodies.iter().any(|b| b.id == body.id) {
            return Err(SimError::DuplicateBodyId(body.id.0));
        }
        body.created_at = self.time;
        body.set_max_trail_points(self.params.max_trail_points);
        let id = body.id;
        self.bodies.push(body);
        self.rebaseline();
        Ok(id)
    }

    pub fn remove_body(&mut self, id: BodyId) -> Option<Body> {
        let idx = self.bodies.iter().position(|b| b.id == id)?;
        let body = self.bodies.remove(idx);
        self.rebaseline();
        Some(body)
    }

    pub fn clear_bodies(&mut self) {
        self.bodies.clear();
        self.rebaseline();
    }

    pub fn bodies(&self) -> &[Body] {
        &self.bodies
    }

    pub fn body_count(&self) -> usize {
        self.bodies.len()
    }

    pub fn get_body(&self, id: BodyId) -> Option<&Body> {
        self.bodies.iter().find(|b| b.id == id)
    }

    /// Direct edits do not move the baselines; call `rebaseline` afterwards
    /// when the edit is meant to define a new reference state
    pub fn get_body_mut(&mut self, id: BodyId) -> Option<&mut Body> {
        self.bodies.iter_mut().find(|b| b.id == id)
    }

    /// Recompute accelerations and capture fresh conservation baselines
    pub fn rebaseline(&mut self) {
        self.energy_error = 0.0;
        if self.bodies.is_empty() {
            self.baseline = None;
            self.current = None;
            return;
        }
        let gravity = self.gravity();
        integrator::initialize_accelerations(&mut self.bodies, &gravity);
        let quantities = ConservationQuantities::measure(&self.bodies, self.params.softening);
        self.baseline = Some(quantities);
        self.current = Some(quantities);
    }

    // run control ==============================================================

    /// Zero the clock and step counter, clear trails, re-establish baselines.
    /// Body positions and velocities are left as they are.
    pub fn reset(&mut self) {
        self.time = 0.0;
        self.step_count = 0;
        self.adaptive_next_dt = self.params.timestep;
        self.last_issues.clear();
        for body in &mut self.bodies {
            body.clear_trail();
        }
        self.rebaseline();
    }

    pub fn start(&mut self) {
        if self.bodies.is_empty() {
            warn!("No bodies in simulation, not starting");
            self.push_issue(Severity::Warning, "No bodies in simulation".into());
            return;
        }
        if self.baseline.is_none() {
            self.rebaseline();
        }
        self.run_state = RunState::Running;
    }

    pub fn stop(&mut self) {
        self.run_state = RunState::Paused;
    }

    /// Returns whether the simulation is running afterwards
    pub fn toggle(&mut self) -> bool {
        match self.run_state {
            RunState::Running => self.stop(),
            RunState::Paused => self.start(),
        }
        self.is_running()
    }

    pub fn is_running(&self) -> bool {
        self.run_state == RunState::Running
    }

    pub fn run_state(&self) -> RunState {
        self.run_state
    }

    /// Exactly one integration step, regardless of the run state.
    ///
    /// Fixed-step integrators use `timestep × time_scale`; rk45 uses its own
    /// suggested step. Non-finite bodies are reset to rest at the origin and
    /// reported as `SimError::NonFiniteState` after the step is complete.
    pub fn single_step(&mut self) -> Result<StepReport> {
        let dt = match self.engine.integrator {
            IntegratorType::Rk45 => self.adaptive_next_dt,
            _ => self.params.effective_timestep(),
        };
        self.step_by(dt)
    }

    /// `substeps` single steps, stopping at the first error
    pub fn step(&mut self, substeps: usize) -> Result<StepReport> {
        let mut total = StepReport {
            time: self.time,
            step_count: self.step_count,
            energy_error: self.energy_error,
            ..Default::default()
        };
        for _ in 0..substeps {
            let report = self.single_step()?;
            total.accumulate(&report);
        }
        Ok(total)
    }

    /// One host tick: `substeps` steps while running, nothing while paused
    pub fn advance(&mut self) -> Result<Option<StepReport>> {
        if !self.is_running() {
            return Ok(None);
        }
        self.step(self.params.substeps).map(Some)
    }

    /// Advance by `duration` of simulated time, shortening the last step so
    /// the clock lands on the requested time
    pub fn run_for(&mut self, duration: f64) -> Result<StepReport> {
        let mut total = StepReport {
            time: self.time,
            step_count: self.step_count,
            energy_error: self.energy_error,
            ..Default::default()
        };
        if self.bodies.is_empty() || duration <= 0.0 {
            return Ok(total);
        }

        let epsilon = duration * 1e-12;
        while duration - total.dt > epsilon {
            let nominal = match self.engine.integrator {
                IntegratorType::Rk45 => self.adaptive_next_dt,
                _ => self.params.effective_timestep(),
            };
            let report = self.step_by(nominal.min(duration - total.dt))?;
            if report.dt <= 0.0 {
                break;
            }
            total.accumulate(&report);
        }
        Ok(total)
    }

    fn step_by(&mut self, dt: f64) -> Result<StepReport> {
        self.last_issues.clear();
        if self.bodies.is_empty() {
            return Ok(StepReport {
                time: self.time,
                step_count: self.step_count,
                ..Default::default()
            });
        }

        let gravity = self.gravity();
        let options = self.params.adaptive_options();
        let outcome = integrator::step(self.engine.integrator, &mut self.bodies, dt, &gravity, &options);

        self.time += outcome.dt;
        self.step_count += 1;
        if self.engine.integrator.is_adaptive() {
            self.adaptive_next_dt = outcome.next_dt;
        }

        let recovered = self.recover_non_finite();
        for body in &mut self.bodies {
            body.update_trail();
            body.advance_rotation(outcome.dt);
        }

        if outcome.degraded {
            self.push_issue(
                Severity::Warning,
                format!(
                    "Adaptive step accepted at error {:.3e} after {} rejections (tolerance {:.1e})",
                    outcome.error, outcome.rejected, options.tolerance
                ),
            );
        }

        self.update_conservation();
        self.check_energy();

        if let Some(err) = recovered {
            return Err(err);
        }

        Ok(StepReport {
            dt: outcome.dt,
            time: self.time,
            step_count: self.step_count,
            energy_error: self.energy_error,
            error_estimate: outcome.error,
            rejected: outcome.rejected,
            degraded: outcome.degraded,
        })
    }

    /// Reset every body whose state went NaN/Infinity, then re-evaluate forces
    fn recover_non_finite(&mut self) -> Option<SimError> {
        let mut names = Vec::new();
        for body in &mut self.bodies {
            if !body.has_finite_state() || !body.acceleration.is_finite() {
                names.push(format!("\"{}\"", body.name));
                body.position = NVec3::zeros();
                body.velocity = NVec3::zeros();
                body.acceleration = NVec3::zeros();
                body.prev_acceleration = NVec3::zeros();
            }
        }
        if names.is_empty() {
            return None;
        }

        let gravity = self.gravity();
        integrator::initialize_accelerations(&mut self.bodies, &gravity);

        let err = SimError::NonFiniteState {
            count: names.len(),
            names: names.join(", "),
        };
        error!("{err}");
        self.push_issue(Severity::Error, err.to_string());
        Some(err)
    }

    fn update_conservation(&mut self) {
        let Some(baseline) = self.baseline else {
            return;
        };
        let current = ConservationQuantities::measure(&self.bodies, self.params.softening);
        self.energy_error = current.energy_error(&baseline);
        self.current = Some(current);
    }

    fn check_energy(&mut self) {
        let err = self.energy_error;
        if err.is_nan() || err > CRITICAL_ENERGY_ERROR {
            let msg = format!(
                "Critical energy error: {:.2}%. Reduce timestep or switch to a symplectic integrator.",
                err * 100.0
            );
            error!("{msg}");
            self.push_issue(Severity::Error, msg);
        } else if err > ELEVATED_ENERGY_ERROR {
            let msg = format!("Energy error: {:.4}% exceeds threshold.", err * 100.0);
            warn!("{msg}");
            self.push_issue(Severity::Warning, msg);
        }
    }

    fn push_issue(&mut self, severity: Severity, message: String) {
        self.last_issues.push(Issue { severity, message });
    }

    /// Problems found by the most recent step (or start attempt)
    pub fn last_issues(&self) -> &[Issue] {
        &self.last_issues
    }

    // settings =================================================================

    pub fn engine(&self) -> Engine {
        self.engine
    }

    pub fn params(&self) -> &Parameters {
        &self.params
    }

    pub fn set_timestep(&mut self, timestep: f64) -> Result<()> {
        positive("timestep", timestep)?;
        self.params.timestep = timestep;
        self.adaptive_next_dt = timestep;
        Ok(())
    }

    pub fn set_time_scale(&mut self, time_scale: f64) -> Result<()> {
        positive("time scale", time_scale)?;
        self.params.time_scale = time_scale;
        Ok(())
    }

    pub fn set_substeps(&mut self, substeps: usize) -> Result<()> {
        if substeps == 0 {
            return Err(SimError::InvalidParameter("substeps must be at least 1".into()));
        }
        self.params.substeps = substeps;
        Ok(())
    }

    /// Softening enters the potential energy, so baselines are re-captured
    pub fn set_softening(&mut self, softening: f64) -> Result<()> {
        if !softening.is_finite() || softening < 0.0 {
            return Err(SimError::InvalidParameter(format!("softening must be non-negative, got {softening}")));
        }
        self.params.softening = softening;
        self.rebaseline();
        Ok(())
    }

    pub fn set_adaptive_tolerance(&mut self, tolerance: f64) -> Result<()> {
        positive("adaptive tolerance", tolerance)?;
        self.params.adaptive_tolerance = tolerance;
        Ok(())
    }

    pub fn set_physics_mode(&mut self, mode: PhysicsMode) {
        self.engine.physics_mode = mode;
        self.rebaseline();
    }

    pub fn set_integrator(&mut self, integrator: IntegratorType) {
        self.engine.integrator = integrator;
        self.adaptive_next_dt = self.params.effective_timestep();
    }

    // host queries =============================================================

    pub fn time(&self) -> f64 {
        self.time
    }

    pub fn step_count(&self) -> u64 {
        self.step_count
    }

    pub fn energy_error(&self) -> f64 {
        self.energy_error
    }

    pub fn baseline(&self) -> Option<&ConservationQuantities> {
        self.baseline.as_ref()
    }

    /// Quantities measured after the last step (or at the last rebaseline)
    pub fn conservation(&self) -> Option<&ConservationQuantities> {
        self.current.as_ref()
    }

    /// Next step rk45 will attempt
    pub fn adaptive_next_dt(&self) -> f64 {
        self.adaptive_next_dt
    }

    /// `[x0, y0, z0, x1, ...]` in body order
    pub fn positions_flat(&self) -> Vec<f64> {
        self.bodies.iter().flat_map(|b| b.position.iter().copied()).collect()
    }

    pub fn velocities_flat(&self) -> Vec<f64> {
        self.bodies.iter().flat_map(|b| b.velocity.iter().copied()).collect()
    }

    pub fn total_energy(&self) -> f64 {
        self.current.map_or(0.0, |q| q.total_energy)
    }

    pub fn angular_momentum_magnitude(&self) -> f64 {
        self.current.map_or(0.0, |q| q.angular_momentum.norm())
    }

    pub fn stats(&self) -> SimulationStats {
        SimulationStats {
            time: self.time,
            time_days: units::seconds_to_days(self.time),
            time_years: units::seconds_to_years(self.time),
            step_count: self.step_count,
            body_count: self.bodies.len(),
            timestep: self.params.effective_timestep(),
            total_energy: self.total_energy(),
            energy_error: self.energy_error,
            angular_momentum: self.angular_momentum_magnitude(),
            is_running: self.is_running(),
            physics_mode: self.engine.physics_mode,
            integrator: self.engine.integrator,
        }
    }

    /// Order-sensitive hash of the clock and every body's phase-space state
    pub fn state_hash(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.time.to_bits().hash(&mut hasher);
        for body in &self.bodies {
            body.id.hash(&mut hasher);
            for c in body.position.iter().chain(body.velocity.iter()) {
                c.to_bits().hash(&mut hasher);
            }
        }
        hasher.finish()
    }

    // persistence ==============================================================

    pub fn to_state(&self) -> SimulationState {
        SimulationState {
            version: FORMAT_VERSION,
            time: self.time,
            timestep: self.params.timestep,
            time_scale: self.params.time_scale,
            softening: self.params.softening,
            physics_mode: self.engine.physics_mode,
            integrator_type: self.engine.integrator,
            substeps: self.params.substeps,
            adaptive_tolerance: self.params.adaptive_tolerance,
            bodies: self.bodies.iter().map(Body::to_record).collect(),
        }
    }

    pub fn to_json(&self) -> Result<String> {
        self.to_state().to_json()
    }

    /// Replace the whole simulation with a saved state.
    ///
    /// Everything is validated and built before anything is swapped in, so a
    /// failed load leaves the simulation untouched.
    pub fn load_state(&mut self, state: &SimulationState) -> Result<()> {
        if state.version > FORMAT_VERSION {
            return Err(SimError::UnsupportedVersion {
                found: state.version,
                supported: FORMAT_VERSION,
            });
        }
        if state.version == 0 {
            return Err(SimError::MissingVersion);
        }

        let mut params = self.params.clone();
        params.timestep = state.timestep;
        params.time_scale = state.time_scale;
        params.softening = state.softening;
        params.substeps = state.substeps;
        params.adaptive_tolerance = state.adaptive_tolerance;
        validate_params(&params).map_err(|e| SimError::MalformedState(e.to_string()))?;
        if !state.time.is_finite() {
            return Err(SimError::MalformedState(format!("time must be finite, got {}", state.time)));
        }

        let mut seen = HashSet::new();
        let mut bodies = Vec::with_capacity(state.bodies.len());
        for record in &state.bodies {
            if !seen.insert(record.id) {
                return Err(SimError::DuplicateBodyId(record.id.0));
            }
            let mut body = Body::from_record(record)?;
            body.set_max_trail_points(params.max_trail_points);
            bodies.push(body);
        }

        // commit
        if let Some(max_id) = bodies.iter().map(|b| b.id).max() {
            reserve_body_ids_through(max_id);
        }
        self.bodies = bodies;
        self.params = params;
        self.engine = Engine::new(state.integrator_type, state.physics_mode);
        self.time = state.time;
        self.step_count = 0;
        self.adaptive_next_dt = self.params.timestep;
        self.last_issues.clear();
        self.rebaseline();

        info!("Loaded simulation state: {} bodies at t = {:.1} s", self.bodies.len(), self.time);
        Ok(())
    }

    pub fn load_json(&mut self, json: &str) -> Result<()> {
        let state = SimulationState::from_json(json)?;
        self.load_state(&state)
    }

    /// Build a fresh simulation from a saved state
    pub fn from_state(state: &SimulationState) -> Result<Self> {
        let mut sim = Simulation::default();
        sim.load_state(state)?;
        Ok(sim)
    }

    pub fn snapshot(&self) -> StateSnapshot {
        StateSnapshot {
            time: self.time,
            bodies: self
                .bodies
                .iter()
                .map(|b| BodySnapshot {
                    id: b.id,
                    position: b.position.into(),
                    velocity: b.velocity.into(),
                })
                .collect(),
        }
    }

    /// Apply a minimal snapshot: set the clock, move matching bodies, then
    /// re-evaluate accelerations. Unknown ids are ignored. Returns how many
    /// bodies were updated.
    pub fn apply_snapshot(&mut self, snapshot: &StateSnapshot) -> Result<usize> {
        if !snapshot.time.is_finite() {
            return Err(SimError::MalformedState("snapshot time must be finite".into()));
        }
        for entry in &snapshot.bodies {
            let p: NVec3 = entry.position.into();
            let v: NVec3 = entry.velocity.into();
            if !p.is_finite() || !v.is_finite() {
                return Err(SimError::MalformedState(format!("snapshot body {} has non-finite state", entry.id)));
            }
        }

        self.time = snapshot.time;
        let mut updated = 0;
        for entry in &snapshot.bodies {
            if let Some(body) = self.bodies.iter_mut().find(|b| b.id == entry.id) {
                body.position = entry.position.into();
                body.velocity = entry.velocity.into();
                updated += 1;
            }
        }

        let gravity = self.gravity();
        integrator::initialize_accelerations(&mut self.bodies, &gravity);
        self.update_conservation();
        Ok(updated)
    }
}

impl StepReport {
    fn accumulate(&mut self, step: &StepReport) {
        self.dt += step.dt;
        self.time = step.time;
        self.step_count = step.step_count;
        self.energy_error = step.energy_error;
        self.error_estimate = self.error_estimate.max(step.error_estimate);
        self.rejected += step.rejected;
        self.degraded |= step.degraded;
    }
}

fn positive(what: &str, value: f64) -> Result<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(SimError::InvalidParameter(format!("{what} must be positive, got {value}")))
    }
}

fn validate_params(params: &Parameters) -> Result<()> {
    positive("timestep", params.timestep)?;
    positive("time scale", params.time_scale)?;
    positive("adaptive tolerance", params.adaptive_tolerance)?;
    if params.substeps == 0 {
        return Err(SimError::InvalidParameter("substeps must be at least 1".into()));
    }
    if !params.softening.is_finite() || params.softening < 0.0 {
        return Err(SimError::InvalidParameter("softening must be non-negative".into()));
    }
    Ok(())
}
