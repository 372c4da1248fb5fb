pub mod error;
pub mod simulation;
pub mod configuration;
pub mod benchmark;

pub use error::{Result, SimError};

pub use simulation::vector::{NVec3, VecRecord, VectorExt};
pub use simulation::constants::units;
pub use simulation::body::{
    generate_body_id, reserve_body_ids_through, reset_body_id_counter, Body, BodyId, BodyKind, BodyParams,
    BodyRecord, BodyType, Rotation,
};
pub use simulation::forces::{
    center_of_mass, detect_collisions, total_angular_momentum, total_energy, total_kinetic_energy, total_momentum,
    total_potential_energy, Acceleration, CollisionPair, ConservationQuantities, Gravity, PhysicsMode,
};
pub use simulation::integrator::{
    integrate_for, rk45_step, rk4_step, velocity_verlet_step, AdaptiveOptions, IntegrationSummary, IntegratorType,
    StepOutcome,
};
pub use simulation::engine::Engine;
pub use simulation::params::Parameters;
pub use simulation::states::{BodySnapshot, SimulationState, StateSnapshot, FORMAT_VERSION};
pub use simulation::controller::{Issue, RunState, Severity, Simulation, SimulationStats, StepReport};
pub use simulation::diagnostics::{DiagnosticReport, DiagnosticsMonitor, Encounter, EnergyTrend, Proximity};
pub use simulation::validation::{run_all_checks, CheckResult};
pub use simulation::scenario::Scenario;

pub use configuration::config::{BodyConfig, EngineConfig, ParametersConfig, RunConfig, ScenarioConfig};

pub use benchmark::benchmark::{bench_gravity, bench_integrators, compare_integrators, IntegratorComparison};
