//! High-level runtime engine settings
//!
//! Selects the integrator and the force law used when building and running
//! a `Simulation`

use serde::{Deserialize, Serialize};

use crate::simulation::forces::{Gravity, PhysicsMode};
use crate::simulation::integrator::IntegratorType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Engine {
    pub integrator: IntegratorType,  // verlet, rk4 or rk45
    pub physics_mode: PhysicsMode,   // newtonian, pseudo-newtonian or 1pn
}

impl Engine {
    pub fn new(integrator: IntegratorType, physics_mode: PhysicsMode) -> Self {
        Self {
            integrator,
            physics_mode,
        }
    }

    /// Direct-summation force evaluator for this engine
    pub fn gravity(&self, softening: f64) -> Gravity {
        Gravity::new(self.physics_mode, softening)
    }
}
