pub mod vector;
pub mod constants;
pub mod body;
pub mod states;
pub mod params;
pub mod engine;
pub mod forces;
pub mod integrator;
pub mod controller;
pub mod diagnostics;
pub mod validation;
pub mod scenario;
