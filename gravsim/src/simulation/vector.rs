//! 3D vector type used throughout the engine
//!
//! `NVec3` is nalgebra's `Vector3<f64>`; arithmetic, dot, cross and norms come
//! straight from nalgebra. `VectorExt` adds the few operations the engine needs
//! that nalgebra leaves to the caller (zero-safe normalize, finiteness, in-place
//! scaled add for allocation-free integrator loops).

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

pub type NVec3 = Vector3<f64>;

/// Extra vector operations on top of nalgebra
pub trait VectorExt {
    /// Unit vector in the same direction, or zero for a zero-length vector
    fn normalized_or_zero(&self) -> NVec3;

    fn distance(&self, other: &NVec3) -> f64;

    fn distance_squared(&self, other: &NVec3) -> f64;

    /// True when every component is finite
    fn is_finite(&self) -> bool;

    /// self += v * s, in place
    fn add_scaled_mut(&mut self, v: &NVec3, s: f64);
}

impl VectorExt for NVec3 {
    fn normalized_or_zero(&self) -> NVec3 {
        let mag = self.norm();
        if mag == 0.0 || !mag.is_finite() {
            return NVec3::zeros();
        }
        self / mag
    }

    fn distance(&self, other: &NVec3) -> f64 {
        (self - other).norm()
    }

    fn distance_squared(&self, other: &NVec3) -> f64 {
        (self - other).norm_squared()
    }

    fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }

    fn add_scaled_mut(&mut self, v: &NVec3, s: f64) {
        self.axpy(s, v, 1.0);
    }
}

/// Plain `{x, y, z}` record used for serialized vectors
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Default)]
pub struct VecRecord {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl From<NVec3> for VecRecord {
    fn from(v: NVec3) -> Self {
        Self { x: v.x, y: v.y, z: v.z }
    }
}

impl From<VecRecord> for NVec3 {
    fn from(r: VecRecord) -> Self {
        NVec3::new(r.x, r.y, r.z)
    }
}
