//! Body data model
//!
//! A `Body` is one point mass: a common core (identity, mass, radius, phase-space
//! state, flags) plus a `BodyKind` payload carrying only the fields meaningful for
//! its type. Bodies are built through `BodyParams`, which fills type-appropriate
//! defaults and rejects parameters the force law cannot work with.

use std::collections::VecDeque;
use std::f64::consts::TAU;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use crate::error::{Result, SimError};
use crate::simulation::constants::*;
use crate::simulation::vector::{NVec3, VecRecord, VectorExt};

static NEXT_BODY_ID: AtomicU64 = AtomicU64::new(1);

/// Next process-unique body id
pub fn generate_body_id() -> BodyId {
    BodyId(NEXT_BODY_ID.fetch_add(1, Ordering::Relaxed))
}

/// Restart id generation at `start` (deterministic replay and tests)
pub fn reset_body_id_counter(start: u64) {
    NEXT_BODY_ID.store(start, Ordering::Relaxed);
}

/// Guarantee that later generated ids are all greater than `id`
pub fn reserve_body_ids_through(id: BodyId) {
    NEXT_BODY_ID.fetch_max(id.0.saturating_add(1), Ordering::Relaxed);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BodyId(pub u64);

impl fmt::Display for BodyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Closed set of body type tags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BodyType {
    Star,
    Planet,
    Moon,
    Comet,
    Spaceship,
    BlackHole,
    NeutronStar,
    Pulsar,
    Magnetar,
}

impl BodyType {
    /// Compact objects get pseudo-Newtonian treatment as sources
    pub fn is_compact(self) -> bool {
        matches!(
            self,
            BodyType::BlackHole | BodyType::NeutronStar | BodyType::Pulsar | BodyType::Magnetar
        )
    }

    pub fn is_luminous(self) -> bool {
        matches!(self, BodyType::Star | BodyType::Pulsar | BodyType::Magnetar)
    }

    pub fn default_mass(self) -> f64 {
        match self {
            BodyType::Star => SOLAR_MASS,
            BodyType::Planet | BodyType::Comet | BodyType::Spaceship => EARTH_MASS,
            BodyType::Moon => MOON_MASS,
            BodyType::BlackHole => 10.0 * SOLAR_MASS,
            BodyType::NeutronStar | BodyType::Pulsar | BodyType::Magnetar => NEUTRON_STAR_MASS,
        }
    }

    pub fn default_radius(self, mass: f64) -> f64 {
        match self {
            BodyType::Star => SOLAR_RADIUS,
            BodyType::Planet => EARTH_RADIUS,
            BodyType::Moon => EARTH_RADIUS * 0.27,
            BodyType::Comet => 5_000.0,
            BodyType::Spaceship => 100.0,
            BodyType::BlackHole => units::schwarzschild_radius(mass),
            BodyType::NeutronStar | BodyType::Pulsar | BodyType::Magnetar => NEUTRON_STAR_RADIUS,
        }
    }

    /// Presentation hint, 0xRRGGBB
    pub fn default_color(self) -> u32 {
        match self {
            BodyType::Star => 0xffdd44,
            BodyType::Planet => 0x4488ff,
            BodyType::Moon => 0xaabbcc,
            BodyType::Comet => 0x88ffff,
            BodyType::Spaceship => 0xff88ff,
            BodyType::BlackHole => 0x000000,
            BodyType::NeutronStar => 0x44ffff,
            BodyType::Pulsar => 0xffff44,
            BodyType::Magnetar => 0xff44ff,
        }
    }
}

impl fmt::Display for BodyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            BodyType::Star => "star",
            BodyType::Planet => "planet",
            BodyType::Moon => "moon",
            BodyType::Comet => "comet",
            BodyType::Spaceship => "spaceship",
            BodyType::BlackHole => "blackhole",
            BodyType::NeutronStar => "neutronstar",
            BodyType::Pulsar => "pulsar",
            BodyType::Magnetar => "magnetar",
        };
        f.write_str(label)
    }
}

/// Spin state of pulsars and magnetars (presentation only)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rotation {
    pub period: f64,          // s
    pub pulse_frequency: f64, // Hz
    pub beam_angle: f64,      // rad
    pub phase: f64,           // rad, 0..2π
}

/// Type-specific payload
#[derive(Debug, Clone, PartialEq)]
pub enum BodyKind {
    Star {
        luminosity: f64,
    },
    Planet,
    Moon,
    Comet {
        tail_length: f64,
    },
    Spaceship,
    BlackHole {
        schwarzschild_radius: f64,
    },
    NeutronStar,
    Pulsar {
        luminosity: f64,
        rotation: Rotation,
    },
    Magnetar {
        luminosity: f64,
        rotation: Rotation,
        magnetic_field_strength: f64, // T, visualization proxy only
    },
}

impl BodyKind {
    pub fn body_type(&self) -> BodyType {
        match self {
            BodyKind::Star { .. } => BodyType::Star,
            BodyKind::Planet => BodyType::Planet,
            BodyKind::Moon => BodyType::Moon,
            BodyKind::Comet { .. } => BodyType::Comet,
            BodyKind::Spaceship => BodyType::Spaceship,
            BodyKind::BlackHole { .. } => BodyType::BlackHole,
            BodyKind::NeutronStar => BodyType::NeutronStar,
            BodyKind::Pulsar { .. } => BodyType::Pulsar,
            BodyKind::Magnetar { .. } => BodyType::Magnetar,
        }
    }
}

/// One simulated point mass
#[derive(Debug, Clone)]
pub struct Body {
    pub id: BodyId,
    pub name: String,
    pub kind: BodyKind,

    pub position: NVec3, // m
    pub velocity: NVec3, // m/s
    pub mass: f64,       // kg
    pub radius: f64,     // m

    // derived every step, never serialized
    pub acceleration: NVec3,
    pub prev_acceleration: NVec3,

    pub softening: f64, // m
    pub is_fixed: bool,
    pub is_gravity_source: bool,
    pub is_gravity_target: bool,

    pub color: u32,
    pub created_at: f64, // simulation time when added to a controller

    trail: VecDeque<NVec3>,
    max_trail_points: usize,
}

impl Body {
    pub fn body_type(&self) -> BodyType {
        self.kind.body_type()
    }

    pub fn is_compact(&self) -> bool {
        self.body_type().is_compact()
    }

    pub fn is_luminous(&self) -> bool {
        self.body_type().is_luminous()
    }

    /// Luminosity in watts, zero for non-luminous types
    pub fn luminosity(&self) -> f64 {
        match self.kind {
            BodyKind::Star { luminosity }
            | BodyKind::Pulsar { luminosity, .. }
            | BodyKind::Magnetar { luminosity, .. } => luminosity,
            _ => 0.0,
        }
    }

    /// Only black holes carry a Schwarzschild radius
    pub fn schwarzschild_radius(&self) -> Option<f64> {
        match self.kind {
            BodyKind::BlackHole {
                schwarzschild_radius,
            } => Some(schwarzschild_radius),
            _ => None,
        }
    }

    pub fn rotation(&self) -> Option<&Rotation> {
        match &self.kind {
            BodyKind::Pulsar { rotation, .. } | BodyKind::Magnetar { rotation, .. } => {
                Some(rotation)
            }
            _ => None,
        }
    }

    pub fn magnetic_field_strength(&self) -> Option<f64> {
        match self.kind {
            BodyKind::Magnetar {
                magnetic_field_strength,
                ..
            } => Some(magnetic_field_strength),
            _ => None,
        }
    }

    pub fn tail_length(&self) -> Option<f64> {
        match self.kind {
            BodyKind::Comet { tail_length } => Some(tail_length),
            _ => None,
        }
    }

    /// Whether the force law writes an acceleration for this body
    pub fn responds_to_gravity(&self) -> bool {
        self.is_gravity_target && !self.is_fixed
    }

    pub fn has_finite_state(&self) -> bool {
        self.position.is_finite() && self.velocity.is_finite()
    }

    pub fn kinetic_energy(&self) -> f64 {
        0.5 * self.mass * self.velocity.norm_squared()
    }

    pub fn momentum(&self) -> NVec3 {
        self.velocity * self.mass
    }

    /// r × p about the origin
    pub fn angular_momentum(&self) -> NVec3 {
        self.position.cross(&self.momentum())
    }

    pub fn escape_velocity(&self) -> f64 {
        (2.0 * G * self.mass / self.radius).sqrt()
    }

    /// Circular orbit speed at `orbit_radius` around this body
    pub fn orbital_velocity(&self, orbit_radius: f64) -> f64 {
        (G * self.mass / orbit_radius).sqrt()
    }

    pub fn hill_sphere_radius(&self, semi_major_axis: f64, primary_mass: f64) -> f64 {
        semi_major_axis * (self.mass / (3.0 * primary_mass)).cbrt()
    }

    /// Fluid Roche limit for a satellite of the given density (kg/m³)
    pub fn roche_limit(&self, satellite_density: f64) -> f64 {
        let volume = 4.0 / 3.0 * std::f64::consts::PI * self.radius.powi(3);
        let primary_density = self.mass / volume;
        2.44 * self.radius * (primary_density / satellite_density).cbrt()
    }

    /// Spin pulsars/magnetars forward by `dt` seconds
    pub fn advance_rotation(&mut self, dt: f64) {
        if let BodyKind::Pulsar { rotation, .. } | BodyKind::Magnetar { rotation, .. } =
            &mut self.kind
        {
            if rotation.period > 0.0 {
                rotation.phase = (rotation.phase + TAU * dt / rotation.period).rem_euclid(TAU);
            }
        }
    }

    // trail ====================================================================

    pub fn update_trail(&mut self) {
        self.trail.push_back(self.position);
        while self.trail.len() > self.max_trail_points {
            self.trail.pop_front();
        }
    }

    pub fn clear_trail(&mut self) {
        self.trail.clear();
    }

    /// Oldest point first
    pub fn trail(&self) -> impl Iterator<Item = &NVec3> {
        self.trail.iter()
    }

    pub fn trail_len(&self) -> usize {
        self.trail.len()
    }

    pub fn max_trail_points(&self) -> usize {
        self.max_trail_points
    }

    pub fn set_max_trail_points(&mut self, max: usize) {
        self.max_trail_points = max;
        while self.trail.len() > max {
            self.trail.pop_front();
        }
    }

    // serialization ============================================================

    /// Flat record with only the type-specific fields relevant to this body
    pub fn to_record(&self) -> BodyRecord {
        let mut record = BodyRecord {
            id: self.id,
            name: Some(self.name.clone()),
            body_type: self.body_type(),
            mass: self.mass,
            radius: Some(self.radius),
            position: self.position.into(),
            velocity: self.velocity.into(),
            softening: self.softening,
            is_fixed: self.is_fixed,
            is_gravity_source: self.is_gravity_source,
            is_gravity_target: self.is_gravity_target,
            color: Some(self.color),
            created_at: self.created_at,
            luminosity: None,
            schwarzschild_radius: None,
            rotation_period: None,
            pulse_frequency: None,
            beam_angle: None,
            rotation_phase: None,
            magnetic_field_strength: None,
            tail_length: None,
        };

        match &self.kind {
            BodyKind::Star { luminosity } => record.luminosity = Some(*luminosity),
            BodyKind::Comet { tail_length } => record.tail_length = Some(*tail_length),
            BodyKind::BlackHole {
                schwarzschild_radius,
            } => record.schwarzschild_radius = Some(*schwarzschild_radius),
            BodyKind::Pulsar {
                luminosity,
                rotation,
            } => {
                record.luminosity = Some(*luminosity);
                record.set_rotation(rotation);
            }
            BodyKind::Magnetar {
                luminosity,
                rotation,
                magnetic_field_strength,
            } => {
                record.luminosity = Some(*luminosity);
                record.set_rotation(rotation);
                record.magnetic_field_strength = Some(*magnetic_field_strength);
            }
            BodyKind::Planet | BodyKind::Moon | BodyKind::Spaceship | BodyKind::NeutronStar => {}
        }

        record
    }

    /// Rebuild a body from its record, keeping the recorded id
    pub fn from_record(record: &BodyRecord) -> Result<Body> {
        let mut params = BodyParams::new(record.body_type)
            .with_id(record.id)
            .mass(record.mass)
            .at(record.position.into())
            .moving(record.velocity.into())
            .softening(record.softening)
            .fixed(record.is_fixed)
            .gravity_source(record.is_gravity_source)
            .gravity_target(record.is_gravity_target);
        params.name = record.name.clone();
        params.radius = record.radius;
        params.color = record.color;
        params.created_at = record.created_at;
        params.luminosity = record.luminosity;
        params.schwarzschild_radius = record.schwarzschild_radius;
        params.rotation_period = record.rotation_period;
        params.pulse_frequency = record.pulse_frequency;
        params.beam_angle = record.beam_angle;
        params.rotation_phase = record.rotation_phase;
        params.magnetic_field_strength = record.magnetic_field_strength;
        params.tail_length = record.tail_length;
        params.build()
    }
}

/// Construction parameters; anything left `None` takes the type default
#[derive(Debug, Clone)]
pub struct BodyParams {
    pub id: Option<BodyId>,
    pub name: Option<String>,
    pub body_type: BodyType,
    pub mass: Option<f64>,
    pub radius: Option<f64>,
    pub position: NVec3,
    pub velocity: NVec3,
    pub softening: Option<f64>,
    pub is_fixed: bool,
    pub is_gravity_source: bool,
    pub is_gravity_target: bool,
    pub luminosity: Option<f64>,
    pub schwarzschild_radius: Option<f64>,
    pub rotation_period: Option<f64>,
    pub pulse_frequency: Option<f64>,
    pub beam_angle: Option<f64>,
    pub rotation_phase: Option<f64>,
    pub magnetic_field_strength: Option<f64>,
    pub tail_length: Option<f64>,
    pub color: Option<u32>,
    pub max_trail_points: Option<usize>,
    pub created_at: f64,
}

impl BodyParams {
    pub fn new(body_type: BodyType) -> Self {
        Self {
            id: None,
            name: None,
            body_type,
            mass: None,
            radius: None,
            position: NVec3::zeros(),
            velocity: NVec3::zeros(),
            softening: None,
            is_fixed: false,
            is_gravity_source: true,
            is_gravity_target: true,
            luminosity: None,
            schwarzschild_radius: None,
            rotation_period: None,
            pulse_frequency: None,
            beam_angle: None,
            rotation_phase: None,
            magnetic_field_strength: None,
            tail_length: None,
            color: None,
            max_trail_points: None,
            created_at: 0.0,
        }
    }

    pub fn star() -> Self {
        Self::new(BodyType::Star).name("Star")
    }

    pub fn planet() -> Self {
        Self::new(BodyType::Planet).name("Planet")
    }

    pub fn moon() -> Self {
        Self::new(BodyType::Moon).name("Moon")
    }

    pub fn comet() -> Self {
        Self::new(BodyType::Comet).name("Comet")
    }

    pub fn spaceship() -> Self {
        Self::new(BodyType::Spaceship).name("Spaceship")
    }

    pub fn black_hole() -> Self {
        Self::new(BodyType::BlackHole).name("Black Hole")
    }

    pub fn neutron_star() -> Self {
        Self::new(BodyType::NeutronStar).name("Neutron Star")
    }

    pub fn pulsar() -> Self {
        Self::new(BodyType::Pulsar).name("Pulsar")
    }

    pub fn magnetar() -> Self {
        Self::new(BodyType::Magnetar).name("Magnetar")
    }

    pub fn with_id(mut self, id: BodyId) -> Self {
        self.id = Some(id);
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn mass(mut self, mass: f64) -> Self {
        self.mass = Some(mass);
        self
    }

    pub fn radius(mut self, radius: f64) -> Self {
        self.radius = Some(radius);
        self
    }

    pub fn at(mut self, position: NVec3) -> Self {
        self.position = position;
        self
    }

    pub fn moving(mut self, velocity: NVec3) -> Self {
        self.velocity = velocity;
        self
    }

    pub fn softening(mut self, softening: f64) -> Self {
        self.softening = Some(softening);
        self
    }

    pub fn fixed(mut self, is_fixed: bool) -> Self {
        self.is_fixed = is_fixed;
        self
    }

    pub fn gravity_source(mut self, is_source: bool) -> Self {
        self.is_gravity_source = is_source;
        self
    }

    pub fn gravity_target(mut self, is_target: bool) -> Self {
        self.is_gravity_target = is_target;
        self
    }

    pub fn luminosity(mut self, luminosity: f64) -> Self {
        self.luminosity = Some(luminosity);
        self
    }

    pub fn rotation_period(mut self, period: f64) -> Self {
        self.rotation_period = Some(period);
        self
    }

    pub fn magnetic_field_strength(mut self, tesla: f64) -> Self {
        self.magnetic_field_strength = Some(tesla);
        self
    }

    pub fn max_trail_points(mut self, max: usize) -> Self {
        self.max_trail_points = Some(max);
        self
    }

    /// Validate and fill defaults; a fresh id is drawn unless one was given
    pub fn build(self) -> Result<Body> {
        let body_type = self.body_type;
        let mass = self.mass.unwrap_or_else(|| body_type.default_mass());

        if !mass.is_finite() || mass < 0.0 {
            return Err(SimError::InvalidBody(format!("mass must be finite and non-negative, got {mass}")));
        }
        if self.is_gravity_source && mass <= 0.0 {
            return Err(SimError::InvalidBody(format!("a gravity source needs positive mass, got {mass}")));
        }
        if !self.position.is_finite() || !self.velocity.is_finite() {
            return Err(SimError::InvalidBody("position and velocity must be finite".into()));
        }

        let kind = match body_type {
            BodyType::Star => BodyKind::Star {
                luminosity: self.luminosity.unwrap_or(SOLAR_LUMINOSITY),
            },
            BodyType::Planet => BodyKind::Planet,
            BodyType::Moon => BodyKind::Moon,
            BodyType::Comet => BodyKind::Comet {
                tail_length: self.tail_length.unwrap_or(1.0),
            },
            BodyType::Spaceship => BodyKind::Spaceship,
            BodyType::BlackHole => BodyKind::BlackHole {
                schwarzschild_radius: self
                    .schwarzschild_radius
                    .unwrap_or(units::schwarzschild_radius(mass)),
            },
            BodyType::NeutronStar => BodyKind::NeutronStar,
            BodyType::Pulsar => BodyKind::Pulsar {
                luminosity: self.luminosity.unwrap_or(SOLAR_LUMINOSITY),
                rotation: self.rotation(0.033)?,
            },
            BodyType::Magnetar => BodyKind::Magnetar {
                luminosity: self.luminosity.unwrap_or(SOLAR_LUMINOSITY),
                rotation: self.rotation(2.0)?,
                magnetic_field_strength: self.magnetic_field_strength.unwrap_or(1.0e11),
            },
        };

        // black holes are exactly as big as their horizon
        let (radius, default_softening) = match kind {
            BodyKind::BlackHole {
                schwarzschild_radius,
            } => (schwarzschild_radius, 0.1 * schwarzschild_radius),
            _ => (self.radius.unwrap_or_else(|| body_type.default_radius(mass)), 0.0),
        };
        if !radius.is_finite() || radius <= 0.0 {
            return Err(SimError::InvalidBody(format!("radius must be positive, got {radius}")));
        }

        let softening = self.softening.unwrap_or(default_softening);
        if !softening.is_finite() || softening < 0.0 {
            return Err(SimError::InvalidBody(format!("softening must be non-negative, got {softening}")));
        }

        let id = self.id.unwrap_or_else(generate_body_id);

        Ok(Body {
            id,
            name: self.name.unwrap_or_else(|| format!("Body {id}")),
            kind,
            position: self.position,
            velocity: self.velocity,
            mass,
            radius,
            acceleration: NVec3::zeros(),
            prev_acceleration: NVec3::zeros(),
            softening,
            is_fixed: self.is_fixed,
            is_gravity_source: self.is_gravity_source,
            is_gravity_target: self.is_gravity_target,
            color: self.color.unwrap_or_else(|| body_type.default_color()),
            created_at: self.created_at,
            trail: VecDeque::new(),
            max_trail_points: self.max_trail_points.unwrap_or(DEFAULT_MAX_TRAIL_POINTS),
        })
    }

    fn rotation(&self, default_period: f64) -> Result<Rotation> {
        let period = self.rotation_period.unwrap_or(default_period);
        if !period.is_finite() || period <= 0.0 {
            return Err(SimError::InvalidBody(format!("rotation period must be positive, got {period}")));
        }
        Ok(Rotation {
            period,
            pulse_frequency: self.pulse_frequency.unwrap_or(1.0 / period),
            beam_angle: self.beam_angle.unwrap_or(0.1),
            phase: self.rotation_phase.unwrap_or(0.0),
        })
    }
}

fn yes() -> bool {
    true
}

/// Serialized shape of one body
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BodyRecord {
    pub id: BodyId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub body_type: BodyType,
    pub mass: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub radius: Option<f64>,
    pub position: VecRecord,
    pub velocity: VecRecord,
    #[serde(default)]
    pub softening: f64,
    #[serde(default)]
    pub is_fixed: bool,
    #[serde(default = "yes")]
    pub is_gravity_source: bool,
    #[serde(default = "yes")]
    pub is_gravity_target: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<u32>,
    #[serde(default)]
    pub created_at: f64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub luminosity: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schwarzschild_radius: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rotation_period: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pulse_frequency: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub beam_angle: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rotation_phase: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub magnetic_field_strength: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tail_length: Option<f64>,
}

impl BodyRecord {
    fn set_rotation(&mut self, rotation: &Rotation) {
        self.rotation_period = Some(rotation.period);
        self.pulse_frequency = Some(rotation.pulse_frequency);
        self.beam_angle = Some(rotation.beam_angle);
        self.rotation_phase = Some(rotation.phase);
    }
}
