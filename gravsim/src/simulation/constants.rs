//! Physical constants, simulation defaults and unit helpers (SI throughout)

pub const G: f64 = 6.67430e-11; // gravitational constant, m^3 kg^-1 s^-2
pub const C: f64 = 299_792_458.0; // speed of light, m/s
pub const C_SQUARED: f64 = C * C;

/// 2G/c², multiply by a mass to get its Schwarzschild radius
pub const SCHWARZSCHILD_COEFF: f64 = 2.0 * G / C_SQUARED;

pub const SOLAR_MASS: f64 = 1.98892e30;
pub const EARTH_MASS: f64 = 5.9722e24;
pub const MOON_MASS: f64 = 7.342e22;
pub const JUPITER_MASS: f64 = 1.89813e27;
pub const NEUTRON_STAR_MASS: f64 = 1.4 * SOLAR_MASS;

pub const AU: f64 = 1.495978707e11;
pub const SOLAR_RADIUS: f64 = 6.9634e8;
pub const EARTH_RADIUS: f64 = 6.371e6;
pub const NEUTRON_STAR_RADIUS: f64 = 12_000.0;

pub const SOLAR_LUMINOSITY: f64 = 3.828e26; // W

pub const MINUTE: f64 = 60.0;
pub const HOUR: f64 = 3600.0;
pub const DAY: f64 = 86_400.0;
pub const YEAR: f64 = 31_557_600.0; // Julian year

// Simulation defaults
pub const DEFAULT_TIMESTEP: f64 = HOUR;
pub const DEFAULT_SOFTENING: f64 = 1.0e7; // roughly an Earth radius
pub const ELEVATED_ENERGY_ERROR: f64 = 0.01;
pub const CRITICAL_ENERGY_ERROR: f64 = 0.1;
pub const DEFAULT_ADAPTIVE_TOLERANCE: f64 = 1.0e-8;
pub const DEFAULT_MIN_DT: f64 = 1.0;
pub const DEFAULT_MAX_DT: f64 = DAY * 365.0;
pub const DEFAULT_SAFETY_FACTOR: f64 = 0.9;
pub const DEFAULT_MAX_RETRIES: usize = 64;
pub const DEFAULT_MAX_TRAIL_POINTS: usize = 200;

/// Unit conversions for display and scenario setup
pub mod units {
    use super::*;

    pub fn meters_to_au(m: f64) -> f64 {
        m / AU
    }

    pub fn au_to_meters(au: f64) -> f64 {
        au * AU
    }

    pub fn seconds_to_days(s: f64) -> f64 {
        s / DAY
    }

    pub fn days_to_seconds(d: f64) -> f64 {
        d * DAY
    }

    pub fn seconds_to_years(s: f64) -> f64 {
        s / YEAR
    }

    pub fn years_to_seconds(y: f64) -> f64 {
        y * YEAR
    }

    pub fn kg_to_solar_masses(kg: f64) -> f64 {
        kg / SOLAR_MASS
    }

    pub fn solar_masses_to_kg(sm: f64) -> f64 {
        sm * SOLAR_MASS
    }

    pub fn kg_to_earth_masses(kg: f64) -> f64 {
        kg / EARTH_MASS
    }

    pub fn earth_masses_to_kg(em: f64) -> f64 {
        em * EARTH_MASS
    }

    pub fn schwarzschild_radius(mass: f64) -> f64 {
        SCHWARZSCHILD_COEFF * mass
    }

    /// Human-readable distance ("12.0 km", "1.0000 AU", ...)
    pub fn format_distance(meters: f64) -> String {
        const LIGHT_YEAR: f64 = 9.4607e15;
        let abs_m = meters.abs();
        if abs_m < 1000.0 {
            format!("{meters:.1} m")
        } else if abs_m < AU * 0.01 {
            format!("{:.1} km", meters / 1000.0)
        } else if abs_m < LIGHT_YEAR * 0.1 {
            format!("{:.4} AU", meters / AU)
        } else {
            format!("{:.4} ly", meters / LIGHT_YEAR)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::units::*;
    use super::*;

    #[test]
    fn conversions_invert() {
        assert_eq!(meters_to_au(AU), 1.0);
        assert_eq!(au_to_meters(2.0), 2.0 * AU);
        assert_eq!(seconds_to_days(days_to_seconds(3.0)), 3.0);
        assert_eq!(seconds_to_years(years_to_seconds(1.0)), 1.0);
        assert_eq!(kg_to_solar_masses(solar_masses_to_kg(10.0)), 10.0);
        assert!((kg_to_earth_masses(SOLAR_MASS) - 333_030.0).abs() < 1.0);
        assert!((earth_masses_to_kg(1.0) - EARTH_MASS).abs() < 1.0);
    }

    #[test]
    fn solar_schwarzschild_radius_is_about_three_km() {
        assert!((schwarzschild_radius(SOLAR_MASS) - 2954.0).abs() < 1.0);
    }

    #[test]
    fn distances_pick_a_readable_unit() {
        assert_eq!(format_distance(12.0), "12.0 m");
        assert_eq!(format_distance(12_000.0), "12.0 km");
        assert_eq!(format_distance(AU), "1.0000 AU");
        assert!(format_distance(1.0e17).ends_with(" ly"));
    }
}
