//! Vector and coordinate machinery shared by the processing stages.

use crate::config::PhysicalConstants;
use crate::types::{AltError, AltResult};
use serde::{Deserialize, Serialize};
use std::ops::{Add, Div, Mul, Neg, Sub};

/// Maximum iterations for the geodetic latitude solve
const MAX_GEODETIC_ITERATIONS: usize = 100;
/// Convergence tolerance on latitude/altitude, radians/meters
const GEODETIC_TOLERANCE: f64 = 1e-12;

/// Simple 3D vector for geometric calculations
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vector3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vector3 {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn dot(&self, other: &Vector3) -> f64 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    pub fn cross(&self, other: &Vector3) -> Vector3 {
        Vector3::new(
            self.y * other.z - self.z * other.y,
            self.z * other.x - self.x * other.z,
            self.x * other.y - self.y * other.x,
        )
    }

    pub fn norm(&self) -> f64 {
        self.dot(self).sqrt()
    }

    /// Unit vector; degenerate zero-length input is a geometry error.
    pub fn normalized(&self) -> AltResult<Vector3> {
        let n = self.norm();
        if n == 0.0 {
            return Err(AltError::Geometry(
                "cannot normalize zero-length vector".to_string(),
            ));
        }
        Ok(*self / n)
    }

    /// Angle between two vectors in radians.
    ///
    /// The cosine is clamped to [-1, 1] before the acos so floating-point
    /// round-off near parallel vectors never produces NaN; zero-length
    /// inputs are rejected explicitly.
    pub fn angle_to(&self, other: &Vector3) -> AltResult<f64> {
        let na = self.norm();
        let nb = other.norm();
        if na == 0.0 || nb == 0.0 {
            return Err(AltError::Geometry(
                "angle between vectors undefined for zero-length input".to_string(),
            ));
        }
        let cos = (self.dot(other) / (na * nb)).clamp(-1.0, 1.0);
        Ok(cos.acos())
    }

    /// Linear interpolation: `self + alpha * (other - self)`.
    pub fn lerp(&self, other: &Vector3, alpha: f64) -> Vector3 {
        *self + (*other - *self) * alpha
    }
}

impl Add for Vector3 {
    type Output = Vector3;
    fn add(self, rhs: Vector3) -> Vector3 {
        Vector3::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl Sub for Vector3 {
    type Output = Vector3;
    fn sub(self, rhs: Vector3) -> Vector3 {
        Vector3::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl Mul<f64> for Vector3 {
    type Output = Vector3;
    fn mul(self, rhs: f64) -> Vector3 {
        Vector3::new(self.x * rhs, self.y * rhs, self.z * rhs)
    }
}

impl Div<f64> for Vector3 {
    type Output = Vector3;
    fn div(self, rhs: f64) -> Vector3 {
        Vector3::new(self.x / rhs, self.y / rhs, self.z / rhs)
    }
}

impl Neg for Vector3 {
    type Output = Vector3;
    fn neg(self) -> Vector3 {
        Vector3::new(-self.x, -self.y, -self.z)
    }
}

/// Geodetic coordinates: latitude/longitude in radians, altitude in meters
/// above the ellipsoid.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Lla {
    pub lat: f64,
    pub lon: f64,
    pub alt: f64,
}

/// Convert geodetic coordinates to ECEF.
pub fn lla_to_ecef(lla: &Lla, cst: &PhysicalConstants) -> Vector3 {
    let e2 = cst.flattening * (2.0 - cst.flattening);
    let sin_lat = lla.lat.sin();
    let cos_lat = lla.lat.cos();
    // Prime vertical radius of curvature
    let n = cst.semi_major_axis / (1.0 - e2 * sin_lat * sin_lat).sqrt();

    Vector3::new(
        (n + lla.alt) * cos_lat * lla.lon.cos(),
        (n + lla.alt) * cos_lat * lla.lon.sin(),
        (n * (1.0 - e2) + lla.alt) * sin_lat,
    )
}

/// Convert ECEF coordinates to geodetic, iterating the latitude solve.
///
/// The fixed-point iteration converges in a handful of steps for any point
/// away from the geocenter; a bounded iteration count turns pathological
/// inputs into an explicit [`AltError::Geometry`] instead of an endless loop.
pub fn ecef_to_lla(pos: &Vector3, cst: &PhysicalConstants) -> AltResult<Lla> {
    let e2 = cst.flattening * (2.0 - cst.flattening);
    let p = (pos.x * pos.x + pos.y * pos.y).sqrt();
    if p == 0.0 && pos.z == 0.0 {
        return Err(AltError::Geometry(
            "geodetic coordinates undefined at the geocenter".to_string(),
        ));
    }
    let lon = pos.y.atan2(pos.x);

    // Polar special case: latitude is exactly +/- pi/2
    if p == 0.0 {
        let lat = if pos.z > 0.0 {
            std::f64::consts::FRAC_PI_2
        } else {
            -std::f64::consts::FRAC_PI_2
        };
        let alt = pos.z.abs() - cst.semi_minor_axis;
        return Ok(Lla { lat, lon, alt });
    }

    let mut lat = (pos.z / (p * (1.0 - e2))).atan();
    let mut alt = 0.0;
    for _ in 0..MAX_GEODETIC_ITERATIONS {
        let sin_lat = lat.sin();
        let n = cst.semi_major_axis / (1.0 - e2 * sin_lat * sin_lat).sqrt();
        let alt_next = p / lat.cos() - n;
        let lat_next = (pos.z / (p * (1.0 - e2 * n / (n + alt_next)))).atan();

        let converged =
            (lat_next - lat).abs() < GEODETIC_TOLERANCE && (alt_next - alt).abs() < 1e-9;
        lat = lat_next;
        alt = alt_next;
        if converged {
            return Ok(Lla { lat, lon, alt });
        }
    }

    Err(AltError::Geometry(format!(
        "geodetic conversion did not converge within {} iterations for ({}, {}, {})",
        MAX_GEODETIC_ITERATIONS, pos.x, pos.y, pos.z
    )))
}

/// Scalar linear interpolation.
pub fn lerp(a: f64, b: f64, alpha: f64) -> f64 {
    a + (b - a) * alpha
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_vector_ops() {
        let a = Vector3::new(1.0, 0.0, 0.0);
        let b = Vector3::new(0.0, 1.0, 0.0);
        assert_relative_eq!(a.dot(&b), 0.0);
        assert_relative_eq!(a.cross(&b).z, 1.0);
        assert_relative_eq!(
            a.angle_to(&b).unwrap(),
            std::f64::consts::FRAC_PI_2,
            epsilon = 1e-12
        );
        assert!(Vector3::default().angle_to(&a).is_err());
        assert!(Vector3::default().normalized().is_err());
    }

    #[test]
    fn test_lerp_midpoint() {
        let a = Vector3::new(0.0, 0.0, 0.0);
        let b = Vector3::new(2.0, 4.0, -6.0);
        let m = a.lerp(&b, 0.5);
        assert_relative_eq!(m.x, 1.0);
        assert_relative_eq!(m.y, 2.0);
        assert_relative_eq!(m.z, -3.0);
    }

    #[test]
    fn test_geodetic_round_trip() {
        let cst = PhysicalConstants::default();
        let lla = Lla {
            lat: 0.8_f64,
            lon: -1.2_f64,
            alt: 717_000.0,
        };
        let ecef = lla_to_ecef(&lla, &cst);
        let back = ecef_to_lla(&ecef, &cst).unwrap();
        assert_relative_eq!(back.lat, lla.lat, epsilon = 1e-10);
        assert_relative_eq!(back.lon, lla.lon, epsilon = 1e-10);
        assert_relative_eq!(back.alt, lla.alt, epsilon = 1e-4);
    }

    #[test]
    fn test_geocenter_rejected() {
        let cst = PhysicalConstants::default();
        assert!(ecef_to_lla(&Vector3::default(), &cst).is_err());
    }
}
