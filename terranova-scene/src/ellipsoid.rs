use bevy::log::warn;
use bevy::math::DVec3;

use crate::geodetic::{Geodetic3, GeodeticCoordinate};
use crate::math::{ElementSum, EPSILON1, EPSILON12};

const SCALE_TO_SURFACE_TOLERANCE: f64 = 1e-10;
const SCALE_TO_SURFACE_MAX_ITERATIONS: u32 = 64;

#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq)]
pub enum EllipsoidError {
    #[error("ellipsoid radii must be strictly positive, got ({x}, {y}, {z})")]
    NonPositiveRadius { x: f64, y: f64, z: f64 },
}

/// Result of projecting a point onto the ellipsoid surface.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfaceProjection {
    pub position: DVec3,
    pub iterations: u32,
    pub converged: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ellipsoid {
    radii: DVec3,
    radii_squared: DVec3,
    radii_to_the_fourth: DVec3,
    one_over_radii_squared: DVec3,
}

const fn from_radii(x: f64, y: f64, z: f64) -> Ellipsoid {
    Ellipsoid {
        radii: DVec3::new(x, y, z),
        radii_squared: DVec3::new(x * x, y * y, z * z),
        radii_to_the_fourth: DVec3::new(x * x * x * x, y * y * y * y, z * z * z * z),
        one_over_radii_squared: DVec3::new(1.0 / (x * x), 1.0 / (y * y), 1.0 / (z * z)),
    }
}

impl Default for Ellipsoid {
    fn default() -> Self {
        Ellipsoid::WGS84
    }
}

impl Ellipsoid {
    pub const WGS84: Ellipsoid = from_radii(6378137.0, 6378137.0, 6356752.314245);
    pub const SCALED_WGS84: Ellipsoid = from_radii(1.0, 1.0, 6356752.314245 / 6378137.0);
    pub const UNIT_SPHERE: Ellipsoid = from_radii(1.0, 1.0, 1.0);

    pub fn new(x: f64, y: f64, z: f64) -> Result<Self, EllipsoidError> {
        // written as a negated comparison so NaN radii are rejected too
        if !(x > 0.0 && y > 0.0 && z > 0.0) || !(x.is_finite() && y.is_finite() && z.is_finite()) {
            return Err(EllipsoidError::NonPositiveRadius { x, y, z });
        }
        Ok(from_radii(x, y, z))
    }
    pub fn from_vec3(radii: DVec3) -> Result<Self, EllipsoidError> {
        Ellipsoid::new(radii.x, radii.y, radii.z)
    }
    pub fn radii(&self) -> DVec3 {
        self.radii
    }
    pub fn radii_squared(&self) -> DVec3 {
        self.radii_squared
    }
    pub fn radii_to_the_fourth(&self) -> DVec3 {
        self.radii_to_the_fourth
    }
    pub fn one_over_radii_squared(&self) -> DVec3 {
        self.one_over_radii_squared
    }
    pub fn maximum_radius(&self) -> f64 {
        self.radii.max_element()
    }
    pub fn minimum_radius(&self) -> f64 {
        self.radii.min_element()
    }
    /// Equatorial radius, the `R` of the Web-Mercator projection.
    pub fn semimajor_axis(&self) -> f64 {
        self.radii.x
    }

    pub fn transform_position_to_scaled_space(&self, position: DVec3) -> DVec3 {
        position / self.radii
    }

    pub fn geodetic_surface_normal<G: GeodeticCoordinate>(&self, geodetic: &G) -> DVec3 {
        let longitude = geodetic.rad_lon();
        let latitude = geodetic.rad_lat();
        let cos_latitude = latitude.cos();
        DVec3::new(
            cos_latitude * longitude.cos(),
            cos_latitude * longitude.sin(),
            latitude.sin(),
        )
        .normalize()
    }

    /// Surface normal at a Cartesian point, `None` at the center.
    pub fn geodetic_surface_normal_cartesian(&self, position: DVec3) -> Option<DVec3> {
        if position.abs_diff_eq(DVec3::ZERO, EPSILON12) {
            return None;
        }
        Some((position * self.one_over_radii_squared).normalize())
    }

    pub fn geodetic_to_cartesian<G: GeodeticCoordinate>(&self, geodetic: &G) -> DVec3 {
        let n = self.geodetic_surface_normal(geodetic);
        let k = self.radii_squared * n;
        let gamma = n.dot(k).sqrt();
        k / gamma + n * geodetic.height()
    }

    /// Moves `position` along the geodetic normal onto the surface with Newton's method.
    pub fn scale_to_geodetic_surface(&self, position: DVec3) -> SurfaceProjection {
        let inv = self.one_over_radii_squared;
        let squared = position * position;
        let squared_norm = (squared * inv).element_sum();
        let ratio = squared_norm.sqrt();
        if ratio == 0.0 || !ratio.is_finite() {
            return SurfaceProjection {
                position: DVec3::ZERO,
                iterations: 0,
                converged: false,
            };
        }
        let intersection = position / ratio;
        // near the center the geodetic normal is ill-conditioned, use the geocentric projection
        if squared_norm < EPSILON1 {
            return SurfaceProjection {
                position: intersection,
                iterations: 0,
                converged: true,
            };
        }

        let gradient = intersection * inv * 2.0;
        let mut lambda = (1.0 - ratio) * position.length() / (0.5 * gradient.length());
        let mut correction = 0.0;
        let mut multiplier = DVec3::ONE;
        let mut iterations = 0;
        let mut converged = false;

        while iterations < SCALE_TO_SURFACE_MAX_ITERATIONS {
            iterations += 1;
            lambda -= correction;
            multiplier = DVec3::ONE / (DVec3::ONE + inv * lambda);
            let multiplier2 = multiplier * multiplier;
            let multiplier3 = multiplier2 * multiplier;
            let func = (squared * multiplier2 * inv).element_sum() - 1.0;
            if func.abs() <= SCALE_TO_SURFACE_TOLERANCE {
                converged = true;
                break;
            }
            let derivative = -2.0 * (squared * multiplier3 * inv * inv).element_sum();
            correction = func / derivative;
        }

        if !converged {
            warn!(
                "scale_to_geodetic_surface did not converge after {} iterations for {:?}",
                iterations, position
            );
        }
        SurfaceProjection {
            position: position * multiplier,
            iterations,
            converged,
        }
    }

    /// Inverse of [`Ellipsoid::geodetic_to_cartesian`], `None` at the center.
    pub fn cartesian_to_geodetic(&self, position: DVec3) -> Option<Geodetic3> {
        let projection = self.scale_to_geodetic_surface(position);
        let p = projection.position;
        let n = self.geodetic_surface_normal_cartesian(p)?;
        let h = position - p;
        let longitude = n.y.atan2(n.x);
        let latitude = n.z.clamp(-1.0, 1.0).asin();
        let height = h.dot(position).signum() * h.length();
        Geodetic3::from_radians(longitude, latitude, height).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geodetic::{Geodetic2, Geodetic3};
    use crate::math::{equals_epsilon, EPSILON3, EPSILON7};

    #[test]
    fn wgs84_radii() {
        let ellipsoid = Ellipsoid::WGS84;
        assert_eq!(ellipsoid.radii(), DVec3::new(6378137.0, 6378137.0, 6356752.314245));
        assert_eq!(ellipsoid.maximum_radius(), 6378137.0);
        assert_eq!(ellipsoid.minimum_radius(), 6356752.314245);
        assert_eq!(
            ellipsoid.one_over_radii_squared().x,
            1.0 / (6378137.0 * 6378137.0)
        );
    }

    #[test]
    fn rejects_non_positive_radii() {
        assert!(Ellipsoid::new(1.0, 0.0, 1.0).is_err());
        assert!(Ellipsoid::new(-1.0, 1.0, 1.0).is_err());
        assert!(Ellipsoid::new(f64::NAN, 1.0, 1.0).is_err());
        assert_eq!(Ellipsoid::new(1.0, 1.0, 1.0), Ok(Ellipsoid::UNIT_SPHERE));
    }

    #[test]
    fn geodetic_to_cartesian_with_height() {
        let geo = Geodetic3::new(45.0, 45.0, 10000.0).unwrap();
        let cartesian = Ellipsoid::WGS84.geodetic_to_cartesian(&geo);
        assert!(equals_epsilon(cartesian.x, 3199419.14506062, None, Some(EPSILON3)));
        assert!(equals_epsilon(cartesian.y, 3199419.14506062, None, Some(EPSILON3)));
        assert!(equals_epsilon(cartesian.z, 4494419.476, None, Some(EPSILON3)));
    }

    #[test]
    fn scale_to_surface_round_trip() {
        let ellipsoids = [
            Ellipsoid::WGS84,
            Ellipsoid::SCALED_WGS84,
            Ellipsoid::UNIT_SPHERE,
            Ellipsoid::new(3.0, 2.0, 1.0).unwrap(),
        ];
        for ellipsoid in ellipsoids {
            for (lon, lat) in [(0.0, 0.0), (45.0, 45.0), (-120.0, 10.0), (170.0, -60.0)] {
                let surface = ellipsoid.geodetic_to_cartesian(&Geodetic2::new(lon, lat).unwrap());
                for scale in [1.0, 1.5, 0.8] {
                    let projection = ellipsoid.scale_to_geodetic_surface(surface * scale);
                    assert!(projection.converged);
                    let error = (projection.position - surface).length() / ellipsoid.maximum_radius();
                    assert!(error < 1e-6, "{lon} {lat} {scale}: {error}");
                }
            }
        }
    }

    #[test]
    fn scale_to_surface_of_center() {
        let projection = Ellipsoid::WGS84.scale_to_geodetic_surface(DVec3::ZERO);
        assert!(!projection.converged);
        assert_eq!(projection.position, DVec3::ZERO);
        assert_eq!(Ellipsoid::WGS84.cartesian_to_geodetic(DVec3::ZERO), None);
    }

    #[test]
    fn scale_to_surface_far_away_is_bounded() {
        let projection = Ellipsoid::WGS84.scale_to_geodetic_surface(DVec3::new(2.5e7, 1e6, 3e6));
        assert!(projection.iterations <= 64);
        assert!(projection.converged);
    }

    #[test]
    fn cartesian_to_geodetic_round_trip() {
        let ellipsoid = Ellipsoid::WGS84;
        let original = Geodetic3::new(-45.0, 15.0, 330000.0).unwrap();
        let cartesian = ellipsoid.geodetic_to_cartesian(&original);
        let geodetic = ellipsoid.cartesian_to_geodetic(cartesian).unwrap();
        assert!(equals_epsilon(geodetic.longitude(), -45.0, None, Some(EPSILON7)));
        assert!(equals_epsilon(geodetic.latitude(), 15.0, None, Some(EPSILON7)));
        assert!(equals_epsilon(geodetic.height(), 330000.0, None, Some(EPSILON3)));
    }

    #[test]
    fn cartesian_to_geodetic_below_surface() {
        let ellipsoid = Ellipsoid::WGS84;
        let original = Geodetic3::new(10.0, -20.0, -1000.0).unwrap();
        let geodetic = ellipsoid
            .cartesian_to_geodetic(ellipsoid.geodetic_to_cartesian(&original))
            .unwrap();
        assert!(equals_epsilon(geodetic.height(), -1000.0, None, Some(EPSILON3)));
    }

    #[test]
    fn scaled_space() {
        let scaled = Ellipsoid::WGS84.transform_position_to_scaled_space(DVec3::new(
            6378137.0, 0.0, 6356752.314245,
        ));
        assert!(scaled.abs_diff_eq(DVec3::new(1.0, 0.0, 1.0), 1e-15));
    }
}
