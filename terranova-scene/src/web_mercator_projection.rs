use std::f64::consts::{FRAC_PI_2, PI};

use bevy::math::DVec2;

use crate::{
    ellipsoid::Ellipsoid,
    geodetic::{Geodetic2, GeodeticCoordinate},
    math::{normalize_longitude_degrees, EPSILON12},
};

#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq)]
pub enum ProjectionError {
    #[error("latitude {latitude} is a Web-Mercator singularity")]
    PoleSingularity { latitude: f64 },
}

pub fn mercator_angle_to_geodetic_latitude(mercator_angle: f64) -> f64 {
    2.0 * mercator_angle.exp().atan() - FRAC_PI_2
}

pub fn geodetic_latitude_to_mercator_angle(latitude: f64) -> f64 {
    let sin_latitude = latitude.sin();
    0.5 * ((1.0 + sin_latitude) / (1.0 - sin_latitude)).ln()
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WebMercatorProjection {
    semimajor_axis: f64,
    one_over_semimajor_axis: f64,
}

impl Default for WebMercatorProjection {
    fn default() -> Self {
        WebMercatorProjection::new(&Ellipsoid::WGS84)
    }
}

impl WebMercatorProjection {
    /// Latitude in radians at which the projected extent becomes square.
    pub const MAXIMUM_LATITUDE: f64 = 1.4844222297453322;

    pub fn new(ellipsoid: &Ellipsoid) -> Self {
        let semimajor_axis = ellipsoid.semimajor_axis();
        Self {
            semimajor_axis,
            one_over_semimajor_axis: 1.0 / semimajor_axis,
        }
    }
    pub fn semimajor_axis(&self) -> f64 {
        self.semimajor_axis
    }
    /// Half the side of the square Mercator extent, `πR`.
    pub fn half_extent(&self) -> f64 {
        PI * self.semimajor_axis
    }

    pub fn project<G: GeodeticCoordinate>(&self, geodetic: &G) -> Result<DVec2, ProjectionError> {
        let latitude = geodetic.rad_lat();
        if latitude.abs() >= FRAC_PI_2 - EPSILON12 {
            return Err(ProjectionError::PoleSingularity {
                latitude: latitude.to_degrees(),
            });
        }
        Ok(DVec2::new(
            geodetic.rad_lon() * self.semimajor_axis,
            geodetic_latitude_to_mercator_angle(latitude) * self.semimajor_axis,
        ))
    }

    /// Like [`WebMercatorProjection::project`] but clamps latitude to
    /// [`WebMercatorProjection::MAXIMUM_LATITUDE`] first, so it never fails.
    pub fn project_clamped<G: GeodeticCoordinate>(&self, geodetic: &G) -> DVec2 {
        let latitude = geodetic
            .rad_lat()
            .clamp(-Self::MAXIMUM_LATITUDE, Self::MAXIMUM_LATITUDE);
        DVec2::new(
            geodetic.rad_lon() * self.semimajor_axis,
            geodetic_latitude_to_mercator_angle(latitude) * self.semimajor_axis,
        )
    }

    pub fn unproject(&self, point: DVec2) -> Geodetic2 {
        let longitude = normalize_longitude_degrees(
            (point.x * self.one_over_semimajor_axis).to_degrees(),
        );
        let latitude = mercator_angle_to_geodetic_latitude(point.y * self.one_over_semimajor_axis)
            .to_degrees()
            .clamp(-90.0, 90.0);
        // both components are range-checked above
        Geodetic2::new(longitude, latitude).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geodetic::Geodetic3;
    use crate::math::{equals_epsilon, EPSILON10, EPSILON3};

    #[test]
    fn project_known_point() {
        let projection = WebMercatorProjection::default();
        let point = projection.project(&Geodetic2::new(45.0, 45.0).unwrap()).unwrap();
        assert!(equals_epsilon(point.x, 5009377.085697311, None, Some(EPSILON3)));
        assert!(equals_epsilon(point.y, 5621521.486192066, None, Some(EPSILON3)));
    }

    #[test]
    fn round_trip_away_from_poles() {
        let projection = WebMercatorProjection::default();
        let mut lat = -88.5;
        while lat < 89.0 {
            let mut lon = -175.0;
            while lon < 180.0 {
                let geodetic = Geodetic2::new(lon, lat).unwrap();
                let back = projection.unproject(projection.project(&geodetic).unwrap());
                assert!(equals_epsilon(back.longitude(), lon, None, Some(EPSILON10)));
                assert!(equals_epsilon(back.latitude(), lat, None, Some(EPSILON10)));
                lon += 17.5;
            }
            lat += 7.375;
        }
    }

    #[test]
    fn poles_are_rejected() {
        let projection = WebMercatorProjection::default();
        assert!(matches!(
            projection.project(&Geodetic3::new(0.0, 90.0, 0.0).unwrap()),
            Err(ProjectionError::PoleSingularity { latitude }) if latitude > 89.9
        ));
        assert!(projection
            .project(&Geodetic2::new(10.0, -90.0).unwrap())
            .is_err());
    }

    #[test]
    fn maximum_latitude_maps_to_square_extent() {
        let projection = WebMercatorProjection::default();
        let pole = projection.project_clamped(&Geodetic2::new(0.0, 90.0).unwrap());
        assert!(equals_epsilon(pole.y, projection.half_extent(), None, Some(EPSILON3)));
    }

    #[test]
    fn unproject_wraps_longitude() {
        let projection = WebMercatorProjection::default();
        let geodetic = projection.unproject(DVec2::new(projection.half_extent() * 1.5, 0.0));
        assert!(equals_epsilon(geodetic.longitude(), -90.0, None, Some(EPSILON10)));
    }
}
