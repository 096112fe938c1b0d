use bevy::math::{DVec2, DVec3};
use serde::{Deserialize, Serialize};

use crate::{
    ellipsoid::Ellipsoid,
    math::EPSILON9,
    web_mercator_projection::{ProjectionError, WebMercatorProjection},
};

#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq)]
pub enum GeodeticError {
    #[error("longitude {0} is outside [-180, 180] degrees")]
    LongitudeOutOfRange(f64),
    #[error("latitude {0} is outside [-90, 90] degrees")]
    LatitudeOutOfRange(f64),
    #[error("geodetic coordinate is not finite")]
    NotFinite,
}

/// Anything that can be placed on the ellipsoid by longitude, latitude and height.
pub trait GeodeticCoordinate {
    fn rad_lon(&self) -> f64;
    fn rad_lat(&self) -> f64;
    fn height(&self) -> f64 {
        0.0
    }
}

fn check_longitude(value: f64) -> Result<f64, GeodeticError> {
    if !value.is_finite() {
        return Err(GeodeticError::NotFinite);
    }
    if value < -180.0 - EPSILON9 || value > 180.0 + EPSILON9 {
        return Err(GeodeticError::LongitudeOutOfRange(value));
    }
    Ok(value.clamp(-180.0, 180.0))
}

fn check_latitude(value: f64) -> Result<f64, GeodeticError> {
    if !value.is_finite() {
        return Err(GeodeticError::NotFinite);
    }
    if value < -90.0 - EPSILON9 || value > 90.0 + EPSILON9 {
        return Err(GeodeticError::LatitudeOutOfRange(value));
    }
    Ok(value.clamp(-90.0, 90.0))
}

/// Longitude and latitude in degrees.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawGeodetic2")]
pub struct Geodetic2 {
    longitude: f64,
    latitude: f64,
}

#[derive(Deserialize)]
struct RawGeodetic2 {
    longitude: f64,
    latitude: f64,
}

impl TryFrom<RawGeodetic2> for Geodetic2 {
    type Error = GeodeticError;

    fn try_from(raw: RawGeodetic2) -> Result<Self, Self::Error> {
        Geodetic2::new(raw.longitude, raw.latitude)
    }
}

impl Geodetic2 {
    pub fn new(longitude: f64, latitude: f64) -> Result<Self, GeodeticError> {
        Ok(Self {
            longitude: check_longitude(longitude)?,
            latitude: check_latitude(latitude)?,
        })
    }
    pub fn from_radians(rad_lon: f64, rad_lat: f64) -> Result<Self, GeodeticError> {
        Self::new(rad_lon.to_degrees(), rad_lat.to_degrees())
    }
    pub fn longitude(&self) -> f64 {
        self.longitude
    }
    pub fn latitude(&self) -> f64 {
        self.latitude
    }
    pub fn set_longitude(&mut self, value: f64) -> Result<(), GeodeticError> {
        self.longitude = check_longitude(value)?;
        Ok(())
    }
    pub fn set_latitude(&mut self, value: f64) -> Result<(), GeodeticError> {
        self.latitude = check_latitude(value)?;
        Ok(())
    }
    pub fn to_mercator(&self, projection: &WebMercatorProjection) -> Result<DVec2, ProjectionError> {
        projection.project(self)
    }
    pub fn to_cartesian(&self, ellipsoid: &Ellipsoid) -> DVec3 {
        ellipsoid.geodetic_to_cartesian(self)
    }
}

impl GeodeticCoordinate for Geodetic2 {
    fn rad_lon(&self) -> f64 {
        self.longitude.to_radians()
    }
    fn rad_lat(&self) -> f64 {
        self.latitude.to_radians()
    }
}

/// Longitude and latitude in degrees plus a height in meters above the ellipsoid.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawGeodetic3")]
pub struct Geodetic3 {
    longitude: f64,
    latitude: f64,
    height: f64,
}

#[derive(Deserialize)]
struct RawGeodetic3 {
    longitude: f64,
    latitude: f64,
    #[serde(default)]
    height: f64,
}

impl TryFrom<RawGeodetic3> for Geodetic3 {
    type Error = GeodeticError;

    fn try_from(raw: RawGeodetic3) -> Result<Self, Self::Error> {
        Geodetic3::new(raw.longitude, raw.latitude, raw.height)
    }
}

impl Geodetic3 {
    pub fn new(longitude: f64, latitude: f64, height: f64) -> Result<Self, GeodeticError> {
        if !height.is_finite() {
            return Err(GeodeticError::NotFinite);
        }
        Ok(Self {
            longitude: check_longitude(longitude)?,
            latitude: check_latitude(latitude)?,
            height,
        })
    }
    pub fn from_radians(rad_lon: f64, rad_lat: f64, height: f64) -> Result<Self, GeodeticError> {
        Self::new(rad_lon.to_degrees(), rad_lat.to_degrees(), height)
    }
    pub fn longitude(&self) -> f64 {
        self.longitude
    }
    pub fn latitude(&self) -> f64 {
        self.latitude
    }
    pub fn set_longitude(&mut self, value: f64) -> Result<(), GeodeticError> {
        self.longitude = check_longitude(value)?;
        Ok(())
    }
    pub fn set_latitude(&mut self, value: f64) -> Result<(), GeodeticError> {
        self.latitude = check_latitude(value)?;
        Ok(())
    }
    pub fn set_height(&mut self, value: f64) -> Result<(), GeodeticError> {
        if !value.is_finite() {
            return Err(GeodeticError::NotFinite);
        }
        self.height = value;
        Ok(())
    }
    pub fn to_geodetic2(&self) -> Geodetic2 {
        Geodetic2 {
            longitude: self.longitude,
            latitude: self.latitude,
        }
    }
    pub fn to_mercator(&self, projection: &WebMercatorProjection) -> Result<DVec2, ProjectionError> {
        projection.project(self)
    }
    pub fn to_cartesian(&self, ellipsoid: &Ellipsoid) -> DVec3 {
        ellipsoid.geodetic_to_cartesian(self)
    }
}

impl GeodeticCoordinate for Geodetic3 {
    fn rad_lon(&self) -> f64 {
        self.longitude.to_radians()
    }
    fn rad_lat(&self) -> f64 {
        self.latitude.to_radians()
    }
    fn height(&self) -> f64 {
        self.height
    }
}

impl From<Geodetic2> for Geodetic3 {
    fn from(value: Geodetic2) -> Self {
        Geodetic3 {
            longitude: value.longitude,
            latitude: value.latitude,
            height: 0.0,
        }
    }
}
