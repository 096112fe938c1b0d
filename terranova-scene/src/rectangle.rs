use bevy::math::DVec2;
use serde::{Deserialize, Serialize};

use crate::geodetic::Geodetic2;

/// Axis-aligned rectangle in Web-Mercator meters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MercatorRectangle {
    pub min: DVec2,
    pub max: DVec2,
}

impl MercatorRectangle {
    pub fn new(min: DVec2, max: DVec2) -> Self {
        Self { min, max }
    }
    pub fn width(&self) -> f64 {
        self.max.x - self.min.x
    }
    pub fn height(&self) -> f64 {
        self.max.y - self.min.y
    }
    pub fn area(&self) -> f64 {
        self.width() * self.height()
    }
    pub fn center(&self) -> DVec2 {
        (self.min + self.max) * 0.5
    }
    pub fn contains(&self, point: DVec2) -> bool {
        point.x >= self.min.x && point.x <= self.max.x && point.y >= self.min.y && point.y <= self.max.y
    }
    /// Point at `(u, v)` where `u` runs west to east and `v` south to north.
    pub fn lerp(&self, u: f64, v: f64) -> DVec2 {
        DVec2::new(
            self.min.x + self.width() * u,
            self.min.y + self.height() * v,
        )
    }
}

/// Longitude/latitude extent in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeodeticRectangle {
    pub west: f64,
    pub south: f64,
    pub east: f64,
    pub north: f64,
}

impl GeodeticRectangle {
    pub fn width(&self) -> f64 {
        self.east - self.west
    }
    pub fn height(&self) -> f64 {
        self.north - self.south
    }
    pub fn north_west(&self) -> Geodetic2 {
        corner(self.west, self.north)
    }
    pub fn south_west(&self) -> Geodetic2 {
        corner(self.west, self.south)
    }
    pub fn north_east(&self) -> Geodetic2 {
        corner(self.east, self.north)
    }
    pub fn south_east(&self) -> Geodetic2 {
        corner(self.east, self.south)
    }
    pub fn center(&self) -> Geodetic2 {
        corner((self.west + self.east) * 0.5, (self.south + self.north) * 0.5)
    }
}

// Rectangles are built from unprojected Mercator points, so corners are in range.
fn corner(longitude: f64, latitude: f64) -> Geodetic2 {
    Geodetic2::new(longitude, latitude).unwrap_or_default()
}
