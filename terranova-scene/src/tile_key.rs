use std::fmt;

use bevy::math::DVec2;
use serde::{Deserialize, Serialize};

use crate::{
    ellipsoid::Ellipsoid,
    rectangle::{GeodeticRectangle, MercatorRectangle},
    web_mercator_projection::{mercator_angle_to_geodetic_latitude, WebMercatorProjection},
};

#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TileKeyError {
    #[error("tile {level}/{row}/{col} is outside the {level} level grid")]
    OutOfRange { level: u32, row: u32, col: u32 },
    #[error("level {0} is deeper than the supported {}", TileKey::MAX_LEVEL)]
    LevelTooDeep(u32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Left,
    Right,
    Top,
    Bottom,
}

/// Quadtree address of a Web-Mercator tile. `col` runs west to east and
/// `row` north to south.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "RawTileKey")]
pub struct TileKey {
    pub level: u32,
    pub row: u32,
    pub col: u32,
}

#[derive(Deserialize)]
struct RawTileKey {
    level: u32,
    row: u32,
    col: u32,
}

impl TryFrom<RawTileKey> for TileKey {
    type Error = TileKeyError;

    fn try_from(raw: RawTileKey) -> Result<Self, Self::Error> {
        TileKey::new(raw.level, raw.row, raw.col)
    }
}

impl fmt::Display for TileKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}_{}", self.level, self.row, self.col)
    }
}

pub fn tiles_at_level(level: u32) -> u32 {
    1 << level.min(TileKey::MAX_LEVEL)
}

impl TileKey {
    pub const MAX_LEVEL: u32 = 30;

    pub fn new(level: u32, row: u32, col: u32) -> Result<Self, TileKeyError> {
        if level > Self::MAX_LEVEL {
            return Err(TileKeyError::LevelTooDeep(level));
        }
        let count = tiles_at_level(level);
        if row >= count || col >= count {
            return Err(TileKeyError::OutOfRange { level, row, col });
        }
        Ok(Self { level, row, col })
    }

    /// Tile containing a Mercator point. Points on or past the edge of the
    /// extent land in the edge tile.
    pub fn from_mercator(
        point: DVec2,
        level: u32,
        ellipsoid: &Ellipsoid,
    ) -> Result<Self, TileKeyError> {
        if level > Self::MAX_LEVEL {
            return Err(TileKeyError::LevelTooDeep(level));
        }
        let half_extent = WebMercatorProjection::new(ellipsoid).half_extent();
        let count = tiles_at_level(level);
        let size = 2.0 * half_extent / f64::from(count);
        let last = f64::from(count - 1);
        let col = ((point.x + half_extent) / size).floor().clamp(0.0, last);
        let row = ((half_extent - point.y) / size).floor().clamp(0.0, last);
        // NaN saturates to 0 on the cast
        Self::new(level, row as u32, col as u32)
    }

    pub fn mercator_rectangle(&self, ellipsoid: &Ellipsoid) -> MercatorRectangle {
        let half_extent = WebMercatorProjection::new(ellipsoid).half_extent();
        let size = 2.0 * half_extent / f64::from(tiles_at_level(self.level));
        let min_x = -half_extent + f64::from(self.col) * size;
        let max_y = half_extent - f64::from(self.row) * size;
        MercatorRectangle::new(
            DVec2::new(min_x, max_y - size),
            DVec2::new(min_x + size, max_y),
        )
    }

    pub fn geodetic_rectangle(&self) -> GeodeticRectangle {
        let count = f64::from(tiles_at_level(self.level));
        let width = 360.0 / count;
        let latitude_at = |row: f64| {
            let angle = std::f64::consts::PI * (1.0 - 2.0 * row / count);
            mercator_angle_to_geodetic_latitude(angle).to_degrees()
        };
        GeodeticRectangle {
            west: -180.0 + f64::from(self.col) * width,
            east: -180.0 + f64::from(self.col + 1) * width,
            north: latitude_at(f64::from(self.row)),
            south: latitude_at(f64::from(self.row + 1)),
        }
    }

    /// Adjacent tile, wrapping around on both axes.
    pub fn sibling(&self, direction: Direction) -> TileKey {
        let count = tiles_at_level(self.level);
        let mut key = *self;
        match direction {
            Direction::Left => key.col = (self.col + count - 1) % count,
            Direction::Right => key.col = (self.col + 1) % count,
            Direction::Top => key.row = (self.row + count - 1) % count,
            Direction::Bottom => key.row = (self.row + 1) % count,
        }
        key
    }

    /// Adjacent tile wrapping only in longitude; `None` past a pole.
    pub fn neighbor(&self, direction: Direction) -> Option<TileKey> {
        let count = tiles_at_level(self.level);
        match direction {
            Direction::Left | Direction::Right => Some(self.sibling(direction)),
            Direction::Top => self.row.checked_sub(1).map(|row| TileKey { row, ..*self }),
            Direction::Bottom => {
                let row = self.row + 1;
                (row < count).then_some(TileKey { row, ..*self })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::f64::consts::PI;

    use super::*;
    use crate::math::{equals_epsilon, EPSILON3, EPSILON9};

    #[test]
    fn new_validates_range() {
        assert!(TileKey::new(0, 0, 0).is_ok());
        assert_eq!(
            TileKey::new(1, 2, 0),
            Err(TileKeyError::OutOfRange { level: 1, row: 2, col: 0 })
        );
        assert_eq!(TileKey::new(31, 0, 0), Err(TileKeyError::LevelTooDeep(31)));
    }

    #[test]
    fn level_one_rectangle() {
        let r = WebMercatorProjection::default().half_extent();
        let rect = TileKey::new(1, 0, 0).unwrap().mercator_rectangle(&Ellipsoid::WGS84);
        assert!(equals_epsilon(rect.min.x, -PI * 6378137.0, None, Some(EPSILON9)));
        assert!(equals_epsilon(rect.min.y, 0.0, None, Some(EPSILON9)));
        assert!(equals_epsilon(rect.max.x, 0.0, None, Some(EPSILON9)));
        assert!(equals_epsilon(rect.max.y, r, None, Some(EPSILON9)));
    }

    #[test]
    fn rectangles_tile_the_extent() {
        let ellipsoid = Ellipsoid::WGS84;
        let half_extent = WebMercatorProjection::new(&ellipsoid).half_extent();
        let full = 4.0 * half_extent * half_extent;
        for level in 0..5 {
            let count = tiles_at_level(level);
            let mut area = 0.0;
            for row in 0..count {
                for col in 0..count {
                    let rect = TileKey::new(level, row, col)
                        .unwrap()
                        .mercator_rectangle(&ellipsoid);
                    area += rect.area();
                    if col + 1 < count {
                        let right = TileKey::new(level, row, col + 1)
                            .unwrap()
                            .mercator_rectangle(&ellipsoid);
                        assert!(equals_epsilon(rect.max.x, right.min.x, None, Some(EPSILON3)));
                    }
                }
            }
            assert!(equals_epsilon(area, full, Some(1e-12), None), "level {level}");
        }
    }

    #[test]
    fn sibling_wraps_columns() {
        let key = TileKey::new(1, 0, 0).unwrap();
        assert_eq!(key.sibling(Direction::Left).col, 1);
        for level in 0..8 {
            let key = TileKey::new(level, 0, 0).unwrap();
            assert_eq!(key.sibling(Direction::Left).col, tiles_at_level(level) - 1);
        }
        let key = TileKey::new(3, 4, 7).unwrap();
        assert_eq!(key.sibling(Direction::Right), TileKey::new(3, 4, 0).unwrap());
        assert_eq!(key.sibling(Direction::Top), TileKey::new(3, 3, 7).unwrap());
        assert_eq!(key.sibling(Direction::Bottom), TileKey::new(3, 5, 7).unwrap());
    }

    #[test]
    fn neighbor_stops_at_poles() {
        let top = TileKey::new(2, 0, 1).unwrap();
        assert_eq!(top.neighbor(Direction::Top), None);
        assert_eq!(top.neighbor(Direction::Bottom), TileKey::new(2, 1, 1).ok());
        let bottom = TileKey::new(2, 3, 0).unwrap();
        assert_eq!(bottom.neighbor(Direction::Bottom), None);
        assert_eq!(bottom.neighbor(Direction::Left), TileKey::new(2, 3, 3).ok());
    }

    #[test]
    fn from_mercator_finds_and_clamps() {
        let ellipsoid = Ellipsoid::WGS84;
        let half_extent = WebMercatorProjection::new(&ellipsoid).half_extent();
        let key = TileKey::from_mercator(DVec2::new(1.0, 1.0), 2, &ellipsoid).unwrap();
        assert_eq!(key, TileKey::new(2, 1, 2).unwrap());
        let edge =
            TileKey::from_mercator(DVec2::new(half_extent * 2.0, -half_extent * 3.0), 3, &ellipsoid)
                .unwrap();
        assert_eq!(edge, TileKey::new(3, 7, 7).unwrap());
        let corner = TileKey::from_mercator(DVec2::new(-half_extent, half_extent), 4, &ellipsoid)
            .unwrap();
        assert_eq!(corner, TileKey::new(4, 0, 0).unwrap());
    }

    #[test]
    fn geodetic_rectangle_of_level_one() {
        let rect = TileKey::new(1, 1, 1).unwrap().geodetic_rectangle();
        assert!(equals_epsilon(rect.west, 0.0, None, Some(EPSILON9)));
        assert!(equals_epsilon(rect.east, 180.0, None, Some(EPSILON9)));
        assert!(equals_epsilon(rect.north, 0.0, None, Some(EPSILON9)));
        assert!(equals_epsilon(rect.south, -85.0511287798, None, Some(EPSILON3)));
    }

    #[test]
    fn display_and_serde() {
        let key = TileKey::new(5, 10, 20).unwrap();
        assert_eq!(key.to_string(), "5_10_20");
        let json = serde_json::to_string(&key).unwrap();
        let back: TileKey = serde_json::from_str(&json).unwrap();
        assert_eq!(back, key);
        let bad: Result<TileKey, _> = serde_json::from_str(r#"{"level":1,"row":3,"col":0}"#);
        assert!(bad.is_err());
    }
}
