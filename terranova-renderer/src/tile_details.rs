use bevy::math::DVec3;
use terranova_scene::{Ellipsoid, Geodetic2, GeodeticRectangle, TileKey};

use crate::camera::{Canvas, GlobeCamera};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CornerInfo {
    pub geodetic: Geodetic2,
    pub world_position: DVec3,
    pub ndc_position: DVec3,
    pub visible: bool,
}

impl CornerInfo {
    fn new<C: GlobeCamera + ?Sized>(camera: &C, ellipsoid: &Ellipsoid, geodetic: Geodetic2) -> Self {
        let world_position = ellipsoid.geodetic_to_cartesian(&geodetic);
        let ndc_position = camera.cartesian_to_ndc(world_position);
        Self {
            geodetic,
            world_position,
            ndc_position,
            visible: camera.is_point_visible(world_position, ndc_position),
        }
    }
}

fn ndc_distance(a: &CornerInfo, b: &CornerInfo) -> f64 {
    a.ndc_position.truncate().distance(b.ndc_position.truncate())
}

/// Screen-space footprint of a tile for one camera state. Cheap to build and
/// never cached.
#[derive(Debug, Clone, PartialEq)]
pub struct TileDetails {
    pub rectangle: GeodeticRectangle,
    pub left_top: CornerInfo,
    pub left_bottom: CornerInfo,
    pub right_top: CornerInfo,
    pub right_bottom: CornerInfo,
    pub visible_count: u32,
    pub is_clock_wise: bool,
    /// Estimated pixels, floored.
    pub width: f64,
    pub height: f64,
    pub area: f64,
}

impl TileDetails {
    pub fn new<C: GlobeCamera + ?Sized>(
        camera: &C,
        canvas: Canvas,
        key: &TileKey,
        ellipsoid: &Ellipsoid,
    ) -> Self {
        let rectangle = key.geodetic_rectangle();
        let left_top = CornerInfo::new(camera, ellipsoid, rectangle.north_west());
        let left_bottom = CornerInfo::new(camera, ellipsoid, rectangle.south_west());
        let right_top = CornerInfo::new(camera, ellipsoid, rectangle.north_east());
        let right_bottom = CornerInfo::new(camera, ellipsoid, rectangle.south_east());

        let visible_count = [&left_top, &left_bottom, &right_top, &right_bottom]
            .iter()
            .filter(|corner| corner.visible)
            .count() as u32;

        let bottom_edge = right_bottom.ndc_position - left_bottom.ndc_position;
        let left_edge = left_top.ndc_position - left_bottom.ndc_position;
        let is_clock_wise = bottom_edge.cross(left_edge).z > 0.0;

        let canvas_width = f64::from(canvas.width);
        let canvas_height = f64::from(canvas.height);
        let top_width = ndc_distance(&left_top, &right_top) * canvas_width / 2.0;
        let bottom_width = ndc_distance(&left_bottom, &right_bottom) * canvas_width / 2.0;
        let width = ((top_width + bottom_width) / 2.0).floor();
        let left_height = ndc_distance(&left_bottom, &left_top) * canvas_height / 2.0;
        let right_height = ndc_distance(&right_bottom, &right_top) * canvas_height / 2.0;
        let height = ((left_height + right_height) / 2.0).floor();

        Self {
            rectangle,
            left_top,
            left_bottom,
            right_top,
            right_bottom,
            visible_count,
            is_clock_wise,
            width,
            height,
            area: width * height,
        }
    }

    /// At least one corner on screen and a footprint of `area_threshold`
    /// square pixels or more.
    pub fn is_visible(&self, area_threshold: f64) -> bool {
        self.area >= area_threshold && self.visible_count >= 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::{PerspectiveCamera, PerspectiveFrustum};

    fn camera() -> PerspectiveCamera {
        PerspectiveCamera::look_at(
            DVec3::new(2.5e7, 0.0, 0.0),
            DVec3::ZERO,
            DVec3::Z,
            PerspectiveFrustum {
                aspect_ratio: 1024.0 / 768.0,
                ..Default::default()
            },
            &Ellipsoid::WGS84,
        )
    }

    #[test]
    fn tile_under_camera_is_visible() {
        let details = TileDetails::new(
            &camera(),
            Canvas::default(),
            &TileKey::new(2, 2, 2).unwrap(),
            &Ellipsoid::WGS84,
        );
        assert!(details.left_top.visible);
        assert!(details.visible_count >= 1);
        assert!(details.width > 0.0 && details.height > 0.0);
        assert_eq!(details.area, details.width * details.height);
        assert!(details.is_visible(500.0));
        assert!(details.is_clock_wise);
    }

    #[test]
    fn far_side_tile_is_not_visible() {
        let details = TileDetails::new(
            &camera(),
            Canvas::default(),
            &TileKey::new(2, 2, 0).unwrap(),
            &Ellipsoid::WGS84,
        );
        assert_eq!(details.visible_count, 0);
        assert!(!details.is_visible(500.0));
    }

    #[test]
    fn tiny_tiles_fail_the_area_threshold() {
        let details = TileDetails::new(
            &camera(),
            Canvas::default(),
            &TileKey::new(12, 2048, 2048).unwrap(),
            &Ellipsoid::WGS84,
        );
        assert!(details.visible_count >= 1);
        assert!(details.area < 500.0);
        assert!(!details.is_visible(500.0));
    }
}
