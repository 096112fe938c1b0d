use bevy::math::{DMat4, DVec3};
use terranova_scene::{Ellipsoid, EllipsoidalOccluder};

/// Drawing surface size in physical pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Canvas {
    pub width: u32,
    pub height: u32,
}

impl Default for Canvas {
    fn default() -> Self {
        Self {
            width: 1024,
            height: 768,
        }
    }
}

/// What the tile selection needs to know about the viewer.
pub trait GlobeCamera {
    fn world_position(&self) -> DVec3;
    fn cartesian_to_ndc(&self, position: DVec3) -> DVec3;
    fn is_point_visible(&self, position: DVec3, ndc: DVec3) -> bool;
    /// Level of detail for the camera's current height above the surface.
    fn level(&self) -> u32;
}

const LEVEL_HEIGHTS: [(f64, u32); 17] = [
    (100.0, 19),
    (300.0, 18),
    (660.0, 17),
    (1300.0, 16),
    (2600.0, 15),
    (6400.0, 14),
    (13200.0, 13),
    (26000.0, 12),
    (67985.0, 11),
    (139780.0, 10),
    (250600.0, 9),
    (380000.0, 8),
    (640000.0, 7),
    (1280000.0, 6),
    (2600000.0, 5),
    (6100000.0, 4),
    (11900000.0, 3),
];

pub fn level_for_height(height: f64) -> u32 {
    LEVEL_HEIGHTS
        .iter()
        .find(|(threshold, _)| height <= *threshold)
        .map(|(_, level)| *level)
        .unwrap_or(2)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PerspectiveFrustum {
    /// Vertical field of view in radians.
    pub fov_y: f64,
    pub aspect_ratio: f64,
    pub near: f64,
    pub far: f64,
}

impl Default for PerspectiveFrustum {
    fn default() -> Self {
        Self {
            fov_y: std::f64::consts::FRAC_PI_4,
            aspect_ratio: 1.0,
            near: 1.0,
            far: 1.0e9,
        }
    }
}

impl PerspectiveFrustum {
    pub fn projection_matrix(&self) -> DMat4 {
        DMat4::perspective_rh(self.fov_y, self.aspect_ratio, self.near, self.far)
    }
}

/// Camera on an ellipsoid with a right-handed view and a `[0, 1]` depth range.
#[derive(Debug, Clone)]
pub struct PerspectiveCamera {
    position: DVec3,
    view_projection: DMat4,
    ellipsoid: Ellipsoid,
    occluder: EllipsoidalOccluder,
}

impl PerspectiveCamera {
    pub fn look_at(
        eye: DVec3,
        target: DVec3,
        up: DVec3,
        frustum: PerspectiveFrustum,
        ellipsoid: &Ellipsoid,
    ) -> Self {
        let view = DMat4::look_at_rh(eye, target, up);
        Self::from_matrices(eye, view, frustum.projection_matrix(), ellipsoid)
    }

    pub fn from_matrices(
        position: DVec3,
        view: DMat4,
        projection: DMat4,
        ellipsoid: &Ellipsoid,
    ) -> Self {
        Self {
            position,
            view_projection: projection * view,
            ellipsoid: *ellipsoid,
            occluder: EllipsoidalOccluder::new(ellipsoid, position),
        }
    }

    pub fn view_projection(&self) -> DMat4 {
        self.view_projection
    }

    pub fn height_above_surface(&self) -> f64 {
        let surface = self.ellipsoid.scale_to_geodetic_surface(self.position);
        (self.position - surface.position).length()
    }
}

impl GlobeCamera for PerspectiveCamera {
    fn world_position(&self) -> DVec3 {
        self.position
    }

    fn cartesian_to_ndc(&self, position: DVec3) -> DVec3 {
        let clip = self.view_projection * position.extend(1.0);
        clip.truncate() / clip.w
    }

    fn is_point_visible(&self, position: DVec3, ndc: DVec3) -> bool {
        let clip_w = self.view_projection.row(3).dot(position.extend(1.0));
        clip_w > 0.0
            && ndc.x.abs() <= 1.0
            && ndc.y.abs() <= 1.0
            && (0.0..=1.0).contains(&ndc.z)
            && self.occluder.is_point_visible(position)
    }

    fn level(&self) -> u32 {
        level_for_height(self.height_above_surface())
    }
}
