use bevy::math::DVec3;

use crate::ellipsoid::Ellipsoid;

/// Horizon culling against an ellipsoid, see
/// https://cesium.com/blog/2013/04/25/Horizon-culling/
#[derive(Debug, Clone, Copy)]
pub struct EllipsoidalOccluder {
    ellipsoid: Ellipsoid,
    camera_position: DVec3,
    camera_position_in_scaled_space: DVec3,
    distance_to_limb_in_scaled_space_squared: f64,
}

impl EllipsoidalOccluder {
    pub fn new(ellipsoid: &Ellipsoid, camera_position: DVec3) -> Self {
        let mut occluder = EllipsoidalOccluder {
            ellipsoid: *ellipsoid,
            camera_position: DVec3::ZERO,
            camera_position_in_scaled_space: DVec3::ZERO,
            distance_to_limb_in_scaled_space_squared: 0.0,
        };
        occluder.set_camera_position(camera_position);
        occluder
    }
    pub fn ellipsoid(&self) -> &Ellipsoid {
        &self.ellipsoid
    }
    pub fn camera_position(&self) -> DVec3 {
        self.camera_position
    }
    pub fn set_camera_position(&mut self, camera_position: DVec3) {
        let cv = self
            .ellipsoid
            .transform_position_to_scaled_space(camera_position);
        self.camera_position = camera_position;
        self.camera_position_in_scaled_space = cv;
        self.distance_to_limb_in_scaled_space_squared = cv.length_squared() - 1.0;
    }
    pub fn is_point_visible(&self, occludee: DVec3) -> bool {
        let scaled = self.ellipsoid.transform_position_to_scaled_space(occludee);
        self.is_scaled_space_point_visible(scaled)
    }
    pub fn is_scaled_space_point_visible(&self, occludee_scaled_space_position: DVec3) -> bool {
        let cv = self.camera_position_in_scaled_space;
        let vh_magnitude_squared = self.distance_to_limb_in_scaled_space_squared;
        let vt = occludee_scaled_space_position - cv;
        let vt_dot_vc = -vt.dot(cv);
        // below the surface the culling plane passes through the camera
        let is_occluded = if vh_magnitude_squared < 0.0 {
            vt_dot_vc > 0.0
        } else {
            vt_dot_vc > vh_magnitude_squared
                && vt_dot_vc * vt_dot_vc / vt.length_squared() > vh_magnitude_squared
        };
        !is_occluded
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn point_behind_globe_is_occluded() {
        let occluder = EllipsoidalOccluder::new(&Ellipsoid::UNIT_SPHERE, DVec3::new(0.0, 0.0, 2.0));
        assert!(!occluder.is_point_visible(DVec3::new(0.0, 0.0, -1.0)));
        assert!(occluder.is_point_visible(DVec3::new(0.0, 0.0, 1.0)));
    }

    #[test]
    fn point_beyond_the_limb_but_above_it_is_visible() {
        let occluder =
            EllipsoidalOccluder::new(&Ellipsoid::UNIT_SPHERE, DVec3::new(0.0, 0.0, 2.0));
        assert!(occluder.is_point_visible(DVec3::new(0.0, 3.0, -0.1)));
    }

    #[test]
    fn wgs84_far_side() {
        let radius = Ellipsoid::WGS84.maximum_radius();
        let occluder = EllipsoidalOccluder::new(&Ellipsoid::WGS84, DVec3::new(2.5e7, 0.0, 0.0));
        assert!(occluder.is_point_visible(DVec3::new(radius, 0.0, 0.0)));
        assert!(!occluder.is_point_visible(DVec3::new(-radius, 0.0, 0.0)));
        assert!(!occluder.is_point_visible(DVec3::new(-radius * 0.5, radius * 0.8, 0.0)));
    }
}
