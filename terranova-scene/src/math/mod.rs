mod epsilon;

pub use epsilon::*;

/// `element_sum` for glam versions (< 0.25) that do not provide it.
pub trait ElementSum {
    fn element_sum(self) -> f64;
}

impl ElementSum for bevy::math::DVec3 {
    #[inline]
    fn element_sum(self) -> f64 {
        self.x + self.y + self.z
    }
}

/// Compares two floats with a relative and an absolute tolerance. When only the
/// relative tolerance is given it is also used as the absolute one.
pub fn equals_epsilon(
    left: f64,
    right: f64,
    relative_epsilon: Option<f64>,
    absolute_epsilon: Option<f64>,
) -> bool {
    let relative_epsilon = relative_epsilon.unwrap_or(0.0);
    let absolute_epsilon = absolute_epsilon.unwrap_or(relative_epsilon);
    let diff = (left - right).abs();
    diff <= absolute_epsilon || diff <= relative_epsilon * left.abs().max(right.abs())
}

/// Wraps an angle in degrees into `[-180, 180]`.
pub fn normalize_longitude_degrees(longitude: f64) -> f64 {
    if (-180.0..=180.0).contains(&longitude) {
        return longitude;
    }
    let wrapped = (longitude + 180.0).rem_euclid(360.0) - 180.0;
    if wrapped == -180.0 && longitude > 0.0 {
        180.0
    } else {
        wrapped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equals_epsilon_relative_and_absolute() {
        assert!(equals_epsilon(1.0, 1.0 + 1e-12, Some(EPSILON10), None));
        assert!(!equals_epsilon(1.0, 1.1, Some(EPSILON10), None));
        assert!(equals_epsilon(0.0, 1e-8, None, Some(EPSILON7)));
        assert!(equals_epsilon(6378137.0, 6378137.5, Some(EPSILON6), None));
    }

    #[test]
    fn normalize_longitude() {
        assert_eq!(normalize_longitude_degrees(45.0), 45.0);
        assert_eq!(normalize_longitude_degrees(190.0), -170.0);
        assert_eq!(normalize_longitude_degrees(-190.0), 170.0);
        assert_eq!(normalize_longitude_degrees(540.0), 180.0);
    }
}
