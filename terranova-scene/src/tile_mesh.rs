use bevy::math::{DVec2, DVec3};

use crate::{
    ellipsoid::Ellipsoid,
    geodetic::Geodetic3,
    height_map::HeightMap,
    tile_key::TileKey,
    web_mercator_projection::WebMercatorProjection,
};

/// Grid subdivisions per side. Coarse levels get more segments so the tile
/// follows the curvature of the globe.
pub fn segments_for_level(level: u32) -> u32 {
    if level < 6 {
        1 << (6 - level)
    } else {
        1
    }
}

/// Surface geometry of one tile. Vertices are laid out row by row from the
/// northern edge, west to east within a row.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TileMesh {
    pub positions: Vec<DVec3>,
    pub normals: Vec<DVec3>,
    pub uvs: Vec<DVec2>,
    pub indices: Vec<u32>,
    pub segments: u32,
}

impl TileMesh {
    pub fn generate(key: &TileKey, ellipsoid: &Ellipsoid) -> TileMesh {
        Self::build(key, ellipsoid, |_, _| 0.0)
    }

    pub fn generate_with_heights(
        key: &TileKey,
        ellipsoid: &Ellipsoid,
        heights: &HeightMap,
    ) -> TileMesh {
        Self::build(key, ellipsoid, |u, v| heights.sample(u, v))
    }

    fn build<F>(key: &TileKey, ellipsoid: &Ellipsoid, height_at: F) -> TileMesh
    where
        F: Fn(f64, f64) -> f64,
    {
        let segments = segments_for_level(key.level);
        let stride = segments + 1;
        let vertex_count = (stride * stride) as usize;
        let projection = WebMercatorProjection::new(ellipsoid);
        let rectangle = key.mercator_rectangle(ellipsoid);

        let mut mesh = TileMesh {
            positions: Vec::with_capacity(vertex_count),
            normals: Vec::with_capacity(vertex_count),
            uvs: Vec::with_capacity(vertex_count),
            indices: Vec::with_capacity((segments * segments * 6) as usize),
            segments,
        };

        for i in 0..=segments {
            let b = f64::from(i) / f64::from(segments);
            for j in 0..=segments {
                let a = f64::from(j) / f64::from(segments);
                let mercator = rectangle.lerp(a, 1.0 - b);
                let geodetic = projection.unproject(mercator);
                let normal = ellipsoid.geodetic_surface_normal(&geodetic);
                let lifted =
                    Geodetic3::new(geodetic.longitude(), geodetic.latitude(), height_at(a, b))
                        .unwrap_or_else(|_| geodetic.into());
                mesh.positions.push(ellipsoid.geodetic_to_cartesian(&lifted));
                mesh.normals.push(normal);
                mesh.uvs.push(DVec2::new(a, 1.0 - b));
            }
        }

        for i in 0..segments {
            for j in 0..segments {
                let idx0 = stride * i + j;
                let idx1 = stride * (i + 1) + j;
                let idx2 = idx1 + 1;
                let idx3 = idx0 + 1;
                mesh.indices
                    .extend_from_slice(&[idx0, idx1, idx2, idx2, idx3, idx0]);
            }
        }
        mesh
    }

    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::{equals_epsilon, EPSILON3, EPSILON9};

    #[test]
    fn segments_shrink_with_level() {
        assert_eq!(segments_for_level(0), 64);
        assert_eq!(segments_for_level(1), 32);
        assert_eq!(segments_for_level(5), 2);
        assert_eq!(segments_for_level(6), 1);
        assert_eq!(segments_for_level(18), 1);
    }

    #[test]
    fn counts_match_segments() {
        let key = TileKey::new(3, 2, 5).unwrap();
        let mesh = TileMesh::generate(&key, &Ellipsoid::WGS84);
        assert_eq!(mesh.segments, 8);
        assert_eq!(mesh.vertex_count(), 81);
        assert_eq!(mesh.normals.len(), 81);
        assert_eq!(mesh.uvs.len(), 81);
        assert_eq!(mesh.indices.len(), 8 * 8 * 6);
        assert!(mesh.indices.iter().all(|&i| (i as usize) < mesh.vertex_count()));
    }

    #[test]
    fn single_quad_layout() {
        let key = TileKey::new(7, 10, 20).unwrap();
        let mesh = TileMesh::generate(&key, &Ellipsoid::WGS84);
        assert_eq!(mesh.indices, vec![0, 2, 3, 3, 1, 0]);
        // north-west vertex first, with the V axis flipped
        assert_eq!(mesh.uvs[0], DVec2::new(0.0, 1.0));
        assert_eq!(mesh.uvs[1], DVec2::new(1.0, 1.0));
        assert_eq!(mesh.uvs[2], DVec2::new(0.0, 0.0));
        assert_eq!(mesh.uvs[3], DVec2::new(1.0, 0.0));
        let rect = key.geodetic_rectangle();
        let north_west = Ellipsoid::WGS84.geodetic_to_cartesian(&rect.north_west());
        assert!((mesh.positions[0] - north_west).length() < EPSILON3);
    }

    #[test]
    fn generation_is_deterministic() {
        let key = TileKey::new(4, 3, 9).unwrap();
        assert_eq!(
            TileMesh::generate(&key, &Ellipsoid::WGS84),
            TileMesh::generate(&key, &Ellipsoid::WGS84)
        );
    }

    #[test]
    fn vertices_lie_on_surface() {
        let ellipsoid = Ellipsoid::WGS84;
        let mesh = TileMesh::generate(&TileKey::new(2, 1, 1).unwrap(), &ellipsoid);
        for position in &mesh.positions {
            let scaled = ellipsoid.transform_position_to_scaled_space(*position);
            assert!(equals_epsilon(scaled.length(), 1.0, None, Some(EPSILON9)));
        }
        for normal in &mesh.normals {
            assert!(equals_epsilon(normal.length(), 1.0, None, Some(EPSILON9)));
        }
    }

    #[test]
    fn heights_lift_vertices_along_the_normal() {
        let ellipsoid = Ellipsoid::WGS84;
        let key = TileKey::new(8, 100, 200).unwrap();
        let flat = TileMesh::generate(&key, &ellipsoid);
        let heights = HeightMap::flat(2, 2, 1000.0).unwrap();
        let lifted = TileMesh::generate_with_heights(&key, &ellipsoid, &heights);
        for ((low, high), normal) in flat
            .positions
            .iter()
            .zip(&lifted.positions)
            .zip(&flat.normals)
        {
            assert!(((*high - *low) - *normal * 1000.0).length() < EPSILON3);
        }
    }
}
