use std::sync::Arc;

use bevy::{
    math::DVec3,
    prelude::{Handle, Image, Mesh, Vec3},
    render::{mesh::Indices, render_resource::PrimitiveTopology},
};
use terranova_scene::{Ellipsoid, MercatorRectangle, TileKey, TileMesh};

#[derive(Debug, Clone, PartialEq)]
pub struct TileMaterial {
    pub texture: Handle<Image>,
}

/// One imagery tile. The mesh is built when the tile is created and shared
/// between clones; the material arrives later, once its image is fetched.
#[derive(Debug, Clone)]
pub struct Tile {
    pub key: TileKey,
    pub rectangle: MercatorRectangle,
    pub mesh: Arc<TileMesh>,
    pub material: Option<TileMaterial>,
}

impl Tile {
    pub fn new(key: TileKey, ellipsoid: &Ellipsoid) -> Self {
        Self {
            key,
            rectangle: key.mercator_rectangle(ellipsoid),
            mesh: Arc::new(TileMesh::generate(&key, ellipsoid)),
            material: None,
        }
    }

    pub fn has_material(&self) -> bool {
        self.material.is_some()
    }

    /// World position the bevy mesh is expressed relative to.
    pub fn anchor(&self) -> DVec3 {
        self.mesh.positions.first().copied().unwrap_or(DVec3::ZERO)
    }

    pub fn to_bevy_mesh(&self) -> Mesh {
        let anchor = self.anchor();
        let positions: Vec<[f32; 3]> = self
            .mesh
            .positions
            .iter()
            .map(|p| (*p - anchor).as_vec3().to_array())
            .collect();
        let normals: Vec<[f32; 3]> = self
            .mesh
            .normals
            .iter()
            .map(|n| n.as_vec3().to_array())
            .collect();
        // images are stored top row first
        let uvs: Vec<[f32; 2]> = self
            .mesh
            .uvs
            .iter()
            .map(|uv| [uv.x as f32, (1.0 - uv.y) as f32])
            .collect();

        let mut mesh = Mesh::new(PrimitiveTopology::TriangleList);
        mesh.insert_attribute(Mesh::ATTRIBUTE_POSITION, positions);
        mesh.insert_attribute(Mesh::ATTRIBUTE_NORMAL, normals);
        mesh.insert_attribute(Mesh::ATTRIBUTE_UV_0, uvs);
        mesh.set_indices(Some(Indices::U32(self.mesh.indices.clone())));
        mesh
    }

    pub fn translation(&self) -> Vec3 {
        self.anchor().as_vec3()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bevy::render::mesh::VertexAttributeValues;

    #[test]
    fn new_tile_has_geometry_but_no_material() {
        let key = TileKey::new(3, 2, 1).unwrap();
        let tile = Tile::new(key, &Ellipsoid::WGS84);
        assert!(!tile.has_material());
        assert_eq!(tile.rectangle, key.mercator_rectangle(&Ellipsoid::WGS84));
        assert_eq!(tile.mesh.vertex_count(), 81);
    }

    #[test]
    fn clones_share_the_mesh() {
        let tile = Tile::new(TileKey::new(6, 1, 1).unwrap(), &Ellipsoid::WGS84);
        let clone = tile.clone();
        assert!(Arc::ptr_eq(&tile.mesh, &clone.mesh));
    }

    #[test]
    fn bevy_mesh_flips_v() {
        let tile = Tile::new(TileKey::new(7, 3, 3).unwrap(), &Ellipsoid::WGS84);
        let mesh = tile.to_bevy_mesh();
        match mesh.attribute(Mesh::ATTRIBUTE_UV_0) {
            Some(VertexAttributeValues::Float32x2(uvs)) => {
                assert_eq!(uvs.first(), Some(&[0.0, 0.0]));
                assert_eq!(uvs.last(), Some(&[1.0, 1.0]));
            }
            other => panic!("unexpected uv attribute {other:?}"),
        }
        match mesh.attribute(Mesh::ATTRIBUTE_POSITION) {
            Some(VertexAttributeValues::Float32x3(positions)) => {
                assert_eq!(positions.first(), Some(&[0.0, 0.0, 0.0]));
            }
            other => panic!("unexpected position attribute {other:?}"),
        }
        assert_eq!(mesh.indices().map(|i| i.len()), Some(6));
    }
}
