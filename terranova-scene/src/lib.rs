pub mod ellipsoid;
pub mod ellipsoidal_occluder;
pub mod geodetic;
pub mod height_map;
pub mod math;
pub mod rectangle;
pub mod tile_key;
pub mod tile_mesh;
pub mod web_mercator_projection;

pub use ellipsoid::*;
pub use ellipsoidal_occluder::*;
pub use geodetic::*;
pub use height_map::*;
pub use intersection_tests::*;
pub use rectangle::*;
pub use tile_key::*;
pub use tile_mesh::*;
pub use web_mercator_projection::*;
