#![warn(
    clippy::unwrap_used,
    clippy::cast_lossless,
    clippy::unimplemented,
    clippy::indexing_slicing,
    clippy::expect_used
)]

use bevy::prelude::*;

pub mod camera;
pub mod fetch_img_job;
pub mod imagery_provider;
pub mod lru_cache;
pub mod settings;
mod systems;
pub mod tile;
pub mod tile_details;
pub mod tile_layer;

pub use camera::{level_for_height, Canvas, GlobeCamera, PerspectiveCamera, PerspectiveFrustum};
pub use fetch_img_job::{FetchError, FetchImgJob, FetchOutcome};
pub use imagery_provider::{ImageryProvider, TemplateError, UrlTemplate};
pub use lru_cache::LruCache;
pub use settings::{ArcGisService, ImagerySettings, SettingsError, TileLayerSettings};
pub use systems::{GlobeCameraTag, TileRendered};
pub use tile::{Tile, TileMaterial};
pub use tile_details::{CornerInfo, TileDetails};
pub use tile_layer::{TileLayer, TileRequest};

/// Selects, fetches and draws imagery tiles for the camera tagged with
/// [`GlobeCameraTag`]. Needs `terranova_jobs::Plugin` for the fetch budget.
#[derive(Default)]
pub struct Plugin {
    pub settings: TileLayerSettings,
}

impl bevy::app::Plugin for Plugin {
    fn build(&self, app: &mut App) {
        app.insert_resource(TileLayer::new(self.settings.clone()));
        systems::system_set(app);
    }
}
