use bevy::prelude::*;

pub use terranova_jobs as jobs;
pub use terranova_renderer as renderer;
pub use terranova_scene as scene;

pub use terranova_renderer::{GlobeCameraTag, TileLayer, TileLayerSettings};

/// Installs the job runner, sized by the layer's request budget, and the tile renderer.
#[derive(Default)]
pub struct Plugin {
    pub settings: TileLayerSettings,
}

impl bevy::app::Plugin for Plugin {
    fn build(&self, app: &mut App) {
        app.add_plugins((
            terranova_jobs::Plugin {
                maximum_active_jobs: self.settings.max_active_requests,
            },
            terranova_renderer::Plugin {
                settings: self.settings.clone(),
            },
        ));
    }
}
