//! Imagery globe seen from far out, with the camera slowly orbiting the equator.
//! An optional JSON settings file can be passed as the first argument.

use bevy::prelude::*;
use terranova::{GlobeCameraTag, TileLayerSettings};

const ORBIT_RADIUS: f32 = 2.5e7;
const ORBIT_SPEED: f32 = 0.02;

fn main() {
    let mut app = App::new();
    app.add_plugins(DefaultPlugins);

    let settings = match std::env::args().nth(1) {
        Some(path) => TileLayerSettings::from_path(&path).unwrap_or_else(|e| {
            error!("could not load settings from {}: {}, using defaults", path, e);
            TileLayerSettings::default()
        }),
        None => TileLayerSettings::default(),
    };

    app.add_plugins(terranova::Plugin { settings })
        .add_systems(Startup, setup)
        .add_systems(Update, orbit_system)
        .run();
}

fn setup(mut commands: Commands) {
    commands.spawn((
        Camera3dBundle {
            transform: Transform::from_xyz(ORBIT_RADIUS, 0.0, 0.0).looking_at(Vec3::ZERO, Vec3::Z),
            projection: Projection::Perspective(PerspectiveProjection {
                near: 1.0,
                far: 1.0e9,
                ..Default::default()
            }),
            ..Default::default()
        },
        GlobeCameraTag,
    ));
}

fn orbit_system(mut query: Query<&mut Transform, With<GlobeCameraTag>>, time: Res<Time>) {
    for mut transform in &mut query {
        let angle = time.elapsed_seconds() * ORBIT_SPEED;
        let eye = Vec3::new(angle.cos(), angle.sin(), 0.0) * ORBIT_RADIUS;
        *transform = Transform::from_translation(eye).looking_at(Vec3::ZERO, Vec3::Z);
    }
}
