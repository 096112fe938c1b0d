use std::collections::HashSet;

use bevy::{
    prelude::*,
    render::texture::{CompressedImageFormats, ImageType},
    window::PrimaryWindow,
};
use terranova_jobs::{FinishedJobs, JobSpawner};
use terranova_scene::TileKey;

use crate::{
    camera::{Canvas, PerspectiveCamera, PerspectiveFrustum},
    fetch_img_job::{FetchError, FetchImgJob},
    tile::TileMaterial,
    tile_layer::TileLayer,
};

/// Marks the camera the tile layer follows.
#[derive(Component, Debug, Default, Clone, Copy)]
pub struct GlobeCameraTag;

#[derive(Component, Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileRendered(pub TileKey);

pub fn system_set(app: &mut App) {
    app.add_systems(
        Update,
        (
            finish_fetch_jobs_system,
            update_tile_layer_system,
            dispatch_requests_system,
            sync_tile_entities_system,
        )
            .chain(),
    );
}

/// `None` for orthographic cameras, which tile selection does not support.
fn globe_camera(
    transform: &GlobalTransform,
    projection: &Projection,
    tile_layer: &TileLayer,
) -> Option<PerspectiveCamera> {
    let Projection::Perspective(perspective) = projection else {
        return None;
    };
    let frustum = PerspectiveFrustum {
        fov_y: f64::from(perspective.fov),
        aspect_ratio: f64::from(perspective.aspect_ratio),
        near: f64::from(perspective.near),
        far: f64::from(perspective.far),
    };
    let eye = transform.translation().as_dvec3();
    Some(PerspectiveCamera::look_at(
        eye,
        eye + transform.forward().as_dvec3(),
        transform.up().as_dvec3(),
        frustum,
        tile_layer.ellipsoid(),
    ))
}

pub fn update_tile_layer_system(
    mut tile_layer: ResMut<TileLayer>,
    camera_query: Query<(&GlobalTransform, &Projection), With<GlobeCameraTag>>,
    primary_query: Query<&Window, With<PrimaryWindow>>,
    mut warned: Local<bool>,
) {
    let Ok(window) = primary_query.get_single() else {
        return;
    };
    let Ok((transform, projection)) = camera_query.get_single() else {
        return;
    };
    let canvas = Canvas {
        width: window.physical_width(),
        height: window.physical_height(),
    };
    if canvas.width == 0 || canvas.height == 0 {
        return;
    }
    let Some(camera) = globe_camera(transform, projection, &tile_layer) else {
        if !*warned {
            warn!("globe camera has an orthographic projection, tiles are not updated");
            *warned = true;
        }
        return;
    };
    *warned = false;
    tile_layer.update(&camera, canvas);
}

pub fn dispatch_requests_system(mut tile_layer: ResMut<TileLayer>, mut job_spawner: JobSpawner) {
    while job_spawner.available() > 0 {
        let Some(request) = tile_layer.next_request() else {
            break;
        };
        debug!("dispatching tile {}", request.key);
        let job = FetchImgJob::new(request, tile_layer.settings());
        if let Err(job) = job_spawner.try_spawn(job) {
            tile_layer.requeue(job.into_request());
            break;
        }
    }
}

pub fn finish_fetch_jobs_system(
    mut tile_layer: ResMut<TileLayer>,
    mut finished_jobs: FinishedJobs,
    mut images: ResMut<Assets<Image>>,
) {
    let format = tile_layer.provider().format().to_string();
    while let Some(outcome) = finished_jobs.take_next::<FetchImgJob>() {
        let material = outcome.result.and_then(|bytes| {
            Image::from_buffer(
                &bytes,
                ImageType::Extension(&format),
                CompressedImageFormats::NONE,
                true,
            )
            .map_err(|e| FetchError::Decode(e.to_string()))
        });
        let material = material.map(|image| TileMaterial {
            texture: images.add(image),
        });
        tile_layer.complete_request(outcome.key, material);
    }
}

/// Keeps one entity per drawable tile. Only runs when the layer's revision changes.
pub fn sync_tile_entities_system(
    tile_layer: Res<TileLayer>,
    mut last_revision: Local<Option<u64>>,
    mut commands: Commands,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<StandardMaterial>>,
    rendered_query: Query<(Entity, &TileRendered)>,
) {
    if *last_revision == Some(tile_layer.revision()) {
        return;
    }
    *last_revision = Some(tile_layer.revision());

    let drawable: HashSet<TileKey> = tile_layer.drawable_tiles().map(|tile| tile.key).collect();
    let mut rendered = HashSet::new();
    for (entity, tile_rendered) in rendered_query.iter() {
        if drawable.contains(&tile_rendered.0) {
            rendered.insert(tile_rendered.0);
        } else {
            commands.entity(entity).despawn();
        }
    }

    for tile in tile_layer.drawable_tiles() {
        if rendered.contains(&tile.key) {
            continue;
        }
        let Some(material) = &tile.material else {
            continue;
        };
        commands.spawn((
            PbrBundle {
                mesh: meshes.add(tile.to_bevy_mesh()),
                material: materials.add(StandardMaterial {
                    base_color_texture: Some(material.texture.clone()),
                    unlit: true,
                    ..Default::default()
                }),
                transform: Transform::from_translation(tile.translation()),
                ..Default::default()
            },
            TileRendered(tile.key),
        ));
    }
    debug!(
        "{} tiles drawn at level {}",
        drawable.len(),
        tile_layer.level()
    );
}
