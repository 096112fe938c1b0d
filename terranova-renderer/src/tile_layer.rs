use std::collections::{HashSet, VecDeque};

use bevy::{
    log::{debug, warn},
    math::DVec3,
    prelude::Resource,
};
use terranova_scene::{Direction, Ellipsoid, TileKey, WebMercatorProjection};

use crate::{
    camera::{Canvas, GlobeCamera},
    fetch_img_job::FetchError,
    imagery_provider::ImageryProvider,
    lru_cache::LruCache,
    settings::TileLayerSettings,
    tile::{Tile, TileMaterial},
    tile_details::TileDetails,
};

const CAMERA_MOVE_EPSILON: f64 = 1e-6;

/// An image fetch waiting for a free job slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TileRequest {
    pub key: TileKey,
    pub url: String,
}

/// Keeps the set of tiles visible from the camera and the cache that
/// backs it. Selection only re-runs when the camera moves.
#[derive(Resource)]
pub struct TileLayer {
    settings: TileLayerSettings,
    ellipsoid: Ellipsoid,
    provider: ImageryProvider,
    level: u32,
    one_frame_row_records: HashSet<u32>,
    camera_last_position: Option<DVec3>,
    cache: LruCache<TileKey, Tile>,
    tiles: Vec<Tile>,
    active: HashSet<TileKey>,
    queued: VecDeque<TileRequest>,
    pending: HashSet<TileKey>,
    in_flight: HashSet<TileKey>,
    revision: u64,
}

impl Default for TileLayer {
    fn default() -> Self {
        TileLayer::new(TileLayerSettings::default())
    }
}

impl TileLayer {
    pub fn new(settings: TileLayerSettings) -> Self {
        let provider = ImageryProvider::from_settings(&settings.imagery);
        Self::with_provider(settings, provider)
    }

    pub fn with_provider(settings: TileLayerSettings, provider: ImageryProvider) -> Self {
        Self {
            cache: LruCache::new(settings.cache_capacity),
            level: settings.minimum_level,
            settings,
            ellipsoid: Ellipsoid::WGS84,
            provider,
            one_frame_row_records: HashSet::new(),
            camera_last_position: None,
            tiles: Vec::new(),
            active: HashSet::new(),
            queued: VecDeque::new(),
            pending: HashSet::new(),
            in_flight: HashSet::new(),
            revision: 0,
        }
    }

    pub fn settings(&self) -> &TileLayerSettings {
        &self.settings
    }
    pub fn ellipsoid(&self) -> &Ellipsoid {
        &self.ellipsoid
    }
    pub fn provider(&self) -> &ImageryProvider {
        &self.provider
    }
    pub fn level(&self) -> u32 {
        self.level
    }
    /// Active tiles of the last selection pass, with or without material.
    pub fn tiles(&self) -> &[Tile] {
        &self.tiles
    }
    /// Active tiles that can be drawn.
    pub fn drawable_tiles(&self) -> impl Iterator<Item = &Tile> {
        self.tiles.iter().filter(|tile| tile.has_material())
    }
    pub fn cache(&self) -> &LruCache<TileKey, Tile> {
        &self.cache
    }
    /// Bumped whenever the active set or one of its materials changes.
    pub fn revision(&self) -> u64 {
        self.revision
    }
    pub fn pending_requests(&self) -> usize {
        self.queued.len()
    }
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    /// Per-frame entry point. Returns whether a new selection pass ran.
    pub fn update<C: GlobeCamera + ?Sized>(&mut self, camera: &C, canvas: Canvas) -> bool {
        let position = camera.world_position();
        if let Some(last) = self.camera_last_position {
            if last.abs_diff_eq(position, CAMERA_MOVE_EPSILON) {
                return false;
            }
        }
        self.camera_last_position = Some(position);
        // max then min, so inverted bounds settle on maximum_level
        let level = camera
            .level()
            .max(self.settings.minimum_level)
            .min(self.settings.maximum_level);
        self.get_visible_tiles_by_level(camera, canvas, level);
        self.refresh_tiles();
        true
    }

    fn loop_limit(&self, level: u32) -> u32 {
        let tiles_per_axis = terranova_scene::tiles_at_level(level);
        self.settings.max_walk_steps.min(tiles_per_axis - 1)
    }

    fn is_tile_visible<C: GlobeCamera + ?Sized>(
        &self,
        camera: &C,
        canvas: Canvas,
        key: &TileKey,
    ) -> bool {
        TileDetails::new(camera, canvas, key, &self.ellipsoid).is_visible(self.settings.area_threshold)
    }

    /// Tile under the camera. Latitudes beyond the Mercator limit are clamped.
    fn seed_tile(&self, position: DVec3, level: u32) -> Option<TileKey> {
        let geodetic = self.ellipsoid.cartesian_to_geodetic(position)?;
        let mercator = WebMercatorProjection::new(&self.ellipsoid).project_clamped(&geodetic);
        TileKey::from_mercator(mercator, level, &self.ellipsoid).ok()
    }

    /// Walks out from the tile under the camera, row by row, and replaces the
    /// active set with every visible tile it reaches.
    ///
    /// Each walk stops at the first invisible tile unless `exhaustive_search`
    /// is set. That assumes the visible region is contiguous around the seed,
    /// which holds for a roughly centered view but can miss tiles in very
    /// oblique ones.
    pub fn get_visible_tiles_by_level<C: GlobeCamera + ?Sized>(
        &mut self,
        camera: &C,
        canvas: Canvas,
        level: u32,
    ) -> &[Tile] {
        self.level = level;
        self.one_frame_row_records.clear();
        let Some(seed) = self.seed_tile(camera.world_position(), level) else {
            warn!("camera is at the center of the ellipsoid, no tiles selected");
            self.tiles.clear();
            self.active.clear();
            self.revision += 1;
            return &self.tiles;
        };
        let loop_limit = self.loop_limit(level);

        let mut result = self.handle_row(camera, canvas, seed.row, seed.col);
        for direction in [Direction::Bottom, Direction::Top] {
            let mut cursor = seed;
            for _ in 0..loop_limit {
                let Some(next) = cursor.neighbor(direction) else {
                    break;
                };
                cursor = next;
                let row = self.handle_row(camera, canvas, cursor.row, cursor.col);
                if row.is_empty() && !self.settings.exhaustive_search {
                    break;
                }
                result.extend(row);
            }
        }

        debug!(
            "selected {} tiles at level {} around {}",
            result.len(),
            level,
            seed
        );
        self.active = result.iter().map(|tile| tile.key).collect();
        self.tiles = result;
        self.revision += 1;
        &self.tiles
    }

    /// Visible tiles of one row, walking left and right from `col`. A row is
    /// handled at most once per selection pass.
    pub fn handle_row<C: GlobeCamera + ?Sized>(
        &mut self,
        camera: &C,
        canvas: Canvas,
        row: u32,
        col: u32,
    ) -> Vec<Tile> {
        let mut result = Vec::new();
        if !self.one_frame_row_records.insert(row) {
            return result;
        }
        let Ok(seed) = TileKey::new(self.level, row, col) else {
            return result;
        };
        let exhaustive = self.settings.exhaustive_search;
        let loop_limit = self.loop_limit(self.level);
        let mut taken = HashSet::new();

        if self.is_tile_visible(camera, canvas, &seed) {
            taken.insert(seed.col);
            result.push(self.query_tile(seed));
        } else if !exhaustive {
            return result;
        }

        for direction in [Direction::Left, Direction::Right] {
            let mut cursor = seed;
            for _ in 0..loop_limit {
                cursor = cursor.sibling(direction);
                // wrapped around onto a column this row already has
                if taken.contains(&cursor.col) {
                    break;
                }
                if !self.is_tile_visible(camera, canvas, &cursor) {
                    if exhaustive {
                        continue;
                    }
                    break;
                }
                taken.insert(cursor.col);
                result.push(self.query_tile(cursor));
            }
        }
        result
    }

    /// Cached tile for `key`, or a fresh materialless one.
    pub fn query_tile(&mut self, key: TileKey) -> Tile {
        if let Some(tile) = self.cache.get(&key) {
            return tile.clone();
        }
        Tile::new(key, &self.ellipsoid)
    }

    /// Reserves every active tile that is not cached yet and queues its image.
    /// A reservation evicted by a later one does not cancel the request.
    pub fn refresh_tiles(&mut self) {
        for tile in &self.tiles {
            if self.cache.contains(&tile.key)
                || self.pending.contains(&tile.key)
                || self.in_flight.contains(&tile.key)
            {
                continue;
            }
            let url = match self.provider.resolve_url(&tile.key) {
                Ok(url) => url,
                Err(e) => {
                    warn!("no url for tile {}: {}", tile.key, e);
                    continue;
                }
            };
            if let Some((evicted, _)) = self.cache.put(tile.key, tile.clone()) {
                debug!("evicted tile {} from cache", evicted);
            }
            self.pending.insert(tile.key);
            self.queued.push_back(TileRequest { key: tile.key, url });
        }
    }

    /// Next request to dispatch. Requests for tiles that left the active set
    /// are dropped along with their materialless reservation.
    pub fn next_request(&mut self) -> Option<TileRequest> {
        while let Some(request) = self.queued.pop_front() {
            self.pending.remove(&request.key);
            if self.in_flight.contains(&request.key) {
                continue;
            }
            if !self.active.contains(&request.key) {
                debug!("dropping stale request for tile {}", request.key);
                if self
                    .cache
                    .peek(&request.key)
                    .is_some_and(|tile| !tile.has_material())
                {
                    self.cache.remove(&request.key);
                }
                continue;
            }
            self.in_flight.insert(request.key);
            return Some(request);
        }
        None
    }

    /// Puts back a request that could not be dispatched.
    pub fn requeue(&mut self, request: TileRequest) {
        self.in_flight.remove(&request.key);
        self.pending.insert(request.key);
        self.queued.push_front(request);
    }

    /// Applies the result of an image fetch. Failures leave the tile without
    /// material and release its reservation so a later pass can retry.
    pub fn complete_request(&mut self, key: TileKey, result: Result<TileMaterial, FetchError>) {
        self.in_flight.remove(&key);
        match result {
            Ok(material) => {
                let mut active = None;
                for tile in self.tiles.iter_mut().filter(|tile| tile.key == key) {
                    tile.material = Some(material.clone());
                    active = Some(tile.clone());
                    self.revision += 1;
                }
                if let Some(cached) = self.cache.get_mut(&key) {
                    cached.material = Some(material);
                } else if let Some(tile) = active {
                    self.cache.put(key, tile);
                }
            }
            Err(e) => {
                warn!("failed to load tile {}: {}", key, e);
                self.cache.remove(&key);
            }
        }
    }
}
