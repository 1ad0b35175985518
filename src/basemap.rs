//! Web-mercator basemap tiles behind choropleth maps.

use anyhow::{Context, Result};
use futures::stream::{self, StreamExt, TryStreamExt};
use image::imageops::{self, FilterType};
use image::RgbImage;
use std::collections::{HashMap, VecDeque};
use std::f64::consts::PI;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::geometry::{Extent, EARTH_RADIUS};

/// Default slippy-map tile server
pub const DEFAULT_TILE_URL: &str = "https://tile.openstreetmap.org/{z}/{x}/{y}.png";

pub const MAX_ZOOM: u8 = 18;

/// Upper bound on tiles fetched for one map
pub const MAX_TILES: usize = 36;

/// Decoded tiles kept between requests
pub const CACHED_TILES: usize = 256;

/// Tile requests in flight at once for one map
const FETCH_CONCURRENCY: usize = 4;

/// Roughly how many tiles the longer side of the extent should span
const TARGET_SPAN: f64 = 3.0;

/// Edge length of the web-mercator world square in metres
pub fn world_size() -> f64 {
    2.0 * PI * EARTH_RADIUS
}

fn tile_size(zoom: u8) -> f64 {
    world_size() / f64::from(1u32 << zoom)
}

/// Zoom at which the longer side of `extent` covers about three tiles
pub fn choose_zoom(extent: &Extent) -> u8 {
    let span = extent.width().max(extent.height());
    if span.is_nan() || span <= 0.0 {
        return MAX_ZOOM;
    }
    let z = (TARGET_SPAN * world_size() / span).log2().floor();
    z.clamp(0.0, f64::from(MAX_ZOOM)) as u8
}

/// Bounds of tile `(x, y)` at `zoom`
pub fn tile_bounds(x: u32, y: u32, zoom: u8) -> Extent {
    let half = world_size() / 2.0;
    let size = tile_size(zoom);
    let x_min = -half + f64::from(x) * size;
    let y_max = half - f64::from(y) * size;
    Extent {
        x_min,
        x_max: x_min + size,
        y_min: y_max - size,
        y_max,
    }
}

/// Tile indices covering `extent`, row by row from the top
pub fn covering_tiles(extent: &Extent, zoom: u8) -> Vec<(u32, u32)> {
    let half = world_size() / 2.0;
    let size = tile_size(zoom);
    let last = (1u32 << zoom) - 1;
    let index = |metres: f64| ((metres / size).floor().max(0.0) as u32).min(last);

    let (x0, x1) = (index(extent.x_min + half), index(extent.x_max + half));
    let (y0, y1) = (index(half - extent.y_max), index(half - extent.y_min));

    (y0..=y1)
        .flat_map(|y| (x0..=x1).map(move |x| (x, y)))
        .collect()
}

/// Zoom and tiles for `extent`, zooming out until at most [`MAX_TILES`] remain
pub fn plan_tiles(extent: &Extent) -> (u8, Vec<(u32, u32)>) {
    let mut zoom = choose_zoom(extent);
    loop {
        let tiles = covering_tiles(extent, zoom);
        if tiles.len() <= MAX_TILES || zoom == 0 {
            return (zoom, tiles);
        }
        zoom -= 1;
    }
}

#[derive(Debug, Clone)]
pub struct Tile {
    pub bounds: Extent,
    pub image: Arc<RgbImage>,
}

impl Tile {
    /// The part of this tile inside `view`, resampled to `width` x `height` pixels
    pub fn patch(&self, view: &Extent, width: u32, height: u32) -> Option<RgbImage> {
        let overlap = self.bounds.intersection(view)?;
        if width == 0 || height == 0 {
            return None;
        }
        let (w, h) = (f64::from(self.image.width()), f64::from(self.image.height()));
        let b = &self.bounds;

        let sx = ((overlap.x_min - b.x_min) / b.width() * w).floor().clamp(0.0, w - 1.0);
        let sy = ((b.y_max - overlap.y_max) / b.height() * h).floor().clamp(0.0, h - 1.0);
        let sw = (overlap.width() / b.width() * w).ceil().clamp(1.0, w - sx);
        let sh = (overlap.height() / b.height() * h).ceil().clamp(1.0, h - sy);

        let crop = imageops::crop_imm(self.image.as_ref(), sx as u32, sy as u32, sw as u32, sh as u32).to_image();
        Some(imageops::resize(&crop, width, height, FilterType::Triangle))
    }
}

#[derive(Debug, Clone)]
pub struct Basemap {
    pub zoom: u8,
    pub tiles: Vec<Tile>,
}

/// `(zoom, x, y)`
pub type TileKey = (u8, u32, u32);

/// Bounded tile store; the oldest insertion is evicted first
#[derive(Debug, Default)]
pub struct TileCache {
    tiles: HashMap<TileKey, Arc<RgbImage>>,
    order: VecDeque<TileKey>,
    capacity: usize,
}

impl TileCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            tiles: HashMap::new(),
            order: VecDeque::new(),
            capacity,
        }
    }

    pub fn get(&self, key: &TileKey) -> Option<Arc<RgbImage>> {
        self.tiles.get(key).cloned()
    }

    pub fn insert(&mut self, key: TileKey, image: Arc<RgbImage>) {
        if self.capacity == 0 {
            return;
        }
        if self.tiles.insert(key, image).is_none() {
            self.order.push_back(key);
        }
        while self.tiles.len() > self.capacity {
            let Some(oldest) = self.order.pop_front() else {
                break;
            };
            self.tiles.remove(&oldest);
        }
    }

    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }
}

/// HTTP tile fetcher for a `{z}/{x}/{y}` URL template.
///
/// Clones share one cache.
#[derive(Debug, Clone)]
pub struct TileSource {
    url_template: String,
    client: reqwest::Client,
    cache: Arc<RwLock<TileCache>>,
}

impl TileSource {
    pub fn new(url_template: impl Into<String>) -> Result<Self> {
        Self::with_cache_size(url_template, CACHED_TILES)
    }

    pub fn with_cache_size(url_template: impl Into<String>, cached_tiles: usize) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("plotdash/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(10))
            .build()
            .context("Failed to build tile client")?;
        Ok(Self {
            url_template: url_template.into(),
            client,
            cache: Arc::new(RwLock::new(TileCache::new(cached_tiles))),
        })
    }

    pub fn tile_url(&self, x: u32, y: u32, zoom: u8) -> String {
        self.url_template
            .replace("{z}", &zoom.to_string())
            .replace("{x}", &x.to_string())
            .replace("{y}", &y.to_string())
    }

    pub async fn cached_tiles(&self) -> usize {
        self.cache.read().await.len()
    }

    /// Every tile covering `extent`, from the cache where possible
    pub async fn fetch(&self, extent: &Extent) -> Result<Basemap> {
        let (zoom, indices) = plan_tiles(extent);

        let mut images = Vec::with_capacity(indices.len());
        let mut missing = Vec::new();
        {
            let cache = self.cache.read().await;
            for (x, y) in indices {
                match cache.get(&(zoom, x, y)) {
                    Some(image) => images.push(((zoom, x, y), image)),
                    None => missing.push((zoom, x, y)),
                }
            }
        }
        tracing::debug!(zoom, cached = images.len(), missing = missing.len(), "Fetching basemap tiles");

        let fetched: Vec<(TileKey, Arc<RgbImage>)> = stream::iter(missing)
            .map(|key| self.fetch_tile(key))
            .buffer_unordered(FETCH_CONCURRENCY)
            .try_collect()
            .await?;

        if !fetched.is_empty() {
            let mut cache = self.cache.write().await;
            for (key, image) in &fetched {
                cache.insert(*key, Arc::clone(image));
            }
        }
        images.extend(fetched);

        let tiles = images
            .into_iter()
            .map(|((z, x, y), image)| Tile {
                bounds: tile_bounds(x, y, z),
                image,
            })
            .collect();
        Ok(Basemap { zoom, tiles })
    }

    async fn fetch_tile(&self, key: TileKey) -> Result<(TileKey, Arc<RgbImage>)> {
        let (zoom, x, y) = key;
        let url = self.tile_url(x, y, zoom);
        let bytes = self
            .client
            .get(&url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .with_context(|| format!("Failed to fetch tile {}", url))?
            .bytes()
            .await
            .with_context(|| format!("Failed to read tile {}", url))?;
        let image = image::load_from_memory(&bytes)
            .with_context(|| format!("Failed to decode tile {}", url))?
            .to_rgb8();
        Ok((key, Arc::new(image)))
    }
}
