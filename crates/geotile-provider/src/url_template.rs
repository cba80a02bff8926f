//! HTTP tile provider driven by a URL template.

use std::io::Read;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use geotile_coords::TileCoordinate;
use image::RgbaImage;

use crate::{ProviderError, TileMetadata, TileProvider, ensure_in_range};

/// Largest response body accepted for a single tile or metadata document.
const MAX_BODY_BYTES: u64 = 16 * 1024 * 1024;

/// Fetches tiles over HTTP from a templated URL.
///
/// Recognised placeholders:
/// - `{z}`, `{x}`, `{y}`: tile level, column and row
/// - `{s}`: subdomain, rotated round-robin per request
/// - `{quadkey}`: Bing Maps quadkey
/// - `{key}`: API key / access token
pub struct UrlTemplateProvider {
    name: String,
    template: String,
    subdomains: Vec<String>,
    api_key: Option<String>,
    min_zoom: u8,
    max_zoom: u8,
    metadata_url: Option<String>,
    agent: ureq::Agent,
    next_subdomain: AtomicUsize,
}

impl UrlTemplateProvider {
    /// Default per-request timeout.
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

    /// Create a provider for `template` serving zoom levels 0..=19.
    pub fn new(name: impl Into<String>, template: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            template: template.into(),
            subdomains: Vec::new(),
            api_key: None,
            min_zoom: 0,
            max_zoom: 19,
            metadata_url: None,
            agent: build_agent(Self::DEFAULT_TIMEOUT),
            next_subdomain: AtomicUsize::new(0),
        }
    }

    /// Subdomains substituted for `{s}`.
    #[must_use]
    pub fn with_subdomains<S: Into<String>>(mut self, subdomains: impl IntoIterator<Item = S>) -> Self {
        self.subdomains = subdomains.into_iter().map(Into::into).collect();
        self
    }

    /// Key substituted for `{key}`.
    #[must_use]
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Served zoom range.
    #[must_use]
    pub fn with_zoom_range(mut self, min_zoom: u8, max_zoom: u8) -> Self {
        self.min_zoom = min_zoom;
        self.max_zoom = max_zoom;
        self
    }

    /// TileJSON endpoint used by [`TileProvider::metadata`]. `{key}` is substituted.
    #[must_use]
    pub fn with_metadata_url(mut self, url: impl Into<String>) -> Self {
        self.metadata_url = Some(url.into());
        self
    }

    /// Per-request timeout covering connect and read.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.agent = build_agent(timeout);
        self
    }

    /// OpenStreetMap standard tiles.
    pub fn openstreetmap() -> Self {
        Self::new("OpenStreetMap", "https://{s}.tile.openstreetmap.org/{z}/{x}/{y}.png")
            .with_subdomains(["a", "b", "c"])
            .with_zoom_range(0, 19)
    }

    /// OpenTopoMap topographic tiles.
    pub fn open_topo_map() -> Self {
        Self::new("OpenTopoMap", "https://{s}.tile.opentopomap.org/{z}/{x}/{y}.png")
            .with_subdomains(["a", "b", "c"])
            .with_zoom_range(0, 17)
    }

    /// Mapbox raster tiles for `map_id` (e.g. `mapbox.satellite`).
    pub fn mapbox(token: impl Into<String>, map_id: &str) -> Self {
        Self::new(
            format!("Mapbox {map_id}"),
            format!("https://api.mapbox.com/v4/{map_id}/{{z}}/{{x}}/{{y}}.png?access_token={{key}}"),
        )
        .with_api_key(token)
        .with_zoom_range(0, 20)
        .with_metadata_url(format!(
            "https://api.mapbox.com/v4/{map_id}.json?access_token={{key}}"
        ))
    }

    /// Mapbox terrain-RGB elevation tiles.
    pub fn mapbox_terrain_rgb(token: impl Into<String>) -> Self {
        Self::new(
            "Mapbox terrain-RGB",
            "https://api.mapbox.com/v4/mapbox.terrain-rgb/{z}/{x}/{y}.pngraw?access_token={key}",
        )
        .with_api_key(token)
        .with_zoom_range(0, 15)
        .with_metadata_url("https://api.mapbox.com/v4/mapbox.terrain-rgb.json?access_token={key}")
    }

    /// Bing Maps aerial imagery addressed by quadkey.
    pub fn bing_aerial() -> Self {
        Self::new(
            "Bing aerial",
            "https://ecn.{s}.tiles.virtualearth.net/tiles/a{quadkey}.jpeg?g=1",
        )
        .with_subdomains(["t0", "t1", "t2", "t3"])
        .with_zoom_range(1, 19)
    }

    /// Expand the template for `coordinate`.
    #[must_use]
    pub fn tile_url(&self, coordinate: &TileCoordinate) -> String {
        let mut url = self
            .template
            .replace("{z}", &coordinate.level.to_string())
            .replace("{x}", &coordinate.x.to_string())
            .replace("{y}", &coordinate.y.to_string());
        if url.contains("{quadkey}") {
            url = url.replace("{quadkey}", &coordinate.quadkey());
        }
        if !self.subdomains.is_empty() {
            let i = self.next_subdomain.fetch_add(1, Ordering::Relaxed) % self.subdomains.len();
            url = url.replace("{s}", &self.subdomains[i]);
        }
        self.substitute_key(url)
    }

    fn substitute_key(&self, url: String) -> String {
        match &self.api_key {
            Some(key) => url.replace("{key}", key),
            None => url,
        }
    }

    fn get_bytes(&self, url: &str) -> Result<Vec<u8>, ProviderError> {
        let response = self
            .agent
            .get(url)
            .call()
            .map_err(|e| ProviderError::from_ureq(url, e))?;
        let mut bytes = Vec::new();
        response
            .into_reader()
            .take(MAX_BODY_BYTES)
            .read_to_end(&mut bytes)?;
        Ok(bytes)
    }
}

fn build_agent(timeout: Duration) -> ureq::Agent {
    ureq::AgentBuilder::new().timeout(timeout).build()
}

impl TileProvider for UrlTemplateProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn min_zoom(&self) -> u8 {
        self.min_zoom
    }

    fn max_zoom(&self) -> u8 {
        self.max_zoom
    }

    fn fetch_tile(&self, coordinate: &TileCoordinate) -> Result<RgbaImage, ProviderError> {
        ensure_in_range(self, coordinate)?;
        let url = self.tile_url(coordinate);
        log::trace!("GET {url}");
        let bytes = self.get_bytes(&url)?;
        Ok(image::load_from_memory(&bytes)?.to_rgba8())
    }

    fn metadata(&self) -> Result<TileMetadata, ProviderError> {
        let Some(template) = &self.metadata_url else {
            return Ok(TileMetadata::from_zoom_range(
                &self.name,
                self.min_zoom,
                self.max_zoom,
            ));
        };
        let url = self.substitute_key(template.clone());
        let bytes = self.get_bytes(&url)?;
        let mut meta: TileMetadata = serde_json::from_slice(&bytes)?;
        if meta.name.is_empty() {
            meta.name = self.name.clone();
        }
        Ok(meta)
    }
}
