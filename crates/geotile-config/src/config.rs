//! Configuration structs with sensible defaults and RON persistence.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Deepest zoom level a tile coordinate can address.
const MAX_LEVEL: u8 = 30;

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Imagery source draped over every tile.
    pub provider: ProviderConfig,
    /// Elevation source, used when `map.mode` is `Height`.
    pub height_provider: ProviderConfig,
    /// Root tile and surface settings.
    pub map: MapConfig,
    /// Level-of-detail tuning.
    pub lod: LodConfig,
    /// Background loader settings.
    pub loader: LoaderConfig,
    /// Debug/development settings.
    pub debug: DebugConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            provider: ProviderConfig::default(),
            height_provider: ProviderConfig::debug_terrain(),
            map: MapConfig::default(),
            lod: LodConfig::default(),
            loader: LoaderConfig::default(),
            debug: DebugConfig::default(),
        }
    }
}

/// Which tile source a [`ProviderConfig`] builds.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    /// Generated checkerboard, no network.
    #[default]
    Debug,
    /// Generated terrain-RGB relief, no network.
    DebugTerrain,
    /// OpenStreetMap standard tiles.
    OpenStreetMap,
    /// OpenTopoMap tiles.
    OpenTopoMap,
    /// Mapbox raster tiles, needs `api_key` and `map_id`.
    Mapbox,
    /// Mapbox terrain-RGB elevation, needs `api_key`.
    MapboxTerrainRgb,
    /// Bing aerial imagery.
    Bing,
    /// Any `{z}/{x}/{y}` URL template.
    Url,
}

impl ProviderKind {
    fn needs_api_key(self) -> bool {
        matches!(self, ProviderKind::Mapbox | ProviderKind::MapboxTerrainRgb)
    }
}

/// A tile source.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ProviderConfig {
    /// Source kind.
    pub kind: ProviderKind,
    /// Display name for `Url` providers.
    pub name: String,
    /// Template for `Url` providers, with `{z}`, `{x}`, `{y}`, `{s}`,
    /// `{quadkey}` and `{key}` placeholders.
    pub url_template: String,
    /// Subdomains substituted for `{s}` in `Url` templates.
    pub subdomains: Vec<String>,
    /// Mapbox map id (e.g. "mapbox.satellite").
    pub map_id: String,
    /// API key or access token.
    pub api_key: String,
    /// Overrides the source's minimum zoom.
    pub min_zoom: Option<u8>,
    /// Overrides the source's maximum zoom.
    pub max_zoom: Option<u8>,
    /// HTTP timeout per request in milliseconds.
    pub timeout_ms: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            kind: ProviderKind::Debug,
            name: "Custom".to_string(),
            url_template: String::new(),
            subdomains: Vec::new(),
            map_id: "mapbox.satellite".to_string(),
            api_key: String::new(),
            min_zoom: None,
            max_zoom: None,
            timeout_ms: 10_000,
        }
    }
}

impl ProviderConfig {
    /// The default elevation source.
    #[must_use]
    pub fn debug_terrain() -> Self {
        Self {
            kind: ProviderKind::DebugTerrain,
            ..Default::default()
        }
    }
}

/// Surface mode of the tree.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum MapMode {
    /// Flat tiles.
    #[default]
    Planar,
    /// Tiles displaced by the height provider.
    Height,
}

/// How elevation is packed into height tile pixels.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum HeightEncoding {
    /// Mapbox terrain-RGB.
    #[default]
    TerrainRgb,
    /// Mapzen/AWS terrarium.
    Terrarium,
}

/// Root tile and surface configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MapConfig {
    /// Zoom level of the root tile.
    pub root_level: u8,
    /// Column of the root tile.
    pub root_x: u32,
    /// Row of the root tile.
    pub root_y: u32,
    /// Planar or height-displaced surfaces.
    pub mode: MapMode,
    /// Height samples per tile edge.
    pub height_resolution: usize,
    /// Multiplier applied to decoded heights.
    pub height_exaggeration: f64,
    /// Pixel packing of height tiles.
    pub height_encoding: HeightEncoding,
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            root_level: 0,
            root_x: 0,
            root_y: 0,
            mode: MapMode::Planar,
            height_resolution: 33,
            height_exaggeration: 1.0,
            height_encoding: HeightEncoding::TerrainRgb,
        }
    }
}

/// Which LOD strategy drives the tree.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum LodStrategyKind {
    /// Random screen rays scored against thresholds.
    #[default]
    Raycast,
    /// Camera distance to tile centres.
    Radial,
}

/// Level-of-detail configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LodConfig {
    /// Strategy used each tick.
    pub strategy: LodStrategyKind,
    /// Random rays cast per tick.
    pub subdivision_rays: u32,
    /// Score above which a hit tile subdivides.
    pub threshold_up: f64,
    /// Score below which a hit tile's parent simplifies.
    pub threshold_down: f64,
    /// Raise distances as `(2d)^level`.
    pub use_power_distance: bool,
    /// Score as `1.3 * scale / distance`.
    pub use_scale_distance: bool,
    /// Time between LOD ticks in milliseconds.
    pub tick_interval_ms: u64,
    /// Radial strategy: subdivide within this many tile widths.
    pub radial_subdivide_factor: f64,
    /// Radial strategy: simplify beyond this many parent widths.
    pub radial_simplify_factor: f64,
    /// Fixed ray seed for reproducible runs.
    pub seed: Option<u64>,
}

impl Default for LodConfig {
    fn default() -> Self {
        Self {
            strategy: LodStrategyKind::Raycast,
            subdivision_rays: 1,
            threshold_up: 0.6,
            threshold_down: 0.15,
            use_power_distance: false,
            use_scale_distance: true,
            tick_interval_ms: 16,
            radial_subdivide_factor: 2.0,
            radial_simplify_factor: 4.0,
            seed: None,
        }
    }
}

/// Background loader configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoaderConfig {
    /// Worker threads fetching tiles.
    pub worker_threads: usize,
    /// Requests that may wait for a worker.
    pub queue_capacity: usize,
    /// Finished loads that may wait to be applied.
    pub result_capacity: usize,
    /// Retries after a failed fetch.
    pub max_retries: u32,
    /// First retry delay in milliseconds.
    pub initial_backoff_ms: u64,
    /// Upper bound on any retry delay in milliseconds.
    pub max_backoff_ms: u64,
    /// Jitter (0.0 - 1.0) applied to each delay.
    pub backoff_jitter: f64,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            worker_threads: 4,
            queue_capacity: 256,
            result_capacity: 256,
            max_retries: 2,
            initial_backoff_ms: 250,
            max_backoff_ms: 5_000,
            backoff_jitter: 0.25,
        }
    }
}

/// Debug/development configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DebugConfig {
    /// Log level override (e.g., "debug", "info", "warn").
    pub log_level: String,
    /// Directory for JSON log files; the platform data dir when unset.
    pub log_dir: Option<PathBuf>,
    /// Ticks the demo runs before exiting.
    pub ticks: u32,
    /// Demo camera height above the root tile at the first tick, in metres.
    pub start_altitude_m: f64,
    /// Demo camera height at the last tick, in metres.
    pub end_altitude_m: f64,
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_dir: None,
            ticks: 600,
            start_altitude_m: 40_000_000.0,
            end_altitude_m: 2_000.0,
        }
    }
}

// --- Load / Save / Reload ---

impl Config {
    /// Platform config directory (`~/.config/geotile` on Linux).
    #[must_use]
    pub fn default_dir() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("geotile"))
    }

    /// Load config from the given directory, or create a default config file.
    pub fn load_or_create(config_dir: &Path) -> Result<Self, ConfigError> {
        let config_path = config_dir.join("config.ron");

        if config_path.exists() {
            let contents = std::fs::read_to_string(&config_path).map_err(ConfigError::ReadError)?;
            let config: Config = ron::from_str(&contents).map_err(ConfigError::ParseError)?;
            log::info!("Loaded config from {}", config_path.display());
            Ok(config)
        } else {
            let config = Config::default();
            config.save(config_dir)?;
            log::info!("Created default config at {}", config_path.display());
            Ok(config)
        }
    }

    /// Save config to the given directory as `config.ron`.
    pub fn save(&self, config_dir: &Path) -> Result<(), ConfigError> {
        std::fs::create_dir_all(config_dir).map_err(ConfigError::WriteError)?;

        let config_path = config_dir.join("config.ron");
        let pretty = ron::ser::PrettyConfig::new()
            .depth_limit(3)
            .separate_tuple_members(true)
            .enumerate_arrays(false);

        let serialized =
            ron::ser::to_string_pretty(self, pretty).map_err(ConfigError::SerializeError)?;

        std::fs::write(&config_path, serialized).map_err(ConfigError::WriteError)?;
        Ok(())
    }

    /// Hot-reload: returns `Some(new_config)` if the file changed, `None` otherwise.
    pub fn reload(&self, config_dir: &Path) -> Result<Option<Self>, ConfigError> {
        let config_path = config_dir.join("config.ron");
        let contents = std::fs::read_to_string(&config_path).map_err(ConfigError::ReadError)?;
        let new_config: Config = ron::from_str(&contents).map_err(ConfigError::ParseError)?;

        if &new_config != self {
            log::info!("Config reloaded with changes");
            Ok(Some(new_config))
        } else {
            Ok(None)
        }
    }
}

// --- Validation ---

fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::InvalidValue {
        field,
        reason: reason.into(),
    }
}

impl ProviderConfig {
    fn validate(&self, section: &'static str) -> Result<(), ConfigError> {
        if let (Some(min), Some(max)) = (self.min_zoom, self.max_zoom) {
            if min > max {
                return Err(invalid(section, format!("min_zoom {min} exceeds max_zoom {max}")));
            }
        }
        if self.max_zoom.is_some_and(|max| max > MAX_LEVEL) {
            return Err(invalid(section, format!("max_zoom must be at most {MAX_LEVEL}")));
        }
        if self.kind == ProviderKind::Url && self.url_template.is_empty() {
            return Err(invalid(section, "url provider needs a url_template"));
        }
        if self.kind.needs_api_key() && self.api_key.is_empty() {
            return Err(invalid(section, format!("{:?} provider needs an api_key", self.kind)));
        }
        if self.timeout_ms == 0 {
            return Err(invalid(section, "timeout_ms must be positive"));
        }
        Ok(())
    }
}

impl MapConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.root_level > MAX_LEVEL {
            return Err(invalid("map.root_level", format!("must be at most {MAX_LEVEL}")));
        }
        let grid = 1u64 << self.root_level;
        if u64::from(self.root_x) >= grid || u64::from(self.root_y) >= grid {
            return Err(invalid(
                "map.root_x",
                format!(
                    "root ({}, {}) outside the {grid}x{grid} grid of level {}",
                    self.root_x, self.root_y, self.root_level
                ),
            ));
        }
        if self.height_resolution < 2 {
            return Err(invalid("map.height_resolution", "must be at least 2"));
        }
        if !self.height_exaggeration.is_finite() {
            return Err(invalid("map.height_exaggeration", "must be finite"));
        }
        Ok(())
    }
}

impl LodConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.subdivision_rays == 0 {
            return Err(invalid("lod.subdivision_rays", "must be at least 1"));
        }
        if !self.threshold_up.is_finite() || !self.threshold_down.is_finite() {
            return Err(invalid("lod.threshold_up", "thresholds must be finite"));
        }
        if self.threshold_down >= self.threshold_up {
            return Err(invalid(
                "lod.threshold_down",
                format!(
                    "threshold_down ({}) must be below threshold_up ({})",
                    self.threshold_down, self.threshold_up
                ),
            ));
        }
        if self.tick_interval_ms == 0 {
            return Err(invalid("lod.tick_interval_ms", "must be positive"));
        }
        if !(self.radial_subdivide_factor > 0.0
            && self.radial_subdivide_factor < self.radial_simplify_factor)
        {
            return Err(invalid(
                "lod.radial_simplify_factor",
                "radial factors must satisfy 0 < subdivide < simplify",
            ));
        }
        Ok(())
    }
}

impl LoaderConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.worker_threads == 0 {
            return Err(invalid("loader.worker_threads", "must be at least 1"));
        }
        if self.queue_capacity == 0 || self.result_capacity == 0 {
            return Err(invalid("loader.queue_capacity", "capacities must be at least 1"));
        }
        if self.initial_backoff_ms > self.max_backoff_ms {
            return Err(invalid(
                "loader.initial_backoff_ms",
                "must not exceed max_backoff_ms",
            ));
        }
        if !(0.0..=1.0).contains(&self.backoff_jitter) {
            return Err(invalid("loader.backoff_jitter", "must be within 0.0 - 1.0"));
        }
        Ok(())
    }
}

impl Config {
    /// Check every section, reporting the first out-of-range value.
    ///
    /// The height provider is only checked in height mode.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.provider.validate("provider")?;
        if self.map.mode == MapMode::Height {
            self.height_provider.validate("height_provider")?;
        }
        self.map.validate()?;
        self.lod.validate()?;
        self.loader.validate()?;
        if self.debug.ticks == 0 {
            return Err(invalid("debug.ticks", "must be at least 1"));
        }
        Ok(())
    }
}
