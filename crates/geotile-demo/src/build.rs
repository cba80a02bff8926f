//! Turning a validated [`Config`] into providers, a tree, a loader and a LOD
//! strategy.

use std::sync::Arc;
use std::time::Duration;

use geotile_config::{
    Config, HeightEncoding, LoaderConfig, LodConfig, LodStrategyKind, MapConfig, MapMode,
    ProviderConfig, ProviderKind,
};
use geotile_coords::{TileBounds, TileCoordinate};
use geotile_lod::{LodError, LodRadial, LodRaycast, LodSettings, LodStrategy, RadialSettings};
use geotile_provider::{DebugProvider, HeightDecoder, RetryPolicy, TileProvider, UrlTemplateProvider};
use geotile_tree::{HeightSettings, LoaderSettings, SurfaceKind, TileLoader, TileQuadtree, TileStreamer};

/// Failures while assembling the runtime from configuration.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    /// The configured root is not a tile coordinate.
    #[error("root tile {level}/{x}/{y} is outside the tile grid")]
    InvalidRoot { level: u8, x: u32, y: u32 },

    /// LOD parameters were rejected.
    #[error(transparent)]
    Lod(#[from] LodError),

    /// Loader threads could not be spawned.
    #[error("failed to start tile loader: {0}")]
    Loader(#[source] std::io::Error),
}

/// Build the provider described by `config`.
pub fn provider(config: &ProviderConfig) -> Arc<dyn TileProvider> {
    let timeout = Duration::from_millis(config.timeout_ms);
    let url = match config.kind {
        ProviderKind::Debug => return Arc::new(debug_zoom(DebugProvider::checker(), config)),
        ProviderKind::DebugTerrain => return Arc::new(debug_zoom(DebugProvider::terrain(), config)),
        ProviderKind::OpenStreetMap => UrlTemplateProvider::openstreetmap(),
        ProviderKind::OpenTopoMap => UrlTemplateProvider::open_topo_map(),
        ProviderKind::Mapbox => UrlTemplateProvider::mapbox(config.api_key.clone(), &config.map_id),
        ProviderKind::MapboxTerrainRgb => UrlTemplateProvider::mapbox_terrain_rgb(config.api_key.clone()),
        ProviderKind::Bing => UrlTemplateProvider::bing_aerial(),
        ProviderKind::Url => UrlTemplateProvider::new(config.name.clone(), config.url_template.clone())
            .with_subdomains(config.subdomains.iter().cloned()),
    };
    let (min_zoom, max_zoom) = zoom_range(&url, config);
    let mut url = url.with_zoom_range(min_zoom, max_zoom).with_timeout(timeout);
    if !config.api_key.is_empty() {
        url = url.with_api_key(config.api_key.clone());
    }
    Arc::new(url)
}

fn zoom_range(provider: &dyn TileProvider, config: &ProviderConfig) -> (u8, u8) {
    (
        config.min_zoom.unwrap_or(provider.min_zoom()),
        config.max_zoom.unwrap_or(provider.max_zoom()),
    )
}

fn debug_zoom(provider: DebugProvider, config: &ProviderConfig) -> DebugProvider {
    let (min_zoom, max_zoom) = zoom_range(&provider, config);
    provider.with_zoom_range(min_zoom, max_zoom)
}

/// Height decoding parameters of the map section.
pub fn height_settings(map: &MapConfig) -> HeightSettings {
    let decoder = match map.height_encoding {
        HeightEncoding::TerrainRgb => HeightDecoder::default(),
        HeightEncoding::Terrarium => HeightDecoder::Terrarium,
    };
    HeightSettings {
        decoder,
        resolution: map.height_resolution,
        exaggeration: map.height_exaggeration,
    }
}

/// Root coordinate of the map section.
pub fn root(map: &MapConfig) -> Result<TileCoordinate, BuildError> {
    TileCoordinate::try_new(map.root_level, map.root_x, map.root_y).ok_or(BuildError::InvalidRoot {
        level: map.root_level,
        x: map.root_x,
        y: map.root_y,
    })
}

/// Tree rooted at the configured tile, in web-mercator metres.
pub fn tree(config: &Config) -> Result<TileQuadtree, BuildError> {
    let root = root(&config.map)?;
    let kind = match config.map.mode {
        MapMode::Planar => SurfaceKind::Planar,
        MapMode::Height => SurfaceKind::Height {
            provider: provider(&config.height_provider),
            settings: height_settings(&config.map),
        },
    };
    Ok(TileQuadtree::new(
        root,
        TileBounds::web_mercator(&root),
        provider(&config.provider),
        kind,
    ))
}

pub fn loader_settings(config: &LoaderConfig) -> LoaderSettings {
    LoaderSettings {
        worker_threads: config.worker_threads,
        queue_capacity: config.queue_capacity,
        result_capacity: config.result_capacity,
        retry: RetryPolicy {
            max_retries: config.max_retries,
            initial_delay: Duration::from_millis(config.initial_backoff_ms),
            max_delay: Duration::from_millis(config.max_backoff_ms),
            jitter: config.backoff_jitter,
            ..RetryPolicy::default()
        },
    }
}

/// Tree plus a running loader.
pub fn streamer(config: &Config) -> Result<TileStreamer, BuildError> {
    let tree = tree(config)?;
    let loader = TileLoader::new(loader_settings(&config.loader)).map_err(BuildError::Loader)?;
    Ok(TileStreamer::new(tree, loader))
}

/// The configured LOD strategy.
pub fn lod_strategy(config: &LodConfig) -> Result<Box<dyn LodStrategy>, LodError> {
    match config.strategy {
        LodStrategyKind::Raycast => {
            let settings = LodSettings {
                subdivision_rays: config.subdivision_rays,
                threshold_up: config.threshold_up,
                threshold_down: config.threshold_down,
                use_power_distance: config.use_power_distance,
                use_scale_distance: config.use_scale_distance,
            };
            let lod = match config.seed {
                Some(seed) => LodRaycast::with_seed(settings, seed)?,
                None => LodRaycast::new(settings)?,
            };
            Ok(Box::new(lod))
        }
        LodStrategyKind::Radial => Ok(Box::new(LodRadial::new(RadialSettings {
            subdivide_factor: config.radial_subdivide_factor,
            simplify_factor: config.radial_simplify_factor,
        })?)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_kinds_resolve() {
        let mut config = ProviderConfig::default();
        assert_eq!(provider(&config).max_zoom(), 20);

        config.kind = ProviderKind::OpenTopoMap;
        let topo = provider(&config);
        assert_eq!(topo.name(), "OpenTopoMap");
        assert_eq!(topo.max_zoom(), 17);

        config.kind = ProviderKind::Url;
        config.name = "Tiles".to_string();
        config.url_template = "https://tiles.example/{z}/{x}/{y}.png".to_string();
        assert_eq!(provider(&config).name(), "Tiles");
    }

    #[test]
    fn test_zoom_override_applies() {
        let config = ProviderConfig {
            kind: ProviderKind::OpenStreetMap,
            max_zoom: Some(12),
            ..Default::default()
        };
        let osm = provider(&config);
        assert_eq!((osm.min_zoom(), osm.max_zoom()), (0, 12));

        let debug = provider(&ProviderConfig {
            min_zoom: Some(3),
            ..Default::default()
        });
        assert_eq!((debug.min_zoom(), debug.max_zoom()), (3, 20));
    }

    #[test]
    fn test_height_settings_follow_encoding() {
        let mut map = MapConfig::default();
        assert_eq!(height_settings(&map).decoder, HeightDecoder::default());
        map.height_encoding = HeightEncoding::Terrarium;
        map.height_resolution = 17;
        let settings = height_settings(&map);
        assert_eq!(settings.decoder, HeightDecoder::Terrarium);
        assert_eq!(settings.resolution, 17);
    }

    #[test]
    fn test_invalid_root_rejected() {
        let map = MapConfig {
            root_level: 1,
            root_x: 2,
            ..Default::default()
        };
        assert!(matches!(root(&map), Err(BuildError::InvalidRoot { .. })));
    }

    #[test]
    fn test_tree_issues_root_loads() {
        let mut config = Config::default();
        let mut planar = tree(&config).unwrap();
        assert_eq!(planar.take_requests().len(), 1);

        config.map.mode = MapMode::Height;
        let mut height = tree(&config).unwrap();
        assert!(height.height_provider().is_some());
        assert_eq!(height.take_requests().len(), 2);
        // Debug terrain stops at 15, below the checker's 20.
        assert_eq!(height.max_zoom(), 15);
    }

    #[test]
    fn test_loader_settings_carry_retry() {
        let config = LoaderConfig {
            max_retries: 5,
            initial_backoff_ms: 10,
            ..Default::default()
        };
        let settings = loader_settings(&config);
        assert_eq!(settings.retry.max_retries, 5);
        assert_eq!(settings.retry.initial_delay, Duration::from_millis(10));
        assert_eq!(settings.worker_threads, 4);
    }

    #[test]
    fn test_lod_strategy_validates() {
        assert!(lod_strategy(&LodConfig::default()).is_ok());
        let radial = LodConfig {
            strategy: LodStrategyKind::Radial,
            ..Default::default()
        };
        assert!(lod_strategy(&radial).is_ok());

        let bad = LodConfig {
            threshold_down: 0.9,
            ..Default::default()
        };
        assert!(matches!(lod_strategy(&bad), Err(LodError::InvalidSettings(_))));
    }
}
