//! Command-line argument parsing for the geotile driver.

use std::path::PathBuf;

use clap::Parser;

use crate::{Config, LodStrategyKind, MapMode, ProviderKind};

/// geotile command-line arguments.
///
/// CLI values override settings loaded from `config.ron`.
#[derive(Parser, Debug, Default)]
#[command(name = "geotile", about = "Quadtree map tile streaming")]
pub struct CliArgs {
    /// Imagery provider.
    #[arg(long, value_enum)]
    pub provider: Option<ProviderKind>,

    /// API key for the imagery provider.
    #[arg(long)]
    pub api_key: Option<String>,

    /// URL template for the `url` provider.
    #[arg(long)]
    pub url_template: Option<String>,

    /// Planar or height-displaced surfaces.
    #[arg(long, value_enum)]
    pub mode: Option<MapMode>,

    /// Root tile as `level/x/y`.
    #[arg(long, value_parser = parse_root)]
    pub root: Option<(u8, u32, u32)>,

    /// LOD strategy.
    #[arg(long, value_enum)]
    pub strategy: Option<LodStrategyKind>,

    /// Random rays cast per LOD tick.
    #[arg(long)]
    pub rays: Option<u32>,

    /// Score above which a tile subdivides.
    #[arg(long)]
    pub threshold_up: Option<f64>,

    /// Score below which a tile's parent simplifies.
    #[arg(long)]
    pub threshold_down: Option<f64>,

    /// Fixed ray seed.
    #[arg(long)]
    pub seed: Option<u64>,

    /// Loader worker threads.
    #[arg(long)]
    pub workers: Option<usize>,

    /// Ticks to run before exiting.
    #[arg(long)]
    pub ticks: Option<u32>,

    /// Log level (error, warn, info, debug, trace).
    #[arg(long)]
    pub log_level: Option<String>,

    /// Path to config directory (overrides default location).
    #[arg(long)]
    pub config: Option<PathBuf>,
}

fn parse_root(s: &str) -> Result<(u8, u32, u32), String> {
    let parts: Vec<&str> = s.split('/').collect();
    let [level, x, y] = parts.as_slice() else {
        return Err(format!("expected level/x/y, got `{s}`"));
    };
    let level = level.parse().map_err(|e| format!("bad level `{level}`: {e}"))?;
    let x = x.parse().map_err(|e| format!("bad x `{x}`: {e}"))?;
    let y = y.parse().map_err(|e| format!("bad y `{y}`: {e}"))?;
    Ok((level, x, y))
}

impl Config {
    /// Apply CLI overrides to a loaded config.
    pub fn apply_cli_overrides(&mut self, args: &CliArgs) {
        if let Some(kind) = args.provider {
            self.provider.kind = kind;
        }
        if let Some(ref key) = args.api_key {
            self.provider.api_key = key.clone();
        }
        if let Some(ref template) = args.url_template {
            self.provider.url_template = template.clone();
        }
        if let Some(mode) = args.mode {
            self.map.mode = mode;
        }
        if let Some((level, x, y)) = args.root {
            self.map.root_level = level;
            self.map.root_x = x;
            self.map.root_y = y;
        }
        if let Some(strategy) = args.strategy {
            self.lod.strategy = strategy;
        }
        if let Some(rays) = args.rays {
            self.lod.subdivision_rays = rays;
        }
        if let Some(up) = args.threshold_up {
            self.lod.threshold_up = up;
        }
        if let Some(down) = args.threshold_down {
            self.lod.threshold_down = down;
        }
        if args.seed.is_some() {
            self.lod.seed = args.seed;
        }
        if let Some(workers) = args.workers {
            self.loader.worker_threads = workers;
        }
        if let Some(ticks) = args.ticks {
            self.debug.ticks = ticks;
        }
        if let Some(ref level) = args.log_level {
            self.debug.log_level = level.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_override() {
        let mut config = Config::default();
        let args = CliArgs {
            provider: Some(ProviderKind::OpenStreetMap),
            root: Some((7, 20, 49)),
            rays: Some(3),
            ..Default::default()
        };
        config.apply_cli_overrides(&args);
        assert_eq!(config.provider.kind, ProviderKind::OpenStreetMap);
        assert_eq!(
            (config.map.root_level, config.map.root_x, config.map.root_y),
            (7, 20, 49)
        );
        assert_eq!(config.lod.subdivision_rays, 3);
        // Non-overridden fields retain defaults
        assert_eq!(config.lod.threshold_up, 0.6);
        assert_eq!(config.loader.worker_threads, 4);
    }

    #[test]
    fn test_cli_no_override() {
        let original = Config::default();
        let mut config = Config::default();
        config.apply_cli_overrides(&CliArgs::default());
        assert_eq!(config, original);
    }

    #[test]
    fn test_cli_parses_flags() {
        let args = CliArgs::try_parse_from([
            "geotile",
            "--provider",
            "open-topo-map",
            "--mode",
            "height",
            "--root",
            "3/1/2",
            "--threshold-up",
            "0.9",
            "--config",
            "/tmp/geo",
        ])
        .unwrap();
        assert_eq!(args.provider, Some(ProviderKind::OpenTopoMap));
        assert_eq!(args.mode, Some(MapMode::Height));
        assert_eq!(args.root, Some((3, 1, 2)));
        assert_eq!(args.threshold_up, Some(0.9));
        assert_eq!(args.config, Some(PathBuf::from("/tmp/geo")));
    }

    #[test]
    fn test_bad_root_rejected() {
        assert!(parse_root("3/1").is_err());
        assert!(parse_root("a/1/2").is_err());
        assert!(CliArgs::try_parse_from(["geotile", "--root", "1/2/3/4"]).is_err());
    }
}
