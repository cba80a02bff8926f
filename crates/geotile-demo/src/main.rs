//! Headless driver: streams tiles for a camera descending onto the root tile.
//!
//! Configuration is loaded from `config.ron` and can be overridden via CLI flags.
//! Run with `cargo run -p geotile-demo -- --root 7/20/49 --ticks 300`.

mod build;
mod flight;

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::{Duration, Instant};

use clap::Parser;
use geotile_config::{CliArgs, Config};
use geotile_coords::TileBounds;
use geotile_lod::LodStrategy;
use geotile_tree::TileStreamer;
use tracing::{info, warn};

use crate::build::BuildError;
use crate::flight::Flight;

/// Ticks between progress lines and config reload checks.
const REPORT_EVERY: u32 = 60;

/// Upper bound on waiting for in-flight loads after the last tick.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

fn main() -> ExitCode {
    let args = CliArgs::parse();

    let Some(config_dir) = args.config.clone().or_else(Config::default_dir) else {
        eprintln!("No config directory available; pass --config");
        return ExitCode::FAILURE;
    };

    let on_disk = Config::load_or_create(&config_dir).unwrap_or_else(|e| {
        eprintln!("Failed to load config: {e}, using defaults");
        Config::default()
    });
    let mut config = on_disk.clone();
    config.apply_cli_overrides(&args);
    if let Err(e) = config.validate() {
        eprintln!("Invalid configuration: {e}");
        return ExitCode::FAILURE;
    }

    let log_dir = config
        .debug
        .log_dir
        .clone()
        .unwrap_or_else(|| config_dir.join("logs"));
    geotile_log::init_logging(Some(&log_dir), cfg!(debug_assertions), Some(&config));

    let session = Session {
        args,
        config_dir,
        on_disk,
    };
    match run(config, session) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{e}");
            ExitCode::FAILURE
        }
    }
}

/// What a reload needs to rebuild the effective config.
struct Session {
    args: CliArgs,
    config_dir: PathBuf,
    /// `config.ron` as last read, before CLI overrides.
    on_disk: Config,
}

fn run(mut config: Config, mut session: Session) -> Result<(), BuildError> {
    let mut streamer = build::streamer(&config)?;
    let mut strategy = build::lod_strategy(&config.lod)?;

    let root = streamer.tree().root();
    match streamer.tree().metadata() {
        Ok(meta) => info!(
            name = %meta.name,
            min_zoom = meta.min_zoom,
            max_zoom = meta.max_zoom,
            "imagery source"
        ),
        Err(e) => warn!("imagery metadata unavailable: {e}"),
    }
    info!(
        %root,
        max_zoom = streamer.tree().max_zoom(),
        workers = streamer.loader().worker_threads(),
        strategy = ?config.lod.strategy,
        ticks = config.debug.ticks,
        "streaming started"
    );

    let flight = Flight::new(
        &TileBounds::web_mercator(&root),
        config.debug.start_altitude_m,
        config.debug.end_altitude_m,
        config.debug.ticks,
    );
    let started = Instant::now();

    for tick in 0..config.debug.ticks {
        let tick_start = Instant::now();
        let tick_interval = Duration::from_millis(config.lod.tick_interval_ms);

        let camera = flight.camera(tick);
        let actions = strategy.update(streamer.tree_mut(), &camera);
        let pump = streamer.pump();

        for action in &actions {
            tracing::debug!(tick, "{action}");
        }
        if pump.stale > 0 {
            tracing::debug!(tick, stale = pump.stale, "dropped stale loads");
        }

        if tick % REPORT_EVERY == 0 {
            report(&streamer, tick, flight.altitude(tick));
            if let Some(next) = reload(&config, &mut session) {
                apply_reload(&mut streamer, &mut strategy, &config, &next);
                config = next;
            }
        }

        if let Some(rest) = tick_interval.checked_sub(tick_start.elapsed()) {
            std::thread::sleep(rest);
        }
    }

    let drain_start = Instant::now();
    while streamer.is_busy() && drain_start.elapsed() < DRAIN_TIMEOUT {
        streamer.pump();
        std::thread::sleep(Duration::from_millis(config.lod.tick_interval_ms));
    }

    let stats = streamer.tree().stats();
    info!(
        elapsed_ms = started.elapsed().as_millis() as u64,
        nodes = stats.nodes,
        live = stats.live,
        surfaces = stats.visible_surfaces,
        pending = stats.pending_loads,
        requests = stats.requests_issued,
        "streaming finished"
    );
    Ok(())
}

fn report(streamer: &TileStreamer, tick: u32, altitude: f64) {
    let stats = streamer.tree().stats();
    let deepest = streamer
        .tree()
        .visible_surfaces()
        .iter()
        .map(|node| node.level())
        .max()
        .unwrap_or(0);
    info!(
        tick,
        altitude_m = altitude.round(),
        live = stats.live,
        surfaces = stats.visible_surfaces,
        deepest,
        pending = stats.pending_loads,
        in_flight = streamer.loader().in_flight_count(),
        "tick"
    );
}

/// Re-read `config.ron` and return the new effective config if it changed
/// and validates. CLI overrides still win over the file.
fn reload(config: &Config, session: &mut Session) -> Option<Config> {
    let on_disk = match session.on_disk.reload(&session.config_dir) {
        Ok(Some(on_disk)) => on_disk,
        Ok(None) => return None,
        Err(e) => {
            warn!("config reload failed: {e}");
            return None;
        }
    };
    session.on_disk = on_disk.clone();
    let mut next = on_disk;
    next.apply_cli_overrides(&session.args);
    // Values fixed for this run.
    next.map = config.map.clone();
    next.loader = config.loader.clone();
    next.debug = config.debug.clone();
    match next.validate() {
        Ok(()) if next != *config => Some(next),
        Ok(()) => None,
        Err(e) => {
            warn!("ignoring reloaded config: {e}");
            None
        }
    }
}

fn apply_reload(
    streamer: &mut TileStreamer,
    strategy: &mut Box<dyn LodStrategy>,
    current: &Config,
    next: &Config,
) {
    if next.lod != current.lod {
        match build::lod_strategy(&next.lod) {
            Ok(replacement) => {
                *strategy = replacement;
                info!(strategy = ?next.lod.strategy, "LOD settings reloaded");
            }
            Err(e) => warn!("keeping LOD settings: {e}"),
        }
    }
    if next.provider != current.provider {
        let provider = build::provider(&next.provider);
        info!(name = provider.name(), "imagery provider reloaded");
        streamer.tree_mut().set_image_provider(provider);
    }
    if next.height_provider != current.height_provider && streamer.tree().height_provider().is_some() {
        let provider = build::provider(&next.height_provider);
        info!(name = provider.name(), "height provider reloaded");
        streamer.tree_mut().set_height_provider(Some(provider));
    }
}
