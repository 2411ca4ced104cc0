use clap::Parser;
use log::{error, info, warn};
use nature_remo_sensors::client::RemoClient;
use nature_remo_sensors::config::Config;
use nature_remo_sensors::services::poller::{PollEvent, Poller, RefreshOutcome};
use nature_remo_sensors::services::sensors::{self, SensorDescriptor};
use nature_remo_sensors::services::setup;
use nature_remo_sensors::snapshot::Snapshot;
use nature_remo_sensors::utils::describe_reading;
use std::path::PathBuf;
use std::sync::mpsc;

/// Poll a Nature Remo account and log its sensor readings.
#[derive(Debug, Parser)]
#[command(version)]
struct Cli {
    /// Refresh once, log every sensor reading, then exit.
    #[arg(long, conflicts_with = "setup")]
    once: bool,
    /// Validate the access token and write the account entry to PATH.
    #[arg(long, value_name = "PATH")]
    setup: Option<PathBuf>,
}

fn log_readings(sensors: &[SensorDescriptor], snapshot: &Snapshot) {
    for sensor in sensors {
        info!("{}", describe_reading(sensor, &sensor.read(snapshot)));
    }
}

fn run_setup(cfg: &Config, client: &RemoClient, path: PathBuf) -> Result<(), String> {
    let entry = setup::validate(client, &cfg.access_token, cfg.cool_temperature, cfg.heat_temperature)
        .map_err(|e| format!("setup failed ({}): {}", e.reason(), e))?;
    entry.store(&path).map_err(|e| e.to_string())?;
    info!("Account {} stored in {}", entry.mac, path.display());
    Ok(())
}

fn run(cli: Cli) -> Result<(), String> {
    // 1) Load config
    let cfg = Config::from_env().map_err(|e| e.to_string())?;
    info!(
        "Config loaded (api={}, poll_interval={}s, request_timeout={}s, cool={}, heat={})",
        cfg.api_base_url,
        cfg.poll_interval.as_secs(),
        cfg.request_timeout.as_secs(),
        cfg.cool_temperature,
        cfg.heat_temperature
    );

    // 2) Init API client
    let client = RemoClient::with_options(&cfg.api_base_url, &cfg.access_token, cfg.request_timeout);

    if let Some(path) = cli.setup {
        return run_setup(&cfg, &client, path);
    }

    // 3) First refresh; nothing to discover without it
    let poller = Poller::new(client);
    let snapshot = match poller.request_refresh() {
        RefreshOutcome::Updated(snapshot) => snapshot,
        RefreshOutcome::Failed(f) => {
            return Err(format!("initial refresh failed ({}): {}", f.kind.reason(), f.message));
        }
    };

    // 4) Discover sensors once; the set stays fixed for this run
    let sensors = sensors::discover(&snapshot);
    info!("Discovered {} sensor(s)", sensors.len());
    log_readings(&sensors, &snapshot);

    if cli.once {
        return Ok(());
    }

    // 5) Log readings after every refresh
    poller.subscribe(move |event| match event {
        PollEvent::Updated(snapshot) => log_readings(&sensors, snapshot),
        PollEvent::Failed(f) => warn!("Sensors stale since {}: {}", f.at, f.message),
    });

    // 6) Polling loop (steady cadence); the sender is never dropped so this runs until killed
    let (_shutdown_tx, shutdown_rx) = mpsc::channel();
    poller.run_loop(cfg.poll_interval, &shutdown_rx);
    Ok(())
}

fn main() {
    let cli = Cli::parse();

    let default_filter = env_logger::Env::default().default_filter_or("info");
    env_logger::Builder::from_env(default_filter)
        .format_timestamp_secs()
        .init();

    info!(
        "nature-remo-sensors {} (git {}) starting",
        env!("CARGO_PKG_VERSION"),
        env!("BUILD_TIME_GIT_HASH")
    );
    if let Err(e) = run(cli) {
        error!("fatal: {}", e);
        std::process::exit(1);
    }
}
