mod bootstrap;
mod console;

use std::sync::Arc;

use anyhow::{bail, Result};
use plunge_core::gateways::{NotificationSink, PersistenceGateway, SensorGateway};
use plunge_core::settings::Settings;
use plunge_devices::{discover_w1_sensors, SimulatedSensors, SysfsPins, SysfsSensors};
use plunge_runtime::{LogNotifier, MonitorSupervisor};
use plunge_store::{MemoryStore, SqliteStore};

#[tokio::main]
async fn main() -> Result<()> {
    let settings = Settings::load_with_saved();

    bootstrap::ensure_directories()?;
    bootstrap::setup_logging(&settings.log_level, settings.log_file.as_ref())?;
    settings.validate()?;

    tracing::info!("Cold plunge monitor v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        sensors = %settings.sensors,
        store = %settings.store,
        notifier = %settings.notifier,
        "configuration loaded"
    );

    match settings.sensors.as_str() {
        "sysfs" => {
            let (Some(room), Some(water)) = (&settings.room_sensor, &settings.water_sensor) else {
                bail!("sysfs sensors require --room-sensor and --water-sensor");
            };
            let probes = discover_w1_sensors(&settings.sysfs_root);
            tracing::info!(?probes, "1-wire probes present");

            let pins = SysfsPins {
                leak: settings.leak_pin,
                pump: settings.pump_pin,
                ozone: settings.ozone_pin,
                leak_active_low: settings.leak_active_low,
            };
            let sensors = SysfsSensors::new(&settings.sysfs_root, room, water, pins);
            with_store(&settings, sensors).await
        }
        _ => with_store(&settings, SimulatedSensors::default()).await,
    }
}

// ── Backend selection ─────────────────────────────────────────────────────────

async fn with_store<S: SensorGateway>(settings: &Settings, sensors: S) -> Result<()> {
    match settings.store.as_str() {
        "memory" => with_notifier(settings, sensors, MemoryStore::new()).await,
        _ => {
            let store = SqliteStore::open(&settings.database_path())?;
            with_notifier(settings, sensors, store).await
        }
    }
}

async fn with_notifier<S, P>(settings: &Settings, sensors: S, store: P) -> Result<()>
where
    S: SensorGateway,
    P: PersistenceGateway,
{
    let notifier = match settings.notifier.as_str() {
        "none" => None,
        _ => Some(LogNotifier),
    };
    run(settings, sensors, store, notifier).await
}

// ── Monitor lifecycle ─────────────────────────────────────────────────────────

async fn run<S, P, N>(settings: &Settings, sensors: S, store: P, notifier: Option<N>) -> Result<()>
where
    S: SensorGateway,
    P: PersistenceGateway,
    N: NotificationSink,
{
    let mut monitor = MonitorSupervisor::new(
        Arc::new(sensors),
        Arc::new(store),
        notifier,
        settings.monitor_config(),
    );
    monitor.start()?;

    println!("Cold plunge monitor running. Type 'help' for commands.");
    let lines = console::spawn_stdin_reader();

    let outcome = tokio::select! {
        result = console::run(&monitor, lines) => result,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Ctrl+C received; shutting down");
            Ok(())
        }
    };

    monitor.cancel_and_wait().await;
    outcome
}
