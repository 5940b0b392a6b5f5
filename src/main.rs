use parkwatch::frame::ImageFileSource;
use parkwatch::{api, config, occupancy, slots, state};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use tracing::Level;

fn init_tracing(level: &str) {
    let level = level.parse::<Level>().unwrap_or(Level::INFO);
    let subscriber = tracing_subscriber::fmt()
        .with_target(false)
        .with_max_level(level)
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = config::load_default()?;
    init_tracing(config.log_level());
    tracing::info!(
        config_path = config::DEFAULT_CONFIG_PATH,
        app = %config.app.name,
        "parkwatch starting"
    );

    let slot_records = slots::load_slots_from_path(config.slots_path())?;
    tracing::info!(
        path = %config.slots_path().display(),
        count = slot_records.len(),
        "Slot definitions loaded"
    );

    // A missing detector is fatal here, before any frame is read.
    let strategy: Arc<dyn occupancy::model::OccupancyStrategy> =
        Arc::from(occupancy::create_strategy(&config.strategy)?);
    tracing::info!(method = ?strategy.method(), "Occupancy strategy ready");

    let mut app_state = state::AppState::new();
    app_state.set_slots(slot_records);
    let state = Arc::new(RwLock::new(app_state));

    let stop_flag = Arc::new(AtomicBool::new(false));
    let refresh_interval = config.refresh_interval();
    tracing::info!(
        interval_ms = refresh_interval.as_millis(),
        frame_path = %config.frame_path().display(),
        "Starting occupancy refresh thread"
    );
    let refresh_handle = occupancy::spawn_refresh_thread(
        ImageFileSource::new(config.frame_path()),
        Arc::clone(&state),
        refresh_interval,
        Arc::clone(&stop_flag),
        strategy,
    );

    let app = api::router(Arc::clone(&state));
    let port = config.server_port();
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "API server listening");
    let served = axum::serve(listener, app).await;

    stop_flag.store(true, Ordering::Relaxed);
    if refresh_handle.join().is_err() {
        tracing::warn!("Refresh thread panicked");
    }

    served?;
    Ok(())
}
