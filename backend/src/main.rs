use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tracing::{error, info};

use crate::config::Config;
use crate::file_store::FileStore;
use crate::state::AppState;

mod config;
mod error;
mod file_store;
mod identity;
mod logging;
mod routes;
mod state;

const MAINTENANCE_INTERVAL: Duration = Duration::from_secs(3600);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::from_path(".env").ok();
    logging::setup();

    let config = Config::from_env()?;
    info!("Opening lottery store at {}", config.store_path.display());
    let store = FileStore::open(&config.store_path)?;

    let bind_addr = config.bind_addr;
    let state = AppState::new(config, Arc::new(store))?;

    {
        let stats = state.lottery.lock().stats();
        info!(
            "🎰 Lottery ready: {} codes issued, {} available, {} draws recorded",
            stats.issued_codes, stats.available_codes, stats.total_draws
        );
    }

    // Hourly sweep of stale rate records and unspun sessions
    let maintenance = state.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(MAINTENANCE_INTERVAL);
        interval.tick().await;
        loop {
            interval.tick().await;
            let pruned = maintenance.lottery.lock().prune_rate_records();
            match pruned {
                Ok(0) => {}
                Ok(purged) => info!("Pruned {} stale rate records", purged),
                Err(e) => error!("Error pruning rate records: {}", e),
            }
            let expired = maintenance.sessions.purge_expired();
            if expired > 0 {
                info!(
                    "Dropped {} expired sessions ({} still active)",
                    expired,
                    maintenance.sessions.len()
                );
            }
        }
    });

    let app = routes::app(state);

    info!("listening on {}", bind_addr);
    let listener = TcpListener::bind(bind_addr).await?;
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()).await?;

    Ok(())
}
