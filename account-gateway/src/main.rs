//! account-gateway: serves the account gate over HTTP

use account_gateway::{router, AppState};
use account_rs::{logging, AccessGate, AccountConfig, StoreRegistry};
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "account.toml".to_string());
    let config = logging::with_bootstrap(|| AccountConfig::load_or_default(&config_path));

    logging::init(&config.logging);
    info!("Starting account-gateway v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration: {}", config_path);

    let registry = StoreRegistry::new();
    let store = match registry.open(&config.storage).await {
        Ok(store) => store,
        Err(e) => {
            error!(
                "Failed to open account store at {}: {}",
                config.storage.database_path, e
            );
            return Err(e.into());
        }
    };

    let gate = AccessGate::new(store, &config);
    info!(
        "Access gate ready: {} admin(s), {} free uses per day",
        gate.admins().len(),
        gate.policy().daily_limit()
    );

    let app = router(AppState::new(gate));

    let addr = &config.server.listen_addr;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Listening on http://{}", addr);

    axum::serve(listener, app).await?;

    registry.close_all().await;
    Ok(())
}
