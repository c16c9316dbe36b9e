use anyhow::Result;
use bucket_gateway::{
    AppConfig, GatewayState, routes, server,
    services::{auth_gate::connect_identity_store, connector_for},
};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // --- Logging setup ---
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // One process-wide rustls provider for every TLS client and listener.
    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        tracing::debug!("rustls crypto provider already installed");
    }

    // --- Parse config ---
    let cfg = AppConfig::from_env_and_args()?;
    tracing::info!("Starting bucket-gateway with config: {:?}", cfg);

    // --- Shared state ---
    let identity_store = connect_identity_store(&cfg.db).await?;
    let connector = connector_for(&cfg.object_store);
    let state = GatewayState::new(&cfg, identity_store, connector)?;

    // --- Build router and serve ---
    let app = routes::routes::app(state, cfg.server.max_upload_bytes);
    server::serve(&cfg.server, app).await
}
