use tracing_subscriber::EnvFilter;

use chunkrun_server::build_app;
use chunkrun_server::config::{LogFormat, ServerConfig};

#[tokio::main]
async fn main() {
    let (config, source) = ServerConfig::load();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    match config.log_format {
        LogFormat::Pretty => tracing_subscriber::fmt().with_env_filter(filter).init(),
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init(),
    }

    source.log();
    config.validate();

    let listen_addr = config.listen_addr.clone();
    let listener = match tokio::net::TcpListener::bind(&listen_addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(addr = %listen_addr, error = %e, "Failed to bind");
            std::process::exit(1);
        },
    };

    tracing::info!(
        addr = %listen_addr,
        web_root = %config.web_root,
        tick_rate_hz = config.simulation.tick_rate_hz,
        "chunkrun server starting"
    );

    let (app, _state) = build_app(config);
    if let Err(e) = axum::serve(listener, app).await {
        tracing::error!(error = %e, "Server error");
        std::process::exit(1);
    }
}
