use anyhow::Context;
use clap::Parser;
use std::net::{IpAddr, SocketAddr};
use tracing::info;

use mmserver::{
    config::{AppConfig, Args},
    logging, state::AppState, web,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    logging::init_logging_with_debug(args.debug)?;

    let config = AppConfig::load(&args).context("Failed to load configuration")?;

    if args.init_config {
        let path = AppConfig::config_file_path(&args)
            .context("Could not determine a configuration file location")?;
        config.save_to_file(&path)?;
        info!("Wrote configuration to {}", path.display());
        return Ok(());
    }

    let base_url = config.base_url();
    logging::log_startup_info(&config, &base_url);

    let app_state = AppState::from_config(&config, &base_url)?;
    let app = web::create_router(app_state);

    let host: IpAddr = config
        .server
        .interface
        .parse()
        .with_context(|| format!("Invalid interface address: {}", config.server.interface))?;
    let addr = SocketAddr::new(host, config.server.port);
    info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(listener, app.into_make_service())
        .await
        .context("HTTP server failed")?;

    Ok(())
}
