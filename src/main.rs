use anyhow::{Context, Result};
use clap::Parser;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tokio::net::TcpListener;

use plotdash::basemap::TileSource;
use plotdash::config::Config;
use plotdash::runtime::Dashboard;
use plotdash::server::build_router;
use plotdash::store::PgStore;

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env file is fine
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "plotdash=info,tower_http=info".into()),
        )
        .init();

    let config = Config::parse();

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(&config.db_uri)
        .await
        .context("Failed to connect to database")?;
    tracing::info!(max_connections = config.max_connections, "Connected to database");

    let mut dashboard = Dashboard::new(Arc::new(PgStore::new(pool))).with_render_options(config.render_options());
    if config.no_basemap {
        tracing::info!("Basemap tiles disabled");
    } else {
        dashboard = dashboard.with_tiles(TileSource::new(config.tile_url.clone())?);
        tracing::info!(tile_url = %config.tile_url, "Basemap tiles enabled");
    }

    let app = build_router(Arc::new(dashboard));

    let listener = TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", config.bind_addr))?;
    tracing::info!(addr = %config.bind_addr, "plotdash listening");

    axum::serve(listener, app).await.context("Server error")?;
    Ok(())
}
