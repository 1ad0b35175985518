use clap::Parser;
use std::net::SocketAddr;

use crate::basemap::DEFAULT_TILE_URL;
use crate::RenderOptions;

/// Server settings, read from flags with environment fallbacks
#[derive(Parser, Debug, Clone)]
#[command(name = "plotdash")]
#[command(about = "Serve survey plots and maps over HTTP", long_about = None)]
pub struct Config {
    /// Postgres connection string
    #[arg(long, env = "DB_URI")]
    pub db_uri: String,

    /// Address to listen on
    #[arg(long = "bind", env = "BIND_ADDR", default_value = "0.0.0.0:8000")]
    pub bind_addr: SocketAddr,

    #[arg(long, env = "DB_MAX_CONNECTIONS", default_value_t = 5)]
    pub max_connections: u32,

    /// Slippy-map tile URL with {z}, {x} and {y} placeholders
    #[arg(long, env = "TILE_URL", default_value = DEFAULT_TILE_URL)]
    pub tile_url: String,

    /// Draw maps on a plain background instead of fetching tiles
    #[arg(long, env = "NO_BASEMAP")]
    pub no_basemap: bool,

    /// Pixels per inch for raster output
    #[arg(long = "dpi", env = "PLOT_DPI", default_value_t = 100.0)]
    pub dpi: f64,
}

impl Config {
    pub fn render_options(&self) -> RenderOptions {
        RenderOptions { dpi: self.dpi }
    }
}
