// Library exports for plotdash

pub mod error;
pub mod config;
pub mod catalog;
pub mod data;
pub mod store;
pub mod geometry;
pub mod aggregate;

// Rendering pipeline
pub mod text;
pub mod scale;
pub mod palette;
pub mod ir;
pub mod compiler;
pub mod graph;
pub mod render;
pub mod basemap;

// Request surface
pub mod dashboard;
pub mod runtime;
pub mod server;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::DashboardError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Png,
    Jpg,
    Pdf,
    Ps,
    Svg,
}

impl OutputFormat {
    pub const ALL: [OutputFormat; 5] = [
        OutputFormat::Png,
        OutputFormat::Jpg,
        OutputFormat::Pdf,
        OutputFormat::Ps,
        OutputFormat::Svg,
    ];

    pub fn mime_type(self) -> &'static str {
        match self {
            OutputFormat::Png => "image/png",
            OutputFormat::Jpg => "image/jpeg",
            OutputFormat::Pdf => "application/pdf",
            OutputFormat::Ps => "application/postscript",
            OutputFormat::Svg => "image/svg+xml",
        }
    }

    /// The value accepted in the `fmt` query parameter
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Png => "png",
            OutputFormat::Jpg => "jpg",
            OutputFormat::Pdf => "pdf",
            OutputFormat::Ps => "ps",
            OutputFormat::Svg => "svg",
        }
    }

    /// Human readable name for the landing page
    pub fn display_name(self) -> &'static str {
        match self {
            OutputFormat::Png => "png",
            OutputFormat::Jpg => "jpeg",
            OutputFormat::Pdf => "pdf",
            OutputFormat::Ps => "postscript",
            OutputFormat::Svg => "svg",
        }
    }

    /// Parse an optional query value, defaulting to PNG
    pub fn from_query(value: Option<&str>) -> Result<Self, DashboardError> {
        match value {
            None | Some("") => Ok(OutputFormat::default()),
            Some(v) => v.parse(),
        }
    }
}

impl FromStr for OutputFormat {
    type Err = DashboardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OutputFormat::ALL
            .into_iter()
            .find(|f| f.extension() == s)
            .ok_or_else(|| DashboardError::UnsupportedFormat(s.to_string()))
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderOptions {
    /// Pixels per figure unit (inch)
    pub dpi: f64,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self { dpi: 100.0 }
    }
}

impl RenderOptions {
    /// Convert a size in points to pixels at this resolution
    pub fn px(&self, points: f64) -> f64 {
        points * self.dpi / 72.0
    }
}
