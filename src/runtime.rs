//! Request operations: fetch, aggregate, compile, render.
//!
//! Each operation validates its output format before touching storage and
//! renders on a blocking thread with its own backend.

use async_trait::async_trait;
use std::str::FromStr;
use std::sync::Arc;

use crate::aggregate::{
    aggregate_comparison, aggregate_histogram, aggregate_map, aggregate_means, ComparisonOptions,
    HistogramOptions, MapMode, MapOptions, MeanOptions, Normalization,
};
use crate::basemap::TileSource;
use crate::catalog::CatalogStore;
use crate::compiler::{compile_comparison, compile_histogram, compile_map, compile_means};
use crate::dashboard::IndexPage;
use crate::data::{sanitize_identifier, SurveyStore};
use crate::error::{DashboardError, Result};
use crate::ir::ChartSpec;
use crate::render::{render, Rendered};
use crate::{OutputFormat, RenderOptions};

/// Storage for one request, released when dropped
pub trait Session: CatalogStore + SurveyStore {}

impl<T: CatalogStore + SurveyStore> Session for T {}

/// Everything the dashboard reads from
#[async_trait]
pub trait Store: Send + Sync {
    async fn session(&self) -> Result<Box<dyn Session>>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistogramRequest {
    pub variable: String,
    pub format: OutputFormat,
    pub floor: u64,
    pub keep_missing: bool,
}

/// The four comparison plots
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComparisonKind {
    Count,
    Mean,
    Percentage,
    GroupedPercentage,
}

impl FromStr for ComparisonKind {
    type Err = DashboardError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "count" => Ok(Self::Count),
            "mean" => Ok(Self::Mean),
            "pst" | "percentage" => Ok(Self::Percentage),
            "grppst" | "groupedPercentage" => Ok(Self::GroupedPercentage),
            other => Err(DashboardError::UnknownPlotKind(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComparisonRequest {
    pub first: String,
    pub second: String,
    pub kind: ComparisonKind,
    pub keep_missing: bool,
    pub floor: u64,
    pub format: OutputFormat,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MapRequest {
    pub variable: String,
    pub mode: MapMode,
    pub threshold: i64,
    pub format: OutputFormat,
}

pub struct Dashboard {
    store: Arc<dyn Store>,
    tiles: Option<TileSource>,
    render_options: RenderOptions,
}

impl Dashboard {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self {
            store,
            tiles: None,
            render_options: RenderOptions::default(),
        }
    }

    /// Draw maps over tiles from `tiles`
    pub fn with_tiles(mut self, tiles: TileSource) -> Self {
        self.tiles = Some(tiles);
        self
    }

    pub fn with_render_options(mut self, render_options: RenderOptions) -> Self {
        self.render_options = render_options;
        self
    }

    pub async fn histogram(&self, req: &HistogramRequest) -> Result<Rendered> {
        let variable = sanitize_identifier(&req.variable);
        let (column, dict, description) = {
            let session = self.store.session().await?;
            (
                session.fetch_column(&variable).await?,
                session.lookup_dictionary(&variable).await?,
                session.lookup_description(&variable).await?,
            )
        };

        let opts = HistogramOptions {
            floor: req.floor,
            keep_missing: req.keep_missing,
        };
        let hist = aggregate_histogram(&column, &dict, &opts);
        tracing::debug!(%variable, bars = hist.bars.len(), total = hist.total, "Aggregated histogram");

        self.render(compile_histogram(&hist, &description), req.format).await
    }

    pub async fn comparison(&self, req: &ComparisonRequest) -> Result<Rendered> {
        let first = sanitize_identifier(&req.first);
        let second = sanitize_identifier(&req.second);
        let session = self.store.session().await?;
        let rows = session.fetch_joined_columns(&first, &second).await?;
        let primary = session.lookup_dictionary(&first).await?;
        let first_description = session.lookup_description(&first).await?;
        let second_description = session.lookup_description(&second).await?;

        let spec = match req.kind {
            ComparisonKind::Mean => {
                let means = aggregate_means(&rows, &primary, &MeanOptions { keep_missing: req.keep_missing });
                tracing::debug!(%first, %second, bars = means.bars.len(), "Aggregated means");
                compile_means(&means, &first_description, &second_description)
            }
            kind => {
                let secondary = session.lookup_dictionary(&second).await?;
                let normalization = match kind {
                    ComparisonKind::Percentage => Normalization::Percentage,
                    ComparisonKind::GroupedPercentage => Normalization::GroupedPercentage,
                    _ => Normalization::Counts,
                };
                let opts = ComparisonOptions {
                    floor: req.floor,
                    keep_missing: req.keep_missing,
                    normalization,
                };
                let cmp = aggregate_comparison(&rows, &primary, &secondary, &opts);
                tracing::debug!(%first, %second, groups = cmp.cells.len(), "Aggregated comparison");
                compile_comparison(&cmp, &first_description, &second_description)
            }
        };
        drop(session);

        self.render(spec, req.format).await
    }

    pub async fn map(&self, req: &MapRequest) -> Result<Rendered> {
        let variable = sanitize_identifier(&req.variable);
        let (observations, units) = {
            let session = self.store.session().await?;
            (
                session.fetch_geo_column(&variable).await?,
                session.fetch_geo_units().await?,
            )
        };

        let opts = MapOptions {
            mode: req.mode,
            threshold: req.threshold,
        };
        let map = aggregate_map(&observations, &units, &opts);
        tracing::debug!(%variable, units = map.units.len(), scale = ?map.scale, "Aggregated map");

        let mut spec = compile_map(&map);
        self.attach_basemap(&mut spec).await;
        self.render(spec, req.format).await
    }

    /// Landing page HTML
    pub async fn index(&self) -> Result<String> {
        let variables = self.store.session().await?.list_variables().await?;
        IndexPage::new(variables)?.render()
    }

    /// Fetch tiles under a choropleth; on failure the map is drawn without them
    async fn attach_basemap(&self, spec: &mut ChartSpec) {
        let (Some(tiles), ChartSpec::Choropleth(chart)) = (&self.tiles, spec) else {
            return;
        };
        let Some(extent) = chart.extent else {
            return;
        };
        match tiles.fetch(&extent.pad(0.05)).await {
            Ok(basemap) => chart.basemap = Some(basemap),
            Err(err) => tracing::warn!(error = %format!("{:#}", err), "Basemap unavailable, drawing plain background"),
        }
    }

    async fn render(&self, spec: ChartSpec, format: OutputFormat) -> Result<Rendered> {
        let opts = self.render_options;
        let kind = spec.kind();
        let rendered = tokio::task::spawn_blocking(move || render(&spec, format, &opts)).await??;
        tracing::info!(kind, %format, bytes = rendered.bytes.len(), "Served plot");
        Ok(rendered)
    }
}
