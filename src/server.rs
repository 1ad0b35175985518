//! HTTP routes over the [`Dashboard`] operations.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::header;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use serde::Deserialize;
use tower_http::trace::TraceLayer;

use crate::aggregate::MapMode;
use crate::error::Result;
use crate::render::Rendered;
use crate::runtime::{ComparisonKind, ComparisonRequest, Dashboard, HistogramRequest, MapRequest};
use crate::OutputFormat;

type AppState = Arc<Dashboard>;

pub fn build_router(dashboard: Arc<Dashboard>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/hist/:variable", get(histogram))
        .route("/comp/:first/:second/:plottype", get(comparison))
        .route("/map/:variable/:plottype/:arg", get(map))
        .layer(TraceLayer::new_for_http())
        .with_state(dashboard)
}

#[derive(Debug, Default, Deserialize)]
struct PlotQuery {
    #[serde(alias = "format")]
    fmt: Option<String>,
    #[serde(default)]
    floor: u64,
    #[serde(default)]
    keepna: bool,
}

impl PlotQuery {
    fn format(&self) -> Result<OutputFormat> {
        OutputFormat::from_query(self.fmt.as_deref())
    }
}

fn plot_response(rendered: Rendered) -> Response {
    ([(header::CONTENT_TYPE, rendered.mime_type)], rendered.bytes).into_response()
}

async fn index(State(dashboard): State<AppState>) -> Result<Html<String>> {
    Ok(Html(dashboard.index().await?))
}

async fn histogram(
    State(dashboard): State<AppState>,
    Path(variable): Path<String>,
    Query(query): Query<PlotQuery>,
) -> Result<Response> {
    let req = HistogramRequest {
        format: query.format()?,
        variable,
        floor: query.floor,
        keep_missing: query.keepna,
    };
    Ok(plot_response(dashboard.histogram(&req).await?))
}

async fn comparison(
    State(dashboard): State<AppState>,
    Path((first, second, plottype)): Path<(String, String, String)>,
    Query(query): Query<PlotQuery>,
) -> Result<Response> {
    let req = ComparisonRequest {
        format: query.format()?,
        kind: plottype.parse::<ComparisonKind>()?,
        first,
        second,
        keep_missing: query.keepna,
        floor: query.floor,
    };
    Ok(plot_response(dashboard.comparison(&req).await?))
}

async fn map(
    State(dashboard): State<AppState>,
    Path((variable, plottype, arg)): Path<(String, String, i64)>,
    Query(query): Query<PlotQuery>,
) -> Result<Response> {
    let req = MapRequest {
        format: query.format()?,
        variable,
        mode: MapMode::parse(&plottype),
        threshold: arg,
    };
    Ok(plot_response(dashboard.map(&req).await?))
}
