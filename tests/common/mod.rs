//! In-memory survey database for integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::State;
use axum::http::header;
use axum::response::IntoResponse;
use axum::Router;
use image::codecs::png::PngEncoder;
use image::{ColorType, ImageEncoder};
use plotdash::basemap::TileSource;
use plotdash::catalog::{CatalogStore, LabelDictionary, Variable};
use plotdash::data::{CodedColumn, GeoObservation, JoinedColumns, SurveyStore};
use plotdash::error::{DashboardError, Result};
use plotdash::geometry::GeoUnit;
use plotdash::runtime::{Dashboard, Session, Store};
use plotdash::RenderOptions;
use tokio::net::TcpListener;

/// Column-oriented copy of the `data`, `variables`, `mappings` and `geodata` tables
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    pub variables: Vec<Variable>,
    pub dictionaries: HashMap<String, LabelDictionary>,
    /// Row-aligned columns; `None` is a NULL cell
    pub columns: HashMap<String, Vec<Option<i64>>>,
    pub pdet: Vec<Option<String>>,
    pub units: Vec<GeoUnit>,
    /// Sessions opened so far, shared between clones
    pub sessions: Arc<AtomicUsize>,
}

fn square(pdet: &str, lon: f64, lat: f64) -> GeoUnit {
    let wkt = format!(
        "POLYGON(({x0} {y0}, {x1} {y0}, {x1} {y1}, {x0} {y1}, {x0} {y0}))",
        x0 = lon,
        y0 = lat,
        x1 = lon + 0.5,
        y1 = lat + 0.5
    );
    GeoUnit::from_wkt(pdet, &wkt).unwrap()
}

impl MemoryStore {
    /// Seven respondents in two territorial units
    pub fn sample() -> Self {
        let variables = vec![
            Variable {
                name: "q1".into(),
                description: Some("Does your household have access to drinking water?".into()),
            },
            Variable {
                name: "q2".into(),
                description: Some("Trust in the municipal government".into()),
            },
            Variable {
                name: "q3".into(),
                description: Some("NaN".into()),
            },
        ];

        let mut dictionaries = HashMap::new();
        dictionaries.insert(
            "q1".to_string(),
            LabelDictionary::from_pairs(vec![(0, "No"), (1, "Yes"), (-9, "No answer")]),
        );
        dictionaries.insert(
            "q2".to_string(),
            LabelDictionary::from_pairs(vec![(1, "Low"), (2, "Medium"), (3, "High")]),
        );

        let mut columns = HashMap::new();
        columns.insert(
            "q1".to_string(),
            vec![Some(0), Some(0), Some(1), Some(-9), Some(1), Some(1), None],
        );
        columns.insert(
            "q2".to_string(),
            vec![Some(1), Some(2), Some(3), Some(3), None, Some(2), Some(1)],
        );
        columns.insert("q3".to_string(), vec![Some(4); 7]);

        let pdet = ["A", "A", "B", "B", "B", "A", "B"]
            .iter()
            .map(|p| Some(p.to_string()))
            .collect();

        Self {
            variables,
            dictionaries,
            columns,
            pdet,
            units: vec![square("A", -74.5, 4.0), square("B", -74.0, 4.0), square("C", -73.5, 4.0)],
            sessions: Arc::default(),
        }
    }

    fn known(&self, variable: &str) -> Result<&Variable> {
        self.variables
            .iter()
            .find(|v| v.name == variable)
            .ok_or_else(|| DashboardError::VariableNotFound(variable.to_string()))
    }

    fn column(&self, variable: &str) -> Result<&Vec<Option<i64>>> {
        self.columns
            .get(variable)
            .ok_or_else(|| DashboardError::VariableNotFound(variable.to_string()))
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn session(&self) -> Result<Box<dyn Session>> {
        self.sessions.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(self.clone()))
    }
}

#[async_trait]
impl CatalogStore for MemoryStore {
    async fn lookup_dictionary(&self, variable: &str) -> Result<LabelDictionary> {
        self.known(variable)?;
        Ok(self.dictionaries.get(variable).cloned().unwrap_or_default())
    }

    async fn lookup_description(&self, variable: &str) -> Result<String> {
        Ok(self.known(variable)?.description.clone().unwrap_or_default())
    }

    async fn list_variables(&self) -> Result<Vec<Variable>> {
        Ok(self.variables.clone())
    }
}

#[async_trait]
impl SurveyStore for MemoryStore {
    async fn fetch_column(&self, variable: &str) -> Result<CodedColumn> {
        let codes = self.column(variable)?.iter().flatten().copied().collect();
        Ok(CodedColumn::new(variable, codes))
    }

    async fn fetch_joined_columns(&self, first: &str, second: &str) -> Result<JoinedColumns> {
        let a = self.column(first)?;
        let b = self.column(second)?;
        let rows = a
            .iter()
            .zip(b)
            .filter_map(|(x, y)| x.zip(*y))
            .collect();
        Ok(JoinedColumns::new(first, second, rows))
    }

    async fn fetch_geo_column(&self, variable: &str) -> Result<Vec<GeoObservation>> {
        let values = self.column(variable)?;
        Ok(values
            .iter()
            .zip(&self.pdet)
            .filter_map(|(v, p)| match (v, p) {
                (Some(value), Some(pdet)) if *value > -1 => Some(GeoObservation {
                    pdet: pdet.clone(),
                    value: *value,
                }),
                _ => None,
            })
            .collect())
    }

    async fn fetch_geo_units(&self) -> Result<Vec<GeoUnit>> {
        Ok(self.units.clone())
    }
}

const TEST_DPI: f64 = 40.0;

/// Dashboard over the sample store, without basemap tiles, at a low DPI
pub fn sample_dashboard() -> Arc<Dashboard> {
    Arc::new(Dashboard::new(Arc::new(MemoryStore::sample())).with_render_options(RenderOptions { dpi: TEST_DPI }))
}

/// Sample dashboard drawing maps over `tiles`
pub fn dashboard_with_tiles(store: MemoryStore, tiles: TileSource) -> Dashboard {
    Dashboard::new(Arc::new(store))
        .with_render_options(RenderOptions { dpi: TEST_DPI })
        .with_tiles(tiles)
}

pub const TILE_COLOR: [u8; 3] = [255, 0, 0];

fn tile_png() -> Vec<u8> {
    let pixels: Vec<u8> = TILE_COLOR.iter().copied().cycle().take(256 * 256 * 3).collect();
    let mut out = Vec::new();
    PngEncoder::new(&mut out)
        .write_image(&pixels, 256, 256, ColorType::Rgb8)
        .unwrap();
    out
}

async fn serve_tile(State(hits): State<Arc<AtomicUsize>>) -> impl IntoResponse {
    hits.fetch_add(1, Ordering::SeqCst);
    ([(header::CONTENT_TYPE, "image/png")], tile_png())
}

/// Local tile server answering every path with a plain red tile.
///
/// Returns its `{z}/{x}/{y}` URL template and the number of tiles served.
pub async fn spawn_tile_server() -> (String, Arc<AtomicUsize>) {
    let hits = Arc::new(AtomicUsize::new(0));
    let app = Router::new().fallback(serve_tile).with_state(Arc::clone(&hits));
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{}/{{z}}/{{x}}/{{y}}.png", addr), hits)
}

pub fn is_png(bytes: &[u8]) -> bool {
    bytes.starts_with(&[137, 80, 78, 71, 13, 10, 26, 10])
}

pub fn is_jpeg(bytes: &[u8]) -> bool {
    bytes.starts_with(&[0xFF, 0xD8, 0xFF])
}

pub fn is_pdf(bytes: &[u8]) -> bool {
    bytes.starts_with(b"%PDF-")
}

pub fn is_postscript(bytes: &[u8]) -> bool {
    bytes.starts_with(b"%!PS")
}

pub fn is_svg(bytes: &[u8]) -> bool {
    String::from_utf8_lossy(bytes).contains("<svg")
}
