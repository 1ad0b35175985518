use async_trait::async_trait;

use crate::error::Result;
use crate::geometry::GeoUnit;

/// One coded column of the observation table
#[derive(Debug, Clone, PartialEq)]
pub struct CodedColumn {
    pub variable: String,
    pub codes: Vec<i64>,
}

impl CodedColumn {
    pub fn new(variable: impl Into<String>, codes: Vec<i64>) -> Self {
        Self {
            variable: variable.into(),
            codes,
        }
    }
}

/// Two coded columns, row-aligned
#[derive(Debug, Clone, PartialEq)]
pub struct JoinedColumns {
    pub first: String,
    pub second: String,
    pub rows: Vec<(i64, i64)>,
}

impl JoinedColumns {
    pub fn new(first: impl Into<String>, second: impl Into<String>, rows: Vec<(i64, i64)>) -> Self {
        Self {
            first: first.into(),
            second: second.into(),
            rows,
        }
    }
}

/// A coded value tagged with the geographic unit of its observation
#[derive(Debug, Clone, PartialEq)]
pub struct GeoObservation {
    pub pdet: String,
    pub value: i64,
}

/// Strip every character outside `[A-Za-z0-9_]`.
///
/// Applied to every identifier that is interpolated into a query.
pub fn sanitize_identifier(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_')
        .collect()
}

/// Read access to the observation and geometry tables
#[async_trait]
pub trait SurveyStore: Send + Sync {
    /// All non-null codes of one variable
    async fn fetch_column(&self, variable: &str) -> Result<CodedColumn>;

    /// Rows where both variables are non-null
    async fn fetch_joined_columns(&self, first: &str, second: &str) -> Result<JoinedColumns>;

    /// Observations with a value `> -1`, tagged with their unit
    async fn fetch_geo_column(&self, variable: &str) -> Result<Vec<GeoObservation>>;

    /// Unit polygons in WGS84
    async fn fetch_geo_units(&self) -> Result<Vec<GeoUnit>>;
}
