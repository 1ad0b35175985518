//! Geographic units: WKT parsing and the WGS84 → web-mercator projection.

use geo::{BoundingRect, Coord, Geometry, MapCoords, Polygon, Rect};
use std::f64::consts::PI;
use wkt::Wkt;

use crate::error::{DashboardError, Result};

/// WGS84 semi-major axis used by EPSG:3857
pub const EARTH_RADIUS: f64 = 6_378_137.0;

/// Latitude limit of the square web-mercator world
pub const MAX_LATITUDE: f64 = 85.051_128_779_806_59;

/// Coordinate reference systems a unit geometry can be expressed in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Crs {
    /// EPSG:4326, degrees
    Wgs84,
    /// EPSG:3857, metres
    WebMercator,
}

/// A polygon or multipolygon identified by its `pdet` code
#[derive(Debug, Clone, PartialEq)]
pub struct GeoUnit {
    pub pdet: String,
    pub geometry: Geometry<f64>,
    pub crs: Crs,
}

impl GeoUnit {
    /// Parse a unit from its stored WKT, tagged as WGS84
    pub fn from_wkt(pdet: impl Into<String>, wkt_str: &str) -> Result<Self> {
        let pdet = pdet.into();
        let geometry = parse_wkt(wkt_str).map_err(|reason| DashboardError::InvalidGeometry {
            pdet: pdet.clone(),
            reason,
        })?;
        Ok(Self {
            pdet,
            geometry,
            crs: Crs::Wgs84,
        })
    }

    /// Reproject to EPSG:3857; a unit already in web-mercator is returned as is
    pub fn to_web_mercator(&self) -> Self {
        match self.crs {
            Crs::WebMercator => self.clone(),
            Crs::Wgs84 => Self {
                pdet: self.pdet.clone(),
                geometry: self.geometry.map_coords(project_coord),
                crs: Crs::WebMercator,
            },
        }
    }

    /// The polygons making up this unit; non-areal geometries contribute none
    pub fn polygons(&self) -> Vec<Polygon<f64>> {
        collect_polygons(&self.geometry)
    }

    pub fn bounds(&self) -> Option<Rect<f64>> {
        self.geometry.bounding_rect()
    }
}

fn parse_wkt(wkt_str: &str) -> std::result::Result<Geometry<f64>, String> {
    let parsed: Wkt<f64> = wkt_str.parse().map_err(|e: &str| e.to_string())?;
    Geometry::try_from(parsed).map_err(|e| e.to_string())
}

fn collect_polygons(geometry: &Geometry<f64>) -> Vec<Polygon<f64>> {
    match geometry {
        Geometry::Polygon(p) => vec![p.clone()],
        Geometry::MultiPolygon(mp) => mp.0.clone(),
        Geometry::Rect(r) => vec![r.to_polygon()],
        Geometry::Triangle(t) => vec![t.to_polygon()],
        Geometry::GeometryCollection(gc) => gc.0.iter().flat_map(collect_polygons).collect(),
        _ => Vec::new(),
    }
}

/// Spherical mercator forward projection of a lon/lat pair in degrees
pub fn project_coord(c: Coord<f64>) -> Coord<f64> {
    let lat = c.y.clamp(-MAX_LATITUDE, MAX_LATITUDE);
    Coord {
        x: EARTH_RADIUS * c.x.to_radians(),
        y: EARTH_RADIUS * (PI / 4.0 + lat.to_radians() / 2.0).tan().ln(),
    }
}

/// Union of the bounds of every unit
pub fn total_bounds(units: &[GeoUnit]) -> Option<Rect<f64>> {
    units
        .iter()
        .filter_map(GeoUnit::bounds)
        .reduce(|a, b| {
            Rect::new(
                Coord {
                    x: a.min().x.min(b.min().x),
                    y: a.min().y.min(b.min().y),
                },
                Coord {
                    x: a.max().x.max(b.max().x),
                    y: a.max().y.max(b.max().y),
                },
            )
        })
}

/// Axis-aligned window in projected coordinates
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Extent {
    pub x_min: f64,
    pub x_max: f64,
    pub y_min: f64,
    pub y_max: f64,
}

impl Extent {
    pub fn from_rect(rect: &Rect<f64>) -> Self {
        Self {
            x_min: rect.min().x,
            x_max: rect.max().x,
            y_min: rect.min().y,
            y_max: rect.max().y,
        }
    }

    pub fn width(&self) -> f64 {
        self.x_max - self.x_min
    }

    pub fn height(&self) -> f64 {
        self.y_max - self.y_min
    }

    /// Grow the shorter side about the centre so width / height equals `aspect`
    pub fn fit_aspect(&self, aspect: f64) -> Self {
        let (w, h) = (self.width().max(1.0), self.height().max(1.0));
        let (cx, cy) = ((self.x_min + self.x_max) / 2.0, (self.y_min + self.y_max) / 2.0);
        let (w, h) = if w / h > aspect { (w, w / aspect) } else { (h * aspect, h) };
        Self {
            x_min: cx - w / 2.0,
            x_max: cx + w / 2.0,
            y_min: cy - h / 2.0,
            y_max: cy + h / 2.0,
        }
    }

    /// Grow every side by `fraction` of the corresponding span
    pub fn pad(&self, fraction: f64) -> Self {
        let (dx, dy) = (self.width() * fraction, self.height() * fraction);
        Self {
            x_min: self.x_min - dx,
            x_max: self.x_max + dx,
            y_min: self.y_min - dy,
            y_max: self.y_max + dy,
        }
    }

    pub fn intersection(&self, other: &Extent) -> Option<Extent> {
        let out = Extent {
            x_min: self.x_min.max(other.x_min),
            x_max: self.x_max.min(other.x_max),
            y_min: self.y_min.max(other.y_min),
            y_max: self.y_max.min(other.y_max),
        };
        (out.width() > 0.0 && out.height() > 0.0).then_some(out)
    }
}
