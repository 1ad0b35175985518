use crate::basemap::Basemap;
use crate::geometry::Extent;

// =============================================================================
// Figure
// =============================================================================

/// Figure size in inches; pixel size is this times the render DPI
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Figure {
    pub width: f64,
    pub height: f64,
}

impl Figure {
    pub const DEFAULT_HEIGHT: f64 = 6.0;
    pub const MIN_WIDTH: f64 = 6.0;
    pub const WIDTH_PER_CATEGORY: f64 = 2.2;

    /// Categorical figures widen with the number of categories
    pub fn for_categories(n: usize) -> Self {
        Self {
            width: Self::MIN_WIDTH.max(Self::WIDTH_PER_CATEGORY * n as f64),
            height: Self::DEFAULT_HEIGHT,
        }
    }

    pub fn map() -> Self {
        Self { width: 6.5, height: 8.0 }
    }

    pub fn pixels(&self, dpi: f64) -> (u32, u32) {
        (
            (self.width * dpi).round().max(1.0) as u32,
            (self.height * dpi).round().max(1.0) as u32,
        )
    }
}

// =============================================================================
// Chart Specs
// =============================================================================

/// A tick label already wrapped, with the font size (in points) it fits at
#[derive(Debug, Clone, PartialEq)]
pub struct TickLabel {
    pub text: String,
    pub font_size: u32,
}

/// How a bar value axis is labelled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueAxis {
    Count,
    /// Values are proportions in [0, 1], labelled as percentages
    Percent,
}

/// Single-series bar chart (histogram)
#[derive(Debug, Clone, PartialEq)]
pub struct BarChart {
    pub title: String,
    pub categories: Vec<TickLabel>,
    pub values: Vec<f64>,
    pub axis: ValueAxis,
    pub figure: Figure,
}

/// Bars grouped by category, one bar per hue
#[derive(Debug, Clone, PartialEq)]
pub struct GroupedBarChart {
    pub title: String,
    pub categories: Vec<TickLabel>,
    pub legend_title: String,
    pub legend_entries: Vec<String>,
    /// `values[category][hue]`
    pub values: Vec<Vec<f64>>,
    pub axis: ValueAxis,
    pub figure: Figure,
}

/// One bar per category at the mean of a second variable
#[derive(Debug, Clone, PartialEq)]
pub struct MeanBarChart {
    pub title: String,
    pub y_label: String,
    pub categories: Vec<TickLabel>,
    /// `None` leaves the slot empty
    pub means: Vec<Option<f64>>,
    pub y_range: (f64, f64),
    pub figure: Figure,
}

/// A shaded unit outline in web-mercator metres
#[derive(Debug, Clone, PartialEq)]
pub struct MapShape {
    /// Exterior rings of the unit's polygons
    pub rings: Vec<Vec<(f64, f64)>>,
    pub value: f64,
}

#[derive(Debug, Clone)]
pub struct ChoroplethChart {
    pub shapes: Vec<MapShape>,
    /// Colour scale limits
    pub scale: (f64, f64),
    pub alpha: f64,
    /// Bounds of every shape; `None` when there are none
    pub extent: Option<Extent>,
    pub basemap: Option<Basemap>,
    pub figure: Figure,
}

#[derive(Debug, Clone)]
pub enum ChartSpec {
    Bar(BarChart),
    GroupedBar(GroupedBarChart),
    MeanBar(MeanBarChart),
    Choropleth(ChoroplethChart),
}

impl ChartSpec {
    pub fn figure(&self) -> Figure {
        match self {
            ChartSpec::Bar(c) => c.figure,
            ChartSpec::GroupedBar(c) => c.figure,
            ChartSpec::MeanBar(c) => c.figure,
            ChartSpec::Choropleth(c) => c.figure,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ChartSpec::Bar(_) => "bar",
            ChartSpec::GroupedBar(_) => "grouped_bar",
            ChartSpec::MeanBar(_) => "mean_bar",
            ChartSpec::Choropleth(_) => "choropleth",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_figure_width_grows() {
        assert_eq!(Figure::for_categories(0).width, 6.0);
        assert_eq!(Figure::for_categories(2).width, 6.0);
        assert!((Figure::for_categories(5).width - 11.0).abs() < 1e-9);
    }

    #[test]
    fn test_figure_pixels() {
        assert_eq!(Figure::for_categories(1).pixels(100.0), (600, 600));
        assert_eq!(Figure::map().pixels(100.0), (650, 800));
    }
}
