//! Compiles aggregated plot data and variable descriptions into chart specs.
//!
//! All label layout that does not depend on pixels happens here: wrapping
//! titles and legends, fitting tick labels, sizing the figure.

use crate::aggregate::{Comparison, Histogram, Means, ShadedMap};
use crate::geometry::{Extent, total_bounds};
use crate::ir::{
    BarChart, ChartSpec, ChoroplethChart, Figure, GroupedBarChart, MapShape, MeanBarChart, TickLabel,
    ValueAxis,
};
use crate::text::{fit_text, wrap, wrap_tick, TextBox};

const HISTOGRAM_TITLE_WRAP: usize = 60;
const COMPARISON_TITLE_WRAP: usize = 50;
const LEGEND_TITLE_WRAP: usize = 20;
const LEGEND_ENTRY_WRAP: usize = 15;
const MEAN_LABEL_WRAP: usize = 25;

/// Opacity of choropleth fills over the basemap
pub const MAP_ALPHA: f64 = 0.8;

/// Wrap each label at tick width and size it to the tick box
pub fn tick_labels<S: AsRef<str>>(labels: &[S]) -> Vec<TickLabel> {
    let bx = TextBox::default();
    labels
        .iter()
        .map(|label| {
            let fitted = fit_text(&wrap_tick(label.as_ref()), &bx);
            TickLabel {
                text: fitted.text,
                font_size: fitted.font_size,
            }
        })
        .collect()
}

pub fn compile_histogram(hist: &Histogram, description: &str) -> ChartSpec {
    ChartSpec::Bar(BarChart {
        title: wrap(description, HISTOGRAM_TITLE_WRAP),
        categories: tick_labels(&hist.labels()),
        values: hist.proportions(),
        axis: ValueAxis::Percent,
        figure: Figure::for_categories(hist.bars.len()),
    })
}

pub fn compile_comparison(cmp: &Comparison, primary_description: &str, secondary_description: &str) -> ChartSpec {
    let axis = if cmp.normalization.is_percentage() {
        ValueAxis::Percent
    } else {
        ValueAxis::Count
    };

    ChartSpec::GroupedBar(GroupedBarChart {
        title: wrap(primary_description, COMPARISON_TITLE_WRAP),
        categories: tick_labels(&cmp.categories),
        legend_title: wrap(secondary_description, LEGEND_TITLE_WRAP),
        legend_entries: cmp.hues.iter().map(|h| wrap(h, LEGEND_ENTRY_WRAP)).collect(),
        values: cmp.values.clone(),
        axis,
        figure: Figure::for_categories(cmp.categories.len()),
    })
}

pub fn compile_means(means: &Means, primary_description: &str, secondary_description: &str) -> ChartSpec {
    let labels: Vec<&str> = means.bars.iter().map(|b| b.label.as_str()).collect();
    let populated = means.bars.iter().filter(|b| b.n > 0).count();
    let (lo, hi) = means.y_range.unwrap_or((0.0, 1.0));

    ChartSpec::MeanBar(MeanBarChart {
        title: primary_description.to_string(),
        y_label: wrap(&format!("{} (mean)", secondary_description), MEAN_LABEL_WRAP),
        categories: tick_labels(&labels),
        means: means.bars.iter().map(|b| b.mean).collect(),
        y_range: crate::scale::explicit_range(lo, hi),
        figure: Figure::for_categories(populated),
    })
}

/// Reproject the shaded units to web-mercator and collect their outlines
pub fn compile_map(map: &ShadedMap) -> ChartSpec {
    let projected: Vec<_> = map.units.iter().map(|u| u.unit.to_web_mercator()).collect();
    let extent = total_bounds(&projected).map(|r| Extent::from_rect(&r));

    let shapes = projected
        .iter()
        .zip(&map.units)
        .map(|(unit, shaded)| MapShape {
            rings: unit
                .polygons()
                .iter()
                .map(|p| p.exterior().coords().map(|c| (c.x, c.y)).collect())
                .collect(),
            value: shaded.value,
        })
        .collect();

    ChartSpec::Choropleth(ChoroplethChart {
        shapes,
        scale: map.scale,
        alpha: MAP_ALPHA,
        extent,
        basemap: None,
        figure: Figure::map(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::{
        aggregate_comparison, aggregate_histogram, aggregate_map, aggregate_means, ComparisonOptions,
        HistogramOptions, MapMode, MapOptions, MeanOptions, Normalization,
    };
    use crate::catalog::LabelDictionary;
    use crate::data::{CodedColumn, GeoObservation, JoinedColumns};
    use crate::geometry::GeoUnit;

    fn yes_no() -> LabelDictionary {
        LabelDictionary::from_pairs(vec![(0, "No"), (1, "Yes")])
    }

    #[test]
    fn test_histogram_spec() {
        let column = CodedColumn::new("q1", vec![0, 1, 1, 1]);
        let hist = aggregate_histogram(&column, &yes_no(), &HistogramOptions::default());
        let desc = "Do you agree that the local government has improved the quality of roads in the region?";
        let ChartSpec::Bar(chart) = compile_histogram(&hist, desc) else {
            panic!("expected bar chart");
        };
        assert!(chart.title.contains('\n'));
        assert!(chart.title.lines().all(|l| l.chars().count() <= 60));
        assert_eq!(chart.categories.len(), 2);
        assert_eq!(chart.categories[1].text, "Yes");
        assert_eq!(chart.values, vec![0.25, 0.75]);
        assert_eq!(chart.axis, ValueAxis::Percent);
        assert_eq!(chart.figure.width, 6.0);
    }

    #[test]
    fn test_tick_labels_wrapped() {
        let ticks = tick_labels(&["Neither agree nor disagree"]);
        assert_eq!(ticks[0].text, "Neither agree\nnor disagree");
        assert!(ticks[0].font_size >= 8 && ticks[0].font_size <= 16);
    }

    #[test]
    fn test_comparison_spec_axis() {
        let rows = JoinedColumns::new("a", "b", vec![(0, 0), (0, 1), (1, 1)]);
        let opts = ComparisonOptions {
            normalization: Normalization::GroupedPercentage,
            ..Default::default()
        };
        let cmp = aggregate_comparison(&rows, &yes_no(), &yes_no(), &opts);
        let ChartSpec::GroupedBar(chart) = compile_comparison(&cmp, "First", "A rather long secondary description") else {
            panic!("expected grouped bar chart");
        };
        assert_eq!(chart.axis, ValueAxis::Percent);
        assert_eq!(chart.legend_entries, vec!["No", "Yes"]);
        assert!(chart.legend_title.lines().all(|l| l.chars().count() <= 20));
        assert_eq!(chart.values.len(), chart.categories.len());
    }

    #[test]
    fn test_means_spec() {
        let rows = JoinedColumns::new("a", "b", vec![(1, 2), (1, 4), (2, 5)]);
        let dict = LabelDictionary::from_pairs(vec![(1, "Low"), (2, "High"), (3, "Other")]);
        let means = aggregate_means(&rows, &dict, &MeanOptions::default());
        let ChartSpec::MeanBar(chart) = compile_means(&means, "Income", "Trust in institutions") else {
            panic!("expected mean bar chart");
        };
        assert_eq!(chart.title, "Income");
        assert_eq!(chart.y_label, "Trust in institutions\n(mean)");
        assert_eq!(chart.means, vec![Some(3.0), Some(5.0), None]);
        assert_eq!(chart.y_range, (2.0, 5.0));
    }

    #[test]
    fn test_map_spec_projected() {
        let units = vec![GeoUnit::from_wkt("1", "POLYGON((-74 4, -73 4, -73 5, -74 5, -74 4))").unwrap()];
        let obs = vec![GeoObservation { pdet: "1".into(), value: 3 }];
        let map = aggregate_map(&obs, &units, &MapOptions { mode: MapMode::Mean, threshold: 0 });
        let ChartSpec::Choropleth(chart) = compile_map(&map) else {
            panic!("expected choropleth");
        };
        assert_eq!(chart.shapes.len(), 1);
        assert_eq!(chart.shapes[0].value, 3.0);
        let extent = chart.extent.unwrap();
        assert!(extent.x_min < -8_000_000.0);
        assert!(extent.y_max > 400_000.0);
        assert_eq!(chart.alpha, MAP_ALPHA);
    }

    #[test]
    fn test_empty_map_has_no_extent() {
        let map = ShadedMap { units: Vec::new(), scale: (0.0, 100.0) };
        let ChartSpec::Choropleth(chart) = compile_map(&map) else {
            panic!("expected choropleth");
        };
        assert!(chart.extent.is_none());
        assert!(chart.shapes.is_empty());
    }
}
