//! Aggregation engine: turns coded columns into labelled, ordered plot data.
//!
//! Every category axis comes from a [`LabelDictionary`], never from the data.
//! A code without a dictionary entry still counts toward totals and
//! percentage denominators but has no slot on any axis.

use std::collections::{BTreeMap, HashMap, HashSet};

use crate::catalog::{resolve_labels, LabelDictionary};
use crate::data::{CodedColumn, GeoObservation, JoinedColumns};
use crate::geometry::GeoUnit;
use crate::scale::min_max;

// =============================================================================
// Histogram
// =============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HistogramOptions {
    /// Categories with a count at or below this are dropped
    pub floor: u64,
    pub keep_missing: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HistogramBar {
    pub label: String,
    pub count: u64,
    /// Share of all observations, including those without a slot on the axis
    pub proportion: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Histogram {
    /// Bars in axis order
    pub bars: Vec<HistogramBar>,
    /// Number of observations in the denominator
    pub total: u64,
}

impl Histogram {
    pub fn labels(&self) -> Vec<String> {
        self.bars.iter().map(|b| b.label.clone()).collect()
    }

    pub fn proportions(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.proportion).collect()
    }
}

/// Frequency of each category as a proportion of all observations
pub fn aggregate_histogram(
    column: &CodedColumn,
    dict: &LabelDictionary,
    opts: &HistogramOptions,
) -> Histogram {
    let labelled = resolve_labels(&column.codes, dict);
    let total = labelled.len() as u64;

    let mut counts: HashMap<&str, u64> = HashMap::new();
    for label in labelled.values.iter().flatten() {
        *counts.entry(label.as_str()).or_insert(0) += 1;
    }
    counts.retain(|_, n| *n > opts.floor);

    let shown: HashSet<String> = dict.without_sentinels(opts.keep_missing).labels().into_iter().collect();
    let axis = labelled.axis(|label| shown.contains(label) && counts.contains_key(label));

    let bars = axis
        .into_iter()
        .map(|label| {
            let count = counts.get(label.as_str()).copied().unwrap_or(0);
            HistogramBar {
                proportion: if total > 0 { count as f64 / total as f64 } else { 0.0 },
                label,
                count,
            }
        })
        .collect();

    Histogram { bars, total }
}

// =============================================================================
// Comparison (counts and percentages)
// =============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Normalization {
    /// Raw group counts
    #[default]
    Counts,
    /// Share of the grand total over all surviving groups
    Percentage,
    /// Share of the surviving groups within each primary category
    GroupedPercentage,
}

impl Normalization {
    pub fn is_percentage(self) -> bool {
        !matches!(self, Self::Counts)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ComparisonOptions {
    pub floor: u64,
    pub keep_missing: bool,
    pub normalization: Normalization,
}

/// One surviving (primary, secondary) group
#[derive(Debug, Clone, PartialEq)]
pub struct ComparisonCell {
    pub primary: i64,
    pub secondary: i64,
    pub count: u64,
    /// The count, or its share when a percentage mode is selected
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Comparison {
    /// Surviving groups ordered by (primary, secondary) code
    pub cells: Vec<ComparisonCell>,
    /// Primary axis, restricted to labels present after aggregation
    pub categories: Vec<String>,
    /// Secondary (hue) order
    pub hues: Vec<String>,
    /// `values[category][hue]`; zero where no group survived
    pub values: Vec<Vec<f64>>,
    pub normalization: Normalization,
}

/// Group by the primary then the secondary code, count and normalise
pub fn aggregate_comparison(
    rows: &JoinedColumns,
    primary: &LabelDictionary,
    secondary: &LabelDictionary,
    opts: &ComparisonOptions,
) -> Comparison {
    // 1. Count groups
    let mut counts: BTreeMap<(i64, i64), u64> = BTreeMap::new();
    for &(a, b) in &rows.rows {
        *counts.entry((a, b)).or_insert(0) += 1;
    }
    counts.retain(|_, n| *n > opts.floor);

    // 2. Normalise
    let grand_total: u64 = counts.values().sum();
    let mut group_totals: HashMap<i64, u64> = HashMap::new();
    for (&(a, _), &n) in &counts {
        *group_totals.entry(a).or_insert(0) += n;
    }

    let cells: Vec<ComparisonCell> = counts
        .into_iter()
        .map(|((a, b), count)| {
            let denominator = match opts.normalization {
                Normalization::Counts => 1,
                Normalization::Percentage => grand_total,
                Normalization::GroupedPercentage => group_totals.get(&a).copied().unwrap_or(0),
            };
            ComparisonCell {
                primary: a,
                secondary: b,
                count,
                value: if denominator > 0 { count as f64 / denominator as f64 } else { 0.0 },
            }
        })
        .collect();

    // 3. Axes from the dictionaries
    let present: HashSet<String> = cells
        .iter()
        .filter_map(|c| primary.get(c.primary))
        .map(str::to_string)
        .collect();
    let categories = primary
        .without_sentinels(opts.keep_missing)
        .axis(Some(&present));
    let hues = secondary.without_sentinels(opts.keep_missing).axis(None);

    // 4. Dense grid for drawing
    let cat_index: HashMap<&str, usize> = categories
        .iter()
        .enumerate()
        .map(|(i, c)| (c.as_str(), i))
        .collect();
    let hue_index: HashMap<&str, usize> = hues
        .iter()
        .enumerate()
        .map(|(i, h)| (h.as_str(), i))
        .collect();

    let mut values = vec![vec![0.0; hues.len()]; categories.len()];
    for cell in &cells {
        let slot = primary
            .get(cell.primary)
            .and_then(|l| cat_index.get(l))
            .zip(secondary.get(cell.secondary).and_then(|l| hue_index.get(l)));
        if let Some((&ci, &hi)) = slot {
            values[ci][hi] += cell.value;
        }
    }

    Comparison {
        cells,
        categories,
        hues,
        values,
        normalization: opts.normalization,
    }
}

// =============================================================================
// Comparison (means)
// =============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MeanOptions {
    pub keep_missing: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MeanBar {
    pub label: String,
    /// `None` when no observation falls in this category
    pub mean: Option<f64>,
    pub n: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Means {
    pub bars: Vec<MeanBar>,
    /// Min and max of the secondary values that entered the means
    pub y_range: Option<(f64, f64)>,
}

/// Mean of the secondary code per primary category.
///
/// Without `keep_missing`, rows where either code is `<= 0` are dropped and
/// the axis only holds positive keys.
pub fn aggregate_means(rows: &JoinedColumns, primary: &LabelDictionary, opts: &MeanOptions) -> Means {
    let kept: Vec<(i64, i64)> = rows
        .rows
        .iter()
        .copied()
        .filter(|&(a, b)| opts.keep_missing || (a > 0 && b > 0))
        .collect();

    let y_range = min_max(kept.iter().map(|&(_, b)| b as f64));

    let mut sums: HashMap<&str, (f64, u64)> = HashMap::new();
    for &(a, b) in &kept {
        if let Some(label) = primary.get(a) {
            let entry = sums.entry(label).or_insert((0.0, 0));
            entry.0 += b as f64;
            entry.1 += 1;
        }
    }

    let order = if opts.keep_missing {
        primary.clone()
    } else {
        primary.retain_keys(|k| k > 0)
    };

    let bars = order
        .axis(None)
        .into_iter()
        .map(|label| {
            let (sum, n) = sums.get(label.as_str()).copied().unwrap_or((0.0, 0));
            MeanBar {
                mean: (n > 0).then(|| sum / n as f64),
                label,
                n,
            }
        })
        .collect();

    Means { bars, y_range }
}

// =============================================================================
// Map
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MapMode {
    /// Percentage of observations equal to the threshold
    Equals,
    /// Percentage of observations above the threshold
    GreaterThan,
    /// Mean of the raw values
    Mean,
}

impl MapMode {
    /// `eq` and `gt` select the percentage modes; anything else is the mean
    pub fn parse(kind: &str) -> Self {
        match kind {
            "eq" => Self::Equals,
            "gt" => Self::GreaterThan,
            _ => Self::Mean,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MapOptions {
    pub mode: MapMode,
    pub threshold: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UnitValue {
    pub pdet: String,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ShadedUnit {
    pub unit: GeoUnit,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ShadedMap {
    pub units: Vec<ShadedUnit>,
    pub scale: (f64, f64),
}

/// Per-unit values and the colour scale, before joining geometries
pub fn unit_values(observations: &[GeoObservation], opts: &MapOptions) -> (Vec<UnitValue>, (f64, f64)) {
    let valid: Vec<&GeoObservation> = observations.iter().filter(|o| o.value > -1).collect();

    let percent = opts.mode != MapMode::Mean;
    let hit = |v: i64| match opts.mode {
        MapMode::Equals => v == opts.threshold,
        MapMode::GreaterThan => v > opts.threshold,
        MapMode::Mean => false,
    };

    // (sum, count) per unit; the sum is of indicator hits or raw values
    let mut groups: BTreeMap<&str, (f64, u64)> = BTreeMap::new();
    for obs in &valid {
        let x = if percent {
            f64::from(u8::from(hit(obs.value)))
        } else {
            obs.value as f64
        };
        let entry = groups.entry(obs.pdet.as_str()).or_insert((0.0, 0));
        entry.0 += x;
        entry.1 += 1;
    }

    let values = groups
        .into_iter()
        .map(|(pdet, (sum, n))| {
            let mean = sum / n as f64;
            UnitValue {
                pdet: pdet.to_string(),
                value: if percent { mean * 100.0 } else { mean },
            }
        })
        .collect();

    let scale = if percent {
        (0.0, 100.0)
    } else {
        min_max(valid.iter().map(|o| o.value as f64)).unwrap_or((0.0, 1.0))
    };

    (values, scale)
}

/// Shade geographic units; units without observations are dropped
pub fn aggregate_map(observations: &[GeoObservation], units: &[GeoUnit], opts: &MapOptions) -> ShadedMap {
    let (values, scale) = unit_values(observations, opts);
    let by_unit: HashMap<&str, f64> = values.iter().map(|v| (v.pdet.as_str(), v.value)).collect();

    let units = units
        .iter()
        .filter_map(|unit| {
            by_unit.get(unit.pdet.as_str()).map(|&value| ShadedUnit {
                unit: unit.clone(),
                value,
            })
        })
        .collect();

    ShadedMap { units, scale }
}
