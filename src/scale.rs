//! Axis ranges and colour-bar ticks

/// Headroom added above the tallest bar, as a fraction of the range
const BAR_MARGIN: f64 = 0.05;

/// Min and max of the finite values, or `None` when there are none
pub fn min_max<I>(values: I) -> Option<(f64, f64)>
where
    I: IntoIterator<Item = f64>,
{
    values
        .into_iter()
        .filter(|v| v.is_finite())
        .fold(None, |acc, v| match acc {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })
}

/// Y range for bars: always includes zero, with headroom on the far side
pub fn bar_range(values: &[f64]) -> (f64, f64) {
    let (mut min, mut max) = min_max(values.iter().copied()).unwrap_or((0.0, 0.0));
    if min > 0.0 {
        min = 0.0;
    }
    if max < 0.0 {
        max = 0.0;
    }
    if min == max {
        return (0.0, 1.0);
    }

    let pad = (max - min) * BAR_MARGIN;
    let lower = if min < 0.0 { min - pad } else { min };
    let upper = if max > 0.0 { max + pad } else { max };
    (lower, upper)
}

/// Explicit limits, widened by one unit when they collapse to a point
pub fn explicit_range(min: f64, max: f64) -> (f64, f64) {
    if min == max {
        (min - 1.0, max + 1.0)
    } else {
        (min, max)
    }
}

/// `n` evenly spaced tick values from `min` to `max` inclusive
pub fn linear_ticks(min: f64, max: f64, n: usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![min],
        _ => (0..n)
            .map(|i| min + (max - min) * i as f64 / (n - 1) as f64)
            .collect(),
    }
}

/// Tick label for a colour-bar value
pub fn format_tick(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e9 {
        format!("{:.0}", value)
    } else if value.abs() >= 100.0 {
        format!("{:.0}", value)
    } else {
        format!("{:.2}", value)
    }
}

/// Tick label for a proportion shown as a percentage
pub fn format_percent(value: f64) -> String {
    format!("{:.0}%", value * 100.0)
}
