//! Drawing of chart specs onto any plotters backend.

use anyhow::{Context, Result};
use plotters::coord::types::RangedCoordf64;
use plotters::coord::Shift;
use plotters::element::BitMapElement;
use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};

use crate::basemap::Basemap;
use crate::geometry::Extent;
use crate::ir::{BarChart, ChartSpec, ChoroplethChart, GroupedBarChart, MeanBarChart, TickLabel, ValueAxis};
use crate::palette::{ColorPalette, ColorRamp};
use crate::scale::{bar_range, format_percent, format_tick, linear_ticks};
use crate::RenderOptions;

type Chart<'a, DB> = ChartContext<'a, DB, Cartesian2d<RangedCoordf64, RangedCoordf64>>;

/// Font sizes in points
const TITLE_PT: f64 = 12.0;
const LABEL_PT: f64 = 10.0;
const LINE_SPACING: f64 = 1.25;

/// Share of the figure width kept for the legend of grouped bars
const LEGEND_SHARE: f64 = 0.3;
/// Share of the figure width kept for the vertical mean label
const Y_LABEL_SHARE: f64 = 0.12;
const COLORBAR_STEPS: usize = 64;
const COLORBAR_TICKS: usize = 5;

/// Draw `spec` filling the whole of `root`
pub fn draw_chart<DB>(root: &DrawingArea<DB, Shift>, spec: &ChartSpec, opts: &RenderOptions) -> Result<()>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    root.fill(&WHITE).context("Failed to fill background")?;

    match spec {
        ChartSpec::Bar(chart) => draw_bar_chart(root, chart, opts)?,
        ChartSpec::GroupedBar(chart) => draw_grouped_bar_chart(root, chart, opts)?,
        ChartSpec::MeanBar(chart) => draw_mean_bar_chart(root, chart, opts)?,
        ChartSpec::Choropleth(chart) => draw_choropleth(root, chart, opts)?,
    }

    root.present().context("Failed to present chart")?;
    Ok(())
}

// =============================================================================
// Text helpers
// =============================================================================

fn font(size_px: f64) -> FontDesc<'static> {
    FontDesc::new(FontFamily::SansSerif, size_px, FontStyle::Normal)
}

fn line_step(size_px: f64) -> i32 {
    (size_px * LINE_SPACING).round() as i32
}

/// Pixel height of a block of newline-separated text
fn text_height(text: &str, size_px: f64) -> i32 {
    text.lines().count() as i32 * line_step(size_px)
}

/// Draw each line of `text` below the previous one, starting at `top`
fn draw_lines<DB>(
    area: &DrawingArea<DB, Shift>,
    text: &str,
    (x, top): (i32, i32),
    size_px: f64,
    hpos: HPos,
) -> Result<()>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    let style = font(size_px).color(&BLACK).pos(Pos::new(hpos, VPos::Top));
    let step = line_step(size_px);
    for (i, line) in text.lines().enumerate() {
        area.draw(&Text::new(line.to_string(), (x, top + i as i32 * step), style.clone()))
            .context("Failed to draw text")?;
    }
    Ok(())
}

/// Vertical text reading bottom to top, centred in `area`
fn draw_vertical_label<DB>(area: &DrawingArea<DB, Shift>, text: &str, size_px: f64) -> Result<()>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    let (w, h) = area.dim_in_pixel();
    let lines: Vec<&str> = text.lines().collect();
    let step = line_step(size_px);
    let style = font(size_px)
        .transform(FontTransform::Rotate270)
        .color(&BLACK)
        .pos(Pos::new(HPos::Center, VPos::Center));

    let x0 = w as i32 / 2 - (lines.len() as i32 - 1) * step / 2;
    for (i, line) in lines.iter().enumerate() {
        area.draw(&Text::new(line.to_string(), (x0 + i as i32 * step, h as i32 / 2), style.clone()))
            .context("Failed to draw axis label")?;
    }
    Ok(())
}

/// Split off a title band at the top of `area` and draw `title` in it
fn split_title<DB>(
    area: &DrawingArea<DB, Shift>,
    title: &str,
    opts: &RenderOptions,
) -> Result<DrawingArea<DB, Shift>>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    let size = opts.px(TITLE_PT);
    let pad = line_step(size) / 2;
    let band = text_height(title, size) + 2 * pad;
    let (title_area, body) = area.split_vertically(band);
    let (w, _) = title_area.dim_in_pixel();
    draw_lines(&title_area, title, (w as i32 / 2, pad), size, HPos::Center)?;
    Ok(body)
}

// =============================================================================
// Category axes
// =============================================================================

/// Height reserved below the plot for the tallest tick label
fn tick_area_height(categories: &[TickLabel], opts: &RenderOptions) -> i32 {
    let tallest = categories
        .iter()
        .map(|c| text_height(&c.text, opts.px(f64::from(c.font_size))))
        .max()
        .unwrap_or(0);
    tallest + line_step(opts.px(LABEL_PT))
}

fn build_category_chart<'a, DB>(
    body: &'a DrawingArea<DB, Shift>,
    categories: &[TickLabel],
    y_range: (f64, f64),
    opts: &RenderOptions,
) -> Result<Chart<'a, DB>>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    let n = categories.len().max(1) as f64;
    ChartBuilder::on(body)
        .margin_right(opts.px(10.0) as u32)
        .x_label_area_size(tick_area_height(categories, opts))
        .y_label_area_size(opts.px(45.0) as u32)
        .build_cartesian_2d(0.0..n, y_range.0..y_range.1)
        .context("Failed to build chart")
}

/// Y axis labels and horizontal grid; x labels are drawn separately
fn draw_value_mesh<DB>(chart: &mut Chart<'_, DB>, axis: ValueAxis, opts: &RenderOptions) -> Result<()>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    let count = |v: &f64| format_tick(*v);
    let percent = |v: &f64| format_percent(*v);
    let formatter: &dyn Fn(&f64) -> String = match axis {
        ValueAxis::Count => &count,
        ValueAxis::Percent => &percent,
    };

    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_label_formatter(&|_| String::new())
        .y_label_formatter(formatter)
        .y_label_style(font(opts.px(LABEL_PT)))
        .draw()
        .context("Failed to draw mesh")?;
    Ok(())
}

/// Tick labels centred under each category slot
fn draw_category_ticks<DB>(
    root: &DrawingArea<DB, Shift>,
    chart: &Chart<'_, DB>,
    categories: &[TickLabel],
    y_floor: f64,
    opts: &RenderOptions,
) -> Result<()>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    let gap = line_step(opts.px(LABEL_PT)) / 3;
    for (i, label) in categories.iter().enumerate() {
        let (x, y) = chart.backend_coord(&(i as f64 + 0.5, y_floor));
        draw_lines(root, &label.text, (x, y + gap), opts.px(f64::from(label.font_size)), HPos::Center)?;
    }
    Ok(())
}

// =============================================================================
// Bar charts
// =============================================================================

fn draw_bar_chart<DB>(root: &DrawingArea<DB, Shift>, spec: &BarChart, opts: &RenderOptions) -> Result<()>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    let body = split_title(root, &spec.title, opts)?;
    let y_range = bar_range(&spec.values);
    let mut chart = build_category_chart(&body, &spec.categories, y_range, opts)?;
    draw_value_mesh(&mut chart, spec.axis, opts)?;

    let palette = ColorPalette::deep();
    chart
        .draw_series(spec.values.iter().enumerate().map(|(i, &v)| {
            let x = i as f64;
            Rectangle::new([(x + 0.1, 0.0), (x + 0.9, v)], palette.color(i).filled())
        }))
        .context("Failed to draw bars")?;

    draw_category_ticks(root, &chart, &spec.categories, y_range.0, opts)
}

fn draw_grouped_bar_chart<DB>(root: &DrawingArea<DB, Shift>, spec: &GroupedBarChart, opts: &RenderOptions) -> Result<()>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    let (w, _) = root.dim_in_pixel();
    let legend_w = (f64::from(w) * LEGEND_SHARE) as u32;
    let (plot_area, legend_area) = root.split_horizontally(w - legend_w);

    let body = split_title(&plot_area, &spec.title, opts)?;
    let flat: Vec<f64> = spec.values.iter().flatten().copied().collect();
    let y_range = bar_range(&flat);
    let mut chart = build_category_chart(&body, &spec.categories, y_range, opts)?;
    draw_value_mesh(&mut chart, spec.axis, opts)?;

    let palette = &ColorPalette::deep();
    let hues = spec.legend_entries.len().max(1);
    let bar_w = 0.8 / hues as f64;
    chart
        .draw_series(spec.values.iter().enumerate().flat_map(|(i, row)| {
            row.iter().enumerate().filter(|(_, v)| **v != 0.0).map(move |(j, &v)| {
                let x = i as f64 + 0.1 + j as f64 * bar_w;
                Rectangle::new([(x, 0.0), (x + bar_w, v)], palette.color(j).filled())
            })
        }))
        .context("Failed to draw bars")?;

    draw_category_ticks(root, &chart, &spec.categories, y_range.0, opts)?;

    let (_, plot_h) = plot_area.dim_in_pixel();
    let (_, body_h) = body.dim_in_pixel();
    draw_legend(&legend_area, spec, (plot_h - body_h) as i32, opts)
}

/// Frameless legend: centred title, then one swatch per hue
fn draw_legend<DB>(area: &DrawingArea<DB, Shift>, spec: &GroupedBarChart, top: i32, opts: &RenderOptions) -> Result<()>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    let size = opts.px(LABEL_PT);
    let (w, _) = area.dim_in_pixel();
    let pad = line_step(size) / 2;

    draw_lines(area, &spec.legend_title, (w as i32 / 2, top), size, HPos::Center)?;

    let palette = ColorPalette::deep();
    let swatch = size.round() as i32;
    let mut y = top + text_height(&spec.legend_title, size) + pad;
    for (j, entry) in spec.legend_entries.iter().enumerate() {
        area.draw(&Rectangle::new([(pad, y), (pad + swatch, y + swatch)], palette.color(j).filled()))
            .context("Failed to draw legend swatch")?;
        draw_lines(area, entry, (2 * pad + swatch, y), size, HPos::Left)?;
        y += text_height(entry, size).max(swatch) + pad;
    }
    Ok(())
}

fn draw_mean_bar_chart<DB>(root: &DrawingArea<DB, Shift>, spec: &MeanBarChart, opts: &RenderOptions) -> Result<()>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    let (w, _) = root.dim_in_pixel();
    let (label_area, plot_area) = root.split_horizontally((f64::from(w) * Y_LABEL_SHARE) as u32);
    draw_vertical_label(&label_area, &spec.y_label, opts.px(LABEL_PT))?;

    let body = split_title(&plot_area, &spec.title, opts)?;
    let (lo, hi) = spec.y_range;
    let mut chart = build_category_chart(&body, &spec.categories, spec.y_range, opts)?;
    draw_value_mesh(&mut chart, ValueAxis::Count, opts)?;

    // Bars rise from zero, or from the axis floor when zero is off the scale
    let base = 0.0_f64.clamp(lo, hi);
    let palette = ColorPalette::deep();
    chart
        .draw_series(spec.means.iter().enumerate().filter_map(|(i, mean)| {
            mean.map(|m| {
                let x = i as f64;
                Rectangle::new([(x + 0.1, base), (x + 0.9, m.clamp(lo, hi))], palette.color(i).filled())
            })
        }))
        .context("Failed to draw bars")?;

    draw_category_ticks(root, &chart, &spec.categories, lo, opts)
}

// =============================================================================
// Choropleth
// =============================================================================

fn draw_choropleth<DB>(root: &DrawingArea<DB, Shift>, spec: &ChoroplethChart, opts: &RenderOptions) -> Result<()>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    let (w, _) = root.dim_in_pixel();
    let colorbar_w = opts.px(70.0) as u32;
    let (map_area, colorbar_area) = root.split_horizontally(w.saturating_sub(colorbar_w));
    let ramp = ColorRamp::viridis();

    draw_colorbar(&colorbar_area, &ramp, spec, opts)?;

    let Some(extent) = spec.extent else {
        let (mw, mh) = map_area.dim_in_pixel();
        return draw_lines(&map_area, "No data", (mw as i32 / 2, mh as i32 / 2), opts.px(TITLE_PT), HPos::Center);
    };

    let margin = opts.px(10.0) as u32;
    let (mw, mh) = map_area.dim_in_pixel();
    let aspect = f64::from(mw.saturating_sub(2 * margin).max(1)) / f64::from(mh.saturating_sub(2 * margin).max(1));
    let view = extent.pad(0.05).fit_aspect(aspect);

    let mut chart = ChartBuilder::on(&map_area)
        .margin(margin)
        .build_cartesian_2d(view.x_min..view.x_max, view.y_min..view.y_max)
        .context("Failed to build map")?;

    if let Some(basemap) = &spec.basemap {
        draw_basemap(&mut chart, basemap, &view)?;
    }

    let (lo, hi) = spec.scale;
    for shape in &spec.shapes {
        let fill = ramp.color(shape.value, lo, hi).mix(spec.alpha);
        chart
            .draw_series(shape.rings.iter().map(|ring| Polygon::new(ring.clone(), fill.filled())))
            .context("Failed to draw unit")?;
        chart
            .draw_series(shape.rings.iter().map(|ring| PathElement::new(ring.clone(), WHITE.mix(0.6).stroke_width(1))))
            .context("Failed to draw unit outline")?;
    }

    chart
        .plotting_area()
        .draw(&Rectangle::new(
            [(view.x_min, view.y_max), (view.x_max, view.y_min)],
            ShapeStyle::from(&BLACK),
        ))
        .context("Failed to draw map frame")?;
    Ok(())
}

fn draw_basemap<DB>(chart: &mut Chart<'_, DB>, basemap: &Basemap, view: &Extent) -> Result<()>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    for tile in &basemap.tiles {
        let Some(overlap) = tile.bounds.intersection(view) else {
            continue;
        };
        let (x0, y0) = chart.backend_coord(&(overlap.x_min, overlap.y_max));
        let (x1, y1) = chart.backend_coord(&(overlap.x_max, overlap.y_min));
        let size = ((x1 - x0).max(1) as u32, (y1 - y0).max(1) as u32);

        let Some(patch) = tile.patch(view, size.0, size.1) else {
            continue;
        };
        let element: Option<BitMapElement<(f64, f64)>> =
            BitMapElement::with_owned_buffer((overlap.x_min, overlap.y_max), size, patch.into_raw());
        if let Some(element) = element {
            chart
                .draw_series(std::iter::once(element))
                .context("Failed to draw basemap tile")?;
        }
    }
    Ok(())
}

/// Vertical colour scale with evenly spaced ticks
fn draw_colorbar<DB>(area: &DrawingArea<DB, Shift>, ramp: &ColorRamp, spec: &ChoroplethChart, opts: &RenderOptions) -> Result<()>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    let (w, h) = area.dim_in_pixel();
    let (w, h) = (w as i32, h as i32);
    let (left, right) = (w / 10, w * 3 / 10);
    let (top, bottom) = (h / 10, h * 9 / 10);
    let span = (bottom - top).max(1);

    for step in 0..COLORBAR_STEPS {
        let t0 = step as f64 / COLORBAR_STEPS as f64;
        let t1 = (step + 1) as f64 / COLORBAR_STEPS as f64;
        let y_hi = bottom - (t1 * f64::from(span)).round() as i32;
        let y_lo = bottom - (t0 * f64::from(span)).round() as i32;
        let color = ramp.color_at((t0 + t1) / 2.0).mix(spec.alpha);
        area.draw(&Rectangle::new([(left, y_hi), (right, y_lo)], color.filled()))
            .context("Failed to draw colour bar")?;
    }
    area.draw(&Rectangle::new([(left, top), (right, bottom)], ShapeStyle::from(&BLACK)))
        .context("Failed to draw colour bar frame")?;

    let (lo, hi) = spec.scale;
    let size = opts.px(LABEL_PT);
    let style = font(size).color(&BLACK).pos(Pos::new(HPos::Left, VPos::Center));
    let tick_len = (size / 2.0).round() as i32;
    for value in linear_ticks(lo, hi, COLORBAR_TICKS) {
        let t = if hi > lo { (value - lo) / (hi - lo) } else { 0.5 };
        let y = bottom - (t * f64::from(span)).round() as i32;
        area.draw(&PathElement::new(vec![(right, y), (right + tick_len, y)], &BLACK))
            .context("Failed to draw colour bar tick")?;
        area.draw(&Text::new(format_tick(value), (right + tick_len + 2, y), style.clone()))
            .context("Failed to draw colour bar label")?;
    }
    Ok(())
}
