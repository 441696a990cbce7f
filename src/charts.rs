#![cfg(feature = "web")]
use crate::loader::{Column, Table, Value};
use plotters::coord::Shift;
use plotters::prelude::*;
use serde::Serialize;
use std::f64::consts::{FRAC_PI_2, TAU};
use std::panic::{AssertUnwindSafe, catch_unwind};
use thiserror::Error;

/// Chart types rendered on the dashboard
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChartKind {
    /// Sum of the second column per category of the first
    Bar,

    /// Share of each category of the first column
    Pie,

    /// Distribution of the second column
    Histogram,

    /// First column against the second, one point per row
    Scatter,
}

impl ChartKind {
    pub const ALL: [ChartKind; 4] = [
        ChartKind::Bar,
        ChartKind::Pie,
        ChartKind::Histogram,
        ChartKind::Scatter,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            ChartKind::Bar => "bar",
            ChartKind::Pie => "pie",
            ChartKind::Histogram => "histogram",
            ChartKind::Scatter => "scatter",
        }
    }
}

#[derive(Debug, Error)]
pub enum ChartError {
    #[error("column {0} has no numeric values")]
    NotNumeric(String),

    #[error("column {0} has nothing to plot")]
    Empty(String),

    #[error("drawing failed: {0}")]
    Drawing(String),

    #[error("renderer panicked")]
    Panicked,
}

impl<E: std::error::Error + Send + Sync> From<DrawingAreaErrorKind<E>> for ChartError {
    fn from(err: DrawingAreaErrorKind<E>) -> Self {
        ChartError::Drawing(err.to_string())
    }
}

/// Layout of a rendered chart
#[derive(Clone, Debug)]
pub struct ChartOptions {
    /// Title displayed at the top of the chart
    pub title: String,

    /// Label for the X-axis
    pub x_label: String,

    /// Label for the Y-axis
    pub y_label: String,

    /// Width of the chart in pixels
    pub width: u32,

    /// Height of the chart in pixels
    pub height: u32,
}

impl Default for ChartOptions {
    fn default() -> Self {
        Self {
            title: "Chart".to_string(),
            x_label: String::new(),
            y_label: String::new(),
            width: 640,
            height: 420,
        }
    }
}

/// Rendered dashboard charts as inline SVG markup; a chart that could not
/// be drawn is `None`
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct Charts {
    pub bar: Option<String>,
    pub pie: Option<String>,
    pub histogram: Option<String>,
    pub scatter: Option<String>,
}

impl Charts {
    pub fn get(&self, kind: ChartKind) -> Option<&str> {
        match kind {
            ChartKind::Bar => self.bar.as_deref(),
            ChartKind::Pie => self.pie.as_deref(),
            ChartKind::Histogram => self.histogram.as_deref(),
            ChartKind::Scatter => self.scatter.as_deref(),
        }
    }

    pub fn is_empty(&self) -> bool {
        ChartKind::ALL.iter().all(|kind| self.get(*kind).is_none())
    }

    fn slot_mut(&mut self, kind: ChartKind) -> &mut Option<String> {
        match kind {
            ChartKind::Bar => &mut self.bar,
            ChartKind::Pie => &mut self.pie,
            ChartKind::Histogram => &mut self.histogram,
            ChartKind::Scatter => &mut self.scatter,
        }
    }
}

/// One histogram bucket covering `[start, end)`; the last one also holds `end`
#[derive(Clone, Debug, PartialEq)]
pub struct Bin {
    pub start: f64,
    pub end: f64,
    pub count: usize,
}

/// Columns the dashboard charts are drawn from.
///
/// Selection is positional: column 0 and column 1, whatever they hold.
/// Tables with fewer than two columns get no charts.
pub fn chart_columns(table: &Table) -> Option<(&Column, &Column)> {
    match table.columns() {
        [first, second, ..] => Some((first, second)),
        _ => None,
    }
}

/// Render every dashboard chart for a table.
///
/// Each chart is attempted independently; a failure is logged and leaves
/// only that chart absent.
pub fn generate_charts(table: &Table) -> Charts {
    let mut charts = Charts::default();
    let Some((x, y)) = chart_columns(table) else {
        return charts;
    };

    for kind in ChartKind::ALL {
        let rendered = catch_unwind(AssertUnwindSafe(|| render_chart(kind, x, y)))
            .unwrap_or(Err(ChartError::Panicked));
        match rendered {
            Ok(svg) => *charts.slot_mut(kind) = Some(svg),
            Err(e) => log::warn!(
                "skipping {} chart of {} / {}: {}",
                kind.label(),
                x.name(),
                y.name(),
                e
            ),
        }
    }

    charts
}

/// Render a single chart of `x` (first column) and `y` (second column) as SVG
pub fn render_chart(kind: ChartKind, x: &Column, y: &Column) -> Result<String, ChartError> {
    match kind {
        ChartKind::Bar => {
            let options = ChartOptions {
                title: format!("Bar Chart of {} vs {}", x.name(), y.name()),
                x_label: x.name().to_string(),
                y_label: y.name().to_string(),
                ..ChartOptions::default()
            };
            bar_chart(&category_sums(x, y)?, &options)
        }
        ChartKind::Pie => {
            let options = ChartOptions {
                title: format!("Pie Chart of {}", x.name()),
                ..ChartOptions::default()
            };
            pie_chart(&category_counts(x)?, &options)
        }
        ChartKind::Histogram => {
            let options = ChartOptions {
                title: format!("Histogram of {}", y.name()),
                x_label: y.name().to_string(),
                y_label: "count".to_string(),
                ..ChartOptions::default()
            };
            histogram_chart(&histogram_bins(y)?, &options)
        }
        ChartKind::Scatter => {
            let options = ChartOptions {
                title: format!("Scatter Plot of {} vs {}", x.name(), y.name()),
                x_label: x.name().to_string(),
                y_label: y.name().to_string(),
                ..ChartOptions::default()
            };
            let (points, categories) = scatter_points(x, y)?;
            scatter_chart(&points, categories.as_deref(), &options)
        }
    }
}

/// Sum of `y` per distinct value of `x`, in order of first appearance
pub fn category_sums(x: &Column, y: &Column) -> Result<Vec<(String, f64)>, ChartError> {
    require_numeric(y)?;
    let mut sums: Vec<(String, f64)> = Vec::new();
    for (cx, cy) in x.values().iter().zip(y.values()) {
        let (Some(label), Some(value)) = (category(cx), cy.as_f64()) else {
            continue;
        };
        match sums.iter_mut().find(|(l, _)| *l == label) {
            Some((_, total)) => *total += value,
            None => sums.push((label, value)),
        }
    }
    if sums.is_empty() {
        return Err(ChartError::Empty(x.name().to_string()));
    }
    Ok(sums)
}

/// Number of rows per distinct value of `x`, in order of first appearance
pub fn category_counts(x: &Column) -> Result<Vec<(String, usize)>, ChartError> {
    let mut counts: Vec<(String, usize)> = Vec::new();
    for label in x.values().iter().filter_map(category) {
        match counts.iter_mut().find(|(l, _)| *l == label) {
            Some((_, n)) => *n += 1,
            None => counts.push((label, 1)),
        }
    }
    if counts.is_empty() {
        return Err(ChartError::Empty(x.name().to_string()));
    }
    Ok(counts)
}

/// Bucket the numeric values of `y` using Sturges' rule for the bin count
pub fn histogram_bins(y: &Column) -> Result<Vec<Bin>, ChartError> {
    require_numeric(y)?;
    let values = y.numbers();
    if values.is_empty() {
        return Err(ChartError::Empty(y.name().to_string()));
    }

    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if min == max {
        return Ok(vec![Bin {
            start: min - 0.5,
            end: max + 0.5,
            count: values.len(),
        }]);
    }

    let bins = (values.len() as f64).log2().ceil() as usize + 1;
    let width = (max - min) / bins as f64;
    let mut counts = vec![0usize; bins];
    for v in &values {
        let idx = (((v - min) / width).floor() as usize).min(bins - 1);
        counts[idx] += 1;
    }

    Ok(counts
        .into_iter()
        .enumerate()
        .map(|(i, count)| Bin {
            start: min + width * i as f64,
            end: min + width * (i + 1) as f64,
            count,
        })
        .collect())
}

/// Points of `x` against `y`.
///
/// A non-numeric `x` is plotted by category position; the category labels
/// are returned alongside the points in that case.
pub fn scatter_points(
    x: &Column,
    y: &Column,
) -> Result<(Vec<(f64, f64)>, Option<Vec<String>>), ChartError> {
    require_numeric(y)?;

    let mut labels: Vec<String> = Vec::new();
    let mut points = Vec::new();
    for (cx, cy) in x.values().iter().zip(y.values()) {
        let Some(py) = cy.as_f64() else { continue };
        let px = if x.is_numeric() {
            match cx.as_f64() {
                Some(px) => px,
                None => continue,
            }
        } else {
            let Some(label) = category(cx) else { continue };
            match labels.iter().position(|l| *l == label) {
                Some(i) => i as f64,
                None => {
                    labels.push(label);
                    (labels.len() - 1) as f64
                }
            }
        };
        points.push((px, py));
    }

    if points.is_empty() {
        return Err(ChartError::Empty(x.name().to_string()));
    }
    let categories = if x.is_numeric() { None } else { Some(labels) };
    Ok((points, categories))
}

fn require_numeric(column: &Column) -> Result<(), ChartError> {
    if column.is_numeric() && !column.numbers().is_empty() {
        Ok(())
    } else {
        Err(ChartError::NotNumeric(column.name().to_string()))
    }
}

fn category(value: &Value) -> Option<String> {
    if value.is_missing() {
        None
    } else {
        Some(value.to_string())
    }
}

/// Label for a tick on a categorical axis whose categories sit on integers
fn category_label(labels: &[String], x: f64) -> String {
    let rounded = x.round();
    if (x - rounded).abs() > 1e-6 || rounded < 0.0 {
        return String::new();
    }
    labels.get(rounded as usize).cloned().unwrap_or_default()
}

/// Axis range covering `[min, max]` with a little headroom
fn padded(min: f64, max: f64) -> std::ops::Range<f64> {
    if min == max {
        return (min - 1.0)..(max + 1.0);
    }
    let margin = (max - min) * 0.05;
    (min - margin)..(max + margin)
}

fn bar_chart(data: &[(String, f64)], options: &ChartOptions) -> Result<String, ChartError> {
    let mut svg = String::new();
    {
        let root = SVGBackend::with_string(&mut svg, (options.width, options.height))
            .into_drawing_area();
        root.fill(&WHITE)?;

        let labels: Vec<String> = data.iter().map(|(label, _)| label.clone()).collect();
        let label_at = |x: &f64| category_label(&labels, *x);
        let min_y = data.iter().map(|(_, v)| *v).fold(0.0, f64::min);
        let max_y = data.iter().map(|(_, v)| *v).fold(0.0, f64::max);

        let mut chart = ChartBuilder::on(&root)
            .caption(&options.title, ("sans-serif", 24).into_font())
            .margin(10)
            .x_label_area_size(40)
            .y_label_area_size(60)
            .build_cartesian_2d(-0.5..(data.len() as f64 - 0.5), padded(min_y, max_y))?;

        chart
            .configure_mesh()
            .disable_x_mesh()
            .x_labels(data.len().min(20))
            .x_label_formatter(&label_at)
            .x_desc(&options.x_label)
            .y_desc(&options.y_label)
            .draw()?;

        chart.draw_series(data.iter().enumerate().map(|(i, (_, v))| {
            let x = i as f64;
            Rectangle::new([(x - 0.4, 0.0), (x + 0.4, *v)], BLUE.filled())
        }))?;

        root.present()?;
    }
    Ok(svg)
}

fn pie_chart(data: &[(String, usize)], options: &ChartOptions) -> Result<String, ChartError> {
    let total: usize = data.iter().map(|(_, n)| n).sum();
    let mut svg = String::new();
    {
        let root = SVGBackend::with_string(&mut svg, (options.width, options.height))
            .into_drawing_area();
        root.fill(&WHITE)?;
        let area = root.titled(&options.title, ("sans-serif", 24).into_font())?;
        draw_pie(&area, data, total)?;
        root.present()?;
    }
    Ok(svg)
}

fn draw_pie<DB: DrawingBackend>(
    area: &DrawingArea<DB, Shift>,
    data: &[(String, usize)],
    total: usize,
) -> Result<(), DrawingAreaErrorKind<DB::ErrorType>> {
    let (width, height) = area.dim_in_pixel();
    let center = (width as i32 / 2, height as i32 / 2);
    let radius = width.min(height) as f64 * 0.35;

    // Slices run clockwise from twelve o'clock
    let mut start = -FRAC_PI_2;
    for (i, (label, count)) in data.iter().enumerate() {
        let share = *count as f64 / total as f64;
        let sweep = share * TAU;
        area.draw(&Polygon::new(
            wedge(center, radius, start, sweep),
            Palette99::pick(i).filled(),
        ))?;

        let mid = start + sweep / 2.0;
        let anchor = (
            center.0 + (radius * 1.1 * mid.cos()) as i32,
            center.1 + (radius * 1.1 * mid.sin()) as i32,
        );
        area.draw(&Text::new(
            format!("{} ({:.1}%)", label, share * 100.0),
            anchor,
            ("sans-serif", 14).into_font(),
        ))?;
        start += sweep;
    }
    Ok(())
}

/// Outline of a pie slice: the centre followed by points along the arc
fn wedge(center: (i32, i32), radius: f64, start: f64, sweep: f64) -> Vec<(i32, i32)> {
    let steps = ((sweep / (TAU / 180.0)).ceil() as usize).max(2);
    let mut points = Vec::with_capacity(steps + 2);
    points.push(center);
    for s in 0..=steps {
        let angle = start + sweep * s as f64 / steps as f64;
        points.push((
            center.0 + (radius * angle.cos()).round() as i32,
            center.1 + (radius * angle.sin()).round() as i32,
        ));
    }
    points
}

fn histogram_chart(bins: &[Bin], options: &ChartOptions) -> Result<String, ChartError> {
    let (Some(first), Some(last)) = (bins.first(), bins.last()) else {
        return Err(ChartError::Empty(options.x_label.clone()));
    };
    let max_count = bins.iter().map(|b| b.count).max().unwrap_or(0) as f64;

    let mut svg = String::new();
    {
        let root = SVGBackend::with_string(&mut svg, (options.width, options.height))
            .into_drawing_area();
        root.fill(&WHITE)?;

        let mut chart = ChartBuilder::on(&root)
            .caption(&options.title, ("sans-serif", 24).into_font())
            .margin(10)
            .x_label_area_size(40)
            .y_label_area_size(50)
            .build_cartesian_2d(first.start..last.end, 0.0..(max_count * 1.1).max(1.0))?;

        chart
            .configure_mesh()
            .disable_x_mesh()
            .x_desc(&options.x_label)
            .y_desc(&options.y_label)
            .draw()?;

        chart.draw_series(bins.iter().map(|bin| {
            Rectangle::new(
                [(bin.start, 0.0), (bin.end, bin.count as f64)],
                BLUE.mix(0.7).filled(),
            )
        }))?;

        root.present()?;
    }
    Ok(svg)
}

fn scatter_chart(
    points: &[(f64, f64)],
    categories: Option<&[String]>,
    options: &ChartOptions,
) -> Result<String, ChartError> {
    let min_y = points.iter().map(|p| p.1).fold(f64::INFINITY, f64::min);
    let max_y = points.iter().map(|p| p.1).fold(f64::NEG_INFINITY, f64::max);
    let x_range = match categories {
        Some(labels) => -0.5..(labels.len() as f64 - 0.5),
        None => {
            let min_x = points.iter().map(|p| p.0).fold(f64::INFINITY, f64::min);
            let max_x = points.iter().map(|p| p.0).fold(f64::NEG_INFINITY, f64::max);
            padded(min_x, max_x)
        }
    };
    let labels: Vec<String> = categories.map(<[String]>::to_vec).unwrap_or_default();
    let label_at = |x: &f64| category_label(&labels, *x);
    let plain = |x: &f64| format!("{}", x);

    let mut svg = String::new();
    {
        let root = SVGBackend::with_string(&mut svg, (options.width, options.height))
            .into_drawing_area();
        root.fill(&WHITE)?;

        let mut chart = ChartBuilder::on(&root)
            .caption(&options.title, ("sans-serif", 24).into_font())
            .margin(10)
            .x_label_area_size(40)
            .y_label_area_size(60)
            .build_cartesian_2d(x_range, padded(min_y, max_y))?;

        let mut mesh = chart.configure_mesh();
        mesh.x_desc(&options.x_label).y_desc(&options.y_label);
        if categories.is_some() {
            mesh.x_labels(labels.len().min(20)).x_label_formatter(&label_at);
        } else {
            mesh.x_label_formatter(&plain);
        }
        mesh.draw()?;

        chart.draw_series(
            points
                .iter()
                .map(|&(x, y)| Circle::new((x, y), 4, GREEN.filled())),
        )?;

        root.present()?;
    }
    Ok(svg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wedge_starts_at_center_and_follows_arc() {
        let points = wedge((100, 100), 50.0, 0.0, FRAC_PI_2);
        assert_eq!(points[0], (100, 100));
        assert_eq!(points[1], (150, 100));
        assert_eq!(*points.last().unwrap(), (100, 150));
    }

    #[test]
    fn category_ticks_only_on_integers() {
        let labels = vec!["a".to_string(), "b".to_string()];
        assert_eq!(category_label(&labels, 1.0), "b");
        assert_eq!(category_label(&labels, 0.5), "");
        assert_eq!(category_label(&labels, -1.0), "");
        assert_eq!(category_label(&labels, 5.0), "");
    }
}
