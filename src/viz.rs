//! Charts from normalized records, rendered with plotters.
//!
//! The x column is treated as categorical (sorted like periods), the y column as
//! numeric, and an optional color column splits the records into series. The
//! output format follows the file extension: `.svg` gets a full chart with
//! caption, tick labels and legend; other extensions are written as PNG without
//! text, since no font engine is bundled.

use crate::analytics::{DEFAULT_PERIOD_FIELD, DEFAULT_VALUE_FIELD, compare_periods};
use crate::error::{Error, Result};
use crate::models::Record;
use num_format::{Locale, ToFormattedString};
use plotters::coord::Shift;
use plotters::prelude::*;
use plotters_bitmap::BitMapBackend;
use plotters_svg::SVGBackend;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

const LOG_TARGET: &str = "ine_rs::viz";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ChartKind {
    #[default]
    Line,
    Bar,
    Area,
    Scatter,
}

impl FromStr for ChartKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "line" => Ok(ChartKind::Line),
            "bar" => Ok(ChartKind::Bar),
            "area" => Ok(ChartKind::Area),
            "scatter" => Ok(ChartKind::Scatter),
            other => Err(Error::Validation(format!(
                "Unknown chart type '{other}'; expected line, bar, area or scatter"
            ))),
        }
    }
}

impl fmt::Display for ChartKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ChartKind::Line => "line",
            ChartKind::Bar => "bar",
            ChartKind::Area => "area",
            ChartKind::Scatter => "scatter",
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlotOptions {
    pub kind: ChartKind,
    pub x: String,
    pub y: String,
    /// Column whose values split the records into separate series.
    pub color: Option<String>,
    pub title: Option<String>,
    pub width: u32,
    pub height: u32,
    /// Locale tag for y tick labels (`en`, `pt`, `de`, ...).
    pub locale: String,
}

impl Default for PlotOptions {
    fn default() -> Self {
        Self {
            kind: ChartKind::Line,
            x: DEFAULT_PERIOD_FIELD.into(),
            y: DEFAULT_VALUE_FIELD.into(),
            color: None,
            title: None,
            width: 1000,
            height: 600,
            locale: "en".into(),
        }
    }
}

impl PlotOptions {
    pub fn with_kind(mut self, kind: ChartKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_x(mut self, x: impl Into<String>) -> Self {
        self.x = x.into();
        self
    }

    pub fn with_y(mut self, y: impl Into<String>) -> Self {
        self.y = y.into();
        self
    }

    pub fn with_color(mut self, color: impl Into<String>) -> Self {
        self.color = Some(color.into());
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    pub fn with_locale(mut self, locale: impl Into<String>) -> Self {
        self.locale = locale.into();
        self
    }
}

/// Map a locale tag to a num-format Locale.
fn map_locale(tag: &str) -> &'static Locale {
    match tag.to_lowercase().as_str() {
        "de" | "de_de" | "german" => &Locale::de,
        "fr" | "fr_fr" => &Locale::fr,
        "es" | "es_es" => &Locale::es,
        "it" | "it_it" => &Locale::it,
        "pt" | "pt_pt" | "pt_br" => &Locale::pt,
        "nl" | "nl_nl" => &Locale::nl,
        _ => &Locale::en,
    }
}

fn label_of(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Categories along x plus the (x index, y) points of each series.
#[derive(Debug)]
struct ChartData {
    categories: Vec<String>,
    series: Vec<(String, Vec<(f64, f64)>)>,
    y_min: f64,
    y_max: f64,
}

fn prepare(records: &[Record], opts: &PlotOptions) -> Result<ChartData> {
    let Some(first) = records.first() else {
        return Err(Error::Validation("no data to plot".into()));
    };
    for col in std::iter::once(&opts.x)
        .chain(std::iter::once(&opts.y))
        .chain(opts.color.as_ref())
    {
        if !first.has_field(col) {
            return Err(Error::Validation(format!("Column '{col}' not found in data")));
        }
    }

    let mut xs: Vec<&Value> = Vec::new();
    for r in records {
        if let Some(x) = r.field(&opts.x).filter(|v| !v.is_null())
            && !xs.contains(&x)
        {
            xs.push(x);
        }
    }
    xs.sort_by(|a, b| compare_periods(Some(*a), Some(*b)));
    let index_of = |v: &Value| xs.iter().position(|x| *x == v);

    let mut groups: BTreeMap<String, Vec<(f64, f64)>> = BTreeMap::new();
    for r in records {
        let (Some(x), Some(y)) = (r.field(&opts.x), r.numeric(&opts.y)) else {
            continue;
        };
        let (Some(i), true) = (index_of(x), y.is_finite()) else {
            continue;
        };
        let name = match &opts.color {
            Some(col) => r.field(col).map(label_of).unwrap_or_default(),
            None => opts.y.clone(),
        };
        groups.entry(name).or_default().push((i as f64, y));
    }
    if groups.is_empty() {
        return Err(Error::Validation(format!(
            "no numeric values in column '{}' to plot",
            opts.y
        )));
    }
    for points in groups.values_mut() {
        points.sort_by(|a, b| a.0.total_cmp(&b.0));
    }

    let ys = groups.values().flatten().map(|p| p.1);
    let (mut y_min, mut y_max) = ys.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), y| {
        (lo.min(y), hi.max(y))
    });
    if matches!(opts.kind, ChartKind::Bar | ChartKind::Area) {
        y_min = y_min.min(0.0);
        y_max = y_max.max(0.0);
    }
    if (y_max - y_min).abs() < f64::EPSILON {
        y_min -= 1.0;
        y_max += 1.0;
    }
    let pad = (y_max - y_min) * 0.05;
    if y_min != 0.0 {
        y_min -= pad;
    }
    y_max += pad;

    Ok(ChartData {
        categories: xs.into_iter().map(label_of).collect(),
        series: groups.into_iter().collect(),
        y_min,
        y_max,
    })
}

/// Render `records` to `path` (SVG by `.svg` extension, PNG otherwise).
pub fn plot<P: AsRef<Path>>(records: &[Record], opts: &PlotOptions, path: P) -> Result<()> {
    let data = prepare(records, opts)?;
    let path = path.as_ref();
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)
            .map_err(|e| Error::processing(format!("create directory '{}'", dir.display()), e))?;
    }

    let is_svg = path
        .extension()
        .and_then(|s| s.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("svg"));
    let size = (opts.width, opts.height);
    if is_svg {
        let root = SVGBackend::new(path, size).into_drawing_area();
        draw_chart(root, &data, opts, true)?;
    } else {
        let root = BitMapBackend::new(path, size).into_drawing_area();
        draw_chart(root, &data, opts, false)?;
    }
    log::info!(
        target: LOG_TARGET,
        "Saved {} chart with {} series to {}",
        opts.kind,
        data.series.len(),
        path.display()
    );
    Ok(())
}

fn render_err(e: impl fmt::Debug) -> Error {
    Error::Processing(format!("render chart: {e:?}"))
}

/// Draw on any plotters backend; `with_text` controls caption, labels and legend.
fn draw_chart<DB>(
    root: DrawingArea<DB, Shift>,
    data: &ChartData,
    opts: &PlotOptions,
    with_text: bool,
) -> Result<()>
where
    DB: DrawingBackend,
{
    root.fill(&WHITE).map_err(render_err)?;

    let n = data.categories.len();
    let x_range = -0.5f64..(n as f64 - 0.5);
    let mut builder = ChartBuilder::on(&root);
    builder.margin(20);
    if with_text {
        if let Some(title) = &opts.title {
            builder.caption(title, ("sans-serif", 24));
        }
        builder
            .set_label_area_size(LabelAreaPosition::Left, 80)
            .set_label_area_size(LabelAreaPosition::Bottom, 44);
    }
    let mut chart = builder
        .build_cartesian_2d(x_range, data.y_min..data.y_max)
        .map_err(render_err)?;

    if with_text {
        let locale = map_locale(&opts.locale);
        let small_range = (data.y_max - data.y_min) < 10.0;
        let y_label_fmt = |v: &f64| {
            if small_range {
                format!("{v:.2}")
            } else {
                ((*v).round() as i64).to_formatted_string(locale)
            }
        };
        let x_label_fmt = |v: &f64| {
            let i = v.round();
            if (v - i).abs() > 1e-6 || i < 0.0 {
                return String::new();
            }
            data.categories.get(i as usize).cloned().unwrap_or_default()
        };
        chart
            .configure_mesh()
            .x_desc(opts.x.as_str())
            .y_desc(opts.y.as_str())
            .x_labels(n.min(12))
            .y_labels(10)
            .x_label_formatter(&x_label_fmt)
            .y_label_formatter(&y_label_fmt)
            .label_style(("sans-serif", 14))
            .axis_desc_style(("sans-serif", 16))
            .draw()
            .map_err(render_err)?;
    } else {
        chart
            .configure_mesh()
            .x_labels(0)
            .y_labels(0)
            .draw()
            .map_err(render_err)?;
    }

    let k = data.series.len();
    let bar_width = 0.8 / k as f64;
    for (idx, (name, points)) in data.series.iter().enumerate() {
        let color = Palette99::pick(idx).to_rgba();
        let style = ShapeStyle {
            color: color.clone(),
            filled: false,
            stroke_width: 2,
        };
        let anno = match opts.kind {
            ChartKind::Line => chart
                .draw_series(LineSeries::new(points.iter().copied(), style))
                .map_err(render_err)?,
            ChartKind::Area => chart
                .draw_series(
                    AreaSeries::new(points.iter().copied(), 0.0, color.mix(0.3))
                        .border_style(style),
                )
                .map_err(render_err)?,
            ChartKind::Scatter => chart
                .draw_series(
                    points
                        .iter()
                        .map(|&(x, y)| Circle::new((x, y), 4, color.clone().filled())),
                )
                .map_err(render_err)?,
            ChartKind::Bar => {
                let offset = -0.4 + bar_width * idx as f64;
                chart
                    .draw_series(points.iter().map(|&(x, y)| {
                        Rectangle::new(
                            [(x + offset, 0.0), (x + offset + bar_width, y)],
                            color.clone().filled(),
                        )
                    }))
                    .map_err(render_err)?
            }
        };
        if with_text && k > 1 {
            anno.label(name.as_str()).legend(move |(x, y)| {
                Rectangle::new([(x, y - 5), (x + 14, y + 5)], color.clone().filled())
            });
        }
    }

    if with_text && k > 1 {
        chart
            .configure_series_labels()
            .border_style(BLACK)
            .position(SeriesLabelPosition::UpperLeft)
            .background_style(WHITE.mix(0.85))
            .label_font(("sans-serif", 14))
            .draw()
            .map_err(render_err)?;
    }

    root.present().map_err(render_err)?;
    Ok(())
}
