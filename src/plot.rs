//! Static PNG figures drawn with [`plotters`]
//!
//! Every chart is a plain struct describing what to draw, rendered by its `draw` method onto a
//! bitmap of the configured size. Categorical x axes put category `i` at `x = i`, so bars,
//! boxes and tick labels line up without a segmented coordinate system.
use std::fs;
use std::ops::Range;
use std::path::Path;

use ndarray::{Array2, Axis};
use plotters::coord::Shift;
use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};
use tracing::info;

use crate::descriptive::{BoxStats, Histogram};
use crate::error::Error;
use crate::Result;

pub const STEEL_BLUE: RGBColor = RGBColor(70, 130, 180);
pub const SEA_GREEN: RGBColor = RGBColor(46, 139, 87);
pub const MEDIUM_SEA_GREEN: RGBColor = RGBColor(60, 179, 113);
pub const FIREBRICK: RGBColor = RGBColor(178, 34, 34);
pub const PURPLE: RGBColor = RGBColor(128, 0, 128);
pub const DARK_GRAY: RGBColor = RGBColor(169, 169, 169);
pub const DARK_ORANGE: RGBColor = RGBColor(255, 140, 0);
pub const DARK_GREEN: RGBColor = RGBColor(0, 100, 0);
pub const INDIGO: RGBColor = RGBColor(75, 0, 130);
pub const GRAY: RGBColor = RGBColor(128, 128, 128);
pub const PURE_RED: RGBColor = RGBColor(255, 0, 0);
pub const MAIZE: RGBColor = RGBColor(244, 208, 84);

/// Default colour cycle for series without a colour of their own
pub const TAB10: [RGBColor; 10] = [
    RGBColor(31, 119, 180),
    RGBColor(255, 127, 14),
    RGBColor(44, 160, 44),
    RGBColor(214, 39, 40),
    RGBColor(148, 103, 189),
    RGBColor(140, 86, 75),
    RGBColor(227, 119, 194),
    RGBColor(127, 127, 127),
    RGBColor(188, 189, 34),
    RGBColor(23, 190, 207),
];

const TAB20: [RGBColor; 20] = [
    RGBColor(31, 119, 180),
    RGBColor(174, 199, 232),
    RGBColor(255, 127, 14),
    RGBColor(255, 187, 120),
    RGBColor(44, 160, 44),
    RGBColor(152, 223, 138),
    RGBColor(214, 39, 40),
    RGBColor(255, 152, 150),
    RGBColor(148, 103, 189),
    RGBColor(197, 176, 213),
    RGBColor(140, 86, 75),
    RGBColor(196, 156, 148),
    RGBColor(227, 119, 194),
    RGBColor(247, 182, 210),
    RGBColor(127, 127, 127),
    RGBColor(199, 199, 199),
    RGBColor(188, 189, 34),
    RGBColor(219, 219, 141),
    RGBColor(23, 190, 207),
    RGBColor(158, 218, 229),
];

/// `n` colours spread evenly over the 20-colour categorical palette
pub fn tab20(n: usize) -> Vec<RGBColor> {
    match n {
        0 => Vec::new(),
        1 => vec![TAB20[0]],
        _ => (0..n)
            .map(|i| {
                #[allow(
                    clippy::cast_precision_loss,
                    clippy::cast_possible_truncation,
                    clippy::cast_sign_loss
                )]
                let index = (i as f64 / (n - 1) as f64 * TAB20.len() as f64) as usize;
                TAB20[index.min(TAB20.len() - 1)]
            })
            .collect(),
    }
}

/// Colour `i` of the default cycle
pub fn cycle(i: usize) -> RGBColor {
    TAB10[i % TAB10.len()]
}

const FONT: &str = "sans-serif";

type Canvas<'a> = DrawingArea<BitMapBackend<'a>, Shift>;

fn plot_error(e: impl std::fmt::Display) -> Error {
    Error::Plot(e.to_string())
}

/// A white bitmap at `path`, creating the parent directory when needed
fn canvas(path: &Path, size: (u32, u32)) -> Result<Canvas<'_>> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
    }
    let root = BitMapBackend::new(path, size).into_drawing_area();
    root.fill(&WHITE).map_err(plot_error)?;
    Ok(root)
}

fn present(root: &Canvas<'_>, path: &Path) -> Result<()> {
    root.present().map_err(plot_error)?;
    info!(path = %path.display(), "saved figure");
    Ok(())
}

/// Text lines anchored in the upper-right corner of the plotting area
fn annotate(root: &Canvas<'_>, plot: (Range<i32>, Range<i32>), lines: &[String]) -> Result<()> {
    let style = TextStyle::from((FONT, 18).into_font()).pos(Pos::new(HPos::Right, VPos::Top));
    let (x, y) = plot;
    for (i, line) in (0_i32..).zip(lines) {
        root.draw(&Text::new(
            line.as_str(),
            (x.end - 12, y.start + 12 + 22 * i),
            style.clone(),
        ))
        .map_err(plot_error)?;
    }
    Ok(())
}

/// X range of `n` categories and the tick count that makes the mesh step exactly one
///
/// The range spans `n` units, so allowing `n + 1` key points puts a tick on every integer.
fn category_axis(n: usize) -> (Range<f64>, usize) {
    #[allow(clippy::cast_precision_loss)]
    let range = -0.5..(n.max(1) as f64 - 0.5);
    (range, n.max(1) + 1)
}

/// Label of the category at tick `x`, blank away from the integer positions
fn category_label(labels: &[String], x: f64) -> String {
    const SNAP: f64 = 1e-6;
    if x < -SNAP || (x - x.round()).abs() > SNAP {
        return String::new();
    }
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let index = x.round() as usize;
    labels.get(index).cloned().unwrap_or_default()
}

/// Part of the bar `[bottom, top]` visible in the y window `[low, high]`
fn clip(bar: (f64, f64), window: (f64, f64)) -> Option<(f64, f64)> {
    let (bottom, top) = (bar.0.min(bar.1), bar.0.max(bar.1));
    let (low, high) = window;
    (top > low && bottom < high).then(|| (bottom.max(low), top.min(high)))
}

/// Upper y limit leaving headroom above the tallest element
fn headroom(values: impl Iterator<Item = f64>) -> f64 {
    let max = values.filter(|v| v.is_finite()).fold(0.0, f64::max);
    if max > 0.0 {
        max * 1.1
    } else {
        1.0
    }
}

/// One set of bars, one bar per category
#[derive(Clone, Debug)]
pub struct BarSeries {
    pub label: String,
    pub colour: RGBColor,
    pub values: Vec<f64>,
    /// Symmetric error bars, typically a standard deviation
    pub errors: Option<Vec<f64>>,
}

/// Bars for several series side by side within each category
#[derive(Clone, Debug)]
pub struct BarChart {
    pub title: Option<String>,
    pub x_desc: String,
    pub y_desc: String,
    pub categories: Vec<String>,
    pub series: Vec<BarSeries>,
    /// Width of a single bar, in category widths
    pub bar_width: f64,
    pub opacity: f64,
    /// Upper-right corner text, one entry per line
    pub annotation: Vec<String>,
}

impl BarChart {
    #[allow(clippy::cast_precision_loss)]
    pub fn new(categories: Vec<String>, series: Vec<BarSeries>) -> Self {
        let bar_width = if series.len() > 1 {
            0.8 / series.len() as f64
        } else {
            0.8
        };
        Self {
            title: None,
            x_desc: String::new(),
            y_desc: String::new(),
            categories,
            series,
            bar_width,
            opacity: 1.0,
            annotation: Vec::new(),
        }
    }

    /// Centre of series `s` within category `i`
    #[allow(clippy::cast_precision_loss)]
    fn centre(&self, s: usize, i: usize) -> f64 {
        let spread = (self.series.len() as f64 - 1.0) / 2.0;
        i as f64 + (s as f64 - spread) * self.bar_width
    }

    fn y_max(&self) -> f64 {
        headroom(self.series.iter().flat_map(|series| {
            series.values.iter().enumerate().map(|(i, v)| {
                v + series
                    .errors
                    .as_ref()
                    .and_then(|e| e.get(i).copied())
                    .filter(|e| e.is_finite())
                    .unwrap_or(0.0)
            })
        }))
    }

    pub fn draw(&self, path: &Path, size: (u32, u32)) -> Result<()> {
        let root = canvas(path, size)?;
        let plot = self.draw_panel(&root, (0.0, self.y_max()), true, true)?;
        annotate(&root, plot, &self.annotation)?;
        present(&root, path)
    }

    /// The same bars over two stacked panels, skipping the y range between them
    ///
    /// `windows` holds the lower then the upper y range.
    pub fn draw_broken(&self, path: &Path, size: (u32, u32), windows: [(f64, f64); 2]) -> Result<()> {
        let root = canvas(path, size)?;
        let (upper, lower) = root.split_vertically(size.1 / 3);
        let plot = self.draw_panel(&upper, windows[1], false, true)?;
        self.draw_panel(&lower, windows[0], true, false)?;
        annotate(&upper, plot, &self.annotation)?;
        present(&root, path)
    }

    /// Draw the bars clipped to `window`, returning the pixel extent of the plotting area
    fn draw_panel(
        &self,
        area: &Canvas<'_>,
        window: (f64, f64),
        x_axis: bool,
        header: bool,
    ) -> Result<(Range<i32>, Range<i32>)> {
        let (x_range, n_ticks) = category_axis(self.categories.len());

        let mut builder = ChartBuilder::on(area);
        builder
            .margin(15)
            .x_label_area_size(if x_axis { 60 } else { 0 })
            .y_label_area_size(80);
        if header {
            if let Some(title) = &self.title {
                builder.caption(title, (FONT, 26));
            }
        }
        let mut chart = builder
            .build_cartesian_2d(x_range, window.0..window.1)
            .map_err(plot_error)?;

        let labels = |x: &f64| category_label(&self.categories, *x);
        let mut mesh = chart.configure_mesh();
        mesh.disable_x_mesh()
            .x_labels(n_ticks)
            .x_label_formatter(&labels)
            .label_style((FONT, 14))
            .y_desc(self.y_desc.as_str());
        if x_axis {
            mesh.x_desc(self.x_desc.as_str());
        } else {
            mesh.disable_x_axis();
        }
        mesh.draw().map_err(plot_error)?;

        let half = self.bar_width / 2.0;
        for (s, series) in self.series.iter().enumerate() {
            let fill = series.colour.mix(self.opacity).filled();
            let bars = series
                .values
                .iter()
                .enumerate()
                .filter(|(_, v)| v.is_finite())
                .filter_map(|(i, &v)| {
                    let centre = self.centre(s, i);
                    clip((0.0, v), window).map(|(bottom, top)| {
                        Rectangle::new([(centre - half, bottom), (centre + half, top)], fill)
                    })
                })
                .collect::<Vec<_>>();
            let colour = series.colour;
            let anno = chart.draw_series(bars).map_err(plot_error)?;
            if self.series.len() > 1 {
                anno.label(series.label.clone()).legend(move |(x, y)| {
                    Rectangle::new([(x, y - 6), (x + 14, y + 6)], colour.filled())
                });
            }

            if let Some(errors) = &series.errors {
                let bars = series
                    .values
                    .iter()
                    .zip(errors)
                    .enumerate()
                    .filter(|(_, (v, e))| v.is_finite() && e.is_finite())
                    .map(|(i, (&v, &e))| {
                        ErrorBar::new_vertical(
                            self.centre(s, i),
                            (v - e).max(window.0),
                            v,
                            (v + e).min(window.1),
                            BLACK.stroke_width(1),
                            16,
                        )
                    })
                    .collect::<Vec<_>>();
                chart.draw_series(bars).map_err(plot_error)?;
            }
        }

        if header && self.series.len() > 1 {
            chart
                .configure_series_labels()
                .position(SeriesLabelPosition::UpperLeft)
                .background_style(WHITE.mix(0.8))
                .border_style(BLACK)
                .label_font((FONT, 14))
                .draw()
                .map_err(plot_error)?;
        }

        Ok(chart.plotting_area().get_pixel_range())
    }
}

/// Top of each layer of a stacked bar chart, missing values stacking as zero
///
/// `values` holds one row per layer (bottom first) and one column per bar.
pub fn stack_tops(values: &Array2<f64>) -> Array2<f64> {
    let mut tops = values.mapv(|v| if v.is_finite() { v } else { 0.0 });
    tops.accumulate_axis_inplace(Axis(0), |&below, current| *current += below);
    tops
}

/// Bars built from stacked layers, one bar per group
#[derive(Clone, Debug)]
pub struct StackedBarChart {
    pub title: Option<String>,
    pub x_desc: String,
    pub y_desc: String,
    /// Bar labels along the x axis
    pub groups: Vec<String>,
    /// Layer names, bottom first
    pub categories: Vec<String>,
    pub colours: Vec<RGBColor>,
    /// `categories × groups`
    pub values: Array2<f64>,
    pub bar_width: f64,
    pub opacity: f64,
    /// Fixed y limits instead of fitting the tallest bar
    pub y_range: Option<(f64, f64)>,
    /// List the top layer first in the legend
    pub reverse_legend: bool,
}

impl StackedBarChart {
    pub fn new(groups: Vec<String>, categories: Vec<String>, values: Array2<f64>) -> Self {
        let colours = (0..categories.len()).map(cycle).collect();
        Self {
            title: None,
            x_desc: String::new(),
            y_desc: String::new(),
            groups,
            categories,
            colours,
            values,
            bar_width: 0.4,
            opacity: 1.0,
            y_range: None,
            reverse_legend: false,
        }
    }

    pub fn draw(&self, path: &Path, size: (u32, u32)) -> Result<()> {
        let root = canvas(path, size)?;
        let tops = stack_tops(&self.values);
        let (low, high) = self.y_range.unwrap_or_else(|| {
            let totals = tops.index_axis(Axis(0), tops.nrows().saturating_sub(1));
            (0.0, headroom(totals.iter().copied()))
        });

        let (x_range, n_ticks) = category_axis(self.groups.len());
        let mut builder = ChartBuilder::on(&root);
        builder.margin(15).x_label_area_size(50).y_label_area_size(80);
        if let Some(title) = &self.title {
            builder.caption(title, (FONT, 26));
        }
        let mut chart = builder
            .build_cartesian_2d(x_range, low..high)
            .map_err(plot_error)?;

        let labels = |x: &f64| category_label(&self.groups, *x);
        chart
            .configure_mesh()
            .disable_x_mesh()
            .x_labels(n_ticks)
            .x_label_formatter(&labels)
            .label_style((FONT, 14))
            .x_desc(self.x_desc.as_str())
            .y_desc(self.y_desc.as_str())
            .draw()
            .map_err(plot_error)?;

        // Legend entries follow drawing order; layers never overlap, so order is free
        let mut layers = (0..self.categories.len()).collect::<Vec<_>>();
        if self.reverse_legend {
            layers.reverse();
        }

        let half = self.bar_width / 2.0;
        for layer in layers {
            let colour = self.colours.get(layer).copied().unwrap_or_else(|| cycle(layer));
            let fill = colour.mix(self.opacity).filled();
            let mut rectangles = Vec::new();
            for group in 0..self.groups.len() {
                let top = tops[[layer, group]];
                let bottom = if layer == 0 { 0.0 } else { tops[[layer - 1, group]] };
                if let Some((bottom, top)) = clip((bottom, top), (low, high)) {
                    #[allow(clippy::cast_precision_loss)]
                    let centre = group as f64;
                    let corners = [(centre - half, bottom), (centre + half, top)];
                    rectangles.push(Rectangle::new(corners, fill));
                    rectangles.push(Rectangle::new(corners, BLACK.stroke_width(1)));
                }
            }
            chart
                .draw_series(rectangles)
                .map_err(plot_error)?
                .label(self.categories[layer].clone())
                .legend(move |(x, y)| Rectangle::new([(x, y - 6), (x + 14, y + 6)], colour.filled()));
        }

        chart
            .configure_series_labels()
            .position(SeriesLabelPosition::UpperRight)
            .background_style(WHITE.mix(0.8))
            .label_font((FONT, 12))
            .draw()
            .map_err(plot_error)?;

        present(&root, path)
    }
}

/// Box-and-whisker glyphs, one per sample, with the mean marked as a diamond
#[derive(Clone, Debug)]
pub struct BoxPlot {
    pub title: Option<String>,
    pub x_desc: String,
    pub y_desc: String,
    pub labels: Vec<String>,
    pub samples: Vec<Vec<f64>>,
    /// Box fills, cycling when there are fewer fills than samples
    pub fills: Vec<RGBColor>,
    pub annotation: Vec<String>,
}

impl BoxPlot {
    pub fn new(labels: Vec<String>, samples: Vec<Vec<f64>>) -> Self {
        Self {
            title: None,
            x_desc: String::new(),
            y_desc: String::new(),
            labels,
            samples,
            fills: vec![DARK_GRAY],
            annotation: Vec::new(),
        }
    }

    pub fn draw(&self, path: &Path, size: (u32, u32)) -> Result<()> {
        let root = canvas(path, size)?;
        let stats = self
            .samples
            .iter()
            .map(|sample| BoxStats::of(sample, BoxStats::WHISKER))
            .collect::<Vec<_>>();

        let (low, high) = stats
            .iter()
            .flatten()
            .flat_map(|s| {
                s.outliers
                    .iter()
                    .copied()
                    .chain([s.lower_whisker, s.upper_whisker])
            })
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
                (lo.min(v), hi.max(v))
            });
        let (low, high) = if low.is_finite() && high > low {
            let pad = 0.08 * (high - low);
            (low - pad, high + pad)
        } else if low.is_finite() {
            (low - 1.0, low + 1.0)
        } else {
            (0.0, 1.0)
        };

        let (x_range, n_ticks) = category_axis(self.labels.len());
        let mut builder = ChartBuilder::on(&root);
        builder.margin(15).x_label_area_size(50).y_label_area_size(80);
        if let Some(title) = &self.title {
            builder.caption(title, (FONT, 26));
        }
        let mut chart = builder
            .build_cartesian_2d(x_range, low..high)
            .map_err(plot_error)?;

        let labels = |x: &f64| category_label(&self.labels, *x);
        chart
            .configure_mesh()
            .disable_x_mesh()
            .x_labels(n_ticks)
            .x_label_formatter(&labels)
            .label_style((FONT, 14))
            .x_desc(self.x_desc.as_str())
            .y_desc(self.y_desc.as_str())
            .draw()
            .map_err(plot_error)?;

        for (i, stats) in stats.iter().enumerate() {
            let Some(stats) = stats else { continue };
            #[allow(clippy::cast_precision_loss)]
            let x = i as f64;
            let fill = self
                .fills
                .get(i % self.fills.len().max(1))
                .copied()
                .unwrap_or(DARK_GRAY);
            let (left, right) = (x - 0.25, x + 0.25);
            let (cap_left, cap_right) = (x - 0.12, x + 0.12);
            let line = BLACK.stroke_width(1);

            chart
                .draw_series([
                    Rectangle::new([(left, stats.lower_quartile), (right, stats.upper_quartile)], fill.filled()),
                    Rectangle::new([(left, stats.lower_quartile), (right, stats.upper_quartile)], line),
                ])
                .map_err(plot_error)?;
            chart
                .draw_series([
                    PathElement::new(vec![(left, stats.median), (right, stats.median)], BLACK.stroke_width(2)),
                    PathElement::new(vec![(x, stats.upper_quartile), (x, stats.upper_whisker)], line),
                    PathElement::new(vec![(x, stats.lower_quartile), (x, stats.lower_whisker)], line),
                    PathElement::new(vec![(cap_left, stats.upper_whisker), (cap_right, stats.upper_whisker)], line),
                    PathElement::new(vec![(cap_left, stats.lower_whisker), (cap_right, stats.lower_whisker)], line),
                ])
                .map_err(plot_error)?;
            chart
                .draw_series(
                    stats
                        .outliers
                        .iter()
                        .map(|&o| Circle::new((x, o), 3, BLACK.stroke_width(1))),
                )
                .map_err(plot_error)?;
            chart
                .draw_series(std::iter::once(
                    EmptyElement::at((x, stats.mean))
                        + Polygon::new(vec![(0, -5), (5, 0), (0, 5), (-5, 0)], BLACK.filled()),
                ))
                .map_err(plot_error)?;
        }

        let plot = chart.plotting_area().get_pixel_range();
        annotate(&root, plot, &self.annotation)?;
        present(&root, path)
    }
}

/// Bars over equal-width bins
#[derive(Clone, Debug)]
pub struct HistogramPlot {
    pub title: Option<String>,
    pub x_desc: String,
    pub y_desc: String,
    pub histogram: Histogram,
    pub colour: RGBColor,
    pub annotation: Vec<String>,
}

impl HistogramPlot {
    pub fn new(histogram: Histogram) -> Self {
        Self {
            title: None,
            x_desc: String::new(),
            y_desc: "Count".to_owned(),
            histogram,
            colour: TAB10[0],
            annotation: Vec::new(),
        }
    }

    pub fn draw(&self, path: &Path, size: (u32, u32)) -> Result<()> {
        let root = canvas(path, size)?;
        let edges = &self.histogram.edges;
        let (first, last) = match (edges.first(), edges.last()) {
            (Some(&first), Some(&last)) if last > first => (first, last),
            _ => (0.0, 1.0),
        };
        #[allow(clippy::cast_precision_loss)]
        let y_max = headroom(self.histogram.counts.iter().map(|&c| c as f64));

        let mut builder = ChartBuilder::on(&root);
        builder.margin(15).x_label_area_size(50).y_label_area_size(70);
        if let Some(title) = &self.title {
            builder.caption(title, (FONT, 26));
        }
        let mut chart = builder
            .build_cartesian_2d(first..last, 0.0..y_max)
            .map_err(plot_error)?;
        chart
            .configure_mesh()
            .disable_x_mesh()
            .label_style((FONT, 14))
            .x_desc(self.x_desc.as_str())
            .y_desc(self.y_desc.as_str())
            .draw()
            .map_err(plot_error)?;

        let fill = self.colour.filled();
        #[allow(clippy::cast_precision_loss)]
        let bars = edges
            .windows(2)
            .zip(&self.histogram.counts)
            .flat_map(|(edge, &count)| {
                let corners = [(edge[0], 0.0), (edge[1], count as f64)];
                [
                    Rectangle::new(corners, fill),
                    Rectangle::new(corners, BLACK.stroke_width(1)),
                ]
            })
            .collect::<Vec<_>>();
        chart.draw_series(bars).map_err(plot_error)?;

        let plot = chart.plotting_area().get_pixel_range();
        annotate(&root, plot, &self.annotation)?;
        present(&root, path)
    }
}
