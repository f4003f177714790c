//! SVG chart renderer

use crate::chart::{Chart, ChartKind, Series};
use std::fmt::Write;

const MARGIN_LEFT: f64 = 64.0;
const MARGIN_RIGHT: f64 = 24.0;
const MARGIN_TOP: f64 = 40.0;
const MARGIN_BOTTOM: f64 = 56.0;

/// Series colors, cycled
pub const PALETTE: [&str; 8] = [
    "#636efa", "#ef553b", "#00cc96", "#ab63fa", "#ffa15a", "#19d3f3", "#ff6692", "#b6e880",
];

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn color(index: usize) -> &'static str {
    PALETTE[index % PALETTE.len()]
}

/// Plot area and value-to-pixel mapping
struct Frame {
    left: f64,
    top: f64,
    width: f64,
    height: f64,
    y_min: f64,
    y_max: f64,
}

impl Frame {
    fn new(chart: &Chart, width: f64, height: f64) -> Self {
        let (y_min, mut y_max) = chart.y_range();
        if y_max <= y_min {
            y_max = y_min + 1.0;
        }
        Self {
            left: MARGIN_LEFT,
            top: MARGIN_TOP,
            width: (width - MARGIN_LEFT - MARGIN_RIGHT).max(1.0),
            height: (height - MARGIN_TOP - MARGIN_BOTTOM).max(1.0),
            y_min,
            y_max,
        }
    }

    fn y(&self, value: f64) -> f64 {
        self.top + self.height * (self.y_max - value) / (self.y_max - self.y_min)
    }

    fn bottom(&self) -> f64 {
        self.top + self.height
    }

    /// Center of category slot `index` out of `count`
    fn slot(&self, index: usize, count: usize) -> f64 {
        let step = self.width / count.max(1) as f64;
        self.left + step * (index as f64 + 0.5)
    }
}

/// Render `chart` as a standalone SVG document
pub fn render_svg(chart: &Chart, width: u32, height: u32) -> String {
    let (w, h) = (width as f64, height as f64);
    let mut svg = String::new();
    let _ = write!(
        svg,
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{width}" height="{height}" viewBox="0 0 {width} {height}" font-family="sans-serif" font-size="12">"#
    );
    svg.push_str(r#"<rect width="100%" height="100%" fill="white"/>"#);

    if let Some(title) = &chart.title {
        let _ = write!(
            svg,
            r#"<text x="{:.1}" y="24" text-anchor="middle" font-size="16">{}</text>"#,
            w / 2.0,
            escape(title)
        );
    }

    if chart.is_empty() {
        let _ = write!(
            svg,
            r##"<text x="{:.1}" y="{:.1}" text-anchor="middle" fill="#888">No data</text>"##,
            w / 2.0,
            h / 2.0
        );
        svg.push_str("</svg>");
        return svg;
    }

    match chart.kind {
        ChartKind::Pie => render_pie(&mut svg, chart, w, h),
        kind => {
            let frame = Frame::new(chart, w, h);
            render_axes(&mut svg, chart, &frame);
            let categories = chart.categories();
            for (i, series) in chart.series.iter().enumerate() {
                match kind {
                    ChartKind::Bar => render_bars(&mut svg, &frame, &categories, chart.series.len(), i, series),
                    ChartKind::Line => render_points(&mut svg, &frame, &categories, i, series, true),
                    _ => render_points(&mut svg, &frame, &categories, i, series, false),
                }
            }
            render_legend(&mut svg, chart, w);
        }
    }

    svg.push_str("</svg>");
    svg
}

fn render_axes(svg: &mut String, chart: &Chart, frame: &Frame) {
    let right = frame.left + frame.width;
    let zero = frame.y(0.0);
    let _ = write!(
        svg,
        r##"<line x1="{l:.1}" y1="{t:.1}" x2="{l:.1}" y2="{b:.1}" stroke="#444"/><line x1="{l:.1}" y1="{z:.1}" x2="{r:.1}" y2="{z:.1}" stroke="#444"/>"##,
        l = frame.left,
        t = frame.top,
        b = frame.bottom(),
        r = right,
        z = zero
    );

    for tick in 0..=4 {
        let value = frame.y_min + (frame.y_max - frame.y_min) * tick as f64 / 4.0;
        let _ = write!(
            svg,
            r#"<text x="{:.1}" y="{:.1}" text-anchor="end">{}</text>"#,
            frame.left - 6.0,
            frame.y(value) + 4.0,
            format_value(value)
        );
    }

    let categories = chart.categories();
    for (i, category) in categories.iter().enumerate() {
        let _ = write!(
            svg,
            r#"<text x="{:.1}" y="{:.1}" text-anchor="middle">{}</text>"#,
            frame.slot(i, categories.len()),
            frame.bottom() + 16.0,
            escape(category)
        );
    }

    let _ = write!(
        svg,
        r#"<text x="{:.1}" y="{:.1}" text-anchor="middle">{}</text>"#,
        frame.left + frame.width / 2.0,
        frame.bottom() + 40.0,
        escape(&chart.x_label)
    );
    let _ = write!(
        svg,
        r#"<text x="16" y="{y:.1}" text-anchor="middle" transform="rotate(-90 16 {y:.1})">{}</text>"#,
        escape(&chart.y_label),
        y = frame.top + frame.height / 2.0
    );
}

fn render_bars(
    svg: &mut String,
    frame: &Frame,
    categories: &[&str],
    series_count: usize,
    series_index: usize,
    series: &Series,
) {
    let slot_width = frame.width / categories.len().max(1) as f64;
    let bar_width = slot_width * 0.8 / series_count.max(1) as f64;
    let zero = frame.y(0.0);

    for point in &series.points {
        let Some(slot) = categories.iter().position(|c| *c == point.x) else {
            continue;
        };
        let x = frame.slot(slot, categories.len()) - slot_width * 0.4 + bar_width * series_index as f64;
        let y = frame.y(point.y);
        let _ = write!(
            svg,
            r#"<rect x="{:.1}" y="{:.1}" width="{:.1}" height="{:.1}" fill="{}"><title>{}: {}</title></rect>"#,
            x,
            y.min(zero),
            bar_width,
            (zero - y).abs(),
            color(series_index),
            escape(&point.x),
            format_value(point.y)
        );
    }
}

fn render_points(
    svg: &mut String,
    frame: &Frame,
    categories: &[&str],
    series_index: usize,
    series: &Series,
    connect: bool,
) {
    let coords: Vec<(f64, f64)> = series
        .points
        .iter()
        .filter_map(|p| {
            let slot = categories.iter().position(|c| *c == p.x)?;
            Some((frame.slot(slot, categories.len()), frame.y(p.y)))
        })
        .collect();

    if connect && coords.len() > 1 {
        let path: Vec<String> = coords.iter().map(|(x, y)| format!("{:.1},{:.1}", x, y)).collect();
        let _ = write!(
            svg,
            r#"<polyline points="{}" fill="none" stroke="{}" stroke-width="2"/>"#,
            path.join(" "),
            color(series_index)
        );
    }

    for (x, y) in coords {
        let _ = write!(
            svg,
            r#"<circle cx="{:.1}" cy="{:.1}" r="3.5" fill="{}"/>"#,
            x,
            y,
            color(series_index)
        );
    }
}

fn render_pie(svg: &mut String, chart: &Chart, w: f64, h: f64) {
    // Pie slices come from every point; negative values cannot be drawn.
    let slices: Vec<(&str, f64)> = chart
        .series
        .iter()
        .flat_map(|s| &s.points)
        .map(|p| (p.x.as_str(), p.y.max(0.0)))
        .collect();
    let total: f64 = slices.iter().map(|(_, v)| v).sum();

    let cx = w / 2.0;
    let cy = MARGIN_TOP + (h - MARGIN_TOP) / 2.0;
    let radius = ((w.min(h - MARGIN_TOP)) / 2.0 - 24.0).max(4.0);

    if total <= 0.0 {
        let _ = write!(
            svg,
            r##"<circle cx="{cx:.1}" cy="{cy:.1}" r="{radius:.1}" fill="none" stroke="#888"/>"##
        );
        return;
    }

    let mut angle = -std::f64::consts::FRAC_PI_2;
    for (i, (label, value)) in slices.iter().enumerate() {
        let sweep = value / total * std::f64::consts::TAU;
        if sweep <= 0.0 {
            continue;
        }
        if sweep >= std::f64::consts::TAU - 1e-9 {
            let _ = write!(
                svg,
                r#"<circle cx="{cx:.1}" cy="{cy:.1}" r="{radius:.1}" fill="{}"><title>{}</title></circle>"#,
                color(i),
                escape(label)
            );
            break;
        }
        let (x1, y1) = (cx + radius * angle.cos(), cy + radius * angle.sin());
        let end = angle + sweep;
        let (x2, y2) = (cx + radius * end.cos(), cy + radius * end.sin());
        let large = if sweep > std::f64::consts::PI { 1 } else { 0 };
        let _ = write!(
            svg,
            r#"<path d="M{cx:.1},{cy:.1} L{x1:.1},{y1:.1} A{radius:.1},{radius:.1} 0 {large} 1 {x2:.1},{y2:.1} Z" fill="{}"><title>{}: {}</title></path>"#,
            color(i),
            escape(label),
            format_value(*value)
        );
        angle = end;
    }
}

fn render_legend(svg: &mut String, chart: &Chart, w: f64) {
    let named: Vec<(usize, &Series)> = chart
        .series
        .iter()
        .enumerate()
        .filter(|(_, s)| !s.name.is_empty())
        .collect();
    for (row, (i, series)) in named.iter().enumerate() {
        let y = MARGIN_TOP + 14.0 * row as f64;
        let _ = write!(
            svg,
            r#"<rect x="{:.1}" y="{:.1}" width="10" height="10" fill="{}"/><text x="{:.1}" y="{:.1}" text-anchor="end">{}</text>"#,
            w - MARGIN_RIGHT - 10.0,
            y,
            color(*i),
            w - MARGIN_RIGHT - 14.0,
            y + 9.0,
            escape(&series.name)
        );
    }
}

/// Short label for an axis or tooltip value
pub fn format_value(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{:.2}", value)
    }
}
