// Reusable UI components
// Notification banner, conversation entries and chart drawing

use chatsql_backend::chart::render::{format_value, PALETTE};
use chatsql_backend::chart::{Chart, ChartKind};
use chatsql_backend::session::{ConversationEntry, Notification, NotificationLevel};
use eframe::egui;

const SUCCESS_COLOR: egui::Color32 = egui::Color32::from_rgb(0, 160, 60);
const ERROR_COLOR: egui::Color32 = egui::Color32::from_rgb(220, 0, 0);

/// Render a notification as colored text
pub fn notification_banner(ui: &mut egui::Ui, notification: &Notification) {
    let color = match notification.level {
        NotificationLevel::Success => SUCCESS_COLOR,
        NotificationLevel::Error => ERROR_COLOR,
    };
    ui.colored_label(color, notification.message.as_str());
}

/// Render an error line
pub fn error_label(ui: &mut egui::Ui, message: &str) {
    ui.colored_label(ERROR_COLOR, message);
}

/// Render one question with its chart and response
pub fn conversation_entry(ui: &mut egui::Ui, entry: &ConversationEntry) {
    ui.label(egui::RichText::new("Question").strong());
    ui.label(entry.question.as_str());
    ui.add_space(4.0);

    if let Some(chart) = &entry.answer.chart {
        chart_view(ui, chart, egui::vec2(ui.available_width().min(720.0), 360.0));
        ui.add_space(4.0);
    }
    if let Some(error) = &entry.answer.chart_error {
        ui.label(
            egui::RichText::new(format!("Chart unavailable: {}", error))
                .italics()
                .color(ERROR_COLOR),
        );
    }

    ui.label(egui::RichText::new("Response").strong());
    ui.label(entry.answer.text.as_str());
}

/// Parse a `#rrggbb` color
pub fn hex_color(hex: &str) -> Option<egui::Color32> {
    let digits = hex.strip_prefix('#')?;
    if digits.len() != 6 {
        return None;
    }
    let channel = |i: usize| u8::from_str_radix(digits.get(i..i + 2)?, 16).ok();
    Some(egui::Color32::from_rgb(channel(0)?, channel(2)?, channel(4)?))
}

/// Color of series `index`
pub fn series_color(index: usize) -> egui::Color32 {
    hex_color(PALETTE[index % PALETTE.len()]).unwrap_or(egui::Color32::GRAY)
}

/// Map a value onto the vertical extent of `rect`
pub fn value_to_y(value: f64, y_min: f64, y_max: f64, rect: egui::Rect) -> f32 {
    let span = if y_max > y_min { y_max - y_min } else { 1.0 };
    rect.bottom() - ((value - y_min) / span) as f32 * rect.height()
}

/// Draw `chart` into a `size` area
pub fn chart_view(ui: &mut egui::Ui, chart: &Chart, size: egui::Vec2) {
    if let Some(title) = &chart.title {
        ui.label(egui::RichText::new(title).strong());
    }

    let (response, painter) = ui.allocate_painter(size, egui::Sense::hover());
    let outer = response.rect;
    let text_color = ui.visuals().text_color();
    let font = egui::FontId::proportional(11.0);

    if chart.is_empty() {
        painter.text(outer.center(), egui::Align2::CENTER_CENTER, "No data", font, text_color);
        return;
    }

    if chart.kind == ChartKind::Pie {
        draw_pie(&painter, chart, outer, text_color);
        return;
    }

    let plot = egui::Rect::from_min_max(
        outer.min + egui::vec2(48.0, 8.0),
        outer.max - egui::vec2(8.0, 32.0),
    );
    let (y_min, y_max) = chart.y_range();
    let axis = egui::Stroke::new(1.0, text_color);
    let zero = value_to_y(0.0, y_min, y_max, plot);

    painter.line_segment([plot.left_top(), plot.left_bottom()], axis);
    painter.line_segment([egui::pos2(plot.left(), zero), egui::pos2(plot.right(), zero)], axis);
    for value in [y_min, (y_min + y_max) / 2.0, y_max] {
        painter.text(
            egui::pos2(plot.left() - 4.0, value_to_y(value, y_min, y_max, plot)),
            egui::Align2::RIGHT_CENTER,
            format_value(value),
            font.clone(),
            text_color,
        );
    }

    let categories = chart.categories();
    let slot = plot.width() / categories.len().max(1) as f32;
    let slot_center = |i: usize| plot.left() + slot * (i as f32 + 0.5);
    for (i, category) in categories.iter().enumerate() {
        painter.text(
            egui::pos2(slot_center(i), plot.bottom() + 4.0),
            egui::Align2::CENTER_TOP,
            *category,
            font.clone(),
            text_color,
        );
    }
    painter.text(
        egui::pos2(plot.center().x, outer.bottom()),
        egui::Align2::CENTER_BOTTOM,
        &chart.x_label,
        font.clone(),
        text_color,
    );

    let series_count = chart.series.len().max(1) as f32;
    for (index, series) in chart.series.iter().enumerate() {
        let color = series_color(index);
        let points: Vec<egui::Pos2> = series
            .points
            .iter()
            .filter_map(|p| {
                let slot_index = categories.iter().position(|c| *c == p.x)?;
                Some(egui::pos2(
                    slot_center(slot_index),
                    value_to_y(p.y, y_min, y_max, plot),
                ))
            })
            .collect();

        match chart.kind {
            ChartKind::Bar => {
                let width = slot * 0.8 / series_count;
                for point in &points {
                    let left = point.x - slot * 0.4 + width * index as f32;
                    let rect = egui::Rect::from_two_pos(
                        egui::pos2(left, point.y),
                        egui::pos2(left + width, zero),
                    );
                    painter.rect_filled(rect, 0.0, color);
                }
            }
            ChartKind::Line => {
                painter.add(egui::Shape::line(points.clone(), egui::Stroke::new(2.0, color)));
                for point in points {
                    painter.circle_filled(point, 3.0, color);
                }
            }
            _ => {
                for point in points {
                    painter.circle_filled(point, 3.5, color);
                }
            }
        }
    }

    for (row, (index, series)) in chart
        .series
        .iter()
        .enumerate()
        .filter(|(_, s)| !s.name.is_empty())
        .enumerate()
    {
        painter.text(
            egui::pos2(plot.right(), plot.top() + 14.0 * row as f32),
            egui::Align2::RIGHT_TOP,
            &series.name,
            font.clone(),
            series_color(index),
        );
    }
}

fn draw_pie(painter: &egui::Painter, chart: &Chart, rect: egui::Rect, text_color: egui::Color32) {
    let slices: Vec<(&str, f64)> = chart
        .series
        .iter()
        .flat_map(|s| &s.points)
        .map(|p| (p.x.as_str(), p.y.max(0.0)))
        .collect();
    let total: f64 = slices.iter().map(|(_, v)| v).sum();
    let center = rect.center();
    let radius = rect.width().min(rect.height()) / 2.0 - 16.0;
    if total <= 0.0 || radius <= 0.0 {
        return;
    }

    let mut angle = -std::f32::consts::FRAC_PI_2;
    for (i, (label, value)) in slices.iter().enumerate() {
        let sweep = (*value / total) as f32 * std::f32::consts::TAU;
        if sweep <= 0.0 {
            continue;
        }
        // Fan of small convex wedges so each slice stays convex.
        let steps = ((sweep / 0.1).ceil() as usize).max(1);
        for step in 0..steps {
            let a0 = angle + sweep * step as f32 / steps as f32;
            let a1 = angle + sweep * (step + 1) as f32 / steps as f32;
            painter.add(egui::Shape::convex_polygon(
                vec![
                    center,
                    center + radius * egui::vec2(a0.cos(), a0.sin()),
                    center + radius * egui::vec2(a1.cos(), a1.sin()),
                ],
                series_color(i),
                egui::Stroke::NONE,
            ));
        }

        let mid = angle + sweep / 2.0;
        painter.text(
            center + (radius + 8.0) * egui::vec2(mid.cos(), mid.sin()),
            egui::Align2::CENTER_CENTER,
            *label,
            egui::FontId::proportional(11.0),
            text_color,
        );
        angle += sweep;
    }
}
