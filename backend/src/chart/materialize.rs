//! Visualization materializer
//!
//! Turns a snippet into a `Chart`. Snippets are interpreted, never executed:
//! they must be a chart specification, and a query in the spec must be
//! read-only.

use crate::chart::spec::{ChartSpec, DataSource};
use crate::chart::{Chart, ChartError, Point, Series};
use crate::db::{Database, QueryResult};
use serde_json::Value;
use tracing::debug;

/// Largest number of rows a chart may plot
pub const MAX_POINTS: usize = 5_000;

/// Materialize the chart bound by `snippet`
///
/// Returns `Ok(None)` when the snippet does not describe a chart.
pub async fn materialize(
    snippet: &str,
    db: Option<&dyn Database>,
) -> Result<Option<Chart>, ChartError> {
    let Some(spec) = ChartSpec::parse(snippet)? else {
        debug!("Snippet does not describe a chart");
        return Ok(None);
    };

    let rows = match spec.validate()? {
        DataSource::Inline(rows) => inline_rows(rows),
        DataSource::Query(query) => {
            let db = db.ok_or(ChartError::NoDatabase)?;
            // One row past the limit is enough to know the chart is too large.
            db.run_limited(query, MAX_POINTS + 1)
                .await
                .map_err(|e| ChartError::Query(e.to_string()))?
        }
    };

    let chart = build_chart(&spec, &rows)?;
    debug!(
        kind = ?chart.kind,
        series = chart.series.len(),
        points = chart.point_count(),
        "Chart materialized"
    );
    Ok(Some(chart))
}

/// Column-ordered view of inline rows (columns in first-seen order)
fn inline_rows(rows: &[serde_json::Map<String, Value>]) -> QueryResult {
    let mut columns: Vec<String> = Vec::new();
    for row in rows {
        for key in row.keys() {
            if !columns.contains(key) {
                columns.push(key.clone());
            }
        }
    }

    let rows = rows
        .iter()
        .map(|row| {
            columns
                .iter()
                .map(|c| row.get(c).cloned().unwrap_or(Value::Null))
                .collect()
        })
        .collect();

    QueryResult { columns, rows }
}

fn column(rows: &QueryResult, name: &str) -> Result<usize, ChartError> {
    rows.column_index(name)
        .ok_or_else(|| ChartError::MissingColumn(name.to_string()))
}

fn label(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Finite numeric value of a cell; `inf` and `NaN` cannot be plotted
fn number(value: &Value) -> Option<f64> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    };
    parsed.filter(|v| v.is_finite())
}

fn build_chart(spec: &ChartSpec, rows: &QueryResult) -> Result<Chart, ChartError> {
    if rows.rows.len() > MAX_POINTS {
        return Err(ChartError::TooManyPoints { limit: MAX_POINTS });
    }

    let mut series: Vec<Series> = Vec::new();

    // An empty result has no column metadata to check against.
    if !rows.rows.is_empty() {
        let x_idx = column(rows, &spec.encoding.x)?;
        let y_idx = column(rows, &spec.encoding.y)?;
        let color_idx = spec
            .encoding
            .color
            .as_deref()
            .map(|c| column(rows, c))
            .transpose()?;

        for (i, row) in rows.rows.iter().enumerate() {
            let y = number(&row[y_idx]).ok_or_else(|| ChartError::NonNumeric {
                column: spec.encoding.y.clone(),
                row: i,
            })?;
            let name = color_idx.map(|idx| label(&row[idx])).unwrap_or_default();
            let point = Point {
                x: label(&row[x_idx]),
                y,
            };

            match series.iter_mut().find(|s| s.name == name) {
                Some(existing) => existing.points.push(point),
                None => series.push(Series {
                    name,
                    points: vec![point],
                }),
            }
        }
    }

    Ok(Chart {
        kind: spec.kind,
        title: spec.title.clone(),
        x_label: spec
            .x_label
            .clone()
            .unwrap_or_else(|| spec.encoding.x.clone()),
        y_label: spec
            .y_label
            .clone()
            .unwrap_or_else(|| spec.encoding.y.clone()),
        series,
    })
}
