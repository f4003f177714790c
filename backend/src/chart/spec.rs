//! Declarative chart specification
//!
//! The format the agent uses to describe a chart: a kind, where the rows come
//! from (inline or a read-only query) and which columns map to x, y and color.

use crate::chart::ChartError;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

static WRITE_KEYWORDS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(insert|update|delete|drop|alter|create|truncate|grant|revoke|into|call)\b")
        .expect("valid write keyword regex")
});

/// Kind of chart
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartKind {
    /// Vertical bars per category
    Bar,
    /// Connected points
    Line,
    /// Unconnected points
    Scatter,
    /// Slices of a whole
    Pie,
}

/// Column mapping
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Encoding {
    /// Column plotted on the x axis (categories for bar and pie)
    pub x: String,
    /// Numeric column plotted on the y axis
    pub y: String,
    /// Optional column that splits rows into series
    #[serde(default)]
    pub color: Option<String>,
}

/// A chart as described by the agent
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ChartSpec {
    /// Kind of chart
    #[serde(rename = "type", alias = "chart_type", alias = "kind")]
    pub kind: ChartKind,
    /// Title
    #[serde(default)]
    pub title: Option<String>,
    /// X axis label (defaults to the x column)
    #[serde(default)]
    pub x_label: Option<String>,
    /// Y axis label (defaults to the y column)
    #[serde(default)]
    pub y_label: Option<String>,
    /// Inline rows
    #[serde(default)]
    pub data: Option<Vec<Map<String, Value>>>,
    /// Read-only query producing the rows
    #[serde(default)]
    pub query: Option<String>,
    /// Column mapping
    pub encoding: Encoding,
}

/// Where a validated spec gets its rows from
#[derive(Debug, PartialEq)]
pub enum DataSource<'a> {
    /// Rows given in the spec
    Inline(&'a [Map<String, Value>]),
    /// Rows returned by this query
    Query(&'a str),
}

impl ChartSpec {
    /// Extract a chart specification from a snippet
    ///
    /// Returns `Ok(None)` when the snippet does not bind a chart at all: it is
    /// not JSON, or it is JSON without a `fig` entry or chart fields.
    pub fn parse(snippet: &str) -> Result<Option<ChartSpec>, ChartError> {
        let Ok(value) = serde_json::from_str::<Value>(snippet) else {
            return Ok(None);
        };
        let Value::Object(mut map) = value else {
            return Ok(None);
        };

        let candidate = if let Some(fig) = map.remove("fig") {
            fig
        } else if map.contains_key("type") || map.contains_key("encoding") {
            Value::Object(map)
        } else {
            return Ok(None);
        };

        if candidate.is_null() {
            return Ok(None);
        }

        serde_json::from_value(candidate)
            .map(Some)
            .map_err(|e| ChartError::InvalidSpec(e.to_string()))
    }

    /// Check the spec and return its data source
    pub fn validate(&self) -> Result<DataSource<'_>, ChartError> {
        if self.encoding.x.trim().is_empty() || self.encoding.y.trim().is_empty() {
            return Err(ChartError::InvalidSpec(
                "encoding.x and encoding.y must name columns".to_string(),
            ));
        }

        match (&self.data, &self.query) {
            (Some(_), Some(_)) => Err(ChartError::InvalidSpec(
                "give either data or query, not both".to_string(),
            )),
            (None, None) => Err(ChartError::InvalidSpec(
                "missing data or query".to_string(),
            )),
            (Some(rows), None) => Ok(DataSource::Inline(rows)),
            (None, Some(query)) => {
                if is_read_only(query) {
                    Ok(DataSource::Query(query))
                } else {
                    Err(ChartError::NotReadOnly)
                }
            }
        }
    }
}

/// Whether `sql` is a single SELECT (or WITH ... SELECT) statement that writes nothing
pub fn is_read_only(sql: &str) -> bool {
    let statement = sql.trim().trim_end_matches(|c: char| c == ';' || c.is_whitespace());
    if statement.is_empty() || statement.contains(';') {
        return false;
    }

    let first = statement
        .split_whitespace()
        .next()
        .unwrap_or("")
        .to_ascii_lowercase();
    let first = first.trim_start_matches('(');
    if first != "select" && first != "with" {
        return false;
    }

    !WRITE_KEYWORDS.is_match(statement)
}
