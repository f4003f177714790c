//! Charts
//!
//! Agent answers describe charts declaratively (`ChartSpec`). The
//! materializer validates a spec, resolves its rows and produces a `Chart`,
//! which the renderers draw.

pub mod materialize;
pub mod render;
pub mod spec;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use materialize::{materialize, MAX_POINTS};
pub use render::render_svg;
pub use spec::{ChartKind, ChartSpec, Encoding};

/// Errors raised while turning a snippet into a chart
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ChartError {
    /// The snippet binds a chart but it does not parse as a chart specification
    #[error("Invalid chart specification: {0}")]
    InvalidSpec(String),

    /// The chart query is not a single read-only statement
    #[error("Chart query must be a single SELECT statement")]
    NotReadOnly,

    /// The chart needs a database but none is connected
    #[error("Chart query requires a connected database")]
    NoDatabase,

    /// Running the chart query failed
    #[error("Chart query failed: {0}")]
    Query(String),

    /// An encoded column is not present in the data
    #[error("Column '{0}' not found in chart data")]
    MissingColumn(String),

    /// A y value is not numeric
    #[error("Column '{column}' has a non-numeric value in row {row}")]
    NonNumeric {
        /// Column name
        column: String,
        /// Zero-based row index
        row: usize,
    },

    /// More rows than a chart can reasonably show
    #[error("Chart has more than {limit} points")]
    TooManyPoints {
        /// Maximum allowed
        limit: usize,
    },
}

/// One plotted value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Point {
    /// Category or x value, as text
    pub x: String,
    /// Numeric value
    pub y: f64,
}

/// Points sharing one color
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Series {
    /// Series label (empty for single-series charts)
    pub name: String,
    /// Points in data order
    pub points: Vec<Point>,
}

/// A renderable chart
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chart {
    /// Kind of chart
    pub kind: ChartKind,
    /// Title
    pub title: Option<String>,
    /// X axis label
    pub x_label: String,
    /// Y axis label
    pub y_label: String,
    /// Data series
    pub series: Vec<Series>,
}

impl Chart {
    /// Distinct x values across all series, in first-seen order
    pub fn categories(&self) -> Vec<&str> {
        let mut seen: Vec<&str> = Vec::new();
        for point in self.series.iter().flat_map(|s| &s.points) {
            if !seen.contains(&point.x.as_str()) {
                seen.push(point.x.as_str());
            }
        }
        seen
    }

    /// Smallest and largest y value, always including zero
    pub fn y_range(&self) -> (f64, f64) {
        self.series
            .iter()
            .flat_map(|s| &s.points)
            .fold((0.0_f64, 0.0_f64), |(lo, hi), p| (lo.min(p.y), hi.max(p.y)))
    }

    /// Total number of points
    pub fn point_count(&self) -> usize {
        self.series.iter().map(|s| s.points.len()).sum()
    }

    /// Whether there is nothing to draw
    pub fn is_empty(&self) -> bool {
        self.point_count() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chart() -> Chart {
        Chart {
            kind: ChartKind::Line,
            title: None,
            x_label: "month".into(),
            y_label: "sales".into(),
            series: vec![
                Series {
                    name: "north".into(),
                    points: vec![
                        Point { x: "Jan".into(), y: 5.0 },
                        Point { x: "Feb".into(), y: -2.0 },
                    ],
                },
                Series {
                    name: "south".into(),
                    points: vec![
                        Point { x: "Feb".into(), y: 9.0 },
                        Point { x: "Mar".into(), y: 1.0 },
                    ],
                },
            ],
        }
    }

    #[test]
    fn test_categories_first_seen_order() {
        assert_eq!(chart().categories(), vec!["Jan", "Feb", "Mar"]);
    }

    #[test]
    fn test_y_range_includes_zero() {
        assert_eq!(chart().y_range(), (-2.0, 9.0));
        assert_eq!(chart().point_count(), 4);
        assert!(!chart().is_empty());
    }
}
