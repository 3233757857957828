//! Chart specification generator.
//!
//! Builds a renderer-agnostic JSON chart spec from table documents: the chart
//! type comes from query keywords, the axes from column content, the title
//! from the query's key words.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use docsight_types::{Document, Record, Result};

use crate::collaborators::ChartGenerator;
use crate::keywords::contains_any;
use crate::stats::{is_mostly_numeric, numeric_value};
use crate::tables::{column_names, extract_table_records};

/// Rows inspected when deciding whether a column is numeric.
const AXIS_PROBE_ROWS: usize = 10;
const TITLE_WORDS: usize = 4;

const STOPWORDS: &[&str] = &[
    "what", "show", "tell", "about", "with", "from", "that", "this", "have", "does", "there",
    "their", "which", "chart", "graph", "please", "plot", "visualize", "over", "time",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChartType {
    Line,
    Bar,
    Histogram,
    Scatter,
    Pie,
}

impl ChartType {
    /// Pick a chart type from query keywords; bar when nothing matches.
    pub fn for_query(query: &str) -> Self {
        let q = query.to_lowercase();
        if contains_any(&q, &["trend", "over time", "timeline", "progression"]) {
            ChartType::Line
        } else if contains_any(&q, &["distribution", "frequency"]) {
            ChartType::Histogram
        } else if contains_any(&q, &["relationship", "correlation"]) {
            ChartType::Scatter
        } else if contains_any(&q, &["percentage", "proportion", "share"]) {
            ChartType::Pie
        } else {
            ChartType::Bar
        }
    }

    fn title(&self) -> &'static str {
        match self {
            ChartType::Line => "Line",
            ChartType::Bar => "Bar",
            ChartType::Histogram => "Histogram",
            ChartType::Scatter => "Scatter",
            ChartType::Pie => "Pie",
        }
    }
}

/// Columns where most of the first rows parse as numbers.
pub fn numeric_columns(records: &[Record]) -> Vec<String> {
    let probe = &records[..records.len().min(AXIS_PROBE_ROWS)];
    column_names(probe)
        .into_iter()
        .filter(|c| {
            let cells: Vec<&Value> = probe.iter().filter_map(|r| r.get(c)).collect();
            let numeric = cells.iter().filter(|v| numeric_value(v).is_some()).count();
            is_mostly_numeric(numeric, cells.len())
        })
        .collect()
}

/// `"<Type> Chart: <key words>"` built from up to four significant query words.
pub fn chart_title(chart_type: ChartType, query: &str) -> String {
    let words: Vec<String> = query
        .split_whitespace()
        .map(|w| {
            w.chars()
                .filter(|c| c.is_alphanumeric())
                .collect::<String>()
                .to_lowercase()
        })
        .filter(|w| w.chars().count() > 3 && !STOPWORDS.contains(&w.as_str()))
        .take(TITLE_WORDS)
        .map(|w| capitalize(&w))
        .collect();
    let subject = if words.is_empty() {
        "Data Overview".to_string()
    } else {
        words.join(" ")
    };
    format!("{} Chart: {subject}", chart_type.title())
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// [`ChartGenerator`] producing JSON chart specs without rendering.
#[derive(Debug, Default, Clone, Copy)]
pub struct SpecChartGenerator;

impl SpecChartGenerator {
    /// The spec for `records`, or `None` when there is nothing to plot.
    pub fn build_spec(&self, query: &str, records: &[Record]) -> Option<Value> {
        let columns = column_names(records);
        let x_axis = columns.first()?.clone();
        let numeric = numeric_columns(records);
        let y_axis = numeric
            .iter()
            .find(|c| **c != x_axis)
            .or_else(|| columns.get(1))
            .unwrap_or(&x_axis)
            .clone();

        let chart_type = ChartType::for_query(query);
        let data: Vec<Value> = records
            .iter()
            .map(|r| {
                json!({
                    "x": r.get(&x_axis).cloned().unwrap_or(Value::Null),
                    "y": r.get(&y_axis).cloned().unwrap_or(Value::Null),
                })
            })
            .collect();

        Some(json!({
            "chart_type": chart_type,
            "title": chart_title(chart_type, query),
            "x_axis": x_axis,
            "y_axis": y_axis,
            "data": data,
            "data_summary": {
                "row_count": records.len(),
                "column_count": columns.len(),
                "columns": columns,
                "numeric_columns": numeric,
            },
        }))
    }
}

#[async_trait]
impl ChartGenerator for SpecChartGenerator {
    async fn generate(&self, query: &str, tables: &[Document]) -> Result<Option<Value>> {
        let records = extract_table_records(tables);
        let spec = self.build_spec(query, &records);
        tracing::debug!(rows = records.len(), produced = spec.is_some(), "Built chart spec");
        Ok(spec)
    }
}
