//! Time-series extraction and per-column trend detection.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use docsight_types::Record;

use crate::stats::{is_mostly_numeric, numeric_value};
use crate::tables::column_names;

/// Substrings that mark a column name as date-like.
pub const DATE_KEYWORDS: &[&str] = &["date", "time", "year", "month", "day"];

/// Records inspected when looking for date-like columns.
const DATE_PROBE_RECORDS: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendDirection {
    Increasing,
    Decreasing,
    Stable,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnTrend {
    pub column: String,
    pub direction: TrendDirection,
    /// Magnitude of the change from first to last value, in percent,
    /// rounded to two decimals. `None` when the first value is zero.
    pub change_percent: Option<f64>,
    pub first: f64,
    pub last: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrendReport {
    pub date_columns: Vec<String>,
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
    pub points: usize,
    pub trends: Vec<ColumnTrend>,
}

impl TrendReport {
    /// One line per trend, used in prompts.
    pub fn describe(&self) -> String {
        if self.trends.is_empty() {
            return "No numeric series could be tracked over time.".to_string();
        }
        let mut lines = Vec::new();
        if let (Some(start), Some(end)) = (self.start, self.end) {
            lines.push(format!("Period: {start} to {end} ({} points)", self.points));
        }
        for t in &self.trends {
            let change = t
                .change_percent
                .map(|p| format!("{p:.2}%"))
                .unwrap_or_else(|| "n/a".to_string());
            lines.push(format!(
                "{}: {} ({change}, {} -> {})",
                t.column,
                direction_label(t.direction),
                t.first,
                t.last
            ));
        }
        lines.join("\n")
    }
}

fn direction_label(direction: TrendDirection) -> &'static str {
    match direction {
        TrendDirection::Increasing => "increasing",
        TrendDirection::Decreasing => "decreasing",
        TrendDirection::Stable => "stable",
    }
}

/// Column names containing a date keyword, among the first few records.
pub fn date_columns(records: &[Record]) -> Vec<String> {
    let probe = &records[..records.len().min(DATE_PROBE_RECORDS)];
    column_names(probe)
        .into_iter()
        .filter(|name| {
            let lower = name.to_lowercase();
            DATE_KEYWORDS.iter().any(|k| lower.contains(k))
        })
        .collect()
}

/// Parse a cell as a date. Formats are tried in order: `%Y-%m-%d`,
/// `%m/%d/%Y`, `%Y`, `%m/%Y`. Bare years land on January 1st and
/// month-years on the first of the month. Integral numbers are read as years.
pub fn parse_date(value: &Value) -> Option<NaiveDate> {
    match value {
        Value::String(s) => parse_date_str(s.trim()),
        Value::Number(n) => n
            .as_i64()
            .filter(|y| (1000..=9999).contains(y))
            .and_then(|y| NaiveDate::from_ymd_opt(y as i32, 1, 1)),
        _ => None,
    }
}

fn parse_date_str(s: &str) -> Option<NaiveDate> {
    if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Some(d);
    }
    if let Ok(d) = NaiveDate::parse_from_str(s, "%m/%d/%Y") {
        return Some(d);
    }
    if let Some(year) = parse_year(s) {
        return NaiveDate::from_ymd_opt(year, 1, 1);
    }
    let (month, year) = s.split_once('/')?;
    let month: u32 = month.trim().parse().ok()?;
    let year = parse_year(year.trim())?;
    NaiveDate::from_ymd_opt(year, month, 1)
}

fn parse_year(s: &str) -> Option<i32> {
    if s.len() == 4 && s.chars().all(|c| c.is_ascii_digit()) {
        s.parse().ok()
    } else {
        None
    }
}

/// Records that carry a parseable date, sorted chronologically. For each
/// record the first date column (in `date_cols` order) that parses wins.
/// The sort is stable, so records sharing a date keep their input order.
pub fn extract_series<'a>(
    records: &'a [Record],
    date_cols: &[String],
) -> Vec<(NaiveDate, &'a Record)> {
    let mut series: Vec<(NaiveDate, &Record)> = records
        .iter()
        .filter_map(|r| {
            date_cols
                .iter()
                .find_map(|c| r.get(c).and_then(parse_date))
                .map(|d| (d, r))
        })
        .collect();
    series.sort_by_key(|(d, _)| *d);
    series
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

/// Trend of every mostly-numeric, non-date column across the series.
pub fn analyze_trends(records: &[Record]) -> TrendReport {
    let date_cols = date_columns(records);
    let series = extract_series(records, &date_cols);
    if series.is_empty() {
        return TrendReport {
            date_columns: date_cols,
            ..Default::default()
        };
    }

    let series_records: Vec<Record> = series.iter().map(|(_, r)| (*r).clone()).collect();
    let mut trends = Vec::new();
    for column in column_names(&series_records) {
        if date_cols.contains(&column) {
            continue;
        }
        let values: Vec<f64> = series
            .iter()
            .filter_map(|(_, r)| r.get(&column).and_then(numeric_value))
            .collect();
        // A trend needs two points.
        if values.len() < 2 || !is_mostly_numeric(values.len(), series.len()) {
            continue;
        }
        let (first, last) = match (values.first(), values.last()) {
            (Some(f), Some(l)) => (*f, *l),
            _ => continue,
        };
        let direction = if last > first {
            TrendDirection::Increasing
        } else if last < first {
            TrendDirection::Decreasing
        } else {
            TrendDirection::Stable
        };
        let change_percent =
            (first != 0.0).then(|| round2(((last - first) / first).abs() * 100.0));
        trends.push(ColumnTrend {
            column,
            direction,
            change_percent,
            first,
            last,
        });
    }

    TrendReport {
        date_columns: date_cols,
        start: series.first().map(|(d, _)| *d),
        end: series.last().map(|(d, _)| *d),
        points: series.len(),
        trends,
    }
}
