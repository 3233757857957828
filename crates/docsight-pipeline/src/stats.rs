//! Per-column descriptive statistics over flat records.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use docsight_types::Record;

use crate::tables::{column_names, value_text};

/// Share of values that must parse as numbers, strictly exceeded, for a
/// column to be treated as numeric.
pub const NUMERIC_SHARE: f64 = 0.7;

/// Numeric reading of a cell. Strings are parsed after removing `,`, `$`
/// and `%`.
pub fn numeric_value(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64().filter(|f| f.is_finite()),
        Value::String(s) => {
            let cleaned: String = s
                .trim()
                .chars()
                .filter(|c| !matches!(c, ',' | '$' | '%'))
                .collect();
            cleaned.parse::<f64>().ok().filter(|f| f.is_finite())
        }
        _ => None,
    }
}

/// `true` when more than [`NUMERIC_SHARE`] of `total` cells are numeric.
pub fn is_mostly_numeric(numeric: usize, total: usize) -> bool {
    total > 0 && numeric as f64 > total as f64 * NUMERIC_SHARE
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ColumnStatistics {
    Numeric {
        count: usize,
        mean: f64,
        median: f64,
        /// Population standard deviation.
        std: f64,
        min: f64,
        max: f64,
    },
    Categorical {
        count: usize,
        unique: usize,
        most_frequent: Option<String>,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DatasetStatistics {
    pub record_count: usize,
    pub columns: BTreeMap<String, ColumnStatistics>,
}

impl DatasetStatistics {
    pub fn numeric_columns(&self) -> Vec<&str> {
        self.columns
            .iter()
            .filter(|(_, s)| matches!(s, ColumnStatistics::Numeric { .. }))
            .map(|(name, _)| name.as_str())
            .collect()
    }
}

/// Statistics for every column; null cells are not counted.
pub fn describe(records: &[Record]) -> DatasetStatistics {
    let mut columns = BTreeMap::new();
    for name in column_names(records) {
        let cells: Vec<&Value> = records
            .iter()
            .filter_map(|r| r.get(&name))
            .filter(|v| !v.is_null())
            .collect();
        if cells.is_empty() {
            continue;
        }
        let numbers: Vec<f64> = cells.iter().filter_map(|v| numeric_value(v)).collect();
        let stats = if is_mostly_numeric(numbers.len(), cells.len()) {
            numeric_stats(numbers)
        } else {
            categorical_stats(&cells)
        };
        columns.insert(name, stats);
    }
    DatasetStatistics {
        record_count: records.len(),
        columns,
    }
}

fn numeric_stats(mut values: Vec<f64>) -> ColumnStatistics {
    values.sort_by(f64::total_cmp);
    let count = values.len();
    let mean = values.iter().sum::<f64>() / count as f64;
    let median = if count % 2 == 0 {
        (values[count / 2 - 1] + values[count / 2]) / 2.0
    } else {
        values[count / 2]
    };
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / count as f64;
    ColumnStatistics::Numeric {
        count,
        mean,
        median,
        std: variance.sqrt(),
        min: values[0],
        max: values[count - 1],
    }
}

fn categorical_stats(cells: &[&Value]) -> ColumnStatistics {
    // (value, count) in first-seen order so ties go to the earliest value.
    let mut counts: Vec<(String, usize)> = Vec::new();
    for cell in cells {
        let text = value_text(cell);
        match counts.iter_mut().find(|(v, _)| *v == text) {
            Some((_, n)) => *n += 1,
            None => counts.push((text, 1)),
        }
    }
    let mut most_frequent: Option<(&str, usize)> = None;
    for (value, n) in &counts {
        if most_frequent.map_or(true, |(_, best)| *n > best) {
            most_frequent = Some((value, *n));
        }
    }
    ColumnStatistics::Categorical {
        count: cells.len(),
        unique: counts.len(),
        most_frequent: most_frequent.map(|(v, _)| v.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rows(values: &[Value]) -> Vec<Record> {
        values
            .iter()
            .map(|v| v.as_object().cloned().unwrap())
            .collect()
    }

    #[test]
    fn numeric_value_accepts_formatted_strings() {
        assert_eq!(numeric_value(&json!("$1,250.5")), Some(1250.5));
        assert_eq!(numeric_value(&json!("12%")), Some(12.0));
        assert_eq!(numeric_value(&json!(7)), Some(7.0));
        assert_eq!(numeric_value(&json!("n/a")), None);
        assert_eq!(numeric_value(&json!(true)), None);
    }

    #[test]
    fn seventy_percent_is_not_enough() {
        assert!(!is_mostly_numeric(7, 10));
        assert!(is_mostly_numeric(8, 10));
        assert!(!is_mostly_numeric(0, 0));
    }

    #[test]
    fn numeric_column_statistics() {
        let data = rows(&[
            json!({"sales": 2}),
            json!({"sales": 4}),
            json!({"sales": "4"}),
            json!({"sales": 4}),
            json!({"sales": 5}),
            json!({"sales": 5}),
            json!({"sales": 7}),
            json!({"sales": 9}),
        ]);
        let stats = describe(&data);
        match &stats.columns["sales"] {
            ColumnStatistics::Numeric {
                count,
                mean,
                median,
                std,
                min,
                max,
            } => {
                assert_eq!(*count, 8);
                assert!((mean - 5.0).abs() < 1e-9);
                assert!((median - 4.5).abs() < 1e-9);
                assert!((std - 2.0).abs() < 1e-9);
                assert_eq!((*min, *max), (2.0, 9.0));
            }
            other => panic!("expected numeric, got {other:?}"),
        }
        assert_eq!(stats.numeric_columns(), vec!["sales"]);
    }

    #[test]
    fn categorical_column_statistics() {
        let data = rows(&[
            json!({"region": "East"}),
            json!({"region": "West"}),
            json!({"region": "West"}),
            json!({"region": "East"}),
            json!({"region": null}),
        ]);
        let stats = describe(&data);
        assert_eq!(stats.record_count, 5);
        assert_eq!(
            stats.columns["region"],
            ColumnStatistics::Categorical {
                count: 4,
                unique: 2,
                most_frequent: Some("East".into()),
            }
        );
    }

    #[test]
    fn mixed_column_below_threshold_is_categorical() {
        let data = rows(&[
            json!({"v": 1}),
            json!({"v": 2}),
            json!({"v": "x"}),
        ]);
        assert!(matches!(
            describe(&data).columns["v"],
            ColumnStatistics::Categorical { .. }
        ));
    }

    #[test]
    fn empty_input_has_no_columns() {
        let stats = describe(&[]);
        assert_eq!(stats.record_count, 0);
        assert!(stats.columns.is_empty());
    }
}
