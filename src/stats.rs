use crate::loader::{Column, Table};
use serde::Serialize;
use serde_json::{Map, Value as JsonValue};

/// Feature columns eligible for summary statistics, in display order
pub const SUMMARY_COLUMNS: [&str; 6] = [
    "Engine_Size",
    "Horsepower",
    "Torque",
    "Weight",
    "Top_Speed",
    "Acceleration_0_100",
];

/// Message shown in place of the statistics table when no allow-listed column is present
pub const NO_MATCHING_COLUMNS: &str = "No matching numeric columns found in the dataset.";

/// Descriptive statistics of a single feature column
///
/// Every field except `count` is `None` when it cannot be computed: no
/// numeric values at all, or a single value for the standard deviation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureSummary {
    #[serde(skip)]
    pub feature: String,

    /// Number of non-missing numeric cells
    pub count: usize,
    pub mean: Option<f64>,

    /// Sample standard deviation (N - 1 denominator)
    pub std: Option<f64>,
    pub min: Option<f64>,
    #[serde(rename = "25%")]
    pub q25: Option<f64>,
    #[serde(rename = "50%")]
    pub q50: Option<f64>,
    #[serde(rename = "75%")]
    pub q75: Option<f64>,
    pub max: Option<f64>,
}

/// Result of summarising a table
#[derive(Debug, Clone, PartialEq)]
pub enum Summary {
    /// None of the allow-listed columns exist in the table
    NoMatchingColumns,

    /// One entry per retained column, in allow-list order
    Features(Vec<FeatureSummary>),
}

impl Summary {
    /// Retained feature names, in allow-list order
    pub fn features(&self) -> Vec<&str> {
        match self {
            Summary::NoMatchingColumns => Vec::new(),
            Summary::Features(rows) => rows.iter().map(|r| r.feature.as_str()).collect(),
        }
    }

    /// Structured form: feature name -> statistics record.
    ///
    /// Empty when no column matched.
    pub fn to_map(&self) -> Map<String, JsonValue> {
        match self {
            Summary::NoMatchingColumns => Map::new(),
            Summary::Features(rows) => rows
                .iter()
                .map(|row| {
                    let record = serde_json::to_value(row).unwrap_or(JsonValue::Null);
                    (row.feature.clone(), record)
                })
                .collect(),
        }
    }
}

/// Allow-listed columns present in `table`, in allow-list order
pub fn summary_columns(table: &Table) -> Vec<&'static str> {
    SUMMARY_COLUMNS
        .iter()
        .copied()
        .filter(|name| table.has_column(name))
        .collect()
}

/// Compute summary statistics for the allow-listed columns of a table
///
/// # Arguments
/// * `table` - The freshly loaded table
///
/// # Returns
/// * `Summary` - `NoMatchingColumns` if the intersection is empty, otherwise one
///   [`FeatureSummary`] per retained column
pub fn describe(table: &Table) -> Summary {
    let rows: Vec<FeatureSummary> = summary_columns(table)
        .into_iter()
        .filter_map(|name| table.column(name))
        .map(describe_column)
        .collect();

    if rows.is_empty() {
        Summary::NoMatchingColumns
    } else {
        Summary::Features(rows)
    }
}

/// Describe one column. Text cells are ignored; only numeric cells count.
pub fn describe_column(column: &Column) -> FeatureSummary {
    let mut values = column.numbers();
    values.sort_by(|a, b| a.total_cmp(b));

    let count = values.len();
    let mean = if count > 0 {
        Some(values.iter().sum::<f64>() / count as f64)
    } else {
        None
    };
    let std = match mean {
        Some(m) if count > 1 => {
            let ss: f64 = values.iter().map(|v| (v - m).powi(2)).sum();
            Some((ss / (count - 1) as f64).sqrt())
        }
        _ => None,
    };

    FeatureSummary {
        feature: column.name().to_string(),
        count,
        mean,
        std,
        min: values.first().copied(),
        q25: quantile(&values, 0.25),
        q50: quantile(&values, 0.50),
        q75: quantile(&values, 0.75),
        max: values.last().copied(),
    }
}

/// Linearly interpolated quantile of already sorted values
fn quantile(sorted: &[f64], q: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let pos = q * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    Some(sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64))
}
