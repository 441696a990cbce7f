use serde_json::{Map, Number, Value as JsonValue};
use std::collections::HashMap;
use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Cell contents treated as missing values when a CSV file is parsed
const MISSING_MARKERS: [&str; 9] = ["", "NA", "N/A", "NaN", "nan", "null", "NULL", "#N/A", "None"];

/// Errors raised while turning a delimited text file into a [`Table`]
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("could not open {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("no columns to parse from file")]
    Empty,

    #[error("expected {expected} fields in line {line}, saw {found}")]
    RaggedRow {
        line: u64,
        expected: usize,
        found: usize,
    },

    #[error("column {name} has {found} values, expected {expected}")]
    ColumnLength {
        name: String,
        expected: usize,
        found: usize,
    },
}

/// A single cell of a loaded table
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Whole number cell of an integer column
    Integer(i64),

    /// Cell of a float column
    Float(f64),

    /// Free-form text cell
    Text(String),

    /// Empty cell or one of the recognised missing markers
    Missing,
}

impl Value {
    /// Numeric view of the cell, if it has one
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Integer(i) => Some(*i as f64),
            Value::Float(f) if f.is_finite() => Some(*f),
            _ => None,
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, Value::Missing)
    }

    /// Exact comparison against a raw string such as a query parameter.
    ///
    /// Text cells must be byte-for-byte equal. Numeric cells match when the
    /// string parses to the same number. Missing cells never match.
    pub fn matches_str(&self, raw: &str) -> bool {
        match self {
            Value::Text(text) => text == raw,
            Value::Integer(i) => raw.parse::<i64>().map(|r| r == *i).unwrap_or(false),
            Value::Float(f) => raw.parse::<f64>().map(|r| r == *f).unwrap_or(false),
            Value::Missing => false,
        }
    }

    /// JSON form of the cell; missing and non-finite values become `null`
    pub fn to_json(&self) -> JsonValue {
        match self {
            Value::Integer(i) => JsonValue::Number((*i).into()),
            Value::Float(f) => Number::from_f64(*f)
                .map(JsonValue::Number)
                .unwrap_or(JsonValue::Null),
            Value::Text(text) => JsonValue::String(text.clone()),
            Value::Missing => JsonValue::Null,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Integer(i) => write!(f, "{}", i),
            // Keep a trailing ".0" so float columns still read as floats
            Value::Float(v) if v.is_finite() && v.fract() == 0.0 => write!(f, "{:.1}", v),
            Value::Float(v) => write!(f, "{}", v),
            Value::Text(text) => f.write_str(text),
            Value::Missing => f.write_str("NaN"),
        }
    }
}

/// Type inferred for a whole column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Integer,
    Float,
    Text,
}

/// A named, typed column of cells
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    name: String,
    kind: ColumnType,
    values: Vec<Value>,
}

impl Column {
    /// Build a column from raw text cells, inferring its type.
    ///
    /// A column is an integer column when every cell parses as `i64` and none
    /// is missing, a float column when every present cell parses as `f64`,
    /// and a text column otherwise.
    pub fn from_raw<S: AsRef<str>>(name: impl Into<String>, cells: &[S]) -> Self {
        let present: Vec<Option<&str>> = cells
            .iter()
            .map(|cell| {
                let cell = cell.as_ref();
                if MISSING_MARKERS.contains(&cell) {
                    None
                } else {
                    Some(cell)
                }
            })
            .collect();

        let ints: Option<Vec<i64>> = present
            .iter()
            .map(|cell| cell.and_then(|c| c.trim().parse::<i64>().ok()))
            .collect();
        if let Some(ints) = ints {
            return Column {
                name: name.into(),
                kind: ColumnType::Integer,
                values: ints.into_iter().map(Value::Integer).collect(),
            };
        }

        let floats: Option<Vec<Value>> = present
            .iter()
            .map(|cell| match cell {
                None => Some(Value::Missing),
                Some(c) => c.trim().parse::<f64>().ok().map(Value::Float),
            })
            .collect();
        if let Some(values) = floats {
            return Column {
                name: name.into(),
                kind: ColumnType::Float,
                values,
            };
        }

        Column {
            name: name.into(),
            kind: ColumnType::Text,
            values: present
                .iter()
                .map(|cell| match cell {
                    Some(c) => Value::Text(c.to_string()),
                    None => Value::Missing,
                })
                .collect(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> ColumnType {
        self.kind
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self.kind, ColumnType::Integer | ColumnType::Float)
    }

    /// Every present numeric value, in row order
    pub fn numbers(&self) -> Vec<f64> {
        self.values.iter().filter_map(Value::as_f64).collect()
    }

    /// Number of cells that are not missing
    pub fn count_present(&self) -> usize {
        self.values.iter().filter(|v| !v.is_missing()).count()
    }

    fn select(&self, rows: &[usize]) -> Column {
        Column {
            name: self.name.clone(),
            kind: self.kind,
            values: rows.iter().map(|&r| self.values[r].clone()).collect(),
        }
    }
}

/// An in-memory table: ordered named columns of equal length
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Table {
    columns: Vec<Column>,
}

impl Table {
    /// Assemble a table, checking that every column has the same length
    pub fn from_columns(columns: Vec<Column>) -> Result<Self, LoadError> {
        if let Some(first) = columns.first() {
            let expected = first.len();
            if let Some(bad) = columns.iter().find(|c| c.len() != expected) {
                return Err(LoadError::ColumnLength {
                    name: bad.name.clone(),
                    expected,
                    found: bad.len(),
                });
            }
        }
        Ok(Table { columns })
    }

    /// Parse CSV text with a header row from any reader.
    ///
    /// Rows shorter than the header are padded with missing cells; longer
    /// rows are rejected. Empty or blank header names become `Unnamed: N`
    /// and repeated names get a `.1`, `.2`, ... suffix.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self, LoadError> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(reader);

        let headers = reader.headers()?.clone();
        if headers.is_empty() || (headers.len() == 1 && headers[0].trim().is_empty()) {
            return Err(LoadError::Empty);
        }
        let names = unique_names(headers.iter());
        let width = names.len();

        let mut cells: Vec<Vec<String>> = vec![Vec::new(); width];
        for record in reader.records() {
            let record = record?;
            if record.len() > width {
                return Err(LoadError::RaggedRow {
                    line: record.position().map(|p| p.line()).unwrap_or(0),
                    expected: width,
                    found: record.len(),
                });
            }
            for (c, column) in cells.iter_mut().enumerate() {
                column.push(record.get(c).unwrap_or("").to_string());
            }
        }

        let columns = names
            .into_iter()
            .zip(cells.iter())
            .map(|(name, raw)| Column::from_raw(name, raw.as_slice()))
            .collect();

        Table::from_columns(columns)
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    /// Number of columns
    pub fn width(&self) -> usize {
        self.columns.len()
    }

    /// Number of rows
    pub fn height(&self) -> usize {
        self.columns.first().map(Column::len).unwrap_or(0)
    }

    /// The first `n` rows (fewer if the table is shorter)
    pub fn head(&self, n: usize) -> Table {
        let rows: Vec<usize> = (0..self.height().min(n)).collect();
        self.select_rows(&rows)
    }

    /// The leading `rows` × `cols` slice of the table
    pub fn preview(&self, rows: usize, cols: usize) -> Table {
        let mut head = self.head(rows);
        head.columns.truncate(cols);
        head
    }

    /// Keep the rows whose cell in `column` equals `value` exactly.
    ///
    /// Returns `None` when the table has no such column.
    pub fn filter_eq(&self, column: &str, value: &str) -> Option<Table> {
        let target = self.column(column)?;
        let rows: Vec<usize> = target
            .values
            .iter()
            .enumerate()
            .filter(|(_, cell)| cell.matches_str(value))
            .map(|(i, _)| i)
            .collect();
        Some(self.select_rows(&rows))
    }

    /// One JSON object per row, keys in column order
    pub fn records(&self) -> Vec<Map<String, JsonValue>> {
        (0..self.height())
            .map(|r| {
                self.columns
                    .iter()
                    .map(|c| (c.name.clone(), c.values[r].to_json()))
                    .collect()
            })
            .collect()
    }

    fn select_rows(&self, rows: &[usize]) -> Table {
        Table {
            columns: self.columns.iter().map(|c| c.select(rows)).collect(),
        }
    }
}

/// Load a table from a CSV file on disk
///
/// # Arguments
/// * `filepath` - Path to the CSV file to load
///
/// # Returns
/// * `Result<Table, LoadError>` - The parsed table or the reason it could not be read
///
/// # Examples
/// ```no_run
/// use dashboard::loader::from_csv;
///
/// match from_csv("media/datasets/cars.csv") {
///     Ok(table) => println!("Loaded {} rows x {} columns", table.height(), table.width()),
///     Err(e) => eprintln!("Error loading CSV: {}", e),
/// }
/// ```
pub fn from_csv(filepath: impl AsRef<Path>) -> Result<Table, LoadError> {
    let path = filepath.as_ref();
    let file = File::open(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Table::from_reader(file)
}

fn unique_names<'a>(headers: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut seen: HashMap<String, usize> = HashMap::new();
    headers
        .enumerate()
        .map(|(i, raw)| {
            let base = if raw.trim().is_empty() {
                format!("Unnamed: {}", i)
            } else {
                raw.to_string()
            };
            let count = seen.entry(base.clone()).or_insert(0);
            let name = if *count == 0 {
                base
            } else {
                format!("{}.{}", base, count)
            };
            *count += 1;
            name
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeated_and_blank_headers_are_renamed() {
        let names = unique_names(["a", "", "a", "b", "a"].into_iter());
        assert_eq!(names, vec!["a", "Unnamed: 1", "a.1", "b", "a.2"]);
    }

    #[test]
    fn float_display_keeps_decimal_point() {
        assert_eq!(Value::Float(2.0).to_string(), "2.0");
        assert_eq!(Value::Float(2.5).to_string(), "2.5");
        assert_eq!(Value::Integer(7).to_string(), "7");
        assert_eq!(Value::Missing.to_string(), "NaN");
    }
}
