//! In-memory result sets.

use std::fmt;

use crate::error::{ImpselectError, ImpselectResult};

/// A single cell.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl Value {
    /// Infer a cell from its CSV text form.
    ///
    /// Empty and NaN cells are null; `True`/`False` (any case) are booleans;
    /// integers and floats are parsed; everything else is text.
    pub fn infer(raw: &str) -> Self {
        if raw.is_empty() {
            return Self::Null;
        }
        if raw.eq_ignore_ascii_case("true") {
            return Self::Bool(true);
        }
        if raw.eq_ignore_ascii_case("false") {
            return Self::Bool(false);
        }
        if let Ok(i) = raw.parse::<i64>() {
            return Self::Int(i);
        }
        if let Ok(f) = raw.parse::<f64>() {
            if f.is_nan() {
                return Self::Null;
            }
            return Self::Float(f);
        }
        Self::Text(raw.to_string())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }
}

/// CSV text form. Floats always carry a fraction or exponent so they decode
/// back as floats.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => Ok(()),
            Self::Bool(true) => f.write_str("True"),
            Self::Bool(false) => f.write_str("False"),
            Self::Int(i) => write!(f, "{}", i),
            Self::Float(x) if x.is_nan() => Ok(()),
            Self::Float(x) => write!(f, "{:?}", x),
            Self::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Self::Float(x)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

/// Named columns plus rows of cells. Every row has one cell per column.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl Table {
    /// Empty table with the given header.
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    pub fn from_rows(columns: Vec<String>, rows: Vec<Vec<Value>>) -> ImpselectResult<Self> {
        let mut table = Self::new(columns);
        for row in rows {
            table.push_row(row)?;
        }
        Ok(table)
    }

    pub fn push_row(&mut self, row: Vec<Value>) -> ImpselectResult<()> {
        if row.len() != self.columns.len() {
            return Err(ImpselectError::InvalidTable {
                message: format!(
                    "row has {} cells, expected {}",
                    row.len(),
                    self.columns.len()
                ),
            });
        }
        self.rows.push(row);
        Ok(())
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Cells of one column, top to bottom.
    pub fn column(&self, name: &str) -> Option<Vec<&Value>> {
        let idx = self.column_index(name)?;
        Some(self.rows.iter().map(|row| &row[idx]).collect())
    }

    /// Set `name` to `value` on every row, replacing the column if it exists.
    pub fn with_constant_column(mut self, name: &str, value: Value) -> Self {
        match self.column_index(name) {
            Some(idx) => {
                for row in &mut self.rows {
                    row[idx] = value.clone();
                }
            }
            None => {
                self.columns.push(name.to_string());
                for row in &mut self.rows {
                    row.push(value.clone());
                }
            }
        }
        self
    }

    /// Stack tables in order.
    ///
    /// The header is the union of all headers in first-seen order; cells a
    /// table has no column for are null.
    pub fn concat(tables: impl IntoIterator<Item = Table>) -> Table {
        let tables: Vec<Table> = tables.into_iter().collect();

        let mut columns: Vec<String> = Vec::new();
        for t in &tables {
            for c in &t.columns {
                if !columns.contains(c) {
                    columns.push(c.clone());
                }
            }
        }

        let total: usize = tables.iter().map(Table::num_rows).sum();
        let mut rows = Vec::with_capacity(total);
        for t in tables {
            if t.columns == columns {
                rows.extend(t.rows);
                continue;
            }
            let mapping: Vec<Option<usize>> =
                columns.iter().map(|c| t.column_index(c)).collect();
            for row in t.rows {
                rows.push(
                    mapping
                        .iter()
                        .map(|m| m.map_or(Value::Null, |i| row[i].clone()))
                        .collect(),
                );
            }
        }

        Table { columns, rows }
    }
}
