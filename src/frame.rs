//! Tabular input: named columns over an ordered list of records.
//!
//! Cells stay loosely typed until a predictor selects the columns it
//! needs, so junk in columns nobody asks for never causes an error.

use crate::error::{Error, Result};
use serde_json::{Map, Value as JsonValue};
use std::collections::HashMap;
use std::io::BufRead;

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Missing,
    Number(f64),
    Text(String),
}

impl Value {
    /// Missing cells read as NaN.  Text has to parse as a number.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Missing => Some(f64::NAN),
            Value::Number(n) => Some(*n),
            Value::Text(s) => s.trim().parse::<f64>().ok(),
        }
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Value {
        Value::Number(n)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Value {
        Value::Number(n as f64)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Value {
        Value::Text(s.to_string())
    }
}

impl From<Option<f64>> for Value {
    fn from(n: Option<f64>) -> Value {
        n.map_or(Value::Missing, Value::Number)
    }
}

impl From<JsonValue> for Value {
    fn from(v: JsonValue) -> Value {
        match v {
            JsonValue::Null => Value::Missing,
            JsonValue::Bool(b) => Value::Number(if b { 1.0 } else { 0.0 }),
            JsonValue::Number(n) => n.as_f64().map_or(Value::Missing, Value::Number),
            JsonValue::String(s) => Value::Text(s),
            other => Value::Text(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Frame {
    columns: Vec<String>,
    index: HashMap<String, usize>,
    rows: Vec<Vec<Value>>,
}

impl Frame {
    pub fn new<S: Into<String>>(columns: impl IntoIterator<Item = S>) -> Result<Frame> {
        let mut frame = Frame::default();
        for col in columns {
            let col = col.into();
            if frame.index.contains_key(&col) {
                return Err(Error::DuplicateColumn(col));
            }
            frame.add_column(col);
        }
        Ok(frame)
    }

    /// Columns are the union of every record's keys, in the order
    /// they are first seen.  Keys a record lacks are missing cells.
    pub fn from_records(records: impl IntoIterator<Item = Map<String, JsonValue>>) -> Frame {
        let mut frame = Frame::default();
        for record in records {
            frame.push_record(record);
        }
        frame
    }

    /// One JSON object per line; blank lines are skipped.
    pub fn read_json_lines(reader: impl BufRead) -> Result<Frame> {
        let mut frame = Frame::default();
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            frame.push_record(serde_json::from_str::<Map<String, JsonValue>>(&line)?);
        }
        Ok(frame)
    }

    fn add_column(&mut self, name: String) -> usize {
        let idx = self.columns.len();
        self.index.insert(name.clone(), idx);
        self.columns.push(name);
        for row in self.rows.iter_mut() {
            row.push(Value::Missing);
        }
        idx
    }

    pub fn push_row(&mut self, row: Vec<Value>) -> Result<()> {
        if row.len() != self.columns.len() {
            return Err(Error::Shape {
                expected: self.columns.len(),
                found: row.len(),
            });
        }
        self.rows.push(row);
        Ok(())
    }

    pub fn push_record(&mut self, record: Map<String, JsonValue>) {
        let mut row = vec![Value::Missing; self.columns.len()];
        for (key, value) in record {
            let idx = match self.index.get(&key) {
                Some(&idx) => idx,
                None => {
                    row.push(Value::Missing);
                    self.add_column(key)
                }
            };
            row[idx] = value.into();
        }
        self.rows.push(row);
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    pub fn cell(&self, row: usize, column: &str) -> Option<&Value> {
        self.column_index(column)
            .and_then(|c| self.rows.get(row).map(|r| &r[c]))
    }

    /// Pull out `names`, in that order, as a numeric matrix.
    ///
    /// Every missing column is reported, not just the first.
    pub fn select(&self, names: &[String]) -> Result<FeatureMatrix> {
        let missing: Vec<String> = names
            .iter()
            .filter(|n| !self.index.contains_key(n.as_str()))
            .cloned()
            .collect();
        if !missing.is_empty() {
            return Err(Error::MissingFeature { names: missing });
        }

        let picks: Vec<usize> = names.iter().map(|n| self.index[n.as_str()]).collect();
        let mut data = Vec::with_capacity(self.rows.len() * picks.len());
        for (r, row) in self.rows.iter().enumerate() {
            for (&c, name) in picks.iter().zip(names) {
                let cell = &row[c];
                let v = cell.as_f64().ok_or_else(|| Error::InvalidValue {
                    row: r,
                    column: name.clone(),
                    value: match cell {
                        Value::Text(s) => s.clone(),
                        other => format!("{:?}", other),
                    },
                })?;
                data.push(v);
            }
        }
        Ok(FeatureMatrix {
            columns: names.to_vec(),
            n_rows: self.rows.len(),
            data,
        })
    }
}

/// Row-major numeric rows in a fixed column order.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureMatrix {
    columns: Vec<String>,
    n_rows: usize,
    data: Vec<f64>,
}

impl FeatureMatrix {
    pub fn new(columns: Vec<String>, data: Vec<f64>) -> Result<FeatureMatrix> {
        let n_cols = columns.len();
        if n_cols == 0 {
            return Ok(FeatureMatrix {
                columns,
                n_rows: 0,
                data,
            });
        }
        if data.len() % n_cols != 0 {
            return Err(Error::Shape {
                expected: n_cols,
                found: data.len() % n_cols,
            });
        }
        Ok(FeatureMatrix {
            n_rows: data.len() / n_cols,
            columns,
            data,
        })
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    pub fn n_cols(&self) -> usize {
        self.columns.len()
    }

    pub fn row(&self, i: usize) -> &[f64] {
        let n = self.n_cols();
        &self.data[i * n..(i + 1) * n]
    }
}
