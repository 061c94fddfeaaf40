//! Type definitions for typed CSV data

use arrow::datatypes::DataType;
use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Column type inferred from CSV text
///
/// Types are ordered by inference preference: a column is `Int64` if every
/// non-null cell parses as an integer, otherwise `Float64`, otherwise
/// `Boolean`, otherwise `Utf8`. `Null` marks a column with no non-null cell
/// in the batch it was inferred from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ColumnType {
    /// No non-null value seen
    Null,
    /// 64-bit signed integer
    Int64,
    /// 64-bit float
    Float64,
    /// `true` / `false`
    Boolean,
    /// Anything else
    Utf8,
}

impl ColumnType {
    /// Narrowest type a single non-null cell fits into
    pub fn of_cell(raw: &str) -> ColumnType {
        let s = raw.trim();
        if s.parse::<i64>().is_ok() {
            ColumnType::Int64
        } else if parse_float(s).is_some() {
            ColumnType::Float64
        } else if parse_bool(s).is_some() {
            ColumnType::Boolean
        } else {
            ColumnType::Utf8
        }
    }

    /// Whether values of this type can be stored losslessly in a column of `target`
    ///
    /// `Null` fits anywhere and `Int64` widens to `Float64`. No other
    /// conversion is allowed, in particular text never mixes with numbers.
    pub fn promotes_to(self, target: ColumnType) -> bool {
        self == target
            || self == ColumnType::Null
            || (self == ColumnType::Int64 && target == ColumnType::Float64)
    }

    /// Type of a column holding cells of both `self` and `other` within one batch
    ///
    /// Uses the promotion rule where it applies and falls back to `Utf8`,
    /// since every cell is still available as its source text.
    pub fn unify(self, other: ColumnType) -> ColumnType {
        if self.promotes_to(other) {
            other
        } else if other.promotes_to(self) {
            self
        } else {
            ColumnType::Utf8
        }
    }

    /// Arrow type used when writing this column
    pub fn to_arrow(self) -> DataType {
        match self {
            ColumnType::Int64 => DataType::Int64,
            ColumnType::Float64 => DataType::Float64,
            ColumnType::Boolean => DataType::Boolean,
            ColumnType::Null | ColumnType::Utf8 => DataType::Utf8,
        }
    }

    /// Inverse of [`ColumnType::to_arrow`], for reading Parquet files back
    pub fn from_arrow(data_type: &DataType) -> Option<ColumnType> {
        match data_type {
            DataType::Int8 | DataType::Int16 | DataType::Int32 | DataType::Int64 => {
                Some(ColumnType::Int64)
            }
            DataType::Float32 | DataType::Float64 => Some(ColumnType::Float64),
            DataType::Boolean => Some(ColumnType::Boolean),
            DataType::Utf8 | DataType::LargeUtf8 => Some(ColumnType::Utf8),
            DataType::Null => Some(ColumnType::Null),
            _ => None,
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ColumnType::Null => "Null",
            ColumnType::Int64 => "Int64",
            ColumnType::Float64 => "Float64",
            ColumnType::Boolean => "Boolean",
            ColumnType::Utf8 => "Utf8",
        };
        f.write_str(name)
    }
}

/// A single typed value
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Value {
    /// Missing value
    Null,
    /// Integer value
    Int(i64),
    /// Float value
    Float(f64),
    /// Boolean value
    Bool(bool),
    /// Text value
    Text(String),
}

impl Value {
    /// Decode source text as a value of `ty`
    ///
    /// Returns `None` when the text does not fit the type.
    pub fn parse(raw: &str, ty: ColumnType) -> Option<Value> {
        match ty {
            ColumnType::Null => None,
            ColumnType::Int64 => raw.trim().parse().ok().map(Value::Int),
            ColumnType::Float64 => parse_float(raw.trim()).map(Value::Float),
            ColumnType::Boolean => parse_bool(raw.trim()).map(Value::Bool),
            ColumnType::Utf8 => Some(Value::Text(raw.to_string())),
        }
    }

    /// Type of this value
    pub fn column_type(&self) -> ColumnType {
        match self {
            Value::Null => ColumnType::Null,
            Value::Int(_) => ColumnType::Int64,
            Value::Float(_) => ColumnType::Float64,
            Value::Bool(_) => ColumnType::Boolean,
            Value::Text(_) => ColumnType::Utf8,
        }
    }

    /// Check if value is null
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Convert value to string (null becomes the empty string)
    pub fn as_string(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::Int(i) => i.to_string(),
            Value::Float(f) => f.to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Text(s) => s.clone(),
        }
    }

    /// Try to convert to integer
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Try to convert to float; integers widen
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_string())
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

// "inf" and "NaN" parse as f64 but are words, not numbers
fn parse_float(s: &str) -> Option<f64> {
    if s.bytes().any(|b| b.is_ascii_digit()) {
        s.parse().ok()
    } else {
        None
    }
}

fn parse_bool(s: &str) -> Option<bool> {
    if s.eq_ignore_ascii_case("true") {
        Some(true)
    } else if s.eq_ignore_ascii_case("false") {
        Some(false)
    } else {
        None
    }
}
