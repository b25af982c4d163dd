//! Type definitions for records, values and cells

use std::fmt;

use chrono::{NaiveDate, NaiveDateTime};
use indexmap::IndexMap;

use crate::address::CellAddress;

/// Declared type of the field backing a column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum FieldKind {
    /// Text, written through the shared string table
    Text,
    /// Boolean or optional boolean
    Boolean,
    /// Date/time, written as an OLE Automation serial
    DateTime,
    /// Any numeric type
    #[default]
    Number,
}

impl FieldKind {
    pub(crate) fn describe(&self) -> &'static str {
        match self {
            FieldKind::Text => "text",
            FieldKind::Boolean => "a boolean",
            FieldKind::DateTime => "a date",
            FieldKind::Number => "a number",
        }
    }
}

/// Runtime value of a record field
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// String value
    Text(String),
    /// Boolean value
    Bool(bool),
    /// Timestamp without time zone
    DateTime(NaiveDateTime),
    /// Integer value
    Int(i64),
    /// Float value
    Float(f64),
}

impl FieldValue {
    pub(crate) fn describe(&self) -> &'static str {
        match self {
            FieldValue::Text(_) => "text",
            FieldValue::Bool(_) => "a boolean",
            FieldValue::DateTime(_) => "a date",
            FieldValue::Int(_) => "an integer",
            FieldValue::Float(_) => "a float",
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Text(s) => f.write_str(s),
            FieldValue::Bool(b) => write!(f, "{}", b),
            FieldValue::DateTime(dt) => write!(f, "{}", dt),
            FieldValue::Int(i) => write!(f, "{}", i),
            FieldValue::Float(v) => write!(f, "{}", v),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        FieldValue::Text(s.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        FieldValue::Text(s)
    }
}

impl From<bool> for FieldValue {
    fn from(b: bool) -> Self {
        FieldValue::Bool(b)
    }
}

impl From<NaiveDateTime> for FieldValue {
    fn from(dt: NaiveDateTime) -> Self {
        FieldValue::DateTime(dt)
    }
}

impl From<NaiveDate> for FieldValue {
    fn from(d: NaiveDate) -> Self {
        FieldValue::DateTime(d.and_time(chrono::NaiveTime::MIN))
    }
}

impl From<i32> for FieldValue {
    fn from(i: i32) -> Self {
        FieldValue::Int(i as i64)
    }
}

impl From<u32> for FieldValue {
    fn from(i: u32) -> Self {
        FieldValue::Int(i as i64)
    }
}

impl From<i64> for FieldValue {
    fn from(i: i64) -> Self {
        FieldValue::Int(i)
    }
}

impl From<f64> for FieldValue {
    fn from(v: f64) -> Self {
        FieldValue::Float(v)
    }
}

impl From<f32> for FieldValue {
    fn from(v: f32) -> Self {
        // Widen through the shortest decimal text so 0.1f32 stays 0.1.
        FieldValue::Float(v.to_string().parse().unwrap_or(v as f64))
    }
}

/// A record whose fields can be read by name
///
/// Collection builds read the field named by each column; template patches
/// match named ranges against [`Record::field_names`] case-insensitively.
pub trait Record {
    /// Names of all fields, in declaration order
    fn field_names(&self) -> Vec<&str>;

    /// Current value of `field`, `None` when the field is null or unknown
    fn field_value(&self, field: &str) -> Option<FieldValue>;
}

impl<T: Record + ?Sized> Record for &T {
    fn field_names(&self) -> Vec<&str> {
        (**self).field_names()
    }

    fn field_value(&self, field: &str) -> Option<FieldValue> {
        (**self).field_value(field)
    }
}

impl Record for IndexMap<String, FieldValue> {
    fn field_names(&self) -> Vec<&str> {
        self.keys().map(String::as_str).collect()
    }

    fn field_value(&self, field: &str) -> Option<FieldValue> {
        self.get(field).cloned()
    }
}

impl Record for IndexMap<String, Option<FieldValue>> {
    fn field_names(&self) -> Vec<&str> {
        self.keys().map(String::as_str).collect()
    }

    fn field_value(&self, field: &str) -> Option<FieldValue> {
        self.get(field).cloned().flatten()
    }
}

/// Cell data type as written in the `t` attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CellDataType {
    /// `t="n"`
    Number,
    /// `t="b"`
    Boolean,
    /// `t="s"`, value is an index into the shared string table
    SharedString,
    /// No `t` attribute; the consumer infers the type
    Inferred,
}

impl CellDataType {
    /// Value of the `t` attribute, `None` for inferred cells
    pub fn attribute(&self) -> Option<&'static str> {
        match self {
            CellDataType::Number => Some("n"),
            CellDataType::Boolean => Some("b"),
            CellDataType::SharedString => Some("s"),
            CellDataType::Inferred => None,
        }
    }

    /// Map a `t` attribute value back to a data type
    pub fn from_attribute(t: Option<&str>) -> Self {
        match t {
            Some("n") => CellDataType::Number,
            Some("b") => CellDataType::Boolean,
            Some("s") => CellDataType::SharedString,
            _ => CellDataType::Inferred,
        }
    }
}

/// A materialized cell ready to be serialized
#[derive(Debug, Clone, PartialEq)]
pub struct Cell {
    /// Cell position
    pub address: CellAddress,
    /// Data type
    pub data_type: CellDataType,
    /// Style slot, `None` for the default style
    pub style_index: Option<u32>,
    /// Text of the `<v>` element
    pub raw_value: String,
}

impl Cell {
    /// Create a new cell
    pub fn new(address: CellAddress, data_type: CellDataType, raw_value: String) -> Self {
        Cell {
            address,
            data_type,
            style_index: None,
            raw_value,
        }
    }

    /// Attach a style slot; slot 0 is the default and is not written
    pub fn with_style(mut self, style_index: u32) -> Self {
        self.style_index = (style_index > 0).then_some(style_index);
        self
    }
}

/// A row of cells, ordered by column
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    /// Row index (1-based)
    pub index: u32,
    /// Declared column span (`first:last`), if any
    pub spans: Option<(u32, u32)>,
    /// Cells present in this row; absent values have no cell
    pub cells: Vec<Cell>,
}

impl Row {
    /// Create a new empty row
    pub fn new(index: u32) -> Self {
        Row {
            index,
            spans: None,
            cells: Vec::new(),
        }
    }

    /// Get the cell at a 1-based column, if present
    pub fn get(&self, col: u32) -> Option<&Cell> {
        self.cells.iter().find(|c| c.address.col() == col)
    }

    /// Get number of cells
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Check if row has no cells
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}
