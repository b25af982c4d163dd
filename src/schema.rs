//! Column schema: which record fields become which columns, and how they are formatted

use std::collections::HashSet;

use crate::error::{ExcelError, Result};
use crate::types::FieldKind;

/// Number format requested by a column
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum NumberFormat {
    /// General format (built-in id 0)
    #[default]
    General,
    /// One of the built-in number format ids (e.g. 22 = `m/d/yy h:mm`)
    Builtin(u32),
    /// Custom format code, e.g. `#,##0.00`
    Custom(String),
}

/// One output column
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ColumnDescriptor {
    /// Name of the record field backing this column
    pub field: String,
    /// Header text
    pub title: String,
    /// 1-based position; decides the column order, not the cell address
    pub position: u32,
    /// Declared type of the backing field
    #[cfg_attr(feature = "serde", serde(default))]
    pub kind: FieldKind,
    /// Number format of the column's cells
    #[cfg_attr(feature = "serde", serde(default))]
    pub number_format: NumberFormat,
}

impl ColumnDescriptor {
    /// Create a column with the general format
    pub fn new(field: impl Into<String>, title: impl Into<String>, position: u32) -> Self {
        ColumnDescriptor {
            field: field.into(),
            title: title.into(),
            position,
            kind: FieldKind::default(),
            number_format: NumberFormat::General,
        }
    }
}

/// Validated list of columns, ordered by position
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnSchema {
    columns: Vec<ColumnDescriptor>,
}

impl ColumnSchema {
    /// Start building a schema
    ///
    /// # Examples
    ///
    /// ```
    /// use excelgen::schema::ColumnSchema;
    /// use excelgen::types::FieldKind;
    ///
    /// let schema = ColumnSchema::builder()
    ///     .column("name", "Product Name", 1).kind(FieldKind::Text)
    ///     .column("price", "Product Price", 3).number_format_code("#,##0.00")
    ///     .column("discount", "Product Discount", 2)
    ///     .build()
    ///     .unwrap();
    ///
    /// let titles: Vec<_> = schema.columns().iter().map(|c| c.title.as_str()).collect();
    /// assert_eq!(titles, ["Product Name", "Product Discount", "Product Price"]);
    /// ```
    pub fn builder() -> ColumnSchemaBuilder {
        ColumnSchemaBuilder::default()
    }

    /// Validate and order a list of descriptors
    ///
    /// Positions must be positive and unique; gaps are allowed.
    pub fn new(mut columns: Vec<ColumnDescriptor>) -> Result<Self> {
        if columns.is_empty() {
            return Err(ExcelError::InvalidSchema(
                "schema has no columns".to_string(),
            ));
        }

        let mut seen = HashSet::with_capacity(columns.len());
        for column in &columns {
            if column.position == 0 {
                return Err(ExcelError::InvalidSchema(format!(
                    "column '{}' has position 0; positions start at 1",
                    column.title
                )));
            }
            if !seen.insert(column.position) {
                return Err(ExcelError::InvalidSchema(format!(
                    "position {} is used by more than one column",
                    column.position
                )));
            }
        }

        columns.sort_by_key(|c| c.position);
        Ok(ColumnSchema { columns })
    }

    /// Columns in position order
    pub fn columns(&self) -> &[ColumnDescriptor] {
        &self.columns
    }

    /// Number of columns
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// Always false for a validated schema
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Number of columns as a column number; the right edge of every row's span
    pub fn column_count(&self) -> u32 {
        self.columns.len() as u32
    }
}

/// Fluent builder for [`ColumnSchema`]
#[derive(Debug, Default)]
pub struct ColumnSchemaBuilder {
    columns: Vec<ColumnDescriptor>,
}

impl ColumnSchemaBuilder {
    /// Add a column backed by `field`
    pub fn column(
        mut self,
        field: impl Into<String>,
        title: impl Into<String>,
        position: u32,
    ) -> Self {
        self.columns
            .push(ColumnDescriptor::new(field, title, position));
        self
    }

    /// Set the declared kind of the last added column
    pub fn kind(mut self, kind: FieldKind) -> Self {
        if let Some(column) = self.columns.last_mut() {
            column.kind = kind;
        }
        self
    }

    /// Use a built-in number format id for the last added column
    pub fn number_format_id(mut self, id: u32) -> Self {
        if let Some(column) = self.columns.last_mut() {
            column.number_format = if id == 0 {
                NumberFormat::General
            } else {
                NumberFormat::Builtin(id)
            };
        }
        self
    }

    /// Use a custom number format code for the last added column
    ///
    /// An empty code leaves the column on its current format.
    pub fn number_format_code(mut self, code: impl Into<String>) -> Self {
        let code = code.into();
        if let Some(column) = self.columns.last_mut() {
            if !code.is_empty() {
                column.number_format = NumberFormat::Custom(code);
            }
        }
        self
    }

    /// Add a fully specified descriptor
    pub fn descriptor(mut self, descriptor: ColumnDescriptor) -> Self {
        self.columns.push(descriptor);
        self
    }

    /// Validate and finish the schema
    pub fn build(self) -> Result<ColumnSchema> {
        ColumnSchema::new(self.columns)
    }
}
