//! # excelgen
//!
//! Builds xlsx workbooks from typed record collections and fills named cells
//! of existing workbook templates.
//!
//! ## Building from a collection
//!
//! ```no_run
//! use excelgen::{build_file_from_collection, ColumnSchema, FieldKind, FieldValue};
//! use indexmap::IndexMap;
//!
//! let schema = ColumnSchema::builder()
//!     .column("name", "Name", 1)
//!     .kind(FieldKind::Text)
//!     .column("price", "Price", 2)
//!     .number_format_code("#,##0.00")
//!     .build()?;
//!
//! let mut product: IndexMap<String, FieldValue> = IndexMap::new();
//! product.insert("name".to_string(), "Widget".into());
//! product.insert("price".to_string(), 19.99f64.into());
//!
//! build_file_from_collection(vec![product], &schema, "Products", "products.xlsx")?;
//! # Ok::<(), excelgen::ExcelError>(())
//! ```
//!
//! ## Patching a template
//!
//! ```no_run
//! use excelgen::{patch_from_template, FieldValue};
//! use indexmap::IndexMap;
//!
//! let mut totals: IndexMap<String, FieldValue> = IndexMap::new();
//! totals.insert("Total".to_string(), 1250.5f64.into());
//!
//! let bytes = patch_from_template(&totals, "invoice_template.xlsx")?;
//! std::fs::write("invoice.xlsx", bytes)?;
//! # Ok::<(), excelgen::ExcelError>(())
//! ```

pub mod address;
pub mod date;
pub mod error;
pub mod fast_writer;
pub mod schema;
pub mod template;
pub mod types;

use std::path::Path;

pub use address::{column_letters, column_number, CellAddress};
pub use date::to_oa_date;
pub use error::{ExcelError, Result};
pub use fast_writer::{Document, WriterOptions};
pub use schema::{ColumnDescriptor, ColumnSchema, ColumnSchemaBuilder, NumberFormat};
pub use types::{CellDataType, FieldKind, FieldValue, Record};

/// Build a single-sheet workbook from `records` and return the package bytes
///
/// The first row holds the column titles; each record becomes one row below
/// it. Null fields leave their cell out.
pub fn build_from_collection<R, I>(records: I, schema: &ColumnSchema, sheet_name: &str) -> Result<Vec<u8>>
where
    R: Record,
    I: IntoIterator<Item = R>,
{
    build_from_collection_with(records, schema, sheet_name, &WriterOptions::default())
}

/// [`build_from_collection`] with explicit writer options
pub fn build_from_collection_with<R, I>(
    records: I,
    schema: &ColumnSchema,
    sheet_name: &str,
    options: &WriterOptions,
) -> Result<Vec<u8>>
where
    R: Record,
    I: IntoIterator<Item = R>,
{
    Document::new(schema.clone(), sheet_name)?
        .build_styles()
        .build_content(records)?
        .to_bytes(options)
}

/// Build a single-sheet workbook straight into the file at `path`
///
/// On failure the file may be left partially written.
pub fn build_file_from_collection<R, I, P>(
    records: I,
    schema: &ColumnSchema,
    sheet_name: &str,
    path: P,
) -> Result<()>
where
    R: Record,
    I: IntoIterator<Item = R>,
    P: AsRef<Path>,
{
    Document::new(schema.clone(), sheet_name)?
        .build_styles()
        .build_content(records)?
        .to_file(path, &WriterOptions::default())
}

/// Fill the named cells of the template at `template_path` from `record`
///
/// The template file is read once and never modified.
pub fn patch_from_template<R, P>(record: &R, template_path: P) -> Result<Vec<u8>>
where
    R: Record + ?Sized,
    P: AsRef<Path>,
{
    let template = std::fs::read(template_path)?;
    patch_template_bytes(record, &template)
}

/// Fill the named cells of an in-memory template from `record`
pub fn patch_template_bytes<R: Record + ?Sized>(record: &R, template: &[u8]) -> Result<Vec<u8>> {
    template::patch_template(record, template)
}

/// Patch a template and write the result to a file
///
/// Not available yet; always fails with [`ExcelError::NotImplemented`].
pub fn patch_file_from_template<R, P, Q>(_record: &R, _template_path: P, _output_path: Q) -> Result<()>
where
    R: Record + ?Sized,
    P: AsRef<Path>,
    Q: AsRef<Path>,
{
    Err(ExcelError::NotImplemented("patch_file_from_template"))
}
