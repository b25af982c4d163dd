//! Error types for spreadsheet generation

use thiserror::Error;

/// Result type alias for excelgen operations
pub type Result<T> = std::result::Result<T, ExcelError>;

/// Errors raised while building or patching a workbook
#[derive(Debug, Error)]
pub enum ExcelError {
    /// Underlying I/O failure (template missing, output not writable, ...)
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// ZIP container could not be read or written
    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// Template XML is malformed
    #[error("xml error: {0}")]
    Xml(#[from] quick_xml::Error),

    /// Template XML attribute is malformed
    #[error("xml attribute error: {0}")]
    XmlAttr(#[from] quick_xml::events::attributes::AttrError),

    /// Date cannot be represented as an OLE Automation serial
    #[error("date {0} is outside the OLE Automation date range")]
    DateOverflow(String),

    /// A named range points at a sheet the template does not contain
    #[error("sheet '{0}' not found in template")]
    SheetNotFound(String),

    /// Column schema is not usable
    #[error("invalid column schema: {0}")]
    InvalidSchema(String),

    /// Value does not match the declared kind of its column
    #[error("column '{column}' expects {expected} but got {actual}")]
    TypeMismatch {
        column: String,
        expected: &'static str,
        actual: &'static str,
    },

    /// Value cannot be written into a cell
    #[error("invalid cell value: {0}")]
    InvalidValue(String),

    /// Cell reference could not be parsed
    #[error("invalid cell reference: {0}")]
    InvalidCellReference(String),

    /// A package part required for the operation is absent
    #[error("missing package part: {0}")]
    MissingPart(String),

    /// Template structure is not what a spreadsheet package should contain
    #[error("read error: {0}")]
    ReadError(String),

    /// Output could not be produced
    #[error("write error: {0}")]
    WriteError(String),

    /// Operation is declared but has no implementation
    #[error("not implemented: {0}")]
    NotImplemented(&'static str),
}
