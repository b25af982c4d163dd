//! Workbook generation from a record collection
//!
//! XML is written by hand through [`XmlWriter`] and compressed with the `zip`
//! crate; no intermediate object model of the workbook is kept.

pub mod encoder;
pub mod shared_strings;
pub mod styles;
pub mod workbook;
pub mod xml_writer;

pub use encoder::StringInterner;
pub use shared_strings::SharedStrings;
pub use styles::StyleTable;
pub use workbook::{ContentBuilt, Document, Empty, StylesBuilt, WriterOptions};
pub use xml_writer::XmlWriter;
