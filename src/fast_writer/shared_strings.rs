//! Shared string table for a single workbook build

use indexmap::IndexSet;
use std::io::Write;

use super::xml_writer::{needs_space_preserve, XmlWriter};
use crate::error::Result;

/// Deduplicated string pool; indices follow first-seen order and never change
#[derive(Debug, Default)]
pub struct SharedStrings {
    strings: IndexSet<String>,
    references: u32,
}

impl SharedStrings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the index of `text`, appending it when not yet present
    ///
    /// Matching is exact; no normalization is applied.
    pub fn intern(&mut self, text: &str) -> u32 {
        self.references += 1;
        if let Some(index) = self.strings.get_index_of(text) {
            return index as u32;
        }
        let (index, _) = self.strings.insert_full(text.to_string());
        index as u32
    }

    /// String stored at `index`
    pub fn get(&self, index: u32) -> Option<&str> {
        self.strings.get_index(index as usize).map(String::as_str)
    }

    /// Number of unique strings
    pub fn len(&self) -> usize {
        self.strings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }

    /// Number of cell references handed out
    pub fn reference_count(&self) -> u32 {
        self.references
    }

    /// Strings in index order
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.strings.iter().map(String::as_str)
    }

    /// Serialize as `xl/sharedStrings.xml`
    pub fn write_xml<W: Write>(&self, writer: &mut XmlWriter<W>) -> Result<()> {
        writer.declaration()?;
        writer.start_element("sst")?;
        writer.attribute(
            "xmlns",
            "http://schemas.openxmlformats.org/spreadsheetml/2006/main",
        )?;
        writer.attribute_u32("count", self.references)?;
        writer.attribute_u32("uniqueCount", self.strings.len() as u32)?;
        writer.close_start_tag()?;

        for text in &self.strings {
            write_string_item(writer, text)?;
        }

        writer.end_element("sst")?;
        writer.flush()
    }
}

/// Write one `<si><t>..</t></si>` item
pub(crate) fn write_string_item<W: Write>(writer: &mut XmlWriter<W>, text: &str) -> Result<()> {
    write_prefixed_string_item(writer, None, text)
}

/// Write one string item whose tags carry a namespace prefix, e.g. `<x:si>`
pub(crate) fn write_prefixed_string_item<W: Write>(
    writer: &mut XmlWriter<W>,
    prefix: Option<&str>,
    text: &str,
) -> Result<()> {
    let (si, t) = match prefix {
        Some(p) => (format!("{}:si", p), format!("{}:t", p)),
        None => ("si".to_string(), "t".to_string()),
    };

    writer.start_element(&si)?;
    writer.close_start_tag()?;
    writer.start_element(&t)?;
    if needs_space_preserve(text) {
        writer.attribute("xml:space", "preserve")?;
    }
    writer.close_start_tag()?;
    writer.write_escaped(text)?;
    writer.end_element(&t)?;
    writer.end_element(&si)
}
