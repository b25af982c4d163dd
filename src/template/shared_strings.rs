//! Append-only editor over a template's shared string table
//!
//! Existing items keep their indices and their bytes; new strings are added
//! after the last item and the `count`/`uniqueCount` attributes are bumped.

use std::collections::HashMap;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use super::{element_prefix, local_name, position, raw_attributes, splice};
use crate::error::{ExcelError, Result};
use crate::fast_writer::encoder::StringInterner;
use crate::fast_writer::shared_strings::write_prefixed_string_item;
use crate::fast_writer::xml_writer::XmlWriter;

/// Shared strings of a template, plus whatever the patch adds
#[derive(Debug, Default)]
pub struct SharedStringTable {
    // First occurrence of every plain-text item
    lookup: HashMap<String, u32>,
    existing_count: u32,
    added: Vec<String>,
    added_references: u32,
}

impl SharedStringTable {
    /// Table for a template without a shared string part
    pub fn empty() -> Self {
        Self::default()
    }

    /// Index the items of an existing `sharedStrings.xml`
    ///
    /// Rich-text items take an index but are never reused for plain text.
    pub fn parse(xml: &str) -> Result<Self> {
        let mut reader = Reader::from_str(xml);
        let mut table = SharedStringTable::default();

        let mut current: Option<String> = None;
        let mut rich = false;
        let mut in_text = false;

        loop {
            match reader.read_event()? {
                Event::Start(e) => match local_name(e.name().as_ref()) {
                    b"si" => {
                        current = Some(String::new());
                        rich = false;
                    }
                    b"r" if current.is_some() => rich = true,
                    b"t" if current.is_some() => in_text = true,
                    // Phonetic runs are not part of the cell text
                    b"rPh" => {
                        reader.read_to_end(e.name())?;
                    }
                    _ => {}
                },
                Event::Empty(e) if local_name(e.name().as_ref()) == b"si" => {
                    table.record_item(String::new(), false);
                }
                Event::Text(e) if in_text => {
                    if let Some(text) = current.as_mut() {
                        text.push_str(&e.unescape()?);
                    }
                }
                Event::CData(e) if in_text => {
                    if let Some(text) = current.as_mut() {
                        text.push_str(&String::from_utf8_lossy(&e));
                    }
                }
                Event::End(e) => match local_name(e.name().as_ref()) {
                    b"t" => in_text = false,
                    b"si" => {
                        if let Some(text) = current.take() {
                            table.record_item(text, rich);
                        }
                    }
                    _ => {}
                },
                Event::Eof => break,
                _ => {}
            }
        }

        Ok(table)
    }

    fn record_item(&mut self, text: String, rich: bool) {
        if !rich {
            self.lookup.entry(text).or_insert(self.existing_count);
        }
        self.existing_count += 1;
    }

    /// Number of unique items, existing and added
    pub fn len(&self) -> usize {
        self.existing_count as usize + self.added.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Strings appended by this patch, in index order
    pub fn added(&self) -> &[String] {
        &self.added
    }

    /// Whether any cell now references the table
    pub fn is_referenced(&self) -> bool {
        self.added_references > 0
    }

    /// Rewrite an existing part: new items before `</sst>`, counts updated
    ///
    /// Every byte outside the `<sst>` start tag and the insertion point is kept.
    pub fn apply(&self, xml: &str) -> Result<String> {
        if !self.is_referenced() {
            return Ok(xml.to_string());
        }

        let mut reader = Reader::from_str(xml);
        loop {
            let start = position(&reader);
            match reader.read_event()? {
                Event::Start(e) if local_name(e.name().as_ref()) == b"sst" => {
                    let tag_end = position(&reader);
                    let prefix = element_prefix(e.name().as_ref());
                    let open_tag = self.start_tag(&e)?;

                    let close_start = find_closing_tag(&mut reader, b"sst")?;
                    let items = self.added_items(prefix.as_deref())?;

                    let mut out = splice(xml, close_start..close_start, &items);
                    out = splice(&out, start..tag_end, &open_tag);
                    return Ok(out);
                }
                Event::Empty(e) if local_name(e.name().as_ref()) == b"sst" => {
                    let end = position(&reader);
                    let prefix = element_prefix(e.name().as_ref());
                    let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                    let replacement = format!(
                        "{}{}</{}>",
                        self.start_tag(&e)?,
                        self.added_items(prefix.as_deref())?,
                        name
                    );
                    return Ok(splice(xml, start..end, &replacement));
                }
                Event::Eof => {
                    return Err(ExcelError::ReadError(
                        "shared string part has no sst element".to_string(),
                    ))
                }
                _ => {}
            }
        }
    }

    /// A complete `sharedStrings.xml` holding only the added strings
    pub fn to_new_part(&self) -> Result<Vec<u8>> {
        let mut output = Vec::new();
        let mut writer = XmlWriter::new(&mut output);
        writer.declaration()?;
        writer.start_element("sst")?;
        writer.attribute(
            "xmlns",
            "http://schemas.openxmlformats.org/spreadsheetml/2006/main",
        )?;
        writer.attribute_u32("count", self.added_references)?;
        writer.attribute_u32("uniqueCount", self.added.len() as u32)?;
        writer.close_start_tag()?;
        for text in &self.added {
            write_prefixed_string_item(&mut writer, None, text)?;
        }
        writer.end_element("sst")?;
        writer.flush()?;
        Ok(output)
    }

    fn start_tag(&self, e: &BytesStart<'_>) -> Result<String> {
        let mut tag = String::from("<");
        tag.push_str(&String::from_utf8_lossy(e.name().as_ref()));

        for (key, value) in raw_attributes(e)? {
            let value = match key.as_str() {
                "count" => {
                    let old: u32 = value.trim().parse().unwrap_or(0);
                    old.saturating_add(self.added_references).to_string()
                }
                "uniqueCount" => self.len().to_string(),
                _ => value,
            };
            tag.push_str(&format!(" {}=\"{}\"", key, value));
        }

        tag.push('>');
        Ok(tag)
    }

    fn added_items(&self, prefix: Option<&str>) -> Result<String> {
        let mut output = Vec::new();
        let mut writer = XmlWriter::new(&mut output);
        for text in &self.added {
            write_prefixed_string_item(&mut writer, prefix, text)?;
        }
        writer.flush()?;
        String::from_utf8(output).map_err(|e| ExcelError::WriteError(e.to_string()))
    }
}

impl StringInterner for SharedStringTable {
    fn intern(&mut self, text: &str) -> u32 {
        self.added_references += 1;
        if let Some(&index) = self.lookup.get(text) {
            return index;
        }
        let index = self.existing_count + self.added.len() as u32;
        self.added.push(text.to_string());
        self.lookup.insert(text.to_string(), index);
        index
    }
}

/// Byte offset where the closing tag of the element just opened starts
fn find_closing_tag(reader: &mut Reader<&[u8]>, local: &[u8]) -> Result<usize> {
    let mut depth = 0usize;
    loop {
        let start = position(reader);
        match reader.read_event()? {
            Event::Start(e) if local_name(e.name().as_ref()) == local => depth += 1,
            Event::End(e) if local_name(e.name().as_ref()) == local => {
                if depth == 0 {
                    return Ok(start);
                }
                depth -= 1;
            }
            Event::Eof => {
                return Err(ExcelError::ReadError(format!(
                    "unterminated <{}> element",
                    String::from_utf8_lossy(local)
                )))
            }
            _ => {}
        }
    }
}
