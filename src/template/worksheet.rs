//! Locate-or-insert of single cells in worksheet XML
//!
//! The worksheet is scanned with quick-xml and the target cell is spliced in
//! at its byte offset, so everything outside the touched `<c>` (or the new
//! `<row>`) is carried over unchanged.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use super::{element_prefix, local_name, position, raw_attributes, splice};
use crate::address::CellAddress;
use crate::error::{ExcelError, Result};
use crate::types::CellDataType;

/// New content for one cell
#[derive(Debug, Clone, PartialEq)]
pub struct CellPatch {
    pub address: CellAddress,
    pub data_type: CellDataType,
    pub raw_value: String,
}

impl CellPatch {
    pub fn new(address: CellAddress, data_type: CellDataType, raw_value: String) -> Self {
        CellPatch {
            address,
            data_type,
            raw_value,
        }
    }
}

fn qualified(prefix: Option<&str>, local: &str) -> String {
    match prefix {
        Some(p) => format!("{}:{}", p, local),
        None => local.to_string(),
    }
}

fn value_markup(prefix: Option<&str>, patch: &CellPatch) -> String {
    let v = qualified(prefix, "v");
    format!("<{v}>{}</{v}>", patch.raw_value)
}

fn type_attribute(patch: &CellPatch) -> String {
    match patch.data_type.attribute() {
        Some(t) => format!(" t=\"{}\"", t),
        None => String::new(),
    }
}

/// Markup for a cell that did not exist before
fn new_cell(prefix: Option<&str>, patch: &CellPatch) -> String {
    let c = qualified(prefix, "c");
    format!(
        "<{c} r=\"{}\"{}>{}</{c}>",
        patch.address,
        type_attribute(patch),
        value_markup(prefix, patch)
    )
}

fn new_row(prefix: Option<&str>, patch: &CellPatch) -> String {
    let row = qualified(prefix, "row");
    format!(
        "<{row} r=\"{}\">{}</{row}>",
        patch.address.row(),
        new_cell(prefix, patch)
    )
}

/// Markup replacing an existing cell
///
/// Attributes other than `t` (style, metadata) are kept; the old value,
/// formula or inline string is dropped.
fn replacement_cell(e: &BytesStart<'_>, patch: &CellPatch) -> Result<String> {
    let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
    let prefix = element_prefix(e.name().as_ref());

    let mut out = format!("<{}", name);
    for (key, value) in raw_attributes(e)? {
        if key == "t" {
            continue;
        }
        out.push_str(&format!(" {}=\"{}\"", key, value));
    }
    out.push_str(&type_attribute(patch));
    out.push('>');
    out.push_str(&value_markup(prefix.as_deref(), patch));
    out.push_str(&format!("</{}>", name));
    Ok(out)
}

fn attribute_value(e: &BytesStart<'_>, key: &str) -> Result<Option<String>> {
    Ok(raw_attributes(e)?
        .into_iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v))
}

fn row_index(e: &BytesStart<'_>, previous: u32) -> Result<u32> {
    match attribute_value(e, "r")? {
        Some(r) => r
            .trim()
            .parse()
            .map_err(|_| ExcelError::ReadError(format!("invalid row index '{}'", r))),
        None => Ok(previous + 1),
    }
}

fn cell_address(e: &BytesStart<'_>, previous_col: u32, row: u32) -> Result<CellAddress> {
    match attribute_value(e, "r")? {
        Some(r) => CellAddress::parse(&r),
        None => Ok(CellAddress::new(previous_col + 1, row)),
    }
}

/// Write `patch` into the worksheet `xml`, creating the row and cell if needed
///
/// An existing cell at the address is rewritten in place, so applying the
/// same patch twice leaves a single cell.
pub fn upsert_cell(xml: &str, patch: &CellPatch) -> Result<String> {
    let mut reader = Reader::from_str(xml);
    loop {
        let start = position(&reader);
        match reader.read_event()? {
            Event::Empty(e) if local_name(e.name().as_ref()) == b"sheetData" => {
                let end = position(&reader);
                let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                let prefix = element_prefix(e.name().as_ref());
                let open = xml[start..end].trim_end_matches("/>").trim_end();
                let replacement = format!(
                    "{}>{}</{}>",
                    open,
                    new_row(prefix.as_deref(), patch),
                    name
                );
                log::debug!("inserted row {} into empty sheetData", patch.address.row());
                return Ok(splice(xml, start..end, &replacement));
            }
            Event::Start(e) if local_name(e.name().as_ref()) == b"sheetData" => {
                let prefix = element_prefix(e.name().as_ref());
                return patch_sheet_data(xml, &mut reader, prefix.as_deref(), patch);
            }
            Event::Eof => {
                return Err(ExcelError::ReadError(
                    "worksheet has no sheetData element".to_string(),
                ))
            }
            _ => {}
        }
    }
}

/// Rows are searched in full before a new one is placed, so a template with rows
/// out of order never gets a second row with the same index. A new row goes
/// before the first row with a higher index, or at the end of `sheetData`.
fn patch_sheet_data(
    xml: &str,
    reader: &mut Reader<&[u8]>,
    prefix: Option<&str>,
    patch: &CellPatch,
) -> Result<String> {
    let target_row = patch.address.row();
    let mut last_row = 0;
    let mut insert_at: Option<(usize, u32)> = None;

    loop {
        let start = position(reader);
        match reader.read_event()? {
            Event::Empty(e) if local_name(e.name().as_ref()) == b"row" => {
                let end = position(reader);
                let index = row_index(&e, last_row)?;
                last_row = index;

                if index == target_row {
                    let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                    let open = xml[start..end].trim_end_matches("/>").trim_end();
                    let replacement =
                        format!("{}>{}</{}>", open, new_cell(prefix, patch), name);
                    log::debug!("inserted cell {} into empty row", patch.address);
                    return Ok(splice(xml, start..end, &replacement));
                }
                if index > target_row && insert_at.is_none() {
                    insert_at = Some((start, index));
                }
            }
            Event::Start(e) if local_name(e.name().as_ref()) == b"row" => {
                let index = row_index(&e, last_row)?;
                last_row = index;

                if index == target_row {
                    return patch_row(xml, reader, prefix, patch);
                }
                if index > target_row && insert_at.is_none() {
                    insert_at = Some((start, index));
                }
                reader.read_to_end(e.name())?;
            }
            Event::End(e) if local_name(e.name().as_ref()) == b"sheetData" => {
                let at = match insert_at {
                    Some((at, before)) => {
                        log::debug!("inserted row {} before row {}", target_row, before);
                        at
                    }
                    None => {
                        log::debug!("appended row {}", target_row);
                        start
                    }
                };
                return Ok(splice(xml, at..at, &new_row(prefix, patch)));
            }
            Event::Eof => {
                return Err(ExcelError::ReadError(
                    "unterminated sheetData element".to_string(),
                ))
            }
            _ => {}
        }
    }
}

fn patch_row(
    xml: &str,
    reader: &mut Reader<&[u8]>,
    prefix: Option<&str>,
    patch: &CellPatch,
) -> Result<String> {
    let row = patch.address.row();
    let mut last_col = 0;
    let mut insert_at: Option<(usize, CellAddress)> = None;

    loop {
        let start = position(reader);
        match reader.read_event()? {
            Event::Start(e) if local_name(e.name().as_ref()) == b"c" => {
                let address = cell_address(&e, last_col, row)?;
                last_col = address.col();
                reader.read_to_end(e.name())?;
                let end = position(reader);

                if address == patch.address {
                    log::debug!("located cell {}", address);
                    return Ok(splice(xml, start..end, &replacement_cell(&e, patch)?));
                }
                if address > patch.address && insert_at.is_none() {
                    insert_at = Some((start, address));
                }
            }
            Event::Empty(e) if local_name(e.name().as_ref()) == b"c" => {
                let end = position(reader);
                let address = cell_address(&e, last_col, row)?;
                last_col = address.col();

                if address == patch.address {
                    log::debug!("located cell {}", address);
                    return Ok(splice(xml, start..end, &replacement_cell(&e, patch)?));
                }
                if address > patch.address && insert_at.is_none() {
                    insert_at = Some((start, address));
                }
            }
            Event::Start(e) => {
                reader.read_to_end(e.name())?;
            }
            Event::End(e) if local_name(e.name().as_ref()) == b"row" => {
                let at = match insert_at {
                    Some((at, before)) => {
                        log::debug!("inserted cell {} before {}", patch.address, before);
                        at
                    }
                    None => {
                        log::debug!("appended cell {}", patch.address);
                        start
                    }
                };
                return Ok(splice(xml, at..at, &new_cell(prefix, patch)));
            }
            Event::Eof => {
                return Err(ExcelError::ReadError(format!(
                    "unterminated row {}",
                    row
                )))
            }
            _ => {}
        }
    }
}
