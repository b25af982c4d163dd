//! Named-range patching of an existing workbook
//!
//! Every named range of the template that points at a single cell is matched
//! against a record field of the same name (ignoring case). The cell is
//! located, or created in address order, and written with the field's value.
//! Parts that are not touched are copied byte for byte.

pub mod defined_names;
pub mod package;
pub mod shared_strings;
pub mod worksheet;

use std::io::Cursor;
use std::ops::Range;

use indexmap::IndexMap;
use quick_xml::events::BytesStart;
use quick_xml::Reader;

use crate::error::{ExcelError, Result};
use crate::fast_writer::encoder::runtime_cell_value;
use crate::types::{FieldValue, Record};

pub use defined_names::{DefinedName, DefinedNameRef};
pub use shared_strings::SharedStringTable;
pub use worksheet::{upsert_cell, CellPatch};

use package::{
    add_content_type_override, add_relationship, find_workbook_part, open_archive,
    parse_relationships, parse_workbook, read_part, rels_part_for, require_part, resolve_target,
    write_package, SHARED_STRINGS_CONTENT_TYPE, SHARED_STRINGS_REL,
};

/// Patch `template` with the fields of `record` and return the new package
pub fn patch_template<R: Record + ?Sized>(record: &R, template: &[u8]) -> Result<Vec<u8>> {
    let mut archive = open_archive(template)?;

    let workbook_path = find_workbook_part(&mut archive)?;
    let workbook = parse_workbook(&require_part(&mut archive, &workbook_path)?)?;
    let rels_path = rels_part_for(&workbook_path);
    let rels_xml = require_part(&mut archive, &rels_path)?;
    let relationships = parse_relationships(&rels_xml)?;

    let shared_strings_path = relationships
        .iter()
        .find(|rel| rel.rel_type == SHARED_STRINGS_REL)
        .map(|rel| resolve_target(&workbook_path, &rel.target));
    let shared_strings_xml = match &shared_strings_path {
        Some(path) => read_part(&mut archive, path)?,
        None => None,
    };
    let mut strings = match &shared_strings_xml {
        Some(xml) => SharedStringTable::parse(xml)?,
        None => SharedStringTable::empty(),
    };

    let groups = defined_names::group_by_sheet(defined_names::resolve(&workbook.defined_names));
    log::debug!(
        "template has {} sheets, {} cell names on {} sheets",
        workbook.sheets.len(),
        groups.values().map(Vec::len).sum::<usize>(),
        groups.len()
    );

    let mut replaced: IndexMap<String, Vec<u8>> = IndexMap::new();
    let mut added: IndexMap<String, Vec<u8>> = IndexMap::new();

    for (sheet_name, names) in &groups {
        let sheet = workbook
            .sheets
            .iter()
            .find(|sheet| &sheet.name == sheet_name)
            .ok_or_else(|| ExcelError::SheetNotFound(sheet_name.clone()))?;
        let target = relationships
            .iter()
            .find(|rel| rel.id == sheet.relationship_id)
            .ok_or_else(|| {
                ExcelError::MissingPart(format!(
                    "relationship {} for sheet '{}'",
                    sheet.relationship_id, sheet_name
                ))
            })?;
        let sheet_path = resolve_target(&workbook_path, &target.target);

        let mut xml = require_part(&mut archive, &sheet_path)?;
        let mut changed = false;
        for name in names {
            let Some(value) = field_value(record, &name.name) else {
                continue;
            };
            let (data_type, raw_value) = runtime_cell_value(&value, &mut strings)?;
            xml = upsert_cell(&xml, &CellPatch::new(name.address, data_type, raw_value))?;
            changed = true;
        }

        if changed {
            replaced.insert(sheet_path, xml.into_bytes());
        }
    }

    if strings.is_referenced() {
        match (shared_strings_path, shared_strings_xml) {
            (Some(path), Some(xml)) => {
                replaced.insert(path, strings.apply(&xml)?.into_bytes());
            }
            (existing_path, _) => {
                let path = match existing_path {
                    Some(path) => path,
                    None => {
                        let (rels, id) =
                            add_relationship(&rels_xml, SHARED_STRINGS_REL, "sharedStrings.xml")?;
                        log::debug!("registered shared strings as {}", id);
                        replaced.insert(rels_path.clone(), rels.into_bytes());
                        resolve_target(&workbook_path, "sharedStrings.xml")
                    }
                };

                let content_types = require_part(&mut archive, "[Content_Types].xml")?;
                let content_types =
                    add_content_type_override(&content_types, &path, SHARED_STRINGS_CONTENT_TYPE)?;
                replaced.insert("[Content_Types].xml".to_string(), content_types.into_bytes());

                let part = strings.to_new_part()?;
                if archive.file_names().any(|name| name == path) {
                    replaced.insert(path, part);
                } else {
                    added.insert(path, part);
                }
            }
        }
    }

    let output = write_package(&mut archive, Cursor::new(Vec::new()), &replaced, &added)?;
    log::debug!(
        "template patched: {} parts rewritten, {} added",
        replaced.len(),
        added.len()
    );
    Ok(output.into_inner())
}

/// Record value for a named range, matching the field name case-insensitively
fn field_value<R: Record + ?Sized>(record: &R, name: &str) -> Option<FieldValue> {
    let wanted = name.to_lowercase();
    let names = record.field_names();
    let Some(field) = names.iter().find(|field| field.to_lowercase() == wanted) else {
        log::warn!("no record field matches named range '{}'", name);
        return None;
    };

    let value = record.field_value(field);
    if value.is_none() {
        log::debug!("field '{}' is null, leaving '{}' untouched", field, name);
    }
    value
}

pub(crate) fn local_name(name: &[u8]) -> &[u8] {
    match name.iter().rposition(|b| *b == b':') {
        Some(idx) => &name[idx + 1..],
        None => name,
    }
}

pub(crate) fn element_prefix(name: &[u8]) -> Option<String> {
    name.iter()
        .rposition(|b| *b == b':')
        .map(|idx| String::from_utf8_lossy(&name[..idx]).into_owned())
}

/// Byte offset of the reader in its input
pub(crate) fn position(reader: &Reader<&[u8]>) -> usize {
    reader.buffer_position() as usize
}

/// Attributes in document order with their values still escaped
pub(crate) fn raw_attributes(e: &BytesStart<'_>) -> Result<Vec<(String, String)>> {
    let mut attributes = Vec::new();
    for attr in e.attributes() {
        let attr = attr?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = String::from_utf8_lossy(&attr.value).replace('"', "&quot;");
        attributes.push((key, value));
    }
    Ok(attributes)
}

/// Replace `range` of `text` with `replacement`
pub(crate) fn splice(text: &str, range: Range<usize>, replacement: &str) -> String {
    let mut out = String::with_capacity(text.len() + replacement.len());
    out.push_str(&text[..range.start]);
    out.push_str(replacement);
    out.push_str(&text[range.end..]);
    out
}
