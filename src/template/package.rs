//! Template package access: parts, relationships and the rewritten zip

use std::io::{Cursor, Read, Seek, Write};

use indexmap::IndexMap;
use quick_xml::events::Event;
use quick_xml::Reader;
use zip::result::ZipError;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use super::defined_names::DefinedName;
use super::{local_name, position, raw_attributes, splice};
use crate::error::{ExcelError, Result};

pub const OFFICE_DOCUMENT_REL: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument";
pub const SHARED_STRINGS_REL: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/sharedStrings";
pub const SHARED_STRINGS_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sharedStrings+xml";

const DEFAULT_WORKBOOK_PART: &str = "xl/workbook.xml";

/// One `<Relationship>` of a `.rels` part
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relationship {
    pub id: String,
    pub rel_type: String,
    pub target: String,
    pub external: bool,
}

/// A `<sheet>` entry of the workbook part
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetEntry {
    pub name: String,
    pub relationship_id: String,
}

/// What the patcher needs from the workbook part
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkbookPart {
    pub sheets: Vec<SheetEntry>,
    pub defined_names: Vec<DefinedName>,
}

/// Read a part as UTF-8 text, `None` when the entry does not exist
pub fn read_part<R: Read + Seek>(archive: &mut ZipArchive<R>, name: &str) -> Result<Option<String>> {
    let mut file = match archive.by_name(name) {
        Ok(file) => file,
        Err(ZipError::FileNotFound) => return Ok(None),
        Err(err) => return Err(err.into()),
    };
    let mut buf = Vec::with_capacity(file.size() as usize);
    file.read_to_end(&mut buf)?;
    let text = String::from_utf8(buf)
        .map_err(|_| ExcelError::ReadError(format!("{} is not valid UTF-8", name)))?;
    Ok(Some(text))
}

/// Read a part that must exist
pub fn require_part<R: Read + Seek>(archive: &mut ZipArchive<R>, name: &str) -> Result<String> {
    read_part(archive, name)?.ok_or_else(|| ExcelError::MissingPart(name.to_string()))
}

/// Relationship part that belongs to `part`, e.g. `xl/_rels/workbook.xml.rels`
pub fn rels_part_for(part: &str) -> String {
    match part.rsplit_once('/') {
        Some((dir, file)) => format!("{}/_rels/{}.rels", dir, file),
        None => format!("_rels/{}.rels", part),
    }
}

/// Resolve a relationship target against the part that owns it
pub fn resolve_target(source_part: &str, target: &str) -> String {
    if let Some(absolute) = target.strip_prefix('/') {
        return absolute.to_string();
    }

    let mut segments: Vec<&str> = match source_part.rsplit_once('/') {
        Some((dir, _)) => dir.split('/').collect(),
        None => Vec::new(),
    };
    for segment in target.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }
    segments.join("/")
}

/// Parse the relationships of a `.rels` part
pub fn parse_relationships(xml: &str) -> Result<Vec<Relationship>> {
    let mut reader = Reader::from_str(xml);
    let mut relationships = Vec::new();

    loop {
        match reader.read_event()? {
            Event::Start(e) | Event::Empty(e)
                if local_name(e.name().as_ref()) == b"Relationship" =>
            {
                let mut relationship = Relationship {
                    id: String::new(),
                    rel_type: String::new(),
                    target: String::new(),
                    external: false,
                };
                for attr in e.attributes() {
                    let attr = attr?;
                    let value = attr.unescape_value()?.into_owned();
                    match attr.key.as_ref() {
                        b"Id" => relationship.id = value,
                        b"Type" => relationship.rel_type = value,
                        b"Target" => relationship.target = value,
                        b"TargetMode" => relationship.external = value == "External",
                        _ => {}
                    }
                }
                relationships.push(relationship);
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(relationships)
}

/// Locate the workbook part through the package relationships
pub fn find_workbook_part<R: Read + Seek>(archive: &mut ZipArchive<R>) -> Result<String> {
    if let Some(rels) = read_part(archive, "_rels/.rels")? {
        let office_document = parse_relationships(&rels)?
            .into_iter()
            .find(|rel| rel.rel_type == OFFICE_DOCUMENT_REL && !rel.external);
        if let Some(rel) = office_document {
            return Ok(resolve_target("", &rel.target));
        }
    }
    Ok(DEFAULT_WORKBOOK_PART.to_string())
}

/// Parse sheets and defined names out of the workbook part
pub fn parse_workbook(xml: &str) -> Result<WorkbookPart> {
    let mut reader = Reader::from_str(xml);
    let mut workbook = WorkbookPart::default();
    let mut current_name: Option<DefinedName> = None;

    loop {
        match reader.read_event()? {
            Event::Start(e) | Event::Empty(e) if local_name(e.name().as_ref()) == b"sheet" => {
                let mut name = None;
                let mut relationship_id = None;
                for attr in e.attributes() {
                    let attr = attr?;
                    match local_name(attr.key.as_ref()) {
                        b"name" => name = Some(attr.unescape_value()?.into_owned()),
                        // r:id, whatever the relationships prefix is called
                        b"id" if attr.key.as_ref() != b"id" => {
                            relationship_id = Some(attr.unescape_value()?.into_owned())
                        }
                        _ => {}
                    }
                }
                if let (Some(name), Some(relationship_id)) = (name, relationship_id) {
                    workbook.sheets.push(SheetEntry {
                        name,
                        relationship_id,
                    });
                }
            }
            Event::Start(e) if local_name(e.name().as_ref()) == b"definedName" => {
                let mut name = None;
                let mut local_sheet_id = None;
                for attr in e.attributes() {
                    let attr = attr?;
                    match attr.key.as_ref() {
                        b"name" => name = Some(attr.unescape_value()?.into_owned()),
                        b"localSheetId" => {
                            local_sheet_id = attr.unescape_value()?.trim().parse::<u32>().ok()
                        }
                        _ => {}
                    }
                }
                current_name = name.map(|name| DefinedName {
                    name,
                    local_sheet_id,
                    refers_to: String::new(),
                });
            }
            Event::Text(e) => {
                if let Some(defined) = current_name.as_mut() {
                    defined.refers_to.push_str(&e.unescape()?);
                }
            }
            Event::End(e) if local_name(e.name().as_ref()) == b"definedName" => {
                if let Some(defined) = current_name.take() {
                    workbook.defined_names.push(defined);
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(workbook)
}

/// Register an `<Override>` for `part_name` unless one exists
pub fn add_content_type_override(xml: &str, part_name: &str, content_type: &str) -> Result<String> {
    let part_name = format!("/{}", part_name.trim_start_matches('/'));
    let mut reader = Reader::from_str(xml);

    loop {
        let start = position(&reader);
        match reader.read_event()? {
            Event::Start(e) | Event::Empty(e) if local_name(e.name().as_ref()) == b"Override" => {
                let existing = raw_attributes(&e)?
                    .into_iter()
                    .any(|(key, value)| key == "PartName" && value.eq_ignore_ascii_case(&part_name));
                if existing {
                    return Ok(xml.to_string());
                }
            }
            Event::End(e) if local_name(e.name().as_ref()) == b"Types" => {
                let entry = format!(
                    "<Override PartName=\"{}\" ContentType=\"{}\"/>",
                    part_name, content_type
                );
                return Ok(splice(xml, start..start, &entry));
            }
            Event::Eof => {
                return Err(ExcelError::ReadError(
                    "[Content_Types].xml has no closing Types element".to_string(),
                ))
            }
            _ => {}
        }
    }
}

/// Append a relationship and return the new part text with the id used
pub fn add_relationship(xml: &str, rel_type: &str, target: &str) -> Result<(String, String)> {
    let used: Vec<String> = parse_relationships(xml)?
        .into_iter()
        .map(|rel| rel.id)
        .collect();
    let mut next = used.len() + 1;
    let id = loop {
        let candidate = format!("rId{}", next);
        if !used.contains(&candidate) {
            break candidate;
        }
        next += 1;
    };

    let mut reader = Reader::from_str(xml);
    loop {
        let start = position(&reader);
        match reader.read_event()? {
            Event::End(e) if local_name(e.name().as_ref()) == b"Relationships" => {
                let entry = format!(
                    "<Relationship Id=\"{}\" Type=\"{}\" Target=\"{}\"/>",
                    id, rel_type, target
                );
                return Ok((splice(xml, start..start, &entry), id));
            }
            Event::Empty(e) if local_name(e.name().as_ref()) == b"Relationships" => {
                let end = position(&reader);
                let open = xml[start..end].trim_end_matches("/>").trim_end();
                let entry = format!(
                    "{}><Relationship Id=\"{}\" Type=\"{}\" Target=\"{}\"/></Relationships>",
                    open, id, rel_type, target
                );
                return Ok((splice(xml, start..end, &entry), id));
            }
            Event::Eof => {
                return Err(ExcelError::ReadError(
                    "relationship part has no closing Relationships element".to_string(),
                ))
            }
            _ => {}
        }
    }
}

/// Copy the template into a new package
///
/// Entries in `replaced` are rewritten, `added` entries are appended at the
/// end, and every other entry is raw-copied without recompression.
pub fn write_package<R: Read + Seek, W: Write + Seek>(
    archive: &mut ZipArchive<R>,
    output: W,
    replaced: &IndexMap<String, Vec<u8>>,
    added: &IndexMap<String, Vec<u8>>,
) -> Result<W> {
    let mut zip = ZipWriter::new(output);
    let options = FileOptions::<()>::default().compression_method(CompressionMethod::Deflated);

    for i in 0..archive.len() {
        let file = archive.by_index(i)?;
        let name = file.name().to_string();

        match replaced.get(&name) {
            Some(bytes) => {
                drop(file);
                zip.start_file(name.as_str(), options)?;
                zip.write_all(bytes)?;
            }
            None => zip.raw_copy_file(file)?,
        }
    }

    for (name, bytes) in added {
        zip.start_file(name.as_str(), options)?;
        zip.write_all(bytes)?;
    }

    Ok(zip.finish()?)
}

/// Open template bytes as a zip archive
pub fn open_archive(bytes: &[u8]) -> Result<ZipArchive<Cursor<&[u8]>>> {
    Ok(ZipArchive::new(Cursor::new(bytes))?)
}
