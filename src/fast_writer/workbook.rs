//! Workbook assembly
//!
//! A build moves through `Empty -> StylesBuilt -> ContentBuilt` and ends when
//! the document is packaged. Each phase is its own type, so cells can only be
//! encoded once the style table is final, and the package can only be written
//! once every shared string has been interned.

use std::fs::File;
use std::io::{BufWriter, Cursor, Seek, Write};
use std::path::Path;

use chrono::{SecondsFormat, Utc};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

use super::encoder::{encode_header, encode_record, write_row};
use super::shared_strings::SharedStrings;
use super::styles::StyleTable;
use super::xml_writer::XmlWriter;
use crate::address::CellAddress;
use crate::error::{ExcelError, Result};
use crate::schema::ColumnSchema;
use crate::types::{Record, Row};

const SPREADSHEETML_NS: &str = "http://schemas.openxmlformats.org/spreadsheetml/2006/main";
const RELATIONSHIPS_NS: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships";

/// Options applied when the package is written
#[derive(Debug, Clone, PartialEq)]
pub struct WriterOptions {
    /// Deflate level (0-9); `None` uses the zip crate default
    pub compression_level: Option<i64>,
    /// Application name recorded in the document properties
    pub application: String,
}

impl Default for WriterOptions {
    fn default() -> Self {
        WriterOptions {
            compression_level: Some(6),
            application: "excelgen".to_string(),
        }
    }
}

/// Build phase: nothing computed yet
#[derive(Debug)]
pub struct Empty;

/// Build phase: style table final, per-column style slots assigned
#[derive(Debug)]
pub struct StylesBuilt {
    styles: StyleTable,
}

/// Build phase: header and data rows encoded, shared strings complete
#[derive(Debug)]
pub struct ContentBuilt {
    styles: StyleTable,
    shared_strings: SharedStrings,
    rows: Vec<Row>,
}

/// A single-sheet document under construction
#[derive(Debug)]
pub struct Document<S> {
    sheet_name: String,
    schema: ColumnSchema,
    state: S,
}

/// Reject names spreadsheet applications refuse to open
fn validate_sheet_name(name: &str) -> Result<()> {
    const FORBIDDEN: &[char] = &['[', ']', ':', '*', '?', '/', '\\'];

    if name.is_empty() || name.chars().count() > 31 {
        return Err(ExcelError::WriteError(format!(
            "sheet name '{}' must be 1 to 31 characters long",
            name
        )));
    }
    if name.contains(FORBIDDEN) || name.starts_with('\'') || name.ends_with('\'') {
        return Err(ExcelError::WriteError(format!(
            "sheet name '{}' contains characters that are not allowed",
            name
        )));
    }
    Ok(())
}

impl Document<Empty> {
    /// Start a build of `schema` into a sheet called `sheet_name`
    pub fn new(schema: ColumnSchema, sheet_name: &str) -> Result<Self> {
        validate_sheet_name(sheet_name)?;
        Ok(Document {
            sheet_name: sheet_name.to_string(),
            schema,
            state: Empty,
        })
    }

    /// Run the style table builder over the schema
    pub fn build_styles(self) -> Document<StylesBuilt> {
        let styles = StyleTable::build(&self.schema);
        log::debug!(
            "styles built: {} cell formats, {} custom number formats",
            styles.cell_formats().len(),
            styles.custom_formats().count()
        );

        Document {
            sheet_name: self.sheet_name,
            schema: self.schema,
            state: StylesBuilt { styles },
        }
    }
}

impl Document<StylesBuilt> {
    /// Finalized style table
    pub fn styles(&self) -> &StyleTable {
        &self.state.styles
    }

    /// Encode the header row and one data row per record
    pub fn build_content<R, I>(self, records: I) -> Result<Document<ContentBuilt>>
    where
        R: Record,
        I: IntoIterator<Item = R>,
    {
        let mut shared_strings = SharedStrings::new();
        let mut rows = vec![encode_header(&self.schema, &mut shared_strings)];

        let mut row_index: u32 = 1;
        for record in records {
            row_index += 1;
            rows.push(encode_record(
                &record,
                row_index,
                &self.schema,
                &self.state.styles,
                &mut shared_strings,
            )?);
        }

        log::debug!(
            "content built: {} rows, {} shared strings",
            rows.len(),
            shared_strings.len()
        );

        Ok(Document {
            sheet_name: self.sheet_name,
            schema: self.schema,
            state: ContentBuilt {
                styles: self.state.styles,
                shared_strings,
                rows,
            },
        })
    }
}

impl Document<ContentBuilt> {
    /// Final shared string table
    pub fn shared_strings(&self) -> &SharedStrings {
        &self.state.shared_strings
    }

    /// Encoded rows, header first
    pub fn rows(&self) -> &[Row] {
        &self.state.rows
    }

    /// Finalized style table
    pub fn styles(&self) -> &StyleTable {
        &self.state.styles
    }

    /// Write the package into `output` and return it
    ///
    /// Shared strings and styles are persisted before the worksheet that
    /// references them, and the workbook metadata comes last.
    pub fn package_with<W: Write + Seek>(self, output: W, options: &WriterOptions) -> Result<W> {
        let mut zip = ZipWriter::new(output);
        let file_options = FileOptions::<()>::default()
            .compression_method(CompressionMethod::Deflated)
            .compression_level(options.compression_level);

        zip.start_file("[Content_Types].xml", file_options)?;
        write_content_types(&mut zip)?;

        zip.start_file("_rels/.rels", file_options)?;
        write_root_rels(&mut zip)?;

        zip.start_file("xl/sharedStrings.xml", file_options)?;
        self.state
            .shared_strings
            .write_xml(&mut XmlWriter::new(&mut zip))?;

        zip.start_file("xl/styles.xml", file_options)?;
        self.state.styles.write_xml(&mut XmlWriter::new(&mut zip))?;

        zip.start_file("xl/worksheets/sheet1.xml", file_options)?;
        self.write_worksheet(&mut XmlWriter::with_capacity(&mut zip, 64 * 1024))?;

        zip.start_file("xl/workbook.xml", file_options)?;
        self.write_workbook_xml(&mut XmlWriter::new(&mut zip))?;

        zip.start_file("xl/_rels/workbook.xml.rels", file_options)?;
        write_workbook_rels(&mut zip)?;

        zip.start_file("docProps/core.xml", file_options)?;
        write_core_props(&mut XmlWriter::new(&mut zip), &options.application)?;

        zip.start_file("docProps/app.xml", file_options)?;
        write_app_props(&mut XmlWriter::new(&mut zip), &options.application)?;

        let output = zip.finish()?;
        log::debug!("packaged sheet '{}'", self.sheet_name);
        Ok(output)
    }

    /// Package into an in-memory buffer with default options
    pub fn package(self) -> Result<Vec<u8>> {
        self.to_bytes(&WriterOptions::default())
    }

    /// Package into an in-memory buffer
    pub fn to_bytes(self, options: &WriterOptions) -> Result<Vec<u8>> {
        let cursor = self.package_with(Cursor::new(Vec::with_capacity(64 * 1024)), options)?;
        Ok(cursor.into_inner())
    }

    /// Package straight into a new file at `path`
    pub fn to_file<P: AsRef<Path>>(self, path: P, options: &WriterOptions) -> Result<()> {
        let file = File::create(path)?;
        let writer = BufWriter::with_capacity(64 * 1024, file);
        let mut writer = self.package_with(writer, options)?;
        writer.flush()?;
        Ok(())
    }

    fn dimension(&self) -> String {
        let last_row = self.state.rows.last().map(|r| r.index).unwrap_or(1);
        let last_col = self.schema.column_count().max(1);
        format!("A1:{}", CellAddress::new(last_col, last_row))
    }

    fn write_worksheet<W: Write>(&self, writer: &mut XmlWriter<W>) -> Result<()> {
        writer.declaration()?;
        writer.start_element("worksheet")?;
        writer.attribute("xmlns", SPREADSHEETML_NS)?;
        writer.attribute("xmlns:r", RELATIONSHIPS_NS)?;
        writer.close_start_tag()?;

        writer.start_element("dimension")?;
        writer.attribute("ref", &self.dimension())?;
        writer.close_empty_tag()?;

        writer.start_element("sheetData")?;
        writer.close_start_tag()?;
        for row in &self.state.rows {
            write_row(writer, row)?;
        }
        writer.end_element("sheetData")?;

        writer.end_element("worksheet")?;
        writer.flush()
    }

    fn write_workbook_xml<W: Write>(&self, writer: &mut XmlWriter<W>) -> Result<()> {
        writer.declaration()?;
        writer.start_element("workbook")?;
        writer.attribute("xmlns", SPREADSHEETML_NS)?;
        writer.attribute("xmlns:r", RELATIONSHIPS_NS)?;
        writer.close_start_tag()?;

        writer.write_str("<fileVersion appName=\"xl\"/>")?;

        writer.start_element("sheets")?;
        writer.close_start_tag()?;
        writer.start_element("sheet")?;
        writer.attribute("name", &self.sheet_name)?;
        writer.attribute_u32("sheetId", 1)?;
        writer.attribute("r:id", "rId1")?;
        writer.close_empty_tag()?;
        writer.end_element("sheets")?;

        writer.end_element("workbook")?;
        writer.flush()
    }
}

fn write_content_types<W: Write>(writer: &mut W) -> Result<()> {
    let xml = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">
<Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>
<Default Extension="xml" ContentType="application/xml"/>
<Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/>
<Override PartName="/xl/worksheets/sheet1.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/>
<Override PartName="/xl/styles.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.styles+xml"/>
<Override PartName="/xl/sharedStrings.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sharedStrings+xml"/>
<Override PartName="/docProps/core.xml" ContentType="application/vnd.openxmlformats-package.core-properties+xml"/>
<Override PartName="/docProps/app.xml" ContentType="application/vnd.openxmlformats-officedocument.extended-properties+xml"/>
</Types>"#;
    writer.write_all(xml.as_bytes())?;
    Ok(())
}

fn write_root_rels<W: Write>(writer: &mut W) -> Result<()> {
    let xml = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/>
<Relationship Id="rId2" Type="http://schemas.openxmlformats.org/package/2006/relationships/metadata/core-properties" Target="docProps/core.xml"/>
<Relationship Id="rId3" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/extended-properties" Target="docProps/app.xml"/>
</Relationships>"#;
    writer.write_all(xml.as_bytes())?;
    Ok(())
}

fn write_workbook_rels<W: Write>(writer: &mut W) -> Result<()> {
    let xml = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/>
<Relationship Id="rId2" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles" Target="styles.xml"/>
<Relationship Id="rId3" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/sharedStrings" Target="sharedStrings.xml"/>
</Relationships>"#;
    writer.write_all(xml.as_bytes())?;
    Ok(())
}

fn write_core_props<W: Write>(writer: &mut XmlWriter<W>, application: &str) -> Result<()> {
    let now = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);

    writer.declaration()?;
    writer.write_str(concat!(
        "<cp:coreProperties",
        " xmlns:cp=\"http://schemas.openxmlformats.org/package/2006/metadata/core-properties\"",
        " xmlns:dc=\"http://purl.org/dc/elements/1.1/\"",
        " xmlns:dcterms=\"http://purl.org/dc/terms/\"",
        " xmlns:xsi=\"http://www.w3.org/2001/XMLSchema-instance\">",
    ))?;
    writer.text_element("dc:creator", application)?;
    writer.write_str("<dcterms:created xsi:type=\"dcterms:W3CDTF\">")?;
    writer.write_str(&now)?;
    writer.write_str("</dcterms:created><dcterms:modified xsi:type=\"dcterms:W3CDTF\">")?;
    writer.write_str(&now)?;
    writer.write_str("</dcterms:modified></cp:coreProperties>")?;
    writer.flush()
}

fn write_app_props<W: Write>(writer: &mut XmlWriter<W>, application: &str) -> Result<()> {
    writer.declaration()?;
    writer.write_str(
        "<Properties xmlns=\"http://schemas.openxmlformats.org/officeDocument/2006/extended-properties\">",
    )?;
    writer.text_element("Application", application)?;
    writer.write_str("<DocSecurity>0</DocSecurity><ScaleCrop>false</ScaleCrop>")?;
    writer.write_str("</Properties>")?;
    writer.flush()
}
