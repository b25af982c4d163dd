//! Integration tests for excelgen

use std::io::{Cursor, Read, Write};

use excelgen::{
    build_file_from_collection, build_from_collection, build_from_collection_with,
    patch_file_from_template, patch_from_template, patch_template_bytes, ColumnSchema,
    ExcelError, FieldKind, FieldValue, WriterOptions,
};
use indexmap::IndexMap;
use quick_xml::events::Event;
use quick_xml::Reader;
use tempfile::NamedTempFile;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

type Fields = IndexMap<String, Option<FieldValue>>;

fn product(name: &str, price: Option<f64>, discount: f32) -> Fields {
    let mut fields = Fields::new();
    fields.insert("Name".to_string(), Some(name.into()));
    fields.insert("Price".to_string(), price.map(FieldValue::from));
    fields.insert("Discount".to_string(), Some(discount.into()));
    fields
}

fn product_schema() -> ColumnSchema {
    ColumnSchema::builder()
        .column("Name", "Name", 1)
        .kind(FieldKind::Text)
        .column("Price", "Price", 3)
        .number_format_code("#,##0.00")
        .column("Discount", "Discount", 2)
        .build()
        .unwrap()
}

fn read_part(bytes: &[u8], name: &str) -> String {
    let mut archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
    let mut file = archive.by_name(name).unwrap();
    let mut xml = String::new();
    file.read_to_string(&mut xml).unwrap();
    xml
}

/// Cell references of `row`, in document order
fn cell_refs(sheet_xml: &str, row: u32) -> Vec<String> {
    let mut reader = Reader::from_str(sheet_xml);
    let mut refs = Vec::new();
    let mut current_row = None;

    loop {
        match reader.read_event().unwrap() {
            Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"row" => {
                current_row = e
                    .try_get_attribute("r")
                    .unwrap()
                    .map(|a| a.unescape_value().unwrap().parse::<u32>().unwrap());
            }
            Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"c" => {
                if current_row == Some(row) {
                    let r = e.try_get_attribute("r").unwrap().unwrap();
                    refs.push(r.unescape_value().unwrap().into_owned());
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }
    refs
}

/// Shared strings in index order
fn shared_strings(sst_xml: &str) -> Vec<String> {
    let mut reader = Reader::from_str(sst_xml);
    let mut strings = Vec::new();
    let mut in_text = false;

    loop {
        match reader.read_event().unwrap() {
            Event::Start(e) if e.local_name().as_ref() == b"si" => strings.push(String::new()),
            Event::Start(e) if e.local_name().as_ref() == b"t" => in_text = true,
            Event::End(e) if e.local_name().as_ref() == b"t" => in_text = false,
            Event::Text(e) if in_text => {
                if let Some(last) = strings.last_mut() {
                    last.push_str(&e.unescape().unwrap());
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }
    strings
}

#[test]
fn test_collection_end_to_end() {
    let records = vec![
        product("ABC", Some(6000.85), 0.1),
        product("DEF", Some(12.5), 0.0),
        product("123", None, 0.22),
    ];

    let bytes = build_from_collection(&records, &product_schema(), "Products").unwrap();

    let sst = read_part(&bytes, "xl/sharedStrings.xml");
    let strings = shared_strings(&sst);
    assert_eq!(&strings[..3], &["Name", "Discount", "Price"]);

    let sheet = read_part(&bytes, "xl/worksheets/sheet1.xml");
    assert_eq!(cell_refs(&sheet, 1), vec!["A1", "B1", "C1"]);
    assert_eq!(cell_refs(&sheet, 2), vec!["A2", "B2", "C2"]);
    assert_eq!(cell_refs(&sheet, 4), vec!["A4", "B4"]);
    assert!(sheet.contains(r#"<row r="4" spans="1:3">"#));

    let workbook = read_part(&bytes, "xl/workbook.xml");
    assert!(workbook.contains(r#"name="Products""#));
}

#[test]
fn test_collection_to_file() {
    let temp = NamedTempFile::new().unwrap();
    let records = vec![product("ABC", Some(1.0), 0.5)];

    build_file_from_collection(records, &product_schema(), "Products", temp.path()).unwrap();

    let bytes = std::fs::read(temp.path()).unwrap();
    let sheet = read_part(&bytes, "xl/worksheets/sheet1.xml");
    assert_eq!(cell_refs(&sheet, 2), vec!["A2", "B2", "C2"]);
}

#[test]
fn test_collection_with_options() {
    let options = WriterOptions {
        compression_level: Some(1),
        application: "Report Server".to_string(),
    };
    let bytes =
        build_from_collection_with(Vec::<Fields>::new(), &product_schema(), "Empty", &options)
            .unwrap();

    let app = read_part(&bytes, "docProps/app.xml");
    assert!(app.contains("<Application>Report Server</Application>"));
    let sheet = read_part(&bytes, "xl/worksheets/sheet1.xml");
    assert_eq!(cell_refs(&sheet, 1).len(), 3);
    assert!(cell_refs(&sheet, 2).is_empty());
}

#[test]
fn test_dates_and_booleans() {
    let schema = ColumnSchema::builder()
        .column("shipped", "Shipped", 1)
        .number_format_id(14)
        .column("paid", "Paid", 2)
        .kind(FieldKind::Boolean)
        .build()
        .unwrap();

    let mut order: IndexMap<String, FieldValue> = IndexMap::new();
    order.insert(
        "shipped".to_string(),
        chrono::NaiveDate::from_ymd_opt(2024, 1, 1).unwrap().into(),
    );
    order.insert("paid".to_string(), true.into());

    let bytes = build_from_collection(vec![order], &schema, "Orders").unwrap();
    let sheet = read_part(&bytes, "xl/worksheets/sheet1.xml");
    assert!(sheet.contains(r#"<c r="A2" s="1" t="n"><v>45292</v></c>"#));
    assert!(sheet.contains(r#"<c r="B2" t="b"><v>1</v></c>"#));

    let styles = read_part(&bytes, "xl/styles.xml");
    assert!(styles.contains(r#"numFmtId="14""#));
}

#[test]
fn test_date_overflow_aborts_build() {
    let schema = ColumnSchema::builder()
        .column("when", "When", 1)
        .kind(FieldKind::DateTime)
        .build()
        .unwrap();
    let mut record: IndexMap<String, FieldValue> = IndexMap::new();
    record.insert(
        "when".to_string(),
        chrono::NaiveDate::from_ymd_opt(50, 6, 1).unwrap().into(),
    );

    let result = build_from_collection(vec![record], &schema, "Dates");
    assert!(matches!(result, Err(ExcelError::DateOverflow(_))));
}

const SUMMARY_SHEET: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><dimension ref="A1:E5"/><sheetData><row r="1"><c r="A1" t="s"><v>0</v></c></row><row r="5"><c r="C5" t="s"><v>1</v></c><c r="E5"><v>3</v></c></row></sheetData><pageMargins left="0.7" right="0.7" top="0.75" bottom="0.75" header="0.3" footer="0.3"/></worksheet>"#;

const STYLES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<styleSheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><cellXfs count="1"><xf numFmtId="0" fontId="0" fillId="0" borderId="0" xfId="0"/></cellXfs></styleSheet>"#;

fn summary_template(defined_names: &str) -> Vec<u8> {
    let workbook = format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><sheets><sheet name="Summary" sheetId="1" r:id="rId1"/></sheets><definedNames>{}</definedNames></workbook>"#,
        defined_names
    );
    let parts: Vec<(&str, String)> = vec![
        (
            "[Content_Types].xml",
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/><Override PartName="/xl/worksheets/sheet1.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/><Override PartName="/xl/styles.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.styles+xml"/><Override PartName="/xl/sharedStrings.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sharedStrings+xml"/></Types>"#.to_string(),
        ),
        (
            "_rels/.rels",
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/></Relationships>"#.to_string(),
        ),
        ("xl/workbook.xml", workbook),
        (
            "xl/_rels/workbook.xml.rels",
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/><Relationship Id="rId2" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles" Target="styles.xml"/><Relationship Id="rId3" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/sharedStrings" Target="sharedStrings.xml"/></Relationships>"#.to_string(),
        ),
        ("xl/worksheets/sheet1.xml", SUMMARY_SHEET.to_string()),
        ("xl/styles.xml", STYLES.to_string()),
        (
            "xl/sharedStrings.xml",
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<sst xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" count="2" uniqueCount="2"><si><t>Quarterly summary</t></si><si><t>Subtotal</t></si></sst>"#.to_string(),
        ),
    ];

    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options = FileOptions::<()>::default().compression_method(CompressionMethod::Deflated);
    for (name, xml) in parts {
        zip.start_file(name, options).unwrap();
        zip.write_all(xml.as_bytes()).unwrap();
    }
    zip.finish().unwrap().into_inner()
}

fn write_template(bytes: &[u8]) -> NamedTempFile {
    let mut temp = NamedTempFile::new().unwrap();
    temp.write_all(bytes).unwrap();
    temp.flush().unwrap();
    temp
}

fn totals(total: f64) -> IndexMap<String, FieldValue> {
    let mut record = IndexMap::new();
    record.insert("total".to_string(), FieldValue::from(total));
    record
}

#[test]
fn test_template_creates_named_cell_in_order() {
    let template = summary_template(r#"<definedName name="Total">Summary!$D$5</definedName>"#);
    let file = write_template(&template);

    let output = patch_from_template(&totals(1250.5), file.path()).unwrap();
    let sheet = read_part(&output, "xl/worksheets/sheet1.xml");

    assert_eq!(cell_refs(&sheet, 5), vec!["C5", "D5", "E5"]);
    assert!(sheet.contains(r#"<c r="D5" t="n"><v>1250.5</v></c>"#));

    // Template on disk is unchanged
    assert_eq!(std::fs::read(file.path()).unwrap(), template);
}

#[test]
fn test_template_repatch_does_not_duplicate() {
    let template = summary_template(r#"<definedName name="Total">Summary!$D$5</definedName>"#);

    let first = patch_template_bytes(&totals(10.0), &template).unwrap();
    let second = patch_template_bytes(&totals(20.0), &first).unwrap();

    let sheet = read_part(&second, "xl/worksheets/sheet1.xml");
    assert_eq!(cell_refs(&sheet, 5), vec!["C5", "D5", "E5"]);
    assert!(sheet.contains(r#"<c r="D5" t="n"><v>20</v></c>"#));
}

#[test]
fn test_template_untouched_parts_are_identical() {
    let template = summary_template(r#"<definedName name="Total">Summary!$D$5</definedName>"#);
    let output = patch_template_bytes(&totals(1.0), &template).unwrap();

    let mut before = ZipArchive::new(Cursor::new(&template[..])).unwrap();
    let mut after = ZipArchive::new(Cursor::new(&output[..])).unwrap();
    for name in ["xl/styles.xml", "xl/workbook.xml", "_rels/.rels", "xl/sharedStrings.xml"] {
        let (crc, size) = {
            let file = before.by_name(name).unwrap();
            (file.crc32(), file.compressed_size())
        };
        let file = after.by_name(name).unwrap();
        assert_eq!(file.crc32(), crc, "{}", name);
        assert_eq!(file.compressed_size(), size, "{}", name);
    }

    // Only the spliced cell differs in the worksheet
    let sheet = read_part(&output, "xl/worksheets/sheet1.xml");
    let d5 = r#"<c r="D5" t="n"><v>1</v></c>"#;
    assert_eq!(sheet.replacen(d5, "", 1), SUMMARY_SHEET);
}

#[test]
fn test_template_text_reuses_shared_strings() {
    let template = summary_template(
        r#"<definedName name="Label">Summary!$B$5</definedName><definedName name="Note">Summary!$A$7</definedName>"#,
    );
    let mut record: IndexMap<String, FieldValue> = IndexMap::new();
    record.insert("label".to_string(), "Subtotal".into());
    record.insert("note".to_string(), "Checked & approved".into());

    let output = patch_template_bytes(&record, &template).unwrap();

    let sheet = read_part(&output, "xl/worksheets/sheet1.xml");
    assert!(sheet.contains(r#"<c r="B5" t="s"><v>1</v></c><c r="C5""#));
    assert!(sheet.contains(r#"<row r="7"><c r="A7" t="s"><v>2</v></c></row></sheetData>"#));

    let sst = read_part(&output, "xl/sharedStrings.xml");
    assert!(sst.contains(r#"count="4" uniqueCount="3""#));
    assert_eq!(
        shared_strings(&sst),
        vec!["Quarterly summary", "Subtotal", "Checked & approved"]
    );
}

#[test]
fn test_template_missing_sheet() {
    let template = summary_template(r#"<definedName name="Total">Detail!$D$5</definedName>"#);
    let result = patch_template_bytes(&totals(1.0), &template);
    match result {
        Err(ExcelError::SheetNotFound(name)) => assert_eq!(name, "Detail"),
        other => panic!("expected SheetNotFound, got {:?}", other.map(|b| b.len())),
    }
}

#[test]
fn test_template_skips_range_names() {
    let template = summary_template(
        r#"<definedName name="Total">Summary!$D$5:$E$6</definedName><definedName name="_xlnm.Print_Area" localSheetId="0">Summary!$A$1:$E$5</definedName>"#,
    );
    let output = patch_template_bytes(&totals(3.0), &template).unwrap();
    assert_eq!(read_part(&output, "xl/worksheets/sheet1.xml"), SUMMARY_SHEET);
}

#[test]
fn test_template_missing_file() {
    let result = patch_from_template(&totals(1.0), "/nonexistent/template.xlsx");
    assert!(matches!(result, Err(ExcelError::Io(_))));
}

#[test]
fn test_patch_file_from_template_not_implemented() {
    let temp = NamedTempFile::new().unwrap();
    let result = patch_file_from_template(&totals(1.0), temp.path(), "out.xlsx");
    assert!(matches!(result, Err(ExcelError::NotImplemented(_))));
}
