//! Row and cell encoding
//!
//! Two typing rules exist. Collection builds type a cell by the declared kind of
//! its column; template patches have no declared kind and type a cell by the
//! runtime variant of the value.

use std::io::Write;

use super::shared_strings::SharedStrings;
use super::styles::StyleTable;
use super::xml_writer::XmlWriter;
use crate::address::CellAddress;
use crate::date::to_oa_date;
use crate::error::{ExcelError, Result};
use crate::schema::{ColumnDescriptor, ColumnSchema};
use crate::types::{Cell, CellDataType, FieldKind, FieldValue, Record, Row};

/// Anything that can hand out shared string indices
pub trait StringInterner {
    /// Index of `text`, appending it when not yet present
    fn intern(&mut self, text: &str) -> u32;
}

impl StringInterner for SharedStrings {
    fn intern(&mut self, text: &str) -> u32 {
        SharedStrings::intern(self, text)
    }
}

/// Canonical text of a numeric value
pub fn number_text(value: &FieldValue) -> Result<String> {
    match value {
        FieldValue::Int(i) => {
            let mut buf = itoa::Buffer::new();
            Ok(buf.format(*i).to_string())
        }
        FieldValue::Float(f) if f.is_finite() => Ok(f.to_string()),
        FieldValue::Float(f) => Err(ExcelError::InvalidValue(format!(
            "{} cannot be stored in a numeric cell",
            f
        ))),
        FieldValue::DateTime(dt) => Ok(to_oa_date(dt)?.to_string()),
        other => Err(ExcelError::InvalidValue(format!(
            "{} is not numeric",
            other.describe()
        ))),
    }
}

fn bool_text(b: bool) -> String {
    let text = if b { "1" } else { "0" };
    text.to_string()
}

fn mismatch(column: &ColumnDescriptor, value: &FieldValue) -> ExcelError {
    ExcelError::TypeMismatch {
        column: column.title.clone(),
        expected: column.kind.describe(),
        actual: value.describe(),
    }
}

/// Type and raw value of a cell whose column declares `column.kind`
pub fn declared_cell_value<I: StringInterner>(
    column: &ColumnDescriptor,
    value: &FieldValue,
    strings: &mut I,
) -> Result<(CellDataType, String)> {
    // Dates are always serials, whatever the declared kind.
    if let FieldValue::DateTime(dt) = value {
        return Ok((CellDataType::Number, to_oa_date(dt)?.to_string()));
    }

    match column.kind {
        FieldKind::Text => {
            let index = strings.intern(&value.to_string());
            Ok((CellDataType::SharedString, index.to_string()))
        }
        FieldKind::Boolean => match value {
            FieldValue::Bool(b) => Ok((CellDataType::Boolean, bool_text(*b))),
            other => Err(mismatch(column, other)),
        },
        FieldKind::DateTime | FieldKind::Number => match value {
            FieldValue::Int(_) | FieldValue::Float(_) => {
                Ok((CellDataType::Number, number_text(value)?))
            }
            other => Err(mismatch(column, other)),
        },
    }
}

/// Type and raw value of a cell typed by the value itself
pub fn runtime_cell_value<I: StringInterner>(
    value: &FieldValue,
    strings: &mut I,
) -> Result<(CellDataType, String)> {
    match value {
        FieldValue::Text(s) => Ok((CellDataType::SharedString, strings.intern(s).to_string())),
        FieldValue::Bool(b) => Ok((CellDataType::Boolean, bool_text(*b))),
        FieldValue::DateTime(_) | FieldValue::Int(_) | FieldValue::Float(_) => {
            Ok((CellDataType::Number, number_text(value)?))
        }
    }
}

/// Header row: one shared-string cell per column holding its title
pub fn encode_header(schema: &ColumnSchema, strings: &mut SharedStrings) -> Row {
    let mut row = Row::new(1);
    row.spans = Some((1, schema.column_count()));
    for (column_index, column) in schema.columns().iter().enumerate() {
        let index = strings.intern(&column.title);
        row.cells.push(Cell::new(
            CellAddress::new(column_index as u32 + 1, 1),
            CellDataType::SharedString,
            index.to_string(),
        ));
    }
    row
}

/// Data row for `record`; null fields produce no cell
///
/// Cells are addressed by their ordinal in the schema, so gaps between column
/// positions never leave empty columns.
pub fn encode_record<R: Record + ?Sized>(
    record: &R,
    row_index: u32,
    schema: &ColumnSchema,
    styles: &StyleTable,
    strings: &mut SharedStrings,
) -> Result<Row> {
    let mut row = Row::new(row_index);
    row.spans = Some((1, schema.column_count()));

    for (column_index, column) in schema.columns().iter().enumerate() {
        let Some(value) = record.field_value(&column.field) else {
            continue;
        };
        let (data_type, raw_value) = declared_cell_value(column, &value, strings)?;
        let cell = Cell::new(
            CellAddress::new(column_index as u32 + 1, row_index),
            data_type,
            raw_value,
        )
        .with_style(styles.column_style(column_index));
        row.cells.push(cell);
    }

    Ok(row)
}

/// Serialize one `<c>` element
pub fn write_cell<W: Write>(writer: &mut XmlWriter<W>, cell: &Cell) -> Result<()> {
    writer.start_element("c")?;
    writer.attribute("r", &cell.address.to_string())?;
    if let Some(style) = cell.style_index {
        writer.attribute_u32("s", style)?;
    }
    if let Some(t) = cell.data_type.attribute() {
        writer.attribute("t", t)?;
    }
    writer.close_start_tag()?;
    writer.text_element("v", &cell.raw_value)?;
    writer.end_element("c")
}

/// Serialize one `<row>` element with its cells
pub fn write_row<W: Write>(writer: &mut XmlWriter<W>, row: &Row) -> Result<()> {
    writer.start_element("row")?;
    writer.attribute_u32("r", row.index)?;
    if let Some((first, last)) = row.spans {
        writer.attribute("spans", &format!("{}:{}", first, last))?;
    }
    if row.cells.is_empty() {
        return writer.close_empty_tag();
    }
    writer.close_start_tag()?;
    for cell in &row.cells {
        write_cell(writer, cell)?;
    }
    writer.end_element("row")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use indexmap::IndexMap;

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

    fn record(fields: &[(&str, Option<FieldValue>)]) -> IndexMap<String, Option<FieldValue>> {
        fields
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_header_row() {
        let schema = product_schema();
        let mut sst = SharedStrings::new();
        let header = encode_header(&schema, &mut sst);

        let refs: Vec<String> = header.cells.iter().map(|c| c.address.to_string()).collect();
        assert_eq!(refs, vec!["A1", "B1", "C1"]);
        assert!(header
            .cells
            .iter()
            .all(|c| c.data_type == CellDataType::SharedString));
        let titles: Vec<&str> = sst.iter().collect();
        assert_eq!(titles, vec!["Name", "Discount", "Price"]);
    }

    #[test]
    fn test_null_field_has_no_cell() {
        let schema = product_schema();
        let styles = StyleTable::build(&schema);
        let mut sst = SharedStrings::new();
        let rec = record(&[
            ("Name", Some("123".into())),
            ("Price", None),
            ("Discount", Some(0.22f32.into())),
        ]);

        let row = encode_record(&rec, 4, &schema, &styles, &mut sst).unwrap();
        assert_eq!(row.len(), 2);
        assert!(row.get(3).is_none());
        assert_eq!(row.get(1).unwrap().address.to_string(), "A4");
        let discount = row.get(2).unwrap();
        assert_eq!(discount.address.to_string(), "B4");
        assert_eq!(discount.data_type, CellDataType::Number);
        assert_eq!(discount.raw_value, "0.22");
        assert_eq!(row.spans, Some((1, 3)));
    }

    #[test]
    fn test_position_gaps_are_closed() {
        let schema = ColumnSchema::builder()
            .column("code", "Code", 2)
            .kind(FieldKind::Text)
            .column("qty", "Quantity", 7)
            .build()
            .unwrap();
        let styles = StyleTable::build(&schema);
        let mut sst = SharedStrings::new();

        let header = encode_header(&schema, &mut sst);
        let refs: Vec<String> = header.cells.iter().map(|c| c.address.to_string()).collect();
        assert_eq!(refs, vec!["A1", "B1"]);
        assert_eq!(header.spans, Some((1, 2)));

        let rec = record(&[("code", Some("X1".into())), ("qty", Some(FieldValue::Int(3)))]);
        let row = encode_record(&rec, 2, &schema, &styles, &mut sst).unwrap();
        let refs: Vec<String> = row.cells.iter().map(|c| c.address.to_string()).collect();
        assert_eq!(refs, vec!["A2", "B2"]);
        assert_eq!(row.spans, Some((1, 2)));
    }

    #[test]
    fn test_styles_follow_columns() {
        let schema = product_schema();
        let styles = StyleTable::build(&schema);
        let mut sst = SharedStrings::new();
        let rec = record(&[
            ("Name", Some("ABC".into())),
            ("Price", Some(6000.85f64.into())),
            ("Discount", Some(0.1f32.into())),
        ]);

        let row = encode_record(&rec, 2, &schema, &styles, &mut sst).unwrap();
        assert_eq!(row.get(1).unwrap().style_index, None);
        assert_eq!(row.get(3).unwrap().style_index, Some(1));
        assert_eq!(row.get(3).unwrap().raw_value, "6000.85");
    }

    #[test]
    fn test_declared_kinds() {
        let mut sst = SharedStrings::new();
        let mut column = ColumnDescriptor::new("flag", "Is Offline", 1);
        column.kind = FieldKind::Boolean;

        assert_eq!(
            declared_cell_value(&column, &FieldValue::Bool(true), &mut sst).unwrap(),
            (CellDataType::Boolean, "1".to_string())
        );
        assert!(matches!(
            declared_cell_value(&column, &FieldValue::Int(1), &mut sst),
            Err(ExcelError::TypeMismatch { .. })
        ));

        column.kind = FieldKind::DateTime;
        let date = NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap();
        assert_eq!(
            declared_cell_value(&column, &FieldValue::DateTime(date), &mut sst).unwrap(),
            (CellDataType::Number, "45292.5".to_string())
        );

        column.kind = FieldKind::Text;
        assert_eq!(
            declared_cell_value(&column, &FieldValue::Int(42), &mut sst).unwrap(),
            (CellDataType::SharedString, "0".to_string())
        );
        assert_eq!(sst.get(0), Some("42"));

        column.kind = FieldKind::Number;
        assert!(declared_cell_value(&column, &FieldValue::Float(f64::NAN), &mut sst).is_err());
        assert!(declared_cell_value(&column, &FieldValue::Text("x".into()), &mut sst).is_err());
    }

    #[test]
    fn test_runtime_typing() {
        let mut sst = SharedStrings::new();
        assert_eq!(
            runtime_cell_value(&FieldValue::Text("Total".into()), &mut sst).unwrap(),
            (CellDataType::SharedString, "0".to_string())
        );
        assert_eq!(
            runtime_cell_value(&FieldValue::Bool(false), &mut sst).unwrap(),
            (CellDataType::Boolean, "0".to_string())
        );
        assert_eq!(
            runtime_cell_value(&FieldValue::Int(-7), &mut sst).unwrap(),
            (CellDataType::Number, "-7".to_string())
        );
    }

    #[test]
    fn test_write_row() {
        let mut row = Row::new(2);
        row.spans = Some((1, 2));
        row.cells.push(
            Cell::new(CellAddress::new(2, 2), CellDataType::Number, "1.5".into()).with_style(1),
        );

        let mut output = Vec::new();
        let mut writer = XmlWriter::new(&mut output);
        write_row(&mut writer, &row).unwrap();
        writer.flush().unwrap();

        assert_eq!(
            String::from_utf8(output).unwrap(),
            "<row r=\"2\" spans=\"1:2\"><c r=\"B2\" s=\"1\" t=\"n\"><v>1.5</v></c></row>"
        );
    }
}
