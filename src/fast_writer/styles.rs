//! Style table: one cell format per distinct number format in the schema

use indexmap::IndexMap;
use std::io::Write;

use super::xml_writer::XmlWriter;
use crate::error::Result;
use crate::schema::{ColumnSchema, NumberFormat};

/// First id available for custom number formats; lower ids are built in
pub const FIRST_CUSTOM_FORMAT_ID: u32 = 164;

/// Finalized style table plus the style slot of every schema column
#[derive(Debug, Clone, PartialEq)]
pub struct StyleTable {
    custom_formats: IndexMap<String, u32>,
    // Slot index -> number format id
    cell_formats: Vec<u32>,
    // Column index (position order) -> slot index
    column_styles: Vec<u32>,
}

impl StyleTable {
    /// Build the table for `schema`, walking columns in position order
    ///
    /// Slot 0 always carries the general format so cells without a style
    /// attribute render unformatted.
    pub fn build(schema: &ColumnSchema) -> Self {
        let mut custom_formats: IndexMap<String, u32> = IndexMap::new();
        let mut slots: IndexMap<u32, u32> = IndexMap::new();
        slots.insert(0, 0);

        let mut column_styles = Vec::with_capacity(schema.len());
        for column in schema.columns() {
            let format_id = match &column.number_format {
                NumberFormat::Custom(code) => {
                    let next_id = FIRST_CUSTOM_FORMAT_ID + custom_formats.len() as u32;
                    *custom_formats.entry(code.clone()).or_insert(next_id)
                }
                NumberFormat::Builtin(id) => *id,
                NumberFormat::General => 0,
            };

            let next_slot = slots.len() as u32;
            let slot = *slots.entry(format_id).or_insert(next_slot);
            column_styles.push(slot);
        }

        StyleTable {
            custom_formats,
            cell_formats: slots.into_keys().collect(),
            column_styles,
        }
    }

    /// Style slot of the column at `column_index` (0-based, position order)
    pub fn column_style(&self, column_index: usize) -> u32 {
        self.column_styles.get(column_index).copied().unwrap_or(0)
    }

    /// Style slot per column, in position order
    pub fn column_styles(&self) -> &[u32] {
        &self.column_styles
    }

    /// Number format id of every cell format slot
    pub fn cell_formats(&self) -> &[u32] {
        &self.cell_formats
    }

    /// Custom number formats as `(id, code)`, in allocation order
    pub fn custom_formats(&self) -> impl Iterator<Item = (u32, &str)> {
        self.custom_formats
            .iter()
            .map(|(code, id)| (*id, code.as_str()))
    }

    /// Serialize as `xl/styles.xml`
    ///
    /// Element order is fixed by the schema of the styles part.
    pub fn write_xml<W: Write>(&self, writer: &mut XmlWriter<W>) -> Result<()> {
        writer.declaration()?;
        writer.start_element("styleSheet")?;
        writer.attribute(
            "xmlns",
            "http://schemas.openxmlformats.org/spreadsheetml/2006/main",
        )?;
        writer.close_start_tag()?;

        if !self.custom_formats.is_empty() {
            writer.start_element("numFmts")?;
            writer.attribute_u32("count", self.custom_formats.len() as u32)?;
            writer.close_start_tag()?;
            for (id, code) in self.custom_formats() {
                writer.start_element("numFmt")?;
                writer.attribute_u32("numFmtId", id)?;
                writer.attribute("formatCode", code)?;
                writer.close_empty_tag()?;
            }
            writer.end_element("numFmts")?;
        }

        writer.write_str(concat!(
            "<fonts count=\"1\"><font><sz val=\"11\"/><name val=\"Calibri\"/></font></fonts>",
            "<fills count=\"2\">",
            "<fill><patternFill patternType=\"none\"/></fill>",
            "<fill><patternFill patternType=\"gray125\"/></fill>",
            "</fills>",
            "<borders count=\"1\"><border><left/><right/><top/><bottom/><diagonal/></border></borders>",
            "<cellStyleXfs count=\"1\"><xf numFmtId=\"0\" fontId=\"0\" fillId=\"0\" borderId=\"0\"/></cellStyleXfs>",
        ))?;

        writer.start_element("cellXfs")?;
        writer.attribute_u32("count", self.cell_formats.len() as u32)?;
        writer.close_start_tag()?;
        for &format_id in &self.cell_formats {
            writer.start_element("xf")?;
            writer.attribute_u32("numFmtId", format_id)?;
            writer.write_str(" fontId=\"0\" fillId=\"0\" borderId=\"0\" xfId=\"0\"")?;
            if format_id != 0 {
                writer.attribute("applyNumberFormat", "1")?;
            }
            writer.close_empty_tag()?;
        }
        writer.end_element("cellXfs")?;

        writer.write_str(concat!(
            "<cellStyles count=\"1\"><cellStyle name=\"Normal\" xfId=\"0\" builtinId=\"0\"/></cellStyles>",
            "<dxfs count=\"0\"/>",
            "<tableStyles count=\"0\" defaultTableStyle=\"TableStyleMedium2\" defaultPivotStyle=\"PivotStyleMedium9\"/>",
        ))?;

        writer.end_element("styleSheet")?;
        writer.flush()
    }
}
