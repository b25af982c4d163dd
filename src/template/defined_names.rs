//! Named ranges read from a template workbook

use indexmap::IndexMap;

use crate::address::CellAddress;

/// A `<definedName>` entry as stored in the workbook part
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefinedName {
    pub name: String,
    /// Set for names scoped to one sheet
    pub local_sheet_id: Option<u32>,
    /// Formula text, e.g. `Summary!$D$5`
    pub refers_to: String,
}

/// A named range that points at exactly one cell
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefinedNameRef {
    pub name: String,
    pub sheet_name: String,
    pub address: CellAddress,
}

impl DefinedNameRef {
    /// Column letters of the target cell, e.g. `D`
    pub fn column_letters(&self) -> String {
        self.address.column_letters()
    }

    /// 1-based row of the target cell
    pub fn row_index(&self) -> u32 {
        self.address.row()
    }
}

/// Split `'My Sheet'!$D$5` or `Summary!D5` into sheet name and cell address
///
/// Returns `None` for anything other than a single-cell reference on a named
/// sheet: ranges, formulas, constants and `#REF!` all fall through.
pub fn parse_reference(text: &str) -> Option<(String, CellAddress)> {
    let text = text.trim();
    let text = text.strip_prefix('=').unwrap_or(text);

    let (sheet_name, cell) = if let Some(quoted) = text.strip_prefix('\'') {
        let mut sheet = String::new();
        let mut chars = quoted.char_indices();
        loop {
            let (idx, ch) = chars.next()?;
            if ch != '\'' {
                sheet.push(ch);
                continue;
            }
            // '' inside a quoted name is a literal quote
            if quoted[idx + 1..].starts_with('\'') {
                sheet.push('\'');
                chars.next();
                continue;
            }
            let rest = quoted[idx + 1..].strip_prefix('!')?;
            break (sheet, rest);
        }
    } else {
        let (sheet, rest) = text.split_once('!')?;
        if sheet.contains(|c: char| "()[]{}<>,;\"'=+-*/^&".contains(c)) {
            return None;
        }
        (sheet.to_string(), rest)
    };

    if sheet_name.is_empty() {
        return None;
    }
    let address = CellAddress::parse(cell).ok()?;
    Some((sheet_name, address))
}

/// Resolve every name that targets a single cell; others are skipped
pub fn resolve(names: &[DefinedName]) -> Vec<DefinedNameRef> {
    let mut resolved = Vec::with_capacity(names.len());
    for name in names {
        if name.name.starts_with("_xlnm.") {
            log::debug!("skipping built-in name {}", name.name);
            continue;
        }
        match parse_reference(&name.refers_to) {
            Some((sheet_name, address)) => resolved.push(DefinedNameRef {
                name: name.name.clone(),
                sheet_name,
                address,
            }),
            None => log::warn!(
                "named range '{}' ({}) is not a single cell, skipping",
                name.name,
                name.refers_to
            ),
        }
    }
    resolved
}

/// Group names by sheet, keeping the order sheets are first seen in
pub fn group_by_sheet(names: Vec<DefinedNameRef>) -> IndexMap<String, Vec<DefinedNameRef>> {
    let mut groups: IndexMap<String, Vec<DefinedNameRef>> = IndexMap::new();
    for name in names {
        groups.entry(name.sheet_name.clone()).or_default().push(name);
    }
    groups
}
