//! Pure sheet layout: what each worksheet contains, before any encoding.

use dwh_shared::{NamedCollection, Row, SummaryRecord};

/// Name of the trailing summary sheet.
pub const SUMMARY_SHEET: &str = "Summary";

/// Rows per worksheet, header included.
pub const MAX_ROWS: usize = 1_048_576;

/// Columns per worksheet.
pub const MAX_COLUMNS: usize = 16_384;

/// Longest sheet name the format accepts.
pub const MAX_SHEET_NAME_LEN: usize = 31;

const FORBIDDEN_NAME_CHARS: &[char] = &['[', ']', ':', '*', '?', '/', '\\'];

/// One worksheet: a header row followed by data rows.
#[derive(Debug, Clone, PartialEq)]
pub struct SheetData {
    pub name: String,
    pub headers: Vec<String>,
    pub rows: Vec<Row>,
}

/// One sheet per collection entry in order, then the summary sheet with the
/// summary fields as header and exactly one data row.
pub fn build_layout(collection: &NamedCollection, summary: &SummaryRecord) -> Vec<SheetData> {
    let mut sheets: Vec<SheetData> = collection
        .iter()
        .map(|(name, table)| SheetData {
            name: name.to_string(),
            headers: table.schema().columns().to_vec(),
            rows: table.rows().to_vec(),
        })
        .collect();

    let (headers, values): (Vec<String>, Row) = summary.fields().iter().cloned().unzip();
    sheets.push(SheetData {
        name: SUMMARY_SHEET.to_string(),
        headers,
        rows: vec![values],
    });
    sheets
}

/// Check names and sizes against the workbook format's limits.
pub fn validate_layout(sheets: &[SheetData]) -> Result<(), String> {
    let mut seen: Vec<String> = Vec::with_capacity(sheets.len());
    for sheet in sheets {
        validate_sheet_name(&sheet.name)?;

        let folded = sheet.name.to_lowercase();
        if seen.contains(&folded) {
            return Err(format!(
                "sheet name '{}' collides with an earlier sheet (names are case-insensitive)",
                sheet.name
            ));
        }
        seen.push(folded);

        if sheet.rows.len() + 1 > MAX_ROWS {
            return Err(format!(
                "sheet '{}' has {} rows; at most {} fit below the header",
                sheet.name,
                sheet.rows.len(),
                MAX_ROWS - 1
            ));
        }
        if sheet.headers.len() > MAX_COLUMNS {
            return Err(format!(
                "sheet '{}' has {} columns; the limit is {MAX_COLUMNS}",
                sheet.name,
                sheet.headers.len()
            ));
        }
    }
    Ok(())
}

fn validate_sheet_name(name: &str) -> Result<(), String> {
    if name.is_empty() {
        return Err("sheet name is empty".into());
    }
    if name.chars().count() > MAX_SHEET_NAME_LEN {
        return Err(format!(
            "sheet name '{name}' is longer than {MAX_SHEET_NAME_LEN} characters"
        ));
    }
    if let Some(c) = name.chars().find(|c| FORBIDDEN_NAME_CHARS.contains(c)) {
        return Err(format!("sheet name '{name}' contains '{c}'"));
    }
    if name.starts_with('\'') || name.ends_with('\'') {
        return Err(format!(
            "sheet name '{name}' cannot start or end with an apostrophe"
        ));
    }
    Ok(())
}
