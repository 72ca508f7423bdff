//! `.xlsx` encoding and atomic placement of the artifact.

use std::path::{Path, PathBuf};

use chrono::Datelike;
use rust_decimal::prelude::ToPrimitive;
use rust_xlsxwriter::{DocProperties, ExcelDateTime, Format, Workbook, Worksheet, XlsxError};
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::{debug, info, instrument};

use dwh_shared::{DwhError, NamedCollection, Result, SummaryRecord, Value};

use crate::layout::{SheetData, build_layout, validate_layout};

/// Row count of one written sheet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SheetMeta {
    pub name: String,
    pub rows: usize,
}

/// Metadata for the written artifact.
#[derive(Debug, Clone, Serialize)]
pub struct ArtifactMeta {
    pub path: PathBuf,
    pub sha256: String,
    pub size_bytes: usize,
    pub sheets: Vec<SheetMeta>,
}

/// Serialize the collection and summary into one workbook at `destination`.
///
/// The bytes are written to a hidden temp file beside the destination and
/// renamed into place, so a failed write never leaves a readable partial
/// artifact.
#[instrument(skip_all, fields(destination = %destination.display(), sheets = collection.len() + 1))]
pub fn write_report(
    collection: &NamedCollection,
    summary: &SummaryRecord,
    destination: &Path,
) -> Result<ArtifactMeta> {
    let sheets = build_layout(collection, summary);
    validate_layout(&sheets).map_err(|msg| DwhError::write(destination, msg))?;

    let bytes = render(&sheets).map_err(|e| DwhError::write(destination, e.to_string()))?;
    persist(destination, &bytes)?;

    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    let sha256 = format!("{:x}", hasher.finalize());

    let sheets: Vec<SheetMeta> = sheets
        .iter()
        .map(|s| SheetMeta {
            name: s.name.clone(),
            rows: s.rows.len(),
        })
        .collect();

    info!(size = bytes.len(), sheets = sheets.len(), "report written");

    Ok(ArtifactMeta {
        path: destination.to_path_buf(),
        sha256,
        size_bytes: bytes.len(),
        sheets,
    })
}

// ---------------------------------------------------------------------------
// Encoding
// ---------------------------------------------------------------------------

/// Years a worksheet date serial can represent.
const EXCEL_YEARS: std::ops::RangeInclusive<i32> = 1900..=9999;

struct Formats {
    header: Format,
    date: Format,
    datetime: Format,
}

fn render(sheets: &[SheetData]) -> std::result::Result<Vec<u8>, XlsxError> {
    let mut workbook = Workbook::new();

    // Pinned creation time keeps output byte-identical across runs.
    let created = ExcelDateTime::from_ymd(1980, 1, 1)?;
    let properties = DocProperties::new().set_creation_datetime(&created);
    workbook.set_properties(&properties);

    let formats = Formats {
        header: Format::new().set_bold(),
        date: Format::new().set_num_format("yyyy-mm-dd"),
        datetime: Format::new().set_num_format("yyyy-mm-dd hh:mm:ss"),
    };

    for sheet in sheets {
        let worksheet = workbook.add_worksheet();
        worksheet.set_name(sheet.name.as_str())?;

        for (col, header) in sheet.headers.iter().enumerate() {
            worksheet.write_string_with_format(0, col as u16, header.as_str(), &formats.header)?;
        }
        for (idx, row) in sheet.rows.iter().enumerate() {
            for (col, value) in row.iter().enumerate() {
                write_cell(worksheet, idx as u32 + 1, col as u16, value, &formats)?;
            }
        }
        debug!(sheet = %sheet.name, rows = sheet.rows.len(), "sheet rendered");
    }

    workbook.save_to_buffer()
}

fn write_cell(
    worksheet: &mut Worksheet,
    row: u32,
    col: u16,
    value: &Value,
    formats: &Formats,
) -> std::result::Result<(), XlsxError> {
    match value {
        Value::Null => {}
        Value::Text(s) => {
            worksheet.write_string(row, col, s.as_str())?;
        }
        Value::Integer(i) => {
            worksheet.write_number(row, col, *i as f64)?;
        }
        Value::Float(f) if f.is_finite() => {
            worksheet.write_number(row, col, *f)?;
        }
        Value::Float(f) => {
            worksheet.write_string(row, col, f.to_string())?;
        }
        Value::Decimal(d) => match d.to_f64() {
            Some(f) => {
                worksheet.write_number(row, col, f)?;
            }
            None => {
                worksheet.write_string(row, col, d.to_string())?;
            }
        },
        Value::Bool(b) => {
            worksheet.write_boolean(row, col, *b)?;
        }
        Value::Date(d) if EXCEL_YEARS.contains(&d.year()) => {
            worksheet.write_datetime_with_format(row, col, d, &formats.date)?;
        }
        Value::DateTime(dt) if EXCEL_YEARS.contains(&dt.year()) => {
            worksheet.write_datetime_with_format(row, col, dt, &formats.datetime)?;
        }
        // A serial outside the range would display as `#####`.
        Value::Date(_) | Value::DateTime(_) => {
            worksheet.write_string(row, col, value.to_string())?;
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Placement
// ---------------------------------------------------------------------------

fn persist(destination: &Path, bytes: &[u8]) -> Result<()> {
    let parent = match destination.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&parent)
        .map_err(|e| DwhError::write(&parent, format!("create directory: {e}")))?;

    let filename = destination
        .file_name()
        .ok_or_else(|| DwhError::write(destination, "destination has no file name"))?
        .to_string_lossy();
    let temp = parent.join(format!(".{filename}.tmp"));

    if let Err(e) = std::fs::write(&temp, bytes) {
        let _ = std::fs::remove_file(&temp);
        return Err(DwhError::write(&temp, e.to_string()));
    }
    if let Err(e) = std::fs::rename(&temp, destination) {
        let _ = std::fs::remove_file(&temp);
        return Err(DwhError::write(destination, e.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use dwh_shared::{Schema, Table};
    use rust_decimal::Decimal;
    use std::io::Read;

    /// Cell text of every worksheet in workbook order; blank cells are empty.
    fn read_back(path: &Path) -> Vec<Vec<Vec<String>>> {
        let file = std::fs::File::open(path).unwrap();
        let mut archive = zip::ZipArchive::new(file).unwrap();
        let shared = read_entry(&mut archive, "xl/sharedStrings.xml")
            .map(|xml| shared_strings(&xml))
            .unwrap_or_default();

        let mut sheets = Vec::new();
        for n in 1.. {
            let Some(xml) = read_entry(&mut archive, &format!("xl/worksheets/sheet{n}.xml")) else {
                break;
            };
            sheets.push(sheet_cells(&xml, &shared));
        }
        sheets
    }

    fn read_entry(archive: &mut zip::ZipArchive<std::fs::File>, name: &str) -> Option<String> {
        let mut entry = archive.by_name(name).ok()?;
        let mut xml = String::new();
        entry.read_to_string(&mut xml).unwrap();
        Some(xml)
    }

    fn shared_strings(xml: &str) -> Vec<String> {
        let doc = roxmltree::Document::parse(xml).unwrap();
        doc.descendants()
            .filter(|n| n.has_tag_name("si"))
            .map(|si| {
                si.descendants()
                    .filter(|n| n.has_tag_name("t"))
                    .filter_map(|t| t.text())
                    .collect()
            })
            .collect()
    }

    fn sheet_cells(xml: &str, shared: &[String]) -> Vec<Vec<String>> {
        let doc = roxmltree::Document::parse(xml).unwrap();
        doc.descendants()
            .filter(|n| n.has_tag_name("row"))
            .map(|row| {
                let mut cells: Vec<String> = Vec::new();
                for cell in row.children().filter(|n| n.has_tag_name("c")) {
                    let col = column_index(cell.attribute("r").unwrap());
                    let raw = cell
                        .children()
                        .find(|n| n.has_tag_name("v"))
                        .and_then(|v| v.text())
                        .unwrap_or_default();
                    let text = match cell.attribute("t") {
                        Some("s") => shared[raw.parse::<usize>().unwrap()].clone(),
                        _ => raw.to_string(),
                    };
                    if cells.len() <= col {
                        cells.resize(col + 1, String::new());
                    }
                    cells[col] = text;
                }
                cells
            })
            .collect()
    }

    fn column_index(reference: &str) -> usize {
        reference
            .chars()
            .take_while(char::is_ascii_alphabetic)
            .fold(0, |acc, c| acc * 26 + (c as usize - 'A' as usize + 1))
            - 1
    }

    fn temp_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("dwh-report-test-{}", uuid::Uuid::now_v7()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn sample() -> (NamedCollection, SummaryRecord) {
        let signup = NaiveDate::from_ymd_opt(2021, 6, 1).unwrap();
        let customers = Table::from_rows(
            Schema::new(["id", "name", "signup_date", "score", "is_active"]),
            vec![
                vec![
                    Value::Integer(1),
                    "Ada".into(),
                    Value::DateTime(signup.and_hms_opt(8, 0, 0).unwrap()),
                    Value::Decimal(Decimal::new(995, 1)),
                    Value::Bool(true),
                ],
                vec![
                    Value::Integer(2),
                    Value::Null,
                    Value::Date(signup),
                    Value::Float(f64::NAN),
                    Value::Bool(false),
                ],
            ],
        )
        .unwrap();
        let mut collection = NamedCollection::new();
        collection.insert("customers", customers).unwrap();
        collection
            .insert("orders", Table::empty(Schema::new(["order_id", "quantity"])))
            .unwrap();

        let mut summary = SummaryRecord::new();
        summary.push("total_customers", 2_i64);
        summary.push("total_orders", 0_i64);
        summary.push("total_revenue", Decimal::ZERO);
        (collection, summary)
    }

    #[test]
    fn writes_workbook_and_reports_sheets() {
        let tmp = temp_dir();
        let destination = tmp.join("out").join("report.xlsx");
        let (collection, summary) = sample();

        let meta = write_report(&collection, &summary, &destination).unwrap();

        let bytes = std::fs::read(&destination).unwrap();
        assert_eq!(&bytes[..2], b"PK");
        assert_eq!(meta.size_bytes, bytes.len());
        assert_eq!(meta.sha256.len(), 64);
        assert_eq!(
            meta.sheets,
            vec![
                SheetMeta { name: "customers".into(), rows: 2 },
                SheetMeta { name: "orders".into(), rows: 0 },
                SheetMeta { name: "Summary".into(), rows: 1 },
            ]
        );
        assert!(!destination.with_file_name(".report.xlsx.tmp").exists());

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn written_cells_match_the_layout() {
        let tmp = temp_dir();
        let destination = tmp.join("report.xlsx");
        let (collection, summary) = sample();

        write_report(&collection, &summary, &destination).unwrap();
        let sheets = read_back(&destination);

        assert_eq!(sheets.len(), 3);
        assert_eq!(sheets[0][0], ["id", "name", "signup_date", "score", "is_active"]);
        assert_eq!(sheets[0][1][1], "Ada");
        // Null leaves the cell blank.
        assert_eq!(sheets[0][2][1], "");
        assert_eq!(sheets[1], vec![vec!["order_id", "quantity"]]);
        assert_eq!(sheets[2][0], ["total_customers", "total_orders", "total_revenue"]);
        assert_eq!(sheets[2][1], ["2", "0", "0"]);

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn dates_outside_excel_range_are_written_as_text() {
        let tmp = temp_dir();
        let destination = tmp.join("dates.xlsx");
        let old = NaiveDate::from_ymd_opt(1850, 1, 1).unwrap();
        let recent = NaiveDate::from_ymd_opt(2021, 6, 1).unwrap();
        let table = Table::from_rows(
            Schema::new(["signup_date", "seen_at", "renewed_on"]),
            vec![vec![
                Value::Date(old),
                Value::DateTime(old.and_hms_opt(12, 30, 0).unwrap()),
                Value::Date(recent),
            ]],
        )
        .unwrap();
        let mut collection = NamedCollection::new();
        collection.insert("customers", table).unwrap();

        write_report(&collection, &SummaryRecord::new(), &destination).unwrap();
        let row = &read_back(&destination)[0][1];

        assert_eq!(row[0], "1850-01-01");
        assert_eq!(row[1], "1850-01-01 12:30:00");
        // In range: a date serial, not text.
        assert_eq!(row[2].parse::<f64>().unwrap(), 44348.0);

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn identical_inputs_give_identical_bytes() {
        let tmp = temp_dir();
        let (collection, summary) = sample();

        let first = write_report(&collection, &summary, &tmp.join("a.xlsx")).unwrap();
        let second = write_report(&collection, &summary, &tmp.join("b.xlsx")).unwrap();

        assert_eq!(first.sha256, second.sha256);
        assert_eq!(
            std::fs::read(tmp.join("a.xlsx")).unwrap(),
            std::fs::read(tmp.join("b.xlsx")).unwrap()
        );

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn unwritable_destination_is_write_error() {
        let tmp = temp_dir();
        let blocker = tmp.join("not-a-dir");
        std::fs::write(&blocker, b"plain file").unwrap();
        let (collection, summary) = sample();

        let err = write_report(&collection, &summary, &blocker.join("report.xlsx")).unwrap_err();

        assert!(matches!(err, DwhError::Write { .. }));
        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn failed_rename_leaves_no_temp_file() {
        let tmp = temp_dir();
        // A non-empty directory in the way makes the final rename fail.
        let destination = tmp.join("report.xlsx");
        std::fs::create_dir_all(destination.join("occupied")).unwrap();
        let (collection, summary) = sample();

        let err = write_report(&collection, &summary, &destination).unwrap_err();

        assert!(matches!(err, DwhError::Write { .. }));
        assert!(!tmp.join(".report.xlsx.tmp").exists());
        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn name_collision_is_write_error_and_writes_nothing() {
        let tmp = temp_dir();
        let destination = tmp.join("report.xlsx");
        let mut collection = NamedCollection::new();
        collection
            .insert("SUMMARY", Table::empty(Schema::new(["x"])))
            .unwrap();

        let err = write_report(&collection, &SummaryRecord::new(), &destination).unwrap_err();

        assert!(err.to_string().contains("collides"));
        assert!(!destination.exists());
        let _ = std::fs::remove_dir_all(&tmp);
    }
}
