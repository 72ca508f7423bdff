//! Report writer: named collection + summary → one multi-sheet `.xlsx` file.
//!
//! Layout is computed as plain data first ([`build_layout`]), checked
//! against the format's limits, then encoded with `rust_xlsxwriter`.

pub mod layout;
pub mod writer;

pub use layout::{SUMMARY_SHEET, SheetData, build_layout, validate_layout};
pub use writer::{ArtifactMeta, SheetMeta, write_report};
