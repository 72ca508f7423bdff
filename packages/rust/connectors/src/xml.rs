//! Hierarchical file connector.
//!
//! Each direct child of the document root whose tag is `record_tag` is one
//! record. Every declared column is read from a same-named sub-element; a
//! record missing any of them is skipped, logged, and counted.

use std::path::Path;

use roxmltree::{Document, Node};
use tracing::warn;

use dwh_shared::{DwhError, Result, Row, Schema, Table, Value, XmlConnection};

use crate::Fetched;

#[derive(Debug, Clone)]
pub struct XmlConnector {
    config: XmlConnection,
}

impl XmlConnector {
    pub fn new(config: XmlConnection) -> Self {
        Self { config }
    }

    /// Read and parse the configured file.
    pub async fn fetch(&self, source: &str, schema: &Schema) -> Result<Fetched> {
        let path = Path::new(&self.config.path);
        let text = tokio::fs::read_to_string(path).await.map_err(|e| {
            DwhError::source_unavailable(source, format!("read {}: {e}", path.display()))
        })?;
        parse_records(source, &text, &self.config.record_tag, schema)
    }
}

/// Parse `text` into a table with `schema`.
///
/// Malformed records are dropped with a warning; a document that is not
/// well-formed makes the whole source unavailable.
pub fn parse_records(
    source: &str,
    text: &str,
    record_tag: &str,
    schema: &Schema,
) -> Result<Fetched> {
    let doc = Document::parse(text)
        .map_err(|e| DwhError::source_unavailable(source, format!("invalid XML: {e}")))?;

    let mut table = Table::empty(schema.clone());
    let mut skipped_records = 0;

    let records = doc
        .root_element()
        .children()
        .filter(|n| n.is_element() && n.has_tag_name(record_tag));

    for (position, record) in records.enumerate() {
        match read_record(record, schema) {
            Ok(row) => table.push(row)?,
            Err(missing) => {
                skipped_records += 1;
                let err = DwhError::malformed(
                    source,
                    format!("<{record_tag}> #{} has no <{missing}>", position + 1),
                );
                warn!(error = %err, "skipping record");
            }
        }
    }

    Ok(Fetched {
        table,
        skipped_records,
    })
}

/// Read one value per declared column, or name the first missing field.
fn read_record<'s>(record: Node<'_, '_>, schema: &'s Schema) -> std::result::Result<Row, &'s str> {
    schema
        .columns()
        .iter()
        .map(|field| -> std::result::Result<Value, &'s str> {
            let child = record
                .children()
                .find(|c| c.is_element() && c.has_tag_name(field.as_str()))
                .ok_or(field.as_str())?;
            Ok(match child.text().map(str::trim) {
                Some(text) if !text.is_empty() => Value::Text(text.to_string()),
                _ => Value::Null,
            })
        })
        .collect()
}
