use std::fs::File;
use std::io::Write;
use std::path::Path;

use serde::Serialize;

use super::Record;
use crate::error::Result;

#[derive(Debug, Serialize)]
struct CsvRow<'a> {
    timestamp: f64,
    iface: &'a str,
    can_id: u32,
    data: String,
    pgn: u32,
    priority: u8,
    destination: Option<u8>,
    source: u8,
    label: &'a str,
    rule_name: &'a str,
    rule_type: &'a str,
    semantics: &'a str,
    rule_severity: &'a str,
    rule_layer: &'a str,
    rule_description: &'a str,
    context_pgn: Option<u32>,
    context_value: Option<f64>,
}

impl<'a> From<&'a Record> for CsvRow<'a> {
    fn from(r: &'a Record) -> Self {
        Self {
            timestamp: r.timestamp,
            iface: &r.iface,
            can_id: r.can_id,
            data: r.data_hex(),
            pgn: r.pgn,
            priority: r.priority,
            destination: r.destination,
            source: r.source,
            label: &r.label,
            rule_name: &r.rule_name,
            rule_type: &r.rule_type,
            semantics: &r.semantics,
            rule_severity: &r.rule_severity,
            rule_layer: &r.rule_layer,
            rule_description: &r.rule_description,
            context_pgn: r.context_pgn,
            context_value: r.context_value,
        }
    }
}

/// Writes labeled records as CSV, header first
pub fn write_csv<W: Write>(writer: W, records: &[Record]) -> Result<()> {
    let mut csv = csv::Writer::from_writer(writer);
    if records.is_empty() {
        csv.write_record(HEADER)?;
    }
    for record in records {
        csv.serialize(CsvRow::from(record))?;
    }
    csv.flush()?;
    Ok(())
}

/// Writes labeled records to a CSV file
pub fn write_csv_file<P: AsRef<Path>>(path: P, records: &[Record]) -> Result<()> {
    let file = File::create(path)?;
    write_csv(file, records)
}

/// Column order of the CSV output
pub const HEADER: [&str; 17] = [
    "timestamp",
    "iface",
    "can_id",
    "data",
    "pgn",
    "priority",
    "destination",
    "source",
    "label",
    "rule_name",
    "rule_type",
    "semantics",
    "rule_severity",
    "rule_layer",
    "rule_description",
    "context_pgn",
    "context_value",
];
