//! CSV rate tables.
//!
//! Layout: the header row holds the index name (often blank) followed by the
//! column labels; every other row holds a row label followed by one value per
//! column. Blank, `NaN` or otherwise non-numeric values are read as missing.

use lossrate_core::forecast::RateTable;
use rust_decimal::Decimal;
use std::fs::File;
use std::io::Read;
use std::str::FromStr;

use crate::input::file::resolve_path;

/// Read a rate table from a CSV file.
pub fn read_rate_table(path: &str) -> Result<RateTable, Box<dyn std::error::Error>> {
    let canonical = resolve_path(path)?;
    let file = File::open(&canonical)
        .map_err(|e| format!("Failed to read '{}': {}", canonical.display(), e))?;
    parse_rate_table(file)
        .map_err(|e| format!("Failed to parse '{}': {}", canonical.display(), e).into())
}

/// Parse a rate table from any CSV source.
pub fn parse_rate_table<R: Read>(reader: R) -> Result<RateTable, Box<dyn std::error::Error>> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = rdr.headers()?.clone();
    let mut header_iter = headers.iter();
    let index_name = header_iter
        .next()
        .ok_or("CSV table has no header row")?
        .to_string();
    let column_labels: Vec<String> = header_iter.map(str::to_string).collect();

    let mut row_labels = Vec::new();
    let mut cells = Vec::new();
    for record in rdr.records() {
        let record = record?;
        let mut fields = record.iter();
        let label = fields.next().unwrap_or_default().to_string();
        row_labels.push(label);
        cells.push(fields.map(parse_cell).collect::<Vec<_>>());
    }

    Ok(RateTable::new(row_labels, column_labels, cells)?.with_index_name(index_name))
}

/// Decimal value of a cell, accepting plain and scientific notation.
fn parse_cell(raw: &str) -> Option<Decimal> {
    if raw.is_empty() {
        return None;
    }
    Decimal::from_str(raw)
        .or_else(|_| Decimal::from_scientific(raw))
        .ok()
}
