use lossrate_core::forecast::RateTable;
use serde_json::Value;
use std::io;

use super::{embedded_rate_table, format_cell};

/// Write output as CSV to stdout.
///
/// A forecast envelope is written as the loss-rate grid itself, in the same
/// layout the bad-rate tables are read in.
pub fn print_csv(value: &Value) {
    let stdout = io::stdout();
    let mut wtr = csv::Writer::from_writer(stdout.lock());

    if let Some(table) = embedded_rate_table(value) {
        if let Err(e) = write_rate_table(&mut wtr, &table) {
            eprintln!("CSV write error: {}", e);
        }
        return;
    }

    match value {
        Value::Object(map) => {
            let _ = wtr.write_record(["field", "value"]);
            for (key, val) in map {
                let _ = wtr.write_record([key.as_str(), &format_csv_value(val)]);
            }
        }
        Value::Array(arr) => {
            write_array_csv(&mut wtr, arr);
        }
        _ => {
            let _ = wtr.write_record([&format_csv_value(value)]);
        }
    }

    let _ = wtr.flush();
}

/// Write a rate table: index header and column labels, then one line per row.
pub fn write_rate_table<W: io::Write>(
    wtr: &mut csv::Writer<W>,
    table: &RateTable,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut header = Vec::with_capacity(table.n_columns() + 1);
    header.push(table.index_name.as_str());
    header.extend(table.column_labels.iter().map(String::as_str));
    wtr.write_record(&header)?;

    for (label, row) in table.row_labels.iter().zip(&table.cells) {
        let mut record = Vec::with_capacity(row.len() + 1);
        record.push(label.clone());
        record.extend(row.iter().map(|cell| format_cell(*cell)));
        wtr.write_record(&record)?;
    }

    wtr.flush()?;
    Ok(())
}

fn write_array_csv<W: io::Write>(wtr: &mut csv::Writer<W>, arr: &[Value]) {
    if arr.is_empty() {
        return;
    }

    if let Some(Value::Object(first)) = arr.first() {
        let headers: Vec<&str> = first.keys().map(|k| k.as_str()).collect();
        let _ = wtr.write_record(&headers);

        for item in arr {
            if let Value::Object(map) = item {
                let row: Vec<String> = headers
                    .iter()
                    .map(|h| map.get(*h).map(format_csv_value).unwrap_or_default())
                    .collect();
                let _ = wtr.write_record(&row);
            }
        }
    } else {
        for item in arr {
            let _ = wtr.write_record([&format_csv_value(item)]);
        }
    }
}

fn format_csv_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => String::new(),
        _ => serde_json::to_string(value).unwrap_or_default(),
    }
}
