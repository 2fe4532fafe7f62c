use lossrate_core::forecast::RateTable;
use serde_json::Value;
use tabled::{builder::Builder, Table};

use super::{embedded_rate_table, format_cell};

/// Format output as a table using the tabled crate.
pub fn print_table(value: &Value) {
    if let Some(rate_table) = embedded_rate_table(value) {
        println!("{}", build_rate_table(&rate_table));
        if let Value::Object(envelope) = value {
            print_envelope_notes(envelope);
        }
        return;
    }

    match value {
        Value::Object(_) => print_flat_object(value),
        Value::Array(arr) => print_array_table(arr),
        _ => println!("{}", value),
    }
}

/// Grid with the row labels down the left and column labels across the top.
pub fn build_rate_table(table: &RateTable) -> Table {
    let mut builder = Builder::default();

    let mut header = Vec::with_capacity(table.n_columns() + 1);
    header.push(table.index_name.clone());
    header.extend(table.column_labels.iter().cloned());
    builder.push_record(header);

    for (label, row) in table.row_labels.iter().zip(&table.cells) {
        let mut record = Vec::with_capacity(row.len() + 1);
        record.push(label.clone());
        record.extend(row.iter().map(|cell| format_cell(cell.map(|v| v.round_dp(6)))));
        builder.push_record(record);
    }

    builder.build()
}

fn print_envelope_notes(envelope: &serde_json::Map<String, Value>) {
    if let Some(Value::Array(warnings)) = envelope.get("warnings") {
        if !warnings.is_empty() {
            println!("\nWarnings:");
            for w in warnings {
                if let Value::String(s) = w {
                    println!("  - {}", s);
                }
            }
        }
    }

    if let Some(Value::String(meth)) = envelope.get("methodology") {
        println!("\nMethodology: {}", meth);
    }
}

fn print_flat_object(value: &Value) {
    if let Value::Object(map) = value {
        let mut builder = Builder::default();
        builder.push_record(["Field", "Value"]);
        for (key, val) in map {
            builder.push_record([key.as_str(), &format_value(val)]);
        }
        println!("{}", builder.build());
    }
}

fn print_array_table(arr: &[Value]) {
    if arr.is_empty() {
        println!("(empty)");
        return;
    }

    if let Some(Value::Object(first)) = arr.first() {
        let headers: Vec<String> = first.keys().cloned().collect();
        let mut builder = Builder::default();
        builder.push_record(headers.clone());

        for item in arr {
            if let Value::Object(map) = item {
                let row: Vec<String> = headers
                    .iter()
                    .map(|h| map.get(h).map(format_value).unwrap_or_default())
                    .collect();
                builder.push_record(row);
            }
        }
        println!("{}", builder.build());
    } else {
        for item in arr {
            println!("{}", format_value(item));
        }
    }
}

fn format_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => "null".to_string(),
        Value::Array(arr) => {
            let items: Vec<String> = arr.iter().map(format_value).collect();
            items.join(", ")
        }
        Value::Object(_) => serde_json::to_string(value).unwrap_or_default(),
    }
}
