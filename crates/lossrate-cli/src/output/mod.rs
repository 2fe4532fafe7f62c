pub mod csv_out;
pub mod table;

use crate::OutputFormat;
use lossrate_core::forecast::RateTable;
use serde_json::Value;

/// Dispatch output to the appropriate formatter.
pub fn format_output(format: &OutputFormat, value: &Value) {
    match format {
        OutputFormat::Json => print_json(value),
        OutputFormat::Table => table::print_table(value),
        OutputFormat::Csv => csv_out::print_csv(value),
    }
}

fn print_json(value: &Value) {
    match serde_json::to_string_pretty(value) {
        Ok(s) => println!("{}", s),
        Err(e) => eprintln!("JSON serialization error: {}", e),
    }
}

/// The loss-rate table inside a forecast envelope, if `value` is one.
pub fn embedded_rate_table(value: &Value) -> Option<RateTable> {
    let table = value.get("result")?.get("loss_rates")?;
    serde_json::from_value(table.clone()).ok()
}

/// Display form of a table cell. Missing cells are blank.
pub fn format_cell(cell: Option<rust_decimal::Decimal>) -> String {
    cell.map(|v| v.normalize().to_string()).unwrap_or_default()
}
