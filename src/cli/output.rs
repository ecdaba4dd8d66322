//! Output formatting for CLI

use std::path::Path;

use anyhow::Result;
use data_package_sdk::{Row, storage};
use serde_json::Value as JsonValue;

use crate::RowFormat;

/// Print validation errors to stderr
pub fn print_errors(errors: &[String]) {
    eprintln!("\n⚠️  Validation Errors:");
    for error in errors {
        eprintln!("  - {}", error);
    }
}

/// Write pretty JSON to a file, or stdout when no file is given
pub async fn write_json(value: &JsonValue, output: Option<&Path>) -> Result<()> {
    let content = serde_json::to_string_pretty(value)?;
    match output {
        Some(path) => {
            storage::write_location(&path.to_string_lossy(), content.as_bytes()).await?;
            eprintln!("✅ Written to {}", path.display());
        }
        None => println!("{}", content),
    }
    Ok(())
}

fn cell(value: &JsonValue) -> String {
    match value {
        JsonValue::String(s) => s.clone(),
        JsonValue::Null => String::new(),
        other => other.to_string(),
    }
}

/// Render rows as aligned text columns. Invalid rows are listed after the
/// table with their errors.
pub fn format_table(rows: &[Row]) -> String {
    let mut headers: Vec<String> = Vec::new();
    let mut lines: Vec<Vec<String>> = Vec::new();
    let mut invalid = Vec::new();

    for row in rows {
        match row {
            Row::Keyed(keyed) => {
                if headers.is_empty() {
                    headers = keyed.keys().map(str::to_string).collect();
                }
                lines.push(keyed.values().map(|v| cell(&v.to_json())).collect());
            }
            Row::Invalid { row_number, error } => invalid.push(format!("  - row {}: {}", row_number, error)),
            other => {
                if let Some(values) = other.values() {
                    lines.push(values.iter().map(|v| cell(&v.to_json())).collect());
                }
            }
        }
    }

    let columns = lines.iter().map(Vec::len).chain([headers.len()]).max().unwrap_or(0);
    let widths: Vec<usize> = (0..columns)
        .map(|i| {
            lines
                .iter()
                .chain([&headers])
                .filter_map(|line| line.get(i))
                .map(|c| c.chars().count())
                .max()
                .unwrap_or(0)
        })
        .collect();

    let render = |line: &[String]| -> String {
        line.iter()
            .zip(&widths)
            .map(|(c, w)| format!("{:<width$}", c, width = *w))
            .collect::<Vec<_>>()
            .join("  ")
            .trim_end()
            .to_string()
    };

    let mut output = String::new();
    if !headers.is_empty() {
        output.push_str(&render(&headers));
        output.push('\n');
    }
    for line in &lines {
        output.push_str(&render(line));
        output.push('\n');
    }
    if !invalid.is_empty() {
        output.push_str(&format!("\n⚠️  {} invalid row(s):\n", invalid.len()));
        output.push_str(&invalid.join("\n"));
        output.push('\n');
    }
    output
}

/// Print rows in the requested format
pub fn print_rows(rows: &[Row], format: RowFormat) {
    match format {
        RowFormat::Json => {
            for row in rows {
                println!("{}", row.to_json());
            }
        }
        RowFormat::Table => print!("{}", format_table(rows)),
    }
}
