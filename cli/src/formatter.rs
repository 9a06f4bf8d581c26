//! Output formatters for query results
//!
//! Renders coerced rows as a box-drawn table, JSON or CSV, always in the
//! column order the server reported.

use dacp_link::TypedValue;
use serde_json::{Map, Value as JsonValue};

use crate::error::Result;
use crate::session::{OutputFormat, QueryOutput};

/// Maximum column width before truncation
const MAX_COLUMN_WIDTH: usize = 48;

/// Formats query results for display
pub struct OutputFormatter {
    format: OutputFormat,
}

impl OutputFormatter {
    /// Create a new formatter
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    pub fn format(&self) -> OutputFormat {
        self.format
    }

    /// Truncate a string to max width with ellipsis
    fn truncate_value(value: &str, max_width: usize) -> String {
        if value.chars().count() <= max_width {
            value.to_string()
        } else if max_width <= 3 {
            value.chars().take(max_width).collect()
        } else {
            let take = max_width - 3;
            format!("{}...", value.chars().take(take).collect::<String>())
        }
    }

    /// Format the result of one statement
    pub fn format_output(&self, output: &QueryOutput) -> Result<String> {
        match self.format {
            OutputFormat::Table => Ok(self.format_table(output)),
            OutputFormat::Json => self.format_json(output),
            OutputFormat::Csv => Ok(self.format_csv(output)),
        }
    }

    /// Format as table
    fn format_table(&self, output: &QueryOutput) -> String {
        let columns = output.column_names();
        let row_count = output.rows.len();
        let row_label = if row_count == 1 { "row" } else { "rows" };
        let footer = format!("({} {})\n\nTook: {:.3} ms", row_count, row_label, output.took_ms);

        if columns.is_empty() {
            return footer;
        }

        let mut col_widths: Vec<usize> = columns.iter().map(|c| c.chars().count()).collect();
        let mut string_rows: Vec<Vec<String>> = Vec::with_capacity(row_count);
        for row in &output.rows {
            let mut srow = Vec::with_capacity(columns.len());
            for i in 0..columns.len() {
                let value = row.get(i).map(|v| v.to_string()).unwrap_or_default();
                col_widths[i] = col_widths[i].max(value.chars().count());
                srow.push(value);
            }
            string_rows.push(srow);
        }
        for width in col_widths.iter_mut() {
            *width = (*width).min(MAX_COLUMN_WIDTH);
        }

        let mut text = String::new();
        push_border(&mut text, &col_widths, '┌', '┬', '┐');
        push_cells(&mut text, &columns, &col_widths);
        push_border(&mut text, &col_widths, '├', '┼', '┤');
        for srow in &string_rows {
            push_cells(&mut text, srow, &col_widths);
        }
        push_border(&mut text, &col_widths, '└', '┴', '┘');
        text.push_str(&footer);
        text
    }

    /// Format as a JSON array of objects keyed by column name
    fn format_json(&self, output: &QueryOutput) -> Result<String> {
        let columns = output.column_names();
        let rows: Vec<JsonValue> = output
            .rows
            .iter()
            .map(|row| {
                let mut object = Map::new();
                for (name, value) in columns.iter().zip(row.iter()) {
                    object.insert(name.clone(), value.to_json());
                }
                JsonValue::Object(object)
            })
            .collect();
        Ok(serde_json::to_string_pretty(&JsonValue::Array(rows))?)
    }

    /// Format as CSV
    fn format_csv(&self, output: &QueryOutput) -> String {
        let columns = output.column_names();
        if columns.is_empty() {
            return String::new();
        }

        let header: Vec<String> = columns.iter().map(|c| Self::escape_csv(c)).collect();
        let mut text = header.join(",") + "\n";
        for row in &output.rows {
            let values: Vec<String> = row.iter().map(Self::format_csv_value).collect();
            text.push_str(&values.join(","));
            text.push('\n');
        }
        text
    }

    /// Nulls are empty cells in CSV
    fn format_csv_value(value: &TypedValue) -> String {
        if value.is_null() {
            return String::new();
        }
        Self::escape_csv(&value.to_string())
    }

    fn escape_csv(s: &str) -> String {
        if s.contains(',') || s.contains('"') || s.contains('\n') {
            format!("\"{}\"", s.replace('"', "\"\""))
        } else {
            s.to_string()
        }
    }
}

fn push_border(text: &mut String, widths: &[usize], left: char, mid: char, right: char) {
    text.push(left);
    for (idx, width) in widths.iter().enumerate() {
        text.push_str(&"─".repeat(width + 2));
        text.push(if idx == widths.len() - 1 { right } else { mid });
    }
    text.push('\n');
}

fn push_cells(text: &mut String, cells: &[String], widths: &[usize]) {
    text.push('│');
    for (cell, width) in cells.iter().zip(widths) {
        text.push(' ');
        let truncated = OutputFormatter::truncate_value(cell, *width);
        text.push_str(&format!("{:width$}", truncated, width = *width));
        text.push_str(" │");
    }
    text.push('\n');
}
