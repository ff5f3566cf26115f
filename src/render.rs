//! Plain-text rendering of query results.
//!
//! Renders a `QueryResult` as a bordered table with auto-sized columns,
//! followed by a one-line summary.

use crate::db::{QueryResult, Row};

/// Maximum width for any column.
const MAX_COLUMN_WIDTH: usize = 40;

/// Minimum width for any column.
const MIN_COLUMN_WIDTH: usize = 4;

const NULL_TEXT: &str = "NULL";

/// Renders the result as a table. Returns `(empty result)` when there are no
/// columns.
pub fn render_table(result: &QueryResult) -> String {
    if result.columns.is_empty() {
        return "(empty result)".to_string();
    }

    let widths = column_widths(result);
    let mut lines = Vec::with_capacity(result.rows.len() + 4);

    lines.push(border(&widths, '┌', '┬', '┐'));
    lines.push(line(
        result.columns.iter().map(|c| c.name.clone()),
        &widths,
    ));
    lines.push(border(&widths, '├', '┼', '┤'));
    for row in &result.rows {
        lines.push(line(cells(row, widths.len()), &widths));
    }
    lines.push(border(&widths, '└', '┴', '┘'));

    lines.join("\n")
}

/// Renders the row count, execution time and any truncation warning.
pub fn render_summary(result: &QueryResult) -> String {
    let mut summary = format!(
        "{} row{} returned ({}ms)",
        result.row_count,
        if result.row_count == 1 { "" } else { "s" },
        result.execution_time.as_millis()
    );

    if let Some(warning) = result.truncation_warning() {
        summary.push('\n');
        summary.push_str(&warning);
    }

    summary
}

/// Calculates the width of each column, capped at `MAX_COLUMN_WIDTH`.
fn column_widths(result: &QueryResult) -> Vec<usize> {
    let mut widths: Vec<usize> = result
        .columns
        .iter()
        .map(|col| display_width(&col.name).max(MIN_COLUMN_WIDTH))
        .collect();

    for row in &result.rows {
        for (i, cell) in cells(row, widths.len()).enumerate() {
            widths[i] = widths[i].max(display_width(&cell));
        }
    }

    widths.iter().map(|&w| w.min(MAX_COLUMN_WIDTH)).collect()
}

/// Display text for each cell of a row, padded with NULL for short rows.
fn cells(row: &Row, columns: usize) -> impl Iterator<Item = String> + '_ {
    (0..columns).map(move |i| match row.get(i) {
        Some(value) if !value.is_null() => single_line(&value.to_display_string()),
        _ => NULL_TEXT.to_string(),
    })
}

/// Newlines and tabs would break the table layout.
fn single_line(s: &str) -> String {
    s.replace(['\n', '\r', '\t'], " ")
}

fn display_width(s: &str) -> usize {
    s.chars().count()
}

/// Truncates a string to fit within the given width, adding ellipsis if needed.
fn truncate(s: &str, max_width: usize) -> String {
    if display_width(s) <= max_width {
        s.to_string()
    } else if max_width <= 3 {
        s.chars().take(max_width).collect()
    } else {
        let kept: String = s.chars().take(max_width - 3).collect();
        format!("{}...", kept)
    }
}

fn line(values: impl Iterator<Item = String>, widths: &[usize]) -> String {
    let mut out = String::from("│");
    for (value, &width) in values.zip(widths) {
        let text = truncate(&value, width);
        let padding = width - display_width(&text);
        out.push(' ');
        out.push_str(&text);
        out.push_str(&" ".repeat(padding));
        out.push_str(" │");
    }
    out
}

fn border(widths: &[usize], left: char, mid: char, right: char) -> String {
    let mut out = String::new();
    out.push(left);
    for (i, &width) in widths.iter().enumerate() {
        if i > 0 {
            out.push(mid);
        }
        out.push_str(&"─".repeat(width + 2));
    }
    out.push(right);
    out
}
