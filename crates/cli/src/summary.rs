//! Console summary of a report section.

use comfy_table::{presets::UTF8_FULL, Cell, ContentArrangement, Table};
use patchtester_core::report::{summary_counts, ReportSection};

use crate::style;

/// Render one pass as a table: request, change, result, first line of details.
pub fn section_table(section: &ReportSection) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["Request", "Change", "Result", "Details"]);

    for request in &section.requests {
        for record in &request.changes {
            let details = record.details.lines().next().unwrap_or_default();
            table.add_row(vec![
                Cell::new(&request.request_id),
                Cell::new(&record.source_change),
                Cell::new(record.result.to_string()).fg(style::outcome_color(record.result)),
                Cell::new(details),
            ]);
        }
    }
    table
}

/// Print the table and a one-line count for a pass.
pub fn print_section(section: &ReportSection) {
    println!();
    println!("{}", style::header(&section.subject));
    println!("{}", section_table(section));

    let counts = summary_counts(&section.requests);
    let line = format!(
        "{} changes: {} succeeded, {} with warnings, {} failed",
        counts.total(),
        counts.success,
        counts.warning,
        counts.failed
    );
    if counts.failed > 0 {
        println!("{}", style::error(&line));
    } else if counts.warning > 0 {
        println!("{}", style::warn(&line));
    } else {
        println!("{}", style::success(&line));
    }
}
