//! Shared styling utilities for console output.

use console::Style;
use patchtester_core::report::Outcome;

/// Create a success-styled string (green with checkmark).
pub fn success(msg: &str) -> String {
    let style = Style::new().green();
    format!("{} {}", style.apply_to("✓"), msg)
}

/// Create an error-styled string (red with cross).
pub fn error(msg: &str) -> String {
    let style = Style::new().red();
    format!("{} {}", style.apply_to("✗"), msg)
}

/// Create a warning-styled string (yellow).
pub fn warn(msg: &str) -> String {
    let style = Style::new().yellow();
    format!("{} {}", style.apply_to("⚠"), msg)
}

/// Create a header-styled string (bold, white).
pub fn header(msg: &str) -> String {
    let style = Style::new().bold();
    style.apply_to(msg).to_string()
}

/// Create a dim-styled string.
pub fn dim(msg: &str) -> String {
    let style = Style::new().dim();
    style.apply_to(msg).to_string()
}

/// Table colour for an outcome.
pub fn outcome_color(outcome: Outcome) -> comfy_table::Color {
    match outcome {
        Outcome::Success => comfy_table::Color::Green,
        Outcome::Warning => comfy_table::Color::Yellow,
        Outcome::Failed => comfy_table::Color::Red,
    }
}
