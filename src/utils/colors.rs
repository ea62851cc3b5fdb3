// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipeforge contributors

//! Terminal color utilities
//!
//! Provides consistent status marks across the CLI.

use colored::{ColoredString, Colorize};

/// Mark for a passed check
pub fn success_mark() -> ColoredString {
    "✓".green()
}

/// Mark for a non-fatal finding
pub fn warning_mark() -> ColoredString {
    "⚠".yellow()
}

/// Print a success check
pub fn print_success(msg: &str) {
    println!("  {} {}", success_mark(), msg);
}

/// Print a warning
pub fn print_warning(msg: &str) {
    println!("  {} {}", warning_mark(), msg);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_marks_keep_their_glyphs() {
        colored::control::set_override(false);
        assert_eq!(success_mark().to_string(), "✓");
        assert_eq!(warning_mark().to_string(), "⚠");
        colored::control::unset_override();
    }
}
