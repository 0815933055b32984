//! Cron expression syntax check
//!
//! Accepts standard 5-field cron syntax:
//! ```text
//! ┌───────────── minute
//! │ ┌───────────── hour
//! │ │ ┌───────────── day of month
//! │ │ │ ┌───────────── month
//! │ │ │ │ ┌───────────── day of week
//! │ │ │ │ │
//! * * * * *
//! ```
//!
//! Each field is `*` or a comma-separated list of terms. A term is a number with
//! an optional `L`, `W` or `#N` suffix, optionally followed by `-` and a second
//! such number, optionally followed by `/step`.
//!
//! Only the shape is checked. Numeric bounds are left to the model explaining it.

use crate::error::{RelayError, Result};

const FIELD_NAMES: [&str; 5] = ["minute", "hour", "day of month", "month", "day of week"];

/// Check that `expression` is a syntactically valid 5-field cron expression.
pub fn validate_expression(expression: &str) -> Result<()> {
    let parts: Vec<&str> = expression.split_whitespace().collect();

    if parts.len() != FIELD_NAMES.len() {
        return Err(RelayError::validation(
            "expression",
            format!("Expected 5 fields, got {}", parts.len()),
        ));
    }

    for (part, name) in parts.iter().zip(FIELD_NAMES) {
        validate_field(part, name)?;
    }

    Ok(())
}

fn validate_field(field: &str, name: &str) -> Result<()> {
    if field == "*" {
        return Ok(());
    }

    for term in field.split(',') {
        if !is_valid_term(term) {
            return Err(RelayError::validation(
                "expression",
                format!("Invalid value '{}' in {} field", field, name),
            ));
        }
    }

    Ok(())
}

/// term := atom ['-' atom] ['/' number]
fn is_valid_term(term: &str) -> bool {
    let (range_part, step) = match term.split_once('/') {
        Some((range, step)) => (range, Some(step)),
        None => (term, None),
    };

    if let Some(step) = step {
        if !is_number(step) {
            return false;
        }
    }

    match range_part.split_once('-') {
        Some((start, end)) => is_atom(start) && is_atom(end),
        None => is_atom(range_part),
    }
}

/// atom := number | number 'L' | number 'W' | number '#' number
fn is_atom(atom: &str) -> bool {
    if let Some((day, nth)) = atom.split_once('#') {
        return is_number(day) && is_number(nth);
    }
    let digits = atom
        .strip_suffix('L')
        .or_else(|| atom.strip_suffix('W'))
        .unwrap_or(atom);
    is_number(digits)
}

fn is_number(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}
