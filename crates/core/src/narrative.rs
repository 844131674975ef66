//! Append-only merge policy for the cumulative inquiry narrative.
//!
//! The stored summary only ever grows: every committed update produces text that has the
//! previous summary as an exact prefix.

use crate::errors::DomainError;

pub const NARRATIVE_SEPARATOR: &str = "\n";

/// Appends `fragment` to `existing` without touching prior history.
///
/// Not idempotent: appending the same fragment twice records it twice.
pub fn append_narrative(existing: &str, fragment: &str) -> String {
    if existing.is_empty() {
        return fragment.to_owned();
    }

    let separator = if existing.ends_with(char::is_whitespace) { "" } else { NARRATIVE_SEPARATOR };
    let mut merged = String::with_capacity(existing.len() + separator.len() + fragment.len());
    merged.push_str(existing);
    merged.push_str(separator);
    merged.push_str(fragment);
    merged
}

/// Reduces a submitted narrative to the part not already recorded.
///
/// Agents sometimes resend the whole summary followed by the new sentence. When `submitted`
/// starts with `existing` and the match ends on a whitespace boundary, only the remainder is
/// returned. A submission that adds nothing is rejected so the caller notices it sent no new
/// history.
pub fn narrative_delta<'a>(existing: &str, submitted: &'a str) -> Result<&'a str, DomainError> {
    let delta = match submitted.strip_prefix(existing) {
        Some(rest) if !existing.is_empty() && ends_on_boundary(existing, rest) => rest,
        _ => submitted,
    };

    let delta = delta.trim();
    if delta.is_empty() {
        return Err(DomainError::Validation(
            "narrative must add a new non-empty fragment to the cumulative summary".to_owned(),
        ));
    }
    Ok(delta)
}

fn ends_on_boundary(existing: &str, rest: &str) -> bool {
    rest.is_empty()
        || rest.starts_with(char::is_whitespace)
        || existing.ends_with(char::is_whitespace)
}

/// Requires a non-blank fragment and returns it trimmed.
pub fn require_fragment<'a>(field: &str, fragment: &'a str) -> Result<&'a str, DomainError> {
    let trimmed = fragment.trim();
    if trimmed.is_empty() {
        return Err(DomainError::Validation(format!("{field} must not be blank")));
    }
    Ok(trimmed)
}

pub fn rejection_fragment(reason: &str) -> String {
    let reason = reason.trim().trim_end_matches('.');
    format!("The buyer rejected the vendor response: {reason}.")
}
