//! SciencePoints: a monotonic high-water mark.
//!
//! The stored value only rises through uploads. The one way down is a
//! TechTree unlock deducting its cost, floored at zero.

use concord_format::{Blocks, Header};

use crate::archives::SCIENCE_HEADER;
use crate::error::{MergeError, Result};
use crate::tech::TECH_HEADER;

/// Result of offering a new points value.
#[derive(Debug, Clone, PartialEq)]
pub enum PointsMerge {
    /// The value was stored; carries the new record text.
    Stored(String),
    /// The stored value is already at least as high.
    Unchanged,
}

/// Parse `sci = <number>` or a bare number.
pub fn parse_points(text: &str) -> Result<f64> {
    let value = text.rsplit('=').next().unwrap_or(text).trim();
    value
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| MergeError::InvalidNumber(value.to_string()))
}

/// Record text for a points value.
pub fn render_points(value: f64) -> String {
    format!("sci = {:.6}\n", value)
}

/// Offer an uploaded value against the stored record.
///
/// A malformed upload is an error. A malformed stored record is treated as
/// absent and overwritten.
pub fn merge_points(existing: Option<&str>, upload: &str) -> Result<PointsMerge> {
    let value = parse_points(upload)?;
    let current = existing.and_then(|text| parse_points(text).ok());

    match current {
        Some(current) if value <= current => Ok(PointsMerge::Unchanged),
        _ => Ok(PointsMerge::Stored(render_points(value))),
    }
}

/// Deduct an unlock cost from the stored record, floored at zero.
///
/// Returns `None` when there is no usable stored value. The deduction is then
/// skipped: there is nothing to subtract from.
pub fn deduct_points(existing: Option<&str>, cost: f64) -> Option<String> {
    let current = parse_points(existing?).ok()?;
    Some(render_points((current - cost).max(0.0)))
}

/// Points implied by the archives and the tree: archived science minus the
/// cost of every unlocked tech, floored at zero.
pub fn science_ledger(archives: Option<&str>, tech: Option<&str>) -> f64 {
    let earned: f64 = sum_field(archives, SCIENCE_HEADER, "sci");
    let spent: f64 = sum_field(tech, TECH_HEADER, "cost");
    (earned - spent).max(0.0)
}

fn sum_field(text: Option<&str>, header: Header<'_>, key: &str) -> f64 {
    text.map(|text| {
        Blocks::nested(text, header)
            .filter_map(|b| b.float_field(key))
            .sum::<f64>()
    })
    .unwrap_or(0.0)
}
