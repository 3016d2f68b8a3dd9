//! TechTree merge: first writer wins per tech id.
//!
//! Unlocks are permanent. A tech block already in the converged tree is never
//! replaced or removed, and a new id is charged exactly once. Re-uploading the
//! same tree, or any subset of it, changes nothing.

use std::collections::HashSet;

use concord_format::{Blocks, Header};

/// Tech blocks are any header starting with `Tech`.
pub const TECH_HEADER: Header<'static> = Header::Prefix("Tech");

/// Outcome of merging one TechTree upload.
#[derive(Debug, Clone, PartialEq)]
pub struct TechMerge {
    /// New converged tree text.
    pub text: String,
    /// Ids accepted from this upload, in upload order.
    pub unlocked: Vec<String>,
    /// Total `cost` of accepted ids. Zero when seeding.
    pub unlocked_cost: f64,
    /// True when there was no prior tree and this upload created it.
    pub seeded: bool,
}

impl TechMerge {
    /// Whether the converged record needs writing. An upload with no usable
    /// tech blocks does not seed the tree.
    pub fn changed(&self) -> bool {
        !self.unlocked.is_empty()
    }
}

/// Merge an uploaded tech tree into the converged tree.
///
/// With no prior tree the upload seeds it and nothing is charged: the seeding
/// client already paid for those techs in its own game.
pub fn merge_tech_tree(existing: Option<&str>, upload: &str) -> TechMerge {
    let seeded = existing.is_none();
    let existing_blocks: Vec<_> = existing
        .map(|text| Blocks::nested(text, TECH_HEADER).collect())
        .unwrap_or_default();

    let mut known: HashSet<String> = existing_blocks
        .iter()
        .filter_map(|b| b.id().map(str::to_string))
        .collect();

    let mut raws: Vec<String> = existing_blocks.iter().map(|b| b.raw().to_string()).collect();
    let mut unlocked = Vec::new();
    let mut unlocked_cost = 0.0;

    for block in Blocks::nested(upload, TECH_HEADER) {
        let Some(id) = block.id() else {
            continue;
        };
        if !known.insert(id.to_string()) {
            continue;
        }
        if !seeded {
            unlocked_cost += block.float_field("cost").unwrap_or(0.0);
        }
        unlocked.push(id.to_string());
        raws.push(block.raw().to_string());
    }

    let mut text = raws.join("\n");
    if !text.is_empty() {
        text.push('\n');
    }

    TechMerge {
        text,
        unlocked,
        unlocked_cost,
        seeded,
    }
}
