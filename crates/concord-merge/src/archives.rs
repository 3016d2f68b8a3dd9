//! ScienceArchives: per-subject maximum of `sci`, clamped to `cap`.

use std::collections::BTreeMap;

use concord_format::{format_float, Block, Blocks, Header};

/// Archived subjects are `Science` blocks.
pub const SCIENCE_HEADER: Header<'static> = Header::Exact("Science");

struct Subject {
    block: Block,
    sci: Option<f64>,
    cap: Option<f64>,
}

/// Merge an archive upload into the converged archive.
///
/// For every subject id the converged `sci` is the largest value seen so far,
/// clamped to the latest known `cap`. The block that carried the largest value
/// is kept and rewritten with the merged numbers. Output is ordered by id.
pub fn merge_archives(existing: Option<&str>, upload: &str) -> String {
    let mut subjects: BTreeMap<String, Subject> = BTreeMap::new();

    if let Some(text) = existing {
        for block in Blocks::nested(text, SCIENCE_HEADER) {
            let Some(id) = block.id().map(str::to_string) else {
                continue;
            };
            subjects.insert(
                id,
                Subject {
                    sci: block.float_field("sci"),
                    cap: block.float_field("cap"),
                    block,
                },
            );
        }
    }

    for block in Blocks::nested(upload, SCIENCE_HEADER) {
        let Some(id) = block.id().map(str::to_string) else {
            continue;
        };
        let sci = block.float_field("sci");
        let cap = block.float_field("cap");

        let merged = match subjects.remove(&id) {
            None => absorb(block, sci, cap),
            Some(prev) => {
                let cap = cap.or(prev.cap);
                let best = match (sci, prev.sci) {
                    (Some(a), Some(b)) => Some(a.max(b)),
                    (a, b) => a.or(b),
                };
                let upload_wins = match (sci, prev.sci) {
                    (Some(a), Some(b)) => a >= b,
                    (Some(_), None) => true,
                    (None, Some(_)) => false,
                    (None, None) => true,
                };
                let base = if upload_wins { block } else { prev.block };
                absorb(base, best, cap)
            }
        };
        subjects.insert(id, merged);
    }

    let mut text = subjects
        .values()
        .map(|s| s.block.raw())
        .collect::<Vec<_>>()
        .join("\n");
    if !text.is_empty() {
        text.push('\n');
    }
    text
}

/// Rewrite `block` with the merged values, clamping `sci` to `cap`.
fn absorb(block: Block, sci: Option<f64>, cap: Option<f64>) -> Subject {
    let sci = match (sci, cap) {
        (Some(sci), Some(cap)) => Some(sci.min(cap)),
        (sci, _) => sci,
    };
    let mut block = block;
    if let Some(sci) = sci {
        block = block.with_field("sci", &format_float(sci));
    }
    if let Some(cap) = cap {
        block = block.with_field("cap", &format_float(cap));
    }
    Subject { block, sci, cap }
}

/// Sorted, de-duplicated subject ids of an archive.
pub fn archive_ids(text: &str) -> Vec<String> {
    let mut ids: Vec<String> = Blocks::nested(text, SCIENCE_HEADER)
        .filter_map(|b| b.id().map(str::to_string))
        .collect();
    ids.sort();
    ids.dedup();
    ids
}
