//! Concord Module Mergers
//!
//! Each scenario module converges under its own rule. Every merger is a pure
//! function from (previous converged text, upload) to new converged text, so
//! the storage layer only has to serialize read-merge-write per key.
//!
//! | module | rule |
//! |---|---|
//! | `TechTree` | first writer wins per tech id; newly unlocked cost is charged once |
//! | `SciencePoints` | high-water mark |
//! | `ScienceArchives` | per-subject max of `sci`, clamped to `cap` |
//! | `SCANcontroller` | per-user snapshots folded with bitwise OR of coverage |
//!
//! The orbit board (latest `updatedUT` per user) lives here too since it is
//! the same shape of problem.
//!
//! # Laws
//!
//! - Idempotence: merging an upload twice yields the same state.
//! - Monotonicity: science and coverage never go backwards under merge.
//! - Commutativity: coverage bitmaps do not depend on fold order.

pub mod archives;
pub mod bitmap;
pub mod coverage;
pub mod error;
pub mod orbits;
pub mod points;
pub mod tech;

pub use archives::{archive_ids, merge_archives};
pub use bitmap::CoverageMap;
pub use coverage::{normalize, ScanFold, EMPTY_CONTROLLER};
pub use error::{MergeError, Result};
pub use orbits::{render_orbits, OrbitRecord};
pub use points::{deduct_points, merge_points, parse_points, render_points, science_ledger, PointsMerge};
pub use tech::{merge_tech_tree, TechMerge};

/// Scenario modules with a convergence rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Module {
    TechTree,
    SciencePoints,
    ScienceArchives,
    ScanController,
}

impl Module {
    /// Every module, in lock order.
    pub const ALL: [Module; 4] = [
        Module::TechTree,
        Module::SciencePoints,
        Module::ScienceArchives,
        Module::ScanController,
    ];

    /// Look up a module by its wire name.
    pub fn from_name(name: &str) -> Option<Module> {
        Self::ALL.into_iter().find(|m| m.name() == name)
    }

    /// Wire and record name.
    pub const fn name(self) -> &'static str {
        match self {
            Module::TechTree => "TechTree",
            Module::SciencePoints => "SciencePoints",
            Module::ScienceArchives => "ScienceArchives",
            Module::ScanController => "SCANcontroller",
        }
    }

    /// Whether uploads are stored per user and folded on read.
    pub const fn is_per_user(self) -> bool {
        matches!(self, Module::ScanController)
    }
}

impl std::fmt::Display for Module {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn module_names_round_trip() {
        for module in Module::ALL {
            assert_eq!(Module::from_name(module.name()), Some(module));
        }
        assert_eq!(Module::from_name("Vessels"), None);
        assert_eq!(Module::from_name("scancontroller"), None);
    }

    #[test]
    fn only_scan_coverage_is_per_user() {
        assert!(Module::ScanController.is_per_user());
        assert!(!Module::TechTree.is_per_user());
    }
}
