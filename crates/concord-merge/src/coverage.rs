//! SCANcontroller coverage fold.
//!
//! Every user uploads their own snapshot of the scanner state. The converged
//! record is rebuilt by folding all snapshots together:
//!
//! - `Vessel` blocks keyed by `guid`, last folded wins
//! - `Body` blocks keyed by `Name`, `Map` bitmaps OR-ed
//! - display flags OR-ed
//! - the last `SCANResources` block passed through
//!
//! Snapshots are folded in user-name order so the result is deterministic.

use std::collections::BTreeMap;

use concord_format::{first_block, reindent, Block, Blocks, Header};

use crate::bitmap::{union_encoded, CoverageMap};

/// Record and header name of the module.
pub const CONTROLLER: &str = "SCANcontroller";

/// Normalized form of an upload with no usable content.
pub const EMPTY_CONTROLLER: &str = "SCANcontroller\n{\n}\n";

/// Boolean display flags merged across users.
pub const HEADER_FLAGS: [&str; 8] = [
    "storageUpgraded",
    "mainMapVisible",
    "bigMapVisible",
    "zoomMapLegend",
    "overlay",
    "mainMap",
    "bigMap",
    "zoomMap",
];

/// Fields that belong to the `SCENARIO` wrapper, not the controller.
const WRAPPER_FIELDS: [&str; 2] = ["name", "scene"];

/// Reduce an upload to a bare, tab-indented `SCANcontroller` block.
///
/// Accepts a bare block anywhere in the text or a `SCENARIO` wrapper whose
/// `name` is `SCANcontroller`. Anything else normalizes to
/// [`EMPTY_CONTROLLER`].
pub fn normalize(text: &str) -> String {
    let text = text.replace("\r\n", "\n");

    if let Some(block) = first_block(&text, Header::Exact(CONTROLLER)) {
        return reindent(block.raw(), 0);
    }

    Blocks::nested(&text, Header::Exact("SCENARIO"))
        .find(|b| b.field("name") == Some(CONTROLLER))
        .map(|b| reindent(b.with_kind(CONTROLLER).without_fields(&WRAPPER_FIELDS).raw(), 0))
        .unwrap_or_else(|| EMPTY_CONTROLLER.to_string())
}

fn truthy(value: &str) -> bool {
    matches!(value.to_ascii_lowercase().as_str(), "true" | "1" | "yes")
}

/// Accumulator for folding per-user snapshots.
#[derive(Debug, Clone, Default)]
pub struct ScanFold {
    scanners: BTreeMap<String, Block>,
    bodies: BTreeMap<String, Block>,
    flags: [Option<bool>; HEADER_FLAGS.len()],
    resources: Option<Block>,
}

impl ScanFold {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold in body coverage from a previously converged record.
    ///
    /// Only bitmaps are taken, so users regressing their own snapshot can
    /// never clear bits already in the converged view.
    pub fn seed_coverage(&mut self, converged: &str) {
        let normalized = normalize(converged);
        if let Some(root) = Block::parse(&normalized) {
            for body in section(&root, "Progress", "Body") {
                self.fold_body(body);
            }
        }
    }

    /// Fold one user's snapshot.
    pub fn fold(&mut self, snapshot: &str) {
        let normalized = normalize(snapshot);
        let Some(root) = Block::parse(&normalized) else {
            return;
        };

        for vessel in section(&root, "Scanners", "Vessel") {
            if let Some(guid) = vessel.field("guid") {
                self.scanners.insert(guid.to_string(), vessel);
            }
        }

        for body in section(&root, "Progress", "Body") {
            self.fold_body(body);
        }

        for (slot, name) in self.flags.iter_mut().zip(HEADER_FLAGS) {
            if let Some(value) = root.field(name) {
                *slot = Some(slot.unwrap_or(false) || truthy(value));
            }
        }

        if let Some(resources) = root.nested(Header::Exact("SCANResources")).next() {
            self.resources = Some(resources);
        }
    }

    fn fold_body(&mut self, body: Block) {
        let Some(name) = body.field("Name").map(str::to_string) else {
            return;
        };
        let merged = match self.bodies.remove(&name) {
            None => body,
            Some(prev) => {
                let map = union_encoded(
                    prev.field("Map").unwrap_or_default(),
                    body.field("Map").unwrap_or_default(),
                );
                if map.is_empty() {
                    body
                } else {
                    body.with_field("Map", &map)
                }
            }
        };
        self.bodies.insert(name, merged);
    }

    /// Decoded bitmap currently held for a body.
    pub fn body_map(&self, name: &str) -> Option<CoverageMap> {
        self.bodies
            .get(name)
            .and_then(|b| b.field("Map"))
            .and_then(CoverageMap::decode)
    }

    /// Scanned cells summed over every body.
    pub fn scanned_cells(&self) -> u32 {
        self.bodies
            .keys()
            .filter_map(|name| self.body_map(name))
            .map(|map| map.scanned_cells())
            .sum()
    }

    pub fn vessel_count(&self) -> usize {
        self.scanners.len()
    }

    /// Render the canonical converged `SCENARIO` block.
    pub fn render(&self) -> String {
        let mut out = String::from("SCENARIO\n{\n");
        out.push_str(&format!("\tname = {}\n", CONTROLLER));
        out.push_str("\tscene = 7, 5, 8\n");

        for (value, name) in self.flags.iter().zip(HEADER_FLAGS) {
            if let Some(value) = value {
                let value = if *value { "True" } else { "False" };
                out.push_str(&format!("\t{} = {}\n", name, value));
            }
        }

        out.push_str("\tScanners\n\t{\n");
        for vessel in self.scanners.values() {
            out.push_str(&reindent(vessel.raw(), 2));
        }
        out.push_str("\t}\n");

        out.push_str("\tProgress\n\t{\n");
        for body in self.bodies.values() {
            out.push_str(&reindent(body.raw(), 2));
        }
        out.push_str("\t}\n");

        if let Some(resources) = &self.resources {
            out.push_str(&reindent(resources.raw(), 1));
        }

        out.push_str("}\n");
        out
    }
}

/// Blocks named `item` inside the `container` section of `root`, or anywhere
/// in `root` when the section is missing.
fn section(root: &Block, container: &str, item: &str) -> Vec<Block> {
    match root.nested(Header::Exact(container)).next() {
        Some(section) => section.nested(Header::Exact(item)).collect(),
        None => root.nested(Header::Exact(item)).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine as _;
    use proptest::prelude::*;

    fn snapshot(flags: &str, vessels: &[(&str, &str)], bodies: &[(&str, &[u8])]) -> String {
        let mut out = format!("SCANcontroller\n{{\n{}", flags);
        out.push_str("\tScanners\n\t{\n");
        for (guid, name) in vessels {
            out.push_str(&format!("\t\tVessel\n\t\t{{\n\t\t\tguid = {}\n\t\t\tname = {}\n\t\t}}\n", guid, name));
        }
        out.push_str("\t}\n\tProgress\n\t{\n");
        for (name, map) in bodies {
            out.push_str(&format!(
                "\t\tBody\n\t\t{{\n\t\t\tName = {}\n\t\t\tMap = {}\n\t\t}}\n",
                name,
                STANDARD.encode(map)
            ));
        }
        out.push_str("\t}\n}\n");
        out
    }

    #[test]
    fn normalize_wrapped_equals_bare() {
        let bare = "SCANcontroller\n{\n\tmainMap = True\n}\n";
        let wrapped = "SCENARIO\n{\n\tname = SCANcontroller\n\tscene = 7, 5, 8\n\tmainMap = True\n}\n";
        assert_eq!(normalize(bare), normalize(wrapped));
        assert_eq!(normalize(wrapped), bare);
    }

    #[test]
    fn normalize_finds_deeply_nested_block() {
        let text = "GAME\r\n{\r\n    SCANcontroller\r\n    {\r\n        overlay = False\r\n    }\r\n}\r\n";
        assert_eq!(normalize(text), "SCANcontroller\n{\n\toverlay = False\n}\n");
    }

    #[test]
    fn normalize_ignores_unrelated_scenarios() {
        let text = "SCENARIO\n{\n\tname = ResearchAndDevelopment\n}\n";
        assert_eq!(normalize(text), EMPTY_CONTROLLER);
        assert_eq!(normalize(""), EMPTY_CONTROLLER);
    }

    #[test]
    fn vessels_are_last_folded_wins() {
        let mut fold = ScanFold::new();
        fold.fold(&snapshot("", &[("g1", "alice-probe")], &[]));
        fold.fold(&snapshot("", &[("g1", "bob-probe"), ("g2", "relay")], &[]));
        assert_eq!(fold.vessel_count(), 2);
        let out = fold.render();
        assert!(out.contains("name = bob-probe"));
        assert!(!out.contains("alice-probe"));
    }

    #[test]
    fn body_maps_are_or_ed() {
        let mut fold = ScanFold::new();
        fold.fold(&snapshot("", &[], &[("Mun", &[0b0011])]));
        fold.fold(&snapshot("", &[], &[("Mun", &[0b1000, 0x01]), ("Minmus", &[1])]));
        assert_eq!(fold.body_map("Mun").unwrap().as_bytes(), &[0b1011, 0x01]);
        assert_eq!(fold.body_map("Minmus").unwrap().as_bytes(), &[1]);
        assert_eq!(fold.scanned_cells(), 5);
    }

    #[test]
    fn flags_are_or_ed() {
        let mut fold = ScanFold::new();
        fold.fold(&snapshot("\tmainMap = False\n\toverlay = yes\n", &[], &[]));
        fold.fold(&snapshot("\tmainMap = TRUE\n", &[], &[]));
        let out = fold.render();
        assert!(out.contains("\tmainMap = True\n"));
        assert!(out.contains("\toverlay = True\n"));
        assert!(!out.contains("bigMap"));
    }

    #[test]
    fn resources_pass_through() {
        let mut fold = ScanFold::new();
        fold.fold("SCANcontroller\n{\n\tSCANResources\n\t{\n\t\tResourceType\n\t\t{\n\t\t\tresource = Ore\n\t\t}\n\t}\n}\n");
        let out = fold.render();
        assert!(out.contains("\tSCANResources\n\t{\n\t\tResourceType\n"));
        assert!(out.ends_with("\t}\n}\n"));
    }

    #[test]
    fn render_is_canonical_scenario() {
        let mut fold = ScanFold::new();
        fold.fold(&snapshot("", &[("g1", "probe")], &[("Kerbin", &[1])]));
        let out = fold.render();
        assert!(out.starts_with("SCENARIO\n{\n\tname = SCANcontroller\n\tscene = 7, 5, 8\n\tScanners\n\t{\n\t\tVessel\n\t\t{\n\t\t\tguid = g1\n"));
        assert!(out.contains("\tProgress\n\t{\n\t\tBody\n\t\t{\n\t\t\tName = Kerbin\n"));
        assert_eq!(normalize(&out).lines().next(), Some("SCANcontroller"));
    }

    #[test]
    fn empty_fold_renders_empty_sections() {
        let out = ScanFold::new().render();
        assert_eq!(
            out,
            "SCENARIO\n{\n\tname = SCANcontroller\n\tscene = 7, 5, 8\n\tScanners\n\t{\n\t}\n\tProgress\n\t{\n\t}\n}\n"
        );
    }

    #[test]
    fn seeded_coverage_survives_regression() {
        let mut first = ScanFold::new();
        first.fold(&snapshot("", &[], &[("Mun", &[0xFF])]));
        let converged = first.render();

        let mut second = ScanFold::new();
        second.seed_coverage(&converged);
        second.fold(&snapshot("", &[], &[("Mun", &[0x00])]));
        assert_eq!(second.body_map("Mun").unwrap().as_bytes(), &[0xFF]);
    }

    proptest! {
        #[test]
        fn coverage_is_commutative(
            maps in proptest::collection::vec(
                (0u8..3, proptest::collection::vec(any::<u8>(), 1..16)),
                1..6,
            ),
        ) {
            let names = ["Kerbin", "Mun", "Minmus"];
            let snapshots: Vec<String> = maps
                .iter()
                .map(|(body, map)| snapshot("", &[], &[(names[*body as usize], map.as_slice())]))
                .collect();

            let mut forward = ScanFold::new();
            snapshots.iter().for_each(|s| forward.fold(s));
            let mut backward = ScanFold::new();
            snapshots.iter().rev().for_each(|s| backward.fold(s));

            for name in names {
                prop_assert_eq!(forward.body_map(name), backward.body_map(name));
            }
        }

        #[test]
        fn coverage_never_shrinks(
            before in proptest::collection::vec(any::<u8>(), 1..16),
            after in proptest::collection::vec(any::<u8>(), 1..16),
        ) {
            let mut first = ScanFold::new();
            first.fold(&snapshot("", &[], &[("Duna", before.as_slice())]));

            let mut next = ScanFold::new();
            next.seed_coverage(&first.render());
            next.fold(&snapshot("", &[], &[("Duna", after.as_slice())]));

            let merged = next.body_map("Duna").unwrap();
            for (i, byte) in before.iter().enumerate() {
                prop_assert_eq!(merged.as_bytes()[i] & byte, *byte);
            }
        }
    }
}
