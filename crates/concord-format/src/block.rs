//! Typed blocks parsed out of save text.

use crate::scan::{apply_braces, header_token, matching_brace, opening_brace, Blocks, Header};

/// Field names that identify a block, in lookup order.
pub const ID_KEYS: [&str; 3] = ["id", "guid", "Name"];

/// A named, brace-delimited record.
///
/// `raw` is the verbatim source from the header token to the closing brace.
/// `kind`, `id` and `fields` are always derived from `raw`, so re-parsing
/// `raw` reproduces the same block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    kind: String,
    id: Option<String>,
    fields: Vec<(String, String)>,
    raw: String,
    /// Byte offset of the opening brace within `raw`.
    open: usize,
}

impl Block {
    /// Parse the first block in `raw`.
    ///
    /// Leading whitespace is skipped. Returns `None` if there is no header
    /// followed by a balanced brace pair.
    pub fn parse(raw: &str) -> Option<Block> {
        let start = raw.len() - raw.trim_start().len();
        let token = header_token(&raw[start..]);
        if token.is_empty() {
            return None;
        }
        let open = opening_brace(raw, start + token.len())?;
        let close = matching_brace(raw, open)?;
        Some(Self::from_span(raw, start, open, close))
    }

    /// Build a block from a located span. `open` and `close` index the braces.
    pub(crate) fn from_span(text: &str, start: usize, open: usize, close: usize) -> Block {
        let raw = &text[start..=close];
        let kind = header_token(raw).to_string();
        let fields = parse_fields(&text[open + 1..close]);
        let id = ID_KEYS.iter().find_map(|key| {
            fields
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.clone())
        });
        Block {
            kind,
            id,
            fields,
            raw: raw.to_string(),
            open: open - start,
        }
    }

    /// Header token (`Tech`, `Science`, `Vessel`, ...).
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// Identity from the first present `id`, `guid` or `Name` field.
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    /// Depth-1 `key = value` pairs in source order.
    pub fn fields(&self) -> &[(String, String)] {
        &self.fields
    }

    /// Original text of the block.
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Text between the outer braces.
    pub fn body(&self) -> &str {
        &self.raw[self.open + 1..self.raw.len() - 1]
    }

    /// Value of the first depth-1 field named `key`.
    pub fn field(&self, key: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Finite float value of a field. Absent and unparsable both give `None`.
    pub fn float_field(&self, key: &str) -> Option<f64> {
        self.field(key)
            .and_then(|v| v.parse::<f64>().ok())
            .filter(|v| v.is_finite())
    }

    /// Blocks nested inside this one, at any depth.
    pub fn nested<'h>(&self, header: Header<'h>) -> Blocks<'_, 'h> {
        Blocks::nested(self.body(), header)
    }

    /// Copy of this block with `key` set to `value`.
    ///
    /// An existing depth-1 `key = ...` line is rewritten in place with its
    /// indentation and line ending kept. Otherwise a new line is inserted just
    /// before the closing brace, indented like the block's other fields.
    pub fn with_field(&self, key: &str, value: &str) -> Block {
        let raw = &self.raw;
        let mut depth = 0usize;
        let mut offset = 0usize;
        let mut field_indent: Option<&str> = None;

        for line in raw.split_inclusive('\n') {
            let content = line.trim_end_matches(['\n', '\r']);
            let trimmed = content.trim_start();
            if depth == 1 && !content.contains(['{', '}']) {
                if let Some((k, _)) = trimmed.split_once('=') {
                    let indent = &content[..content.len() - trimmed.len()];
                    field_indent.get_or_insert(indent);
                    if k.trim() == key {
                        let mut out = String::with_capacity(raw.len() + value.len());
                        out.push_str(&raw[..offset]);
                        out.push_str(indent);
                        out.push_str(key);
                        out.push_str(" = ");
                        out.push_str(value);
                        out.push_str(&line[content.len()..]);
                        out.push_str(&raw[offset + line.len()..]);
                        return self.reparsed(out);
                    }
                }
            }
            depth = apply_braces(depth, content);
            offset += line.len();
        }

        let close = raw.len() - 1;
        let line_start = raw[..close].rfind('\n').map_or(0, |i| i + 1);
        let before_close = &raw[line_start..close];
        let mut out = String::with_capacity(raw.len() + key.len() + value.len() + 8);
        if line_start > 0 && before_close.trim().is_empty() {
            let indent = match field_indent {
                Some(indent) => indent.to_string(),
                None => format!("{}\t", before_close),
            };
            out.push_str(&raw[..line_start]);
            out.push_str(&format!("{}{} = {}\n", indent, key, value));
            out.push_str(&raw[line_start..]);
        } else {
            let indent = field_indent.unwrap_or("\t");
            out.push_str(raw[..close].trim_end());
            out.push_str(&format!("\n{}{} = {}\n}}", indent, key, value));
        }
        self.reparsed(out)
    }

    /// Copy of this block with every depth-1 line for `keys` removed.
    pub fn without_fields(&self, keys: &[&str]) -> Block {
        let mut out = String::with_capacity(self.raw.len());
        let mut depth = 0usize;

        for line in self.raw.split_inclusive('\n') {
            let content = line.trim_end_matches(['\n', '\r']);
            let strip = depth == 1
                && !content.contains(['{', '}'])
                && content
                    .split_once('=')
                    .is_some_and(|(k, _)| keys.contains(&k.trim()));
            if !strip {
                out.push_str(line);
            }
            depth = apply_braces(depth, content);
        }
        self.reparsed(out)
    }

    /// Copy of this block under a different header token.
    pub fn with_kind(&self, kind: &str) -> Block {
        let mut out = String::with_capacity(self.raw.len() + kind.len());
        out.push_str(kind);
        out.push_str(&self.raw[self.kind.len()..]);
        self.reparsed(out)
    }

    fn reparsed(&self, raw: String) -> Block {
        Block::parse(&raw).unwrap_or_else(|| self.clone())
    }
}

/// Collect depth-0 `key = value` lines of a block body.
fn parse_fields(body: &str) -> Vec<(String, String)> {
    let mut fields = Vec::new();
    let mut depth = 0usize;
    let mut line = String::new();

    for ch in body.chars() {
        match ch {
            '{' => {
                depth += 1;
                line.clear();
            }
            '}' => {
                depth = depth.saturating_sub(1);
                line.clear();
            }
            '\n' => {
                if depth == 0 {
                    push_field(&mut fields, &line);
                }
                line.clear();
            }
            _ if depth == 0 => line.push(ch),
            _ => {}
        }
    }
    if depth == 0 {
        push_field(&mut fields, &line);
    }
    fields
}

fn push_field(fields: &mut Vec<(String, String)>, line: &str) {
    if let Some((key, value)) = line.split_once('=') {
        let key = key.trim();
        if !key.is_empty() {
            fields.push((key.to_string(), value.trim().to_string()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const SCIENCE: &str = "Science\n{\n\tid = crewReport@KerbinSrfLandedLaunchPad\n\ttitle = Crew Report\n\tsci = 1.5\n\tcap = 1.5\n}";

    #[test]
    fn parse_reads_identity_and_fields() {
        let block = Block::parse(SCIENCE).unwrap();
        assert_eq!(block.kind(), "Science");
        assert_eq!(block.id(), Some("crewReport@KerbinSrfLandedLaunchPad"));
        assert_eq!(block.field("title"), Some("Crew Report"));
        assert_eq!(block.float_field("sci"), Some(1.5));
        assert_eq!(block.fields().len(), 4);
    }

    #[test]
    fn id_falls_back_to_guid_then_name() {
        let vessel = Block::parse("Vessel\n{\n\tguid = abc\n\tname = Probe\n}").unwrap();
        assert_eq!(vessel.id(), Some("abc"));

        let body = Block::parse("Body\n{\n\tName = Mun\n\tMap = AAAA\n}").unwrap();
        assert_eq!(body.id(), Some("Mun"));

        let scenario = Block::parse("SCENARIO\n{\n\tname = SCANcontroller\n}").unwrap();
        assert_eq!(scenario.id(), None);
    }

    #[test]
    fn nested_fields_are_not_flattened() {
        let block = Block::parse(
            "Tech\n{\n\tid = start\n\tPart\n\t{\n\t\tid = notMe\n\t\tname = pod\n\t}\n\tcost = 0\n}",
        )
        .unwrap();
        assert_eq!(block.id(), Some("start"));
        assert_eq!(block.field("name"), None);
        assert_eq!(block.field("cost"), Some("0"));
    }

    #[test]
    fn single_line_block() {
        let block = Block::parse("Science { id = a }").unwrap();
        assert_eq!(block.id(), Some("a"));
    }

    #[test]
    fn float_field_rejects_garbage_and_non_finite() {
        let block = Block::parse("Tech\n{\n\tid = x\n\tcost = lots\n\tsci = inf\n}").unwrap();
        assert_eq!(block.float_field("cost"), None);
        assert_eq!(block.float_field("sci"), None);
        assert_eq!(block.float_field("missing"), None);
    }

    #[test]
    fn with_field_rewrites_in_place() {
        let block = Block::parse(SCIENCE).unwrap();
        let updated = block.with_field("sci", "1.25");
        assert_eq!(
            updated.raw(),
            "Science\n{\n\tid = crewReport@KerbinSrfLandedLaunchPad\n\ttitle = Crew Report\n\tsci = 1.25\n\tcap = 1.5\n}"
        );
        assert_eq!(updated.float_field("sci"), Some(1.25));
    }

    #[test]
    fn with_field_preserves_crlf() {
        let block = Block::parse("Science\r\n{\r\n    sci = 1\r\n    id = a\r\n}").unwrap();
        let updated = block.with_field("sci", "2");
        assert_eq!(updated.raw(), "Science\r\n{\r\n    sci = 2\r\n    id = a\r\n}");
    }

    #[test]
    fn with_field_inserts_before_closing_brace() {
        let block = Block::parse("Science\n{\n    id = a\n    cap = 5\n}").unwrap();
        let updated = block.with_field("sci", "3");
        assert_eq!(updated.raw(), "Science\n{\n    id = a\n    cap = 5\n    sci = 3\n}");
    }

    #[test]
    fn with_field_ignores_nested_matches() {
        let block = Block::parse("Tech\n{\n\tid = a\n\tPart\n\t{\n\t\tcost = 9\n\t}\n}").unwrap();
        let updated = block.with_field("cost", "4");
        assert_eq!(updated.field("cost"), Some("4"));
        assert!(updated.raw().contains("\t\tcost = 9"));
    }

    #[test]
    fn with_field_on_empty_block() {
        let block = Block::parse("Science\n{\n}").unwrap();
        let updated = block.with_field("sci", "1");
        assert_eq!(updated.raw(), "Science\n{\n\tsci = 1\n}");
    }

    #[test]
    fn with_field_on_single_line_block() {
        let block = Block::parse("Science { id = a }").unwrap();
        let updated = block.with_field("sci", "2");
        assert_eq!(updated.id(), Some("a"));
        assert_eq!(updated.field("sci"), Some("2"));
    }

    #[test]
    fn without_fields_strips_depth_one_lines() {
        let block = Block::parse(
            "SCENARIO\n{\n\tname = SCANcontroller\n\tscene = 7, 5, 8\n\tmainMap = True\n\tBody\n\t{\n\t\tname = keep\n\t}\n}",
        )
        .unwrap();
        let stripped = block.without_fields(&["name", "scene"]);
        assert_eq!(stripped.field("name"), None);
        assert_eq!(stripped.field("scene"), None);
        assert_eq!(stripped.field("mainMap"), Some("True"));
        assert!(stripped.raw().contains("\t\tname = keep"));
    }

    #[test]
    fn with_kind_renames_header() {
        let block = Block::parse("SCENARIO {\n\tmainMap = True\n}").unwrap();
        let renamed = block.with_kind("SCANcontroller");
        assert_eq!(renamed.kind(), "SCANcontroller");
        assert_eq!(renamed.raw(), "SCANcontroller {\n\tmainMap = True\n}");
    }

    #[test]
    fn body_excludes_braces() {
        let block = Block::parse("Body { Name = Mun }").unwrap();
        assert_eq!(block.body(), " Name = Mun ");
    }

    proptest! {
        #[test]
        fn raw_reparses_to_same_block(
            id in "[a-zA-Z][a-zA-Z0-9@_]{0,12}",
            sci in 0.0f64..1000.0,
            extra in proptest::collection::vec(("[a-z]{1,6}", "[a-zA-Z0-9 .]{0,10}"), 0..4),
        ) {
            let mut text = format!("Science\n{{\n\tid = {}\n\tsci = {}\n", id, sci);
            for (k, v) in &extra {
                text.push_str(&format!("\t{} = {}\n", k, v));
            }
            text.push('}');
            let block = Block::parse(&text).unwrap();
            let again = Block::parse(block.raw()).unwrap();
            prop_assert_eq!(&block, &again);

            let rewritten = block.with_field("sci", "7");
            prop_assert_eq!(rewritten.id(), block.id());
            prop_assert_eq!(rewritten.field("sci"), Some("7"));
        }
    }
}
