//! Depth-counting block scanner.
//!
//! The scanner walks text line by line while tracking brace depth. A header
//! line is a line whose first token matches the requested [`Header`] and
//! whose next non-whitespace character (on the same line or a later one) is
//! `{`. The matching close is found by counting braces from there.

use crate::block::Block;

/// How a header token is matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Header<'h> {
    /// Token equals the keyword (`Science`, `Vessel`).
    Exact(&'h str),
    /// Token starts with the keyword (`Tech` matches `Tech` and `TechNode`).
    Prefix(&'h str),
}

impl Header<'_> {
    /// Check a header token against this matcher.
    pub fn matches(&self, token: &str) -> bool {
        match self {
            Header::Exact(name) => token == *name,
            Header::Prefix(prefix) => token.starts_with(prefix),
        }
    }
}

/// Lazy iterator over blocks with a given header.
#[derive(Debug, Clone)]
pub struct Blocks<'t, 'h> {
    text: &'t str,
    header: Header<'h>,
    pos: usize,
    depth: usize,
    top_level: bool,
}

impl<'t, 'h> Blocks<'t, 'h> {
    /// Blocks that sit at depth 0 of `text`.
    pub fn top_level(text: &'t str, header: Header<'h>) -> Self {
        Self {
            text,
            header,
            pos: 0,
            depth: 0,
            top_level: true,
        }
    }

    /// Blocks at any depth. Matches never overlap: scanning resumes after
    /// the closing brace of each yielded block.
    pub fn nested(text: &'t str, header: Header<'h>) -> Self {
        Self {
            top_level: false,
            ..Self::top_level(text, header)
        }
    }
}

impl Iterator for Blocks<'_, '_> {
    type Item = Block;

    fn next(&mut self) -> Option<Block> {
        let text = self.text;
        let len = text.len();

        while self.pos < len {
            let line_start = self.pos;
            let line_end = text[line_start..]
                .find('\n')
                .map_or(len, |i| line_start + i);
            let line = &text[line_start..line_end];
            let token_start = line_start + (line.len() - line.trim_start().len());
            let token = header_token(&text[token_start..line_end]);

            if (!self.top_level || self.depth == 0)
                && !token.is_empty()
                && self.header.matches(token)
            {
                if let Some(open) = opening_brace(text, token_start + token.len()) {
                    match matching_brace(text, open) {
                        Some(close) => {
                            self.pos = close + 1;
                            return Some(Block::from_span(text, token_start, open, close));
                        }
                        None => {
                            // Unterminated trailing block.
                            self.pos = len;
                            return None;
                        }
                    }
                }
            }

            self.depth = apply_braces(self.depth, line);
            self.pos = line_end + 1;
        }
        None
    }
}

/// First block with the given header at any depth.
pub fn first_block(text: &str, header: Header<'_>) -> Option<Block> {
    Blocks::nested(text, header).next()
}

/// Re-emit block text with one tab per brace level, starting at `depth`.
///
/// Blank lines are dropped. Braces are counted per line, so the output
/// parses to the same structure as the input.
pub fn reindent(raw: &str, depth: usize) -> String {
    let mut out = String::with_capacity(raw.len() + 16);
    let mut level = depth;

    for line in raw.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let mut opens = line.matches('{').count();
        let mut closes = line.matches('}').count();
        if line.starts_with('}') {
            level = level.saturating_sub(1);
            closes -= 1;
        }
        for _ in 0..level {
            out.push('\t');
        }
        out.push_str(line);
        out.push('\n');

        let net = opens.min(closes);
        opens -= net;
        closes -= net;
        level = (level + opens).saturating_sub(closes);
    }
    out
}

/// Leading token of a line: everything up to whitespace, `{` or `=`.
pub(crate) fn header_token(s: &str) -> &str {
    let end = s
        .find(|c: char| c.is_whitespace() || c == '{' || c == '=')
        .unwrap_or(s.len());
    &s[..end]
}

/// Index of `{` if it is the next non-whitespace character at or after `from`.
pub(crate) fn opening_brace(text: &str, from: usize) -> Option<usize> {
    let rest = &text[from..];
    let skipped = rest.len() - rest.trim_start().len();
    (rest[skipped..].starts_with('{')).then_some(from + skipped)
}

/// Index of the `}` balancing the `{` at `open`.
pub(crate) fn matching_brace(text: &str, open: usize) -> Option<usize> {
    let mut depth = 0usize;
    for (i, b) in text.as_bytes()[open..].iter().enumerate() {
        match b {
            b'{' => depth += 1,
            b'}' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Some(open + i);
                }
            }
            _ => {}
        }
    }
    None
}

/// Depth after applying every brace in `line`.
pub(crate) fn apply_braces(depth: usize, line: &str) -> usize {
    line.bytes().fold(depth, |d, b| match b {
        b'{' => d + 1,
        b'}' => d.saturating_sub(1),
        _ => d,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const WRAPPED: &str = "SCENARIO\n{\n\tname = SCANcontroller\n\tScanners\n\t{\n\t\tVessel\n\t\t{\n\t\t\tguid = v1\n\t\t\tSensor\n\t\t\t{\n\t\t\t\ttype = 1\n\t\t\t}\n\t\t}\n\t\tVessel\n\t\t{\n\t\t\tguid = v2\n\t\t}\n\t}\n}\n";

    #[test]
    fn top_level_skips_nested_occurrences() {
        assert_eq!(Blocks::top_level(WRAPPED, Header::Exact("Vessel")).count(), 0);
        assert_eq!(Blocks::top_level(WRAPPED, Header::Exact("SCENARIO")).count(), 1);
    }

    #[test]
    fn nested_finds_blocks_inside_wrappers() {
        let guids: Vec<_> = Blocks::nested(WRAPPED, Header::Exact("Vessel"))
            .filter_map(|b| b.id().map(str::to_string))
            .collect();
        assert_eq!(guids, vec!["v1", "v2"]);
    }

    #[test]
    fn nested_block_contains_its_children() {
        let vessel = first_block(WRAPPED, Header::Exact("Vessel")).unwrap();
        assert!(vessel.raw().contains("Sensor"));
        assert!(vessel.raw().ends_with('}'));
        assert_eq!(vessel.nested(Header::Exact("Sensor")).count(), 1);
    }

    #[test]
    fn brace_on_header_line() {
        let text = "Tech {\n  id = a\n}\nTech {\n  id = b\n}";
        let ids: Vec<_> = Blocks::top_level(text, Header::Exact("Tech"))
            .filter_map(|b| b.id().map(str::to_string))
            .collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn header_requires_an_opening_brace() {
        let text = "Tech = notABlock\nTechnology\nid = x\nTech\n{\n\tid = real\n}";
        let blocks: Vec<_> = Blocks::top_level(text, Header::Prefix("Tech")).collect();
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].id(), Some("real"));
    }

    #[test]
    fn prefix_and_exact_matching() {
        assert!(Header::Prefix("Tech").matches("TechNode"));
        assert!(!Header::Exact("Tech").matches("TechNode"));
        assert!(!Header::Exact("Science").matches("ScienceArchives"));
    }

    #[test]
    fn missing_id_is_none() {
        let text = "Tech\n{\n\tstate = Available\n}";
        let block = first_block(text, Header::Exact("Tech")).unwrap();
        assert_eq!(block.id(), None);
    }

    #[test]
    fn trailing_and_unterminated_content_is_ignored() {
        let text = "Tech\n{\n\tid = a\n}\ngarbage after\nTech\n{\n\tid = b\n";
        let blocks: Vec<_> = Blocks::top_level(text, Header::Exact("Tech")).collect();
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].id(), Some("a"));
    }

    #[test]
    fn crlf_input() {
        let text = "Science\r\n{\r\n\tid = a\r\n\tsci = 2\r\n}\r\n";
        let block = first_block(text, Header::Exact("Science")).unwrap();
        assert_eq!(block.id(), Some("a"));
        assert_eq!(block.float_field("sci"), Some(2.0));
    }

    #[test]
    fn first_block_finds_deep_sections() {
        let text = "GAME\n{\n\tSCENARIO\n\t{\n\t\tSCANResources\n\t\t{\n\t\t\tx = 1\n\t\t}\n\t}\n}";
        let block = first_block(text, Header::Exact("SCANResources")).unwrap();
        assert_eq!(block.field("x"), Some("1"));
    }

    #[test]
    fn reindent_uses_brace_depth() {
        let raw = "Vessel\n      {\n   guid = a\nSensor\n{\n type = 1\n      }\n}";
        assert_eq!(
            reindent(raw, 1),
            "\tVessel\n\t{\n\t\tguid = a\n\t\tSensor\n\t\t{\n\t\t\ttype = 1\n\t\t}\n\t}\n"
        );
    }

    #[test]
    fn reindent_round_trips_structure() {
        let again = reindent(WRAPPED, 0);
        let fields = |text: &str| -> Vec<Vec<(String, String)>> {
            Blocks::nested(text, Header::Exact("Vessel"))
                .map(|b| b.fields().to_vec())
                .collect()
        };
        let (a, b) = (fields(WRAPPED), fields(&again));
        assert_eq!(a, b);
    }
}
