//! Concord Block Format
//!
//! Scenario modules travel as brace-nested save text:
//!
//! ```text
//! Tech
//! {
//!     id = basicRocketry
//!     cost = 5
//!     Part
//!     {
//!         name = solidBooster
//!     }
//! }
//! ```
//!
//! This crate scans that text into typed [`Block`] values. Block ends are found
//! by counting brace depth, never by line shape, so arbitrarily nested
//! sections (a `SCENARIO` wrapping a `SCANcontroller` wrapping `Vessel`
//! blocks) come out whole.
//!
//! # Tolerance
//!
//! Client uploads are untrusted and often sloppy:
//! - blocks without an `id`/`guid`/`Name` field are yielded with `id() == None`
//! - invalid UTF-8 is replaced on decode ([`decode_lossy`])
//! - trailing text and unterminated final blocks are ignored
//!
//! # Rewriting
//!
//! [`Block::with_field`] rewrites a single `key = value` line in place and
//! keeps every other byte of the block, so converged records preserve the
//! formatting the game wrote.

mod block;
mod scan;

pub use block::{Block, ID_KEYS};
pub use scan::{first_block, reindent, Blocks, Header};

use std::borrow::Cow;

/// Decode raw upload bytes, replacing invalid UTF-8 and dropping a leading BOM.
pub fn decode_lossy(bytes: &[u8]) -> Cow<'_, str> {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    String::from_utf8_lossy(bytes)
}

/// Format a float the way merged records store it (shortest round-trip form).
pub fn format_float(value: f64) -> String {
    format!("{}", value)
}
