//! Coverage bitmaps.
//!
//! Each body's scanned cells travel as a base64 byte array. Merging is a
//! bitwise OR, so coverage only ever grows and the result does not depend on
//! the order snapshots are folded in.

use base64::alphabet;
use base64::engine::general_purpose::STANDARD;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::Engine as _;
use tracing::warn;

/// Standard alphabet, padding optional on decode.
const TOLERANT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new()
        .with_decode_padding_mode(DecodePaddingMode::Indifferent)
        .with_decode_allow_trailing_bits(true),
);

/// Decoded coverage bitmap for one body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CoverageMap(Vec<u8>);

impl CoverageMap {
    #[cfg(test)]
    pub(crate) fn from_bytes(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    /// Decode a transported map. Embedded whitespace is ignored.
    pub fn decode(encoded: &str) -> Option<Self> {
        let compact: String = encoded.chars().filter(|c| !c.is_whitespace()).collect();
        TOLERANT.decode(compact).ok().map(Self)
    }

    /// Standard padded base64.
    pub fn encode(&self) -> String {
        STANDARD.encode(&self.0)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// OR `other` into this map. The shorter map is treated as zero-padded.
    pub fn union_with(&mut self, other: &CoverageMap) {
        if self.0.len() < other.0.len() {
            self.0.resize(other.0.len(), 0);
        }
        for (dst, src) in self.0.iter_mut().zip(&other.0) {
            *dst |= src;
        }
    }

    /// Number of set bits.
    pub fn scanned_cells(&self) -> u32 {
        self.0.iter().map(|b| b.count_ones()).sum()
    }
}

/// Union of two transported maps, re-encoded.
///
/// A side that does not decode loses to one that does. If neither decodes the
/// longer string is kept, since it is the likelier to carry more coverage.
pub fn union_encoded(a: &str, b: &str) -> String {
    if a.trim().is_empty() {
        return b.to_string();
    }
    if b.trim().is_empty() {
        return a.to_string();
    }

    match (CoverageMap::decode(a), CoverageMap::decode(b)) {
        (Some(mut left), Some(right)) => {
            left.union_with(&right);
            left.encode()
        }
        (Some(left), None) => {
            warn!(len = b.len(), "Dropping undecodable coverage map");
            left.encode()
        }
        (None, Some(right)) => {
            warn!(len = a.len(), "Dropping undecodable coverage map");
            right.encode()
        }
        (None, None) => {
            warn!("Neither coverage map decodes, keeping the longer one");
            if b.len() > a.len() { b } else { a }.to_string()
        }
    }
}
