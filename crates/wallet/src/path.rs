//! Derivation-path grammar and walking.
//!
//! Paths are `/`-separated unsigned decimal indices with an optional leading
//! `m` root marker; a trailing `'`, `h` or `H` marks a segment hardened. The
//! literal segment `0` is a sentinel for "the current key unchanged", so a
//! path can name the starting key itself.

use std::fmt;

use crate::derive::ChildDerivation;
use crate::error::WalletError;
use crate::extkey::{ExtKey, HARDENED_OFFSET};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathError {
    Parse(&'static str),
}

impl fmt::Display for PathError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathError::Parse(message) => write!(f, "invalid derivation path: {message}"),
        }
    }
}

impl std::error::Error for PathError {}

/// Parse a path expression into combined child indices (hardened bit set
/// where marked).
pub fn parse(path: &str) -> Result<Vec<u32>, PathError> {
    let trimmed = path.trim();
    if trimmed.is_empty() {
        return Err(PathError::Parse("empty path"));
    }

    let mut segments = trimmed.split('/');
    let mut first = segments.next();
    if matches!(first, Some("m") | Some("M")) {
        first = segments.next();
    }

    let mut out = Vec::new();
    for segment in first.into_iter().chain(segments) {
        out.push(parse_segment(segment)?);
    }
    Ok(out)
}

fn parse_segment(segment: &str) -> Result<u32, PathError> {
    if segment.is_empty() {
        return Err(PathError::Parse("empty path segment"));
    }

    let (digits, hardened) = match segment.as_bytes()[segment.len() - 1] {
        b'\'' | b'h' | b'H' => (&segment[..segment.len() - 1], true),
        _ => (segment, false),
    };
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(PathError::Parse("malformed path segment"));
    }

    let index: u32 = digits
        .parse()
        .map_err(|_| PathError::Parse("path index out of range"))?;
    if index >= HARDENED_OFFSET {
        return Err(PathError::Parse("path index out of range"));
    }

    Ok(if hardened {
        index | HARDENED_OFFSET
    } else {
        index
    })
}

/// Walk `start` through `path`, requesting one child derivation per
/// non-sentinel segment.
///
/// A public-only start combined with any hardened segment fails before the
/// derivation primitive is invoked; that restriction is structural, not a
/// property of the primitive.
pub fn derive(
    start: &ExtKey,
    path: &[u32],
    deriver: &dyn ChildDerivation,
) -> Result<ExtKey, WalletError> {
    if !start.has_secret() && path.iter().any(|index| index & HARDENED_OFFSET != 0) {
        return Err(WalletError::HardenedFromPublicNotAllowed);
    }

    let mut current = start.clone();
    for &index in path {
        if index == 0 {
            continue;
        }
        current = deriver
            .derive_child(&current, index)
            .map_err(|_| WalletError::DeriveFailed { index })?;
    }
    Ok(current)
}

/// Pack a path for chain metadata; indices as little-endian u32s.
pub(crate) fn pack(path: &[u32]) -> Vec<u8> {
    let mut out = Vec::with_capacity(path.len() * 4);
    for index in path {
        out.extend_from_slice(&index.to_le_bytes());
    }
    out
}

pub(crate) fn unpack(bytes: &[u8]) -> Option<Vec<u32>> {
    if bytes.len() % 4 != 0 {
        return None;
    }
    Some(
        bytes
            .chunks_exact(4)
            .map(|chunk| u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect(),
    )
}
