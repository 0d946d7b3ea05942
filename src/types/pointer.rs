//! Same-document fragment pointers (`#/a/b/c`).
//!
//! Segments are percent-decoded first, then `~1` → `/` and `~0` → `~` are
//! unescaped. The canonical form re-escapes `~` and `/` but never
//! percent-encodes, so `#/a%20b` and `#/a b` name the same location.

use serde::{Deserialize, Serialize};

/// Error raised when a `$ref` string is not a usable same-document pointer.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PointerError {
    /// The reference does not start with `#` (cross-document references are
    /// resolved by the loader before this crate sees the document).
    #[error("not a same-document pointer: {0}")]
    NotFragment(String),
    /// The fragment is neither `#` nor `#/...`.
    #[error("malformed pointer fragment: {0}")]
    Malformed(String),
    /// A segment is not valid percent-encoded UTF-8.
    #[error("invalid percent-encoding in segment {segment:?} of {pointer}")]
    Decode {
        /// The full raw pointer.
        pointer: String,
        /// The offending raw segment.
        segment: String,
    },
}

/// A parsed, unescaped pointer into a single document.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Pointer {
    segments: Vec<String>,
}

impl Pointer {
    /// The pointer addressing the document root (`#`).
    pub fn root() -> Self {
        Self::default()
    }

    /// Parse a raw `$ref` value.
    pub fn parse(raw: &str) -> Result<Self, PointerError> {
        let fragment = raw
            .strip_prefix('#')
            .ok_or_else(|| PointerError::NotFragment(raw.to_string()))?;

        if fragment.is_empty() {
            return Ok(Self::root());
        }

        let body = fragment
            .strip_prefix('/')
            .ok_or_else(|| PointerError::Malformed(raw.to_string()))?;

        let segments = body
            .split('/')
            .map(|segment| {
                let decoded = urlencoding::decode(segment).map_err(|_| PointerError::Decode {
                    pointer: raw.to_string(),
                    segment: segment.to_string(),
                })?;
                Ok(unescape_segment(&decoded))
            })
            .collect::<Result<Vec<_>, PointerError>>()?;

        Ok(Self { segments })
    }

    /// Unescaped segments, root first.
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Whether this pointer addresses the root.
    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// Pointer to a child of this location.
    pub fn child(&self, segment: impl Into<String>) -> Self {
        let mut segments = self.segments.clone();
        segments.push(segment.into());
        Self { segments }
    }

    /// Pointer with the first `len` segments of this one.
    pub fn prefix(&self, len: usize) -> Self {
        Self {
            segments: self.segments[..len.min(self.segments.len())].to_vec(),
        }
    }

    /// Canonical textual form used as the RefTable key and provenance path.
    pub fn to_canonical_string(&self) -> String {
        let mut out = String::from("#");
        for segment in &self.segments {
            out.push('/');
            out.push_str(&escape_segment(segment));
        }
        out
    }
}

impl std::fmt::Display for Pointer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_canonical_string())
    }
}

fn unescape_segment(segment: &str) -> String {
    // Order matters: `~01` must become `~1`, not `/`.
    segment.replace("~1", "/").replace("~0", "~")
}

fn escape_segment(segment: &str) -> String {
    segment.replace('~', "~0").replace('/', "~1")
}
