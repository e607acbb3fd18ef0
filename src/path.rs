//! Dotted-name paths, decomposed into ordered segments.

use std::fmt;

/// An ordered sequence of path segments, e.g. `"a.b.0"` → `["a", "b", "0"]`.
///
/// No normalisation is performed: a segment may be any non-empty string,
/// including one that looks like a decimal index (digit semantics are a
/// concern of the evaluator's path iteration, not of `Path` itself).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Path {
    segments: Vec<String>,
}

impl Path {
    /// Parses a dotted path string by splitting on `.`.
    pub fn from_str(path: &str) -> Self {
        Path { segments: path.split('.').map(str::to_owned).collect() }
    }

    /// The empty path (terminal position -- "at the document root").
    pub fn empty() -> Self {
        Path { segments: Vec::new() }
    }

    /// The first segment, if any.
    pub fn head(&self) -> Option<&str> {
        self.segments.first().map(String::as_str)
    }

    /// Everything after the first segment.
    pub fn tail(&self) -> Path {
        Path { segments: self.segments.iter().skip(1).cloned().collect() }
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.segments.join("."))
    }
}
