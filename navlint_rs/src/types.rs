//! Shared types and recognition constants.
//!
//! The framework identities below are the only coupling between the proxy
//! generator and the analyzer: plain `(name, module)` string pairs, matched
//! against import specifiers rather than resolved types, so the analyzer can
//! run against code it did not generate.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Default extensions scanned when `--ext` is not given.
pub const DEFAULT_EXTENSIONS: &[&str] = &["ts", "tsx", "mts", "cts"];

/// Marker tag emitted by the proxy generator and recognized by the analyzer.
/// Usable as a class decorator or applied imperatively to a class object.
pub const MARKER_NAME: &str = "NavigationCollectionProxyGenerated";

/// Module specifier the marker tag is imported from.
pub const MARKER_MODULE: &str = "navlint/runtime";

/// Simple name of the relationship collection type. Matched structurally by
/// name so any `Collection<E>`-shaped declaration qualifies, independent of
/// the concrete implementation behind it.
pub const COLLECTION_TYPE: &str = "Collection";

/// Persistence context base class: `(name, module)`.
pub const CONTEXT_BASE: (&str, &str) = ("EntityContext", "@lazyorm/core");

/// Classes whose methods may receive collection navigation properties
/// without triggering a violation: query-extension providers.
pub const ALLOWED_PROVIDERS: &[(&str, &str)] = &[
    ("Sequences", "@lazyorm/query"),
    ("EntitySet", "@lazyorm/core"),
    ("QueryExtensions", "@lazyorm/core"),
];

/// Modules whose free functions count as query-extension providers.
pub const PROVIDER_MODULES: &[&str] = &["@lazyorm/query"];

/// Helper call that only reads a symbol's name, never its value.
pub const NAMEOF_HELPER: &str = "nameof";

/// Byte span into a source document, half-open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TextSpan {
    pub start: u32,
    pub end: u32,
}

impl TextSpan {
    pub fn new(start: u32, end: u32) -> Self {
        Self { start, end }
    }

    pub fn slice<'a>(&self, source: &'a str) -> &'a str {
        let start = (self.start as usize).min(source.len());
        let end = (self.end as usize).min(source.len());
        &source[start..end]
    }
}

impl From<oxc_span::Span> for TextSpan {
    fn from(span: oxc_span::Span) -> Self {
        Self { start: span.start, end: span.end }
    }
}

/// Cooperative cancellation handle. Checked between files and between
/// access sites, never mid-classification of a single site.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Terminal color behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorMode {
    Auto,
    Always,
    Never,
}

/// Output format for analysis results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Human,
    Json,
    Sarif,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn span_slices_source() {
        let source = "const x = 1;";
        assert_eq!(TextSpan::new(6, 7).slice(source), "x");
    }

    #[test]
    fn span_slice_is_clamped() {
        let source = "ab";
        assert_eq!(TextSpan::new(1, 99).slice(source), "b");
    }
}
