//! Diagnostic descriptor and construction for navigation-collection
//! violations.
//!
//! One diagnostic per textual access site. Duplicates across aliases of the
//! same underlying collection are intentionally not deduplicated: the
//! classification happens where the property is syntactically read, not
//! where the value is later used.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::types::TextSpan;

/// Stable diagnostic identifier. Never changes across versions; suppression
/// files and CI baselines key on it.
pub const DIAGNOSTIC_ID: &str = "EFPA01";

pub const CATEGORY: &str = "Usage";

pub const TITLE: &str = "Collection navigation properties should not be used for querying";

/// Message template; `{0}` is the violated property name.
pub const MESSAGE_FORMAT: &str = "Use the {0}Query() method";

pub const DESCRIPTION: &str = "Using collection navigation properties will eager-load all \
related entities into memory. This could result in degraded performance.";

pub const SEVERITY_WARNING: &str = "warning";

/// A reported violation, immutable once created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Diagnostic {
    /// Stable rule id.
    pub id: String,
    /// File path (relative).
    pub file: String,
    /// Line number (1-indexed).
    pub line: usize,
    /// Column number (1-indexed).
    pub column: usize,
    /// Byte span of the violated identifier token.
    pub span: TextSpan,
    /// Severity: always "warning" for this rule.
    pub severity: String,
    /// Rendered message.
    pub message: String,
    /// The single message argument: the violated property name.
    pub property: String,
}

impl Diagnostic {
    /// Build the navigation-collection diagnostic for a property read at
    /// `span` inside `source`.
    pub fn navigation(file: &str, source: &str, span: TextSpan, property: &str) -> Self {
        let (line, column) = span_to_location(source, span.start);
        Self {
            id: DIAGNOSTIC_ID.to_string(),
            file: file.to_string(),
            line,
            column,
            span,
            severity: SEVERITY_WARNING.to_string(),
            message: MESSAGE_FORMAT.replace("{0}", property),
            property: property.to_string(),
        }
    }
}

/// Map a byte offset to 1-indexed line and column.
pub fn span_to_location(source: &str, offset: u32) -> (usize, usize) {
    let offset = (offset as usize).min(source.len());
    let line = source[..offset].bytes().filter(|b| *b == b'\n').count() + 1;
    let last_newline = source[..offset].rfind('\n').map(|i| i + 1).unwrap_or(0);
    let column = offset - last_newline + 1;
    (line, column)
}

/// Summary counts over a diagnostic batch.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DiagnosticSummary {
    pub total: usize,
    pub affected_files: usize,
    pub by_property: HashMap<String, usize>,
}

impl DiagnosticSummary {
    pub fn from_diagnostics(diagnostics: &[Diagnostic]) -> Self {
        use std::collections::HashSet;

        let files: HashSet<_> = diagnostics.iter().map(|d| &d.file).collect();
        let mut by_property = HashMap::new();
        for diag in diagnostics {
            *by_property.entry(diag.property.clone()).or_insert(0) += 1;
        }
        Self {
            total: diagnostics.len(),
            affected_files: files.len(),
            by_property,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_substitutes_property_name() {
        let diag = Diagnostic::navigation("a.ts", "x.items", TextSpan::new(2, 7), "items");
        assert_eq!(diag.message, "Use the itemsQuery() method");
        assert_eq!(diag.id, "EFPA01");
        assert_eq!(diag.severity, "warning");
        assert_eq!(diag.property, "items");
    }

    #[test]
    fn location_is_one_indexed() {
        let source = "const a = 1;\nconst b = instance.items;\n";
        let offset = source.find("items").unwrap() as u32;
        let diag = Diagnostic::navigation(
            "a.ts",
            source,
            TextSpan::new(offset, offset + 5),
            "items",
        );
        assert_eq!(diag.line, 2);
        assert_eq!(diag.column, 20);
    }

    #[test]
    fn summary_counts_files_and_properties() {
        let source = "instance.items";
        let one = Diagnostic::navigation("a.ts", source, TextSpan::new(9, 14), "items");
        let two = Diagnostic::navigation("b.ts", source, TextSpan::new(9, 14), "items");
        let summary = DiagnosticSummary::from_diagnostics(&[one, two]);
        assert_eq!(summary.total, 2);
        assert_eq!(summary.affected_files, 2);
        assert_eq!(summary.by_property.get("items"), Some(&2));
    }
}
