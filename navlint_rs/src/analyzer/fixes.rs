//! Textual code fixes for navigation-collection diagnostics.
//!
//! The violation span is already bounded to a single identifier token, so a
//! token-level text substitution is sufficient: extract the sub-text at the
//! diagnostic span, replace the bare property name with `<name>Query()`, and
//! splice the result back at the same span. No tree reconstruction.
//!
//! Batch application is order-independent: every patch corresponds to a
//! distinct identifier token, so spans are disjoint by construction, and
//! patches for one document are applied back-to-front.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::diagnostics::Diagnostic;
use crate::types::TextSpan;

/// Action title, as surfaced to editors and the CLI.
pub const FIX_TITLE: &str = "Avoid collection navigation property usage";

/// A single text replacement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Patch {
    pub file: String,
    pub span: TextSpan,
    pub replacement: String,
}

/// Compute the patch for one diagnostic against the live document text.
pub fn patch_for(diagnostic: &Diagnostic, source: &str) -> Patch {
    let snippet = diagnostic.span.slice(source);
    let replacement = snippet.replace(
        diagnostic.property.as_str(),
        &format!("{}Query()", diagnostic.property),
    );
    Patch {
        file: diagnostic.file.clone(),
        span: diagnostic.span,
        replacement,
    }
}

/// Apply a batch of patches to one document. Spans never overlap, so sorting
/// back-to-front makes the result independent of input order.
pub fn apply_patches(source: &str, patches: &[Patch]) -> String {
    let mut sorted: Vec<&Patch> = patches.iter().collect();
    sorted.sort_by(|a, b| b.span.start.cmp(&a.span.start));
    let mut out = source.to_string();
    for patch in sorted {
        let start = (patch.span.start as usize).min(out.len());
        let end = (patch.span.end as usize).min(out.len());
        out.replace_range(start..end, &patch.replacement);
    }
    out
}

/// Fix every diagnostic across a set of documents. Returns only the
/// documents that changed, keyed by file path. Patches never interact
/// across documents.
pub fn fix_all(
    sources: &HashMap<String, String>,
    diagnostics: &[Diagnostic],
) -> HashMap<String, String> {
    let mut by_file: HashMap<&str, Vec<Patch>> = HashMap::new();
    for diagnostic in diagnostics {
        let Some(source) = sources.get(&diagnostic.file) else {
            continue;
        };
        by_file
            .entry(diagnostic.file.as_str())
            .or_default()
            .push(patch_for(diagnostic, source));
    }

    let mut fixed = HashMap::new();
    for (file, patches) in by_file {
        let Some(source) = sources.get(file) else {
            continue;
        };
        let updated = apply_patches(source, &patches);
        if updated != *source {
            fixed.insert(file.to_string(), updated);
        }
    }
    fixed
}
