//! # navlint
//!
//! **Collection navigation analyzer** - Static analysis for lazyorm entity
//! code: find the accesses that eager-load whole relationship collections,
//! rewrite them to deferred queries, and generate the proxy methods the
//! rewritten call sites depend on.
//!
//! ## Features
//!
//! - **Analyzer** - Flags `instance.items` reads on marked entities that
//!   would materialize every related record (`EFPA01`)
//! - **Code Fix** - Rewrites a flagged access to `instance.itemsQuery()`,
//!   batchable across a whole project in one pass
//! - **Proxy Generator** - Emits one `<Type>.NavigationCollectionProxy.ts`
//!   companion per entity with a deferred `<prop>Query()` method per
//!   relationship collection
//! - **CI Output** - findings.json, `--json`, and SARIF 2.1.0
//!
//! ## Quick Start (Library Usage)
//!
//! ```rust,no_run
//! use navlint::analyzer::run_analysis;
//! use navlint::args::ParsedArgs;
//! use navlint::types::CancelToken;
//!
//! let mut parsed = ParsedArgs::default();
//! parsed.root_list = vec!["src".into()];
//! parsed.generate = true;
//!
//! let summary = run_analysis(&parsed, &CancelToken::new()).unwrap();
//! println!("{} violation(s)", summary.diagnostics.len());
//! ```
//!
//! ## CLI Usage
//!
//! ```bash
//! navlint                  # Analyze the current directory
//! navlint src --fix        # Rewrite flagged accesses to <prop>Query()
//! navlint src --generate   # Emit proxy companions for every entity
//! navlint --sarif          # SARIF 2.1.0 for CI
//! ```
//!
//! The analyzer, fixer, and generator are pure functions of parsed source
//! plus a project model; nothing here talks to a data store or executes a
//! query.

/// Navigation-collection analysis.
///
/// # Submodules
///
/// - [`analyzer::project`] - parse + symbol resolution into a project model
/// - [`analyzer::navigation`] - the access-site classifier
/// - [`analyzer::diagnostics`] - diagnostic descriptor and construction
/// - [`analyzer::fixes`] - textual patches and batch application
/// - [`analyzer::proxy`] - deferred-query proxy generation
/// - [`analyzer::sarif`] - SARIF 2.1.0 output for CI
/// - [`analyzer::runner`] - orchestration and output
pub mod analyzer;

/// Command-line argument parsing.
pub mod args;

/// File discovery helpers.
pub mod fs_utils;

/// Shared types and the framework recognition table.
pub mod types;

pub use analyzer::diagnostics::{DIAGNOSTIC_ID, Diagnostic};
pub use analyzer::fixes::FIX_TITLE;
pub use analyzer::proxy::{ARTIFACT_SUFFIX, GENERATOR_DIAGNOSTIC_ID};
pub use analyzer::run_analysis;
pub use types::CancelToken;
