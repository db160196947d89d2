//! Orchestration: file discovery, model building, classification, fixes,
//! generation, and output.
//!
//! Each per-file step is a pure function of (source, models), so the loop is
//! trivially parallelizable by a host; this runner keeps it sequential and
//! checks the cancel token between files so a surrounding host can abort the
//! pass cleanly.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;
use colored::Colorize;
use serde::Serialize;

use super::diagnostics::{Diagnostic, DiagnosticSummary};
use super::fixes::{self, FIX_TITLE};
use super::navigation::classify_file;
use super::project::{FileModel, ProjectModel, file_model};
use super::proxy::{self, GeneratorOutput, ProxyCache};
use super::sarif::build_sarif;
use crate::args::ParsedArgs;
use crate::fs_utils::{build_globset, gather_files};
use crate::types::{CancelToken, ColorMode, OutputMode};

/// Directory for analysis artifacts, relative to the first root.
pub const ARTIFACT_DIR: &str = ".navlint";

/// Result of one analysis pass.
#[derive(Debug, Default)]
pub struct RunSummary {
    pub files_scanned: usize,
    pub diagnostics: Vec<Diagnostic>,
    pub generator: GeneratorOutput,
    pub fixed_files: Vec<String>,
    pub artifacts_written: Vec<String>,
    pub cancelled: bool,
}

/// `findings.json` payload: the single artifact downstream tooling reads.
#[derive(Serialize)]
struct Findings<'a> {
    navlint: &'static str,
    generated_at: String,
    summary: FindingsSummary,
    diagnostics: &'a [Diagnostic],
    generator_diagnostics: &'a [proxy::GeneratorDiagnostic],
    generated_artifacts: Vec<&'a str>,
}

#[derive(Serialize)]
struct FindingsSummary {
    files: usize,
    violations: usize,
    affected_files: usize,
    fixed_files: usize,
    artifacts_written: usize,
    up_to_date: usize,
}

struct ScannedFile {
    absolute: PathBuf,
    relative: String,
}

fn relative_name(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .to_string_lossy()
        .replace('\\', "/")
}

/// Run the full analysis pass described by `parsed`.
pub fn run_analysis(parsed: &ParsedArgs, cancel: &CancelToken) -> Result<RunSummary> {
    match parsed.color {
        ColorMode::Always => colored::control::set_override(true),
        ColorMode::Never => colored::control::set_override(false),
        ColorMode::Auto => {}
    }

    let ignore = build_globset(&parsed.ignore_patterns);
    let mut scanned: Vec<ScannedFile> = Vec::new();
    for root in &parsed.root_list {
        for path in gather_files(root, &parsed.extensions, ignore.as_ref()) {
            let relative = relative_name(root, &path);
            scanned.push(ScannedFile { absolute: path, relative });
        }
    }
    if parsed.verbose {
        eprintln!("[navlint] scanning {} file(s)", scanned.len());
    }

    let mut summary = RunSummary::default();
    let mut sources: HashMap<String, String> = HashMap::new();
    let mut absolute_paths: HashMap<String, PathBuf> = HashMap::new();
    let mut models: Vec<FileModel> = Vec::new();

    for file in &scanned {
        if cancel.is_cancelled() {
            summary.cancelled = true;
            break;
        }
        let source = match fs::read_to_string(&file.absolute) {
            Ok(source) => source,
            Err(err) => {
                eprintln!("[navlint][warn] cannot read {}: {}", file.relative, err);
                continue;
            }
        };
        match file_model(&file.absolute, &file.relative, &source) {
            Some(model) => models.push(model),
            None => {
                if parsed.verbose {
                    eprintln!("[navlint][warn] parse errors in {}, skipped", file.relative);
                }
                continue;
            }
        }
        absolute_paths.insert(file.relative.clone(), file.absolute.clone());
        sources.insert(file.relative.clone(), source);
    }
    summary.files_scanned = models.len();

    let project = ProjectModel::from_files(&models);

    for model in &models {
        if cancel.is_cancelled() {
            summary.cancelled = true;
            break;
        }
        let Some(source) = sources.get(&model.path) else { continue };
        let Some(absolute) = absolute_paths.get(&model.path) else { continue };
        summary.diagnostics.extend(classify_file(
            absolute,
            &model.path,
            source,
            model,
            &project,
            cancel,
        ));
    }

    if parsed.fix && !summary.diagnostics.is_empty() {
        let fixed = fixes::fix_all(&sources, &summary.diagnostics);
        for (relative, updated) in &fixed {
            let Some(absolute) = absolute_paths.get(relative) else { continue };
            fs::write(absolute, updated)
                .with_context(|| format!("writing fix to {relative}"))?;
            summary.fixed_files.push(relative.clone());
        }
        summary.fixed_files.sort();
    }

    let first_root = parsed
        .root_list
        .first()
        .cloned()
        .unwrap_or_else(|| PathBuf::from("."));
    let cache_path = first_root.join(ARTIFACT_DIR).join("proxies.json");

    if parsed.generate && !summary.cancelled {
        let mut cache = if parsed.force_generate {
            ProxyCache::default()
        } else {
            ProxyCache::load(&cache_path)
        };
        summary.generator = proxy::generate(&project, &models, &sources, &mut cache);
        for artifact in &summary.generator.artifacts {
            // The artifact lives next to the entity's declaring file.
            let Some(entity_file) = project
                .class(&artifact.entity)
                .and_then(|class| absolute_paths.get(&class.file))
            else {
                continue;
            };
            let file_name = Path::new(&artifact.path)
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| artifact.path.clone());
            let target = entity_file
                .parent()
                .unwrap_or(Path::new("."))
                .join(file_name);
            fs::write(&target, &artifact.text)
                .with_context(|| format!("writing {}", artifact.path))?;
            summary.artifacts_written.push(artifact.path.clone());
        }
        cache
            .save(&cache_path)
            .with_context(|| format!("saving {}", cache_path.display()))?;
    }

    write_findings(&first_root, &summary)?;
    render(parsed, &summary);
    Ok(summary)
}

fn write_findings(root: &Path, summary: &RunSummary) -> Result<()> {
    let findings = Findings {
        navlint: env!("CARGO_PKG_VERSION"),
        generated_at: Utc::now().to_rfc3339(),
        summary: FindingsSummary {
            files: summary.files_scanned,
            violations: summary.diagnostics.len(),
            affected_files: DiagnosticSummary::from_diagnostics(&summary.diagnostics)
                .affected_files,
            fixed_files: summary.fixed_files.len(),
            artifacts_written: summary.artifacts_written.len(),
            up_to_date: summary.generator.up_to_date,
        },
        diagnostics: &summary.diagnostics,
        generator_diagnostics: &summary.generator.diagnostics,
        generated_artifacts: summary
            .artifacts_written
            .iter()
            .map(String::as_str)
            .collect(),
    };
    let dir = root.join(ARTIFACT_DIR);
    fs::create_dir_all(&dir)?;
    fs::write(
        dir.join("findings.json"),
        serde_json::to_string_pretty(&findings)?,
    )?;
    Ok(())
}

fn render(parsed: &ParsedArgs, summary: &RunSummary) {
    match parsed.output {
        OutputMode::Json => {
            let payload = serde_json::json!({
                "files": summary.files_scanned,
                "diagnostics": summary.diagnostics,
                "generator": {
                    "diagnostics": summary.generator.diagnostics,
                    "artifacts": summary.artifacts_written,
                    "up_to_date": summary.generator.up_to_date,
                },
                "fixed_files": summary.fixed_files,
            });
            println!("{}", serde_json::to_string_pretty(&payload).unwrap_or_default());
        }
        OutputMode::Sarif => {
            let sarif = build_sarif(&summary.diagnostics, &summary.generator.diagnostics);
            println!("{}", serde_json::to_string_pretty(&sarif).unwrap_or_default());
        }
        OutputMode::Human => render_human(summary),
    }
}

fn render_human(summary: &RunSummary) {
    for diag in &summary.diagnostics {
        println!(
            "{}:{}:{} {}{}{} {}",
            diag.file,
            diag.line,
            diag.column,
            "warning".yellow().bold(),
            "[".dimmed(),
            format!("{}]", diag.id).dimmed(),
            diag.message,
        );
    }
    for diag in &summary.generator.diagnostics {
        println!("{} {}", format!("note[{}]", diag.id).cyan(), diag.message);
    }

    let stats = DiagnosticSummary::from_diagnostics(&summary.diagnostics);
    if stats.total == 0 {
        println!(
            "{} {} file(s) scanned, no collection navigation violations",
            "ok".green().bold(),
            summary.files_scanned
        );
    } else {
        println!(
            "{} {} violation(s) in {} file(s) ({} scanned)",
            "found".yellow().bold(),
            stats.total,
            stats.affected_files,
            summary.files_scanned
        );
    }
    if !summary.fixed_files.is_empty() {
        println!(
            "applied '{}' to {} file(s)",
            FIX_TITLE,
            summary.fixed_files.len()
        );
    }
    if !summary.artifacts_written.is_empty() || summary.generator.up_to_date > 0 {
        println!(
            "generated {} proxy module(s), {} up-to-date",
            summary.artifacts_written.len(),
            summary.generator.up_to_date
        );
    }
    if summary.cancelled {
        println!("{}", "analysis cancelled before completion".red());
    }
}
