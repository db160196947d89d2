//! File discovery for analysis roots.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use globset::{Glob, GlobSet, GlobSetBuilder};
use walkdir::WalkDir;

/// Build a globset from user ignore patterns. Invalid globs are reported and
/// skipped rather than aborting the scan.
pub fn build_globset(patterns: &[String]) -> Option<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    let mut added = false;
    for pat in patterns {
        if pat.trim().is_empty() {
            continue;
        }
        match Glob::new(pat) {
            Ok(glob) => {
                builder.add(glob);
                added = true;
            }
            Err(err) => eprintln!("[navlint][warn] invalid glob '{}': {}", pat, err),
        }
    }
    if !added { None } else { builder.build().ok() }
}

fn is_hidden_or_vendored(entry: &walkdir::DirEntry) -> bool {
    entry
        .file_name()
        .to_str()
        .is_some_and(|name| (name.starts_with('.') && name != ".") || name == "node_modules")
}

pub fn matches_extension(path: &Path, extensions: &HashSet<String>) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| extensions.contains(&ext.to_lowercase()))
}

/// Gather source files under `root`, filtered by extension and ignore globs.
/// The result is sorted so downstream artifacts are deterministic.
pub fn gather_files(
    root: &Path,
    extensions: &HashSet<String>,
    ignore: Option<&GlobSet>,
) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_entry(|e| !is_hidden_or_vendored(e))
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .map(walkdir::DirEntry::into_path)
        .filter(|p| matches_extension(p, extensions))
        .filter(|p| {
            ignore.is_none_or(|set| {
                let relative = p.strip_prefix(root).unwrap_or(p);
                !set.is_match(relative) && !set.is_match(p)
            })
        })
        .collect();
    files.sort();
    files
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn extset(list: &[&str]) -> HashSet<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn gathers_only_matching_extensions() {
        let dir = tempfile::Builder::new().prefix("navlint").tempdir().unwrap();
        fs::write(dir.path().join("a.ts"), "export {};").unwrap();
        fs::write(dir.path().join("b.rs"), "fn main() {}").unwrap();
        fs::create_dir(dir.path().join("node_modules")).unwrap();
        fs::write(dir.path().join("node_modules/c.ts"), "export {};").unwrap();

        let files = gather_files(dir.path(), &extset(&["ts"]), None);
        assert_eq!(files.len(), 1);
        assert!(files[0].ends_with("a.ts"));
    }

    #[test]
    fn ignore_globs_are_relative_to_root() {
        let dir = tempfile::Builder::new().prefix("navlint").tempdir().unwrap();
        fs::create_dir(dir.path().join("gen")).unwrap();
        fs::write(dir.path().join("gen/a.ts"), "export {};").unwrap();
        fs::write(dir.path().join("b.ts"), "export {};").unwrap();

        let ignore = build_globset(&["gen/**".to_string()]);
        let files = gather_files(dir.path(), &extset(&["ts"]), ignore.as_ref());
        assert_eq!(files.len(), 1);
        assert!(files[0].ends_with("b.ts"));
    }

    #[test]
    fn invalid_globs_are_skipped() {
        assert!(build_globset(&["[".to_string()]).is_none());
    }
}
