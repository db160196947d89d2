//! Command-line argument parsing.

use std::collections::HashSet;
use std::path::PathBuf;

use crate::types::{ColorMode, DEFAULT_EXTENSIONS, OutputMode};

pub struct ParsedArgs {
    pub root_list: Vec<PathBuf>,
    pub extensions: HashSet<String>,
    pub ignore_patterns: Vec<String>,
    pub color: ColorMode,
    pub output: OutputMode,
    pub fix: bool,
    pub generate: bool,
    /// Ignore the proxy cache and regenerate every entity.
    pub force_generate: bool,
    pub fail_on_violations: bool,
    pub verbose: bool,
    pub show_help: bool,
    pub show_version: bool,
}

impl Default for ParsedArgs {
    fn default() -> Self {
        Self {
            root_list: Vec::new(),
            extensions: DEFAULT_EXTENSIONS.iter().map(|s| s.to_string()).collect(),
            ignore_patterns: Vec::new(),
            color: ColorMode::Auto,
            output: OutputMode::Human,
            fix: false,
            generate: false,
            force_generate: false,
            fail_on_violations: false,
            verbose: false,
            show_help: false,
            show_version: false,
        }
    }
}

fn parse_color_mode(raw: &str) -> Result<ColorMode, String> {
    match raw {
        "auto" => Ok(ColorMode::Auto),
        "always" => Ok(ColorMode::Always),
        "never" => Ok(ColorMode::Never),
        _ => Err("--color expects auto|always|never".to_string()),
    }
}

pub fn parse_extensions(raw: &str) -> HashSet<String> {
    raw.split(',')
        .filter_map(|segment| {
            let trimmed = segment.trim().trim_start_matches('.').to_lowercase();
            if trimmed.is_empty() { None } else { Some(trimmed) }
        })
        .collect()
}

pub fn parse_args(args: &[String]) -> Result<ParsedArgs, String> {
    let mut parsed = ParsedArgs::default();
    let mut iter = args.iter();

    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--help" | "-h" => parsed.show_help = true,
            "--version" => parsed.show_version = true,
            "--fix" => parsed.fix = true,
            "--generate" => parsed.generate = true,
            "--force-generate" => {
                parsed.generate = true;
                parsed.force_generate = true;
            }
            "--fail-on-violations" => parsed.fail_on_violations = true,
            "--verbose" => parsed.verbose = true,
            "--json" => parsed.output = OutputMode::Json,
            "--sarif" => parsed.output = OutputMode::Sarif,
            "--no-color" => parsed.color = ColorMode::Never,
            "--color" => {
                let value = iter.next().ok_or("--color expects a value")?;
                parsed.color = parse_color_mode(value)?;
            }
            "--ext" => {
                let value = iter.next().ok_or("--ext expects a comma-separated list")?;
                let set = parse_extensions(value);
                if set.is_empty() {
                    return Err("--ext expects a comma-separated list".to_string());
                }
                parsed.extensions = set;
            }
            "-I" | "--ignore" => {
                let value = iter.next().ok_or("--ignore expects a glob pattern")?;
                parsed.ignore_patterns.push(value.clone());
            }
            other if other.starts_with('-') => {
                return Err(format!("unknown option '{other}' (see --help)"));
            }
            root => parsed.root_list.push(PathBuf::from(root)),
        }
    }

    if parsed.root_list.is_empty() {
        parsed.root_list.push(PathBuf::from("."));
    }
    Ok(parsed)
}
