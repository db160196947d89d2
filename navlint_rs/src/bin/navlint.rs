use std::panic;
use std::process::ExitCode;

use navlint::analyzer::run_analysis;
use navlint::args::parse_args;
use navlint::types::CancelToken;

fn install_broken_pipe_handler() {
    let default_hook = panic::take_hook();
    panic::set_hook(Box::new(move |info| {
        let payload = info.payload();
        let is_broken = payload
            .downcast_ref::<&str>()
            .is_some_and(|s| s.contains("Broken pipe"))
            || payload
                .downcast_ref::<String>()
                .is_some_and(|s| s.contains("Broken pipe"));

        if is_broken {
            // Quietly exit when downstream closes the pipe (e.g. piping to `head`).
            std::process::exit(0);
        }

        default_hook(info);
    }));
}

fn usage() -> &'static str {
    "navlint - Collection navigation analyzer for lazyorm entities\n\n\
Quick start:\n  \
  navlint                   Analyze current directory, write .navlint/findings.json\n  \
  navlint src --fix         Rewrite flagged accesses to <prop>Query()\n  \
  navlint src --generate    Emit proxy companions for every entity\n\n\
Usage: navlint [root ...] [options]\n\n\
Modes:\n  \
  (default)                 Report EFPA01 collection navigation violations\n  \
  --fix                     Apply 'Avoid collection navigation property usage' batch fix\n  \
  --generate                Generate <Type>.NavigationCollectionProxy.ts companions\n  \
  --force-generate          Same, ignoring the incremental cache\n\n\
Output:\n  \
  --json                    JSON output\n  \
  --sarif                   SARIF 2.1.0 output for CI integration\n  \
  --color <auto|always|never>\n  \
  --no-color                Shorthand for --color never\n\n\
Common:\n  \
  --ext <list>              Extensions (default: ts,tsx,mts,cts)\n  \
  -I, --ignore <glob>       Ignore pattern (repeatable)\n  \
  --fail-on-violations      Exit 1 when any violation is reported\n  \
  --verbose                 Show detailed progress\n  \
  --help, -h                Show this message\n  \
  --version                 Show version\n"
}

fn main() -> ExitCode {
    install_broken_pipe_handler();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let parsed = match parse_args(&args) {
        Ok(parsed) => parsed,
        Err(message) => {
            eprintln!("[navlint][error] {message}");
            return ExitCode::from(2);
        }
    };

    if parsed.show_help {
        print!("{}", usage());
        return ExitCode::SUCCESS;
    }
    if parsed.show_version {
        println!("navlint {}", env!("CARGO_PKG_VERSION"));
        return ExitCode::SUCCESS;
    }

    let cancel = CancelToken::new();
    match run_analysis(&parsed, &cancel) {
        Ok(summary) => {
            if parsed.fail_on_violations && !summary.diagnostics.is_empty() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            }
        }
        Err(err) => {
            eprintln!("[navlint][error] {err:#}");
            ExitCode::FAILURE
        }
    }
}
