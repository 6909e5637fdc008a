//! Smoke-test harness for the `shvars` library: assign variables from
//! `NAME=VALUE` arguments, print the resulting exported environment, and
//! optionally run a pattern operator against a value. No script
//! execution here, just the variable store and pattern engine.

use clap::Parser;
use log::info;

use shvars::environment::EnvironmentProjector;
use shvars::pattern::{Anchor, Greediness, Pattern};
use shvars::substitution::{remove, RemovalSide};
use shvars::ScopeStack;

/// Exercise the shvars variable store and pattern engine from the command line.
#[derive(Parser, Debug)]
#[command(name = "shvars-cli", version, about)]
struct Cli {
    /// `NAME=VALUE` assignments to apply before printing the environment.
    #[arg(value_name = "NAME=VALUE")]
    assignments: Vec<String>,

    /// Mark every assigned name as exported.
    #[arg(short = 'x', long)]
    export: bool,

    /// Apply `##pattern` (longest-prefix removal) to this NAME and print the
    /// result instead of the environment.
    #[arg(long, value_name = "NAME")]
    strip_prefix_longest: Option<String>,

    /// Pattern to use with `--strip-prefix-longest`.
    #[arg(long, value_name = "PATTERN")]
    pattern: Option<String>,
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    let mut scope = ScopeStack::new();
    for assignment in &cli.assignments {
        let Some((name, value)) = assignment.split_once('=') else {
            eprintln!("shvars-cli: ignoring malformed assignment `{assignment}'");
            continue;
        };
        match scope.bind(name) {
            Ok(var) => {
                if let Err(e) = var.assign_scalar(value, false, |s| Ok(s.to_string())) {
                    eprintln!("shvars-cli: {e}");
                    continue;
                }
                if cli.export {
                    var.attributes.insert(shvars::Attributes::EXPORTED);
                }
                info!("assigned {name}={value}");
            }
            Err(e) => eprintln!("shvars-cli: {e}"),
        }
    }

    if let (Some(name), Some(pattern_src)) = (&cli.strip_prefix_longest, &cli.pattern) {
        let value = scope
            .lookup(name)
            .map(|v| v.payload().scalarize())
            .unwrap_or_default();
        let pattern = Pattern::compile(pattern_src);
        let result = remove(&value, &pattern, RemovalSide::PrefixLongest);
        println!("{result}");
        return;
    }

    let mut projector = EnvironmentProjector::new();
    for (name, value) in projector.export(&scope) {
        println!("{name}={value}");
    }

    // Exercise the Free-anchor search path too, so the binary's own smoke
    // test touches every public entry point in `pattern`.
    let _ = Pattern::compile("*").find("shvars", Anchor::Free, Greediness::Longest);
}
