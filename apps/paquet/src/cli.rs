//! CLI argument parsing via `clap`.

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "paquet",
    version,
    about = "Repackage a source tree under a new namespace",
    long_about = "paquet rewrites paths and contents of an upstream tree with ordered search/replace rules, renders templates, and writes the result atomically.\n\nConfiguration precedence: CLI > search-and-replace.yml > defaults.",
    after_help = "Examples:\n  paquet apply --dry-run\n  paquet apply vendor/blog --out build --package-name wagtail_dsfr\n  paquet apply --check --output json\n  paquet rules -c search-and-replace.yml",
    arg_required_else_help = true
)]
/// Top-level CLI options and subcommands.
pub struct Cli {
    #[arg(short, long, action = ArgAction::Count, global = true, help = "Increase log verbosity (-v info, -vv debug)")]
    pub verbose: u8,
    #[command(subcommand)]
    pub cmd: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show version
    #[command(about = "Show version", long_about = "Print the current paquet version.")]
    Version,
    /// Transform a source tree
    #[command(
        about = "Apply rules and templates to a source tree",
        long_about = "Walk SOURCE, rewrite paths and contents with the configured rules, render templates, then write the result in place or under --out. With --diff or --check nothing is written.",
        after_help = "Examples:\n  paquet apply --dry-run --diff\n  paquet apply upstream --out dist -j 8"
    )]
    Apply {
        #[arg(default_value = ".", help = "Source tree root (default: current dir)")]
        source: PathBuf,
        #[command(flatten)]
        config: ConfigArgs,
        #[arg(long, action = ArgAction::SetTrue, help = "Report what would change without writing")]
        dry_run: bool,
        #[arg(long, action = ArgAction::SetTrue, help = "Show unified diffs of changed files (implies --dry-run)")]
        diff: bool,
        #[arg(long, action = ArgAction::SetTrue, help = "Exit non-zero if changes would occur (implies --dry-run)")]
        check: bool,
        #[arg(short, long, help = "Worker threads (default: available parallelism)")]
        jobs: Option<usize>,
        #[arg(long, help = "Write the full transformed tree under DIR instead of in place")]
        out: Option<PathBuf>,
        #[arg(long, help = "Output mode: human|json (default: human)")]
        output: Option<String>,
    },
    /// Show the concrete rules
    #[command(
        about = "Print the expanded rule list",
        long_about = "Load and validate the configuration, then print every concrete rule after placeholder and {app} expansion, followed by the placeholder values."
    )]
    Rules {
        #[command(flatten)]
        config: ConfigArgs,
        #[arg(long, help = "Output mode: human|json (default: human)")]
        output: Option<String>,
    },
}

#[derive(clap::Args)]
/// Where the configuration comes from, and values overriding it.
pub struct ConfigArgs {
    #[arg(short, long, help = "Rules file (default: search-and-replace.{yml,yaml,toml,json})")]
    pub config: Option<PathBuf>,
    #[arg(long, help = "Override package_name")]
    pub package_name: Option<String>,
    #[arg(long = "ref", help = "Override ref (tag or version)")]
    pub reference: Option<String>,
    #[arg(long, help = "Override source_repo_url")]
    pub repo: Option<String>,
}
