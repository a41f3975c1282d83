//! paquet CLI binary entry point.
//! Delegates to the library for loading, planning and writing, and maps
//! failures to exit codes (2 setup, 1 run failures or `--check` changes).

use clap::Parser;
use paquet::cli::{Cli, Commands, ConfigArgs};
use paquet::config::{self, Config, Overrides};
use paquet::error::Error;
use paquet::run::{self, RunOptions};
use paquet::{logging, output, utils};

fn main() {
    let cli = Cli::parse();
    logging::init(cli.verbose);
    match cli.cmd {
        Commands::Version => {
            println!("{}", env!("CARGO_PKG_VERSION"));
        }
        Commands::Rules { config, output } => {
            let cfg = load_or_exit(&config);
            output::print_rules(&cfg, output.as_deref().unwrap_or("human"));
        }
        Commands::Apply {
            source,
            config,
            dry_run,
            diff,
            check,
            jobs,
            out,
            output,
        } => {
            let cfg = load_or_exit(&config);
            let output = output.unwrap_or_else(|| "human".to_string());
            // --diff and --check never write.
            let dry_run = dry_run || diff || check;
            if dry_run && out.is_some() {
                eprintln!(
                    "{} --out is ignored in a dry run",
                    utils::note_prefix()
                );
            }
            let opts = RunOptions {
                source,
                out,
                dry_run,
                jobs,
                diffs: diff,
            };
            let res = match run::run(&cfg, &opts) {
                Ok(r) => r,
                Err(e) => fail(&e),
            };
            output::print_report(&res.report, &res.diffs, &output);
            if check && res.report.summary.changed > 0 {
                std::process::exit(1);
            }
            if res.report.written && res.report.has_errors() {
                std::process::exit(1);
            }
        }
    }
}

fn load_or_exit(args: &ConfigArgs) -> Config {
    let cwd = std::env::current_dir().unwrap_or_else(|_| ".".into());
    let path = config::resolve_config_path(args.config.as_deref(), &cwd);
    let overrides = Overrides {
        package_name: args.package_name.clone(),
        reference: args.reference.clone(),
        repo_url: args.repo.clone(),
    };
    match config::load_config(&path, &overrides) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("{} {}", utils::error_prefix(), e);
            std::process::exit(2);
        }
    }
}

fn fail(err: &Error) -> ! {
    match err {
        Error::Placeholder(list) => {
            for e in list {
                eprintln!("{} {}", utils::error_prefix(), e);
            }
        }
        Error::PathCollision(list) => {
            for c in list {
                eprintln!("{} output path collision: {}", utils::error_prefix(), c);
            }
        }
        other => eprintln!("{} {}", utils::error_prefix(), other),
    }
    std::process::exit(err.exit_code());
}
