//! catf - recursively unpack two build target files and render the files
//! that differ as a tree of diffs.

mod cli;
mod commands;
mod error;
mod logging;
mod output;
mod progress;

use clap::Parser;
use std::process::ExitCode;

fn main() -> ExitCode {
    let cli = cli::Cli::parse();
    logging::init(cli.verbose, cli.quiet);

    let formatter = output::create_formatter(cli.json, cli.verbose > 0, cli.quiet);
    let show_progress = progress::CliProgress::should_show(cli.quiet, cli.json);

    let result = match &cli.command {
        cli::Commands::Compare(args) => {
            commands::compare::execute(args, &*formatter, show_progress)
        }
        cli::Commands::BuildInfo(args) => commands::build_info::execute(args, &*formatter),
        cli::Commands::Completion(args) => {
            commands::completion::execute(args.shell);
            Ok(())
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            formatter.format_error(&err);
            ExitCode::FAILURE
        }
    }
}
