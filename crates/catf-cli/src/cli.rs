//! CLI argument parsing using clap.

use clap::ArgAction;
use clap::Parser;
use clap::Subcommand;
use clap_complete::Shell;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "catf")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Output results in JSON format
    #[arg(short, long, global = true)]
    pub json: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Recursively compare two target-files archives
    Compare(CompareArgs),
    /// Print build properties stored in a target-files archive
    #[command(visible_alias = "extract")]
    BuildInfo(BuildInfoArgs),
    /// Generate shell completions
    Completion(CompletionArgs),
}

#[derive(clap::Args)]
pub struct CompareArgs {
    /// First (older) artifact
    #[arg(value_name = "TARGET1")]
    pub first: PathBuf,

    /// Second (newer) artifact
    #[arg(value_name = "TARGET2")]
    pub second: PathBuf,

    /// Directory receiving the diff tree (replaced on every run)
    #[arg(short, long, value_name = "DIR", default_value = "diffs")]
    pub output: PathBuf,

    /// Where unpacked contents are staged (default: <tmp>/catf)
    #[arg(long, value_name = "DIR")]
    pub staging_dir: Option<PathBuf>,

    /// Discard previously staged extractions before starting
    #[arg(long)]
    pub force_clean: bool,

    /// Keep leaves whose files repeat an earlier difference
    #[arg(long)]
    pub no_filter_duplicates: bool,

    /// Image editor checkout containing `gradlew` (default: ~/gradlew)
    #[arg(long, value_name = "DIR")]
    pub image_tool: Option<PathBuf>,

    /// Stop at the first pair that cannot be unpacked
    #[arg(long)]
    pub abort_on_failure: bool,

    /// Worker threads (default: one per CPU)
    #[arg(short, long, value_name = "N")]
    pub jobs: Option<usize>,

    /// Give up after this long (e.g. 90, 90s, 15m, 2h)
    #[arg(long, value_name = "DURATION", value_parser = parse_duration)]
    pub timeout: Option<Duration>,

    /// Maximum container nesting depth
    #[arg(long, value_name = "N")]
    pub max_depth: Option<usize>,
}

#[derive(clap::Args)]
pub struct BuildInfoArgs {
    /// Target-files archive
    #[arg(value_name = "TARGET")]
    pub target: PathBuf,

    /// Property to print (can be repeated)
    #[arg(long = "prop", value_name = "KEY")]
    pub props: Vec<String>,
}

#[derive(clap::Args)]
pub struct CompletionArgs {
    /// Target shell
    #[arg(value_name = "SHELL")]
    pub shell: Shell,
}

/// Parse a duration in seconds with an optional unit suffix (s, m, h)
#[allow(clippy::option_if_let_else)]
fn parse_duration(s: &str) -> Result<Duration, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("empty duration".to_string());
    }

    let (num_str, multiplier) = if let Some(stripped) = s.strip_suffix('h') {
        (stripped, 3600)
    } else if let Some(stripped) = s.strip_suffix('m') {
        (stripped, 60)
    } else if let Some(stripped) = s.strip_suffix('s') {
        (stripped, 1)
    } else {
        (s, 1)
    };

    num_str
        .parse::<u64>()
        .map_err(|_| format!("invalid duration: {s}"))
        .and_then(|n| {
            n.checked_mul(multiplier)
                .ok_or_else(|| format!("duration overflow: {s}"))
        })
        .map(Duration::from_secs)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("90").unwrap(), Duration::from_secs(90));
        assert_eq!(parse_duration("90s").unwrap(), Duration::from_secs(90));
        assert_eq!(parse_duration("15m").unwrap(), Duration::from_secs(900));
        assert_eq!(parse_duration("2h").unwrap(), Duration::from_secs(7200));
        assert!(parse_duration("soon").is_err());
        assert!(parse_duration("").is_err());
        assert!(parse_duration("h").is_err());
    }

    #[test]
    fn test_parse_duration_overflow() {
        assert!(parse_duration("18446744073709551615h").is_err());
    }

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_verbose_counts() {
        let cli = Cli::try_parse_from(["catf", "-vv", "build-info", "t.zip"]).unwrap();
        assert_eq!(cli.verbose, 2);
        assert!(matches!(cli.command, Commands::BuildInfo(_)));
    }

    #[test]
    fn test_extract_alias() {
        let cli = Cli::try_parse_from(["catf", "extract", "t.zip", "--prop", "a", "--prop", "b"])
            .unwrap();
        match cli.command {
            Commands::BuildInfo(args) => assert_eq!(args.props, ["a", "b"]),
            _ => panic!("expected build-info"),
        }
    }
}
