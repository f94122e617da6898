//! Compare command implementation.

use crate::cli::CompareArgs;
use crate::error::add_compare_context;
use crate::output::OutputFormatter;
use crate::progress::CliProgress;
use anyhow::Result;
use catf_core::CompareConfig;
use catf_core::FailurePolicy;
use catf_core::NoopProgress;
use catf_core::ProgressCallback;
use catf_core::compare_artifacts_with;
use catf_core::deadline::Deadline;
use catf_core::tools::SystemTools;

pub fn execute(
    args: &CompareArgs,
    formatter: &dyn OutputFormatter,
    show_progress: bool,
) -> Result<()> {
    let config = build_config(args);
    let tools = SystemTools::new(&config.image_tool).with_deadline(Deadline::start(config.deadline));

    // Use a spinner only on an interactive, non-JSON, non-quiet run
    let report = if show_progress {
        let progress = CliProgress::new();
        run(args, &config, &tools, &progress)?
    } else {
        run(args, &config, &tools, &NoopProgress)?
    };

    formatter.format_comparison_result(&report)?;

    Ok(())
}

fn run(
    args: &CompareArgs,
    config: &CompareConfig,
    tools: &SystemTools,
    progress: &dyn ProgressCallback,
) -> Result<catf_core::ComparisonReport> {
    add_compare_context(compare_artifacts_with(
        &args.first,
        &args.second,
        config,
        tools,
        tools,
        progress,
    ))
}

fn build_config(args: &CompareArgs) -> CompareConfig {
    let mut config = CompareConfig::default()
        .with_output_dir(&args.output)
        .with_force_clean(args.force_clean)
        .with_filter_duplicates(!args.no_filter_duplicates)
        .with_deadline(args.timeout);

    if let Some(dir) = &args.staging_dir {
        config = config.with_staging_dir(dir);
    }
    if let Some(dir) = &args.image_tool {
        config = config.with_image_tool(dir);
    }
    if let Some(jobs) = args.jobs {
        config = config.with_jobs(jobs);
    }
    if let Some(depth) = args.max_depth {
        config = config.with_max_depth(depth);
    }
    if args.abort_on_failure {
        config = config.with_failure_policy(FailurePolicy::Abort);
    }
    config
}
