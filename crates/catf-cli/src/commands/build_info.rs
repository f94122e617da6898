//! Build-info command implementation.

use crate::cli::BuildInfoArgs;
use crate::error::add_compare_context;
use crate::output::OutputFormatter;
use anyhow::Result;
use catf_core::buildinfo::DEFAULT_BUILD_PROPS;
use catf_core::read_build_info;

pub fn execute(args: &BuildInfoArgs, formatter: &dyn OutputFormatter) -> Result<()> {
    let props = if args.props.is_empty() {
        add_compare_context(read_build_info(&args.target, DEFAULT_BUILD_PROPS))?
    } else {
        add_compare_context(read_build_info(&args.target, &args.props))?
    };

    formatter.format_build_info(&args.target, &props)?;

    Ok(())
}
