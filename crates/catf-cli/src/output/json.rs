//! JSON output formatter for machine-readable results.

use super::formatter::JsonOutput;
use super::formatter::OutputFormatter;
use anyhow::Result;
use catf_core::ComparisonReport;
use serde::Serialize;
use std::collections::BTreeMap;
use std::io::Write;
use std::io::{self};
use std::path::Path;

pub struct JsonFormatter;

#[derive(Debug, Serialize)]
struct UncomparableOutput {
    path: String,
    first: String,
    second: String,
    reason: String,
}

#[derive(Debug, Serialize)]
struct ComparisonOutput {
    total_differing: usize,
    by_extension: BTreeMap<String, usize>,
    differing: Vec<String>,
    uncomparable: Vec<UncomparableOutput>,
    leaves_discovered: usize,
    duplicates_filtered: usize,
    output_dir: String,
    summary_path: String,
    duration_ms: u128,
}

impl ComparisonOutput {
    fn from_report(report: &ComparisonReport) -> Self {
        Self {
            total_differing: report.total_differing(),
            by_extension: report.extension_counts(),
            differing: report
                .differing
                .iter()
                .map(|leaf| leaf.logical_path.to_string())
                .collect(),
            uncomparable: report
                .uncomparable
                .iter()
                .map(|pair| UncomparableOutput {
                    path: pair.logical_path.to_string(),
                    first: pair.pair.first.display().to_string(),
                    second: pair.pair.second.display().to_string(),
                    reason: pair.reason.clone(),
                })
                .collect(),
            leaves_discovered: report.leaves_discovered,
            duplicates_filtered: report.duplicates_filtered,
            output_dir: report.output_dir.display().to_string(),
            summary_path: report.summary_path.display().to_string(),
            duration_ms: report.elapsed.as_millis(),
        }
    }
}

impl JsonFormatter {
    fn output<T: Serialize>(value: &T) -> Result<()> {
        let json = serde_json::to_string_pretty(value)?;
        writeln!(io::stdout(), "{json}")?;
        Ok(())
    }
}

impl OutputFormatter for JsonFormatter {
    fn format_comparison_result(&self, report: &ComparisonReport) -> Result<()> {
        let output = JsonOutput::success("compare", ComparisonOutput::from_report(report));
        Self::output(&output)
    }

    fn format_build_info(&self, target: &Path, props: &[(String, String)]) -> Result<()> {
        #[derive(Serialize)]
        struct Property<'a> {
            key: &'a str,
            value: &'a str,
        }

        #[derive(Serialize)]
        struct BuildInfoOutput<'a> {
            target: String,
            properties: Vec<Property<'a>>,
        }

        let data = BuildInfoOutput {
            target: target.display().to_string(),
            properties: props
                .iter()
                .map(|(key, value)| Property { key, value })
                .collect(),
        };

        let output = JsonOutput::success("build-info", data);
        Self::output(&output)
    }

    fn format_error(&self, error: &anyhow::Error) {
        let output = JsonOutput::<()>::error("unknown", format!("{error:?}"));
        let _ = Self::output(&output);
    }
}
