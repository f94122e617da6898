//! Human-readable output formatter with colors and styling.

use super::formatter::OutputFormatter;
use anyhow::Result;
use catf_core::ComparisonReport;
use console::Term;
use console::style;
use std::path::Path;

pub struct HumanFormatter {
    verbose: bool,
    quiet: bool,
    use_colors: bool,
    term: Term,
    err_term: Term,
}

impl HumanFormatter {
    pub fn new(verbose: bool, quiet: bool) -> Self {
        Self {
            verbose,
            quiet,
            use_colors: console::colors_enabled(),
            term: Term::stdout(),
            err_term: Term::stderr(),
        }
    }

    fn format_number(n: usize) -> String {
        let s = n.to_string();
        let mut result = String::new();
        let mut count = 0;

        for c in s.chars().rev() {
            if count == 3 {
                result.push(',');
                count = 0;
            }
            result.push(c);
            count += 1;
        }

        result.chars().rev().collect()
    }

    fn heading(&self, text: &str, ok: bool) -> String {
        if !self.use_colors {
            return text.to_string();
        }
        if ok {
            format!("{} {text}", style("✓").green().bold())
        } else {
            format!("{} {text}", style("⚠").yellow().bold())
        }
    }
}

impl OutputFormatter for HumanFormatter {
    fn format_comparison_result(&self, report: &ComparisonReport) -> Result<()> {
        if self.quiet {
            return Ok(());
        }

        let clean = !report.has_uncomparable();
        let _ = self.term.write_line(&self.heading(
            &format!(
                "Comparison completed in {:.2} seconds",
                report.elapsed.as_secs_f64()
            ),
            clean,
        ));
        let _ = self.term.write_line(&format!(
            "  Files that differ: {}",
            Self::format_number(report.total_differing())
        ));
        for (extension, count) in report.extension_counts() {
            let _ = self.term.write_line(&format!(
                "    {extension}: {}",
                Self::format_number(count)
            ));
        }
        let _ = self
            .term
            .write_line(&format!("  Diff tree: {}", report.output_dir.display()));
        let _ = self
            .term
            .write_line(&format!("  Summary:   {}", report.summary_path.display()));

        if self.verbose {
            let _ = self.term.write_line(&format!(
                "  Leaves found: {} ({} duplicates filtered)",
                Self::format_number(report.leaves_discovered),
                Self::format_number(report.duplicates_filtered)
            ));
            for leaf in &report.differing {
                let _ = self.term.write_line(&format!("    {}", leaf.logical_path));
            }
        }

        if !clean {
            let _ = self.term.write_line("");
            let text = report.uncomparable_summary();
            if self.use_colors {
                let _ = self.term.write_line(&style(text.trim_end()).yellow().to_string());
            } else {
                let _ = self.term.write_line(text.trim_end());
            }
        }

        Ok(())
    }

    fn format_build_info(&self, _target: &Path, props: &[(String, String)]) -> Result<()> {
        for (key, value) in props {
            let _ = self.term.write_line(&format!("{key}={value}"));
        }
        Ok(())
    }

    fn format_error(&self, error: &anyhow::Error) {
        // Always show errors, even in quiet mode
        if self.use_colors {
            let _ = self
                .err_term
                .write_line(&format!("{} {error:?}", style("ERROR:").red().bold()));
        } else {
            let _ = self.err_term.write_line(&format!("ERROR: {error:?}"));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_number() {
        assert_eq!(HumanFormatter::format_number(0), "0");
        assert_eq!(HumanFormatter::format_number(999), "999");
        assert_eq!(HumanFormatter::format_number(1000), "1,000");
        assert_eq!(HumanFormatter::format_number(1_234_567), "1,234,567");
    }

    #[test]
    fn test_heading_without_colors() {
        let formatter = HumanFormatter {
            verbose: false,
            quiet: false,
            use_colors: false,
            term: Term::stdout(),
            err_term: Term::stderr(),
        };
        assert_eq!(formatter.heading("done", true), "done");
    }
}
