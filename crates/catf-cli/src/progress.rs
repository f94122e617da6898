//! Spinner shown while a comparison runs.

use catf_core::ProgressCallback;
use catf_core::types::LogicalPath;
use console::Term;
use indicatif::ProgressBar;
use indicatif::ProgressStyle;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::time::Duration;

/// CLI spinner implementing `ProgressCallback`.
///
/// Shows the logical path of the container being unpacked and how many
/// containers are done, then the number of diffs rendered. Sibling containers report from worker threads, so all
/// state is shared. Cleared on drop.
pub struct CliProgress {
    bar: ProgressBar,
    containers: AtomicUsize,
}

impl CliProgress {
    /// Creates and starts the spinner.
    #[must_use]
    pub fn new() -> Self {
        let bar = ProgressBar::new_spinner();
        bar.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.cyan} [{elapsed}] {prefix:.bold} {wide_msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        bar.set_prefix("Comparing");
        bar.enable_steady_tick(Duration::from_millis(120));

        Self {
            bar,
            containers: AtomicUsize::new(0),
        }
    }

    /// Checks if we should show progress (TTY detection).
    #[must_use]
    pub fn should_show(quiet: bool, json: bool) -> bool {
        !quiet && !json && Term::stdout().is_term()
    }

    fn display(path: &LogicalPath) -> &str {
        if path.is_root() { "/" } else { path.as_str() }
    }
}

impl Default for CliProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for CliProgress {
    fn drop(&mut self) {
        self.bar.finish_and_clear();
    }
}

impl ProgressCallback for CliProgress {
    fn on_node_start(&self, path: &LogicalPath, depth: usize) {
        self.bar
            .set_message(format!("{}{}", "  ".repeat(depth), Self::display(path)));
    }

    fn on_node_complete(&self, _path: &LogicalPath, _leaves: usize) {
        let done = self.containers.fetch_add(1, Ordering::Relaxed) + 1;
        self.bar.set_prefix(format!("Comparing ({done} containers done)"));
    }

    fn on_render(&self, path: &LogicalPath, current: usize, total: usize) {
        self.bar.set_prefix(format!("Rendering {current}/{total}"));
        self.bar.set_message(Self::display(path).to_string());
    }

    fn on_complete(&self) {
        self.bar.finish_and_clear();
    }
}
