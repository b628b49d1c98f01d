// file: src/pipeline/progress.rs
// description: terminal progress and run statistics for cli stage sequences
// reference: uses indicatif for progress bars and tracks stage outcomes

use colored::Colorize;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

#[derive(Debug, Clone, Default)]
pub struct RunStats {
    pub steps_completed: usize,
    pub steps_failed: usize,
    pub rows_processed: usize,
    pub duration_ms: u64,
}

impl RunStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rows_per_second(&self) -> f64 {
        if self.duration_ms == 0 {
            return 0.0;
        }
        self.rows_processed as f64 * 1000.0 / self.duration_ms as f64
    }

    pub fn success_rate(&self) -> f64 {
        let total = self.steps_completed + self.steps_failed;
        if total == 0 {
            return 0.0;
        }
        (self.steps_completed as f64 / total as f64) * 100.0
    }

    pub fn summary(&self) -> String {
        format!(
            "{} step(s) ok, {} failed in {:.2}s",
            self.steps_completed.to_string().green(),
            self.steps_failed.to_string().red(),
            self.duration_ms as f64 / 1000.0
        )
    }
}

/// One bar for the step sequence, one line underneath for the current step.
/// Shared counters let concurrent comparison runs report into the same bar.
pub struct StageProgress {
    main_bar: ProgressBar,
    detail_bar: ProgressBar,
    completed: Arc<AtomicUsize>,
    failed: Arc<AtomicUsize>,
    rows: Arc<AtomicUsize>,
    start_time: Instant,
}

impl StageProgress {
    pub fn new(total_steps: usize, colored: bool) -> Self {
        let multi_progress = MultiProgress::new();
        let main_bar = multi_progress.add(ProgressBar::new(total_steps as u64));
        main_bar.set_style(main_style(colored));
        let detail_bar = multi_progress.add(ProgressBar::new(0));
        detail_bar.set_style(
            ProgressStyle::default_bar()
                .template("{msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );

        Self::from_bars(main_bar, detail_bar)
    }

    /// Counts without drawing; used when output is piped or under test.
    pub fn hidden(total_steps: usize) -> Self {
        Self::from_bars(ProgressBar::hidden(), ProgressBar::hidden()).with_length(total_steps)
    }

    fn from_bars(main_bar: ProgressBar, detail_bar: ProgressBar) -> Self {
        Self {
            main_bar,
            detail_bar,
            completed: Arc::new(AtomicUsize::new(0)),
            failed: Arc::new(AtomicUsize::new(0)),
            rows: Arc::new(AtomicUsize::new(0)),
            start_time: Instant::now(),
        }
    }

    fn with_length(self, total_steps: usize) -> Self {
        self.main_bar.set_length(total_steps as u64);
        self
    }

    pub fn start_step(&self, name: &str) {
        self.detail_bar.set_message(format!("Running {}", name.cyan()));
    }

    pub fn complete_step(&self, name: &str) {
        self.completed.fetch_add(1, Ordering::SeqCst);
        self.main_bar.inc(1);
        self.main_bar.set_message(name.to_string());
    }

    pub fn fail_step(&self, name: &str) {
        self.failed.fetch_add(1, Ordering::SeqCst);
        self.main_bar.inc(1);
        self.detail_bar
            .set_message(format!("{} failed", name).red().to_string());
    }

    /// Prints above the bars without tearing them.
    pub fn println(&self, line: String) {
        self.main_bar.println(line);
    }

    pub fn add_rows(&self, rows: usize) {
        self.rows.fetch_add(rows, Ordering::SeqCst);
    }

    pub fn finish(&self) {
        self.main_bar.finish_and_clear();
        self.detail_bar.finish_and_clear();
    }

    pub fn stats(&self) -> RunStats {
        RunStats {
            steps_completed: self.completed.load(Ordering::SeqCst),
            steps_failed: self.failed.load(Ordering::SeqCst),
            rows_processed: self.rows.load(Ordering::SeqCst),
            duration_ms: self.start_time.elapsed().as_millis() as u64,
        }
    }
}

impl Drop for StageProgress {
    fn drop(&mut self) {
        self.finish();
    }
}

fn main_style(colored: bool) -> ProgressStyle {
    let (template, chars) = if colored {
        (
            "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}",
            "█▓▒░",
        )
    } else {
        ("{spinner} [{elapsed_precise}] [{bar:40}] {pos}/{len} {msg}", "=>-")
    };
    ProgressStyle::default_bar()
        .template(template)
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars(chars)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_stats_rates() {
        let stats = RunStats {
            steps_completed: 9,
            steps_failed: 1,
            rows_processed: 5000,
            duration_ms: 2000,
        };
        assert_eq!(stats.rows_per_second(), 2500.0);
        assert!((stats.success_rate() - 90.0).abs() < 1e-9);
        assert!(stats.summary().contains("failed"));
    }

    #[test]
    fn test_run_stats_empty() {
        let stats = RunStats::new();
        assert_eq!(stats.rows_per_second(), 0.0);
        assert_eq!(stats.success_rate(), 0.0);
    }

    #[test]
    fn test_stage_progress_counts() {
        let progress = StageProgress::hidden(4);
        progress.start_step("ingest");
        progress.complete_step("ingest");
        progress.add_rows(150);
        progress.start_step("train");
        progress.fail_step("train");

        let stats = progress.stats();
        assert_eq!(stats.steps_completed, 1);
        assert_eq!(stats.steps_failed, 1);
        assert_eq!(stats.rows_processed, 150);
    }
}
