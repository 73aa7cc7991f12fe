use std::time::Duration;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

/// Scenario progress for the attack queue.
///
/// Position only grows; the length is re-estimated as `position + remaining`
/// on every update, so it grows when per-parameter scenarios are enqueued
/// mid-run.
pub struct AttackProgress {
    bar: ProgressBar,
}

impl AttackProgress {
    pub fn new(initial_remaining: usize) -> Self {
        let bar = ProgressBar::new(initial_remaining as u64);
        let style = ProgressStyle::default_bar()
            .template("  {spinner:.cyan} {bar:30.cyan/dark_gray} {pos}/{len} scenarios | {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▓░");
        bar.set_style(style);
        bar.enable_steady_tick(Duration::from_millis(120));
        Self { bar }
    }

    /// A bar that never draws.
    pub fn hidden() -> Self {
        let bar = ProgressBar::with_draw_target(Some(0), ProgressDrawTarget::hidden());
        Self { bar }
    }

    /// One scenario finished; `remaining` is the current queue size.
    pub fn scenario_done(&self, remaining: usize, failed_iterations: usize) {
        self.bar.inc(1);
        self.bar.set_length(self.bar.position() + remaining as u64);
        if failed_iterations > 0 {
            self.bar.set_message(format!("{} failed iterations in last scenario", failed_iterations));
        } else {
            self.bar.set_message("running");
        }
    }

    pub fn position(&self) -> u64 {
        self.bar.position()
    }

    pub fn length(&self) -> u64 {
        self.bar.length().unwrap_or(0)
    }

    pub fn finish(&self) {
        self.bar.finish_with_message("attack queue stopped");
    }
}
