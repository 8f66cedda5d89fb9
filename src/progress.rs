//! Progress bars for loading and replay
//!
//! Wraps indicatif so the sequencer and executor progress callbacks can
//! drive a terminal display.

use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Resolution of the weighted load bar
const LOAD_STEPS: u64 = 1000;

fn bar_style(template: &str) -> ProgressStyle {
    ProgressStyle::default_bar()
        .template(template)
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("#>-")
}

/// Progress bar for market data loading, fed in weight units
pub struct LoadProgress {
    pub progress: ProgressBar,
}

impl LoadProgress {
    pub fn new() -> Self {
        let progress = ProgressBar::new(LOAD_STEPS);
        progress.set_style(bar_style(
            "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {percent}% {msg}",
        ));
        progress.set_message("📥 loading market data");
        Self { progress }
    }

    /// Set position from `(done, total)` weight units
    pub fn update(&self, done: f64, total: f64) {
        if total <= 0.0 {
            return;
        }
        let frac = (done / total).clamp(0.0, 1.0);
        self.progress.set_position((frac * LOAD_STEPS as f64) as u64);
    }

    pub fn finish(&self, events: usize) {
        self.progress
            .finish_with_message(format!("✅ {} events sequenced", events));
    }

    pub fn finish_with_error(&self, error: &str) {
        self.progress.abandon_with_message(format!("❌ Failed: {}", error));
    }
}

impl Default for LoadProgress {
    fn default() -> Self {
        Self::new()
    }
}

/// Progress bar for the replay loop
pub struct ReplayProgress {
    pub progress: ProgressBar,
}

impl ReplayProgress {
    pub fn new(total_events: usize) -> Self {
        let progress = ProgressBar::new(total_events as u64);
        progress.set_style(bar_style(
            "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})\n{msg}",
        ));
        progress.enable_steady_tick(Duration::from_millis(200));
        Self { progress }
    }

    /// Set position from the executor's `(processed, total)` callback
    pub fn update(&self, processed: usize, total: usize) {
        if self.progress.length() != Some(total as u64) {
            self.progress.set_length(total as u64);
        }
        self.progress.set_position(processed as u64);
    }

    pub fn finish(&self, deals: usize, nav: &str) {
        self.progress.finish_with_message(format!(
            "✅ Replay complete! {} deals, nav {}",
            deals, nav
        ));
    }
}
