use indicatif::{ProgressBar, ProgressStyle};

const TEMPLATE: &str = "{msg:>10} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})";

/// Progress of a long loop: a bar on an interactive stderr, periodic log lines otherwise.
pub struct Progress {
    bar: ProgressBar,
    label: String,
    /// Log every `step` items when the bar is hidden.
    step: u64,
}

impl Progress {
    pub fn new(total: u64, label: &str) -> Self {
        let bar = ProgressBar::new(total);
        bar.set_style(
            ProgressStyle::with_template(TEMPLATE)
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("#>-"),
        );
        bar.set_message(label.to_string());
        Progress {
            bar,
            label: label.to_string(),
            step: (total / 20).max(1),
        }
    }

    pub fn inc(&self) {
        self.bar.inc(1);
        if self.bar.is_hidden() {
            let pos = self.bar.position();
            if pos % self.step == 0 {
                log::info!("{}: {} / {}", self.label, pos, self.bar.length().unwrap_or(pos));
            }
        }
    }

    /// Adjust the expected total when the server's count turns out to be stale.
    pub fn grow_to(&self, total: u64) {
        if self.bar.length().is_some_and(|len| total > len) {
            self.bar.set_length(total);
        }
    }

    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }
}
