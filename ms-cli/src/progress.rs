use indicatif::{ProgressBar, ProgressStyle};
use ms_hal::ProgressCallbacks;

const TEMPLATE: &str =
    "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec}, {eta})";

/// Terminal progress bar for long reads.
pub(crate) struct Progress {
    bar: Option<ProgressBar>,
    done: &'static str,
}

impl Progress {
    pub(crate) fn new(done: &'static str) -> Self {
        Self { bar: None, done }
    }
}

impl ProgressCallbacks for Progress {
    fn init(&mut self, total: usize) {
        let bar = ProgressBar::new(total as u64);
        if let Ok(style) = ProgressStyle::with_template(TEMPLATE) {
            bar.set_style(style.progress_chars("#>-"));
        }
        self.bar = Some(bar);
    }

    fn update(&mut self, current: usize) {
        if let Some(bar) = &self.bar {
            bar.set_position(current as u64);
        }
    }

    fn finish(&mut self) {
        if let Some(bar) = self.bar.take() {
            if bar.length().is_some_and(|total| bar.position() < total) {
                bar.abandon();
            } else {
                bar.finish_with_message(self.done);
            }
        }
    }
}
