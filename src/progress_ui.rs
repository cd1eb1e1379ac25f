//! Progress bar driven by download events.

use std::io::IsTerminal;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use noveldl_core::{DownloadEvent, DownloadObserver};

const BAR_TEMPLATE: &str = "{spinner} [{bar:30}] {pos}/{len} {msg}";

/// Renders one work's progress on stderr.
///
/// Hidden when quiet or when stderr is not a terminal. Failed chapters are
/// printed above the bar as they happen.
pub(crate) struct ProgressReporter {
    bar: ProgressBar,
}

impl ProgressReporter {
    pub(crate) fn new(quiet: bool) -> Self {
        let bar = if quiet || !std::io::stderr().is_terminal() {
            ProgressBar::hidden()
        } else {
            let bar = ProgressBar::with_draw_target(Some(0), ProgressDrawTarget::stderr());
            bar.set_style(
                ProgressStyle::with_template(BAR_TEMPLATE)
                    .unwrap_or_else(|_| ProgressStyle::default_bar())
                    .progress_chars("=> "),
            );
            bar.enable_steady_tick(Duration::from_millis(100));
            bar
        };
        Self { bar }
    }

    #[cfg(test)]
    fn hidden() -> Self {
        Self {
            bar: ProgressBar::hidden(),
        }
    }

    pub(crate) fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl DownloadObserver for ProgressReporter {
    fn on_event(&self, event: &DownloadEvent) {
        match event {
            DownloadEvent::WorkStarted {
                title,
                total_units,
                already_complete,
                ..
            } => {
                self.bar.reset();
                self.bar.set_length(u64::from(*total_units));
                self.bar.set_position(0);
                self.bar.set_message(title.clone());
                if *already_complete > 0 {
                    self.bar.println(event.to_string());
                }
            }
            DownloadEvent::UnitSkipped { .. } | DownloadEvent::UnitSucceeded { .. } => {
                self.bar.inc(1);
            }
            DownloadEvent::UnitFailed { .. } => {
                self.bar.inc(1);
                self.bar.println(event.to_string());
            }
            DownloadEvent::WorkFinished { .. } => {
                self.bar.set_message(event.to_string());
            }
            DownloadEvent::Merged { .. } => {
                self.bar.finish_and_clear();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn started(total_units: u32) -> DownloadEvent {
        DownloadEvent::WorkStarted {
            work_id: "42".to_string(),
            title: "Book".to_string(),
            total_units,
            already_complete: 1,
        }
    }

    #[test]
    fn test_bar_tracks_settled_units() {
        let reporter = ProgressReporter::hidden();
        reporter.on_event(&started(4));
        assert_eq!(reporter.bar.length(), Some(4));

        reporter.on_event(&DownloadEvent::UnitSkipped { index: 1 });
        reporter.on_event(&DownloadEvent::UnitSucceeded {
            index: 2,
            title: "Two".to_string(),
        });
        reporter.on_event(&DownloadEvent::UnitFailed {
            index: 3,
            title: "Three".to_string(),
            reason: "HTTP 500".to_string(),
        });
        assert_eq!(reporter.bar.position(), 3);
    }

    #[test]
    fn test_next_work_resets_position() {
        let reporter = ProgressReporter::hidden();
        reporter.on_event(&started(2));
        reporter.on_event(&DownloadEvent::UnitSkipped { index: 1 });
        reporter.on_event(&started(7));
        assert_eq!(reporter.bar.position(), 0);
        assert_eq!(reporter.bar.length(), Some(7));
    }

    #[test]
    fn test_quiet_reporter_is_hidden() {
        let reporter = ProgressReporter::new(true);
        assert!(reporter.bar.is_hidden());
        reporter.finish();
    }
}
