//! Progress reporting using indicatif.
//!
//! The grouping engine reports through [`ProgressCallback`]; [`Progress`]
//! renders it as a spinner on stderr. Phases without a known total (the
//! scan walk) get a spinner, phases with one get a bar.

use std::sync::Mutex;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};

/// Receiver of progress updates.
pub trait ProgressCallback: Send + Sync {
    /// A phase starts; `total` is 0 when unknown.
    fn on_phase_start(&self, phase: &str, total: usize);

    /// An item finished; `current` counts from 1.
    fn on_progress(&self, current: usize, path: &str);

    /// A phase finished.
    fn on_phase_end(&self, phase: &str);

    /// Free-form status text.
    fn on_message(&self, _message: &str) {}
}

/// Terminal progress display.
pub struct Progress {
    bar: Mutex<Option<ProgressBar>>,
    quiet: bool,
}

impl Progress {
    /// Create a reporter; `quiet` disables all output.
    ///
    /// ```
    /// use dupesieve::progress::Progress;
    ///
    /// let progress = Progress::new(false);
    /// ```
    #[must_use]
    pub fn new(quiet: bool) -> Self {
        Self {
            bar: Mutex::new(None),
            quiet,
        }
    }

    fn spinner_style() -> ProgressStyle {
        ProgressStyle::with_template("{spinner:.green} {msg} [{elapsed_precise}] {pos} files")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ ")
    }

    fn bar_style() -> ProgressStyle {
        ProgressStyle::with_template(
            "[{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg} (ETA: {eta})",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█>-")
    }

    fn with_bar(&self, f: impl FnOnce(&ProgressBar)) {
        if let Ok(guard) = self.bar.lock() {
            if let Some(ref pb) = *guard {
                f(pb);
            }
        }
    }
}

impl std::fmt::Debug for Progress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Progress").field("quiet", &self.quiet).finish()
    }
}

impl ProgressCallback for Progress {
    fn on_phase_start(&self, phase: &str, total: usize) {
        if self.quiet {
            return;
        }
        let pb = if total == 0 {
            let pb = ProgressBar::new_spinner();
            pb.set_style(Self::spinner_style());
            pb.enable_steady_tick(Duration::from_millis(100));
            pb
        } else {
            let pb = ProgressBar::new(total as u64);
            pb.set_style(Self::bar_style());
            pb
        };
        pb.set_message(phase_title(phase));
        if let Ok(mut guard) = self.bar.lock() {
            if let Some(old) = guard.replace(pb) {
                old.finish_and_clear();
            }
        }
    }

    fn on_progress(&self, current: usize, path: &str) {
        if self.quiet {
            return;
        }
        self.with_bar(|pb| {
            pb.set_position(current as u64);
            pb.set_message(truncate_path(path, 40));
        });
    }

    fn on_phase_end(&self, phase: &str) {
        if self.quiet {
            return;
        }
        if let Ok(mut guard) = self.bar.lock() {
            if let Some(pb) = guard.take() {
                pb.finish_with_message(format!("{} complete", phase_title(phase)));
            }
        }
    }

    fn on_message(&self, message: &str) {
        if self.quiet {
            return;
        }
        self.with_bar(|pb| pb.set_message(message.to_string()));
    }
}

fn phase_title(phase: &str) -> String {
    match phase {
        "scan" => "Scanning".to_string(),
        other => other.to_string(),
    }
}

/// Shorten a path to its file name when it does not fit.
fn truncate_path(path: &str, max_len: usize) -> String {
    if path.chars().count() <= max_len {
        return path.to_string();
    }
    let file_name = std::path::Path::new(path)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let chars: Vec<char> = file_name.chars().collect();
    if chars.len() + 4 > max_len {
        let tail: String = chars[chars.len().saturating_sub(max_len.saturating_sub(3))..]
            .iter()
            .collect();
        return format!("...{tail}");
    }
    format!(".../{file_name}")
}
