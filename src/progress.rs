use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, IsTerminal};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use crate::api::BusyIndicator;

/// Progress indicator manager
#[derive(Debug, Clone, Copy)]
pub struct ProgressManager {
    enabled: bool,
    verbose: bool,
}

impl ProgressManager {
    /// Create a new progress manager
    pub fn new(quiet: bool, verbose: bool) -> Self {
        // Only enable progress if we're in a terminal and not in quiet mode
        let enabled = !quiet && io::stderr().is_terminal();

        Self { enabled, verbose }
    }

    /// Busy indicator for the request pipeline: a spinner when enabled,
    /// nothing otherwise.
    pub fn indicator(&self, message: &str) -> SpinnerIndicator {
        SpinnerIndicator {
            message: message.to_string(),
            enabled: self.enabled,
            spinner: Mutex::new(None),
        }
    }

    /// Show a simple message (for verbose mode)
    pub fn show_message(&self, message: &str) {
        if self.verbose && self.enabled {
            eprintln!("{}", message);
        }
    }

    /// Check if progress is enabled
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }
}

/// Spinner shown while at least one request is in flight.
pub struct SpinnerIndicator {
    message: String,
    enabled: bool,
    spinner: Mutex<Option<ProgressBar>>,
}

impl SpinnerIndicator {
    pub fn is_visible(&self) -> bool {
        self.spinner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    fn create_spinner(&self) -> ProgressBar {
        let pb = ProgressBar::new_spinner();
        let style = ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⣾", "⣽", "⣻", "⢿", "⡿", "⣟", "⣯", "⣷"]);
        pb.set_style(style);
        pb.set_message(self.message.clone());
        pb.enable_steady_tick(Duration::from_millis(100));
        pb
    }
}

impl BusyIndicator for SpinnerIndicator {
    fn show(&self) {
        if !self.enabled {
            return;
        }
        let mut spinner = self.spinner.lock().unwrap_or_else(PoisonError::into_inner);
        if spinner.is_none() {
            *spinner = Some(self.create_spinner());
        }
    }

    fn hide(&self) {
        if let Some(pb) = self.spinner.lock().unwrap_or_else(PoisonError::into_inner).take() {
            pb.finish_and_clear();
        }
    }
}

impl Drop for SpinnerIndicator {
    fn drop(&mut self) {
        self.hide();
    }
}

/// Progress messages for different operations
pub mod messages {
    pub const REQUESTING: &str = "Contacting portal...";
    pub const FETCHING_PAGES: &str = "Fetching pages...";
}
