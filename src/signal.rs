//! Ctrl+C handling.
//!
//! The handler only flips a shared `AtomicBool`. The grouping engine checks
//! the flag between files, so an interrupted scan stops after the last fully
//! logged file and can be resumed later.
//!
//! ```rust,no_run
//! use dupesieve::signal::install_handler;
//! use dupesieve::duplicates::FinderConfig;
//!
//! let handler = install_handler().expect("signal handler");
//! let config = FinderConfig::default().with_shutdown_flag(handler.get_flag());
//! ```

use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

/// Shared shutdown flag.
#[derive(Debug, Clone, Default)]
pub struct ShutdownHandler {
    flag: Arc<AtomicBool>,
}

impl ShutdownHandler {
    /// Handler with no shutdown requested.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// True once Ctrl+C was pressed or [`request_shutdown`](Self::request_shutdown) called.
    #[must_use]
    pub fn is_shutdown_requested(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Request shutdown.
    pub fn request_shutdown(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// The flag, for the finder and walker.
    #[must_use]
    pub fn get_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.flag)
    }

    /// Clear the flag.
    pub fn reset(&self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

/// Errors raised while installing the handler.
#[derive(Debug, thiserror::Error)]
pub enum SignalError {
    /// ctrlc refused the handler.
    #[error("Failed to install signal handler: {0}")]
    InstallFailed(#[from] ctrlc::Error),
}

static GLOBAL_HANDLER: OnceLock<ShutdownHandler> = OnceLock::new();

/// Install the process-wide Ctrl+C handler, or reuse the installed one.
///
/// A second call returns the existing handler with its flag cleared. When
/// another component already owns the signal, an unhooked handler is
/// returned; it still honours [`ShutdownHandler::request_shutdown`].
pub fn install_handler() -> Result<ShutdownHandler, SignalError> {
    if let Some(handler) = GLOBAL_HANDLER.get() {
        handler.reset();
        return Ok(handler.clone());
    }

    let handler = ShutdownHandler::new();
    let flag = handler.get_flag();
    let installed = ctrlc::set_handler(move || {
        flag.store(true, Ordering::SeqCst);
        let _ = writeln!(
            std::io::stderr(),
            "\nInterrupted. Finishing the current file; rerun with --resume to continue."
        );
        let _ = std::io::stderr().flush();
    });

    match installed {
        Ok(()) => {
            let _ = GLOBAL_HANDLER.set(handler.clone());
            Ok(handler)
        }
        Err(ctrlc::Error::MultipleHandlers) => {
            log::debug!("Ctrl+C handler already registered, using unhooked handler");
            Ok(GLOBAL_HANDLER.get_or_init(ShutdownHandler::new).clone())
        }
        Err(e) => Err(e.into()),
    }
}
