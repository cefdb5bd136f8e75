//! Cooperative cancellation: Ctrl+C handling and the execution timeout.
//!
//! Both sources set the same `AtomicBool`. Scanners check it between files
//! and during directory enumeration; nothing is interrupted mid-hash.
//!
//! # Usage
//!
//! ```rust,no_run
//! use dupsweep::signal::{install_handler, spawn_timeout};
//! use std::time::Duration;
//!
//! let handler = install_handler().expect("Failed to install signal handler");
//! let _timeout = spawn_timeout(&handler, Duration::from_secs(3600));
//!
//! // Pass the flag to the scanners
//! let shutdown_flag = handler.get_flag();
//! ```

use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, OnceLock};
use std::thread::JoinHandle;
use std::time::Duration;

/// Shared cancellation flag.
///
/// `ShutdownHandler` is `Send` and `Sync`; clones share the same flag.
#[derive(Debug, Clone)]
pub struct ShutdownHandler {
    flag: Arc<AtomicBool>,
}

impl ShutdownHandler {
    /// Create a new shutdown handler with the flag initially set to `false`.
    #[must_use]
    pub fn new() -> Self {
        Self {
            flag: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Check if shutdown has been requested.
    #[must_use]
    pub fn is_shutdown_requested(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Manually request a shutdown.
    pub fn request_shutdown(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// Get a clone of the shutdown flag for passing to worker threads.
    #[must_use]
    pub fn get_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.flag)
    }

    /// Reset the shutdown flag to `false`.
    pub fn reset(&self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

impl Default for ShutdownHandler {
    fn default() -> Self {
        Self::new()
    }
}

/// Error type for signal handler installation.
#[derive(Debug, thiserror::Error)]
pub enum SignalError {
    /// Failed to install the Ctrl+C handler.
    #[error("Failed to install signal handler: {0}")]
    InstallFailed(#[from] ctrlc::Error),
}

static GLOBAL_HANDLER: OnceLock<ShutdownHandler> = OnceLock::new();

/// Install a Ctrl+C handler that sets the shutdown flag on interrupt.
///
/// The process-wide hook is registered once. Later calls (several runs in
/// one process, parallel tests) get the same handler back with its flag
/// reset. If another component already owns the signal hook, an unhooked
/// handler is returned; it still honours `request_shutdown()` and timeouts.
///
/// # Errors
///
/// Currently always succeeds; installation failures fall back to an
/// unhooked handler.
pub fn install_handler() -> Result<ShutdownHandler, SignalError> {
    if let Some(handler) = GLOBAL_HANDLER.get() {
        handler.reset();
        return Ok(handler.clone());
    }

    let handler = ShutdownHandler::new();
    let flag = handler.get_flag();

    match ctrlc::set_handler(move || {
        flag.store(true, Ordering::SeqCst);

        let _ = writeln!(std::io::stderr(), "\nInterrupted. Finishing current files...");
        let _ = std::io::stderr().flush();

        log::info!("Shutdown signal received");
    }) {
        Ok(()) => {
            let _ = GLOBAL_HANDLER.set(handler.clone());
            Ok(handler)
        }
        Err(_) => {
            if let Some(handler) = GLOBAL_HANDLER.get() {
                handler.reset();
                Ok(handler.clone())
            } else {
                log::debug!("Ctrl+C handler already registered, using unhooked handler");
                let fallback = ShutdownHandler::new();
                let _ = GLOBAL_HANDLER.set(fallback.clone());
                Ok(fallback)
            }
        }
    }
}

/// Watchdog that requests shutdown once the execution timeout elapses.
///
/// Dropping the guard disarms the watchdog.
#[derive(Debug)]
pub struct TimeoutGuard {
    disarm: Option<mpsc::Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl Drop for TimeoutGuard {
    fn drop(&mut self) {
        // Disconnecting the channel wakes the watchdog without firing it.
        self.disarm.take();
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

/// Start a watchdog that cancels the run after `timeout`.
#[must_use]
pub fn spawn_timeout(handler: &ShutdownHandler, timeout: Duration) -> TimeoutGuard {
    let (tx, rx) = mpsc::channel::<()>();
    let handler = handler.clone();

    let thread = std::thread::Builder::new()
        .name("dupsweep-timeout".into())
        .spawn(move || match rx.recv_timeout(timeout) {
            Err(RecvTimeoutError::Timeout) => {
                log::warn!(
                    "Execution timeout of {}s reached, cancelling",
                    timeout.as_secs()
                );
                handler.request_shutdown();
            }
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {}
        });

    let thread = match thread {
        Ok(t) => Some(t),
        Err(e) => {
            log::warn!("Could not start timeout watchdog: {e}");
            None
        }
    };

    TimeoutGuard {
        disarm: Some(tx),
        thread,
    }
}
