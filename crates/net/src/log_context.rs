//! Per-session logging context.
//!
//! One host game or one client session owns a [`SessionLog`]. Every line it emits is
//! prefixed with the session label. While quiet, routine per-round lines go to `debug`
//! instead of `info`; warnings are never demoted.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct SessionLog {
    label: Arc<str>,
    quiet: Arc<AtomicBool>,
}

impl SessionLog {
    pub fn new(label: impl Into<Arc<str>>, quiet: bool) -> Self {
        Self {
            label: label.into(),
            quiet: Arc::new(AtomicBool::new(quiet)),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn set_quiet(&self, quiet: bool) {
        self.quiet.store(quiet, Ordering::Relaxed);
    }

    pub fn is_quiet(&self) -> bool {
        self.quiet.load(Ordering::Relaxed)
    }

    /// Routine per-round progress.
    pub fn round(&self, args: fmt::Arguments<'_>) {
        if self.is_quiet() {
            log::debug!("[{}] {}", self.label, args);
        } else {
            log::info!("[{}] {}", self.label, args);
        }
    }

    pub fn info(&self, args: fmt::Arguments<'_>) {
        log::info!("[{}] {}", self.label, args);
    }

    pub fn warn(&self, args: fmt::Arguments<'_>) {
        log::warn!("[{}] {}", self.label, args);
    }

    pub fn debug(&self, args: fmt::Arguments<'_>) {
        log::debug!("[{}] {}", self.label, args);
    }
}
