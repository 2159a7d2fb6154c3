//! Screenshot display
//!
//! Writes screenshots as PNG files under the cache directory and, when
//! enabled, opens each one with the system viewer.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use crate::agent::ObservationCallback;
use crate::core::{Observation, Result, Screenshot};

pub struct ScreenshotViewer {
    enabled: AtomicBool,
    dir: PathBuf,
    saved: AtomicU64,
}

impl ScreenshotViewer {
    pub fn new(dir: impl Into<PathBuf>, enabled: bool) -> Self {
        Self {
            enabled: AtomicBool::new(enabled),
            dir: dir.into(),
            saved: AtomicU64::new(0),
        }
    }

    /// Default location: `<cache dir>/bua/screenshots`
    pub fn default_dir() -> PathBuf {
        dirs::cache_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join("bua")
            .join("screenshots")
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
    }

    /// Write a screenshot to disk and return its path
    pub fn save(&self, screenshot: &Screenshot) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.dir)?;
        let n = self.saved.fetch_add(1, Ordering::Relaxed);
        let path = self.dir.join(format!("step-{:04}.png", n));
        std::fs::write(&path, screenshot.to_png()?)?;
        Ok(path)
    }

    /// Save and open the observation's screenshot when display is on
    pub fn show(&self, observation: &Observation) {
        if !self.is_enabled() {
            return;
        }
        match self.save(&observation.screenshot) {
            Ok(path) => {
                if let Err(e) = webbrowser::open(&path.to_string_lossy()) {
                    tracing::warn!(path = %path.display(), error = %e, "failed to open screenshot");
                }
            }
            Err(e) => tracing::warn!(error = %e, "failed to save screenshot"),
        }
    }

    /// Callback for the agent that shows every observation
    pub fn observer(self: &Arc<Self>) -> ObservationCallback {
        let viewer = Arc::clone(self);
        Box::new(move |observation: &Observation| viewer.show(observation))
    }
}
