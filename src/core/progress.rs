// ─── Progress / Cancellation ───
// Observational sink for stage changes, messages and progress fractions,
// plus the cooperative cancellation token checked between stages.

use std::sync::Mutex;

use tokio_util::sync::CancellationToken;
use tracing::{info, trace};

pub trait ProgressSink: Send + Sync {
    /// A new stage started.
    fn stage(&self, name: &str);

    /// Free-text message (processor output lines, warnings, summaries).
    fn message(&self, text: &str);

    /// Overall fraction of the current stage, clamped to `0.0..=1.0`.
    fn progress(&self, fraction: f64);

    /// Byte-level progress of one transfer. Ignored by default.
    fn download_progress(&self, _artifact: &str, _downloaded: u64, _total: Option<u64>) {}
}

/// Forwards every event to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingProgress;

impl ProgressSink for TracingProgress {
    fn stage(&self, name: &str) {
        info!("== {} ==", name);
    }

    fn message(&self, text: &str) {
        info!("{}", text);
    }

    fn progress(&self, fraction: f64) {
        trace!("progress {:.0}%", fraction.clamp(0.0, 1.0) * 100.0);
    }

    fn download_progress(&self, artifact: &str, downloaded: u64, total: Option<u64>) {
        match total {
            Some(total) => trace!("{}: {}/{} bytes", artifact, downloaded, total),
            None => trace!("{}: {} bytes", artifact, downloaded),
        }
    }
}

/// Event captured by `RecordingProgress`.
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    Stage(String),
    Message(String),
    Progress(f64),
}

/// Keeps every event in memory; used by tests and embedders that render
/// the log themselves.
#[derive(Debug, Default)]
pub struct RecordingProgress {
    events: Mutex<Vec<ProgressEvent>>,
}

impl RecordingProgress {
    pub fn events(&self) -> Vec<ProgressEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    pub fn stages(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                ProgressEvent::Stage(s) => Some(s),
                _ => None,
            })
            .collect()
    }

    pub fn messages(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                ProgressEvent::Message(m) => Some(m),
                _ => None,
            })
            .collect()
    }

    fn push(&self, event: ProgressEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}

impl ProgressSink for RecordingProgress {
    fn stage(&self, name: &str) {
        self.push(ProgressEvent::Stage(name.to_string()));
    }

    fn message(&self, text: &str) {
        self.push(ProgressEvent::Message(text.to_string()));
    }

    fn progress(&self, fraction: f64) {
        self.push(ProgressEvent::Progress(fraction.clamp(0.0, 1.0)));
    }
}

/// Cancellation is cooperative: requesting it never interrupts a running
/// transfer or process, it only stops the next stage from starting.
pub type CancelToken = CancellationToken;
