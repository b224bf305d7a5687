use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::core::profile::Side;

/// Outcome of a completed installation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InstallSummary {
    pub side: Side,
    pub profile: String,
    pub version: String,
    pub fetched: usize,
    pub already_present: usize,
    pub bytes: u64,
    pub processors_ran: usize,
    pub processors_skipped: usize,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl InstallSummary {
    pub fn message(&self) -> String {
        let mut text = match self.side {
            Side::Client => format!(
                "Successfully installed client profile {} for version {} into launcher",
                self.profile, self.version
            ),
            Side::Server => format!(
                "Successfully installed server profile {} for version {}",
                self.profile, self.version
            ),
        };

        if self.fetched > 0 {
            let noun = if self.fetched == 1 { "library" } else { "libraries" };
            text.push_str(&format!(", {} {} downloaded", self.fetched, noun));
        }
        if self.already_present > 0 {
            text.push_str(&format!(", {} already present", self.already_present));
        }
        text
    }

    pub fn elapsed(&self) -> chrono::Duration {
        self.finished_at - self.started_at
    }
}
