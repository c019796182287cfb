//! Detection counters and their log emission.
//! Kept independent of the facade; callers pass the counters explicitly.

use anyhow::Result;
use log::{info, warn};
use serde::Serialize;

use crate::status::LoadStatus;

/// Running totals for one [`crate::Loader`].
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Serialize)]
pub struct DetectionStats {
    /// Deferred pairs created.
    pub cycles_started: u64,
    /// Cycles that started on a node already carrying a settled trit.
    pub cache_hits: u64,
    pub successes: u64,
    pub errors: u64,
    pub timeouts: u64,
    /// Unsupported nodes skipped by the classifier.
    pub ignored: u64,
}

impl DetectionStats {
    /// Count one terminal outcome.
    #[inline]
    pub const fn record(&mut self, status: LoadStatus) {
        match status {
            LoadStatus::Success => self.successes += 1,
            LoadStatus::Error => self.errors += 1,
            LoadStatus::Timeout => self.timeouts += 1,
        }
    }

    /// Cycles that have started but not yet settled.
    #[inline]
    pub const fn in_flight(&self) -> u64 {
        self.cycles_started
            .saturating_sub(self.successes + self.errors + self.timeouts)
    }

    /// One-line JSON form of the counters.
    ///
    /// # Errors
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Log `stats` as a JSON line when telemetry is enabled.
pub fn maybe_emit(enabled: bool, stats: &DetectionStats) {
    if !enabled {
        return;
    }
    match stats.to_json() {
        Ok(line) => info!(target: "loaded::telemetry", "{line}"),
        Err(err) => warn!("could not serialize detection stats: {err}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_outcomes_and_in_flight() {
        let mut stats = DetectionStats {
            cycles_started: 4,
            ..DetectionStats::default()
        };
        stats.record(LoadStatus::Success);
        stats.record(LoadStatus::Timeout);
        stats.record(LoadStatus::Error);
        assert_eq!((stats.successes, stats.errors, stats.timeouts), (1, 1, 1));
        assert_eq!(stats.in_flight(), 1);
    }

    #[test]
    fn json_uses_field_names() {
        let stats = DetectionStats {
            cycles_started: 2,
            ignored: 1,
            ..DetectionStats::default()
        };
        let json = stats.to_json().expect("json");
        assert_eq!(
            json,
            r#"{"cycles_started":2,"cache_hits":0,"successes":0,"errors":0,"timeouts":0,"ignored":1}"#
        );
    }
}
