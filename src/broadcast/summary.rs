use std::collections::BTreeMap;
use std::fmt;

/// Terminal outcome recorded for one recipient in one run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DeliveryStatus {
    Delivered,
    DeliveredAfterRetry,
    Blocked,
    DeletedOrInvalid,
    SkippedSuppressed,
    NetworkError,
    Error,
}

impl DeliveryStatus {
    pub const ALL: [DeliveryStatus; 7] = [
        DeliveryStatus::Delivered,
        DeliveryStatus::DeliveredAfterRetry,
        DeliveryStatus::Blocked,
        DeliveryStatus::DeletedOrInvalid,
        DeliveryStatus::SkippedSuppressed,
        DeliveryStatus::NetworkError,
        DeliveryStatus::Error,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryStatus::Delivered => "delivered",
            DeliveryStatus::DeliveredAfterRetry => "delivered_after_retry",
            DeliveryStatus::Blocked => "blocked",
            DeliveryStatus::DeletedOrInvalid => "deleted_or_invalid",
            DeliveryStatus::SkippedSuppressed => "skipped_suppressed",
            DeliveryStatus::NetworkError => "network_error",
            DeliveryStatus::Error => "error",
        }
    }

    pub fn from_str(s: &str) -> Option<DeliveryStatus> {
        DeliveryStatus::ALL.iter().copied().find(|st| st.as_str() == s)
    }
}

impl fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-status tallies for one run. Counts every recipient exactly once,
/// suppressed skips included.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Summary {
    counts: BTreeMap<DeliveryStatus, u64>,
}

impl Summary {
    pub fn new() -> Self {
        Summary::default()
    }

    pub fn record(&mut self, status: DeliveryStatus) {
        *self.counts.entry(status).or_insert(0) += 1;
    }

    pub fn count(&self, status: DeliveryStatus) -> u64 {
        self.counts.get(&status).copied().unwrap_or(0)
    }

    pub fn total(&self) -> u64 {
        self.counts.values().sum()
    }

    pub fn percent(&self, status: DeliveryStatus) -> f64 {
        let total = self.total();
        if total == 0 {
            return 0.0;
        }
        self.count(status) as f64 / total as f64 * 100.0
    }

    /// Operator-facing report: every status count, percentages for the three
    /// statuses that matter for audience health, and the log reference.
    pub fn render(&self, log_name: &str) -> String {
        let mut out = String::from("📊 Broadcast finished\n\n");
        for status in DeliveryStatus::ALL {
            let count = self.count(status);
            match status {
                DeliveryStatus::Delivered
                | DeliveryStatus::Blocked
                | DeliveryStatus::DeletedOrInvalid => {
                    out.push_str(&format!(
                        "{}: {} ({:.1}%)\n",
                        status,
                        count,
                        self.percent(status)
                    ));
                }
                _ => out.push_str(&format!("{}: {}\n", status, count)),
            }
        }
        out.push_str(&format!("\nTotal: {}\nLog: {}", self.total(), log_name));
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_through_str() {
        for status in DeliveryStatus::ALL {
            assert_eq!(DeliveryStatus::from_str(status.as_str()), Some(status));
        }
        assert_eq!(DeliveryStatus::from_str("nonsense"), None);
    }

    #[test]
    fn percentages_are_count_over_total() {
        let mut summary = Summary::new();
        summary.record(DeliveryStatus::Delivered);
        summary.record(DeliveryStatus::Delivered);
        summary.record(DeliveryStatus::Blocked);
        summary.record(DeliveryStatus::DeletedOrInvalid);

        assert_eq!(summary.total(), 4);
        assert_eq!(summary.percent(DeliveryStatus::Delivered), 50.0);
        assert_eq!(summary.percent(DeliveryStatus::Blocked), 25.0);
        assert_eq!(summary.percent(DeliveryStatus::DeletedOrInvalid), 25.0);
    }

    #[test]
    fn one_decimal_rounding_in_render() {
        let mut summary = Summary::new();
        summary.record(DeliveryStatus::Delivered);
        summary.record(DeliveryStatus::Blocked);
        summary.record(DeliveryStatus::Error);

        let report = summary.render("broadcast_log_x.csv");
        assert!(report.contains("delivered: 1 (33.3%)"), "{report}");
        assert!(report.contains("blocked: 1 (33.3%)"), "{report}");
        assert!(report.contains("error: 1"), "{report}");
        assert!(report.contains("Total: 3"), "{report}");
    }

    #[test]
    fn empty_summary_renders_zeros() {
        let report = Summary::new().render("none.csv");
        assert!(report.contains("delivered: 0 (0.0%)"), "{report}");
        assert!(report.contains("Total: 0"), "{report}");
    }
}
