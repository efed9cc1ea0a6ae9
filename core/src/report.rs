//! # Report Aggregator
//!
//! Pure reduction from per-item outcomes to run totals.

use crate::api::{FileAction, FileResult, Summary};
use crate::generator::{TestKind, TestPlan};
use std::time::SystemTime;

/// Tests emitted for one endpoint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TestCounts {
    /// Positive cases.
    pub positive: usize,
    /// Negative cases.
    pub negative: usize,
    /// Security cases.
    pub security: usize,
}

impl TestCounts {
    /// Counts the cases of a plan.
    pub fn of(plan: &TestPlan) -> Self {
        Self {
            positive: plan.count(TestKind::Positive),
            negative: plan.count(TestKind::Negative),
            security: plan.count(TestKind::Security),
        }
    }
}

/// One processed item.
#[derive(Debug, Clone)]
pub struct Outcome {
    /// The reported result.
    pub file: FileResult,
    /// Tests written by this item (zero unless Created/Updated).
    pub tests: TestCounts,
}

/// Tallies outcomes against the number of contract endpoints.
pub fn summarize(total_endpoints: usize, outcomes: &[Outcome]) -> Summary {
    let mut summary = Summary {
        total_endpoints,
        ..Summary::default()
    };
    let mut up_to_date = 0usize;

    for outcome in outcomes {
        match outcome.file.action {
            FileAction::Created => summary.created += 1,
            FileAction::Updated => summary.updated += 1,
            FileAction::Skipped => summary.skipped += 1,
            FileAction::Deleted => summary.deleted += 1,
            FileAction::Failed => summary.failed += 1,
        }
        if matches!(
            outcome.file.action,
            FileAction::Created | FileAction::Updated
        ) {
            summary.positive_tests += outcome.tests.positive;
            summary.negative_tests += outcome.tests.negative;
            summary.security_tests += outcome.tests.security;
        }
        if matches!(
            outcome.file.action,
            FileAction::Created | FileAction::Updated | FileAction::Skipped
        ) {
            up_to_date += 1;
        }
    }

    summary.coverage = coverage(up_to_date, total_endpoints);
    summary
}

/// Percentage rounded to one decimal; zero when there is nothing to cover.
pub fn coverage(covered: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let pct = covered.min(total) as f64 * 100.0 / total as f64;
    (pct * 10.0).round() / 10.0
}

/// Human-readable age of a timestamp (`Just now`, `5 mins ago`, `1 hour ago`).
pub fn relative_timestamp(then: Option<SystemTime>, now: SystemTime) -> String {
    let Some(then) = then else {
        return "Unknown".to_string();
    };
    let secs = now.duration_since(then).map(|d| d.as_secs()).unwrap_or(0);
    let (n, unit) = match secs {
        0..=59 => return "Just now".to_string(),
        60..=3_599 => (secs / 60, "min"),
        3_600..=86_399 => (secs / 3_600, "hour"),
        _ => (secs / 86_400, "day"),
    };
    if n == 1 {
        format!("1 {} ago", unit)
    } else {
        format!("{} {}s ago", n, unit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn outcome(action: FileAction, tests: TestCounts) -> Outcome {
        Outcome {
            file: FileResult {
                file_name: "f".into(),
                endpoint_id: "GET /".into(),
                action,
                timestamp: "Just now".into(),
                code: String::new(),
                test_type: None,
                detail: None,
            },
            tests,
        }
    }

    #[test]
    fn test_summary_counts_and_coverage() {
        let two = TestCounts {
            positive: 1,
            negative: 3,
            security: 1,
        };
        let outcomes = vec![
            outcome(FileAction::Created, two),
            outcome(FileAction::Updated, two),
            outcome(FileAction::Skipped, TestCounts::default()),
            outcome(FileAction::Failed, two),
            outcome(FileAction::Deleted, TestCounts::default()),
        ];
        let s = summarize(4, &outcomes);
        assert_eq!((s.created, s.updated, s.skipped, s.failed, s.deleted), (1, 1, 1, 1, 1));
        assert_eq!((s.positive_tests, s.negative_tests, s.security_tests), (2, 6, 2));
        assert_eq!(s.coverage, 75.0);
    }

    #[test]
    fn test_coverage_rounding_and_zero() {
        assert_eq!(coverage(0, 0), 0.0);
        assert_eq!(coverage(1, 3), 33.3);
        assert_eq!(coverage(2, 3), 66.7);
        assert_eq!(coverage(1, 1), 100.0);
    }

    #[test]
    fn test_relative_timestamp() {
        let now = SystemTime::UNIX_EPOCH + Duration::from_secs(1_000_000);
        let ago = |s: u64| relative_timestamp(Some(now - Duration::from_secs(s)), now);
        assert_eq!(ago(5), "Just now");
        assert_eq!(ago(60), "1 min ago");
        assert_eq!(ago(300), "5 mins ago");
        assert_eq!(ago(3_600), "1 hour ago");
        assert_eq!(ago(7_200 + 59), "2 hours ago");
        assert_eq!(ago(3 * 86_400), "3 days ago");
        assert_eq!(relative_timestamp(None, now), "Unknown");
        // Future mtimes (clock skew) read as fresh.
        assert_eq!(
            relative_timestamp(Some(now + Duration::from_secs(30)), now),
            "Just now"
        );
    }
}
