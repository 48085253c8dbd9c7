//! Results Aggregator: per-test outcomes and run-level statistics.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use serde::Serialize;

use crate::errors::{HookKind, TestFailure};
use crate::model::{SuiteId, TestCase};

/// Lifecycle state of a test within a run.
///
/// `Pending -> Running -> {Passed | Failed | Skipped | Timeout}`; the four terminal states are absorbing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TestStatus {
    Pending,
    Running,
    Passed,
    Failed,
    Skipped,
    Timeout,
}

impl TestStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TestStatus::Passed | TestStatus::Failed | TestStatus::Skipped | TestStatus::Timeout
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TestStatus::Pending => "pending",
            TestStatus::Running => "running",
            TestStatus::Passed => "passed",
            TestStatus::Failed => "failed",
            TestStatus::Skipped => "skipped",
            TestStatus::Timeout => "timeout",
        }
    }
}

impl fmt::Display for TestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one test. Built once by the runner and never mutated.
#[derive(Debug, Clone)]
pub struct TestResult {
    test: Arc<TestCase>,
    status: TestStatus,
    start: SystemTime,
    end: SystemTime,
    duration: Duration,
    error: Option<TestFailure>,
    message: Option<String>,
}

impl TestResult {
    pub(crate) fn new(
        test: Arc<TestCase>,
        status: TestStatus,
        start: SystemTime,
        duration: Duration,
        error: Option<TestFailure>,
        message: Option<String>,
    ) -> Self {
        debug_assert!(status.is_terminal());
        Self {
            test,
            status,
            start,
            end: start + duration,
            duration,
            error,
            message,
        }
    }

    pub(crate) fn skipped(test: Arc<TestCase>, reason: Option<String>) -> Self {
        Self::new(test, TestStatus::Skipped, SystemTime::now(), Duration::ZERO, None, reason)
    }

    pub fn test(&self) -> &Arc<TestCase> {
        &self.test
    }

    pub fn test_name(&self) -> &str {
        self.test.name()
    }

    pub fn suite_name(&self) -> &str {
        self.test.suite_name()
    }

    pub fn suite_id(&self) -> SuiteId {
        self.test.suite()
    }

    pub fn status(&self) -> TestStatus {
        self.status
    }

    pub fn start(&self) -> SystemTime {
        self.start
    }

    pub fn end(&self) -> SystemTime {
        self.end
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    pub fn error(&self) -> Option<&TestFailure> {
        self.error.as_ref()
    }

    /// Diagnostic text: the explicit message, else the rendered error.
    pub fn message(&self) -> Option<String> {
        self.message
            .clone()
            .or_else(|| self.error.as_ref().map(ToString::to_string))
    }

    /// `Failed` or `Timeout`.
    pub fn is_failure(&self) -> bool {
        matches!(self.status, TestStatus::Failed | TestStatus::Timeout)
    }
}

/// A suite-level hook failure (`beforeAll` or `afterAll`).
#[derive(Debug, Clone, PartialEq)]
pub struct SuiteFailure {
    pub suite: SuiteId,
    pub suite_name: String,
    pub hook: HookKind,
    pub error: TestFailure,
}

/// Counts per terminal status, derived on demand.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TestStats {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub timeout: usize,
}

/// Everything a run produced, in execution order.
#[derive(Debug, Clone)]
pub struct RunResults {
    pub results: Vec<TestResult>,
    pub suite_failures: Vec<SuiteFailure>,
    pub start: SystemTime,
    pub end: SystemTime,
}

impl RunResults {
    pub(crate) fn started() -> Self {
        let now = SystemTime::now();
        Self {
            results: Vec::new(),
            suite_failures: Vec::new(),
            start: now,
            end: now,
        }
    }

    pub fn duration(&self) -> Duration {
        self.end.duration_since(self.start).unwrap_or_default()
    }

    pub fn stats(&self) -> TestStats {
        let mut stats = TestStats {
            total: self.results.len(),
            ..TestStats::default()
        };
        for result in &self.results {
            match result.status() {
                TestStatus::Passed => stats.passed += 1,
                TestStatus::Failed => stats.failed += 1,
                TestStatus::Skipped => stats.skipped += 1,
                TestStatus::Timeout => stats.timeout += 1,
                TestStatus::Pending | TestStatus::Running => {}
            }
        }
        stats
    }

    pub fn failures(&self) -> impl Iterator<Item = &TestResult> {
        self.results.iter().filter(|r| r.is_failure())
    }

    pub fn results_for_suite<'a>(&'a self, suite_name: &'a str) -> impl Iterator<Item = &'a TestResult> + 'a {
        self.results.iter().filter(move |r| r.suite_name() == suite_name)
    }

    /// Any failed or timed-out test, or any suite-level hook failure.
    pub fn has_failures(&self) -> bool {
        !self.suite_failures.is_empty() || self.results.iter().any(TestResult::is_failure)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Suite, TestOptions, test_fn};

    fn sample_test(name: &str) -> Arc<TestCase> {
        let mut suite = Suite::new("sample");
        suite.add_test(name, TestOptions::new(), test_fn(|| Ok(())));
        Arc::clone(&suite.tests()[0])
    }

    fn result(status: TestStatus) -> TestResult {
        let error = (status == TestStatus::Failed).then(|| TestFailure::message("boom"));
        TestResult::new(sample_test("t"), status, SystemTime::now(), Duration::from_millis(5), error, None)
    }

    #[test]
    fn test_status_terminality_and_display() {
        assert!(!TestStatus::Pending.is_terminal());
        assert!(!TestStatus::Running.is_terminal());
        assert!(TestStatus::Timeout.is_terminal());
        assert_eq!(TestStatus::Skipped.to_string(), "skipped");
        assert_eq!(serde_json::to_string(&TestStatus::Passed).unwrap(), "\"passed\"");
    }

    #[test]
    fn test_stats_are_derived_from_results() {
        let mut run = RunResults::started();
        for status in [
            TestStatus::Passed,
            TestStatus::Passed,
            TestStatus::Failed,
            TestStatus::Skipped,
            TestStatus::Timeout,
        ] {
            run.results.push(result(status));
        }
        let stats = run.stats();
        assert_eq!(
            stats,
            TestStats {
                total: 5,
                passed: 2,
                failed: 1,
                skipped: 1,
                timeout: 1
            }
        );
        assert_eq!(run.failures().count(), 2);
        assert_eq!(run.results_for_suite("sample").count(), 5);
        assert!(run.has_failures());
    }

    #[test]
    fn test_message_falls_back_to_error() {
        let failed = result(TestStatus::Failed);
        assert_eq!(failed.message().as_deref(), Some("boom"));
        assert_eq!(failed.end(), failed.start() + Duration::from_millis(5));

        let skipped = TestResult::skipped(sample_test("s"), Some("bail".into()));
        assert_eq!(skipped.message().as_deref(), Some("bail"));
        assert_eq!(skipped.duration(), Duration::ZERO);
    }

    #[test]
    fn test_after_all_failure_counts_as_run_failure() {
        let mut run = RunResults::started();
        run.results.push(result(TestStatus::Passed));
        assert!(!run.has_failures());
        run.suite_failures.push(SuiteFailure {
            suite: run.results[0].suite_id(),
            suite_name: "sample".into(),
            hook: HookKind::AfterAll,
            error: TestFailure::message("teardown"),
        });
        assert!(run.has_failures());
    }
}
