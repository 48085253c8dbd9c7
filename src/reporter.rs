//! Reporting of run lifecycle events.
//!
//! The runner drives a [`Reporter`] with one call per lifecycle event. Execution and presentation stay separate,
//! so report writers (JSON, JUnit, HTML) only need to implement the trait.

use std::io::{self, Write};

use crate::model::{Suite, TestCase};
use crate::results::{RunResults, TestResult, TestStatus};

// ============================================================================
// Reporter Trait
// ============================================================================

/// Receives lifecycle events from the [`Runner`](crate::runner::Runner).
///
/// Each method is called exactly once per corresponding event. Skipped tests only produce `on_test_complete`.
pub trait Reporter {
    /// Called before the first suite, with the number of registered tests.
    fn on_run_start(&mut self, total_tests: usize);

    fn on_suite_start(&mut self, suite: &Suite);

    fn on_test_start(&mut self, test: &TestCase);

    fn on_test_complete(&mut self, result: &TestResult);

    /// Called after `afterAll`, with this suite's results in execution order.
    fn on_suite_complete(&mut self, suite: &Suite, results: &[TestResult]);

    fn on_run_complete(&mut self, results: &RunResults);
}

/// Discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullReporter;

impl Reporter for NullReporter {
    fn on_run_start(&mut self, _total_tests: usize) {}
    fn on_suite_start(&mut self, _suite: &Suite) {}
    fn on_test_start(&mut self, _test: &TestCase) {}
    fn on_test_complete(&mut self, _result: &TestResult) {}
    fn on_suite_complete(&mut self, _suite: &Suite, _results: &[TestResult]) {}
    fn on_run_complete(&mut self, _results: &RunResults) {}
}

const GREEN: &str = "\x1b[32m";
const RED: &str = "\x1b[31m";
const YELLOW: &str = "\x1b[33m";
const RESET: &str = "\x1b[0m";

/// Console reporter: `.`/`F`/`S`/`T` marks, or one line per test when verbose, then a summary.
///
/// Output errors are ignored; reporting never fails a run.
pub struct ConsoleReporter<W: Write = io::Stderr> {
    out: W,
    pub verbose: bool,
    pub colors: bool,
}

impl ConsoleReporter {
    /// Reporter on stderr with colors enabled.
    pub fn new(verbose: bool) -> Self {
        Self::with_writer(io::stderr(), verbose, true)
    }
}

impl Default for ConsoleReporter {
    fn default() -> Self {
        Self::new(false)
    }
}

impl<W: Write> ConsoleReporter<W> {
    pub fn with_writer(out: W, verbose: bool, colors: bool) -> Self {
        Self { out, verbose, colors }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn paint(&self, color: &str, text: &str) -> String {
        if self.colors {
            format!("{color}{text}{RESET}")
        } else {
            text.to_string()
        }
    }

    fn status_label(&self, status: TestStatus) -> String {
        let (color, long, short) = match status {
            TestStatus::Passed => (GREEN, "PASSED", "."),
            TestStatus::Failed => (RED, "FAILED", "F"),
            TestStatus::Timeout => (RED, "TIMEOUT", "T"),
            TestStatus::Skipped => (YELLOW, "SKIPPED", "S"),
            TestStatus::Pending | TestStatus::Running => (YELLOW, "PENDING", "?"),
        };
        self.paint(color, if self.verbose { long } else { short })
    }
}

impl<W: Write> Reporter for ConsoleReporter<W> {
    fn on_run_start(&mut self, total_tests: usize) {
        if total_tests == 0 {
            let _ = writeln!(self.out, "No tests collected");
        } else if self.verbose {
            let _ = writeln!(self.out, "collected {total_tests} tests");
        }
    }

    fn on_suite_start(&mut self, suite: &Suite) {
        if self.verbose {
            let _ = writeln!(self.out, "\n{}", suite.path());
        }
    }

    fn on_test_start(&mut self, test: &TestCase) {
        if self.verbose {
            let _ = write!(self.out, "  {} ... ", test.name());
        }
    }

    fn on_test_complete(&mut self, result: &TestResult) {
        let label = self.status_label(result.status());
        if !self.verbose {
            let _ = write!(self.out, "{label}");
            let _ = self.out.flush();
            return;
        }

        match result.status() {
            TestStatus::Skipped => {
                // No test-start line was printed for a skipped test.
                let reason = result.message().map(|m| format!(" ({m})")).unwrap_or_default();
                let _ = writeln!(self.out, "  {} ... {label}{reason}", result.test_name());
            }
            _ => {
                let _ = writeln!(self.out, "{label} ({}ms)", result.duration().as_millis());
                if let Some(message) = result.message().filter(|_| result.is_failure()) {
                    let _ = writeln!(self.out, "    {message}");
                }
            }
        }
    }

    fn on_suite_complete(&mut self, _suite: &Suite, _results: &[TestResult]) {}

    fn on_run_complete(&mut self, results: &RunResults) {
        if !self.verbose {
            let _ = writeln!(self.out);
        }

        let failures: Vec<&TestResult> = results.failures().collect();
        if !failures.is_empty() || !results.suite_failures.is_empty() {
            let _ = writeln!(self.out, "\n{}", self.paint(RED, "Failures:"));
            for failure in failures {
                let message = failure.message().unwrap_or_default();
                let _ = writeln!(
                    self.out,
                    "  {} > {} [{}]: {message}",
                    failure.suite_name(),
                    failure.test_name(),
                    failure.status()
                );
            }
            for failure in &results.suite_failures {
                let _ = writeln!(
                    self.out,
                    "  {} [{}]: {}",
                    failure.suite_name, failure.hook, failure.error
                );
            }
        }

        let stats = results.stats();
        let mut parts = Vec::new();
        if stats.passed > 0 {
            parts.push(self.paint(GREEN, &format!("{} passed", stats.passed)));
        }
        if stats.failed > 0 {
            parts.push(self.paint(RED, &format!("{} failed", stats.failed)));
        }
        if stats.timeout > 0 {
            parts.push(self.paint(RED, &format!("{} timed out", stats.timeout)));
        }
        if stats.skipped > 0 {
            parts.push(self.paint(YELLOW, &format!("{} skipped", stats.skipped)));
        }
        if parts.is_empty() {
            parts.push("no tests ran".to_string());
        }

        let _ = writeln!(
            self.out,
            "\n====== {} in {:.2}s ======",
            parts.join(", "),
            results.duration().as_secs_f64()
        );
        let _ = self.out.flush();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::{Duration, SystemTime};

    use super::*;
    use crate::errors::TestFailure;
    use crate::model::{TestOptions, test_fn};

    fn suite_with(names: &[&str]) -> Suite {
        let mut suite = Suite::new("parser");
        for name in names {
            suite.add_test(*name, TestOptions::new(), test_fn(|| Ok(())));
        }
        suite
    }

    fn finished(test: &Arc<TestCase>, status: TestStatus, error: Option<TestFailure>) -> TestResult {
        TestResult::new(Arc::clone(test), status, SystemTime::now(), Duration::from_millis(3), error, None)
    }

    #[test]
    fn test_compact_output_uses_marks_and_summary() {
        let suite = suite_with(&["a", "b"]);
        let mut reporter = ConsoleReporter::with_writer(Vec::new(), false, false);
        let mut run = RunResults::started();
        run.results.push(finished(&suite.tests()[0], TestStatus::Passed, None));
        run.results.push(finished(
            &suite.tests()[1],
            TestStatus::Failed,
            Some(TestFailure::message("bad token")),
        ));

        reporter.on_run_start(2);
        for result in &run.results {
            reporter.on_test_complete(result);
        }
        reporter.on_run_complete(&run);

        let out = String::from_utf8(reporter.into_inner()).unwrap();
        assert!(out.starts_with(".F\n"));
        assert!(out.contains("parser > b [failed]: bad token"));
        assert!(out.contains("1 passed, 1 failed"));
    }

    #[test]
    fn test_verbose_output_lists_each_test() {
        let suite = suite_with(&["lexes"]);
        let mut reporter = ConsoleReporter::with_writer(Vec::new(), true, false);
        let result = finished(&suite.tests()[0], TestStatus::Passed, None);

        reporter.on_suite_start(&suite);
        reporter.on_test_start(&suite.tests()[0]);
        reporter.on_test_complete(&result);

        let out = String::from_utf8(reporter.into_inner()).unwrap();
        assert!(out.contains("parser\n  lexes ... PASSED (3ms)"));
    }

    #[test]
    fn test_colors_wrap_labels() {
        let reporter = ConsoleReporter::with_writer(Vec::<u8>::new(), false, true);
        assert_eq!(reporter.status_label(TestStatus::Timeout), "\x1b[31mT\x1b[0m");
    }
}
