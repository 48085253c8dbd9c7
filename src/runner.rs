//! Execution Engine.
//!
//! Suites run strictly in registration order, and so do the tests within a suite. Each test body runs on a tokio
//! blocking task raced against a timer; hooks run on the caller's thread, never concurrently with the body they
//! bracket.
//!
//! ## Hook failures
//!
//! - `beforeAll`: no test of the suite is attempted; each gets a `Failed` result carrying the hook error and
//!   `afterAll` still runs. The failure is also recorded in [`RunResults::suite_failures`], so it surfaces even
//!   for an empty suite.
//! - `beforeEach`: the body is not run, the test is `Failed`, `afterEach` still runs.
//! - `afterEach`: a `Passed` test becomes `Failed`; an already failing test keeps its status and gains the hook
//!   error in its message.
//! - `afterAll`: recorded in [`RunResults::suite_failures`].
//!
//! A result's duration covers the body only; hook time is not included.
//!
//! A timed-out body is not cancelled. It keeps running on its blocking thread and the runtime is shut down in the
//! background once the run completes.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};

use tokio::runtime::Runtime;

use crate::config::RunConfig;
use crate::errors::{HookKind, RunnerError, TestFailure};
use crate::model::{Suite, TestCase};
use crate::reporter::Reporter;
use crate::results::{RunResults, SuiteFailure, TestResult, TestStatus};

const BAIL_MESSAGE: &str = "skipped after an earlier failure (bail)";

/// How a test body finished.
enum BodyOutcome {
    Passed,
    Failed(TestFailure),
    TimedOut(Duration),
}

/// Owns the registered suites and runs them.
#[derive(Debug, Default)]
pub struct Runner {
    suites: Vec<Suite>,
    config: RunConfig,
}

impl Runner {
    pub fn new(config: RunConfig) -> Self {
        Self {
            suites: Vec::new(),
            config,
        }
    }

    pub fn add_suite(&mut self, suite: Suite) -> &mut Self {
        self.suites.push(suite);
        self
    }

    pub fn suites(&self) -> &[Suite] {
        &self.suites
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    pub fn total_tests(&self) -> usize {
        self.suites.iter().map(|s| s.tests().len()).sum()
    }

    /// Whether any test in the whole run is focused.
    pub fn has_only_tests(&self) -> bool {
        self.suites.iter().flat_map(|s| s.tests()).any(|t| t.is_only())
    }

    /// Run every suite, reporting lifecycle events to `reporter`.
    ///
    /// Builds its own tokio runtime. Calling it from inside an async context returns
    /// [`RunnerError::NestedRuntime`].
    #[tracing::instrument(skip_all, fields(suite_count = self.suites.len(), test_count = self.total_tests()))]
    pub fn run(&self, reporter: &mut dyn Reporter) -> Result<RunResults, RunnerError> {
        if tokio::runtime::Handle::try_current().is_ok() {
            return Err(RunnerError::NestedRuntime);
        }
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .thread_name("r2test-worker")
            .enable_time()
            .build()?;

        let mut results = RunResults::started();
        reporter.on_run_start(self.total_tests());

        let only = self.has_only_tests();
        for suite in &self.suites {
            if self.run_suite(&runtime, suite, only, reporter, &mut results) {
                tracing::debug!(suite = suite.path(), "bailing out of run");
                break;
            }
        }

        results.end = SystemTime::now();
        reporter.on_run_complete(&results);
        // Bodies of timed-out tests may still be running; do not wait for them.
        runtime.shutdown_background();

        let stats = results.stats();
        tracing::debug!(
            passed = stats.passed,
            failed = stats.failed,
            skipped = stats.skipped,
            timeout = stats.timeout,
            "run complete"
        );
        Ok(results)
    }

    /// Returns true when the run should stop (bail after a failure).
    fn run_suite(
        &self,
        runtime: &Runtime,
        suite: &Suite,
        only: bool,
        reporter: &mut dyn Reporter,
        run: &mut RunResults,
    ) -> bool {
        let _span = tracing::debug_span!("suite", path = suite.path()).entered();
        reporter.on_suite_start(suite);

        let before_all = run_hook(suite, HookKind::BeforeAll).err();
        if let Some(error) = &before_all {
            tracing::debug!(%error, "beforeAll failed");
            run.suite_failures.push(SuiteFailure {
                suite: suite.id(),
                suite_name: suite.name().to_string(),
                hook: HookKind::BeforeAll,
                error: error.clone(),
            });
        }

        let first = run.results.len();
        let mut bailing = false;
        for test in suite.tests() {
            let result = if bailing {
                TestResult::skipped(Arc::clone(test), Some(BAIL_MESSAGE.to_string()))
            } else if let Some(reason) = self.skip_reason(test, only) {
                TestResult::skipped(Arc::clone(test), reason)
            } else if let Some(error) = &before_all {
                TestResult::new(
                    Arc::clone(test),
                    TestStatus::Failed,
                    SystemTime::now(),
                    Duration::ZERO,
                    Some(TestFailure::hook(HookKind::BeforeAll, error.clone())),
                    None,
                )
            } else {
                reporter.on_test_start(test);
                self.run_test(runtime, suite, test)
            };

            reporter.on_test_complete(&result);
            if self.config.bail && result.is_failure() {
                bailing = true;
            }
            run.results.push(result);
        }

        if let Err(error) = run_hook(suite, HookKind::AfterAll) {
            tracing::debug!(%error, "afterAll failed");
            run.suite_failures.push(SuiteFailure {
                suite: suite.id(),
                suite_name: suite.name().to_string(),
                hook: HookKind::AfterAll,
                error,
            });
        }

        reporter.on_suite_complete(suite, &run.results[first..]);
        bailing
    }

    /// `Some(reason)` when the test must not run: explicit skip, then global `only`, then tag filter.
    fn skip_reason(&self, test: &TestCase, only: bool) -> Option<Option<String>> {
        if test.is_skip() {
            return Some(None);
        }
        if only && !test.is_only() {
            return Some(Some("not focused".to_string()));
        }
        let filter = &self.config.filter_tags;
        if !filter.is_empty() && !test.tags().iter().any(|t| filter.contains(t)) {
            return Some(Some(format!("no tag matches [{}]", filter.join(", "))));
        }
        None
    }

    fn run_test(&self, runtime: &Runtime, suite: &Suite, test: &Arc<TestCase>) -> TestResult {
        let _span = tracing::debug_span!("test", name = test.name()).entered();
        let before_each = run_hook(suite, HookKind::BeforeEach);
        let start = SystemTime::now();
        let clock = Instant::now();

        let (mut status, mut error) = match before_each {
            Err(failure) => (TestStatus::Failed, Some(TestFailure::hook(HookKind::BeforeEach, failure))),
            Ok(()) => match self.execute_body(runtime, test) {
                BodyOutcome::Passed => (TestStatus::Passed, None),
                BodyOutcome::Failed(failure) => (TestStatus::Failed, Some(failure)),
                BodyOutcome::TimedOut(limit) => (TestStatus::Timeout, Some(TestFailure::Timeout(limit))),
            },
        };
        // Hooks are not part of the measured time.
        let duration = clock.elapsed();

        let mut message = None;
        if let Err(failure) = run_hook(suite, HookKind::AfterEach) {
            let failure = TestFailure::hook(HookKind::AfterEach, failure);
            match error.as_ref() {
                None => {
                    status = TestStatus::Failed;
                    error = Some(failure);
                }
                Some(existing) => message = Some(format!("{existing}; {failure}")),
            }
        }

        tracing::debug!(%status, "test finished");
        TestResult::new(Arc::clone(test), status, start, duration, error, message)
    }

    /// Race the body against its timeout on a blocking task.
    fn execute_body(&self, runtime: &Runtime, test: &TestCase) -> BodyOutcome {
        // A zero override falls back to the default.
        let limit = test
            .timeout()
            .filter(|t| !t.is_zero())
            .unwrap_or(self.config.default_timeout);
        let body = Arc::clone(test.body());

        runtime.block_on(async move {
            let task = tokio::task::spawn_blocking(move || body());
            match tokio::time::timeout(limit, task).await {
                Ok(Ok(Ok(()))) => BodyOutcome::Passed,
                Ok(Ok(Err(failure))) => BodyOutcome::Failed(failure),
                Ok(Err(join)) if join.is_panic() => BodyOutcome::Failed(TestFailure::from_panic(join.into_panic())),
                Ok(Err(join)) => BodyOutcome::Failed(TestFailure::message(join.to_string())),
                Err(_) => {
                    tracing::debug!(?limit, "test body timed out, leaving it running");
                    BodyOutcome::TimedOut(limit)
                }
            }
        })
    }
}

/// Run a hook if present; panics are recovered as failures.
fn run_hook(suite: &Suite, kind: HookKind) -> Result<(), TestFailure> {
    let Some(hook) = suite.hooks().get(kind) else {
        return Ok(());
    };
    tracing::trace!(hook = %kind, "running hook");
    match catch_unwind(AssertUnwindSafe(|| hook())) {
        Ok(outcome) => outcome,
        Err(payload) => Err(TestFailure::from_panic(payload)),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::model::{TestOptions, test_fn};
    use crate::reporter::NullReporter;

    fn runner_with(config: RunConfig, suites: Vec<Suite>) -> Runner {
        let mut runner = Runner::new(config);
        for suite in suites {
            runner.add_suite(suite);
        }
        runner
    }

    #[test]
    fn test_skip_reason_precedence() {
        let mut suite = Suite::new("s");
        suite.add_test("skipped", TestOptions::new().skipped().only(), test_fn(|| Ok(())));
        suite.add_test("plain", TestOptions::new().with_tag("db"), test_fn(|| Ok(())));
        suite.add_test("focused", TestOptions::new().only(), test_fn(|| Ok(())));
        let runner = runner_with(RunConfig::new().with_tags(["net"]), vec![suite]);
        let tests = runner.suites()[0].tests();

        assert_eq!(runner.skip_reason(&tests[0], true), Some(None));
        assert_eq!(runner.skip_reason(&tests[1], true), Some(Some("not focused".into())));
        assert_eq!(
            runner.skip_reason(&tests[1], false),
            Some(Some("no tag matches [net]".into()))
        );
        assert!(runner.has_only_tests());
        assert_eq!(runner.total_tests(), 3);
    }

    #[test]
    fn test_hook_panics_become_failures() {
        let mut suite = Suite::new("s");
        suite.set_hook(HookKind::BeforeEach, test_fn(|| panic!("no fixture")));
        assert_eq!(
            run_hook(&suite, HookKind::BeforeEach),
            Err(TestFailure::Panic("no fixture".into()))
        );
        assert_eq!(run_hook(&suite, HookKind::AfterEach), Ok(()));
    }

    #[test]
    fn test_after_each_failure_flips_passed_and_annotates_failed() {
        let mut suite = Suite::new("s");
        suite.add_test("passes", TestOptions::new(), test_fn(|| Ok(())));
        suite.add_test("fails", TestOptions::new(), test_fn(|| Err(TestFailure::message("body"))));
        suite.set_hook(HookKind::AfterEach, test_fn(|| Err(TestFailure::message("teardown"))));

        let results = runner_with(RunConfig::new(), vec![suite]).run(&mut NullReporter).unwrap();
        let first = &results.results[0];
        assert_eq!(first.status(), TestStatus::Failed);
        assert_eq!(first.message().as_deref(), Some("afterEach hook failed: teardown"));

        let second = &results.results[1];
        assert_eq!(second.status(), TestStatus::Failed);
        assert_eq!(second.error(), Some(&TestFailure::message("body")));
        assert_eq!(second.message().as_deref(), Some("body; afterEach hook failed: teardown"));
    }

    #[test]
    fn test_body_panic_is_recovered() {
        let ran_after = Arc::new(Mutex::new(false));
        let flag = Arc::clone(&ran_after);
        let mut suite = Suite::new("s");
        suite.add_test("explodes", TestOptions::new(), test_fn(|| panic!("kaboom")));
        suite.add_test("after", TestOptions::new(), test_fn(move || {
            *flag.lock().unwrap() = true;
            Ok(())
        }));

        let results = runner_with(RunConfig::new(), vec![suite]).run(&mut NullReporter).unwrap();
        assert_eq!(results.results[0].error(), Some(&TestFailure::Panic("kaboom".into())));
        assert_eq!(results.results[1].status(), TestStatus::Passed);
        assert!(*ran_after.lock().unwrap());
    }

    #[test]
    fn test_zero_timeout_override_uses_default() {
        let mut suite = Suite::new("s");
        suite.add_test(
            "instant",
            TestOptions::new().with_timeout(Duration::ZERO),
            test_fn(|| Ok(())),
        );

        let results = runner_with(RunConfig::new(), vec![suite]).run(&mut NullReporter).unwrap();
        assert_eq!(results.results[0].status(), TestStatus::Passed);
    }

    #[test]
    fn test_duration_excludes_hooks() {
        let mut suite = Suite::new("s");
        suite.add_test("instant", TestOptions::new(), test_fn(|| Ok(())));
        suite.set_hook(
            HookKind::BeforeEach,
            test_fn(|| {
                std::thread::sleep(Duration::from_millis(150));
                Ok(())
            }),
        );
        suite.set_hook(
            HookKind::AfterEach,
            test_fn(|| {
                std::thread::sleep(Duration::from_millis(150));
                Ok(())
            }),
        );

        let results = runner_with(RunConfig::new(), vec![suite]).run(&mut NullReporter).unwrap();
        assert_eq!(results.results[0].status(), TestStatus::Passed);
        assert!(results.results[0].duration() < Duration::from_millis(150));
    }

    #[test]
    fn test_run_inside_runtime_is_rejected() {
        let mut suite = Suite::new("s");
        suite.add_test("never", TestOptions::new(), test_fn(|| Ok(())));
        let runner = runner_with(RunConfig::new(), vec![suite]);

        let outer = tokio::runtime::Builder::new_current_thread().build().unwrap();
        let outcome = outer.block_on(async { runner.run(&mut NullReporter) });
        assert!(matches!(outcome, Err(RunnerError::NestedRuntime)));
    }
}
