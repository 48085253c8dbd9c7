//! Property-based tests for the execution engine
//!
//! These tests use proptest to check the runner's ordering and counting invariants over randomly shaped suites.

use std::sync::{Arc, Mutex};

use proptest::prelude::*;
use r2test::{
    HookKind, NullReporter, Reporter, RunConfig, RunResults, Runner, Suite, TestCase, TestFailure, TestOptions,
    TestResult, TestStatus, test_fn,
};

/// Counts lifecycle events and remembers test order.
#[derive(Default)]
struct CountingReporter {
    started: Vec<String>,
    completed: Vec<String>,
    suites_started: usize,
    suites_completed: usize,
}

impl Reporter for CountingReporter {
    fn on_run_start(&mut self, _total_tests: usize) {}

    fn on_suite_start(&mut self, _suite: &Suite) {
        self.suites_started += 1;
    }

    fn on_test_start(&mut self, test: &TestCase) {
        self.started.push(test.name().to_string());
    }

    fn on_test_complete(&mut self, result: &TestResult) {
        self.completed.push(result.test_name().to_string());
    }

    fn on_suite_complete(&mut self, _suite: &Suite, _results: &[TestResult]) {
        self.suites_completed += 1;
    }

    fn on_run_complete(&mut self, _results: &RunResults) {}
}

/// One test: whether it fails and whether it is skipped.
fn test_shape() -> impl Strategy<Value = (bool, bool)> {
    (any::<bool>(), prop::bool::weighted(0.2))
}

fn build_suite(name: &str, shapes: &[(bool, bool)], hook_calls: &Arc<Mutex<Vec<HookKind>>>) -> Suite {
    let mut suite = Suite::new(name);
    for (i, &(fails, skip)) in shapes.iter().enumerate() {
        let options = if skip { TestOptions::new().skipped() } else { TestOptions::new() };
        suite.add_test(
            format!("{name}-{i}"),
            options,
            test_fn(move || {
                if fails {
                    Err(TestFailure::message("planned failure"))
                } else {
                    Ok(())
                }
            }),
        );
    }
    for kind in [HookKind::BeforeAll, HookKind::AfterAll] {
        let calls = Arc::clone(hook_calls);
        suite.set_hook(
            kind,
            test_fn(move || {
                calls.lock().unwrap().push(kind);
                Ok(())
            }),
        );
    }
    suite
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// Every non-skipped test gets exactly one start/complete pair, in registration order.
    #[test]
    fn events_pair_up_in_registration_order(suites in prop::collection::vec(prop::collection::vec(test_shape(), 0..5), 1..4)) {
        let hook_calls = Arc::new(Mutex::new(Vec::new()));
        let mut runner = Runner::new(RunConfig::new());
        let mut expected_order = Vec::new();
        let mut expected_started = Vec::new();
        for (s, shapes) in suites.iter().enumerate() {
            let name = format!("suite{s}");
            for (i, &(_, skip)) in shapes.iter().enumerate() {
                expected_order.push(format!("{name}-{i}"));
                if !skip {
                    expected_started.push(format!("{name}-{i}"));
                }
            }
            runner.add_suite(build_suite(&name, shapes, &hook_calls));
        }

        let mut reporter = CountingReporter::default();
        let results = runner.run(&mut reporter).unwrap();

        prop_assert_eq!(&reporter.completed, &expected_order);
        prop_assert_eq!(&reporter.started, &expected_started);
        prop_assert_eq!(reporter.suites_started, suites.len());
        prop_assert_eq!(reporter.suites_completed, suites.len());

        let names: Vec<&str> = results.results.iter().map(|r| r.test_name()).collect();
        prop_assert_eq!(names, expected_order.iter().map(String::as_str).collect::<Vec<_>>());
    }

    /// beforeAll and afterAll fire exactly once per suite, for any number of tests (including none).
    #[test]
    fn suite_hooks_fire_once_per_suite(shapes in prop::collection::vec(test_shape(), 0..6)) {
        let hook_calls = Arc::new(Mutex::new(Vec::new()));
        let mut runner = Runner::default();
        runner.add_suite(build_suite("only", &shapes, &hook_calls));
        runner.run(&mut NullReporter).unwrap();

        prop_assert_eq!(hook_calls.lock().unwrap().clone(), vec![HookKind::BeforeAll, HookKind::AfterAll]);
    }

    /// Derived stats always add up and match each result's status.
    #[test]
    fn stats_partition_results(shapes in prop::collection::vec(test_shape(), 0..8)) {
        let hook_calls = Arc::new(Mutex::new(Vec::new()));
        let mut runner = Runner::default();
        runner.add_suite(build_suite("stats", &shapes, &hook_calls));
        let results = runner.run(&mut NullReporter).unwrap();

        let stats = results.stats();
        prop_assert_eq!(stats.total, shapes.len());
        prop_assert_eq!(stats.passed + stats.failed + stats.skipped + stats.timeout, stats.total);
        prop_assert_eq!(stats.skipped, shapes.iter().filter(|(_, skip)| *skip).count());
        prop_assert_eq!(stats.failed, shapes.iter().filter(|(fails, skip)| *fails && !*skip).count());
        prop_assert!(results.results.iter().all(|r| r.status().is_terminal()));
        prop_assert_eq!(results.has_failures(), stats.failed > 0);
        prop_assert!(results.results.iter().all(|r| r.status() != TestStatus::Timeout));
    }
}
