//! End-to-end tests for the execution engine: event ordering, hook sequencing, timeouts, filtering and bail.

use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use r2test::{
    HookKind, NullReporter, Registry, Reporter, RunConfig, RunResults, Runner, Suite, TestCase, TestFailure,
    TestOptions, TestResult, TestStatus, test_fn,
};

/// Shared, ordered log of everything that happened.
#[derive(Clone, Default)]
struct Journal(Arc<Mutex<Vec<String>>>);

impl Journal {
    fn push(&self, entry: impl Into<String>) {
        self.0.lock().unwrap().push(entry.into());
    }

    fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    /// A body or hook that only records `label`.
    fn step(&self, label: &'static str) -> impl Fn() -> Result<(), TestFailure> + Send + Sync + 'static {
        let journal = self.clone();
        move || {
            journal.push(label);
            Ok(())
        }
    }
}

/// Reporter that writes every event into a [`Journal`].
struct RecordingReporter(Journal);

impl Reporter for RecordingReporter {
    fn on_run_start(&mut self, total_tests: usize) {
        self.0.push(format!("run_start({total_tests})"));
    }

    fn on_suite_start(&mut self, suite: &Suite) {
        self.0.push(format!("suite_start({})", suite.path()));
    }

    fn on_test_start(&mut self, test: &TestCase) {
        self.0.push(format!("test_start({})", test.name()));
    }

    fn on_test_complete(&mut self, result: &TestResult) {
        self.0.push(format!("test_complete({}, {})", result.test_name(), result.status()));
    }

    fn on_suite_complete(&mut self, suite: &Suite, results: &[TestResult]) {
        self.0.push(format!("suite_complete({}, {})", suite.path(), results.len()));
    }

    fn on_run_complete(&mut self, results: &RunResults) {
        self.0.push(format!("run_complete({})", results.results.len()));
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn statuses(results: &RunResults) -> Vec<(String, TestStatus)> {
    results
        .results
        .iter()
        .map(|r| (r.test_name().to_string(), r.status()))
        .collect()
}

#[test]
fn reporter_sees_every_event_in_order() {
    init_tracing();
    let journal = Journal::default();
    let mut registry = Registry::new();
    registry
        .describe("math", |r| {
            r.it("adds", || Ok(()))?.skip("later", || Ok(()))?;
            Ok(())
        })
        .unwrap();

    let mut reporter = RecordingReporter(journal.clone());
    registry.run(&mut reporter).unwrap();

    assert_eq!(
        journal.entries(),
        [
            "run_start(2)",
            "suite_start(math)",
            "test_start(adds)",
            "test_complete(adds, passed)",
            "test_complete(later, skipped)",
            "suite_complete(math, 2)",
            "run_complete(2)",
        ]
    );
}

#[test]
fn each_hooks_bracket_every_test() {
    let journal = Journal::default();
    let mut registry = Registry::new();
    registry
        .describe("db", |r| {
            r.before_all(journal.step("beforeAll"))?
                .before_each(journal.step("beforeEach"))?
                .after_each(journal.step("afterEach"))?
                .after_all(journal.step("afterAll"))?
                .it("test1", journal.step("test1"))?
                .it("test2", journal.step("test2"))?;
            Ok(())
        })
        .unwrap();

    registry.run(&mut NullReporter).unwrap();

    assert_eq!(
        journal.entries(),
        [
            "beforeAll",
            "beforeEach",
            "test1",
            "afterEach",
            "beforeEach",
            "test2",
            "afterEach",
            "afterAll",
        ]
    );
}

#[test]
fn failing_test_does_not_stop_the_suite() {
    let mut registry = Registry::new();
    registry
        .describe("s", |r| {
            r.it("fails", || Err(TestFailure::message("nope")))?
                .it("passes", || Ok(()))?;
            Ok(())
        })
        .unwrap();

    let results = registry.run(&mut NullReporter).unwrap();
    assert_eq!(
        statuses(&results),
        [
            ("fails".to_string(), TestStatus::Failed),
            ("passes".to_string(), TestStatus::Passed)
        ]
    );
    assert_eq!(results.results[0].message().as_deref(), Some("nope"));
}

#[test]
fn slow_body_times_out_and_run_moves_on() {
    let mut registry = Registry::new();
    registry
        .describe("slow", |r| {
            r.it_with(
                "sleeps",
                TestOptions::new().with_timeout(Duration::from_millis(100)),
                || {
                    thread::sleep(Duration::from_millis(200));
                    Ok(())
                },
            )?
            .it("quick", || Ok(()))?;
            Ok(())
        })
        .unwrap();

    let results = registry.run(&mut NullReporter).unwrap();
    let timed_out = &results.results[0];
    assert_eq!(timed_out.status(), TestStatus::Timeout);
    assert_eq!(timed_out.error(), Some(&TestFailure::Timeout(Duration::from_millis(100))));
    assert!(timed_out.duration() < Duration::from_millis(200));
    assert_eq!(results.results[1].status(), TestStatus::Passed);
}

#[test]
fn default_timeout_comes_from_config() {
    let mut registry = Registry::with_config(RunConfig::new().with_timeout(Duration::from_millis(50)));
    registry
        .describe("s", |r| {
            r.it("hangs", || {
                thread::sleep(Duration::from_millis(150));
                Ok(())
            })?;
            Ok(())
        })
        .unwrap();

    let results = registry.run(&mut NullReporter).unwrap();
    assert_eq!(results.stats().timeout, 1);
}

#[test]
fn only_applies_across_the_whole_run() {
    let mut registry = Registry::new();
    registry
        .describe("first", |r| {
            r.it("a", || Ok(()))?;
            Ok(())
        })
        .unwrap()
        .describe("second", |r| {
            r.only("b", || Ok(()))?.it("c", || Ok(()))?;
            Ok(())
        })
        .unwrap();

    let results = registry.run(&mut NullReporter).unwrap();
    assert_eq!(
        statuses(&results),
        [
            ("a".to_string(), TestStatus::Skipped),
            ("b".to_string(), TestStatus::Passed),
            ("c".to_string(), TestStatus::Skipped)
        ]
    );
}

#[test]
fn tag_filter_uses_test_and_suite_tags() {
    let mut registry = Registry::with_config(RunConfig::new().with_tags(["fast"]));
    registry
        .describe("tagged suite", |r| {
            r.tag("fast")?.it("inherits", || Ok(()))?;
            Ok(())
        })
        .unwrap()
        .describe("mixed", |r| {
            r.it_with("own tag", TestOptions::new().with_tag("fast"), || Ok(()))?
                .it_with("other tag", TestOptions::new().with_tag("slow"), || Ok(()))?
                .it("untagged", || Ok(()))?;
            Ok(())
        })
        .unwrap();

    let results = registry.run(&mut NullReporter).unwrap();
    let stats = results.stats();
    assert_eq!(stats.passed, 2);
    assert_eq!(stats.skipped, 2);
}

#[test]
fn before_all_failure_fails_suite_but_runs_after_all() {
    let journal = Journal::default();
    let mut registry = Registry::new();
    registry
        .describe("broken", |r| {
            r.before_all(|| Err(TestFailure::message("no database")))?
                .after_all(journal.step("afterAll"))?
                .before_each(journal.step("beforeEach"))?
                .it("t1", journal.step("t1"))?
                .skip("t2", journal.step("t2"))?;
            Ok(())
        })
        .unwrap()
        .describe("healthy", |r| {
            r.it("t3", journal.step("t3"))?;
            Ok(())
        })
        .unwrap();

    let results = registry.run(&mut NullReporter).unwrap();
    assert_eq!(journal.entries(), ["afterAll", "t3"]);

    let t1 = &results.results[0];
    assert_eq!(t1.status(), TestStatus::Failed);
    assert!(matches!(
        t1.error(),
        Some(TestFailure::Hook {
            hook: HookKind::BeforeAll,
            ..
        })
    ));
    assert_eq!(results.results[1].status(), TestStatus::Skipped);
    assert_eq!(results.results[2].status(), TestStatus::Passed);
    assert_eq!(results.suite_failures.len(), 1);
    assert_eq!(results.suite_failures[0].hook, HookKind::BeforeAll);
}

#[test]
fn before_each_failure_skips_body_but_runs_after_each() {
    let journal = Journal::default();
    let mut registry = Registry::new();
    registry
        .describe("s", |r| {
            r.before_each(|| Err(TestFailure::message("setup")))?
                .after_each(journal.step("afterEach"))?
                .it("body", journal.step("body"))?;
            Ok(())
        })
        .unwrap();

    let results = registry.run(&mut NullReporter).unwrap();
    assert_eq!(journal.entries(), ["afterEach"]);
    assert_eq!(results.results[0].status(), TestStatus::Failed);
    assert_eq!(
        results.results[0].message().as_deref(),
        Some("beforeEach hook failed: setup")
    );
}

#[test]
fn after_all_failure_is_reported_on_the_run() {
    let mut registry = Registry::new();
    registry
        .describe("s", |r| {
            r.after_all(|| Err(TestFailure::message("cleanup")))?
                .it("fine", || Ok(()))?;
            Ok(())
        })
        .unwrap();

    let results = registry.run(&mut NullReporter).unwrap();
    assert_eq!(results.results[0].status(), TestStatus::Passed);
    assert!(results.has_failures());
    assert_eq!(results.suite_failures[0].hook, HookKind::AfterAll);
    assert_eq!(results.suite_failures[0].suite_name, "s");
}

#[test]
fn empty_suite_still_fires_all_hooks() {
    let journal = Journal::default();
    let mut suite = Suite::new("empty");
    suite
        .set_hook(HookKind::BeforeAll, test_fn(journal.step("beforeAll")))
        .set_hook(HookKind::BeforeEach, test_fn(journal.step("beforeEach")))
        .set_hook(HookKind::AfterAll, test_fn(journal.step("afterAll")));

    let mut runner = Runner::default();
    runner.add_suite(suite);
    let results = runner.run(&mut RecordingReporter(journal.clone())).unwrap();

    assert!(results.results.is_empty());
    assert_eq!(
        journal.entries(),
        [
            "run_start(0)",
            "suite_start(empty)",
            "beforeAll",
            "afterAll",
            "suite_complete(empty, 0)",
            "run_complete(0)",
        ]
    );
}

#[test]
fn bail_stops_after_first_failure() {
    let journal = Journal::default();
    let mut registry = Registry::with_config(RunConfig::new().with_bail(true));
    registry
        .describe("first", |r| {
            r.after_each(journal.step("afterEach"))?
                .after_all(journal.step("afterAll"))?
                .it("ok", journal.step("ok"))?
                .it("boom", || Err(TestFailure::message("boom")))?
                .it("never", journal.step("never"))?;
            Ok(())
        })
        .unwrap()
        .describe("second", |r| {
            r.it("untouched", journal.step("untouched"))?;
            Ok(())
        })
        .unwrap();

    let mut reporter = RecordingReporter(Journal::default());
    let events = reporter.0.clone();
    let results = registry.run(&mut reporter).unwrap();

    assert_eq!(journal.entries(), ["ok", "afterEach", "afterEach", "afterAll"]);
    assert_eq!(
        statuses(&results),
        [
            ("ok".to_string(), TestStatus::Passed),
            ("boom".to_string(), TestStatus::Failed),
            ("never".to_string(), TestStatus::Skipped)
        ]
    );
    assert!(!events.entries().iter().any(|e| e.contains("second")));
    assert_eq!(events.entries().last().map(String::as_str), Some("run_complete(3)"));
}

#[test]
fn bail_after_timeout_skips_rest_and_runs_after_all() {
    let journal = Journal::default();
    let mut registry = Registry::with_config(RunConfig::new().with_bail(true));
    registry
        .describe("slow", |r| {
            r.after_all(journal.step("afterAll"))?
                .it_with(
                    "hangs",
                    TestOptions::new().with_timeout(Duration::from_millis(50)),
                    || {
                        thread::sleep(Duration::from_millis(150));
                        Ok(())
                    },
                )?
                .it("never", journal.step("never"))?;
            Ok(())
        })
        .unwrap()
        .describe("later", |r| {
            r.it("untouched", journal.step("untouched"))?;
            Ok(())
        })
        .unwrap();

    let results = registry.run(&mut NullReporter).unwrap();

    assert_eq!(
        statuses(&results),
        [
            ("hangs".to_string(), TestStatus::Timeout),
            ("never".to_string(), TestStatus::Skipped)
        ]
    );
    assert_eq!(
        results.results[1].message().as_deref(),
        Some("skipped after an earlier failure (bail)")
    );
    assert_eq!(journal.entries(), ["afterAll"]);
}

#[test]
fn nested_suites_run_in_opening_order_without_hook_inheritance() {
    let journal = Journal::default();
    let mut registry = Registry::new();
    registry
        .describe("outer", |r| {
            r.before_each(journal.step("outer.beforeEach"))?
                .it("o1", journal.step("o1"))?;
            r.describe("inner", |r| {
                r.it("i1", journal.step("i1"))?;
                Ok(())
            })?;
            Ok(())
        })
        .unwrap();

    let mut reporter = RecordingReporter(Journal::default());
    let events = reporter.0.clone();
    registry.run(&mut reporter).unwrap();

    assert_eq!(journal.entries(), ["outer.beforeEach", "o1", "i1"]);
    assert!(events.entries().contains(&"suite_start(outer > inner)".to_string()));
}
