//! Fluent registration of suites and tests.
//!
//! ```
//! use r2test::{Registry, NullReporter};
//!
//! let mut registry = Registry::new();
//! registry.describe("math", |r| {
//!     r.before_each(|| Ok(()))?
//!         .it("adds", || Ok(()))?
//!         .it("subtracts", || Ok(()))?;
//!     Ok(())
//! })?;
//! let results = registry.run(&mut NullReporter).unwrap();
//! assert_eq!(results.stats().passed, 2);
//! # Ok::<(), r2test::RegistrationError>(())
//! ```

use crate::config::RunConfig;
use crate::errors::{HookKind, RegistrationError, RunnerError, TestFailure};
use crate::model::{Suite, TestFn, TestOptions};
use crate::reporter::Reporter;
use crate::results::RunResults;
use crate::runner::Runner;

/// Accumulates suites while `describe` closures execute.
///
/// Suites are listed in the order their `describe` call was opened, so an outer suite precedes the suites nested
/// inside it. Nested suites do not inherit hooks.
#[derive(Debug, Default)]
pub struct Registry {
    suites: Vec<Suite>,
    /// Indices into `suites` of the currently open `describe` blocks, innermost last.
    open: Vec<usize>,
    config: RunConfig,
}

type Registered<'a> = Result<&'a mut Registry, RegistrationError>;

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: RunConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// Open a suite, run `body` to populate it, then close it (also when `body` fails).
    pub fn describe<F>(&mut self, name: impl Into<String>, body: F) -> Registered<'_>
    where
        F: FnOnce(&mut Registry) -> Result<(), RegistrationError>,
    {
        let mut suite = Suite::new(name);
        if let Some(parent) = self.open.last().map(|&i| self.suites[i].path().to_string()) {
            suite = suite.nested_in(&parent);
        }
        tracing::trace!(suite = suite.path(), "describe");

        self.suites.push(suite);
        self.open.push(self.suites.len() - 1);
        let outcome = body(self);
        self.open.pop();
        outcome.map(|()| self)
    }

    fn current(&mut self, operation: &'static str) -> Result<&mut Suite, RegistrationError> {
        match self.open.last() {
            Some(&i) => Ok(&mut self.suites[i]),
            None => Err(RegistrationError::OutsideSuite { operation }),
        }
    }

    pub fn it<F>(&mut self, name: impl Into<String>, body: F) -> Registered<'_>
    where
        F: Fn() -> Result<(), TestFailure> + Send + Sync + 'static,
    {
        self.register("it", name.into(), TestOptions::default(), body)
    }

    pub fn it_with<F>(&mut self, name: impl Into<String>, options: TestOptions, body: F) -> Registered<'_>
    where
        F: Fn() -> Result<(), TestFailure> + Send + Sync + 'static,
    {
        self.register("it", name.into(), options, body)
    }

    /// Register a test that is always skipped.
    pub fn skip<F>(&mut self, name: impl Into<String>, body: F) -> Registered<'_>
    where
        F: Fn() -> Result<(), TestFailure> + Send + Sync + 'static,
    {
        self.register("skip", name.into(), TestOptions::new().skipped(), body)
    }

    /// Register a focused test; once any exists, unfocused tests of the whole run are skipped.
    pub fn only<F>(&mut self, name: impl Into<String>, body: F) -> Registered<'_>
    where
        F: Fn() -> Result<(), TestFailure> + Send + Sync + 'static,
    {
        self.register("only", name.into(), TestOptions::new().only(), body)
    }

    fn register<F>(&mut self, operation: &'static str, name: String, options: TestOptions, body: F) -> Registered<'_>
    where
        F: Fn() -> Result<(), TestFailure> + Send + Sync + 'static,
    {
        let body: TestFn = std::sync::Arc::new(body);
        self.current(operation)?.add_test(name, options, body);
        Ok(self)
    }

    /// Tag the current suite. Applies to tests registered after this call.
    pub fn tag(&mut self, tag: impl Into<String>) -> Registered<'_> {
        self.current("tag")?.add_tag(tag);
        Ok(self)
    }

    pub fn before_all<F>(&mut self, hook: F) -> Registered<'_>
    where
        F: Fn() -> Result<(), TestFailure> + Send + Sync + 'static,
    {
        self.hook("beforeAll", HookKind::BeforeAll, hook)
    }

    pub fn after_all<F>(&mut self, hook: F) -> Registered<'_>
    where
        F: Fn() -> Result<(), TestFailure> + Send + Sync + 'static,
    {
        self.hook("afterAll", HookKind::AfterAll, hook)
    }

    pub fn before_each<F>(&mut self, hook: F) -> Registered<'_>
    where
        F: Fn() -> Result<(), TestFailure> + Send + Sync + 'static,
    {
        self.hook("beforeEach", HookKind::BeforeEach, hook)
    }

    pub fn after_each<F>(&mut self, hook: F) -> Registered<'_>
    where
        F: Fn() -> Result<(), TestFailure> + Send + Sync + 'static,
    {
        self.hook("afterEach", HookKind::AfterEach, hook)
    }

    fn hook<F>(&mut self, operation: &'static str, kind: HookKind, hook: F) -> Registered<'_>
    where
        F: Fn() -> Result<(), TestFailure> + Send + Sync + 'static,
    {
        self.current(operation)?.set_hook(kind, std::sync::Arc::new(hook));
        Ok(self)
    }

    pub fn suites(&self) -> &[Suite] {
        &self.suites
    }

    pub fn into_runner(self) -> Runner {
        let mut runner = Runner::new(self.config);
        for suite in self.suites {
            runner.add_suite(suite);
        }
        runner
    }

    pub fn run(self, reporter: &mut dyn Reporter) -> Result<RunResults, RunnerError> {
        self.into_runner().run(reporter)
    }
}
