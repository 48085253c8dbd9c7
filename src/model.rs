//! Suite/Test data model.
//!
//! A [`Suite`] is assembled during registration (tests and hooks appended in place) and then handed to the
//! [`Runner`](crate::runner::Runner), which owns it immutably for the rest of the run. Tests are shared as
//! `Arc<TestCase>` so results can point back at them.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::Serialize;

use crate::errors::{HookKind, TestFailure};

/// Zero-argument test body or hook. Failures are returned, panics are recovered by the runner.
pub type TestFn = Arc<dyn Fn() -> Result<(), TestFailure> + Send + Sync>;

/// Wrap a closure as a [`TestFn`].
pub fn test_fn<F>(f: F) -> TestFn
where
    F: Fn() -> Result<(), TestFailure> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Identity of a suite, unique within the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct SuiteId(u64);

impl SuiteId {
    fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(0);
        SuiteId(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

/// Per-test registration options.
#[derive(Debug, Clone, Default)]
pub struct TestOptions {
    pub description: Option<String>,
    pub tags: Vec<String>,
    /// Overrides the run's default timeout.
    pub timeout: Option<Duration>,
    pub skip: bool,
    pub only: bool,
}

impl TestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn skipped(mut self) -> Self {
        self.skip = true;
        self
    }

    pub fn only(mut self) -> Self {
        self.only = true;
        self
    }
}

/// A registered test.
pub struct TestCase {
    name: String,
    description: String,
    body: TestFn,
    tags: Vec<String>,
    timeout: Option<Duration>,
    skip: bool,
    only: bool,
    suite: SuiteId,
    suite_name: String,
}

impl TestCase {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn body(&self) -> &TestFn {
        &self.body
    }

    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    pub fn is_skip(&self) -> bool {
        self.skip
    }

    pub fn is_only(&self) -> bool {
        self.only
    }

    /// Owning suite; fixed at creation.
    pub fn suite(&self) -> SuiteId {
        self.suite
    }

    pub fn suite_name(&self) -> &str {
        &self.suite_name
    }
}

impl fmt::Debug for TestCase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestCase")
            .field("name", &self.name)
            .field("tags", &self.tags)
            .field("timeout", &self.timeout)
            .field("skip", &self.skip)
            .field("only", &self.only)
            .field("suite", &self.suite)
            .finish()
    }
}

/// Optional lifecycle hooks of a suite.
#[derive(Clone, Default)]
pub struct Hooks {
    pub before_all: Option<TestFn>,
    pub after_all: Option<TestFn>,
    pub before_each: Option<TestFn>,
    pub after_each: Option<TestFn>,
}

impl Hooks {
    pub fn get(&self, kind: HookKind) -> Option<&TestFn> {
        match kind {
            HookKind::BeforeAll => self.before_all.as_ref(),
            HookKind::AfterAll => self.after_all.as_ref(),
            HookKind::BeforeEach => self.before_each.as_ref(),
            HookKind::AfterEach => self.after_each.as_ref(),
        }
    }

    fn slot(&mut self, kind: HookKind) -> &mut Option<TestFn> {
        match kind {
            HookKind::BeforeAll => &mut self.before_all,
            HookKind::AfterAll => &mut self.after_all,
            HookKind::BeforeEach => &mut self.before_each,
            HookKind::AfterEach => &mut self.after_each,
        }
    }
}

/// A named group of tests sharing hooks and tags.
pub struct Suite {
    id: SuiteId,
    name: String,
    description: String,
    /// `outer > inner` for nested registrations.
    path: String,
    tests: Vec<Arc<TestCase>>,
    hooks: Hooks,
    tags: Vec<String>,
}

impl Suite {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            id: SuiteId::next(),
            description: name.clone(),
            path: name.clone(),
            name,
            tests: Vec::new(),
            hooks: Hooks::default(),
            tags: Vec::new(),
        }
    }

    pub(crate) fn nested_in(mut self, parent_path: &str) -> Self {
        self.path = format!("{parent_path} > {}", self.name);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Append a test; it inherits this suite's tags.
    pub fn add_test(&mut self, name: impl Into<String>, options: TestOptions, body: TestFn) -> &mut Self {
        let name = name.into();
        let mut tags = self.tags.clone();
        for tag in options.tags {
            if !tags.contains(&tag) {
                tags.push(tag);
            }
        }
        self.tests.push(Arc::new(TestCase {
            description: options.description.unwrap_or_else(|| name.clone()),
            name,
            body,
            tags,
            timeout: options.timeout,
            skip: options.skip,
            only: options.only,
            suite: self.id,
            suite_name: self.name.clone(),
        }));
        self
    }

    /// Install (replacing) a hook.
    pub fn set_hook(&mut self, kind: HookKind, hook: TestFn) -> &mut Self {
        *self.hooks.slot(kind) = Some(hook);
        self
    }

    /// Add a suite tag. Applies to tests added afterwards.
    pub fn add_tag(&mut self, tag: impl Into<String>) -> &mut Self {
        let tag = tag.into();
        if !self.tags.contains(&tag) {
            self.tags.push(tag);
        }
        self
    }

    pub fn id(&self) -> SuiteId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn tests(&self) -> &[Arc<TestCase>] {
        &self.tests
    }

    pub fn hooks(&self) -> &Hooks {
        &self.hooks
    }

    pub fn tags(&self) -> &[String] {
        &self.tags
    }
}

impl fmt::Debug for Suite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hooks: Vec<&str> = [
            HookKind::BeforeAll,
            HookKind::AfterAll,
            HookKind::BeforeEach,
            HookKind::AfterEach,
        ]
        .into_iter()
        .filter(|k| self.hooks.get(*k).is_some())
        .map(HookKind::as_str)
        .collect();
        f.debug_struct("Suite")
            .field("id", &self.id)
            .field("path", &self.path)
            .field("tests", &self.tests)
            .field("hooks", &hooks)
            .field("tags", &self.tags)
            .finish()
    }
}
