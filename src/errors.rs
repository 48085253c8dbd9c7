//! Failure taxonomy for the engine.
//!
//! - [`RegistrationError`]: builder misuse, surfaced immediately to the caller.
//! - [`TestFailure`]: anything a test body or hook can fail with; the runner records it on the result.
//! - [`RunnerError`]: infrastructure problems that prevent a run from starting.

use std::fmt;

use r2test_doubles::{IsolationError, MockError, RegistryVerifyError, ScriptError};
use serde::Serialize;

use crate::assertions::AssertionError;

/// Builder calls made outside a valid registration context.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistrationError {
    #[error("{operation}() must be called within a describe() block")]
    OutsideSuite { operation: &'static str },
}

/// Which lifecycle hook failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum HookKind {
    BeforeAll,
    AfterAll,
    BeforeEach,
    AfterEach,
}

impl HookKind {
    pub fn as_str(self) -> &'static str {
        match self {
            HookKind::BeforeAll => "beforeAll",
            HookKind::AfterAll => "afterAll",
            HookKind::BeforeEach => "beforeEach",
            HookKind::AfterEach => "afterEach",
        }
    }
}

impl fmt::Display for HookKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a test body or hook failed.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TestFailure {
    #[error(transparent)]
    Assertion(#[from] AssertionError),

    #[error("{0}")]
    Script(#[from] ScriptError),

    #[error(transparent)]
    Mock(#[from] MockError),

    #[error(transparent)]
    Isolation(#[from] IsolationError),

    #[error(transparent)]
    Registry(#[from] RegistryVerifyError),

    #[error("test panicked: {0}")]
    Panic(String),

    #[error("{hook} hook failed: {source}")]
    Hook {
        hook: HookKind,
        #[source]
        source: Box<TestFailure>,
    },

    #[error("test timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("{0}")]
    Message(String),
}

impl TestFailure {
    pub fn message(msg: impl Into<String>) -> Self {
        TestFailure::Message(msg.into())
    }

    pub(crate) fn hook(hook: HookKind, source: TestFailure) -> Self {
        TestFailure::Hook {
            hook,
            source: Box::new(source),
        }
    }

    /// Render a panic payload the way `std` prints it.
    pub(crate) fn from_panic(payload: Box<dyn std::any::Any + Send>) -> Self {
        let reason = if let Some(msg) = payload.downcast_ref::<&str>() {
            (*msg).to_string()
        } else if let Some(msg) = payload.downcast_ref::<String>() {
            msg.clone()
        } else {
            "unknown panic".to_string()
        };
        TestFailure::Panic(reason)
    }
}

/// Infrastructure failure that prevents a run.
#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    #[error("failed to start test runtime: {0}")]
    Runtime(#[from] std::io::Error),
    #[error("cannot run tests from inside an async runtime; call run() from synchronous code")]
    NestedRuntime,
}
