#![forbid(unsafe_code)]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
//! r2test: test orchestration engine for embedded scripts.
//!
//! Suites are registered through [`Registry`] (or assembled as [`Suite`] values and added to a [`Runner`]), run
//! sequentially with hook sequencing, per-test timeouts and skip/only/tag filtering, and summarised in
//! [`RunResults`]. Test bodies replace their dependencies with the doubles re-exported from [`doubles`].
//!
//! ## Panic Policy
//!
//! - **Library code**: failures are values. Test bodies and hooks return `Result<(), TestFailure>`, assertion
//!   helpers return [`AssertionError`], and the double ledger returns typed errors.
//! - **Test bodies**: a panic is still recovered by the runner and recorded as [`TestFailure::Panic`].
//! - **Test code**: `.unwrap()` and `.expect()` are acceptable in tests.
//!
//! ## Logging
//!
//! Lifecycle events are emitted through `tracing` at `debug`/`trace`. The library never installs a subscriber.

pub mod assertions;
pub mod builder;
pub mod config;
pub mod errors;
pub mod model;
pub mod reporter;
pub mod results;
pub mod runner;

pub use r2test_doubles as doubles;
pub use r2test_doubles::{
    CallResult, DoubleRegistry, IsolationContext, IsolationManager, Mock, ScriptError, Spy, Stub, Value, values,
};

pub use assertions::{Assert, AssertResult, AssertionError};
pub use builder::Registry;
pub use config::{ConfigError, RunConfig};
pub use errors::{HookKind, RegistrationError, RunnerError, TestFailure};
pub use model::{Suite, SuiteId, TestCase, TestFn, TestOptions, test_fn};
pub use reporter::{ConsoleReporter, NullReporter, Reporter};
pub use results::{RunResults, SuiteFailure, TestResult, TestStats, TestStatus};
pub use runner::Runner;
