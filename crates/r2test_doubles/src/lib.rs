//! Test doubles for the r2test engine: mocks, spies, stubs and isolation contexts.
//!
//! This crate is the leaf of the workspace. It knows nothing about suites or runners; test bodies reach for it to
//! replace real dependencies with controllable doubles.
//!
//! ## Notes
//!
//! - Every double is internally synchronised, so calls recorded on one thread can be verified from another.
//! - Ledger problems (unexpected calls, call-count violations, failed verification) are returned as typed errors,
//!   never raised as panics.
//! - There is no hidden global state; see [`DoubleRegistry::shared`] for the opt-in process-wide instance.

#![cfg_attr(not(test), deny(clippy::unwrap_used))]

pub mod isolation;
pub mod mock;
pub mod registry;
pub mod spy;
mod sync;
pub mod value;

pub use isolation::{ContextId, FunctionInterceptor, IsolationContext, IsolationError, IsolationManager, run_in_isolation};
pub use mock::{Expectation, ExpectationBuilder, Mock, MockError};
pub use registry::{DoubleRegistry, MockRegistry, RegistryVerifyError, SpyRegistry};
pub use spy::{Spy, SpyStubBuilder, Stub};
pub use value::{Call, CallResult, Callback, Delegate, ScriptError, Value, callback, delegate, display_args};
