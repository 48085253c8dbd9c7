//! Mocks: doubles that require pre-declared expectations.
//!
//! A call to a function without an [`Expectation`] is an error rather than a silent no-op. Verification is always
//! explicit via [`Mock::verify`].

use std::fmt;
use std::sync::RwLock;

use crate::sync::{read, write};
use crate::value::{Call, CallResult, Callback, ScriptError, Value, display_args};

/// Ledger errors returned by [`Mock::call`] and [`Mock::verify`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MockError {
    #[error("mock '{mock}': unexpected call to {function} with args {args}")]
    UnexpectedCall { mock: String, function: String, args: String },

    #[error("mock '{mock}': function {function} called too many times (max: {max})")]
    TooManyCalls { mock: String, function: String, max: usize },

    #[error("mock '{mock}': function {function} was called {calls} times, expected at least {min}")]
    CalledTooFew {
        mock: String,
        function: String,
        calls: usize,
        min: usize,
    },

    #[error("mock '{mock}': function {function} was called {calls} times, expected at most {max}")]
    CalledTooOften {
        mock: String,
        function: String,
        calls: usize,
        max: usize,
    },
}

/// Declared contract for one mocked function.
#[derive(Clone)]
pub struct Expectation {
    pub function: String,
    /// Informational only; the expectation is selected by function name.
    pub args: Vec<Value>,
    pub return_values: Vec<Value>,
    pub error: Option<ScriptError>,
    pub call_count: usize,
    pub min_calls: usize,
    /// `None` means unbounded.
    pub max_calls: Option<usize>,
    pub callback: Option<Callback>,
}

impl Expectation {
    fn new(function: &str, args: Vec<Value>) -> Self {
        Self {
            function: function.to_string(),
            args,
            return_values: Vec::new(),
            error: None,
            call_count: 0,
            min_calls: 1,
            max_calls: None,
            callback: None,
        }
    }

    fn check(&self, mock: &str) -> Result<(), MockError> {
        if self.call_count < self.min_calls {
            return Err(MockError::CalledTooFew {
                mock: mock.to_string(),
                function: self.function.clone(),
                calls: self.call_count,
                min: self.min_calls,
            });
        }
        if let Some(max) = self.max_calls {
            if self.call_count > max {
                return Err(MockError::CalledTooOften {
                    mock: mock.to_string(),
                    function: self.function.clone(),
                    calls: self.call_count,
                    max,
                });
            }
        }
        Ok(())
    }
}

impl fmt::Debug for Expectation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Expectation")
            .field("function", &self.function)
            .field("args", &self.args)
            .field("return_values", &self.return_values)
            .field("error", &self.error)
            .field("call_count", &self.call_count)
            .field("min_calls", &self.min_calls)
            .field("max_calls", &self.max_calls)
            .field("callback", &self.callback.is_some())
            .finish()
    }
}

#[derive(Default)]
struct MockState {
    // Registration order; one entry per function name.
    expectations: Vec<Expectation>,
    calls: Vec<Call>,
}

impl MockState {
    fn expectation_mut(&mut self, function: &str) -> Option<&mut Expectation> {
        self.expectations.iter_mut().find(|e| e.function == function)
    }
}

/// A mock object with a thread-safe expectation table and call log.
pub struct Mock {
    name: String,
    state: RwLock<MockState>,
}

impl Mock {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: RwLock::new(MockState::default()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Register (or replace) the expectation for `function`.
    pub fn when(&self, function: &str, args: Vec<Value>) -> ExpectationBuilder<'_> {
        let mut state = write(&self.state);
        let fresh = Expectation::new(function, args);
        match state.expectation_mut(function) {
            Some(existing) => *existing = fresh,
            None => state.expectations.push(fresh),
        }
        ExpectationBuilder {
            mock: self,
            function: function.to_string(),
        }
    }

    /// Invoke the mocked `function`.
    ///
    /// ## Errors
    /// - [`MockError::UnexpectedCall`] when no expectation exists for `function` (not logged).
    /// - [`MockError::TooManyCalls`] when the call exceeds `max_calls`; the call is still counted and logged so
    ///   [`Mock::verify`] reports the over-call.
    pub fn call(&self, function: &str, args: &[Value]) -> Result<CallResult, MockError> {
        let (values, error, callback) = {
            let mut state = write(&self.state);
            let Some(expectation) = state.expectation_mut(function) else {
                tracing::debug!(mock = %self.name, function, "rejected unexpected call");
                return Err(MockError::UnexpectedCall {
                    mock: self.name.clone(),
                    function: function.to_string(),
                    args: display_args(args),
                });
            };

            let over_limit = expectation.max_calls.filter(|max| expectation.call_count >= *max);
            expectation.call_count += 1;

            if let Some(max) = over_limit {
                let err = MockError::TooManyCalls {
                    mock: self.name.clone(),
                    function: function.to_string(),
                    max,
                };
                let rejected = CallResult::new(Vec::new(), Some(ScriptError::new(err.to_string())));
                state.calls.push(Call::record(function, args, &rejected));
                tracing::debug!(mock = %self.name, function, max, "rejected over-limit call");
                return Err(err);
            }

            (
                expectation.return_values.clone(),
                expectation.error.clone(),
                expectation.callback.clone(),
            )
        };

        // Callbacks run unlocked so they may inspect this mock.
        let values = match callback {
            Some(cb) => cb(args),
            None => values,
        };
        let result = CallResult::new(values, error);
        write(&self.state).calls.push(Call::record(function, args, &result));
        Ok(result)
    }

    /// Check every expectation's call count against its bounds, in registration order.
    pub fn verify(&self) -> Result<(), MockError> {
        let state = read(&self.state);
        state.expectations.iter().try_for_each(|e| e.check(&self.name))
    }

    /// Discard all expectations and the call log.
    pub fn reset(&self) {
        let mut state = write(&self.state);
        state.expectations.clear();
        state.calls.clear();
    }

    /// Snapshot of the expectation for `function`.
    pub fn expectation(&self, function: &str) -> Option<Expectation> {
        read(&self.state).expectations.iter().find(|e| e.function == function).cloned()
    }

    pub fn calls(&self) -> Vec<Call> {
        read(&self.state).calls.clone()
    }

    pub fn calls_for(&self, function: &str) -> Vec<Call> {
        read(&self.state)
            .calls
            .iter()
            .filter(|c| c.function == function)
            .cloned()
            .collect()
    }

    pub fn was_called(&self, function: &str) -> bool {
        read(&self.state).calls.iter().any(|c| c.function == function)
    }

    pub fn was_called_with(&self, function: &str, args: &[Value]) -> bool {
        read(&self.state)
            .calls
            .iter()
            .any(|c| c.function == function && c.args == args)
    }

    pub fn was_called_times(&self, function: &str, times: usize) -> bool {
        self.calls_for(function).len() == times
    }

    fn configure(&self, function: &str, f: impl FnOnce(&mut Expectation)) {
        let mut state = write(&self.state);
        if let Some(expectation) = state.expectation_mut(function) {
            f(expectation);
        }
    }
}

impl fmt::Debug for Mock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = read(&self.state);
        f.debug_struct("Mock")
            .field("name", &self.name)
            .field("expectations", &state.expectations)
            .field("calls", &state.calls.len())
            .finish()
    }
}

/// Fluent configuration of a registered [`Expectation`].
///
/// Each method updates the expectation in place inside the owning mock. If the expectation was replaced by a later
/// [`Mock::when`] for the same name, the builder configures the replacement.
pub struct ExpectationBuilder<'a> {
    mock: &'a Mock,
    function: String,
}

impl ExpectationBuilder<'_> {
    pub fn returns(self, values: Vec<Value>) -> Self {
        self.mock.configure(&self.function, |e| e.return_values = values);
        self
    }

    pub fn returns_error(self, err: ScriptError) -> Self {
        self.mock.configure(&self.function, |e| e.error = Some(err));
        self
    }

    /// Exactly `n` calls.
    pub fn times(self, n: usize) -> Self {
        self.mock.configure(&self.function, |e| {
            e.min_calls = n;
            e.max_calls = Some(n);
        });
        self
    }

    pub fn at_least(self, n: usize) -> Self {
        self.mock.configure(&self.function, |e| e.min_calls = n);
        self
    }

    pub fn at_most(self, n: usize) -> Self {
        self.mock.configure(&self.function, |e| e.max_calls = Some(n));
        self
    }

    /// Compute return values from the actual arguments; takes precedence over [`Self::returns`].
    pub fn with_callback(self, callback: Callback) -> Self {
        self.mock.configure(&self.function, |e| e.callback = Some(callback));
        self
    }
}
