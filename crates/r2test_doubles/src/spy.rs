//! Spies and stubs.
//!
//! A [`Spy`] always records its calls. It routes through its stub when one is installed, otherwise through the bound
//! original delegate when call-through is on, otherwise it is a no-op that returns nothing. A [`Stub`] is usable on
//! its own.

use std::fmt;
use std::sync::{Arc, RwLock};

use crate::sync::{read, write};
use crate::value::{Call, CallResult, Callback, Delegate, ScriptError, Value};

#[derive(Default)]
struct StubState {
    return_values: Vec<Value>,
    error: Option<ScriptError>,
    implementation: Option<Callback>,
    call_count: usize,
}

/// Canned behaviour for a function, without requiring an original.
pub struct Stub {
    function: String,
    state: RwLock<StubState>,
}

impl Stub {
    pub fn new(function: impl Into<String>) -> Self {
        Self {
            function: function.into(),
            state: RwLock::new(StubState::default()),
        }
    }

    pub fn function(&self) -> &str {
        &self.function
    }

    pub fn returns(&self, values: Vec<Value>) -> &Self {
        write(&self.state).return_values = values;
        self
    }

    pub fn returns_error(&self, err: ScriptError) -> &Self {
        write(&self.state).error = Some(err);
        self
    }

    /// Install a fake implementation; its result replaces the fixed return values.
    pub fn calls_fake(&self, implementation: Callback) -> &Self {
        write(&self.state).implementation = Some(implementation);
        self
    }

    /// Invoke the stub. The configured error, if any, accompanies the values.
    pub fn call(&self, args: &[Value]) -> CallResult {
        let (values, error, implementation) = {
            let mut state = write(&self.state);
            state.call_count += 1;
            (state.return_values.clone(), state.error.clone(), state.implementation.clone())
        };
        let values = match implementation {
            Some(fake) => fake(args),
            None => values,
        };
        CallResult::new(values, error)
    }

    pub fn call_count(&self) -> usize {
        read(&self.state).call_count
    }

    /// Zero the call count, keeping the configured behaviour.
    pub fn reset(&self) {
        write(&self.state).call_count = 0;
    }
}

impl fmt::Debug for Stub {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = read(&self.state);
        f.debug_struct("Stub")
            .field("function", &self.function)
            .field("return_values", &state.return_values)
            .field("error", &state.error)
            .field("implementation", &state.implementation.is_some())
            .field("call_count", &state.call_count)
            .finish()
    }
}

#[derive(Default)]
struct SpyState {
    call_through: bool,
    stub: Option<Arc<Stub>>,
    calls: Vec<Call>,
}

/// Records every call to a wrapped function.
pub struct Spy {
    name: String,
    original: Option<Delegate>,
    state: RwLock<SpyState>,
}

impl Spy {
    pub fn new(name: impl Into<String>, original: Option<Delegate>) -> Self {
        Self {
            name: name.into(),
            original,
            state: RwLock::new(SpyState::default()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Forward calls to the original when no stub is installed.
    pub fn call_through(&self) -> &Self {
        write(&self.state).call_through = true;
        self
    }

    pub fn dont_call_through(&self) -> &Self {
        write(&self.state).call_through = false;
        self
    }

    /// Start configuring the stub keyed by this spy's name.
    pub fn and(&self) -> SpyStubBuilder<'_> {
        SpyStubBuilder { spy: self }
    }

    /// The installed stub, if any.
    pub fn stub(&self) -> Option<Arc<Stub>> {
        read(&self.state).stub.clone()
    }

    pub fn call(&self, args: &[Value]) -> CallResult {
        let (stub, call_through) = {
            let state = read(&self.state);
            (state.stub.clone(), state.call_through)
        };

        let result = match (stub, &self.original) {
            (Some(stub), _) => stub.call(args),
            (None, Some(original)) if call_through => CallResult::from(original(args)),
            _ => CallResult::default(),
        };

        write(&self.state).calls.push(Call::record(&self.name, args, &result));
        result
    }

    pub fn calls(&self) -> Vec<Call> {
        read(&self.state).calls.clone()
    }

    pub fn call_count(&self) -> usize {
        read(&self.state).calls.len()
    }

    pub fn was_called(&self) -> bool {
        self.call_count() > 0
    }

    /// Exact match against the logged arguments of any call.
    pub fn was_called_with(&self, args: &[Value]) -> bool {
        read(&self.state).calls.iter().any(|c| c.args == args)
    }

    pub fn was_called_times(&self, times: usize) -> bool {
        self.call_count() == times
    }

    /// Clear the call log and the stub's call count; the stub configuration stays installed.
    pub fn reset(&self) {
        let mut state = write(&self.state);
        state.calls.clear();
        if let Some(stub) = &state.stub {
            stub.reset();
        }
    }

    fn install(&self, stub: Stub) -> &Self {
        write(&self.state).stub = Some(Arc::new(stub));
        self
    }
}

impl fmt::Debug for Spy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = read(&self.state);
        f.debug_struct("Spy")
            .field("name", &self.name)
            .field("original", &self.original.is_some())
            .field("call_through", &state.call_through)
            .field("stub", &state.stub)
            .field("calls", &state.calls.len())
            .finish()
    }
}

/// Installs (replacing any previous) stub on a spy.
pub struct SpyStubBuilder<'a> {
    spy: &'a Spy,
}

impl<'a> SpyStubBuilder<'a> {
    pub fn return_value(self, values: Vec<Value>) -> &'a Spy {
        let stub = Stub::new(self.spy.name.clone());
        stub.returns(values);
        self.spy.install(stub)
    }

    pub fn return_error(self, err: ScriptError) -> &'a Spy {
        let stub = Stub::new(self.spy.name.clone());
        stub.returns_error(err);
        self.spy.install(stub)
    }

    pub fn call_fake(self, implementation: Callback) -> &'a Spy {
        let stub = Stub::new(self.spy.name.clone());
        stub.calls_fake(implementation);
        self.spy.install(stub)
    }
}
