//! Per-test isolation contexts.
//!
//! An [`IsolationManager`] owns a set of [`IsolationContext`]s, each holding its own doubles, a private global
//! variable store and a table of function interceptors. At most one context per manager is active at any instant:
//! [`IsolationManager::activate`] deactivates every other context before enabling the target.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use crate::mock::{Mock, MockError};
use crate::spy::{Spy, Stub};
use crate::sync::{read, write};
use crate::value::{CallResult, Delegate, Value};

/// Identity of an isolation context, rendered `test_<name>_<seq>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContextId(String);

impl ContextId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IsolationError {
    #[error("context not found: {0}")]
    ContextNotFound(ContextId),

    #[error("mock '{mock}' verification failed in context '{context}': {source}")]
    Verification {
        context: ContextId,
        mock: String,
        #[source]
        source: MockError,
    },
}

/// Routes calls to `name` through a replacement while its context is active.
#[derive(Clone)]
pub struct FunctionInterceptor {
    pub original: Option<Delegate>,
    pub interceptor: Delegate,
    pub enabled: bool,
}

impl fmt::Debug for FunctionInterceptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionInterceptor")
            .field("original", &self.original.is_some())
            .field("enabled", &self.enabled)
            .finish()
    }
}

#[derive(Debug, Default)]
struct ContextState {
    mocks: HashMap<String, Arc<Mock>>,
    spies: HashMap<String, Arc<Spy>>,
    stubs: HashMap<String, Arc<Stub>>,
    globals: HashMap<String, Value>,
    interceptors: HashMap<String, FunctionInterceptor>,
}

/// A scoped sandbox holding one test's doubles and interceptors.
#[derive(Debug)]
pub struct IsolationContext {
    id: ContextId,
    test_name: String,
    active: AtomicBool,
    state: RwLock<ContextState>,
}

impl IsolationContext {
    fn new(id: ContextId, test_name: &str) -> Self {
        Self {
            id,
            test_name: test_name.to_string(),
            active: AtomicBool::new(false),
            state: RwLock::new(ContextState::default()),
        }
    }

    pub fn id(&self) -> &ContextId {
        &self.id
    }

    pub fn test_name(&self) -> &str {
        &self.test_name
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    // The flag flips under the state lock so `intercept` observes a consistent value.
    fn set_active(&self, active: bool) {
        let mut state = write(&self.state);
        self.active.store(active, Ordering::SeqCst);
        for interceptor in state.interceptors.values_mut() {
            interceptor.enabled = active;
        }
    }

    pub fn create_mock(&self, name: &str) -> Arc<Mock> {
        let mock = Arc::new(Mock::new(name));
        write(&self.state).mocks.insert(name.to_string(), Arc::clone(&mock));
        mock
    }

    pub fn create_spy(&self, name: &str, original: Option<Delegate>) -> Arc<Spy> {
        let spy = Arc::new(Spy::new(name, original));
        write(&self.state).spies.insert(name.to_string(), Arc::clone(&spy));
        spy
    }

    pub fn create_stub(&self, name: &str) -> Arc<Stub> {
        let stub = Arc::new(Stub::new(name));
        write(&self.state).stubs.insert(name.to_string(), Arc::clone(&stub));
        stub
    }

    pub fn mock(&self, name: &str) -> Option<Arc<Mock>> {
        read(&self.state).mocks.get(name).cloned()
    }

    pub fn spy(&self, name: &str) -> Option<Arc<Spy>> {
        read(&self.state).spies.get(name).cloned()
    }

    pub fn stub(&self, name: &str) -> Option<Arc<Stub>> {
        read(&self.state).stubs.get(name).cloned()
    }

    /// Set a variable in the context's private global store.
    pub fn set_global(&self, name: &str, value: Value) {
        write(&self.state).globals.insert(name.to_string(), value);
    }

    pub fn global(&self, name: &str) -> Option<Value> {
        read(&self.state).globals.get(name).cloned()
    }

    /// Register an interceptor for `name`. It starts enabled iff this context is active.
    pub fn intercept(&self, name: &str, original: Option<Delegate>, interceptor: Delegate) {
        let mut state = write(&self.state);
        let enabled = self.is_active();
        state.interceptors.insert(
            name.to_string(),
            FunctionInterceptor {
                original,
                interceptor,
                enabled,
            },
        );
    }

    pub fn remove_interceptor(&self, name: &str) -> bool {
        write(&self.state).interceptors.remove(name).is_some()
    }

    pub fn interceptor(&self, name: &str) -> Option<FunctionInterceptor> {
        read(&self.state).interceptors.get(name).cloned()
    }

    /// Call `name` through its interceptor.
    ///
    /// Returns `None` when no interceptor exists or it is disabled, so the caller falls through to the real
    /// function.
    pub fn call_intercepted(&self, name: &str, args: &[Value]) -> Option<CallResult> {
        let interceptor = {
            let state = read(&self.state);
            match state.interceptors.get(name) {
                Some(i) if i.enabled => Arc::clone(&i.interceptor),
                _ => return None,
            }
        };
        Some(CallResult::from(interceptor(args)))
    }

    /// Reset every double and clear the global store.
    pub fn reset(&self) {
        let mut state = write(&self.state);
        for mock in state.mocks.values() {
            mock.reset();
        }
        for spy in state.spies.values() {
            spy.reset();
        }
        for stub in state.stubs.values() {
            stub.reset();
        }
        state.globals.clear();
    }

    /// Verify every mock owned by this context (sorted by name).
    pub fn verify(&self) -> Result<(), IsolationError> {
        let state = read(&self.state);
        let mut names: Vec<&String> = state.mocks.keys().collect();
        names.sort();
        for name in names {
            state.mocks[name].verify().map_err(|source| IsolationError::Verification {
                context: self.id.clone(),
                mock: name.clone(),
                source,
            })?;
        }
        Ok(())
    }

    fn release(&self) {
        let mut state = write(&self.state);
        self.active.store(false, Ordering::SeqCst);
        for interceptor in state.interceptors.values_mut() {
            interceptor.enabled = false;
        }
        state.mocks.clear();
        state.spies.clear();
        state.stubs.clear();
    }
}

/// Owns isolation contexts and enforces exclusive activation.
#[derive(Debug, Default)]
pub struct IsolationManager {
    contexts: RwLock<HashMap<ContextId, Arc<IsolationContext>>>,
    next_seq: AtomicU64,
}

impl IsolationManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate an inactive context with empty tables.
    pub fn create_context(&self, test_name: &str) -> Arc<IsolationContext> {
        let seq = self.next_seq.fetch_add(1, Ordering::SeqCst);
        let id = ContextId(format!("test_{test_name}_{seq}"));
        let context = Arc::new(IsolationContext::new(id.clone(), test_name));
        write(&self.contexts).insert(id, Arc::clone(&context));
        context
    }

    pub fn context(&self, id: &ContextId) -> Option<Arc<IsolationContext>> {
        read(&self.contexts).get(id).cloned()
    }

    /// Make `id` the only active context, enabling its interceptors.
    pub fn activate(&self, id: &ContextId) -> Result<(), IsolationError> {
        let contexts = write(&self.contexts);
        let target = contexts
            .get(id)
            .ok_or_else(|| IsolationError::ContextNotFound(id.clone()))?;
        for context in contexts.values() {
            if context.id != *id {
                context.set_active(false);
            }
        }
        target.set_active(true);
        tracing::debug!(context = %id, "activated isolation context");
        Ok(())
    }

    /// Clear the active flag and disable interceptors without removing them.
    pub fn deactivate(&self, id: &ContextId) -> Result<(), IsolationError> {
        let contexts = write(&self.contexts);
        let target = contexts
            .get(id)
            .ok_or_else(|| IsolationError::ContextNotFound(id.clone()))?;
        target.set_active(false);
        Ok(())
    }

    /// Release the context's doubles, disable its interceptors and forget it.
    ///
    /// Safe on contexts that were never activated; returns `false` when `id` is unknown.
    pub fn cleanup(&self, id: &ContextId) -> bool {
        let removed = write(&self.contexts).remove(id);
        match removed {
            Some(context) => {
                context.release();
                tracing::debug!(context = %id, "cleaned up isolation context");
                true
            }
            None => false,
        }
    }

    pub fn active_context(&self) -> Option<Arc<IsolationContext>> {
        read(&self.contexts).values().find(|c| c.is_active()).cloned()
    }

    pub fn call_intercepted(
        &self,
        id: &ContextId,
        name: &str,
        args: &[Value],
    ) -> Result<Option<CallResult>, IsolationError> {
        let context = self.context(id).ok_or_else(|| IsolationError::ContextNotFound(id.clone()))?;
        Ok(context.call_intercepted(name, args))
    }

    pub fn len(&self) -> usize {
        read(&self.contexts).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Run `body` in a fresh, active context.
    ///
    /// The context is cleaned up on every exit path, including a panicking body. Mocks are verified only when the
    /// body itself succeeded; the first failure is returned.
    pub fn run_isolated<F, E>(&self, test_name: &str, body: F) -> Result<(), E>
    where
        F: FnOnce(&IsolationContext) -> Result<(), E>,
        E: From<IsolationError>,
    {
        let context = self.create_context(test_name);
        let _guard = CleanupGuard {
            manager: self,
            id: context.id().clone(),
        };
        self.activate(context.id())?;
        body(&context)?;
        context.verify()?;
        Ok(())
    }
}

struct CleanupGuard<'a> {
    manager: &'a IsolationManager,
    id: ContextId,
}

impl Drop for CleanupGuard<'_> {
    fn drop(&mut self) {
        self.manager.cleanup(&self.id);
    }
}

/// [`IsolationManager::run_isolated`] on a throwaway manager.
pub fn run_in_isolation<F, E>(test_name: &str, body: F) -> Result<(), E>
where
    F: FnOnce(&IsolationContext) -> Result<(), E>,
    E: From<IsolationError>,
{
    IsolationManager::new().run_isolated(test_name, body)
}
