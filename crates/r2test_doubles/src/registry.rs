//! Named registries of doubles.
//!
//! Each test run (or test file) constructs its own [`DoubleRegistry`] so state never leaks across runs.
//! [`DoubleRegistry::shared`] exists for simple callers that want one process-wide instance.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock, RwLock};

use crate::mock::{Mock, MockError};
use crate::spy::{Spy, Stub};
use crate::sync::{read, write};
use crate::value::Delegate;

/// Verification failure attributed to a registered mock.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("mock '{name}' verification failed: {source}")]
pub struct RegistryVerifyError {
    pub name: String,
    #[source]
    pub source: MockError,
}

/// Mocks by name.
#[derive(Debug, Default)]
pub struct MockRegistry {
    mocks: RwLock<HashMap<String, Arc<Mock>>>,
}

impl MockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create and register a mock, replacing any mock with the same name.
    pub fn create_mock(&self, name: &str) -> Arc<Mock> {
        let mock = Arc::new(Mock::new(name));
        write(&self.mocks).insert(name.to_string(), Arc::clone(&mock));
        mock
    }

    pub fn get_mock(&self, name: &str) -> Option<Arc<Mock>> {
        read(&self.mocks).get(name).cloned()
    }

    /// Verify every registered mock (sorted by name), returning the first failure.
    pub fn verify_all(&self) -> Result<(), RegistryVerifyError> {
        let mocks = read(&self.mocks);
        let mut names: Vec<&String> = mocks.keys().collect();
        names.sort();
        for name in names {
            mocks[name].verify().map_err(|source| RegistryVerifyError {
                name: name.clone(),
                source,
            })?;
        }
        Ok(())
    }

    pub fn reset_all(&self) {
        for mock in read(&self.mocks).values() {
            mock.reset();
        }
    }

    pub fn remove_all(&self) {
        write(&self.mocks).clear();
    }

    pub fn len(&self) -> usize {
        read(&self.mocks).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Spies and standalone stubs by name.
#[derive(Debug, Default)]
pub struct SpyRegistry {
    spies: RwLock<HashMap<String, Arc<Spy>>>,
    stubs: RwLock<HashMap<String, Arc<Stub>>>,
}

impl SpyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a spy on `name` and register it.
    pub fn spy_on(&self, name: &str, original: Option<Delegate>) -> Arc<Spy> {
        let spy = Arc::new(Spy::new(name, original));
        write(&self.spies).insert(name.to_string(), Arc::clone(&spy));
        spy
    }

    pub fn get_spy(&self, name: &str) -> Option<Arc<Spy>> {
        read(&self.spies).get(name).cloned()
    }

    /// Unregister a spy; returns whether one was registered.
    pub fn remove_spy(&self, name: &str) -> bool {
        write(&self.spies).remove(name).is_some()
    }

    pub fn create_stub(&self, name: &str) -> Arc<Stub> {
        let stub = Arc::new(Stub::new(name));
        write(&self.stubs).insert(name.to_string(), Arc::clone(&stub));
        stub
    }

    pub fn get_stub(&self, name: &str) -> Option<Arc<Stub>> {
        read(&self.stubs).get(name).cloned()
    }

    /// Reset every spy's log and every stub's call count.
    pub fn reset_all(&self) {
        for spy in read(&self.spies).values() {
            spy.reset();
        }
        for stub in read(&self.stubs).values() {
            stub.reset();
        }
    }

    /// Unregister all spies and stubs.
    pub fn restore_all(&self) {
        write(&self.spies).clear();
        write(&self.stubs).clear();
    }
}

/// Mock and spy registries owned by one test-run context.
#[derive(Debug, Default)]
pub struct DoubleRegistry {
    pub mocks: MockRegistry,
    pub spies: SpyRegistry,
}

impl DoubleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lazily-initialised process-wide registry.
    pub fn shared() -> &'static DoubleRegistry {
        static SHARED: OnceLock<DoubleRegistry> = OnceLock::new();
        SHARED.get_or_init(DoubleRegistry::new)
    }

    pub fn reset_all(&self) {
        self.mocks.reset_all();
        self.spies.reset_all();
    }

    pub fn restore_all(&self) {
        self.mocks.remove_all();
        self.spies.restore_all();
    }
}
