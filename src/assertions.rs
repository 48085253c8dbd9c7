//! Assertion helpers for test bodies.
//!
//! Every helper returns `Result<(), AssertionError>` so bodies propagate failures with `?` instead of panicking.

use r2test_doubles::Value;

/// An assertion that did not hold.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{message}")]
pub struct AssertionError {
    pub message: String,
    pub expected: Option<Value>,
    pub actual: Option<Value>,
    pub test_name: String,
}

pub type AssertResult = Result<(), AssertionError>;

/// Assertion context bound to one test name.
#[derive(Debug, Clone)]
pub struct Assert {
    test_name: String,
}

impl Assert {
    pub fn new(test_name: impl Into<String>) -> Self {
        Self {
            test_name: test_name.into(),
        }
    }

    fn fail(&self, message: String, expected: Option<Value>, actual: Option<Value>) -> AssertResult {
        Err(AssertionError {
            message,
            expected,
            actual,
            test_name: self.test_name.clone(),
        })
    }

    pub fn equals(&self, actual: impl Into<Value>, expected: impl Into<Value>) -> AssertResult {
        let (actual, expected) = (actual.into(), expected.into());
        if actual == expected {
            return Ok(());
        }
        self.fail(
            format!("Expected {actual} to equal {expected}"),
            Some(expected),
            Some(actual),
        )
    }

    pub fn not_equals(&self, actual: impl Into<Value>, expected: impl Into<Value>) -> AssertResult {
        let (actual, expected) = (actual.into(), expected.into());
        if actual != expected {
            return Ok(());
        }
        self.fail(
            format!("Expected {actual} to not equal {expected}"),
            Some(expected),
            Some(actual),
        )
    }

    pub fn is_true(&self, actual: impl Into<Value>) -> AssertResult {
        let actual = actual.into();
        if actual.is_truthy() {
            return Ok(());
        }
        self.fail(format!("Expected {actual} to be true"), Some(Value::Bool(true)), Some(actual))
    }

    pub fn is_false(&self, actual: impl Into<Value>) -> AssertResult {
        let actual = actual.into();
        if !actual.is_truthy() {
            return Ok(());
        }
        self.fail(format!("Expected {actual} to be false"), Some(Value::Bool(false)), Some(actual))
    }

    pub fn is_nil(&self, actual: impl Into<Value>) -> AssertResult {
        let actual = actual.into();
        if actual.is_nil() {
            return Ok(());
        }
        self.fail(format!("Expected {actual} to be nil"), Some(Value::Nil), Some(actual))
    }

    pub fn not_nil(&self, actual: impl Into<Value>) -> AssertResult {
        if !actual.into().is_nil() {
            return Ok(());
        }
        self.fail("Expected value to not be nil".to_string(), None, Some(Value::Nil))
    }

    /// `haystack` is a string containing `needle`, or a list containing an equal element.
    pub fn contains(&self, haystack: impl Into<Value>, needle: impl Into<Value>) -> AssertResult {
        let (haystack, needle) = (haystack.into(), needle.into());
        if value_contains(&haystack, &needle) {
            return Ok(());
        }
        self.fail(
            format!("Expected {haystack} to contain {needle}"),
            Some(needle),
            Some(haystack),
        )
    }

    pub fn not_contains(&self, haystack: impl Into<Value>, needle: impl Into<Value>) -> AssertResult {
        let (haystack, needle) = (haystack.into(), needle.into());
        if !value_contains(&haystack, &needle) {
            return Ok(());
        }
        self.fail(
            format!("Expected {haystack} to not contain {needle}"),
            Some(needle),
            Some(haystack),
        )
    }

    pub fn has_length(&self, actual: impl Into<Value>, expected: usize) -> AssertResult {
        let actual = actual.into();
        match actual.len() {
            Some(len) if len == expected => Ok(()),
            Some(len) => self.fail(
                format!("Expected length {expected}, got {len}"),
                Some(Value::Int(expected as i64)),
                Some(Value::Int(len as i64)),
            ),
            None => self.fail(
                format!("Expected a value with a length, got {}", actual.type_name()),
                None,
                Some(actual),
            ),
        }
    }

    pub fn is_empty(&self, actual: impl Into<Value>) -> AssertResult {
        let actual = actual.into();
        if actual.len() == Some(0) {
            return Ok(());
        }
        self.fail(format!("Expected {actual} to be empty"), None, Some(actual))
    }

    pub fn not_empty(&self, actual: impl Into<Value>) -> AssertResult {
        let actual = actual.into();
        if actual.len().is_some_and(|len| len > 0) {
            return Ok(());
        }
        self.fail(format!("Expected {actual} to not be empty"), None, Some(actual))
    }

    pub fn greater_than(&self, actual: impl Into<Value>, bound: impl Into<Value>) -> AssertResult {
        self.compare(actual.into(), bound.into(), "greater than", |a, b| a > b)
    }

    pub fn less_than(&self, actual: impl Into<Value>, bound: impl Into<Value>) -> AssertResult {
        self.compare(actual.into(), bound.into(), "less than", |a, b| a < b)
    }

    fn compare(&self, actual: Value, bound: Value, relation: &str, holds: fn(f64, f64) -> bool) -> AssertResult {
        match (actual.as_f64(), bound.as_f64()) {
            (Some(a), Some(b)) if holds(a, b) => Ok(()),
            (Some(_), Some(_)) => self.fail(
                format!("Expected {actual} to be {relation} {bound}"),
                Some(bound),
                Some(actual),
            ),
            _ => self.fail(
                format!("Cannot compare {} with {}", actual.type_name(), bound.type_name()),
                Some(bound),
                Some(actual),
            ),
        }
    }

    /// `f` must return an error.
    pub fn throws<T, E>(&self, f: impl FnOnce() -> Result<T, E>) -> AssertResult {
        match f() {
            Err(_) => Ok(()),
            Ok(_) => self.fail("Expected function to return an error".to_string(), None, None),
        }
    }

    /// `f` must succeed.
    pub fn not_throws<T, E: std::fmt::Display>(&self, f: impl FnOnce() -> Result<T, E>) -> AssertResult {
        match f() {
            Ok(_) => Ok(()),
            Err(err) => self.fail(format!("Expected function not to fail, but got: {err}"), None, None),
        }
    }
}

fn value_contains(haystack: &Value, needle: &Value) -> bool {
    match (haystack, needle) {
        (Value::Str(h), Value::Str(n)) => h.contains(n.as_str()),
        (Value::List(items), _) => items.contains(needle),
        (Value::Map(entries), Value::Str(key)) => entries.contains_key(key),
        _ => false,
    }
}
