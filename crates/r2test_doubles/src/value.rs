//! Dynamic values exchanged with doubles.
//!
//! Script code under test is opaque to the engine, so arguments and return values travel as a small tagged
//! union. Matching (`was_called_with`, expectation lookups) is defined purely as equality over [`Value`].

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// A script-level value.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    #[default]
    Nil,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
}

impl Value {
    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }

    /// Script truthiness: `nil`, `false`, zero and empty containers are falsy.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Nil => false,
            Value::Bool(b) => *b,
            Value::Int(n) => *n != 0,
            Value::Float(f) => *f != 0.0,
            Value::Str(s) => !s.is_empty(),
            Value::List(items) => !items.is_empty(),
            Value::Map(entries) => !entries.is_empty(),
        }
    }

    /// Length of a string (in chars), list or map.
    pub fn len(&self) -> Option<usize> {
        match self {
            Value::Str(s) => Some(s.chars().count()),
            Value::List(items) => Some(items.len()),
            Value::Map(entries) => Some(entries.len()),
            _ => None,
        }
    }

    /// Numeric view used by ordering assertions.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(n) => Some(*n as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Nil => "nil",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "string",
            Value::List(_) => "list",
            Value::Map(_) => "map",
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => write!(f, "nil"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(n) => write!(f, "{n}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::Str(s) => write!(f, "{s:?}"),
            Value::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
            Value::Map(entries) => {
                write!(f, "{{")?;
                for (i, (key, value)) in entries.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{key:?}: {value}")?;
                }
                write!(f, "}}")
            }
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Int(i64::from(n))
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::List(items.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(opt: Option<T>) -> Self {
        opt.map_or(Value::Nil, Into::into)
    }
}

/// Render an argument list as `[a, b, c]` for diagnostics.
pub fn display_args(args: &[Value]) -> String {
    let parts: Vec<String> = args.iter().map(ToString::to_string).collect();
    format!("[{}]", parts.join(", "))
}

/// An error raised by script code, or configured on a double to be "raised" on call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
#[error("{message}")]
pub struct ScriptError {
    pub message: String,
}

impl ScriptError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Typed call-through signature for original functions and interceptors.
pub type Delegate = Arc<dyn Fn(&[Value]) -> Result<Vec<Value>, ScriptError> + Send + Sync>;

/// Computes return values from actual arguments (expectation callbacks, stub fakes).
pub type Callback = Arc<dyn Fn(&[Value]) -> Vec<Value> + Send + Sync>;

/// Wrap a closure as a [`Delegate`].
pub fn delegate<F>(f: F) -> Delegate
where
    F: Fn(&[Value]) -> Result<Vec<Value>, ScriptError> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Wrap a closure as a [`Callback`].
pub fn callback<F>(f: F) -> Callback
where
    F: Fn(&[Value]) -> Vec<Value> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Outcome of invoking a double: the configured error travels alongside the values.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CallResult {
    pub values: Vec<Value>,
    pub error: Option<ScriptError>,
}

impl CallResult {
    pub fn new(values: Vec<Value>, error: Option<ScriptError>) -> Self {
        Self { values, error }
    }

    /// Collapse into a `Result`, discarding the values when an error was configured.
    pub fn into_result(self) -> Result<Vec<Value>, ScriptError> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(self.values),
        }
    }

    /// First returned value, or `nil`.
    pub fn first(&self) -> Value {
        self.values.first().cloned().unwrap_or_default()
    }
}

impl From<Result<Vec<Value>, ScriptError>> for CallResult {
    fn from(res: Result<Vec<Value>, ScriptError>) -> Self {
        match res {
            Ok(values) => CallResult::new(values, None),
            Err(err) => CallResult::new(Vec::new(), Some(err)),
        }
    }
}

/// One recorded invocation, kept regardless of outcome.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Call {
    pub function: String,
    pub args: Vec<Value>,
    pub return_values: Vec<Value>,
    pub error: Option<ScriptError>,
}

impl Call {
    pub(crate) fn record(function: &str, args: &[Value], result: &CallResult) -> Self {
        Self {
            function: function.to_string(),
            args: args.to_vec(),
            return_values: result.values.clone(),
            error: result.error.clone(),
        }
    }
}

/// Build a `Vec<Value>` from heterogeneous literals.
///
/// ```
/// use r2test_doubles::{values, Value};
/// assert_eq!(values![1, "a"], vec![Value::Int(1), Value::Str("a".into())]);
/// ```
#[macro_export]
macro_rules! values {
    () => { ::std::vec::Vec::<$crate::Value>::new() };
    ($($v:expr),+ $(,)?) => { vec![$($crate::Value::from($v)),+] };
}
