//! Call arguments for memoized functions.
//!
//! Arguments are restricted to JSON-shaped values (primitives, sequences,
//! string-keyed mappings) plus lazy arguments: zero-argument closures that
//! are only evaluated when the wrapped function actually has to run.

use std::collections::BTreeMap;
use std::fmt;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::{MemoizeError, MemoizeResult};

/// Name contributed to the cache key by a lazy argument that has none.
pub const NAMELESS: &str = "__nameless__";

type Thunk = Box<dyn FnOnce() -> Value>;

/// A deferred argument, evaluated at most once.
pub struct LazyArg {
    name: Option<String>,
    thunk: Thunk,
}

impl LazyArg {
    pub fn named<T, F>(name: impl Into<String>, f: F) -> Self
    where
        T: Into<Value>,
        F: FnOnce() -> T + 'static,
    {
        Self {
            name: Some(name.into()),
            thunk: Box::new(move || f().into()),
        }
    }

    pub fn nameless<T, F>(f: F) -> Self
    where
        T: Into<Value>,
        F: FnOnce() -> T + 'static,
    {
        Self {
            name: None,
            thunk: Box::new(move || f().into()),
        }
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Name used in key derivation.
    pub fn key_name(&self) -> &str {
        self.name.as_deref().unwrap_or(NAMELESS)
    }

    /// Run the deferred computation.
    pub fn evaluate(self) -> Value {
        (self.thunk)()
    }
}

impl fmt::Debug for LazyArg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LazyArg")
            .field("name", &self.key_name())
            .finish_non_exhaustive()
    }
}

/// One positional or keyword argument.
#[derive(Debug)]
pub enum Arg {
    Value(Value),
    Lazy(LazyArg),
}

impl Arg {
    pub fn is_lazy(&self) -> bool {
        matches!(self, Arg::Lazy(_))
    }

    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Arg::Value(v) => Some(v),
            Arg::Lazy(_) => None,
        }
    }

    /// The value, evaluating a lazy argument if needed.
    pub fn into_value(self) -> Value {
        match self {
            Arg::Value(v) => v,
            Arg::Lazy(lazy) => lazy.evaluate(),
        }
    }

    fn normalized(&self) -> Value {
        match self {
            Arg::Value(v) => v.clone(),
            Arg::Lazy(lazy) => Value::String(lazy.key_name().to_string()),
        }
    }

    fn resolved(self) -> Arg {
        match self {
            Arg::Lazy(lazy) => Arg::Value(lazy.evaluate()),
            value => value,
        }
    }

    fn decode<T: DeserializeOwned>(&self, what: &str) -> MemoizeResult<T> {
        match self {
            Arg::Value(v) => {
                serde_json::from_value(v.clone()).map_err(|e| MemoizeError::Argument {
                    message: format!("{} has an unexpected shape: {}", what, e),
                })
            }
            Arg::Lazy(lazy) => Err(MemoizeError::Argument {
                message: format!(
                    "{} is an unevaluated lazy argument ({})",
                    what,
                    lazy.key_name()
                ),
            }),
        }
    }
}

impl From<Value> for Arg {
    fn from(value: Value) -> Self {
        Arg::Value(value)
    }
}

impl From<LazyArg> for Arg {
    fn from(lazy: LazyArg) -> Self {
        Arg::Lazy(lazy)
    }
}

/// Positional and keyword arguments of one call.
#[derive(Debug, Default)]
pub struct Args {
    positional: Vec<Arg>,
    keyword: BTreeMap<String, Arg>,
}

impl Args {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(mut self, value: impl Into<Value>) -> Self {
        self.positional.push(Arg::Value(value.into()));
        self
    }

    pub fn push_serialized<T: Serialize>(self, value: &T) -> MemoizeResult<Self> {
        let value = serde_json::to_value(value)?;
        Ok(self.push(value))
    }

    pub fn push_lazy<T, F>(mut self, name: impl Into<String>, f: F) -> Self
    where
        T: Into<Value>,
        F: FnOnce() -> T + 'static,
    {
        self.positional.push(Arg::Lazy(LazyArg::named(name, f)));
        self
    }

    pub fn push_nameless_lazy<T, F>(mut self, f: F) -> Self
    where
        T: Into<Value>,
        F: FnOnce() -> T + 'static,
    {
        self.positional.push(Arg::Lazy(LazyArg::nameless(f)));
        self
    }

    /// Set a keyword argument, replacing any previous one with that name.
    pub fn kwarg(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.keyword.insert(name.into(), Arg::Value(value.into()));
        self
    }

    pub fn kwarg_serialized<T: Serialize>(
        self,
        name: impl Into<String>,
        value: &T,
    ) -> MemoizeResult<Self> {
        let value = serde_json::to_value(value)?;
        Ok(self.kwarg(name, value))
    }

    pub fn kwarg_lazy<T, F>(
        mut self,
        name: impl Into<String>,
        lazy_name: impl Into<String>,
        f: F,
    ) -> Self
    where
        T: Into<Value>,
        F: FnOnce() -> T + 'static,
    {
        self.keyword
            .insert(name.into(), Arg::Lazy(LazyArg::named(lazy_name, f)));
        self
    }

    pub fn kwarg_nameless_lazy<T, F>(mut self, name: impl Into<String>, f: F) -> Self
    where
        T: Into<Value>,
        F: FnOnce() -> T + 'static,
    {
        self.keyword
            .insert(name.into(), Arg::Lazy(LazyArg::nameless(f)));
        self
    }

    pub fn get(&self, index: usize) -> Option<&Arg> {
        self.positional.get(index)
    }

    pub fn get_kw(&self, name: &str) -> Option<&Arg> {
        self.keyword.get(name)
    }

    /// Decode positional argument `index`.
    pub fn value<T: DeserializeOwned>(&self, index: usize) -> MemoizeResult<T> {
        let what = format!("positional argument {}", index);
        self.get(index)
            .ok_or_else(|| MemoizeError::Argument {
                message: format!("{} is missing", what),
            })?
            .decode(&what)
    }

    /// Decode keyword argument `name`.
    pub fn kw_value<T: DeserializeOwned>(&self, name: &str) -> MemoizeResult<T> {
        let what = format!("keyword argument {:?}", name);
        self.get_kw(name)
            .ok_or_else(|| MemoizeError::Argument {
                message: format!("{} is missing", what),
            })?
            .decode(&what)
    }

    pub fn positional(&self) -> &[Arg] {
        &self.positional
    }

    pub fn keyword(&self) -> &BTreeMap<String, Arg> {
        &self.keyword
    }

    /// Total number of positional and keyword arguments.
    pub fn len(&self) -> usize {
        self.positional.len() + self.keyword.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positional.is_empty() && self.keyword.is_empty()
    }

    pub fn has_lazy(&self) -> bool {
        self.positional.iter().any(Arg::is_lazy) || self.keyword.values().any(Arg::is_lazy)
    }

    /// Key-derivation form: lazy arguments replaced by their names.
    pub fn normalized(&self) -> (Vec<Value>, Map<String, Value>) {
        let positional = self.positional.iter().map(Arg::normalized).collect();
        let keyword = self
            .keyword
            .iter()
            .map(|(k, v)| (k.clone(), v.normalized()))
            .collect();
        (positional, keyword)
    }

    /// Evaluate every lazy argument once; values pass through unchanged.
    pub fn resolve_lazy(self) -> Self {
        Self {
            positional: self.positional.into_iter().map(Arg::resolved).collect(),
            keyword: self
                .keyword
                .into_iter()
                .map(|(k, v)| (k, v.resolved()))
                .collect(),
        }
    }
}

impl FromIterator<Value> for Args {
    fn from_iter<I: IntoIterator<Item = Value>>(iter: I) -> Self {
        Self {
            positional: iter.into_iter().map(Arg::Value).collect(),
            keyword: BTreeMap::new(),
        }
    }
}
