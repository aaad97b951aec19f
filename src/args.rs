//! Secondary arguments captured by a verb call.
//!
//! Positional values keep their call order; named values are bound by
//! keyword. Lookups follow keyword-or-position binding: a verb parameter
//! `x` at position 0 is found either as `x=...` or as the first positional.

use std::collections::BTreeMap;
use std::fmt;

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{PipeError, PipeResult};

/// Build [`Args`] from literals.
///
/// ```
/// use datapipes::args;
///
/// let a = args![2; y = 4];
/// assert_eq!(a.positional().len(), 1);
/// assert_eq!(a.named().len(), 1);
/// ```
#[macro_export]
macro_rules! args {
    () => {
        $crate::args::Args::new()
    };
    ($($key:ident = $val:expr),+ $(,)?) => {
        $crate::args::Args::new()$(.kwarg(stringify!($key), $val))+
    };
    ($($pos:expr),+ ; $($key:ident = $val:expr),+ $(,)?) => {
        $crate::args::Args::new()$(.arg($pos))+$(.kwarg(stringify!($key), $val))+
    };
    ($($pos:expr),+ $(,)?) => {
        $crate::args::Args::new()$(.arg($pos))+
    };
}

/// Positional and named arguments, as JSON values.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Args {
    positional: Vec<Value>,
    named: BTreeMap<String, Value>,
}

impl Args {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a positional argument.
    pub fn arg(mut self, value: impl Into<Value>) -> Self {
        self.positional.push(value.into());
        self
    }

    /// Set a named argument, replacing an earlier one with the same name.
    pub fn kwarg(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.named.insert(name.into(), value.into());
        self
    }

    pub fn positional(&self) -> &[Value] {
        &self.positional
    }

    pub fn named(&self) -> &BTreeMap<String, Value> {
        &self.named
    }

    pub fn is_empty(&self) -> bool {
        self.positional.is_empty() && self.named.is_empty()
    }

    /// The argument bound to the parameter `name` at `position`.
    pub fn get(&self, position: usize, name: &str) -> Option<&Value> {
        self.named
            .get(name)
            .or_else(|| self.positional.get(position))
    }

    /// Bind a parameter, falling back to `default` when it was not supplied.
    pub fn get_or<T: DeserializeOwned>(
        &self,
        verb: &str,
        position: usize,
        name: &str,
        default: T,
    ) -> PipeResult<T> {
        match self.get(position, name) {
            Some(value) => decode(verb, name, value),
            None => Ok(default),
        }
    }

    /// Bind a parameter that has no default.
    pub fn require<T: DeserializeOwned>(
        &self,
        verb: &str,
        position: usize,
        name: &str,
    ) -> PipeResult<T> {
        let value = self
            .get(position, name)
            .ok_or_else(|| PipeError::argument(verb, format!("missing argument '{}'", name)))?;
        decode(verb, name, value)
    }

    /// Positional arguments from `from` onwards, for variadic parameters.
    pub fn rest(&self, from: usize) -> &[Value] {
        self.positional.get(from..).unwrap_or_default()
    }
}

fn decode<T: DeserializeOwned>(verb: &str, name: &str, value: &Value) -> PipeResult<T> {
    serde_json::from_value(value.clone())
        .map_err(|e| PipeError::argument(verb, format!("argument '{}': {}", name, e)))
}

impl fmt::Display for Args {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let positional = self.positional.iter().map(render_value);
        let named = self
            .named
            .iter()
            .map(|(k, v)| format!("{}={}", k, render_value(v)));
        let parts: Vec<String> = positional.chain(named).collect();
        f.write_str(&parts.join(", "))
    }
}

/// Render a value the way the chain language reads it back.
pub(crate) fn render_value(value: &Value) -> String {
    match value {
        Value::String(s) => quote(s),
        Value::Array(items) => {
            let items: Vec<String> = items.iter().map(render_value).collect();
            format!("[{}]", items.join(", "))
        }
        other => other.to_string(),
    }
}

/// Single-quote `s`, backslash-escaping what the parser unescapes.
fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('\'');
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            c => out.push(c),
        }
    }
    out.push('\'');
    out
}
