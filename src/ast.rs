//! Abstract syntax for textual chains.

use std::fmt;

use serde_json::Value;

use crate::args::{render_value, Args};

/// A parsed chain: `step >> step >> ...`.
#[derive(Debug, Clone, PartialEq)]
pub struct Chain {
    pub steps: Vec<Step>,
}

/// One right-hand operand of `>>`.
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    /// `name(args...)` or a bare `name`.
    Verb(VerbCall),
    /// A plain value. Parses, but is rejected when the chain is compiled.
    Literal(Value),
}

#[derive(Debug, Clone, PartialEq)]
pub struct VerbCall {
    pub name: String,
    pub args: Args,
}

impl fmt::Display for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let steps: Vec<String> = self.steps.iter().map(|s| s.to_string()).collect();
        f.write_str(&steps.join(" >> "))
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::Verb(call) => write!(f, "{}", call),
            Step::Literal(value) => f.write_str(&render_value(value)),
        }
    }
}

impl fmt::Display for VerbCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.name, self.args)
    }
}
