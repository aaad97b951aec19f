//! Execution of textual chains.
//!
//! A [`Pipeline`] is a parsed [`Chain`] whose verb names have been resolved
//! against a [`VerbRegistry`]. Running it threads a value through each step
//! in order, eagerly, exactly like writing `input >> a(..) >> b(..)` by hand.

use std::fmt;

use tracing::debug;

use crate::ast::{Chain, Step};
use crate::error::{PipeError, PipeResult};
use crate::parser;
use crate::pipe::Pipe;
use crate::registry::VerbRegistry;
use crate::value::Data;

/// A compiled chain of deferred verb calls.
#[derive(Debug, Clone)]
pub struct Pipeline {
    steps: Vec<Pipe>,
}

impl Pipeline {
    /// Resolve every step of `chain` against `registry`.
    ///
    /// Unknown verbs fail with [`PipeError::UnknownVerb`]; a literal in step
    /// position fails with [`PipeError::InvalidPipeUsage`].
    pub fn compile(registry: &VerbRegistry, chain: &Chain) -> PipeResult<Self> {
        let steps = chain
            .steps
            .iter()
            .map(|step| match step {
                Step::Verb(call) => Ok(registry.lookup(&call.name)?.call(call.args.clone())),
                Step::Literal(_) => Err(PipeError::invalid_usage(format!(
                    "right operand {} is not a verb call",
                    step
                ))),
            })
            .collect::<PipeResult<Vec<Pipe>>>()?;

        if steps.is_empty() {
            return Err(PipeError::invalid_usage("a pipeline needs at least one step"));
        }
        Ok(Self { steps })
    }

    /// Parse and compile a chain expression.
    ///
    /// # Example
    ///
    /// ```
    /// use datapipes::prelude::*;
    ///
    /// let registry = VerbRegistry::new();
    /// install_sources(&registry);
    /// install_verbs(&registry);
    ///
    /// let pipeline = Pipeline::parse(&registry, "append_col(7) >> count")?;
    /// let out = pipeline.run(&Data::new(vec![serde_json::json!(1)]))?;
    /// assert_eq!(out.downcast::<i64>().unwrap(), 2);
    /// # Ok::<(), PipeError>(())
    /// ```
    pub fn parse(registry: &VerbRegistry, text: &str) -> PipeResult<Self> {
        Self::compile(registry, &parser::parse(text)?)
    }

    pub fn steps(&self) -> &[Pipe] {
        &self.steps
    }

    /// Thread `input` through every step. `input` itself is left untouched.
    pub fn run(&self, input: &Data) -> PipeResult<Data> {
        let (first, rest) = self
            .steps
            .split_first()
            .ok_or_else(|| PipeError::invalid_usage("a pipeline needs at least one step"))?;

        debug!("Running {} on {}", self, input.type_name());
        let mut current = first.apply(input)?;
        for (i, step) in rest.iter().enumerate() {
            debug!("Step {}: {} on {}", i + 2, step, current.type_name());
            current = step.apply(&current)?;
        }
        Ok(current)
    }
}

impl fmt::Display for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let steps: Vec<String> = self.steps.iter().map(|s| s.to_string()).collect();
        f.write_str(&steps.join(" >> "))
    }
}
