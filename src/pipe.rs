//! Deferred verb calls and the `>>` chaining operator.
//!
//! ```
//! use datapipes::prelude::*;
//!
//! let registry = VerbRegistry::new();
//! registry.make_pipesource::<Vec<i64>>();
//! let push = registry.register::<Vec<i64>, Vec<i64>, _>("push", |v, args| {
//!     let mut out = v.clone();
//!     out.push(args.get_or("push", 0, "x", 1)?);
//!     Ok(out)
//! });
//!
//! let out = (Data::new(vec![1i64]) >> push.call(args![2]) >> push.call(args![]))
//!     .into_result()?;
//! assert_eq!(out.downcast::<Vec<i64>>().unwrap(), vec![1, 2, 1]);
//! # Ok::<(), PipeError>(())
//! ```

use std::fmt;
use std::ops::Shr;
use std::sync::Arc;

use tracing::debug;

use crate::args::Args;
use crate::error::{PipeError, PipeResult};
use crate::registry::{Fallback, Verb, VerbRegistry};
use crate::value::Data;

/// A plain function usable as a pipe step, without a dispatch table.
///
/// The function sees every input as-is. Which inputs may be piped into it
/// is still decided by the registry it was created for.
#[derive(Clone)]
pub struct PipeFn {
    name: String,
    body: Fallback,
    registry: VerbRegistry,
}

impl PipeFn {
    pub fn new<F>(registry: &VerbRegistry, name: &str, body: F) -> Self
    where
        F: Fn(&Data, &Args) -> PipeResult<Data> + Send + Sync + 'static,
    {
        Self {
            name: name.to_string(),
            body: Arc::new(body),
            registry: registry.clone(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Capture `args` into a deferred call.
    pub fn call(&self, args: Args) -> Pipe {
        Pipe {
            step: Target::Func(self.clone()),
            args,
        }
    }

    /// Run the function on `input` right away.
    pub fn apply(&self, input: &Data, args: &Args) -> PipeResult<Data> {
        (self.body)(input, args)
    }
}

impl fmt::Debug for PipeFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipeFn").field("name", &self.name).finish()
    }
}

#[derive(Debug, Clone)]
enum Target {
    Verb(Verb),
    Func(PipeFn),
}

/// A verb awaiting its primary input.
///
/// Immutable once built. Applying it again runs the verb again; nothing is
/// memoized.
#[derive(Debug, Clone)]
pub struct Pipe {
    step: Target,
    args: Args,
}

impl Pipe {
    pub(crate) fn new(verb: Verb, args: Args) -> Self {
        Self {
            step: Target::Verb(verb),
            args,
        }
    }

    /// A one-off step running `body`, as [`PipeFn::call`] does.
    pub fn from_fn<F>(registry: &VerbRegistry, name: &str, body: F, args: Args) -> Self
    where
        F: Fn(&Data, &Args) -> PipeResult<Data> + Send + Sync + 'static,
    {
        PipeFn::new(registry, name, body).call(args)
    }

    pub fn name(&self) -> &str {
        match &self.step {
            Target::Verb(verb) => verb.name(),
            Target::Func(func) => func.name(),
        }
    }

    /// The registry verb behind this pipe, if it is not a plain function.
    pub fn verb(&self) -> Option<&Verb> {
        match &self.step {
            Target::Verb(verb) => Some(verb),
            Target::Func(_) => None,
        }
    }

    pub fn args(&self) -> &Args {
        &self.args
    }

    /// Apply to `input`, as `input >> pipe` does.
    ///
    /// Fails with [`PipeError::InvalidPipeUsage`] if the input's type was
    /// never enabled as a pipe source, even when the verb has an
    /// implementation for it.
    pub fn apply(&self, input: &Data) -> PipeResult<Data> {
        let accepted = match &self.step {
            Target::Verb(verb) => verb.accepts_source(input.type_tag()),
            Target::Func(func) => func.registry.is_pipesource(input.type_tag()),
        };
        if !accepted {
            return Err(PipeError::invalid_usage(format!(
                "type {} is not enabled as pipe source",
                input.type_name()
            )));
        }
        debug!("{} >> {}", input.type_name(), self);
        match &self.step {
            Target::Verb(verb) => verb.apply(input, &self.args),
            Target::Func(func) => func.apply(input, &self.args),
        }
    }
}

impl fmt::Display for Pipe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.name(), self.args)
    }
}

/// The value threaded through a `>>` chain, or the error that stopped it.
#[derive(Debug)]
#[must_use = "a chain does nothing visible until its result is taken"]
pub struct Flow(PipeResult<Data>);

impl Flow {
    pub fn into_result(self) -> PipeResult<Data> {
        self.0
    }

    pub fn is_ok(&self) -> bool {
        self.0.is_ok()
    }

    fn then(self, pipe: &Pipe) -> Flow {
        match self.0 {
            Ok(data) => Flow(pipe.apply(&data)),
            Err(e) => Flow(Err(e)),
        }
    }
}

impl From<PipeResult<Data>> for Flow {
    fn from(result: PipeResult<Data>) -> Self {
        Flow(result)
    }
}

impl From<Flow> for PipeResult<Data> {
    fn from(flow: Flow) -> Self {
        flow.0
    }
}

impl Shr<Pipe> for Data {
    type Output = Flow;

    fn shr(self, pipe: Pipe) -> Flow {
        Flow(pipe.apply(&self))
    }
}

impl Shr<&Pipe> for Data {
    type Output = Flow;

    fn shr(self, pipe: &Pipe) -> Flow {
        Flow(pipe.apply(&self))
    }
}

impl Shr<&Pipe> for &Data {
    type Output = Flow;

    fn shr(self, pipe: &Pipe) -> Flow {
        Flow(pipe.apply(self))
    }
}

impl Shr<Pipe> for &Data {
    type Output = Flow;

    fn shr(self, pipe: Pipe) -> Flow {
        Flow(pipe.apply(self))
    }
}

impl Shr<Pipe> for Flow {
    type Output = Flow;

    fn shr(self, pipe: Pipe) -> Flow {
        self.then(&pipe)
    }
}

impl Shr<&Pipe> for Flow {
    type Output = Flow;

    fn shr(self, pipe: &Pipe) -> Flow {
        self.then(pipe)
    }
}
