//! # datapipes
//!
//! > **Write the verb once. Pipe anything into it.**
//!
//! Chain data transformations left to right with `>>`, and let the same
//! verb name work on tables, lists, records, strings or your own types.
//!
//! ## Quick Example
//!
//! ```
//! use datapipes::prelude::*;
//! use serde_json::json;
//!
//! let registry = VerbRegistry::new();
//! install_sources(&registry);
//! install_verbs(&registry);
//!
//! let append_col = registry.lookup("append_col")?;
//! let head = registry.lookup("head")?;
//!
//! let table = Data::new(Table::from_rows(["a"], vec![vec![json!(1)], vec![json!(2)]])?);
//! let out = (&table >> append_col.call(args![x = 3]) >> head.call(args![1])).into_result()?;
//!
//! let out = out.downcast::<Table>().unwrap();
//! assert_eq!(out.columns(), &["a", "x"]);
//! assert_eq!(out.rows(), &[vec![json!(1), json!(3)]]);
//! # Ok::<(), PipeError>(())
//! ```
//!
//! ## Pieces
//!
//! | Piece                 | Role                                            |
//! |-----------------------|-------------------------------------------------|
//! | [`VerbRegistry`]      | verb name + input type -> implementation        |
//! | [`Verb::call`]        | capture arguments into a deferred [`Pipe`]      |
//! | `data >> pipe`        | apply the pipe to a pipe-source value           |
//! | [`Verb::apply`]       | direct form, runs immediately                   |
//! | [`Pipeline`]          | a textual chain compiled against a registry     |
//!
//! Verbs get their input by shared reference and always return a new value.
//!
//! [`VerbRegistry`]: registry::VerbRegistry
//! [`Verb::call`]: registry::Verb::call
//! [`Verb::apply`]: registry::Verb::apply
//! [`Pipe`]: pipe::Pipe
//! [`Pipeline`]: engine::Pipeline

pub mod args;
pub mod ast;
pub mod config;
pub mod engine;
pub mod error;
pub mod parser;
pub mod pipe;
pub mod registry;
pub mod sources;
pub mod value;
pub mod verbs;

pub mod prelude {
    pub use crate::args;
    pub use crate::args::Args;
    pub use crate::engine::Pipeline;
    pub use crate::error::*;
    pub use crate::pipe::{Flow, Pipe, PipeFn};
    pub use crate::registry::{Verb, VerbRegistry};
    pub use crate::sources::{install_sources, List, Record, Table};
    pub use crate::value::{Data, TypeTag};
    pub use crate::verbs::install_verbs;
}

/// Parse a chain expression into its AST.
///
/// # Example
///
/// ```
/// use datapipes::parse;
///
/// let chain = parse("append_col(x=3) >> head(2)").unwrap();
/// assert_eq!(chain.steps.len(), 2);
/// ```
pub fn parse(input: &str) -> Result<ast::Chain, error::PipeError> {
    parser::parse(input)
}

/// A registry with every built-in source and verb installed.
pub fn default_registry() -> registry::VerbRegistry {
    let registry = registry::VerbRegistry::new();
    sources::install_sources(&registry);
    verbs::install_verbs(&registry);
    registry
}
