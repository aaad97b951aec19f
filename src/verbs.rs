//! A small set of ready-made verbs over the built-in sources.
//!
//! Implementations follow the `verb_type` naming convention and never touch
//! their input: each returns a fresh value.

use serde_json::Value;

use crate::args::Args;
use crate::error::{PipeError, PipeResult};
use crate::registry::VerbRegistry;
use crate::sources::{List, Record, Table};

/// Declare and register every built-in verb on `registry`.
pub fn install_verbs(registry: &VerbRegistry) {
    registry
        .declare_unsupported(
            "append_col",
            Some("append_col(x=1, name='x'): add a constant column to a table, or append x to a list or string."),
        )
        .register::<Table, Table, _>(append_col_table)
        .register::<List, List, _>(append_col_list)
        .register::<String, String, _>(append_col_string);

    registry
        .declare_unsupported("head", Some("head(n=5): keep the first n rows, elements or characters."))
        .register::<Table, Table, _>(head_table)
        .register::<List, List, _>(head_list)
        .register::<String, String, _>(head_string);

    registry
        .declare_unsupported("select", Some("select(*columns): keep only the named columns or keys."))
        .register::<Table, Table, _>(select_table)
        .register::<Record, Record, _>(select_record);

    registry
        .declare_unsupported("count", Some("count(): number of rows, elements, keys or characters."))
        .register::<Table, i64, _>(|t, _| Ok(t.len() as i64))
        .register::<List, i64, _>(|l, _| Ok(l.len() as i64))
        .register::<Record, i64, _>(|r, _| Ok(r.len() as i64))
        .register::<String, i64, _>(|s, _| Ok(s.chars().count() as i64));
}

fn append_col_table(input: &Table, args: &Args) -> PipeResult<Table> {
    let x = args.get(0, "x").cloned().unwrap_or(Value::from(1));
    let name: String = args.get_or("append_col", 1, "name", "x".to_string())?;
    Ok(input.with_column(&name, &x))
}

fn append_col_list(input: &List, args: &Args) -> PipeResult<List> {
    let x = args.get(0, "x").cloned().unwrap_or(Value::from(1));
    let mut out = input.clone();
    out.push(x);
    Ok(out)
}

fn append_col_string(input: &String, args: &Args) -> PipeResult<String> {
    let x = match args.get(0, "x") {
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
        None => "1".to_string(),
    };
    Ok(format!("{}{}", input, x))
}

fn head_n(args: &Args) -> PipeResult<usize> {
    args.get_or("head", 0, "n", 5)
}

fn head_table(input: &Table, args: &Args) -> PipeResult<Table> {
    Ok(input.head(head_n(args)?))
}

fn head_list(input: &List, args: &Args) -> PipeResult<List> {
    let n = head_n(args)?;
    Ok(input.iter().take(n).cloned().collect())
}

fn head_string(input: &String, args: &Args) -> PipeResult<String> {
    let n = head_n(args)?;
    Ok(input.chars().take(n).collect())
}

/// Column names from the variadic positional arguments.
fn column_names(verb: &str, args: &Args) -> PipeResult<Vec<String>> {
    args.rest(0)
        .iter()
        .map(|v| match v {
            Value::String(s) => Ok(s.clone()),
            other => Err(PipeError::argument(
                verb,
                format!("column names must be strings, got {}", other),
            )),
        })
        .collect()
}

fn select_table(input: &Table, args: &Args) -> PipeResult<Table> {
    input.select(&column_names("select", args)?)
}

fn select_record(input: &Record, args: &Args) -> PipeResult<Record> {
    let mut out = Record::new();
    for name in column_names("select", args)? {
        let value = input
            .get(&name)
            .ok_or_else(|| anyhow::anyhow!("no key named '{}'", name))?;
        out.insert(name, value.clone());
    }
    Ok(out)
}
