//! datapipes — run verb chains over JSON data
//!
//! # Usage
//!
//! ```bash
//! # Run a chain over a file
//! datapipes "append_col(x=3) >> head(2)" --input rows.json
//!
//! # Inline input, JSON output
//! datapipes "select(id) >> count" --json '[{"id": 1}, {"id": 2}]' --format json
//!
//! # Run a chain configured in datapipes.toml
//! datapipes run preview --input rows.json
//! ```

use std::collections::HashMap;
use std::io::Read;
use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use colored::*;
use datapipes::ast::Step;
use datapipes::config::{Config, OutputFormat};
use datapipes::prelude::*;
use datapipes::sources::{from_json, to_json};
use serde_json::Value;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "datapipes")]
#[command(author = "datapipes Contributors")]
#[command(version)]
#[command(about = "Pipe JSON data through verb chains", long_about = None)]
#[command(after_help = "EXAMPLES:
    datapipes 'append_col(x=3) >> head(2)' --input rows.json
    datapipes 'select(id, name)' --json '[{\"id\": 1, \"name\": \"a\"}]'
    datapipes explain 'append_col(x=3) >> count'")]
struct Cli {
    /// The chain to run
    chain: Option<String>,

    /// JSON input file ("-" for stdin)
    #[arg(short, long, global = true)]
    input: Option<PathBuf>,

    /// Inline JSON input
    #[arg(short, long, global = true, conflicts_with = "input")]
    json: Option<String>,

    /// Output format (overrides the config file)
    #[arg(short, long, value_enum, global = true)]
    format: Option<OutputFormat>,

    /// Config file path
    #[arg(long, env = "DATAPIPES_CONFIG")]
    config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse and explain a chain without running it
    Explain {
        /// The chain to explain
        chain: String,
    },
    /// List the available verbs
    Verbs,
    /// Run a chain from the config file by name
    Run {
        /// Name under [chains]
        name: String,
    },
}

fn main() {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::from_file(path),
        None => Config::load(),
    };
    let config = match config {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{} {}", "Error:".red().bold(), e);
            std::process::exit(1);
        }
    };

    init_tracing(&config, cli.verbose);
    let registry = datapipes::default_registry();

    let result = match &cli.command {
        Some(Commands::Explain { chain }) => explain_chain(&registry, chain),
        Some(Commands::Verbs) => {
            show_verbs(&registry);
            Ok(())
        }
        Some(Commands::Run { name }) => config
            .chain(name)
            .map_err(anyhow::Error::from)
            .and_then(|chain| run_chain(&registry, chain, &cli, &config)),
        None => match &cli.chain {
            Some(chain) => run_chain(&registry, chain, &cli, &config),
            None => {
                println!("{}", "datapipes — verb chains over JSON".cyan().bold());
                println!();
                println!("Usage: datapipes <CHAIN> [OPTIONS]");
                println!();
                println!("Try: datapipes --help");
                Ok(())
            }
        },
    };

    if let Err(e) = result {
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

fn init_tracing(config: &Config, verbose: bool) {
    let default = if verbose { "datapipes=debug" } else { config.log.level.as_str() };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run_chain(registry: &VerbRegistry, chain: &str, cli: &Cli, config: &Config) -> anyhow::Result<()> {
    if cli.verbose {
        eprintln!("{} {}", "Chain:".dimmed(), chain.yellow());
    }

    let pipeline = Pipeline::parse(registry, chain)?;
    let input = from_json(read_input(cli)?)?;
    if cli.verbose {
        eprintln!("{} {}", "Input type:".dimmed(), input.type_name().cyan());
    }

    let output = pipeline.run(&input)?;
    let format = cli.format.unwrap_or(config.output.format);
    format_output(&to_json(&output)?, format);
    Ok(())
}

fn read_input(cli: &Cli) -> anyhow::Result<Value> {
    if let Some(json) = &cli.json {
        return serde_json::from_str(json).context("Failed to parse --json input");
    }

    let content = match &cli.input {
        Some(path) if path.as_os_str() != "-" => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?,
        _ => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf)?;
            buf
        }
    };
    serde_json::from_str(&content).context("Failed to parse JSON input")
}

fn format_output(value: &Value, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(value).unwrap_or_default());
        }
        OutputFormat::Table => match as_table(value) {
            Some(table) => print_table(&table),
            None => match value {
                Value::Array(items) => {
                    for item in items {
                        println!("{}", val_to_string(item));
                    }
                }
                other => println!("{}", val_to_string(other)),
            },
        },
    }
}

fn as_table(value: &Value) -> Option<Table> {
    let object = value.as_object()?;
    if object.len() != 2 {
        return None;
    }
    serde_json::from_value(value.clone()).ok()
}

fn print_table(table: &Table) {
    if table.is_empty() {
        println!("{}", "(no rows)".dimmed());
        return;
    }

    let columns = table.columns();

    // Calculate column widths
    let mut widths: HashMap<&String, usize> = columns.iter().map(|c| (c, c.len())).collect();
    for row in table.rows() {
        for (col, val) in columns.iter().zip(row) {
            let len = val_to_string(val).len();
            if let Some(w) = widths.get_mut(col) {
                *w = (*w).max(len);
            }
        }
    }

    // Print header
    let header: Vec<String> = columns
        .iter()
        .map(|c| format!("{:width$}", c, width = widths[c]))
        .collect();
    println!("{}", header.join(" │ ").white().bold());

    // Print separator
    let sep: Vec<String> = columns.iter().map(|c| "─".repeat(widths[c])).collect();
    println!("{}", sep.join("─┼─").dimmed());

    // Print rows
    for row in table.rows() {
        let cells: Vec<String> = columns
            .iter()
            .zip(row)
            .map(|(c, val)| format!("{:width$}", val_to_string(val), width = widths[c]))
            .collect();
        println!("{}", cells.join(" │ "));
    }

    println!();
    println!("{} row(s)", table.len().to_string().cyan());
}

fn val_to_string(val: &Value) -> String {
    match val {
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.clone(),
        _ => val.to_string(),
    }
}

fn explain_chain(registry: &VerbRegistry, chain: &str) -> anyhow::Result<()> {
    println!("{}", "Chain Explanation".cyan().bold());
    println!();
    println!("{} {}", "Chain:".dimmed(), chain.yellow());
    println!();

    let parsed = datapipes::parse(chain)?;

    println!("{}", "Steps:".green().bold());
    for (i, step) in parsed.steps.iter().enumerate() {
        match step {
            Step::Verb(call) => {
                println!("  {} {}", format!("{}.", i + 1).dimmed(), call.name.cyan());
                for value in call.args.positional() {
                    println!("      {} {}", "arg".dimmed(), value.to_string().yellow());
                }
                for (name, value) in call.args.named() {
                    println!("      {} = {}", name.white(), value.to_string().yellow());
                }
                match registry.verb(&call.name) {
                    Some(verb) => println!(
                        "      {} {}",
                        "implemented for:".dimmed(),
                        verb.implemented_for().join(", ")
                    ),
                    None => println!("      {}", "unknown verb".red()),
                }
            }
            Step::Literal(value) => {
                println!(
                    "  {} {} {}",
                    format!("{}.", i + 1).dimmed(),
                    value.to_string().yellow(),
                    "(not a verb: cannot be piped into)".red()
                );
            }
        }
    }

    println!();
    println!("{}", "Canonical form:".green().bold());
    println!("  {}", parsed.to_string().white());
    Ok(())
}

fn show_verbs(registry: &VerbRegistry) {
    println!("{}", "Available Verbs".cyan().bold());
    println!();

    println!(
        "{:12} {:28} {}",
        "Verb".white().bold(),
        "Implemented for".white().bold(),
        "Description".white().bold()
    );
    println!("{}", "─".repeat(80).dimmed());

    for verb in registry.verbs() {
        println!(
            "{:12} {:28} {}",
            verb.name().cyan().bold(),
            verb.implemented_for().join(", ").yellow(),
            verb.doc().unwrap_or_default().dimmed()
        );
    }

    println!();
    let sources: Vec<String> = registry
        .pipesources()
        .iter()
        .map(|t| t.name().to_string())
        .collect();
    println!("{} {}", "Pipe sources:".dimmed(), sources.join(", "));
}
