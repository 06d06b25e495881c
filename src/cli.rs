//! Command-line harness
//!
//! Parses `bankslight [--config FILE] <db> <command> [args...]` and runs the
//! command against a [`BankService`], returning the text to print.

use crate::charts::ChartKind;
use crate::core::db::Params;
use crate::core::Result;
use crate::customers::CustomerFilter;
use crate::service::BankService;
use std::fmt::Write;
use std::path::PathBuf;

pub const USAGE: &str = "\
Usage: bankslight [--config FILE] <db> <command>

Commands:
  queries                     List catalog queries
  run <id> [name=value...]    Run a catalog query, overriding parameters
  sql <statement>             Run a read-only statement
  tables                      List store tables
  table <name>                Show every row of a table
  customers [id]              Show all customers, or one by id
  chart <kind>                Show a chart dataset
  help                        Show this message";

/// A parsed subcommand
#[derive(Debug, PartialEq)]
pub enum Command {
    Queries,
    Run { id: String, overrides: Vec<(String, String)> },
    Sql(String),
    Tables,
    Table(String),
    Customers(Option<String>),
    Chart(String),
    Help,
}

/// Everything the command line asked for
#[derive(Debug, PartialEq)]
pub struct Invocation {
    pub config: Option<PathBuf>,
    pub store: PathBuf,
    pub command: Command,
}

/// Parses the arguments that follow the program name
pub fn parse_args(args: &[String]) -> std::result::Result<Invocation, String> {
    let mut config = None;
    let mut rest = args;
    while let Some(first) = rest.first() {
        match first.as_str() {
            "--config" | "-c" => {
                let path = rest.get(1).ok_or("--config needs a file")?;
                config = Some(PathBuf::from(path));
                rest = &rest[2..];
            }
            _ => break,
        }
    }

    let (store, rest) = rest.split_first().ok_or("missing database path")?;
    if store == "help" || store == "--help" || store == "-h" {
        return Ok(Invocation {
            config,
            store: PathBuf::new(),
            command: Command::Help,
        });
    }

    let command = parse_command(rest)?;
    Ok(Invocation {
        config,
        store: PathBuf::from(store),
        command,
    })
}

fn parse_command(parts: &[String]) -> std::result::Result<Command, String> {
    let (name, args) = parts.split_first().ok_or("missing command")?;
    let command = match name.as_str() {
        "queries" => Command::Queries,
        "run" => {
            let (id, pairs) = args.split_first().ok_or("run needs a query id")?;
            let overrides = pairs
                .iter()
                .map(|pair| {
                    pair.split_once('=')
                        .map(|(k, v)| (k.to_string(), v.to_string()))
                        .ok_or_else(|| format!("expected name=value, got '{}'", pair))
                })
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Command::Run {
                id: id.clone(),
                overrides,
            }
        }
        "sql" => {
            if args.is_empty() {
                return Err("sql needs a statement".to_string());
            }
            Command::Sql(args.join(" "))
        }
        "tables" => Command::Tables,
        "table" => Command::Table(args.first().ok_or("table needs a name")?.clone()),
        "customers" => Command::Customers(args.first().cloned()),
        "chart" => Command::Chart(args.first().ok_or("chart needs a kind")?.clone()),
        "help" => Command::Help,
        other => return Err(format!("unknown command '{}'", other)),
    };
    Ok(command)
}

/// Runs `command` and renders its output
pub fn execute(service: &BankService, command: &Command) -> Result<String> {
    let mut out = String::new();
    match command {
        Command::Queries => {
            for (id, label) in service.list_queries() {
                let _ = writeln!(out, "{:<34} {}", id, label);
            }
        }
        Command::Run { id, overrides } => {
            let entry = service.catalog().lookup(id)?;
            let overrides = overrides
                .iter()
                .map(|(name, raw)| entry.parse_override(name, raw))
                .collect::<Result<Vec<_>>>()?;
            let _ = writeln!(out, "{}", entry.label);
            let _ = writeln!(out, "{}", service.run_catalog_query_with(id, &overrides)?);
        }
        Command::Sql(sql) => {
            let _ = writeln!(out, "{}", service.run_ad_hoc_query(sql, &Params::None)?);
        }
        Command::Tables => {
            for table in service.list_tables()? {
                let _ = writeln!(out, "{}", table);
            }
        }
        Command::Table(name) => {
            let _ = writeln!(out, "{}", service.fetch_table(name)?);
        }
        Command::Customers(id) => {
            let filter = match id {
                Some(id) => CustomerFilter::ById(id.clone()),
                None => CustomerFilter::All,
            };
            let _ = writeln!(out, "{}", service.read_customers(&filter)?);
        }
        Command::Chart(kind) => {
            let data = service.chart_data(kind.parse::<ChartKind>()?)?;
            let _ = writeln!(out, "{}", data.title);
            let _ = writeln!(out, "{}", data.table);
        }
        Command::Help => {
            let _ = writeln!(out, "{}", USAGE);
        }
    }
    Ok(out)
}
