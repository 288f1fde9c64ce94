use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use sqladapter::config::{ConfigSource, MemoryConfigSource, TomlConfigSource};
use sqladapter::{Condition, Fetch, Instances, Row, SelectRequest};

/// Run SQL and render selects against a configured database instance
#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Configuration file (defaults to <config dir>/sqladapter/database.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Instance name from the configuration file
    #[arg(long, global = true, default_value = "default")]
    instance: String,

    /// Ask for the password instead of reading it from the configuration
    #[arg(long, global = true)]
    password_prompt: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run raw SQL and print the rows as JSON
    Query {
        sql: String,

        /// Print the affected row count instead of rows
        #[arg(long)]
        exec: bool,
    },
    /// Build a SELECT and print its SQL, or run it with --run
    Select {
        #[arg(long)]
        table: String,

        /// Condition as raw SQL or a JSON list such as '["id", 3]'
        #[arg(long = "where")]
        conditions: Vec<String>,

        #[arg(long)]
        order_by: Option<String>,

        #[arg(long)]
        number: Option<i64>,

        #[arg(long)]
        offset: Option<i64>,

        /// Execute the query and print the rows as JSON
        #[arg(long)]
        run: bool,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let instances = load_instances(&cli)?;
    let adapter = instances
        .get(Some(&cli.instance))
        .with_context(|| format!("cannot use instance {:?}", cli.instance))?;

    match cli.command {
        Command::Query { sql, exec } => {
            if exec {
                let affected = adapter.query(&sql, Fetch::Exec)?.into_affected()?;
                println!("{}", affected);
            } else {
                let rows = adapter.query(&sql, Fetch::All)?.into_rows()?;
                print_rows(&rows)?;
            }
        }
        Command::Select {
            table,
            conditions,
            order_by,
            number,
            offset,
            run,
        } => {
            let mut request = SelectRequest::from_table(adapter, &table);
            for condition in conditions {
                request = request.and_where(parse_condition(&condition)?);
            }
            if let Some(order_by) = order_by {
                request = request.order_by(order_by);
            }
            if let Some(number) = number {
                request = request.number(number);
            }
            if let Some(offset) = offset {
                request = request.from_offset(offset);
            }
            if run {
                print_rows(&request.rows()?)?;
            } else {
                println!("{}", request.sql()?);
            }
        }
    }

    Ok(())
}

fn load_instances(cli: &Cli) -> Result<Instances> {
    let source = match &cli.config {
        Some(path) => TomlConfigSource::new(path),
        None => TomlConfigSource::default(),
    };
    let mut config = source
        .get(&cli.instance)
        .with_context(|| format!("reading {}", source.path().display()))?;

    // Password: SQLADAPTER_PASSWORD env var, then interactive prompt
    if cli.password_prompt {
        if let Ok(pw) = std::env::var("SQLADAPTER_PASSWORD") {
            config.passwd = pw;
        } else {
            let prompt = format!("Password for {}: ", config.display_string());
            config.passwd = rpassword::read_password_from_tty(Some(&prompt))?;
        }
    }

    Ok(Instances::new(
        MemoryConfigSource::new().with(cli.instance.clone(), config),
    ))
}

/// JSON lists go through the condition grammar; anything else is raw SQL.
fn parse_condition(text: &str) -> Result<Condition> {
    match serde_json::from_str::<serde_json::Value>(text) {
        Ok(json @ serde_json::Value::Array(_)) => Ok(Condition::try_from(json)?),
        _ => Ok(Condition::raw(text)),
    }
}

fn print_rows(rows: &[Row]) -> Result<()> {
    let json: Vec<serde_json::Value> = rows.iter().map(Row::to_json).collect();
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
