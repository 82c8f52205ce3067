//! sqlplace: render SQL template documents
//!
//! # Usage
//!
//! ```bash
//! # Render a document for SQL Server
//! sqlplace render query.toml --provider mssql
//!
//! # Pick the provider from a connection string
//! sqlplace render query.toml --connection "postgres://localhost/app"
//!
//! # Show the token breakdown of a template
//! sqlplace explain "select * from T where a={0} and b={NAME}"
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use colored::*;
use sqlplace::prelude::*;
use sqlplace::template::{self, Segment};
use sqlplace::TemplateDoc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "sqlplace")]
#[command(version)]
#[command(about = "Compose SQL templates into one parameterized command", long_about = None)]
#[command(after_help = "EXAMPLES:
    sqlplace render query.toml --provider odbc
    sqlplace render query.json --plain
    sqlplace syntax null_coalesce Name \"'n/a'\" --dialect MSSQL
    sqlplace syntax current_date --provider postgres")]
struct Cli {
    /// Configuration file (defaults to ./sqlplace.toml, then the user config dir)
    #[arg(short, long, global = true, env = "SQLPLACE_CONFIG")]
    config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum Provider {
    Mssql,
    Odbc,
    Postgres,
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Render a template document (TOML or JSON)
    Render {
        file: PathBuf,

        /// Provider conventions to render for
        #[arg(short, long, value_enum, default_value = "mssql", conflicts_with = "connection")]
        provider: Provider,

        /// Connection string whose scheme selects the provider
        #[arg(long, env = "SQLPLACE_CONNECTION")]
        connection: Option<String>,

        /// Substitute literal values (diagnostics only)
        #[arg(long)]
        plain: bool,

        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,
    },
    /// Show how a template is tokenized
    Explain { template: String },
    /// Build a dialect fragment
    Syntax {
        name: String,

        /// Arguments, placed as statements when they are not numbers
        args: Vec<String>,

        /// Provider whose dialect is used when none is configured
        #[arg(short, long, value_enum, default_value = "mssql")]
        provider: Provider,

        /// Dialect to use instead of the configured one
        #[arg(short, long)]
        dialect: Option<String>,
    },
}

fn main() {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(&cli) {
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

fn run(cli: &Cli) -> anyhow::Result<()> {
    let config = Config::load(cli.config.as_deref()).context("loading configuration")?;

    match &cli.command {
        Commands::Render {
            file,
            provider,
            connection,
            plain,
            format,
        } => {
            let doc = TemplateDoc::load(file)
                .with_context(|| format!("reading {}", file.display()))?;
            let adapter = select_adapter(*provider, connection.as_deref())?;
            render(&doc, adapter.as_ref(), config, *plain, *format)
        }
        Commands::Explain { template } => explain(template),
        Commands::Syntax {
            name,
            args,
            provider,
            dialect,
        } => {
            let adapter = select_adapter(*provider, None)?;
            let fragment = build_syntax(name, args, adapter.as_ref(), dialect.as_deref(), &config)?;
            println!("{}", fragment);
            Ok(())
        }
    }
}

fn select_adapter(
    provider: Provider,
    connection: Option<&str>,
) -> anyhow::Result<Arc<dyn ProviderAdapter>> {
    if let Some(connection) = connection {
        let registry = ProviderRegistry::new();
        return Ok(registry.resolve(connection)?);
    }
    let adapter: Arc<dyn ProviderAdapter> = match provider {
        Provider::Mssql => Arc::new(GenericAdapter::sql_server()),
        Provider::Odbc => Arc::new(GenericAdapter::odbc()),
        Provider::Postgres => Arc::new(GenericAdapter::postgres()),
    };
    Ok(adapter)
}

fn render(
    doc: &TemplateDoc,
    adapter: &dyn ProviderAdapter,
    config: Config,
    plain: bool,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let mut tree = StatementTree::with_config(config);
    let id = doc.build(&mut tree)?;

    if plain {
        println!("{}", tree.plain_text(id)?);
        return Ok(());
    }

    let cmd = tree.render(id, adapter)?;
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&cmd)?);
        }
        OutputFormat::Text => {
            println!("{}", "Command:".green().bold());
            println!("{}", cmd.text.white());
            if !cmd.parameters.is_empty() {
                println!();
                println!("{}", "Parameters:".cyan());
                for param in &cmd.parameters {
                    let direction = if param.parameter.direction.is_output() {
                        format!(" ({:?})", param.parameter.direction).dimmed().to_string()
                    } else {
                        String::new()
                    };
                    println!(
                        "  {} = {}{}",
                        param.name,
                        param.value().to_literal().yellow(),
                        direction
                    );
                }
            }
        }
    }
    Ok(())
}

fn explain(input: &str) -> anyhow::Result<()> {
    println!("{} {}", "Template:".dimmed(), input.yellow());
    println!();

    let segments = template::parse_template(input)?;
    println!("{}", "Segments:".green().bold());
    for segment in &segments {
        match segment {
            Segment::Text(text) => println!("  {} {:?}", "text ".dimmed(), text),
            Segment::Brace(c) => println!("  {} {}", "brace".dimmed(), c.to_string().white()),
            Segment::Index(i) => {
                println!("  {} {}", "index".cyan(), i.to_string().yellow())
            }
            Segment::Name(name) => println!("  {} {}", "name ".cyan(), name.yellow()),
        }
    }
    Ok(())
}

/// Build a dialect fragment and render it as plain text.
fn build_syntax(
    name: &str,
    args: &[String],
    adapter: &dyn ProviderAdapter,
    dialect: Option<&str>,
    config: &Config,
) -> anyhow::Result<String> {
    let registry = DialectRegistry::new().apply_config(config);
    let mut tree = StatementTree::with_config(config.clone());

    let mut placements = Vec::with_capacity(args.len());
    for arg in args {
        let placement = match arg.parse::<i64>() {
            Ok(n) => Placement::from(n),
            Err(_) => Placement::from(tree.statement(template::escape(arg))),
        };
        placements.push(placement);
    }

    let dialect = match dialect {
        Some(dialect) => dialect.to_string(),
        None => registry.default_dialect(adapter),
    };
    let id = registry.resolve(&mut tree, &dialect, name, &placements)?;
    Ok(tree.plain_text(id)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn current_date(provider: Provider, config: &Config) -> String {
        let adapter = select_adapter(provider, None).unwrap();
        build_syntax("current_date", &[], adapter.as_ref(), None, config).unwrap()
    }

    #[test]
    fn test_syntax_dialect_follows_provider() {
        let config = Config::default();
        assert_eq!(current_date(Provider::Mssql, &config), "CONVERT(DATE, GETDATE())");
        assert_eq!(current_date(Provider::Postgres, &config), "CURRENT_DATE");
    }

    #[test]
    fn test_configured_dialect_wins_over_provider() {
        let config = Config::builder().dialect("MSSQL").build();
        assert_eq!(current_date(Provider::Postgres, &config), "CONVERT(DATE, GETDATE())");
    }
}
