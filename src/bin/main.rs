//! Roster CLI - Compile and run grid requests
//!
//! Usage:
//!   roster compile --request <json> [--tenant <org>] [--mode rows|count|ids] [--dialect <dialect>]
//!   roster schema [--dialect <dialect>]
//!   roster list --tenant <org> --request <json>
//!
//! Examples:
//!   roster compile --request '{"filterModel":{"items":[{"field":"name","operator":"contains","value":"moon"}]}}'
//!   roster schema --dialect postgres
//!   roster list --tenant org-a --request '{"page":0,"pageSize":10}'

use anyhow::{bail, Context};
use clap::{Parser, Subcommand, ValueEnum};
use roster::catalog::Catalog;
use roster::compile::{Mode, QueryCompiler};
use roster::config::Settings;
use roster::filter::PageRequest;
use roster::service::{Caller, ListRequest, RosterService, StaticTenantResolver};
use roster::sql::{Dialect, SqlDialect};
use roster::store::{load_catalog, SqliteExecutor};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "roster")]
#[command(about = "Roster - tenant-scoped query compiler for artist rosters")]
#[command(version)]
struct Cli {
    /// Config file (defaults to ROSTER_CONFIG, ./roster.toml, ~/.config/roster/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Database file (overrides [database].path)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a grid request to SQL without running it
    Compile {
        /// List request as JSON (filterModel, sortModel, page, pageSize)
        #[arg(short, long, default_value = "{}")]
        request: String,

        /// Organization the query is scoped to
        #[arg(short, long, default_value = "tenant")]
        tenant: String,

        /// Output shape
        #[arg(short, long, default_value = "rows")]
        mode: ModeArg,

        /// SQL dialect to generate (defaults to [database].dialect)
        #[arg(short, long)]
        dialect: Option<DialectArg>,
    },

    /// Print the DDL for every table
    Schema {
        /// SQL dialect to generate (defaults to [database].dialect)
        #[arg(short, long)]
        dialect: Option<DialectArg>,
    },

    /// Run a grid request against the database and print the response
    List {
        /// Organization to list artists for
        #[arg(short, long)]
        tenant: String,

        /// List request as JSON (filterModel, sortModel, page, pageSize)
        #[arg(short, long, default_value = "{}")]
        request: String,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum ModeArg {
    Rows,
    Count,
    Ids,
}

impl From<ModeArg> for Mode {
    fn from(arg: ModeArg) -> Self {
        match arg {
            ModeArg::Rows => Mode::Rows,
            ModeArg::Count => Mode::Count,
            ModeArg::Ids => Mode::IdentifiersOnly,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum DialectArg {
    Postgres,
    Sqlite,
}

impl From<DialectArg> for Dialect {
    fn from(arg: DialectArg) -> Self {
        match arg {
            DialectArg::Postgres => Dialect::Postgres,
            DialectArg::Sqlite => Dialect::Sqlite,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("ROSTER_LOG").unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let settings = match &cli.config {
        Some(path) => Settings::from_file(path)?,
        None => Settings::load()?,
    };
    let db_path = match cli.db {
        Some(path) => Some(path),
        None => settings.database.resolved_path()?,
    };

    match cli.command {
        Commands::Compile {
            request,
            tenant,
            mode,
            dialect,
        } => {
            let dialect = dialect.map(Dialect::from).unwrap_or(settings.database.dialect);
            cmd_compile(&settings, db_path, &request, &tenant, mode.into(), dialect).await
        }
        Commands::Schema { dialect } => {
            let dialect = dialect.map(Dialect::from).unwrap_or(settings.database.dialect);
            cmd_schema(dialect);
            Ok(())
        }
        Commands::List { tenant, request } => cmd_list(&settings, db_path, &tenant, &request).await,
    }
}

fn parse_request(json: &str) -> anyhow::Result<ListRequest> {
    serde_json::from_str(json).context("invalid request JSON")
}

async fn open_store(path: Option<PathBuf>) -> anyhow::Result<SqliteExecutor> {
    let store = match path {
        Some(path) => SqliteExecutor::open(&path)
            .with_context(|| format!("failed to open database '{}'", path.display()))?,
        None => SqliteExecutor::open_in_memory()?,
    };
    store.bootstrap().await?;
    Ok(store)
}

async fn cmd_compile(
    settings: &Settings,
    db_path: Option<PathBuf>,
    request: &str,
    tenant: &str,
    mode: Mode,
    dialect: Dialect,
) -> anyhow::Result<()> {
    let request = parse_request(request)?;

    // Statistic fields are validated against the store's statistic types.
    let catalog = match db_path {
        Some(path) => load_catalog(&open_store(Some(path)).await?).await?,
        None => Catalog::default(),
    };

    let options = settings.compile_options().with_dialect(dialect);
    let compiler = QueryCompiler::new(&catalog, options);
    let page = PageRequest::new(
        request.page,
        request
            .page_size
            .unwrap_or(settings.query.default_page_size),
    );

    let output = compiler.compile(
        tenant,
        &request.filter_model,
        &request.sort_model,
        page,
        mode,
    )?;

    println!("{}", output.statement.sql);
    if !output.statement.params.is_empty() {
        println!();
        for (i, value) in output.statement.params.iter().enumerate() {
            println!("-- {} = {}", dialect.placeholder(i + 1), value.to_literal(dialect));
        }
    }
    Ok(())
}

fn cmd_schema(dialect: Dialect) {
    for statement in Catalog::create_statements() {
        println!("{};", statement.to_sql(dialect));
        println!();
    }
}

async fn cmd_list(
    settings: &Settings,
    db_path: Option<PathBuf>,
    tenant: &str,
    request: &str,
) -> anyhow::Result<()> {
    let request = parse_request(request)?;
    if db_path.is_none() {
        bail!("no database configured; pass --db or set [database].path");
    }

    let store = open_store(db_path).await?;
    let catalog = load_catalog(&store).await?;

    let caller = Caller::new("cli");
    let tenants = StaticTenantResolver::new().with_user(caller.user_id.clone(), tenant);
    let service = RosterService::new(Arc::new(store), Arc::new(tenants), Arc::new(catalog))
        .with_settings(settings);

    let response = service.list(&caller, request).await;
    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}
