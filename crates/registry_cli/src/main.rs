//! Command-line entry point for the equipment registry.
//!
//! # Responsibility
//! - Run one CRUD operation per invocation against a local SQLite store.
//! - Print the routed status code and JSON body the HTTP layer would send.

use clap::{Args, Parser, Subcommand};
use log::{error, info, warn};
use registry_core::request::{
    error_response, parse_create_body, parse_filter_query, parse_id_list, parse_patch_body,
    CreateBody, Operation,
};
use registry_core::{
    init_logging, open_db_in_memory, open_db_with_timeout, Atomicity, ConfigError, DbError,
    EquipmentService, RegistryConfig, RepoError, SqliteEquipmentRepository, TargetOutcome,
};
use serde::Serialize;
use serde_json::{json, Value};
use std::fmt::{Display, Formatter};
use std::path::PathBuf;
use std::process::ExitCode;

/// registry - equipment inventory CRUD over a local store
#[derive(Parser)]
#[command(name = "registry")]
#[command(version, about, long_about = None)]
struct Cli {
    /// TOML configuration file layered over the defaults.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Database path, overriding configuration (`:memory:` allowed).
    #[arg(long, global = true)]
    database: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create one record or a batch from a JSON object or array
    Create {
        /// `{"kind": ..., "parameters": {...}}` or an array of them.
        body: String,
        /// Commit the batch as one unit.
        #[arg(long)]
        atomic: bool,
    },
    /// Find records by ids or by filter
    Find(Target),
    /// Update status and/or parameters by ids or by filter
    Update {
        #[command(flatten)]
        target: Target,
        /// `{"status": ..., "parameters": {...}}`
        #[arg(long)]
        body: String,
    },
    /// Delete records by ids or by filter
    Delete(Target),
}

#[derive(Args)]
struct Target {
    /// Comma-separated equipment ids; a filter is used when absent.
    #[arg(conflicts_with = "query")]
    ids: Option<String>,

    /// Filter pair such as `kind=CNCMachine,RoboticArm` or `sort=-created_at`.
    #[arg(short = 'q', long = "query", value_parser = parse_query_pair)]
    query: Vec<(String, String)>,
}

fn parse_query_pair(value: &str) -> Result<(String, String), String> {
    value
        .split_once('=')
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .ok_or_else(|| format!("expected key=value, got `{value}`"))
}

enum Failure {
    Config(ConfigError),
    Database(DbError),
    Logging(String),
}

impl Display for Failure {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(err) => write!(f, "{err}"),
            Self::Database(err) => write!(f, "failed to open database: {err}"),
            Self::Logging(message) => write!(f, "failed to start logging: {message}"),
        }
    }
}

/// Routed result: status code plus optional JSON body.
struct Response {
    status: u16,
    body: Value,
}

impl Response {
    /// Encodes `body`; an encoding failure becomes a 500 response.
    fn new(status: u16, body: impl Serialize) -> Self {
        match serde_json::to_value(body) {
            Ok(body) => Self { status, body },
            Err(err) => {
                error!("event=cli_encode module=cli status=error error={err}");
                Self {
                    status: 500,
                    body: json!({ "error": format!("failed to encode response: {err}") }),
                }
            }
        }
    }

    fn empty(status: u16) -> Self {
        Self {
            status,
            body: Value::Null,
        }
    }

    fn from_error(err: &RepoError) -> Self {
        let (status, body) = error_response(err);
        Self { status, body }
    }

    fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(response) => {
            println!(
                "{}",
                json!({ "status": response.status, "body": response.body })
            );
            if response.is_success() {
                ExitCode::SUCCESS
            } else {
                ExitCode::from(2)
            }
        }
        Err(failure) => {
            eprintln!("error: {failure}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<Response, Failure> {
    let mut config = RegistryConfig::load(cli.config.as_deref()).map_err(Failure::Config)?;
    if let Some(database) = cli.database {
        config.database_path = database;
    }

    if let Some(log_dir) = &config.log_dir {
        init_logging(&config.log_level, log_dir).map_err(Failure::Logging)?;
    }

    let conn = if config.is_in_memory() {
        open_db_in_memory()
    } else {
        open_db_with_timeout(&config.database_path, config.busy_timeout())
    }
    .map_err(Failure::Database)?;

    let repo = match SqliteEquipmentRepository::try_new(&conn) {
        Ok(repo) => repo.with_max_limit(config.max_limit),
        Err(err) => return Ok(Response::from_error(&err)),
    };
    let service = EquipmentService::new(repo).with_atomicity(config.atomicity());

    let result = match cli.command {
        Command::Create { body, atomic } => create(&service, &body, atomic),
        Command::Find(target) => find(&service, target),
        Command::Update { target, body } => update(&service, target, &body),
        Command::Delete(target) => delete(&service, target),
    };

    Ok(match result {
        Ok(response) => response,
        Err(err) => {
            warn!(
                "event=cli_command module=cli status=error code={} error={}",
                err.status_code(),
                err
            );
            Response::from_error(&err)
        }
    })
}

type Service<'conn> = EquipmentService<SqliteEquipmentRepository<'conn>>;

fn create(service: &Service<'_>, body: &str, atomic: bool) -> Result<Response, RepoError> {
    let status = Operation::Create.success_status();
    let intents = match parse_create_body(body)? {
        CreateBody::One(intent) => {
            let id = service.create_one(&intent)?;
            info!("event=cli_create module=cli status=ok rows=1");
            return Ok(Response::new(status, id));
        }
        CreateBody::Many(intents) => intents,
    };

    let ids = if atomic {
        service.create_many_with(&intents, Atomicity::Atomic)?
    } else {
        service.create_many(&intents)?
    };
    info!("event=cli_create module=cli status=ok rows={}", ids.len());
    Ok(Response::new(status, ids))
}

fn find(service: &Service<'_>, target: Target) -> Result<Response, RepoError> {
    match target.ids {
        Some(ids) => {
            let ids = parse_id_list(&ids)?;
            let outcome = service.find_targets(&ids)?;
            Ok(targeted(Operation::FindTargets, outcome))
        }
        None => {
            let filter = parse_filter_query(target.query)?;
            let records = service.find_matching(&filter)?;
            Ok(Response::new(Operation::FindMatching.success_status(), records))
        }
    }
}

fn update(service: &Service<'_>, target: Target, body: &str) -> Result<Response, RepoError> {
    let patch = parse_patch_body(body)?;
    match target.ids {
        Some(ids) => {
            let ids = parse_id_list(&ids)?;
            let outcome = service.update_targets(&ids, &patch)?;
            Ok(targeted(Operation::UpdateTargets, outcome))
        }
        None => {
            let filter = parse_filter_query(target.query)?;
            let ids = service.update_matching(&filter, &patch)?;
            Ok(Response::new(Operation::UpdateMatching.success_status(), ids))
        }
    }
}

fn delete(service: &Service<'_>, target: Target) -> Result<Response, RepoError> {
    match target.ids {
        Some(ids) => {
            let ids = parse_id_list(&ids)?;
            let outcome = service.delete_targets(&ids)?;
            Ok(targeted(Operation::DeleteTargets, outcome))
        }
        None => {
            let filter = parse_filter_query(target.query)?;
            let ids = service.delete_matching(&filter)?;
            Ok(Response::new(Operation::DeleteMatching.success_status(), ids))
        }
    }
}

fn targeted<T: Serialize>(operation: Operation, outcome: TargetOutcome<T>) -> Response {
    let status = outcome.status_code(operation.success_status());
    match outcome {
        TargetOutcome::Partial(partition) => {
            Response::new(status, partition.to_json(operation.partition_label()))
        }
        TargetOutcome::All(_) if status == 204 => Response::empty(status),
        TargetOutcome::All(mut items)
            if operation == Operation::FindTargets && items.len() == 1 =>
        {
            Response::new(status, items.pop())
        }
        TargetOutcome::All(items) => Response::new(status, items),
    }
}
