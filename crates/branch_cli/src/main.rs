//! Command-line entry point for the branch core.
//!
//! # Responsibility
//! - Wire `CoreConfig`, logging, the SQLite store and the log audit sink together.
//! - Map each subcommand to one service operation and print its JSON result.

use branch_core::{
    init_logging, open_branch_store, BranchRecord, BranchRepository, BranchService, CoreConfig,
    LogAuditSink, ServiceError, SqliteDocumentStore,
};
use log::error;
use serde_json::Value;
use std::process::ExitCode;

const USAGE: &str = "usage: branch_cli <command>

commands:
  ping              print core liveness probe
  version           print core version
  validate <file>   validate a branch JSON record
  save <file>       validate and persist a branch JSON record
  list [limit]      list branches (limit < 1 lists all)
  get <id>          fetch one branch by id

environment: BRANCH_DB_PATH, BRANCH_LOG_LEVEL, BRANCH_LOG_DIR,
             BRANCH_AUDIT_APPLICATION, BRANCH_AUDIT_SOURCE, BRANCH_AUDIT_CREATED_BY

without BRANCH_DB_PATH every invocation uses a fresh in-memory database,
so branches saved by one command are not visible to the next";

/// Printed by `get` when no branch has the requested id.
const NOT_FOUND: &str = "{}";

type Service = BranchService<SqliteDocumentStore, LogAuditSink>;

#[derive(Debug)]
enum Command {
    Ping,
    Version,
    Validate(String),
    Save(String),
    List(i64),
    Get(String),
}

fn parse_args(args: &[String]) -> Result<Command, String> {
    match args {
        [cmd] if cmd == "ping" => Ok(Command::Ping),
        [cmd] if cmd == "version" => Ok(Command::Version),
        [cmd, file] if cmd == "validate" => Ok(Command::Validate(file.clone())),
        [cmd, file] if cmd == "save" => Ok(Command::Save(file.clone())),
        [cmd] if cmd == "list" => Ok(Command::List(0)),
        [cmd, limit] if cmd == "list" => limit
            .parse()
            .map(Command::List)
            .map_err(|err| format!("invalid limit `{limit}`: {err}")),
        [cmd, id] if cmd == "get" => Ok(Command::Get(id.clone())),
        _ => Err(USAGE.to_string()),
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = match parse_args(&args) {
        Ok(command) => command,
        Err(message) => {
            eprintln!("{message}");
            return ExitCode::from(2);
        }
    };

    match run(command).await {
        Ok(output) => {
            println!("{output}");
            ExitCode::SUCCESS
        }
        Err(message) => {
            error!("event=cli_command module=cli status=error error={message}");
            eprintln!("error: {message}");
            ExitCode::FAILURE
        }
    }
}

async fn run(command: Command) -> Result<String, String> {
    match command {
        Command::Ping => return Ok(format!("branch_core ping={}", branch_core::ping())),
        Command::Version => {
            return Ok(format!("branch_core version={}", branch_core::core_version()))
        }
        _ => {}
    }

    let config = CoreConfig::from_env();
    if let Some(log_dir) = &config.log_dir {
        init_logging(&config.log_level, log_dir)?;
    }
    let service = build_service(&config)?;

    match command {
        Command::Validate(file) => {
            let record = read_record(&file)?;
            service
                .validate(Some(&record))
                .await
                .map_err(describe)?;
            Ok("valid".to_string())
        }
        Command::Save(file) => {
            let record = read_record(&file)?;
            let saved = service.save(Some(&record)).await.map_err(describe)?;
            to_json(&saved)
        }
        Command::List(limit) => {
            let branches = service.get_all(Some(limit)).await.map_err(describe)?;
            to_json(&branches)
        }
        Command::Get(id) => {
            let found = service.get_by_id(Some(&id)).await.map_err(describe)?;
            render_found(found.as_ref())
        }
        Command::Ping | Command::Version => Err(USAGE.to_string()),
    }
}

fn build_service(config: &CoreConfig) -> Result<Service, String> {
    let store = open_branch_store(config).map_err(|err| err.to_string())?;
    Ok(BranchService::new(
        BranchRepository::new(store),
        LogAuditSink,
        config.audit.clone(),
    ))
}

fn read_record(file: &str) -> Result<Value, String> {
    let raw = std::fs::read_to_string(file)
        .map_err(|err| format!("failed to read `{file}`: {err}"))?;
    serde_json::from_str(&raw).map_err(|err| format!("`{file}` is not valid JSON: {err}"))
}

fn render_found(branch: Option<&BranchRecord>) -> Result<String, String> {
    match branch {
        Some(branch) => to_json(branch),
        None => Ok(NOT_FOUND.to_string()),
    }
}

fn to_json(value: &impl serde::Serialize) -> Result<String, String> {
    serde_json::to_string_pretty(value).map_err(|err| err.to_string())
}

fn describe(err: ServiceError) -> String {
    match err.violations() {
        Some(violations) => violations
            .iter()
            .map(|violation| format!("  {violation}"))
            .fold(format!("{:?}:", err.kind()), |acc, line| acc + "\n" + &line),
        None => format!("{:?}: {err}", err.kind()),
    }
}
