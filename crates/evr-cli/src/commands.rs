use std::path::Path;

use anyhow::Context;
use colored::Colorize;
use evr_registry::{Dispatcher, EventRegistry, Operation, Response};
use evr_store::MemoryWorldState;
use serde_json::{json, Value};

use crate::cli::*;
use crate::config::CliConfig;

pub fn run_command(cli: Cli, config: CliConfig) -> anyhow::Result<()> {
    let output = execute(&cli, &config)?;
    if !output.is_empty() {
        println!("{output}");
    }
    Ok(())
}

/// Run one command and return what it would print.
pub fn execute(cli: &Cli, config: &CliConfig) -> anyhow::Result<String> {
    let dispatcher = Dispatcher::new(EventRegistry::new(config.registry.clone()));

    let Some((name, args)) = request(&cli.command) else {
        return Ok(list_operations(&dispatcher));
    };

    let state_path = cli.state.clone().unwrap_or_else(|| config.state_path.clone());
    let world = MemoryWorldState::load(&state_path)
        .with_context(|| format!("loading world state from {}", state_path.display()))?;

    let response = dispatcher.invoke(&world, &name, &args)?;

    let op = name.parse::<Operation>()?;
    if op.is_write() {
        save(&world, &state_path)?;
    }
    Ok(render(op, &response, cli.format))
}

/// Translate a subcommand into an operation name and its arguments.
fn request(command: &Command) -> Option<(String, Vec<String>)> {
    let (op, args) = match command {
        Command::Register(a) => (Operation::Register, vec![a.key.clone(), a.payload.clone()]),
        Command::RegisterUpdate(a) => (
            Operation::RegisterWithUpdate,
            vec![a.key.clone(), a.payload.clone(), a.updates.clone()],
        ),
        Command::Exists(a) => (Operation::Exists, vec![a.key.clone()]),
        Command::Query(a) => (Operation::Query, vec![a.key.clone()]),
        Command::QueryKeys(a) => (Operation::QueryByKeys, vec![a.keys.clone()]),
        Command::QueryRich(a) => (Operation::QueryByPredicate, vec![a.query.clone()]),
        Command::QueryRange(a) => (Operation::QueryByRange, vec![a.start.clone(), a.end.clone()]),
        Command::Invoke(a) => return Some((a.operation.clone(), a.args.clone())),
        Command::Ops => return None,
    };
    Some((op.as_str().to_string(), args))
}

fn save(world: &MemoryWorldState, path: &Path) -> anyhow::Result<()> {
    world
        .save(path)
        .with_context(|| format!("saving world state to {}", path.display()))?;
    let version = world.version()?;
    tracing::info!(path = %path.display(), version, "world state saved");
    Ok(())
}

fn render(op: Operation, response: &Response, format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => match response {
            Response::Empty => format!("{} {} committed", "✓".green().bold(), op.as_str().bold()),
            Response::Bool(true) => "true".green().to_string(),
            Response::Bool(false) => "false".yellow().to_string(),
            Response::Text(text) => text.clone(),
        },
        OutputFormat::Json => {
            let result = match response {
                Response::Empty => Value::Null,
                Response::Bool(b) => Value::Bool(*b),
                // Array responses and JSON payloads are embedded as structure;
                // anything else (range listings, opaque payloads) as a string.
                Response::Text(text) => {
                    serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.clone()))
                }
            };
            json!({ "operation": op.as_str(), "result": result }).to_string()
        }
    }
}

fn list_operations(dispatcher: &Dispatcher) -> String {
    dispatcher
        .operations()
        .map(|op| {
            let params = op
                .params()
                .iter()
                .map(|p| format!("<{p}>"))
                .collect::<Vec<_>>()
                .join(" ");
            let kind = if op.is_write() { "write" } else { "read" };
            format!("{:<20} {:<6} {}", op.as_str().bold(), kind.dimmed(), params)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;

    fn run(state: &std::path::Path, argv: &[&str]) -> anyhow::Result<String> {
        colored::control::set_override(false);
        let mut full = vec!["evr", "--state", state.to_str().unwrap()];
        full.extend_from_slice(argv);
        let cli = Cli::try_parse_from(full).unwrap();
        execute(&cli, &CliConfig::default())
    }

    #[test]
    fn state_persists_across_invocations() {
        let dir = tempfile::tempdir().unwrap();
        let state = dir.path().join("world.json");

        run(&state, &["register", "a", r#"{"kind":"ship"}"#]).unwrap();
        run(&state, &["register", "b", r#"{"kind":"recv"}"#]).unwrap();

        assert_eq!(run(&state, &["exists", "a"]).unwrap(), "true");
        assert_eq!(run(&state, &["query", "b"]).unwrap(), r#"{"kind":"recv"}"#);
        assert_eq!(
            run(&state, &["query-range"]).unwrap(),
            "'a' = {\"kind\":\"ship\"}\n'b' = {\"kind\":\"recv\"}\n"
        );
    }

    #[test]
    fn failed_write_leaves_state_file_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let state = dir.path().join("world.json");
        run(&state, &["register", "a", "1"]).unwrap();
        let before = std::fs::read_to_string(&state).unwrap();

        let err = run(&state, &["register-update", "b", "2", r#"{"zzz":"x"}"#]).unwrap_err();
        assert!(err.to_string().contains("zzz"));
        assert_eq!(std::fs::read_to_string(&state).unwrap(), before);
        assert_eq!(run(&state, &["exists", "b"]).unwrap(), "false");
    }

    #[test]
    fn json_format_embeds_arrays() {
        let dir = tempfile::tempdir().unwrap();
        let state = dir.path().join("world.json");
        run(&state, &["register", "a", r#"{"n":1}"#]).unwrap();

        let out = run(&state, &["--format", "json", "query-keys", r#"["a"]"#]).unwrap();
        let v: Value = serde_json::from_str(&out).unwrap();
        assert_eq!(v["operation"], "QueryByKeys");
        assert_eq!(v["result"][0]["n"], 1);
    }

    #[test]
    fn invoke_by_name() {
        let dir = tempfile::tempdir().unwrap();
        let state = dir.path().join("world.json");
        run(&state, &["invoke", "Register", "k", "v"]).unwrap();
        assert_eq!(run(&state, &["invoke", "Query", "k"]).unwrap(), "v");
        assert!(run(&state, &["invoke", "Nope"]).is_err());
    }

    #[test]
    fn reads_do_not_create_state_file() {
        let dir = tempfile::tempdir().unwrap();
        let state = dir.path().join("world.json");
        assert_eq!(run(&state, &["exists", "a"]).unwrap(), "false");
        assert!(!state.exists());
    }

    #[test]
    fn ops_lists_every_operation() {
        let dir = tempfile::tempdir().unwrap();
        let out = run(&dir.path().join("unused.json"), &["ops"]).unwrap();
        for op in Operation::ALL {
            assert!(out.contains(op.as_str()), "missing {op}");
        }
    }
}
