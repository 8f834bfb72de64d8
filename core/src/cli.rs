use std::io::Write;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use serde_json::{json, Value as JsonValue};

use crate::catalog::{hash_source, Catalog};
use crate::computation::{Computation, ComputationError, Outcome, Snapshot};
use crate::config::Config;
use crate::executor::Val;
use crate::parser::parse_procedures;
use crate::parser::semantic_validator::validate_procedures;

#[derive(Parser)]
#[command(name = "resumable")]
#[command(about = "Resumable - drive suspendable procedures from the command line", long_about = None)]
pub struct Cli {
    /// Path to config file (overrides default search)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Step limit per operation (overrides config file and env vars)
    #[arg(long, global = true)]
    pub max_steps: Option<usize>,

    /// Extra template directory, searched after the configured ones
    #[arg(long = "templates", global = true, value_name = "DIR")]
    pub templates: Vec<PathBuf>,

    /// Log filter used when RUST_LOG is not set
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Parse and validate a template file
    Check {
        /// Template file
        file: PathBuf,
    },

    /// Start a computation and drive it
    Run {
        /// Template file
        file: PathBuf,

        /// Template to start (required when the file defines several)
        #[arg(short = 't', long = "template")]
        template: Option<String>,

        /// Positional argument as JSON (repeatable)
        #[arg(short = 'a', long = "arg")]
        args: Vec<String>,

        /// Operation: next, next:JSON, return:JSON or throw:JSON (repeatable).
        /// Without any, the computation is resumed until it finishes.
        #[arg(short = 'o', long = "op")]
        ops: Vec<Op>,

        /// Write a snapshot of the computation here afterwards
        #[arg(long)]
        save: Option<PathBuf>,
    },

    /// Restore a saved computation and keep driving it
    Continue {
        /// Snapshot file written by --save
        snapshot: PathBuf,

        /// Operation: next, next:JSON, return:JSON or throw:JSON (repeatable)
        #[arg(short = 'o', long = "op")]
        ops: Vec<Op>,

        /// Write the updated snapshot here afterwards
        #[arg(long)]
        save: Option<PathBuf>,
    },

    /// List templates found in the configured template paths
    List,

    /// Print the effective configuration
    Config,
}

/// One control operation requested on the command line
#[derive(Debug, Clone, PartialEq)]
pub enum Op {
    Next(Val),
    Return(Val),
    Throw(Val),
}

impl Op {
    pub fn name(&self) -> &'static str {
        match self {
            Op::Next(_) => "next",
            Op::Return(_) => "return",
            Op::Throw(_) => "throw",
        }
    }

    pub fn apply(&self, computation: &mut Computation) -> Result<Outcome, ComputationError> {
        match self {
            Op::Next(v) => computation.resume(v.clone()),
            Op::Return(v) => computation.cancel(v.clone()),
            Op::Throw(e) => computation.inject_failure(e.clone()),
        }
    }
}

impl FromStr for Op {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (name, payload) = match s.split_once(':') {
            Some((name, payload)) => (name, Some(payload)),
            None => (s, None),
        };

        let value = match payload {
            Some(json) => parse_json_arg(json).map_err(|e| e.to_string())?,
            None => Val::Null,
        };

        match (name, payload) {
            ("next", _) => Ok(Op::Next(value)),
            ("return", Some(_)) => Ok(Op::Return(value)),
            ("throw", Some(_)) => Ok(Op::Throw(value)),
            ("return" | "throw", None) => Err(format!("'{}' needs a value, e.g. {}:null", name, name)),
            _ => Err(format!(
                "unknown operation '{}' (expected next, return or throw)",
                name
            )),
        }
    }
}

fn parse_json_arg(text: &str) -> Result<Val> {
    let json: JsonValue =
        serde_json::from_str(text).with_context(|| format!("invalid JSON '{}'", text))?;
    Ok(Val::from_json(&json))
}

/// Run the CLI by parsing process arguments
pub fn run_cli() -> Result<()> {
    let cli = Cli::parse();
    run_cli_with_args(cli)
}

/// Run the CLI with provided arguments
pub fn run_cli_from_args(args: Vec<String>) -> Result<()> {
    let cli = Cli::parse_from(args);
    run_cli_with_args(cli)
}

fn run_cli_with_args(cli: Cli) -> Result<()> {
    // Load configuration before anything else so config errors surface first
    let config = load_config(&cli)?;

    init_tracing(&config.logging.level);

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    execute(cli.command, &config, &mut out)
}

/// Effective configuration with the global flags applied
fn load_config(cli: &Cli) -> Result<Config> {
    Config::builder()
        .config_path(cli.config.clone())
        .max_steps(cli.max_steps)
        .template_paths(cli.templates.clone())
        .log_level(cli.log_level.clone())
        .build()
        .context("Failed to load configuration")
}

fn init_tracing(default_level: &str) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .try_init();
}

/// Execute one command, writing its output to `out`
pub fn execute(command: Commands, config: &Config, out: &mut impl Write) -> Result<()> {
    match command {
        Commands::Check { file } => check(&file, out),

        Commands::Run {
            file,
            template,
            args,
            ops,
            save,
        } => {
            let mut catalog = Catalog::new();
            catalog.load_file(&file)?;

            let name = match template {
                Some(name) => name,
                None => only_template(&catalog, &file)?,
            };
            let args = args
                .iter()
                .map(|a| parse_json_arg(a))
                .collect::<Result<Vec<_>>>()?;

            let mut computation = catalog.start(&name, args, config.limits())?;
            tracing::info!(id = %computation.id(), template = %name, "Started computation");

            drive(&mut computation, &ops, out)?;
            if let Some(path) = save {
                save_snapshot(&computation, &path)?;
            }
            Ok(())
        }

        Commands::Continue {
            snapshot,
            ops,
            save,
        } => {
            let text = std::fs::read_to_string(&snapshot)
                .with_context(|| format!("Failed to read {}", snapshot.display()))?;
            let mut computation = Computation::restore(Snapshot::from_json(&text)?, config.limits())?;
            tracing::info!(
                id = %computation.id(),
                template = %computation.template(),
                state = %computation.state(),
                "Restored computation"
            );

            drive(&mut computation, &ops, out)?;
            if let Some(path) = save {
                save_snapshot(&computation, &path)?;
            }
            Ok(())
        }

        Commands::List => {
            let catalog = Catalog::from_config(config)?;
            if catalog.is_empty() {
                writeln!(out, "No templates found")?;
            }
            for template in catalog.list() {
                writeln!(
                    out,
                    "{}({})  {}  {}",
                    template.name,
                    template.params.join(", "),
                    template.short_hash(),
                    template.origin
                )?;
            }
            Ok(())
        }

        Commands::Config => {
            write!(out, "{}", config.to_toml()?)?;
            Ok(())
        }
    }
}

fn check(file: &Path, out: &mut impl Write) -> Result<()> {
    let source = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let procedures =
        parse_procedures(&source).map_err(|e| anyhow!("{}: {}", file.display(), e))?;

    let diagnostics = validate_procedures(&procedures, &source);
    for diagnostic in &diagnostics {
        writeln!(out, "{}: {}", file.display(), diagnostic)?;
    }

    for procedure in &procedures {
        writeln!(
            out,
            "{}({})  {}",
            procedure.name,
            procedure.params.join(", "),
            &hash_source(&procedure.source)[..8]
        )?;
    }

    let errors = diagnostics.iter().filter(|d| d.is_error()).count();
    if errors > 0 {
        bail!("{} has {} error(s)", file.display(), errors);
    }
    Ok(())
}

fn only_template(catalog: &Catalog, file: &Path) -> Result<String> {
    let names: Vec<_> = catalog.list().map(|t| t.name.clone()).collect();
    match names.as_slice() {
        [name] => Ok(name.clone()),
        [] => bail!("{} defines no templates", file.display()),
        _ => bail!(
            "{} defines several templates ({}); pick one with --template",
            file.display(),
            names.join(", ")
        ),
    }
}

/// Apply `ops` (or resume until finished when there are none), printing one
/// JSON line per outcome and per emitted effect
pub fn drive(computation: &mut Computation, ops: &[Op], out: &mut impl Write) -> Result<()> {
    if ops.is_empty() {
        let next = Op::Next(Val::Null);
        loop {
            let result = next.apply(computation);
            let stop = !matches!(result, Ok(Outcome::Yielded(_)));
            report(computation, &next, result, out)?;
            if stop {
                return Ok(());
            }
        }
    }

    for op in ops {
        let result = op.apply(computation);
        report(computation, op, result, out)?;
    }
    Ok(())
}

fn report(
    computation: &mut Computation,
    op: &Op,
    result: Result<Outcome, ComputationError>,
    out: &mut impl Write,
) -> Result<()> {
    for effect in computation.take_effects() {
        writeln!(out, "{}", json!({ "effect": effect.value.to_json(), "seq": effect.seq }))?;
    }

    let line = match result {
        Ok(outcome) => json!({
            "op": op.name(),
            "result": outcome.to_json(),
            "state": computation.state().as_str(),
        }),
        Err(err) => json!({
            "op": op.name(),
            "error": error_json(&err),
            "state": computation.state().as_str(),
        }),
    };
    writeln!(out, "{}", line)?;
    Ok(())
}

fn error_json(err: &ComputationError) -> JsonValue {
    let kind = match err {
        ComputationError::Raised(_) => "raised",
        ComputationError::Injected(_) => "injected",
        ComputationError::StepLimitExceeded { .. } => "step_limit",
        ComputationError::Snapshot(_) => "snapshot",
    };
    json!({
        "kind": kind,
        "message": err.to_string(),
        "value": err.error_value().map(Val::to_json),
    })
}

fn save_snapshot(computation: &Computation, path: &Path) -> Result<()> {
    let json = computation.snapshot().to_json()?;
    std::fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))?;
    tracing::info!(
        id = %computation.id(),
        state = %computation.state(),
        path = %path.display(),
        "Saved snapshot"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const COUNTER: &str = r#"
function* counter(limit) {
    defer { emit("closed"); }
    let i = 0;
    while (i < limit) {
        let reply = yield i;
        if (reply == "stop") { break; }
        i = i + 1;
    }
    return i;
}
"#;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("resumable-cli-{}-{}", uuid::Uuid::new_v4(), name))
    }

    fn lines(out: &[u8]) -> Vec<JsonValue> {
        String::from_utf8_lossy(out)
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect()
    }

    #[test]
    fn test_parse_ops() {
        assert_eq!("next".parse::<Op>().unwrap(), Op::Next(Val::Null));
        assert_eq!("next:5".parse::<Op>().unwrap(), Op::Next(Val::Num(5.0)));
        assert_eq!(
            "return:\"stopped\"".parse::<Op>().unwrap(),
            Op::Return(Val::from("stopped"))
        );
        assert!(matches!(
            r#"throw:{"error":{"code":"E","message":"m"}}"#.parse::<Op>().unwrap(),
            Op::Throw(Val::Error(_))
        ));
        assert!("return".parse::<Op>().is_err());
        assert!("skip".parse::<Op>().is_err());
        assert!("next:{".parse::<Op>().is_err());
    }

    #[test]
    fn test_cli_arguments() {
        let cli = Cli::try_parse_from([
            "resumable",
            "--max-steps",
            "50",
            "run",
            "flow.gen",
            "--arg",
            "3",
            "--op",
            "next",
            "--op",
            "return:1",
        ])
        .unwrap();
        assert_eq!(cli.max_steps, Some(50));
        let Commands::Run { args, ops, .. } = cli.command else {
            panic!("Expected run");
        };
        assert_eq!(args, vec!["3"]);
        assert_eq!(ops, vec![Op::Next(Val::Null), Op::Return(Val::Num(1.0))]);
    }

    #[test]
    fn test_drive_until_done() {
        let mut catalog = Catalog::new();
        catalog.register_source("counter.gen", COUNTER).unwrap();
        let mut computation = catalog
            .start("counter", vec![Val::Num(2.0)], Default::default())
            .unwrap();

        let mut out = Vec::new();
        drive(&mut computation, &[], &mut out).unwrap();

        let lines = lines(&out);
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0]["result"], json!({ "value": 0.0, "done": false }));
        assert_eq!(lines[1]["result"], json!({ "value": 1.0, "done": false }));
        assert_eq!(lines[2]["effect"], json!("closed"));
        assert_eq!(lines[3]["result"], json!({ "value": 2.0, "done": true }));
        assert_eq!(lines[3]["state"], json!("completed"));
    }

    #[test]
    fn test_drive_ops_after_finish() {
        let mut catalog = Catalog::new();
        catalog.register_source("counter.gen", COUNTER).unwrap();
        let mut computation = catalog
            .start("counter", vec![Val::Num(5.0)], Default::default())
            .unwrap();

        let ops = vec![
            Op::Next(Val::Null),
            Op::Throw(Val::error("E_DOWN", "gone")),
            Op::Next(Val::Null),
        ];
        let mut out = Vec::new();
        drive(&mut computation, &ops, &mut out).unwrap();

        let lines = lines(&out);
        assert_eq!(lines[1]["effect"], json!("closed"));
        assert_eq!(lines[2]["error"]["kind"], json!("injected"));
        assert_eq!(lines[2]["state"], json!("failed"));
        assert_eq!(lines[3]["result"], json!({ "done": true }));
    }

    #[test]
    fn test_run_save_and_continue() {
        let file = temp_path("counter.gen");
        let snapshot = temp_path("snapshot.json");
        std::fs::write(&file, COUNTER).unwrap();
        let config = Config::default();

        let mut out = Vec::new();
        execute(
            Commands::Run {
                file: file.clone(),
                template: None,
                args: vec!["3".to_string()],
                ops: vec![Op::Next(Val::Null), Op::Next(Val::Null)],
                save: Some(snapshot.clone()),
            },
            &config,
            &mut out,
        )
        .unwrap();

        let mut resumed = Vec::new();
        execute(
            Commands::Continue {
                snapshot: snapshot.clone(),
                ops: vec![Op::Next(Val::from("stop"))],
                save: None,
            },
            &config,
            &mut resumed,
        )
        .unwrap();

        std::fs::remove_file(&file).unwrap();
        std::fs::remove_file(&snapshot).unwrap();

        let first = lines(&out);
        assert_eq!(first[1]["result"], json!({ "value": 1.0, "done": false }));

        let second = lines(&resumed);
        assert_eq!(second[0]["effect"], json!("closed"));
        assert_eq!(second[1]["result"], json!({ "value": 1.0, "done": true }));
    }

    #[test]
    fn test_check_reports_errors() {
        let file = temp_path("bad.gen");
        std::fs::write(&file, "function* f() {\n  break;\n}\n").unwrap();

        let mut out = Vec::new();
        let result = check(&file, &mut out);
        std::fs::remove_file(&file).unwrap();

        assert!(result.is_err());
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("[loop-control]"));
        assert!(text.contains("f()"));
    }

    #[test]
    fn test_config_command() {
        let mut out = Vec::new();
        execute(Commands::Config, &Config::default(), &mut out).unwrap();
        assert!(String::from_utf8(out).unwrap().contains("[templates]"));
    }

    #[test]
    fn test_global_flags_reach_config() {
        let dir = temp_path("templates");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("greet.gen"), "function* greet(name) { return name; }").unwrap();

        let cli = Cli::try_parse_from([
            "resumable".to_string(),
            "list".to_string(),
            "--templates".to_string(),
            dir.display().to_string(),
            "--log-level".to_string(),
            "debug".to_string(),
        ])
        .unwrap();
        let config = load_config(&cli).unwrap();
        assert!(config.templates.paths.contains(&dir));
        assert_eq!(config.logging.level, "debug");

        let mut out = Vec::new();
        let result = execute(cli.command, &config, &mut out);
        std::fs::remove_dir_all(&dir).unwrap();

        result.unwrap();
        assert!(String::from_utf8(out).unwrap().starts_with("greet(name)"));
    }
}
