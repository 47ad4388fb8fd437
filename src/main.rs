use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use cadence_config::{EngineConfig, InvokerConfig, WorkflowDef};
use cadence_engine::{Flow, FlowError};
use cadence_host_rpc::Payload;
use cadence_workflow::{Direction, ExecuteOptions};

/// Cadence - run dependency-ordered workflows of remote calls and events
#[derive(Parser)]
#[command(name = "cadence")]
#[command(version, about, long_about = None)]
struct Cli {
  /// Path to the engine config file (default: ~/.cadence/config.json)
  #[arg(long, global = true)]
  config: Option<PathBuf>,

  #[command(subcommand)]
  command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
  /// Print the level groupings of a workflow as JSON
  Levels {
    /// Path to the workflow definition (JSON)
    workflow_file: PathBuf,

    /// Step to start from instead of the root
    #[arg(long)]
    start: Option<String>,

    /// Walk from dependents back to prerequisites
    #[arg(long)]
    reverse: bool,
  },

  /// Run a workflow, reading the request payload from stdin
  Run {
    /// Path to the workflow definition (JSON)
    workflow_file: PathBuf,

    /// Step to start from instead of the root
    #[arg(long)]
    start: Option<String>,

    /// Walk from dependents back to prerequisites
    #[arg(long)]
    reverse: bool,

    /// Abort the run after this many milliseconds
    #[arg(long)]
    deadline_ms: Option<u64>,

    /// Base URL of the HTTP invoker, overriding the config file
    #[arg(long)]
    base_url: Option<String>,
  },
}

fn main() -> Result<()> {
  let cli = Cli::parse();

  let config = load_config(cli.config)?;
  init_tracing(config.log_filter.as_deref());

  match cli.command {
    Some(Commands::Levels {
      workflow_file,
      start,
      reverse,
    }) => {
      let rt = tokio::runtime::Runtime::new()?;
      rt.block_on(print_levels(config, workflow_file, start, reverse))?;
    }
    Some(Commands::Run {
      workflow_file,
      start,
      reverse,
      deadline_ms,
      base_url,
    }) => {
      let mut config = config;
      if let Some(base_url) = base_url {
        match config.invoker.as_mut() {
          Some(invoker) => invoker.base_url = base_url,
          None => {
            config.invoker = Some(InvokerConfig {
              base_url,
              timeout_ms: None,
              retries: 0,
            })
          }
        }
      }
      let rt = tokio::runtime::Runtime::new()?;
      rt.block_on(run_workflow(
        config,
        workflow_file,
        start,
        reverse,
        deadline_ms,
      ))?;
    }
    None => {
      println!("cadence - use --help to see available commands");
    }
  }

  Ok(())
}

fn load_config(path: Option<PathBuf>) -> Result<EngineConfig> {
  match path {
    Some(path) => EngineConfig::load(&path)
      .with_context(|| format!("failed to load config file: {}", path.display())),
    None => EngineConfig::load_default().context("failed to load ~/.cadence/config.json"),
  }
}

fn init_tracing(fallback: Option<&str>) {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(fallback.unwrap_or("warn"))),
    )
    .with_writer(io::stderr)
    .with_target(false)
    .init();
}

async fn load_workflow(flow: &Flow, workflow_file: &Path) -> Result<String> {
  let content = tokio::fs::read_to_string(workflow_file)
    .await
    .with_context(|| format!("failed to read workflow file: {}", workflow_file.display()))?;

  let def = WorkflowDef::from_json(&content)
    .with_context(|| format!("failed to parse workflow file: {}", workflow_file.display()))?;
  let workflow_id = def.workflow_id.clone();

  flow
    .create_from_def(def)
    .await
    .with_context(|| format!("invalid workflow: {}", workflow_id))?;
  Ok(workflow_id)
}

fn direction(reverse: bool) -> Direction {
  if reverse {
    Direction::Reverse
  } else {
    Direction::Forward
  }
}

async fn print_levels(
  config: EngineConfig,
  workflow_file: PathBuf,
  start: Option<String>,
  reverse: bool,
) -> Result<()> {
  let flow = Flow::from_config(&config).context("failed to set up engine")?;
  let workflow_id = load_workflow(&flow, &workflow_file).await?;
  let workflow = flow
    .workflow(&workflow_id)
    .await
    .with_context(|| format!("workflow '{}' not registered", workflow_id))?;

  let levels = workflow
    .levels(start.as_deref(), direction(reverse))
    .await
    .context("failed to compute levels")?;

  let ids: Vec<Vec<&str>> = levels
    .iter()
    .map(|level| level.iter().map(|step| step.id()).collect())
    .collect();
  println!("{}", serde_json::to_string_pretty(&ids)?);

  Ok(())
}

async fn run_workflow(
  config: EngineConfig,
  workflow_file: PathBuf,
  start: Option<String>,
  reverse: bool,
  deadline_ms: Option<u64>,
) -> Result<()> {
  let flow = Flow::from_config(&config).context("failed to set up engine")?;
  let workflow_id = load_workflow(&flow, &workflow_file).await?;
  eprintln!("Loaded workflow: {}", workflow_id);

  let payload = read_payload_from_stdin()?;

  let mut options = ExecuteOptions::new().with_direction(direction(reverse));
  if let Some(start) = start {
    options = options.with_start(start);
  }
  if let Some(ms) = deadline_ms {
    options = options.with_deadline(Duration::from_millis(ms));
  }

  let cancel = CancellationToken::new();
  let on_interrupt = cancel.clone();
  tokio::spawn(async move {
    if tokio::signal::ctrl_c().await.is_ok() {
      eprintln!("Interrupted, cancelling run");
      on_interrupt.cancel();
    }
  });

  match flow.execute(&workflow_id, payload, options, cancel).await {
    Ok(report) => {
      eprintln!("Run completed: {}", report.run_id);
      println!("{}", serde_json::to_string_pretty(&report)?);
      Ok(())
    }
    Err(e) => {
      if let FlowError::Execution(err) = &e {
        if let Some(run_id) = err.run_id() {
          eprintln!("Run failed: {}", run_id);
        }
      }
      Err(e).context("workflow execution failed")
    }
  }
}

fn read_payload_from_stdin() -> Result<Payload> {
  use std::io::IsTerminal;

  if io::stdin().is_terminal() {
    // No stdin pipe, use empty object
    Ok(Payload::new(serde_json::json!({})))
  } else {
    let mut input = String::new();
    io::stdin()
      .read_to_string(&mut input)
      .context("failed to read payload from stdin")?;

    if input.trim().is_empty() {
      Ok(Payload::new(serde_json::json!({})))
    } else {
      Payload::from_json(&input).context("failed to parse payload JSON from stdin")
    }
  }
}
