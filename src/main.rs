use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use tracing::{info, warn};

use conflux_graph::Flow;
use conflux_runtime::{FailurePolicy, NodeOutcome, Runner, RunnerConfig};

/// Conflux - run and maintain dataflow graphs
#[derive(Parser)]
#[command(name = "conflux")]
#[command(version, about, long_about = None)]
struct Cli {
  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Run a flow
  Run {
    /// Path to the flow file
    flow_file: PathBuf,

    /// Value for a command-line parameter node, as NODE_ID=VALUE
    #[arg(long = "param", value_parser = parse_param)]
    params: Vec<(String, String)>,

    /// Cancel the remaining nodes as soon as one fails
    #[arg(long)]
    halt_on_failure: bool,
  },

  /// Validate a flow and print its nodes in execution order
  Check {
    /// Path to the flow file
    flow_file: PathBuf,
  },

  /// Rewrite a flow file in canonical form
  Fmt {
    /// Path to the flow file
    flow_file: PathBuf,

    /// Write to this path instead of overwriting the input
    #[arg(long)]
    output: Option<PathBuf>,
  },
}

fn parse_param(raw: &str) -> Result<(String, String), String> {
  match raw.split_once('=') {
    Some((node, value)) if !node.is_empty() => Ok((node.to_string(), value.to_string())),
    _ => Err(format!("expected NODE_ID=VALUE, got '{}'", raw)),
  }
}

fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_writer(std::io::stderr)
    .with_env_filter(
      tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
    )
    .init();

  let cli = Cli::parse();

  match cli.command {
    Commands::Run {
      flow_file,
      params,
      halt_on_failure,
    } => {
      let policy = if halt_on_failure {
        FailurePolicy::Halt
      } else {
        FailurePolicy::Continue
      };
      let rt = tokio::runtime::Runtime::new()?;
      rt.block_on(run_flow(flow_file, params, policy))
    }
    Commands::Check { flow_file } => check_flow(&flow_file),
    Commands::Fmt { flow_file, output } => format_flow(&flow_file, output.as_deref()),
  }
}

fn load_flow(flow_file: &Path) -> Result<Flow> {
  conflux_format::load(flow_file, &conflux_nodes::registry())
    .with_context(|| format!("failed to load flow file: {}", flow_file.display()))
}

async fn run_flow(
  flow_file: PathBuf,
  params: Vec<(String, String)>,
  policy: FailurePolicy,
) -> Result<()> {
  let mut flow = load_flow(&flow_file)?;
  let arguments: HashMap<String, String> = params.into_iter().collect();
  flow
    .apply_cli_arguments(&arguments)
    .context("failed to apply command-line parameters")?;

  let runner = Arc::new(Runner::new(RunnerConfig {
    failure_policy: policy,
  }));

  let interrupt = {
    let runner = runner.clone();
    tokio::spawn(async move {
      if tokio::signal::ctrl_c().await.is_ok() {
        warn!("interrupted, stopping flow");
        runner.stop();
      }
    })
  };

  let result = runner.run(&flow).await;
  interrupt.abort();
  let result = result.context("flow run failed")?;

  info!(run_id = %result.run_id, nodes = result.outcomes.len(), "flow finished");
  for (node_id, outcome) in &result.outcomes {
    match outcome {
      NodeOutcome::Succeeded => {}
      NodeOutcome::Failed(message) => eprintln!("{}: failed: {}", node_id, message),
      NodeOutcome::Cancelled => eprintln!("{}: cancelled", node_id),
    }
  }

  if !result.is_success() {
    bail!("flow {} did not complete successfully", flow_file.display());
  }
  Ok(())
}

fn check_flow(flow_file: &Path) -> Result<()> {
  let flow = load_flow(flow_file)?;

  for node in flow.nodes() {
    println!("{:>3}  {:<24} {}", node.incidence(), node.id(), node.type_name());
  }

  let missing = flow.missing_cli_parameters();
  if !missing.is_empty() {
    println!("parameters required at run time: {}", missing.join(", "));
  }

  Runner::default()
    .validate(&flow)
    .or_else(|e| match e {
      conflux_runtime::RuntimeError::MissingParameter { .. } => Ok(()),
      other => Err(other),
    })
    .with_context(|| format!("flow is not runnable: {}", flow_file.display()))?;

  println!("{}: ok ({} nodes)", flow_file.display(), flow.nodes().len());
  Ok(())
}

fn format_flow(flow_file: &Path, output: Option<&Path>) -> Result<()> {
  let mut flow = load_flow(flow_file)?;
  let target = output.unwrap_or(flow_file);
  conflux_format::save(&mut flow, Some(target))
    .with_context(|| format!("failed to write flow file: {}", target.display()))?;
  info!(path = %target.display(), "flow formatted");
  Ok(())
}
