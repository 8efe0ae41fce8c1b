use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use strand_debugger::{DebugBundle, ReplayRuntime, WatchList, save_debug_bundle};
use strand_flow::{ComponentRegistry, FlowProject, validate_project};
use strand_runtime::{RunState, Runtime, RuntimeSettings, StopReason};

/// Strand - a dataflow execution engine for flow projects
#[derive(Parser)]
#[command(name = "strand")]
#[command(version, about, long_about = None)]
struct Cli {
  /// Path to the data directory (default: ~/.strand)
  #[arg(long, global = true)]
  data_dir: Option<PathBuf>,

  #[command(subcommand)]
  command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
  /// Run a flow project headlessly
  Run {
    /// Path to the project file (JSON)
    project_file: PathBuf,

    /// Arm authored breakpoints before starting
    #[arg(long)]
    debug: bool,

    /// Pump tick in milliseconds
    #[arg(long, default_value_t = 10)]
    tick_ms: u64,
  },

  /// Inspect a captured debug bundle
  Replay {
    /// Path to the bundle file
    bundle_file: PathBuf,
  },

  /// Validate a flow project against the built-in component kinds
  Validate {
    /// Path to the project file (JSON)
    project_file: PathBuf,
  },
}

fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
    .init();

  let cli = Cli::parse();

  let data_dir = cli.data_dir.unwrap_or_else(|| {
    dirs::home_dir()
      .expect("could not determine home directory")
      .join(".strand")
  });

  match cli.command {
    Some(Commands::Run {
      project_file,
      debug,
      tick_ms,
    }) => {
      run_project(project_file, debug, tick_ms, data_dir)?;
    }
    Some(Commands::Replay { bundle_file }) => {
      replay_bundle(bundle_file)?;
    }
    Some(Commands::Validate { project_file }) => {
      validate(project_file)?;
    }
    None => {
      println!("strand - use --help to see available commands");
    }
  }

  Ok(())
}

fn run_project(project_file: PathBuf, debug: bool, tick_ms: u64, data_dir: PathBuf) -> Result<()> {
  let rt = tokio::runtime::Runtime::new()?;
  rt.block_on(async { run_project_async(project_file, debug, tick_ms, data_dir).await })
}

async fn run_project_async(
  project_file: PathBuf,
  debug: bool,
  tick_ms: u64,
  data_dir: PathBuf,
) -> Result<()> {
  let content = tokio::fs::read_to_string(&project_file)
    .await
    .with_context(|| format!("failed to read project file: {}", project_file.display()))?;

  let project = FlowProject::from_json(&content)
    .with_context(|| format!("failed to parse project file: {}", project_file.display()))?;

  eprintln!("Loaded project: {} ({} flows)", project.name, project.flows.len());

  let registry = Arc::new(ComponentRegistry::with_builtins());
  let settings = RuntimeSettings::load(RuntimeSettings::path_for_project(&project_file));

  let mut runtime = Runtime::new(project, registry)
    .context("project failed validation")?
    .with_settings(settings);

  runtime.start(debug).context("failed to start runtime")?;

  let cancel = CancellationToken::new();
  {
    let cancel = cancel.clone();
    tokio::spawn(async move {
      let _ = tokio::signal::ctrl_c().await;
      cancel.cancel();
    });
  }

  runtime
    .drive(Duration::from_millis(tick_ms.max(1)), cancel)
    .await;

  match runtime.state() {
    RunState::Stopped(StopReason::Success) => {
      eprintln!("Flow stopped");
      Ok(())
    }
    RunState::Stopped(StopReason::Error) => {
      let error = runtime.error().unwrap_or("unknown error").to_string();

      // Persist the session for offline analysis.
      if let Err(e) = std::fs::create_dir_all(&data_dir) {
        eprintln!("Could not create data directory: {e}");
      } else {
        let bundle_path = data_dir.join(format!("{}.strand-debug", runtime.run_id()));
        let bundle = DebugBundle::capture(&runtime, &WatchList::new());
        match save_debug_bundle(&bundle_path, &bundle) {
          Ok(()) => eprintln!("Debug bundle exported to {}", bundle_path.display()),
          Err(e) => eprintln!("Could not export debug bundle: {e}"),
        }
      }

      anyhow::bail!("flow stopped with error: {error}")
    }
    other => anyhow::bail!("runtime ended in unexpected state: {other}"),
  }
}

fn replay_bundle(bundle_file: PathBuf) -> Result<()> {
  let replay = ReplayRuntime::load(&bundle_file)
    .with_context(|| format!("failed to load debug bundle: {}", bundle_file.display()))?;

  let bundle = replay.bundle();
  eprintln!("Loaded debug bundle (version {})", bundle.version);

  println!("components: {}", bundle.components.len());
  for (id, meta) in &bundle.components {
    println!("  {} ({}) in flow '{}'", id, meta.kind, meta.flow);
  }
  println!("breakpoints: {}", bundle.breakpoints.len());
  for entry in &bundle.breakpoints {
    let state = if entry.enabled { "enabled" } else { "disabled" };
    println!("  {} [{}]", entry.component, state);
  }
  println!("watches: {}", bundle.watches.len());
  for watch in &bundle.watches {
    println!("  {}", watch);
  }
  Ok(())
}

fn validate(project_file: PathBuf) -> Result<()> {
  let content = std::fs::read_to_string(&project_file)
    .with_context(|| format!("failed to read project file: {}", project_file.display()))?;

  let project = FlowProject::from_json(&content)
    .with_context(|| format!("failed to parse project file: {}", project_file.display()))?;

  let registry = ComponentRegistry::with_builtins();
  validate_project(&project, &registry).context("project failed validation")?;

  println!("{} ok ({} flows)", project.name, project.flows.len());
  Ok(())
}
