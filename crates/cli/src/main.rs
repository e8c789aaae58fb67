//! `career-flow` CLI entry-point.
//!
//! Available sub-commands:
//! - `validate` — validate a workflow definition JSON file.
//! - `list`     — list the predefined workflows.
//! - `run`      — run a predefined or file-defined workflow on JSON input.

mod providers;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, bail};
use clap::{Args, Parser, Subcommand};
use engine::{Engine, EngineError, WorkflowDefinition, presets};
use nodes::{LlmCaller, LlmDefaults, OrchestrationContext, ResultCache};
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use providers::{DEFAULT_BASE_URL, EchoLlm, FileCache, OpenAiCaller, ReqwestFetcher};

#[derive(Parser)]
#[command(
    name = "career-flow",
    about = "Career-networking analysis workflows",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Validate a workflow definition JSON file.
    Validate {
        /// Path to the workflow JSON file.
        path: PathBuf,
    },
    /// List the predefined workflows.
    List,
    /// Run a workflow against a JSON input.
    Run(RunArgs),
}

#[derive(Args)]
struct RunArgs {
    /// Name of a predefined workflow.
    #[arg(long, conflicts_with = "definition", required_unless_present = "definition")]
    workflow: Option<String>,

    /// Path to a workflow definition JSON file.
    #[arg(long)]
    definition: Option<PathBuf>,

    /// Input JSON file, or `-` for stdin.
    #[arg(long, default_value = "-")]
    input: String,

    /// Answer LLM calls with the rendered prompt instead of a provider.
    #[arg(long)]
    dry_run: bool,

    #[arg(long, env = "LLM_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    #[arg(long, env = "LLM_BASE_URL", default_value = DEFAULT_BASE_URL)]
    base_url: String,

    #[arg(long, env = "LLM_MODEL")]
    model: Option<String>,

    /// Directory holding cached results.
    #[arg(long, requires = "cache_key")]
    cache_dir: Option<PathBuf>,

    /// Stable identifier for the cached result, e.g. the profile URL.
    #[arg(long, requires = "cache_dir")]
    cache_key: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Validate { path } => {
            let definition = load_definition(&path)?;
            match Engine::new().create_workflow(workflow_name(&path), &definition) {
                Ok(workflow) => {
                    let order = workflow.execution_order()?;
                    println!("✅ Workflow is valid. Execution order: {order:?}");
                }
                Err(e) => {
                    eprintln!("❌ Validation failed: {e}");
                    std::process::exit(1);
                }
            }
        }
        Command::List => {
            let engine = preset_engine()?;
            for name in engine.workflow_names() {
                let description = engine
                    .workflow(name)
                    .and_then(|wf| wf.description().map(str::to_string))
                    .unwrap_or_default();
                println!("{name:<22} {description}");
            }
        }
        Command::Run(args) => {
            if let Err(e) = run(args).await {
                // Engine errors already embed their cause in the message.
                if e.is::<EngineError>() {
                    eprintln!("analysis failed: {e}");
                } else {
                    eprintln!("analysis failed: {e:#}");
                }
                std::process::exit(1);
            }
        }
    }
    Ok(())
}

async fn run(args: RunArgs) -> anyhow::Result<()> {
    let mut engine = preset_engine()?;
    let name = match (&args.workflow, &args.definition) {
        (Some(name), _) => name.clone(),
        (None, Some(path)) => {
            let name = workflow_name(path);
            engine.create_workflow(name.clone(), &load_definition(path)?)?;
            name
        }
        (None, None) => bail!("either --workflow or --definition is required"),
    };

    let cache: Option<(FileCache, String)> = args
        .cache_dir
        .as_ref()
        .zip(args.cache_key.as_ref())
        .map(|(dir, key)| (FileCache::new(dir), key.clone()));

    if let Some((cache, key)) = &cache {
        if let Some(hit) = cache.get(key).await? {
            info!(%key, "using cached result");
            println!("{}", serde_json::to_string_pretty(&hit)?);
            return Ok(());
        }
    }

    let input = read_input(&args.input).await?;
    let llm: Arc<dyn LlmCaller> = if args.dry_run {
        Arc::new(EchoLlm)
    } else if let Some(key) = &args.api_key {
        Arc::new(OpenAiCaller::new(args.base_url.clone(), key.clone()))
    } else {
        bail!("no LLM provider configured: set LLM_API_KEY or pass --dry-run");
    };

    let mut defaults = LlmDefaults::default();
    if let Some(model) = &args.model {
        defaults.model = model.clone();
    }

    let cancellation = CancellationToken::new();
    let on_interrupt = cancellation.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, cancelling");
            on_interrupt.cancel();
        }
    });

    let services = OrchestrationContext::new()
        .with_llm(llm)
        .with_http(Arc::new(ReqwestFetcher::new()))
        .with_llm_defaults(defaults)
        .with_cancellation(cancellation)
        .with_metadata("source", Value::String("cli".into()));
    let services = match &cache {
        Some((_, key)) => services.with_metadata("cacheKey", Value::String(key.clone())),
        None => services,
    };

    let result = engine.execute(&name, input, services).await?;
    info!(execution_id = %result.execution_id, "analysis complete");

    let output = Value::Object(result.output);
    if let Some((cache, key)) = &cache {
        if !args.dry_run {
            cache.put(key, output.clone()).await?;
        }
    }
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn preset_engine() -> anyhow::Result<Engine> {
    let mut engine = Engine::new();
    presets::install(&mut engine).context("predefined workflows failed validation")?;
    Ok(engine)
}

fn load_definition(path: &Path) -> anyhow::Result<WorkflowDefinition> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read file {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("invalid workflow JSON in {}", path.display()))
}

/// The file stem, so `flows/intro.json` registers as `intro`.
fn workflow_name(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "custom".to_string())
}

async fn read_input(source: &str) -> anyhow::Result<Value> {
    let raw = if source == "-" {
        use tokio::io::AsyncReadExt;
        let mut buf = String::new();
        tokio::io::stdin()
            .read_to_string(&mut buf)
            .await
            .context("cannot read input from stdin")?;
        buf
    } else {
        tokio::fs::read_to_string(source)
            .await
            .with_context(|| format!("cannot read input file {source}"))?
    };
    serde_json::from_str(&raw).context("input is not valid JSON")
}
