//! Run research chains from the command line.
//!
//! Reads the API key from the `OPENROUTER_KEY` environment variable.
//!
//! # Examples
//!
//! ```sh
//! # Five-step audience research
//! diligent run --mode dara --topic "plant-based protein" --region "Southeast Asia"
//!
//! # Selected deep-research modules, saved as JSON under logs/
//! diligent run --mode dd10 --topic "solid-state batteries" \
//!   --module deep_reasoning --module deep_synthesis --format json --save
//!
//! # List module catalogs
//! diligent modules --mode dd10
//!
//! # Re-render an exported artifact
//! diligent render artifact.json --format markdown
//! ```

use clap::{Parser, Subcommand};
use diligent::config::PipelineConfig;
use diligent::OpenRouterClient;
use diligent::format::{
    ReportFormat, default_report_path, display_name, extract_highlights, metadata_for_artifact,
    results_from_artifact, write_report,
};
use diligent::memory::{ArtifactMemory, artifact_schema};
use diligent::router::{DEEP_RESEARCH_COMPLETE, Mode, ResearchInput};
use diligent::service::ResearchService;
use std::path::{Path, PathBuf};
use std::process;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Templated, chained LLM research runs with versioned artifacts.
#[derive(Parser)]
#[command(name = "diligent", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run a research chain and print the report
    Run(RunArgs),
    /// List the modules of each catalog
    Modules {
        /// Only list this mode's catalog
        #[arg(long)]
        mode: Option<Mode>,
    },
    /// Render an exported artifact file as a report
    Render {
        /// Path to an artifact JSON export
        path: PathBuf,

        #[arg(long, value_enum, default_value_t = ReportFormat::Markdown)]
        format: ReportFormat,
    },
    /// Print the JSON Schema of exported artifacts
    Schema,
}

#[derive(clap::Args)]
struct RunArgs {
    // ── Request ────────────────────────────────────────────────
    /// Operating mode: dara, dd10 (didi) or custom
    #[arg(long)]
    mode: Option<String>,

    /// Research topic or niche
    #[arg(long)]
    topic: Option<String>,

    /// Geographic region
    #[arg(long)]
    region: Option<String>,

    /// Research type hint (selects dd10 when no mode is given)
    #[arg(long)]
    research_type: Option<String>,

    /// Module to run (repeatable, in order)
    #[arg(long = "module")]
    modules: Vec<String>,

    /// Free-form notes stored with the artifact
    #[arg(long)]
    notes: Option<String>,

    // ── Model ──────────────────────────────────────────────────
    /// Model id (overrides DILIGENT_MODEL)
    #[arg(long)]
    model: Option<String>,

    /// Sampling temperature
    #[arg(long)]
    temperature: Option<f32>,

    /// Maximum tokens per module response
    #[arg(long)]
    max_tokens: Option<u32>,

    /// OpenAI-compatible chat completions URL
    #[arg(long)]
    endpoint: Option<String>,

    // ── Templates and logs ─────────────────────────────────────
    /// Directory containing DARA.md and DeepSpec_Prompt_Library.md
    #[arg(long)]
    templates_dir: Option<PathBuf>,

    /// Record every prompt and response under the logs directory
    #[arg(long)]
    log_sessions: bool,

    /// Directory for session logs and saved reports
    #[arg(long)]
    logs_dir: Option<PathBuf>,

    // ── Output ─────────────────────────────────────────────────
    #[arg(long, value_enum, default_value_t = ReportFormat::Markdown)]
    format: ReportFormat,

    /// Save the report to this path
    #[arg(long)]
    output: Option<PathBuf>,

    /// Save the report under the logs directory
    #[arg(long)]
    save: bool,

    /// Also write the artifact export to this path
    #[arg(long)]
    export: Option<PathBuf>,

    /// Print highlight lines after the report
    #[arg(long)]
    highlights: bool,
}

impl RunArgs {
    fn input(&self) -> ResearchInput {
        let mut input = ResearchInput::new();
        input.mode = self.mode.clone();
        input.topic = self.topic.clone();
        input.region = self.region.clone();
        input.research_type = self.research_type.clone();
        input.notes = self.notes.clone();
        if !self.modules.is_empty() {
            input.modules = Some(self.modules.clone());
        }
        input
    }

    fn config(&self) -> PipelineConfig {
        let mut config = PipelineConfig::from_env();
        if let Some(model) = &self.model {
            config = config.with_model(model);
        }
        if let Some(t) = self.temperature {
            config = config.with_temperature(t);
        }
        if let Some(n) = self.max_tokens {
            config = config.with_max_tokens(n);
        }
        if let Some(dir) = &self.templates_dir {
            config = config.with_templates_dir(dir);
        }
        if self.log_sessions {
            config = config.with_session_logging(true);
        }
        if let Some(dir) = &self.logs_dir {
            config = config.with_logs_dir(dir);
        }
        config
    }
}

fn fail(msg: impl std::fmt::Display) -> ! {
    eprintln!("Error: {msg}");
    process::exit(1);
}

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Run(args) => run(args).await,
        Command::Modules { mode } => list_modules(mode),
        Command::Render { path, format } => render(&path, format),
        Command::Schema => match serde_json::to_string_pretty(&artifact_schema()) {
            Ok(text) => println!("{text}"),
            Err(e) => fail(e),
        },
    }
}

async fn run(args: RunArgs) {
    let config = args.config();
    let client = match OpenRouterClient::from_env() {
        Ok(c) => match &args.endpoint {
            Some(url) => c.with_endpoint(url),
            None => c,
        },
        Err(e) => fail(format!("failed to create API client: {e}")),
    };

    let logs_dir = config.logs_dir.clone();
    let service = ResearchService::new(client, config);
    let run = match service.run_chain(&args.input()).await {
        Ok(run) => run,
        Err(e) => fail(e),
    };

    let report = match args.format.render(&run.results, &run.report_metadata()) {
        Ok(text) => text,
        Err(e) => fail(e),
    };
    println!("{report}");

    if args.highlights {
        for h in extract_highlights(&run.results) {
            println!("[{}] {}", display_name(&h.module), h.text);
        }
    }

    let save_path = match (&args.output, args.save) {
        (Some(path), _) => Some(path.clone()),
        (None, true) => Some(default_report_path(&logs_dir, args.format)),
        (None, false) => None,
    };
    if let Some(path) = save_path
        && let Err(e) = write_report(&path, &report)
    {
        fail(e);
    }

    if let Some(path) = &args.export {
        let text = match service.export_artifact(&run.artifact_id) {
            Ok(text) => text,
            Err(e) => fail(e),
        };
        if let Err(e) = write_report(path, &text) {
            fail(e);
        }
    }

    eprintln!(
        "Session {}: {} completed, {} failed",
        run.artifact_id,
        run.results.completed_count(),
        run.results.failed_count()
    );
    if run.results.completed_count() == 0 && !run.results.is_empty() {
        process::exit(2);
    }
}

fn list_modules(mode: Option<Mode>) {
    let modes = match mode {
        Some(m) => vec![m],
        None => vec![Mode::Primary, Mode::Extended],
    };
    for mode in modes {
        println!("{mode}:");
        for module in mode.catalog() {
            println!("  {module:<24} {}", display_name(module));
        }
        if mode == Mode::Extended {
            println!(
                "  {DEEP_RESEARCH_COMPLETE:<24} {} (explicit only)",
                display_name(DEEP_RESEARCH_COMPLETE)
            );
        }
        if mode == Mode::Custom {
            println!("  (any module from the dara or dd10 catalogs)");
        }
    }
}

fn render(path: &Path, format: ReportFormat) {
    let text = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) => fail(format!("{}: {e}", path.display())),
    };
    let artifact = match ArtifactMemory::new().import_artifact(&text) {
        Ok(a) => a,
        Err(e) => fail(e),
    };
    let results = results_from_artifact(&artifact);
    let metadata = metadata_for_artifact(&artifact, diligent::now_rfc3339());
    match format.render(&results, &metadata) {
        Ok(report) => println!("{report}"),
        Err(e) => fail(e),
    }
}
