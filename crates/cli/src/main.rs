use anyhow::{bail, Context as AnyhowContext, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use docprep_chunker::{
    BuiltinModels, Chunk, ChunkingEngine, ChunkingStats, EngineConfig, ManifestModels,
    ModelRegistry, ProcessReport, ValidationReport,
};
use serde::Serialize;
use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

mod report;

#[derive(Parser)]
#[command(name = "docprep")]
#[command(about = "Hierarchical, model-aware document chunking for RAG", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Quiet mode: log only warnings/errors (stdout is reserved for JSON)
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Chunk documents and print chunks as JSON
    Chunk(ChunkArgs),

    /// Chunk documents and print token-limit compliance per document
    Validate(ChunkArgs),

    /// List known embedding models and their token budgets
    Models(ModelsArgs),

    /// Show the strategy table resolved for a model
    Strategies(EngineArgs),
}

#[derive(Clone, Copy, ValueEnum)]
enum Preset {
    Precision,
    Recall,
    Speed,
}

#[derive(Args)]
struct EngineArgs {
    /// Engine config file (.toml or .json)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Configuration preset used when no config file is given
    #[arg(long, value_enum, conflicts_with = "config")]
    preset: Option<Preset>,

    /// Target embedding model id
    #[arg(long)]
    model: Option<String>,

    /// Directory with a models manifest.json (replaces the built-in model table)
    #[arg(long)]
    models_dir: Option<PathBuf>,

    /// Max tokens per chunk for every strategy
    #[arg(long)]
    max_tokens: Option<usize>,

    /// Overlap tokens for every strategy
    #[arg(long)]
    overlap_tokens: Option<usize>,

    /// Disable tree-sitter code splitting
    #[arg(long)]
    no_syntax: bool,

    /// Disable semantic-boundary prose splitting
    #[arg(long)]
    no_semantic: bool,

    /// Disable the quality gate
    #[arg(long)]
    no_quality_gate: bool,
}

#[derive(Args)]
struct ChunkArgs {
    /// Files to chunk; `-` reads stdin
    #[arg(required = true)]
    paths: Vec<PathBuf>,

    #[command(flatten)]
    engine: EngineArgs,

    /// Strategy name overriding the classifier
    #[arg(long)]
    strategy: Option<String>,

    /// Filename used for classification and language hints when reading stdin
    #[arg(long, default_value = "stdin.md")]
    stdin_name: String,

    /// Write a markdown summary to this path
    #[arg(long)]
    report: Option<PathBuf>,

    /// Pretty-print JSON output
    #[arg(long)]
    pretty: bool,
}

#[derive(Args)]
struct ModelsArgs {
    /// Directory with a models manifest.json
    #[arg(long)]
    models_dir: Option<PathBuf>,
}

#[derive(Serialize)]
struct DocumentOutput {
    path: String,
    report: ProcessReport,
    chunks: Vec<Chunk>,
}

#[derive(Serialize)]
struct ValidationOutput {
    path: String,
    validation: ValidationReport,
    stats: String,
}

#[derive(Serialize)]
struct ModelOutput {
    id: String,
    max_tokens: usize,
    dimension: usize,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if cli.quiet {
        builder.filter_level(log::LevelFilter::Warn);
    } else if cli.verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }
    builder.target(env_logger::Target::Stderr).init();

    match cli.command {
        Commands::Chunk(args) => run_chunk(args)?,
        Commands::Validate(args) => run_validate(args)?,
        Commands::Models(args) => run_models(&args)?,
        Commands::Strategies(args) => run_strategies(&args)?,
    }

    Ok(())
}

fn load_registry(models_dir: Option<&Path>) -> Result<Box<dyn ModelRegistry>> {
    match models_dir {
        Some(dir) => {
            let registry = ManifestModels::from_dir(dir)
                .with_context(|| format!("Failed to load models from {}", dir.display()))?;
            Ok(Box::new(registry))
        }
        None => Ok(Box::new(BuiltinModels::new())),
    }
}

fn load_config(args: &EngineArgs) -> Result<EngineConfig> {
    let config = match (&args.config, args.preset) {
        (Some(path), _) => EngineConfig::from_path(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        (None, Some(Preset::Precision)) => EngineConfig::for_precision(),
        (None, Some(Preset::Recall)) => EngineConfig::for_recall(),
        (None, Some(Preset::Speed)) => EngineConfig::for_speed(),
        (None, None) => EngineConfig::default(),
    };
    let mut config = config.apply_env()?;

    if let Some(model) = &args.model {
        config.model = Some(model.clone());
    }
    if let Some(max) = args.max_tokens {
        config.max_tokens_override = Some(max);
    }
    if let Some(overlap) = args.overlap_tokens {
        config.overlap_tokens_override = Some(overlap);
    }
    if args.no_syntax {
        config.syntax_enabled = false;
    }
    if args.no_semantic {
        config.semantic_enabled = false;
    }
    if args.no_quality_gate {
        config.quality.enabled = false;
    }
    Ok(config)
}

fn build_engine(args: &EngineArgs) -> Result<ChunkingEngine> {
    let config = load_config(args)?;
    let engine = ChunkingEngine::builder(config)
        .registry(load_registry(args.models_dir.as_deref())?)
        .build()
        .context("Failed to build chunking engine")?;
    Ok(engine)
}

fn process_all(engine: &ChunkingEngine, args: &ChunkArgs) -> Result<Vec<DocumentOutput>> {
    let mut outputs = Vec::with_capacity(args.paths.len());
    for path in &args.paths {
        let strategy = args.strategy.as_deref();
        let (label, outcome) = if path.as_os_str() == "-" {
            let mut text = String::new();
            io::stdin()
                .read_to_string(&mut text)
                .context("Failed to read stdin")?;
            let outcome = engine.process(&text, &args.stdin_name, strategy)?;
            (args.stdin_name.clone(), outcome)
        } else {
            if path.is_dir() {
                bail!("{} is a directory; pass files", path.display());
            }
            let outcome = engine
                .process_file(path, strategy)
                .with_context(|| format!("Failed to chunk {}", path.display()))?;
            (path.display().to_string(), outcome)
        };
        outputs.push(DocumentOutput {
            path: label,
            report: outcome.report,
            chunks: outcome.chunks,
        });
    }
    Ok(outputs)
}

fn print_json<T: Serialize>(value: &T, pretty: bool) -> Result<()> {
    let mut stdout = io::stdout().lock();
    if pretty {
        serde_json::to_writer_pretty(&mut stdout, value)?;
    } else {
        serde_json::to_writer(&mut stdout, value)?;
    }
    writeln!(stdout)?;
    Ok(())
}

fn run_chunk(args: ChunkArgs) -> Result<()> {
    let engine = build_engine(&args.engine)?;
    let outputs = process_all(&engine, &args)?;

    if let Some(report_path) = &args.report {
        let md = report::render_chunk_report(engine.model(), &outputs);
        fs::write(report_path, md)
            .with_context(|| format!("Failed to write report {}", report_path.display()))?;
        log::info!("Report written to {}", report_path.display());
    }

    print_json(&outputs, args.pretty)
}

fn run_validate(args: ChunkArgs) -> Result<()> {
    let engine = build_engine(&args.engine)?;
    let outputs: Vec<ValidationOutput> = process_all(&engine, &args)?
        .into_iter()
        .map(|doc| {
            let validation = engine.validate(&doc.chunks);
            if validation.invalid > 0 {
                log::warn!(
                    "{}: {} of {} chunks exceed {} tokens",
                    doc.path,
                    validation.invalid,
                    validation.total,
                    validation.model_max_tokens
                );
            }
            ValidationOutput {
                stats: ChunkingStats::from_chunks(&doc.chunks).to_string(),
                path: doc.path,
                validation,
            }
        })
        .collect();
    print_json(&outputs, args.pretty)
}

fn run_models(args: &ModelsArgs) -> Result<()> {
    let registry = load_registry(args.models_dir.as_deref())?;
    let models: Vec<ModelOutput> = registry
        .available()
        .into_iter()
        .filter_map(|id| registry.resolve(&id))
        .map(|spec| ModelOutput {
            id: spec.name,
            max_tokens: spec.max_tokens,
            dimension: spec.vector_dim,
        })
        .collect();
    print_json(&models, true)
}

fn run_strategies(args: &EngineArgs) -> Result<()> {
    let engine = build_engine(args)?;
    let strategies: Vec<_> = engine.strategies().iter().collect();
    print_json(&strategies, true)
}
