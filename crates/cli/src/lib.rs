use anyhow::{Context as AnyhowContext, Result};
use clap::{Args, Parser, Subcommand};
use entity_enrich::{
    load_commit_history, reference_graph, CommandLabeler, EnrichConfig, EnrichReport, EnrichedEntity, Enricher,
    Labeler, RunStats, StaticLabeler,
};
use entity_graph::ReferenceKind;
use entity_indexer::{write_base_snapshot, EntityIndexer, ExtractionStats};
use serde::Serialize;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

mod flags;

use flags::InsertPositionFlag;

fn print_stdout(text: &str) -> Result<()> {
    use std::io::Write;

    let mut stdout = io::stdout().lock();
    if let Err(err) = stdout
        .write_all(text.as_bytes())
        .and_then(|_| stdout.write_all(b"\n"))
        .and_then(|_| stdout.flush())
    {
        if err.kind() == io::ErrorKind::BrokenPipe {
            return Ok(());
        }
        return Err(err.into());
    }
    Ok(())
}

#[derive(Parser)]
#[command(name = "entity-enrich")]
#[command(about = "Entity extraction and enrichment for front-end projects", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Quiet mode: log only warnings/errors
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract exported entities into a base snapshot
    Extract(ExtractArgs),

    /// Label entities and write their annotations back into the sources
    Enrich(EnrichArgs),

    /// Re-run static analysis, keeping previous labels
    #[command(name = "refresh-static")]
    RefreshStatic(EnrichArgs),

    /// Show references between enriched entities
    Graph(GraphArgs),
}

#[derive(Args)]
struct ExtractArgs {
    /// Project directory (defaults to current directory)
    #[arg(long, default_value = ".")]
    root: PathBuf,

    /// Base snapshot, relative to the project directory
    #[arg(long, short = 'o', default_value = "entities.json")]
    output: PathBuf,

    /// Import that marks an entity as DDD
    #[arg(long)]
    di_package: Option<String>,

    /// Output JSON format
    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct EnrichArgs {
    /// Base snapshot (default: entities.json)
    input: Option<PathBuf>,

    /// Enriched snapshot (default: entities.enriched.json)
    output: Option<PathBuf>,

    /// Project directory (defaults to current directory)
    #[arg(long, default_value = ".")]
    root: PathBuf,

    /// JSON file with enrichment settings
    #[arg(long)]
    config: Option<PathBuf>,

    /// Labeler calls in flight at once
    #[arg(long)]
    concurrency: Option<usize>,

    /// Retries per entity after a failed labeler call
    #[arg(long)]
    retries: Option<usize>,

    /// Delay between retries (ms)
    #[arg(long)]
    retry_delay: Option<u64>,

    /// Deadline per labeler call (ms)
    #[arg(long)]
    timeout: Option<u64>,

    /// Leave source files untouched
    #[arg(long)]
    no_write: bool,

    /// Where new annotations go relative to their declaration
    #[arg(long, value_enum)]
    insert_position: Option<InsertPositionFlag>,

    /// Import that marks an entity as DDD
    #[arg(long)]
    di_package: Option<String>,

    /// External labeler: reads a JSON request on stdin, prints JSON labels
    #[arg(long)]
    labeler: Option<String>,

    /// Argument for the labeler program (repeatable)
    #[arg(long = "labeler-arg", allow_hyphen_values = true)]
    labeler_args: Vec<String>,

    /// Commit history JSON keyed by entity id
    #[arg(long)]
    commit_history: Option<PathBuf>,

    /// Output JSON format
    #[arg(long)]
    json: bool,
}

impl EnrichArgs {
    fn config(&self) -> Result<EnrichConfig> {
        let base: EnrichConfig = match &self.config {
            Some(path) => {
                let text = std::fs::read_to_string(path)
                    .with_context(|| format!("Cannot read config {}", path.display()))?;
                serde_json::from_str(&text).with_context(|| format!("Invalid config {}", path.display()))?
            }
            None => EnrichConfig::default(),
        };
        let mut config = base.with_env_overrides();

        if let Some(input) = &self.input {
            config.input_path = input.clone();
        }
        if let Some(output) = &self.output {
            config.output_path = output.clone();
        }
        if let Some(concurrency) = self.concurrency {
            config.concurrency = concurrency;
        }
        if let Some(retries) = self.retries {
            config.max_retries = retries;
        }
        if let Some(delay) = self.retry_delay {
            config.retry_delay_ms = delay;
        }
        if let Some(timeout) = self.timeout {
            config.labeler_timeout_ms = timeout;
        }
        if self.no_write {
            config.write_annotations = false;
        }
        if let Some(position) = self.insert_position {
            config.insert_position = position.as_domain();
        }
        if let Some(package) = &self.di_package {
            config.di_package = package.clone();
        }
        if let Some(program) = &self.labeler {
            config.labeler_command = std::iter::once(program.clone())
                .chain(self.labeler_args.iter().cloned())
                .collect();
        }

        config.validate()?;
        Ok(config)
    }
}

#[derive(Args)]
struct GraphArgs {
    /// Project directory (defaults to current directory)
    #[arg(long, default_value = ".")]
    root: PathBuf,

    /// Enriched snapshot, relative to the project directory
    #[arg(long, default_value = "entities.enriched.json")]
    input: PathBuf,

    /// Entity to list dependents and dependencies for
    #[arg(long)]
    id: Option<String>,

    /// Output JSON format
    #[arg(long)]
    json: bool,
}

#[derive(Serialize)]
struct ExtractOutput<'a> {
    output: &'a Path,
    stats: &'a ExtractionStats,
}

#[derive(Serialize)]
struct RunOutput<'a> {
    output: &'a Path,
    stats: &'a RunStats,
}

#[derive(Serialize)]
struct ReferenceRow {
    id: String,
    kind: ReferenceKind,
}

#[derive(Serialize)]
struct EntityReferences {
    id: String,
    dependents: Vec<ReferenceRow>,
    dependencies: Vec<ReferenceRow>,
}

fn rows(references: Vec<(String, ReferenceKind)>) -> Vec<ReferenceRow> {
    references
        .into_iter()
        .map(|(id, kind)| ReferenceRow { id, kind })
        .collect()
}

const fn kind_label(kind: ReferenceKind) -> &'static str {
    match kind {
        ReferenceKind::Imports => "imports",
        ReferenceKind::Calls => "calls",
        ReferenceKind::Emits => "emits",
    }
}

fn resolve_against(root: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        root.join(path)
    }
}

fn labeler_for(config: &EnrichConfig) -> Arc<dyn Labeler> {
    match CommandLabeler::from_command_line(&config.labeler_command) {
        Some(labeler) => Arc::new(labeler),
        None => Arc::new(StaticLabeler),
    }
}

pub async fn main_entry() -> Result<()> {
    let mut cli = Cli::parse();

    let json_output = match &cli.command {
        Commands::Extract(args) => args.json,
        Commands::Enrich(args) | Commands::RefreshStatic(args) => args.json,
        Commands::Graph(args) => args.json,
    };
    if json_output {
        cli.quiet = true;
    }

    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if cli.quiet {
        builder.filter_level(log::LevelFilter::Warn);
    } else if cli.verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }
    builder.target(env_logger::Target::Stderr).init();

    match cli.command {
        Commands::Extract(args) => run_extract(args).await?,
        Commands::Enrich(args) => run_enrich(args, false).await?,
        Commands::RefreshStatic(args) => run_enrich(args, true).await?,
        Commands::Graph(args) => run_graph(args).await?,
    }

    Ok(())
}

async fn run_extract(args: ExtractArgs) -> Result<()> {
    let mut indexer = EntityIndexer::new(&args.root).context("Invalid project path")?;
    if let Some(package) = &args.di_package {
        indexer = indexer.with_di_package(package);
    }
    let extraction = indexer.extract_all().await;

    let output = resolve_against(indexer.project_dir(), &args.output);
    write_base_snapshot(&output, &extraction.entities)
        .await
        .with_context(|| format!("Failed to write {}", output.display()))?;

    if args.json {
        let response = ExtractOutput {
            output: &output,
            stats: &extraction.stats,
        };
        print_stdout(&serde_json::to_string_pretty(&response)?)?;
    } else {
        println!(
            "Extracted {} entities from {} files into {}",
            extraction.stats.entities,
            extraction.stats.files,
            output.display()
        );
        for error in &extraction.stats.errors {
            eprintln!("  failed: {error}");
        }
    }
    Ok(())
}

async fn run_enrich(args: EnrichArgs, refresh_only: bool) -> Result<()> {
    let config = args.config()?;
    let labeler = labeler_for(&config);
    let mut enricher = Enricher::new(&args.root, config, labeler).context("Failed to prepare enrichment")?;
    if let Some(path) = &args.commit_history {
        let history = load_commit_history(path)
            .await
            .with_context(|| format!("Failed to load commit history {}", path.display()))?;
        enricher = enricher.with_commit_history(history);
    }

    let report: EnrichReport = if refresh_only {
        enricher.refresh_static().await.context("Static refresh failed")?
    } else {
        enricher.run().await.context("Enrichment failed")?
    };

    if args.json {
        let response = RunOutput {
            output: &report.output_path,
            stats: &report.stats,
        };
        print_stdout(&serde_json::to_string_pretty(&response)?)?;
    } else {
        let stats = &report.stats;
        println!("Wrote {} entities to {}", stats.total, report.output_path.display());
        println!(
            "  {} unchanged, {} annotation-only, {} relabeled, {} failed, {} files rewritten",
            stats.unchanged, stats.annotation_updated, stats.relabeled, stats.failed, stats.files_rewritten
        );
    }
    Ok(())
}

async fn run_graph(args: GraphArgs) -> Result<()> {
    let root = args.root.canonicalize().context("Invalid project path")?;
    let path = resolve_against(&root, &args.input);
    let bytes = tokio::fs::read(&path)
        .await
        .with_context(|| format!("Cannot read {}", path.display()))?;
    let entities: Vec<EnrichedEntity> =
        serde_json::from_slice(&bytes).with_context(|| format!("Invalid enriched snapshot {}", path.display()))?;
    let graph = reference_graph(&entities);

    let Some(id) = args.id else {
        if args.json {
            print_stdout(&serde_json::to_string_pretty(&graph.summary())?)?;
        } else {
            println!("{} nodes, {} edges", graph.node_count(), graph.edge_count());
        }
        return Ok(());
    };

    let references = EntityReferences {
        dependents: rows(graph.dependents(&id)?),
        dependencies: rows(graph.dependencies(&id)?),
        id,
    };
    if args.json {
        print_stdout(&serde_json::to_string_pretty(&references)?)?;
    } else {
        println!("{}", references.id);
        for row in &references.dependents {
            println!("  <- {} ({})", row.id, kind_label(row.kind));
        }
        for row in &references.dependencies {
            println!("  -> {} ({})", row.id, kind_label(row.kind));
        }
    }
    Ok(())
}
