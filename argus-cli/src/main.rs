//! ARGUS CLI
//!
//! Multi-INT fusion and assessment over NDJSON feed files. Store state is
//! carried between invocations as a JSON snapshot next to the working
//! directory; the import path runs through the same validated writes as a
//! live sweep, so a hand-edited snapshot that breaks an invariant is
//! rejected, not loaded.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{Duration, Utc};
use clap::{Parser, Subcommand};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use argus_assess::{
    create_ollama_backend, create_openai_backend, AlertResolver, OllamaConfig,
    OpenAIBackendConfig, SharedBackend, Synthesizer, ThreatScorer,
};
use argus_core::{EngineConfig, IntelCategory, IntelRecord};
use argus_ingest::{CollectParams, FileAdapter, SourceAdapter, Sweep, SweepSummary};
use argus_store::{export, import_json, ExportFormat, IntelStore, MemoryStore, RecordFilter};

#[derive(Parser)]
#[command(name = "argus")]
#[command(author, version, about = "ARGUS: multi-INT fusion and assessment engine", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbosity level (0-3)
    #[arg(short, long, default_value = "1")]
    verbose: u8,

    /// Store snapshot file (JSON)
    #[arg(long, default_value = "argus_store.json")]
    store: PathBuf,
}

#[derive(Subcommand)]
enum Commands {
    /// Sweep raw items from NDJSON feed files into the store
    Ingest {
        /// Feed file(s), one raw item per line
        #[arg(short, long, required = true)]
        file: Vec<PathBuf>,

        /// Collection keyword recorded on normalized records
        #[arg(short, long)]
        keyword: Option<String>,

        /// Max items per feed (0 = unlimited)
        #[arg(long, default_value = "0")]
        limit: usize,
    },

    /// Generate an intelligence assessment for a scope
    Report {
        /// Scope to assess (country, topic, or keyword)
        scope: String,

        /// Assessment window in hours
        #[arg(long, default_value = "24")]
        hours: i64,

        /// Sweep these feed files before reporting
        #[arg(short, long)]
        file: Vec<PathBuf>,

        /// Output file for the SITREP (default: sitrep_<timestamp>.md)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Skip narrative synthesis; quantitative sections only
        #[arg(long)]
        no_llm: bool,

        /// Ollama host (or set OLLAMA_HOST env var)
        #[arg(long, env = "OLLAMA_HOST", default_value = "http://localhost:11434")]
        ollama_host: String,

        /// Use an OpenAI-compatible API instead of Ollama
        #[arg(long)]
        openai: bool,

        /// OpenAI API key (or set OPENAI_API_KEY env var)
        #[arg(long, env = "OPENAI_API_KEY")]
        api_key: Option<String>,

        /// Model name
        #[arg(short, long, default_value = "llama3.1")]
        model: String,
    },

    /// Show store counts and current posture
    Status,

    /// Export the store as JSON or CSV
    Export {
        /// Output format: json or csv
        #[arg(short, long, default_value = "json")]
        format: String,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => Level::ERROR,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_thread_ids(false)
        .compact()
        .init();

    // Invalid policy numbers are fatal before anything touches the store
    let config = EngineConfig::default();
    config.validate().context("invalid engine configuration")?;

    match cli.command {
        Commands::Ingest { file, keyword, limit } => {
            run_ingest(&config, &cli.store, &file, keyword, limit).await?;
        }
        Commands::Report {
            scope,
            hours,
            file,
            output,
            no_llm,
            ollama_host,
            openai,
            api_key,
            model,
        } => {
            let backend = if no_llm {
                None
            } else {
                Some(select_backend(openai, api_key, &ollama_host, &model)?)
            };
            run_report(&config, &cli.store, &scope, hours, &file, output, backend).await?;
        }
        Commands::Status => {
            run_status(&config, &cli.store)?;
        }
        Commands::Export { format, output } => {
            run_export(&cli.store, &format, output)?;
        }
    }

    Ok(())
}

fn select_backend(
    use_openai: bool,
    api_key: Option<String>,
    ollama_host: &str,
    model: &str,
) -> Result<SharedBackend> {
    if use_openai {
        let key = api_key.ok_or_else(|| {
            anyhow::anyhow!("OpenAI API key required. Set OPENAI_API_KEY or use --api-key")
        })?;
        Ok(create_openai_backend(OpenAIBackendConfig::openai(&key, model)))
    } else {
        Ok(create_ollama_backend(OllamaConfig::new(ollama_host, model)))
    }
}

fn load_store(path: &Path) -> Result<MemoryStore> {
    let store = MemoryStore::new();
    if path.exists() {
        let bytes = fs::read(path)
            .with_context(|| format!("reading store snapshot {}", path.display()))?;
        let count = import_json(&store, &bytes)
            .with_context(|| format!("loading store snapshot {}", path.display()))?;
        info!(records = count, path = %path.display(), "store snapshot loaded");
    }
    Ok(store)
}

fn save_store(store: &dyn IntelStore, path: &Path) -> Result<()> {
    let bytes = export(store, ExportFormat::Json).context("serializing store snapshot")?;
    fs::write(path, bytes)
        .with_context(|| format!("writing store snapshot {}", path.display()))?;
    Ok(())
}

async fn run_sweep(
    config: &EngineConfig,
    store: &dyn IntelStore,
    files: &[PathBuf],
    keywords: Vec<String>,
    limit: usize,
) -> SweepSummary {
    let adapters: Vec<Box<dyn SourceAdapter>> = files
        .iter()
        .map(|path| Box::new(FileAdapter::new(path)) as Box<dyn SourceAdapter>)
        .collect();

    let scorer = ThreatScorer::new(config.scoring.clone());
    let score = |record: &mut IntelRecord| scorer.apply(record);
    let params = CollectParams { keywords, limit };

    Sweep::new(config).run(&adapters, store, &params, &score).await
}

async fn run_ingest(
    config: &EngineConfig,
    store_path: &Path,
    files: &[PathBuf],
    keyword: Option<String>,
    limit: usize,
) -> Result<()> {
    println!("👁️ ARGUS - Multi-INT Fusion Engine\n");

    let store = load_store(store_path)?;
    let keywords = keyword.into_iter().collect();
    let summary = run_sweep(config, &store, files, keywords, limit).await;

    println!("📥 Collected: {} raw items from {} feed(s)", summary.collected, files.len());
    println!(
        "   Inserted: {} | Merged: {} | Rejected: {}",
        summary.outcome.inserted, summary.outcome.merged, summary.outcome.rejected
    );
    for (adapter, reason) in &summary.adapter_failures {
        println!("⚠️  Feed '{}' skipped: {}", adapter, reason);
    }

    save_store(&store, store_path)?;
    println!("\n💾 Store: {} records in {}", store.count()?, store_path.display());
    Ok(())
}

#[allow(clippy::too_many_arguments)]
async fn run_report(
    config: &EngineConfig,
    store_path: &Path,
    scope: &str,
    hours: i64,
    files: &[PathBuf],
    output: Option<PathBuf>,
    backend: Option<SharedBackend>,
) -> Result<()> {
    println!("👁️ ARGUS - Multi-INT Fusion Engine\n");
    println!("🔍 Scope: {} | Window: {}h", scope, hours);
    match &backend {
        Some(backend) => println!("🧠 Model: {}\n", backend.model_name()),
        None => println!("🧠 Narrative synthesis disabled (--no-llm)\n"),
    }

    let store = load_store(store_path)?;
    let scorer = ThreatScorer::new(config.scoring.clone());
    let synthesizer = Synthesizer::new(backend, scorer, config.synthesis.clone());

    if !files.is_empty() {
        // Topic framing is advisory; on any failure the scope itself tasks
        // the feeds.
        let keywords = synthesizer.frame_topic(scope).await;
        println!("📡 Sweeping {} feed(s) for: {}", files.len(), keywords.join(", "));
        let summary = run_sweep(config, &store, files, keywords, 0).await;
        println!(
            "   Inserted: {} | Merged: {} | Rejected: {}\n",
            summary.outcome.inserted, summary.outcome.merged, summary.outcome.rejected
        );
        save_store(&store, store_path)?;
    }

    let filter = RecordFilter {
        scope: Some(scope.to_string()),
        since: Some(Utc::now() - Duration::hours(hours)),
        ..Default::default()
    };
    let records = store.query(&filter)?;
    println!("📚 {} record(s) in scope", records.len());

    let resolver = AlertResolver::new(config.alert.clone());
    let sitrep = synthesizer.synthesize(scope, hours, &records, &resolver).await;
    let rendered = sitrep.render();

    let output_path = output.unwrap_or_else(|| {
        let timestamp = Utc::now().format("%Y-%m-%d_%H-%M-%S");
        PathBuf::from(format!("sitrep_{}.md", timestamp))
    });
    fs::write(&output_path, &rendered)
        .with_context(|| format!("writing SITREP to {}", output_path.display()))?;

    println!("🚨 Alert: {} | Aggregate: {:.1}/100", sitrep.alert.level, sitrep.aggregate_score);
    println!("📄 SITREP saved to: {}\n", output_path.display());

    println!("{}", "=".repeat(60));
    let preview: String = rendered.chars().take(1500).collect();
    println!("{}", preview);
    if rendered.len() > 1500 {
        println!("...\n[truncated - see full SITREP in output file]");
    }

    Ok(())
}

fn run_status(config: &EngineConfig, store_path: &Path) -> Result<()> {
    let store = load_store(store_path)?;
    let records = store.all()?;

    println!("👁️ ARGUS store status\n");
    println!("📦 Store: {} ({} records)", store_path.display(), records.len());

    for category in IntelCategory::ALL {
        let count = records.iter().filter(|r| r.category == category).count();
        println!("   {:<9} {}", format!("{}:", category), count);
    }

    let recent: Vec<IntelRecord> = records
        .into_iter()
        .filter(|r| r.collected_at >= Utc::now() - Duration::hours(24))
        .collect();
    let scorer = ThreatScorer::new(config.scoring.clone());
    let aggregate = scorer.aggregate(&recent, Utc::now());
    let resolver = AlertResolver::new(config.alert.clone());
    let state = resolver.observe("global", aggregate, Utc::now());

    println!("\n📈 24h aggregate: {:.1}/100 ({} recent records)", aggregate, recent.len());
    println!("🚨 Posture: {}", state.level);
    Ok(())
}

fn run_export(store_path: &Path, format: &str, output: Option<PathBuf>) -> Result<()> {
    let format: ExportFormat = format
        .parse()
        .map_err(|e: String| anyhow::anyhow!(e))
        .context("unsupported export format")?;

    let store = load_store(store_path)?;
    let bytes = export(&store, format).context("export failed")?;

    match output {
        Some(path) => {
            fs::write(&path, &bytes)
                .with_context(|| format!("writing export to {}", path.display()))?;
            println!("📤 Exported {} records to {}", store.count()?, path.display());
        }
        None => {
            print!("{}", String::from_utf8_lossy(&bytes));
        }
    }
    Ok(())
}
