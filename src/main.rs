use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use scout_core::RelevanceEngine;
use scout_core::bootstrap::{create_chat_provider, create_embedding_provider, warn_if_unreachable};
use scout_core::config::{Config, resolve_config_path};
use scout_core::context::format_file_context;
use scout_index::{IndexStore, PassReport, Reconciler};

#[derive(Parser, Debug)]
#[command(
    name = "scout",
    version,
    about = "Find the repository file most relevant to an issue description"
)]
struct Cli {
    /// Config file (default: $SCOUT_CONFIG, then config/default.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run one reconciliation pass and print its report
    Index { repo: PathBuf },
    /// Reconcile, then list the stored files nearest to an issue
    Search {
        repo: PathBuf,
        /// Issue text, or `-` to read it from stdin
        issue: String,
        /// Number of results (default: retrieval.max_candidates)
        #[arg(short, long, value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(1..))]
        k: Option<usize>,
    },
    /// Reconcile, rank, and let the chat model pick one file
    Select {
        repo: PathBuf,
        /// Issue text, or `-` to read it from stdin
        issue: String,
        /// Also print the chosen file rendered as prompt context
        #[arg(long)]
        context: bool,
    },
    /// Print the stored record for a repository-relative path
    Show { path: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_subscriber(cli.log_json);

    let config_path = resolve_config_path(cli.config.as_deref());
    let mut config = Config::load(&config_path)
        .with_context(|| format!("failed to load {}", config_path.display()))?;
    config.validate()?;
    config.resolve_secrets();
    tracing::debug!(
        config = %config_path.display(),
        provider = %config.llm.provider,
        "configuration loaded"
    );

    let store = open_store(&config).await?;

    match cli.command {
        Command::Index { repo } => {
            ensure_dir(&repo)?;
            let embedder = Arc::new(create_embedding_provider(&config)?);
            warn_if_unreachable(&embedder).await;
            let reconciler = Reconciler::new(embedder, config.reconciler_config());
            let report = reconciler.reconcile(&store, &repo).await?;
            print_report(&report);
        }
        Command::Search { repo, issue, k } => {
            ensure_dir(&repo)?;
            let issue = read_issue(issue)?;
            let embedder = Arc::new(create_embedding_provider(&config)?);
            warn_if_unreachable(&embedder).await;
            // Ranking never consults the chat model.
            let engine = RelevanceEngine::new(Arc::clone(&embedder), embedder, &config);
            engine.reconcile(&store, &repo).await?;
            let k = k.unwrap_or(config.retrieval.max_candidates);
            let candidates = engine.rank(&store, &issue, k).await?;
            if candidates.is_empty() {
                println!("no indexed files");
            }
            for c in candidates {
                println!("{:.4}\t{}", c.distance, c.path);
            }
        }
        Command::Select {
            repo,
            issue,
            context,
        } => {
            ensure_dir(&repo)?;
            let issue = read_issue(issue)?;
            let embedder = Arc::new(create_embedding_provider(&config)?);
            let chat = Arc::new(create_chat_provider(&config)?);
            warn_if_unreachable(&embedder).await;
            let engine = RelevanceEngine::new(embedder, chat, &config);
            let found = engine.find_relevant_file(&store, &repo, &issue).await?;
            println!("{}", found.path);
            if context {
                print!(
                    "\n{}",
                    format_file_context([(found.path.as_str(), found.content.as_str())])
                );
            }
        }
        Command::Show { path } => {
            let Some(file) = store.get(&path).await? else {
                bail!("{path} is not in the index");
            };
            println!("path:        {}", file.path);
            println!("fingerprint: {}", file.fingerprint);
            println!("embedding:   {} dims", file.embedding.len());
            println!("\n{}", file.content);
        }
    }

    Ok(())
}

async fn open_store(config: &Config) -> anyhow::Result<IndexStore> {
    let path = &config.index.sqlite_path;
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let path = path
        .to_str()
        .with_context(|| format!("sqlite path is not valid UTF-8: {}", path.display()))?;
    IndexStore::open(path)
        .await
        .with_context(|| format!("failed to open index at {path}"))
}

fn ensure_dir(repo: &Path) -> anyhow::Result<()> {
    if !repo.is_dir() {
        bail!("{} is not a directory", repo.display());
    }
    Ok(())
}

fn read_issue(issue: String) -> anyhow::Result<String> {
    if issue != "-" {
        return Ok(issue);
    }
    let mut buf = String::new();
    std::io::stdin()
        .read_to_string(&mut buf)
        .context("failed to read issue from stdin")?;
    Ok(buf)
}

fn print_report(report: &PassReport) {
    println!(
        "scanned {} files: {} indexed, {} unchanged, {} skipped, {} failed, {} removed",
        report.files_scanned(),
        report.indexed_count(),
        report.unchanged_count(),
        report.skipped_count(),
        report.failed_count(),
        report.removed.len(),
    );
    println!(
        "{} embedding calls in {} ms",
        report.embed_calls, report.duration_ms
    );
    if report.model_changed {
        println!("embedding model changed: index rebuilt");
    }
    for (path, reason) in report.failures() {
        println!("failed  {path}: {reason}");
    }
}

fn init_subscriber(json: bool) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}
