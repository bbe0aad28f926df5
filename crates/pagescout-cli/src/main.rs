mod output;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use pagescout_core::config_file::ConfigFile;
use pagescout_core::{Config, Resolution, Resolver, build_resolution_cache};
use output::{BatchSummary, ColorMode};

#[derive(Parser)]
#[command(
    name = "pagescout",
    version,
    about = "Resolve paper titles to bibliographic records, page numbers included"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Semantic Scholar API key
    #[arg(long, env = "S2_API_KEY", global = true, hide_env_values = true)]
    s2_api_key: Option<String>,

    /// Email for the CrossRef polite pool
    #[arg(long, env = "CROSSREF_MAILTO", global = true)]
    crossref_mailto: Option<String>,

    /// API key for the LLM extraction fallback
    #[arg(long, env = "PAGESCOUT_LLM_API_KEY", global = true, hide_env_values = true)]
    llm_api_key: Option<String>,

    /// Enable the LLM extraction fallback
    #[arg(long, global = true)]
    llm: bool,

    /// Path to the cache database
    #[arg(long, global = true)]
    cache_path: Option<PathBuf>,

    /// Comma-separated source priority order
    #[arg(long, global = true, value_delimiter = ',')]
    sources: Option<Vec<String>>,

    #[arg(long, global = true, value_enum, default_value = "auto")]
    color: ColorMode,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Command {
    /// Resolve a single paper title
    Search {
        /// The title to resolve
        title: String,
        /// Skip cache reads (the result is still recorded)
        #[arg(long)]
        no_cache: bool,
        /// Print the record as JSON
        #[arg(long)]
        json: bool,
        /// Print a BibTeX entry
        #[arg(long)]
        bibtex: bool,
        /// Print a formatted reference line
        #[arg(long)]
        cite: bool,
    },
    /// Resolve every title in a file, one per line
    Batch {
        file: PathBuf,
        #[arg(long)]
        no_cache: bool,
        /// Print results as a JSON array
        #[arg(long)]
        json: bool,
    },
    /// Inspect or empty the resolution cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(Subcommand)]
enum CacheAction {
    /// Entry counts and hit/miss figures
    Stats,
    /// Remove every cached resolution
    Clear,
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "pagescout_core=info,pagescout=info,warn",
        2 => "pagescout_core=debug,pagescout=debug,info",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn default_cache_path() -> Option<PathBuf> {
    dirs::cache_dir().map(|d| d.join("pagescout").join("cache.db"))
}

fn build_config(cli: &Cli) -> Config {
    let mut config = ConfigFile::load().apply(Config::default());

    if let Some(key) = &cli.s2_api_key {
        config.s2_api_key = Some(key.clone());
    }
    if let Some(mailto) = &cli.crossref_mailto {
        config.crossref_mailto = Some(mailto.clone());
    }
    if let Some(key) = &cli.llm_api_key {
        config.llm.api_key = Some(key.clone());
    }
    if cli.llm {
        config.llm.enabled = true;
    }
    if let Some(order) = &cli.sources {
        config.source_order = order.clone();
    }
    if let Some(path) = &cli.cache_path {
        config.cache_path = Some(path.clone());
    }
    if config.cache_path.is_none() {
        config.cache_path = default_cache_path();
    }
    // Command-line credentials change quotas the same way file ones do.
    config.rate_limiters = std::sync::Arc::new(pagescout_core::RateLimiters::new(
        config.s2_api_key.is_some(),
        config.crossref_mailto.is_some(),
    ));
    config
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let color = cli.color.enabled();
    let config = build_config(&cli);

    match &cli.command {
        Command::Search {
            title,
            no_cache,
            json,
            bibtex,
            cite,
        } => {
            let resolver = Resolver::new(config)?;
            match resolver.resolve(title, !*no_cache).await {
                Resolution::Resolved(paper) => {
                    if *json {
                        println!("{}", serde_json::to_string_pretty(&paper)?);
                    } else if *bibtex {
                        output::print_bibtex(&paper);
                    } else if *cite {
                        output::print_citation(&paper);
                    } else {
                        output::print_resolved(&paper, color);
                    }
                }
                Resolution::NotFound => {
                    if *json {
                        println!("null");
                    } else {
                        output::print_not_found(title, color);
                    }
                    std::process::exit(1);
                }
            }
        }

        Command::Batch {
            file,
            no_cache,
            json,
        } => {
            let text = std::fs::read_to_string(file)
                .with_context(|| format!("reading {}", file.display()))?;
            let titles: Vec<String> = text
                .lines()
                .map(str::trim)
                .filter(|l| !l.is_empty() && !l.starts_with('#'))
                .map(str::to_string)
                .collect();
            if titles.is_empty() {
                anyhow::bail!("no titles in {}", file.display());
            }

            let resolver = Resolver::new(config)?;
            let cancel = CancellationToken::new();
            let ctrlc = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    tracing::info!("interrupted, finishing current title");
                    ctrlc.cancel();
                }
            });

            let results = resolver.resolve_batch(&titles, !*no_cache, cancel).await;

            if *json {
                let entries: Vec<serde_json::Value> = results
                    .iter()
                    .map(|(title, resolution)| match resolution {
                        Resolution::Resolved(paper) => serde_json::json!({
                            "query": title,
                            "paper": paper,
                        }),
                        Resolution::NotFound => serde_json::json!({
                            "query": title,
                            "paper": null,
                        }),
                    })
                    .collect();
                println!("{}", serde_json::to_string_pretty(&entries)?);
            } else {
                let mut summary = BatchSummary {
                    resolved: 0,
                    with_pages: 0,
                    not_found: 0,
                };
                for (title, resolution) in &results {
                    match resolution {
                        Resolution::Resolved(paper) => {
                            summary.resolved += 1;
                            if paper.record.pages.is_some() {
                                summary.with_pages += 1;
                            }
                            output::print_resolved(paper, color);
                        }
                        Resolution::NotFound => {
                            summary.not_found += 1;
                            output::print_not_found(title, color);
                        }
                    }
                }
                output::print_batch_summary(&summary, color);
            }
        }

        Command::Cache { action } => {
            let cache = build_resolution_cache(
                config.cache_path.as_deref(),
                config.cache_positive_ttl_secs,
                config.cache_negative_ttl_secs,
            );
            match action {
                CacheAction::Stats => {
                    output::print_cache_stats(&cache.stats(), color);
                }
                CacheAction::Clear => {
                    let removed = cache.clear();
                    println!("removed {removed} cached resolutions");
                }
            }
        }
    }
    Ok(())
}
