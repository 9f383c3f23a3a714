use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use sitescribe::config::Config;

mod commands;

#[derive(Parser)]
#[command(
    name = "sitescribe",
    version,
    about = "Archive the pages listed in a sitemap as PDF and clean text",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log format (text, json)
    #[arg(long, global = true)]
    log_format: Option<String>,

    /// TOML configuration file (defaults to SITESCRIBE_* environment variables)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// SQLite database path
    #[arg(long, global = true)]
    db: Option<PathBuf>,
}

/// Sitemap selection shared by the scraping commands
#[derive(Args, Debug, Clone, Default)]
pub struct SitemapArgs {
    /// Sitemap URL
    #[arg(long)]
    pub sitemap_url: Option<String>,

    /// Path prefix to keep; repeat for several
    #[arg(short, long = "directory")]
    pub directories: Vec<String>,
}

impl SitemapArgs {
    /// Apply the flags on top of the configured values
    pub fn apply(&self, config: &mut Config) {
        if let Some(url) = &self.sitemap_url {
            config.scraper.sitemap_url = url.clone();
        }
        if !self.directories.is_empty() {
            config.scraper.directories = self.directories.clone();
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// List the top-level directories found in the sitemap
    ListDirectories {
        /// Sitemap URL
        #[arg(long)]
        sitemap_url: Option<String>,
    },

    /// Parse the sitemap, store its URLs and print them
    ListPages {
        #[command(flatten)]
        sitemap: SitemapArgs,
    },

    /// Estimate how long fetching every page will take
    EstimateTime {
        #[command(flatten)]
        sitemap: SitemapArgs,
    },

    /// Fetch the page at one stored position
    FetchPage {
        /// 1-based position in the URL store
        index: usize,

        #[command(flatten)]
        sitemap: SitemapArgs,

        /// Artifact directory
        #[arg(long)]
        pages_dir: Option<PathBuf>,
    },

    /// Fetch unprocessed pages in position order
    FetchPages {
        #[command(flatten)]
        sitemap: SitemapArgs,

        /// Maximum number of pages to process
        #[arg(short, long)]
        number_of_pages: Option<usize>,

        /// Pass over pages whose last attempt failed
        #[arg(long)]
        skip_failed: bool,

        /// Artifact directory
        #[arg(long)]
        pages_dir: Option<PathBuf>,
    },

    /// Render PDFs only, without text extraction
    RenderPdf {
        #[command(flatten)]
        sitemap: SitemapArgs,

        /// Maximum number of pages to render
        #[arg(short, long)]
        number_of_pages: Option<usize>,

        /// Pass over pages whose last attempt failed
        #[arg(long)]
        skip_failed: bool,

        /// Artifact directory
        #[arg(long)]
        pages_dir: Option<PathBuf>,
    },

    /// Check that every artifact is a readable, non-empty PDF or text file
    Verify {
        /// Artifact directory
        #[arg(long)]
        pages_dir: Option<PathBuf>,

        /// Print the report as JSON
        #[arg(long, default_value = "false")]
        json: bool,
    },

    /// Inspect or edit the stored URLs
    Db {
        #[command(subcommand)]
        action: DbAction,
    },

    /// Post-process text artifacts
    Text {
        #[command(subcommand)]
        action: TextAction,
    },
}

#[derive(Subcommand)]
enum DbAction {
    /// Print every stored URL with its position
    Show,

    /// Replace the URL at a position
    Update {
        /// Position of the URL to replace
        index: usize,

        /// New URL
        new_url: String,
    },

    /// Delete the URL at a position
    Delete {
        /// Position of the URL to delete
        index: usize,
    },
}

#[derive(Subcommand)]
enum TextAction {
    /// Concatenate every text artifact into one file
    Merge {
        /// Artifact directory
        #[arg(long)]
        pages_dir: Option<PathBuf>,

        /// Output file
        #[arg(short, long, default_value = sitescribe::storage::textfiles::DEFAULT_MERGED_FILE)]
        output: PathBuf,
    },

    /// Copy text artifacts into one directory with path-derived names
    Flatten {
        /// Artifact directory
        #[arg(long)]
        pages_dir: Option<PathBuf>,

        /// Output directory
        #[arg(short, long, default_value = sitescribe::storage::textfiles::DEFAULT_FLATTENED_DIR)]
        output_dir: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::from_env()?,
    };
    if let Some(db) = &cli.db {
        config.storage.sqlite_path = db.clone();
    }

    let log_format = cli
        .log_format
        .clone()
        .unwrap_or_else(|| config.logging.format.clone());
    setup_tracing(&log_format, cli.verbose, &config.logging.level)?;

    tracing::debug!(command = command_name(&cli.command), "sitescribe starting");

    match cli.command {
        Commands::ListDirectories { sitemap_url } => {
            if let Some(url) = sitemap_url {
                config.scraper.sitemap_url = url;
            }
            config.validate().context("Invalid configuration")?;
            commands::list_directories(&config).await?;
        }

        Commands::ListPages { sitemap } => {
            sitemap.apply(&mut config);
            config.validate().context("Invalid configuration")?;
            commands::list_pages(&config).await?;
        }

        Commands::EstimateTime { sitemap } => {
            sitemap.apply(&mut config);
            config.validate().context("Invalid configuration")?;
            commands::estimate_time(&config).await?;
        }

        Commands::FetchPage {
            index,
            sitemap,
            pages_dir,
        } => {
            sitemap.apply(&mut config);
            apply_pages_dir(&mut config, pages_dir);
            config.validate().context("Invalid configuration")?;
            commands::fetch_page(&config, index).await?;
        }

        Commands::FetchPages {
            sitemap,
            number_of_pages,
            skip_failed,
            pages_dir,
        } => {
            sitemap.apply(&mut config);
            apply_pages_dir(&mut config, pages_dir);
            config.validate().context("Invalid configuration")?;
            commands::fetch_pages(&config, number_of_pages, skip_failed).await?;
        }

        Commands::RenderPdf {
            sitemap,
            number_of_pages,
            skip_failed,
            pages_dir,
        } => {
            sitemap.apply(&mut config);
            apply_pages_dir(&mut config, pages_dir);
            config.validate().context("Invalid configuration")?;
            commands::render_pdf(&config, number_of_pages, skip_failed).await?;
        }

        Commands::Verify { pages_dir, json } => {
            apply_pages_dir(&mut config, pages_dir);
            let clean = commands::verify(&config, json)?;
            if !clean {
                std::process::exit(1);
            }
        }

        Commands::Db { action } => match action {
            DbAction::Show => commands::db_show(&config)?,
            DbAction::Update { index, new_url } => commands::db_update(&config, index, &new_url)?,
            DbAction::Delete { index } => commands::db_delete(&config, index)?,
        },

        Commands::Text { action } => match action {
            TextAction::Merge { pages_dir, output } => {
                apply_pages_dir(&mut config, pages_dir);
                commands::text_merge(&config, &output)?;
            }
            TextAction::Flatten {
                pages_dir,
                output_dir,
            } => {
                apply_pages_dir(&mut config, pages_dir);
                commands::text_flatten(&config, &output_dir)?;
            }
        },
    }

    Ok(())
}

fn apply_pages_dir(config: &mut Config, pages_dir: Option<PathBuf>) {
    if let Some(dir) = pages_dir {
        config.storage.pages_dir = dir;
    }
}

fn command_name(command: &Commands) -> &'static str {
    match command {
        Commands::ListDirectories { .. } => "list-directories",
        Commands::ListPages { .. } => "list-pages",
        Commands::EstimateTime { .. } => "estimate-time",
        Commands::FetchPage { .. } => "fetch-page",
        Commands::FetchPages { .. } => "fetch-pages",
        Commands::RenderPdf { .. } => "render-pdf",
        Commands::Verify { .. } => "verify",
        Commands::Db { .. } => "db",
        Commands::Text { .. } => "text",
    }
}

fn setup_tracing(format: &str, verbose: bool, level: &str) -> Result<()> {
    let env_filter = if verbose {
        tracing_subscriber::EnvFilter::new("sitescribe=debug,info")
    } else {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .or_else(|_| tracing_subscriber::EnvFilter::try_new(format!("sitescribe={level},warn")))
            .context("Invalid log level")?
    };

    match format {
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
    }

    Ok(())
}
