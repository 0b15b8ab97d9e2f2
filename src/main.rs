//! metacrawl CLI entry point

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use metacrawl::{
    commands::{
        cmd_crawl, cmd_init, cmd_sample_db, cmd_session, print_crawl_report,
        print_sample_db_summary, CrawlOptions, LineageFormat,
    },
    config::Config,
    crawl::{parse_header_json, parse_header_pairs},
    error::{Error, Result},
    progress::LogWriterFactory,
};
use std::path::{Path, PathBuf};
use tracing::error;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "metacrawl")]
#[command(version, about = "Crawl databases, APIs and files into a data dictionary and lineage map", long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, env = "METACRAWL_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default configuration file
    Init {
        /// Overwrite an existing config
        #[arg(long)]
        force: bool,
    },

    /// Crawl sources once and report the results
    Crawl {
        /// Database URL (sqlite://path.db, postgres://user:pw@host/db)
        #[arg(long = "db", value_name = "URL")]
        databases: Vec<String>,

        /// Database kind recorded with each database crawl
        #[arg(long, value_name = "KIND")]
        db_kind: Option<String>,

        /// JSON API endpoint
        #[arg(long = "api", value_name = "URL")]
        apis: Vec<String>,

        /// Request header for API crawls
        #[arg(short = 'H', long = "header", value_name = "KEY=VALUE")]
        headers: Vec<String>,

        /// Request headers as a JSON object of strings
        #[arg(long, value_name = "JSON")]
        headers_json: Option<String>,

        /// Files or directories to crawl
        #[arg(value_name = "PATH")]
        files: Vec<PathBuf>,

        /// Walk directories recursively
        #[arg(short, long)]
        recursive: bool,

        /// Print the data dictionary
        #[arg(long)]
        dictionary: bool,

        /// Print the lineage map
        #[arg(long, value_enum, value_name = "FORMAT")]
        lineage: Option<LineageFormat>,

        /// Export a workbook (defaults to export.default_path)
        #[arg(long, value_name = "FILE", num_args = 0..=1)]
        export: Option<Option<PathBuf>>,
    },

    /// Start an interactive crawling session
    Session,

    /// Create a sample SQLite database to crawl
    SampleDb {
        /// Where to create the database
        #[arg(default_value = "sample_data.db")]
        path: PathBuf,

        /// Replace an existing file
        #[arg(long)]
        force: bool,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("{}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(LogWriterFactory::default()))
        .with(filter)
        .init();

    match cli.command {
        Commands::Init { force } => {
            let path = cmd_init(cli.config, force)?;
            if cli.json {
                println!("{}", serde_json::json!({ "status": "ok", "config": path }));
            } else {
                println!("✓ metacrawl initialized");
                println!("  Config: {}", path.display());
                println!("\nNext steps:");
                println!("  1. Edit the config file to customize settings");
                println!("  2. Create a sample database: metacrawl sample-db");
                println!("  3. Crawl it: metacrawl crawl --db sqlite://sample_data.db --dictionary");
            }
        }

        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            generate(shell, &mut cmd, "metacrawl", &mut std::io::stdout());
        }

        Commands::SampleDb { path, force } => {
            let summary = cmd_sample_db(&path, force).await?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                print_sample_db_summary(&summary);
            }
        }

        Commands::Session => {
            let config = load_config(cli.config.as_deref())?;
            cmd_session(config, cli.json).await?;
        }

        Commands::Crawl {
            databases,
            db_kind,
            apis,
            headers,
            headers_json,
            files,
            recursive,
            dictionary,
            lineage,
            export,
        } => {
            let mut config = load_config(cli.config.as_deref())?;
            config.files.recursive |= recursive;

            let mut header_map = match headers_json {
                Some(text) => parse_header_json(&text)?,
                None => Default::default(),
            };
            header_map.extend(parse_header_pairs(&headers)?);

            let export = export.map(|path| {
                path.unwrap_or_else(|| PathBuf::from(&config.export.default_path))
            });

            let options = CrawlOptions {
                databases,
                db_kind,
                apis,
                headers: header_map,
                files,
                show_dictionary: dictionary,
                lineage,
                export,
            };
            if !options.has_sources() {
                return Err(Error::Other(
                    "Nothing to crawl. Pass --db, --api or file paths.".to_string(),
                ));
            }

            let report = cmd_crawl(config, options).await?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print_crawl_report(&report);
            }

            if report.failures() > 0 {
                std::process::exit(1);
            }
        }
    }

    Ok(())
}

/// Explicit config paths must exist; otherwise fall back to defaults
fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => Config::load(path),
        None => Config::load_from(None),
    }
}
