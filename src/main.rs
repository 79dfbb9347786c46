use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use trove_master::cache::NoCache;
use trove_master::config::{find_config_file, load_config, ConfigFile};
use trove_master::mcp::{McpServer, ToolDescriptor, ToolKind, ToolRegistry};
use trove_master::models::{resolve_identifier, Category, SearchQuery, SortBy};
use trove_master::{Client, Config};

/// Trove Master - Search the Trove archive and serve it to MCP clients
#[derive(Parser, Debug)]
#[command(name = "trove-master")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Search the Trove archive and serve it to MCP clients", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose logging (-v, -vv)
    #[arg(long, short, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(long, short, global = true)]
    quiet: bool,

    /// Configuration file path
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Disable caching for this command
    #[arg(long, global = true, default_value_t = false)]
    no_cache: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Sort order for results
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum SortField {
    /// Best match first
    Relevance,
    /// Oldest first
    DateAsc,
    /// Newest first
    DateDesc,
}

impl From<SortField> for SortBy {
    fn from(field: SortField) -> Self {
        match field {
            SortField::Relevance => SortBy::Relevance,
            SortField::DateAsc => SortBy::DateAsc,
            SortField::DateDesc => SortBy::DateDesc,
        }
    }
}

#[derive(clap::Args, Debug)]
struct QueryArgs {
    /// Search terms
    query: Option<String>,

    /// Category to search (repeatable)
    #[arg(long, short, required = true)]
    category: Vec<Category>,

    /// Facet limit as NAME=VALUE, e.g. decade=186 (repeatable)
    #[arg(long, short, value_parser = parse_filter)]
    filter: Vec<(String, String)>,
}

impl QueryArgs {
    fn to_query(&self) -> SearchQuery {
        let mut query = SearchQuery::new().categories(self.category.iter().copied());
        if let Some(text) = &self.query {
            query = query.text(text);
        }
        for (name, value) in &self.filter {
            query = query.filter(name, value.clone());
        }
        query
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Search one or more categories
    #[command(alias = "s")]
    Search {
        #[command(flatten)]
        query: QueryArgs,

        /// Records per category per page
        #[arg(long, short = 'n', default_value_t = 20)]
        page_size: u32,

        /// Sort order
        #[arg(long, value_enum, default_value_t = SortField::Relevance)]
        sort: SortField,

        /// Number of pages to fetch
        #[arg(long, short, default_value_t = 1)]
        pages: usize,

        /// Request stable ordering for harvesting
        #[arg(long)]
        bulk_harvest: bool,
    },

    /// Count matching records per category
    Count {
        #[command(flatten)]
        query: QueryArgs,
    },

    /// Fetch a single record
    Record {
        /// Category of the record
        category: Category,
        /// Record identifier
        id: String,
    },

    /// Fetch the full text of a newspaper article
    Text {
        /// Category of the record
        category: Category,
        /// Record identifier
        id: String,
    },

    /// Resolve a Trove URL, persistent identifier or category:id
    Resolve {
        identifier: String,
    },

    /// List the MCP tools and their input schemas
    Tools,

    /// Invoke an MCP tool directly
    Call {
        /// Tool name
        tool: String,
        /// Arguments as a JSON object
        #[arg(default_value = "{}")]
        args: String,
    },

    /// Run the MCP server (stdio by default)
    Serve {
        /// Serve streamable HTTP on this address instead of stdio
        #[arg(long, value_name = "ADDR")]
        http: Option<String>,
    },

    /// Write a configuration file with default settings
    InitConfig {
        /// Where to write the file
        #[arg(default_value = "trove-master.toml")]
        path: PathBuf,

        /// Overwrite an existing file
        #[arg(long, short)]
        force: bool,
    },
}

fn parse_filter(s: &str) -> Result<(String, String), String> {
    let (name, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=VALUE, got '{}'", s))?;
    Ok((name.trim().to_string(), value.trim().to_string()))
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn load_settings(cli: &Cli) -> Result<Config> {
    let config = if let Some(config_path) = &cli.config {
        load_config(config_path)?
    } else if let Some(config_path) = find_config_file() {
        tracing::info!("Using config file: {}", config_path.display());
        load_config(&config_path)?
    } else {
        Config::from_env()?
    };
    Ok(config)
}

fn build_client(cli: &Cli, cancel: CancellationToken) -> Result<Client> {
    let mut builder = Client::builder(load_settings(cli)?);
    if cli.no_cache {
        builder = builder.cache(Arc::new(NoCache));
    }
    Ok(builder.build()?.with_cancellation(cancel))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let env_filter = if cli.quiet { "error" } else { log_level };

    // stdout carries results and the stdio MCP transport, so logs go to stderr
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| format!("trove_master={}", env_filter)),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("Interrupted, cancelling in-flight requests");
                cancel.cancel();
            }
        });
    }

    match &cli.command {
        Commands::Search {
            query,
            page_size,
            sort,
            pages,
            bulk_harvest,
        } => {
            let client = build_client(&cli, cancel)?;
            let search = query
                .to_query()
                .page_size(*page_size)
                .sort((*sort).into())
                .bulk_harvest(*bulk_harvest);
            let limit = (*pages).max(1);

            let fetched = client
                .scoped(|client| async move {
                    let mut iter = search.pages(&client)?;
                    let mut fetched = Vec::new();
                    while fetched.len() < limit {
                        match iter.next().await {
                            Some(page) => fetched.push(page?),
                            None => break,
                        }
                    }
                    Ok(fetched)
                })
                .await?;

            if !cli.quiet {
                let records: usize = fetched.iter().map(|p| p.len()).sum();
                eprintln!("Fetched {} records in {} pages", records, fetched.len());
            }
            let total = fetched.first().map(|p| p.total()).unwrap_or(0);
            print_json(&json!({ "total": total, "pages": fetched }))?;
        }

        Commands::Count { query } => {
            let client = build_client(&cli, cancel)?;
            let search = query.to_query();
            let counts = client
                .scoped(|client| async move { search.count_by_category(&client).await })
                .await?;
            let total: u64 = counts.values().sum();
            print_json(&json!({ "total": total, "categories": counts }))?;
        }

        Commands::Record { category, id } => {
            let client = build_client(&cli, cancel)?;
            let record = client
                .scoped(|client| async move { client.get_record(*category, id).await })
                .await?;
            print_json(&record)?;
        }

        Commands::Text { category, id } => {
            let client = build_client(&cli, cancel)?;
            let text = client
                .scoped(|client| async move { client.get_derived_text(*category, id).await })
                .await?;
            match text {
                Some(text) => println!("{}", text),
                None => eprintln!("No full text available for {}/{}", category, id),
            }
        }

        Commands::Resolve { identifier } => {
            print_json(&resolve_identifier(identifier)?)?;
        }

        Commands::Tools => {
            let descriptors: Vec<ToolDescriptor> = ToolKind::ALL
                .iter()
                .map(|kind| ToolDescriptor {
                    name: kind.name().to_string(),
                    description: kind.description().to_string(),
                    input_schema: kind.input_schema(),
                })
                .collect();
            print_json(&descriptors)?;
        }

        Commands::Call { tool, args } => {
            let args: Value = serde_json::from_str(args).context("tool arguments must be JSON")?;
            let client = build_client(&cli, cancel)?;
            let registry = ToolRegistry::new(client.clone())?;

            let session = client.open()?;
            let outcome = registry.execute(tool, args).await;
            session.close();

            match outcome {
                Ok(envelope) => print_json(&envelope)?,
                Err(e) => {
                    print_json(&e.to_json())?;
                    anyhow::bail!("tool {} failed: {}", tool, e);
                }
            }
        }

        Commands::Serve { http } => {
            let client = build_client(&cli, cancel)?;
            let registry = Arc::new(ToolRegistry::new(client.clone())?);
            let server = McpServer::new(registry)?;
            let session = client.open()?;

            if let Some(addr) = http {
                let (bound_addr, handle) = server.run_http(addr).await?;
                tracing::info!("MCP server listening on {}", bound_addr);
                handle
                    .await
                    .map_err(|e| anyhow::anyhow!("Server task failed: {}", e))?;
            } else {
                server.run().await?;
            }
            session.close();
        }

        Commands::InitConfig { path, force } => {
            if path.exists() && !force {
                anyhow::bail!("{} already exists (use --force to overwrite)", path.display());
            }
            ConfigFile::default().save(path)?;
            if !cli.quiet {
                eprintln!("Wrote {}", path.display());
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_search_parsing() {
        let cli = Cli::parse_from([
            "trove-master",
            "search",
            "bushranger",
            "-c",
            "newspaper",
            "-c",
            "book",
            "--filter",
            "decade=186",
            "--sort",
            "date-asc",
            "--pages",
            "3",
        ]);
        match cli.command {
            Commands::Search {
                query, sort, pages, ..
            } => {
                assert_eq!(query.query.as_deref(), Some("bushranger"));
                assert_eq!(query.category, vec![Category::Newspaper, Category::Book]);
                assert_eq!(query.filter, vec![("decade".to_string(), "186".to_string())]);
                assert_eq!(sort, SortField::DateAsc);
                assert_eq!(pages, 3);
            }
            _ => panic!("Expected Search command"),
        }
    }

    #[test]
    fn test_cli_search_requires_category() {
        assert!(Cli::try_parse_from(["trove-master", "search", "x"]).is_err());
        assert!(Cli::try_parse_from(["trove-master", "search", "x", "-c", "gazette"]).is_err());
    }

    #[test]
    fn test_cli_record_and_call() {
        let cli = Cli::parse_from(["trove-master", "record", "newspaper", "18342701"]);
        assert!(matches!(
            cli.command,
            Commands::Record {
                category: Category::Newspaper,
                ..
            }
        ));

        let cli = Cli::parse_from(["trove-master", "call", "list_capabilities"]);
        match cli.command {
            Commands::Call { tool, args } => {
                assert_eq!(tool, "list_capabilities");
                assert_eq!(args, "{}");
            }
            _ => panic!("Expected Call command"),
        }
    }

    #[test]
    fn test_cli_serve_modes() {
        let cli = Cli::parse_from(["trove-master", "serve"]);
        assert!(matches!(cli.command, Commands::Serve { http: None }));

        let cli = Cli::parse_from(["trove-master", "serve", "--http", "127.0.0.1:3000"]);
        match cli.command {
            Commands::Serve { http } => assert_eq!(http.as_deref(), Some("127.0.0.1:3000")),
            _ => panic!("Expected Serve command"),
        }
    }

    #[test]
    fn test_parse_filter() {
        assert_eq!(
            parse_filter("state = Victoria").unwrap(),
            ("state".to_string(), "Victoria".to_string())
        );
        assert!(parse_filter("nofilter").is_err());
    }
}
