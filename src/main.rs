use anyhow::Result;
use clap::Parser;
use kb_rag::config::Config;
use kb_rag::mcp_server::KnowledgeBaseServer;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "kb-rag",
    version,
    about = "MCP knowledge base server - document ingestion and semantic search"
)]
struct Cli {
    /// Path to a TOML configuration file
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Override the database path
    #[arg(long, value_name = "PATH")]
    db_path: Option<PathBuf>,

    /// Override the log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,

    /// Print the effective configuration and exit
    #[arg(long)]
    show_config: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::new()?,
    };

    if let Some(db_path) = cli.db_path {
        config.database.path = db_path;
    }
    if let Some(level) = cli.log_level {
        config.server.log_level = level;
    }
    config.validate()?;

    if cli.show_config {
        println!("{}", toml::to_string_pretty(&config)?);
        return Ok(());
    }

    // stdout carries the MCP protocol; logs go to stderr
    let level = config
        .server
        .log_level
        .parse::<tracing::Level>()
        .unwrap_or(tracing::Level::INFO);
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    tracing::info!(
        "kb-rag {} (built {}, commit {})",
        env!("CARGO_PKG_VERSION"),
        env!("BUILD_TIMESTAMP"),
        env!("GIT_COMMIT_HASH")
    );

    let server = KnowledgeBaseServer::with_config(config).await?;
    server.serve_stdio().await?;

    Ok(())
}
