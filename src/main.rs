use clap::{Parser, Subcommand};
use story_search::Result;
use story_search::commands::{
    collect_books, index_books, search_stories, serve_search, show_status,
};
use story_search::config::{run_interactive_config, show_config};

#[derive(Parser)]
#[command(name = "story-search")]
#[command(about = "Semantic search over public-domain story collections")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Configure API endpoints and settings
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
    /// Download the built-in story collections from the archive
    Collect {
        /// Only download the first N books of the catalog
        #[arg(long)]
        limit: Option<usize>,
        /// Keep books already on disk instead of downloading them again
        #[arg(long)]
        skip_existing: bool,
    },
    /// Segment downloaded books into stories and index their embeddings
    Index,
    /// Start the web search server
    Serve {
        /// Port to listen on, overriding the configured value
        #[arg(long)]
        port: Option<u16>,
    },
    /// Search the indexed stories from the terminal
    Search {
        /// Free-text description of the story you are looking for
        query: String,
    },
    /// Show the status of the collection and indexing pipeline
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    // A .env file is optional; variables already in the environment win
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Config { show } => {
            if show {
                show_config()?;
            } else {
                run_interactive_config()?;
            }
        }
        Commands::Collect {
            limit,
            skip_existing,
        } => {
            collect_books(limit, skip_existing).await?;
        }
        Commands::Index => {
            index_books().await?;
        }
        Commands::Serve { port } => {
            serve_search(port).await?;
        }
        Commands::Search { query } => {
            search_stories(query).await?;
        }
        Commands::Status => {
            show_status().await?;
        }
    }

    Ok(())
}
