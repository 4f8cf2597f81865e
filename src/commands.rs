use anyhow::{Context, Result};
use std::fs;
use tracing::info;

use crate::acquirer::{AcquirerConfig, StoryAcquirer};
use crate::catalog::builtin_books;
use crate::config::Config;
use crate::indexer::StoryIndexer;
use crate::search::SearchEngine;
use crate::server;

/// Download the built-in story collections into the books directory
#[inline]
pub async fn collect_books(limit: Option<usize>, skip_existing: bool) -> Result<()> {
    let config = Config::load().unwrap_or_default();
    let books_dir = config
        .books_dir_path()
        .context("Failed to determine books directory")?;

    let catalog = builtin_books();
    let books = match limit {
        Some(n) => catalog.get(..n.min(catalog.len())).unwrap_or(catalog),
        None => catalog,
    };

    info!("Collecting {} books into {}", books.len(), books_dir.display());
    println!(
        "📖 Downloading {} story collections to {}",
        books.len(),
        books_dir.display()
    );

    let acquirer_config = AcquirerConfig {
        skip_existing,
        ..AcquirerConfig::default()
    };
    let mut acquirer = StoryAcquirer::new(acquirer_config);

    let stats = acquirer.collect(books, &books_dir).await?;

    println!("Collection finished!");
    println!("  Downloaded: {}", stats.downloaded);
    println!("  Skipped: {}", stats.skipped);
    println!("  Failed: {}", stats.failed);
    println!("  Duration: {:?}", stats.duration);

    if stats.failed > 0 {
        println!();
        println!(
            "⚠️  {} books could not be downloaded. Re-run 'story-search collect --skip-existing' to retry just those.",
            stats.failed
        );
    }

    println!();
    println!("Next: run 'story-search index' to make the stories searchable");

    Ok(())
}

/// Segment every downloaded book and store the story embeddings
#[inline]
pub async fn index_books() -> Result<()> {
    let config = Config::load().unwrap_or_default();

    println!("🔎 Indexing downloaded books...");

    let mut indexer = StoryIndexer::new(config)
        .await
        .context("Failed to initialize indexer")?;
    let stats = indexer.index_books().await?;

    println!("Indexing finished!");
    println!("  Books processed: {}", stats.books_processed);
    println!("  Books failed: {}", stats.books_failed);
    println!("  Stories stored: {}", stats.stories_stored);
    println!("  Duration: {:?}", stats.duration);
    println!();
    println!("Next: run 'story-search serve' and open the search page");

    Ok(())
}

/// Start the web search server
#[inline]
pub async fn serve_search(port: Option<u16>) -> Result<()> {
    let mut config = Config::load().context("Failed to load configuration")?;
    if let Some(port) = port {
        config.server.set_port(port)?;
    }

    println!(
        "🌐 Starting story search at http://{}:{}",
        config.server.host, config.server.port
    );
    println!("Press Ctrl+C to stop the server");

    server::serve(config).await?;

    Ok(())
}

/// Run one search from the terminal and print the matches
#[inline]
pub async fn search_stories(query: String) -> Result<()> {
    let config = Config::load().unwrap_or_default();

    let engine = SearchEngine::new(config)
        .await
        .context("Failed to initialize search engine")?;
    let response = engine.search(&query).await?;

    if response.results.is_empty() {
        println!("No matching stories were found.");
        println!("Use 'story-search index' to add more stories to the library.");
        return Ok(());
    }

    println!("🔍 Top matches for \"{}\":", query.trim());
    println!();

    for (i, hit) in response.results.iter().enumerate() {
        println!("{}. {} (similarity {:.3})", i + 1, hit.title, hit.score);
        println!("   Source: {}", hit.source.replace('_', " "));

        let preview: Vec<&str> = hit.text.split_whitespace().take(40).collect();
        println!("   {}...", preview.join(" "));
        println!();
    }

    println!("💡 {}", response.explanation);

    Ok(())
}

/// Show the state of every stage of the pipeline
#[inline]
pub async fn show_status() -> Result<()> {
    let config = Config::load().unwrap_or_default();

    println!("📊 Story Search Status");
    println!("{}", "=".repeat(50));
    println!();

    println!("⚙️  Configuration:");
    match Config::config_file_path() {
        Ok(path) if path.exists() => {
            println!("   ✅ Config file: {}", path.display());
        }
        Ok(path) => {
            println!("   📝 No config file at {} (defaults in use)", path.display());
        }
        Err(e) => {
            println!("   ❌ Config directory: {}", e);
        }
    }
    println!("   📋 Embedding model: {}", config.openai.embedding_model);
    println!("   📋 Chat model: {}", config.openai.chat_model);

    println!();
    println!("🔑 Credentials:");
    if std::env::var(crate::embeddings::openai::API_KEY_VAR).is_ok() {
        println!("   ✅ {} is set", crate::embeddings::openai::API_KEY_VAR);
    } else {
        println!("   ❌ {} is not set", crate::embeddings::openai::API_KEY_VAR);
        println!("   Export it or add it to a .env file");
    }

    println!();
    println!("📖 Books on disk:");
    match config.books_dir_path() {
        Ok(dir) => {
            let book_count = fs::read_dir(&dir)
                .map(|entries| {
                    entries
                        .filter_map(std::result::Result::ok)
                        .filter(|entry| {
                            entry.path().extension().is_some_and(|ext| ext == "txt")
                        })
                        .count()
                })
                .unwrap_or(0);

            if book_count == 0 {
                println!("   📭 No books in {}", dir.display());
                println!("   Use 'story-search collect' to download the library");
            } else {
                println!("   ✅ {} books in {}", book_count, dir.display());
            }
        }
        Err(e) => {
            println!("   ❌ Books directory: {}", e);
        }
    }

    println!();
    println!("🔍 Vector store:");
    match crate::store::VectorStore::new(&config).await {
        Ok(store) => match store.count_stories().await {
            Ok(0) => {
                println!("   📭 No stories indexed yet");
                println!("   Use 'story-search index' to build the store");
            }
            Ok(count) => {
                println!("   ✅ {} stories indexed", count);
            }
            Err(e) => {
                println!("   ⚠️  Store opened but counting failed - {}", e);
            }
        },
        Err(e) => {
            println!("   ❌ LanceDB: Failed to open - {}", e);
        }
    }

    println!();
    println!("🤖 OpenAI API:");
    match crate::embeddings::OpenAiClient::new(&config) {
        Ok(client) => match client.health_check() {
            Ok(()) => {
                println!("   ✅ Reachable at {}", config.openai.api_base);
                println!(
                    "   📋 Models verified: {} and {}",
                    config.openai.embedding_model, config.openai.chat_model
                );
            }
            Err(e) => {
                println!("   ⚠️  Reachable but unhealthy - {}", e);
            }
        },
        Err(e) => {
            println!("   ❌ Client not created - {}", e);
        }
    }

    println!();
    println!("💡 Next Steps:");
    println!("   • Use 'story-search collect' to download the story collections");
    println!("   • Use 'story-search index' to segment and embed them");
    println!("   • Use 'story-search serve' to open the search page");

    Ok(())
}
