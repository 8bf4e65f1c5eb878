use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::warn;

use docqa_cli::{collect_files, init_tracing, App};
use docqa_core::config::Config;
use docqa_core::types::SearchResult;

#[derive(Parser, Debug)]
#[command(name = "docqa", version, about = "Page-aware question answering over PDF documents")]
struct Cli {
    /// Print machine-readable JSON instead of text
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Index PDF or text files; directories are walked
    Ingest {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },
    /// Retrieve page-tagged passages for a query
    Search {
        query: String,
        #[arg(long)]
        top_k: Option<usize>,
        /// Skip neighboring-page expansion
        #[arg(long)]
        no_adjacent: bool,
    },
    /// Answer a question from the indexed documents
    Ask {
        question: String,
        #[arg(long)]
        conversation: Option<String>,
        #[arg(long)]
        top_k: Option<usize>,
    },
    /// List indexed documents, newest first
    List,
    /// Remove a document and its chunks
    Delete { id: String },
    /// Show index location and counts
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let settings = Config::load()?.settings()?;
    let app = App::open(settings).await?;
    let outcome = run(&app, cli).await;
    app.close().await?;
    outcome
}

async fn run(app: &App, cli: Cli) -> Result<()> {
    match cli.command {
        Command::Ingest { paths } => ingest(app, &paths, cli.json).await,
        Command::Search { query, top_k, no_adjacent } => {
            let outcome = app.retriever().search_detailed(&query, top_k, !no_adjacent).await?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&outcome)?);
            } else {
                print_results(&outcome.results);
                for skipped in &outcome.skipped_pages {
                    println!("(page {} skipped: {})", skipped.page_number, skipped.reason);
                }
            }
            Ok(())
        }
        Command::Ask { question, conversation, top_k } => {
            let service = app.answer_service()?;
            let answer = service.ask(&question, conversation.as_deref(), top_k).await?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&answer)?);
            } else {
                println!("{}\n", answer.answer);
                if !answer.sources.is_empty() {
                    println!("Sources:");
                    print_results(&answer.sources);
                }
                println!("conversation: {}", answer.conversation_id);
            }
            Ok(())
        }
        Command::List => {
            let records = app.library().list()?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&records)?);
            } else if records.is_empty() {
                println!("No documents indexed.");
            } else {
                for r in records {
                    println!(
                        "{}  {}  pages={} chunks={}  {}",
                        r.id,
                        r.filename,
                        r.page_count,
                        r.chunk_count,
                        r.upload_timestamp.format("%Y-%m-%d %H:%M:%S")
                    );
                }
            }
            Ok(())
        }
        Command::Delete { id } => {
            if !app.library().delete_document(&id).await? {
                bail!("no document with id {id}");
            }
            println!("Deleted {id}");
            Ok(())
        }
        Command::Status => {
            let documents = app.library().list()?.len();
            let chunks = app.chunk_count().await?;
            let s = &app.settings;
            if cli.json {
                let status = serde_json::json!({
                    "index_dir": s.index.dir_path(),
                    "table": s.index.table,
                    "registry": s.index.registry_path(),
                    "embedding_provider": s.embedding.provider,
                    "documents": documents,
                    "chunks": chunks,
                });
                println!("{}", serde_json::to_string_pretty(&status)?);
            } else {
                println!("index:     {} (table {})", s.index.dir_path().display(), s.index.table);
                println!("registry:  {}", s.index.registry_path().display());
                println!("embedding: {}", s.embedding.provider);
                println!("documents: {documents}");
                println!("chunks:    {chunks}");
            }
            Ok(())
        }
    }
}

async fn ingest(app: &App, paths: &[PathBuf], json: bool) -> Result<()> {
    let files = collect_files(paths);
    if files.is_empty() {
        bail!("no .pdf or .txt files found");
    }
    let pb = ProgressBar::new(files.len() as u64);
    pb.set_style(
        ProgressStyle::with_template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} files {msg}")?
            .progress_chars("#>-"),
    );

    let mut records = Vec::new();
    let mut failed = 0usize;
    for file in &files {
        pb.set_message(file.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_default());
        match app.ingest_file(file).await {
            Ok(record) => records.push(record),
            Err(e) => {
                failed += 1;
                pb.suspend(|| warn!(path = %file.display(), error = %e, "ingest failed"));
            }
        }
        pb.inc(1);
    }
    pb.finish_with_message("done");

    if json {
        println!("{}", serde_json::to_string_pretty(&records)?);
    } else {
        for r in &records {
            println!("{}  {}  pages={} chunks={}", r.id, r.filename, r.page_count, r.chunk_count);
        }
        println!("Indexed {} of {} files", records.len(), files.len());
    }
    if failed > 0 && records.is_empty() {
        bail!("all {failed} files failed to ingest");
    }
    Ok(())
}

fn print_results(results: &[SearchResult]) {
    for r in results {
        let snippet: String = r.text.chars().take(160).collect();
        println!(
            "[{}, page {}] {:?} {:.3}\n    {}",
            r.document_name, r.page_number, r.origin, r.relevance_score, snippet
        );
    }
}
