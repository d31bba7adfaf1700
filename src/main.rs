mod config;
mod embedding;
mod errors;
mod llm;
mod pipeline;
mod retriever;
mod seed;
mod ui;
mod vector_db;

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use config::AppConfig;
use llm::{AnswerGenerator, GroqGenerator};
use pipeline::RagSession;
use retriever::Retriever;
use tokio::io::BufReader;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn,groq_rag=info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<ExitCode> {
    // A missing .env file is fine; flags and the real environment still apply.
    let dotenv = dotenvy::dotenv().ok();
    init_tracing();
    if let Some(path) = dotenv {
        info!(path = %path.display(), "loaded .env");
    }

    let config = AppConfig::parse();
    config.validate()?;

    let embedder = config.build_embedder()?;
    let generator = Arc::new(GroqGenerator::new(&config.llm_config())?);
    let answerer = AnswerGenerator::new(generator, config.model.clone())
        .with_max_context_chars(config.max_context_chars);
    let mut session = RagSession::new(Retriever::new(embedder), answerer, config.top_k)?;

    session.ensure_seeded().await?;

    let mut stdout = std::io::stdout();

    if let Some(query) = &config.query {
        let answered = ui::respond(&session, query, &mut stdout).await?;
        return Ok(if answered {
            ExitCode::SUCCESS
        } else {
            ExitCode::FAILURE
        });
    }

    println!("🔎 RAG with Groq");
    println!(
        "Ask me anything! I'll search the knowledge base ({} documents) and answer using {}.",
        session.document_count(),
        config.model
    );
    println!("Press Ctrl+D to exit.\n");

    ui::run(&session, BufReader::new(tokio::io::stdin()), &mut stdout).await?;
    Ok(ExitCode::SUCCESS)
}
