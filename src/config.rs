//! Command-line and environment configuration.
//!
//! Values come from flags first, then environment variables (a `.env` file
//! is loaded into the environment before parsing), then defaults.

use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, ValueEnum};

use crate::embedding::{DEFAULT_DIMENSIONS, Embedder, HashedEmbedder, RemoteEmbedder};
use crate::errors::{RagError, Result};
use crate::llm::{DEFAULT_BASE_URL, DEFAULT_MODEL, LLMConfig};
use crate::pipeline::DEFAULT_TOP_K;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum EmbedderKind {
    /// Local feature-hashing embedder, no network needed.
    Hashed,
    /// OpenAI-compatible `/embeddings` endpoint.
    Remote,
}

#[derive(Debug, Parser)]
#[command(
    name = "groq-rag",
    version,
    about = "Ask questions against a small knowledge base, answered by a Groq-hosted model"
)]
pub struct AppConfig {
    /// Groq API key.
    #[arg(long, env = "GROQ_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    #[arg(long, env = "GROQ_BASE_URL", default_value = DEFAULT_BASE_URL)]
    pub base_url: String,

    #[arg(long, env = "GROQ_MODEL", default_value = DEFAULT_MODEL)]
    pub model: String,

    /// Passages retrieved per question.
    #[arg(long, env = "RAG_TOP_K", default_value_t = DEFAULT_TOP_K)]
    pub top_k: usize,

    #[arg(long)]
    pub temperature: Option<f32>,

    #[arg(long)]
    pub max_tokens: Option<u32>,

    /// Drop trailing passages once the context would exceed this many characters.
    #[arg(long)]
    pub max_context_chars: Option<usize>,

    /// HTTP timeout for remote calls. No timeout when unset.
    #[arg(long)]
    pub timeout_secs: Option<u64>,

    #[arg(long, value_enum, env = "RAG_EMBEDDER", default_value_t = EmbedderKind::Hashed)]
    pub embedder: EmbedderKind,

    #[arg(long, env = "EMBEDDING_BASE_URL")]
    pub embedding_url: Option<String>,

    #[arg(long, env = "EMBEDDING_MODEL", default_value = "text-embedding-3-small")]
    pub embedding_model: String,

    #[arg(long, env = "EMBEDDING_API_KEY", hide_env_values = true)]
    pub embedding_api_key: Option<String>,

    #[arg(long, env = "EMBEDDING_DIM", default_value_t = DEFAULT_DIMENSIONS)]
    pub embedding_dim: usize,

    /// Ask a single question and exit instead of starting the prompt loop.
    #[arg(short, long)]
    pub query: Option<String>,
}

impl AppConfig {
    pub fn validate(&self) -> Result<()> {
        if self.top_k == 0 {
            return Err(RagError::Config("--top-k must be greater than zero".into()));
        }
        if self.api_key.as_deref().is_none_or(|k| k.trim().is_empty()) {
            return Err(RagError::Config(
                "GROQ_API_KEY is not set (use --api-key, the environment or a .env file)".into(),
            ));
        }
        if !is_http(&self.base_url) {
            return Err(RagError::Config(format!(
                "--base-url must start with http:// or https://, got '{}'",
                self.base_url
            )));
        }
        if self.embedding_dim == 0 {
            return Err(RagError::Config("--embedding-dim must be greater than zero".into()));
        }
        if self.embedder == EmbedderKind::Remote && self.embedding_url.is_none() {
            return Err(RagError::Config(
                "--embedder remote needs --embedding-url or EMBEDDING_BASE_URL".into(),
            ));
        }
        Ok(())
    }

    fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }

    pub fn llm_config(&self) -> LLMConfig {
        LLMConfig {
            api_key: self.api_key.clone().unwrap_or_default(),
            base_url: self.base_url.clone(),
            model: self.model.clone(),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            timeout: self.timeout(),
        }
    }

    pub fn build_embedder(&self) -> Result<Arc<dyn Embedder>> {
        match self.embedder {
            EmbedderKind::Hashed => Ok(Arc::new(HashedEmbedder::new(self.embedding_dim)?)),
            EmbedderKind::Remote => {
                let url = self.embedding_url.as_deref().ok_or_else(|| {
                    RagError::Config("remote embedder needs an endpoint url".into())
                })?;
                Ok(Arc::new(RemoteEmbedder::new(
                    url,
                    self.embedding_model.clone(),
                    self.embedding_api_key.clone(),
                    self.embedding_dim,
                    self.timeout(),
                )?))
            }
        }
    }
}

fn is_http(url: &str) -> bool {
    let url = url.trim();
    url.starts_with("http://") || url.starts_with("https://")
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::{CommandFactory, FromArgMatches};

    /// Parses flags only; env fallbacks are switched off so variables set on
    /// the host cannot change the outcome.
    fn parse(args: &[&str]) -> AppConfig {
        let mut argv = vec!["groq-rag"];
        argv.extend_from_slice(args);
        let matches = AppConfig::command()
            .mut_args(|arg| arg.env(None::<&'static str>))
            .try_get_matches_from(argv)
            .unwrap();
        AppConfig::from_arg_matches(&matches).unwrap()
    }

    #[test]
    fn explicit_flags_override_defaults() {
        let config = parse(&[
            "--api-key",
            "gsk_test",
            "--model",
            "llama-3.1-8b-instant",
            "--top-k",
            "5",
            "--max-context-chars",
            "2000",
            "-q",
            "What is the capital of France?",
        ]);
        assert!(config.validate().is_ok());
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.embedder, EmbedderKind::Hashed);
        assert_eq!(config.top_k, 5);
        assert_eq!(config.max_context_chars, Some(2000));
        assert_eq!(config.query.as_deref(), Some("What is the capital of France?"));

        let llm = config.llm_config();
        assert_eq!(llm.api_key, "gsk_test");
        assert_eq!(llm.model, "llama-3.1-8b-instant");
        assert_eq!(llm.timeout, None);
    }

    #[test]
    fn blank_api_key_fails_validation() {
        let config = parse(&["--api-key", "  "]);
        assert!(matches!(config.validate(), Err(RagError::Config(_))));
    }

    #[test]
    fn zero_top_k_fails_validation() {
        let config = parse(&["--api-key", "k", "--top-k", "0"]);
        assert!(matches!(config.validate(), Err(RagError::Config(_))));
    }

    #[test]
    fn non_http_base_url_fails_validation() {
        let config = parse(&["--api-key", "k", "--base-url", "api.groq.com"]);
        assert!(matches!(config.validate(), Err(RagError::Config(_))));
    }

    #[test]
    fn remote_embedder_requires_url() {
        let config = parse(&["--api-key", "k", "--embedder", "remote"]);
        assert_eq!(config.embedding_url, None);
        assert!(matches!(config.validate(), Err(RagError::Config(_))));

        let config = parse(&[
            "--api-key",
            "k",
            "--embedder",
            "remote",
            "--embedding-url",
            "http://localhost:11434/v1",
            "--embedding-dim",
            "768",
        ]);
        assert!(config.validate().is_ok());
        let embedder = config.build_embedder().unwrap();
        assert_eq!(embedder.name(), "remote");
        assert_eq!(embedder.dimensions(), 768);
    }

    #[test]
    fn hashed_embedder_uses_configured_dimension() {
        let config = parse(&["--api-key", "k", "--embedder", "hashed", "--embedding-dim", "64"]);
        let embedder = config.build_embedder().unwrap();
        assert_eq!(embedder.name(), "hashed");
        assert_eq!(embedder.dimensions(), 64);
    }

    #[test]
    fn timeout_flag_reaches_llm_config() {
        let config = parse(&["--api-key", "k", "--timeout-secs", "30"]);
        assert_eq!(config.llm_config().timeout, Some(Duration::from_secs(30)));
    }
}
