//! One question-answering session: retrieval followed by generation.

use tracing::{error, info, warn};

use crate::errors::{RagError, Result};
use crate::llm::AnswerGenerator;
use crate::retriever::Retriever;
use crate::seed::seed_documents;

pub const DEFAULT_TOP_K: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AskOutcome {
    pub answer: String,
    /// Ids of the passages given to the model, in retrieval order.
    pub sources: Vec<String>,
}

pub struct RagSession {
    retriever: Retriever,
    answerer: AnswerGenerator,
    top_k: usize,
    seeded: bool,
}

impl RagSession {
    pub fn new(retriever: Retriever, answerer: AnswerGenerator, top_k: usize) -> Result<Self> {
        if top_k == 0 {
            return Err(RagError::InvalidTopK);
        }
        Ok(Self {
            retriever,
            answerer,
            top_k,
            seeded: false,
        })
    }

    pub fn document_count(&self) -> usize {
        self.retriever.len()
    }

    /// Indexes the seed documents on the first call. Returns whether this
    /// call did the seeding. The flag is only set once indexing succeeded.
    pub async fn ensure_seeded(&mut self) -> Result<bool> {
        if self.seeded {
            return Ok(false);
        }
        self.retriever.index(seed_documents()).await?;
        self.seeded = true;
        info!(documents = self.retriever.len(), "knowledge base seeded");
        Ok(true)
    }

    /// Sends `query` to the model as typed; trimming is only used to reject
    /// blank input.
    pub async fn ask(&self, query: &str) -> Result<AskOutcome> {
        if query.trim().is_empty() {
            return Err(RagError::EmptyQuery);
        }
        if self.retriever.is_empty() {
            warn!("knowledge base is empty; answering without context");
        }

        let passages = self.retriever.retrieve(query, self.top_k).await.map_err(|e| {
            error!(error = %e, "retrieval failed");
            e
        })?;
        let answer = self.answerer.answer(query, &passages).await.map_err(|e| {
            error!(error = %e, model = self.answerer.model(), "generation failed");
            e
        })?;

        Ok(AskOutcome {
            answer,
            sources: passages.into_iter().map(|p| p.id).collect(),
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use crate::embedding::{Embedder, HashedEmbedder};
    use crate::llm::{ChatMessage, Generator, Role};

    /// Answers with the first context line of the system prompt, the way a
    /// grounded model would quote its best passage.
    #[derive(Default)]
    pub(crate) struct EchoContext {
        pub calls: AtomicUsize,
        pub last_user: Mutex<Option<String>>,
    }

    #[async_trait]
    impl Generator for EchoContext {
        async fn chat(&self, _model: &str, messages: &[ChatMessage]) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last_user.lock().unwrap() = messages
                .iter()
                .find(|m| m.role == Role::User)
                .map(|m| m.content.clone());
            let system = messages
                .iter()
                .find(|m| m.role == Role::System)
                .map(|m| m.content.as_str())
                .unwrap_or_default();
            let first_context = system
                .split_once("Context:\n")
                .and_then(|(_, rest)| rest.lines().next())
                .unwrap_or_default();
            if first_context.is_empty() {
                Ok("I don't know.".to_string())
            } else {
                Ok(first_context.to_string())
            }
        }
    }

    struct Failing;

    #[async_trait]
    impl Generator for Failing {
        async fn chat(&self, _model: &str, _messages: &[ChatMessage]) -> Result<String> {
            Err(RagError::GenerationUnavailable("401 Unauthorized".into()))
        }
    }

    struct Offline;

    #[async_trait]
    impl Embedder for Offline {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            Err(RagError::StoreUnavailable("connection refused".into()))
        }
        fn dimensions(&self) -> usize {
            8
        }
        fn name(&self) -> &str {
            "offline"
        }
    }

    fn session_with(generator: Arc<dyn Generator>) -> RagSession {
        let retriever = Retriever::new(Arc::new(HashedEmbedder::default()));
        let answerer = AnswerGenerator::new(generator, "test-model");
        RagSession::new(retriever, answerer, DEFAULT_TOP_K).unwrap()
    }

    #[tokio::test]
    async fn seeding_happens_once() {
        let mut session = session_with(Arc::new(EchoContext::default()));
        assert!(!session.seeded);
        assert!(session.ensure_seeded().await.unwrap());
        assert!(!session.ensure_seeded().await.unwrap());
        assert!(session.seeded);
        assert_eq!(session.document_count(), 15);
    }

    #[tokio::test]
    async fn world_cup_answer_mentions_argentina() {
        let mut session = session_with(Arc::new(EchoContext::default()));
        session.ensure_seeded().await.unwrap();
        let outcome = session.ask("Who won the FIFA World Cup in 2022?").await.unwrap();
        assert_eq!(outcome.sources[0], "doc1");
        assert_eq!(outcome.sources.len(), 3);
        assert!(outcome.answer.contains("Argentina"));
    }

    #[tokio::test]
    async fn speed_of_light_answer_has_the_number() {
        let mut session = session_with(Arc::new(EchoContext::default()));
        session.ensure_seeded().await.unwrap();
        let outcome = session.ask("What is the speed of light?").await.unwrap();
        assert!(outcome.sources.contains(&"doc13".to_string()));
        assert!(outcome.answer.contains("299,792"));
    }

    #[tokio::test]
    async fn unrelated_question_still_gets_an_answer() {
        let mut session = session_with(Arc::new(EchoContext::default()));
        session.ensure_seeded().await.unwrap();
        let outcome = session
            .ask("What is the boiling point of mercury?")
            .await
            .unwrap();
        assert!(!outcome.answer.trim().is_empty());
        assert_eq!(outcome.sources.len(), 3);
    }

    #[tokio::test]
    async fn blank_question_makes_no_calls() {
        let generator = Arc::new(EchoContext::default());
        let mut session = session_with(generator.clone());
        session.ensure_seeded().await.unwrap();
        assert!(matches!(session.ask("   ").await, Err(RagError::EmptyQuery)));
        assert_eq!(generator.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn raw_query_reaches_the_model() {
        let generator = Arc::new(EchoContext::default());
        let mut session = session_with(generator.clone());
        session.ensure_seeded().await.unwrap();
        session.ask("  Who won the FIFA World Cup in 2022?  ").await.unwrap();
        assert_eq!(
            generator.last_user.lock().unwrap().as_deref(),
            Some("  Who won the FIFA World Cup in 2022?  ")
        );
    }

    #[tokio::test]
    async fn repeated_question_uses_same_sources_after_reseed() {
        let mut session = session_with(Arc::new(EchoContext::default()));
        session.ensure_seeded().await.unwrap();
        let first = session.ask("Who founded Apple?").await.unwrap();
        session.retriever.index(seed_documents()).await.unwrap();
        let second = session.ask("Who founded Apple?").await.unwrap();
        assert_eq!(first.sources, second.sources);
        assert_eq!(session.document_count(), 15);
    }

    #[tokio::test]
    async fn generation_failure_is_surfaced() {
        let mut session = session_with(Arc::new(Failing));
        session.ensure_seeded().await.unwrap();
        let err = session.ask("What is the capital of France?").await.unwrap_err();
        assert!(matches!(err, RagError::GenerationUnavailable(_)));
    }

    #[tokio::test]
    async fn store_failure_leaves_session_unseeded() {
        let retriever = Retriever::new(Arc::new(Offline));
        let answerer = AnswerGenerator::new(Arc::new(EchoContext::default()), "test-model");
        let mut session = RagSession::new(retriever, answerer, DEFAULT_TOP_K).unwrap();
        let err = session.ensure_seeded().await.unwrap_err();
        assert!(matches!(err, RagError::StoreUnavailable(_)));
        assert!(!session.seeded);
        assert!(matches!(
            session.ask("anything").await,
            Err(RagError::StoreUnavailable(_))
        ));
    }

    #[tokio::test]
    async fn zero_top_k_is_rejected() {
        let retriever = Retriever::new(Arc::new(HashedEmbedder::default()));
        let answerer = AnswerGenerator::new(Arc::new(EchoContext::default()), "m");
        assert!(matches!(
            RagSession::new(retriever, answerer, 0),
            Err(RagError::InvalidTopK)
        ));
    }
}
