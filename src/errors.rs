//! Error type shared by the knowledge store, the answer generator and the session.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RagError {
    /// Blank or whitespace-only query. No remote call is made.
    #[error("query is empty")]
    EmptyQuery,

    /// Embedding function or backing index could not be reached.
    #[error("knowledge store unavailable: {0}")]
    StoreUnavailable(String),

    /// The remote text-generation call failed.
    #[error("generation unavailable: {0}")]
    GenerationUnavailable(String),

    /// The same id appears twice in one indexing batch.
    #[error("duplicate document id in batch: {0}")]
    DuplicateId(String),

    #[error("top-k must be greater than zero")]
    InvalidTopK,

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, RagError>;

/// Cuts a response body down to something that fits in one log line.
pub fn snippet(body: &str, max_chars: usize) -> String {
    let mut out: String = body.chars().take(max_chars).collect();
    if body.chars().count() > max_chars {
        out.push('…');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snippet_truncates_long_bodies() {
        assert_eq!(snippet("abcdef", 3), "abc…");
        assert_eq!(snippet("abc", 3), "abc");
        assert_eq!(snippet("", 3), "");
    }

    #[test]
    fn messages_name_the_failure() {
        let err = RagError::GenerationUnavailable("401 Unauthorized".into());
        assert_eq!(err.to_string(), "generation unavailable: 401 Unauthorized");
        assert_eq!(RagError::EmptyQuery.to_string(), "query is empty");
    }
}
