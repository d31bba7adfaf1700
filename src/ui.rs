//! Terminal prompt loop: one question per line, answers printed inline.

use std::io::Write;

use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::debug;

use crate::errors::{RagError, Result};
use crate::pipeline::RagSession;

pub const PROMPT: &str = "💬 Enter your query: ";
pub const EMPTY_WARNING: &str = "⚠️  Please enter a question first!";

/// Reads questions until EOF. Failed questions are reported and the loop continues.
pub async fn run<R, W>(session: &RagSession, mut input: R, out: &mut W) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    loop {
        write!(out, "{PROMPT}")?;
        out.flush()?;

        let mut line = String::new();
        if input.read_line(&mut line).await? == 0 {
            writeln!(out)?;
            break;
        }
        let query = line.trim_end_matches(['\n', '\r']);
        respond(session, query, out).await?;
    }
    Ok(())
}

/// Handles one submission. Returns whether an answer was shown.
pub async fn respond<W: Write>(session: &RagSession, query: &str, out: &mut W) -> Result<bool> {
    if query.trim().is_empty() {
        writeln!(out, "{EMPTY_WARNING}")?;
        return Ok(false);
    }

    writeln!(out, "Thinking... 🤔")?;
    out.flush()?;

    match session.ask(query).await {
        Ok(outcome) => {
            debug!(sources = ?outcome.sources, "answer ready");
            writeln!(out, "Answer:\n{}\n", outcome.answer)?;
            Ok(true)
        }
        Err(RagError::EmptyQuery) => {
            writeln!(out, "{EMPTY_WARNING}")?;
            Ok(false)
        }
        Err(e) => {
            writeln!(out, "❌ {e}\n")?;
            Ok(false)
        }
    }
}
