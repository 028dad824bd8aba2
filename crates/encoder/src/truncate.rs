use semroute_common::{Result, SemrouteError};
use tiktoken_rs::CoreBPE;
use tracing::{debug, warn};

/// Lossy token-limit truncation using the cl100k_base BPE
#[derive(Debug)]
pub struct TextTruncator {
    bpe: CoreBPE,
    token_limit: usize,
}

impl TextTruncator {
    pub fn new(token_limit: usize) -> Result<Self> {
        let bpe = tiktoken_rs::cl100k_base()
            .map_err(|e| SemrouteError::config(format!("Failed to load tokenizer: {}", e)))?;
        Ok(Self { bpe, token_limit })
    }

    pub fn token_limit(&self) -> usize {
        self.token_limit
    }

    pub fn count_tokens(&self, text: &str) -> usize {
        self.bpe.encode_ordinary(text).len()
    }

    /// Truncate a document to the token limit.
    ///
    /// Documents over the limit keep their first `limit - 1` tokens; the
    /// loss is logged but never fatal.
    pub fn truncate(&self, text: &str) -> String {
        let tokens = self.bpe.encode_ordinary(text);
        if tokens.len() <= self.token_limit {
            return text.to_string();
        }

        warn!(
            "Document exceeds token limit: {} > {}. Truncating document...",
            tokens.len(),
            self.token_limit
        );

        let keep = self.token_limit.saturating_sub(1);
        match self.bpe.decode(tokens[..keep].to_vec()) {
            Ok(truncated) => {
                debug!("Truncated length: {} tokens", self.count_tokens(&truncated));
                truncated
            }
            Err(e) => {
                // Token prefix landed inside a multi-byte sequence; fall back
                // to a character cut kept within the token budget.
                warn!("Token decode failed after truncation: {}", e);
                self.char_cut(text, keep)
            }
        }
    }

    /// Cut at a character boundary, then pop characters until the text
    /// fits the token budget. A single character can cost several tokens,
    /// so the initial cut alone is not enough.
    fn char_cut(&self, text: &str, budget: usize) -> String {
        let mut cut: String = text.chars().take(budget).collect();
        while !cut.is_empty() && self.count_tokens(&cut) > budget {
            cut.pop();
        }
        cut
    }
}
