//! Token counter backed by a loaded `tokenizers::Tokenizer`, for counting
//! against the exact vocabulary a local embedding model uses rather than
//! an OpenAI proxy like [`super::tiktoken_counter::TiktokenCounter`].

use std::sync::Arc;

use tokenizers::Tokenizer;

use crate::chunking::traits::TokenCounter;

pub struct HfTokenizerCounter {
    model_name: String,
    tokenizer: Arc<Tokenizer>,
    max_tokens: usize,
}

impl HfTokenizerCounter {
    #[must_use]
    pub fn new(model_name: impl Into<String>, tokenizer: Arc<Tokenizer>, max_tokens: usize) -> Self {
        Self {
            model_name: model_name.into(),
            tokenizer,
            max_tokens,
        }
    }
}

impl TokenCounter for HfTokenizerCounter {
    fn name(&self) -> &str {
        &self.model_name
    }

    fn max_tokens(&self) -> usize {
        self.max_tokens
    }

    fn count(&self, text: &str) -> usize {
        self.tokenizer.encode(text, false).map_or(0, |encoding| encoding.len())
    }

    fn count_batch(&self, texts: &[&str]) -> Vec<usize> {
        texts.iter().map(|text| self.count(text)).collect()
    }
}
