//! The token-counting abstraction chunkers budget against.

/// Counts tokens the way a particular embedding/completion model would,
/// so a chunker can size spans against that model's actual budget rather
/// than a proxy like character or word count.
pub trait TokenCounter: Send + Sync {
    /// Name of the model this counter approximates.
    fn name(&self) -> &str;

    /// The model's maximum context length in tokens.
    fn max_tokens(&self) -> usize;

    fn count(&self, text: &str) -> usize;

    fn count_batch(&self, texts: &[&str]) -> Vec<usize>;
}
