//! sentence-level filtering
use super::Filter;

/// Word count filter.
/// Returns `false` if provided sentence has more than [MaxWords::max_words] whitespace separated tokens.
///
/// [MaxWords::max_words] is 100 by default.
#[derive(Debug, Clone, Copy)]
pub struct MaxWords {
    max_words: usize,
}

impl MaxWords {
    /// specify a maximum word count
    pub fn with_max_words(max_words: usize) -> Self {
        Self { max_words }
    }

    /// Get the maximum word count.
    pub fn max_words(&self) -> usize {
        self.max_words
    }
}

impl Filter<&str> for MaxWords {
    fn detect(&self, sentence: &str) -> bool {
        // stop counting as soon as the limit is crossed, lines can be very long.
        sentence.split_whitespace().nth(self.max_words).is_none()
    }
}

impl Default for MaxWords {
    /// Default maximum is 100 words
    fn default() -> Self {
        MaxWords { max_words: 100 }
    }
}
