// Candidate token extraction shared by seed discovery and graph expansion
use crate::capture::{Entry, Location};
use crate::error::Result;
use crate::patterns::Classifier;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;

/// Word/punctuation boundary for plain tokens
const WORD_PATTERN: &str = r"[A-Za-z0-9_-]+";

/// Candidate string taken from one entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub value: String,
    pub entry: usize,
    pub location: Location,
}

/// Splits entry text into candidate tokens
#[derive(Debug, Clone)]
pub struct Tokenizer {
    word: Regex,
    classifier: Arc<Classifier>,
}

impl Tokenizer {
    pub fn new(classifier: Arc<Classifier>) -> Result<Self> {
        let word = Regex::new(WORD_PATTERN).map_err(anyhow::Error::from)?;
        Ok(Self { word, classifier })
    }

    pub fn classifier(&self) -> &Classifier {
        &self.classifier
    }

    /// Split text into candidate tokens
    ///
    /// Yields word runs plus every classifier match that starts and ends on a
    /// word boundary (so punctuated values such as signed stream tokens
    /// survive while fragments of longer runs do not), ordered by first
    /// position in the text and deduplicated by value.
    pub fn tokenize<'a>(&self, text: &'a str) -> Vec<&'a str> {
        let mut spans: Vec<(usize, usize)> = self
            .word
            .find_iter(text)
            .map(|m| (m.start(), m.end()))
            .collect();
        spans.extend(
            self.classifier
                .match_spans(text)
                .into_iter()
                .filter(|&(start, end)| on_word_boundary(text, start, end)),
        );
        spans.sort_unstable();

        let mut seen = HashSet::new();
        spans
            .into_iter()
            .map(|(start, end)| &text[start..end])
            .filter(|token| !token.is_empty() && seen.insert(*token))
            .collect()
    }

    /// Tokens of every value-bearing field of an entry, in location order
    ///
    /// Header names are skipped. A value appearing in several locations is
    /// reported once, at its first location.
    pub fn tokens_of_entry(&self, entry: &Entry) -> Vec<Token> {
        let mut seen = HashSet::new();
        let mut tokens = Vec::new();

        for (location, text) in entry.value_fields() {
            for value in self.tokenize(text) {
                if seen.insert(value) {
                    tokens.push(Token {
                        value: value.to_string(),
                        entry: entry.index,
                        location,
                    });
                }
            }
        }

        tokens
    }
}

fn is_word_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '-'
}

/// Whether `text[start..end]` neither begins nor ends inside a word run
fn on_word_boundary(text: &str, start: usize, end: usize) -> bool {
    let before = text[..start].chars().next_back();
    let after = text[end..].chars().next();
    !before.is_some_and(is_word_char) && !after.is_some_and(is_word_char)
}
