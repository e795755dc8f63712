//! Seed discovery
//!
//! Scans every entry for candidate tokens, keeps those that are classified or
//! random-looking enough, and ranks them into a reproducible priority list.

use crate::capture::{Entry, Location};
use crate::entropy::EntropyScorer;
use crate::patterns::{Category, Classification};
use crate::tokens::Tokenizer;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

/// Ranked seed candidate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeedCandidate {
    pub value: String,
    pub categories: Classification,
    pub entropy: Option<f64>,
    /// 1-based position in the ranked list
    pub rank: usize,
    /// Entry of first occurrence
    pub entry: usize,
    pub location: Location,
}

/// Category priority ordering for ranking
///
/// Earlier names rank higher; categories not listed rank after all listed ones.
#[derive(Debug, Clone, Default)]
pub struct CategoryPriority {
    positions: HashMap<String, usize>,
}

impl CategoryPriority {
    pub fn new(order: &[String]) -> Self {
        let mut positions = HashMap::new();
        for (pos, name) in order.iter().enumerate() {
            positions.entry(name.clone()).or_insert(pos);
        }
        Self { positions }
    }

    fn position(&self, category: &Category) -> usize {
        self.positions
            .get(category.as_str())
            .copied()
            .unwrap_or(self.positions.len())
    }

    /// Best position among a classification, `None` for an empty one
    pub fn best(&self, categories: &Classification) -> Option<usize> {
        categories.iter().map(|c| self.position(c)).min()
    }
}

/// Seed discoverer
pub struct SeedDiscoverer {
    tokenizer: Tokenizer,
    scorer: EntropyScorer,
    entropy_threshold: f64,
    priority: CategoryPriority,
}

struct Scored {
    candidate: SeedCandidate,
    priority: Option<usize>,
    order: usize,
}

impl SeedDiscoverer {
    pub fn new(
        tokenizer: Tokenizer,
        scorer: EntropyScorer,
        entropy_threshold: f64,
        priority: CategoryPriority,
    ) -> Self {
        Self {
            tokenizer,
            scorer,
            entropy_threshold,
            priority,
        }
    }

    /// Discover and rank up to `limit` seed candidates
    pub fn discover(&self, entries: &[Entry], limit: usize) -> Vec<SeedCandidate> {
        let classifier = self.tokenizer.classifier();
        let mut seen = HashSet::new();
        let mut scored = Vec::new();

        for entry in entries {
            for token in self.tokenizer.tokens_of_entry(entry) {
                if !seen.insert(token.value.clone()) {
                    continue;
                }

                let categories = classifier.classify(&token.value);
                let entropy = self.scorer.score(&token.value);
                let high_entropy = entropy.is_some_and(|e| e >= self.entropy_threshold);
                if categories.is_empty() && !high_entropy {
                    continue;
                }

                let priority = self.priority.best(&categories);
                let order = scored.len();
                scored.push(Scored {
                    candidate: SeedCandidate {
                        value: token.value,
                        categories,
                        entropy,
                        rank: 0,
                        entry: token.entry,
                        location: token.location,
                    },
                    priority,
                    order,
                });
            }
        }

        scored.sort_by(compare);

        let candidates: Vec<SeedCandidate> = scored
            .into_iter()
            .take(limit)
            .enumerate()
            .map(|(i, s)| SeedCandidate {
                rank: i + 1,
                ..s.candidate
            })
            .collect();

        tracing::info!(
            "Discovered {} seed candidates across {} entries",
            candidates.len(),
            entries.len()
        );

        candidates
    }
}

/// Classified first, then category priority, then entropy descending
fn compare(a: &Scored, b: &Scored) -> Ordering {
    let class_rank = |s: &Scored| match s.priority {
        Some(p) => (0, p),
        None => (1, 0),
    };

    class_rank(a)
        .cmp(&class_rank(b))
        .then_with(|| match (a.candidate.entropy, b.candidate.entropy) {
            (Some(x), Some(y)) => y.total_cmp(&x),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        })
        .then_with(|| a.order.cmp(&b.order))
}
