//! Pattern classifier for configuration-driven token categorization
//!
//! This module provides:
//! - The ordered pattern table (category name → regex) loaded from configuration
//! - A classifier with pre-compiled anchored and unanchored forms of every rule
//! - Multi-label classification: every matching category is reported
//! - Per-category match counting for capture-wide statistics

use crate::error::{ReqtraceError, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};

/// Category rule configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryConfig {
    pub name: String,
    pub pattern: String,
    #[serde(default)]
    pub description: String,
}

impl CategoryConfig {
    pub fn new(name: &str, pattern: &str, description: &str) -> Self {
        Self {
            name: name.to_string(),
            pattern: pattern.to_string(),
            description: description.to_string(),
        }
    }
}

/// Built-in pattern table, in default priority order
pub fn default_categories() -> Vec<CategoryConfig> {
    vec![
        CategoryConfig::new("match_ids", r"\b\d{10}\b", "10-digit match identifiers"),
        CategoryConfig::new("team_ids", r"\b100000\d{4}\b", "Team identifiers"),
        CategoryConfig::new("timestamps", r"\b1[0-9]{9}\b", "Unix timestamps"),
        CategoryConfig::new(
            "stream_tokens",
            r"[a-f0-9]{40}\.[a-z]+\.\d{10}-[A-Za-z0-9+/=]+",
            "Signed stream tokens",
        ),
        CategoryConfig::new(
            "device_ids",
            r"[a-f0-9]{8}-[a-f0-9]{4}-[a-f0-9]{4}-[a-f0-9]{4}-[a-f0-9]{12}",
            "UUID device identifiers",
        ),
        CategoryConfig::new("client_ids", r"[A-Za-z0-9]{32}", "32-character client identifiers"),
        CategoryConfig::new(
            "cloudfront_ids",
            r"[a-f0-9]{16}-[A-Z]{3}",
            "CloudFront request identifiers",
        ),
        CategoryConfig::new("api_keys", r"[A-Za-z0-9]{20,}", "Generic API keys"),
    ]
}

/// Named classification rule
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Category(String);

impl Category {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Set of categories matching one token
pub type Classification = BTreeSet<Category>;

/// Compiled category rule
#[derive(Debug, Clone)]
pub struct CompiledCategory {
    pub category: Category,
    pub description: String,
    /// Whole-token form used for classification
    anchored: Regex,
    /// Search form used for extraction and counting
    search: Regex,
}

/// Classifier over an immutable, order-preserving pattern table
#[derive(Debug, Clone)]
pub struct Classifier {
    rules: Vec<CompiledCategory>,
}

impl Classifier {
    /// Compile every rule, failing on the first invalid pattern
    pub fn new(table: &[CategoryConfig]) -> Result<Self> {
        let mut seen = HashSet::new();
        let mut rules = Vec::with_capacity(table.len());

        for cfg in table {
            if !seen.insert(cfg.name.as_str()) {
                return Err(ReqtraceError::InvalidPattern {
                    category: cfg.name.clone(),
                    message: "duplicate category name".to_string(),
                });
            }

            let invalid = |e: regex::Error| ReqtraceError::InvalidPattern {
                category: cfg.name.clone(),
                message: e.to_string(),
            };
            let search = Regex::new(&cfg.pattern).map_err(invalid)?;
            let anchored = Regex::new(&format!("^(?:{})$", cfg.pattern)).map_err(invalid)?;

            rules.push(CompiledCategory {
                category: Category::new(cfg.name.clone()),
                description: cfg.description.clone(),
                anchored,
                search,
            });
        }

        tracing::debug!("Compiled {} category rules", rules.len());

        Ok(Self { rules })
    }

    /// Categories in table order
    pub fn categories(&self) -> impl Iterator<Item = &Category> {
        self.rules.iter().map(|r| &r.category)
    }

    pub fn rules(&self) -> &[CompiledCategory] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Every category whose pattern matches the whole token
    pub fn classify(&self, token: &str) -> Classification {
        self.rules
            .iter()
            .filter(|r| r.anchored.is_match(token))
            .map(|r| r.category.clone())
            .collect()
    }

    /// Byte spans of every unanchored rule match in `text`
    pub fn match_spans(&self, text: &str) -> Vec<(usize, usize)> {
        self.rules
            .iter()
            .flat_map(|r| r.search.find_iter(text).map(|m| (m.start(), m.end())))
            .collect()
    }

    /// Match count per rule, aligned with table order
    pub fn count_matches(&self, text: &str) -> Vec<usize> {
        self.rules
            .iter()
            .map(|r| r.search.find_iter(text).count())
            .collect()
    }
}
