//! Dependency tracer
//!
//! Two modes over one loaded capture and one seed value:
//! - Walk-back: the first entry in which the seed occurs
//! - Full: bounded breadth-first expansion of every value the seed leads to
//!
//! Expansion uses an explicit work queue and a global visited set, so it
//! terminates on any finite capture and yields the same graph on every run.
//! Depth, node and deadline limits truncate the graph, they never fail it.

mod context;
mod graph;

pub use graph::{DependencyEdge, DependencyGraph, DependencyNode, Relation};

use crate::capture::Entry;
use crate::entropy::EntropyScorer;
use crate::error::{ReqtraceError, Result};
use crate::patterns::Classification;
use crate::tokens::Tokenizer;
use context::BodyContext;
use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Resource caps for a full trace
#[derive(Debug, Clone, Copy)]
pub struct TraceLimits {
    /// Nodes at this depth are not expanded; 0 yields the seed alone
    pub max_depth: usize,
    /// Upper bound on visited values, seed included
    pub max_nodes: usize,
    /// Wall-clock point after which expansion stops
    pub deadline: Option<Instant>,
}

impl TraceLimits {
    pub fn new(max_depth: usize, max_nodes: usize) -> Self {
        Self {
            max_depth,
            max_nodes: max_nodes.max(1),
            deadline: None,
        }
    }

    /// Stop expanding once `timeout` has elapsed from now
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.deadline = Some(Instant::now() + timeout);
        self
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    fn expired(&self) -> bool {
        self.deadline.is_some_and(|d| Instant::now() >= d)
    }
}

/// Qualifying value emitted by one entry's response
#[derive(Debug, Clone)]
struct Dependent {
    value: String,
    entry: usize,
    categories: Classification,
    entropy: Option<f64>,
    field: Option<String>,
}

/// Dependency tracer
pub struct Tracer {
    tokenizer: Tokenizer,
    scorer: EntropyScorer,
    entropy_threshold: f64,
}

impl Tracer {
    pub fn new(tokenizer: Tokenizer, scorer: EntropyScorer, entropy_threshold: f64) -> Self {
        Self {
            tokenizer,
            scorer,
            entropy_threshold,
        }
    }

    /// Walk back to the earliest entry containing `seed`
    pub fn trace_origin<'a>(&self, entries: &'a [Entry], seed: &str) -> Result<&'a Entry> {
        let origin = entries
            .iter()
            .find(|e| e.contains(seed))
            .ok_or_else(|| ReqtraceError::SeedNotFound {
                seed: seed.to_string(),
            })?;

        tracing::info!("Origin of {} is entry {}: {}", seed, origin.index, origin.top_line());

        Ok(origin)
    }

    /// Build the dependency graph reachable from `seed`
    pub fn trace_graph(
        &self,
        entries: &[Entry],
        seed: &str,
        limits: &TraceLimits,
    ) -> Result<DependencyGraph> {
        let seed_entries = occurrences(entries, seed);
        if seed_entries.is_empty() {
            return Err(ReqtraceError::SeedNotFound {
                seed: seed.to_string(),
            });
        }

        let classifier = self.tokenizer.classifier();
        let mut graph = DependencyGraph::new(DependencyNode {
            value: seed.to_string(),
            categories: classifier.classify(seed),
            entropy: self.scorer.score(seed),
            entries: seed_entries,
            depth: 0,
        });

        let max_nodes = limits.max_nodes.max(1);
        let mut queue: VecDeque<(usize, usize)> = VecDeque::from([(0, 0)]);

        while let Some((idx, depth)) = queue.pop_front() {
            if limits.expired() {
                tracing::warn!("Trace deadline reached with {} queued values", queue.len() + 1);
                graph.mark_truncated();
                break;
            }

            let node = graph.node_at(idx);
            let value = node.value.clone();
            let sources = node.entries.clone();

            if depth >= limits.max_depth {
                if limits.max_depth > 0
                    && self
                        .dependents(entries, &value, &sources)
                        .iter()
                        .any(|d| !graph.contains(&d.value))
                {
                    tracing::debug!("Depth limit stops expansion of {}", value);
                    graph.mark_truncated();
                }
                continue;
            }

            let dependents = self.dependents(entries, &value, &sources);
            tracing::debug!(
                "Expanding {} at depth {}: {} dependents in {} entries",
                value,
                depth,
                dependents.len(),
                sources.len()
            );

            for dep in dependents {
                if let Some(child) = graph.index_of(&dep.value) {
                    graph.add_edge(idx, child, dep.entry, dep.field);
                    continue;
                }

                if graph.len() >= max_nodes {
                    graph.mark_truncated();
                    continue;
                }

                let child = graph.insert_node(DependencyNode {
                    entries: occurrences(entries, &dep.value),
                    value: dep.value,
                    categories: dep.categories,
                    entropy: dep.entropy,
                    depth: depth + 1,
                });
                graph.add_edge(idx, child, dep.entry, dep.field);
                queue.push_back((child, depth + 1));
            }
        }

        if graph.is_truncated() {
            tracing::warn!(
                "Trace of {} truncated at {} nodes (max_depth={}, max_nodes={})",
                seed,
                graph.len(),
                limits.max_depth,
                max_nodes
            );
        }
        tracing::info!(
            "Traced {}: {} nodes, {} edges",
            seed,
            graph.len(),
            graph.edges().len()
        );

        Ok(graph)
    }

    /// Qualifying values in the responses of `sources`, in entry then text order,
    /// each with the field it was found under
    fn dependents(&self, entries: &[Entry], value: &str, sources: &[usize]) -> Vec<Dependent> {
        let classifier = self.tokenizer.classifier();
        let mut found = Vec::new();

        for entry in sources.iter().filter_map(|&i| entries.get(i)) {
            let Some(body) = entry.response_body.as_deref() else {
                continue;
            };
            let context = BodyContext::new(body, entry.looks_like_json());

            for token in self.tokenizer.tokenize(body) {
                if token == value {
                    continue;
                }

                let categories = classifier.classify(token);
                let entropy = self.scorer.score(token);
                let high_entropy = entropy.is_some_and(|e| e >= self.entropy_threshold);
                if categories.is_empty() && !high_entropy {
                    continue;
                }

                found.push(Dependent {
                    value: token.to_string(),
                    entry: entry.index,
                    categories,
                    entropy,
                    field: context.field_of(token),
                });
            }
        }

        found
    }
}

/// Indices of every entry containing `value`, ascending
fn occurrences(entries: &[Entry], value: &str) -> Vec<usize> {
    entries
        .iter()
        .filter(|e| e.contains(value))
        .map(|e| e.index)
        .collect()
}
