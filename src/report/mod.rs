//! Report building
//!
//! Two independent aggregations:
//! - A dependency graph rendered as annotated parent → child rows
//! - A capture-wide summary of pattern frequencies and endpoints by host

use crate::capture::Entry;
use crate::entropy::EntropyScorer;
use crate::error::{ReqtraceError, Result};
use crate::patterns::{Category, Classification};
use crate::tokens::Tokenizer;
use crate::tracer::{DependencyGraph, DependencyNode, Relation};
use serde::Serialize;
use std::collections::HashSet;
use std::fmt;

/// One parent → child edge annotated with the child's attributes
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EdgeRow {
    pub parent: String,
    pub child: String,
    pub entry: usize,
    pub relation: Relation,
    pub categories: Classification,
    pub entropy: Option<f64>,
    pub depth: usize,
    /// Field the child sits under in the producing response
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    /// Request line of the producing entry
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request: Option<String>,
}

/// Rendered dependency graph
#[derive(Debug, Clone, Serialize)]
pub struct GraphReport {
    pub seed: String,
    pub nodes: Vec<DependencyNode>,
    pub edges: Vec<EdgeRow>,
    pub truncated: bool,
}

/// Per-category match total
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryCount {
    pub category: Category,
    pub description: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Endpoint {
    pub entry: usize,
    pub method: String,
    pub url: String,
    pub path: String,
    pub status: i32,
}

impl Endpoint {
    fn from_entry(entry: &Entry) -> Self {
        Self {
            entry: entry.index,
            method: entry.method.clone(),
            url: entry.url.clone(),
            path: entry.path(),
            status: entry.status,
        }
    }
}

/// Endpoints sharing one host
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HostGroup {
    pub host: String,
    pub endpoints: Vec<Endpoint>,
}

/// Capture-wide pattern and endpoint summary
#[derive(Debug, Clone, Serialize)]
pub struct PatternReport {
    pub total_entries: usize,
    pub primary_host: Option<String>,
    pub api_calls: usize,
    /// Entries whose response body is JSON
    pub json_responses: usize,
    /// Distinct tokens at or above the entropy threshold
    pub high_entropy_values: usize,
    pub pattern_counts: Vec<CategoryCount>,
    /// Hosts belonging to the primary target site
    pub same_host: Vec<HostGroup>,
    /// Hosts outside the primary target site
    pub external: Vec<HostGroup>,
}

impl PatternReport {
    pub fn external_hosts(&self) -> Vec<&str> {
        self.external.iter().map(|g| g.host.as_str()).collect()
    }
}

/// Builds reports from traced graphs and loaded captures
pub struct ReportBuilder {
    tokenizer: Tokenizer,
    scorer: EntropyScorer,
    entropy_threshold: f64,
}

impl ReportBuilder {
    pub fn new(tokenizer: Tokenizer, scorer: EntropyScorer, entropy_threshold: f64) -> Self {
        Self {
            tokenizer,
            scorer,
            entropy_threshold,
        }
    }

    /// Render a graph as edge rows in discovery order
    pub fn graph_report(&self, graph: &DependencyGraph, entries: &[Entry]) -> GraphReport {
        let edges = graph
            .edges()
            .iter()
            .filter_map(|edge| {
                let child = graph.node(&edge.child)?;
                Some(EdgeRow {
                    parent: edge.parent.clone(),
                    child: edge.child.clone(),
                    entry: edge.entry,
                    relation: edge.relation,
                    categories: child.categories.clone(),
                    entropy: child.entropy,
                    depth: child.depth,
                    field: edge.field.clone(),
                    request: entries.get(edge.entry).map(Entry::top_line),
                })
            })
            .collect();

        GraphReport {
            seed: graph.seed().value.clone(),
            nodes: graph.nodes().to_vec(),
            edges,
            truncated: graph.is_truncated(),
        }
    }

    /// Summarize pattern frequencies and endpoints across the capture
    ///
    /// Per-category counts are independent tallies: a match that satisfies
    /// two rules increments both.
    pub fn pattern_report(&self, entries: &[Entry], primary_host: Option<&str>) -> PatternReport {
        let classifier = self.tokenizer.classifier();
        let mut counts = vec![0usize; classifier.len()];
        let mut high_entropy = HashSet::new();

        for entry in entries {
            for (_, text) in entry.text_fields() {
                for (total, n) in counts.iter_mut().zip(classifier.count_matches(text)) {
                    *total += n;
                }
            }
            for (_, text) in entry.value_fields() {
                for token in self.tokenizer.tokenize(text) {
                    if self
                        .scorer
                        .score(token)
                        .is_some_and(|e| e >= self.entropy_threshold)
                    {
                        high_entropy.insert(token);
                    }
                }
            }
        }

        let pattern_counts = classifier
            .rules()
            .iter()
            .zip(counts)
            .map(|(rule, count)| CategoryCount {
                category: rule.category.clone(),
                description: rule.description.clone(),
                count,
            })
            .collect();

        let site = primary_host.map(site_of);
        let mut same_host: Vec<HostGroup> = Vec::new();
        let mut external: Vec<HostGroup> = Vec::new();
        let mut api_calls = 0;
        let mut json_responses = 0;

        for entry in entries {
            let host = entry.host().unwrap_or_default();
            let is_same = site.as_deref().is_some_and(|s| belongs_to_site(&host, s));
            let endpoint = Endpoint::from_entry(entry);

            if entry.looks_like_json() {
                json_responses += 1;
            }

            if is_same && endpoint.path.contains("/api/") {
                api_calls += 1;
            }

            let groups = if is_same { &mut same_host } else { &mut external };
            match groups.iter_mut().find(|g| g.host == host) {
                Some(group) => group.endpoints.push(endpoint),
                None => groups.push(HostGroup {
                    host,
                    endpoints: vec![endpoint],
                }),
            }
        }

        PatternReport {
            total_entries: entries.len(),
            primary_host: primary_host.map(str::to_string),
            api_calls,
            json_responses,
            high_entropy_values: high_entropy.len(),
            pattern_counts,
            same_host,
            external,
        }
    }
}

/// Registrable part of a host
///
/// The last two labels, or three under a two-level country suffix such as
/// `co.uk`. IP literals are their own site.
fn site_of(host: &str) -> String {
    let host = host.trim_end_matches('.');
    if is_ip_literal(host) {
        return host.to_string();
    }

    let labels: Vec<&str> = host.split('.').collect();
    let n = labels.len();
    let keep = if n >= 3 && is_country_second_level(labels[n - 2], labels[n - 1]) {
        3
    } else {
        2
    };
    if n <= keep {
        host.to_string()
    } else {
        labels[n - keep..].join(".")
    }
}

fn is_ip_literal(host: &str) -> bool {
    matches!(
        url::Host::parse(host),
        Ok(url::Host::Ipv4(_)) | Ok(url::Host::Ipv6(_))
    )
}

fn is_country_second_level(label: &str, tld: &str) -> bool {
    tld.len() == 2 && matches!(label, "co" | "com" | "net" | "org" | "gov" | "ac" | "edu")
}

fn belongs_to_site(host: &str, site: &str) -> bool {
    if is_ip_literal(site) {
        return host == site;
    }
    host == site || host.ends_with(&format!(".{}", site))
}

/// Serialize any report as pretty JSON
pub fn to_json<T: Serialize>(report: &T) -> Result<String> {
    serde_json::to_string_pretty(report).map_err(|e| ReqtraceError::Json {
        source: e,
        context: "Failed to serialize report".to_string(),
    })
}

fn join_categories(categories: &Classification) -> String {
    if categories.is_empty() {
        return "-".to_string();
    }
    categories
        .iter()
        .map(Category::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

impl fmt::Display for GraphReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Dependency graph for {}", self.seed)?;
        writeln!(
            f,
            "{} nodes, {} edges{}",
            self.nodes.len(),
            self.edges.len(),
            if self.truncated { " (truncated)" } else { "" }
        )?;

        for row in &self.edges {
            let indent = "    ".repeat(row.depth.saturating_sub(1));
            let entropy = row
                .entropy
                .map(|e| format!("{:.2}", e))
                .unwrap_or_else(|| "-".to_string());
            writeln!(
                f,
                "{}{} -> {} [{} via entry {}]{} categories: {} entropy: {}",
                indent,
                row.parent,
                row.child,
                row.relation,
                row.entry,
                row.field
                    .as_deref()
                    .map(|field| format!(" field: {}", field))
                    .unwrap_or_default(),
                join_categories(&row.categories),
                entropy
            )?;
            if let Some(request) = &row.request {
                writeln!(f, "{}    {}", indent, request)?;
            }
        }
        Ok(())
    }
}

impl fmt::Display for PatternReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Pattern Analysis")?;
        writeln!(f, "================")?;
        writeln!(f, "Total entries: {}", self.total_entries)?;
        writeln!(
            f,
            "Primary host: {}",
            self.primary_host.as_deref().unwrap_or("unknown")
        )?;
        writeln!(f, "API calls: {}", self.api_calls)?;
        writeln!(f, "JSON responses: {}", self.json_responses)?;
        let external = self.external_hosts();
        writeln!(
            f,
            "External services: {}",
            if external.is_empty() {
                "None".to_string()
            } else {
                external.join(", ")
            }
        )?;
        writeln!(f, "High-entropy values: {}", self.high_entropy_values)?;

        writeln!(f, "\nPattern matches:")?;
        for c in self.pattern_counts.iter().filter(|c| c.count > 0) {
            writeln!(f, "  {}: {} matches", c.category, c.count)?;
        }

        for (title, groups) in [("Same-host", &self.same_host), ("External", &self.external)] {
            writeln!(f, "\n{} endpoints:", title)?;
            for group in groups {
                writeln!(f, "  {} ({} requests)", group.host, group.endpoints.len())?;
                for e in group.endpoints.iter().take(5) {
                    writeln!(f, "    {} {} -> {}", e.method, e.path, e.status)?;
                }
                if group.endpoints.len() > 5 {
                    writeln!(f, "    ... and {} more", group.endpoints.len() - 5)?;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::Capture;
    use crate::patterns::{default_categories, Classifier};
    use crate::tracer::{TraceLimits, Tracer};
    use serde_json::json;
    use std::sync::Arc;

    fn tokenizer() -> Tokenizer {
        Tokenizer::new(Arc::new(Classifier::new(&default_categories()).unwrap())).unwrap()
    }

    fn builder() -> ReportBuilder {
        ReportBuilder::new(tokenizer(), EntropyScorer::default(), 3.0)
    }

    fn capture() -> Capture {
        let entries = json!([
            {
                "request": { "method": "GET", "url": "https://www.example.com/" },
                "response": { "status": 200, "content": { "text": "<html></html>" } }
            },
            {
                "request": { "method": "GET", "url": "https://api.example.com/api/match/1629454135" },
                "response": { "status": 200, "content": { "text": "{\"home\":1000001661,\"away\":1000000441}" } }
            },
            {
                "request": { "method": "GET", "url": "https://cdn.other.net/live/1000001661.m3u8" },
                "response": { "status": 404 }
            }
        ]);
        Capture::from_har_str(&json!({ "log": { "entries": entries } }).to_string()).unwrap()
    }

    #[test]
    fn test_site_of() {
        assert_eq!(site_of("www.example.com"), "example.com");
        assert_eq!(site_of("example.com"), "example.com");
        assert_eq!(site_of("localhost"), "localhost");
        assert!(belongs_to_site("api.example.com", "example.com"));
        assert!(!belongs_to_site("notexample.com", "example.com"));
    }

    #[test]
    fn test_site_of_country_suffix_and_ip() {
        let site = site_of("www.example.co.uk");
        assert_eq!(site, "example.co.uk");
        assert!(belongs_to_site("cdn.example.co.uk", &site));
        assert!(!belongs_to_site("other.co.uk", &site));

        let site = site_of("10.0.1.10");
        assert_eq!(site, "10.0.1.10");
        assert!(belongs_to_site("10.0.1.10", &site));
        assert!(!belongs_to_site("10.0.2.10", &site));
        assert!(!belongs_to_site("1.10", &site));

        assert_eq!(site_of("[::1]"), "[::1]");
    }

    #[test]
    fn test_pattern_report_counts_and_hosts() {
        let cap = capture();
        let host = cap.primary_host();
        let report = builder().pattern_report(cap.entries(), host.as_deref());

        assert_eq!(report.total_entries, 3);
        assert_eq!(report.primary_host.as_deref(), Some("www.example.com"));
        assert_eq!(report.api_calls, 1);

        // 1629454135 in the URL, two ids in the body, 1000001661 again in the CDN URL
        let match_ids = &report.pattern_counts[0];
        assert_eq!(match_ids.category.as_str(), "match_ids");
        assert_eq!(match_ids.count, 4);

        let same: Vec<&str> = report.same_host.iter().map(|g| g.host.as_str()).collect();
        assert_eq!(same, vec!["www.example.com", "api.example.com"]);
        assert_eq!(report.external_hosts(), vec!["cdn.other.net"]);
    }

    #[test]
    fn test_overlapping_matches_counted_per_category() {
        let cap = capture();
        let report = builder().pattern_report(cap.entries(), None);
        let count = |name: &str| {
            report
                .pattern_counts
                .iter()
                .find(|c| c.category.as_str() == name)
                .map(|c| c.count)
                .unwrap()
        };
        // Team ids also count as match ids and timestamps
        assert_eq!(count("team_ids"), 3);
        assert_eq!(count("timestamps"), 4);
        // Without a primary host every endpoint is external
        assert!(report.same_host.is_empty());
        assert_eq!(report.external.len(), 3);
    }

    #[test]
    fn test_graph_report_rows() {
        let cap = capture();
        let tracer = Tracer::new(tokenizer(), EntropyScorer::default(), 3.0);
        let graph = tracer
            .trace_graph(cap.entries(), "1629454135", &TraceLimits::new(1, 100))
            .unwrap();

        let report = builder().graph_report(&graph, cap.entries());
        assert_eq!(report.seed, "1629454135");
        assert_eq!(report.edges.len(), 2);
        assert_eq!(report.edges[0].child, "1000001661");
        assert_eq!(report.edges[0].entry, 1);
        assert_eq!(report.edges[0].depth, 1);
        assert!(report.edges[0]
            .categories
            .contains(&Category::new("team_ids")));
        assert_eq!(
            report.edges[0].request.as_deref(),
            Some("GET https://api.example.com/api/match/1629454135 HTTP/?")
        );

        let text = report.to_string();
        assert!(text.contains("1629454135 -> 1000001661 [produces via entry 1] field: home"));
        assert_eq!(report.edges[1].field.as_deref(), Some("away"));

        let json = to_json(&report).unwrap();
        assert!(json.contains("\"relation\": \"produces\""));
    }
}
