// Integration tests for seed discovery and report building on a recorded capture
use reqtrace::capture::{Capture, Location};
use reqtrace::config::Config;
use reqtrace::report::{self, ReportBuilder};
use reqtrace::seeds::SeedDiscoverer;
use reqtrace::tracer::TraceLimits;

const MATCH_CAPTURE: &str = include_str!("fixtures/match_capture.har");

fn capture() -> Capture {
    Capture::from_har_str(MATCH_CAPTURE).expect("fixture parses")
}

fn discoverer() -> SeedDiscoverer {
    let config = Config::default();
    config
        .build_discoverer(config.classifier().unwrap())
        .unwrap()
}

fn reporter() -> ReportBuilder {
    let config = Config::default();
    config.build_reporter(config.classifier().unwrap()).unwrap()
}

#[test]
fn test_fixture_shape() {
    let capture = capture();
    assert_eq!(capture.len(), 6);
    assert_eq!(capture.primary_host().as_deref(), Some("www.yeahscore.test"));

    let decoded = capture.entries()[3].response_body.as_deref().unwrap();
    assert!(decoded.contains("\"home\":1000001661"));
    assert!(capture.entries()[4].response_body.is_none());
}

#[test]
fn test_discovery_ranks_classified_ids_first() {
    let seeds = discoverer().discover(capture().entries(), 20);

    let values: Vec<&str> = seeds.iter().map(|s| s.value.as_str()).collect();
    assert_eq!(
        &values[..4],
        &[
            "1629454135",
            "1000001661",
            "1000000441",
            "9f86d081884c7d65b2e1a3f0"
        ]
    );
    assert!(!values.contains(&"true"));
    assert!(!values.contains(&"Content-Type"));

    let first_unclassified = seeds
        .iter()
        .position(|s| s.categories.is_empty())
        .unwrap_or(seeds.len());
    assert!(seeds[first_unclassified..]
        .iter()
        .all(|s| s.categories.is_empty()));

    let ranks: Vec<usize> = seeds.iter().map(|s| s.rank).collect();
    assert_eq!(ranks, (1..=seeds.len()).collect::<Vec<_>>());
}

#[test]
fn test_discovery_records_first_occurrence() {
    let seeds = discoverer().discover(capture().entries(), 20);

    let match_id = seeds.iter().find(|s| s.value == "1629454135").unwrap();
    assert_eq!(match_id.entry, 1);
    assert_eq!(match_id.location, Location::ResponseBody);

    let team = seeds.iter().find(|s| s.value == "1000001661").unwrap();
    assert_eq!(team.entry, 3);
}

#[test]
fn test_discovery_keeps_whole_long_values() {
    let hex = "9f86d081884c7d65b2e1a3f0e4b7c2d1a8f3e6b90c1d2e3f";
    let raw = serde_json::json!({ "log": { "entries": [{
        "request": { "method": "GET", "url": "https://a.test/match/1629454135" },
        "response": { "status": 200, "content": { "text": format!("{{\"sig\":\"{}\"}}", hex) } }
    }] } });
    let capture = Capture::from_har_str(&raw.to_string()).unwrap();

    let seeds = discoverer().discover(capture.entries(), 10);
    let values: Vec<&str> = seeds.iter().map(|s| s.value.as_str()).collect();
    assert_eq!(values, vec!["1629454135", hex]);
}

#[test]
fn test_discovery_limit() {
    let seeds = discoverer().discover(capture().entries(), 2);
    assert_eq!(seeds.len(), 2);
    assert_eq!(seeds[1].rank, 2);

    assert!(discoverer().discover(capture().entries(), 0).is_empty());
}

#[test]
fn test_pattern_report_on_fixture() {
    let capture = capture();
    let primary = capture.primary_host();
    let report = reporter().pattern_report(capture.entries(), primary.as_deref());

    assert_eq!(report.total_entries, 6);
    assert_eq!(report.api_calls, 2);
    assert_eq!(report.json_responses, 2);
    assert_eq!(report.external_hosts(), vec!["livecdn.rumsport.test"]);
    assert_eq!(report.same_host.len(), 1);
    assert_eq!(report.same_host[0].host, "www.yeahscore.test");
    assert_eq!(report.same_host[0].endpoints.len(), 4);

    let count = |name: &str| {
        report
            .pattern_counts
            .iter()
            .find(|c| c.category.as_str() == name)
            .map(|c| c.count)
            .unwrap()
    };
    assert_eq!(count("match_ids"), 7);
    assert_eq!(count("team_ids"), 4);
    assert_eq!(count("timestamps"), 7);
    assert_eq!(count("device_ids"), 0);
}

#[test]
fn test_graph_report_rows() {
    let config = Config::default();
    let tracer = config.build_tracer(config.classifier().unwrap()).unwrap();
    let capture = capture();

    let graph = tracer
        .trace_graph(capture.entries(), "1629454135", &TraceLimits::new(2, 100))
        .unwrap();
    let rendered = reporter().graph_report(&graph, capture.entries());

    assert_eq!(rendered.seed, "1629454135");
    assert!(!rendered.truncated);

    let row = rendered
        .edges
        .iter()
        .find(|r| r.parent == "1629454135" && r.child == "1000000441")
        .unwrap();
    assert_eq!(row.entry, 3);
    assert_eq!(row.depth, 1);
    assert_eq!(
        row.request.as_deref(),
        Some("GET https://www.yeahscore.test/api/match/1629454135 HTTP/2")
    );

    let text = rendered.to_string();
    assert!(text.contains("1000001661"));

    let json = report::to_json(&rendered).unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(value["edges"][0]["relation"], "produces");
}
