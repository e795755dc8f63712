use reqtrace::capture::Capture;
use reqtrace::cli::{Cli, Commands, ConfigAction, TraceMode};
use reqtrace::config::{Config, ConfigValidator};
use reqtrace::error::{ReqtraceError, Result};
use reqtrace::report;
use std::path::{Path, PathBuf};

fn main() -> Result<()> {
    let cli = Cli::parse_args();

    init_logging(cli.verbose);

    match cli.command {
        Commands::Trace {
            har,
            value,
            mode,
            max_depth,
            max_nodes,
            json,
        } => {
            cmd_trace(cli.config, &har, &value, mode, max_depth, max_nodes, json)?;
        }
        Commands::Discover { har, limit, json } => {
            cmd_discover(cli.config, &har, limit, json)?;
        }
        Commands::Analyze { har, json } => {
            cmd_analyze(cli.config, &har, json)?;
        }
        Commands::Config { action } => {
            cmd_config(cli.config, action)?;
        }
    }

    Ok(())
}

fn init_logging(verbose: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default = if verbose { "reqtrace=debug" } else { "reqtrace=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(config_path: Option<PathBuf>) -> Result<Config> {
    Config::load_or_default(config_path.as_deref())
}

fn load_capture(path: &Path) -> Result<Capture> {
    let raw = std::fs::read_to_string(path).map_err(|e| ReqtraceError::Io {
        source: e,
        context: format!("Failed to read HAR file: {:?}", path),
    })?;
    let capture = Capture::from_har_str(&raw)?;
    tracing::info!("Loaded {} HAR entries from {:?}", capture.len(), path);
    Ok(capture)
}

fn cmd_trace(
    config_path: Option<PathBuf>,
    har: &Path,
    value: &str,
    mode: TraceMode,
    max_depth: Option<usize>,
    max_nodes: Option<usize>,
    json: bool,
) -> Result<()> {
    let mut config = load_config(config_path)?;
    if let Some(depth) = max_depth {
        config.tracer.max_depth = depth;
    }
    if let Some(nodes) = max_nodes {
        config.tracer.max_nodes = nodes;
    }
    ConfigValidator::validate(&config)?;

    let capture = load_capture(har)?;
    let classifier = config.classifier()?;
    let tracer = config.build_tracer(classifier.clone())?;

    match mode {
        TraceMode::First => {
            let origin = tracer.trace_origin(capture.entries(), value)?;
            if json {
                println!(
                    "{}",
                    report::to_json(&serde_json::json!({
                        "seed": value,
                        "entry": origin.index,
                        "location": origin.locate(value),
                        "request": origin.top_line(),
                        "status": origin.status,
                    }))?
                );
            } else {
                println!("→ Found in entry {}: {}", origin.index, origin.top_line());
                if let Some(location) = origin.locate(value) {
                    println!("  location: {}", location);
                }
            }
        }
        TraceMode::Full => {
            let graph = tracer.trace_graph(capture.entries(), value, &config.trace_limits())?;
            let reporter = config.build_reporter(classifier)?;
            let graph_report = reporter.graph_report(&graph, capture.entries());
            if json {
                println!("{}", report::to_json(&graph_report)?);
            } else {
                print!("{}", graph_report);
            }
        }
    }

    Ok(())
}

fn cmd_discover(
    config_path: Option<PathBuf>,
    har: &Path,
    limit: Option<usize>,
    json: bool,
) -> Result<()> {
    let config = load_config(config_path)?;
    let capture = load_capture(har)?;
    let discoverer = config.build_discoverer(config.classifier()?)?;

    let seeds = discoverer.discover(capture.entries(), limit.unwrap_or(config.seeds.limit));

    if json {
        println!("{}", report::to_json(&seeds)?);
        return Ok(());
    }

    if seeds.is_empty() {
        println!("No suitable seed values found");
        return Ok(());
    }

    println!("Discovered {} seed values", seeds.len());
    for seed in &seeds {
        let categories: Vec<&str> = seed.categories.iter().map(|c| c.as_str()).collect();
        let entropy = seed
            .entropy
            .map(|e| format!("{:.2}", e))
            .unwrap_or_else(|| "-".to_string());
        println!(
            "  {:>3}. {} (entropy: {}, categories: {}, entry {} {})",
            seed.rank,
            seed.value,
            entropy,
            if categories.is_empty() {
                "-".to_string()
            } else {
                categories.join(", ")
            },
            seed.entry,
            seed.location
        );
    }
    println!("\nRun `reqtrace trace --value <seed>` to trace a value");

    Ok(())
}

fn cmd_analyze(config_path: Option<PathBuf>, har: &Path, json: bool) -> Result<()> {
    let config = load_config(config_path)?;
    let capture = load_capture(har)?;
    let reporter = config.build_reporter(config.classifier()?)?;

    let primary = capture.primary_host();
    let pattern_report = reporter.pattern_report(capture.entries(), primary.as_deref());

    if json {
        println!("{}", report::to_json(&pattern_report)?);
    } else {
        print!("{}", pattern_report);
    }

    Ok(())
}

fn cmd_config(config_path: Option<PathBuf>, action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Init { force } => {
            let path = match config_path {
                Some(p) => p,
                None => Config::default_path()?,
            };
            if path.exists() && !force {
                println!("Config already exists at {:?} (use --force to overwrite)", path);
                return Ok(());
            }
            Config::default().save(&path)?;
            println!("✓ Wrote default configuration to {:?}", path);
        }
        ConfigAction::Show => {
            let config = load_config(config_path)?;
            print!("{}", toml::to_string_pretty(&config)?);
        }
        ConfigAction::Validate => {
            let config = load_config(config_path)?;
            let classifier = config.classifier()?;
            println!(
                "✓ Configuration valid ({} categories compiled)",
                classifier.len()
            );
        }
    }

    Ok(())
}
