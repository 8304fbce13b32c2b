use anyhow::{Context, Result};
use clap::Parser;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use search_bench::bench::{
    render_markdown, BenchmarkConfig, BenchmarkResults, BenchmarkRunner, MockClusterConfig,
    MockSearchCluster,
};
use search_bench::cluster::{ClusterClient, ClusterKind, SearchBackend};
use search_bench::config::{self, Cli, Command, Config, ReportArgs, RunArgs, StandaloneArgs};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env before parsing so env-backed arguments see it
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_tracing(&cli.log_level, &cli.log_format);

    match cli.command {
        Command::Run(args) => run(args).await,
        Command::Report(args) => report(args),
        Command::Standalone(args) => standalone(args).await,
    }
}

/// Initialize logging with the configured level and format
fn init_tracing(log_level: &str, log_format: &str) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level.to_lowercase()));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .with_writer(std::io::stderr);

    if log_format.eq_ignore_ascii_case("json") {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Benchmark every configured cluster and persist the results
async fn run(mut args: RunArgs) -> Result<()> {
    if config::needs_interactive_setup(&args) {
        let interactive_config = config::run_interactive_setup()?;
        args.apply_interactive(&interactive_config);
    }

    let config = Config::from_run_args(&args)?;
    config.validate()?;

    tracing::info!("🚀 Starting benchmarks...");
    for cluster in &config.clusters {
        tracing::info!("Using {} endpoint: {}", cluster.kind.label(), cluster.endpoint);
    }
    tracing::info!("Using index: {}", config.benchmark.index_name);

    let runner = BenchmarkRunner::new(config.benchmark.clone())?;
    let mut runs = Vec::with_capacity(config.clusters.len());

    for cluster in &config.clusters {
        let label = cluster.kind.label();
        tracing::info!("Running {} benchmark...", label);

        let client: Arc<dyn SearchBackend> = Arc::new(
            ClusterClient::new(cluster)
                .with_context(|| format!("Failed to create {} client", label))?,
        );

        let run = runner.run(label, client).await.with_context(|| {
            format!("{} benchmark aborted ({})", label, cluster.endpoint)
        })?;
        runs.push(run);
    }

    let results = BenchmarkResults::new(runs);
    let combined = results
        .save(&config.results_dir)
        .with_context(|| format!("Failed to save results to {}", config.results_dir.display()))?;
    tracing::info!("✅ Benchmark results saved to {}", combined.display());

    if config.write_report {
        let report_path = config
            .results_dir
            .join(search_bench::bench::report::MARKDOWN_REPORT_FILE);
        write_report(&results, &report_path)?;
    }

    if config.json_output {
        println!("{}", results.to_json());
    } else {
        results.print_table();
    }

    Ok(())
}

/// Render the Markdown report from a saved results file
fn report(args: ReportArgs) -> Result<()> {
    let input = config::expand_tilde(&args.input);
    let results = BenchmarkResults::load(&input)
        .with_context(|| format!("Failed to read results from {}", input.display()))?;

    write_report(&results, &config::expand_tilde(&args.output))
}

fn write_report(results: &BenchmarkResults, path: &Path) -> Result<()> {
    let markdown = render_markdown(results, chrono::Utc::now());
    std::fs::write(path, markdown)
        .with_context(|| format!("Failed to write report to {}", path.display()))?;
    tracing::info!("📄 Report written to {}", path.display());
    Ok(())
}

/// Start a mock cluster and benchmark it end to end
async fn standalone(args: StandaloneArgs) -> Result<()> {
    let mock_config = MockClusterConfig {
        port: 0,
        latency_ms: args.latency_ms,
        hit_count: args.hits,
        error_rate: args.error_rate,
        ..Default::default()
    };

    let mut mock_cluster = MockSearchCluster::new(mock_config.clone());
    mock_cluster.start().await?;
    println!("Mock search cluster started on {}", mock_cluster.url());

    let cluster = search_bench::cluster::ClusterConfig {
        kind: ClusterKind::Elasticsearch,
        endpoint: mock_cluster.url(),
        username: None,
        password: None,
        verify_tls: true,
        timeout_secs: 30,
    };
    let client: Arc<dyn SearchBackend> = Arc::new(ClusterClient::new(&cluster)?);

    let runner = BenchmarkRunner::new(BenchmarkConfig {
        index_name: mock_config.index_name,
        num_clients: args.clients,
        test_duration: Duration::from_secs(args.duration),
        ..Default::default()
    })?;

    let run = runner.run("Mock", client).await?;
    mock_cluster.stop();

    let results = BenchmarkResults::new(vec![run]);
    if args.json {
        println!("{}", results.to_json());
    } else {
        results.print_table();
    }

    Ok(())
}
