use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use dialoguer::{Confirm, Input, Password};
use std::io::{IsTerminal, Write};
use std::path::PathBuf;
use std::time::Duration;

use crate::bench::config::DEFAULT_INDEX;
use crate::bench::report::{COMBINED_RESULTS_FILE, MARKDOWN_REPORT_FILE};
use crate::bench::{BenchmarkConfig, QueryDefinition};
use crate::cluster::{ClusterConfig, ClusterKind};

/// Search Bench - Elasticsearch / OpenSearch query benchmark
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info", global = true)]
    pub log_level: String,

    /// Log format (pretty, json)
    #[arg(long, env = "LOG_FORMAT", default_value = "pretty", global = true)]
    pub log_format: String,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Benchmark the configured Elasticsearch and/or OpenSearch clusters
    Run(RunArgs),

    /// Render a Markdown report from a combined results file
    Report(ReportArgs),

    /// Start a mock cluster and benchmark it
    Standalone(StandaloneArgs),
}

#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// Elasticsearch endpoint
    #[arg(long, env = "ELASTICSEARCH_HOSTS")]
    pub es_hosts: Option<String>,

    /// Elasticsearch username
    #[arg(long, env = "ELASTICSEARCH_USER")]
    pub es_user: Option<String>,

    /// Elasticsearch password
    #[arg(long, env = "ELASTICSEARCH_PASSWORD", hide_env_values = true)]
    pub es_password: Option<String>,

    /// OpenSearch endpoint
    #[arg(long, env = "OPENSEARCH_HOSTS")]
    pub os_hosts: Option<String>,

    /// OpenSearch username
    #[arg(long, env = "OPENSEARCH_USER")]
    pub os_user: Option<String>,

    /// OpenSearch password
    #[arg(long, env = "OPENSEARCH_PASSWORD", hide_env_values = true)]
    pub os_password: Option<String>,

    /// Index to query
    #[arg(short, long, env = "INDEX_NAME", default_value = DEFAULT_INDEX)]
    pub index: String,

    /// Test duration per cluster in seconds
    #[arg(short, long, env = "TEST_DURATION", default_value = "20")]
    pub duration: u64,

    /// Number of concurrent clients
    #[arg(short, long, env = "NUM_CLIENTS", default_value = "10")]
    pub clients: usize,

    /// Directory the results files are written to
    #[arg(long, env = "RESULTS_DIR", default_value = ".")]
    pub results_dir: String,

    /// HTTP request timeout in seconds
    #[arg(long, env = "REQUEST_TIMEOUT", default_value = "60")]
    pub timeout: u64,

    /// Reject invalid TLS certificates
    #[arg(long, env = "VERIFY_CERTS")]
    pub verify_certs: bool,

    /// JSON file with custom query definitions
    #[arg(short, long, env = "QUERIES_FILE")]
    pub queries: Option<String>,

    /// Also render the Markdown report into the results directory
    #[arg(long)]
    pub report: bool,

    /// Print results as JSON instead of a table
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug, Clone)]
pub struct ReportArgs {
    /// Combined results file to read
    #[arg(short, long, default_value = COMBINED_RESULTS_FILE)]
    pub input: String,

    /// Markdown file to write
    #[arg(short, long, default_value = MARKDOWN_REPORT_FILE)]
    pub output: String,
}

#[derive(Args, Debug, Clone)]
pub struct StandaloneArgs {
    /// Test duration in seconds
    #[arg(short, long, default_value = "10")]
    pub duration: u64,

    /// Number of concurrent clients
    #[arg(short, long, default_value = "10")]
    pub clients: usize,

    /// Mock cluster latency per search in milliseconds
    #[arg(long, default_value = "5")]
    pub latency_ms: u64,

    /// Mock cluster error rate (0.0 to 1.0)
    #[arg(long, default_value = "0.0")]
    pub error_rate: f64,

    /// Hit count reported by the mock cluster
    #[arg(long, default_value = "1000")]
    pub hits: u64,

    /// Print results as JSON instead of a table
    #[arg(long)]
    pub json: bool,
}

/// Runtime configuration for the `run` command
#[derive(Clone, Debug)]
pub struct Config {
    /// Clusters to benchmark, in execution order
    pub clusters: Vec<ClusterConfig>,
    pub benchmark: BenchmarkConfig,
    pub results_dir: PathBuf,
    pub write_report: bool,
    pub json_output: bool,
}

impl Config {
    /// Build configuration from parsed `run` arguments
    pub fn from_run_args(args: &RunArgs) -> Result<Self> {
        let mut clusters = Vec::new();

        if let Some(hosts) = non_empty(&args.es_hosts) {
            clusters.push(ClusterConfig {
                kind: ClusterKind::Elasticsearch,
                endpoint: normalize_endpoint(hosts),
                username: non_empty(&args.es_user).map(str::to_string),
                password: non_empty(&args.es_password).map(str::to_string),
                verify_tls: args.verify_certs,
                timeout_secs: args.timeout,
            });
        }

        if let Some(hosts) = non_empty(&args.os_hosts) {
            clusters.push(ClusterConfig {
                kind: ClusterKind::OpenSearch,
                endpoint: normalize_endpoint(hosts),
                username: non_empty(&args.os_user).map(str::to_string),
                password: non_empty(&args.os_password).map(str::to_string),
                verify_tls: args.verify_certs,
                timeout_secs: args.timeout,
            });
        }

        let queries = match &args.queries {
            Some(path) => {
                let path = expand_tilde(path);
                QueryDefinition::load_set(&path)
                    .with_context(|| format!("Failed to load queries from {}", path.display()))?
            }
            None => QueryDefinition::default_set(),
        };

        let config = Config {
            clusters,
            benchmark: BenchmarkConfig {
                index_name: args.index.clone(),
                num_clients: args.clients,
                test_duration: Duration::from_secs(args.duration),
                queries,
            },
            results_dir: expand_tilde(&args.results_dir),
            write_report: args.report,
            json_output: args.json,
        };

        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.clusters.is_empty() {
            anyhow::bail!(
                "No cluster configured (set ELASTICSEARCH_HOSTS and/or OPENSEARCH_HOSTS, or use --es-hosts/--os-hosts)"
            );
        }

        self.benchmark
            .validate()
            .context("Invalid benchmark configuration")?;

        if let Some(cluster) = self.clusters.iter().find(|c| c.timeout_secs == 0) {
            anyhow::bail!(
                "{} request timeout must be at least 1 second (REQUEST_TIMEOUT)",
                cluster.kind.label()
            );
        }

        Ok(())
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

/// Default to HTTPS when the endpoint has no scheme
fn normalize_endpoint(endpoint: &str) -> String {
    let endpoint = endpoint.trim().trim_end_matches('/');
    if endpoint.contains("://") {
        endpoint.to_string()
    } else {
        format!("https://{}", endpoint)
    }
}

/// Expand tilde (~) in file paths to user's home directory
pub fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}


// === Interactive Setup ===

/// Check if interactive setup is needed (no .env file, no cluster endpoint, attached terminal)
pub fn needs_interactive_setup(args: &RunArgs) -> bool {
    let env_file_exists = std::path::Path::new(".env").exists();
    let has_cluster = non_empty(&args.es_hosts).is_some() || non_empty(&args.os_hosts).is_some();

    !env_file_exists && !has_cluster && std::io::stdin().is_terminal()
}

/// Configuration collected from interactive setup
#[derive(Debug, Clone)]
pub struct InteractiveConfig {
    pub es_hosts: Option<String>,
    pub es_user: Option<String>,
    pub es_password: Option<String>,
    pub os_hosts: Option<String>,
    pub os_user: Option<String>,
    pub os_password: Option<String>,
    pub index_name: String,
    pub test_duration: u64,
    pub num_clients: usize,
}

impl RunArgs {
    /// Overlay values collected by the interactive setup
    pub fn apply_interactive(&mut self, config: &InteractiveConfig) {
        self.es_hosts = config.es_hosts.clone();
        self.es_user = config.es_user.clone();
        self.es_password = config.es_password.clone();
        self.os_hosts = config.os_hosts.clone();
        self.os_user = config.os_user.clone();
        self.os_password = config.os_password.clone();
        self.index = config.index_name.clone();
        self.duration = config.test_duration;
        self.clients = config.num_clients;
    }
}

fn prompt_optional(prompt: &str) -> Result<Option<String>> {
    let value: String = Input::new()
        .with_prompt(prompt)
        .allow_empty(true)
        .interact_text()
        .with_context(|| format!("Failed to read {}", prompt))?;
    let value = value.trim().to_string();
    Ok((!value.is_empty()).then_some(value))
}

/// Prompt for optional basic auth; the password is only asked for with a username
fn prompt_credentials(label: &str, env_prefix: &str) -> Result<(Option<String>, Option<String>)> {
    let user = prompt_optional(&format!("{} username ({}_USER)", label, env_prefix))?;
    if user.is_none() {
        return Ok((None, None));
    }

    let password: String = Password::new()
        .with_prompt(format!("{} password ({}_PASSWORD)", label, env_prefix))
        .allow_empty_password(true)
        .interact()
        .with_context(|| format!("Failed to read {}_PASSWORD", env_prefix))?;

    Ok((user, Some(password)))
}

/// Run interactive setup to collect cluster endpoints and run parameters
pub fn run_interactive_setup() -> Result<InteractiveConfig> {
    println!();
    println!("╔═══════════════════════════════════════════════════════════╗");
    println!("║           🔧 Search Bench - First Time Setup              ║");
    println!("╚═══════════════════════════════════════════════════════════╝");
    println!();
    println!("No cluster configured. Let's set up the benchmark.");
    println!("Leave an endpoint empty to skip that cluster.");
    println!();

    let es_hosts = prompt_optional("Elasticsearch endpoint (ELASTICSEARCH_HOSTS)")?;
    let (es_user, es_password) = if es_hosts.is_some() {
        prompt_credentials("Elasticsearch", "ELASTICSEARCH")?
    } else {
        (None, None)
    };

    println!();
    let os_hosts = prompt_optional("OpenSearch endpoint (OPENSEARCH_HOSTS)")?;
    let (os_user, os_password) = if os_hosts.is_some() {
        prompt_credentials("OpenSearch", "OPENSEARCH")?
    } else {
        (None, None)
    };

    if es_hosts.is_none() && os_hosts.is_none() {
        anyhow::bail!("At least one cluster endpoint is required");
    }

    println!();
    let index_name: String = Input::new()
        .with_prompt("Index name")
        .default(DEFAULT_INDEX.to_string())
        .interact_text()
        .context("Failed to read index name")?;

    let test_duration: u64 = Input::new()
        .with_prompt("Test duration in seconds")
        .default(20)
        .interact_text()
        .context("Failed to read test duration")?;

    let num_clients: usize = Input::new()
        .with_prompt("Concurrent clients")
        .default(10)
        .interact_text()
        .context("Failed to read client count")?;

    let config = InteractiveConfig {
        es_hosts,
        es_user,
        es_password,
        os_hosts,
        os_user,
        os_password,
        index_name,
        test_duration,
        num_clients,
    };

    println!();
    let save_to_env = Confirm::new()
        .with_prompt("Save configuration to .env file?")
        .default(true)
        .interact()
        .context("Failed to read save confirmation")?;

    if save_to_env {
        save_env_file(&config)?;
        println!();
        println!("✅ Configuration saved to .env file");
    }

    println!();
    println!("✅ Setup complete! Starting benchmark...");
    println!();

    Ok(config)
}

/// Quote a value for `.env` so dotenvy reads it back verbatim.
///
/// Single quotes disable `$` expansion and `#` comments. Embedded quotes and
/// backslashes are emitted as escapes outside the quoted runs.
fn quote_env_value(value: &str) -> String {
    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('\'');
    for c in value.chars() {
        match c {
            '\'' => quoted.push_str(r"'\''"),
            '\\' => quoted.push_str(r"'\\'"),
            _ => quoted.push(c),
        }
    }
    quoted.push('\'');
    quoted
}

fn render_env_file(config: &InteractiveConfig) -> String {
    let optional = |value: &Option<String>| quote_env_value(value.as_deref().unwrap_or_default());

    format!(
        r#"# Search Bench Configuration
# Generated by interactive setup

# Elasticsearch cluster (leave empty to skip)
ELASTICSEARCH_HOSTS={}
ELASTICSEARCH_USER={}
ELASTICSEARCH_PASSWORD={}

# OpenSearch cluster (leave empty to skip)
OPENSEARCH_HOSTS={}
OPENSEARCH_USER={}
OPENSEARCH_PASSWORD={}

# Benchmark parameters
INDEX_NAME={}
TEST_DURATION={}
NUM_CLIENTS={}

# Logging (trace, debug, info, warn, error)
LOG_LEVEL=info
"#,
        optional(&config.es_hosts),
        optional(&config.es_user),
        optional(&config.es_password),
        optional(&config.os_hosts),
        optional(&config.os_user),
        optional(&config.os_password),
        quote_env_value(&config.index_name),
        config.test_duration,
        config.num_clients,
    )
}

/// Save configuration to .env file
fn save_env_file(config: &InteractiveConfig) -> Result<()> {
    let env_content = render_env_file(config);

    let mut file = std::fs::File::create(".env").context("Failed to create .env file")?;
    file.write_all(env_content.as_bytes())
        .context("Failed to write .env file")?;

    Ok(())
}
