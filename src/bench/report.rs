//! Report generation for benchmark results.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use super::metrics::{LatencyStats, QueryStatistics};
use super::query::QueryResult;
use crate::error::Result;

/// File name of the combined results written by every invocation
pub const COMBINED_RESULTS_FILE: &str = "combined_benchmark_results.json";

/// Default file name of the rendered Markdown report
pub const MARKDOWN_REPORT_FILE: &str = "benchmark_report.md";

const BETTER: &str = "🟢";
const WORSE: &str = "🔴";
const NEUTRAL: &str = "⚪";

/// One benchmark run against one cluster
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkRun {
    pub timestamp: DateTime<Utc>,
    pub cluster: String,
    /// Configured duration in seconds
    pub test_duration: f64,
    pub num_clients: usize,
    pub index_name: String,
    pub endpoint: String,
    pub stats: BTreeMap<String, QueryStatistics>,
    pub raw_results: Vec<QueryResult>,
}

impl BenchmarkRun {
    pub fn total_requests(&self) -> u64 {
        self.stats.values().map(|s| s.total_requests).sum()
    }

    pub fn successful_requests(&self) -> u64 {
        self.stats.values().map(|s| s.successful_requests).sum()
    }

    /// Mean of the per-query error rates
    pub fn overall_error_rate(&self) -> f64 {
        if self.stats.is_empty() {
            return 0.0;
        }
        self.stats.values().map(|s| s.error_rate).sum::<f64>() / self.stats.len() as f64
    }

    /// Sum of the per-query throughputs
    pub fn requests_per_second(&self) -> f64 {
        self.stats
            .values()
            .filter_map(|s| s.latency.as_ref())
            .map(|l| l.requests_per_second)
            .sum()
    }

    /// Lowercase file-name-safe form of the cluster label
    fn slug(&self) -> String {
        self.cluster
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '_' })
            .collect()
    }
}

/// All runs of one invocation, in execution order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkResults {
    pub timestamp: DateTime<Utc>,
    pub test_duration: f64,
    pub num_clients: usize,
    pub index_name: String,
    pub runs: Vec<BenchmarkRun>,
}

impl BenchmarkResults {
    pub fn new(runs: Vec<BenchmarkRun>) -> Self {
        let first = runs.first();
        Self {
            timestamp: Utc::now(),
            test_duration: first.map(|r| r.test_duration).unwrap_or_default(),
            num_clients: first.map(|r| r.num_clients).unwrap_or_default(),
            index_name: first.map(|r| r.index_name.clone()).unwrap_or_default(),
            runs,
        }
    }

    /// Export the results as JSON
    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_default()
    }

    /// Read a combined results file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Write the combined file plus one file per run into `dir`.
    ///
    /// Returns the path of the combined file.
    pub fn save(&self, dir: &Path) -> Result<PathBuf> {
        std::fs::create_dir_all(dir)?;

        for run in &self.runs {
            let path = dir.join(format!("{}_benchmark_results.json", run.slug()));
            std::fs::write(&path, serde_json::to_string_pretty(run)?)?;
            tracing::debug!(path = %path.display(), "Wrote run results");
        }

        let combined = dir.join(COMBINED_RESULTS_FILE);
        std::fs::write(&combined, self.to_json())?;
        Ok(combined)
    }

    /// Print a per-query summary of every run
    pub fn print_table(&self) {
        println!();
        println!("╔══════════════════════════════════════════════════════════════════════════════════════════════════════╗");
        println!("║                                  SEARCH BENCHMARK RESULTS                                            ║");
        println!("╚══════════════════════════════════════════════════════════════════════════════════════════════════════╝");

        for run in &self.runs {
            println!();
            println!(
                "{} ({}) index={} clients={} duration={}s",
                run.cluster, run.endpoint, run.index_name, run.num_clients, run.test_duration
            );
            println!("┌──────────────────────────┬──────────┬──────────┬──────────┬──────────┬──────────┬──────────┬──────────┬─────────┐");
            println!("│ Query                    │ Requests │ avg(ms)  │ min(ms)  │ max(ms)  │ p95(ms)  │ p99(ms)  │   RPS    │ Errors% │");
            println!("├──────────────────────────┼──────────┼──────────┼──────────┼──────────┼──────────┼──────────┼──────────┼─────────┤");

            for (name, stats) in &run.stats {
                println!("{}", table_row(name, stats));
            }

            println!("└──────────────────────────┴──────────┴──────────┴──────────┴──────────┴──────────┴──────────┴──────────┴─────────┘");
            println!(
                "Total: {} requests, {} successful, {:.1} req/s",
                run.total_requests(),
                run.successful_requests(),
                run.requests_per_second()
            );
        }
        println!();
    }
}

/// One console table line; latency columns show `-` when nothing succeeded
fn table_row(name: &str, stats: &QueryStatistics) -> String {
    match &stats.latency {
        Some(l) => format!(
            "│ {:<24} │ {:>8} │ {:>8.1} │ {:>8.1} │ {:>8.1} │ {:>8.1} │ {:>8.1} │ {:>8.1} │ {:>6.1}% │",
            name,
            stats.total_requests,
            l.avg_latency,
            l.min_latency,
            l.max_latency,
            l.p95_latency,
            l.p99_latency,
            l.requests_per_second,
            stats.error_rate
        ),
        None => format!(
            "│ {:<24} │ {:>8} │ {:>8} │ {:>8} │ {:>8} │ {:>8} │ {:>8} │ {:>8} │ {:>6.1}% │",
            name, stats.total_requests, "-", "-", "-", "-", "-", "-", stats.error_rate
        ),
    }
}

/// Status marker comparing `value` against the baseline run
fn status(baseline: Option<f64>, value: f64, lower_is_better: bool) -> &'static str {
    let Some(baseline) = baseline else {
        return NEUTRAL;
    };
    if value == baseline {
        return NEUTRAL;
    }
    if (value < baseline) == lower_is_better {
        BETTER
    } else {
        WORSE
    }
}

struct Row {
    metric: String,
    cluster: String,
    value: String,
    unit: &'static str,
    status: &'static str,
}

type LatencyField = (&'static str, fn(&LatencyStats) -> f64, &'static str, bool);

fn query_rows(results: &BenchmarkResults) -> Vec<Row> {
    let latency_fields: [LatencyField; 6] = [
        ("Average Latency", |l| l.avg_latency, "ms", true),
        ("Minimum Latency", |l| l.min_latency, "ms", true),
        ("Maximum Latency", |l| l.max_latency, "ms", true),
        ("95th Percentile Latency", |l| l.p95_latency, "ms", true),
        ("99th Percentile Latency", |l| l.p99_latency, "ms", true),
        ("Requests per Second", |l| l.requests_per_second, "ops/sec", false),
    ];

    let mut rows = Vec::new();
    let baseline = results.runs.first();

    let names: BTreeSet<&str> = results
        .runs
        .iter()
        .flat_map(|r| r.stats.keys().map(String::as_str))
        .collect();

    for name in names {
        for (i, run) in results.runs.iter().enumerate() {
            let Some(stats) = run.stats.get(name) else {
                continue;
            };
            let base_stats = baseline
                .filter(|_| i > 0)
                .and_then(|b| b.stats.get(name));

            if let Some(latency) = &stats.latency {
                let base_latency = base_stats.and_then(|s| s.latency.as_ref());
                for (label, field, unit, lower_is_better) in latency_fields {
                    let value = field(latency);
                    rows.push(Row {
                        metric: format!("{} - {}", name, label),
                        cluster: run.cluster.clone(),
                        value: format!("{:.2}", value),
                        unit,
                        status: status(base_latency.map(field), value, lower_is_better),
                    });
                }
            }

            rows.push(Row {
                metric: format!("{} - Error Rate", name),
                cluster: run.cluster.clone(),
                value: format!("{:.2}", stats.error_rate),
                unit: "%",
                status: status(base_stats.map(|s| s.error_rate), stats.error_rate, true),
            });
        }
    }

    rows
}

fn summary_rows(results: &BenchmarkResults) -> Vec<Row> {
    let mut rows = Vec::new();
    let baseline = results.runs.first();

    for (i, run) in results.runs.iter().enumerate() {
        let base = baseline.filter(|_| i > 0);
        let error_rate = run.overall_error_rate();
        let rps = run.requests_per_second();

        rows.push(Row {
            metric: "Total Requests".to_string(),
            cluster: run.cluster.clone(),
            value: run.total_requests().to_string(),
            unit: "requests",
            status: NEUTRAL,
        });
        rows.push(Row {
            metric: "Successful Requests".to_string(),
            cluster: run.cluster.clone(),
            value: run.successful_requests().to_string(),
            unit: "requests",
            status: NEUTRAL,
        });
        rows.push(Row {
            metric: "Overall Error Rate".to_string(),
            cluster: run.cluster.clone(),
            value: format!("{:.2}", error_rate),
            unit: "%",
            status: status(base.map(BenchmarkRun::overall_error_rate), error_rate, true),
        });
        rows.push(Row {
            metric: "Aggregate Requests per Second".to_string(),
            cluster: run.cluster.clone(),
            value: format!("{:.2}", rps),
            unit: "ops/sec",
            status: status(base.map(BenchmarkRun::requests_per_second), rps, false),
        });
    }

    let scope = if results.runs.len() > 1 { "All" } else { "Run" };
    rows.push(Row {
        metric: "Test Duration".to_string(),
        cluster: scope.to_string(),
        value: results.test_duration.to_string(),
        unit: "seconds",
        status: NEUTRAL,
    });
    rows.push(Row {
        metric: "Number of Clients".to_string(),
        cluster: scope.to_string(),
        value: results.num_clients.to_string(),
        unit: "clients",
        status: NEUTRAL,
    });

    rows
}

/// Render rows as a Markdown pipe table
fn pipe_table(rows: &[Row]) -> String {
    let headers = ["Metric", "Cluster", "Value", "Unit", "Status"];
    let cells: Vec<[&str; 5]> = rows
        .iter()
        .map(|r| [r.metric.as_str(), r.cluster.as_str(), r.value.as_str(), r.unit, r.status])
        .collect();

    let mut widths = headers.map(|h| h.chars().count());
    for row in &cells {
        for (w, cell) in widths.iter_mut().zip(row) {
            *w = (*w).max(cell.chars().count());
        }
    }

    let mut out = String::new();
    let line = |out: &mut String, cols: [&str; 5]| {
        out.push('|');
        for (i, col) in cols.iter().enumerate() {
            let pad = widths[i] - col.chars().count();
            // Numeric column is right-aligned.
            if i == 2 {
                let _ = write!(out, " {}{} |", " ".repeat(pad), col);
            } else {
                let _ = write!(out, " {}{} |", col, " ".repeat(pad));
            }
        }
        out.push('\n');
    };

    line(&mut out, headers);
    out.push('|');
    for (i, w) in widths.iter().enumerate() {
        if i == 2 {
            let _ = write!(out, "{}:|", "-".repeat(w + 1));
        } else {
            let _ = write!(out, ":{}|", "-".repeat(w + 1));
        }
    }
    out.push('\n');
    for row in cells {
        line(&mut out, row);
    }
    out
}

/// Render the Markdown comparison report for a results file
pub fn render_markdown(results: &BenchmarkResults, generated_at: DateTime<Utc>) -> String {
    let clusters: Vec<&str> = results.runs.iter().map(|r| r.cluster.as_str()).collect();
    let title = if clusters.is_empty() {
        "Search Performance Benchmark Report".to_string()
    } else {
        format!("{} Performance Benchmark Report", clusters.join(" vs "))
    };

    let query_names: BTreeSet<&str> = results
        .runs
        .iter()
        .flat_map(|r| r.stats.keys().map(String::as_str))
        .collect();

    let mut rows = query_rows(results);
    rows.extend(summary_rows(results));

    let mut out = String::new();
    let _ = writeln!(out, "# {}", title);
    let _ = writeln!(out, "Date: {}", generated_at.format("%Y-%m-%d %H:%M:%S"));
    let _ = writeln!(out);
    let _ = writeln!(out, "This report presents the results of search performance tests conducted on:");
    for cluster in &clusters {
        let _ = writeln!(out, "- {} cluster", cluster);
    }
    let _ = writeln!(out);
    let _ = writeln!(out, "## Test Configuration");
    let _ = writeln!(out, "- Index: {}", results.index_name);
    let _ = writeln!(out, "- Test duration: {} seconds per cluster", results.test_duration);
    let _ = writeln!(out, "- Search operations tested:");
    for name in &query_names {
        let _ = writeln!(out, "  - {}", name);
    }
    let _ = writeln!(out, "- Client concurrency: {} concurrent clients", results.num_clients);
    for run in &results.runs {
        let _ = writeln!(out, "- {} Endpoint: {}", run.cluster, run.endpoint);
    }
    let _ = writeln!(out);
    let _ = writeln!(out, "## Performance Metrics");
    let _ = writeln!(out);
    let _ = writeln!(out, "### Query Performance Metrics");
    out.push_str(&pipe_table(&rows));
    let _ = writeln!(out);
    let _ = writeln!(out, "### Legend");
    if let Some(baseline) = clusters.first() {
        let _ = writeln!(out, "- {} Better performance than {}", BETTER, baseline);
        let _ = writeln!(out, "- {} Worse performance than {}", WORSE, baseline);
    }
    let _ = writeln!(out, "- {} Neutral (baseline, no direct comparison or equal performance)", NEUTRAL);
    let _ = writeln!(out);
    let _ = writeln!(out, "## Conclusions and Recommendations");
    let _ = writeln!(out);
    let _ = writeln!(out, "*[Fill this section after analyzing the benchmark results]*");
    let _ = writeln!(out);
    let _ = writeln!(out, "- Performance analysis for each query type");
    let _ = writeln!(out, "- Cost considerations");
    let _ = writeln!(out, "- Scalability observations");
    let _ = writeln!(out, "- Recommended configuration changes or optimizations");
    let _ = writeln!(out);
    let _ = writeln!(out, "## Raw Results");
    let _ = writeln!(out, "The complete benchmark results are available in: {}", COMBINED_RESULTS_FILE);

    out
}
