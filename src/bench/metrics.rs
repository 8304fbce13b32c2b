//! Reduction of raw query results into per-query statistics.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

use super::query::QueryResult;

/// Latency and throughput figures, present only when a query had successes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LatencyStats {
    pub avg_latency: f64,
    pub min_latency: f64,
    pub max_latency: f64,
    pub p95_latency: f64,
    pub p99_latency: f64,
    pub requests_per_second: f64,
}

/// Statistics for one query name
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryStatistics {
    pub total_requests: u64,
    pub successful_requests: u64,
    /// Percentage of failed requests (0-100)
    pub error_rate: f64,
    #[serde(flatten)]
    pub latency: Option<LatencyStats>,
}

/// Percentage of failed requests, 0 when nothing ran
pub fn error_rate(total: u64, successful: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    (total - successful) as f64 / total as f64 * 100.0
}

/// Value at sorted index `floor(p * n)`.
///
/// Nearest-rank by truncation without interpolation: with five samples both
/// p95 and p99 land on the maximum. Reports produced by earlier versions of
/// this harness use the same formula, so it is kept as is.
pub fn percentile(sorted: &[f64], p: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let index = (sorted.len() as f64 * p) as usize;
    sorted.get(index.min(sorted.len() - 1)).copied()
}

fn latency_stats(mut latencies: Vec<f64>, test_duration: Duration) -> Option<LatencyStats> {
    if latencies.is_empty() {
        return None;
    }

    // Sorting first makes the sum independent of arrival order.
    latencies.sort_by(f64::total_cmp);
    let n = latencies.len();
    let sum: f64 = latencies.iter().sum();

    Some(LatencyStats {
        avg_latency: sum / n as f64,
        min_latency: latencies[0],
        max_latency: latencies[n - 1],
        p95_latency: percentile(&latencies, 0.95)?,
        p99_latency: percentile(&latencies, 0.99)?,
        requests_per_second: n as f64 / test_duration.as_secs_f64(),
    })
}

/// Reduce a run's results into statistics keyed by query name.
///
/// Every query name present in `results` gets an entry; names with no
/// successful request carry counts and error rate only.
pub fn compute_statistics(
    results: &[QueryResult],
    test_duration: Duration,
) -> BTreeMap<String, QueryStatistics> {
    let mut grouped: BTreeMap<&str, (u64, Vec<f64>)> = BTreeMap::new();

    for result in results {
        let entry = grouped.entry(result.query()).or_default();
        entry.0 += 1;
        if let Some(latency) = result.latency() {
            entry.1.push(latency);
        }
    }

    grouped
        .into_iter()
        .map(|(name, (total, latencies))| {
            let successful = latencies.len() as u64;
            let stats = QueryStatistics {
                total_requests: total,
                successful_requests: successful,
                error_rate: error_rate(total, successful),
                latency: latency_stats(latencies, test_duration),
            };
            (name.to_string(), stats)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn successes(name: &str, latencies: &[f64]) -> Vec<QueryResult> {
        latencies
            .iter()
            .map(|&l| QueryResult::success(name, l, Some(1)))
            .collect()
    }

    #[test]
    fn test_percentile_truncation() {
        let sorted = [10.0, 20.0, 30.0, 40.0, 50.0];
        assert_eq!(percentile(&sorted, 0.95), Some(50.0));
        assert_eq!(percentile(&sorted, 0.99), Some(50.0));
        assert_eq!(percentile(&sorted, 0.5), Some(30.0));
        assert_eq!(percentile(&[], 0.95), None);
    }

    #[test]
    fn test_percentile_large_sample() {
        let sorted: Vec<f64> = (1..=100).map(f64::from).collect();
        // floor(0.95 * 100) = 95 -> 96th value
        assert_eq!(percentile(&sorted, 0.95), Some(96.0));
        assert_eq!(percentile(&sorted, 0.99), Some(100.0));
    }

    #[test]
    fn test_compute_statistics_basic() {
        let results = successes("q", &[30.0, 10.0, 50.0, 20.0, 40.0]);
        let stats = compute_statistics(&results, Duration::from_secs(2));

        let q = &stats["q"];
        assert_eq!(q.total_requests, 5);
        assert_eq!(q.successful_requests, 5);
        assert_eq!(q.error_rate, 0.0);

        let latency = q.latency.as_ref().unwrap();
        assert_eq!(latency.avg_latency, 30.0);
        assert_eq!(latency.min_latency, 10.0);
        assert_eq!(latency.max_latency, 50.0);
        assert_eq!(latency.p95_latency, 50.0);
        assert_eq!(latency.p99_latency, 50.0);
        assert_eq!(latency.requests_per_second, 2.5);
    }

    #[test]
    fn test_all_failed_query_has_no_latency() {
        let mut results = successes("ok", &[5.0, 6.0]);
        results.push(QueryResult::failure("broken", "500"));
        results.push(QueryResult::failure("broken", "500"));

        let stats = compute_statistics(&results, Duration::from_secs(1));

        let broken = &stats["broken"];
        assert_eq!(broken.total_requests, 2);
        assert_eq!(broken.successful_requests, 0);
        assert_eq!(broken.error_rate, 100.0);
        assert!(broken.latency.is_none());

        let json = serde_json::to_value(broken).unwrap();
        assert!(json.get("avg_latency").is_none());
        assert!(json.get("requests_per_second").is_none());
        assert_eq!(json["error_rate"], 100.0);

        assert!(stats["ok"].latency.is_some());
        assert_eq!(stats["ok"].error_rate, 0.0);
    }

    #[test]
    fn test_mixed_error_rate() {
        let mut results = successes("q", &[1.0, 2.0, 3.0]);
        results.push(QueryResult::failure("q", "timeout"));

        let stats = compute_statistics(&results, Duration::from_secs(4));
        let q = &stats["q"];
        assert_eq!(q.error_rate, 25.0);
        assert_eq!(q.latency.as_ref().unwrap().requests_per_second, 0.75);
    }

    #[test]
    fn test_error_rate_zero_total() {
        assert_eq!(error_rate(0, 0), 0.0);
    }

    #[test]
    fn test_statistics_serialization_flattened() {
        let stats = compute_statistics(&successes("q", &[10.0]), Duration::from_secs(1));
        let json = serde_json::to_value(&stats["q"]).unwrap();
        assert_eq!(json["total_requests"], 1);
        assert_eq!(json["p99_latency"], 10.0);

        let back: QueryStatistics = serde_json::from_value(json).unwrap();
        assert_eq!(back, stats["q"]);
    }

    #[test]
    fn test_reduce_is_idempotent() {
        let mut results = successes("a", &[3.3, 1.1, 2.2]);
        results.extend(successes("b", &[0.1, 0.2]));
        results.push(QueryResult::failure("b", "x"));

        let first = serde_json::to_string(&compute_statistics(&results, Duration::from_secs(3)))
            .unwrap();
        let second = serde_json::to_string(&compute_statistics(&results, Duration::from_secs(3)))
            .unwrap();
        assert_eq!(first, second);
    }

    fn result_strategy() -> impl Strategy<Value = QueryResult> {
        let name = prop::sample::select(vec!["alpha", "beta", "gamma"]);
        (name, prop::option::of(0.0f64..5000.0)).prop_map(|(name, latency)| match latency {
            Some(l) => QueryResult::success(name, l, None),
            None => QueryResult::failure(name, "injected"),
        })
    }

    proptest! {
        #[test]
        fn prop_counts_consistent(results in prop::collection::vec(result_strategy(), 0..200)) {
            let stats = compute_statistics(&results, Duration::from_secs(10));

            for (name, s) in &stats {
                let total = results.iter().filter(|r| r.query() == name.as_str()).count() as u64;
                let ok = results.iter().filter(|r| r.query() == name.as_str() && r.is_success()).count() as u64;
                prop_assert_eq!(s.total_requests, total);
                prop_assert_eq!(s.successful_requests, ok);
                prop_assert!(s.successful_requests <= s.total_requests);
                prop_assert!((0.0..=100.0).contains(&s.error_rate));
                prop_assert_eq!(s.error_rate == 0.0, ok == total);
                prop_assert_eq!(s.latency.is_none(), ok == 0);
            }
        }

        #[test]
        fn prop_order_independent(
            results in prop::collection::vec(result_strategy(), 1..100),
            seed in any::<u64>(),
        ) {
            let mut shuffled = results.clone();
            // Deterministic rotation plus reversal stands in for a shuffle.
            let len = shuffled.len();
            shuffled.rotate_left((seed as usize) % len);
            shuffled.reverse();

            let duration = Duration::from_secs(5);
            prop_assert_eq!(
                compute_statistics(&results, duration),
                compute_statistics(&shuffled, duration)
            );
        }
    }
}
