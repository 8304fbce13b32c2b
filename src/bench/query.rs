//! Query definitions and the single-query runner.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::HashSet;
use std::path::Path;
use tokio::time::Instant;

use crate::cluster::SearchBackend;
use crate::error::{BenchError, Result};

/// Body of a search request.
///
/// Keys other than `query`, `aggs` and `size` (`sort`, `from`, `_source`, ...)
/// are kept in `extra` and sent unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchBody {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<Value>,
    #[serde(default, alias = "aggregations", skip_serializing_if = "Option::is_none")]
    pub aggs: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u32>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl SearchBody {
    pub fn query(query: Value) -> Self {
        Self {
            query: Some(query),
            aggs: None,
            size: None,
            extra: Map::new(),
        }
    }

    /// Aggregation-only request (`size: 0`, no hits returned)
    pub fn aggregation(aggs: Value) -> Self {
        Self {
            query: None,
            aggs: Some(aggs),
            size: Some(0),
            extra: Map::new(),
        }
    }

    /// Add a top-level body key such as `sort` or `from`
    pub fn with(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }

    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// A named, fixed search request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryDefinition {
    pub name: String,
    pub body: SearchBody,
}

impl QueryDefinition {
    pub fn new(name: impl Into<String>, body: SearchBody) -> Self {
        Self {
            name: name.into(),
            body,
        }
    }

    /// The built-in query set run against the sample companies index
    pub fn default_set() -> Vec<QueryDefinition> {
        vec![
            QueryDefinition::new(
                "company-name-search",
                SearchBody::query(json!({
                    "match": {"company_name": "consulting"}
                })),
            ),
            QueryDefinition::new(
                "country-filter-search",
                SearchBody::query(json!({
                    "bool": {
                        "must": [{"match_all": {}}],
                        "filter": [{"term": {"country": "United States"}}]
                    }
                })),
            ),
            QueryDefinition::new(
                "industry-search",
                SearchBody::query(json!({
                    "term": {"rics_100": "Management Consulting Services"}
                })),
            ),
            QueryDefinition::new(
                "complex-search",
                SearchBody::query(json!({
                    "bool": {
                        "must": [{"match": {"company_name": "consulting"}}],
                        "filter": [
                            {"term": {"country": "United States"}},
                            {"range": {"employee_count": {"gte": 2}}}
                        ]
                    }
                })),
            ),
            QueryDefinition::new(
                "industry-aggregation",
                SearchBody::aggregation(json!({
                    "industries": {
                        "terms": {"field": "rics_100", "size": 20},
                        "aggs": {
                            "avg_employees": {"avg": {"field": "employee_count"}},
                            "countries": {"terms": {"field": "country", "size": 10}}
                        }
                    }
                })),
            ),
        ]
    }

    /// Parse a query set from a JSON array of `{name, body}` objects
    pub fn parse_set(json: &str) -> Result<Vec<QueryDefinition>> {
        let queries: Vec<QueryDefinition> = serde_json::from_str(json)?;
        validate_set(&queries)?;
        Ok(queries)
    }

    /// Load a query set from a JSON file
    pub fn load_set(path: &Path) -> Result<Vec<QueryDefinition>> {
        let content = std::fs::read_to_string(path)?;
        Self::parse_set(&content)
    }
}

/// Check that a query set is non-empty, its names are unique and every body
/// carries a `query` or `aggs` clause
pub fn validate_set(queries: &[QueryDefinition]) -> Result<()> {
    if queries.is_empty() {
        return Err(BenchError::Config("query set is empty".to_string()));
    }

    let mut seen = HashSet::new();
    for query in queries {
        if query.name.trim().is_empty() {
            return Err(BenchError::Config("query name is empty".to_string()));
        }
        if !seen.insert(query.name.as_str()) {
            return Err(BenchError::Config(format!(
                "duplicate query name: {}",
                query.name
            )));
        }
        if query.body.query.is_none() && query.body.aggs.is_none() {
            let keys: Vec<&str> = query.body.extra.keys().map(String::as_str).collect();
            return Err(BenchError::Config(format!(
                "query {} has no query or aggs clause (keys: [{}])",
                query.name,
                keys.join(", ")
            )));
        }
    }

    Ok(())
}

/// Outcome of one executed query.
///
/// Built through [`QueryResult::success`] and [`QueryResult::failure`], or
/// deserialized with the same checks, so a result carries a latency exactly
/// when it succeeded and an error exactly when it failed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawQueryResult")]
pub struct QueryResult {
    query: String,
    success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    latency: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    hits: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl QueryResult {
    /// Successful result; negative or non-finite latencies are clamped to zero
    pub fn success(query: impl Into<String>, latency_ms: f64, hits: Option<u64>) -> Self {
        let latency = if latency_ms.is_finite() {
            latency_ms.max(0.0)
        } else {
            0.0
        };

        Self {
            query: query.into(),
            success: true,
            latency: Some(latency),
            hits,
            error: None,
        }
    }

    pub fn failure(query: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            success: false,
            latency: None,
            hits: None,
            error: Some(error.into()),
        }
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn is_success(&self) -> bool {
        self.success
    }

    /// Latency in milliseconds
    pub fn latency(&self) -> Option<f64> {
        self.latency
    }

    pub fn hits(&self) -> Option<u64> {
        self.hits
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }
}

/// Unchecked wire form of [`QueryResult`]
#[derive(Deserialize)]
struct RawQueryResult {
    query: String,
    success: bool,
    #[serde(default)]
    latency: Option<f64>,
    #[serde(default)]
    hits: Option<u64>,
    #[serde(default)]
    error: Option<String>,
}

impl TryFrom<RawQueryResult> for QueryResult {
    type Error = String;

    fn try_from(raw: RawQueryResult) -> std::result::Result<Self, Self::Error> {
        match (raw.success, raw.latency, raw.error) {
            (true, Some(latency), None) if latency >= 0.0 => {
                Ok(QueryResult::success(raw.query, latency, raw.hits))
            }
            (false, None, Some(error)) if raw.hits.is_none() => {
                Ok(QueryResult::failure(raw.query, error))
            }
            (success, latency, error) => Err(format!(
                "inconsistent result for query {}: success={}, latency={:?}, error={:?}",
                raw.query, success, latency, error
            )),
        }
    }
}

/// Extract the total hit count from a search response.
///
/// Clusters return either `{"total": {"value": N}}` or a bare `{"total": N}`.
pub fn extract_hit_count(response: &Value) -> Option<u64> {
    let total = response.get("hits")?.get("total")?;
    total
        .get("value")
        .and_then(Value::as_u64)
        .or_else(|| total.as_u64())
}

/// Execute one query definition and record its outcome.
///
/// Errors are logged and recorded as a failed result; they never propagate.
pub async fn run_query(
    backend: &dyn SearchBackend,
    index: &str,
    query: &QueryDefinition,
) -> QueryResult {
    let body = query.body.to_json();
    let start = Instant::now();

    match backend.search(index, &body).await {
        Ok(response) => {
            let latency_ms = start.elapsed().as_secs_f64() * 1000.0;
            QueryResult::success(&query.name, latency_ms, extract_hit_count(&response))
        }
        Err(e) => {
            tracing::warn!(
                query = %query.name,
                endpoint = %backend.endpoint(),
                error = %e,
                "Query failed"
            );
            QueryResult::failure(&query.name, e.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::time::Duration;

    struct FixedBackend {
        delay: Duration,
        response: std::result::Result<Value, u16>,
    }

    #[async_trait]
    impl SearchBackend for FixedBackend {
        fn endpoint(&self) -> &str {
            "mock://fixed"
        }

        async fn search(&self, _index: &str, _body: &Value) -> Result<Value> {
            tokio::time::sleep(self.delay).await;
            match &self.response {
                Ok(value) => Ok(value.clone()),
                Err(status) => Err(BenchError::Search {
                    status: *status,
                    message: "boom".to_string(),
                }),
            }
        }
    }

    #[test]
    fn test_default_set() {
        let queries = QueryDefinition::default_set();
        assert_eq!(queries.len(), 5);
        assert!(validate_set(&queries).is_ok());
        assert_eq!(queries[0].name, "company-name-search");
        assert_eq!(queries[4].name, "industry-aggregation");
    }

    #[test]
    fn test_aggregation_body_serialization() {
        let body = SearchBody::aggregation(json!({"by_country": {"terms": {"field": "country"}}}));
        let value = body.to_json();
        assert_eq!(value["size"], 0);
        assert!(value.get("query").is_none());
        assert!(value["aggs"]["by_country"].is_object());
    }

    #[test]
    fn test_parse_set_preserves_order() {
        let json = r#"[
            {"name": "b", "body": {"query": {"match_all": {}}}},
            {"name": "a", "body": {"size": 0, "aggs": {"x": {"terms": {"field": "y"}}}}}
        ]"#;
        let queries = QueryDefinition::parse_set(json).unwrap();
        assert_eq!(queries[0].name, "b");
        assert_eq!(queries[1].name, "a");
        assert_eq!(queries[1].body.size, Some(0));
    }

    #[test]
    fn test_parse_set_rejects_duplicates() {
        let json = r#"[
            {"name": "a", "body": {"query": {"match_all": {}}}},
            {"name": "a", "body": {"query": {"match_all": {}}}}
        ]"#;
        let err = QueryDefinition::parse_set(json).unwrap_err();
        assert!(err.to_string().contains("duplicate query name: a"));
    }

    #[test]
    fn test_parse_set_keeps_extra_body_keys() {
        let json = r#"[{
            "name": "sorted",
            "body": {
                "query": {"match_all": {}},
                "sort": [{"employee_count": "desc"}],
                "from": 100,
                "_source": false,
                "track_total_hits": true
            }
        }]"#;
        let queries = QueryDefinition::parse_set(json).unwrap();

        assert_eq!(
            queries[0].body.to_json(),
            json!({
                "query": {"match_all": {}},
                "sort": [{"employee_count": "desc"}],
                "from": 100,
                "_source": false,
                "track_total_hits": true
            })
        );
    }

    #[test]
    fn test_aggregations_alias() {
        let json = r#"[{"name": "agg", "body": {"size": 0, "aggregations": {"x": {"terms": {"field": "y"}}}}}]"#;
        let queries = QueryDefinition::parse_set(json).unwrap();
        let body = queries[0].body.to_json();
        assert!(body["aggs"]["x"].is_object());
        assert!(body.get("aggregations").is_none());
    }

    #[test]
    fn test_parse_set_rejects_body_without_clause() {
        let typo = r#"[{"name": "typo", "body": {"querry": {"match_all": {}}}}]"#;
        let err = QueryDefinition::parse_set(typo).unwrap_err();
        assert!(matches!(err, BenchError::Config(_)));
        assert!(err.to_string().contains("querry"));

        let empty = r#"[{"name": "empty", "body": {}}]"#;
        assert!(matches!(
            QueryDefinition::parse_set(empty),
            Err(BenchError::Config(_))
        ));
    }

    #[test]
    fn test_builder_extra_keys() {
        let body = SearchBody::query(json!({"match_all": {}})).with("from", json!(20));
        assert_eq!(body.to_json(), json!({"query": {"match_all": {}}, "from": 20}));
    }

    #[test]
    fn test_parse_set_rejects_empty() {
        assert!(matches!(
            QueryDefinition::parse_set("[]"),
            Err(BenchError::Config(_))
        ));
    }

    #[test]
    fn test_extract_hit_count() {
        assert_eq!(
            extract_hit_count(&json!({"hits": {"total": {"value": 7, "relation": "eq"}}})),
            Some(7)
        );
        assert_eq!(extract_hit_count(&json!({"hits": {"total": 12}})), Some(12));
        assert_eq!(extract_hit_count(&json!({"aggregations": {}})), None);
        assert_eq!(extract_hit_count(&json!({"hits": {"hits": []}})), None);
    }

    #[test]
    fn test_result_invariants() {
        let ok = QueryResult::success("q", 12.5, Some(3));
        assert!(ok.is_success());
        assert_eq!(ok.latency(), Some(12.5));
        assert!(ok.error().is_none());

        let failed = QueryResult::failure("q", "timeout");
        assert!(!failed.is_success());
        assert!(failed.latency().is_none());
        assert!(failed.hits().is_none());
        assert_eq!(failed.error(), Some("timeout"));
    }

    #[test]
    fn test_success_latency_clamped() {
        assert_eq!(QueryResult::success("q", -1.0, None).latency(), Some(0.0));
        assert_eq!(QueryResult::success("q", f64::NAN, None).latency(), Some(0.0));
    }

    #[test]
    fn test_result_serialization_shape() {
        let ok = serde_json::to_value(QueryResult::success("q", 5.0, None)).unwrap();
        assert_eq!(ok, json!({"query": "q", "success": true, "latency": 5.0}));

        let failed = serde_json::to_value(QueryResult::failure("q", "boom")).unwrap();
        assert_eq!(failed, json!({"query": "q", "success": false, "error": "boom"}));
    }

    #[test]
    fn test_result_deserialize_round_trip() {
        let ok = QueryResult::success("q", 5.0, Some(2));
        let text = serde_json::to_string(&ok).unwrap();
        assert_eq!(serde_json::from_str::<QueryResult>(&text).unwrap(), ok);

        let failed = QueryResult::failure("q", "boom");
        let text = serde_json::to_string(&failed).unwrap();
        assert_eq!(serde_json::from_str::<QueryResult>(&text).unwrap(), failed);
    }

    #[test]
    fn test_result_deserialize_rejects_inconsistent() {
        for text in [
            r#"{"query": "q", "success": true, "error": "x"}"#,
            r#"{"query": "q", "success": true, "latency": 1.0, "error": "x"}"#,
            r#"{"query": "q", "success": true}"#,
            r#"{"query": "q", "success": true, "latency": -3.0}"#,
            r#"{"query": "q", "success": false, "latency": 1.0, "error": "x"}"#,
            r#"{"query": "q", "success": false}"#,
        ] {
            let err = serde_json::from_str::<QueryResult>(text).unwrap_err();
            assert!(err.to_string().contains("inconsistent result"), "{text}: {err}");
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_query_success() {
        let backend = FixedBackend {
            delay: Duration::from_millis(100),
            response: Ok(json!({"hits": {"total": {"value": 9}}})),
        };
        let query = QueryDefinition::default_set().remove(0);

        let result = run_query(&backend, "companies", &query).await;

        assert!(result.is_success());
        assert_eq!(result.query(), "company-name-search");
        assert_eq!(result.hits(), Some(9));
        let latency = result.latency().unwrap();
        assert!((latency - 100.0).abs() < 1.0, "latency was {latency}");
    }

    #[tokio::test]
    async fn test_run_query_failure_is_recorded() {
        let backend = FixedBackend {
            delay: Duration::ZERO,
            response: Err(500),
        };
        let query = QueryDefinition::default_set().remove(1);

        let result = run_query(&backend, "companies", &query).await;

        assert!(!result.is_success());
        assert_eq!(result.query(), "country-filter-search");
        assert_eq!(result.error(), Some("Search error: 500 - boom"));
    }
}
