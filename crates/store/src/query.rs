//! Query requests and the local evaluation engine
//!
//! A [`QueryRequest`] names an entity, filters, an optional sort field and
//! an optional page. The emulation backend evaluates requests in-process
//! with [`evaluate`]; the remote backend renders the same request into the
//! document store's query string with [`QueryRequest::to_query_string`] and
//! lets the server do the work. Both realizations return the same ordering
//! for the same data.

use keepvar_core::Result;
use serde_json::Value;
use std::cmp::Ordering;

/// Key markers whose presence excludes a key from query candidacy.
/// Index descriptors, primary-key counters and lock sentinels live in the
/// same keyspace as documents but are never documents themselves.
pub const RESERVED_KEY_MARKERS: &[&str] = &["idx:", "pk:", "lock:"];

/// A declarative filter/sort/paginate request over stored documents
#[derive(Debug, Clone, PartialEq)]
pub struct QueryRequest {
    /// Substring identifying the entity whose documents are queried.
    /// A key is a candidate when it contains this substring.
    pub entity_key: String,
    /// Exact-match filters: the document field must equal one of the
    /// listed alternatives (OR within a filter, AND across filters).
    pub tag_filters: Vec<(String, Vec<String>)>,
    /// Substring-match filters with the same OR/AND combination.
    pub text_filters: Vec<(String, Vec<String>)>,
    /// Field to order results by; lexicographic key order when absent.
    pub sort_by: Option<String>,
    /// Sort direction, ascending unless flipped.
    pub ascending: bool,
    /// Zero-based page `(offset, limit)` applied after sorting.
    pub paginate: Option<(usize, usize)>,
}

impl QueryRequest {
    /// A request matching every document of `entity_key`, unsorted and
    /// unpaginated.
    pub fn new(entity_key: impl Into<String>) -> Self {
        QueryRequest {
            entity_key: entity_key.into(),
            tag_filters: Vec::new(),
            text_filters: Vec::new(),
            sort_by: None,
            ascending: true,
            paginate: None,
        }
    }

    /// Require `field` to equal one of `values` exactly
    pub fn filter_tag<S: Into<String>>(mut self, field: impl Into<String>, values: Vec<S>) -> Self {
        self.tag_filters
            .push((field.into(), values.into_iter().map(Into::into).collect()));
        self
    }

    /// Require `field` to contain one of `values` as a substring
    pub fn filter_text<S: Into<String>>(mut self, field: impl Into<String>, values: Vec<S>) -> Self {
        self.text_filters
            .push((field.into(), values.into_iter().map(Into::into).collect()));
        self
    }

    /// Order results by `field`
    pub fn sort_by(mut self, field: impl Into<String>, ascending: bool) -> Self {
        self.sort_by = Some(field.into());
        self.ascending = ascending;
        self
    }

    /// Keep only `limit` results starting at `offset`
    pub fn paginate(mut self, offset: usize, limit: usize) -> Self {
        self.paginate = Some((offset, limit));
        self
    }

    /// Render the request's filters as a document-store query string.
    ///
    /// Tag filters become `@field:{a|b}`, text filters `@field:(a|b)`,
    /// clauses joined by spaces. Metacharacters inside filter values are
    /// backslash-escaped so a value like `"a|b"` or one containing spaces
    /// survives the round trip. An unfiltered request renders as `"*"`.
    pub fn to_query_string(&self) -> String {
        let mut clauses = Vec::new();
        for (field, values) in &self.tag_filters {
            if values.is_empty() {
                continue;
            }
            clauses.push(format!("@{}:{{{}}}", field, join_escaped(values)));
        }
        for (field, values) in &self.text_filters {
            if values.is_empty() {
                continue;
            }
            clauses.push(format!("@{}:({})", field, join_escaped(values)));
        }
        if clauses.is_empty() {
            "*".to_string()
        } else {
            clauses.join(" ")
        }
    }
}

fn join_escaped(values: &[String]) -> String {
    values
        .iter()
        .map(|v| escape_term(v))
        .collect::<Vec<_>>()
        .join("|")
}

/// Backslash-escape the characters the query syntax gives meaning to
fn escape_term(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        if ch.is_whitespace() || matches!(ch, '\\' | '|' | '{' | '}' | '(' | ')' | '@' | ':') {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}

/// True when `key` belongs to the reserved part of the keyspace
pub fn is_reserved_key(key: &str) -> bool {
    RESERVED_KEY_MARKERS.iter().any(|m| key.contains(m))
}

/// True when the document satisfies every filter of the request
pub fn matches_filters(request: &QueryRequest, doc: &Value) -> bool {
    for (field, values) in &request.tag_filters {
        let Some(text) = field_as_text(doc, field) else {
            return false;
        };
        if !values.iter().any(|v| v == &text) {
            return false;
        }
    }
    for (field, values) in &request.text_filters {
        let Some(text) = field_as_text(doc, field) else {
            return false;
        };
        if !values.iter().any(|v| text.contains(v.as_str())) {
            return false;
        }
    }
    true
}

/// Filter, sort and paginate `(key, document)` pairs in-process.
///
/// `pairs` may arrive in any order; results come back in the canonical
/// order (lexicographic by key, then a stable sort on the sort field when
/// one is requested, documents missing the field last either direction).
pub fn evaluate(request: &QueryRequest, mut pairs: Vec<(String, Value)>) -> Result<Vec<(String, Value)>> {
    pairs.retain(|(key, _)| key.contains(&request.entity_key) && !is_reserved_key(key));
    pairs.sort_by(|a, b| a.0.cmp(&b.0));

    if let Some(field) = &request.sort_by {
        pairs.sort_by(|a, b| compare_by_field(&a.1, &b.1, field, request.ascending));
    }

    pairs.retain(|(_, doc)| matches_filters(request, doc));

    if let Some((offset, limit)) = request.paginate {
        if offset >= pairs.len() {
            pairs.clear();
        } else {
            pairs.drain(..offset);
            pairs.truncate(limit);
        }
    }

    Ok(pairs)
}

/// Stable comparison on a document field. Missing fields order after
/// present ones regardless of direction.
pub fn compare_by_field(a: &Value, b: &Value, field: &str, ascending: bool) -> Ordering {
    match (sort_key(a, field), sort_key(b, field)) {
        (Some(ka), Some(kb)) => {
            let ord = ka.cmp(&kb);
            if ascending {
                ord
            } else {
                ord.reverse()
            }
        }
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Orderable projection of a document field
#[derive(Debug, Clone, PartialEq)]
enum SortKey {
    Num(f64),
    Text(String),
}

impl Eq for SortKey {}

impl PartialOrd for SortKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SortKey {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            // NaN cannot appear: sort keys come from serde_json numbers
            (SortKey::Num(a), SortKey::Num(b)) => a.partial_cmp(b).unwrap_or(Ordering::Equal),
            (SortKey::Text(a), SortKey::Text(b)) => a.cmp(b),
            (SortKey::Num(_), SortKey::Text(_)) => Ordering::Less,
            (SortKey::Text(_), SortKey::Num(_)) => Ordering::Greater,
        }
    }
}

fn sort_key(doc: &Value, field: &str) -> Option<SortKey> {
    match doc.get(field)? {
        Value::Number(n) => n.as_f64().map(SortKey::Num),
        Value::String(s) => Some(SortKey::Text(s.clone())),
        Value::Bool(b) => Some(SortKey::Text(b.to_string())),
        _ => None,
    }
}

fn field_as_text(doc: &Value, field: &str) -> Option<String> {
    match doc.get(field)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_pairs() -> Vec<(String, Value)> {
        vec![
            (
                "job:3".to_string(),
                json!({"name": "gamma", "status": "done", "rank": 1}),
            ),
            (
                "job:1".to_string(),
                json!({"name": "alpha", "status": "done", "rank": 3}),
            ),
            (
                "job:2".to_string(),
                json!({"name": "beta", "status": "failed", "rank": 2}),
            ),
            ("idx:job".to_string(), json!({"kind": "index"})),
            ("pk:job".to_string(), json!(7)),
        ]
    }

    #[test]
    fn test_reserved_keys_excluded() {
        let request = QueryRequest::new("job");
        let results = evaluate(&request, sample_pairs()).unwrap();
        let keys: Vec<&str> = results.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["job:1", "job:2", "job:3"]);
    }

    #[test]
    fn test_tag_filter_exact_match_only() {
        let request = QueryRequest::new("job").filter_tag("status", vec!["done"]);
        let results = evaluate(&request, sample_pairs()).unwrap();
        assert_eq!(results.len(), 2);
        // "do" is not an exact status value
        let request = QueryRequest::new("job").filter_tag("status", vec!["do"]);
        assert!(evaluate(&request, sample_pairs()).unwrap().is_empty());
    }

    #[test]
    fn test_text_filter_substring_match() {
        let request = QueryRequest::new("job").filter_text("name", vec!["amma", "eta"]);
        let results = evaluate(&request, sample_pairs()).unwrap();
        let keys: Vec<&str> = results.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["job:2", "job:3"]);
    }

    #[test]
    fn test_filters_and_across_or_within() {
        let request = QueryRequest::new("job")
            .filter_tag("status", vec!["done", "failed"])
            .filter_text("name", vec!["alp"]);
        let results = evaluate(&request, sample_pairs()).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].0, "job:1");
    }

    #[test]
    fn test_missing_filter_field_never_matches() {
        let request = QueryRequest::new("job").filter_tag("owner", vec!["anyone"]);
        assert!(evaluate(&request, sample_pairs()).unwrap().is_empty());
    }

    #[test]
    fn test_sort_numeric_both_directions() {
        let request = QueryRequest::new("job").sort_by("rank", true);
        let results = evaluate(&request, sample_pairs()).unwrap();
        let keys: Vec<&str> = results.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["job:3", "job:2", "job:1"]);

        let request = QueryRequest::new("job").sort_by("rank", false);
        let results = evaluate(&request, sample_pairs()).unwrap();
        let keys: Vec<&str> = results.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["job:1", "job:2", "job:3"]);
    }

    #[test]
    fn test_missing_sort_field_sorts_last_in_both_directions() {
        let mut pairs = sample_pairs();
        pairs.push(("job:4".to_string(), json!({"name": "delta"})));

        let request = QueryRequest::new("job").sort_by("rank", true);
        let results = evaluate(&request, pairs.clone()).unwrap();
        assert_eq!(results.last().unwrap().0, "job:4");

        let request = QueryRequest::new("job").sort_by("rank", false);
        let results = evaluate(&request, pairs).unwrap();
        assert_eq!(results.last().unwrap().0, "job:4");
    }

    #[test]
    fn test_sort_is_stable_over_key_order() {
        // Equal sort keys keep lexicographic key order
        let pairs = vec![
            ("job:b".to_string(), json!({"rank": 1})),
            ("job:a".to_string(), json!({"rank": 1})),
        ];
        let request = QueryRequest::new("job").sort_by("rank", true);
        let results = evaluate(&request, pairs).unwrap();
        assert_eq!(results[0].0, "job:a");
        assert_eq!(results[1].0, "job:b");
    }

    #[test]
    fn test_pagination_slices_after_sort() {
        let request = QueryRequest::new("job").sort_by("rank", true).paginate(1, 1);
        let results = evaluate(&request, sample_pairs()).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].0, "job:2");
    }

    #[test]
    fn test_pagination_out_of_range_is_empty() {
        let request = QueryRequest::new("job").paginate(10, 5);
        assert!(evaluate(&request, sample_pairs()).unwrap().is_empty());

        // Limit past the end clips instead of failing
        let request = QueryRequest::new("job").paginate(2, 10);
        let results = evaluate(&request, sample_pairs()).unwrap();
        assert_eq!(results.len(), 1);
    }

    #[test]
    fn test_query_string_rendering() {
        let request = QueryRequest::new("job");
        assert_eq!(request.to_query_string(), "*");

        let request = QueryRequest::new("job")
            .filter_tag("status", vec!["done", "failed"])
            .filter_text("name", vec!["alp"]);
        assert_eq!(
            request.to_query_string(),
            "@status:{done|failed} @name:(alp)"
        );
    }

    #[test]
    fn test_query_string_escapes_metacharacters() {
        let request = QueryRequest::new("job")
            .filter_tag("name", vec!["train model"])
            .filter_text("note", vec!["a|b", "x}y"]);
        assert_eq!(
            request.to_query_string(),
            r"@name:{train\ model} @note:(a\|b|x\}y)"
        );
    }
}
