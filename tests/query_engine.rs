//! Query engine tests
//!
//! The same dataset is loaded into both backends and every request must
//! come back in the same order from each, so callers can switch backends
//! without their result handling changing.

use keepvar::{
    EncodeHints, KeptValue, MemoryBackend, MockClient, QueryRequest, RemoteBackend, VariableStore,
};
use serde_json::json;
use std::collections::HashMap;

fn seeded_backends() -> Vec<(&'static str, Box<dyn VariableStore>)> {
    let docs = [
        ("job:item1", json!({"name": "train model", "status": "done", "priority": 3})),
        ("job:item2", json!({"name": "eval model", "status": "running", "priority": 1})),
        ("job:item3", json!({"name": "deploy model", "status": "done", "priority": 2})),
        ("job:item4", json!({"name": "cleanup", "status": "done"})),
        ("idx:job", json!({"descriptor": true})),
        ("pk:job", json!({"counter": 9})),
        ("lock:job", json!({"holder": "me"})),
        ("unrelated:1", json!({"name": "other entity"})),
    ];

    let mut backends: Vec<(&'static str, Box<dyn VariableStore>)> = vec![
        ("memory", Box::new(MemoryBackend::new())),
        (
            "remote",
            Box::new(RemoteBackend::new(MockClient::new())),
        ),
    ];
    for (_, store) in &mut backends {
        for (key, doc) in &docs {
            store
                .json_mset(key, &[("$".to_string(), doc.clone())])
                .unwrap();
        }
    }
    backends
}

fn keys_for(request: &QueryRequest) -> Vec<Vec<String>> {
    seeded_backends()
        .into_iter()
        .map(|(_, store)| {
            store
                .query(request)
                .unwrap()
                .into_iter()
                .map(|(k, _)| k)
                .collect()
        })
        .collect()
}

/// Both backends must agree; returns the shared ordering
fn agreed_keys(request: &QueryRequest) -> Vec<String> {
    let mut orderings = keys_for(request);
    let reference = orderings.pop().unwrap();
    for other in orderings {
        assert_eq!(other, reference, "backends disagree on {request:?}");
    }
    reference
}

#[test]
fn unfiltered_query_returns_entity_docs_in_key_order() {
    let keys = agreed_keys(&QueryRequest::new("job"));
    assert_eq!(keys, vec!["job:item1", "job:item2", "job:item3", "job:item4"]);
}

#[test]
fn reserved_keys_never_appear() {
    let keys = agreed_keys(&QueryRequest::new("job"));
    assert!(keys.iter().all(|k| !k.starts_with("idx:")
        && !k.starts_with("pk:")
        && !k.starts_with("lock:")));
}

#[test]
fn tag_filter_is_exact() {
    let keys = agreed_keys(&QueryRequest::new("job").filter_tag("status", vec!["done"]));
    assert_eq!(keys, vec!["job:item1", "job:item3", "job:item4"]);

    // A prefix of a tag value does not match
    let keys = agreed_keys(&QueryRequest::new("job").filter_tag("status", vec!["don"]));
    assert!(keys.is_empty());
}

#[test]
fn text_filter_is_substring() {
    let keys = agreed_keys(&QueryRequest::new("job").filter_text("name", vec!["model"]));
    assert_eq!(keys, vec!["job:item1", "job:item2", "job:item3"]);
}

#[test]
fn filters_combine_with_and() {
    let keys = agreed_keys(
        &QueryRequest::new("job")
            .filter_tag("status", vec!["done"])
            .filter_text("name", vec!["model"]),
    );
    assert_eq!(keys, vec!["job:item1", "job:item3"]);
}

#[test]
fn alternatives_within_a_filter_combine_with_or() {
    let keys = agreed_keys(
        &QueryRequest::new("job").filter_tag("status", vec!["running", "failed"]),
    );
    assert_eq!(keys, vec!["job:item2"]);
}

#[test]
fn sort_ascending_and_descending() {
    let keys = agreed_keys(&QueryRequest::new("job").sort_by("priority", true));
    assert_eq!(
        keys,
        vec!["job:item2", "job:item3", "job:item1", "job:item4"]
    );

    let keys = agreed_keys(&QueryRequest::new("job").sort_by("priority", false));
    assert_eq!(
        keys,
        vec!["job:item1", "job:item3", "job:item2", "job:item4"]
    );
}

#[test]
fn docs_missing_the_sort_field_come_last_either_direction() {
    for ascending in [true, false] {
        let keys = agreed_keys(&QueryRequest::new("job").sort_by("priority", ascending));
        assert_eq!(keys.last().map(String::as_str), Some("job:item4"));
    }
}

#[test]
fn pagination_applies_after_sorting() {
    let keys = agreed_keys(
        &QueryRequest::new("job")
            .sort_by("priority", true)
            .paginate(1, 2),
    );
    assert_eq!(keys, vec!["job:item3", "job:item1"]);
}

#[test]
fn pagination_past_the_end_is_empty() {
    let keys = agreed_keys(&QueryRequest::new("job").paginate(100, 10));
    assert!(keys.is_empty());
}

#[test]
fn query_for_unknown_entity_is_empty() {
    let keys = agreed_keys(&QueryRequest::new("nonexistent"));
    assert!(keys.is_empty());
}

#[test]
fn whole_value_entries_are_not_query_candidates() {
    let mut backends = seeded_backends();
    for (_, store) in &mut backends {
        let mut fields = HashMap::new();
        fields.insert("status".to_string(), KeptValue::from("done"));
        store
            .set("job:viaset", &KeptValue::Map(fields), &EncodeHints::none())
            .unwrap();
    }
    for (name, store) in &backends {
        let keys: Vec<String> = store
            .query(&QueryRequest::new("job"))
            .unwrap()
            .into_iter()
            .map(|(k, _)| k)
            .collect();
        assert!(!keys.iter().any(|k| k == "job:viaset"), "{name}: {keys:?}");
        assert_eq!(keys.len(), 4, "{name}");
    }
}

#[test]
fn filter_values_with_metacharacters_agree() {
    // A space inside a tag value must survive the remote rendering
    let keys = agreed_keys(&QueryRequest::new("job").filter_tag("name", vec!["train model"]));
    assert_eq!(keys, vec!["job:item1"]);

    // Substrings spanning a space
    let keys = agreed_keys(&QueryRequest::new("job").filter_text("name", vec!["y mo", "al m"]));
    assert_eq!(keys, vec!["job:item2", "job:item3"]);

    // '|' is a literal character, not an alternation
    let keys = agreed_keys(&QueryRequest::new("job").filter_tag("name", vec!["train|eval"]));
    assert!(keys.is_empty());
}

#[test]
fn results_carry_the_stored_documents() {
    for (name, store) in seeded_backends() {
        let results = store
            .query(&QueryRequest::new("job").filter_tag("status", vec!["running"]))
            .unwrap();
        assert_eq!(results.len(), 1, "{name}");
        assert_eq!(results[0].1["name"], json!("eval model"));
    }
}
