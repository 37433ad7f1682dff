//! In-process fake document store
//!
//! Implements [`DocumentClient`] over a hash map so the remote backend can
//! be exercised without a server. Entries are either plain strings or JSON
//! documents; touching one through the other command family reports
//! [`ClientError::WrongType`], matching how a real document store behaves.

use crate::client::{ClientError, ClientResult, CommandBatch, DocumentClient};
use crate::memory::glob_to_regex;
use crate::query::{compare_by_field, is_reserved_key};
use keepvar_core::{array_append, array_len, parse_path, set_at, value_at};
use parking_lot::RwLock;
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

#[derive(Debug, Clone)]
enum Entry {
    Raw(String),
    Doc(Value),
}

#[derive(Default)]
struct Inner {
    entries: RwLock<HashMap<String, Entry>>,
    locks: RwLock<HashSet<String>>,
}

/// Fake client for tests; cheap to clone, clones share state
#[derive(Clone, Default)]
pub struct MockClient {
    inner: Arc<Inner>,
}

impl MockClient {
    /// An empty fake store
    pub fn new() -> Self {
        Self::default()
    }
}

fn path_err(e: impl std::fmt::Display) -> ClientError {
    ClientError::Other(e.to_string())
}

impl Inner {
    fn set_raw(&self, key: &str, value: &str) {
        self.entries
            .write()
            .insert(key.to_string(), Entry::Raw(value.to_string()));
    }

    fn json_set(&self, key: &str, path: &str, value: &Value) -> ClientResult<()> {
        let steps = parse_path(path).map_err(path_err)?;
        let mut entries = self.entries.write();
        let entry = entries
            .entry(key.to_string())
            .or_insert_with(|| Entry::Doc(json!({})));
        match entry {
            Entry::Doc(doc) => set_at(doc, &steps, value.clone()).map_err(path_err),
            Entry::Raw(_) => Err(ClientError::WrongType),
        }
    }

    fn json_arrappend(&self, key: &str, path: &str, items: &[Value]) -> ClientResult<usize> {
        let steps = parse_path(path).map_err(path_err)?;
        let mut entries = self.entries.write();
        match entries.get_mut(key) {
            Some(Entry::Doc(doc)) => array_append(doc, &steps, items.to_vec()).map_err(path_err),
            Some(Entry::Raw(_)) => Err(ClientError::WrongType),
            None => Err(ClientError::Other(format!("no such key: {key}"))),
        }
    }

    fn json_arrlen(&self, key: &str, path: &str) -> ClientResult<Option<usize>> {
        let steps = parse_path(path).map_err(path_err)?;
        match self.entries.read().get(key) {
            Some(Entry::Doc(doc)) => array_len(doc, &steps).map(Some).map_err(path_err),
            Some(Entry::Raw(_)) => Err(ClientError::WrongType),
            None => Ok(None),
        }
    }

    fn delete(&self, keys: &[&str]) -> usize {
        let mut entries = self.entries.write();
        keys.iter().filter(|k| entries.remove(**k).is_some()).count()
    }
}

impl DocumentClient for MockClient {
    type Batch = MockBatch;

    fn get_raw(&self, key: &str) -> ClientResult<Option<String>> {
        match self.inner.entries.read().get(key) {
            Some(Entry::Raw(raw)) => Ok(Some(raw.clone())),
            Some(Entry::Doc(_)) => Err(ClientError::WrongType),
            None => Ok(None),
        }
    }

    fn set_raw(&self, key: &str, value: &str) -> ClientResult<()> {
        self.inner.set_raw(key, value);
        Ok(())
    }

    fn json_get(&self, key: &str, path: &str) -> ClientResult<Option<Value>> {
        let steps = parse_path(path).map_err(path_err)?;
        match self.inner.entries.read().get(key) {
            Some(Entry::Doc(doc)) => value_at(doc, &steps)
                .map(|v| Some(v.clone()))
                .map_err(path_err),
            Some(Entry::Raw(_)) => Err(ClientError::WrongType),
            None => Ok(None),
        }
    }

    fn json_set(&self, key: &str, path: &str, value: &Value) -> ClientResult<()> {
        self.inner.json_set(key, path, value)
    }

    fn json_arrlen(&self, key: &str, path: &str) -> ClientResult<Option<usize>> {
        self.inner.json_arrlen(key, path)
    }

    fn json_arrappend(&self, key: &str, path: &str, items: &[Value]) -> ClientResult<usize> {
        self.inner.json_arrappend(key, path, items)
    }

    fn search(
        &self,
        index: &str,
        query: &str,
        sort: Option<(&str, bool)>,
        page: Option<(usize, usize)>,
    ) -> ClientResult<Vec<(String, Value)>> {
        let entity = index.strip_prefix("idx:").unwrap_or(index);
        let clauses = parse_query(query)?;
        let mut results = Vec::new();
        {
            let entries = self.inner.entries.read();
            for (key, entry) in entries.iter() {
                if !key.contains(entity) || is_reserved_key(key) {
                    continue;
                }
                let Entry::Doc(doc) = entry else { continue };
                if !doc.is_object() {
                    continue;
                }
                if clauses.iter().all(|c| c.matches(doc)) {
                    results.push((key.clone(), doc.clone()));
                }
            }
        }
        results.sort_by(|a, b| a.0.cmp(&b.0));
        if let Some((field, ascending)) = sort {
            results.sort_by(|a, b| compare_by_field(&a.1, &b.1, field, ascending));
        }
        if let Some((offset, limit)) = page {
            if offset >= results.len() {
                results.clear();
            } else {
                results.drain(..offset);
                results.truncate(limit);
            }
        }
        Ok(results)
    }

    fn scan(&self, cursor: u64, pattern: &str, count: usize) -> ClientResult<(u64, Vec<String>)> {
        let regex = glob_to_regex(pattern).map_err(path_err)?;
        let mut keys: Vec<String> = self.inner.entries.read().keys().cloned().collect();
        keys.sort();
        let start = cursor as usize;
        let end = (start + count).min(keys.len());
        let page: Vec<String> = keys[start..end]
            .iter()
            .filter(|k| regex.is_match(k))
            .cloned()
            .collect();
        let next = if end >= keys.len() { 0 } else { end as u64 };
        Ok((next, page))
    }

    fn delete(&self, keys: &[&str]) -> ClientResult<usize> {
        Ok(self.inner.delete(keys))
    }

    fn acquire_lock(&self, name: &str) -> ClientResult<bool> {
        Ok(self.inner.locks.write().insert(name.to_string()))
    }

    fn release_lock(&self, name: &str) -> ClientResult<()> {
        self.inner.locks.write().remove(name);
        Ok(())
    }

    fn pipeline(&self) -> MockBatch {
        MockBatch {
            inner: Arc::clone(&self.inner),
            commands: Vec::new(),
        }
    }
}

enum Cmd {
    SetRaw(String, String),
    JsonSet(String, String, Value),
    JsonArrAppend(String, String, Vec<Value>),
    JsonArrLen(String, String),
    Delete(Vec<String>),
}

/// Queued commands for the fake client
pub struct MockBatch {
    inner: Arc<Inner>,
    commands: Vec<Cmd>,
}

impl CommandBatch for MockBatch {
    fn set_raw(&mut self, key: &str, value: &str) {
        self.commands
            .push(Cmd::SetRaw(key.to_string(), value.to_string()));
    }

    fn json_set(&mut self, key: &str, path: &str, value: &Value) {
        self.commands
            .push(Cmd::JsonSet(key.to_string(), path.to_string(), value.clone()));
    }

    fn json_arrappend(&mut self, key: &str, path: &str, items: &[Value]) {
        self.commands.push(Cmd::JsonArrAppend(
            key.to_string(),
            path.to_string(),
            items.to_vec(),
        ));
    }

    fn json_arrlen(&mut self, key: &str, path: &str) {
        self.commands
            .push(Cmd::JsonArrLen(key.to_string(), path.to_string()));
    }

    fn delete(&mut self, keys: &[&str]) {
        self.commands
            .push(Cmd::Delete(keys.iter().map(|k| k.to_string()).collect()));
    }

    fn execute(self) -> ClientResult<Vec<Value>> {
        let mut replies = Vec::with_capacity(self.commands.len());
        for cmd in self.commands {
            let reply = match cmd {
                Cmd::SetRaw(key, value) => {
                    self.inner.set_raw(&key, &value);
                    json!("OK")
                }
                Cmd::JsonSet(key, path, value) => {
                    self.inner.json_set(&key, &path, &value)?;
                    json!("OK")
                }
                Cmd::JsonArrAppend(key, path, items) => {
                    json!(self.inner.json_arrappend(&key, &path, &items)?)
                }
                Cmd::JsonArrLen(key, path) => match self.inner.json_arrlen(&key, &path)? {
                    Some(len) => json!(len),
                    None => Value::Null,
                },
                Cmd::Delete(keys) => {
                    let refs: Vec<&str> = keys.iter().map(String::as_str).collect();
                    json!(self.inner.delete(&refs))
                }
            };
            replies.push(reply);
        }
        Ok(replies)
    }
}

/// One rendered filter clause
enum Clause {
    Tag { field: String, values: Vec<String> },
    Text { field: String, values: Vec<String> },
}

impl Clause {
    fn matches(&self, doc: &Value) -> bool {
        match self {
            Clause::Tag { field, values } => match field_text(doc, field) {
                Some(text) => values.iter().any(|v| v == &text),
                None => false,
            },
            Clause::Text { field, values } => match field_text(doc, field) {
                Some(text) => values.iter().any(|v| text.contains(v.as_str())),
                None => false,
            },
        }
    }
}

fn field_text(doc: &Value, field: &str) -> Option<String> {
    match doc.get(field)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Parse `@field:{a|b}` / `@field:(a|b)` clauses out of a query string.
/// Backslash escapes inside the value lists are honored the way the
/// rendering side produces them.
fn parse_query(query: &str) -> ClientResult<Vec<Clause>> {
    if query.trim() == "*" {
        return Ok(Vec::new());
    }
    let mut clauses = Vec::new();
    for term in split_terms(query) {
        let bad = || ClientError::Other(format!("unparseable query term: {term}"));
        let rest = term.strip_prefix('@').ok_or_else(bad)?;
        let (field, body) = rest.split_once(':').ok_or_else(bad)?;
        let clause = if let Some(values) = parse_values(body, '{', '}') {
            Clause::Tag {
                field: field.to_string(),
                values,
            }
        } else if let Some(values) = parse_values(body, '(', ')') {
            Clause::Text {
                field: field.to_string(),
                values,
            }
        } else {
            return Err(bad());
        };
        clauses.push(clause);
    }
    Ok(clauses)
}

/// Split on unescaped whitespace, keeping escape sequences intact
fn split_terms(query: &str) -> Vec<String> {
    let mut terms = Vec::new();
    let mut current = String::new();
    let mut escaped = false;
    for ch in query.chars() {
        if escaped {
            current.push('\\');
            current.push(ch);
            escaped = false;
        } else if ch == '\\' {
            escaped = true;
        } else if ch.is_whitespace() {
            if !current.is_empty() {
                terms.push(std::mem::take(&mut current));
            }
        } else {
            current.push(ch);
        }
    }
    if !current.is_empty() {
        terms.push(current);
    }
    terms
}

/// `{a|b}` / `(a|b)` body → unescaped values; None when malformed
fn parse_values(body: &str, open: char, close: char) -> Option<Vec<String>> {
    let inner = body.strip_prefix(open)?;
    let mut values = Vec::new();
    let mut current = String::new();
    let mut escaped = false;
    let mut closed = false;
    let mut chars = inner.chars();
    for ch in chars.by_ref() {
        if escaped {
            current.push(ch);
            escaped = false;
        } else if ch == '\\' {
            escaped = true;
        } else if ch == '|' {
            values.push(std::mem::take(&mut current));
        } else if ch == close {
            closed = true;
            break;
        } else {
            current.push(ch);
        }
    }
    if !closed || escaped || chars.next().is_some() {
        return None;
    }
    values.push(current);
    Some(values)
}
