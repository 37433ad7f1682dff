//! In-memory emulation backend
//!
//! Entries live in a `RwLock<HashMap>`, optionally mirrored to a single
//! snapshot file so a process restart picks up where it left off. Each
//! entry keeps the representation it was written through: whole values
//! from `set` are plain envelope strings, the path-mutation family works
//! on live JSON documents. The split matches how a document store treats
//! string vs JSON entries, so query candidacy and the path operations
//! behave the same against both backends. Locks are no-ops because there
//! is no other process to coordinate with.

use crate::contract::{StoreLock, VariableStore};
use crate::query::{evaluate, QueryRequest};
use keepvar_core::{
    array_append, array_len, decode, decode_value, encode, parse_path, set_at, EncodeHints,
    Error, KeptValue, Result,
};
use parking_lot::RwLock;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
enum Entry {
    Raw(String),
    Doc(Value),
}

/// Local variable store backed by a process-private map
pub struct MemoryBackend {
    entries: RwLock<HashMap<String, Entry>>,
    snapshot: Option<PathBuf>,
}

impl MemoryBackend {
    /// A fresh, empty, unpersisted store
    pub fn new() -> Self {
        MemoryBackend {
            entries: RwLock::new(HashMap::new()),
            snapshot: None,
        }
    }

    /// A store mirrored to `path`. An existing snapshot is loaded; an
    /// unreadable or corrupt one is logged and skipped, the store starts
    /// empty and overwrites it on the next mutation.
    pub fn with_snapshot(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        let entries = match load_snapshot(&path) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!(
                    target: "keepvar::memory",
                    snapshot = %path.display(),
                    error = %e,
                    "snapshot unreadable, starting empty"
                );
                HashMap::new()
            }
        };
        MemoryBackend {
            entries: RwLock::new(entries),
            snapshot: Some(path),
        }
    }

    /// Store an already-encoded envelope verbatim
    pub fn set_raw(&self, key: &str, raw: &str) -> Result<()> {
        let mut entries = self.entries.write();
        entries.insert(key.to_string(), Entry::Raw(raw.to_string()));
        self.persist(&entries)
    }

    /// The stored entry under `key`, serialized, if any
    pub fn get_raw(&self, key: &str) -> Result<Option<String>> {
        match self.entries.read().get(key) {
            Some(Entry::Raw(raw)) => Ok(Some(raw.clone())),
            Some(Entry::Doc(doc)) => Ok(Some(serde_json::to_string(doc)?)),
            None => Ok(None),
        }
    }

    /// Pipelining is a remote-transport concern with no local counterpart.
    pub fn pipeline(&self) -> Result<()> {
        Err(Error::Unsupported {
            backend: "memory",
            operation: "pipeline",
        })
    }

    fn persist(&self, entries: &HashMap<String, Entry>) -> Result<()> {
        let Some(path) = &self.snapshot else {
            return Ok(());
        };
        let map: serde_json::Map<String, Value> = entries
            .iter()
            .map(|(k, entry)| {
                let value = match entry {
                    Entry::Raw(raw) => Value::String(raw.clone()),
                    Entry::Doc(doc) => doc.clone(),
                };
                (k.clone(), value)
            })
            .collect();
        let body = serde_json::to_string(&Value::Object(map))?;
        fs::write(path, body)?;
        tracing::debug!(
            target: "keepvar::memory",
            snapshot = %path.display(),
            entries = entries.len(),
            "snapshot written"
        );
        Ok(())
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl VariableStore for MemoryBackend {
    fn set(&self, key: &str, value: &KeptValue, hints: &EncodeHints) -> Result<String> {
        let raw = encode(value, hints)?;
        self.set_raw(key, &raw)?;
        tracing::debug!(target: "keepvar::memory", key, kind = value.kind_name(), "set");
        Ok(raw)
    }

    fn get(&self, key: &str) -> Result<KeptValue> {
        match self.entries.read().get(key) {
            Some(Entry::Raw(raw)) => Ok(decode(raw)),
            Some(Entry::Doc(doc)) => Ok(decode_value(doc.clone())),
            None => Ok(KeptValue::Null),
        }
    }

    fn json_mset(&self, key: &str, params: &[(String, Value)]) -> Result<()> {
        // One write guard across read-modify-write: concurrent callers on
        // the same key serialize instead of overwriting each other, and
        // all mutations land as one visible revision.
        let mut entries = self.entries.write();
        let mut doc = match entries.get(key) {
            Some(Entry::Doc(doc)) => doc.clone(),
            Some(Entry::Raw(_)) => return Err(not_a_document(key)),
            None => json!({}),
        };
        for (path, value) in params {
            let steps = parse_path(path)?;
            set_at(&mut doc, &steps, value.clone())?;
        }
        entries.insert(key.to_string(), Entry::Doc(doc));
        self.persist(&entries)?;
        tracing::debug!(target: "keepvar::memory", key, mutations = params.len(), "json_mset");
        Ok(())
    }

    fn arrlen(&self, key: &str, path: &str) -> Result<usize> {
        let steps = parse_path(path)?;
        match self.entries.read().get(key) {
            Some(Entry::Doc(doc)) => Ok(array_len(doc, &steps)?),
            Some(Entry::Raw(_)) => Err(not_a_document(key)),
            None => Err(Error::KeyNotFound(key.to_string())),
        }
    }

    fn arrappend(&self, key: &str, path: &str, items: Vec<Value>) -> Result<usize> {
        let steps = parse_path(path)?;
        let mut entries = self.entries.write();
        let len = match entries.get_mut(key) {
            Some(Entry::Doc(doc)) => array_append(doc, &steps, items)?,
            Some(Entry::Raw(_)) => return Err(not_a_document(key)),
            None => return Err(Error::KeyNotFound(key.to_string())),
        };
        self.persist(&entries)?;
        Ok(len)
    }

    fn scan(&self, pattern: &str) -> Result<Vec<String>> {
        let regex = glob_to_regex(pattern)?;
        // Clone the matching keys under a short read lock
        let mut keys: Vec<String> = {
            let entries = self.entries.read();
            entries
                .keys()
                .filter(|k| regex.is_match(k))
                .cloned()
                .collect()
        };
        keys.sort();
        Ok(keys)
    }

    fn delete(&self, keys: &[&str]) -> Result<usize> {
        let mut entries = self.entries.write();
        let mut removed = 0;
        for key in keys {
            if entries.remove(*key).is_some() {
                removed += 1;
            }
        }
        self.persist(&entries)?;
        Ok(removed)
    }

    fn query(&self, request: &QueryRequest) -> Result<Vec<(String, Value)>> {
        // Only document entries are query candidates; whole values stored
        // through `set` are invisible to search, same as on the remote.
        let pairs: Vec<(String, Value)> = {
            let entries = self.entries.read();
            entries
                .iter()
                .filter(|(k, _)| k.contains(&request.entity_key))
                .filter_map(|(k, entry)| match entry {
                    Entry::Doc(doc) if doc.is_object() => Some((k.clone(), doc.clone())),
                    _ => None,
                })
                .collect()
        };
        evaluate(request, pairs)
    }

    fn lock(&self, name: &str) -> Result<StoreLock> {
        tracing::trace!(target: "keepvar::memory", name, "noop lock handed out");
        Ok(StoreLock::noop())
    }
}

fn not_a_document(key: &str) -> Error {
    Error::Serialization(format!("key '{key}' does not hold a JSON document"))
}

fn load_snapshot(path: &Path) -> Result<HashMap<String, Entry>> {
    if !path.exists() {
        return Ok(HashMap::new());
    }
    let body = fs::read_to_string(path)?;
    let map: HashMap<String, Value> = serde_json::from_str(&body)?;
    let mut entries = HashMap::with_capacity(map.len());
    for (key, value) in map {
        let entry = match value {
            // Envelope strings are `set` entries, anything else is a
            // document written through the path family.
            Value::String(raw) => Entry::Raw(raw),
            doc => Entry::Doc(doc),
        };
        entries.insert(key, entry);
    }
    Ok(entries)
}

/// Translate a glob pattern into an anchored regex
pub(crate) fn glob_to_regex(pattern: &str) -> Result<regex::Regex> {
    let mut out = String::with_capacity(pattern.len() + 4);
    out.push('^');
    for ch in pattern.chars() {
        match ch {
            '*' => out.push_str(".*"),
            '?' => out.push('.'),
            other => out.push_str(&regex::escape(&other.to_string())),
        }
    }
    out.push('$');
    regex::Regex::new(&out).map_err(|e| Error::Serialization(e.to_string()))
}
