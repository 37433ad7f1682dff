//! The uniform store contract
//!
//! Both backends implement [`VariableStore`]; picking one is an explicit
//! choice at the construction site and calling code stays backend-agnostic.
//!
//! Keys are opaque strings. Documents cross this boundary as
//! `serde_json::Value` (already-decoded wire form); whole values cross as
//! [`KeptValue`] through the codec.

use crate::query::QueryRequest;
use keepvar_core::{EncodeHints, KeptValue, Result};
use serde_json::Value;

/// Uniform operation surface over both backends
pub trait VariableStore {
    /// Encode and store a value under `key`, returning the stored envelope.
    fn set(&self, key: &str, value: &KeptValue, hints: &EncodeHints) -> Result<String>;

    /// Decode the value under `key`; `KeptValue::Null` when the key is absent.
    fn get(&self, key: &str) -> Result<KeptValue>;

    /// Apply several path mutations to the document under `key` as one
    /// stored revision. Paths use the `$`-rooted expression syntax.
    fn json_mset(&self, key: &str, params: &[(String, Value)]) -> Result<()>;

    /// Length of the sequence at `path` inside the document under `key`.
    /// Fails when the key does not exist or the path does not resolve.
    fn arrlen(&self, key: &str, path: &str) -> Result<usize>;

    /// Extend the sequence at `path` with `items`, returning its new length.
    fn arrappend(&self, key: &str, path: &str, items: Vec<Value>) -> Result<usize>;

    /// Keys matching a glob pattern (`*` any run, `?` any single character).
    fn scan(&self, pattern: &str) -> Result<Vec<String>>;

    /// Remove the listed keys, returning how many actually existed.
    /// Deleting a missing key is not an error.
    fn delete(&self, keys: &[&str]) -> Result<usize>;

    /// Filter, sort and paginate stored documents.
    /// Returns ordered `(key, document)` pairs.
    fn query(&self, request: &QueryRequest) -> Result<Vec<(String, Value)>>;

    /// Obtain a named lock handle. A no-op guard on the emulation backend,
    /// a distributed lock on the remote backend.
    fn lock(&self, name: &str) -> Result<StoreLock>;
}

/// Acquire/release behavior behind a [`StoreLock`]
pub trait LockHandle: Send {
    /// Take the lock. Returns false when it is already held elsewhere.
    fn acquire(&mut self) -> Result<bool>;
    /// Give the lock back. Releasing an unheld lock is a no-op.
    fn release(&mut self) -> Result<()>;
}

/// Named lock obtained from a backend
pub struct StoreLock {
    inner: Box<dyn LockHandle>,
}

impl StoreLock {
    /// Wrap a backend-specific handle
    pub fn new(inner: Box<dyn LockHandle>) -> Self {
        StoreLock { inner }
    }

    /// A handle that always acquires and never blocks anyone
    pub fn noop() -> Self {
        StoreLock {
            inner: Box::new(NoopLock),
        }
    }

    /// Take the lock
    pub fn acquire(&mut self) -> Result<bool> {
        self.inner.acquire()
    }

    /// Give the lock back
    pub fn release(&mut self) -> Result<()> {
        self.inner.release()
    }
}

impl std::fmt::Debug for StoreLock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreLock").finish_non_exhaustive()
    }
}

/// The emulation backend has no cross-process concurrency to protect.
struct NoopLock;

impl LockHandle for NoopLock {
    fn acquire(&mut self) -> Result<bool> {
        Ok(true)
    }

    fn release(&mut self) -> Result<()> {
        Ok(())
    }
}
