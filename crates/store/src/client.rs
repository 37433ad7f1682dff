//! Document-store client contract
//!
//! [`RemoteBackend`](crate::remote::RemoteBackend) speaks to its server
//! through this trait pair rather than a concrete driver. Production code
//! implements [`DocumentClient`] over a real connection; tests use the
//! in-process [`MockClient`](crate::mock::MockClient).
//!
//! A client distinguishes plain string entries from JSON documents and
//! reports a type mismatch as [`ClientError::WrongType`], which the
//! backend uses to fall back between the two representations.

use keepvar_core::Error;
use serde_json::Value;

/// Transport-level failure reported by a client
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The entry exists but holds the other representation
    /// (plain string vs JSON document)
    #[error("entry holds a different representation")]
    WrongType,
    /// Anything else the transport can report
    #[error("{0}")]
    Other(String),
}

impl From<ClientError> for Error {
    fn from(e: ClientError) -> Self {
        Error::Remote(e.to_string())
    }
}

/// Result alias for client operations
pub type ClientResult<T> = std::result::Result<T, ClientError>;

/// Minimal command surface a document store must offer
pub trait DocumentClient {
    /// Queued command batch produced by [`pipeline`](Self::pipeline)
    type Batch: CommandBatch;

    /// Read a plain string entry
    fn get_raw(&self, key: &str) -> ClientResult<Option<String>>;

    /// Write a plain string entry
    fn set_raw(&self, key: &str, value: &str) -> ClientResult<()>;

    /// Read the JSON value at `path` inside the document under `key`
    fn json_get(&self, key: &str, path: &str) -> ClientResult<Option<Value>>;

    /// Write the JSON value at `path` inside the document under `key`,
    /// creating the document when absent
    fn json_set(&self, key: &str, path: &str, value: &Value) -> ClientResult<()>;

    /// Length of the array at `path`; `None` when the key is missing
    fn json_arrlen(&self, key: &str, path: &str) -> ClientResult<Option<usize>>;

    /// Append `items` to the array at `path`, returning its new length
    fn json_arrappend(&self, key: &str, path: &str, items: &[Value]) -> ClientResult<usize>;

    /// Run a query string against `index` with optional server-side
    /// `(field, ascending)` sorting and `(offset, limit)` paging,
    /// returning `(key, document)` pairs in the server's result order
    fn search(
        &self,
        index: &str,
        query: &str,
        sort: Option<(&str, bool)>,
        page: Option<(usize, usize)>,
    ) -> ClientResult<Vec<(String, Value)>>;

    /// One page of a cursor scan: matching keys plus the next cursor,
    /// zero meaning the scan is complete
    fn scan(&self, cursor: u64, pattern: &str, count: usize) -> ClientResult<(u64, Vec<String>)>;

    /// Delete keys, returning how many existed
    fn delete(&self, keys: &[&str]) -> ClientResult<usize>;

    /// Try to take the named server-side lock
    fn acquire_lock(&self, name: &str) -> ClientResult<bool>;

    /// Release the named server-side lock
    fn release_lock(&self, name: &str) -> ClientResult<()>;

    /// Start a command batch that executes as one round trip
    fn pipeline(&self) -> Self::Batch;
}

/// Commands queued for a single round trip
pub trait CommandBatch {
    /// Queue a plain string write
    fn set_raw(&mut self, key: &str, value: &str);

    /// Queue a JSON path write
    fn json_set(&mut self, key: &str, path: &str, value: &Value);

    /// Queue an array append
    fn json_arrappend(&mut self, key: &str, path: &str, items: &[Value]);

    /// Queue an array length read
    fn json_arrlen(&mut self, key: &str, path: &str);

    /// Queue a key deletion
    fn delete(&mut self, keys: &[&str]);

    /// Send the batch, returning one reply per queued command in order
    fn execute(self) -> ClientResult<Vec<Value>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_error_maps_to_remote() {
        let err: Error = ClientError::Other("connection reset".into()).into();
        assert!(matches!(err, Error::Remote(msg) if msg == "connection reset"));
    }

    #[test]
    fn test_wrong_type_display() {
        assert_eq!(
            ClientError::WrongType.to_string(),
            "entry holds a different representation"
        );
    }
}
