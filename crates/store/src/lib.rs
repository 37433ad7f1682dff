//! Storage backends for keepvar
//!
//! Two realizations of one contract:
//! - MemoryBackend: Process-private map, optional snapshot file
//! - RemoteBackend: Adapter over any document-store client
//!
//! plus the query engine both share and the client traits the remote
//! backend is generic over. `mock` ships an in-process fake client so the
//! remote code path is testable without a server.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod client;
pub mod contract;
pub mod memory;
pub mod mock;
pub mod query;
pub mod remote;

// Re-export commonly used types
pub use client::{ClientError, ClientResult, CommandBatch, DocumentClient};
pub use contract::{LockHandle, StoreLock, VariableStore};
pub use memory::MemoryBackend;
pub use mock::{MockBatch, MockClient};
pub use query::{QueryRequest, RESERVED_KEY_MARKERS};
pub use remote::RemoteBackend;
