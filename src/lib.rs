//! Keepvar - Typed variable store over in-memory and remote backends
//!
//! Keepvar persists rich program values (primitives, tables, numeric
//! arrays, timestamps, code sources) as tagged JSON envelopes and lets you
//! mutate stored documents through `$`-rooted path expressions, scan and
//! query them, and swap the storage backend without touching call sites.
//!
//! # Quick Start
//!
//! ```ignore
//! use keepvar::{EncodeHints, KeptValue, MemoryBackend, VariableStore};
//!
//! // Create an in-memory store snapshotted to a file
//! let store = MemoryBackend::with_snapshot("vars.kpv");
//!
//! // Store a value
//! store.set("answer", &KeptValue::Int(42), &EncodeHints::none())?;
//!
//! // Retrieve it
//! let value = store.get("answer")?;
//! ```
//!
//! # Architecture
//!
//! Value and path machinery lives in `keepvar-core`; the backends, query
//! engine and client traits live in `keepvar-store`. This crate re-exports
//! both so most users depend on `keepvar` alone.

// Re-export the public API from the member crates
pub use keepvar_core::*;
pub use keepvar_store::*;
