//! Core types for keepvar
//!
//! This crate defines the foundational pieces shared by every backend:
//! - KeptValue: Unified enum for every storable value kind
//! - codec: KeptValue ⇄ JSON envelope encoding/decoding
//! - path: Path expressions, parsing and document navigation
//! - Error: Error type hierarchy
//!
//! Backends live in `keepvar-store`; nothing here touches a network or a
//! lock.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod codec;
pub mod error;
pub mod path;
pub mod value;

// Re-export commonly used types
pub use codec::{decode, decode_value, encode, EncodeHints, OBJECT_TYPE_KEY, TIMESTAMP_FORMAT};
pub use error::{Error, Result};
pub use path::{
    array_append, array_len, parse_path, resolve_target, set_at, value_at, value_at_mut,
    PathError, PathStep, Target,
};
pub use value::{Code, CodeKind, KeptValue, NumArray, NumData, Table};
