//! Value types for keepvar
//!
//! This module defines:
//! - KeptValue: Unified enum for every storable value kind
//! - Table: Two-dimensional labeled table with an attribute side-channel
//! - NumArray / NumData: Homogeneous numeric n-dimensional array
//! - Code / CodeKind: Function or class source text
//!
//! ## Closed Value Model
//!
//! The KeptValue enum is the complete set of kinds the codec understands.
//! Adding a kind means extending this enum and both match arms of the codec
//! together; there is no open-ended dispatch.
//!
//! ### Equality Rules
//!
//! - Different variants are NEVER equal: `Int(1) != Float(1.0)`
//! - Float uses IEEE-754 equality: `NaN != NaN`, `-0.0 == 0.0`
//! - Timestamps compare at their stored (second) granularity

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Canonical keepvar value type for all API surfaces
///
/// Every value a backend can store or return is one of these variants.
/// JSON-native kinds (null, bool, numbers, strings, lists, maps) pass through
/// the codec as bare JSON; the remaining kinds travel in a tagged envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum KeptValue {
    /// Absence marker. Also what `get` returns for a missing key.
    Null,
    /// Boolean value
    Bool(bool),
    /// 64-bit signed integer
    Int(i64),
    /// 64-bit floating point (IEEE-754)
    Float(f64),
    /// UTF-8 string
    Str(String),
    /// Ordered list of values
    List(Vec<KeptValue>),
    /// Mapping with string keys, unordered
    Map(HashMap<String, KeptValue>),
    /// Two-dimensional labeled table
    Table(Table),
    /// Homogeneous numeric n-dimensional array
    Array(NumArray),
    /// Timestamp, second granularity at the wire
    Timestamp(NaiveDateTime),
    /// Function or class source text, never an executable unit
    Code(Code),
}

/// Two-dimensional labeled table
///
/// Rows are stored row-major; `columns` labels the cells of each row.
/// `attrs` is a free-form attribute side-channel carried alongside the data.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Table {
    /// Column labels, one per cell of each row
    pub columns: Vec<String>,
    /// Row-major cell data
    pub rows: Vec<Vec<KeptValue>>,
    /// Attribute side-channel
    pub attrs: HashMap<String, KeptValue>,
}

impl Table {
    /// Create a table from column labels and row-major data
    pub fn new(columns: Vec<String>, rows: Vec<Vec<KeptValue>>) -> Self {
        Table {
            columns,
            rows,
            attrs: HashMap::new(),
        }
    }

    /// Attach an attribute (builder pattern)
    pub fn with_attr(mut self, key: impl Into<String>, value: KeptValue) -> Self {
        self.attrs.insert(key.into(), value);
        self
    }
}

/// Homogeneous numeric n-dimensional array
///
/// The buffer is flat and row-major; `shape` gives the extent of each
/// dimension. Decoding canonicalizes the numeric width: a single float
/// anywhere widens the whole buffer to `f64`, otherwise every element is
/// `i64`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NumArray {
    /// Extent of each dimension, outermost first
    pub shape: Vec<usize>,
    /// Flat row-major element buffer
    pub data: NumData,
}

/// Element buffer of a [`NumArray`], one numeric width for all elements
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum NumData {
    /// All elements are 64-bit integers
    Int(Vec<i64>),
    /// All elements are 64-bit floats
    Float(Vec<f64>),
}

impl NumArray {
    /// Create an integer array, checking that the buffer fills the shape
    pub fn from_ints(shape: Vec<usize>, data: Vec<i64>) -> Self {
        debug_assert_eq!(shape.iter().product::<usize>(), data.len());
        NumArray {
            shape,
            data: NumData::Int(data),
        }
    }

    /// Create a float array, checking that the buffer fills the shape
    pub fn from_floats(shape: Vec<usize>, data: Vec<f64>) -> Self {
        debug_assert_eq!(shape.iter().product::<usize>(), data.len());
        NumArray {
            shape,
            data: NumData::Float(data),
        }
    }

    /// Total number of elements
    pub fn len(&self) -> usize {
        match &self.data {
            NumData::Int(v) => v.len(),
            NumData::Float(v) => v.len(),
        }
    }

    /// True when the array holds no elements
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Which kind of executable unit a [`Code`] value describes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CodeKind {
    /// A function definition
    Function,
    /// A class definition
    Class,
}

/// Source text of a function or class
///
/// The codec stores and returns source text only. Turning source back into an
/// executable unit is the caller's responsibility; nothing here evaluates
/// code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Code {
    /// Function or class
    pub kind: CodeKind,
    /// The source text
    pub source: String,
}

impl Code {
    /// Function source
    pub fn function(source: impl Into<String>) -> Self {
        Code {
            kind: CodeKind::Function,
            source: source.into(),
        }
    }

    /// Class source
    pub fn class(source: impl Into<String>) -> Self {
        Code {
            kind: CodeKind::Class,
            source: source.into(),
        }
    }
}

// Custom PartialEq so floats keep IEEE-754 semantics and variants never
// compare equal across kinds.
impl PartialEq for KeptValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (KeptValue::Null, KeptValue::Null) => true,
            (KeptValue::Bool(a), KeptValue::Bool(b)) => a == b,
            (KeptValue::Int(a), KeptValue::Int(b)) => a == b,
            // IEEE-754: NaN != NaN, -0.0 == 0.0
            (KeptValue::Float(a), KeptValue::Float(b)) => a == b,
            (KeptValue::Str(a), KeptValue::Str(b)) => a == b,
            (KeptValue::List(a), KeptValue::List(b)) => a == b,
            (KeptValue::Map(a), KeptValue::Map(b)) => {
                a.len() == b.len() && a.iter().all(|(k, v)| b.get(k) == Some(v))
            }
            (KeptValue::Table(a), KeptValue::Table(b)) => a == b,
            (KeptValue::Array(a), KeptValue::Array(b)) => a == b,
            (KeptValue::Timestamp(a), KeptValue::Timestamp(b)) => a == b,
            (KeptValue::Code(a), KeptValue::Code(b)) => a == b,
            _ => false,
        }
    }
}

impl KeptValue {
    /// Get the kind name as a string, for diagnostics
    pub fn kind_name(&self) -> &'static str {
        match self {
            KeptValue::Null => "Null",
            KeptValue::Bool(_) => "Bool",
            KeptValue::Int(_) => "Int",
            KeptValue::Float(_) => "Float",
            KeptValue::Str(_) => "Str",
            KeptValue::List(_) => "List",
            KeptValue::Map(_) => "Map",
            KeptValue::Table(_) => "Table",
            KeptValue::Array(_) => "Array",
            KeptValue::Timestamp(_) => "Timestamp",
            KeptValue::Code(_) => "Code",
        }
    }

    /// Check if this is the absence marker
    pub fn is_null(&self) -> bool {
        matches!(self, KeptValue::Null)
    }

    /// Get as bool if this is a Bool value
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            KeptValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Get as i64 if this is an Int value
    pub fn as_int(&self) -> Option<i64> {
        match self {
            KeptValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Get as f64 if this is a Float value
    pub fn as_float(&self) -> Option<f64> {
        match self {
            KeptValue::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Get as &str if this is a Str value
    pub fn as_str(&self) -> Option<&str> {
        match self {
            KeptValue::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Get as &[KeptValue] if this is a List value
    pub fn as_list(&self) -> Option<&[KeptValue]> {
        match self {
            KeptValue::List(l) => Some(l),
            _ => None,
        }
    }

    /// Get as &HashMap if this is a Map value
    pub fn as_map(&self) -> Option<&HashMap<String, KeptValue>> {
        match self {
            KeptValue::Map(m) => Some(m),
            _ => None,
        }
    }

    /// Get as &Table if this is a Table value
    pub fn as_table(&self) -> Option<&Table> {
        match self {
            KeptValue::Table(t) => Some(t),
            _ => None,
        }
    }

    /// Get as &NumArray if this is an Array value
    pub fn as_array(&self) -> Option<&NumArray> {
        match self {
            KeptValue::Array(a) => Some(a),
            _ => None,
        }
    }

    /// Get the timestamp if this is a Timestamp value
    pub fn as_timestamp(&self) -> Option<NaiveDateTime> {
        match self {
            KeptValue::Timestamp(t) => Some(*t),
            _ => None,
        }
    }

    /// Get as &Code if this is a Code value
    pub fn as_code(&self) -> Option<&Code> {
        match self {
            KeptValue::Code(c) => Some(c),
            _ => None,
        }
    }
}

// ============================================================================
// From implementations for ergonomic API usage
// ============================================================================

impl From<&str> for KeptValue {
    fn from(s: &str) -> Self {
        KeptValue::Str(s.to_string())
    }
}

impl From<String> for KeptValue {
    fn from(s: String) -> Self {
        KeptValue::Str(s)
    }
}

impl From<bool> for KeptValue {
    fn from(b: bool) -> Self {
        KeptValue::Bool(b)
    }
}

impl From<i64> for KeptValue {
    fn from(i: i64) -> Self {
        KeptValue::Int(i)
    }
}

impl From<i32> for KeptValue {
    fn from(i: i32) -> Self {
        KeptValue::Int(i as i64)
    }
}

impl From<f64> for KeptValue {
    fn from(f: f64) -> Self {
        KeptValue::Float(f)
    }
}

impl From<Vec<KeptValue>> for KeptValue {
    fn from(l: Vec<KeptValue>) -> Self {
        KeptValue::List(l)
    }
}

impl From<HashMap<String, KeptValue>> for KeptValue {
    fn from(m: HashMap<String, KeptValue>) -> Self {
        KeptValue::Map(m)
    }
}

impl From<Table> for KeptValue {
    fn from(t: Table) -> Self {
        KeptValue::Table(t)
    }
}

impl From<NumArray> for KeptValue {
    fn from(a: NumArray) -> Self {
        KeptValue::Array(a)
    }
}

impl From<NaiveDateTime> for KeptValue {
    fn from(t: NaiveDateTime) -> Self {
        KeptValue::Timestamp(t)
    }
}

impl From<Code> for KeptValue {
    fn from(c: Code) -> Self {
        KeptValue::Code(c)
    }
}

impl From<()> for KeptValue {
    fn from(_: ()) -> Self {
        KeptValue::Null
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_names() {
        assert_eq!(KeptValue::Null.kind_name(), "Null");
        assert_eq!(KeptValue::Bool(true).kind_name(), "Bool");
        assert_eq!(KeptValue::Int(1).kind_name(), "Int");
        assert_eq!(KeptValue::Float(1.0).kind_name(), "Float");
        assert_eq!(KeptValue::Str(String::new()).kind_name(), "Str");
        assert_eq!(KeptValue::List(vec![]).kind_name(), "List");
        assert_eq!(KeptValue::Map(HashMap::new()).kind_name(), "Map");
        assert_eq!(KeptValue::Table(Table::default()).kind_name(), "Table");
    }

    #[test]
    fn test_int_not_equal_float() {
        assert_ne!(KeptValue::Int(1), KeptValue::Float(1.0));
    }

    #[test]
    fn test_nan_not_equal_nan() {
        assert_ne!(KeptValue::Float(f64::NAN), KeptValue::Float(f64::NAN));
    }

    #[test]
    fn test_negative_zero_equals_zero() {
        assert_eq!(KeptValue::Float(-0.0), KeptValue::Float(0.0));
    }

    #[test]
    fn test_map_equality_key_order_independent() {
        let mut m1 = HashMap::new();
        m1.insert("a".to_string(), KeptValue::Int(1));
        m1.insert("b".to_string(), KeptValue::Int(2));
        let mut m2 = HashMap::new();
        m2.insert("b".to_string(), KeptValue::Int(2));
        m2.insert("a".to_string(), KeptValue::Int(1));
        assert_eq!(KeptValue::Map(m1), KeptValue::Map(m2));
    }

    #[test]
    fn test_from_conversions() {
        assert_eq!(KeptValue::from(42i64), KeptValue::Int(42));
        assert_eq!(KeptValue::from(42i32), KeptValue::Int(42));
        assert_eq!(KeptValue::from(true), KeptValue::Bool(true));
        assert_eq!(KeptValue::from("x"), KeptValue::Str("x".to_string()));
        assert_eq!(KeptValue::from(()), KeptValue::Null);
    }

    #[test]
    fn test_as_wrong_kind_returns_none() {
        let v = KeptValue::Int(42);
        assert!(v.as_bool().is_none());
        assert!(v.as_float().is_none());
        assert!(v.as_str().is_none());
        assert!(v.as_list().is_none());
        assert!(v.as_map().is_none());
        assert!(v.as_table().is_none());
        assert!(v.as_array().is_none());
        assert!(v.as_code().is_none());
    }

    #[test]
    fn test_num_array_len() {
        let a = NumArray::from_ints(vec![2, 3], vec![1, 2, 3, 4, 5, 6]);
        assert_eq!(a.len(), 6);
        assert!(!a.is_empty());
        let e = NumArray::from_floats(vec![0], vec![]);
        assert!(e.is_empty());
    }

    #[test]
    fn test_int_and_float_buffers_never_equal() {
        let a = NumArray::from_ints(vec![2], vec![1, 2]);
        let b = NumArray::from_floats(vec![2], vec![1.0, 2.0]);
        assert_ne!(KeptValue::Array(a), KeptValue::Array(b));
    }

    #[test]
    fn test_table_builder() {
        let t = Table::new(
            vec!["a".to_string(), "b".to_string()],
            vec![vec![KeptValue::Int(1), KeptValue::Int(2)]],
        )
        .with_attr("source", KeptValue::from("unit"));
        assert_eq!(t.columns.len(), 2);
        assert_eq!(t.attrs.get("source"), Some(&KeptValue::from("unit")));
    }

    #[test]
    fn test_code_constructors() {
        let f = Code::function("def f(): pass");
        assert_eq!(f.kind, CodeKind::Function);
        let c = Code::class("class C: pass");
        assert_eq!(c.kind, CodeKind::Class);
        assert_ne!(KeptValue::Code(f), KeptValue::Code(c));
    }
}
