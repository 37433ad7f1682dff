//! Value codec: KeptValue ⇄ JSON envelope
//!
//! Every stored value travels as a JSON string. JSON-native kinds (null,
//! bool, numbers, strings, lists, maps) pass through as bare JSON; the
//! remaining kinds are wrapped in a tagged object carrying an `object_type`
//! marker. The tag strings are part of the wire contract and must not change.
//!
//! | Kind | Envelope |
//! |------|----------|
//! | Null | `{"object_type":"NoneType"}` |
//! | Table | `{"columns":[..],"data":[[..]],"attrs":{..},"object_type":"pd.DataFrame"}` |
//! | Array | `{"data":[nested row-major lists],"object_type":"np.ndarray"}` |
//! | Timestamp | `{"data":"YYYY-MM-DD HH:MM:SS","object_type":"datetime.datetime"}` |
//! | Code | `{"code":"<source>","object_type":"function"\|"class"}` |
//!
//! Timestamp encoding truncates sub-second precision; this is lossy and
//! deliberate. Code values store source text only: decode returns the text
//! unchanged and nothing here ever evaluates it.
//!
//! Decoding is total. Input that is not valid JSON is returned unchanged as a
//! plain string value, because untagged scalars are valid stored values. A
//! tagged envelope whose payload does not match its tag decodes to the plain
//! mapping it literally is.

use crate::error::{Error, Result};
use crate::value::{Code, CodeKind, KeptValue, NumArray, NumData, Table};
use chrono::NaiveDateTime;
use serde_json::{json, Map, Value};
use std::collections::HashMap;

/// Envelope field holding the kind tag
pub const OBJECT_TYPE_KEY: &str = "object_type";

/// Wire format of encoded timestamps, second granularity
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const TAG_NONE: &str = "NoneType";
const TAG_TABLE: &str = "pd.DataFrame";
const TAG_NDARRAY: &str = "np.ndarray";
const TAG_DATETIME: &str = "datetime.datetime";
const TAG_FUNCTION: &str = "function";
const TAG_CLASS: &str = "class";

/// Out-of-band inputs to [`encode`]
///
/// Code kinds cannot carry an executable unit through the codec, so the
/// caller supplies the source text here (or inline on the value itself).
#[derive(Debug, Clone, Default)]
pub struct EncodeHints {
    /// Source text for a function/class value, overriding the value's own
    pub code: Option<String>,
}

impl EncodeHints {
    /// No hints
    pub fn none() -> Self {
        EncodeHints::default()
    }

    /// Hints carrying code source text
    pub fn with_code(source: impl Into<String>) -> Self {
        EncodeHints {
            code: Some(source.into()),
        }
    }
}

/// Encode a value into its JSON envelope string
pub fn encode(value: &KeptValue, hints: &EncodeHints) -> Result<String> {
    let wire = to_wire(value, hints)?;
    serde_json::to_string(&wire).map_err(Into::into)
}

/// Decode an envelope string back into a value
///
/// Never fails: invalid JSON is an untagged scalar and comes back as
/// `KeptValue::Str` holding the raw input.
pub fn decode(input: &str) -> KeptValue {
    match serde_json::from_str::<Value>(input) {
        Ok(wire) => from_wire(wire),
        Err(_) => KeptValue::Str(input.to_string()),
    }
}

/// Decode an already-parsed JSON document
///
/// Used where the remote client hands back a document instead of raw text.
pub fn decode_value(wire: Value) -> KeptValue {
    from_wire(wire)
}

// Exhaustive over the closed kind set: a new KeptValue variant fails to
// compile until it gets an arm here and in from_wire.
fn to_wire(value: &KeptValue, hints: &EncodeHints) -> Result<Value> {
    Ok(match value {
        KeptValue::Null => json!({ (OBJECT_TYPE_KEY): TAG_NONE }),
        KeptValue::Bool(b) => Value::Bool(*b),
        KeptValue::Int(i) => json!(i),
        KeptValue::Float(f) => json!(f),
        KeptValue::Str(s) => Value::String(s.clone()),
        KeptValue::List(items) => Value::Array(
            items
                .iter()
                .map(|v| to_wire(v, hints))
                .collect::<Result<Vec<_>>>()?,
        ),
        KeptValue::Map(entries) => {
            let mut obj = Map::new();
            for (k, v) in entries {
                obj.insert(k.clone(), to_wire(v, hints)?);
            }
            Value::Object(obj)
        }
        KeptValue::Table(table) => {
            let rows = table
                .rows
                .iter()
                .map(|row| {
                    row.iter()
                        .map(|cell| to_wire(cell, hints))
                        .collect::<Result<Vec<_>>>()
                        .map(Value::Array)
                })
                .collect::<Result<Vec<_>>>()?;
            let mut attrs = Map::new();
            for (k, v) in &table.attrs {
                attrs.insert(k.clone(), to_wire(v, hints)?);
            }
            json!({
                "columns": table.columns,
                "data": rows,
                "attrs": attrs,
                (OBJECT_TYPE_KEY): TAG_TABLE,
            })
        }
        KeptValue::Array(array) => json!({
            "data": nest_array(array),
            (OBJECT_TYPE_KEY): TAG_NDARRAY,
        }),
        KeptValue::Timestamp(ts) => json!({
            "data": ts.format(TIMESTAMP_FORMAT).to_string(),
            (OBJECT_TYPE_KEY): TAG_DATETIME,
        }),
        KeptValue::Code(code) => {
            let source = match (&hints.code, code.source.is_empty()) {
                (Some(override_src), _) => override_src.clone(),
                (None, false) => code.source.clone(),
                (None, true) => {
                    return Err(Error::MissingCode {
                        kind: match code.kind {
                            CodeKind::Function => TAG_FUNCTION,
                            CodeKind::Class => TAG_CLASS,
                        },
                    })
                }
            };
            let tag = match code.kind {
                CodeKind::Function => TAG_FUNCTION,
                CodeKind::Class => TAG_CLASS,
            };
            json!({ "code": source, (OBJECT_TYPE_KEY): tag })
        }
    })
}

fn from_wire(wire: Value) -> KeptValue {
    match wire {
        Value::Null => KeptValue::Null,
        Value::Bool(b) => KeptValue::Bool(b),
        Value::Number(n) => match n.as_i64() {
            Some(i) => KeptValue::Int(i),
            None => KeptValue::Float(n.as_f64().unwrap_or(0.0)),
        },
        Value::String(s) => KeptValue::Str(s),
        Value::Array(items) => KeptValue::List(items.into_iter().map(from_wire).collect()),
        Value::Object(obj) => {
            if let Some(tag) = obj.get(OBJECT_TYPE_KEY).and_then(Value::as_str) {
                if let Some(revived) = revive_tagged(tag, &obj) {
                    return revived;
                }
            }
            KeptValue::Map(obj.into_iter().map(|(k, v)| (k, from_wire(v))).collect())
        }
    }
}

/// Reconstruct a tagged envelope; None falls back to the plain mapping
fn revive_tagged(tag: &str, obj: &Map<String, Value>) -> Option<KeptValue> {
    match tag {
        TAG_NONE => Some(KeptValue::Null),
        TAG_TABLE => {
            let columns = obj
                .get("columns")?
                .as_array()?
                .iter()
                .map(|c| c.as_str().map(str::to_string))
                .collect::<Option<Vec<_>>>()?;
            let rows = obj
                .get("data")?
                .as_array()?
                .iter()
                .map(|row| {
                    row.as_array()
                        .map(|cells| cells.iter().cloned().map(from_wire).collect())
                })
                .collect::<Option<Vec<Vec<_>>>>()?;
            let attrs: HashMap<String, KeptValue> = match obj.get("attrs") {
                Some(Value::Object(m)) => m
                    .iter()
                    .map(|(k, v)| (k.clone(), from_wire(v.clone())))
                    .collect(),
                _ => HashMap::new(),
            };
            Some(KeptValue::Table(Table {
                columns,
                rows,
                attrs,
            }))
        }
        TAG_NDARRAY => revive_array(obj.get("data")?),
        TAG_DATETIME => {
            let text = obj.get("data")?.as_str()?;
            let ts = NaiveDateTime::parse_from_str(text, TIMESTAMP_FORMAT).ok()?;
            Some(KeptValue::Timestamp(ts))
        }
        TAG_FUNCTION | TAG_CLASS => {
            let source = obj.get("code")?.as_str()?.to_string();
            let kind = if tag == TAG_FUNCTION {
                CodeKind::Function
            } else {
                CodeKind::Class
            };
            Some(KeptValue::Code(Code { kind, source }))
        }
        _ => None,
    }
}

// ============================================================================
// Numeric array nesting / canonicalization
// ============================================================================

/// Flat row-major buffer → nested JSON lists per the shape
fn nest_array(array: &NumArray) -> Value {
    let elems: Vec<Value> = match &array.data {
        NumData::Int(v) => v.iter().map(|&i| json!(i)).collect(),
        NumData::Float(v) => v.iter().map(|&f| json!(f)).collect(),
    };
    nest_values(&array.shape, &elems)
}

fn nest_values(shape: &[usize], elems: &[Value]) -> Value {
    if shape.len() <= 1 {
        return Value::Array(elems.to_vec());
    }
    let inner: usize = shape[1..].iter().product();
    if inner == 0 {
        return Value::Array((0..shape[0]).map(|_| nest_values(&shape[1..], &[])).collect());
    }
    Value::Array(
        elems
            .chunks(inner)
            .map(|chunk| nest_values(&shape[1..], chunk))
            .collect(),
    )
}

/// Growing buffer that widens from i64 to f64 on the first float seen
enum NumBuf {
    Int(Vec<i64>),
    Float(Vec<f64>),
}

impl NumBuf {
    fn push(&mut self, n: &serde_json::Number) -> bool {
        if let Some(i) = n.as_i64() {
            match self {
                NumBuf::Int(v) => v.push(i),
                NumBuf::Float(v) => v.push(i as f64),
            }
            return true;
        }
        let Some(f) = n.as_f64() else { return false };
        if let NumBuf::Int(ints) = self {
            let mut widened: Vec<f64> = ints.iter().map(|&i| i as f64).collect();
            widened.push(f);
            *self = NumBuf::Float(widened);
        } else if let NumBuf::Float(v) = self {
            v.push(f);
        }
        true
    }
}

/// Nested JSON lists → canonical NumArray
///
/// The shape is re-inferred from the nesting; ragged or non-numeric data
/// bails out so the caller keeps the envelope as a plain mapping.
fn revive_array(data: &Value) -> Option<KeptValue> {
    let shape = infer_shape(data);
    let mut buf = NumBuf::Int(Vec::new());
    if !collect_numbers(data, 0, &shape, &mut buf) {
        return None;
    }
    let array = match buf {
        NumBuf::Int(v) => NumArray::from_ints(shape, v),
        NumBuf::Float(v) => NumArray::from_floats(shape, v),
    };
    Some(KeptValue::Array(array))
}

fn infer_shape(value: &Value) -> Vec<usize> {
    let mut shape = Vec::new();
    let mut current = value;
    while let Value::Array(arr) = current {
        shape.push(arr.len());
        match arr.first() {
            Some(first) => current = first,
            None => break,
        }
    }
    shape
}

fn collect_numbers(value: &Value, depth: usize, shape: &[usize], buf: &mut NumBuf) -> bool {
    if depth == shape.len() {
        return match value {
            Value::Number(n) => buf.push(n),
            _ => false,
        };
    }
    match value {
        Value::Array(arr) if arr.len() == shape[depth] => arr
            .iter()
            .all(|child| collect_numbers(child, depth + 1, shape, buf)),
        _ => false,
    }
}
