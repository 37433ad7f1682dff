//! Path expressions for partial document access
//!
//! This module defines:
//! - PathStep: One field-name or index component of a parsed path
//! - parse_path: Path string → ordered step list
//! - Target / resolve_target: Step list → (parent, last step) mutation target
//! - set_at / array_len / array_append: The operation shapes built on top
//!
//! # Path Syntax
//!
//! | Syntax | Meaning | Example |
//! |--------|---------|---------|
//! | `$` | Root marker, whole document | `$` |
//! | `.key` | Object field | `$.user` |
//! | `[n]` | Array index after a field | `$.items[0]` |
//! | `[n][m]` | Consecutive indexes | `$.grid[1][2]` |
//!
//! The root marker is never part of the resulting step list; `$` alone parses
//! to zero steps and addresses the whole document.

use serde_json::Value;
use thiserror::Error;

/// Error type for path parsing and resolution
///
/// Parse failures and resolution failures share one type because callers see
/// them the same way: the path does not fit the stored document.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PathError {
    /// Path does not start with the `$` root marker
    #[error("path must start with '$': '{0}'")]
    MissingRoot(String),

    /// A segment could not be parsed into field/index steps
    #[error("malformed path segment '{0}'")]
    Malformed(String),

    /// An intermediate or final field does not exist in the document
    #[error("missing field '{0}'")]
    MissingField(String),

    /// An index step points past the end of the array it walked into
    #[error("index {index} out of range for array of length {len}")]
    IndexOutOfRange {
        /// The requested index
        index: usize,
        /// The array length
        len: usize,
    },

    /// A step walked into a value that is neither object nor array
    #[error("cannot apply step '{step}' to {found}")]
    NotAContainer {
        /// JSON type name of the value found
        found: &'static str,
        /// Display form of the offending step
        step: String,
    },
}

/// One component of a parsed path
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathStep {
    /// Object field access by name
    Field(String),
    /// Array element access by non-negative index
    Index(usize),
}

impl std::fmt::Display for PathStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PathStep::Field(k) => write!(f, ".{}", k),
            PathStep::Index(i) => write!(f, "[{}]", i),
        }
    }
}

/// Parse a path expression into an ordered step list
///
/// Splits on `.`, drops the leading `$` root segment, and turns every other
/// segment into a field step followed by one index step per bracketed digit
/// group. Bracket groups directly on the root segment (`$[0]`) emit index
/// steps without a field step.
///
/// # Examples
///
/// ```
/// use keepvar_core::path::{parse_path, PathStep};
///
/// let steps = parse_path("$.a.b[2].c").unwrap();
/// assert_eq!(
///     steps,
///     vec![
///         PathStep::Field("a".to_string()),
///         PathStep::Field("b".to_string()),
///         PathStep::Index(2),
///         PathStep::Field("c".to_string()),
///     ]
/// );
///
/// assert!(parse_path("$").unwrap().is_empty());
/// ```
pub fn parse_path(path: &str) -> Result<Vec<PathStep>, PathError> {
    let mut segments = path.split('.');

    // The first segment carries the root marker, optionally with brackets.
    let root = segments.next().unwrap_or("");
    let Some(root_rest) = root.strip_prefix('$') else {
        return Err(PathError::MissingRoot(path.to_string()));
    };

    let mut steps = Vec::new();
    parse_brackets(root, root_rest, &mut steps)?;

    for segment in segments {
        let (name, rest) = match segment.find('[') {
            Some(pos) => segment.split_at(pos),
            None => (segment, ""),
        };
        if name.is_empty() || name.contains(']') {
            return Err(PathError::Malformed(segment.to_string()));
        }
        steps.push(PathStep::Field(name.to_string()));
        parse_brackets(segment, rest, &mut steps)?;
    }

    Ok(steps)
}

/// Parse zero or more `[digits]` groups at the tail of a segment
fn parse_brackets(segment: &str, mut rest: &str, steps: &mut Vec<PathStep>) -> Result<(), PathError> {
    while !rest.is_empty() {
        let inner = rest
            .strip_prefix('[')
            .and_then(|r| r.split_once(']'))
            .ok_or_else(|| PathError::Malformed(segment.to_string()))?;
        let (digits, tail) = inner;
        let index = digits
            .parse::<usize>()
            .map_err(|_| PathError::Malformed(segment.to_string()))?;
        steps.push(PathStep::Index(index));
        rest = tail;
    }
    Ok(())
}

/// Mutation target produced by [`resolve_target`]
///
/// `Root` means the path had zero steps and the whole document is the target.
/// `Slot` carries a live reference to the parent container plus the final
/// step; writing through it mutates the stored document directly.
#[derive(Debug)]
pub enum Target<'a> {
    /// Whole-document replace
    Root,
    /// A single field or index inside `parent`
    Slot {
        /// Live reference to the container one level above the target
        parent: &'a mut Value,
        /// The final step to apply to `parent`
        step: PathStep,
    },
}

/// Resolve all but the final step, returning the mutation target
///
/// The walk indexes into objects by field name and into arrays by integer
/// index, holding live mutable references the whole way down; there are no
/// defensive copies, so a subsequent write through the target is observed by
/// the document passed in.
pub fn resolve_target<'a>(doc: &'a mut Value, steps: &[PathStep]) -> Result<Target<'a>, PathError> {
    let Some((last, walk)) = steps.split_last() else {
        return Ok(Target::Root);
    };
    let mut current = doc;
    for step in walk {
        current = descend_mut(current, step)?;
    }
    Ok(Target::Slot {
        parent: current,
        step: last.clone(),
    })
}

/// Apply one step to a mutable reference
fn descend_mut<'a>(value: &'a mut Value, step: &PathStep) -> Result<&'a mut Value, PathError> {
    match step {
        PathStep::Field(name) => match value {
            Value::Object(map) => map
                .get_mut(name)
                .ok_or_else(|| PathError::MissingField(name.clone())),
            other => Err(PathError::NotAContainer {
                found: json_type_name(other),
                step: step_display(step),
            }),
        },
        PathStep::Index(index) => match value {
            Value::Array(arr) => {
                let len = arr.len();
                arr.get_mut(*index)
                    .ok_or(PathError::IndexOutOfRange { index: *index, len })
            }
            other => Err(PathError::NotAContainer {
                found: json_type_name(other),
                step: step_display(step),
            }),
        },
    }
}

/// Apply one step to an immutable reference
fn descend<'a>(value: &'a Value, step: &PathStep) -> Result<&'a Value, PathError> {
    match step {
        PathStep::Field(name) => match value {
            Value::Object(map) => map
                .get(name)
                .ok_or_else(|| PathError::MissingField(name.clone())),
            other => Err(PathError::NotAContainer {
                found: json_type_name(other),
                step: step_display(step),
            }),
        },
        PathStep::Index(index) => match value {
            Value::Array(arr) => arr.get(*index).ok_or(PathError::IndexOutOfRange {
                index: *index,
                len: arr.len(),
            }),
            other => Err(PathError::NotAContainer {
                found: json_type_name(other),
                step: step_display(step),
            }),
        },
    }
}

/// Read the value addressed by the full step list
pub fn value_at<'a>(doc: &'a Value, steps: &[PathStep]) -> Result<&'a Value, PathError> {
    let mut current = doc;
    for step in steps {
        current = descend(current, step)?;
    }
    Ok(current)
}

/// Mutable access to the value addressed by the full step list
pub fn value_at_mut<'a>(doc: &'a mut Value, steps: &[PathStep]) -> Result<&'a mut Value, PathError> {
    let mut current = doc;
    for step in steps {
        current = descend_mut(current, step)?;
    }
    Ok(current)
}

/// Point mutation: set the addressed field or index to `value`
///
/// A final field step may create the field; a final index step must land
/// inside the existing array. Intermediate steps must exist.
pub fn set_at(doc: &mut Value, steps: &[PathStep], value: Value) -> Result<(), PathError> {
    if steps.is_empty() {
        *doc = value;
        return Ok(());
    }
    match resolve_target(doc, steps)? {
        Target::Root => unreachable!("empty step list handled above"),
        Target::Slot { parent, step } => match &step {
            PathStep::Field(name) => match parent {
                Value::Object(map) => {
                    map.insert(name.clone(), value);
                    Ok(())
                }
                other => Err(PathError::NotAContainer {
                    found: json_type_name(other),
                    step: step_display(&step),
                }),
            },
            PathStep::Index(index) => match parent {
                Value::Array(arr) => {
                    let len = arr.len();
                    match arr.get_mut(*index) {
                        Some(slot) => {
                            *slot = value;
                            Ok(())
                        }
                        None => Err(PathError::IndexOutOfRange { index: *index, len }),
                    }
                }
                other => Err(PathError::NotAContainer {
                    found: json_type_name(other),
                    step: step_display(&step),
                }),
            },
        },
    }
}

/// Length query: number of elements of the sequence at the path
///
/// An empty step list reports the length of the whole document. Objects
/// report their key count so a whole-document query on a mapping works.
pub fn array_len(doc: &Value, steps: &[PathStep]) -> Result<usize, PathError> {
    match value_at(doc, steps)? {
        Value::Array(arr) => Ok(arr.len()),
        Value::Object(map) => Ok(map.len()),
        other => Err(PathError::NotAContainer {
            found: json_type_name(other),
            step: "len".to_string(),
        }),
    }
}

/// Append: extend the sequence at the path, returning its new length
pub fn array_append(
    doc: &mut Value,
    steps: &[PathStep],
    items: Vec<Value>,
) -> Result<usize, PathError> {
    match value_at_mut(doc, steps)? {
        Value::Array(arr) => {
            arr.extend(items);
            Ok(arr.len())
        }
        other => Err(PathError::NotAContainer {
            found: json_type_name(other),
            step: "append".to_string(),
        }),
    }
}

/// JSON type name for error messages
fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn step_display(step: &PathStep) -> String {
    step.to_string()
}
