//! Dynamic value space of the scripting runtime
//!
//! Every value crossing the scripting boundary is a [`ScriptValue`]. The
//! accessors here are strict: they answer `None` instead of coercing, so
//! that decoders can reject a value rather than trust it half way.

use std::fmt;

use crate::error::DecodeError;

#[derive(Debug, Clone, PartialEq)]
pub enum ScriptValue {
    Nil,
    Boolean(bool),
    Integer(i64),
    Number(f64),
    String(String),
    /// Ordered sequence (array-like table)
    Record(Vec<ScriptValue>),
    /// Keyed table
    Table(Vec<(String, ScriptValue)>),
    /// Opaque callable
    Function,
    /// Any other runtime object, carrying its type name
    Opaque(String),
}

impl ScriptValue {
    pub fn is_nil(&self) -> bool {
        matches!(self, ScriptValue::Nil)
    }

    pub fn is_function(&self) -> bool {
        matches!(self, ScriptValue::Function)
    }

    pub fn is_number(&self) -> bool {
        matches!(self, ScriptValue::Integer(_) | ScriptValue::Number(_))
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ScriptValue::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// Integer view of a number. Floats qualify only when integral and
    /// representable as `i64`.
    pub fn as_integer(&self) -> Option<i64> {
        match *self {
            ScriptValue::Integer(i) => Some(i),
            ScriptValue::Number(f)
                if f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64 =>
            {
                Some(f as i64)
            }
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ScriptValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_record(&self) -> Option<&[ScriptValue]> {
        match self {
            ScriptValue::Record(items) => Some(items),
            _ => None,
        }
    }

    pub fn type_name(&self) -> &str {
        match self {
            ScriptValue::Nil => "nil",
            ScriptValue::Boolean(_) => "boolean",
            ScriptValue::Integer(_) | ScriptValue::Number(_) => "number",
            ScriptValue::String(_) => "string",
            ScriptValue::Record(_) | ScriptValue::Table(_) => "table",
            ScriptValue::Function => "function",
            ScriptValue::Opaque(name) => name,
        }
    }
}

/// Renders the way a scripting `tostring` would.
impl fmt::Display for ScriptValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScriptValue::Nil => write!(f, "nil"),
            ScriptValue::Boolean(b) => write!(f, "{}", b),
            ScriptValue::Integer(i) => write!(f, "{}", i),
            ScriptValue::Number(n) => write!(f, "{}", n),
            ScriptValue::String(s) => write!(f, "{}", s),
            ScriptValue::Record(items) => {
                write!(f, "{{")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    match item {
                        ScriptValue::String(s) => write!(f, "{:?}", s)?,
                        other => write!(f, "{}", other)?,
                    }
                }
                write!(f, "}}")
            }
            ScriptValue::Table(entries) => {
                write!(f, "{{")?;
                for (i, (k, v)) in entries.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{} = {}", k, v)?;
                }
                write!(f, "}}")
            }
            ScriptValue::Function => write!(f, "function"),
            ScriptValue::Opaque(name) => write!(f, "<{}>", name),
        }
    }
}

impl From<bool> for ScriptValue {
    fn from(b: bool) -> Self {
        ScriptValue::Boolean(b)
    }
}

impl From<i64> for ScriptValue {
    fn from(i: i64) -> Self {
        ScriptValue::Integer(i)
    }
}

impl From<u32> for ScriptValue {
    fn from(i: u32) -> Self {
        ScriptValue::Integer(i as i64)
    }
}

impl From<u8> for ScriptValue {
    fn from(i: u8) -> Self {
        ScriptValue::Integer(i as i64)
    }
}

impl From<f64> for ScriptValue {
    fn from(n: f64) -> Self {
        ScriptValue::Number(n)
    }
}

impl From<&str> for ScriptValue {
    fn from(s: &str) -> Self {
        ScriptValue::String(s.to_string())
    }
}

impl From<String> for ScriptValue {
    fn from(s: String) -> Self {
        ScriptValue::String(s)
    }
}

impl<T: Into<ScriptValue>> From<Vec<T>> for ScriptValue {
    fn from(items: Vec<T>) -> Self {
        ScriptValue::Record(items.into_iter().map(Into::into).collect())
    }
}

/// Builds a `ScriptValue::Record` from heterogeneous items.
#[macro_export]
macro_rules! record {
    ($($item:expr),* $(,)?) => {
        $crate::value::ScriptValue::Record(vec![$($crate::value::ScriptValue::from($item)),*])
    };
}

// ============================================================================
// Decode helpers shared by the interfaces
// ============================================================================

/// Require a multi-value return to hold exactly one value.
pub(crate) fn single(values: &[ScriptValue]) -> Result<&ScriptValue, DecodeError> {
    match values {
        [value] => Ok(value),
        _ => Err(DecodeError::Arity {
            expected: 1,
            got: values.len(),
        }),
    }
}

/// Require a record whose length lies in `min..=max`.
pub(crate) fn record_of<'a>(
    value: &'a ScriptValue,
    min: usize,
    max: usize,
    expected: &'static str,
) -> Result<&'a [ScriptValue], DecodeError> {
    let items = value
        .as_record()
        .ok_or_else(|| DecodeError::NotRecord(value.to_string()))?;
    if items.len() < min || items.len() > max {
        return Err(DecodeError::Length {
            record: value.to_string(),
            len: items.len(),
            expected,
        });
    }
    Ok(items)
}

/// Integer field constrained to `u32`.
pub(crate) fn u32_field(value: &ScriptValue, field: &'static str) -> Result<u32, DecodeError> {
    let raw = value.as_integer().ok_or_else(|| DecodeError::Type {
        field,
        value: value.to_string(),
    })?;
    u32::try_from(raw).map_err(|_| DecodeError::Range {
        field,
        value: raw.to_string(),
    })
}
