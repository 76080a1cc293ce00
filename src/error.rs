//! Error types for the scripting boundary
//!
//! Shape problems in script output are [`DecodeError`]s and never leave an
//! interface method; they are logged and replaced by a safe default.
//! [`ScriptError`] is a failure of the runtime itself (the scripted call
//! raised, or a value could not be marshaled).

use thiserror::Error;

pub type ScriptResult<T> = Result<T, ScriptError>;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ScriptError {
    #[error("call to `{function}` failed: {message}")]
    Invocation { function: String, message: String },

    #[error("`{0}` is not callable")]
    NotCallable(String),

    #[error("cannot marshal {0} into the scripting runtime")]
    Marshal(String),

    #[error("failed to load device script: {0}")]
    Load(String),

    #[error("scripting runtime unavailable: {0}")]
    Unavailable(String),
}

impl ScriptError {
    pub fn invocation(function: &str, message: impl Into<String>) -> Self {
        ScriptError::Invocation {
            function: function.to_string(),
            message: message.into(),
        }
    }
}

/// A scripted return value that does not have the expected shape.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DecodeError {
    #[error("expected {expected} return value(s), got {got}")]
    Arity { expected: usize, got: usize },

    #[error("expected a record, got {0}")]
    NotRecord(String),

    #[error("record {record} has length {len}, expected {expected}")]
    Length {
        record: String,
        len: usize,
        expected: &'static str,
    },

    #[error("field `{field}` has wrong type: {value}")]
    Type { field: &'static str, value: String },

    #[error("field `{field}` out of range: {value}")]
    Range { field: &'static str, value: String },

    #[error("unknown pin direction `{0}`")]
    Direction(String),

    #[error("unsupported frame data type `{0}`, only `rgba` is accepted")]
    DataType(String),
}

#[derive(Debug, Error)]
pub enum HostError {
    #[error(transparent)]
    Script(#[from] ScriptError),

    #[error("unknown device class `{0}`")]
    UnknownClass(String),

    #[error("device id `{0}` is already in use")]
    DuplicateId(String),

    #[error("device script has no string `classname` field")]
    MissingClassname,
}

pub type HostResult<T> = Result<T, HostError>;
