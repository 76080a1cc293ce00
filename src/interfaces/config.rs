//! Configuration interface
//!
//! Key/value state exchange. Values are integers or booleans; anything else
//! coming back from the script is dropped entry by entry.

use std::collections::HashMap;
use std::rc::Rc;

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::env::ScriptEnv;
use crate::error::DecodeError;
use crate::value::{record_of, ScriptValue};

pub const GET_CONFIG: &str = "getConfig";
pub const SET_CONFIG: &str = "setConfig";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConfigElement {
    Integer(i64),
    Boolean(bool),
}

impl ConfigElement {
    /// The integer handed to `setConfig` for this element. Booleans are
    /// written as 0/1, so they read back as integers.
    pub fn forwarded_integer(&self) -> i64 {
        match *self {
            ConfigElement::Integer(i) => i,
            ConfigElement::Boolean(b) => b as i64,
        }
    }
}

/// Name → value snapshot. Order carries no meaning.
pub type Config = HashMap<String, ConfigElement>;

/// Decode one `{name, value}` pair.
pub fn decode_config_entry(entry: &ScriptValue) -> Result<(String, ConfigElement), DecodeError> {
    let fields = record_of(entry, 2, 2, "2")?;
    let name = fields[0].as_str().ok_or_else(|| DecodeError::Type {
        field: "config name",
        value: fields[0].to_string(),
    })?;
    let value = &fields[1];
    let elem = match value {
        ScriptValue::Boolean(b) => ConfigElement::Boolean(*b),
        v if v.is_number() => ConfigElement::Integer(v.as_integer().ok_or_else(|| DecodeError::Type {
            field: "config value",
            value: v.to_string(),
        })?),
        other => {
            return Err(DecodeError::Type {
                field: "config value",
                value: format!("{} ({})", other, other.type_name()),
            })
        }
    };
    Ok((name.to_string(), elem))
}

pub struct ConfigInterface {
    env: Rc<dyn ScriptEnv>,
}

impl ConfigInterface {
    pub fn new(env: Rc<dyn ScriptEnv>) -> Self {
        if !Self::implements_interface(env.as_ref()) {
            warn!("device {} not implementing config interface", env.describe());
        }
        Self { env }
    }

    /// Both halves must be present; a read-only config is not accepted.
    pub fn implements_interface(env: &dyn ScriptEnv) -> bool {
        !env.get(GET_CONFIG).is_nil() && !env.get(SET_CONFIG).is_nil()
    }

    pub fn get_config(&self) -> Config {
        let mut config = Config::new();
        let entries = match self.env.call(GET_CONFIG, &[]) {
            Ok(entries) => entries,
            Err(e) => {
                warn!("{}: {}", self.env.describe(), e);
                return config;
            }
        };
        for (i, entry) in entries.iter().enumerate() {
            match decode_config_entry(entry) {
                Ok((name, elem)) => {
                    config.insert(name, elem);
                }
                Err(e) => warn!("config element {} ({}) dropped: {}", i, entry, e),
            }
        }
        config
    }

    /// Hand a snapshot to the script as a `{name = integer}` table.
    /// Returns whether the scripted call completed without error.
    pub fn set_config(&self, config: &Config) -> bool {
        let mut entries: Vec<(String, ScriptValue)> = config
            .iter()
            .map(|(name, elem)| (name.clone(), ScriptValue::Integer(elem.forwarded_integer())))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        debug!("setConfig with {} entries", entries.len());

        match self.env.call(SET_CONFIG, &[ScriptValue::Table(entries)]) {
            Ok(_) => true,
            Err(e) => {
                warn!("{}: {}", self.env.describe(), e);
                false
            }
        }
    }
}
