//! Digital I/O interface
//!
//! Pin layout discovery plus single-pin read and write against a scripted
//! device. Malformed script output degrades to "no such pin" or a low level.

use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::env::ScriptEnv;
use crate::error::DecodeError;
use crate::value::{record_of, single, u32_field, ScriptValue};

pub const GET_PIN_LAYOUT: &str = "getPinLayout";
pub const GET_PIN: &str = "getPin";
pub const SET_PIN: &str = "setPin";

pub type PinNumber = u32;

/// Pin direction as seen from the device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Input,
    Output,
    Inout,
}

impl Direction {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "input" => Some(Direction::Input),
            "output" => Some(Direction::Output),
            "inout" => Some(Direction::Inout),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Input => "input",
            Direction::Output => "output",
            Direction::Inout => "inout",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PinDesc {
    pub name: String,
    pub dir: Direction,
}

pub const UNNAMED_PIN: &str = "undef";

/// Pin number → descriptor. Keys are unique; a later entry replaces an
/// earlier one with the same number.
pub type PinLayout = BTreeMap<PinNumber, PinDesc>;

/// Decode one `{number, direction[, name]}` layout entry.
pub fn decode_pin_entry(entry: &ScriptValue) -> Result<(PinNumber, PinDesc), DecodeError> {
    let fields = record_of(entry, 2, 3, "2 or 3")?;
    let number = u32_field(&fields[0], "pin number")?;
    let dir = match fields[1].as_str() {
        Some(raw) => Direction::parse(raw).ok_or_else(|| DecodeError::Direction(raw.to_string()))?,
        None => {
            return Err(DecodeError::Type {
                field: "direction",
                value: fields[1].to_string(),
            })
        }
    };
    let name = fields
        .get(2)
        .map(|n| n.to_string())
        .unwrap_or_else(|| UNNAMED_PIN.to_string());
    Ok((number, PinDesc { name, dir }))
}

/// `getPin` must answer with exactly one boolean.
pub fn decode_pin_level(values: &[ScriptValue]) -> Result<bool, DecodeError> {
    let value = single(values)?;
    value.as_bool().ok_or_else(|| DecodeError::Type {
        field: "pin level",
        value: value.to_string(),
    })
}

pub struct PinInterface {
    env: Rc<dyn ScriptEnv>,
}

impl PinInterface {
    pub fn new(env: Rc<dyn ScriptEnv>) -> Self {
        if !Self::implements_interface(env.as_ref()) {
            warn!("device {} not implementing pin interface", env.describe());
        }
        Self { env }
    }

    /// A layout callable plus at least one of read / write.
    pub fn implements_interface(env: &dyn ScriptEnv) -> bool {
        env.has_function(GET_PIN_LAYOUT) && (env.has_function(GET_PIN) || env.has_function(SET_PIN))
    }

    pub fn can_read(&self) -> bool {
        self.env.has_function(GET_PIN)
    }

    pub fn can_write(&self) -> bool {
        self.env.has_function(SET_PIN)
    }

    /// Query the current layout. Not cached: every call asks the script.
    pub fn get_pin_layout(&self) -> PinLayout {
        let mut layout = PinLayout::new();
        let entries = match self.env.call(GET_PIN_LAYOUT, &[]) {
            Ok(entries) => entries,
            Err(e) => {
                warn!("{}: {}", self.env.describe(), e);
                return layout;
            }
        };
        for (i, entry) in entries.iter().enumerate() {
            match decode_pin_entry(entry) {
                Ok((number, desc)) => {
                    debug!("mapping device pin {} ({}, {})", number, desc.name, desc.dir);
                    layout.insert(number, desc);
                }
                Err(e) => warn!("pin layout element {} ({}) is malformed: {}", i, entry, e),
            }
        }
        layout
    }

    /// Read a pin; any failure reads as low.
    pub fn get_pin(&self, num: PinNumber) -> bool {
        let values = match self.env.call(GET_PIN, &[num.into()]) {
            Ok(values) => values,
            Err(e) => {
                warn!("{}: {}", self.env.describe(), e);
                return false;
            }
        };
        decode_pin_level(&values).unwrap_or_else(|e| {
            warn!("{} returned malformed output for pin {}: {}", GET_PIN, num, e);
            false
        })
    }

    /// Drive a pin. Return values are ignored.
    pub fn set_pin(&self, num: PinNumber, val: bool) {
        if let Err(e) = self.env.call(SET_PIN, &[num.into(), val.into()]) {
            warn!("{}: {}", self.env.describe(), e);
        }
    }
}
