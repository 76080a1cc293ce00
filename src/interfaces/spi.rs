//! Serial transfer interface
//!
//! One byte out, one byte back, like a single SPI clock burst.

use std::rc::Rc;

use log::warn;

use crate::env::ScriptEnv;
use crate::error::DecodeError;
use crate::value::{single, ScriptValue};

pub const RECEIVE_SPI: &str = "receiveSPI";

/// The reply must be exactly one integer in byte range.
pub fn decode_spi_reply(values: &[ScriptValue]) -> Result<u8, DecodeError> {
    let value = single(values)?;
    let raw = value.as_integer().ok_or_else(|| DecodeError::Type {
        field: "spi reply",
        value: value.to_string(),
    })?;
    u8::try_from(raw).map_err(|_| DecodeError::Range {
        field: "spi reply",
        value: raw.to_string(),
    })
}

pub struct SpiInterface {
    env: Rc<dyn ScriptEnv>,
}

impl SpiInterface {
    pub fn new(env: Rc<dyn ScriptEnv>) -> Self {
        if !Self::implements_interface(env.as_ref()) {
            warn!("device {} not implementing SPI interface", env.describe());
        }
        Self { env }
    }

    pub fn implements_interface(env: &dyn ScriptEnv) -> bool {
        env.has_function(RECEIVE_SPI)
    }

    /// Exchange one byte. Blocks until the script answers; failures read as 0.
    pub fn send(&self, byte: u8) -> u8 {
        let values = match self.env.call(RECEIVE_SPI, &[byte.into()]) {
            Ok(values) => values,
            Err(e) => {
                warn!("send SPI function failed: {}", e);
                return 0;
            }
        };
        decode_spi_reply(&values).unwrap_or_else(|e| {
            warn!("send SPI function returned invalid reply: {}", e);
            0
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::TableEnv;

    fn spi(reply: Vec<ScriptValue>) -> SpiInterface {
        SpiInterface::new(Rc::new(
            TableEnv::new().function(RECEIVE_SPI, move |_| Ok(reply.clone())),
        ))
    }

    #[test]
    fn test_single_numeric_reply_passes_through() {
        assert_eq!(spi(vec![ScriptValue::Integer(0xA5)]).send(0), 0xA5);
        assert_eq!(spi(vec![ScriptValue::Number(17.0)]).send(0), 17);
    }

    #[test]
    fn test_bad_replies_yield_zero() {
        assert_eq!(spi(vec![]).send(1), 0);
        assert_eq!(spi(vec![ScriptValue::Integer(1), ScriptValue::Integer(2)]).send(1), 0);
        assert_eq!(spi(vec![ScriptValue::from("x")]).send(1), 0);
        assert_eq!(spi(vec![ScriptValue::Integer(256)]).send(1), 0);
        assert_eq!(spi(vec![ScriptValue::Number(1.5)]).send(1), 0);
    }

    #[test]
    fn test_echo_device() {
        let echo = SpiInterface::new(Rc::new(TableEnv::new().function(RECEIVE_SPI, |args| {
            Ok(args.to_vec())
        })));
        for byte in [0u8, 1, 0x7F, 0xFF] {
            assert_eq!(echo.send(byte), byte);
        }
    }

    #[test]
    fn test_runtime_error_yields_zero() {
        let env = TableEnv::new().function(RECEIVE_SPI, |_| {
            Err(crate::error::ScriptError::invocation(RECEIVE_SPI, "bus fault"))
        });
        assert_eq!(SpiInterface::new(Rc::new(env)).send(9), 0);
    }
}
