//! Capability detection
//!
//! Decides from the shape of a device environment which optional interfaces
//! it can back. Detection runs once, when the device is built.

use serde::Serialize;

use crate::env::ScriptEnv;
use crate::interfaces::{ConfigInterface, GraphbufInterface, PinInterface, SpiInterface};

/// Which capability interfaces a device environment implements.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Capabilities {
    pub pin: bool,
    pub spi: bool,
    pub config: bool,
    pub graphbuf: bool,
}

impl Capabilities {
    pub fn detect(env: &dyn ScriptEnv) -> Self {
        Self {
            pin: PinInterface::implements_interface(env),
            spi: SpiInterface::implements_interface(env),
            config: ConfigInterface::implements_interface(env),
            graphbuf: GraphbufInterface::implements_interface(env),
        }
    }

    pub fn none(&self) -> bool {
        !(self.pin || self.spi || self.config || self.graphbuf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ScriptResult;
    use crate::table::TableEnv;
    use crate::value::ScriptValue;

    fn nop() -> impl Fn(&[ScriptValue]) -> ScriptResult<Vec<ScriptValue>> {
        |_: &[ScriptValue]| -> ScriptResult<Vec<ScriptValue>> { Ok(vec![]) }
    }

    #[test]
    fn test_pin_needs_layout_and_one_accessor() {
        let layout_only = TableEnv::new().function("getPinLayout", nop());
        assert!(!Capabilities::detect(&layout_only).pin);

        let read_only = TableEnv::new()
            .function("getPinLayout", nop())
            .function("getPin", nop());
        assert!(Capabilities::detect(&read_only).pin);

        let write_only = TableEnv::new()
            .function("getPinLayout", nop())
            .function("setPin", nop());
        assert!(Capabilities::detect(&write_only).pin);

        let no_layout = TableEnv::new().function("getPin", nop()).function("setPin", nop());
        assert!(!Capabilities::detect(&no_layout).pin);
    }

    #[test]
    fn test_pin_accessors_must_be_callable() {
        let env = TableEnv::new()
            .function("getPinLayout", nop())
            .field("getPin", true);
        assert!(!Capabilities::detect(&env).pin);
    }

    #[test]
    fn test_spi_and_graphbuf() {
        let env = TableEnv::new()
            .function("receiveSPI", nop())
            .function("getGraphBufferLayout", nop());
        let caps = Capabilities::detect(&env);
        assert!(caps.spi);
        assert!(caps.graphbuf);
        assert!(!caps.pin);
        assert!(!caps.config);
    }

    #[test]
    fn test_config_requires_both_halves() {
        let get_only = TableEnv::new().function("getConfig", nop());
        assert!(!Capabilities::detect(&get_only).config);

        let both = TableEnv::new()
            .function("getConfig", nop())
            .function("setConfig", nop());
        assert!(Capabilities::detect(&both).config);
    }

    #[test]
    fn test_empty_env_has_no_capabilities() {
        assert!(Capabilities::detect(&TableEnv::with_classname("blank")).none());
    }
}
