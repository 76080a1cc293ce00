//! Scripted peripheral devices for the simulator
//!
//! A device's behavior lives in a script; the simulator talks to it through
//! a few typed capability interfaces:
//! - Digital I/O: pin layout, pin read, pin write
//! - Serial transfer: one-byte full-duplex exchange
//! - Configuration: integer / boolean key-value state
//! - Graphics buffer: frame layout, plus the `graphbuf.Pixel` script type
//!
//! Which interfaces a device has is detected once from the shape of its
//! script environment. Everything coming back from a script is decoded
//! strictly; bad output is logged and replaced with a safe default so the
//! simulation keeps running.
//!
//! All calls are synchronous and happen on the simulator's driving thread.

pub mod capability;
pub mod device;
pub mod env;
pub mod error;
pub mod ffi;
pub mod host;
pub mod interfaces;
#[cfg(feature = "ruby")]
pub mod ruby;
pub mod table;
pub mod value;

pub use capability::Capabilities;
pub use device::{Device, DeviceSummary};
pub use env::{ScriptEnv, ScriptRuntime};
pub use error::{DecodeError, HostError, ScriptError};
pub use host::{PixelRegistration, ScriptHost};
pub use interfaces::{
    Config, ConfigElement, ConfigInterface, Direction, FrameLayout, GraphbufInterface, PinDesc,
    PinInterface, PinLayout, PinNumber, Pixel, SpiInterface,
};
pub use table::{TableEnv, TableRuntime};
pub use value::ScriptValue;
