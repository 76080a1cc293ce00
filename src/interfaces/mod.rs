//! Capability interfaces
//!
//! Each interface wraps one optional contract a device script may implement.
//! A device owns at most one of each, chosen at construction.

pub mod config;
pub mod graphbuf;
pub mod pin;
pub mod spi;

pub use config::{Config, ConfigElement, ConfigInterface};
pub use graphbuf::{FrameLayout, GraphbufInterface, Pixel};
pub use pin::{Direction, PinDesc, PinInterface, PinLayout, PinNumber};
pub use spi::SpiInterface;
