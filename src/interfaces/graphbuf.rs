//! Graphics buffer interface
//!
//! Frame layout discovery. Building the interface also makes sure the
//! runtime knows the `graphbuf.Pixel` type.

use std::rc::Rc;

use log::warn;
use serde::{Deserialize, Serialize};

use crate::env::ScriptEnv;
use crate::error::DecodeError;
use crate::host::{PixelRegistration, ScriptHost};
use crate::value::{record_of, single, u32_field, ScriptValue};

pub const GET_GRAPH_BUFFER_LAYOUT: &str = "getGraphBufferLayout";

/// The only pixel format understood at the moment.
pub const RGBA: &str = "rgba";

/// One pixel as seen by scripts: `graphbuf.Pixel(r, g, b, a)`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pixel {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Pixel {
    pub const CHANNELS: usize = 4;

    pub fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameLayout {
    pub width: u32,
    pub height: u32,
    pub data_type: String,
}

impl FrameLayout {
    /// Returned whenever the script's answer cannot be trusted.
    pub fn invalid() -> Self {
        Self {
            width: 0,
            height: 0,
            data_type: "invalid".to_string(),
        }
    }

    pub fn is_valid(&self) -> bool {
        self.data_type == RGBA
    }

    /// Size in bytes of a frame with this layout, `None` if it does not
    /// fit in memory.
    pub fn byte_len(&self) -> Option<usize> {
        if !self.is_valid() {
            return Some(0);
        }
        (self.width as usize)
            .checked_mul(self.height as usize)?
            .checked_mul(Pixel::CHANNELS)
    }
}

/// Expect exactly one `{width, height, "rgba"}` record.
pub fn decode_frame_layout(values: &[ScriptValue]) -> Result<FrameLayout, DecodeError> {
    let fields = record_of(single(values)?, 3, 3, "3")?;
    let width = u32_field(&fields[0], "width")?;
    let height = u32_field(&fields[1], "height")?;
    let data_type = fields[2].as_str().ok_or_else(|| DecodeError::Type {
        field: "data type",
        value: fields[2].to_string(),
    })?;
    if data_type != RGBA {
        return Err(DecodeError::DataType(data_type.to_string()));
    }
    Ok(FrameLayout {
        width,
        height,
        data_type: data_type.to_string(),
    })
}

pub struct GraphbufInterface {
    env: Rc<dyn ScriptEnv>,
    registration: Option<PixelRegistration>,
}

impl GraphbufInterface {
    /// Registers the Pixel type on `host`'s runtime if nobody has yet.
    pub fn new(env: Rc<dyn ScriptEnv>, host: &ScriptHost) -> Self {
        if !Self::implements_interface(env.as_ref()) {
            warn!("device {} not implementing graphbuf interface", env.describe());
        }
        let registration = match host.ensure_pixel_format() {
            Ok(registration) => Some(registration),
            Err(e) => {
                warn!("could not register graphbuf.Pixel: {}", e);
                None
            }
        };
        Self { env, registration }
    }

    pub fn implements_interface(env: &dyn ScriptEnv) -> bool {
        env.has_function(GET_GRAPH_BUFFER_LAYOUT)
    }

    /// Outcome of the Pixel registration done at construction, `None` if
    /// it failed.
    pub fn pixel_registration(&self) -> Option<PixelRegistration> {
        self.registration
    }

    pub fn get_layout(&self) -> FrameLayout {
        let values = match self.env.call(GET_GRAPH_BUFFER_LAYOUT, &[]) {
            Ok(values) => values,
            Err(e) => {
                warn!("{}: {}", self.env.describe(), e);
                return FrameLayout::invalid();
            }
        };
        decode_frame_layout(&values).unwrap_or_else(|e| {
            warn!("graphbuf layout malformed: {}", e);
            FrameLayout::invalid()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record;
    use crate::table::{TableEnv, TableRuntime};

    fn graphbuf(reply: Vec<ScriptValue>) -> GraphbufInterface {
        let host = ScriptHost::new(Rc::new(TableRuntime::new()));
        let env = TableEnv::new().function(GET_GRAPH_BUFFER_LAYOUT, move |_| Ok(reply.clone()));
        GraphbufInterface::new(Rc::new(env), &host)
    }

    #[test]
    fn test_rgba_layout() {
        let layout = graphbuf(vec![record![128i64, 64i64, "rgba"]]).get_layout();
        assert_eq!(
            layout,
            FrameLayout {
                width: 128,
                height: 64,
                data_type: "rgba".into()
            }
        );
        assert_eq!(layout.byte_len(), Some(128 * 64 * 4));
    }

    #[test]
    fn test_huge_layout_has_no_byte_len() {
        let max = u32::MAX as i64;
        let layout = graphbuf(vec![record![max, max, "rgba"]]).get_layout();
        assert!(layout.is_valid());
        assert_eq!(layout.width, u32::MAX);
        assert_eq!(layout.byte_len(), None);

        let wide = FrameLayout {
            width: u32::MAX,
            height: 1,
            data_type: RGBA.to_string(),
        };
        assert_eq!(wide.byte_len(), (u32::MAX as usize).checked_mul(Pixel::CHANNELS));
    }

    #[test]
    fn test_other_data_types_are_invalid() {
        for kind in ["rgb", "RGBA", "mono", ""] {
            let layout = graphbuf(vec![record![8i64, 8i64, kind]]).get_layout();
            assert_eq!(layout, FrameLayout::invalid());
            assert_eq!(layout.byte_len(), Some(0));
        }
        let layout = graphbuf(vec![record![8i64, 8i64, 1i64]]).get_layout();
        assert_eq!(layout, FrameLayout::invalid());
    }

    #[test]
    fn test_malformed_layouts_are_invalid() {
        let cases = vec![
            vec![],
            vec![record![8i64, 8i64]],
            vec![record![8i64, 8i64, "rgba", 1i64]],
            vec![record![8i64, 8i64, "rgba"], record![8i64, 8i64, "rgba"]],
            vec![record![-8i64, 8i64, "rgba"]],
            vec![record!["8", 8i64, "rgba"]],
            vec![ScriptValue::from("rgba")],
        ];
        for case in cases {
            assert_eq!(graphbuf(case).get_layout(), FrameLayout::invalid());
        }
    }

    #[test]
    fn test_construction_registers_pixel() {
        let runtime = Rc::new(TableRuntime::new());
        let host = ScriptHost::new(runtime.clone());
        let env: Rc<dyn ScriptEnv> = Rc::new(
            TableEnv::new().function(GET_GRAPH_BUFFER_LAYOUT, |_| Ok(vec![])),
        );

        let first = GraphbufInterface::new(env.clone(), &host);
        let second = GraphbufInterface::new(env, &host);
        assert_eq!(first.pixel_registration(), Some(PixelRegistration::Registered));
        assert_eq!(second.pixel_registration(), Some(PixelRegistration::Cached));
        assert!(runtime.has_global("graphbuf.Pixel"));
        assert_eq!(runtime.pixel_definitions(), 1);
    }
}
