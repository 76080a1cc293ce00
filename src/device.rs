//! Scripted device
//!
//! A device binds one script environment and owns whichever capability
//! interfaces that environment implements. The set is fixed at construction.

use std::rc::Rc;

use log::{info, warn};
use serde::Serialize;

use crate::capability::Capabilities;
use crate::env::ScriptEnv;
use crate::host::{IdLease, ScriptHost};
use crate::interfaces::{ConfigInterface, GraphbufInterface, PinInterface, SpiInterface};

pub const CLASSNAME: &str = "classname";

pub struct Device {
    id: String,
    classname: String,
    capabilities: Capabilities,
    pin: Option<PinInterface>,
    spi: Option<SpiInterface>,
    conf: Option<ConfigInterface>,
    graphbuf: Option<GraphbufInterface>,
    /// Held only for its drop.
    _lease: Option<IdLease>,
}

impl Device {
    pub fn new(id: impl Into<String>, env: Rc<dyn ScriptEnv>, host: &ScriptHost) -> Self {
        let id = id.into();
        let classname = match env.get(CLASSNAME).as_str() {
            Some(name) => name.to_string(),
            None => {
                warn!("device {} has no string `{}` field", id, CLASSNAME);
                "undef".to_string()
            }
        };

        // Detect and create interfaces based on the environment's shape
        let capabilities = Capabilities::detect(env.as_ref());
        let pin = capabilities.pin.then(|| PinInterface::new(env.clone()));
        let spi = capabilities.spi.then(|| SpiInterface::new(env.clone()));
        let conf = capabilities.config.then(|| ConfigInterface::new(env.clone()));
        let graphbuf = capabilities
            .graphbuf
            .then(|| GraphbufInterface::new(env.clone(), host));

        info!("created device {} of class {} with {:?}", id, classname, capabilities);

        Self {
            id,
            classname,
            capabilities,
            pin,
            spi,
            conf,
            graphbuf,
            _lease: None,
        }
    }

    pub(crate) fn attach_lease(&mut self, lease: IdLease) {
        self._lease = Some(lease);
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn classname(&self) -> &str {
        &self.classname
    }

    pub fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    pub fn pin(&self) -> Option<&PinInterface> {
        self.pin.as_ref()
    }

    pub fn spi(&self) -> Option<&SpiInterface> {
        self.spi.as_ref()
    }

    pub fn config(&self) -> Option<&ConfigInterface> {
        self.conf.as_ref()
    }

    pub fn graphbuf(&self) -> Option<&GraphbufInterface> {
        self.graphbuf.as_ref()
    }

    pub fn summary(&self) -> DeviceSummary {
        DeviceSummary {
            id: self.id.clone(),
            classname: self.classname.clone(),
            capabilities: self.capabilities,
        }
    }
}

/// Identity and capability set, as reported to the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceSummary {
    pub id: String,
    pub classname: String,
    pub capabilities: Capabilities,
}
