//! Script host
//!
//! A [`ScriptHost`] is the device factory over one scripting runtime. Several
//! hosts may share a runtime: each keeps its own Pixel once-flag, and the
//! runtime probe keeps the Pixel type from being bound twice across them.
//! Device ids are unique per host and are released when the device drops.

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, HashSet};
use std::rc::{Rc, Weak};

use log::{debug, info};
use serde::Serialize;

use crate::device::{Device, CLASSNAME};
use crate::env::ScriptRuntime;
use crate::error::{HostError, HostResult, ScriptResult};

/// How a call to [`ScriptHost::ensure_pixel_format`] was satisfied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PixelRegistration {
    /// This host already ensured it; the runtime was not consulted.
    Cached,
    /// The probe constructor worked, someone else registered it.
    AlreadyPresent,
    /// Registered now.
    Registered,
}

type LiveIds = RefCell<HashSet<String>>;

/// Claim on a device id. Dropping it gives the id back to its host, if the
/// host is still around.
pub(crate) struct IdLease {
    id: String,
    live: Weak<LiveIds>,
}

impl Drop for IdLease {
    fn drop(&mut self) {
        if let Some(live) = self.live.upgrade() {
            live.borrow_mut().remove(&self.id);
        }
    }
}

pub struct ScriptHost {
    runtime: Rc<dyn ScriptRuntime>,
    pixel_format: Cell<bool>,
    classes: RefCell<BTreeMap<String, String>>,
    live_ids: Rc<LiveIds>,
}

impl ScriptHost {
    pub fn new(runtime: Rc<dyn ScriptRuntime>) -> Self {
        Self {
            runtime,
            pixel_format: Cell::new(false),
            classes: RefCell::new(BTreeMap::new()),
            live_ids: Rc::new(RefCell::new(HashSet::new())),
        }
    }

    pub fn runtime(&self) -> &Rc<dyn ScriptRuntime> {
        &self.runtime
    }

    /// Make `graphbuf.Pixel` available in the runtime.
    ///
    /// The flag is per host, so only the first call on this host consults the
    /// runtime. That call probes with `Pixel(0, 0, 0, 0)` first and leaves a
    /// binding made by another host sharing the runtime alone.
    pub fn ensure_pixel_format(&self) -> ScriptResult<PixelRegistration> {
        if self.pixel_format.get() {
            return Ok(PixelRegistration::Cached);
        }
        let outcome = if self.runtime.pixel_constructible() {
            PixelRegistration::AlreadyPresent
        } else {
            debug!("test pixel could not be created, registering graphbuf.Pixel");
            self.runtime.define_pixel()?;
            PixelRegistration::Registered
        };
        self.pixel_format.set(true);
        Ok(outcome)
    }

    /// Load `source` once to learn its class name and remember it.
    /// Registering the same class again replaces the stored source.
    pub fn register_class(&self, source: &str) -> HostResult<String> {
        let env = self.runtime.load_device(source)?;
        let classname = env
            .get(CLASSNAME)
            .as_str()
            .map(str::to_string)
            .ok_or(HostError::MissingClassname)?;
        debug!("registered device class {}", classname);
        self.classes
            .borrow_mut()
            .insert(classname.clone(), source.to_string());
        Ok(classname)
    }

    pub fn available_classes(&self) -> Vec<String> {
        self.classes.borrow().keys().cloned().collect()
    }

    /// Build a new device of a registered class with a fresh environment.
    pub fn instantiate(&self, classname: &str, id: &str) -> HostResult<Device> {
        let source = self
            .classes
            .borrow()
            .get(classname)
            .cloned()
            .ok_or_else(|| HostError::UnknownClass(classname.to_string()))?;
        self.load_device(id, &source)
    }

    /// Build a device straight from a script. The id stays taken until the
    /// device is dropped.
    pub fn load_device(&self, id: &str, source: &str) -> HostResult<Device> {
        if self.live_ids.borrow().contains(id) {
            return Err(HostError::DuplicateId(id.to_string()));
        }
        let env = self.runtime.load_device(source)?;
        let mut device = Device::new(id, env, self);
        self.live_ids.borrow_mut().insert(id.to_string());
        device.attach_lease(IdLease {
            id: id.to_string(),
            live: Rc::downgrade(&self.live_ids),
        });
        Ok(device)
    }

    /// Drop a device. Its id is released by the drop itself.
    pub fn unload(&self, device: Device) {
        info!("unloading device {}", device.id());
        drop(device);
    }

    pub fn is_live(&self, id: &str) -> bool {
        self.live_ids.borrow().contains(id)
    }
}
