//! Seams to the scripting runtime
//!
//! A backend implements [`ScriptRuntime`] once per interpreter instance and
//! hands out one [`ScriptEnv`] per loaded device script.

use std::rc::Rc;

use crate::error::ScriptResult;
use crate::value::ScriptValue;

/// One device's scripted environment.
pub trait ScriptEnv {
    /// Field lookup. Callables come back as `ScriptValue::Function`,
    /// missing names as `ScriptValue::Nil`.
    fn get(&self, name: &str) -> ScriptValue;

    /// Invoke a callable field synchronously. The result is the full list
    /// of returned values.
    fn call(&self, name: &str, args: &[ScriptValue]) -> ScriptResult<Vec<ScriptValue>>;

    /// Short description used in diagnostics.
    fn describe(&self) -> String {
        match self.get("classname") {
            ScriptValue::String(name) => format!("<{} env>", name),
            _ => "<anonymous env>".to_string(),
        }
    }

    fn has_function(&self, name: &str) -> bool {
        self.get(name).is_function()
    }
}

/// One scripting runtime instance, shared by every device loaded into it.
pub trait ScriptRuntime {
    /// Evaluate a device script and return its fresh environment.
    fn load_device(&self, source: &str) -> ScriptResult<Rc<dyn ScriptEnv>>;

    /// Probe: does `graphbuf.Pixel(0, 0, 0, 0)` produce a usable value?
    fn pixel_constructible(&self) -> bool;

    /// Register the Pixel type, its channel fields and constructor under the
    /// `graphbuf` namespace. Must not be repeated on the same runtime.
    fn define_pixel(&self) -> ScriptResult<()>;
}
