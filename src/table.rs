//! In-process table runtime
//!
//! A closure-backed implementation of the scripting seam. Native hosts use it
//! to provide devices written in Rust; the test suites use it to feed
//! arbitrary (including malformed) script output through the adapters.

use std::cell::{Cell, RefCell};
use std::collections::{BTreeSet, HashMap};
use std::rc::Rc;

use crate::env::{ScriptEnv, ScriptRuntime};
use crate::error::{ScriptError, ScriptResult};
use crate::value::ScriptValue;

pub type NativeFn = Rc<dyn Fn(&[ScriptValue]) -> ScriptResult<Vec<ScriptValue>>>;

#[derive(Clone)]
enum Slot {
    Value(ScriptValue),
    Function(NativeFn),
}

/// A device environment backed by a name → slot table.
#[derive(Clone, Default)]
pub struct TableEnv {
    slots: RefCell<HashMap<String, Slot>>,
}

impl TableEnv {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_classname(classname: &str) -> Self {
        Self::new().field("classname", classname)
    }

    pub fn field(self, name: &str, value: impl Into<ScriptValue>) -> Self {
        self.set_field(name, value);
        self
    }

    pub fn function<F>(self, name: &str, f: F) -> Self
    where
        F: Fn(&[ScriptValue]) -> ScriptResult<Vec<ScriptValue>> + 'static,
    {
        self.slots
            .borrow_mut()
            .insert(name.to_string(), Slot::Function(Rc::new(f)));
        self
    }

    pub fn set_field(&self, name: &str, value: impl Into<ScriptValue>) {
        self.slots
            .borrow_mut()
            .insert(name.to_string(), Slot::Value(value.into()));
    }

    pub fn remove(&self, name: &str) {
        self.slots.borrow_mut().remove(name);
    }
}

impl ScriptEnv for TableEnv {
    fn get(&self, name: &str) -> ScriptValue {
        match self.slots.borrow().get(name) {
            Some(Slot::Value(v)) => v.clone(),
            Some(Slot::Function(_)) => ScriptValue::Function,
            None => ScriptValue::Nil,
        }
    }

    fn call(&self, name: &str, args: &[ScriptValue]) -> ScriptResult<Vec<ScriptValue>> {
        // Clone out of the borrow so the callee may touch the table.
        let slot = self.slots.borrow().get(name).cloned();
        match slot {
            Some(Slot::Function(f)) => f(args),
            Some(Slot::Value(v)) if !v.is_nil() => Err(ScriptError::NotCallable(name.to_string())),
            _ => Err(ScriptError::invocation(name, "attempt to call a nil value")),
        }
    }
}

type EnvFactory = Box<dyn Fn() -> TableEnv>;

/// A runtime whose "scripts" are named factories of [`TableEnv`]s.
#[derive(Default)]
pub struct TableRuntime {
    scripts: RefCell<HashMap<String, EnvFactory>>,
    globals: RefCell<BTreeSet<String>>,
    pixel_definitions: Cell<usize>,
}

impl TableRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `source` loadable; each load calls `factory` for a fresh env.
    pub fn add_script<F>(&self, source: &str, factory: F)
    where
        F: Fn() -> TableEnv + 'static,
    {
        self.scripts
            .borrow_mut()
            .insert(source.to_string(), Box::new(factory));
    }

    /// How many times the Pixel type was defined on this runtime.
    pub fn pixel_definitions(&self) -> usize {
        self.pixel_definitions.get()
    }

    pub fn has_global(&self, name: &str) -> bool {
        self.globals.borrow().contains(name)
    }
}

const PIXEL_GLOBAL: &str = "graphbuf.Pixel";

impl ScriptRuntime for TableRuntime {
    fn load_device(&self, source: &str) -> ScriptResult<Rc<dyn ScriptEnv>> {
        let scripts = self.scripts.borrow();
        let factory = scripts
            .get(source)
            .ok_or_else(|| ScriptError::Load(format!("no script named `{}`", source)))?;
        Ok(Rc::new(factory()))
    }

    fn pixel_constructible(&self) -> bool {
        self.has_global(PIXEL_GLOBAL)
    }

    fn define_pixel(&self) -> ScriptResult<()> {
        let mut globals = self.globals.borrow_mut();
        if !globals.insert(PIXEL_GLOBAL.to_string()) {
            return Err(ScriptError::Load(format!("{} is already bound", PIXEL_GLOBAL)));
        }
        self.pixel_definitions.set(self.pixel_definitions.get() + 1);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_get_and_call() {
        let env = TableEnv::with_classname("button")
            .function("getPin", |args| Ok(vec![ScriptValue::Boolean(args.len() == 1)]));

        assert_eq!(env.get("classname"), ScriptValue::from("button"));
        assert!(env.get("getPin").is_function());
        assert!(env.get("setPin").is_nil());
        assert_eq!(
            env.call("getPin", &[ScriptValue::Integer(1)]),
            Ok(vec![ScriptValue::Boolean(true)])
        );
        assert!(env.call("setPin", &[]).is_err());
        assert_eq!(
            env.call("classname", &[]),
            Err(ScriptError::NotCallable("classname".into()))
        );
        assert_eq!(env.describe(), "<button env>");
    }

    #[test]
    fn test_runtime_loads_fresh_envs() {
        let runtime = TableRuntime::new();
        runtime.add_script("led", || TableEnv::with_classname("led"));

        let a = runtime.load_device("led").unwrap();
        let b = runtime.load_device("led").unwrap();
        assert_eq!(a.get("classname"), b.get("classname"));
        assert!(runtime.load_device("missing").is_err());
    }

    #[test]
    fn test_define_pixel_rejects_rebinding() {
        let runtime = TableRuntime::new();
        assert!(!runtime.pixel_constructible());
        runtime.define_pixel().unwrap();
        assert!(runtime.pixel_constructible());
        assert!(runtime.define_pixel().is_err());
        assert_eq!(runtime.pixel_definitions(), 1);
    }
}
