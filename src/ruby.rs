//! Ruby backend for device scripts
//!
//! A device script evaluates to a Hash whose keys (String or Symbol) name
//! fields and callables:
//!
//! ```ruby
//! {
//!   "classname"    => "button",
//!   "getPinLayout" => -> { [[1, "output", "BTN"]] },
//!   "getPin"       => ->(pin) { pressed },
//! }
//! ```
//!
//! Ruby has a single return value, so results are normalized: `nil` is no
//! value, an Array is a list of values (what `return a, b` produces), and
//! anything else is one value.
//!
//! The VM must be embedded by the host (`magnus::embed::init`) and every call
//! must happen on that thread.

use std::cell::Cell;
use std::marker::PhantomData;
use std::rc::Rc;

use log::debug;
use magnus::{
    function, method, prelude::*, r_hash::ForEach, value::BoxValue, Error, Float, Integer, RArray,
    RHash, RString, Ruby, Symbol, Value,
};

use crate::env::{ScriptEnv, ScriptRuntime};
use crate::error::{ScriptError, ScriptResult};
use crate::interfaces::Pixel;
use crate::value::ScriptValue;

fn ruby() -> ScriptResult<Ruby> {
    Ruby::get().map_err(|e| ScriptError::Unavailable(e.to_string()))
}

fn marshal_error(e: Error) -> ScriptError {
    ScriptError::Marshal(e.to_string())
}

// ============================================================================
// Value conversion
// ============================================================================

fn key_string(key: Value) -> String {
    if let Some(s) = RString::from_value(key) {
        if let Ok(s) = s.to_string() {
            return s;
        }
    }
    if let Some(sym) = Symbol::from_value(key) {
        if let Ok(name) = sym.name() {
            return name.into_owned();
        }
    }
    key.inspect()
}

/// Convert a Ruby value into the dynamic value space.
fn from_ruby(ruby: &Ruby, value: Value) -> ScriptValue {
    if value.is_nil() {
        return ScriptValue::Nil;
    }
    if value.is_kind_of(ruby.class_true_class()) {
        return ScriptValue::Boolean(true);
    }
    if value.is_kind_of(ruby.class_false_class()) {
        return ScriptValue::Boolean(false);
    }
    if let Some(i) = Integer::from_value(value) {
        // Bignums do not fit any native field
        return match i.to_i64() {
            Ok(i) => ScriptValue::Integer(i),
            Err(_) => ScriptValue::Opaque("Integer".to_string()),
        };
    }
    if let Some(f) = Float::from_value(value) {
        return ScriptValue::Number(f.to_f64());
    }
    if let Some(s) = RString::from_value(value) {
        return match s.to_string() {
            Ok(s) => ScriptValue::String(s),
            Err(_) => ScriptValue::Opaque("String".to_string()),
        };
    }
    if let Some(sym) = Symbol::from_value(value) {
        return match sym.name() {
            Ok(name) => ScriptValue::String(name.into_owned()),
            Err(_) => ScriptValue::Opaque("Symbol".to_string()),
        };
    }
    if let Some(arr) = RArray::from_value(value) {
        let items = (0..arr.len())
            .map(|i| match arr.entry::<Value>(i as isize) {
                Ok(v) => from_ruby(ruby, v),
                Err(_) => ScriptValue::Nil,
            })
            .collect();
        return ScriptValue::Record(items);
    }
    if let Some(hash) = RHash::from_value(value) {
        let mut entries = Vec::new();
        let walked = hash.foreach(|k: Value, v: Value| {
            entries.push((key_string(k), from_ruby(ruby, v)));
            Ok(ForEach::Continue)
        });
        if walked.is_err() {
            return ScriptValue::Opaque("Hash".to_string());
        }
        return ScriptValue::Table(entries);
    }
    if value.respond_to("call", false).unwrap_or(false) {
        return ScriptValue::Function;
    }
    ScriptValue::Opaque(value.class().inspect())
}

/// Convert an argument for a scripted call into a Ruby value.
fn to_ruby(ruby: &Ruby, value: &ScriptValue) -> ScriptResult<Value> {
    let converted = match value {
        ScriptValue::Nil => ruby.qnil().as_value(),
        ScriptValue::Boolean(b) => ruby.into_value(*b),
        ScriptValue::Integer(i) => ruby.into_value(*i),
        ScriptValue::Number(n) => ruby.into_value(*n),
        ScriptValue::String(s) => ruby.str_new(s).as_value(),
        ScriptValue::Record(items) => {
            let arr = ruby.ary_new_capa(items.len());
            for item in items {
                arr.push(to_ruby(ruby, item)?).map_err(marshal_error)?;
            }
            arr.as_value()
        }
        ScriptValue::Table(entries) => {
            let hash = ruby.hash_new();
            for (k, v) in entries {
                hash.aset(ruby.str_new(k), to_ruby(ruby, v)?)
                    .map_err(marshal_error)?;
            }
            hash.as_value()
        }
        ScriptValue::Function | ScriptValue::Opaque(_) => {
            return Err(ScriptError::Marshal(value.type_name().to_string()))
        }
    };
    Ok(converted)
}

/// Spread a Ruby return value into a value list.
fn returned_values(ruby: &Ruby, value: Value) -> Vec<ScriptValue> {
    if value.is_nil() {
        return Vec::new();
    }
    match from_ruby(ruby, value) {
        ScriptValue::Record(items) => items,
        single => vec![single],
    }
}

// ============================================================================
// Device environment
// ============================================================================

pub struct RubyEnv {
    table: BoxValue<RHash>,
}

impl RubyEnv {
    fn lookup(&self, ruby: &Ruby, name: &str) -> Option<Value> {
        self.table
            .get(name)
            .or_else(|| self.table.get(ruby.to_symbol(name)))
    }
}

impl ScriptEnv for RubyEnv {
    fn get(&self, name: &str) -> ScriptValue {
        let Ok(ruby) = ruby() else {
            return ScriptValue::Nil;
        };
        match self.lookup(&ruby, name) {
            Some(value) => from_ruby(&ruby, value),
            None => ScriptValue::Nil,
        }
    }

    fn call(&self, name: &str, args: &[ScriptValue]) -> ScriptResult<Vec<ScriptValue>> {
        let ruby = ruby()?;
        let callee = self
            .lookup(&ruby, name)
            .filter(|v| !v.is_nil())
            .ok_or_else(|| ScriptError::invocation(name, "undefined callable"))?;
        if !callee.respond_to("call", false).unwrap_or(false) {
            return Err(ScriptError::NotCallable(name.to_string()));
        }
        let args = args
            .iter()
            .map(|arg| to_ruby(&ruby, arg))
            .collect::<ScriptResult<Vec<Value>>>()?;
        let result: Value = callee
            .funcall("call", args.as_slice())
            .map_err(|e| ScriptError::invocation(name, e.to_string()))?;
        Ok(returned_values(&ruby, result))
    }
}

// ============================================================================
// Graphbuf::Pixel
// ============================================================================

#[magnus::wrap(class = "Graphbuf::Pixel")]
struct RubyPixel {
    pixel: Cell<Pixel>,
}

impl RubyPixel {
    fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self {
            pixel: Cell::new(Pixel::new(r, g, b, a)),
        }
    }

    fn r(&self) -> u8 {
        self.pixel.get().r
    }

    fn g(&self) -> u8 {
        self.pixel.get().g
    }

    fn b(&self) -> u8 {
        self.pixel.get().b
    }

    fn a(&self) -> u8 {
        self.pixel.get().a
    }

    fn set_r(&self, v: u8) {
        let mut p = self.pixel.get();
        p.r = v;
        self.pixel.set(p);
    }

    fn set_g(&self, v: u8) {
        let mut p = self.pixel.get();
        p.g = v;
        self.pixel.set(p);
    }

    fn set_b(&self, v: u8) {
        let mut p = self.pixel.get();
        p.b = v;
        self.pixel.set(p);
    }

    fn set_a(&self, v: u8) {
        let mut p = self.pixel.get();
        p.a = v;
        self.pixel.set(p);
    }
}

// ============================================================================
// Runtime
// ============================================================================

/// Handle on the embedded Ruby VM of the current thread.
pub struct RubyRuntime {
    // Ruby values may only be touched from the embedding thread
    _thread_bound: PhantomData<*const ()>,
}

impl RubyRuntime {
    pub fn new() -> ScriptResult<Self> {
        ruby()?;
        Ok(Self {
            _thread_bound: PhantomData,
        })
    }
}

impl ScriptRuntime for RubyRuntime {
    fn load_device(&self, source: &str) -> ScriptResult<Rc<dyn ScriptEnv>> {
        let ruby = ruby()?;
        let value: Value = ruby
            .eval(source)
            .map_err(|e| ScriptError::Load(e.to_string()))?;
        let table = RHash::from_value(value).ok_or_else(|| {
            ScriptError::Load(format!(
                "device script must evaluate to a Hash, got {}",
                value.class().inspect()
            ))
        })?;
        Ok(Rc::new(RubyEnv {
            table: BoxValue::new(table),
        }))
    }

    fn pixel_constructible(&self) -> bool {
        match ruby() {
            Ok(ruby) => ruby.eval::<Value>("Graphbuf::Pixel.new(0, 0, 0, 0)").is_ok(),
            Err(_) => false,
        }
    }

    fn define_pixel(&self) -> ScriptResult<()> {
        let ruby = ruby()?;
        let graphbuf = ruby.define_module("Graphbuf").map_err(marshal_error)?;
        let class = graphbuf
            .define_class("Pixel", ruby.class_object())
            .map_err(marshal_error)?;

        class
            .define_singleton_method("new", function!(RubyPixel::new, 4))
            .map_err(marshal_error)?;
        class.define_method("r", method!(RubyPixel::r, 0)).map_err(marshal_error)?;
        class.define_method("g", method!(RubyPixel::g, 0)).map_err(marshal_error)?;
        class.define_method("b", method!(RubyPixel::b, 0)).map_err(marshal_error)?;
        class.define_method("a", method!(RubyPixel::a, 0)).map_err(marshal_error)?;
        class.define_method("r=", method!(RubyPixel::set_r, 1)).map_err(marshal_error)?;
        class.define_method("g=", method!(RubyPixel::set_g, 1)).map_err(marshal_error)?;
        class.define_method("b=", method!(RubyPixel::set_b, 1)).map_err(marshal_error)?;
        class.define_method("a=", method!(RubyPixel::set_a, 1)).map_err(marshal_error)?;

        debug!("defined Graphbuf::Pixel");
        Ok(())
    }
}
