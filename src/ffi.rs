//! C ABI exports for a native host simulator
//!
//! Devices and hosts are handed out as opaque pointers. Structured results
//! cross as JSON strings which the caller releases with
//! `device_bridge_free_string`. Every function tolerates null pointers.

use std::ffi::{CStr, CString};
use std::os::raw::{c_char, c_int, c_uint};
use std::ptr;
use std::slice;

use serde::Serialize;

use crate::device::Device;
use crate::host::ScriptHost;
use crate::interfaces::Config;

fn into_c_string(s: String) -> *mut c_char {
    CString::new(s).map(CString::into_raw).unwrap_or(ptr::null_mut())
}

fn json_out<T: Serialize>(value: &T) -> *mut c_char {
    serde_json::to_string(value)
        .map(into_c_string)
        .unwrap_or(ptr::null_mut())
}

unsafe fn write_error(error_out: *mut *mut c_char, msg: String) {
    if !error_out.is_null() {
        *error_out = into_c_string(msg);
    }
}

unsafe fn str_arg<'a>(data: *const c_char, len: usize) -> Option<&'a str> {
    if data.is_null() {
        return None;
    }
    std::str::from_utf8(slice::from_raw_parts(data as *const u8, len)).ok()
}

// ============================================================================
// Host
// ============================================================================

/// Create a host over an embedded Ruby VM. The VM must already be running
/// on the calling thread.
#[cfg(feature = "ruby")]
#[no_mangle]
pub unsafe extern "C" fn device_bridge_ruby_host_create(error_out: *mut *mut c_char) -> *mut ScriptHost {
    match crate::ruby::RubyRuntime::new() {
        Ok(runtime) => Box::into_raw(Box::new(ScriptHost::new(std::rc::Rc::new(runtime)))),
        Err(e) => {
            write_error(error_out, e.to_string());
            ptr::null_mut()
        }
    }
}

/// Destroy a host. Devices created from it stay usable and must still be
/// unloaded.
#[no_mangle]
pub unsafe extern "C" fn device_bridge_host_destroy(host: *mut ScriptHost) {
    if !host.is_null() {
        drop(Box::from_raw(host));
    }
}

/// Load a device from a script. Returns null on error, message written to
/// error_out if provided.
#[no_mangle]
pub unsafe extern "C" fn device_bridge_host_load_device(
    host: *const ScriptHost,
    id: *const c_char,
    source: *const c_char,
    source_len: usize,
    error_out: *mut *mut c_char,
) -> *mut Device {
    if host.is_null() || id.is_null() {
        return ptr::null_mut();
    }
    let id = match CStr::from_ptr(id).to_str() {
        Ok(id) => id,
        Err(e) => {
            write_error(error_out, format!("Invalid UTF-8 in id: {}", e));
            return ptr::null_mut();
        }
    };
    let source = match str_arg(source, source_len) {
        Some(source) => source,
        None => {
            write_error(error_out, "Invalid device script".to_string());
            return ptr::null_mut();
        }
    };
    match (*host).load_device(id, source) {
        Ok(device) => Box::into_raw(Box::new(device)),
        Err(e) => {
            write_error(error_out, e.to_string());
            ptr::null_mut()
        }
    }
}

/// Unload a device. Its id is released even if `host` is null.
#[no_mangle]
pub unsafe extern "C" fn device_bridge_host_unload(host: *const ScriptHost, device: *mut Device) {
    if device.is_null() {
        return;
    }
    let device = Box::from_raw(device);
    if host.is_null() {
        drop(device);
    } else {
        (*host).unload(*device);
    }
}

/// Free a string returned by device_bridge functions
#[no_mangle]
pub unsafe extern "C" fn device_bridge_free_string(s: *mut c_char) {
    if !s.is_null() {
        drop(CString::from_raw(s));
    }
}

// ============================================================================
// Device identity
// ============================================================================

#[no_mangle]
pub unsafe extern "C" fn device_bridge_id(device: *const Device) -> *mut c_char {
    if device.is_null() {
        return ptr::null_mut();
    }
    into_c_string((*device).id().to_string())
}

#[no_mangle]
pub unsafe extern "C" fn device_bridge_classname(device: *const Device) -> *mut c_char {
    if device.is_null() {
        return ptr::null_mut();
    }
    into_c_string((*device).classname().to_string())
}

#[no_mangle]
pub unsafe extern "C" fn device_bridge_summary_json(device: *const Device) -> *mut c_char {
    if device.is_null() {
        return ptr::null_mut();
    }
    json_out(&(*device).summary())
}

#[no_mangle]
pub unsafe extern "C" fn device_bridge_has_pin(device: *const Device) -> c_int {
    if device.is_null() {
        return 0;
    }
    if (*device).pin().is_some() { 1 } else { 0 }
}

#[no_mangle]
pub unsafe extern "C" fn device_bridge_has_spi(device: *const Device) -> c_int {
    if device.is_null() {
        return 0;
    }
    if (*device).spi().is_some() { 1 } else { 0 }
}

#[no_mangle]
pub unsafe extern "C" fn device_bridge_has_config(device: *const Device) -> c_int {
    if device.is_null() {
        return 0;
    }
    if (*device).config().is_some() { 1 } else { 0 }
}

#[no_mangle]
pub unsafe extern "C" fn device_bridge_has_graphbuf(device: *const Device) -> c_int {
    if device.is_null() {
        return 0;
    }
    if (*device).graphbuf().is_some() { 1 } else { 0 }
}

// ============================================================================
// Digital I/O
// ============================================================================

/// Pin layout as a JSON object keyed by pin number
#[no_mangle]
pub unsafe extern "C" fn device_bridge_pin_layout_json(device: *const Device) -> *mut c_char {
    if device.is_null() {
        return ptr::null_mut();
    }
    match (*device).pin() {
        Some(pin) => json_out(&pin.get_pin_layout()),
        None => ptr::null_mut(),
    }
}

/// Returns 1/0 for the pin level, -1 if the device has no pin interface
#[no_mangle]
pub unsafe extern "C" fn device_bridge_get_pin(device: *const Device, num: c_uint) -> c_int {
    if device.is_null() {
        return -1;
    }
    match (*device).pin() {
        Some(pin) => pin.get_pin(num) as c_int,
        None => -1,
    }
}

/// 1 if the device's pins can be read, 0 otherwise
#[no_mangle]
pub unsafe extern "C" fn device_bridge_pin_can_read(device: *const Device) -> c_int {
    if device.is_null() {
        return 0;
    }
    match (*device).pin() {
        Some(pin) if pin.can_read() => 1,
        _ => 0,
    }
}

/// 1 if the device's pins can be driven, 0 otherwise
#[no_mangle]
pub unsafe extern "C" fn device_bridge_pin_can_write(device: *const Device) -> c_int {
    if device.is_null() {
        return 0;
    }
    match (*device).pin() {
        Some(pin) if pin.can_write() => 1,
        _ => 0,
    }
}

#[no_mangle]
pub unsafe extern "C" fn device_bridge_set_pin(device: *const Device, num: c_uint, val: c_int) {
    if device.is_null() {
        return;
    }
    if let Some(pin) = (*device).pin() {
        pin.set_pin(num, val != 0);
    }
}

// ============================================================================
// Serial transfer
// ============================================================================

/// Returns the reply byte, -1 if the device has no SPI interface
#[no_mangle]
pub unsafe extern "C" fn device_bridge_spi_send(device: *const Device, byte: u8) -> c_int {
    if device.is_null() {
        return -1;
    }
    match (*device).spi() {
        Some(spi) => spi.send(byte) as c_int,
        None => -1,
    }
}

// ============================================================================
// Configuration
// ============================================================================

#[no_mangle]
pub unsafe extern "C" fn device_bridge_get_config_json(device: *const Device) -> *mut c_char {
    if device.is_null() {
        return ptr::null_mut();
    }
    match (*device).config() {
        Some(conf) => json_out(&conf.get_config()),
        None => ptr::null_mut(),
    }
}

/// Returns 1 if the script accepted the snapshot, 0 if it failed, -1 on
/// bad input or a device without config interface
#[no_mangle]
pub unsafe extern "C" fn device_bridge_set_config_json(
    device: *const Device,
    json: *const c_char,
    json_len: usize,
) -> c_int {
    if device.is_null() {
        return -1;
    }
    let Some(conf) = (*device).config() else {
        return -1;
    };
    let config: Config = match str_arg(json, json_len).map(serde_json::from_str) {
        Some(Ok(config)) => config,
        Some(Err(e)) => {
            log::warn!("rejecting config JSON: {}", e);
            return -1;
        }
        None => return -1,
    };
    conf.set_config(&config) as c_int
}

// ============================================================================
// Graphics buffer
// ============================================================================

#[no_mangle]
pub unsafe extern "C" fn device_bridge_graphbuf_layout_json(device: *const Device) -> *mut c_char {
    if device.is_null() {
        return ptr::null_mut();
    }
    match (*device).graphbuf() {
        Some(graphbuf) => json_out(&graphbuf.get_layout()),
        None => ptr::null_mut(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record;
    use crate::table::{TableEnv, TableRuntime};
    use crate::value::ScriptValue;
    use std::cell::RefCell;
    use std::rc::Rc;

    unsafe fn take_string(s: *mut c_char) -> String {
        assert!(!s.is_null());
        let out = CStr::from_ptr(s).to_str().unwrap().to_string();
        device_bridge_free_string(s);
        out
    }

    fn host_with_scripts(config_log: Rc<RefCell<Vec<ScriptValue>>>) -> *mut ScriptHost {
        let runtime = Rc::new(TableRuntime::new());
        runtime.add_script("switch", move || {
            let log = config_log.clone();
            TableEnv::with_classname("switch")
                .function("getPinLayout", |_| Ok(vec![record![1i64, "output", "SW"]]))
                .function("getPin", |_| Ok(vec![ScriptValue::Boolean(true)]))
                .function("receiveSPI", |args| Ok(args.to_vec()))
                .function("getConfig", |_| Ok(vec![record!["level", 2i64]]))
                .function("setConfig", move |args| {
                    log.borrow_mut().extend(args.iter().cloned());
                    Ok(vec![])
                })
        });
        Box::into_raw(Box::new(ScriptHost::new(runtime)))
    }

    #[test]
    fn test_device_round_trip_through_c_abi() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let host = host_with_scripts(seen.clone());
        let id = CString::new("sw0").unwrap();
        let mut err: *mut c_char = ptr::null_mut();

        unsafe {
            let device = device_bridge_host_load_device(host, id.as_ptr(), "switch".as_ptr() as *const c_char, 6, &mut err);
            assert!(!device.is_null());
            assert!(err.is_null());

            assert_eq!(take_string(device_bridge_id(device)), "sw0");
            assert_eq!(take_string(device_bridge_classname(device)), "switch");
            assert_eq!(device_bridge_has_pin(device), 1);
            assert_eq!(device_bridge_has_spi(device), 1);
            assert_eq!(device_bridge_has_config(device), 1);
            assert_eq!(device_bridge_has_graphbuf(device), 0);

            let layout: serde_json::Value =
                serde_json::from_str(&take_string(device_bridge_pin_layout_json(device))).unwrap();
            assert_eq!(layout["1"]["name"], "SW");
            assert_eq!(layout["1"]["dir"], "output");

            assert_eq!(device_bridge_get_pin(device, 1), 1);
            // getPin without setPin
            assert_eq!(device_bridge_pin_can_read(device), 1);
            assert_eq!(device_bridge_pin_can_write(device), 0);
            assert_eq!(device_bridge_spi_send(device, 0x42), 0x42);
            assert!(device_bridge_graphbuf_layout_json(device).is_null());

            assert_eq!(take_string(device_bridge_get_config_json(device)), r#"{"level":2}"#);
            let json = r#"{"level":3,"on":true}"#;
            assert_eq!(device_bridge_set_config_json(device, json.as_ptr() as *const c_char, json.len()), 1);
            let bad = "{not json";
            assert_eq!(device_bridge_set_config_json(device, bad.as_ptr() as *const c_char, bad.len()), -1);

            // duplicate id is refused while sw0 is live
            let dup = device_bridge_host_load_device(host, id.as_ptr(), "switch".as_ptr() as *const c_char, 6, &mut err);
            assert!(dup.is_null());
            assert!(take_string(err).contains("sw0"));

            device_bridge_host_unload(host, device);
            assert!(!(*host).is_live("sw0"));
            device_bridge_host_destroy(host);
        }

        assert_eq!(
            *seen.borrow(),
            vec![ScriptValue::Table(vec![
                ("level".into(), ScriptValue::Integer(3)),
                ("on".into(), ScriptValue::Integer(1)),
            ])]
        );
    }

    #[test]
    fn test_null_pointers_are_tolerated() {
        unsafe {
            assert!(device_bridge_id(ptr::null()).is_null());
            assert_eq!(device_bridge_has_pin(ptr::null()), 0);
            assert_eq!(device_bridge_pin_can_read(ptr::null()), 0);
            assert_eq!(device_bridge_pin_can_write(ptr::null()), 0);
            assert_eq!(device_bridge_get_pin(ptr::null(), 0), -1);
            assert_eq!(device_bridge_spi_send(ptr::null(), 1), -1);
            assert_eq!(device_bridge_set_config_json(ptr::null(), ptr::null(), 0), -1);
            device_bridge_set_pin(ptr::null(), 0, 1);
            device_bridge_host_unload(ptr::null(), ptr::null_mut());
            device_bridge_free_string(ptr::null_mut());
            assert!(device_bridge_host_load_device(ptr::null(), ptr::null(), ptr::null(), 0, ptr::null_mut()).is_null());
        }
    }

    #[test]
    fn test_missing_interfaces_report_minus_one() {
        let runtime = Rc::new(TableRuntime::new());
        runtime.add_script("blank", || TableEnv::with_classname("blank"));
        let host = ScriptHost::new(runtime);
        let device = Box::into_raw(Box::new(host.load_device("blank0", "blank").unwrap()));
        unsafe {
            assert_eq!(device_bridge_get_pin(device, 0), -1);
            assert_eq!(device_bridge_pin_can_read(device), 0);
            assert_eq!(device_bridge_pin_can_write(device), 0);
            assert_eq!(device_bridge_spi_send(device, 0), -1);
            assert!(device_bridge_get_config_json(device).is_null());
            let summary = take_string(device_bridge_summary_json(device));
            assert!(summary.contains(r#""classname":"blank""#));
            device_bridge_host_unload(&host, device);
        }
        assert!(!host.is_live("blank0"));
    }

    #[test]
    fn test_unload_without_host_releases_id() {
        let runtime = Rc::new(TableRuntime::new());
        runtime.add_script("blank", || TableEnv::with_classname("blank"));
        let host = ScriptHost::new(runtime);
        let device = Box::into_raw(Box::new(host.load_device("blank0", "blank").unwrap()));
        unsafe {
            device_bridge_host_unload(ptr::null(), device);
        }
        assert!(!host.is_live("blank0"));
        assert!(host.load_device("blank0", "blank").is_ok());
    }
}
