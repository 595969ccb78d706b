use std::ffi::{c_char, CStr, CString};
use std::path::PathBuf;
use std::sync::Mutex;

use once_cell::sync::Lazy;

use crate::docx::doc2json::docx_to_json_with_rules;
use crate::docx::filter::Doc2JsonRules;

static LAST_ERROR: Lazy<Mutex<Option<CString>>> = Lazy::new(|| Mutex::new(None));

fn set_last_error(msg: &str) {
    let c = CString::new(msg.replace('\0', " "))
        .unwrap_or_else(|_| CString::new("error").expect("cstr"));
    let mut guard = LAST_ERROR.lock().unwrap_or_else(|e| e.into_inner());
    *guard = Some(c);
}

fn take_cstr(ptr: *const c_char, name: &str) -> Result<String, String> {
    if ptr.is_null() {
        return Err(format!("{name} is null"));
    }
    unsafe { CStr::from_ptr(ptr) }
        .to_str()
        .map(|s| s.to_string())
        .map_err(|_| format!("{name} is not valid UTF-8"))
}

fn convert_path(input_docx: *const c_char, rules_toml: *const c_char) -> Result<String, String> {
    let input = PathBuf::from(take_cstr(input_docx, "input_docx")?);
    let rules = if rules_toml.is_null() {
        Doc2JsonRules::default()
    } else {
        let p = PathBuf::from(take_cstr(rules_toml, "rules_toml")?);
        Doc2JsonRules::from_toml_path(&p).map_err(|e| format!("{e:#}"))?
    };
    let bytes = std::fs::read(&input).map_err(|e| format!("read {}: {e}", input.display()))?;
    docx_to_json_with_rules(&bytes, &rules).map_err(|e| e.to_string())
}

/// Converts a DOCX file to doc2json output. `rules_toml` may be null for the built-in rules.
///
/// Returns a heap-allocated UTF-8 JSON string to be released with `dc_string_free`, or null on
/// failure (see `dc_last_error_utf8()`).
#[no_mangle]
pub extern "C" fn dc_docx_to_json(
    input_docx: *const c_char,
    rules_toml: *const c_char,
) -> *mut c_char {
    match convert_path(input_docx, rules_toml).and_then(|json| {
        CString::new(json).map_err(|_| "json contains an interior NUL byte".to_string())
    }) {
        Ok(c) => c.into_raw(),
        Err(e) => {
            set_last_error(&e);
            std::ptr::null_mut()
        }
    }
}

/// Releases a string returned by `dc_docx_to_json`. Null is ignored.
#[no_mangle]
pub extern "C" fn dc_string_free(ptr: *mut c_char) {
    if ptr.is_null() {
        return;
    }
    // SAFETY: the pointer came from `CString::into_raw` in `dc_docx_to_json`.
    drop(unsafe { CString::from_raw(ptr) });
}

/// Returns the last error message as a UTF-8 C string pointer (or null if none).
/// The pointer is valid until the next failing `dc_docx_to_json` call.
#[no_mangle]
pub extern "C" fn dc_last_error_utf8() -> *const c_char {
    let guard = LAST_ERROR.lock().unwrap_or_else(|e| e.into_inner());
    match guard.as_ref() {
        Some(s) => s.as_ptr(),
        None => std::ptr::null(),
    }
}
