//! Runtime-loaded bindings to the private Seatbelt entry points.
//!
//! `sandbox_init_with_parameters` and `sandbox_free_error` are not declared
//! in any public SDK header, so this crate resolves them with `dlopen`/
//! `dlsym` against `/usr/lib/system/libsystem_sandbox.dylib`, exactly as the
//! reference implementation does, rather than linking against `libsandbox`
//! at build time (which would assume headers/symbols this crate has no
//! business depending on).

use std::ffi::{CStr, CString, c_void};
use std::os::raw::{c_char, c_int};
use std::sync::OnceLock;

use crate::error::{Error, Result};

const DYLIB_PATH: &CStr = c"/usr/lib/system/libsystem_sandbox.dylib";

type SandboxInitFn =
    unsafe extern "C" fn(*const c_char, u64, *const *const c_char, *mut *mut c_char) -> c_int;
type SandboxFreeErrorFn = unsafe extern "C" fn(*mut c_char);

struct Symbols {
    init: SandboxInitFn,
    free_error: SandboxFreeErrorFn,
}

// Raw function pointers resolved from a dylib loaded once for the process;
// never unloaded, so `Sync` is sound.
unsafe impl Sync for Symbols {}

static SYMBOLS: OnceLock<Option<Symbols>> = OnceLock::new();

fn load_symbols() -> Option<Symbols> {
    unsafe {
        let lib = libc::dlopen(DYLIB_PATH.as_ptr(), libc::RTLD_LAZY);
        if lib.is_null() {
            return None;
        }

        let init = libc::dlsym(lib, c"sandbox_init_with_parameters".as_ptr());
        let free_error = libc::dlsym(lib, c"sandbox_free_error".as_ptr());
        if init.is_null() || free_error.is_null() {
            return None;
        }

        Some(Symbols {
            init: std::mem::transmute::<*mut c_void, SandboxInitFn>(init),
            free_error: std::mem::transmute::<*mut c_void, SandboxFreeErrorFn>(free_error),
        })
    }
}

/// Resolve the Seatbelt symbols, caching success or permanent failure for
/// the lifetime of the process.
pub(crate) fn resolve() -> Result<()> {
    match SYMBOLS.get_or_init(load_symbols) {
        Some(_) => Ok(()),
        None => Err(Error::UnsupportedKernel(
            "libsystem_sandbox.dylib is unavailable or missing expected symbols".to_string(),
        )),
    }
}

/// A compiled SBPL profile, ready to be applied to the current process.
#[derive(Clone)]
pub struct SandboxProfile {
    profile: CString,
}

impl SandboxProfile {
    /// Compile `sbpl` into a profile. Fails only if the text contains an
    /// embedded NUL byte.
    pub fn new(sbpl: &str) -> Result<Self> {
        let profile = CString::new(sbpl)
            .map_err(|_| Error::Generic("SBPL profile contains a null byte".to_string()))?;
        Ok(Self { profile })
    }

    /// Apply this profile to the current process.
    ///
    /// Must be called only in the forked child, between `fork` and
    /// `execve`: the only allocation performed here is none — the profile
    /// string was built in the parent before fork, and this call does not
    /// allocate on success or failure. On failure returns a human-readable
    /// message taken from the kernel's error buffer.
    pub(crate) fn apply(&self) -> std::result::Result<(), String> {
        let symbols = match SYMBOLS.get() {
            Some(Some(symbols)) => symbols,
            _ => return Err("sandbox symbols not resolved".to_string()),
        };

        let mut error_buf: *mut c_char = std::ptr::null_mut();
        let result = unsafe {
            (symbols.init)(
                self.profile.as_ptr(),
                0,
                std::ptr::null(),
                &mut error_buf,
            )
        };

        if result == 0 {
            return Ok(());
        }

        if error_buf.is_null() {
            return Err("sandbox_init_with_parameters failed".to_string());
        }
        let message = unsafe { CStr::from_ptr(error_buf) }
            .to_string_lossy()
            .into_owned();
        unsafe { (symbols.free_error)(error_buf) };
        Err(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_profile_with_null_byte() {
        assert!(SandboxProfile::new("(version 1)\0(deny default)").is_err());
    }

    #[test]
    fn accepts_well_formed_profile() {
        assert!(SandboxProfile::new("(version 1)(deny default)").is_ok());
    }
}
