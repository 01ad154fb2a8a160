//! C Bindings for jack-fifo
//!
//! Opaque-handle API with boolean status, for engines that drive the
//! channel from C or C++.

use crate::fifo::JackFifo;
use crate::name::FifoConfig;
use crate::Result;
use std::ffi::CStr;
use std::os::raw::{c_char, c_int, c_long};
use std::ptr;
use std::time::Duration;

// Opaque handle
pub struct JackFifoHandle(JackFifo);

unsafe fn to_str<'a>(s: *const c_char) -> Option<&'a str> {
    if s.is_null() {
        return None;
    }
    CStr::from_ptr(s).to_str().ok()
}

unsafe fn config_from(root_dir: *const c_char) -> Option<FifoConfig> {
    if root_dir.is_null() {
        return Some(FifoConfig::default());
    }
    to_str(root_dir).map(FifoConfig::with_root)
}

unsafe fn with_fifo<F>(handle: *mut JackFifoHandle, f: F) -> bool
where
    F: FnOnce(&mut JackFifo) -> Result<()>,
{
    match handle.as_mut() {
        Some(handle) => f(&mut handle.0).is_ok(),
        None => false,
    }
}

unsafe fn with_names<F>(
    handle: *mut JackFifoHandle,
    name: *const c_char,
    server_name: *const c_char,
    f: F,
) -> bool
where
    F: FnOnce(&mut JackFifo, &str, &str) -> Result<()>,
{
    let (Some(name), Some(server_name)) = (to_str(name), to_str(server_name)) else {
        return false;
    };
    with_fifo(handle, |fifo| f(fifo, name, server_name))
}

/// Create a server-role channel rooted at `root_dir` (NULL for the default)
///
/// # Safety
/// root_dir must be NULL or a valid null-terminated string
#[no_mangle]
pub unsafe extern "C" fn jack_fifo_server_new(root_dir: *const c_char) -> *mut JackFifoHandle {
    match config_from(root_dir) {
        Some(config) => Box::into_raw(Box::new(JackFifoHandle(JackFifo::server(config)))),
        None => ptr::null_mut(),
    }
}

/// Create a client-role channel rooted at `root_dir` (NULL for the default)
///
/// # Safety
/// root_dir must be NULL or a valid null-terminated string
#[no_mangle]
pub unsafe extern "C" fn jack_fifo_client_new(root_dir: *const c_char) -> *mut JackFifoHandle {
    match config_from(root_dir) {
        Some(config) => Box::into_raw(Box::new(JackFifoHandle(JackFifo::client(config)))),
        None => ptr::null_mut(),
    }
}

/// Free a handle, closing it if still open (the FIFO itself is not removed)
///
/// # Safety
/// handle must be NULL or a live pointer from `jack_fifo_server_new` /
/// `jack_fifo_client_new`, not used concurrently from another thread
#[no_mangle]
pub unsafe extern "C" fn jack_fifo_free(handle: *mut JackFifoHandle) {
    if !handle.is_null() {
        drop(Box::from_raw(handle));
    }
}

/// Server: create or reuse the FIFO and open it
///
/// # Safety
/// handle must be NULL or a live pointer from `jack_fifo_server_new` /
/// `jack_fifo_client_new`, not used concurrently from another thread;
/// name and server_name must be NULL or valid null-terminated strings
#[no_mangle]
pub unsafe extern "C" fn jack_fifo_allocate(
    handle: *mut JackFifoHandle,
    name: *const c_char,
    server_name: *const c_char,
    value: c_int,
) -> bool {
    with_names(handle, name, server_name, |fifo, name, server_name| {
        fifo.allocate(name, server_name, value)
    })
}

/// Client: open read-write
///
/// # Safety
/// handle must be NULL or a live pointer from `jack_fifo_server_new` /
/// `jack_fifo_client_new`, not used concurrently from another thread;
/// name and server_name must be NULL or valid null-terminated strings
#[no_mangle]
pub unsafe extern "C" fn jack_fifo_connect(
    handle: *mut JackFifoHandle,
    name: *const c_char,
    server_name: *const c_char,
) -> bool {
    with_names(handle, name, server_name, JackFifo::connect)
}

/// Client: open write-only, non-blocking
///
/// # Safety
/// handle must be NULL or a live pointer from `jack_fifo_server_new` /
/// `jack_fifo_client_new`, not used concurrently from another thread;
/// name and server_name must be NULL or valid null-terminated strings
#[no_mangle]
pub unsafe extern "C" fn jack_fifo_connect_output(
    handle: *mut JackFifoHandle,
    name: *const c_char,
    server_name: *const c_char,
) -> bool {
    with_names(handle, name, server_name, JackFifo::connect_output)
}

/// Client: open read-only
///
/// # Safety
/// handle must be NULL or a live pointer from `jack_fifo_server_new` /
/// `jack_fifo_client_new`, not used concurrently from another thread;
/// name and server_name must be NULL or valid null-terminated strings
#[no_mangle]
pub unsafe extern "C" fn jack_fifo_connect_input(
    handle: *mut JackFifoHandle,
    name: *const c_char,
    server_name: *const c_char,
) -> bool {
    with_names(handle, name, server_name, JackFifo::connect_input)
}

/// Close the local handle; true when already closed
///
/// # Safety
/// handle must be NULL or a live pointer from `jack_fifo_server_new` /
/// `jack_fifo_client_new`, not used concurrently from another thread
#[no_mangle]
pub unsafe extern "C" fn jack_fifo_disconnect(handle: *mut JackFifoHandle) -> bool {
    with_fifo(handle, JackFifo::disconnect)
}

/// Server: remove the FIFO and close the handle
///
/// # Safety
/// handle must be NULL or a live pointer from `jack_fifo_server_new` /
/// `jack_fifo_client_new`, not used concurrently from another thread
#[no_mangle]
pub unsafe extern "C" fn jack_fifo_destroy(handle: *mut JackFifoHandle) -> bool {
    with_fifo(handle, JackFifo::destroy)
}

/// Write one wake token; true without writing while flushing
///
/// # Safety
/// handle must be NULL or a live pointer from `jack_fifo_server_new` /
/// `jack_fifo_client_new`, not used concurrently from another thread
#[no_mangle]
pub unsafe extern "C" fn jack_fifo_signal(handle: *mut JackFifoHandle) -> bool {
    with_fifo(handle, |fifo| fifo.signal())
}

/// Same as `jack_fifo_signal`
///
/// # Safety
/// handle must be NULL or a live pointer from `jack_fifo_server_new` /
/// `jack_fifo_client_new`, not used concurrently from another thread
#[no_mangle]
pub unsafe extern "C" fn jack_fifo_signal_all(handle: *mut JackFifoHandle) -> bool {
    with_fifo(handle, |fifo| fifo.signal_all())
}

/// Block until one token has been read
///
/// # Safety
/// handle must be NULL or a live pointer from `jack_fifo_server_new` /
/// `jack_fifo_client_new`, not used concurrently from another thread
#[no_mangle]
pub unsafe extern "C" fn jack_fifo_wait(handle: *mut JackFifoHandle) -> bool {
    with_fifo(handle, |fifo| fifo.wait())
}

/// Wait at most `usec` microseconds; negative values are treated as zero
///
/// # Safety
/// handle must be NULL or a live pointer from `jack_fifo_server_new` /
/// `jack_fifo_client_new`, not used concurrently from another thread
#[no_mangle]
pub unsafe extern "C" fn jack_fifo_timed_wait(handle: *mut JackFifoHandle, usec: c_long) -> bool {
    let timeout = Duration::from_micros(u64::try_from(usec).unwrap_or(0));
    with_fifo(handle, |fifo| fifo.timed_wait(timeout))
}

/// Turn signal suppression on or off
///
/// # Safety
/// handle must be NULL or a live pointer from `jack_fifo_server_new` /
/// `jack_fifo_client_new`, not used concurrently from another thread
#[no_mangle]
pub unsafe extern "C" fn jack_fifo_set_flush(handle: *mut JackFifoHandle, flush: bool) {
    if let Some(handle) = handle.as_mut() {
        handle.0.set_flush(flush);
    }
}
