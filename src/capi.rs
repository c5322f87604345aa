//! `extern "C"` surface for C and C++ host loops.
//!
//! The declarations live in [`crate::codegen::abi::C_HEADER`] behind
//! `DOPING_HOST_API`.

use std::ffi::{CStr, c_char, c_int};
use std::panic::{AssertUnwindSafe, catch_unwind};

use tracing::error;

use crate::codegen::ArgPack;
use crate::config::DEFAULT_COMPILER;
use crate::runtime::jit::{LoopDescriptor, SpecializationContext};

/// `doping_loop`
#[repr(C)]
#[derive(Debug)]
pub struct DopingLoop {
    /// May be NULL for anonymous loops.
    pub name: *const c_char,
    pub source: *const c_char,
    /// NULL means no parameters.
    pub parameters: *const c_char,
    /// NULL selects the default compiler.
    pub compiler_command: *const c_char,
    pub iteration_start: i64,
    pub iteration_space: i64,
}

/// Creates a context configured from `DOPING_*` variables.
///
/// Returns NULL when the configuration is invalid or the log file cannot be
/// opened.
#[unsafe(no_mangle)]
pub extern "C" fn doping_context_new() -> *mut SpecializationContext {
    match catch_unwind(SpecializationContext::from_env) {
        Ok(Ok(context)) => Box::into_raw(Box::new(context)),
        Ok(Err(err)) => {
            eprintln!("doping: failed to initialise: {err:#}");
            std::ptr::null_mut()
        }
        Err(_) => std::ptr::null_mut(),
    }
}

/// # Safety
///
/// `context` must be NULL or a pointer returned by [`doping_context_new`]
/// that has not been freed yet. Libraries loaded through it are unloaded.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn doping_context_free(context: *mut SpecializationContext) {
    if context.is_null() {
        return;
    }
    // SAFETY: the caller hands back ownership of a pointer from `Box::into_raw`.
    drop(unsafe { Box::from_raw(context) });
}

/// # Safety
///
/// `context` must come from [`doping_context_new`]. `descriptor` must point to
/// a valid `doping_loop` whose strings are NUL-terminated. `args` must be NULL
/// or a valid `doping_args` whose values stay valid for the call.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn doping_specialize(
    context: *const SpecializationContext,
    current_iteration: i64,
    continue_condition: c_int,
    descriptor: *const DopingLoop,
    args: *mut ArgPack,
) -> c_int {
    if context.is_null() || descriptor.is_null() {
        return continue_condition;
    }
    // SAFETY: checked for NULL above; validity is the caller's contract.
    let (context, raw) = unsafe { (&*context, &*descriptor) };

    // SAFETY: all strings are NUL-terminated per the caller's contract.
    let strings = unsafe {
        (
            optional_str(raw.name),
            optional_str(raw.source),
            optional_str(raw.parameters),
            optional_str(raw.compiler_command),
        )
    };
    let (Ok(name), Ok(Some(source)), Ok(parameters), Ok(compiler)) = strings else {
        error!("doping_loop strings must be valid UTF-8 and `source` must be set");
        return continue_condition;
    };

    let descriptor = LoopDescriptor {
        name,
        source,
        parameters: parameters.unwrap_or(""),
        compiler_command: compiler.unwrap_or(DEFAULT_COMPILER),
        iteration_start: raw.iteration_start,
        iteration_space: raw.iteration_space,
    };

    let mut empty = ArgPack::empty();
    let pack = if args.is_null() {
        &mut empty
    } else {
        // SAFETY: non-NULL and valid per the caller's contract.
        unsafe { &mut *args }
    };

    catch_unwind(AssertUnwindSafe(|| {
        context.specialize_packed(current_iteration, continue_condition, &descriptor, pack)
    }))
    .unwrap_or_else(|_| {
        error!("panic during specialization, continuing with baseline code");
        continue_condition
    })
}

/// # Safety
///
/// `ptr` must be NULL or point to a NUL-terminated string that outlives `'a`.
unsafe fn optional_str<'a>(ptr: *const c_char) -> Result<Option<&'a str>, std::str::Utf8Error> {
    if ptr.is_null() {
        return Ok(None);
    }
    // SAFETY: forwarded from the caller.
    unsafe { CStr::from_ptr(ptr) }.to_str().map(Some)
}
