//! Argument pack shared between the host loop and compiled loop bodies.
//!
//! Loop bodies receive `(current_iteration, doping_args *)`. The pack is a
//! length-prefixed array of tagged values so the host can forward any mix of
//! scalars and pointers without variadic calls across the `dlopen` boundary.

use std::ffi::c_void;
use std::fmt;
use std::marker::PhantomData;

pub const ABI_VERSION: u32 = 1;

/// Symbol every specialized library must export.
pub const ENTRY_SYMBOL: &str = "function";

/// Written next to every generated source file.
pub const HEADER_FILE_NAME: &str = "doping_args.h";

pub const C_HEADER: &str = r#"#ifndef DOPING_ARGS_H
#define DOPING_ARGS_H

#include <stdint.h>

#define DOPING_ABI_VERSION 1

enum {
    DOPING_ARG_INT = 1,
    DOPING_ARG_FLOAT = 2,
    DOPING_ARG_POINTER = 3
};

typedef struct doping_value {
    uint32_t tag;
    union {
        int64_t i;
        double f;
        void *p;
    } as;
} doping_value;

typedef struct doping_args {
    uint32_t version;
    uint32_t len;
    doping_value *values;
} doping_args;

#define DOPING_INT(args, n) ((args)->values[(n)].as.i)
#define DOPING_FLOAT(args, n) ((args)->values[(n)].as.f)
#define DOPING_PTR(type, args, n) ((type *)(args)->values[(n)].as.p)

#ifdef __cplusplus
#define DOPING_ENTRY extern "C" int function
#else
#define DOPING_ENTRY int function
#endif

#ifdef DOPING_HOST_API
typedef struct doping_context doping_context;

typedef struct doping_loop {
    const char *name;
    const char *source;
    const char *parameters;
    const char *compiler_command;
    int64_t iteration_start;
    int64_t iteration_space;
} doping_loop;

#ifdef __cplusplus
extern "C" {
#endif
doping_context *doping_context_new(void);
void doping_context_free(doping_context *ctx);
int doping_specialize(const doping_context *ctx, int64_t current_iteration,
                      int continue_condition, const doping_loop *loop,
                      doping_args *args);
#ifdef __cplusplus
}
#endif
#endif

#endif
"#;

#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgTag {
    Int = 1,
    Float = 2,
    Pointer = 3,
}

impl ArgTag {
    pub fn from_raw(raw: u32) -> Option<Self> {
        match raw {
            1 => Some(ArgTag::Int),
            2 => Some(ArgTag::Float),
            3 => Some(ArgTag::Pointer),
            _ => None,
        }
    }
}

#[repr(C)]
#[derive(Clone, Copy)]
pub union ArgPayload {
    pub int: i64,
    pub float: f64,
    pub ptr: *mut c_void,
}

/// `doping_value`
#[repr(C)]
#[derive(Clone, Copy)]
pub struct ArgValue {
    tag: u32,
    payload: ArgPayload,
}

impl ArgValue {
    pub fn int(value: i64) -> Self {
        Self {
            tag: ArgTag::Int as u32,
            payload: ArgPayload { int: value },
        }
    }

    pub fn float(value: f64) -> Self {
        Self {
            tag: ArgTag::Float as u32,
            payload: ArgPayload { float: value },
        }
    }

    pub fn pointer(ptr: *mut c_void) -> Self {
        Self {
            tag: ArgTag::Pointer as u32,
            payload: ArgPayload { ptr },
        }
    }

    pub fn tag(&self) -> Option<ArgTag> {
        ArgTag::from_raw(self.tag)
    }

    pub fn as_int(&self) -> Option<i64> {
        // SAFETY: the tag names the union field that was written.
        (self.tag() == Some(ArgTag::Int)).then(|| unsafe { self.payload.int })
    }

    pub fn as_float(&self) -> Option<f64> {
        // SAFETY: the tag names the union field that was written.
        (self.tag() == Some(ArgTag::Float)).then(|| unsafe { self.payload.float })
    }

    pub fn as_ptr(&self) -> Option<*mut c_void> {
        // SAFETY: the tag names the union field that was written.
        (self.tag() == Some(ArgTag::Pointer)).then(|| unsafe { self.payload.ptr })
    }
}

impl fmt::Debug for ArgValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.tag() {
            Some(ArgTag::Int) => write!(f, "Int({})", self.as_int().unwrap_or_default()),
            Some(ArgTag::Float) => write!(f, "Float({})", self.as_float().unwrap_or_default()),
            Some(ArgTag::Pointer) => {
                write!(f, "Pointer({:p})", self.as_ptr().unwrap_or(std::ptr::null_mut()))
            }
            None => write!(f, "Unknown(tag = {})", self.tag),
        }
    }
}

/// `doping_args`
#[repr(C)]
#[derive(Debug)]
pub struct ArgPack {
    pub version: u32,
    pub len: u32,
    pub values: *mut ArgValue,
}

impl ArgPack {
    pub fn empty() -> Self {
        Self {
            version: ABI_VERSION,
            len: 0,
            values: std::ptr::null_mut(),
        }
    }
}

/// Values forwarded untouched from the host loop to the specialized body.
///
/// Pointers pushed through the safe builders borrow their data for `'a`, so
/// they stay valid for as long as the pack can be handed out. Data passed as a
/// shared slice must be treated as read-only by the loop body.
#[derive(Debug, Default)]
pub struct Arguments<'a> {
    values: Vec<ArgValue>,
    _borrows: PhantomData<&'a mut ()>,
}

impl<'a> Arguments<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn int(mut self, value: i64) -> Self {
        self.values.push(ArgValue::int(value));
        self
    }

    pub fn float(mut self, value: f64) -> Self {
        self.values.push(ArgValue::float(value));
        self
    }

    pub fn slice<T>(mut self, data: &'a [T]) -> Self {
        self.values
            .push(ArgValue::pointer(data.as_ptr().cast_mut().cast()));
        self
    }

    pub fn slice_mut<T>(mut self, data: &'a mut [T]) -> Self {
        self.values.push(ArgValue::pointer(data.as_mut_ptr().cast()));
        self
    }

    /// Forwards a scalar the loop body writes back, like `&sum` in C.
    pub fn scalar_mut<T>(mut self, value: &'a mut T) -> Self {
        self.values
            .push(ArgValue::pointer((value as *mut T).cast()));
        self
    }

    /// # Safety
    ///
    /// `ptr` must stay valid, for whatever accesses the loop body performs,
    /// until these arguments are dropped.
    pub unsafe fn raw_pointer(mut self, ptr: *mut c_void) -> Self {
        self.values.push(ArgValue::pointer(ptr));
        self
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn values(&self) -> &[ArgValue] {
        &self.values
    }

    /// The C view of these arguments; valid while `self` is not touched.
    pub fn as_pack(&mut self) -> ArgPack {
        ArgPack {
            version: ABI_VERSION,
            len: u32::try_from(self.values.len()).unwrap_or(u32::MAX),
            values: if self.values.is_empty() {
                std::ptr::null_mut()
            } else {
                self.values.as_mut_ptr()
            },
        }
    }
}
