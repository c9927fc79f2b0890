//! Low-level FFI bindings for the SANE scanner library.
//!
//! These mirror `<sane/sane.h>` from sane-backends (SANE standard version 1).
//! All functions are `unsafe` direct bindings; for a safe wrapper use the
//! `sane-capture` crate instead.
//!
//! # Example (unsafe)
//!
//! ```ignore
//! use sane_sys::*;
//! use std::ptr;
//!
//! unsafe {
//!     let mut version: SANE_Int = 0;
//!     if sane_init(&mut version, None) == SANE_STATUS_GOOD {
//!         println!("SANE {}.{}", SANE_VERSION_MAJOR(version), SANE_VERSION_MINOR(version));
//!         sane_exit();
//!     }
//! }
//! ```

#![allow(non_upper_case_globals)]
#![allow(non_camel_case_types)]
#![allow(non_snake_case)]
#![allow(clippy::all)]

use std::os::raw::{c_char, c_int, c_uchar, c_void};

pub type SANE_Byte = c_uchar;
pub type SANE_Word = c_int;
pub type SANE_Bool = SANE_Word;
pub type SANE_Int = SANE_Word;
pub type SANE_Char = c_char;
pub type SANE_String = *mut SANE_Char;
pub type SANE_String_Const = *const SANE_Char;
pub type SANE_Handle = *mut c_void;
pub type SANE_Fixed = SANE_Word;

pub const SANE_FALSE: SANE_Bool = 0;
pub const SANE_TRUE: SANE_Bool = 1;

pub const SANE_FIXED_SCALE_SHIFT: u32 = 16;

/// Convert a double to SANE's 16.16 fixed-point representation.
pub fn SANE_FIX(v: f64) -> SANE_Fixed {
    (v * f64::from(1_i32 << SANE_FIXED_SCALE_SHIFT)) as SANE_Fixed
}

/// Convert SANE's 16.16 fixed-point representation to a double.
pub fn SANE_UNFIX(v: SANE_Fixed) -> f64 {
    f64::from(v) / f64::from(1_i32 << SANE_FIXED_SCALE_SHIFT)
}

pub fn SANE_VERSION_MAJOR(code: SANE_Int) -> SANE_Int {
    (code >> 24) & 0xff
}

pub fn SANE_VERSION_MINOR(code: SANE_Int) -> SANE_Int {
    (code >> 16) & 0xff
}

pub fn SANE_VERSION_BUILD(code: SANE_Int) -> SANE_Int {
    code & 0xffff
}

pub type SANE_Status = c_int;
pub const SANE_STATUS_GOOD: SANE_Status = 0;
pub const SANE_STATUS_UNSUPPORTED: SANE_Status = 1;
pub const SANE_STATUS_CANCELLED: SANE_Status = 2;
pub const SANE_STATUS_DEVICE_BUSY: SANE_Status = 3;
pub const SANE_STATUS_INVAL: SANE_Status = 4;
pub const SANE_STATUS_EOF: SANE_Status = 5;
pub const SANE_STATUS_JAMMED: SANE_Status = 6;
pub const SANE_STATUS_NO_DOCS: SANE_Status = 7;
pub const SANE_STATUS_COVER_OPEN: SANE_Status = 8;
pub const SANE_STATUS_IO_ERROR: SANE_Status = 9;
pub const SANE_STATUS_NO_MEM: SANE_Status = 10;
pub const SANE_STATUS_ACCESS_DENIED: SANE_Status = 11;

pub type SANE_Value_Type = c_int;
pub const SANE_TYPE_BOOL: SANE_Value_Type = 0;
pub const SANE_TYPE_INT: SANE_Value_Type = 1;
pub const SANE_TYPE_FIXED: SANE_Value_Type = 2;
pub const SANE_TYPE_STRING: SANE_Value_Type = 3;
pub const SANE_TYPE_BUTTON: SANE_Value_Type = 4;
pub const SANE_TYPE_GROUP: SANE_Value_Type = 5;

pub type SANE_Unit = c_int;
pub const SANE_UNIT_NONE: SANE_Unit = 0;
pub const SANE_UNIT_PIXEL: SANE_Unit = 1;
pub const SANE_UNIT_BIT: SANE_Unit = 2;
pub const SANE_UNIT_MM: SANE_Unit = 3;
pub const SANE_UNIT_DPI: SANE_Unit = 4;
pub const SANE_UNIT_PERCENT: SANE_Unit = 5;
pub const SANE_UNIT_MICROSECOND: SANE_Unit = 6;

pub const SANE_CAP_SOFT_SELECT: SANE_Int = 1 << 0;
pub const SANE_CAP_HARD_SELECT: SANE_Int = 1 << 1;
pub const SANE_CAP_SOFT_DETECT: SANE_Int = 1 << 2;
pub const SANE_CAP_EMULATED: SANE_Int = 1 << 3;
pub const SANE_CAP_AUTOMATIC: SANE_Int = 1 << 4;
pub const SANE_CAP_INACTIVE: SANE_Int = 1 << 5;
pub const SANE_CAP_ADVANCED: SANE_Int = 1 << 6;

pub const SANE_INFO_INEXACT: SANE_Int = 1 << 0;
pub const SANE_INFO_RELOAD_OPTIONS: SANE_Int = 1 << 1;
pub const SANE_INFO_RELOAD_PARAMS: SANE_Int = 1 << 2;

pub type SANE_Constraint_Type = c_int;
pub const SANE_CONSTRAINT_NONE: SANE_Constraint_Type = 0;
pub const SANE_CONSTRAINT_RANGE: SANE_Constraint_Type = 1;
pub const SANE_CONSTRAINT_WORD_LIST: SANE_Constraint_Type = 2;
pub const SANE_CONSTRAINT_STRING_LIST: SANE_Constraint_Type = 3;

pub type SANE_Action = c_int;
pub const SANE_ACTION_GET_VALUE: SANE_Action = 0;
pub const SANE_ACTION_SET_VALUE: SANE_Action = 1;
pub const SANE_ACTION_SET_AUTO: SANE_Action = 2;

pub type SANE_Frame = c_int;
pub const SANE_FRAME_GRAY: SANE_Frame = 0;
pub const SANE_FRAME_RGB: SANE_Frame = 1;
pub const SANE_FRAME_RED: SANE_Frame = 2;
pub const SANE_FRAME_GREEN: SANE_Frame = 3;
pub const SANE_FRAME_BLUE: SANE_Frame = 4;

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct SANE_Range {
    pub min: SANE_Word,
    pub max: SANE_Word,
    pub quant: SANE_Word,
}

/// Constraint payload; which member is valid depends on `constraint_type`.
#[repr(C)]
#[derive(Clone, Copy)]
pub union SANE_Constraint {
    /// NULL-terminated list of strings.
    pub string_list: *const SANE_String_Const,
    /// Word list; element 0 holds the number of entries that follow.
    pub word_list: *const SANE_Word,
    pub range: *const SANE_Range,
}

#[repr(C)]
#[derive(Clone, Copy)]
pub struct SANE_Option_Descriptor {
    pub name: SANE_String_Const,
    pub title: SANE_String_Const,
    pub desc: SANE_String_Const,
    pub type_: SANE_Value_Type,
    pub unit: SANE_Unit,
    pub size: SANE_Int,
    pub cap: SANE_Int,
    pub constraint_type: SANE_Constraint_Type,
    pub constraint: SANE_Constraint,
}

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct SANE_Device {
    pub name: SANE_String_Const,
    pub vendor: SANE_String_Const,
    pub model: SANE_String_Const,
    pub type_: SANE_String_Const,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct SANE_Parameters {
    pub format: SANE_Frame,
    pub last_frame: SANE_Bool,
    pub bytes_per_line: SANE_Int,
    pub pixels_per_line: SANE_Int,
    pub lines: SANE_Int,
    pub depth: SANE_Int,
}

pub const SANE_MAX_USERNAME_LEN: usize = 128;
pub const SANE_MAX_PASSWORD_LEN: usize = 128;

pub type SANE_Auth_Callback = Option<
    unsafe extern "C" fn(
        resource: SANE_String_Const,
        username: *mut SANE_Char,
        password: *mut SANE_Char,
    ),
>;

extern "C" {
    pub fn sane_init(version_code: *mut SANE_Int, authorize: SANE_Auth_Callback) -> SANE_Status;
    pub fn sane_exit();
    pub fn sane_get_devices(
        device_list: *mut *mut *const SANE_Device,
        local_only: SANE_Bool,
    ) -> SANE_Status;
    pub fn sane_open(devicename: SANE_String_Const, handle: *mut SANE_Handle) -> SANE_Status;
    pub fn sane_close(handle: SANE_Handle);
    pub fn sane_get_option_descriptor(
        handle: SANE_Handle,
        option: SANE_Int,
    ) -> *const SANE_Option_Descriptor;
    pub fn sane_control_option(
        handle: SANE_Handle,
        option: SANE_Int,
        action: SANE_Action,
        value: *mut c_void,
        info: *mut SANE_Int,
    ) -> SANE_Status;
    pub fn sane_get_parameters(handle: SANE_Handle, params: *mut SANE_Parameters) -> SANE_Status;
    pub fn sane_start(handle: SANE_Handle) -> SANE_Status;
    pub fn sane_read(
        handle: SANE_Handle,
        data: *mut SANE_Byte,
        max_length: SANE_Int,
        length: *mut SANE_Int,
    ) -> SANE_Status;
    pub fn sane_cancel(handle: SANE_Handle);
    pub fn sane_set_io_mode(handle: SANE_Handle, non_blocking: SANE_Bool) -> SANE_Status;
    pub fn sane_get_select_fd(handle: SANE_Handle, fd: *mut SANE_Int) -> SANE_Status;
    pub fn sane_strstatus(status: SANE_Status) -> SANE_String_Const;
}
