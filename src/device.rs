//! SANE device implementation on top of `libsane`.

use std::ffi::{c_char, c_void, CStr, CString};
use std::ptr::{self, NonNull};
use std::sync::{Arc, Mutex, OnceLock, PoisonError, Weak};

use tracing::{debug, info, warn};

use sane_sys::{
    SANE_Int, SANE_Option_Descriptor, SANE_Status, SANE_Word, SANE_ACTION_GET_VALUE,
    SANE_ACTION_SET_AUTO, SANE_ACTION_SET_VALUE, SANE_CONSTRAINT_RANGE,
    SANE_CONSTRAINT_STRING_LIST, SANE_CONSTRAINT_WORD_LIST, SANE_STATUS_EOF, SANE_STATUS_GOOD,
    SANE_TYPE_FIXED,
};

use crate::error::{Result, ScanError, Status};
use crate::latin1;
use crate::option::{Constraint, OptionRecord, OptionValue, SetInfo, ValueType};
use crate::pixels;
use crate::scanner::Scanner;
use crate::traits::{
    Backend, DeviceHandle, DeviceInfo, FrameFormat, Parameters, RawFrame, Version,
};

/// Bytes requested per `sane_read` call.
const READ_CHUNK: usize = 32 * 1024;

fn check(operation: &'static str, status: SANE_Status) -> Result<()> {
    if status == SANE_STATUS_GOOD {
        Ok(())
    } else {
        Err(ScanError::device(operation, Status::from_raw(status)))
    }
}

/// Copy a C string owned by the backend.
///
/// # Safety
///
/// `ptr` must be null or point to a NUL-terminated string.
unsafe fn latin1_string(ptr: *const c_char) -> String {
    if ptr.is_null() {
        return String::new();
    }
    latin1::decode(CStr::from_ptr(ptr).to_bytes())
}

fn c_string(s: &str) -> Result<CString> {
    CString::new(latin1::encode(s)?).map_err(|_| ScanError::InvalidName(s.to_owned()))
}

fn to_index(index: usize) -> Result<SANE_Int> {
    SANE_Int::try_from(index).map_err(|_| ScanError::device("control_option", Status::Invalid))
}

/// Initialized library. Dropping the last clone (and every handle opened
/// through it) calls `sane_exit`.
struct SaneContext {
    version: Version,
}

impl Drop for SaneContext {
    fn drop(&mut self) {
        debug!("Shutting down SANE");
        // SAFETY: every handle holds an Arc to this context, so none is open.
        unsafe { sane_sys::sane_exit() };
    }
}

/// Live context, shared so that repeated `Sane::init` calls do not nest
/// `sane_init`.
fn live_context() -> &'static Mutex<Weak<SaneContext>> {
    static CONTEXT: OnceLock<Mutex<Weak<SaneContext>>> = OnceLock::new();
    CONTEXT.get_or_init(|| Mutex::new(Weak::new()))
}

/// Entry point to the SANE library.
#[derive(Clone)]
pub struct Sane {
    context: Arc<SaneContext>,
}

impl std::fmt::Debug for Sane {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sane")
            .field("version", &self.context.version)
            .finish()
    }
}

impl Sane {
    /// Initialize the library, or join the context that is already live.
    pub fn init() -> Result<Self> {
        let mut live = live_context()
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(context) = live.upgrade() {
            return Ok(Self { context });
        }

        let mut code: SANE_Int = 0;
        // SAFETY: no other context is live; no authorization callback.
        check("init", unsafe { sane_sys::sane_init(&mut code, None) })?;
        let version = Version {
            code,
            major: sane_sys::SANE_VERSION_MAJOR(code),
            minor: sane_sys::SANE_VERSION_MINOR(code),
            build: sane_sys::SANE_VERSION_BUILD(code),
        };
        info!(%version, "SANE initialized");

        let context = Arc::new(SaneContext { version });
        *live = Arc::downgrade(&context);
        Ok(Self { context })
    }

    /// Version reported by `sane_init`.
    pub fn version(&self) -> Version {
        self.context.version
    }

    /// Open a scanner session on the device `name`.
    pub fn open_scanner(&self, name: &str) -> Result<Scanner<Self>> {
        Scanner::open(self, name)
    }
}

impl Backend for Sane {
    type Handle = SaneHandle;

    fn devices(&self, local_only: bool) -> Result<Vec<DeviceInfo>> {
        let mut list: *mut *const sane_sys::SANE_Device = ptr::null_mut();
        // SAFETY: the library is initialized; `list` receives a
        // backend-owned array valid until the next call.
        check("get_devices", unsafe {
            sane_sys::sane_get_devices(&mut list, i32::from(local_only))
        })?;

        let mut devices = Vec::new();
        if list.is_null() {
            return Ok(devices);
        }
        for offset in 0.. {
            // SAFETY: the array is NULL-terminated and we stop at the NULL.
            let entry = unsafe { *list.add(offset) };
            // SAFETY: non-null entries point to valid device records.
            let Some(device) = (unsafe { entry.as_ref() }) else {
                break;
            };
            // SAFETY: record fields are NUL-terminated strings.
            devices.push(unsafe {
                DeviceInfo {
                    name: latin1_string(device.name),
                    vendor: latin1_string(device.vendor),
                    model: latin1_string(device.model),
                    kind: latin1_string(device.type_),
                }
            });
        }
        debug!(count = devices.len(), local_only, "Enumerated devices");
        Ok(devices)
    }

    fn open(&self, name: &str) -> Result<Self::Handle> {
        let c_name = c_string(name)?;
        let mut raw: sane_sys::SANE_Handle = ptr::null_mut();
        // SAFETY: `c_name` is NUL-terminated and outlives the call.
        check("open", unsafe { sane_sys::sane_open(c_name.as_ptr(), &mut raw) })?;
        let handle =
            NonNull::new(raw).ok_or_else(|| ScanError::device("open", Status::Invalid))?;
        debug!(device = %name, "Device opened");
        Ok(SaneHandle {
            handle,
            name: name.to_owned(),
            _context: Arc::clone(&self.context),
        })
    }
}

/// Open SANE device. Closed when dropped.
pub struct SaneHandle {
    handle: NonNull<c_void>,
    name: String,
    _context: Arc<SaneContext>,
}

// SAFETY: a SANE handle is not tied to the thread that opened it. It is
// not Sync; every call goes through a unique or shared borrow of the handle,
// and the session only drives it through `&mut self`.
unsafe impl Send for SaneHandle {}

impl Drop for SaneHandle {
    fn drop(&mut self) {
        debug!(device = %self.name, "Closing SANE device");
        // SAFETY: handle is valid and we own it
        unsafe { sane_sys::sane_close(self.raw()) };
    }
}

impl std::fmt::Debug for SaneHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SaneHandle").field("name", &self.name).finish()
    }
}

/// Decode one constraint word according to the option type.
fn word_value(type_code: i32, word: SANE_Word) -> OptionValue {
    if type_code == SANE_TYPE_FIXED {
        OptionValue::Float(sane_sys::SANE_UNFIX(word))
    } else {
        OptionValue::Int(i64::from(word))
    }
}

/// Copy a native descriptor into an owned record.
///
/// # Safety
///
/// `desc` must be a descriptor returned by `sane_get_option_descriptor`
/// and not yet invalidated by an option reload.
unsafe fn record_from_raw(index: usize, desc: &SANE_Option_Descriptor) -> OptionRecord {
    let constraint = match desc.constraint_type {
        SANE_CONSTRAINT_RANGE => desc.constraint.range.as_ref().map_or(Constraint::None, |r| {
            Constraint::Range {
                min: word_value(desc.type_, r.min),
                max: word_value(desc.type_, r.max),
                step: word_value(desc.type_, r.quant),
            }
        }),
        SANE_CONSTRAINT_WORD_LIST => {
            let list = desc.constraint.word_list;
            if list.is_null() {
                Constraint::None
            } else {
                let count = usize::try_from(*list).unwrap_or(0);
                Constraint::List(
                    (1..=count)
                        .map(|i| word_value(desc.type_, *list.add(i)))
                        .collect(),
                )
            }
        }
        SANE_CONSTRAINT_STRING_LIST => {
            let list = desc.constraint.string_list;
            let mut values = Vec::new();
            if !list.is_null() {
                let mut offset = 0;
                while !(*list.add(offset)).is_null() {
                    values.push(OptionValue::String(latin1_string(*list.add(offset))));
                    offset += 1;
                }
            }
            Constraint::List(values)
        }
        _ => Constraint::None,
    };

    #[allow(clippy::cast_sign_loss)]
    let cap = desc.cap as u32;
    OptionRecord {
        index,
        name: latin1_string(desc.name),
        title: latin1_string(desc.title),
        desc: latin1_string(desc.desc),
        type_code: desc.type_,
        unit_code: desc.unit,
        size: usize::try_from(desc.size).unwrap_or(0),
        cap,
        constraint,
    }
}

impl SaneHandle {
    fn raw(&self) -> *mut c_void {
        self.handle.as_ptr()
    }

    /// Type code and value size of the option at `index`.
    fn layout(&self, index: usize) -> Result<(i32, usize)> {
        // SAFETY: handle is open; a NULL result means out of range.
        let desc = unsafe { sane_sys::sane_get_option_descriptor(self.raw(), to_index(index)?) };
        // SAFETY: non-null descriptors stay valid until the next reload.
        let desc = unsafe { desc.as_ref() }
            .ok_or_else(|| ScanError::device("get_option_descriptor", Status::Invalid))?;
        Ok((desc.type_, usize::try_from(desc.size).unwrap_or(0)))
    }

    /// Word-aligned value buffer with one spare word past `size` bytes.
    fn value_buffer(size: usize) -> Vec<SANE_Word> {
        vec![0; size.div_ceil(std::mem::size_of::<SANE_Word>()) + 1]
    }

    fn control(
        &self,
        operation: &'static str,
        index: usize,
        action: i32,
        value: *mut c_void,
    ) -> Result<SetInfo> {
        let mut info: SANE_Int = 0;
        // SAFETY: handle is open and `value` is null or a buffer sized
        // for the option.
        check(operation, unsafe {
            sane_sys::sane_control_option(self.raw(), to_index(index)?, action, value, &mut info)
        })?;
        #[allow(clippy::cast_sign_loss)]
        let bits = info as u32;
        Ok(SetInfo::from_bits_retain(bits))
    }

    fn read_to_eof(&mut self) -> Result<Vec<u8>> {
        let mut data = Vec::new();
        let mut chunk = vec![0u8; READ_CHUNK];
        let max_len = SANE_Int::try_from(READ_CHUNK).unwrap_or(SANE_Int::MAX);
        loop {
            let mut len: SANE_Int = 0;
            // SAFETY: `chunk` holds `max_len` writable bytes.
            let status =
                unsafe { sane_sys::sane_read(self.raw(), chunk.as_mut_ptr(), max_len, &mut len) };
            match status {
                SANE_STATUS_GOOD => {
                    let len = usize::try_from(len).unwrap_or(0);
                    data.extend_from_slice(chunk.get(..len).unwrap_or_default());
                }
                SANE_STATUS_EOF => return Ok(data),
                other => return Err(ScanError::device("read", Status::from_raw(other))),
            }
        }
    }

    /// Read one pass: parameters first, then the data up to EOF.
    fn read_pass(&mut self) -> Result<(Parameters, Vec<u8>)> {
        let params = self.parameters()?;
        let bytes = self.read_to_eof()?;
        debug!(
            device = %self.name,
            format = %params.format,
            bytes = bytes.len(),
            last = params.last_frame,
            "Frame read"
        );
        Ok((params, bytes))
    }

    /// Read every frame of one image, restarting between the passes of a
    /// three-pass scan.
    fn read_image(&mut self, want_raw: bool) -> Result<RawFrame> {
        let mut first = true;
        let passes = std::iter::from_fn(|| {
            if !std::mem::take(&mut first) {
                // Three-pass scans restart acquisition for each band
                if let Err(err) = self.start() {
                    return Some(Err(err));
                }
            }
            Some(self.read_pass())
        });
        pixels::assemble(passes, want_raw)
    }
}

impl DeviceHandle for SaneHandle {
    fn options(&self) -> Result<Vec<OptionRecord>> {
        let mut count: SANE_Word = 0;
        self.control(
            "control_option",
            0,
            SANE_ACTION_GET_VALUE,
            ptr::addr_of_mut!(count).cast(),
        )?;
        let count = usize::try_from(count).unwrap_or(0);

        let mut records = Vec::with_capacity(count);
        for index in 1..count {
            // SAFETY: handle is open and index is below the option count.
            let desc =
                unsafe { sane_sys::sane_get_option_descriptor(self.raw(), to_index(index)?) };
            // SAFETY: non-null descriptors stay valid until the next reload,
            // and the record is copied out immediately.
            let record = unsafe { desc.as_ref().map(|d| record_from_raw(index, d)) };
            records.push(record.ok_or_else(|| ScanError::MalformedDescriptor {
                index,
                reason: "backend returned no descriptor".to_owned(),
            })?);
        }
        Ok(records)
    }

    fn get_option(&self, index: usize) -> Result<OptionValue> {
        let (type_code, size) = self.layout(index)?;
        let value_type =
            ValueType::from_raw(type_code).ok_or_else(|| ScanError::MalformedDescriptor {
                index,
                reason: format!("unknown value type {type_code}"),
            })?;
        if !value_type.has_value() {
            return Err(ScanError::NoValue {
                name: index.to_string(),
                kind: value_type,
            });
        }

        let mut buffer = Self::value_buffer(size);
        self.control(
            "control_option",
            index,
            SANE_ACTION_GET_VALUE,
            buffer.as_mut_ptr().cast(),
        )?;

        let word = buffer.first().copied().unwrap_or_default();
        Ok(match value_type {
            ValueType::Bool => OptionValue::Bool(word != 0),
            ValueType::Fixed => OptionValue::Float(sane_sys::SANE_UNFIX(word)),
            ValueType::String => {
                let bytes: Vec<u8> = buffer
                    .iter()
                    .flat_map(|w| w.to_ne_bytes())
                    .take_while(|&b| b != 0)
                    .collect();
                OptionValue::String(latin1::decode(&bytes))
            }
            ValueType::Int | ValueType::Button | ValueType::Group => {
                OptionValue::Int(i64::from(word))
            }
        })
    }

    fn set_option(&mut self, index: usize, value: &OptionValue) -> Result<SetInfo> {
        let (type_code, size) = self.layout(index)?;
        let mut buffer = Self::value_buffer(size);
        let clamp = |v: i64| {
            SANE_Word::try_from(v.clamp(i64::from(SANE_Word::MIN), i64::from(SANE_Word::MAX)))
                .unwrap_or_default()
        };
        let word = match (ValueType::from_raw(type_code), value) {
            (Some(ValueType::Bool), OptionValue::Bool(b)) => Some(SANE_Word::from(*b)),
            (Some(ValueType::Bool | ValueType::Int), OptionValue::Int(v)) => Some(clamp(*v)),
            (Some(ValueType::Fixed), OptionValue::Float(v)) => Some(sane_sys::SANE_FIX(*v)),
            (Some(ValueType::String), OptionValue::String(s)) => {
                let bytes = latin1::encode_truncated(s, size)?;
                for (word, chunk) in buffer.iter_mut().zip(bytes.chunks(4)) {
                    let mut quad = [0u8; 4];
                    quad.iter_mut().zip(chunk).for_each(|(d, s)| *d = *s);
                    *word = SANE_Word::from_ne_bytes(quad);
                }
                None
            }
            (expected, _) => {
                return Err(ScanError::TypeMismatch {
                    name: index.to_string(),
                    expected: expected.unwrap_or(ValueType::Group),
                    actual: value.kind(),
                });
            }
        };
        if let (Some(word), Some(slot)) = (word, buffer.first_mut()) {
            *slot = word;
        }

        let info = self.control(
            "control_option",
            index,
            SANE_ACTION_SET_VALUE,
            buffer.as_mut_ptr().cast(),
        )?;
        if info.contains(SetInfo::INEXACT) {
            debug!(device = %self.name, index, "Backend rounded option value");
        }
        Ok(info)
    }

    fn set_auto(&mut self, index: usize) -> Result<SetInfo> {
        self.control("control_option", index, SANE_ACTION_SET_AUTO, ptr::null_mut())
    }

    fn start(&mut self) -> Result<()> {
        // SAFETY: handle is open
        check("start", unsafe { sane_sys::sane_start(self.raw()) })
    }

    fn cancel(&mut self) {
        // SAFETY: handle is open
        unsafe { sane_sys::sane_cancel(self.raw()) };
    }

    fn parameters(&self) -> Result<Parameters> {
        let mut raw = sane_sys::SANE_Parameters::default();
        // SAFETY: handle is open and `raw` is a valid out-parameter.
        check("get_parameters", unsafe {
            sane_sys::sane_get_parameters(self.raw(), &mut raw)
        })?;
        Ok(Parameters {
            format: FrameFormat::from_raw(raw.format),
            last_frame: raw.last_frame != 0,
            pixels_per_line: raw.pixels_per_line,
            lines: raw.lines,
            depth: raw.depth,
            bytes_per_line: raw.bytes_per_line,
        })
    }

    fn snap(&mut self, no_cancel: bool, want_raw: bool) -> Result<RawFrame> {
        let result = self.read_image(want_raw);
        if let Err(err) = &result {
            warn!(device = %self.name, error = %err, "Acquisition failed, cancelling");
        }
        if result.is_err() || !no_cancel {
            self.cancel();
        }
        result
    }

    fn select_fd(&self) -> Result<i32> {
        let mut fd: SANE_Int = -1;
        // SAFETY: handle is open and `fd` is a valid out-parameter.
        check("get_select_fd", unsafe {
            sane_sys::sane_get_select_fd(self.raw(), &mut fd)
        })?;
        Ok(fd)
    }
}
