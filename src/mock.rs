//! Mock backend implementation for testing without hardware.
//!
//! State is shared between the backend and every handle it opens, so a test
//! can keep a `MockBackend` clone to script failures and inspect the calls a
//! `Scanner` made.

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;

use crate::error::{Result, ScanError, Status};
use crate::option::{Capabilities, Constraint, OptionRecord, OptionValue, SetInfo};
use crate::traits::{Backend, DeviceHandle, DeviceInfo, FrameFormat, Parameters, RawFrame};

/// Native call observed by the mock.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    /// `open(name)`.
    Open(String),
    /// Option listing.
    Options,
    /// `get_option(index)`.
    Get(usize),
    /// `set_option(index, value)`.
    Set(usize, OptionValue),
    /// `set_auto(index)`.
    SetAuto(usize),
    /// `start()`.
    Start,
    /// `cancel()`, explicit or issued by snap.
    Cancel,
    /// `snap(no_cancel, want_raw)`.
    Snap {
        /// Keep the device running after the read.
        no_cancel: bool,
        /// Keep 16-bit samples.
        want_raw: bool,
    },
    /// Handle dropped.
    Close,
}

/// Scripted option for the mock option list.
#[derive(Debug, Clone)]
pub struct MockOption {
    name: String,
    title: String,
    type_code: i32,
    unit_code: i32,
    cap: Capabilities,
    constraint: Constraint,
    value: Option<OptionValue>,
}

impl MockOption {
    fn new(name: &str, type_code: i32, value: Option<OptionValue>) -> Self {
        Self {
            name: name.to_owned(),
            title: name.to_owned(),
            type_code,
            unit_code: 0,
            cap: Capabilities::SOFT_SELECT | Capabilities::SOFT_DETECT,
            constraint: Constraint::None,
            value,
        }
    }

    /// Group header.
    pub fn group(title: &str) -> Self {
        let mut opt = Self::new("", 5, None);
        opt.title = title.to_owned();
        opt.cap = Capabilities::empty();
        opt
    }

    /// Boolean option.
    pub fn bool(name: &str, value: bool) -> Self {
        Self::new(name, 0, Some(OptionValue::Bool(value)))
    }

    /// Integer option.
    pub fn int(name: &str, value: i64) -> Self {
        Self::new(name, 1, Some(OptionValue::Int(value)))
    }

    /// Fixed-point option, in millimetres.
    pub fn fixed(name: &str, value: f64) -> Self {
        let mut opt = Self::new(name, 2, Some(OptionValue::Float(value)));
        opt.unit_code = 3;
        opt
    }

    /// String option constrained to a list.
    pub fn string(name: &str, value: &str, choices: &[&str]) -> Self {
        let mut opt = Self::new(name, 3, Some(OptionValue::from(value)));
        opt.constraint = Constraint::List(choices.iter().map(|c| OptionValue::from(*c)).collect());
        opt
    }

    /// Button.
    pub fn button(name: &str) -> Self {
        Self::new(name, 4, None)
    }

    /// Raw type code, for malformed descriptors.
    #[must_use]
    pub fn with_type_code(mut self, type_code: i32) -> Self {
        self.type_code = type_code;
        self
    }

    /// Mark the option inactive.
    #[must_use]
    pub fn inactive(mut self) -> Self {
        self.cap |= Capabilities::INACTIVE;
        self
    }

    /// Make the option readable but not settable by software.
    #[must_use]
    pub fn read_only(mut self) -> Self {
        self.cap.remove(Capabilities::SOFT_SELECT);
        self
    }

    /// Give the option an automatic setting.
    #[must_use]
    pub fn automatic(mut self) -> Self {
        self.cap |= Capabilities::AUTOMATIC;
        self
    }
}

#[derive(Debug, Default)]
struct MockState {
    devices: Vec<DeviceInfo>,
    options: Vec<MockOption>,
    reloads: HashMap<String, Vec<MockOption>>,
    set_failures: HashMap<String, Status>,
    listing_failure: Option<Status>,
    start_results: VecDeque<std::result::Result<(), Status>>,
    snap_results: VecDeque<std::result::Result<RawFrame, Status>>,
    parameters: Option<Parameters>,
    calls: Vec<Call>,
}

impl MockState {
    fn option_at(&self, index: usize) -> Option<&MockOption> {
        index.checked_sub(1).and_then(|pos| self.options.get(pos))
    }
}

/// Mock backend for testing without hardware.
#[derive(Debug, Clone, Default)]
pub struct MockBackend {
    state: Rc<RefCell<MockState>>,
}

impl MockBackend {
    /// Create a backend with a single device named `mock:0`.
    #[must_use]
    pub fn new() -> Self {
        let backend = Self::default();
        backend.state.borrow_mut().devices.push(DeviceInfo {
            name: "mock:0".to_owned(),
            vendor: "Noname".to_owned(),
            model: "Mock flatbed".to_owned(),
            kind: "virtual device".to_owned(),
        });
        backend
    }

    /// Set the option list every handle reports.
    #[must_use]
    pub fn with_options(self, options: Vec<MockOption>) -> Self {
        self.state.borrow_mut().options = options;
        self
    }

    /// Writing `name` replaces the option list and reports a reload.
    #[must_use]
    pub fn with_reload_on(self, name: &str, options: Vec<MockOption>) -> Self {
        self.state
            .borrow_mut()
            .reloads
            .insert(name.to_owned(), options);
        self
    }

    /// Writing `name` fails with `status`.
    #[must_use]
    pub fn with_set_failure(self, name: &str, status: Status) -> Self {
        self.state
            .borrow_mut()
            .set_failures
            .insert(name.to_owned(), status);
        self
    }

    /// Queue the outcomes of successive `start` calls; once drained, starts succeed.
    #[must_use]
    pub fn with_start_results(self, results: Vec<std::result::Result<(), Status>>) -> Self {
        self.state.borrow_mut().start_results = results.into();
        self
    }

    /// Queue the outcomes of successive `snap` calls; once drained, a gradient is produced.
    #[must_use]
    pub fn with_snap_results(self, results: Vec<std::result::Result<RawFrame, Status>>) -> Self {
        self.state.borrow_mut().snap_results = results.into();
        self
    }

    /// Set the parameters every handle reports.
    #[must_use]
    pub fn with_parameters(self, parameters: Parameters) -> Self {
        self.state.borrow_mut().parameters = Some(parameters);
        self
    }

    /// Make subsequent option listings fail.
    pub fn fail_option_listing(&self, status: Status) {
        self.state.borrow_mut().listing_failure = Some(status);
    }

    /// Calls observed so far.
    pub fn calls(&self) -> Vec<Call> {
        self.state.borrow().calls.clone()
    }

    /// Calls other than `Open`, `Options` and `Close`, i.e. the ones that
    /// touch option values or acquisition.
    pub fn value_calls(&self) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|c| !matches!(c, Call::Open(_) | Call::Options | Call::Close))
            .collect()
    }
}

impl Backend for MockBackend {
    type Handle = MockHandle;

    fn devices(&self, _local_only: bool) -> Result<Vec<DeviceInfo>> {
        Ok(self.state.borrow().devices.clone())
    }

    fn open(&self, name: &str) -> Result<Self::Handle> {
        let mut state = self.state.borrow_mut();
        state.calls.push(Call::Open(name.to_owned()));
        if !state.devices.iter().any(|d| d.name == name) {
            return Err(ScanError::device("open", Status::Invalid));
        }
        Ok(MockHandle {
            state: Rc::clone(&self.state),
        })
    }
}

/// Handle onto the shared mock state.
#[derive(Debug)]
pub struct MockHandle {
    state: Rc<RefCell<MockState>>,
}

impl Drop for MockHandle {
    fn drop(&mut self) {
        self.state.borrow_mut().calls.push(Call::Close);
    }
}

impl DeviceHandle for MockHandle {
    fn options(&self) -> Result<Vec<OptionRecord>> {
        let mut state = self.state.borrow_mut();
        state.calls.push(Call::Options);
        if let Some(status) = state.listing_failure {
            return Err(ScanError::device("get_option_descriptor", status));
        }
        Ok(state
            .options
            .iter()
            .enumerate()
            .map(|(pos, opt)| OptionRecord {
                index: pos + 1,
                name: opt.name.clone(),
                title: opt.title.clone(),
                desc: String::new(),
                type_code: opt.type_code,
                unit_code: opt.unit_code,
                size: 4,
                cap: opt.cap.bits(),
                constraint: opt.constraint.clone(),
            })
            .collect())
    }

    fn get_option(&self, index: usize) -> Result<OptionValue> {
        let mut state = self.state.borrow_mut();
        state.calls.push(Call::Get(index));
        state
            .option_at(index)
            .and_then(|opt| opt.value.clone())
            .ok_or_else(|| ScanError::device("get_option", Status::Invalid))
    }

    fn set_option(&mut self, index: usize, value: &OptionValue) -> Result<SetInfo> {
        let mut state = self.state.borrow_mut();
        state.calls.push(Call::Set(index, value.clone()));
        let name = state
            .option_at(index)
            .map(|opt| opt.name.clone())
            .ok_or_else(|| ScanError::device("set_option", Status::Invalid))?;
        if let Some(status) = state.set_failures.get(&name) {
            return Err(ScanError::device("set_option", *status));
        }
        if let Some(opt) = index.checked_sub(1).and_then(|pos| state.options.get_mut(pos)) {
            opt.value = Some(value.clone());
        }
        if let Some(options) = state.reloads.get(&name).cloned() {
            state.options = options;
            return Ok(SetInfo::RELOAD_OPTIONS | SetInfo::RELOAD_PARAMS);
        }
        Ok(SetInfo::empty())
    }

    fn set_auto(&mut self, index: usize) -> Result<SetInfo> {
        self.state.borrow_mut().calls.push(Call::SetAuto(index));
        Ok(SetInfo::empty())
    }

    fn start(&mut self) -> Result<()> {
        let mut state = self.state.borrow_mut();
        state.calls.push(Call::Start);
        match state.start_results.pop_front() {
            Some(Err(status)) => Err(ScanError::device("start", status)),
            Some(Ok(())) | None => Ok(()),
        }
    }

    fn cancel(&mut self) {
        self.state.borrow_mut().calls.push(Call::Cancel);
    }

    fn parameters(&self) -> Result<Parameters> {
        Ok(self.state.borrow().parameters.unwrap_or(Parameters {
            format: FrameFormat::Gray,
            last_frame: true,
            pixels_per_line: 64,
            lines: 48,
            depth: 8,
            bytes_per_line: 64,
        }))
    }

    fn snap(&mut self, no_cancel: bool, want_raw: bool) -> Result<RawFrame> {
        let params = self.parameters()?;
        let mut state = self.state.borrow_mut();
        state.calls.push(Call::Snap {
            no_cancel,
            want_raw,
        });
        let result = state.snap_results.pop_front();
        if !no_cancel || matches!(result, Some(Err(_))) {
            state.calls.push(Call::Cancel);
        }
        match result {
            Some(Ok(frame)) => Ok(frame),
            Some(Err(status)) => Err(ScanError::device("read", status)),
            None => Ok(generate_gradient(&params)),
        }
    }

    fn select_fd(&self) -> Result<i32> {
        Err(ScanError::device("get_select_fd", Status::Unsupported))
    }
}

/// Generate a horizontal gray gradient matching `params`.
fn generate_gradient(params: &Parameters) -> RawFrame {
    let width = u32::try_from(params.pixels_per_line).unwrap_or(0);
    let height = u32::try_from(params.lines).unwrap_or(0);
    let mut data = Vec::with_capacity((width * height) as usize);
    for _ in 0..height {
        for x in 0..width {
            #[allow(clippy::cast_possible_truncation)]
            data.push(((x * 255) / width.max(1)) as u8);
        }
    }
    RawFrame {
        data,
        width,
        height,
        samples: 1,
        sample_size: 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_device_enumeration() {
        let backend = MockBackend::new();
        let devices = backend.devices(false).expect("devices should succeed");
        assert_eq!(devices.len(), 1);
        assert_eq!(devices[0].name, "mock:0");
    }

    #[test]
    fn test_mock_open_unknown_device_fails() {
        let backend = MockBackend::new();
        let err = backend.open("mock:9").expect_err("no such device");
        assert_eq!(err.status(), Some(Status::Invalid));
    }

    #[test]
    fn test_mock_handle_records_close() {
        let backend = MockBackend::new();
        drop(backend.open("mock:0").expect("open should succeed"));
        assert_eq!(
            backend.calls(),
            vec![Call::Open("mock:0".to_owned()), Call::Close]
        );
    }

    #[test]
    fn test_gradient_pattern() {
        let mut handle = MockBackend::new().open("mock:0").expect("open should succeed");
        let frame = handle.snap(false, false).expect("snap should succeed");

        assert_eq!(frame.data.len(), 64 * 48);
        // Left edge dark, right edge bright
        assert_eq!(frame.data[0], 0);
        assert!(frame.data[63] > 200);
    }
}
