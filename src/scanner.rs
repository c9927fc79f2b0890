//! Scanner sessions: validated option access and acquisition lifecycle.
//!
//! A [`Scanner`] owns one open device handle together with the option
//! registry loaded from it. Option reads and writes go through named lookups
//! which are checked against the current descriptors before anything reaches
//! the device.

use std::cell::OnceCell;
use std::collections::HashMap;
use std::fmt;

use image::DynamicImage;
use tracing::{debug, info, warn};

use crate::error::{Result, ScanError};
use crate::frame::{Frame, FrameArray};
use crate::option::{normalize_name, OptionDescriptor, OptionValue, SetInfo, ValueType};
use crate::registry::OptionRegistry;
use crate::traits::{Backend, DeviceHandle, DeviceInfo, Parameters};

/// Lifecycle state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Device open, no acquisition in progress.
    Open,
    /// Acquisition started, frame not yet retrieved.
    Started,
    /// Acquisition cancelled; a new start is allowed.
    Cancelled,
    /// Device closed. Terminal.
    Closed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Open => write!(f, "open"),
            Self::Started => write!(f, "started"),
            Self::Cancelled => write!(f, "cancelled"),
            Self::Closed => write!(f, "closed"),
        }
    }
}

/// Scan window in the unit of the geometry options (usually mm).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScanArea {
    /// Top-left x.
    pub tl_x: f64,
    /// Top-left y.
    pub tl_y: f64,
    /// Bottom-right x.
    pub br_x: f64,
    /// Bottom-right y.
    pub br_y: f64,
}

/// Result of a named read.
#[derive(Debug, Clone, PartialEq)]
pub enum Attribute {
    /// Option value or stored field.
    Value(OptionValue),
    /// Enumeration entry of this device.
    Signature(DeviceInfo),
    /// Vendor and model.
    Model {
        /// Device vendor.
        vendor: String,
        /// Device model.
        model: String,
    },
    /// Scan window.
    Area(ScanArea),
    /// Names of all options in the current registry.
    OptionNames(Vec<String>),
    /// Name the device was opened with.
    DeviceName(String),
}

/// Result of a named write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetOutcome {
    /// Name is not an option; the value was kept as a plain field.
    Stored,
    /// Value was written to the device.
    Applied {
        /// Info word reported by the backend.
        info: SetInfo,
        /// Whether the option registry was replaced.
        reloaded: bool,
    },
}

impl SetOutcome {
    /// Whether the write caused an option reload.
    pub const fn reloaded(self) -> bool {
        matches!(self, Self::Applied { reloaded: true, .. })
    }

    /// Whether the backend rounded the written value.
    pub const fn inexact(self) -> bool {
        match self {
            Self::Applied { info, .. } => info.contains(SetInfo::INEXACT),
            Self::Stored => false,
        }
    }
}

/// Computed session properties, with the accessor that serves each one.
fn reserved_accessor(key: &str) -> Option<&'static str> {
    match key {
        "area" => Some("area"),
        "signature" | "sane_signature" => Some("signature"),
        "model" | "scanner_model" => Some("model"),
        "optlist" | "option_names" => Some("option_names"),
        "devname" | "name" | "dev" | "handle" => Some("name"),
        _ => None,
    }
}

/// An open scanner device.
pub struct Scanner<B: Backend> {
    backend: B,
    name: String,
    handle: Option<B::Handle>,
    registry: OptionRegistry,
    signature: OnceCell<DeviceInfo>,
    state: SessionState,
    fields: HashMap<String, OptionValue>,
}

impl<B: Backend> fmt::Debug for Scanner<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scanner")
            .field("name", &self.name)
            .field("state", &self.state)
            .field("options", &self.registry.len())
            .finish_non_exhaustive()
    }
}

impl<B: Backend + Clone> Scanner<B> {
    /// Open the device `name` and load its options.
    pub fn open(backend: &B, name: &str) -> Result<Self> {
        info!(device = %name, "Opening scanner");
        let handle = backend.open(name)?;
        let registry = OptionRegistry::load(&handle)?;
        info!(device = %name, options = registry.len(), "Scanner opened");
        Ok(Self {
            backend: backend.clone(),
            name: name.to_owned(),
            handle: Some(handle),
            registry,
            signature: OnceCell::new(),
            state: SessionState::Open,
            fields: HashMap::new(),
        })
    }
}

impl<B: Backend> Scanner<B> {
    /// Name the device was opened with.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current lifecycle state.
    pub const fn state(&self) -> SessionState {
        self.state
    }

    /// The currently loaded option registry.
    pub const fn registry(&self) -> &OptionRegistry {
        &self.registry
    }

    fn handle(&self) -> Result<&B::Handle> {
        self.handle.as_ref().ok_or(ScanError::Closed)
    }

    fn handle_mut(&mut self) -> Result<&mut B::Handle> {
        self.handle.as_mut().ok_or(ScanError::Closed)
    }

    /// The device's enumeration entry, looked up once and cached.
    pub fn signature(&self) -> Result<DeviceInfo> {
        if let Some(info) = self.signature.get() {
            return Ok(info.clone());
        }
        let info = self
            .backend
            .devices(false)?
            .into_iter()
            .find(|d| d.name == self.name)
            .ok_or_else(|| ScanError::UnknownDevice(self.name.clone()))?;
        Ok(self.signature.get_or_init(|| info).clone())
    }

    /// Vendor and model of the device.
    pub fn model(&self) -> Result<(String, String)> {
        let info = self.signature()?;
        Ok((info.vendor, info.model))
    }

    /// Scan window from the `tl-x`, `tl-y`, `br-x` and `br-y` options.
    pub fn area(&self) -> Result<ScanArea> {
        let coord = |name: &str| -> Result<f64> {
            let value = self.get(name)?;
            value.as_f64().ok_or(ScanError::TypeMismatch {
                name: name.to_owned(),
                expected: ValueType::Fixed,
                actual: value.kind(),
            })
        };
        Ok(ScanArea {
            tl_x: coord("tl_x")?,
            tl_y: coord("tl_y")?,
            br_x: coord("br_x")?,
            br_y: coord("br_y")?,
        })
    }

    /// Normalized names of all valued options, in backend order.
    pub fn option_names(&self) -> Result<Vec<String>> {
        self.handle()?;
        Ok(self.registry.names())
    }

    /// Descriptor of a non-group option.
    pub fn option(&self, name: &str) -> Result<&OptionDescriptor> {
        self.handle()?;
        self.registry
            .get(name)
            .ok_or_else(|| ScanError::UnknownOption(normalize_name(name)))
    }

    /// Help block for one option, ending with its current value.
    pub fn describe(&self, name: &str) -> Result<String> {
        let desc = self.option(name)?;
        let value = if !desc.has_value() {
            "<none>".to_owned()
        } else if !desc.is_active() {
            "<inactive>".to_owned()
        } else {
            self.get(desc.name())?.to_string()
        };
        Ok(format!("{desc}\nCur value: {value}"))
    }

    /// All descriptors in backend order, groups included.
    pub fn descriptors(&self) -> impl Iterator<Item = &OptionDescriptor> {
        self.registry.iter()
    }

    /// Read any named attribute: computed session properties, option
    /// values, or fields stored by earlier writes.
    pub fn attribute(&self, name: &str) -> Result<Attribute> {
        let key = normalize_name(name);
        match reserved_accessor(&key) {
            Some("signature") => self.signature().map(Attribute::Signature),
            Some("model") => self
                .model()
                .map(|(vendor, model)| Attribute::Model { vendor, model }),
            Some("area") => self.area().map(Attribute::Area),
            Some("option_names") => self.option_names().map(Attribute::OptionNames),
            Some(accessor) if matches!(key.as_str(), "dev" | "handle") => {
                Err(ScanError::ReservedAttribute { name: key, accessor })
            }
            Some(_) => Ok(Attribute::DeviceName(self.name.clone())),
            None => self.get(&key).map(Attribute::Value),
        }
    }

    /// Read an option value or a stored field.
    pub fn get(&self, name: &str) -> Result<OptionValue> {
        let key = normalize_name(name);
        if let Some(accessor) = reserved_accessor(&key) {
            return Err(ScanError::ReservedAttribute {
                name: key,
                accessor,
            });
        }
        let handle = self.handle()?;
        if let Some(value) = self.fields.get(&key) {
            return Ok(value.clone());
        }
        let desc = self
            .registry
            .get(&key)
            .ok_or_else(|| ScanError::UnknownOption(key.clone()))?;
        if !desc.has_value() {
            return Err(ScanError::NoValue {
                name: key,
                kind: desc.value_type(),
            });
        }
        if !desc.is_active() {
            return Err(ScanError::Inactive(key));
        }
        handle.get_option(desc.index())
    }

    /// Check that `key` names an active, software-settable valued option.
    fn writable(&self, key: &str) -> Result<Option<&OptionDescriptor>> {
        let Some(desc) = self.registry.get(key) else {
            return Ok(None);
        };
        if !desc.has_value() {
            return Err(ScanError::NoValue {
                name: key.to_owned(),
                kind: desc.value_type(),
            });
        }
        if !desc.is_active() {
            return Err(ScanError::Inactive(key.to_owned()));
        }
        if !desc.is_settable() {
            return Err(ScanError::NotSettable(key.to_owned()));
        }
        Ok(Some(desc))
    }

    /// Write an option value.
    ///
    /// Names that are not options of the current registry are stored as
    /// plain fields without touching the device. When the backend reports
    /// that the option set changed, the registry is reloaded.
    pub fn set<V: Into<OptionValue>>(&mut self, name: &str, value: V) -> Result<SetOutcome> {
        let key = normalize_name(name);
        if reserved_accessor(&key).is_some() {
            return Err(ScanError::ReadOnly(key));
        }
        self.handle()?;
        let value = value.into();

        let target = self
            .writable(&key)?
            .map(|desc| (desc.index(), desc.value_type()));
        let Some((index, value_type)) = target else {
            debug!(device = %self.name, field = %key, "Storing field");
            self.fields.insert(key, value);
            return Ok(SetOutcome::Stored);
        };

        let value = match (value_type, value) {
            (ValueType::Fixed, v @ OptionValue::Int(_)) => {
                OptionValue::Float(v.as_f64().unwrap_or_default())
            }
            (_, v) => v,
        };
        if !value_type.accepts(&value) {
            return Err(ScanError::TypeMismatch {
                name: key,
                expected: value_type,
                actual: value.kind(),
            });
        }

        debug!(device = %self.name, option = %key, index, value = %value, "Setting option");
        let info = self.handle_mut()?.set_option(index, &value)?;
        let reloaded = self.reload_if_needed(info)?;
        Ok(SetOutcome::Applied { info, reloaded })
    }

    /// Let the backend choose the value of an option.
    pub fn set_auto(&mut self, name: &str) -> Result<SetOutcome> {
        let key = normalize_name(name);
        if reserved_accessor(&key).is_some() {
            return Err(ScanError::ReadOnly(key));
        }
        self.handle()?;
        let desc = self
            .writable(&key)?
            .ok_or_else(|| ScanError::UnknownOption(key.clone()))?;
        if !desc.is_automatic() {
            return Err(ScanError::NotAutomatic(key));
        }
        let index = desc.index();

        debug!(device = %self.name, option = %key, index, "Setting option to automatic");
        let info = self.handle_mut()?.set_auto(index)?;
        let reloaded = self.reload_if_needed(info)?;
        Ok(SetOutcome::Applied { info, reloaded })
    }

    fn reload_if_needed(&mut self, info: SetInfo) -> Result<bool> {
        if !info.contains(SetInfo::RELOAD_OPTIONS) {
            return Ok(false);
        }
        let registry = OptionRegistry::load(self.handle()?).inspect_err(|err| {
            warn!(
                device = %self.name,
                error = %err,
                "Option reload failed, keeping previous options"
            );
        })?;
        debug!(
            device = %self.name,
            before = self.registry.len(),
            after = registry.len(),
            "Options reloaded"
        );
        self.registry = registry;
        Ok(true)
    }

    /// Current scan parameters.
    pub fn parameters(&self) -> Result<Parameters> {
        self.handle()?.parameters()
    }

    /// File descriptor that becomes readable when image data is available.
    pub fn select_fd(&self) -> Result<i32> {
        self.handle()?.select_fd()
    }

    /// Initiate acquisition. Valid when open or after a cancel.
    pub fn start(&mut self) -> Result<()> {
        match self.state {
            SessionState::Open | SessionState::Cancelled => {}
            SessionState::Closed => return Err(ScanError::Closed),
            state @ SessionState::Started => {
                return Err(ScanError::InvalidState {
                    operation: "start",
                    state,
                });
            }
        }
        self.handle_mut()?.start()?;
        debug!(device = %self.name, "Acquisition started");
        self.state = SessionState::Started;
        Ok(())
    }

    fn retrieve(&mut self, no_cancel: bool, want_raw: bool) -> Result<Frame> {
        match self.state {
            SessionState::Started => {}
            SessionState::Closed => return Err(ScanError::Closed),
            state => {
                return Err(ScanError::InvalidState {
                    operation: "snap",
                    state,
                });
            }
        }
        match self.handle_mut()?.snap(no_cancel, want_raw) {
            Ok(raw) => {
                self.state = SessionState::Open;
                let frame = Frame::try_from(raw)?;
                debug!(
                    device = %self.name,
                    width = frame.width(),
                    height = frame.height(),
                    samples = frame.samples(),
                    "Frame retrieved"
                );
                Ok(frame)
            }
            Err(err) => {
                self.state = SessionState::Cancelled;
                Err(err)
            }
        }
    }

    /// Retrieve the frame of a started acquisition, 8 bits per sample.
    ///
    /// Unless `no_cancel` is set the device is cancelled after the read,
    /// which a document feeder needs set to keep feeding pages.
    pub fn snap(&mut self, no_cancel: bool) -> Result<Frame> {
        self.retrieve(no_cancel, false)
    }

    /// Retrieve the frame keeping 16-bit samples at full depth.
    pub fn snap_raw(&mut self) -> Result<Frame> {
        self.retrieve(false, true)
    }

    /// Retrieve the frame as an image.
    pub fn snap_image(&mut self, no_cancel: bool) -> Result<DynamicImage> {
        self.snap(no_cancel)?.to_image()
    }

    /// Retrieve the frame as a `(height, width, samples)` array.
    pub fn snap_array(&mut self, no_cancel: bool) -> Result<FrameArray> {
        self.retrieve(no_cancel, true)?.to_array()
    }

    /// Start and retrieve one frame.
    pub fn scan(&mut self) -> Result<Frame> {
        self.start()?;
        self.snap(false)
    }

    /// Start and retrieve one frame as an image.
    pub fn scan_image(&mut self) -> Result<DynamicImage> {
        self.start()?;
        self.snap_image(false)
    }

    /// Start and retrieve one frame as an array.
    pub fn scan_array(&mut self) -> Result<FrameArray> {
        self.start()?;
        self.snap_array(false)
    }

    /// Cancel the current operation.
    pub fn cancel(&mut self) -> Result<()> {
        self.handle_mut()?.cancel();
        debug!(device = %self.name, "Acquisition cancelled");
        self.state = SessionState::Cancelled;
        Ok(())
    }

    /// Close the device. Every later operation fails with `Closed`.
    pub fn close(&mut self) {
        if let Some(handle) = self.handle.take() {
            drop(handle);
            self.registry = OptionRegistry::default();
            info!(device = %self.name, "Scanner closed");
        }
        self.state = SessionState::Closed;
    }

    /// Iterate over the pages of a document feeder.
    ///
    /// Each step starts a new acquisition. The sequence ends when the feeder
    /// runs out of documents; any other error is yielded once and ends it.
    pub fn multi_scan(&mut self) -> MultiScan<'_, B> {
        MultiScan {
            scanner: self,
            done: false,
        }
    }
}

/// Iterator over document feeder pages. Cancels the device when dropped.
pub struct MultiScan<'a, B: Backend> {
    scanner: &'a mut Scanner<B>,
    done: bool,
}

impl<B: Backend> Iterator for MultiScan<'_, B> {
    type Item = Result<Frame>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let result = self.scanner.start().and_then(|()| self.scanner.snap(true));
        match result {
            Ok(frame) => Some(Ok(frame)),
            Err(err) if err.is_end_of_feed() => {
                debug!(device = %self.scanner.name, "Document feeder empty");
                self.done = true;
                None
            }
            Err(err) => {
                self.done = true;
                Some(Err(err))
            }
        }
    }
}

impl<B: Backend> Drop for MultiScan<'_, B> {
    fn drop(&mut self) {
        if self.scanner.state != SessionState::Closed {
            if let Err(err) = self.scanner.cancel() {
                warn!(device = %self.scanner.name, error = %err, "Cancel after feeder scan failed");
            }
        }
    }
}
