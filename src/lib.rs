//! Sane-Capture: safe bindings for SANE scanners
//!
//! This library wraps the SANE C library behind trait-based abstractions,
//! enabling both production use with real scanners and testing with mock
//! devices. Device options are exposed as validated named reads and writes;
//! acquired frames convert to images or arrays.

pub mod config;
pub mod error;
pub mod frame;
pub mod latin1;
pub mod option;
pub mod pixels;
pub mod registry;
pub mod scanner;
pub mod traits;

#[cfg(feature = "sane")]
#[allow(unsafe_code)]
pub mod device;

#[cfg(test)]
pub mod mock;

pub use config::{OptionSetting, ScanSettings};
#[cfg(feature = "sane")]
pub use device::{Sane, SaneHandle};
pub use error::{ErrorKind, ScanError, Status};
pub use frame::{Frame, FrameArray};
pub use option::{Capabilities, Constraint, OptionDescriptor, OptionValue, SetInfo, Unit, ValueType};
pub use registry::OptionRegistry;
pub use scanner::{Attribute, MultiScan, ScanArea, Scanner, SessionState, SetOutcome};
pub use traits::{
    Backend, DeviceHandle, DeviceInfo, FrameFormat, Parameters, RawFrame, Result, Version,
};
