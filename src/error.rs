//! Error types for scanner sessions.
//!
//! Errors fall into three classes (see [`ErrorKind`]): configuration errors
//! raised at the option proxy before any native call, device errors reported
//! by the SANE backend and passed through verbatim, and data errors where the
//! native call succeeded but produced unusable pixel data.

use std::fmt;
use thiserror::Error;

use crate::option::ValueType;

/// Result type alias for scanner operations.
pub type Result<T> = std::result::Result<T, ScanError>;

/// SANE status codes, as returned by every native entry point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    /// Operation is not supported.
    Unsupported,
    /// Operation was cancelled.
    Cancelled,
    /// Device is busy; try again later.
    DeviceBusy,
    /// Data is invalid (includes no dev at open).
    Invalid,
    /// No more data available (end-of-file).
    Eof,
    /// Document feeder jammed.
    Jammed,
    /// Document feeder out of documents.
    NoDocs,
    /// Scanner cover is open.
    CoverOpen,
    /// Error during device I/O.
    IoError,
    /// Out of memory.
    NoMem,
    /// Access to resource has been denied.
    AccessDenied,
    /// A status code this crate does not know.
    Unknown(i32),
}

impl Status {
    /// Convert a raw, non-`GOOD` SANE status code.
    pub const fn from_raw(raw: i32) -> Self {
        match raw {
            1 => Self::Unsupported,
            2 => Self::Cancelled,
            3 => Self::DeviceBusy,
            4 => Self::Invalid,
            5 => Self::Eof,
            6 => Self::Jammed,
            7 => Self::NoDocs,
            8 => Self::CoverOpen,
            9 => Self::IoError,
            10 => Self::NoMem,
            11 => Self::AccessDenied,
            other => Self::Unknown(other),
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Texts match sane_strstatus() from sane-backends.
        match self {
            Self::Unsupported => write!(f, "Operation not supported"),
            Self::Cancelled => write!(f, "Operation was cancelled"),
            Self::DeviceBusy => write!(f, "Device busy"),
            Self::Invalid => write!(f, "Invalid argument"),
            Self::Eof => write!(f, "End of file reached"),
            Self::Jammed => write!(f, "Document feeder jammed"),
            Self::NoDocs => write!(f, "Document feeder out of documents"),
            Self::CoverOpen => write!(f, "Scanner cover is open"),
            Self::IoError => write!(f, "Error during device I/O"),
            Self::NoMem => write!(f, "Out of memory"),
            Self::AccessDenied => write!(f, "Access to resource has been denied"),
            Self::Unknown(code) => write!(f, "Unknown SANE status code {code}"),
        }
    }
}

/// Broad classification of a [`ScanError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Rejected by this crate before reaching the device.
    Configuration,
    /// Reported by the native layer.
    Device,
    /// The native call succeeded but the data is unusable.
    Data,
}

/// Errors that can occur when working with SANE devices.
#[derive(Error, Debug)]
pub enum ScanError {
    /// Name is neither an option nor a stored field.
    #[error("No such attribute: {0}")]
    UnknownOption(String),

    /// Buttons and groups carry no value.
    #[error("{kind}s don't have values: {name}")]
    NoValue { name: String, kind: ValueType },

    /// Option exists but is currently inactive.
    #[error("Inactive option: {0}")]
    Inactive(String),

    /// Option cannot be set by software.
    #[error("Option can't be set by software: {0}")]
    NotSettable(String),

    /// Option has no automatic setting.
    #[error("Option has no automatic value: {0}")]
    NotAutomatic(String),

    /// Attempted write to a computed session property.
    #[error("Read-only attribute: {0}")]
    ReadOnly(String),

    /// Computed session property requested through the option path.
    #[error("'{name}' is a session property; use Scanner::{accessor}()")]
    ReservedAttribute {
        name: String,
        accessor: &'static str,
    },

    /// Value kind does not fit the option type.
    #[error("Option {name} is {expected}, got {actual} value")]
    TypeMismatch {
        name: String,
        expected: ValueType,
        actual: &'static str,
    },

    /// Lifecycle operation issued in the wrong state.
    #[error("Cannot {operation} while session is {state}")]
    InvalidState {
        operation: &'static str,
        state: crate::scanner::SessionState,
    },

    /// Session has been closed.
    #[error("Scanner device is closed")]
    Closed,

    /// Device name not found during enumeration.
    #[error("No such scan device '{0}'")]
    UnknownDevice(String),

    /// String that cannot cross the FFI boundary.
    #[error("Invalid string for SANE: {0}")]
    InvalidName(String),

    /// Settings file could not be read or parsed.
    #[error("Invalid scan settings: {0}")]
    Settings(String),

    /// Native SANE call failed.
    #[error("{operation} failed: {status}")]
    Device {
        operation: &'static str,
        status: Status,
    },

    /// Scan completed without delivering any bytes.
    #[error("Scanner returned no data")]
    NoData,

    /// Sample size outside {1, 2} bytes.
    #[error("Unexpected sample size: {0}")]
    UnexpectedSampleSize(u8),

    /// Sample count outside {1, 3}.
    #[error("Unexpected samples per pixel: {0}")]
    UnexpectedSampleCount(u8),

    /// Buffer length disagrees with the frame geometry.
    #[error("Frame data size mismatch: expected {expected} bytes, got {actual}")]
    FrameSize { expected: usize, actual: usize },

    /// Bit depth other than 1, 8 or 16.
    #[error("unsupported pixel depth: {0}")]
    UnsupportedDepth(i32),

    /// Frame format this crate cannot assemble.
    #[error("unsupported frame format: {0}")]
    UnsupportedFormat(String),

    /// Option descriptor from the backend is outside the SANE enumerations.
    #[error("Malformed descriptor for option {index}: {reason}")]
    MalformedDescriptor { index: usize, reason: String },
}

impl ScanError {
    /// Create a device error for a failed native operation.
    pub const fn device(operation: &'static str, status: Status) -> Self {
        Self::Device { operation, status }
    }

    /// Classify this error.
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::UnknownOption(_)
            | Self::NoValue { .. }
            | Self::Inactive(_)
            | Self::NotSettable(_)
            | Self::NotAutomatic(_)
            | Self::ReadOnly(_)
            | Self::ReservedAttribute { .. }
            | Self::TypeMismatch { .. }
            | Self::InvalidState { .. }
            | Self::Closed
            | Self::UnknownDevice(_)
            | Self::InvalidName(_)
            | Self::Settings(_) => ErrorKind::Configuration,
            Self::Device { .. } => ErrorKind::Device,
            Self::NoData
            | Self::UnexpectedSampleSize(_)
            | Self::UnexpectedSampleCount(_)
            | Self::FrameSize { .. }
            | Self::UnsupportedDepth(_)
            | Self::UnsupportedFormat(_)
            | Self::MalformedDescriptor { .. } => ErrorKind::Data,
        }
    }

    /// The native status, for device errors.
    pub const fn status(&self) -> Option<Status> {
        match self {
            Self::Device { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Check if this is the document feeder running out of pages.
    pub const fn is_end_of_feed(&self) -> bool {
        matches!(
            self,
            Self::Device {
                status: Status::NoDocs,
                ..
            }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_from_raw() {
        assert_eq!(Status::from_raw(7), Status::NoDocs);
        assert_eq!(Status::from_raw(4), Status::Invalid);
        assert_eq!(Status::from_raw(42), Status::Unknown(42));
    }

    #[test]
    fn test_no_docs_text_matches_sane() {
        assert_eq!(
            Status::NoDocs.to_string(),
            "Document feeder out of documents"
        );
    }

    #[test]
    fn test_error_display() {
        let err = ScanError::NoValue {
            name: "scan".to_owned(),
            kind: ValueType::Button,
        };
        assert_eq!(err.to_string(), "Buttons don't have values: scan");

        let err = ScanError::device("start", Status::Jammed);
        assert_eq!(err.to_string(), "start failed: Document feeder jammed");
    }

    #[test]
    fn test_error_kinds() {
        assert_eq!(
            ScanError::Inactive("x".to_owned()).kind(),
            ErrorKind::Configuration
        );
        assert_eq!(ScanError::ReadOnly("area".to_owned()).kind(), ErrorKind::Configuration);
        assert_eq!(
            ScanError::device("snap", Status::IoError).kind(),
            ErrorKind::Device
        );
        assert_eq!(ScanError::NoData.kind(), ErrorKind::Data);
        assert_eq!(ScanError::UnexpectedSampleSize(4).kind(), ErrorKind::Data);
    }

    #[test]
    fn test_end_of_feed() {
        assert!(ScanError::device("start", Status::NoDocs).is_end_of_feed());
        assert!(!ScanError::device("start", Status::Jammed).is_end_of_feed());
        assert!(!ScanError::NoData.is_end_of_feed());
    }
}
