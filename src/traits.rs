//! Core traits and types for the native scanner layer.
//!
//! [`Backend`] and [`DeviceHandle`] are the whole surface this crate consumes
//! from SANE. The real implementation lives in [`crate::device`]; tests use
//! the in-memory mock.

use std::fmt;

use crate::option::{OptionRecord, OptionValue, SetInfo};

pub use crate::error::Result;

/// SANE library version, as reported by `sane_init`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Version {
    /// Raw version code.
    pub code: i32,
    /// Major version.
    pub major: i32,
    /// Minor version.
    pub minor: i32,
    /// Build number.
    pub build: i32,
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.build)
    }
}

/// One entry of the device enumeration.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DeviceInfo {
    /// Device name, suitable for opening.
    pub name: String,
    /// Device vendor.
    pub vendor: String,
    /// Device model.
    pub model: String,
    /// Device type, such as "flatbed scanner" or "virtual device".
    pub kind: String,
}

/// Pixel layout of the frame being transferred (`SANE_Frame`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameFormat {
    /// Single band.
    Gray,
    /// Interleaved red, green, blue.
    Rgb,
    /// Red band of a three-pass scan.
    Red,
    /// Green band of a three-pass scan.
    Green,
    /// Blue band of a three-pass scan.
    Blue,
    /// A format code this crate does not know.
    Unknown(i32),
}

impl FrameFormat {
    /// Convert from raw `SANE_FRAME_*` value.
    pub const fn from_raw(raw: i32) -> Self {
        match raw {
            0 => Self::Gray,
            1 => Self::Rgb,
            2 => Self::Red,
            3 => Self::Green,
            4 => Self::Blue,
            other => Self::Unknown(other),
        }
    }

    /// Channel position for single-band formats of a three-pass scan.
    pub const fn channel(self) -> Option<usize> {
        match self {
            Self::Red => Some(0),
            Self::Green => Some(1),
            Self::Blue => Some(2),
            Self::Gray | Self::Rgb | Self::Unknown(_) => None,
        }
    }
}

impl fmt::Display for FrameFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Gray => write!(f, "gray"),
            Self::Rgb => write!(f, "color"),
            Self::Red => write!(f, "red"),
            Self::Green => write!(f, "green"),
            Self::Blue => write!(f, "blue"),
            Self::Unknown(_) => write!(f, "unknown format"),
        }
    }
}

/// Current scan parameters (`SANE_Parameters`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Parameters {
    /// Frame format.
    pub format: FrameFormat,
    /// Whether this is the last frame of a multi-frame image.
    pub last_frame: bool,
    /// Width of the scanned image in pixels.
    pub pixels_per_line: i32,
    /// Height in lines; -1 when unknown ahead of time.
    pub lines: i32,
    /// Bits per sample.
    pub depth: i32,
    /// Bytes per transferred line, including padding.
    pub bytes_per_line: i32,
}

/// Pixel data handed back by the native snap.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RawFrame {
    /// Packed samples, row-major, channels interleaved.
    pub data: Vec<u8>,
    /// Width in pixels.
    pub width: u32,
    /// Height in lines.
    pub height: u32,
    /// Samples per pixel.
    pub samples: u8,
    /// Bytes per sample.
    pub sample_size: u8,
}

/// Abstraction over the library-level entry points.
pub trait Backend {
    /// The handle type returned by `open`.
    type Handle: DeviceHandle;

    /// Enumerate available devices.
    fn devices(&self, local_only: bool) -> Result<Vec<DeviceInfo>>;

    /// Open a device by name. The handle closes the device when dropped.
    fn open(&self, name: &str) -> Result<Self::Handle>;
}

/// Abstraction over an open device handle.
pub trait DeviceHandle {
    /// List option descriptor records in backend order.
    fn options(&self) -> Result<Vec<OptionRecord>>;

    /// Read the value of the option at `index`.
    fn get_option(&self, index: usize) -> Result<OptionValue>;

    /// Write the option at `index`. Returns the backend's info word.
    fn set_option(&mut self, index: usize, value: &OptionValue) -> Result<SetInfo>;

    /// Let the backend choose the value of the option at `index`.
    fn set_auto(&mut self, index: usize) -> Result<SetInfo>;

    /// Initiate acquisition.
    fn start(&mut self) -> Result<()>;

    /// Cancel the current operation.
    fn cancel(&mut self);

    /// Get current scan parameters.
    fn parameters(&self) -> Result<Parameters>;

    /// Read one complete image. Without `want_raw`, 16-bit samples are
    /// reduced to 8 bits. Without `no_cancel`, the device is cancelled
    /// after the read.
    fn snap(&mut self, no_cancel: bool, want_raw: bool) -> Result<RawFrame>;

    /// File descriptor that becomes readable when image data is available.
    fn select_fd(&self) -> Result<i32>;
}
