//! Option descriptors and values.
//!
//! A SANE backend publishes an open-ended list of named options. Each one is
//! described once per registry load by an [`OptionDescriptor`]; values moving
//! in and out of the device are [`OptionValue`]s.

use std::fmt;
use std::str::FromStr;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::error::{Result, ScanError};

/// Value type of an option (`SANE_Value_Type`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueType {
    /// Boolean word.
    Bool,
    /// Signed integer word.
    Int,
    /// 16.16 fixed-point word.
    Fixed,
    /// NUL-terminated Latin-1 string.
    String,
    /// Action without a value.
    Button,
    /// Structural header grouping the options that follow.
    Group,
}

impl ValueType {
    /// Convert from raw `SANE_TYPE_*` value.
    pub const fn from_raw(raw: i32) -> Option<Self> {
        match raw {
            0 => Some(Self::Bool),
            1 => Some(Self::Int),
            2 => Some(Self::Fixed),
            3 => Some(Self::String),
            4 => Some(Self::Button),
            5 => Some(Self::Group),
            _ => None,
        }
    }

    /// Name of the SANE constant.
    pub const fn sane_name(self) -> &'static str {
        match self {
            Self::Bool => "TYPE_BOOL",
            Self::Int => "TYPE_INT",
            Self::Fixed => "TYPE_FIXED",
            Self::String => "TYPE_STRING",
            Self::Button => "TYPE_BUTTON",
            Self::Group => "TYPE_GROUP",
        }
    }

    /// Whether options of this type carry a value.
    pub const fn has_value(self) -> bool {
        !matches!(self, Self::Button | Self::Group)
    }

    /// Whether a value of this kind may be written to an option of this type.
    pub const fn accepts(self, value: &OptionValue) -> bool {
        matches!(
            (self, value),
            (Self::Bool, OptionValue::Bool(_) | OptionValue::Int(_))
                | (Self::Int, OptionValue::Int(_))
                | (Self::Fixed, OptionValue::Float(_))
                | (Self::String, OptionValue::String(_))
        )
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool => write!(f, "Bool"),
            Self::Int => write!(f, "Int"),
            Self::Fixed => write!(f, "Fixed"),
            Self::String => write!(f, "String"),
            Self::Button => write!(f, "Button"),
            Self::Group => write!(f, "Group"),
        }
    }
}

/// Physical unit of an option (`SANE_Unit`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Unit {
    /// Unitless.
    None,
    /// Pixels.
    Pixel,
    /// Bits.
    Bit,
    /// Millimetres.
    Mm,
    /// Dots per inch.
    Dpi,
    /// Percentage.
    Percent,
    /// Microseconds.
    Microsecond,
}

impl Unit {
    /// Convert from raw `SANE_UNIT_*` value.
    pub const fn from_raw(raw: i32) -> Option<Self> {
        match raw {
            0 => Some(Self::None),
            1 => Some(Self::Pixel),
            2 => Some(Self::Bit),
            3 => Some(Self::Mm),
            4 => Some(Self::Dpi),
            5 => Some(Self::Percent),
            6 => Some(Self::Microsecond),
            _ => None,
        }
    }

    /// Name of the SANE constant.
    pub const fn sane_name(self) -> &'static str {
        match self {
            Self::None => "UNIT_NONE",
            Self::Pixel => "UNIT_PIXEL",
            Self::Bit => "UNIT_BIT",
            Self::Mm => "UNIT_MM",
            Self::Dpi => "UNIT_DPI",
            Self::Percent => "UNIT_PERCENT",
            Self::Microsecond => "UNIT_MICROSECOND",
        }
    }
}

bitflags! {
    /// Option capability word (`SANE_CAP_*`).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Capabilities: u32 {
        /// Value can be set by software.
        const SOFT_SELECT = 1 << 0;
        /// Value is set by a physical control on the device.
        const HARD_SELECT = 1 << 1;
        /// Value can be read by software.
        const SOFT_DETECT = 1 << 2;
        /// Feature is emulated by the backend, not the hardware.
        const EMULATED = 1 << 3;
        /// Backend can choose a value automatically.
        const AUTOMATIC = 1 << 4;
        /// Option is currently inactive.
        const INACTIVE = 1 << 5;
        /// Option is meant for advanced users.
        const ADVANCED = 1 << 6;
    }
}

bitflags! {
    /// Info word returned by a successful option write (`SANE_INFO_*`).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct SetInfo: u32 {
        /// Backend rounded the value.
        const INEXACT = 1 << 0;
        /// Option set changed; descriptors must be reloaded.
        const RELOAD_OPTIONS = 1 << 1;
        /// Scan parameters changed.
        const RELOAD_PARAMS = 1 << 2;
    }
}

/// A decoded option value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OptionValue {
    /// Boolean value.
    Bool(bool),
    /// Integer value.
    Int(i64),
    /// Floating-point value (fixed-point options).
    Float(f64),
    /// String value.
    String(String),
}

impl OptionValue {
    /// Short name of the value kind, for error messages.
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::String(_) => "string",
        }
    }

    /// Numeric view of the value, if it has one.
    #[allow(clippy::cast_precision_loss)]
    pub const fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(v) => Some(*v as f64),
            Self::Float(v) => Some(*v),
            Self::Bool(_) | Self::String(_) => None,
        }
    }

    /// String view of the value, if it is one.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for OptionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(v) => write!(f, "{v}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::String(v) => write!(f, "{v:?}"),
        }
    }
}

impl FromStr for OptionValue {
    type Err = std::convert::Infallible;

    /// Parse a command-line literal: `true`/`false`, an integer, a float,
    /// or anything else as a string.
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        if let Ok(b) = s.parse::<bool>() {
            return Ok(Self::Bool(b));
        }
        if let Ok(i) = s.parse::<i64>() {
            return Ok(Self::Int(i));
        }
        if let Ok(x) = s.parse::<f64>() {
            return Ok(Self::Float(x));
        }
        Ok(Self::String(s.to_owned()))
    }
}

impl From<bool> for OptionValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for OptionValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<i32> for OptionValue {
    fn from(v: i32) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<f64> for OptionValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for OptionValue {
    fn from(v: &str) -> Self {
        Self::String(v.to_owned())
    }
}

impl From<String> for OptionValue {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

/// Constraint on the values an option accepts.
#[derive(Debug, Clone, PartialEq)]
pub enum Constraint {
    /// Any value of the option's type.
    None,
    /// Inclusive numeric range with quantization step (0 = continuous).
    Range {
        /// Lower bound.
        min: OptionValue,
        /// Upper bound.
        max: OptionValue,
        /// Quantization step.
        step: OptionValue,
    },
    /// Enumerated list of permitted values.
    List(Vec<OptionValue>),
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "None"),
            Self::Range { min, max, step } => write!(f, "({min}, {max}, {step})"),
            Self::List(values) => {
                write!(f, "[")?;
                for (i, v) in values.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{v}")?;
                }
                write!(f, "]")
            }
        }
    }
}

/// Raw nine-field descriptor record as listed by the native layer.
#[derive(Debug, Clone, PartialEq)]
pub struct OptionRecord {
    /// Position in the backend's option list.
    pub index: usize,
    /// Backend-defined option name.
    pub name: String,
    /// Single-line title.
    pub title: String,
    /// Long description.
    pub desc: String,
    /// Raw `SANE_TYPE_*` code.
    pub type_code: i32,
    /// Raw `SANE_UNIT_*` code.
    pub unit_code: i32,
    /// Value size in bytes.
    pub size: usize,
    /// Raw capability word.
    pub cap: u32,
    /// Decoded constraint.
    pub constraint: Constraint,
}

/// Replace hyphens so a backend option name can be used as an identifier.
pub fn normalize_name(name: &str) -> String {
    name.replace('-', "_")
}

/// Immutable metadata for one option of the current registry load.
#[derive(Debug, Clone, PartialEq)]
pub struct OptionDescriptor {
    index: usize,
    name: String,
    key: String,
    title: String,
    desc: String,
    value_type: ValueType,
    unit: Unit,
    size: usize,
    cap: Capabilities,
    constraint: Constraint,
}

impl TryFrom<OptionRecord> for OptionDescriptor {
    type Error = ScanError;

    fn try_from(record: OptionRecord) -> Result<Self> {
        let value_type =
            ValueType::from_raw(record.type_code).ok_or_else(|| ScanError::MalformedDescriptor {
                index: record.index,
                reason: format!("unknown value type {}", record.type_code),
            })?;
        let unit = Unit::from_raw(record.unit_code).ok_or_else(|| {
            ScanError::MalformedDescriptor {
                index: record.index,
                reason: format!("unknown unit {}", record.unit_code),
            }
        })?;

        Ok(Self {
            index: record.index,
            key: normalize_name(&record.name),
            name: record.name,
            title: record.title,
            desc: record.desc,
            value_type,
            unit,
            size: record.size,
            cap: Capabilities::from_bits_retain(record.cap),
            constraint: record.constraint,
        })
    }
}

impl OptionDescriptor {
    /// Position in the backend's option list.
    pub const fn index(&self) -> usize {
        self.index
    }

    /// Raw backend name (may contain hyphens).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Normalized identifier used as registry key.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Single-line title.
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Long description.
    pub fn desc(&self) -> &str {
        &self.desc
    }

    /// Value type.
    pub const fn value_type(&self) -> ValueType {
        self.value_type
    }

    /// Unit.
    pub const fn unit(&self) -> Unit {
        self.unit
    }

    /// Value size in bytes.
    pub const fn size(&self) -> usize {
        self.size
    }

    /// Capability bits.
    pub const fn capabilities(&self) -> Capabilities {
        self.cap
    }

    /// Value constraint.
    pub const fn constraint(&self) -> &Constraint {
        &self.constraint
    }

    /// `SANE_OPTION_IS_ACTIVE`: the INACTIVE bit is clear.
    pub const fn is_active(&self) -> bool {
        !self.cap.contains(Capabilities::INACTIVE)
    }

    /// `SANE_OPTION_IS_SETTABLE`: the SOFT_SELECT bit is set.
    pub const fn is_settable(&self) -> bool {
        self.cap.contains(Capabilities::SOFT_SELECT)
    }

    /// Whether the backend emulates this option.
    pub const fn is_emulated(&self) -> bool {
        self.cap.contains(Capabilities::EMULATED)
    }

    /// Whether the backend can pick the value automatically.
    pub const fn is_automatic(&self) -> bool {
        self.cap.contains(Capabilities::AUTOMATIC)
    }

    /// Whether the option is flagged for advanced users.
    pub const fn is_advanced(&self) -> bool {
        self.cap.contains(Capabilities::ADVANCED)
    }

    /// Whether the option carries a value (not a button or group).
    pub const fn has_value(&self) -> bool {
        self.value_type.has_value()
    }
}

impl fmt::Display for OptionDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let yes_no = |b: bool| if b { "yes" } else { "no" };
        writeln!(f, "Name:      {}", self.key)?;
        writeln!(f, "Index:     {}", self.index)?;
        writeln!(f, "Title:     {}", self.title)?;
        writeln!(f, "Desc:      {}", self.desc)?;
        writeln!(f, "Type:      {}", self.value_type.sane_name())?;
        writeln!(f, "Unit:      {}", self.unit.sane_name())?;
        writeln!(f, "Constr:    {}", self.constraint)?;
        writeln!(f, "active:    {}", yes_no(self.is_active()))?;
        write!(f, "settable:  {}", yes_no(self.is_settable()))
    }
}
