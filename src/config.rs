//! Scan settings loaded from TOML.
//!
//! ```toml
//! device = "test:0"
//!
//! [[option]]
//! name = "mode"
//! value = "Color"
//!
//! [[option]]
//! name = "resolution"
//! value = 300
//! ```
//!
//! Options are applied in file order, since setting one option (typically
//! `mode` or `source`) can change which others exist.

use std::path::Path;

use serde::Deserialize;
use tracing::debug;

use crate::error::{Result, ScanError};
use crate::option::OptionValue;
use crate::scanner::{Scanner, SetOutcome};
use crate::traits::Backend;

/// One option assignment.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct OptionSetting {
    /// Option name, raw or normalized.
    pub name: String,
    /// Value to write.
    pub value: OptionValue,
}

/// Device selection and option assignments for a scan.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScanSettings {
    /// Device to open; the first enumerated device when absent.
    pub device: Option<String>,
    /// Restrict enumeration to local devices.
    #[serde(default)]
    pub local_only: bool,
    /// Assignments, applied in order.
    #[serde(default)]
    pub option: Vec<OptionSetting>,
}

impl ScanSettings {
    /// Parse settings from a TOML document.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|err| ScanError::Settings(err.to_string()))
    }

    /// Read settings from a TOML file.
    pub fn from_path(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|err| ScanError::Settings(format!("{}: {err}", path.display())))?;
        Self::from_toml_str(&text)
    }

    /// Append an assignment after those already present.
    pub fn push(&mut self, name: &str, value: OptionValue) {
        self.option.push(OptionSetting {
            name: name.to_owned(),
            value,
        });
    }

    /// Write every assignment to `scanner`, stopping at the first failure.
    pub fn apply<B: Backend>(&self, scanner: &mut Scanner<B>) -> Result<Vec<SetOutcome>> {
        self.option
            .iter()
            .map(|setting| {
                debug!(option = %setting.name, value = %setting.value, "Applying setting");
                scanner.set(&setting.name, setting.value.clone())
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{Call, MockBackend, MockOption};

    const SETTINGS: &str = r#"
device = "mock:0"

[[option]]
name = "mode"
value = "Color"

[[option]]
name = "resolution"
value = 300

[[option]]
name = "tl-x"
value = 12.5

[[option]]
name = "preview"
value = false
"#;

    #[test]
    fn test_parse_settings() {
        let settings = ScanSettings::from_toml_str(SETTINGS).expect("valid settings");
        assert_eq!(settings.device.as_deref(), Some("mock:0"));
        assert!(!settings.local_only);
        let values: Vec<&OptionValue> = settings.option.iter().map(|o| &o.value).collect();
        assert_eq!(
            values,
            vec![
                &OptionValue::from("Color"),
                &OptionValue::Int(300),
                &OptionValue::Float(12.5),
                &OptionValue::Bool(false),
            ]
        );
    }

    #[test]
    fn test_empty_settings() {
        let settings = ScanSettings::from_toml_str("").expect("empty is valid");
        assert_eq!(settings, ScanSettings::default());
    }

    #[test]
    fn test_invalid_settings() {
        assert!(matches!(
            ScanSettings::from_toml_str("devise = \"x\""),
            Err(ScanError::Settings(_))
        ));
        assert!(matches!(
            ScanSettings::from_toml_str("[[option]]\nname = \"mode\""),
            Err(ScanError::Settings(_))
        ));
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            ScanSettings::from_path(Path::new("/nonexistent/scan.toml")),
            Err(ScanError::Settings(_))
        ));
    }

    #[test]
    fn test_apply_in_file_order() {
        let backend = MockBackend::new().with_options(vec![
            MockOption::string("mode", "Gray", &["Gray", "Color"]),
            MockOption::int("resolution", 150),
            MockOption::fixed("tl-x", 0.0),
            MockOption::bool("preview", true),
        ]);
        let mut scanner = Scanner::open(&backend, "mock:0").expect("open should succeed");
        let mut settings = ScanSettings::from_toml_str(SETTINGS).expect("valid settings");
        settings.push("operator", OptionValue::from("desk 3"));

        let outcomes = settings.apply(&mut scanner).expect("apply should succeed");
        assert_eq!(outcomes.len(), 5);
        assert_eq!(outcomes.last(), Some(&SetOutcome::Stored));
        assert_eq!(
            backend.value_calls(),
            vec![
                Call::Set(1, OptionValue::from("Color")),
                Call::Set(2, OptionValue::Int(300)),
                Call::Set(3, OptionValue::Float(12.5)),
                Call::Set(4, OptionValue::Bool(false)),
            ]
        );
    }

    #[test]
    fn test_apply_stops_at_first_failure() {
        let backend = MockBackend::new().with_options(vec![
            MockOption::string("mode", "Gray", &["Gray", "Color"]),
            MockOption::int("resolution", 150).inactive(),
            MockOption::fixed("tl-x", 0.0),
        ]);
        let mut scanner = Scanner::open(&backend, "mock:0").expect("open should succeed");
        let settings = ScanSettings::from_toml_str(SETTINGS).expect("valid settings");

        assert!(matches!(
            settings.apply(&mut scanner),
            Err(ScanError::Inactive(_))
        ));
        assert_eq!(backend.value_calls().len(), 1);
    }
}
