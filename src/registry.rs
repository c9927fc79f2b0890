//! Per-device option registry.

use std::collections::HashMap;

use tracing::debug;

use crate::error::Result;
use crate::option::{normalize_name, OptionDescriptor, ValueType};
use crate::traits::DeviceHandle;

/// Descriptors of one load of a device's option list.
///
/// A registry is never patched: a reload builds a new one which replaces
/// the old wholesale.
#[derive(Debug, Clone, Default)]
pub struct OptionRegistry {
    /// All descriptors in backend order, groups included.
    descriptors: Vec<OptionDescriptor>,
    /// Normalized name to position in `descriptors`, groups excluded.
    by_name: HashMap<String, usize>,
}

impl OptionRegistry {
    /// Load the option list from an open handle.
    pub fn load<H: DeviceHandle + ?Sized>(handle: &H) -> Result<Self> {
        let records = handle.options()?;
        let descriptors = records
            .into_iter()
            .map(OptionDescriptor::try_from)
            .collect::<Result<Vec<_>>>()?;
        let registry = Self::from_descriptors(descriptors);
        debug!(
            options = registry.descriptors.len(),
            values = registry.by_name.len(),
            "Loaded option registry"
        );
        Ok(registry)
    }

    /// Build a registry from already decoded descriptors.
    pub fn from_descriptors(descriptors: Vec<OptionDescriptor>) -> Self {
        let by_name = descriptors
            .iter()
            .enumerate()
            .filter(|(_, d)| d.value_type() != ValueType::Group)
            .map(|(pos, d)| (d.key().to_owned(), pos))
            .collect();
        Self {
            descriptors,
            by_name,
        }
    }

    /// Look up a non-group option by raw or normalized name.
    pub fn get(&self, name: &str) -> Option<&OptionDescriptor> {
        let pos = *self.by_name.get(&normalize_name(name))?;
        self.descriptors.get(pos)
    }

    /// Whether a non-group option of that name exists.
    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(&normalize_name(name))
    }

    /// Look up a descriptor by its backend index.
    pub fn by_index(&self, index: usize) -> Option<&OptionDescriptor> {
        self.descriptors.iter().find(|d| d.index() == index)
    }

    /// All descriptors in backend order, groups included.
    pub fn iter(&self) -> impl Iterator<Item = &OptionDescriptor> {
        self.descriptors.iter()
    }

    /// Normalized names of the non-group options, in backend order.
    pub fn names(&self) -> Vec<String> {
        let mut positions: Vec<usize> = self.by_name.values().copied().collect();
        positions.sort_unstable();
        positions
            .into_iter()
            .filter_map(|pos| self.descriptors.get(pos))
            .map(|d| d.key().to_owned())
            .collect()
    }

    /// Number of non-group options.
    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    /// Whether the registry holds no non-group options.
    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}
