use std::{cmp::Ordering, fmt, sync::Arc};

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single allowed value for a definition, with its human-readable label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct OptionDefinition {
    /// The data stored when this option is chosen.
    pub value: Value,
    /// The label shown to users.
    pub label: String,
    /// Optional extra text shown to users.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    /// Heavier options sink to the bottom; equal weights use the sort order.
    #[serde(default)]
    pub weight: i32,
}

impl OptionDefinition {
    pub fn new(value: impl Into<Value>, label: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            label: label.into(),
            description: String::new(),
            weight: 0,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_weight(mut self, weight: i32) -> Self {
        self.weight = weight;
        self
    }

    /// Key used to identify this option among its siblings.
    pub fn key(&self) -> String {
        super::scalar_key(&self.value)
    }
}

/// Tiebreak order for options of equal weight.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum OptionsSortOrder {
    /// The order in which the options were added.
    #[default]
    Original,
    /// Case-insensitive label order.
    Label,
}

/// Provides options lazily, in place of a static option list.
pub trait OptionSetProvider: Send + Sync {
    /// Returns the options in their original order.
    fn options(&self) -> Vec<OptionDefinition>;
}

/// Shared handle to an [`OptionSetProvider`].
#[derive(Clone)]
pub struct OptionSet(pub Arc<dyn OptionSetProvider>);

impl fmt::Debug for OptionSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("OptionSet(..)")
    }
}

/// Sorts options by weight, then by the given tiebreak order.
pub(crate) fn sort_options(options: &mut [OptionDefinition], order: OptionsSortOrder) {
    // sort_by is stable, so equal weights keep insertion order.
    options.sort_by(|a, b| match a.weight.cmp(&b.weight) {
        Ordering::Equal => match order {
            OptionsSortOrder::Original => Ordering::Equal,
            OptionsSortOrder::Label => a.label.to_lowercase().cmp(&b.label.to_lowercase()),
        },
        other => other,
    });
}
