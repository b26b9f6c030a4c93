//! Definition (schema) tree.
//!
//! A [`DataDefinition`] describes the type, cardinality and constraints of a
//! data node, and for containers the definitions of their properties. Mutable
//! definitions additionally carry [`VariantDefinition`]s, bundles of
//! properties merged in once a variant is selected.

mod data_definition;
mod default;
mod option;
mod variant;

pub use data_definition::{CARDINALITY_UNLIMITED, DataDefinition, DataType, DefinitionKind};
pub use default::{DefaultDefinition, DefaultValue};
pub use option::{OptionDefinition, OptionSet, OptionSetProvider, OptionsSortOrder};
pub use variant::VariantDefinition;

use serde_json::Value;

use crate::error::Result;

/// Separates segments of a data address.
pub const ADDRESS_SEPARATOR: char = ':';

/// A named, re-invocable source of a definition tree.
///
/// Trees built from a provider record its name, which lets them be suspended
/// and later resumed against a freshly built definition.
pub trait DefinitionProvider {
    /// Name under which the provider is registered on the factory.
    const NAME: &'static str;

    /// Builds the definition tree.
    fn definition() -> Result<DataDefinition>;
}

/// Key for comparing scalar values regardless of their JSON type.
pub(crate) fn scalar_key(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
