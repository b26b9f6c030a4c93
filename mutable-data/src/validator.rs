//! Named validators for data nodes.

use serde_json::Value;

use crate::{
    data::{DataTree, NodeId},
    definition::scalar_key,
};

/// Checks a node's data.
///
/// Validators are registered on the factory by name and referenced from
/// definitions. They only run on nodes that have data.
pub trait Validator: Send + Sync {
    fn validate(&self, tree: &DataTree, id: NodeId) -> bool;

    /// The violation message. `@value` and `@label` are replaced with the
    /// node's value and label.
    fn message(&self, tree: &DataTree, id: NodeId) -> String;
}

/// Substitutes the `@value` and `@label` placeholders.
pub fn render_message(template: &str, value: &Value, label: &str) -> String {
    template
        .replace("@value", &scalar_key(value))
        .replace("@label", label)
}
