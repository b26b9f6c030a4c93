use indexmap::IndexMap;

use super::{DataTree, NodeId, NodeType};
use crate::{error::Result, validator::render_message};

/// Violation messages keyed by the address of the offending node.
pub type Violations = IndexMap<String, Vec<String>>;

fn merge(into: &mut Violations, from: Violations) {
    for (address, messages) in from {
        into.entry(address).or_default().extend(messages);
    }
}

impl DataTree {
    /// Checks the node and every visible node below it.
    ///
    /// Required properties are instantiated so that their absence is
    /// reported, and required simple data with a default has the default
    /// applied instead of being reported.
    pub fn validate(&mut self, id: NodeId) -> Result<Violations> {
        let mut violations = self.run_validators(id)?;
        match self.node_type(id)? {
            NodeType::Simple => merge(&mut violations, self.validate_simple(id)?),
            NodeType::Array => {
                if self.definition(id)?.is_required() && self.is_empty(id)? {
                    violations
                        .entry(self.address(id)?)
                        .or_default()
                        .push("Required value is empty".to_string());
                }
                for item in self.child_ids(id)? {
                    merge(&mut violations, self.validate(item)?);
                }
            }
            NodeType::Complex | NodeType::Mutable => {
                for (name, property) in self.visible_properties(id)? {
                    if property.is_required() {
                        self.get_property(id, &name)?;
                    }
                }
                let visible = self.visible_properties(id)?;
                for child in self.child_ids(id)? {
                    if visible.contains_key(self.name(child)?) {
                        merge(&mut violations, self.validate(child)?);
                    }
                }
            }
        }
        Ok(violations)
    }

    fn validate_simple(&mut self, id: NodeId) -> Result<Violations> {
        let mut violations = Violations::new();
        let definition = std::sync::Arc::clone(self.definition(id)?);

        if self.is_empty(id)? && definition.is_required() {
            if definition.has_default() {
                self.apply_default(id)?;
            } else {
                let label = if definition.label().is_empty() {
                    self.name(id)?.to_string()
                } else {
                    self.label(id)?
                };
                violations
                    .entry(self.address(id)?)
                    .or_default()
                    .push(format!("Value is required for {label}."));
            }
        }

        if !self.is_empty(id)? && definition.has_options() {
            let value = self.raw_value(id)?;
            if !definition.is_option(&value) {
                let message = render_message(
                    "Value '@value' is not one of the options for @label.",
                    &value,
                    &self.label(id)?,
                );
                violations.entry(self.address(id)?).or_default().push(message);
            }
        }
        Ok(violations)
    }

    /// Runs the definition's named validators on non-empty data.
    fn run_validators(&self, id: NodeId) -> Result<Violations> {
        let mut violations = Violations::new();
        if self.is_empty(id)? {
            return Ok(violations);
        }
        for name in self.definition(id)?.validators() {
            let validator = self.factory.validator(name)?;
            if !validator.validate(self, id) {
                let message = render_message(
                    &validator.message(self, id),
                    &self.raw_value(id)?,
                    &self.label(id)?,
                );
                violations.entry(self.address(id)?).or_default().push(message);
            }
        }
        Ok(violations)
    }
}
