use std::sync::Arc;

use indexmap::IndexSet;
use serde_json::Value;

use super::{DataTree, NodeId};
use crate::{
    definition::DefaultValue,
    error::{DataError, Result},
    expression::ExpressionScope,
};

/// State of one top-level default resolution.
///
/// Holds the addresses visited so far, so that circular dependencies are
/// reported instead of recursing forever.
#[derive(Debug)]
struct DefaultResolution {
    start: String,
    seen: IndexSet<String>,
}

impl DefaultResolution {
    fn circular(&self, address: &str) -> DataError {
        let seen: Vec<&str> = self.seen.iter().map(String::as_str).collect();
        DataError::definition(format!(
            "Circular default dependencies starting at {}, with dependency {address} previously seen in dependencies {}.",
            self.start,
            seen.join(", ")
        ))
    }
}

impl DataTree {
    /// Applies the node's default if it has no value yet.
    ///
    /// Returns `false` when a dependency of the default is still empty, in
    /// which case the node is left untouched. A set node is never changed.
    pub fn apply_default(&mut self, id: NodeId) -> Result<bool> {
        if self.is_set(id)? {
            return Ok(true);
        }
        let mut resolution = DefaultResolution {
            start: self.address(id)?,
            seen: IndexSet::new(),
        };
        self.resolve_default(id, &mut resolution)
    }

    fn resolve_default(&mut self, id: NodeId, resolution: &mut DefaultResolution) -> Result<bool> {
        if self.is_set(id)? {
            return Ok(true);
        }
        let address = self.address(id)?;
        if !resolution.seen.insert(address.clone()) {
            return Err(resolution.circular(&address));
        }

        let Some(default) = self.definition(id)?.default().cloned() else {
            return Ok(true);
        };
        if self.evaluating.contains(&id) {
            let chain: Vec<String> = self
                .evaluating
                .iter()
                .map(|node| self.address(*node))
                .collect::<Result<_>>()?;
            return Err(DataError::definition(format!(
                "Circular default dependencies starting at {}, with dependency {address} previously seen in dependencies {}.",
                chain.first().map(String::as_str).unwrap_or(address.as_str()),
                chain.join(", ")
            )));
        }

        for dependency in default.dependencies() {
            let dependent = self.get_item(id, dependency).map_err(|err| {
                DataError::definition(format!(
                    "Default for data at {address} defines an invalid dependency '{dependency}', data address error was: '{}'.",
                    err.message()
                ))
            })?;
            if !self.is_set(dependent)?
                && (!self.resolve_default(dependent, resolution)? || !self.is_set(dependent)?)
            {
                debug!("Default at {address} waits for dependency {dependency}");
                return Ok(false);
            }
        }

        let value = match default.value() {
            DefaultValue::Literal(value) => value.clone(),
            DefaultValue::Expression(expression) => {
                self.evaluate_default_expression(id, expression)
                    .map_err(|err| {
                        DataError::definition(format!(
                            "Error with default expression '{expression}' at address {address}, error message was: {err:#}."
                        ))
                    })?
            }
            DefaultValue::Callable(name) => {
                let callable = self.factory.callable(name)?;
                self.evaluating.push(id);
                let result = callable(self, id);
                self.evaluating.pop();
                result.map_err(|err| {
                    DataError::definition(format!(
                        "Error with default callable '{name}' at address {address}, error message was: {err:#}."
                    ))
                })?
            }
        };

        let value = match self.delta(id)? {
            Some(delta) if !value.is_null() => match value {
                Value::Array(mut values) if delta < values.len() => values.swap_remove(delta),
                Value::Array(_) => Value::Null,
                _ => {
                    return Err(DataError::definition(format!(
                        "Default value for multiple-valued data items must be an array at address {address}."
                    )));
                }
            },
            _ => value,
        };

        if !value.is_null() {
            self.set(id, value).map_err(|err| {
                if err.is_invalid_input() {
                    DataError::definition(format!(
                        "Default value applied to data at {address} caused an invalid input error with message: {}",
                        err.message()
                    ))
                } else {
                    err
                }
            })?;
            debug!("Applied {} default at {address}", default.kind_name());
        }
        Ok(true)
    }

    fn evaluate_default_expression(&mut self, id: NodeId, expression: &str) -> anyhow::Result<Value> {
        let factory = Arc::clone(&self.factory);
        self.evaluating.push(id);
        let result = {
            let mut scope = ExpressionScope::new(self, id, &factory);
            factory.expression_language().evaluate(expression, &mut scope)
        };
        self.evaluating.pop();
        result
    }
}
