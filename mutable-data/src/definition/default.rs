use serde_json::Value;

use crate::{
    data::{DataTree, NodeId},
    error::Result,
    expression,
};

/// How a default value is computed.
///
/// Only one kind is active at a time; replacing it discards the previous one.
#[derive(Debug, Clone, PartialEq)]
pub enum DefaultValue {
    /// A fixed value.
    Literal(Value),
    /// An expression evaluated by the factory's expression language.
    Expression(String),
    /// The name of a callable registered on the factory.
    Callable(String),
}

/// A lazily applied default, with the addresses it depends on.
#[derive(Debug, Clone, PartialEq)]
pub struct DefaultDefinition {
    value: DefaultValue,
    dependencies: Vec<String>,
}

impl DefaultDefinition {
    pub fn literal(value: impl Into<Value>) -> Self {
        Self {
            value: DefaultValue::Literal(value.into()),
            dependencies: Vec::new(),
        }
    }

    pub fn expression(expression: impl Into<String>) -> Self {
        Self {
            value: DefaultValue::Expression(expression.into()),
            dependencies: Vec::new(),
        }
    }

    pub fn callable(name: impl Into<String>) -> Self {
        Self {
            value: DefaultValue::Callable(name.into()),
            dependencies: Vec::new(),
        }
    }

    pub fn set_literal(&mut self, value: impl Into<Value>) -> &mut Self {
        self.value = DefaultValue::Literal(value.into());
        self
    }

    pub fn set_expression(&mut self, expression: impl Into<String>) -> &mut Self {
        self.value = DefaultValue::Expression(expression.into());
        self
    }

    pub fn set_callable(&mut self, name: impl Into<String>) -> &mut Self {
        self.value = DefaultValue::Callable(name.into());
        self
    }

    /// Replaces the dependencies. Addresses may be relative or absolute.
    ///
    /// A default is not derived until all its dependencies have a value.
    pub fn with_dependencies<I, S>(mut self, dependencies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dependencies = dependencies.into_iter().map(Into::into).collect();
        self
    }

    pub fn remove_dependencies(&mut self) -> &mut Self {
        self.dependencies.clear();
        self
    }

    pub fn dependencies(&self) -> &[String] {
        &self.dependencies
    }

    pub fn value(&self) -> &DefaultValue {
        &self.value
    }

    /// Returns `"literal"`, `"expression"` or `"callable"`.
    pub fn kind_name(&self) -> &'static str {
        match self.value {
            DefaultValue::Literal(_) => "literal",
            DefaultValue::Expression(_) => "expression",
            DefaultValue::Callable(_) => "callable",
        }
    }

    /// Gets the expression with every `get()` address made absolute
    /// relative to `item`.
    ///
    /// Returns `None` for non-expression defaults.
    pub fn expression_with_absolute_addresses(
        &self,
        tree: &DataTree,
        item: NodeId,
    ) -> Result<Option<String>> {
        match &self.value {
            DefaultValue::Expression(expr) => {
                expression::absolute_addresses(expr, tree, item).map(Some)
            }
            _ => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_replacing_kind_clears_previous() {
        let mut default = DefaultDefinition::literal("foo").with_dependencies(["..:one"]);
        assert_eq!(default.kind_name(), "literal");

        default.set_expression("'bar'");
        assert_eq!(default.value(), &DefaultValue::Expression("'bar'".into()));
        assert_eq!(default.dependencies(), ["..:one"]);

        default.set_literal(json!(["a", "b"])).remove_dependencies();
        assert_eq!(default.value(), &DefaultValue::Literal(json!(["a", "b"])));
        assert!(default.dependencies().is_empty());
    }
}
