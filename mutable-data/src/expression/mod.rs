//! Expressions for computed defaults.
//!
//! The expression language is pluggable: the factory holds an
//! [`ExpressionLanguage`] and every evaluation gets an [`ExpressionScope`]
//! bound to the node whose default is being computed. Functions registered
//! on the factory are reached through [`ExpressionScope::call`]; `get` is
//! always available and reads the value at a data address.

mod simple;

use std::sync::{Arc, LazyLock};

use anyhow::bail;
use regex::{Captures, Regex};
use serde_json::Value;

pub use simple::SimpleExpressionLanguage;

use crate::{
    data::{DataTree, NodeId},
    error::Result,
    factory::DataItemFactory,
};

/// Evaluates default expressions.
pub trait ExpressionLanguage: Send + Sync {
    fn evaluate(&self, expression: &str, scope: &mut ExpressionScope<'_>) -> anyhow::Result<Value>;
}

/// A function callable from expressions.
pub type ExpressionFunction =
    Arc<dyn Fn(&mut ExpressionScope<'_>, &[Value]) -> anyhow::Result<Value> + Send + Sync>;

/// What an expression sees while it is evaluated.
pub struct ExpressionScope<'a> {
    tree: &'a mut DataTree,
    item: NodeId,
    factory: &'a DataItemFactory,
}

impl<'a> ExpressionScope<'a> {
    pub fn new(tree: &'a mut DataTree, item: NodeId, factory: &'a DataItemFactory) -> Self {
        Self {
            tree,
            item,
            factory,
        }
    }

    /// The node whose default is being evaluated.
    pub fn item(&self) -> NodeId {
        self.item
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.tree.parent(self.item).ok().flatten()
    }

    pub fn tree(&self) -> &DataTree {
        self.tree
    }

    pub fn tree_mut(&mut self) -> &mut DataTree {
        self.tree
    }

    /// Calls a function registered on the factory.
    pub fn call(&mut self, name: &str, args: &[Value]) -> anyhow::Result<Value> {
        let function = self.factory.function(name)?;
        function(self, args)
    }
}

/// The built-in `get` function.
pub(crate) fn get_function() -> ExpressionFunction {
    Arc::new(get)
}

fn get(scope: &mut ExpressionScope<'_>, args: &[Value]) -> anyhow::Result<Value> {
    let [Value::String(address)] = args else {
        bail!("get() takes a single data address string.");
    };
    let item = scope.item();
    let target = scope.tree_mut().get_item(item, address)?;
    if target == item {
        bail!("Expression uses a get() on a data item which refers to itself.");
    }
    Ok(scope.tree_mut().value(target)?)
}

static GET_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"get\((['"])(.+?)['"]\)"#).expect("valid get() pattern"));

/// Rewrites every `get()` address in `expression` to an absolute address,
/// resolving relative addresses from `item`.
pub(crate) fn absolute_addresses(expression: &str, tree: &DataTree, item: NodeId) -> Result<String> {
    let mut error = None;
    let rewritten = GET_PATTERN.replace_all(expression, |captures: &Captures<'_>| {
        let quote = &captures[1];
        match tree.relative_address_to_absolute(item, &captures[2]) {
            Ok(absolute) => format!("get({quote}{absolute}{quote})"),
            Err(err) => {
                error.get_or_insert(err);
                captures[0].to_string()
            }
        }
    });
    match error {
        Some(err) => Err(err),
        None => Ok(rewritten.into_owned()),
    }
}
