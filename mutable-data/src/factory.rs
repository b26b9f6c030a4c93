//! The factory that builds data trees and holds their collaborators.
//!
//! A [`DataItemFactory`] owns the registries a tree consults while it runs:
//! validators, expression functions, named callables for callable defaults,
//! definition sources for suspend/resume, and change listeners. Trees keep
//! an `Arc` to the factory that built them, so a factory is configured once
//! with the `with_*` builders and then shared.

use std::{collections::HashMap, fmt, sync::Arc};

use serde_json::Value;

use crate::{
    data::{DataTree, NodeId, SuspendedData},
    definition::{DataDefinition, DefinitionProvider},
    error::{DataError, Result},
    expression::{self, ExpressionFunction, ExpressionLanguage, SimpleExpressionLanguage},
    validator::Validator,
};

/// A callable default, registered by name.
pub type NamedCallable =
    Arc<dyn Fn(&mut DataTree, NodeId) -> anyhow::Result<Value> + Send + Sync>;

/// Receives `(tree, changed node, new value)` for every change that reaches
/// the root.
pub type ChangeListener = Arc<dyn Fn(&DataTree, NodeId, &Value) + Send + Sync>;

/// Builds a definition on demand; used to rebuild suspended trees.
pub type DefinitionSource = fn() -> Result<DataDefinition>;

pub struct DataItemFactory {
    validators: HashMap<String, Arc<dyn Validator>>,
    functions: HashMap<String, ExpressionFunction>,
    callables: HashMap<String, NamedCallable>,
    definition_sources: HashMap<String, DefinitionSource>,
    listeners: Vec<ChangeListener>,
    expression_language: Arc<dyn ExpressionLanguage>,
}

impl fmt::Debug for DataItemFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut functions: Vec<_> = self.functions.keys().collect();
        functions.sort();
        let mut validators: Vec<_> = self.validators.keys().collect();
        validators.sort();
        let mut callables: Vec<_> = self.callables.keys().collect();
        callables.sort();
        let mut sources: Vec<_> = self.definition_sources.keys().collect();
        sources.sort();
        f.debug_struct("DataItemFactory")
            .field("validators", &validators)
            .field("functions", &functions)
            .field("callables", &callables)
            .field("definition_sources", &sources)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

impl Default for DataItemFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl DataItemFactory {
    /// A factory with the built-in `get` expression function and the
    /// [`SimpleExpressionLanguage`].
    pub fn new() -> Self {
        let mut functions = HashMap::new();
        functions.insert("get".to_string(), expression::get_function());
        Self {
            validators: HashMap::new(),
            functions,
            callables: HashMap::new(),
            definition_sources: HashMap::new(),
            listeners: Vec::new(),
            expression_language: Arc::new(SimpleExpressionLanguage),
        }
    }

    /// A new default factory, ready to build trees.
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    pub fn into_shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub fn with_validator(mut self, name: impl Into<String>, validator: impl Validator + 'static) -> Self {
        self.validators.insert(name.into(), Arc::new(validator));
        self
    }

    /// Registers an expression function. A function named `get` replaces
    /// the built-in one.
    pub fn with_function<F>(mut self, name: impl Into<String>, function: F) -> Self
    where
        F: Fn(&mut expression::ExpressionScope<'_>, &[Value]) -> anyhow::Result<Value>
            + Send
            + Sync
            + 'static,
    {
        self.functions.insert(name.into(), Arc::new(function));
        self
    }

    pub fn with_callable<F>(mut self, name: impl Into<String>, callable: F) -> Self
    where
        F: Fn(&mut DataTree, NodeId) -> anyhow::Result<Value> + Send + Sync + 'static,
    {
        self.callables.insert(name.into(), Arc::new(callable));
        self
    }

    pub fn with_definition_source(mut self, name: impl Into<String>, source: DefinitionSource) -> Self {
        self.definition_sources.insert(name.into(), source);
        self
    }

    /// Registers `P` as a definition source under [`DefinitionProvider::NAME`].
    pub fn with_provider<P: DefinitionProvider>(self) -> Self {
        self.with_definition_source(P::NAME, P::definition)
    }

    pub fn with_change_listener<F>(mut self, listener: F) -> Self
    where
        F: Fn(&DataTree, NodeId, &Value) + Send + Sync + 'static,
    {
        self.listeners.push(Arc::new(listener));
        self
    }

    pub fn with_expression_language(mut self, language: impl ExpressionLanguage + 'static) -> Self {
        self.expression_language = Arc::new(language);
        self
    }

    pub fn validator(&self, name: &str) -> Result<Arc<dyn Validator>> {
        self.validators
            .get(name)
            .cloned()
            .ok_or_else(|| DataError::definition(format!("Validator {name} not found.")))
    }

    pub fn function(&self, name: &str) -> Result<ExpressionFunction> {
        self.functions
            .get(name)
            .cloned()
            .ok_or_else(|| DataError::definition(format!("Expression function {name} not found.")))
    }

    pub fn callable(&self, name: &str) -> Result<NamedCallable> {
        self.callables
            .get(name)
            .cloned()
            .ok_or_else(|| DataError::definition(format!("Callable {name} not found.")))
    }

    pub fn definition_source(&self, name: &str) -> Result<DefinitionSource> {
        self.definition_sources
            .get(name)
            .copied()
            .ok_or_else(|| DataError::definition(format!("Definition source {name} not found.")))
    }

    pub fn change_listeners(&self) -> &[ChangeListener] {
        &self.listeners
    }

    pub fn expression_language(&self) -> &Arc<dyn ExpressionLanguage> {
        &self.expression_language
    }

    // ---- tree construction ----

    /// Builds a tree for `definition`. The tree cannot be suspended.
    pub fn create_from_definition(self: &Arc<Self>, definition: DataDefinition) -> Result<DataTree> {
        DataTree::new(Arc::clone(self), Arc::new(definition))
    }

    /// Builds a tree from `P`, recording its name for suspend/resume.
    ///
    /// `P` does not need to be registered to build the tree, only to resume
    /// it later.
    pub fn create_from_provider<P: DefinitionProvider>(self: &Arc<Self>) -> Result<DataTree> {
        let mut tree = self.create_from_definition(P::definition()?)?;
        tree.set_definition_source(P::NAME);
        Ok(tree)
    }

    /// Builds a tree from a registered definition source.
    pub fn create_from_callback(self: &Arc<Self>, name: &str) -> Result<DataTree> {
        let source = self.definition_source(name)?;
        let mut tree = self.create_from_definition(source()?)?;
        tree.set_definition_source(name);
        Ok(tree)
    }

    /// Rebuilds a suspended tree. Its definition source must be registered.
    pub fn resume(self: &Arc<Self>, suspended: SuspendedData) -> Result<DataTree> {
        DataTree::resume(Arc::clone(self), suspended)
    }
}
