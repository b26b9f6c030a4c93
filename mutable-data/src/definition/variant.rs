use std::sync::Arc;

use indexmap::IndexMap;

use crate::{
    definition::DataDefinition,
    error::{DataError, Result},
};

/// A named bundle of properties merged into mutable data once selected.
#[derive(Debug, Clone, Default)]
pub struct VariantDefinition {
    label: String,
    properties: IndexMap<String, Arc<DataDefinition>>,
}

impl VariantDefinition {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Replaces the properties, naming each after its key.
    pub fn with_properties<I, S>(mut self, properties: I) -> Result<Self>
    where
        I: IntoIterator<Item = (S, DataDefinition)>,
        S: Into<String>,
    {
        self.properties.clear();
        self.add_properties(properties)?;
        Ok(self)
    }

    pub fn add_properties<I, S>(&mut self, properties: I) -> Result<()>
    where
        I: IntoIterator<Item = (S, DataDefinition)>,
        S: Into<String>,
    {
        for (name, mut property) in properties {
            let name = name.into();
            property.set_name(&name)?;
            self.properties.insert(name, Arc::new(property));
        }
        Ok(())
    }

    /// Adds a property that already carries a machine name.
    pub fn add_property(&mut self, property: DataDefinition) -> Result<()> {
        let name = property
            .name()
            .ok_or_else(|| {
                DataError::definition("Properties added to a variant must have a machine name set.")
            })?
            .to_string();
        self.properties.insert(name, Arc::new(property));
        Ok(())
    }

    pub fn remove_property(&mut self, name: &str) -> Option<Arc<DataDefinition>> {
        self.properties.shift_remove(name)
    }

    pub fn properties(&self) -> &IndexMap<String, Arc<DataDefinition>> {
        &self.properties
    }

    pub fn property(&self, name: &str) -> Option<&Arc<DataDefinition>> {
        self.properties.get(name)
    }

    pub fn property_names(&self) -> Vec<&str> {
        self.properties.keys().map(String::as_str).collect()
    }
}
