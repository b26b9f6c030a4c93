use std::sync::Arc;

use indexmap::IndexMap;
use serde_json::{Map, Value};

use super::{DataTree, NodeId, NodeKind, NodeType, VariantState};
use crate::{
    definition::DataDefinition,
    error::{DataError, Result},
};

impl DataTree {
    /// Properties currently available on a complex or mutable node,
    /// including internal ones.
    pub(super) fn active_properties(&self, id: NodeId) -> Result<IndexMap<String, Arc<DataDefinition>>> {
        let node = self.node(id)?;
        match &node.kind {
            NodeKind::Complex { .. }
            | NodeKind::Mutable {
                variant: VariantState::Unselected,
                ..
            } => Ok(node.definition.properties().clone()),
            NodeKind::Mutable {
                variant: VariantState::Selected { properties, .. },
                ..
            } => Ok(properties.clone()),
            NodeKind::Simple { .. } | NodeKind::Array { .. } => Err(DataError::invalid_access(
                format!(
                    "{} data at '{}' has no properties.",
                    node.kind.node_type(),
                    self.address(id)?
                ),
            )),
        }
    }

    /// Active properties, without internal ones unless revealed.
    pub(super) fn visible_properties(&self, id: NodeId) -> Result<IndexMap<String, Arc<DataDefinition>>> {
        let reveal = self.node(id)?.reveal_internal;
        let mut properties = self.active_properties(id)?;
        properties.retain(|_, property| reveal || !property.is_internal());
        Ok(properties)
    }

    fn check_properties_access(&self, id: NodeId, name: &str) -> Result<()> {
        match self.node_type(id)? {
            NodeType::Simple => Err(DataError::invalid_access(format!(
                "For a single-valued item, the only possible property is 'value', attempt to get '{name}' at {}.",
                self.address(id)?
            ))),
            NodeType::Array => Err(DataError::invalid_access(format!(
                "Array data cannot be accessed as an object at address '{}'; property was '{name}'.",
                self.address(id)?
            ))),
            NodeType::Complex | NodeType::Mutable => Ok(()),
        }
    }

    /// Gets a property's node, instantiating it on first access.
    ///
    /// Access alone does not mark the property as set.
    pub fn get_property(&mut self, id: NodeId, name: &str) -> Result<NodeId> {
        self.check_properties_access(id, name)?;
        if let Some(child) = self.node(id)?.kind.children().and_then(|c| c.get(name)) {
            return Ok(*child);
        }
        let properties = self.active_properties(id)?;
        let definition = properties.get(name).ok_or_else(|| {
            DataError::invalid_access(format!(
                "Unknown property '{name}' on data at '{}', available properties are: {}.",
                self.address(id).unwrap_or_default(),
                join_keys(&properties)
            ))
        })?;
        let child = self.create_node(Arc::clone(definition), Some(id), None)?;
        if let Some(children) = self.node_mut(id)?.kind.children_mut() {
            children.insert(name.to_string(), child);
        }
        Ok(child)
    }

    /// Sets a single property.
    ///
    /// On simple data the only property is `value`.
    pub fn set_property(&mut self, id: NodeId, name: &str, value: impl Into<Value>) -> Result<()> {
        let value = value.into();
        match self.node_type(id)? {
            NodeType::Simple if name == "value" => return self.set(id, value),
            NodeType::Simple => {
                return Err(DataError::invalid_access(format!(
                    "Only the 'value' property may be set on simple data at address {}.",
                    self.address(id)?
                )));
            }
            NodeType::Array => {
                return Err(DataError::invalid_access(format!(
                    "Attempt to set object property {name} on array data at {}.",
                    self.address(id)?
                )));
            }
            NodeType::Mutable => self.check_mutable_property_value(id, name, &value)?,
            NodeType::Complex => {}
        }
        if !self.has_property(id, name)? {
            return Err(DataError::invalid_access(format!(
                "Attempt to set nonexistent property '{name}' at {}.",
                self.address(id)?
            )));
        }
        let child = self.get_property(id, name)?;
        self.set(child, value)?;
        self.node_mut(id)?.set = true;
        Ok(())
    }

    /// Whether the property is currently available, internal or not.
    pub fn has_property(&self, id: NodeId, name: &str) -> Result<bool> {
        Ok(self.active_properties(id)?.contains_key(name))
    }

    /// Names of the visible properties, in declared order.
    pub fn property_names(&self, id: NodeId) -> Result<Vec<String>> {
        Ok(self.visible_properties(id)?.into_keys().collect())
    }

    /// Gets a property's definition. Internal properties are only available
    /// once revealed.
    pub fn property_definition(&self, id: NodeId, name: &str) -> Result<Arc<DataDefinition>> {
        let properties = self.active_properties(id)?;
        let property = properties.get(name).ok_or_else(|| {
            DataError::invalid_access(format!(
                "Attempt to get definition for nonexistent property '{name}' at {}.",
                self.address(id).unwrap_or_default()
            ))
        })?;
        if property.is_internal() && !self.node(id)?.reveal_internal {
            return Err(DataError::invalid_access(format!(
                "Attempt to get internal property '{name}' at {}.",
                self.address(id)?
            )));
        }
        Ok(Arc::clone(property))
    }

    /// Visible properties in declared order, instantiating each.
    pub fn properties(&mut self, id: NodeId) -> Result<Vec<(String, NodeId)>> {
        let mut properties = Vec::new();
        for name in self.visible_properties(id)?.into_keys() {
            let child = self.get_property(id, &name)?;
            properties.push((name, child));
        }
        Ok(properties)
    }

    pub(super) fn remove_property(&mut self, id: NodeId, name: &str) -> Result<()> {
        let removed = self
            .node_mut(id)?
            .kind
            .children_mut()
            .and_then(|children| children.shift_remove(name));
        if let Some(child) = removed {
            self.free_subtree(child);
        }
        Ok(())
    }

    /// Checks every key of a bulk set against `properties` before anything
    /// is changed.
    pub(super) fn check_keys(
        &self,
        id: NodeId,
        map: &Map<String, Value>,
        properties: &IndexMap<String, Arc<DataDefinition>>,
    ) -> Result<()> {
        for (name, value) in map {
            if !properties.contains_key(name) {
                return Err(DataError::invalid_access(format!(
                    "Attempt to set nonexistent property '{name}' at {} with value '{value}', available properties are: {}.",
                    self.address(id)?,
                    join_keys(properties)
                )));
            }
        }
        Ok(())
    }

    pub(super) fn set_complex(&mut self, id: NodeId, value: Value) -> Result<()> {
        let Value::Object(map) = value else {
            return Err(DataError::invalid_input(format!(
                "Attempt to set a non-map value on complex data at address {}. Set individual values with properties.",
                self.address(id)?
            )));
        };
        let properties = self.active_properties(id)?;
        self.check_keys(id, &map, &properties)?;
        for (name, value) in map {
            let child = self.get_property(id, &name)?;
            self.set(child, value)?;
        }
        self.node_mut(id)?.set = true;
        Ok(())
    }

    pub(super) fn import_complex(&mut self, id: NodeId, value: Value) -> Result<()> {
        self.node_mut(id)?.set = true;
        let map = match value {
            Value::Object(map) => map,
            Value::Null => return Ok(()),
            other => {
                warn!("Skipping non-map import '{other}' at {}", self.address(id)?);
                return Ok(());
            }
        };
        for (name, value) in map {
            self.import_property(id, &name, value)?;
        }
        Ok(())
    }

    pub(super) fn import_property(&mut self, id: NodeId, name: &str, value: Value) -> Result<()> {
        if !self.has_property(id, name)? {
            warn!(
                "Skipping import of unknown property '{name}' at {}",
                self.address(id)?
            );
            return Ok(());
        }
        let child = self.get_property(id, name)?;
        self.import(child, value)
    }
}

fn join_keys(properties: &IndexMap<String, Arc<DataDefinition>>) -> String {
    properties
        .keys()
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}
