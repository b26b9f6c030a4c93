use std::sync::Arc;

use indexmap::IndexMap;
use serde_json::{Map, Value};

use super::{DataTree, NodeId, NodeKind, VariantState};
use crate::{
    definition::{DataDefinition, VariantDefinition, scalar_key},
    error::{DataError, Result},
};

/// The variant property may not be null or the empty string.
fn is_empty_variant(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}

impl DataTree {
    pub(super) fn variant_property_name(&self, id: NodeId) -> Result<String> {
        let node = self.node(id)?;
        node.definition
            .properties()
            .keys()
            .next()
            .cloned()
            .ok_or_else(|| {
                DataError::definition(format!(
                    "Mutable data '{}' has no variant property.",
                    node.name
                ))
            })
    }

    /// Whether `child` is the variant property node of mutable data `id`,
    /// compared by address.
    pub(super) fn is_variant_child(&self, id: NodeId, child: NodeId) -> Result<bool> {
        let node = self.node(id)?;
        let NodeKind::Mutable { children, .. } = &node.kind else {
            return Ok(false);
        };
        let Some(variant_child) = children.get(&self.variant_property_name(id)?) else {
            return Ok(false);
        };
        Ok(self.address(*variant_child)? == self.address(child)?)
    }

    /// Selects the variant for a raw variant property value.
    ///
    /// Children that are not properties of the new variant are dropped.
    pub(super) fn set_variant(&mut self, id: NodeId, raw: &Value, skip_mapping: bool) -> Result<()> {
        let variant = self.resolve_variant(id, raw, skip_mapping)?;
        let properties = self.variant_properties(id, &variant)?;

        let NodeKind::Mutable {
            children,
            variant: state,
        } = &mut self.node_mut(id)?.kind
        else {
            return Err(DataError::invalid_access(format!("Data {id} is not mutable.")));
        };
        let mut dropped = Vec::new();
        children.retain(|name, child| {
            let keep = properties.contains_key(name);
            if !keep {
                dropped.push(*child);
            }
            keep
        });
        *state = VariantState::Selected {
            variant: variant.clone(),
            properties,
        };
        for child in dropped {
            self.free_subtree(child);
        }
        debug!("Selected variant '{variant}' at {}", self.address(id)?);
        Ok(())
    }

    /// The variant property followed by the properties of `variant`.
    fn variant_properties(&self, id: NodeId, variant: &str) -> Result<IndexMap<String, Arc<DataDefinition>>> {
        let variant_name = self.variant_property_name(id)?;
        let definition = self.definition(id)?;
        let mut properties = IndexMap::new();
        if let Some(variant_property) = definition.properties().get(&variant_name) {
            properties.insert(variant_name, Arc::clone(variant_property));
        }
        for (name, property) in definition.variant_properties(variant)? {
            properties
                .entry(name.clone())
                .or_insert_with(|| Arc::clone(property));
        }
        Ok(properties)
    }

    /// Maps a raw variant property value to the name of an existing variant.
    fn resolve_variant(&self, id: NodeId, raw: &Value, skip_mapping: bool) -> Result<String> {
        if is_empty_variant(raw) {
            return Err(DataError::invalid_input(format!(
                "Mutable data at {} may not have its variant property set to an empty value.",
                self.address(id)?
            )));
        }
        let key = scalar_key(raw);
        let definition = self.definition(id)?;
        let variant = match definition.variant_mapping() {
            Some(mapping) if !skip_mapping => mapping.get(&key).cloned(),
            _ => Some(key.clone()),
        };
        match variant {
            Some(variant) if definition.variant(&variant).is_some() => Ok(variant),
            _ => Err(DataError::invalid_input(format!(
                "Invalid variant '{key}' at address {}.",
                self.address(id)?
            ))),
        }
    }

    pub(super) fn check_mutable_property_value(&self, id: NodeId, name: &str, value: &Value) -> Result<()> {
        let variant_name = self.variant_property_name(id)?;
        if name == variant_name {
            if is_empty_variant(value) {
                return Err(DataError::invalid_input(format!(
                    "Mutable data at {} may not have its variant property '{variant_name}' set to an empty value.",
                    self.address(id)?
                )));
            }
        } else if self.variant(id)?.is_none() {
            return Err(DataError::invalid_input(format!(
                "Variant must be set before any other property; attempt to set {name} on {}.",
                self.address(id)?
            )));
        }
        Ok(())
    }

    /// Splits a bulk value into the variant property value and the rest.
    fn split_variant_value(&self, id: NodeId, value: Value) -> Result<(Option<Value>, Map<String, Value>)> {
        let Value::Object(mut map) = value else {
            return Err(DataError::invalid_input(format!(
                "Attempt to set a non-map value on mutable data at address {}. Set individual values with properties.",
                self.address(id)?
            )));
        };
        let variant_name = self.variant_property_name(id)?;
        let variant_value = map.shift_remove(&variant_name);
        Ok((variant_value, map))
    }

    /// Sets the variant property first, wherever it appears in the map.
    pub(super) fn set_mutable(&mut self, id: NodeId, value: Value) -> Result<()> {
        let (variant_value, rest) = self.split_variant_value(id, value)?;
        let variant_name = self.variant_property_name(id)?;

        let properties = match &variant_value {
            Some(raw) => {
                let variant = self.resolve_variant(id, raw, false)?;
                self.variant_properties(id, &variant)?
            }
            None if self.variant(id)?.is_none() => {
                return Err(DataError::invalid_input(format!(
                    "Variant property {variant_name} must be set before any other property; attempt to set properties {} on {}.",
                    rest.keys().cloned().collect::<Vec<_>>().join(", "),
                    self.address(id)?
                )));
            }
            None => self.active_properties(id)?,
        };
        self.check_keys(id, &rest, &properties)?;

        if let Some(raw) = variant_value {
            let child = self.get_property(id, &variant_name)?;
            self.set(child, raw)?;
        }
        for (name, value) in rest {
            let child = self.get_property(id, &name)?;
            self.set(child, value)?;
        }
        self.node_mut(id)?.set = true;
        Ok(())
    }

    pub(super) fn import_mutable(&mut self, id: NodeId, value: Value) -> Result<()> {
        self.node_mut(id)?.set = true;
        let (variant_value, rest) = match value {
            Value::Null => return Ok(()),
            value @ Value::Object(_) => self.split_variant_value(id, value)?,
            other => {
                warn!("Skipping non-map import '{other}' at {}", self.address(id)?);
                return Ok(());
            }
        };
        if let Some(raw) = variant_value.filter(|raw| !is_empty_variant(raw)) {
            if self.resolve_variant(id, &raw, false).is_err() {
                warn!(
                    "Skipping import of unknown variant '{}' at {}",
                    scalar_key(&raw),
                    self.address(id)?
                );
                return Ok(());
            }
            let variant_name = self.variant_property_name(id)?;
            let child = self.get_property(id, &variant_name)?;
            self.import(child, raw)?;
        }
        for (name, value) in rest {
            if self.variant(id)?.is_none() {
                warn!(
                    "Skipping import of '{name}' at {}, no variant is selected",
                    self.address(id)?
                );
                continue;
            }
            self.import_property(id, &name, value)?;
        }
        Ok(())
    }

    /// The selected variant of mutable data.
    pub fn variant(&self, id: NodeId) -> Result<Option<&str>> {
        match &self.node(id)?.kind {
            NodeKind::Mutable { variant, .. } => Ok(match variant {
                VariantState::Unselected => None,
                VariantState::Selected { variant, .. } => Some(variant.as_str()),
            }),
            _ => Err(DataError::invalid_access(format!(
                "Data at {} is not mutable.",
                self.address(id)?
            ))),
        }
    }

    /// Definition of the selected variant.
    pub fn variant_definition(&self, id: NodeId) -> Result<&VariantDefinition> {
        let variant = self.variant(id)?.ok_or_else(|| match self.address(id) {
            Ok(address) => DataError::invalid_access(format!(
                "Variant must be set before getting the variant definition at {address}."
            )),
            Err(err) => err,
        })?;
        self.definition(id)?
            .variant(variant)
            .ok_or_else(|| DataError::definition(format!("Unknown variant '{variant}'.")))
    }

    /// Node of the variant property of mutable data.
    pub fn variant_item(&mut self, id: NodeId) -> Result<NodeId> {
        self.variant(id)?;
        let name = self.variant_property_name(id)?;
        self.get_property(id, &name)
    }

    /// Selects a variant by name, bypassing the variant mapping.
    pub(super) fn restore_variant(&mut self, id: NodeId, variant: &str) -> Result<()> {
        self.set_variant(id, &Value::String(variant.to_string()), true)
    }
}
