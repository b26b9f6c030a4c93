//! Declarative schema documents.
//!
//! Definitions can be written as JSON or TOML documents and loaded with
//! [`DataDefinition::from_json_str`] or [`DataDefinition::from_toml_str`]:
//!
//! ```toml
//! name = "pet"
//! type = "mutable"
//!
//! [properties.kind]
//! type = "string"
//! label = "Kind"
//!
//! [variants.dog]
//! label = "Dog"
//! properties.bark = { type = "string" }
//! ```

use indexmap::IndexMap;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    definition::{
        DataDefinition, DataType, DefaultDefinition, OptionDefinition, OptionsSortOrder,
        VariantDefinition,
    },
    error::{DataError, Result},
};

/// One definition node as written in a schema document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct SchemaDocument {
    /// Machine name. Property names come from their key instead.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub data_type: DataType,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub label: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub internal: bool,
    /// Maximum number of items, `-1` for unlimited. Takes precedence over
    /// `multiple`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cardinality: Option<i64>,
    /// Shorthand for an unlimited cardinality.
    #[serde(default)]
    pub multiple: bool,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub properties: IndexMap<String, SchemaDocument>,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub variants: IndexMap<String, VariantDocument>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variant_mapping: Option<IndexMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<DefaultDocument>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<OptionDefinition>,
    #[serde(default)]
    pub options_sort: OptionsSortOrder,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub validators: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct VariantDocument {
    pub label: String,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub properties: IndexMap<String, SchemaDocument>,
}

/// A default; exactly one of `literal`, `expression` or `callable`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct DefaultDocument {
    /// A `null` literal reads as no literal, so `{ literal = null }` is
    /// refused. Leave `default` out instead.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub literal: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expression: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub callable: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<String>,
}

impl SchemaDocument {
    /// JSON Schema of schema documents.
    pub fn json_schema() -> Result<Value> {
        let schema = schemars::schema_for!(SchemaDocument);
        serde_json::to_value(&schema)
            .map_err(|err| DataError::definition(format!("Failed to serialize JSON schema: {err}")))
    }
}

impl TryFrom<DefaultDocument> for DefaultDefinition {
    type Error = DataError;

    fn try_from(document: DefaultDocument) -> Result<Self> {
        let default = match (document.literal, document.expression, document.callable) {
            (Some(literal), None, None) => DefaultDefinition::literal(literal),
            (None, Some(expression), None) => DefaultDefinition::expression(expression),
            (None, None, Some(callable)) => DefaultDefinition::callable(callable),
            _ => {
                return Err(DataError::definition(
                    "A default must have exactly one non-null literal, expression or callable.",
                ));
            }
        };
        Ok(default.with_dependencies(document.dependencies))
    }
}

impl TryFrom<VariantDocument> for VariantDefinition {
    type Error = DataError;

    fn try_from(document: VariantDocument) -> Result<Self> {
        VariantDefinition::new()
            .with_label(document.label)
            .with_properties(convert_properties(document.properties)?)
    }
}

impl TryFrom<SchemaDocument> for DataDefinition {
    type Error = DataError;

    fn try_from(document: SchemaDocument) -> Result<Self> {
        let mut definition = DataDefinition::new(document.data_type)
            .with_label(document.label)
            .with_description(document.description)
            .with_required(document.required)
            .with_internal(document.internal)
            .with_options_sorting(document.options_sort)
            .with_validators(document.validators);
        if let Some(name) = &document.name {
            definition.set_name(name)?;
        }
        definition = match document.cardinality {
            Some(cardinality) => definition.with_cardinality(cardinality)?,
            None => definition.with_multiple(document.multiple),
        };
        if let Some(default) = document.default {
            definition = definition.with_default(default.try_into()?);
        }
        if !document.options.is_empty() {
            definition = definition.with_options(document.options)?;
        }
        if !document.properties.is_empty() {
            definition = definition.with_properties(convert_properties(document.properties)?)?;
        }
        if let Some(mapping) = document.variant_mapping {
            definition = definition.with_variant_mapping(mapping);
        }
        if !document.variants.is_empty() {
            let variants = document
                .variants
                .into_iter()
                .map(|(name, variant)| -> Result<_> { Ok((name, VariantDefinition::try_from(variant)?)) })
                .collect::<Result<Vec<_>>>()?;
            definition = definition.with_variants(variants)?;
        }
        Ok(definition)
    }
}

fn convert_properties(
    properties: IndexMap<String, SchemaDocument>,
) -> Result<Vec<(String, DataDefinition)>> {
    properties
        .into_iter()
        .map(|(name, property)| -> Result<_> {
            let definition = DataDefinition::try_from(property).map_err(|err| {
                DataError::definition(format!("Property '{name}': {}", err.message()))
            })?;
            Ok((name, definition))
        })
        .collect()
}

impl DataDefinition {
    /// Loads a definition from a JSON schema document.
    pub fn from_json_str(source: &str) -> Result<Self> {
        let document: SchemaDocument = serde_json::from_str(source)
            .map_err(|err| DataError::definition(format!("Invalid JSON schema document: {err}")))?;
        document.try_into()
    }

    /// Loads a definition from a TOML schema document.
    pub fn from_toml_str(source: &str) -> Result<Self> {
        let document: SchemaDocument = toml::from_str(source)
            .map_err(|err| DataError::definition(format!("Invalid TOML schema document: {err}")))?;
        document.try_into()
    }
}
