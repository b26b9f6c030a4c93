use std::{fmt, sync::Arc};

use indexmap::IndexMap;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{
    ADDRESS_SEPARATOR, DefaultDefinition, OptionDefinition, OptionSet, OptionSetProvider,
    OptionsSortOrder, VariantDefinition, option::sort_options, scalar_key,
};
use crate::error::{DataError, Result};

/// Type tag of a definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    String,
    Boolean,
    Integer,
    Number,
    /// Named properties.
    Complex,
    /// A single variant property that selects further properties.
    Mutable,
}

impl DataType {
    /// Whether values of this type are scalars.
    pub fn is_simple(self) -> bool {
        !matches!(self, DataType::Complex | DataType::Mutable)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DataType::String => "string",
            DataType::Boolean => "boolean",
            DataType::Integer => "integer",
            DataType::Number => "number",
            DataType::Complex => "complex",
            DataType::Mutable => "mutable",
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The data node kind a definition instantiates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefinitionKind {
    Simple(DataType),
    Array,
    Complex,
    Mutable,
}

/// Unbounded cardinality.
pub const CARDINALITY_UNLIMITED: i64 = -1;

/// Schema node describing the shape and constraints of data.
///
/// Built once and shared by every data tree instantiated from it.
#[derive(Debug, Clone)]
pub struct DataDefinition {
    data_type: DataType,
    name: Option<String>,
    label: String,
    description: String,
    required: bool,
    internal: bool,
    cardinality: i64,
    default: Option<DefaultDefinition>,
    properties: IndexMap<String, Arc<DataDefinition>>,
    variants: IndexMap<String, VariantDefinition>,
    variant_mapping: Option<IndexMap<String, String>>,
    is_variant_property: bool,
    options: Option<IndexMap<String, OptionDefinition>>,
    option_set: Option<OptionSet>,
    options_sort: OptionsSortOrder,
    validators: Vec<String>,
}

impl DataDefinition {
    pub fn new(data_type: DataType) -> Self {
        Self {
            data_type,
            name: None,
            label: String::new(),
            description: String::new(),
            required: false,
            internal: false,
            cardinality: 1,
            default: None,
            properties: IndexMap::new(),
            variants: IndexMap::new(),
            variant_mapping: None,
            is_variant_property: false,
            options: None,
            option_set: None,
            options_sort: OptionsSortOrder::Original,
            validators: Vec::new(),
        }
    }

    pub fn string() -> Self {
        Self::new(DataType::String)
    }

    pub fn boolean() -> Self {
        Self::new(DataType::Boolean)
    }

    pub fn integer() -> Self {
        Self::new(DataType::Integer)
    }

    pub fn number() -> Self {
        Self::new(DataType::Number)
    }

    pub fn complex() -> Self {
        Self::new(DataType::Complex)
    }

    pub fn mutable() -> Self {
        Self::new(DataType::Mutable)
    }

    // ---- accessors ----

    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    /// The data node kind this definition instantiates.
    pub fn kind(&self) -> DefinitionKind {
        if self.is_multiple() {
            return DefinitionKind::Array;
        }
        match self.data_type {
            DataType::Complex => DefinitionKind::Complex,
            DataType::Mutable => DefinitionKind::Mutable,
            simple => DefinitionKind::Simple(simple),
        }
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn is_required(&self) -> bool {
        self.required
    }

    pub fn is_internal(&self) -> bool {
        self.internal
    }

    pub fn cardinality(&self) -> i64 {
        self.cardinality
    }

    pub fn is_multiple(&self) -> bool {
        self.cardinality != 1
    }

    pub fn default(&self) -> Option<&DefaultDefinition> {
        self.default.as_ref()
    }

    pub fn has_default(&self) -> bool {
        self.default.is_some()
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

    pub fn variants(&self) -> &IndexMap<String, VariantDefinition> {
        &self.variants
    }

    pub fn variant(&self, name: &str) -> Option<&VariantDefinition> {
        self.variants.get(name)
    }

    pub fn variant_mapping(&self) -> Option<&IndexMap<String, String>> {
        self.variant_mapping.as_ref()
    }

    /// Whether this is the selecting property of a mutable definition.
    pub fn is_variant_property(&self) -> bool {
        self.is_variant_property
    }

    /// The variant property of a mutable definition.
    pub fn variant_property(&self) -> Option<&Arc<DataDefinition>> {
        match self.data_type {
            DataType::Mutable => self.properties.values().next(),
            _ => None,
        }
    }

    pub fn options_sorting(&self) -> OptionsSortOrder {
        self.options_sort
    }

    pub fn validators(&self) -> &[String] {
        &self.validators
    }

    // ---- builder ----

    /// Assigns the machine name.
    ///
    /// A name cannot be changed once assigned, and may not contain `:`.
    pub fn set_name(&mut self, name: &str) -> Result<()> {
        if name.contains(ADDRESS_SEPARATOR) {
            return Err(DataError::definition(format!(
                "Machine name '{name}' may not contain '{ADDRESS_SEPARATOR}'."
            )));
        }
        match &self.name {
            Some(existing) if existing != name => Err(DataError::definition(format!(
                "Machine name '{existing}' cannot be renamed to '{name}'."
            ))),
            _ => {
                self.name = Some(name.to_string());
                Ok(())
            }
        }
    }

    pub fn with_name(mut self, name: &str) -> Result<Self> {
        self.set_name(name)?;
        Ok(self)
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    pub fn with_internal(mut self, internal: bool) -> Self {
        self.internal = internal;
        self
    }

    /// Sets cardinality to unbounded, or back to single.
    pub fn with_multiple(mut self, multiple: bool) -> Self {
        self.cardinality = if multiple { CARDINALITY_UNLIMITED } else { 1 };
        self
    }

    /// Sets the cardinality: `1`, [`CARDINALITY_UNLIMITED`], or any bound above one.
    pub fn with_cardinality(mut self, cardinality: i64) -> Result<Self> {
        if cardinality == 0 || cardinality < CARDINALITY_UNLIMITED {
            return Err(DataError::definition(format!(
                "Invalid cardinality {cardinality}."
            )));
        }
        self.cardinality = cardinality;
        Ok(self)
    }

    pub fn with_default(mut self, default: DefaultDefinition) -> Self {
        self.default = Some(default);
        self
    }

    pub fn with_literal_default(self, value: impl Into<Value>) -> Self {
        self.with_default(DefaultDefinition::literal(value))
    }

    pub fn with_expression_default(self, expression: impl Into<String>) -> Self {
        self.with_default(DefaultDefinition::expression(expression))
    }

    pub fn with_callable_default(self, name: impl Into<String>) -> Self {
        self.with_default(DefaultDefinition::callable(name))
    }

    pub fn remove_default(&mut self) -> Option<DefaultDefinition> {
        self.default.take()
    }

    /// Replaces the properties, naming each after its key.
    pub fn with_properties<I, S>(mut self, properties: I) -> Result<Self>
    where
        I: IntoIterator<Item = (S, DataDefinition)>,
        S: Into<String>,
    {
        self.check_accepts_properties()?;
        let mut named = IndexMap::new();
        for (name, mut property) in properties {
            let name = name.into();
            property.set_name(&name)?;
            named.insert(name, property);
        }
        self.properties.clear();
        self.insert_properties(named.into_values())?;
        Ok(self)
    }

    /// Adds a property that already carries a machine name.
    pub fn add_property(&mut self, property: DataDefinition) -> Result<()> {
        self.add_properties([property])
    }

    pub fn add_properties<I>(&mut self, properties: I) -> Result<()>
    where
        I: IntoIterator<Item = DataDefinition>,
    {
        self.check_accepts_properties()?;
        self.insert_properties(properties)
    }

    pub fn with_property(mut self, property: DataDefinition) -> Result<Self> {
        self.add_property(property)?;
        Ok(self)
    }

    pub fn remove_property(&mut self, name: &str) -> Option<Arc<DataDefinition>> {
        self.properties.shift_remove(name)
    }

    fn check_accepts_properties(&self) -> Result<()> {
        if self.data_type.is_simple() {
            return Err(DataError::definition(format!(
                "Properties cannot be added to a {} definition.",
                self.data_type
            )));
        }
        Ok(())
    }

    fn insert_properties<I>(&mut self, properties: I) -> Result<()>
    where
        I: IntoIterator<Item = DataDefinition>,
    {
        for mut property in properties {
            let name = property
                .name
                .clone()
                .ok_or_else(|| DataError::definition("Properties must have a machine name set."))?;
            if self.data_type == DataType::Mutable {
                if !self.properties.is_empty() && !self.properties.contains_key(&name) {
                    return Err(DataError::definition(
                        "Mutable data must have exactly one property, the variant property.",
                    ));
                }
                property.required = true;
                property.is_variant_property = true;
            }
            self.properties.insert(name, Arc::new(property));
        }
        Ok(())
    }

    /// Maps raw variant property values to variant names.
    ///
    /// Set this before the variants so the variant property options are
    /// derived from it.
    pub fn with_variant_mapping<I, K, V>(mut self, mapping: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.variant_mapping = Some(
            mapping
                .into_iter()
                .map(|(raw, variant)| (raw.into(), variant.into()))
                .collect(),
        );
        self
    }

    pub fn with_variants<I, S>(mut self, variants: I) -> Result<Self>
    where
        I: IntoIterator<Item = (S, VariantDefinition)>,
        S: Into<String>,
    {
        self.set_variants(variants)?;
        Ok(self)
    }

    /// Replaces the variants of a mutable definition.
    ///
    /// The variant property must already be set. When it has no options of
    /// its own they are derived from the variant mapping, or else from the
    /// variant labels.
    pub fn set_variants<I, S>(&mut self, variants: I) -> Result<()>
    where
        I: IntoIterator<Item = (S, VariantDefinition)>,
        S: Into<String>,
    {
        if self.data_type != DataType::Mutable {
            return Err(DataError::definition(
                "Variants can only be set on mutable definitions.",
            ));
        }
        let variants: IndexMap<String, VariantDefinition> = variants
            .into_iter()
            .map(|(name, variant)| (name.into(), variant))
            .collect();

        let derived = match &self.variant_mapping {
            Some(mapping) => mapping
                .iter()
                .map(|(raw, variant)| OptionDefinition::new(raw.as_str(), variant.as_str()))
                .collect::<Vec<_>>(),
            None => variants
                .iter()
                .map(|(name, variant)| {
                    if variant.label().is_empty() {
                        Err(DataError::definition(format!(
                            "Variant '{name}' must have a label to build the variant property options."
                        )))
                    } else {
                        Ok(OptionDefinition::new(name.as_str(), variant.label()))
                    }
                })
                .collect::<Result<Vec<_>>>()?,
        };

        let property = self.properties.values_mut().next().ok_or_else(|| {
            DataError::definition("Variant property must be set before setting variants.")
        })?;
        if !property.has_options() {
            Arc::make_mut(property).set_options(derived)?;
        }

        self.variants = variants;
        Ok(())
    }

    /// Looks up a variant's properties.
    pub fn variant_properties(&self, variant: &str) -> Result<&IndexMap<String, Arc<DataDefinition>>> {
        self.variants
            .get(variant)
            .map(VariantDefinition::properties)
            .ok_or_else(|| DataError::invalid_input(format!("Unknown variant '{variant}'.")))
    }

    pub fn with_options<I>(mut self, options: I) -> Result<Self>
    where
        I: IntoIterator<Item = OptionDefinition>,
    {
        self.set_options(options)?;
        Ok(self)
    }

    /// Replaces the static options. An option with the same value as an
    /// earlier one replaces it in place.
    pub fn set_options<I>(&mut self, options: I) -> Result<()>
    where
        I: IntoIterator<Item = OptionDefinition>,
    {
        self.check_no_option_set()?;
        let mut map = IndexMap::new();
        for option in options {
            map.insert(option.key(), option);
        }
        self.options = Some(map);
        Ok(())
    }

    pub fn add_option(&mut self, option: OptionDefinition) -> Result<()> {
        self.check_no_option_set()?;
        self.options
            .get_or_insert_with(IndexMap::new)
            .insert(option.key(), option);
        Ok(())
    }

    /// Sets options from `(value, label)` pairs.
    pub fn with_options_array<I, V, L>(self, options: I) -> Result<Self>
    where
        I: IntoIterator<Item = (V, L)>,
        V: Into<Value>,
        L: Into<String>,
    {
        self.with_options(
            options
                .into_iter()
                .map(|(value, label)| OptionDefinition::new(value, label)),
        )
    }

    /// Uses a provider for the options instead of a static list.
    pub fn with_option_set(mut self, provider: Arc<dyn OptionSetProvider>) -> Result<Self> {
        if self.options.is_some() {
            return Err(DataError::definition(
                "Cannot set an option set on a definition that already has options.",
            ));
        }
        self.option_set = Some(OptionSet(provider));
        Ok(self)
    }

    fn check_no_option_set(&self) -> Result<()> {
        if self.option_set.is_some() {
            return Err(DataError::definition(
                "Cannot set options on a definition that uses an option set.",
            ));
        }
        Ok(())
    }

    pub fn with_options_sorting(mut self, order: OptionsSortOrder) -> Self {
        self.options_sort = order;
        self
    }

    pub fn with_validators<I, S>(mut self, validators: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.validators = validators.into_iter().map(Into::into).collect();
        self
    }

    // ---- derived ----

    pub fn has_options(&self) -> bool {
        self.options.is_some() || self.option_set.is_some()
    }

    /// All options sorted by weight, then by the sort order.
    pub fn options(&self) -> Vec<OptionDefinition> {
        let mut options = match (&self.options, &self.option_set) {
            (Some(options), _) => options.values().cloned().collect(),
            (None, Some(set)) => set.0.options(),
            (None, None) => Vec::new(),
        };
        sort_options(&mut options, self.options_sort);
        options
    }

    /// Whether `value` equals one of the option values.
    pub fn is_option(&self, value: &Value) -> bool {
        let key = scalar_key(value);
        match (&self.options, &self.option_set) {
            (Some(options), _) => options.contains_key(&key),
            (None, Some(set)) => set.0.options().iter().any(|option| option.key() == key),
            (None, None) => false,
        }
    }

    /// The definition of each item of a multiple definition.
    pub fn delta_definition(&self) -> DataDefinition {
        let mut delta = self.clone();
        delta.cardinality = 1;
        delta.default = None;
        delta
    }

    /// Finds a nested property definition by absolute address.
    ///
    /// The first segment names the root and is skipped, as are numeric delta
    /// segments. Lookups on mutable definitions fall through to the variant
    /// properties.
    pub fn nested_property(&self, address: &str) -> Result<&DataDefinition> {
        let mut current = self;
        for segment in address.split(ADDRESS_SEPARATOR).skip(1) {
            if segment.parse::<usize>().is_ok() {
                continue;
            }
            current = current
                .properties
                .get(segment)
                .or_else(|| {
                    current
                        .variants
                        .values()
                        .find_map(|variant| variant.property(segment))
                })
                .map(Arc::as_ref)
                .ok_or_else(|| {
                    DataError::invalid_address(format!(
                        "No property '{segment}' found in definition for address '{address}'."
                    ))
                })?;
        }
        Ok(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn pet() -> DataDefinition {
        DataDefinition::mutable()
            .with_properties([("kind", DataDefinition::string())])
            .expect("variant property")
            .with_variants([
                (
                    "dog",
                    VariantDefinition::new()
                        .with_label("Dog")
                        .with_properties([("bark", DataDefinition::string())])
                        .expect("dog properties"),
                ),
                (
                    "cat",
                    VariantDefinition::new()
                        .with_label("Cat")
                        .with_properties([("meow", DataDefinition::boolean())])
                        .expect("cat properties"),
                ),
            ])
            .expect("variants")
    }

    #[test]
    fn test_kind_follows_cardinality() {
        assert_eq!(
            DataDefinition::string().kind(),
            DefinitionKind::Simple(DataType::String)
        );
        assert_eq!(
            DataDefinition::complex().with_multiple(true).kind(),
            DefinitionKind::Array
        );
        assert_eq!(DataDefinition::mutable().kind(), DefinitionKind::Mutable);
    }

    #[test]
    fn test_bad_cardinality() {
        assert!(DataDefinition::string().with_cardinality(0).is_err());
        assert!(DataDefinition::string().with_cardinality(-2).is_err());
        assert_eq!(
            DataDefinition::string()
                .with_cardinality(4)
                .expect("bounded")
                .cardinality(),
            4
        );
    }

    #[test]
    fn test_name_is_immutable() {
        let def = DataDefinition::string().with_name("one").expect("name");
        assert!(def.clone().with_name("one").is_ok());
        let err = def.with_name("two").expect_err("rename");
        assert!(err.is_definition());
        assert!(DataDefinition::string().with_name("a:b").is_err());
    }

    #[test]
    fn test_simple_rejects_properties() {
        let err = DataDefinition::integer()
            .with_properties([("one", DataDefinition::string())])
            .expect_err("simple with properties");
        assert!(err.is_definition());
        assert!(
            DataDefinition::string()
                .add_property(DataDefinition::string().with_name("x").expect("name"))
                .is_err()
        );
    }

    #[test]
    fn test_unnamed_property_rejected() {
        let mut def = DataDefinition::complex();
        assert!(def.add_property(DataDefinition::string()).is_err());
    }

    #[test]
    fn test_mutable_single_variant_property() {
        let def = pet();
        let property = def.variant_property().expect("variant property");
        assert!(property.is_required());
        assert!(property.is_variant_property());

        let mut def = def;
        let err = def
            .add_property(DataDefinition::string().with_name("other").expect("name"))
            .expect_err("second property");
        assert!(err.is_definition());
    }

    #[test]
    fn test_variants_require_properties() {
        let err = DataDefinition::mutable()
            .with_variants([("a", VariantDefinition::new().with_label("A"))])
            .expect_err("no variant property");
        assert!(err.is_definition());

        let err = DataDefinition::complex()
            .with_variants([("a", VariantDefinition::new().with_label("A"))])
            .expect_err("complex variants");
        assert!(err.is_definition());
    }

    #[test]
    fn test_variant_options_from_labels() {
        let def = pet();
        let options = def.variant_property().expect("property").options();
        let labels: Vec<_> = options.iter().map(|o| o.label.as_str()).collect();
        assert_eq!(labels, ["Dog", "Cat"]);
        assert_eq!(options[0].value, json!("dog"));
    }

    #[test]
    fn test_variant_options_from_mapping() {
        let def = DataDefinition::mutable()
            .with_properties([("kind", DataDefinition::string())])
            .expect("property")
            .with_variant_mapping([("d", "dog"), ("puppy", "dog")])
            .with_variants([("dog", VariantDefinition::new())])
            .expect("variants");
        let options = def.variant_property().expect("property").options();
        let values: Vec<_> = options.iter().map(OptionDefinition::key).collect();
        assert_eq!(values, ["d", "puppy"]);
        assert_eq!(options[1].label, "dog");
    }

    #[test]
    fn test_explicit_variant_options_kept() {
        let def = DataDefinition::mutable()
            .with_properties([(
                "kind",
                DataDefinition::string()
                    .with_options_array([("dog", "Woof")])
                    .expect("options"),
            )])
            .expect("property")
            .with_variants([("dog", VariantDefinition::new().with_label("Dog"))])
            .expect("variants");
        let options = def.variant_property().expect("property").options();
        assert_eq!(options.len(), 1);
        assert_eq!(options[0].label, "Woof");
    }

    #[test]
    fn test_options_replace_by_value() {
        let mut def = DataDefinition::string();
        def.add_option(OptionDefinition::new("a", "First")).expect("a");
        def.add_option(OptionDefinition::new("b", "B")).expect("b");
        def.add_option(OptionDefinition::new("a", "Again")).expect("a again");
        let labels: Vec<_> = def.options().into_iter().map(|o| o.label).collect();
        assert_eq!(labels, ["Again", "B"]);
        assert!(def.is_option(&json!("b")));
        assert!(!def.is_option(&json!("c")));
    }

    struct Colours;

    impl OptionSetProvider for Colours {
        fn options(&self) -> Vec<OptionDefinition> {
            vec![
                OptionDefinition::new("red", "Red"),
                OptionDefinition::new("blue", "Blue"),
            ]
        }
    }

    #[test]
    fn test_option_set_excludes_options() {
        let def = DataDefinition::string()
            .with_option_set(Arc::new(Colours))
            .expect("option set");
        assert!(def.has_options());
        assert!(def.is_option(&json!("blue")));
        assert!(def.clone().with_options_array([("x", "X")]).is_err());

        let err = DataDefinition::string()
            .with_options_array([("x", "X")])
            .expect("options")
            .with_option_set(Arc::new(Colours))
            .expect_err("both");
        assert!(err.is_definition());

        let sorted = def.with_options_sorting(OptionsSortOrder::Label).options();
        assert_eq!(sorted[0].label, "Blue");
    }

    #[test]
    fn test_delta_definition() {
        let def = DataDefinition::string()
            .with_cardinality(3)
            .expect("cardinality")
            .with_literal_default(json!(["a"]))
            .with_label("Tags");
        let delta = def.delta_definition();
        assert_eq!(delta.cardinality(), 1);
        assert!(!delta.has_default());
        assert_eq!(delta.label(), "Tags");
    }

    #[test]
    fn test_nested_property() {
        let def = DataDefinition::complex()
            .with_name("root")
            .expect("name")
            .with_properties([
                (
                    "pets",
                    pet().with_multiple(true),
                ),
                ("owner", DataDefinition::string()),
            ])
            .expect("properties");

        let bark = def.nested_property("root:pets:0:bark").expect("bark");
        assert_eq!(bark.name(), Some("bark"));
        let owner = def.nested_property("root:owner").expect("owner");
        assert_eq!(owner.data_type(), DataType::String);
        let err = def
            .nested_property("root:pets:0:purr")
            .expect_err("missing");
        assert!(err.is_invalid_address());
    }
}
