//! Trees built from TOML and JSON schema documents.

use std::sync::Arc;

use mutable_data::{
    DataDefinition, DataItemFactory, DataTree, NodeId, OptionDefinition,
    definition::{OptionSetProvider, OptionsSortOrder},
    schema::SchemaDocument,
    validator::Validator,
};
use pretty_assertions::assert_eq;
use serde_json::json;

const SERVER: &str = r#"
name = "server"
type = "complex"

[properties.host]
type = "string"
label = "Host name"
required = true
validators = ["no_spaces"]

[properties.port]
type = "integer"
default = { literal = 8080 }

[properties.url]
type = "string"
default = { expression = "'http://' ~ get('..:host') ~ ':' ~ get('..:port')", dependencies = ["..:host", "..:port"] }

[properties.aliases]
type = "string"
cardinality = 3

[properties.auth]
type = "mutable"

[properties.auth.properties.method]
type = "string"
label = "Method"

[properties.auth.variants.none]
label = "None"

[properties.auth.variants.token]
label = "Token"
properties.token = { type = "string", required = true, label = "Token" }
"#;

struct NoSpaces;

impl Validator for NoSpaces {
    fn validate(&self, tree: &DataTree, id: NodeId) -> bool {
        tree.raw_value(id)
            .map(|value| !value.as_str().unwrap_or_default().contains(' '))
            .unwrap_or(false)
    }

    fn message(&self, _tree: &DataTree, _id: NodeId) -> String {
        "@label may not contain spaces, got '@value'.".to_string()
    }
}

fn server() -> DataTree {
    let _ = env_logger::builder().is_test(true).try_init();
    let definition = DataDefinition::from_toml_str(SERVER).expect("definition");
    DataItemFactory::new()
        .with_validator("no_spaces", NoSpaces)
        .into_shared()
        .create_from_definition(definition)
        .expect("tree")
}

#[test]
fn test_toml_schema_tree() {
    let mut data = server();
    let root = data.root();
    data.set(
        root,
        json!({"host": "example.org", "aliases": ["a", "b"], "auth": {"method": "token", "token": "s3cret"}}),
    )
    .expect("set");
    data.access(root).expect("access");

    assert_eq!(
        data.export(root).expect("export"),
        json!({
            "host": "example.org",
            "port": 8080,
            "url": "http://example.org:8080",
            "aliases": ["a", "b"],
            "auth": {"method": "token", "token": "s3cret"},
        })
    );
    assert!(data.validate(root).expect("validate").is_empty());

    let aliases = data.get_property(root, "aliases").expect("aliases");
    data.add(aliases, "c").expect("third");
    assert!(data.add(aliases, "d").expect_err("fourth").is_invalid_input());
}

#[test]
fn test_toml_schema_violations() {
    let mut data = server();
    let root = data.root();
    data.set(root, json!({"host": "bad host", "auth": {"method": "token"}}))
        .expect("set");
    let violations = data.validate(root).expect("validate");
    assert_eq!(
        violations["server:host"],
        ["Host name may not contain spaces, got 'bad host'.".to_string()]
    );
    assert_eq!(
        violations["server:auth:token"],
        ["Value is required for Token.".to_string()]
    );

    let method = data.get_item(root, "server:auth:method").expect("method");
    assert!(data.set(method, "password").expect_err("variant").is_invalid_input());
}

#[test]
fn test_json_schema_document_describes_itself() {
    let schema = SchemaDocument::json_schema().expect("schema");
    let text = serde_json::to_string(&schema).expect("serialize");
    assert!(text.contains("variant_mapping"));

    let document: SchemaDocument = toml::from_str(SERVER).expect("document");
    let json = serde_json::to_string(&document).expect("json");
    let definition = DataDefinition::from_json_str(&json).expect("from json");
    assert_eq!(
        definition.property_names(),
        ["host", "port", "url", "aliases", "auth"]
    );
}

struct Regions;

impl OptionSetProvider for Regions {
    fn options(&self) -> Vec<OptionDefinition> {
        vec![
            OptionDefinition::new("us", "United States"),
            OptionDefinition::new("eu", "Europe"),
            OptionDefinition::new("ap", "Asia Pacific").with_weight(-1),
        ]
    }
}

#[test]
fn test_option_set_provider() {
    let region = DataDefinition::string()
        .with_name("region")
        .expect("name")
        .with_label("Region")
        .with_option_set(Arc::new(Regions))
        .expect("option set")
        .with_options_sorting(OptionsSortOrder::Label);
    let labels: Vec<String> = region.options().into_iter().map(|option| option.label).collect();
    assert_eq!(labels, ["Asia Pacific", "Europe", "United States"]);
    assert!(
        region
            .clone()
            .with_options_array([("x", "X")])
            .expect_err("mixed")
            .is_definition()
    );

    let mut data = DataItemFactory::shared()
        .create_from_definition(region)
        .expect("tree");
    let root = data.root();
    data.set(root, "mars").expect("set");
    assert_eq!(
        data.validate(root).expect("validate")["region"],
        ["Value 'mars' is not one of the options for Region.".to_string()]
    );
    data.set(root, "eu").expect("set");
    assert!(data.validate(root).expect("validate").is_empty());
}
