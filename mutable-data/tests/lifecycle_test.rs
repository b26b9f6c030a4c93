//! Suspending trees to serde data and resuming them against a rebuilt
//! definition.

use mutable_data::{
    DataDefinition, DataItemFactory, DefinitionProvider, Result, SuspendedData, VariantDefinition,
};
use pretty_assertions::assert_eq;
use serde_json::json;

/// A vehicle: an array of mutable `parts`, each a wheel or a seat.
struct Vehicle;

impl DefinitionProvider for Vehicle {
    const NAME: &'static str = "vehicle";

    fn definition() -> Result<DataDefinition> {
        DataDefinition::complex().with_name("vehicle")?.with_properties([
            ("model", DataDefinition::string().with_literal_default("runabout")),
            (
                "parts",
                DataDefinition::mutable()
                    .with_multiple(true)
                    .with_properties([("part", DataDefinition::string())])?
                    .with_variant_mapping([("w", "wheel"), ("s", "seat")])
                    .with_variants([
                        (
                            "wheel",
                            VariantDefinition::new()
                                .with_label("Wheel")
                                .with_properties([("size", DataDefinition::integer())])?,
                        ),
                        (
                            "seat",
                            VariantDefinition::new()
                                .with_label("Seat")
                                .with_properties([("heated", DataDefinition::boolean())])?,
                        ),
                    ])?,
            ),
        ])
    }
}

fn factory() -> std::sync::Arc<DataItemFactory> {
    let _ = env_logger::builder().is_test(true).try_init();
    DataItemFactory::new().with_provider::<Vehicle>().into_shared()
}

#[test]
fn test_suspend_and_resume() {
    let factory = factory();
    let mut data = factory.create_from_provider::<Vehicle>().expect("tree");
    let root = data.root();
    data.set(
        root,
        json!({"parts": [{"part": "w", "size": 16}, {"part": "s", "heated": true}]}),
    )
    .expect("set");
    let model = data.get_property(root, "model").expect("model");
    assert!(!data.is_set(model).expect("set"));

    let suspended = data.suspend().expect("suspend");
    assert_eq!(suspended.definition_source, "vehicle");

    // Through JSON and back, as a store would.
    let stored = serde_json::to_string(&suspended).expect("serialize");
    let suspended: SuspendedData = serde_json::from_str(&stored).expect("deserialize");

    let mut resumed = factory.resume(suspended).expect("resume");
    let root = resumed.root();
    assert_eq!(resumed.definition_source(), Some("vehicle"));
    assert_eq!(
        resumed.raw_value(root).expect("raw"),
        json!({"parts": [{"part": "w", "size": 16}, {"part": "s", "heated": true}]})
    );

    let wheel = resumed.get_item(root, "vehicle:parts:0").expect("wheel");
    assert_eq!(resumed.variant(wheel).expect("variant"), Some("wheel"));
    let seat = resumed.get_item(root, "vehicle:parts:1").expect("seat");
    assert_eq!(
        resumed.variant_definition(seat).expect("definition").label(),
        "Seat"
    );

    // Unset state survives, so defaults still apply lazily.
    let model = resumed.get_property(root, "model").expect("model");
    assert!(!resumed.is_set(model).expect("set"));
    assert_eq!(resumed.value(model).expect("value"), json!("runabout"));

    // The resumed tree behaves like any other.
    resumed
        .set_property(wheel, "part", "s")
        .expect("switch variant");
    assert_eq!(resumed.export(wheel).expect("export"), json!({"part": "s"}));
}

#[test]
fn test_suspend_requires_definition_source() {
    let factory = factory();
    let data = factory
        .create_from_definition(Vehicle::definition().expect("definition"))
        .expect("tree");
    assert!(data.suspend().expect_err("no source").is_definition());
}

#[test]
fn test_resume_with_unregistered_source() {
    let data = DataItemFactory::shared()
        .create_from_provider::<Vehicle>()
        .expect("tree");
    let suspended = data.suspend().expect("suspend");
    let err = DataItemFactory::shared()
        .resume(suspended)
        .expect_err("unregistered");
    assert!(err.is_definition());
}

#[test]
fn test_resume_skips_removed_properties() {
    let factory = factory();
    let mut data = factory.create_from_provider::<Vehicle>().expect("tree");
    let root = data.root();
    data.set_property(root, "model", "roadster").expect("model");

    let mut suspended = serde_json::to_value(data.suspend().expect("suspend")).expect("value");
    suspended["root"]["children"]["retired"] = json!({
        "name": "retired",
        "set": true,
        "kind": "simple",
        "value": "old",
    });
    let suspended: SuspendedData = serde_json::from_value(suspended).expect("deserialize");

    let resumed = factory.resume(suspended).expect("resume");
    assert_eq!(
        resumed.raw_value(resumed.root()).expect("raw"),
        json!({"model": "roadster"})
    );
}

fn tags(cardinality: i64) -> Result<DataDefinition> {
    DataDefinition::string()
        .with_name("tags")?
        .with_cardinality(cardinality)
}

fn unlimited_tags() -> Result<DataDefinition> {
    tags(mutable_data::CARDINALITY_UNLIMITED)
}

fn two_tags() -> Result<DataDefinition> {
    tags(2)
}

#[test]
fn test_resume_against_narrower_cardinality() {
    let _ = env_logger::builder().is_test(true).try_init();
    let wide = DataItemFactory::new()
        .with_definition_source("tags", unlimited_tags)
        .into_shared();
    let mut data = wide.create_from_callback("tags").expect("tree");
    let root = data.root();
    data.set(root, json!(["a", "b", "c"])).expect("set");
    let suspended = data.suspend().expect("suspend");

    let narrow = DataItemFactory::new()
        .with_definition_source("tags", two_tags)
        .into_shared();
    let mut resumed = narrow.resume(suspended).expect("resume keeps stored items");
    let root = resumed.root();
    assert_eq!(resumed.count(root).expect("count"), 3);
    assert!(!resumed.may_add_item(root).expect("may add"));
    assert!(resumed.add(root, "d").expect_err("add").is_invalid_input());
    assert!(
        resumed
            .insert_before(root, 0)
            .expect_err("insert")
            .is_invalid_input()
    );
    assert_eq!(resumed.count(root).expect("count"), 3);
}

fn pet(with_cat: bool) -> Result<DataDefinition> {
    let mut variants = vec![(
        "dog",
        VariantDefinition::new()
            .with_label("Dog")
            .with_properties([("breed", DataDefinition::string())])?,
    )];
    if with_cat {
        variants.push((
            "cat",
            VariantDefinition::new()
                .with_label("Cat")
                .with_properties([("indoor", DataDefinition::boolean())])?,
        ));
    }
    DataDefinition::mutable()
        .with_name("pet")?
        .with_properties([("kind", DataDefinition::string())])?
        .with_variants(variants)
}

fn pet_with_cat() -> Result<DataDefinition> {
    pet(true)
}

fn pet_without_cat() -> Result<DataDefinition> {
    pet(false)
}

#[test]
fn test_resume_skips_removed_variant() {
    let _ = env_logger::builder().is_test(true).try_init();
    let before = DataItemFactory::new()
        .with_definition_source("pet", pet_with_cat)
        .into_shared();
    let mut data = before.create_from_callback("pet").expect("tree");
    let root = data.root();
    data.set(root, json!({"kind": "cat", "indoor": true}))
        .expect("set");
    let suspended = data.suspend().expect("suspend");

    let after = DataItemFactory::new()
        .with_definition_source("pet", pet_without_cat)
        .into_shared();
    let mut resumed = after.resume(suspended).expect("resume");
    let root = resumed.root();
    assert_eq!(resumed.variant(root).expect("variant"), None);
    assert!(!resumed.is_set(root).expect("set"));
    assert_eq!(resumed.raw_value(root).expect("raw"), json!({}));

    resumed
        .set(root, json!({"kind": "dog", "breed": "collie"}))
        .expect("select remaining variant");
    assert_eq!(resumed.variant(root).expect("variant"), Some("dog"));
}
