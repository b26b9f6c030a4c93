//! # mutable-data
//!
//! Schema-driven data trees whose shape can change at runtime.
//!
//! A [`DataDefinition`] tree describes the data: simple strings, booleans,
//! integers and numbers, arrays of them, complex data with named properties,
//! and mutable data whose properties depend on the value of a variant
//! property. A [`DataItemFactory`] instantiates a [`DataTree`] from a
//! definition, which then enforces the definition on every change.
//!
//! ## Features
//!
//! - Typed values with coercion of numeric strings and `0`/`1` booleans
//! - Arrays with cardinality limits, insertion and renumbering
//! - Mutable data that switches property sets when its variant changes
//! - Colon-separated addresses, absolute or relative (`..:sibling`)
//! - Lazy defaults: literals, expressions and named callables, with
//!   dependencies and cycle detection
//! - Validation reporting violations keyed by address
//! - Suspend to serde data and resume against a rebuilt definition
//! - Definitions loaded from JSON or TOML schema documents
//!
//! ## Quick Start
//!
//! ```rust
//! use mutable_data::{DataDefinition, DataItemFactory};
//! use serde_json::json;
//!
//! # fn main() -> mutable_data::Result<()> {
//! let definition = DataDefinition::complex()
//!     .with_name("pizza")?
//!     .with_properties([
//!         ("size", DataDefinition::string().with_literal_default("large")),
//!         ("toppings", DataDefinition::string().with_multiple(true)),
//!     ])?;
//!
//! let mut data = DataItemFactory::shared().create_from_definition(definition)?;
//! let root = data.root();
//! data.set(root, json!({"toppings": ["olive", "basil"]}))?;
//!
//! let toppings = data.get_item(root, "pizza:toppings")?;
//! assert_eq!(data.count(toppings)?, 2);
//!
//! // Instantiate everything, which applies the default size.
//! data.access(root)?;
//! assert_eq!(
//!     data.export(root)?,
//!     json!({"size": "large", "toppings": ["olive", "basil"]})
//! );
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`definition`] - Definition trees
//! - [`data`] - Data trees, addressing, defaults, validation, suspend/resume
//! - [`factory`] - Tree construction and registries
//! - [`expression`] - Expression languages for computed defaults
//! - [`validator`] - Named validators
//! - [`schema`] - JSON and TOML schema documents

#[macro_use]
extern crate log;

/// Data trees built from definitions.
pub mod data;

/// Definition (schema) trees.
pub mod definition;

pub mod error;

pub mod expression;

/// Builds data trees and holds the registries they consult.
pub mod factory;

pub mod schema;

pub mod validator;

pub use data::{DataTree, NodeId, NodeType, SuspendedData, Violations};
pub use definition::{
    CARDINALITY_UNLIMITED, DataDefinition, DataType, DefaultDefinition, DefinitionProvider,
    OptionDefinition, VariantDefinition,
};
pub use error::{DataError, Result};
pub use factory::DataItemFactory;
pub use serde_json::Value;
