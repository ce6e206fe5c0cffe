//! objschema - declarative validation and normalization of loosely-typed
//! object data
//!
//! A [`Schema`] maps field names to [`Rule`]s describing required
//! presence, type and instance checks, permissible value sets, regex
//! constraints, pre-check filters, defaults and recursive sub-schemas.
//! [`Schema::validate`] clones the candidate, normalizes it field by
//! field and returns either a normalized container or the failure
//! sentinel, accumulating every problem into one error list.
//!
//! ```
//! use objschema::{Rule, Schema, Strictness, TypeTag, Value};
//!
//! let mut schema = Schema::new();
//! schema.set_strictness(Strictness::Relaxed);
//! schema.set_field(
//!     "title",
//!     Rule {
//!         required: true,
//!         type_tag: Some(TypeTag::String),
//!         ..Rule::default()
//!     },
//! );
//!
//! let input = Value::from(serde_json::json!({ "title": "hello", "junk": 1 }));
//! let outcome = schema.validate(Some(&input));
//!
//! let result = outcome.as_object().unwrap();
//! assert_eq!(result["title"], Value::from("hello"));
//! assert!(!result.contains_key("junk"));
//! ```

pub mod errors;
pub mod filters;
pub mod rule;
pub mod schema;
mod validator;
pub mod value;

pub use errors::{ErrorKind, SchemaError, SchemaResult, ValidationError};
pub use filters::{CustomFilter, Filter};
pub use rule::{InstanceOf, Rule, Strictness, SubSchema, TypeTag, WILDCARD};
pub use schema::{Schema, ValidationOutcome};
pub use value::{DocRef, ObjectMap, Value};
