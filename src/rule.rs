//! Rule definitions: the declarative constraint/transform set for one field
//!
//! Every attribute is optional and independently combinable, with one
//! exception: `instance_of` and `object_schema` are mutually exclusive
//! identity checks, and `object_schema` wins when both are declared.

use std::cell::OnceCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;
use std::str::FromStr;

use regex::Regex;

use crate::errors::SchemaError;
use crate::filters::Filter;
use crate::schema::Schema;
use crate::value::Value;

/// The special field key whose rule applies to every key of the candidate.
pub const WILDCARD: &str = "*";

/// Policy for input keys that have no declared rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Strictness {
    /// Undeclared keys are errors; any error at all invalidates the whole
    /// result (all or nothing).
    #[default]
    Strict,
    /// Undeclared keys are silently dropped.
    Relaxed,
    /// Undeclared keys pass through verbatim.
    Loose,
}

impl Strictness {
    /// Returns the mode name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Strictness::Strict => "strict",
            Strictness::Relaxed => "relaxed",
            Strictness::Loose => "loose",
        }
    }
}

impl fmt::Display for Strictness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Strictness {
    type Err = SchemaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "strict" => Ok(Strictness::Strict),
            "relaxed" => Ok(Strictness::Relaxed),
            "loose" => Ok(Strictness::Loose),
            other => Err(SchemaError::InvalidStrictness(other.to_string())),
        }
    }
}

/// Runtime type tag a value can be checked against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeTag {
    Null,
    Bool,
    Int,
    Float,
    /// Matches either `Int` or `Float`
    Number,
    String,
    Array,
    Object,
    Id,
    Ref,
    Date,
}

impl TypeTag {
    /// Returns the tag name for error messages.
    pub fn as_str(&self) -> &'static str {
        match self {
            TypeTag::Null => "null",
            TypeTag::Bool => "bool",
            TypeTag::Int => "int",
            TypeTag::Float => "float",
            TypeTag::Number => "number",
            TypeTag::String => "string",
            TypeTag::Array => "array",
            TypeTag::Object => "object",
            TypeTag::Id => "id",
            TypeTag::Ref => "ref",
            TypeTag::Date => "date",
        }
    }

    /// Whether `value`'s runtime type matches this tag.
    pub fn matches(&self, value: &Value) -> bool {
        match self {
            TypeTag::Number => matches!(value, Value::Int(_) | Value::Float(_)),
            _ => self.as_str() == value.type_name(),
        }
    }
}

/// Identity check target for the canonical boxed scalar types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstanceOf {
    /// The canonical opaque identifier type
    ObjectId,
    /// The two-part document reference type
    DocRef,
    /// A parsed date value
    Date,
}

impl InstanceOf {
    /// Whether `value` is an instance of this target.
    pub fn matches(&self, value: &Value) -> bool {
        match self {
            InstanceOf::ObjectId => matches!(value, Value::Id(_)),
            InstanceOf::DocRef => matches!(value, Value::Ref(_)),
            InstanceOf::Date => matches!(value, Value::Date(_)),
        }
    }
}

/// Nested shape for a field's own object/array value.
///
/// An inline rule mapping is compiled into a [`Schema`] on first use and
/// memoized through a single-write cell, so repeated validations reuse one
/// compiled instance. Pre-compiled schemas can be shared between parent
/// rules; validation never mutates them.
#[derive(Debug, Clone)]
pub enum SubSchema {
    /// A pre-compiled schema, possibly shared by several parent rules
    Shared(Rc<Schema>),
    /// A raw rule mapping, compiled lazily with default strictness
    Inline {
        /// Raw field definitions
        fields: BTreeMap<String, Rule>,
        /// One-time compiled form
        compiled: OnceCell<Rc<Schema>>,
    },
}

impl SubSchema {
    /// Wraps a raw rule mapping for lazy compilation.
    pub fn inline(fields: BTreeMap<String, Rule>) -> Self {
        SubSchema::Inline {
            fields,
            compiled: OnceCell::new(),
        }
    }

    /// Wraps an already-compiled schema.
    pub fn shared(schema: Rc<Schema>) -> Self {
        SubSchema::Shared(schema)
    }

    /// Whether the one-time compilation has already happened.
    pub fn is_compiled(&self) -> bool {
        match self {
            SubSchema::Shared(_) => true,
            SubSchema::Inline { compiled, .. } => compiled.get().is_some(),
        }
    }

    /// Returns the compiled schema, compiling an inline mapping exactly
    /// once.
    pub(crate) fn resolve(&self) -> Rc<Schema> {
        match self {
            SubSchema::Shared(schema) => Rc::clone(schema),
            SubSchema::Inline { fields, compiled } => Rc::clone(
                compiled.get_or_init(|| Rc::new(Schema::with_fields(fields.clone()))),
            ),
        }
    }
}

/// Declarative constraints and transforms for one field.
///
/// Construct with a struct literal over [`Rule::default`]:
///
/// ```
/// use objschema::{Rule, TypeTag};
///
/// let rule = Rule {
///     required: true,
///     type_tag: Some(TypeTag::String),
///     ..Rule::default()
/// };
/// assert!(rule.required);
/// ```
#[derive(Debug, Clone, Default)]
pub struct Rule {
    /// Drop the field silently, short-circuiting all other processing
    pub ignored: bool,
    /// Value must be present, regardless of strictness
    pub required: bool,
    /// Suppress checks for genuinely absent data even under strict mode
    pub optional: bool,
    /// Runtime type tag the value must carry
    pub type_tag: Option<TypeTag>,
    /// Identity check; ignored when `object_schema` is declared
    pub instance_of: Option<InstanceOf>,
    /// Transforms applied, in declared order, before any check
    pub filters: Vec<Filter>,
    /// Value must equal-compare to one member
    pub one_of: Option<Vec<Value>>,
    /// Substituted when the field is absent after filtering
    pub default: Option<Value>,
    /// String value must match
    pub pattern: Option<Regex>,
    /// Nested shape validated by a recursive schema
    pub object_schema: Option<SubSchema>,
}

impl Rule {
    /// Creates an empty rule (no constraints, field passes through).
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a rule checking only the runtime type tag.
    pub fn of_type(tag: TypeTag) -> Self {
        Rule {
            type_tag: Some(tag),
            ..Rule::default()
        }
    }

    /// Shallow per-attribute merge: every attribute set on `partial`
    /// overwrites the corresponding attribute here (last write wins).
    pub fn merge(&mut self, partial: &Rule) {
        if partial.ignored {
            self.ignored = true;
        }
        if partial.required {
            self.required = true;
        }
        if partial.optional {
            self.optional = true;
        }
        if partial.type_tag.is_some() {
            self.type_tag = partial.type_tag;
        }
        if partial.instance_of.is_some() {
            self.instance_of = partial.instance_of;
        }
        if !partial.filters.is_empty() {
            self.filters = partial.filters.clone();
        }
        if partial.one_of.is_some() {
            self.one_of = partial.one_of.clone();
        }
        if partial.default.is_some() {
            self.default = partial.default.clone();
        }
        if partial.pattern.is_some() {
            self.pattern = partial.pattern.clone();
        }
        if partial.object_schema.is_some() {
            self.object_schema = partial.object_schema.clone();
        }
    }
}
