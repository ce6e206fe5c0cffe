//! Schema: the field-rule mapping, strictness policy and validate entry
//!
//! Validation is synchronous and deterministic. The candidate is cloned
//! into a private working copy before any filter mutates it, so caller
//! data is never touched. A pass has two phases: declared rules first
//! (the rule loop never sees undeclared keys), then the undeclared-key
//! sweep (which never re-processes declared ones), keeping the rule-based
//! and strictness policies orthogonal.

use std::cell::RefCell;
use std::collections::BTreeMap;

use tracing::debug;

use crate::errors::{ErrorKind, ValidationError};
use crate::rule::{Rule, Strictness, WILDCARD};
use crate::validator;
use crate::value::{ObjectMap, Value};

/// Normalized output of a validation pass, or the failure sentinel.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationOutcome {
    /// The failure sentinel, distinct from any legitimate container
    Invalid,
    /// Normalized key/value container
    Object(ObjectMap),
    /// Normalized sequence, produced for array-shaped candidates
    Array(Vec<Value>),
}

impl ValidationOutcome {
    /// Returns false only for the failure sentinel.
    pub fn is_valid(&self) -> bool {
        !matches!(self, ValidationOutcome::Invalid)
    }

    /// Returns the normalized object, if any.
    pub fn as_object(&self) -> Option<&ObjectMap> {
        match self {
            ValidationOutcome::Object(map) => Some(map),
            _ => None,
        }
    }

    /// Returns the normalized sequence, if any.
    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            ValidationOutcome::Array(items) => Some(items),
            _ => None,
        }
    }

    /// Converts a valid outcome into a plain [`Value`].
    pub fn into_value(self) -> Option<Value> {
        match self {
            ValidationOutcome::Invalid => None,
            ValidationOutcome::Object(map) => Some(Value::Object(map)),
            ValidationOutcome::Array(items) => Some(Value::Array(items)),
        }
    }
}

/// A compiled mapping from field key (or the wildcard `*`) to a [`Rule`],
/// plus a strictness mode governing undeclared keys.
///
/// Mutable between validations; validation itself only writes the
/// diagnostic last-error record. Schemas are single-threaded by contract:
/// share one between parent rules with `Rc`, not across threads.
#[derive(Debug, Clone, Default)]
pub struct Schema {
    fields: BTreeMap<String, Rule>,
    strictness: Strictness,
    last_errors: RefCell<Vec<ValidationError>>,
}

impl Schema {
    /// Creates an empty schema with strict mode.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a schema over the given field definitions, strict mode.
    pub fn with_fields(fields: BTreeMap<String, Rule>) -> Self {
        Self {
            fields,
            ..Self::default()
        }
    }

    /// Returns the current strictness mode.
    pub fn strictness(&self) -> Strictness {
        self.strictness
    }

    /// Sets the strictness mode.
    ///
    /// Mode strings are parsed through `Strictness::from_str`, which
    /// rejects unknown modes at configuration time.
    pub fn set_strictness(&mut self, mode: Strictness) {
        self.strictness = mode;
    }

    /// Returns the declared field rules.
    pub fn fields(&self) -> &BTreeMap<String, Rule> {
        &self.fields
    }

    /// Replaces the rule for one field wholesale.
    pub fn set_field(&mut self, key: impl Into<String>, rule: Rule) {
        self.fields.insert(key.into(), rule);
    }

    /// Replaces all field rules wholesale.
    pub fn set_fields(&mut self, fields: BTreeMap<String, Rule>) {
        self.fields = fields;
    }

    /// Installs `partial` for `key`, or shallow-merges it over the
    /// existing rule (last write wins per attribute).
    pub fn add_settings(&mut self, key: impl Into<String>, partial: Rule) {
        let key = key.into();
        match self.fields.get_mut(&key) {
            Some(existing) => existing.merge(&partial),
            None => {
                self.fields.insert(key, partial);
            }
        }
    }

    /// Applies [`Schema::add_settings`] per key; duplicate keys from later
    /// sources override earlier ones.
    pub fn merge_fields(&mut self, fields: BTreeMap<String, Rule>) {
        for (key, rule) in fields {
            self.add_settings(key, rule);
        }
    }

    /// Returns a copy of the errors recorded by the last validation, or
    /// `None` when it recorded none.
    pub fn last_errors(&self) -> Option<Vec<ValidationError>> {
        let errors = self.last_errors.borrow();
        if errors.is_empty() {
            None
        } else {
            Some(errors.clone())
        }
    }

    /// Validates `input`, returning the normalized result or the failure
    /// sentinel. Errors are retained on [`Schema::last_errors`].
    pub fn validate(&self, input: Option<&Value>) -> ValidationOutcome {
        let mut errors = Vec::new();
        self.validate_into(input, &mut errors)
    }

    /// Validates `input` with an explicit error sink and a completion
    /// callback, invoked synchronously with `(errors, result)`.
    ///
    /// An empty error collection is reported as `None`: callers must
    /// treat absent and empty identically.
    pub fn validate_with<F>(
        &self,
        input: Option<&Value>,
        errors: &mut Vec<ValidationError>,
        callback: F,
    ) -> ValidationOutcome
    where
        F: FnOnce(Option<&[ValidationError]>, &ValidationOutcome),
    {
        let outcome = self.validate_into(input, errors);
        let reported = if errors.is_empty() {
            None
        } else {
            Some(errors.as_slice())
        };
        callback(reported, &outcome);
        outcome
    }

    /// Validates `input`, appending errors to an externally supplied sink.
    ///
    /// This is the aggregation form used by sub-schema recursion and by
    /// callers collecting errors across several validations.
    pub fn validate_into(
        &self,
        input: Option<&Value>,
        errors: &mut Vec<ValidationError>,
    ) -> ValidationOutcome {
        self.last_errors.borrow_mut().clear();

        // the one unconditional precondition: there must be something to validate
        let input = match input {
            Some(value) if !value.is_null() => value,
            _ => {
                let error = ValidationError::new("$root", ErrorKind::MissingInput);
                errors.push(error.clone());
                self.last_errors.borrow_mut().push(error);
                return ValidationOutcome::Invalid;
            }
        };

        debug!(
            fields = self.fields.len(),
            strictness = %self.strictness,
            "validating candidate"
        );

        let (mut working, is_array) = working_copy(input);
        let mut result = ObjectMap::new();

        for (key, rule) in &self.fields {
            if key == WILDCARD {
                // the wildcard applies to every key present when it runs,
                // including keys introduced by earlier filter side effects
                let keys: Vec<String> = working.keys().cloned().collect();
                for k in keys {
                    if let Some(value) =
                        validator::run_validations(self, &k, rule, &mut working, errors)
                    {
                        result.insert(k, value);
                    }
                }
            } else if let Some(value) =
                validator::run_validations(self, key, rule, &mut working, errors)
            {
                result.insert(key.clone(), value);
            }
        }

        // Sweep keys with no declared rule. A wildcard rule is
        // authoritative for every key, so its presence suppresses the
        // sweep entirely.
        if !self.fields.contains_key(WILDCARD) {
            for (key, value) in &working {
                if self.fields.contains_key(key) {
                    continue;
                }
                match self.strictness {
                    Strictness::Strict => {
                        errors.push(ValidationError::new(key, ErrorKind::NotInDefinition));
                    }
                    Strictness::Relaxed => {}
                    Strictness::Loose => {
                        result.insert(key.clone(), value.clone());
                    }
                }
            }
        }

        if !errors.is_empty() {
            *self.last_errors.borrow_mut() = errors.clone();
        }

        // strict mode is all or nothing
        if self.strictness == Strictness::Strict && !errors.is_empty() {
            debug!(errors = errors.len(), "validation failed");
            return ValidationOutcome::Invalid;
        }

        if is_array {
            ValidationOutcome::Array(collect_array(result))
        } else {
            ValidationOutcome::Object(result)
        }
    }
}

/// Clones the candidate into a private working map. Arrays become
/// index-keyed maps so one rule loop serves both shapes; scalars have no
/// keys to validate and yield an empty map.
fn working_copy(input: &Value) -> (ObjectMap, bool) {
    match input {
        Value::Object(map) => (map.clone(), false),
        Value::Array(items) => (
            items
                .iter()
                .enumerate()
                .map(|(i, v)| (i.to_string(), v.clone()))
                .collect(),
            true,
        ),
        _ => (ObjectMap::new(), false),
    }
}

/// Reassembles an index-keyed result map into a sequence.
fn collect_array(result: ObjectMap) -> Vec<Value> {
    let mut indexed: Vec<(usize, Value)> = result
        .into_iter()
        .filter_map(|(key, value)| key.parse::<usize>().ok().map(|i| (i, value)))
        .collect();
    indexed.sort_by_key(|(i, _)| *i);
    indexed.into_iter().map(|(_, value)| value).collect()
}
