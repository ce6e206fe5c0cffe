//! Per-field rule evaluation
//!
//! Evaluation order is deliberate: filters normalize before any check
//! judges the value; the default applies after filters (a filter may
//! legitimately clear a value) but before the required check; sub-schema
//! delegation runs first so later steps in the same rule observe the
//! normalized nested value.

use tracing::trace;

use crate::errors::{ErrorKind, ValidationError};
use crate::filters;
use crate::rule::{Rule, Strictness};
use crate::schema::Schema;
use crate::value::{ObjectMap, Value};

/// Evaluates one rule against one key of the working object.
///
/// Returns the final value to commit into the result, or `None` to omit
/// the key. Check failures never short-circuit the pass: the accumulated
/// errors are what signal failure.
pub(crate) fn run_validations(
    schema: &Schema,
    key: &str,
    rule: &Rule,
    working: &mut ObjectMap,
    errors: &mut Vec<ValidationError>,
) -> Option<Value> {
    if rule.ignored {
        return None;
    }

    // Genuinely absent data bypasses every later check in non-strict modes
    // and for explicitly optional fields. `required` always overrides the
    // skip, so required fields are checked regardless of strictness.
    if (schema.strictness() != Strictness::Strict || rule.optional)
        && !rule.required
        && !working.contains_key(key)
    {
        return rule.default.clone();
    }

    let mut passed = true;

    if let Some(sub) = &rule.object_schema {
        let child = sub.resolve();
        let mut sub_errors = Vec::new();
        let outcome = child.validate_into(working.get(key), &mut sub_errors);
        match outcome.into_value() {
            // downstream filters and checks see the normalized nested value
            Some(normalized) => {
                working.insert(key.to_string(), normalized);
            }
            None => passed = false,
        }
        for error in sub_errors {
            errors.push(error.relabel(key));
        }
    }

    // Filters run even on fields that later fail a check: they are
    // pre-check normalization, not validation.
    if !rule.filters.is_empty() {
        filters::apply_all(&rule.filters, key, working);
    }

    if let Some(default) = &rule.default {
        if !working.contains_key(key) {
            working.insert(key.to_string(), default.clone());
        }
    }

    if rule.required && !working.contains_key(key) {
        errors.push(ValidationError::new(key, ErrorKind::Missing));
        passed = false;
    }

    if let Some(allowed) = &rule.one_of {
        if allowed.is_empty() {
            // malformed rule: a membership check with nothing to match
            trace!(field = %key, "empty membership set fails the check");
            passed = false;
        } else if !working.get(key).is_some_and(|v| allowed.contains(v)) {
            errors.push(ValidationError::new(key, ErrorKind::NotInSet));
            passed = false;
        }
    }

    if let Some(tag) = rule.type_tag {
        if !working.get(key).is_some_and(|v| tag.matches(v)) {
            errors.push(ValidationError::new(key, ErrorKind::WrongType));
            passed = false;
        }
    }

    // instance_of and object_schema are mutually exclusive identity
    // checks; the sub-schema already vouched for the value's shape.
    if rule.object_schema.is_none() {
        if let Some(instance) = rule.instance_of {
            if !working.get(key).is_some_and(|v| instance.matches(v)) {
                errors.push(ValidationError::new(key, ErrorKind::WrongInstance));
                passed = false;
            }
        }
    }

    if let Some(pattern) = &rule.pattern {
        let matched = match working.get(key) {
            Some(Value::String(s)) => pattern.is_match(s),
            _ => false,
        };
        if !matched {
            errors.push(ValidationError::regex_mismatch(
                key,
                working.get(key).cloned(),
                pattern.as_str(),
            ));
            passed = false;
        }
    }

    if passed {
        working.get(key).cloned()
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filters::Filter;
    use crate::rule::{InstanceOf, SubSchema, TypeTag};
    use regex::Regex;
    use std::collections::BTreeMap;
    use uuid::Uuid;

    fn strict_schema() -> Schema {
        Schema::new()
    }

    fn relaxed_schema() -> Schema {
        let mut schema = Schema::new();
        schema.set_strictness(Strictness::Relaxed);
        schema
    }

    fn working(key: &str, value: Value) -> ObjectMap {
        let mut map = ObjectMap::new();
        map.insert(key.to_string(), value);
        map
    }

    #[test]
    fn test_ignored_short_circuits_everything() {
        let schema = strict_schema();
        let rule = Rule {
            ignored: true,
            required: true,
            type_tag: Some(TypeTag::Int),
            ..Rule::default()
        };
        let mut map = working("scratch", Value::from("not an int"));
        let mut errors = Vec::new();

        let outcome = run_validations(&schema, "scratch", &rule, &mut map, &mut errors);
        assert!(outcome.is_none());
        assert!(errors.is_empty());
    }

    #[test]
    fn test_early_skip_returns_default_when_absent() {
        let schema = relaxed_schema();
        let rule = Rule {
            type_tag: Some(TypeTag::String),
            default: Some(Value::from("fallback")),
            ..Rule::default()
        };
        let mut map = ObjectMap::new();
        let mut errors = Vec::new();

        let outcome = run_validations(&schema, "title", &rule, &mut map, &mut errors);
        assert_eq!(outcome, Some(Value::from("fallback")));
        assert!(errors.is_empty());
    }

    #[test]
    fn test_optional_skips_even_under_strict() {
        let schema = strict_schema();
        let rule = Rule {
            optional: true,
            type_tag: Some(TypeTag::String),
            ..Rule::default()
        };
        let mut map = ObjectMap::new();
        let mut errors = Vec::new();

        let outcome = run_validations(&schema, "title", &rule, &mut map, &mut errors);
        assert!(outcome.is_none());
        assert!(errors.is_empty());
    }

    #[test]
    fn test_required_overrides_the_skip() {
        let schema = relaxed_schema();
        let rule = Rule {
            required: true,
            ..Rule::default()
        };
        let mut map = ObjectMap::new();
        let mut errors = Vec::new();

        let outcome = run_validations(&schema, "title", &rule, &mut map, &mut errors);
        assert!(outcome.is_none());
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].kind, ErrorKind::Missing);
    }

    #[test]
    fn test_membership_check() {
        let schema = strict_schema();
        let rule = Rule {
            one_of: Some(vec![Value::from("published"), Value::from("draft")]),
            ..Rule::default()
        };
        let mut errors = Vec::new();

        let mut map = working("status", Value::from("published"));
        let outcome = run_validations(&schema, "status", &rule, &mut map, &mut errors);
        assert_eq!(outcome, Some(Value::from("published")));
        assert!(errors.is_empty());

        let mut map = working("status", Value::from("deleted"));
        let outcome = run_validations(&schema, "status", &rule, &mut map, &mut errors);
        assert!(outcome.is_none());
        assert_eq!(errors[0].kind, ErrorKind::NotInSet);
    }

    #[test]
    fn test_empty_membership_set_fails_without_error() {
        let schema = strict_schema();
        let rule = Rule {
            one_of: Some(Vec::new()),
            ..Rule::default()
        };
        let mut map = working("status", Value::from("anything"));
        let mut errors = Vec::new();

        let outcome = run_validations(&schema, "status", &rule, &mut map, &mut errors);
        assert!(outcome.is_none());
        assert!(errors.is_empty());
    }

    #[test]
    fn test_type_check() {
        let schema = strict_schema();
        let rule = Rule::of_type(TypeTag::Int);
        let mut map = working("count", Value::from("three"));
        let mut errors = Vec::new();

        let outcome = run_validations(&schema, "count", &rule, &mut map, &mut errors);
        assert!(outcome.is_none());
        assert_eq!(errors[0].kind, ErrorKind::WrongType);
    }

    #[test]
    fn test_instance_check() {
        let schema = strict_schema();
        let rule = Rule {
            instance_of: Some(InstanceOf::ObjectId),
            ..Rule::default()
        };
        let mut errors = Vec::new();

        let mut map = working("_id", Value::Id(Uuid::new_v4()));
        assert!(run_validations(&schema, "_id", &rule, &mut map, &mut errors).is_some());
        assert!(errors.is_empty());

        let mut map = working("_id", Value::from("plain string"));
        assert!(run_validations(&schema, "_id", &rule, &mut map, &mut errors).is_none());
        assert_eq!(errors[0].kind, ErrorKind::WrongInstance);
    }

    #[test]
    fn test_filters_normalize_before_checks() {
        let schema = strict_schema();
        let rule = Rule {
            filters: vec![Filter::named("trim")],
            pattern: Some(Regex::new(r"^\S+$").unwrap()),
            ..Rule::default()
        };
        let mut map = working("slug", Value::from("  tight  "));
        let mut errors = Vec::new();

        let outcome = run_validations(&schema, "slug", &rule, &mut map, &mut errors);
        assert_eq!(outcome, Some(Value::from("tight")));
        assert!(errors.is_empty());
    }

    #[test]
    fn test_default_applies_after_filters() {
        // the date filter unsets unparseable input, then the default fills in
        let schema = strict_schema();
        let rule = Rule {
            filters: vec![Filter::named("date")],
            default: Some(Value::from("unknown")),
            ..Rule::default()
        };
        let mut map = working("created", Value::from("not a date"));
        let mut errors = Vec::new();

        let outcome = run_validations(&schema, "created", &rule, &mut map, &mut errors);
        assert_eq!(outcome, Some(Value::from("unknown")));
    }

    #[test]
    fn test_regex_mismatch_echoes_value_and_pattern() {
        let schema = strict_schema();
        let rule = Rule {
            pattern: Some(Regex::new("^[a-z]+$").unwrap()),
            ..Rule::default()
        };
        let mut map = working("slug", Value::from("Bad Slug"));
        let mut errors = Vec::new();

        run_validations(&schema, "slug", &rule, &mut map, &mut errors);
        assert_eq!(errors[0].kind, ErrorKind::RegexMismatch);
        assert_eq!(errors[0].value, Some(Value::from("Bad Slug")));
        assert_eq!(errors[0].pattern.as_deref(), Some("^[a-z]+$"));
    }

    #[test]
    fn test_sub_schema_failure_relabels_errors() {
        let schema = strict_schema();
        let mut sub_fields = BTreeMap::new();
        sub_fields.insert(
            "id".to_string(),
            Rule {
                required: true,
                type_tag: Some(TypeTag::String),
                ..Rule::default()
            },
        );
        let rule = Rule {
            object_schema: Some(SubSchema::inline(sub_fields)),
            ..Rule::default()
        };

        let mut inner = ObjectMap::new();
        inner.insert("id".into(), Value::Int(7));
        let mut map = working("template", Value::Object(inner));
        let mut errors = Vec::new();

        let outcome = run_validations(&schema, "template", &rule, &mut map, &mut errors);
        assert!(outcome.is_none());
        assert!(!errors.is_empty());
        assert_eq!(errors[0].field, "template");
        assert_eq!(errors[0].sub_field.as_deref(), Some("id"));
    }

    #[test]
    fn test_sub_schema_success_replaces_working_value() {
        let schema = strict_schema();
        let mut sub_fields = BTreeMap::new();
        sub_fields.insert(
            "name".to_string(),
            Rule {
                filters: vec![Filter::named("trim")],
                ..Rule::default()
            },
        );
        let rule = Rule {
            object_schema: Some(SubSchema::inline(sub_fields)),
            ..Rule::default()
        };

        let mut inner = ObjectMap::new();
        inner.insert("name".into(), Value::from("  padded  "));
        let mut map = working("author", Value::Object(inner));
        let mut errors = Vec::new();

        let outcome = run_validations(&schema, "author", &rule, &mut map, &mut errors);
        let Some(Value::Object(normalized)) = outcome else {
            panic!("expected normalized object");
        };
        assert_eq!(normalized["name"], Value::from("padded"));
        assert!(errors.is_empty());
    }
}
