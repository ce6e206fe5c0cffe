//! Filter pipeline: pre-check value normalization
//!
//! Filters run before every validating check on the same field, so checks
//! always observe the normalized value. Filters are normalization aids,
//! not contracts: an unresolvable named filter is silently skipped.

use std::fmt;
use std::rc::Rc;

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use tracing::trace;
use uuid::Uuid;

use crate::value::{DocRef, ObjectMap, Value};

/// A free filter function of shape `(field_key, containing_object) -> new_value`.
///
/// Returning `None` unsets the field.
pub type CustomFilter = Rc<dyn Fn(&str, &ObjectMap) -> Option<Value>>;

/// A single filter reference within a rule's filter list.
#[derive(Clone)]
pub enum Filter {
    /// Name resolved case-insensitively against the built-in registry at
    /// call time; unknown names are a deliberate no-op.
    Named(String),
    /// Free function receiving the field key and its containing object.
    Custom(CustomFilter),
}

impl Filter {
    /// Creates a named filter reference.
    pub fn named(name: impl Into<String>) -> Self {
        Filter::Named(name.into())
    }

    /// Creates a custom filter from a free function.
    pub fn custom<F>(f: F) -> Self
    where
        F: Fn(&str, &ObjectMap) -> Option<Value> + 'static,
    {
        Filter::Custom(Rc::new(f))
    }
}

impl fmt::Debug for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Filter::Named(name) => f.debug_tuple("Named").field(name).finish(),
            Filter::Custom(_) => write!(f, "Custom(..)"),
        }
    }
}

/// Built-in value-normalizing transforms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Builtin {
    Trim,
    Lowercase,
    Uppercase,
    ObjectId,
    DocRef,
    Date,
}

/// Static registry lookup, case-normalized.
fn lookup(name: &str) -> Option<Builtin> {
    match name.to_ascii_lowercase().as_str() {
        "trim" => Some(Builtin::Trim),
        "lowercase" | "tolowercase" => Some(Builtin::Lowercase),
        "uppercase" | "touppercase" => Some(Builtin::Uppercase),
        "objectid" => Some(Builtin::ObjectId),
        "dbref" | "docref" => Some(Builtin::DocRef),
        "date" | "todate" => Some(Builtin::Date),
        _ => None,
    }
}

/// Effect of one filter application on `working[key]`.
enum Action {
    Set(Value),
    Unset,
    Keep,
}

/// Applies a rule's filter list in declared order. Each filter sees the
/// mutation made by the previous one.
pub(crate) fn apply_all(filters: &[Filter], key: &str, working: &mut ObjectMap) {
    for filter in filters {
        apply(filter, key, working);
    }
}

fn apply(filter: &Filter, key: &str, working: &mut ObjectMap) {
    let action = match filter {
        Filter::Custom(f) => match f(key, working) {
            Some(value) => Action::Set(value),
            None => Action::Unset,
        },
        Filter::Named(name) => match lookup(name) {
            Some(builtin) => run_builtin(builtin, key, working),
            None => {
                trace!(filter = %name, field = %key, "unknown filter skipped");
                Action::Keep
            }
        },
    };

    match action {
        Action::Set(value) => {
            working.insert(key.to_string(), value);
        }
        Action::Unset => {
            working.remove(key);
        }
        Action::Keep => {}
    }
}

fn run_builtin(builtin: Builtin, key: &str, working: &ObjectMap) -> Action {
    let Some(value) = working.get(key) else {
        // nothing to normalize
        return Action::Keep;
    };

    match builtin {
        Builtin::Trim => match value.as_str() {
            Some(s) => Action::Set(Value::from(s.trim())),
            None => Action::Keep,
        },
        Builtin::Lowercase => match value.as_str() {
            Some(s) => Action::Set(Value::from(s.to_lowercase())),
            None => Action::Keep,
        },
        Builtin::Uppercase => match value.as_str() {
            Some(s) => Action::Set(Value::from(s.to_uppercase())),
            None => Action::Keep,
        },
        Builtin::ObjectId => coerce_object_id(value),
        Builtin::DocRef => coerce_doc_ref(value),
        Builtin::Date => coerce_date(value),
    }
}

/// Coerces a lenient textual form into the canonical identifier type.
/// Never fails: unconvertible values pass through unchanged.
fn coerce_object_id(value: &Value) -> Action {
    match value {
        Value::Id(_) => Action::Keep,
        Value::String(s) => match Uuid::parse_str(s.trim()) {
            Ok(id) => Action::Set(Value::Id(id)),
            Err(_) => Action::Keep,
        },
        _ => Action::Keep,
    }
}

/// Coerces an object with reference-shaped parts into a [`DocRef`].
///
/// Accepts equivalent spellings for each part; any construction failure
/// passes the original value through unchanged.
fn coerce_doc_ref(value: &Value) -> Action {
    let map = match value {
        Value::Ref(_) => return Action::Keep,
        Value::Object(map) => map,
        _ => return Action::Keep,
    };

    let collection = pick_str(map, &["$ref", "ref", "collection", "namespace"]);
    let id = pick(map, &["$id", "id", "identifier"]).and_then(|v| match v {
        Value::Id(id) => Some(*id),
        Value::String(s) => Uuid::parse_str(s.trim()).ok(),
        _ => None,
    });

    match (collection, id) {
        (Some(collection), Some(id)) => {
            let mut doc_ref = DocRef::new(collection, id);
            doc_ref.db = pick_str(map, &["$db", "db", "database"]).map(str::to_string);
            Action::Set(Value::Ref(doc_ref))
        }
        _ => Action::Keep,
    }
}

/// Attempts to parse the value into a date. The one built-in that can
/// yield "no value": unparseable input unsets the field.
fn coerce_date(value: &Value) -> Action {
    match value {
        Value::Date(_) => Action::Keep,
        Value::String(s) => match parse_date(s.trim()) {
            Some(date) => Action::Set(Value::Date(date)),
            None => Action::Unset,
        },
        Value::Int(millis) => match Utc.timestamp_millis_opt(*millis).single() {
            Some(date) => Action::Set(Value::Date(date)),
            None => Action::Unset,
        },
        _ => Action::Unset,
    }
}

fn parse_date(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(date) = DateTime::parse_from_rfc3339(s) {
        return Some(date.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Some(naive.and_utc());
    }
    if let Ok(day) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Some(day.and_hms_opt(0, 0, 0)?.and_utc());
    }
    None
}

fn pick<'a>(map: &'a ObjectMap, names: &[&str]) -> Option<&'a Value> {
    names.iter().find_map(|name| map.get(*name))
}

fn pick_str<'a>(map: &'a ObjectMap, names: &[&str]) -> Option<&'a str> {
    pick(map, names).and_then(Value::as_str)
}
