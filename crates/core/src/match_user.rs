//! Declarative user predicates for route protection.
//!
//! A [`UserMatch`] maps field names to an expected value or a set of
//! acceptable values. Fields are ANDed, set members are ORed, and a field
//! missing from the user fails the match.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::borrow::Cow;
use std::collections::BTreeMap;

use crate::types::AuthUser;

/// Expected value for one field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Expected {
    /// Any of these values is accepted.
    AnyOf(Vec<Value>),
    /// Exactly this value is accepted.
    One(Value),
}

impl Expected {
    pub fn accepts(&self, actual: &Value) -> bool {
        match self {
            Self::AnyOf(values) => values.contains(actual),
            Self::One(value) => value == actual,
        }
    }
}

/// Field-level predicate over a user record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserMatch(BTreeMap<String, Expected>);

impl UserMatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Require `field` to equal `value`.
    pub fn field(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(field.into(), Expected::One(value.into()));
        self
    }

    /// Require `field` to equal one of `values`.
    pub fn any_of<I, V>(mut self, field: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let values = values.into_iter().map(Into::into).collect();
        self.0.insert(field.into(), Expected::AnyOf(values));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Expected)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Evaluate against a user record.
    pub fn matches<U: UserFields + ?Sized>(&self, user: &U) -> bool {
        matches_user(user, self)
    }
}

/// Field lookup used by the predicate evaluator.
pub trait UserFields {
    fn user_field(&self, name: &str) -> Option<Cow<'_, Value>>;
}

impl UserFields for Map<String, Value> {
    fn user_field(&self, name: &str) -> Option<Cow<'_, Value>> {
        self.get(name).map(Cow::Borrowed)
    }
}

impl UserFields for Value {
    fn user_field(&self, name: &str) -> Option<Cow<'_, Value>> {
        self.as_object().and_then(|object| object.user_field(name))
    }
}

impl UserFields for AuthUser {
    fn user_field(&self, name: &str) -> Option<Cow<'_, Value>> {
        self.field(name)
    }
}

/// True iff every predicate field is present on `user` and accepted by its
/// expected value. An empty predicate always matches.
pub fn matches_user<U: UserFields + ?Sized>(user: &U, predicate: &UserMatch) -> bool {
    predicate.iter().all(|(field, expected)| {
        user.user_field(field)
            .is_some_and(|actual| expected.accepts(&actual))
    })
}

/// Evaluate a predicate against any serializable user type.
///
/// Values that do not serialize to a JSON object never match a non-empty
/// predicate.
pub fn matches_serialized<T: Serialize>(user: &T, predicate: &UserMatch) -> bool {
    match serde_json::to_value(user) {
        Ok(value) => matches_user(&value, predicate),
        Err(_) => predicate.is_empty(),
    }
}
