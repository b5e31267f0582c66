//! Action specs: the outbound description of what to do.
//!
//! An [`ActionSpec`] is an ordered list of [`ActionCall`]s. Each call names a
//! `domain.service` action, a list of target entity identifiers (which may
//! still contain placeholder tokens, see [`crate::placeholder`]) and a free
//! form parameter map.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

/// A single service invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionCall {
    /// `domain.service`, e.g. `"light.turn_on"`.
    pub action: String,
    #[serde(default)]
    pub target: Target,
    /// Service parameters.
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub data: serde_json::Map<String, serde_json::Value>,
}

/// Entities a call applies to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Target {
    /// Entity identifiers or placeholder tokens. Accepts a bare string when
    /// deserializing.
    #[serde(default, deserialize_with = "one_or_many")]
    pub entity_id: Vec<String>,
}

impl ActionCall {
    /// Create a call with no parameters.
    #[must_use]
    pub fn new<I, S>(action: impl Into<String>, targets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            action: action.into(),
            target: Target {
                entity_id: targets.into_iter().map(Into::into).collect(),
            },
            data: serde_json::Map::new(),
        }
    }

    /// Add one parameter.
    #[must_use]
    pub fn with_data(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }

    /// Split `action` into `(domain, service)`. Returns `None` when there is
    /// no dot.
    #[must_use]
    pub fn domain_and_service(&self) -> Option<(&str, &str)> {
        self.action.split_once('.')
    }

    #[must_use]
    pub fn targets(&self) -> &[String] {
        &self.target.entity_id
    }
}

impl fmt::Display for ActionCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]", self.action, self.target.entity_id.join(", "))
    }
}

/// Ordered sequence of calls, executed front to back. Empty means no-op.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActionSpec(Vec<ActionCall>);

impl ActionSpec {
    #[must_use]
    pub fn new(calls: Vec<ActionCall>) -> Self {
        Self(calls)
    }

    /// The explicit no-op.
    #[must_use]
    pub fn noop() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn single(call: ActionCall) -> Self {
        Self(vec![call])
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn calls(&self) -> &[ActionCall] {
        &self.0
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ActionCall> {
        self.0.iter()
    }
}

impl From<Vec<ActionCall>> for ActionSpec {
    fn from(calls: Vec<ActionCall>) -> Self {
        Self(calls)
    }
}

impl FromIterator<ActionCall> for ActionSpec {
    fn from_iter<T: IntoIterator<Item = ActionCall>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl IntoIterator for ActionSpec {
    type Item = ActionCall;
    type IntoIter = std::vec::IntoIter<ActionCall>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a ActionSpec {
    type Item = &'a ActionCall;
    type IntoIter = std::slice::Iter<'a, ActionCall>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

/// Deserialize either `"x"` or `["x", "y"]` into a list.
///
/// # Errors
///
/// Fails when the value is neither a string nor a list of strings.
pub fn one_or_many<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(value) => vec![value],
        OneOrMany::Many(values) => values,
    })
}
