//! Authenticated user identity.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use super::CredentialError;

/// Stable attributes of the signed-in user needed by the handshake.
///
/// `id` and `role` are required; every other attribute rides along in
/// `attributes` so that a merge never loses fields it does not know about.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Identity {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    pub role: String,
    #[serde(flatten)]
    pub attributes: Map<String, Value>,
}

impl Identity {
    pub fn new(id: impl Into<String>, role: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            role: role.into(),
            attributes: Map::new(),
        }
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Minimal structural check: a non-blank identifier and role
    pub fn is_well_formed(&self) -> bool {
        !self.id.trim().is_empty() && !self.role.trim().is_empty()
    }

    /// Build an identity from an untyped record, applying the structural check.
    ///
    /// # Errors
    ///
    /// Returns `CredentialError::InvalidIdentity` when the record lacks an
    /// identifier or a role.
    pub fn from_value(value: Value) -> Result<Self, CredentialError> {
        let identity: Identity = serde_json::from_value(value)
            .map_err(|e| CredentialError::InvalidIdentity(e.to_string()))?;
        if !identity.is_well_formed() {
            return Err(CredentialError::InvalidIdentity(
                "identifier and role must not be blank".to_string(),
            ));
        }
        Ok(identity)
    }

    pub fn to_value(&self) -> Value {
        let mut record = self.attributes.clone();
        record.insert("id".to_string(), Value::String(self.id.clone()));
        record.insert("role".to_string(), Value::String(self.role.clone()));
        Value::Object(record)
    }

    /// Merge `patch` over this identity and return the whole new record.
    ///
    /// Nothing is applied unless the merged result is still well-formed.
    ///
    /// # Errors
    ///
    /// Returns `CredentialError::InvalidIdentity` when the merge would produce
    /// an identity without identifier or role.
    pub fn merged(&self, patch: &IdentityPatch) -> Result<Self, CredentialError> {
        let mut record = match self.to_value() {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        for (key, value) in patch.iter() {
            record.insert(key.clone(), value.clone());
        }
        Self::from_value(Value::Object(record))
    }
}

/// Partial identity update, merged key by key
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IdentityPatch(Map<String, Value>);

impl IdentityPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }
}

impl From<Map<String, Value>> for IdentityPatch {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

/// Identifiers arrive as strings or as numbers depending on the backend.
fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number identifier, found {other}"
        ))),
    }
}
