//! Token claim normalization
//!
//! Turns the raw claim mapping returned by the identity provider into a
//! [`ClaimSet`]: reserved claims removed, `"true"`/`"false"` string literals
//! coerced to booleans, and an `admin` flag always present.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Claim that marks a caller as an administrator.
pub const ADMIN_CLAIM: &str = "admin";

/// Claim names owned by the token standard or the provider. Never part of a
/// [`ClaimSet`].
pub const RESERVED_CLAIMS: &[&str] = &[
    "acr",
    "amr",
    "at_hash",
    "aud",
    "auth_time",
    "azp",
    "c_hash",
    "cnf",
    "exp",
    "firebase",
    "iat",
    "iss",
    "jti",
    "nbf",
    "nonce",
    "sub",
    "user_id",
];

/// Check whether a claim name is reserved
pub fn is_reserved(name: &str) -> bool {
    RESERVED_CLAIMS.contains(&name)
}

/// Custom claims of an authenticated caller.
///
/// Always holds a boolean `admin` entry and never holds a reserved name.
/// Deserialized input goes through [`normalize`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "Map<String, Value>", into = "Map<String, Value>")]
pub struct ClaimSet(Map<String, Value>);

impl ClaimSet {
    /// Value of the `admin` flag
    pub fn is_admin(&self) -> bool {
        self.0.get(ADMIN_CLAIM).and_then(Value::as_bool).unwrap_or(false)
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Raw mapping, e.g. for handing back to the provider.
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_map(self) -> Map<String, Value> {
        self.0
    }
}

impl Default for ClaimSet {
    fn default() -> Self {
        normalize(Map::new())
    }
}

impl From<Map<String, Value>> for ClaimSet {
    fn from(raw: Map<String, Value>) -> Self {
        normalize(raw)
    }
}

impl From<ClaimSet> for Map<String, Value> {
    fn from(claims: ClaimSet) -> Self {
        claims.0
    }
}

/// Coerce the recognized boolean literals.
///
/// Only strings equal to `true` or `false` ignoring ASCII case convert; every
/// other value, including `"yes"`, `"1"` or `" true"`, is returned unchanged.
pub fn coerce_claim_value(value: Value) -> Value {
    match value {
        Value::String(s) if s.eq_ignore_ascii_case("true") => Value::Bool(true),
        Value::String(s) if s.eq_ignore_ascii_case("false") => Value::Bool(false),
        other => other,
    }
}

/// Normalize the claims of a verified token.
pub fn normalize(raw: Map<String, Value>) -> ClaimSet {
    let claims = raw
        .into_iter()
        .filter(|(name, _)| !is_reserved(name))
        .fold(Map::new(), |mut acc, (name, value)| {
            acc.insert(name, coerce_claim_value(value));
            acc
        });

    let claims = match claims.get(ADMIN_CLAIM) {
        Some(Value::Bool(_)) => claims,
        // a non-boolean admin claim cannot grant anything
        _ => {
            let mut claims = claims;
            claims.insert(ADMIN_CLAIM.to_string(), Value::Bool(false));
            claims
        }
    };

    ClaimSet(claims)
}
