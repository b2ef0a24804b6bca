//! Domain models for the access control module.

use std::fmt;
use std::num::FpCategory;
use std::str::FromStr;

use console_security::SessionUser;
use secrecy::SecretString;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Sub-module segment used when a grant or check names no sub-module.
pub const DEFAULT_SUB_MODULE: &str = "default";

/// CRUD action a screen requires.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionAction {
    CanCreate,
    #[default]
    CanView,
    CanUpdate,
    CanDelete,
}

impl PermissionAction {
    pub const ALL: [Self; 4] = [
        Self::CanCreate,
        Self::CanView,
        Self::CanUpdate,
        Self::CanDelete,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::CanCreate => "can_create",
            Self::CanView => "can_view",
            Self::CanUpdate => "can_update",
            Self::CanDelete => "can_delete",
        }
    }
}

impl fmt::Display for PermissionAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PermissionAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|a| a.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown permission action '{s}'"))
    }
}

/// Capabilities a screen can require on top of its module grant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    /// Actor holds one of the configured superadmin roles.
    Superadmin,
}

/// Case-insensitive index of a grant: `module__sub_module`.
///
/// An absent or blank sub-module normalises to [`DEFAULT_SUB_MODULE`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PermissionKey(String);

impl PermissionKey {
    #[must_use]
    pub fn new(module: &str, sub_module: Option<&str>) -> Self {
        let sub = sub_module
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(DEFAULT_SUB_MODULE);
        Self(format!(
            "{}__{}",
            module.trim().to_lowercase(),
            sub.to_lowercase()
        ))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PermissionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The four CRUD flags of one grant.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[allow(clippy::struct_excessive_bools)] // mirrors the backend grant shape
pub struct PermissionFlags {
    pub can_create: bool,
    pub can_view: bool,
    pub can_update: bool,
    pub can_delete: bool,
}

impl PermissionFlags {
    #[must_use]
    pub fn allows(&self, action: PermissionAction) -> bool {
        match action {
            PermissionAction::CanCreate => self.can_create,
            PermissionAction::CanView => self.can_view,
            PermissionAction::CanUpdate => self.can_update,
            PermissionAction::CanDelete => self.can_delete,
        }
    }

    /// Flag-wise OR.
    #[must_use]
    pub fn union(self, other: Self) -> Self {
        Self {
            can_create: self.can_create || other.can_create,
            can_view: self.can_view || other.can_view,
            can_update: self.can_update || other.can_update,
            can_delete: self.can_delete || other.can_delete,
        }
    }
}

/// One row of `GET /user/permissions/roles`.
///
/// Flags accept any JSON value and are coerced by truthiness, so `1`,
/// `"yes"` and `true` all grant while `0`, `""`, `null` and a missing field deny.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[allow(clippy::struct_excessive_bools)] // mirrors the backend grant shape
pub struct PermissionGrant {
    pub module: String,
    #[serde(default)]
    pub sub_module: Option<String>,
    #[serde(default, deserialize_with = "truthy")]
    pub can_create: bool,
    #[serde(default, deserialize_with = "truthy")]
    pub can_view: bool,
    #[serde(default, deserialize_with = "truthy")]
    pub can_update: bool,
    #[serde(default, deserialize_with = "truthy")]
    pub can_delete: bool,
}

impl PermissionGrant {
    #[must_use]
    pub fn key(&self) -> PermissionKey {
        PermissionKey::new(&self.module, self.sub_module.as_deref())
    }

    #[must_use]
    pub fn flags(&self) -> PermissionFlags {
        PermissionFlags {
            can_create: self.can_create,
            can_view: self.can_view,
            can_update: self.can_update,
            can_delete: self.can_delete,
        }
    }
}

/// Response envelope of the grants endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GrantsEnvelope {
    pub data: Vec<PermissionGrant>,
}

/// Result of a successful admin login.
#[derive(Debug, Clone)]
pub struct LoginGrant {
    pub user: SessionUser,
    pub access_token: SecretString,
}

/// JavaScript-style truthiness of a JSON value.
#[must_use]
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n
            .as_f64()
            .is_some_and(|f| !f.is_nan() && f.classify() != FpCategory::Zero),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn truthy<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().is_some_and(is_truthy))
}
