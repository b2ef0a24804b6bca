use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::roles::RoleIds;

/// Backend user identifier; numeric in practice, but strings are tolerated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum UserId {
    Int(i64),
    Text(String),
}

/// Authenticated user record persisted under `{namespace}_user_data`.
///
/// Field names follow the backend login payload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionUser {
    #[serde(rename = "userId", default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<UserId>,
    /// Role namespace (e.g. `admin`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    /// Raw role id value: scalar, array or comma-separated string.
    #[serde(default)]
    pub role_id: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub user_type: Option<String>,
}

impl SessionUser {
    /// Normalised role ids held by this user.
    #[must_use]
    pub fn role_ids(&self) -> RoleIds {
        RoleIds::from_value(&self.role_id)
    }

    /// Display name assembled from first and last name.
    #[must_use]
    pub fn display_name(&self) -> Option<String> {
        let parts: Vec<&str> = [self.first_name.as_deref(), self.last_name.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect();
        if parts.is_empty() {
            None
        } else {
            Some(parts.join(" "))
        }
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn parses_login_payload_shape() {
        let user: SessionUser = serde_json::from_value(json!({
            "userId": 17,
            "role": "admin",
            "role_id": "2,5",
            "email": "ops@example.com",
            "first_name": "Ada",
            "last_name": "Lovelace",
            "type": "internal"
        }))
        .unwrap();

        assert_eq!(user.user_id, Some(UserId::Int(17)));
        assert_eq!(user.role_ids().as_slice(), &[2, 5]);
        assert_eq!(user.user_type.as_deref(), Some("internal"));
        assert_eq!(user.display_name().as_deref(), Some("Ada Lovelace"));
    }

    #[test]
    fn missing_role_id_means_no_roles() {
        let user: SessionUser = serde_json::from_value(json!({"userId": "u-1"})).unwrap();
        assert_eq!(user.user_id, Some(UserId::Text("u-1".to_owned())));
        assert!(user.role_ids().is_empty());
        assert!(user.display_name().is_none());
    }
}
