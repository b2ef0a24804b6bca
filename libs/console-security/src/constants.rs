//! Session key layout.
//!
//! Keys are namespaced by the active role namespace, `admin` unless the login
//! response names another one.

/// Namespace used when no role namespace has been recorded.
pub const DEFAULT_NAMESPACE: &str = "admin";

/// Key holding the active role namespace.
pub const ROLE_KEY: &str = "role";

/// Key holding the JSON-encoded role id list (array or scalar).
pub const ROLE_ID_KEY: &str = "role_id";

/// Key holding the bearer token for `namespace`.
#[must_use]
pub fn auth_token_key(namespace: &str) -> String {
    format!("{namespace}_auth_token")
}

/// Key holding the JSON user record for `namespace`.
#[must_use]
pub fn user_data_key(namespace: &str) -> String {
    format!("{namespace}_user_data")
}
