//! Backend traits consumed by the access control module.

use async_trait::async_trait;
use console_security::RoleIds;
use secrecy::SecretString;

use crate::error::AccessControlError;
use crate::models::{LoginGrant, PermissionGrant};

/// Source of permission grants for a set of roles.
///
/// The production implementation calls
/// `GET /user/permissions/roles?ids=<comma-separated ids>`:
///
/// ```ignore
/// let grants = source.role_grants(&RoleIds::new([2, 3])).await?;
/// ```
#[async_trait]
pub trait PermissionSource: Send + Sync {
    /// Fetch the flattened grants of every role in `role_ids`.
    ///
    /// # Errors
    ///
    /// - `Unauthorized` if the backend rejects the session token
    /// - `Transport` / `Status` for network and non-success responses
    /// - `InvalidResponse` if the body is not a grant envelope
    async fn role_grants(
        &self,
        role_ids: &RoleIds,
    ) -> Result<Vec<PermissionGrant>, AccessControlError>;
}

/// Admin login exchange.
#[async_trait]
pub trait AdminAuthClient: Send + Sync {
    /// Exchange credentials for a token and user record.
    ///
    /// # Errors
    ///
    /// - `LoginRejected` with the backend's message when credentials are refused
    /// - `Transport` / `Status` / `InvalidResponse` for infrastructure failures
    async fn login(
        &self,
        identifier: &str,
        password: &SecretString,
    ) -> Result<LoginGrant, AccessControlError>;
}
