//! Login and logout flows around the permission store.

use std::sync::Arc;

use access_control_sdk::AdminAuthClient;
use console_security::{SessionContext, SessionUser};
use secrecy::SecretString;

use super::error::DomainError;
use super::permission_store::{PermissionSnapshot, PermissionStore};
use super::route_guard::RouteGuard;

/// Outcome of a successful login.
#[derive(Debug, Clone)]
pub struct LoginOutcome {
    pub user: SessionUser,
    pub permissions: Arc<PermissionSnapshot>,
    /// Where the console should navigate next.
    pub landing_route: String,
}

/// Access control service.
pub struct Service {
    session: Arc<SessionContext>,
    auth: Arc<dyn AdminAuthClient>,
    store: Arc<PermissionStore>,
    guard: Arc<RouteGuard>,
}

impl Service {
    #[must_use]
    pub fn new(
        session: Arc<SessionContext>,
        auth: Arc<dyn AdminAuthClient>,
        store: Arc<PermissionStore>,
        guard: Arc<RouteGuard>,
    ) -> Self {
        Self {
            session,
            auth,
            store,
            guard,
        }
    }

    /// Authenticate, persist the session, load permissions and pick a landing route.
    ///
    /// # Errors
    ///
    /// - `Backend` when the credentials are refused or the backend fails
    /// - `Session` when the session cannot be persisted
    #[tracing::instrument(skip(self, password))]
    pub async fn login(
        &self,
        identifier: &str,
        password: &SecretString,
    ) -> Result<LoginOutcome, DomainError> {
        let grant = self.auth.login(identifier, password).await?;
        let generation = self.session.establish(&grant.user, &grant.access_token)?;
        tracing::info!(
            generation,
            role_ids = %grant.user.role_ids(),
            "Admin session established"
        );

        let permissions = self.store.load().await;
        let landing_route = self.guard.landing_route(&permissions);
        Ok(LoginOutcome {
            user: grant.user,
            permissions,
            landing_route,
        })
    }

    /// Destroy the session and return the route to navigate to.
    ///
    /// # Errors
    ///
    /// Returns `Session` if the stored keys cannot be removed.
    #[tracing::instrument(skip(self))]
    pub fn logout(&self) -> Result<String, DomainError> {
        let generation = self.session.clear()?;
        tracing::info!(generation, "Admin session cleared");
        Ok(self.guard.login_route().to_owned())
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use access_control_sdk::{
        AccessControlError, LoginGrant, PermissionAction, PermissionGrant, PermissionSource,
    };
    use async_trait::async_trait;
    use console_security::RoleIds;
    use secrecy::ExposeSecret;
    use serde_json::json;

    use super::*;
    use crate::config::PermissionsConfig;
    use crate::domain::route_tree::RouteTree;

    struct FakeAuth;

    #[async_trait]
    impl AdminAuthClient for FakeAuth {
        async fn login(
            &self,
            identifier: &str,
            password: &SecretString,
        ) -> Result<LoginGrant, AccessControlError> {
            if password.expose_secret() != "hunter2" {
                return Err(AccessControlError::LoginRejected(
                    "Invalid credentials".to_owned(),
                ));
            }
            let user = serde_json::from_value(json!({
                "userId": 4,
                "role": "admin",
                "role_id": "2",
                "email": identifier,
            }))
            .map_err(|e| AccessControlError::InvalidResponse(e.to_string()))?;
            Ok(LoginGrant {
                user,
                access_token: SecretString::from("issued".to_owned()),
            })
        }
    }

    struct OrdersOnly;

    #[async_trait]
    impl PermissionSource for OrdersOnly {
        async fn role_grants(
            &self,
            _role_ids: &RoleIds,
        ) -> Result<Vec<PermissionGrant>, AccessControlError> {
            Ok(vec![PermissionGrant {
                module: "order_management".to_owned(),
                sub_module: Some("manage_orders".to_owned()),
                can_create: false,
                can_view: true,
                can_update: false,
                can_delete: false,
            }])
        }
    }

    fn service() -> (Arc<SessionContext>, Service) {
        let session = Arc::new(SessionContext::in_memory());
        let source: Arc<dyn PermissionSource> = Arc::new(OrdersOnly);
        let store = Arc::new(PermissionStore::new(
            Arc::clone(&session),
            source,
            &PermissionsConfig::default(),
        ));
        let guard = Arc::new(
            RouteGuard::builder(
                Arc::clone(&session),
                Arc::clone(&store),
                Arc::new(RouteTree::console().unwrap()),
            )
            .build(),
        );
        let service = Service::new(Arc::clone(&session), Arc::new(FakeAuth), store, guard);
        (session, service)
    }

    #[tokio::test]
    async fn login_establishes_session_and_picks_landing_route() {
        let (session, service) = service();

        let outcome = service
            .login("ops@example.com", &SecretString::from("hunter2".to_owned()))
            .await
            .unwrap();

        assert!(session.is_authenticated());
        assert_eq!(session.role_ids().as_slice(), &[2]);
        assert!(outcome.permissions.check(
            "order_management",
            Some("manage_orders"),
            PermissionAction::CanView
        ));
        assert_eq!(
            outcome.landing_route,
            "/ecommerce/order_management/manage_orders/order-list"
        );
    }

    #[tokio::test]
    async fn rejected_login_leaves_no_session() {
        let (session, service) = service();

        let err = service
            .login("ops@example.com", &SecretString::from("wrong".to_owned()))
            .await
            .unwrap_err();

        assert_eq!(err.user_message(), "Invalid credentials");
        assert!(!session.is_authenticated());
    }

    #[tokio::test]
    async fn logout_clears_session_and_returns_login_route() {
        let (session, service) = service();
        service
            .login("ops@example.com", &SecretString::from("hunter2".to_owned()))
            .await
            .unwrap();

        let target = service.logout().unwrap();

        assert_eq!(target, "/admin/login");
        assert!(!session.is_authenticated());
        assert!(session.user().is_none());
    }
}
