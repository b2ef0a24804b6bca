//! Per-navigation authorization.

use std::sync::Arc;
use std::time::Duration;

use access_control_sdk::PermissionAction;
use console_security::SessionContext;

use super::permission_store::{PermissionSnapshot, PermissionStore};
use super::route_tree::{RouteEntry, RouteTree};
use crate::config::NavigationConfig;

/// Why a navigation was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenialReason {
    AuthorizationDenied,
    RouteNotFound,
}

/// Result of guarding one navigation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardOutcome {
    /// No session token; go to the login route.
    Unauthenticated { redirect: String },
    /// Permissions are still loading; render nothing.
    Checking,
    Authorized {
        route_key: String,
        params: Vec<(String, String)>,
    },
    Denied {
        reason: DenialReason,
        redirect: String,
    },
}

impl GuardOutcome {
    /// Where the caller must navigate instead, if anywhere.
    #[must_use]
    pub fn redirect(&self) -> Option<&str> {
        match self {
            Self::Unauthenticated { redirect } | Self::Denied { redirect, .. } => Some(redirect),
            Self::Checking | Self::Authorized { .. } => None,
        }
    }
}

/// Decides whether a path may be rendered and where to go otherwise.
///
/// Every call recomputes from the session and the store's current snapshot;
/// nothing is cached between navigations.
pub struct RouteGuard {
    session: Arc<SessionContext>,
    store: Arc<PermissionStore>,
    routes: Arc<RouteTree>,
    login_route: String,
    landing_route: String,
    module_priority: Vec<String>,
    wait_timeout: Duration,
}

impl RouteGuard {
    #[must_use]
    pub fn builder(
        session: Arc<SessionContext>,
        store: Arc<PermissionStore>,
        routes: Arc<RouteTree>,
    ) -> RouteGuardBuilder {
        RouteGuardBuilder {
            session,
            store,
            routes,
            login_route: None,
            navigation: None,
            wait_timeout: None,
        }
    }

    #[must_use]
    pub fn login_route(&self) -> &str {
        &self.login_route
    }

    /// Guard `path` against the store as it is right now.
    ///
    /// Returns [`GuardOutcome::Checking`] while permissions are loading.
    #[must_use]
    pub fn evaluate(&self, path: &str) -> GuardOutcome {
        if let Some(outcome) = self.pre_check(path) {
            return outcome;
        }
        if self.store.is_loading() {
            return GuardOutcome::Checking;
        }
        self.decide(path, &self.store.snapshot())
    }

    /// Guard `path`, waiting for permissions to settle first.
    ///
    /// The wait is bounded; on expiry the decision is made against an empty
    /// grant set.
    #[tracing::instrument(skip(self))]
    pub async fn authorize(&self, path: &str) -> GuardOutcome {
        if let Some(outcome) = self.pre_check(path) {
            return outcome;
        }
        let snapshot = match tokio::time::timeout(self.wait_timeout, self.store.ready()).await {
            Ok(snapshot) => snapshot,
            Err(_) => {
                tracing::warn!("Permissions did not settle in time; denying");
                Arc::new(PermissionSnapshot::empty())
            }
        };
        if !self.session.is_authenticated() {
            return self.unauthenticated();
        }
        self.decide(path, &snapshot)
    }

    /// Unprotected routes pass; a missing token ends the check.
    fn pre_check(&self, path: &str) -> Option<GuardOutcome> {
        if let Some(resolved) = self.routes.resolve(path)
            && !resolved.entry.protected
        {
            return Some(GuardOutcome::Authorized {
                route_key: resolved.entry.key.clone(),
                params: resolved.params,
            });
        }
        if !self.session.is_authenticated() {
            tracing::debug!(path, "No session token");
            return Some(self.unauthenticated());
        }
        None
    }

    fn unauthenticated(&self) -> GuardOutcome {
        GuardOutcome::Unauthenticated {
            redirect: self.login_route.clone(),
        }
    }

    fn decide(&self, path: &str, snapshot: &PermissionSnapshot) -> GuardOutcome {
        let Some(resolved) = self.routes.resolve(path) else {
            tracing::debug!(path, "No route matches path");
            return GuardOutcome::Denied {
                reason: DenialReason::RouteNotFound,
                redirect: self.login_route.clone(),
            };
        };

        if snapshot.permits(&resolved.entry.requirement) {
            return GuardOutcome::Authorized {
                route_key: resolved.entry.key.clone(),
                params: resolved.params,
            };
        }

        let redirect = self.fallback(resolved.entry, snapshot);
        tracing::debug!(
            path,
            route_key = %resolved.entry.key,
            redirect = %redirect,
            "Navigation denied"
        );
        GuardOutcome::Denied {
            reason: DenialReason::AuthorizationDenied,
            redirect,
        }
    }

    /// First viewable moduled screen other than `denied`, else login.
    fn fallback(&self, denied: &RouteEntry, snapshot: &PermissionSnapshot) -> String {
        if self.session.role_ids().is_empty() {
            return self.login_route.clone();
        }
        self.routes
            .flatten(|e| e.requirement.module.is_some() && is_navigable(e))
            .into_iter()
            .filter(|e| e.key != denied.key && e.path != denied.path)
            .find(|e| snapshot.permits(&e.requirement.viewing()))
            .map_or_else(|| self.login_route.clone(), |e| e.path.to_string())
    }

    /// Where to send the actor right after login.
    ///
    /// The configured landing route if there are no grants at all (no role,
    /// an empty permission list or a failed fetch) or the dashboard is
    /// viewable; otherwise the first viewable screen of the first module in
    /// priority order; otherwise the login route.
    #[must_use]
    pub fn landing_route(&self, snapshot: &PermissionSnapshot) -> String {
        if snapshot.grants().is_empty() {
            return self.landing_route.clone();
        }
        if snapshot.check("dashboard", None, PermissionAction::CanView) {
            return self.landing_route.clone();
        }
        for module in &self.module_priority {
            if module.eq_ignore_ascii_case("dashboard") {
                continue;
            }
            let found = self
                .routes
                .flatten(|e| e.requirement.is_module(module) && is_navigable(e))
                .into_iter()
                .find(|e| snapshot.permits(&e.requirement.viewing()));
            if let Some(entry) = found {
                return entry.path.to_string();
            }
        }
        self.login_route.clone()
    }
}

/// Templated paths cannot be redirect targets.
fn is_navigable(entry: &RouteEntry) -> bool {
    !entry.path.is_templated()
}

impl std::fmt::Debug for RouteGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouteGuard")
            .field("login_route", &self.login_route)
            .field("landing_route", &self.landing_route)
            .field("wait_timeout", &self.wait_timeout)
            .finish_non_exhaustive()
    }
}

pub struct RouteGuardBuilder {
    session: Arc<SessionContext>,
    store: Arc<PermissionStore>,
    routes: Arc<RouteTree>,
    login_route: Option<String>,
    navigation: Option<NavigationConfig>,
    wait_timeout: Option<Duration>,
}

impl RouteGuardBuilder {
    #[must_use]
    pub fn login_route(mut self, route: &str) -> Self {
        self.login_route = Some(route.to_owned());
        self
    }

    #[must_use]
    pub fn navigation(mut self, navigation: NavigationConfig) -> Self {
        self.navigation = Some(navigation);
        self
    }

    /// Upper bound for [`RouteGuard::authorize`] waiting on the store.
    #[must_use]
    pub fn wait_timeout(mut self, timeout: Duration) -> Self {
        self.wait_timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn build(self) -> RouteGuard {
        let navigation = self.navigation.unwrap_or_default();
        RouteGuard {
            session: self.session,
            store: self.store,
            routes: self.routes,
            login_route: self
                .login_route
                .unwrap_or_else(|| crate::config::SessionConfig::default().login_route),
            landing_route: navigation.landing_route,
            module_priority: navigation.module_priority,
            wait_timeout: self.wait_timeout.unwrap_or(Duration::from_secs(11)),
        }
    }
}
