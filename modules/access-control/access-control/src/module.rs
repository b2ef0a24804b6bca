//! Wiring of the access control components.

use std::sync::Arc;

use access_control_sdk::{AdminAuthClient, PermissionSource};
use anyhow::Context;
use console_security::SessionContext;

use crate::config::ConsoleConfig;
use crate::domain::{
    BreadcrumbResolver, PermissionStore, RouteGuard, RouteTree, RouteTreeError, Service,
    SidebarFilter,
};
use crate::infra::ConsoleHttpClient;

/// Slack on top of the fetch timeout before a guard stops waiting for the store.
const GUARD_WAIT_SLACK_MS: u64 = 1_000;

/// The access control module: one instance per console session context.
pub struct AccessControlModule {
    config: ConsoleConfig,
    session: Arc<SessionContext>,
    routes: Arc<RouteTree>,
    store: Arc<PermissionStore>,
    guard: Arc<RouteGuard>,
    sidebar: SidebarFilter,
    breadcrumbs: BreadcrumbResolver,
    service: Service,
}

impl AccessControlModule {
    /// Build the module over the console route table and the given backends.
    ///
    /// # Errors
    ///
    /// Returns [`RouteTreeError`] if the route table fails validation.
    pub fn new(
        config: ConsoleConfig,
        session: Arc<SessionContext>,
        source: Arc<dyn PermissionSource>,
        auth: Arc<dyn AdminAuthClient>,
    ) -> Result<Self, RouteTreeError> {
        let routes = Arc::new(RouteTree::console()?);
        Ok(Self::with_routes(config, session, source, auth, routes))
    }

    /// Build the module over an explicit route table.
    #[must_use]
    pub fn with_routes(
        config: ConsoleConfig,
        session: Arc<SessionContext>,
        source: Arc<dyn PermissionSource>,
        auth: Arc<dyn AdminAuthClient>,
        routes: Arc<RouteTree>,
    ) -> Self {
        let store = Arc::new(PermissionStore::new(
            Arc::clone(&session),
            source,
            &config.permissions,
        ));
        let wait = config.permissions.fetch_timeout()
            + std::time::Duration::from_millis(GUARD_WAIT_SLACK_MS);
        let guard = Arc::new(
            RouteGuard::builder(Arc::clone(&session), Arc::clone(&store), Arc::clone(&routes))
                .login_route(&config.session.login_route)
                .navigation(config.navigation.clone())
                .wait_timeout(wait)
                .build(),
        );
        let sidebar = SidebarFilter::new(Arc::clone(&store), Arc::clone(&routes));
        let breadcrumbs = BreadcrumbResolver::new(&routes);
        let service = Service::new(
            Arc::clone(&session),
            auth,
            Arc::clone(&store),
            Arc::clone(&guard),
        );

        tracing::info!(
            merge_policy = ?config.permissions.merge_policy,
            leaves = routes.entries().len(),
            "access_control module initialized"
        );

        Self {
            config,
            session,
            routes,
            store,
            guard,
            sidebar,
            breadcrumbs,
            service,
        }
    }

    /// Build the module against the HTTP backend named in `config.api`.
    ///
    /// # Errors
    ///
    /// Fails if the backend URL is invalid or the route table fails validation.
    pub fn with_http_backend(
        config: ConsoleConfig,
        session: Arc<SessionContext>,
    ) -> anyhow::Result<Self> {
        let client = Arc::new(
            ConsoleHttpClient::new(
                &config.api.base_url,
                Arc::clone(&session),
                config.api.request_timeout(),
            )
            .context("failed to create console backend client")?,
        );
        let source: Arc<dyn PermissionSource> = client.clone();
        let auth: Arc<dyn AdminAuthClient> = client;
        Self::new(config, session, source, auth).context("invalid console route table")
    }

    #[must_use]
    pub fn config(&self) -> &ConsoleConfig {
        &self.config
    }

    #[must_use]
    pub fn session(&self) -> &Arc<SessionContext> {
        &self.session
    }

    #[must_use]
    pub fn routes(&self) -> &Arc<RouteTree> {
        &self.routes
    }

    #[must_use]
    pub fn store(&self) -> &Arc<PermissionStore> {
        &self.store
    }

    #[must_use]
    pub fn guard(&self) -> &Arc<RouteGuard> {
        &self.guard
    }

    #[must_use]
    pub fn sidebar(&self) -> &SidebarFilter {
        &self.sidebar
    }

    #[must_use]
    pub fn breadcrumbs(&self) -> &BreadcrumbResolver {
        &self.breadcrumbs
    }

    #[must_use]
    pub fn service(&self) -> &Service {
        &self.service
    }
}
