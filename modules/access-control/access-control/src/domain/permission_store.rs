//! Session-scoped permission grants.
//!
//! A [`PermissionStore`] turns the session's role ids into a
//! `PermissionKey -> PermissionFlags` map by asking a [`PermissionSource`]
//! once per load. Loads are fail-closed: any failure settles with an empty
//! map. Every load carries a ticket and the session generation it started
//! under; a result whose ticket was superseded, or whose session was
//! cleared or replaced meanwhile, is dropped.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use access_control_sdk::{
    Capability, PermissionAction, PermissionFlags, PermissionGrant, PermissionKey,
    PermissionSource,
};
use console_security::{RoleIds, SessionContext};
use parking_lot::RwLock;
use tokio::sync::watch;

use super::route_tree::RouteRequirement;
use crate::config::{MergePolicy, PermissionsConfig};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    /// No load has been started for this store.
    Idle,
    Pending,
    Settled,
}

/// Immutable view of the grants of one settled load.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PermissionSnapshot {
    role_ids: RoleIds,
    grants: HashMap<PermissionKey, PermissionFlags>,
    capabilities: HashSet<Capability>,
    revision: u64,
}

impl PermissionSnapshot {
    /// Snapshot that denies everything.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Whether `action` is granted on `module`/`sub_module`.
    ///
    /// An empty module is never granted.
    #[must_use]
    pub fn check(&self, module: &str, sub_module: Option<&str>, action: PermissionAction) -> bool {
        if module.trim().is_empty() {
            return false;
        }
        self.grants
            .get(&PermissionKey::new(module, sub_module))
            .is_some_and(|flags| flags.allows(action))
    }

    #[must_use]
    pub fn has_capability(&self, capability: Capability) -> bool {
        self.capabilities.contains(&capability)
    }

    /// Whether a route requirement is satisfied: capability first, then the module grant.
    #[must_use]
    pub fn permits(&self, requirement: &RouteRequirement) -> bool {
        if let Some(capability) = requirement.capability
            && !self.has_capability(capability)
        {
            return false;
        }
        match requirement.module.as_deref() {
            None => true,
            Some(module) => {
                self.check(module, requirement.sub_module.as_deref(), requirement.action)
            }
        }
    }

    #[must_use]
    pub fn role_ids(&self) -> &RoleIds {
        &self.role_ids
    }

    #[must_use]
    pub fn grants(&self) -> &HashMap<PermissionKey, PermissionFlags> {
        &self.grants
    }

    /// Increases with every applied load.
    #[must_use]
    pub fn revision(&self) -> u64 {
        self.revision
    }
}

struct StoreState {
    load: LoadState,
    ticket: u64,
    generation: u64,
    snapshot: Arc<PermissionSnapshot>,
}

/// Loads and serves the permission grants of the current session.
pub struct PermissionStore {
    session: Arc<SessionContext>,
    source: Arc<dyn PermissionSource>,
    merge_policy: MergePolicy,
    superadmin_role_ids: Vec<i64>,
    fetch_timeout: Duration,
    tickets: AtomicU64,
    state: RwLock<StoreState>,
    settled_tx: watch::Sender<u64>,
}

impl PermissionStore {
    #[must_use]
    pub fn new(
        session: Arc<SessionContext>,
        source: Arc<dyn PermissionSource>,
        config: &PermissionsConfig,
    ) -> Self {
        let (settled_tx, _) = watch::channel(0);
        Self {
            session,
            source,
            merge_policy: config.merge_policy,
            superadmin_role_ids: config.superadmin_role_ids.clone(),
            fetch_timeout: config.fetch_timeout(),
            tickets: AtomicU64::new(0),
            state: RwLock::new(StoreState {
                load: LoadState::Idle,
                ticket: 0,
                generation: 0,
                snapshot: Arc::new(PermissionSnapshot::empty()),
            }),
            settled_tx,
        }
    }

    /// Load grants for the session's current role ids.
    ///
    /// Without role ids the store settles immediately with no network call.
    /// Returns the snapshot current after this load finished, which is
    /// another load's result if this one was superseded.
    #[tracing::instrument(skip_all)]
    pub async fn load(&self) -> Arc<PermissionSnapshot> {
        let generation = self.session.generation();
        let role_ids = self.session.role_ids();
        let ticket = self.tickets.fetch_add(1, Ordering::AcqRel) + 1;
        {
            let mut state = self.state.write();
            state.load = LoadState::Pending;
            state.ticket = ticket;
            state.generation = generation;
        }

        if role_ids.is_empty() {
            tracing::debug!("No role ids in session; settling with no grants");
            return self.settle(ticket, generation, role_ids, HashMap::new());
        }

        tracing::debug!(role_ids = %role_ids, ticket, "Fetching role permissions");
        let grants =
            match tokio::time::timeout(self.fetch_timeout, self.source.role_grants(&role_ids)).await
            {
                Ok(Ok(grants)) => merge_grants(self.merge_policy, &grants),
                Ok(Err(e)) => {
                    tracing::error!(error = %e, "Failed to fetch permissions");
                    if e.is_unauthorized() && self.session.is_current(generation) {
                        tracing::warn!("Session token rejected; clearing session");
                        if let Err(clear_err) = self.session.clear() {
                            tracing::error!(error = %clear_err, "Failed to clear rejected session");
                        }
                    }
                    HashMap::new()
                }
                Err(_) => {
                    let timeout_ms =
                        u64::try_from(self.fetch_timeout.as_millis()).unwrap_or(u64::MAX);
                    tracing::error!(timeout_ms, "Permission fetch timed out");
                    HashMap::new()
                }
            };

        self.settle(ticket, generation, role_ids, grants)
    }

    fn settle(
        &self,
        ticket: u64,
        generation: u64,
        role_ids: RoleIds,
        grants: HashMap<PermissionKey, PermissionFlags>,
    ) -> Arc<PermissionSnapshot> {
        let mut state = self.state.write();
        if state.ticket != ticket {
            tracing::debug!(ticket, latest = state.ticket, "Dropping superseded permission load");
            return Arc::clone(&state.snapshot);
        }

        let revision = state.snapshot.revision + 1;
        let snapshot = if self.session.is_current(generation) {
            let capabilities = if role_ids.contains_any(&self.superadmin_role_ids) {
                HashSet::from([Capability::Superadmin])
            } else {
                HashSet::new()
            };
            PermissionSnapshot {
                role_ids,
                grants,
                capabilities,
                revision,
            }
        } else {
            tracing::debug!(ticket, "Session changed during load; discarding grants");
            PermissionSnapshot {
                revision,
                ..PermissionSnapshot::empty()
            }
        };

        let snapshot = Arc::new(snapshot);
        state.load = LoadState::Settled;
        state.snapshot = Arc::clone(&snapshot);
        drop(state);

        tracing::debug!(revision, grants = snapshot.grants.len(), "Permissions settled");
        self.settled_tx.send_replace(revision);
        snapshot
    }

    /// Current grants. Empty while the session differs from the one loaded for.
    #[must_use]
    pub fn snapshot(&self) -> Arc<PermissionSnapshot> {
        let state = self.state.read();
        if self.session.is_current(state.generation) {
            Arc::clone(&state.snapshot)
        } else {
            Arc::new(PermissionSnapshot {
                revision: state.snapshot.revision,
                ..PermissionSnapshot::empty()
            })
        }
    }

    /// `check` against the current snapshot.
    #[must_use]
    pub fn check(&self, module: &str, sub_module: Option<&str>, action: PermissionAction) -> bool {
        self.snapshot().check(module, sub_module, action)
    }

    #[must_use]
    pub fn state(&self) -> LoadState {
        self.state.read().load
    }

    /// True until a load for the live session has settled.
    #[must_use]
    pub fn is_loading(&self) -> bool {
        let state = self.state.read();
        state.load != LoadState::Settled || !self.session.is_current(state.generation)
    }

    /// Wait until no load is outstanding for the live session.
    pub async fn settled(&self) -> Arc<PermissionSnapshot> {
        let mut rx = self.settled_tx.subscribe();
        while self.is_loading() {
            if rx.changed().await.is_err() {
                break;
            }
        }
        self.snapshot()
    }

    /// Settled grants for the live session, starting a load if none is in flight for it.
    pub async fn ready(&self) -> Arc<PermissionSnapshot> {
        let needs_load = {
            let state = self.state.read();
            state.load == LoadState::Idle || !self.session.is_current(state.generation)
        };
        if needs_load {
            self.load().await
        } else {
            self.settled().await
        }
    }
}

impl std::fmt::Debug for PermissionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.read();
        f.debug_struct("PermissionStore")
            .field("load", &state.load)
            .field("ticket", &state.ticket)
            .field("revision", &state.snapshot.revision)
            .field("merge_policy", &self.merge_policy)
            .finish_non_exhaustive()
    }
}

fn merge_grants(
    policy: MergePolicy,
    grants: &[PermissionGrant],
) -> HashMap<PermissionKey, PermissionFlags> {
    let mut map: HashMap<PermissionKey, PermissionFlags> = HashMap::with_capacity(grants.len());
    for grant in grants {
        let flags = grant.flags();
        match policy {
            MergePolicy::LastWriteWins => {
                map.insert(grant.key(), flags);
            }
            MergePolicy::AnyRole => {
                map.entry(grant.key())
                    .and_modify(|merged| *merged = merged.union(flags))
                    .or_insert(flags);
            }
        }
    }
    map
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use access_control_sdk::AccessControlError;
    use async_trait::async_trait;
    use console_security::{MemorySessionStorage, SessionStorage, SessionUser};
    use secrecy::SecretString;
    use serde_json::{Value, json};
    use tokio::sync::Notify;

    use super::*;

    fn grant(module: &str, sub: Option<&str>, view: bool, create: bool) -> PermissionGrant {
        PermissionGrant {
            module: module.to_owned(),
            sub_module: sub.map(str::to_owned),
            can_create: create,
            can_view: view,
            can_update: false,
            can_delete: false,
        }
    }

    enum Reply {
        Grants(Vec<PermissionGrant>),
        Unauthorized,
        Fail,
        Hang,
    }

    struct FakeSource {
        reply: Reply,
        calls: AtomicUsize,
        seen: parking_lot::Mutex<Vec<RoleIds>>,
        gate: Option<Arc<Notify>>,
    }

    impl FakeSource {
        fn new(reply: Reply) -> Self {
            Self {
                reply,
                calls: AtomicUsize::new(0),
                seen: parking_lot::Mutex::new(Vec::new()),
                gate: None,
            }
        }

        fn gated(reply: Reply, gate: Arc<Notify>) -> Self {
            Self {
                gate: Some(gate),
                ..Self::new(reply)
            }
        }
    }

    #[async_trait]
    impl PermissionSource for FakeSource {
        async fn role_grants(
            &self,
            role_ids: &RoleIds,
        ) -> Result<Vec<PermissionGrant>, AccessControlError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.seen.lock().push(role_ids.clone());
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            match &self.reply {
                Reply::Grants(grants) => Ok(grants.clone()),
                Reply::Unauthorized => Err(AccessControlError::Unauthorized("expired".to_owned())),
                Reply::Fail => Err(AccessControlError::Transport("connection refused".to_owned())),
                Reply::Hang => std::future::pending().await,
            }
        }
    }

    fn session_with_roles(role_id: Value) -> Arc<SessionContext> {
        let session = Arc::new(SessionContext::in_memory());
        let user = SessionUser {
            role: Some("admin".to_owned()),
            role_id,
            ..SessionUser::default()
        };
        session
            .establish(&user, &SecretString::from("token".to_owned()))
            .unwrap();
        session
    }

    fn store(session: &Arc<SessionContext>, source: &Arc<FakeSource>) -> PermissionStore {
        store_with(session, source, PermissionsConfig::default())
    }

    fn store_with(
        session: &Arc<SessionContext>,
        source: &Arc<FakeSource>,
        config: PermissionsConfig,
    ) -> PermissionStore {
        let source: Arc<dyn PermissionSource> = source.clone();
        PermissionStore::new(Arc::clone(session), source, &config)
    }

    #[tokio::test]
    async fn check_follows_loaded_grants() {
        let session = session_with_roles(json!([2]));
        let source = Arc::new(FakeSource::new(Reply::Grants(vec![grant(
            "Catalogue_Management",
            Some("manage_products"),
            true,
            false,
        )])));
        let store = store(&session, &source);

        assert!(store.is_loading());
        store.load().await;

        assert!(!store.is_loading());
        let products = Some("manage_products");
        assert!(store.check("catalogue_management", products, PermissionAction::CanView));
        assert!(!store.check("catalogue_management", products, PermissionAction::CanCreate));
        assert!(store.check(
            "CATALOGUE_MANAGEMENT",
            Some("Manage_Products"),
            PermissionAction::default()
        ));
        assert!(!store.check("", Some("manage_products"), PermissionAction::CanView));
        assert!(!store.check("orders", None, PermissionAction::CanView));
    }

    #[tokio::test]
    async fn comma_role_ids_are_sent_once_deduplicated() {
        let session = session_with_roles(json!("3, 6,x,3"));
        let source = Arc::new(FakeSource::new(Reply::Grants(vec![])));
        let store = store(&session, &source);

        store.load().await;

        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
        assert_eq!(source.seen.lock()[0].as_slice(), &[3, 6]);
    }

    #[tokio::test]
    async fn no_roles_settles_without_fetching() {
        let session = session_with_roles(Value::Null);
        let source = Arc::new(FakeSource::new(Reply::Grants(vec![grant(
            "dashboard",
            None,
            true,
            true,
        )])));
        let store = store(&session, &source);

        let snapshot = store.load().await;

        assert_eq!(source.calls.load(Ordering::SeqCst), 0);
        assert_eq!(store.state(), LoadState::Settled);
        assert!(snapshot.grants().is_empty());
    }

    #[tokio::test]
    async fn fetch_failure_fails_closed() {
        let session = session_with_roles(json!([2]));
        let source = Arc::new(FakeSource::new(Reply::Fail));
        let store = store(&session, &source);

        let snapshot = store.load().await;

        assert!(!store.is_loading());
        assert!(snapshot.grants().is_empty());
        assert!(session.is_authenticated());
    }

    #[tokio::test]
    #[tracing_test::traced_test]
    async fn fetch_failure_is_logged() {
        let session = session_with_roles(json!([2]));
        let source = Arc::new(FakeSource::new(Reply::Fail));
        let store = store(&session, &source);

        store.load().await;

        assert!(logs_contain("Failed to fetch permissions"));
    }

    #[tokio::test]
    async fn unauthorized_clears_session() {
        let session = session_with_roles(json!([2]));
        let source = Arc::new(FakeSource::new(Reply::Unauthorized));
        let store = store(&session, &source);

        store.load().await;

        assert!(!session.is_authenticated());
        assert!(store.snapshot().grants().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn hung_fetch_times_out_closed() {
        let session = session_with_roles(json!([2]));
        let source = Arc::new(FakeSource::new(Reply::Hang));
        let store = store(&session, &source);

        let snapshot = store.load().await;

        assert_eq!(store.state(), LoadState::Settled);
        assert!(snapshot.grants().is_empty());
    }

    #[tokio::test]
    async fn last_write_wins_by_default() {
        let session = session_with_roles(json!([2, 3]));
        let source = Arc::new(FakeSource::new(Reply::Grants(vec![
            grant("order_management", Some("manage_orders"), true, true),
            grant("order_management", Some("manage_orders"), false, false),
        ])));
        let store = store(&session, &source);

        store.load().await;

        assert!(!store.check("order_management", Some("manage_orders"), PermissionAction::CanView));
    }

    #[tokio::test]
    async fn any_role_merges_by_or() {
        let session = session_with_roles(json!([2, 3]));
        let source = Arc::new(FakeSource::new(Reply::Grants(vec![
            grant("order_management", Some("manage_orders"), true, false),
            grant("order_management", Some("manage_orders"), false, true),
        ])));
        let config = PermissionsConfig {
            merge_policy: MergePolicy::AnyRole,
            ..PermissionsConfig::default()
        };
        let store = store_with(&session, &source, config);

        store.load().await;

        assert!(store.check("order_management", Some("manage_orders"), PermissionAction::CanView));
        assert!(store.check(
            "order_management",
            Some("manage_orders"),
            PermissionAction::CanCreate
        ));
    }

    #[tokio::test]
    async fn superadmin_capability_follows_configured_roles() {
        let session = session_with_roles(json!("1,4"));
        let source = Arc::new(FakeSource::new(Reply::Grants(vec![])));
        let store = store(&session, &source);
        assert!(store.load().await.has_capability(Capability::Superadmin));

        let session = session_with_roles(json!([4]));
        let store = store_with(
            &session,
            &source,
            PermissionsConfig {
                superadmin_role_ids: vec![4],
                ..PermissionsConfig::default()
            },
        );
        assert!(store.load().await.has_capability(Capability::Superadmin));
    }

    #[tokio::test]
    async fn logout_during_fetch_leaves_response_inert() {
        let session = session_with_roles(json!([2]));
        let gate = Arc::new(Notify::new());
        let source = Arc::new(FakeSource::gated(
            Reply::Grants(vec![grant("dashboard", None, true, false)]),
            Arc::clone(&gate),
        ));
        let store = Arc::new(store(&session, &source));

        let loader = tokio::spawn({
            let store = Arc::clone(&store);
            async move { store.load().await }
        });
        while source.calls.load(Ordering::SeqCst) == 0 {
            tokio::task::yield_now().await;
        }

        session.clear().unwrap();
        gate.notify_one();
        let snapshot = loader.await.unwrap();

        assert!(snapshot.grants().is_empty());
        assert!(!store.check("dashboard", None, PermissionAction::CanView));
    }

    type Gate = (std::sync::mpsc::Sender<()>, std::sync::mpsc::Receiver<()>);

    /// Storage whose next `remove` parks until released.
    #[derive(Default)]
    struct GatedStorage {
        inner: MemorySessionStorage,
        gate: parking_lot::Mutex<Option<Gate>>,
    }

    impl SessionStorage for GatedStorage {
        fn get(&self, key: &str) -> Result<Option<String>, console_security::SessionError> {
            self.inner.get(key)
        }

        fn set(&self, key: &str, value: &str) -> Result<(), console_security::SessionError> {
            self.inner.set(key, value)
        }

        fn remove(&self, key: &str) -> Result<(), console_security::SessionError> {
            let gate = self.gate.lock().take();
            if let Some((entered, release)) = gate {
                entered.send(()).unwrap();
                release.recv().unwrap();
            }
            self.inner.remove(key)
        }
    }

    #[tokio::test]
    async fn load_racing_a_logout_leaves_no_grants() {
        let storage = Arc::new(GatedStorage::default());
        let session = Arc::new(SessionContext::builder().storage(storage.clone()).build());
        let user = SessionUser {
            role: Some("admin".to_owned()),
            role_id: json!([2]),
            ..SessionUser::default()
        };
        session
            .establish(&user, &SecretString::from("token".to_owned()))
            .unwrap();
        let source = Arc::new(FakeSource::new(Reply::Grants(vec![grant(
            "dashboard",
            None,
            true,
            false,
        )])));
        let store = store(&session, &source);

        let (entered_tx, entered_rx) = std::sync::mpsc::channel();
        let (release_tx, release_rx) = std::sync::mpsc::channel();
        *storage.gate.lock() = Some((entered_tx, release_rx));
        let logout = std::thread::spawn({
            let session = Arc::clone(&session);
            move || session.clear()
        });

        // Logout is parked inside its first key removal; the user record is still stored.
        entered_rx.recv().unwrap();
        store.load().await;
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
        release_tx.send(()).unwrap();
        logout.join().unwrap().unwrap();

        assert!(!session.is_authenticated());
        assert!(!store.check("dashboard", None, PermissionAction::CanView));
        assert!(store.snapshot().role_ids().is_empty());
    }

    #[tokio::test]
    async fn superseded_load_is_dropped() {
        let session = session_with_roles(json!([2]));
        let gate = Arc::new(Notify::new());
        let slow = Arc::new(FakeSource::gated(
            Reply::Grants(vec![grant("dashboard", None, true, false)]),
            Arc::clone(&gate),
        ));
        let store = Arc::new(store(&session, &slow));

        let first = tokio::spawn({
            let store = Arc::clone(&store);
            async move { store.load().await }
        });
        while slow.calls.load(Ordering::SeqCst) == 0 {
            tokio::task::yield_now().await;
        }

        // A second load takes a newer ticket and settles first.
        let second = tokio::spawn({
            let store = Arc::clone(&store);
            async move { store.load().await }
        });
        while slow.calls.load(Ordering::SeqCst) < 2 {
            tokio::task::yield_now().await;
        }
        gate.notify_one();
        gate.notify_one();

        let a = first.await.unwrap();
        let b = second.await.unwrap();
        assert_eq!(store.snapshot().revision(), 1);
        assert_eq!(a.revision().max(b.revision()), 1);
    }

    #[tokio::test]
    async fn snapshot_revision_advances_per_settle() {
        let session = session_with_roles(json!([2]));
        let source = Arc::new(FakeSource::new(Reply::Grants(vec![])));
        let store = store(&session, &source);

        assert_eq!(store.snapshot().revision(), 0);
        store.load().await;
        store.load().await;
        assert_eq!(store.snapshot().revision(), 2);
    }

    #[tokio::test]
    async fn settled_waits_for_pending_load() {
        let session = session_with_roles(json!([2]));
        let gate = Arc::new(Notify::new());
        let source = Arc::new(FakeSource::gated(
            Reply::Grants(vec![grant("dashboard", None, true, false)]),
            Arc::clone(&gate),
        ));
        let store = Arc::new(store(&session, &source));

        let loader = tokio::spawn({
            let store = Arc::clone(&store);
            async move { store.load().await }
        });
        while source.calls.load(Ordering::SeqCst) == 0 {
            tokio::task::yield_now().await;
        }
        assert_eq!(store.state(), LoadState::Pending);

        let waiter = tokio::spawn({
            let store = Arc::clone(&store);
            async move { store.settled().await }
        });
        gate.notify_one();

        let snapshot = waiter.await.unwrap();
        loader.await.unwrap();
        assert!(snapshot.check("dashboard", None, PermissionAction::CanView));
    }

    #[tokio::test]
    async fn ready_starts_a_load_when_idle() {
        let session = session_with_roles(json!([2]));
        let source = Arc::new(FakeSource::new(Reply::Grants(vec![grant(
            "profile",
            Some("account_settings"),
            true,
            false,
        )])));
        let store = store(&session, &source);

        let snapshot = store.ready().await;

        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
        assert!(snapshot.check("profile", Some("account_settings"), PermissionAction::CanView));
    }

    #[test]
    fn permits_checks_capability_before_module() {
        let mut snapshot = PermissionSnapshot::empty();
        snapshot.grants.insert(
            PermissionKey::new("user_management", Some("manage_roles")),
            PermissionFlags {
                can_view: true,
                ..PermissionFlags::default()
            },
        );
        let roles = RouteRequirement {
            capability: Some(Capability::Superadmin),
            ..RouteRequirement::module(
                "user_management",
                Some("manage_roles"),
                PermissionAction::CanView,
            )
        };

        assert!(!snapshot.permits(&roles));
        snapshot.capabilities.insert(Capability::Superadmin);
        assert!(snapshot.permits(&roles));
        assert!(snapshot.permits(&RouteRequirement::default()));
    }
}
