use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use secrecy::{ExposeSecret, SecretString};

use crate::constants::{DEFAULT_NAMESPACE, ROLE_ID_KEY, ROLE_KEY, auth_token_key, user_data_key};
use crate::error::SessionError;
use crate::roles::RoleIds;
use crate::storage::{MemorySessionStorage, SessionStorage};
use crate::user::SessionUser;

/// `SessionContext` owns the console session for one role namespace.
///
/// It is created once and injected into the permission store and the route
/// guard; nothing reads session state from ambient globals. Every
/// [`establish`](Self::establish) and [`clear`](Self::clear) bumps the
/// session generation so work started under an older session can detect
/// that it is stale.
pub struct SessionContext {
    default_namespace: String,
    storage: Arc<dyn SessionStorage>,
    generation: AtomicU64,
}

impl SessionContext {
    /// Create a new `SessionContext` builder
    #[must_use]
    pub fn builder() -> SessionContextBuilder {
        SessionContextBuilder::default()
    }

    /// A context over fresh in-memory storage in the default namespace.
    #[must_use]
    pub fn in_memory() -> Self {
        SessionContextBuilder::default().build()
    }

    /// The active role namespace: the recorded `role` key, else the default.
    #[must_use]
    pub fn namespace(&self) -> String {
        match self.storage.get(ROLE_KEY) {
            Ok(Some(ns)) if !ns.trim().is_empty() => ns.trim().to_owned(),
            Ok(_) => self.default_namespace.clone(),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read session namespace");
                self.default_namespace.clone()
            }
        }
    }

    /// Current session generation.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Whether `generation` still identifies the live session.
    #[must_use]
    pub fn is_current(&self, generation: u64) -> bool {
        self.generation() == generation
    }

    /// Bearer token of the active namespace. Storage failures read as "no token".
    #[must_use]
    pub fn bearer_token(&self) -> Option<SecretString> {
        let key = auth_token_key(&self.namespace());
        match self.storage.get(&key) {
            Ok(token) => token
                .filter(|t| !t.trim().is_empty())
                .map(SecretString::from),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read session token");
                None
            }
        }
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.bearer_token().is_some()
    }

    /// Stored user record. Unreadable or malformed records read as absent.
    #[must_use]
    pub fn user(&self) -> Option<SessionUser> {
        let key = user_data_key(&self.namespace());
        let raw = match self.storage.get(&key) {
            Ok(raw) => raw?,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read session user");
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(user) => Some(user),
            Err(e) => {
                tracing::warn!(error = %e, "Stored session user is malformed");
                None
            }
        }
    }

    /// Role ids of the stored user; empty when logged out.
    #[must_use]
    pub fn role_ids(&self) -> RoleIds {
        self.user().map(|u| u.role_ids()).unwrap_or_default()
    }

    /// Persist a freshly authenticated session and return its generation.
    ///
    /// The namespace is the user's `role`, falling back to the default.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError`] if any key cannot be written.
    pub fn establish(&self, user: &SessionUser, token: &SecretString) -> Result<u64, SessionError> {
        let namespace = user
            .role
            .as_deref()
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .unwrap_or(&self.default_namespace)
            .to_owned();

        self.bump();
        let written = self.write_keys(&namespace, user, token);
        let generation = self.bump();
        written?;

        tracing::debug!(namespace = %namespace, generation, "Session established");
        Ok(generation)
    }

    /// Replace the stored user record without touching the token.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError`] if the record cannot be written.
    pub fn update_user(&self, user: &SessionUser) -> Result<(), SessionError> {
        let key = user_data_key(&self.namespace());
        self.storage.set(&key, &serde_json::to_string(user)?)
    }

    /// Destroy the session: drop token, user record, role and role ids.
    ///
    /// The generation is bumped before the first key is removed and again
    /// after the last one, so no reader can pair a live generation with a
    /// half-removed session.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError`] if a key cannot be removed.
    pub fn clear(&self) -> Result<u64, SessionError> {
        let namespace = self.namespace();
        self.bump();
        let removed = self.remove_keys(&namespace);
        let generation = self.bump();
        removed?;

        tracing::debug!(namespace = %namespace, generation, "Session cleared");
        Ok(generation)
    }

    fn bump(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::AcqRel) + 1
    }

    fn write_keys(
        &self,
        namespace: &str,
        user: &SessionUser,
        token: &SecretString,
    ) -> Result<(), SessionError> {
        self.storage
            .set(&user_data_key(namespace), &serde_json::to_string(user)?)?;
        self.storage
            .set(&auth_token_key(namespace), token.expose_secret())?;
        self.storage.set(ROLE_KEY, namespace)?;
        let role_id = if user.role_id.is_null() {
            "[]".to_owned()
        } else {
            serde_json::to_string(&user.role_id)?
        };
        self.storage.set(ROLE_ID_KEY, &role_id)
    }

    fn remove_keys(&self, namespace: &str) -> Result<(), SessionError> {
        self.storage.remove(&auth_token_key(namespace))?;
        self.storage.remove(&user_data_key(namespace))?;
        self.storage.remove(ROLE_KEY)?;
        self.storage.remove(ROLE_ID_KEY)
    }
}

impl fmt::Debug for SessionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionContext")
            .field("default_namespace", &self.default_namespace)
            .field("generation", &self.generation())
            .finish_non_exhaustive()
    }
}

#[derive(Default)]
pub struct SessionContextBuilder {
    default_namespace: Option<String>,
    storage: Option<Arc<dyn SessionStorage>>,
}

impl SessionContextBuilder {
    #[must_use]
    pub fn default_namespace(mut self, namespace: &str) -> Self {
        self.default_namespace = Some(namespace.to_owned());
        self
    }

    #[must_use]
    pub fn storage(mut self, storage: Arc<dyn SessionStorage>) -> Self {
        self.storage = Some(storage);
        self
    }

    #[must_use]
    pub fn build(self) -> SessionContext {
        SessionContext {
            default_namespace: self
                .default_namespace
                .unwrap_or_else(|| DEFAULT_NAMESPACE.to_owned()),
            storage: self
                .storage
                .unwrap_or_else(|| Arc::new(MemorySessionStorage::new())),
            generation: AtomicU64::new(0),
        }
    }
}
