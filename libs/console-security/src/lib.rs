#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
//! Session primitives shared by the admin console crates.
//!
//! - [`SessionContext`] - the injected replacement for ambient browser session state
//! - [`SessionStorage`] - key/value persistence seam (in-memory implementation included)
//! - [`SessionUser`] - the authenticated user record stored under `{namespace}_user_data`
//! - [`RoleIds`] - normalised role identifiers held by the actor

pub mod constants;
pub mod context;
pub mod error;
pub mod roles;
pub mod storage;
pub mod user;

pub use context::SessionContext;
pub use error::SessionError;
pub use roles::{RoleIds, normalize_role_ids};
pub use storage::{MemorySessionStorage, SessionStorage};
pub use user::{SessionUser, UserId};
