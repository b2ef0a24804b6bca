#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
//! Access Control SDK
//!
//! This crate provides the public API for the `access_control` module:
//!
//! - [`PermissionSource`] - Backend seam that returns the grants of a role set
//! - [`AdminAuthClient`] - Backend seam for the admin login exchange
//! - [`PermissionGrant`], [`PermissionKey`], [`PermissionFlags`] - Grant models
//! - [`PermissionAction`], [`Capability`] - What a screen requires
//! - [`AccessControlError`] - Error types
//!
//! ## Usage
//!
//! ```ignore
//! use access_control_sdk::{PermissionAction, PermissionKey, PermissionSource};
//!
//! let grants = source.role_grants(&role_ids).await?;
//! for grant in &grants {
//!     let key = grant.key(); // "catalogue_management__manage_products"
//!     let can_view = grant.flags().allows(PermissionAction::CanView);
//! }
//! ```

pub mod api;
pub mod error;
pub mod models;

// Re-export main types at crate root
pub use api::{AdminAuthClient, PermissionSource};
pub use error::AccessControlError;
pub use models::{
    Capability, GrantsEnvelope, LoginGrant, PermissionAction, PermissionFlags, PermissionGrant,
    PermissionKey, is_truthy,
};
