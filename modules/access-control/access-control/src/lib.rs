//! Access Control Module
//!
//! Role-based authorization for the admin console: a session-scoped
//! [`PermissionStore`](domain::PermissionStore), the static console
//! [`RouteTree`](domain::RouteTree), and the per-navigation and per-render
//! consumers built on top of them ([`RouteGuard`](domain::RouteGuard),
//! [`SidebarFilter`](domain::SidebarFilter),
//! [`BreadcrumbResolver`](domain::BreadcrumbResolver)).
//!
//! [`AccessControlModule`] wires everything from a [`ConsoleConfig`].
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

pub mod config;
pub mod domain;
pub mod infra;
pub mod module;

pub use config::{ConfigError, ConsoleConfig};
pub use module::AccessControlModule;
