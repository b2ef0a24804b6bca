//! Domain layer for the access control module.

pub mod breadcrumbs;
pub mod catalogue;
pub mod error;
pub mod permission_store;
pub mod route_guard;
pub mod route_tree;
pub mod service;
pub mod sidebar;

pub use breadcrumbs::{BreadcrumbResolver, Breadcrumbs, Crumb};
pub use catalogue::console_routes;
pub use error::{DomainError, RouteTreeError};
pub use permission_store::{LoadState, PermissionSnapshot, PermissionStore};
pub use route_guard::{DenialReason, GuardOutcome, RouteGuard};
pub use route_tree::{
    ResolvedRoute, RouteEntry, RouteKind, RouteNode, RoutePath, RouteRequirement, RouteTree,
    Segment,
};
pub use service::{LoginOutcome, Service};
pub use sidebar::{SidebarFilter, SidebarItem};
