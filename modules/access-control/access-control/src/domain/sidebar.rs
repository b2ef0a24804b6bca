//! Navigable menu derived from the route tree and the actor's grants.

use std::sync::Arc;

use serde::Serialize;

use super::permission_store::{PermissionSnapshot, PermissionStore};
use super::route_tree::{RouteKind, RouteNode, RouteTree};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SidebarItem {
    Section {
        key: String,
        title: String,
    },
    Group {
        key: String,
        name: String,
        route: Option<String>,
        children: Vec<SidebarItem>,
    },
    Link {
        key: String,
        name: String,
        route: String,
    },
}

impl SidebarItem {
    #[must_use]
    pub fn key(&self) -> &str {
        match self {
            Self::Section { key, .. } | Self::Group { key, .. } | Self::Link { key, .. } => key,
        }
    }
}

pub struct SidebarFilter {
    store: Arc<PermissionStore>,
    routes: Arc<RouteTree>,
}

impl SidebarFilter {
    #[must_use]
    pub fn new(store: Arc<PermissionStore>, routes: Arc<RouteTree>) -> Self {
        Self { store, routes }
    }

    /// Menu for the current session; empty while loading or without roles.
    #[must_use]
    pub fn menu(&self) -> Vec<SidebarItem> {
        if self.store.is_loading() {
            return Vec::new();
        }
        let snapshot = self.store.snapshot();
        if snapshot.role_ids().is_empty() {
            return Vec::new();
        }
        build_menu(&self.routes, &snapshot)
    }
}

/// Prune `routes` down to what `snapshot` lets the actor see.
///
/// Groups without a visible descendant are dropped, and so is a section
/// title directly followed by such a group.
#[must_use]
pub fn build_menu(routes: &RouteTree, snapshot: &PermissionSnapshot) -> Vec<SidebarItem> {
    let nodes = routes.nodes();
    let mut menu = Vec::new();
    for (idx, node) in nodes.iter().enumerate() {
        match &node.kind {
            RouteKind::Title => {
                let next_is_empty_group = nodes.get(idx + 1).is_some_and(|next| {
                    matches!(next.kind, RouteKind::Branch { .. })
                        && !any_visible(next.children(), snapshot)
                });
                if !next_is_empty_group {
                    menu.push(SidebarItem::Section {
                        key: node.key.clone(),
                        title: node.name.clone(),
                    });
                }
            }
            RouteKind::Branch { route, children } => {
                if is_visible(node, snapshot) {
                    menu.push(SidebarItem::Group {
                        key: node.key.clone(),
                        name: node.name.clone(),
                        route: route.as_ref().map(ToString::to_string),
                        children: render_children(children, snapshot),
                    });
                }
            }
            RouteKind::Leaf { .. } => {
                if is_visible(node, snapshot) {
                    menu.extend(render_node(node, snapshot));
                }
            }
        }
    }
    menu
}

fn any_visible(nodes: &[RouteNode], snapshot: &PermissionSnapshot) -> bool {
    nodes.iter().any(|n| is_visible(n, snapshot))
}

fn is_visible(node: &RouteNode, snapshot: &PermissionSnapshot) -> bool {
    if !node.visible_in_sidebar || !snapshot.permits(&node.requirement) {
        return false;
    }
    match &node.kind {
        RouteKind::Branch { children, .. } => any_visible(children, snapshot),
        RouteKind::Leaf { .. } => true,
        RouteKind::Title => false,
    }
}

fn render_children(nodes: &[RouteNode], snapshot: &PermissionSnapshot) -> Vec<SidebarItem> {
    nodes
        .iter()
        .filter(|n| is_visible(n, snapshot))
        .filter_map(|n| render_node(n, snapshot))
        .collect()
}

fn render_node(node: &RouteNode, snapshot: &PermissionSnapshot) -> Option<SidebarItem> {
    match &node.kind {
        RouteKind::Leaf { route } => Some(SidebarItem::Link {
            key: node.key.clone(),
            name: node.name.clone(),
            route: route.to_string(),
        }),
        RouteKind::Branch { route, children } => Some(SidebarItem::Group {
            key: node.key.clone(),
            name: node.name.clone(),
            route: route.as_ref().map(ToString::to_string),
            children: render_children(children, snapshot),
        }),
        RouteKind::Title => None,
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use access_control_sdk::{
        AccessControlError, PermissionAction, PermissionGrant, PermissionSource,
    };
    use async_trait::async_trait;
    use console_security::{RoleIds, SessionContext, SessionUser};
    use secrecy::SecretString;
    use serde_json::{Value, json};

    use super::*;
    use crate::config::PermissionsConfig;

    struct StaticSource(Vec<PermissionGrant>);

    #[async_trait]
    impl PermissionSource for StaticSource {
        async fn role_grants(
            &self,
            _role_ids: &RoleIds,
        ) -> Result<Vec<PermissionGrant>, AccessControlError> {
            Ok(self.0.clone())
        }
    }

    fn grant(module: &str, sub: Option<&str>, action: PermissionAction) -> PermissionGrant {
        PermissionGrant {
            module: module.to_owned(),
            sub_module: sub.map(str::to_owned),
            can_create: action == PermissionAction::CanCreate,
            can_view: true,
            can_update: false,
            can_delete: false,
        }
    }

    async fn filter(role_id: Value, grants: Vec<PermissionGrant>) -> SidebarFilter {
        let session = Arc::new(SessionContext::in_memory());
        let user = SessionUser {
            role: Some("admin".to_owned()),
            role_id,
            ..SessionUser::default()
        };
        session
            .establish(&user, &SecretString::from("token".to_owned()))
            .unwrap();
        let source: Arc<dyn PermissionSource> = Arc::new(StaticSource(grants));
        let store = Arc::new(PermissionStore::new(
            session,
            source,
            &PermissionsConfig::default(),
        ));
        store.load().await;
        SidebarFilter::new(store, Arc::new(RouteTree::console().unwrap()))
    }

    fn keys(items: &[SidebarItem]) -> Vec<&str> {
        items.iter().map(SidebarItem::key).collect()
    }

    fn find<'a>(items: &'a [SidebarItem], key: &str) -> Option<&'a SidebarItem> {
        items.iter().find_map(|item| {
            if item.key() == key {
                return Some(item);
            }
            match item {
                SidebarItem::Group { children, .. } => find(children, key),
                SidebarItem::Section { .. } | SidebarItem::Link { .. } => None,
            }
        })
    }

    #[tokio::test]
    async fn denied_groups_and_their_titles_are_pruned() {
        let filter = filter(
            json!([2]),
            vec![grant("order_management", Some("manage_orders"), PermissionAction::CanView)],
        )
        .await;

        let menu = filter.menu();

        assert_eq!(keys(&menu), ["title-orders", "order_management"]);
        let Some(SidebarItem::Group { children, .. }) = find(&menu, "order_management") else {
            panic!("orders group missing");
        };
        // Hidden and moduleless leaves stay out of the menu.
        assert_eq!(
            keys(children),
            ["order_management__order_list", "order_management__warehouse_details"]
        );
    }

    #[tokio::test]
    async fn role_screens_need_superadmin() {
        let grants = vec![
            grant("user_management", Some("manage_roles"), PermissionAction::CanCreate),
            grant("user_management", Some("manage_users"), PermissionAction::CanView),
        ];

        let menu = filter(json!([2]), grants.clone()).await.menu();
        assert!(find(&menu, "user_management__roles").is_none());
        assert!(find(&menu, "user_management__end_users_list").is_some());

        let menu = filter(json!("1"), grants).await.menu();
        assert!(find(&menu, "user_management__roles_list").is_some());
        assert!(find(&menu, "user_management__new_role").is_some());
    }

    #[tokio::test]
    async fn leaf_action_is_respected() {
        let menu = filter(
            json!([2]),
            vec![grant("user_management", Some("manage_users"), PermissionAction::CanView)],
        )
        .await
        .menu();

        assert!(find(&menu, "user_management__internal_users_list").is_some());
        assert!(find(&menu, "user_management__new_user").is_none());
    }

    #[tokio::test]
    async fn menu_is_empty_without_roles() {
        let filter = filter(
            Value::Null,
            vec![grant("dashboard", None, PermissionAction::CanView)],
        )
        .await;
        assert!(filter.menu().is_empty());
    }
}
