//! Breadcrumb trail for a concrete path.

use std::collections::HashSet;

use serde::Serialize;

use super::route_tree::RouteTree;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Crumb {
    pub label: String,
    /// Link target. May be the bare prefix when no declared route starts with it.
    pub to: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Breadcrumbs {
    pub crumbs: Vec<Crumb>,
    /// Last path segment with its first `-` replaced by a space.
    pub title: String,
}

/// Reconstructs an ancestor chain from the literal routes of a [`RouteTree`].
#[derive(Debug, Clone)]
pub struct BreadcrumbResolver {
    static_routes: Vec<String>,
    known_segments: HashSet<String>,
}

impl BreadcrumbResolver {
    #[must_use]
    pub fn new(routes: &RouteTree) -> Self {
        let static_routes: Vec<String> = routes
            .declared_paths()
            .iter()
            .filter(|p| !p.is_templated())
            .map(ToString::to_string)
            .collect();
        let known_segments = routes
            .declared_paths()
            .iter()
            .filter(|p| !p.is_templated())
            .flat_map(|p| p.literals().map(str::to_owned))
            .collect();
        Self {
            static_routes,
            known_segments,
        }
    }

    /// Crumbs for every known static segment of `path` except the last one.
    ///
    /// Unknown segments (ids, part numbers) are skipped entirely.
    #[must_use]
    pub fn resolve(&self, path: &str) -> Breadcrumbs {
        let segments: Vec<&str> = path
            .split(['?', '#'])
            .next()
            .unwrap_or_default()
            .split('/')
            .filter(|s| !s.is_empty())
            .collect();
        let Some((last, parents)) = segments.split_last() else {
            return Breadcrumbs::default();
        };

        let mut crumbs = Vec::new();
        let mut accumulated: Vec<&str> = Vec::new();
        for segment in parents {
            if !self.known_segments.contains(*segment) {
                continue;
            }
            accumulated.push(*segment);
            let prefix = format!("/{}", accumulated.join("/"));
            crumbs.push(Crumb {
                label: segment.replace('-', " "),
                to: self.best_static_route(&prefix),
            });
        }

        Breadcrumbs {
            crumbs,
            title: last.replacen('-', " ", 1),
        }
    }

    /// Shallowest route starting with `prefix` that is at least as deep as it.
    fn best_static_route(&self, prefix: &str) -> String {
        let mut candidates: Vec<&String> = self
            .static_routes
            .iter()
            .filter(|r| r.starts_with(prefix))
            .collect();
        if candidates.is_empty() {
            return prefix.to_owned();
        }
        let prefix_depth = depth(prefix);
        candidates.sort_by_key(|r| depth(r));
        let best = candidates
            .iter()
            .copied()
            .find(|r| depth(r) >= prefix_depth)
            .unwrap_or(candidates[0]);
        best.clone()
    }
}

fn depth(path: &str) -> usize {
    path.split('/').filter(|s| !s.is_empty()).count()
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    fn resolver() -> BreadcrumbResolver {
        BreadcrumbResolver::new(&RouteTree::console().unwrap())
    }

    fn crumb(label: &str, to: &str) -> Crumb {
        Crumb {
            label: label.to_owned(),
            to: to.to_owned(),
        }
    }

    #[test]
    fn list_page_gets_crumb_per_parent_segment() {
        let trail =
            resolver().resolve("/ecommerce/catalogue_management/manage_products/products-list");

        assert_eq!(
            trail.crumbs,
            vec![
                crumb("ecommerce", "/ecommerce/profile"),
                crumb(
                    "catalogue_management",
                    "/ecommerce/catalogue_management/manage_products/products-list"
                ),
                crumb(
                    "manage_products",
                    "/ecommerce/catalogue_management/manage_products/products-list"
                ),
            ]
        );
        assert_eq!(trail.title, "products list");
    }

    #[test]
    fn shallowest_candidate_wins() {
        let trail = resolver().resolve("/ecommerce/profile/extra");
        assert_eq!(
            trail.crumbs,
            vec![
                crumb("ecommerce", "/ecommerce/profile"),
                crumb("profile", "/ecommerce/profile"),
            ]
        );
    }

    #[test]
    fn prefix_without_declared_route_links_to_itself() {
        let trail = resolver().resolve("/admin/ecommerce/x");

        assert_eq!(
            trail.crumbs,
            vec![
                crumb("admin", "/admin/login"),
                crumb("ecommerce", "/admin/ecommerce"),
            ]
        );
        assert_eq!(trail.title, "x");
    }

    #[test]
    fn dynamic_segments_are_skipped() {
        let trail = resolver().resolve(
            "/ecommerce/catalogue_management/manage_products/LM317T-NOPB/productdetails",
        );

        let labels: Vec<&str> = trail.crumbs.iter().map(|c| c.label.as_str()).collect();
        assert_eq!(labels, ["ecommerce", "catalogue_management", "manage_products"]);
        assert_eq!(trail.title, "productdetails");
    }

    #[test]
    fn segments_from_templated_routes_are_not_known() {
        let trail = resolver().resolve("/ecommerce/user_management/manage_roles/grant-access/5");

        assert_eq!(trail.crumbs.last().unwrap().label, "manage_roles");
        assert_eq!(trail.title, "5");
    }

    #[test]
    fn hyphenated_labels_become_spaced() {
        let trail = resolver().resolve("/ecommerce/order_management/manage_orders/order-list/17");

        assert_eq!(
            trail.crumbs.last().unwrap(),
            &crumb("order list", "/ecommerce/order_management/manage_orders/order-list")
        );
    }

    #[test]
    fn title_replaces_only_first_hyphen() {
        let trail =
            resolver().resolve("/ecommerce/user_management/manage_users/internal-users-list");
        assert_eq!(trail.title, "internal users-list");
    }

    #[test]
    fn empty_path_has_no_trail() {
        assert_eq!(resolver().resolve("/"), Breadcrumbs::default());
    }
}
