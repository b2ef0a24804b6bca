//! The console's route table.

use access_control_sdk::Capability;
use access_control_sdk::PermissionAction::{CanCreate, CanUpdate, CanView};

use super::error::RouteTreeError;
use super::route_tree::RouteNode;

const PRODUCTS: &str = "/ecommerce/catalogue_management/manage_products";
const MANUFACTURERS: &str = "/ecommerce/catalogue_management/manage_manufacturers";
const CATEGORIES: &str = "/ecommerce/catalogue_management/manage_categories";
const USERS: &str = "/ecommerce/user_management/manage_users";
const ROLES: &str = "/ecommerce/user_management/manage_roles";
const ORDERS: &str = "/ecommerce/order_management/manage_orders";

/// Declared console screens, in sidebar order.
///
/// Role management screens additionally require the `superadmin` capability.
///
/// # Errors
///
/// Returns `InvalidPath` if a declared path does not parse.
#[allow(clippy::too_many_lines)]
pub fn console_routes() -> Result<Vec<RouteNode>, RouteTreeError> {
    let leaf = |key: &str, name: &str, route: String| RouteNode::leaf(key, name, &route);
    let branch = |key: &str, name: &str, route: String, children: Vec<RouteNode>| {
        RouteNode::branch(key, name, Some(&route), children)
    };

    Ok(vec![
        RouteNode::leaf("admin_login", "Admin Login", "/admin/login")?
            .view("AdminLogin")
            .hidden(),
        RouteNode::leaf("login", "Login", "/login")?
            .view("AdminLogin")
            .hidden(),
        // Dashboards
        RouteNode::title("title-dashboard", "Dashboards"),
        RouteNode::branch(
            "dashboard",
            "Dashboards",
            Some("/dashboards/Overview"),
            vec![
                RouteNode::leaf("dashboard_default", "Overview", "/dashboards/Overview")?
                    .view("Dashboard")
                    .requires("dashboard", None, CanView)
                    .protected(),
            ],
        )?,
        // Catalogue
        RouteNode::title("title-management", "Management"),
        branch(
            "catalogue_management",
            "Catalogue",
            format!("{PRODUCTS}/products-list"),
            vec![
                branch(
                    "catalogue_management__manage_products",
                    "Products",
                    format!("{PRODUCTS}/products-list"),
                    vec![
                        leaf(
                            "catalogue_management__products_list",
                            "All Products",
                            format!("{PRODUCTS}/products-list"),
                        )?
                        .view("ProductsList")
                        .requires("catalogue_management", Some("manage_products"), CanView)
                        .protected(),
                        leaf(
                            "catalogue_management__product_page",
                            "Product Details",
                            format!("{PRODUCTS}/:semicon_part_number/productdetails"),
                        )?
                        .view("ProductPage")
                        .hidden()
                        .protected(),
                    ],
                )?,
                branch(
                    "catalogue_management__manage_manufacturers",
                    "Manufacturers",
                    format!("{MANUFACTURERS}/manufacturers-list"),
                    vec![
                        leaf(
                            "catalogue_management__manufacturers_list",
                            "All Manufacturers",
                            format!("{MANUFACTURERS}/manufacturers-list"),
                        )?
                        .view("ManufacturersList")
                        .requires(
                            "catalogue_management",
                            Some("manage_manufacturers"),
                            CanView,
                        )
                        .protected(),
                        leaf(
                            "catalogue_management__manufacturer_page",
                            "Manufacturer Details",
                            format!("{MANUFACTURERS}/:manufacturerId"),
                        )?
                        .view("ManufacturerPage")
                        .hidden()
                        .protected(),
                    ],
                )?,
                branch(
                    "catalogue_management__manage_categories",
                    "Categories",
                    format!("{CATEGORIES}/categories-list"),
                    vec![
                        leaf(
                            "catalogue_management__categories_list",
                            "All Categories",
                            format!("{CATEGORIES}/categories-list"),
                        )?
                        .view("CategoriesList")
                        .requires("catalogue_management", Some("manage_categories"), CanView)
                        .protected(),
                        leaf(
                            "catalogue_management__category_page",
                            "Category Details",
                            format!("{CATEGORIES}/category-page/:categoryId"),
                        )?
                        .view("CategoryPage")
                        .hidden()
                        .protected(),
                        leaf(
                            "catalogue_management__products_under_subcategory",
                            "Products Under Subcategory",
                            format!("{CATEGORIES}/:categoryId/under-subcategory/:subcategoryId"),
                        )?
                        .view("ProductsUnderSubcategory")
                        .hidden()
                        .protected(),
                    ],
                )?,
            ],
        )?,
        // Administration
        RouteNode::title("title-admin", "Control Panel"),
        branch(
            "user_management",
            "Administration",
            format!("{USERS}/users-list"),
            vec![
                branch(
                    "user_management__users",
                    "Users",
                    format!("{USERS}/users-list"),
                    vec![
                        leaf(
                            "user_management__end_users_list",
                            "End Users",
                            format!("{USERS}/end-users-list"),
                        )?
                        .view("EndUsersList")
                        .requires("user_management", Some("manage_users"), CanView)
                        .protected(),
                        leaf(
                            "user_management__internal_users_list",
                            "Internal Users",
                            format!("{USERS}/internal-users-list"),
                        )?
                        .view("InternalUsersList")
                        .requires("user_management", Some("manage_users"), CanView)
                        .protected(),
                        leaf(
                            "user_management__new_user",
                            "Create User",
                            format!("{USERS}/new-user"),
                        )?
                        .view("NewUsers")
                        .requires("user_management", Some("manage_users"), CanCreate)
                        .protected(),
                        leaf(
                            "user_management__edit_user",
                            "Edit User",
                            format!("{USERS}/edit-users/:userId"),
                        )?
                        .view("EditUsers")
                        .hidden()
                        .requires("user_management", Some("manage_users"), CanUpdate)
                        .protected(),
                    ],
                )?,
                branch(
                    "user_management__roles",
                    "Roles",
                    format!("{ROLES}/roles-list"),
                    vec![
                        leaf(
                            "user_management__roles_list",
                            "Roles List",
                            format!("{ROLES}/roles-list"),
                        )?
                        .view("RolesList")
                        .requires("user_management", Some("manage_roles"), CanView)
                        .capability(Capability::Superadmin)
                        .protected(),
                        leaf(
                            "user_management__new_role",
                            "Create Role",
                            format!("{ROLES}/new-roles"),
                        )?
                        .view("NewRoles")
                        .requires("user_management", Some("manage_roles"), CanCreate)
                        .capability(Capability::Superadmin)
                        .protected(),
                        leaf(
                            "user_management__edit_role",
                            "Edit Role",
                            format!("{ROLES}/edit-roles/:roleId"),
                        )?
                        .view("EditRoles")
                        .hidden()
                        .requires("user_management", Some("manage_roles"), CanUpdate)
                        .capability(Capability::Superadmin)
                        .protected(),
                        leaf(
                            "user_management__grant_access",
                            "Grant Access",
                            format!("{ROLES}/grant-access/:roleId"),
                        )?
                        .view("GrantAccess")
                        .hidden()
                        .requires("user_management", Some("manage_roles"), CanUpdate)
                        .capability(Capability::Superadmin)
                        .protected(),
                    ],
                )?,
            ],
        )?,
        // Orders
        RouteNode::title("title-orders", "Orders Management"),
        branch(
            "order_management",
            "Orders",
            format!("{ORDERS}/order-list"),
            vec![
                leaf(
                    "order_management__order_list",
                    "Order List",
                    format!("{ORDERS}/order-list"),
                )?
                .view("OrderList")
                .requires("order_management", Some("manage_orders"), CanView)
                .protected(),
                leaf(
                    "order_management__order_details",
                    "Order Details",
                    format!("{ORDERS}/order-details/:orderId"),
                )?
                .view("OrderDetails")
                .hidden()
                .protected(),
                leaf(
                    "order_management__create_warehouse",
                    "Create Warehouse",
                    format!("{ORDERS}/create-warehouse"),
                )?
                .view("CreateWarehouse")
                .requires("order_management", Some("manage_orders"), CanCreate)
                .hidden()
                .protected(),
                leaf(
                    "order_management__user_past_history",
                    "User Past History",
                    format!("{ORDERS}/user-past-history/:userId"),
                )?
                .view("UserPastHistory")
                .hidden()
                .protected(),
                leaf(
                    "order_management__warehouse_details",
                    "Warehouse Details",
                    format!("{ORDERS}/warehouse-details"),
                )?
                .view("WarehouseDetails")
                .requires("order_management", Some("manage_orders"), CanView)
                .protected(),
            ],
        )?,
        // Account
        RouteNode::title("title-account", "Account Settings"),
        RouteNode::branch(
            "profile",
            "Profile",
            Some("/ecommerce/profile"),
            vec![
                RouteNode::leaf(
                    "profile__account_settings",
                    "Account Settings",
                    "/ecommerce/profile",
                )?
                .view("Settings")
                .requires("profile", Some("account_settings"), CanView)
                .protected(),
            ],
        )?,
    ])
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use crate::domain::route_tree::RouteTree;

    #[test]
    fn catalogue_builds_without_shadowed_leaves() {
        let tree = RouteTree::console().unwrap();
        for entry in tree.entries() {
            let resolved = tree.resolve(entry.path.as_str()).unwrap();
            assert_eq!(resolved.entry.key, entry.key, "{} is shadowed", entry.path);
        }
    }

    #[test]
    fn templated_screens_resolve_with_params() {
        let tree = RouteTree::console().unwrap();
        let resolved = tree
            .resolve("/ecommerce/catalogue_management/manage_categories/12/under-subcategory/7")
            .unwrap();
        assert_eq!(
            resolved.entry.key,
            "catalogue_management__products_under_subcategory"
        );
        assert_eq!(resolved.param("categoryId"), Some("12"));
        assert_eq!(resolved.param("subcategoryId"), Some("7"));

        let page = tree
            .resolve("/ecommerce/catalogue_management/manage_categories/category-page/12")
            .unwrap();
        assert_eq!(page.entry.key, "catalogue_management__category_page");
    }

    #[test]
    fn role_screens_require_superadmin() {
        let tree = RouteTree::console().unwrap();
        let role_screens = tree.flatten(|e| {
            e.requirement.sub_module.as_deref() == Some("manage_roles")
        });
        assert_eq!(role_screens.len(), 4);
        assert!(role_screens.iter().all(|e| e.requirement.capability.is_some()));
    }
}
