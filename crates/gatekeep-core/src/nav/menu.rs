//! Navigation menus for the admin console.
//!
//! Entries carry the permission and role needed to see them. An empty
//! requirement means everyone who is signed in.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::breadcrumbs::{RouteMeta, RouteRegistry};
use super::guard::DEFAULT_LOGIN_PATH;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct MenuItem {
    pub name: String,
    /// Group headers have no target of their own
    pub to: Option<String>,
    pub icon: String,
    pub permission: Option<String>,
    pub role: Option<String>,
    #[serde(default, rename = "subMenu")]
    pub sub_menu: Vec<MenuItem>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct ProfileMenuItem {
    pub label: String,
    pub to: String,
    pub icon: String,
    pub permission: Option<String>,
}

fn requirement(value: &str) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

fn link(name: &str, to: &str, icon: &str, permission: &str, role: &str) -> MenuItem {
    MenuItem {
        name: name.to_string(),
        to: requirement(to),
        icon: icon.to_string(),
        permission: requirement(permission),
        role: requirement(role),
        sub_menu: Vec::new(),
    }
}

fn group(
    name: &str,
    to: &str,
    icon: &str,
    permission: &str,
    role: &str,
    sub_menu: Vec<MenuItem>,
) -> MenuItem {
    MenuItem {
        sub_menu,
        ..link(name, to, icon, permission, role)
    }
}

/// Sidebar menu.
pub fn main_menu() -> Vec<MenuItem> {
    vec![
        link("Home", "/dashboard", "tabler:home", "", ""),
        group("Applications", "", "tabler:app-window", "view_applications", "admin", vec![
            link("All Applications", "/dashboard/applications", "tabler:app-window", "view_applications", "admin"),
            link("Add Application", "/dashboard/applications/create", "tabler:plus", "create_application", "admin"),
        ]),
        group("DHIS2", "", "tabler:database", "view_dhis2", "", vec![
            link("All Instances", "/dashboard/dhis2", "tabler:database", "view_dhis2", ""),
            link("Add DHIS2 Instance", "/dashboard/dhis2/create", "tabler:plus", "add_dhis2_instance", ""),
        ]),
        group("Users", "", "tabler:users", "view_users", "", vec![
            link("All Users", "/dashboard/users", "tabler:user", "create_user", "admin"),
            link("New User", "/dashboard/users/create", "tabler:user-plus", "create_user", "admin"),
            link("Account Requests", "/dashboard/users/requests", "tabler:users-plus", "create_user", "admin"),
        ]),
        group("Metadata", "/dashboard/metadata", "tabler:adjustments-horizontal", "view_metadata", "", vec![
            link("Units", "/dashboard/metadata/units", "ri:user-community-fill", "manage_unit", "admin"),
            link("Organizations", "/dashboard/metadata/organizations", "codicon:organization", "create_application", "admin"),
            link("Departments", "/dashboard/metadata/departments", "tabler:users-group", "create_application", "admin"),
            link("Permissions", "/dashboard/metadata/permissions", "icon-park-outline:permissions", "create_application", "admin"),
            link("Roles", "/dashboard/metadata/roles", "oui:app-users-roles", "create_application", "admin"),
        ]),
        link("Settings", "/dashboard/settings", "tabler:settings", "view_settings", ""),
    ]
}

/// Menu under the avatar in the header.
pub fn profile_menu() -> Vec<ProfileMenuItem> {
    vec![
        ProfileMenuItem {
            label: "Account".to_string(),
            to: "/dashboard/account".to_string(),
            icon: "tabler:user".to_string(),
            permission: None,
        },
        ProfileMenuItem {
            label: "Settings".to_string(),
            to: "/dashboard/settings".to_string(),
            icon: "tabler:settings".to_string(),
            permission: requirement("view_settings"),
        },
    ]
}

/// What the signed-in user may see.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Access {
    permissions: HashSet<String>,
    roles: HashSet<String>,
}

impl Access {
    pub fn new<P, R>(permissions: P, roles: R) -> Self
    where
        P: IntoIterator,
        P::Item: Into<String>,
        R: IntoIterator,
        R::Item: Into<String>,
    {
        Self {
            permissions: permissions.into_iter().map(Into::into).collect(),
            roles: roles.into_iter().map(Into::into).collect(),
        }
    }

    /// Read permissions and roles from the login profile.
    ///
    /// Accepts `permissions` as strings or `{name}` objects, and either a
    /// `role` value or a `roles` list in the same two shapes.
    pub fn from_user(user: &Value) -> Self {
        let mut roles = names(&user["roles"]);
        roles.extend(names(&user["role"]));
        Self {
            permissions: names(&user["permissions"]),
            roles,
        }
    }

    pub fn allows(&self, permission: Option<&str>, role: Option<&str>) -> bool {
        permission.map_or(true, |p| self.permissions.contains(p))
            && role.map_or(true, |r| self.roles.contains(r))
    }
}

fn names(value: &Value) -> HashSet<String> {
    let name_of = |v: &Value| match v {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Object(map) => map.get("name").and_then(Value::as_str).map(str::to_string),
        _ => None,
    };
    match value {
        Value::Array(items) => items.iter().filter_map(name_of).collect(),
        other => name_of(other).into_iter().collect(),
    }
}

/// The entries `access` may see. Groups whose children are all hidden and
/// that have no target of their own are dropped.
pub fn visible_for(items: &[MenuItem], access: &Access) -> Vec<MenuItem> {
    items
        .iter()
        .filter(|item| access.allows(item.permission.as_deref(), item.role.as_deref()))
        .filter_map(|item| {
            let sub_menu = visible_for(&item.sub_menu, access);
            if !item.sub_menu.is_empty() && sub_menu.is_empty() && item.to.is_none() {
                return None;
            }
            Some(MenuItem {
                sub_menu,
                ..item.clone()
            })
        })
        .collect()
}

pub fn profile_visible_for(items: &[ProfileMenuItem], access: &Access) -> Vec<ProfileMenuItem> {
    items
        .iter()
        .filter(|item| access.allows(item.permission.as_deref(), None))
        .cloned()
        .collect()
}

impl RouteRegistry {
    /// Declare every menu target, labelled with the entry's name and icon.
    pub fn from_menus(main: &[MenuItem], profile: &[ProfileMenuItem]) -> Self {
        let mut routes = Self::new();
        routes.declare_menu(main);
        for item in profile {
            routes.declare(item.to.clone(), RouteMeta::new(&item.label, &item.icon));
        }
        routes
    }

    fn declare_menu(&mut self, items: &[MenuItem]) {
        for item in items {
            if let Some(to) = &item.to {
                self.declare(to.clone(), RouteMeta::new(&item.name, &item.icon));
            }
            self.declare_menu(&item.sub_menu);
        }
    }
}

/// Every route the console declares: the login page plus the menu targets.
pub fn console_routes() -> RouteRegistry {
    let mut routes = RouteRegistry::from_menus(&main_menu(), &profile_menu());
    routes.declare(DEFAULT_LOGIN_PATH, RouteMeta::new("Login", "tabler:login"));
    routes
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn targets(items: &[MenuItem]) -> Vec<String> {
        let mut out = Vec::new();
        for item in items {
            out.extend(item.to.clone());
            out.extend(targets(&item.sub_menu));
        }
        out
    }

    #[test]
    fn test_every_target_is_protected() {
        for to in targets(&main_menu()) {
            assert!(to.starts_with("/dashboard"), "{}", to);
        }
        for item in profile_menu() {
            assert!(item.to.starts_with("/dashboard"));
        }
    }

    #[test]
    fn test_no_access_sees_public_entries_only() {
        let visible = visible_for(&main_menu(), &Access::default());
        let names: Vec<_> = visible.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["Home"]);
    }

    #[test]
    fn test_group_without_visible_children_is_dropped() {
        // Can see the Users group but none of its admin-only entries
        let access = Access::new(["view_users"], Vec::<String>::new());
        let visible = visible_for(&main_menu(), &access);
        assert!(visible.iter().all(|i| i.name != "Users"));
    }

    #[test]
    fn test_group_with_own_target_survives() {
        let access = Access::new(["view_metadata"], Vec::<String>::new());
        let visible = visible_for(&main_menu(), &access);
        let metadata = visible
            .iter()
            .find(|i| i.name == "Metadata")
            .expect("metadata visible");
        assert!(metadata.sub_menu.is_empty());
    }

    #[test]
    fn test_admin_sees_children() {
        let access = Access::new(["view_users", "create_user"], ["admin"]);
        let visible = visible_for(&main_menu(), &access);
        let users = visible.iter().find(|i| i.name == "Users").expect("users visible");
        assert_eq!(users.sub_menu.len(), 3);
    }

    #[test]
    fn test_access_from_user_profile() {
        let user = json!({
            "id": 1,
            "role": {"name": "admin"},
            "permissions": ["view_settings", {"name": "view_dhis2"}]
        });
        let access = Access::from_user(&user);
        assert!(access.allows(Some("view_settings"), None));
        assert!(access.allows(Some("view_dhis2"), Some("admin")));
        assert!(!access.allows(Some("create_user"), None));

        let profile = profile_visible_for(&profile_menu(), &access);
        assert_eq!(profile.len(), 2);
        let profile = profile_visible_for(&profile_menu(), &Access::from_user(&Value::Null));
        assert_eq!(profile.len(), 1);
    }

    #[test]
    fn test_console_routes_carry_menu_labels() {
        let routes = console_routes();
        let trail = routes.breadcrumbs("/dashboard/users/create");
        let labels: Vec<_> = trail.iter().filter_map(|b| b.meta.label.as_deref()).collect();
        assert_eq!(labels, vec!["Home", "All Users", "New User"]);

        // Main menu declares settings before the profile menu does
        assert_eq!(
            routes.resolve("/dashboard/settings").and_then(|(_, m)| m.icon.as_deref()),
            Some("tabler:settings")
        );
        assert!(routes.contains("/auth/login"));
        assert!(routes.contains("/dashboard/account"));

        // Menu routes plus the login page, nothing else
        let menus = RouteRegistry::from_menus(&main_menu(), &profile_menu());
        assert_eq!(routes.len(), menus.len() + 1);
    }

    #[test]
    fn test_from_menus_skips_group_headers() {
        let routes = RouteRegistry::from_menus(&main_menu(), &[]);
        // Applications, DHIS2 and Users headers have no target
        assert_eq!(routes.len(), 15);
        assert!(!routes.contains("/auth/login"));
        assert!(!routes.contains("/dashboard/account"));
    }
}
