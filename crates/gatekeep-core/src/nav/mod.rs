//! Navigation for the console: where the user is and where they may go.
//!
//! This module provides:
//! - `RouteGuard`: decides whether a path may be entered given the session
//! - `Router`: guarded navigation with redirects and history
//! - `RouteRegistry`: declared routes and breadcrumb trails
//! - Main and profile menus with permission filtering
//!
//! `/auth` pages are for signed-out users and `/dashboard` pages need a
//! session; everything else is public.

pub mod breadcrumbs;
pub mod guard;
pub mod menu;
pub mod router;

pub use breadcrumbs::{Breadcrumb, RouteMeta, RouteRegistry};
pub use guard::{in_area, GuardConfig, GuardDecision, RefreshMode, RouteGuard};
pub use menu::{
    console_routes, main_menu, profile_menu, profile_visible_for, visible_for, Access, MenuItem,
    ProfileMenuItem,
};
pub use router::{normalize_path, NavigationError, Router};
