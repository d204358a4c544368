//! Declared routes and the breadcrumb trail derived from them.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct RouteMeta {
    pub label: Option<String>,
    pub icon: Option<String>,
}

impl RouteMeta {
    pub fn new(label: impl Into<String>, icon: impl Into<String>) -> Self {
        Self {
            label: Some(label.into()),
            icon: Some(icon.into()),
        }
    }

    pub fn label(label: impl Into<String>) -> Self {
        Self {
            label: Some(label.into()),
            icon: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct Breadcrumb {
    pub path: String,
    pub meta: RouteMeta,
}

/// Routes the console declares, in declaration order.
///
/// A segment starting with `:` matches any single segment, so
/// `/dashboard/users/:id` covers `/dashboard/users/42`.
#[derive(Debug, Clone, Default)]
pub struct RouteRegistry {
    routes: Vec<(String, RouteMeta)>,
}

impl RouteRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a route. Re-declaring a path keeps the first metadata.
    pub fn declare(&mut self, path: impl Into<String>, meta: RouteMeta) -> &mut Self {
        let path = path.into();
        if !self.routes.iter().any(|(p, _)| *p == path) {
            self.routes.push((path, meta));
        }
        self
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// The declared route matching `path`, preferring an exact match.
    pub fn resolve(&self, path: &str) -> Option<(&str, &RouteMeta)> {
        self.routes
            .iter()
            .find(|(p, _)| p == path)
            .or_else(|| self.routes.iter().find(|(p, _)| pattern_matches(p, path)))
            .map(|(p, meta)| (p.as_str(), meta))
    }

    pub fn contains(&self, path: &str) -> bool {
        self.resolve(path).is_some()
    }

    /// Trail for `path`: every declared ancestor prefix, then the page itself.
    pub fn breadcrumbs(&self, path: &str) -> Vec<Breadcrumb> {
        let mut trail = Vec::new();
        let mut seen = HashSet::new();
        let mut prefix = String::new();

        for segment in path.split('/').filter(|s| !s.is_empty()) {
            prefix.push('/');
            prefix.push_str(segment);

            if let Some((_, meta)) = self.resolve(&prefix) {
                if seen.insert(prefix.clone()) {
                    trail.push(Breadcrumb {
                        path: prefix.clone(),
                        meta: meta.clone(),
                    });
                }
            }
        }

        if !seen.contains(path) {
            trail.push(Breadcrumb {
                path: path.to_string(),
                meta: self
                    .resolve(path)
                    .map(|(_, meta)| meta.clone())
                    .unwrap_or_default(),
            });
        }

        trail
    }
}

fn pattern_matches(pattern: &str, path: &str) -> bool {
    if !pattern.contains("/:") {
        return false;
    }
    let mut pattern_segments = pattern.split('/');
    let mut path_segments = path.split('/');
    loop {
        match (pattern_segments.next(), path_segments.next()) {
            (None, None) => return true,
            (Some(p), Some(s)) if p.starts_with(':') && !s.is_empty() => continue,
            (Some(p), Some(s)) if p == s => continue,
            _ => return false,
        }
    }
}
