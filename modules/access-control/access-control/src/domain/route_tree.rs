//! Static, hierarchical table of console screens.
//!
//! Nodes are declared once (see [`console_routes`](super::catalogue::console_routes))
//! and frozen into a [`RouteTree`]. Leaves are indexed by a `matchit` router so
//! that templated paths (`/orders/:orderId`) resolve with typed parameter
//! extraction; literal segments win over parameters at the same depth.

use std::collections::HashSet;
use std::fmt;

use access_control_sdk::{Capability, PermissionAction, PermissionKey};

use super::error::RouteTreeError;

/// One segment of a route path template.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Segment {
    Literal(String),
    /// `:name` in the declared path.
    Param(String),
}

/// Parsed route path template such as `/orders/order-details/:orderId`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RoutePath {
    canonical: String,
    segments: Vec<Segment>,
}

impl RoutePath {
    /// Parse a declared path. A trailing slash is ignored.
    ///
    /// # Errors
    ///
    /// Returns `InvalidPath` if the path is relative, a parameter is unnamed
    /// or repeated, or a literal segment contains matcher metacharacters.
    pub fn parse(raw: &str) -> Result<Self, RouteTreeError> {
        let trimmed = raw.trim();
        if !trimmed.starts_with('/') {
            return Err(RouteTreeError::invalid_path(raw, "must start with '/'"));
        }

        let mut segments = Vec::new();
        let mut params = HashSet::new();
        for part in trimmed.split('/').filter(|s| !s.is_empty()) {
            if let Some(name) = part.strip_prefix(':') {
                if name.is_empty() || !name.chars().all(|c| c.is_alphanumeric() || c == '_') {
                    return Err(RouteTreeError::invalid_path(
                        raw,
                        format!("parameter segment '{part}' needs an identifier name"),
                    ));
                }
                if !params.insert(name) {
                    return Err(RouteTreeError::invalid_path(
                        raw,
                        format!("parameter '{name}' appears twice"),
                    ));
                }
                segments.push(Segment::Param(name.to_owned()));
            } else {
                if part.contains(['{', '}', '*']) {
                    return Err(RouteTreeError::invalid_path(
                        raw,
                        format!("segment '{part}' contains reserved characters"),
                    ));
                }
                segments.push(Segment::Literal(part.to_owned()));
            }
        }

        let canonical = render(&segments, |name| format!(":{name}"));
        Ok(Self {
            canonical,
            segments,
        })
    }

    /// Path as declared, normalised (`/a/:id`).
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.canonical
    }

    #[must_use]
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    #[must_use]
    pub fn depth(&self) -> usize {
        self.segments.len()
    }

    #[must_use]
    pub fn is_templated(&self) -> bool {
        self.segments
            .iter()
            .any(|s| matches!(s, Segment::Param(_)))
    }

    /// Literal segments, in order.
    pub fn literals(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|s| match s {
            Segment::Literal(lit) => Some(lit.as_str()),
            Segment::Param(_) => None,
        })
    }

    /// The same path in `matchit` syntax (`/a/{id}`).
    #[must_use]
    pub fn matcher_pattern(&self) -> String {
        render(&self.segments, |name| format!("{{{name}}}"))
    }
}

fn render(segments: &[Segment], param: impl Fn(&str) -> String) -> String {
    if segments.is_empty() {
        return "/".to_owned();
    }
    let mut out = String::new();
    for segment in segments {
        out.push('/');
        match segment {
            Segment::Literal(lit) => out.push_str(lit),
            Segment::Param(name) => out.push_str(&param(name)),
        }
    }
    out
}

impl fmt::Display for RoutePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.canonical)
    }
}

/// What a screen requires beyond an authenticated session.
///
/// A requirement without a module is open to any authenticated actor
/// (unless it names a capability).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteRequirement {
    pub module: Option<String>,
    pub sub_module: Option<String>,
    pub action: PermissionAction,
    pub capability: Option<Capability>,
}

impl RouteRequirement {
    #[must_use]
    pub fn module(module: &str, sub_module: Option<&str>, action: PermissionAction) -> Self {
        Self {
            module: Some(module.to_owned()),
            sub_module: sub_module.map(str::to_owned),
            action,
            capability: None,
        }
    }

    #[must_use]
    pub fn is_open(&self) -> bool {
        self.module.is_none() && self.capability.is_none()
    }

    /// The same requirement with the action replaced by `can_view`.
    #[must_use]
    pub fn viewing(&self) -> Self {
        Self {
            action: PermissionAction::CanView,
            ..self.clone()
        }
    }

    #[must_use]
    pub fn key(&self) -> Option<PermissionKey> {
        self.module
            .as_deref()
            .map(|m| PermissionKey::new(m, self.sub_module.as_deref()))
    }

    /// Case-insensitive module comparison.
    #[must_use]
    pub fn is_module(&self, module: &str) -> bool {
        self.module
            .as_deref()
            .is_some_and(|m| m.trim().eq_ignore_ascii_case(module.trim()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteKind {
    /// Sidebar section heading.
    Title,
    Leaf {
        route: RoutePath,
    },
    Branch {
        route: Option<RoutePath>,
        children: Vec<RouteNode>,
    },
}

/// A declared console screen, section title or collapsible group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteNode {
    pub key: String,
    pub name: String,
    pub kind: RouteKind,
    pub requirement: RouteRequirement,
    pub protected: bool,
    pub visible_in_sidebar: bool,
    /// Identifier of the view rendered for a leaf.
    pub view: Option<String>,
}

impl RouteNode {
    fn with_kind(key: &str, name: &str, kind: RouteKind) -> Self {
        Self {
            key: key.to_owned(),
            name: name.to_owned(),
            kind,
            requirement: RouteRequirement::default(),
            protected: false,
            visible_in_sidebar: true,
            view: None,
        }
    }

    #[must_use]
    pub fn title(key: &str, title: &str) -> Self {
        Self::with_kind(key, title, RouteKind::Title)
    }

    /// # Errors
    ///
    /// Returns `InvalidPath` if `route` does not parse.
    pub fn leaf(key: &str, name: &str, route: &str) -> Result<Self, RouteTreeError> {
        let route = RoutePath::parse(route)?;
        Ok(Self::with_kind(key, name, RouteKind::Leaf { route }))
    }

    /// # Errors
    ///
    /// Returns `InvalidPath` if `route` does not parse.
    pub fn branch(
        key: &str,
        name: &str,
        route: Option<&str>,
        children: Vec<RouteNode>,
    ) -> Result<Self, RouteTreeError> {
        let route = route.map(RoutePath::parse).transpose()?;
        Ok(Self::with_kind(
            key,
            name,
            RouteKind::Branch { route, children },
        ))
    }

    #[must_use]
    pub fn requires(
        mut self,
        module: &str,
        sub_module: Option<&str>,
        action: PermissionAction,
    ) -> Self {
        let capability = self.requirement.capability;
        self.requirement = RouteRequirement {
            capability,
            ..RouteRequirement::module(module, sub_module, action)
        };
        self
    }

    #[must_use]
    pub fn capability(mut self, capability: Capability) -> Self {
        self.requirement.capability = Some(capability);
        self
    }

    #[must_use]
    pub fn protected(mut self) -> Self {
        self.protected = true;
        self
    }

    #[must_use]
    pub fn hidden(mut self) -> Self {
        self.visible_in_sidebar = false;
        self
    }

    #[must_use]
    pub fn view(mut self, view: &str) -> Self {
        self.view = Some(view.to_owned());
        self
    }

    #[must_use]
    pub fn route(&self) -> Option<&RoutePath> {
        match &self.kind {
            RouteKind::Leaf { route } => Some(route),
            RouteKind::Branch { route, .. } => route.as_ref(),
            RouteKind::Title => None,
        }
    }

    #[must_use]
    pub fn children(&self) -> &[RouteNode] {
        match &self.kind {
            RouteKind::Branch { children, .. } => children,
            RouteKind::Title | RouteKind::Leaf { .. } => &[],
        }
    }
}

/// A navigable leaf, flattened out of the tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteEntry {
    pub key: String,
    pub name: String,
    pub path: RoutePath,
    pub requirement: RouteRequirement,
    pub protected: bool,
    pub visible_in_sidebar: bool,
    pub view: Option<String>,
}

/// A concrete path resolved to its leaf.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedRoute<'a> {
    pub entry: &'a RouteEntry,
    pub params: Vec<(String, String)>,
}

impl ResolvedRoute<'_> {
    #[must_use]
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

/// Immutable route table with a path matcher over its leaves.
pub struct RouteTree {
    nodes: Vec<RouteNode>,
    entries: Vec<RouteEntry>,
    paths: Vec<RoutePath>,
    matcher: matchit::Router<usize>,
}

impl RouteTree {
    /// Validate `nodes` and index their leaves.
    ///
    /// When two leaves declare the same path the first one wins; the later
    /// one stays in [`entries`](Self::entries) but never resolves.
    ///
    /// # Errors
    ///
    /// - `DuplicateKey` if two nodes share a key
    /// - `InvalidNode` if a node names a sub-module without a module
    /// - `Matcher` if the router rejects a path
    pub fn new(nodes: Vec<RouteNode>) -> Result<Self, RouteTreeError> {
        let mut keys = HashSet::new();
        let mut entries = Vec::new();
        let mut paths = Vec::new();
        collect(&nodes, &mut keys, &mut entries, &mut paths)?;

        let mut matcher = matchit::Router::new();
        for (idx, entry) in entries.iter().enumerate() {
            let pattern = entry.path.matcher_pattern();
            match matcher.insert(pattern.as_str(), idx) {
                Ok(()) => {}
                Err(matchit::InsertError::Conflict { with }) => {
                    tracing::warn!(
                        key = %entry.key,
                        path = %entry.path,
                        shadowed_by = %with,
                        "Route path already declared; later leaf is unreachable"
                    );
                }
                Err(e) => {
                    return Err(RouteTreeError::Matcher {
                        path: entry.path.to_string(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        tracing::debug!(
            nodes = keys.len(),
            leaves = entries.len(),
            "Route tree built"
        );

        Ok(Self {
            nodes,
            entries,
            paths,
            matcher,
        })
    }

    /// The built-in console route table.
    ///
    /// # Errors
    ///
    /// Propagates any validation error of the catalogue.
    pub fn console() -> Result<Self, RouteTreeError> {
        Self::new(super::catalogue::console_routes()?)
    }

    /// Top-level nodes in declaration order.
    #[must_use]
    pub fn nodes(&self) -> &[RouteNode] {
        &self.nodes
    }

    /// Every leaf, depth-first in declaration order.
    #[must_use]
    pub fn entries(&self) -> &[RouteEntry] {
        &self.entries
    }

    /// Leaves accepted by `predicate`, in declaration order.
    #[must_use]
    pub fn flatten<P>(&self, mut predicate: P) -> Vec<&RouteEntry>
    where
        P: FnMut(&RouteEntry) -> bool,
    {
        self.entries.iter().filter(|e| predicate(e)).collect()
    }

    /// Every declared path, branches included, in declaration order.
    #[must_use]
    pub fn declared_paths(&self) -> &[RoutePath] {
        &self.paths
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&RouteEntry> {
        self.entries.iter().find(|e| e.key == key)
    }

    /// Resolve a concrete path (query and fragment ignored) to its leaf.
    #[must_use]
    pub fn resolve(&self, path: &str) -> Option<ResolvedRoute<'_>> {
        let normalized = normalize_path(path);
        let matched = self.matcher.at(&normalized).ok()?;
        let entry = self.entries.get(*matched.value)?;
        let params = matched
            .params
            .iter()
            .map(|(k, v)| (k.to_owned(), v.to_owned()))
            .collect();
        Some(ResolvedRoute { entry, params })
    }
}

impl fmt::Debug for RouteTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteTree")
            .field("nodes", &self.nodes.len())
            .field("leaves", &self.entries.len())
            .finish_non_exhaustive()
    }
}

fn collect(
    nodes: &[RouteNode],
    keys: &mut HashSet<String>,
    entries: &mut Vec<RouteEntry>,
    paths: &mut Vec<RoutePath>,
) -> Result<(), RouteTreeError> {
    for node in nodes {
        if !keys.insert(node.key.clone()) {
            return Err(RouteTreeError::DuplicateKey {
                key: node.key.clone(),
            });
        }
        if node.requirement.sub_module.is_some() && node.requirement.module.is_none() {
            return Err(RouteTreeError::invalid_node(
                &node.key,
                "sub-module declared without a module",
            ));
        }
        if let Some(path) = node.route() {
            paths.push(path.clone());
        }
        match &node.kind {
            RouteKind::Title => {}
            RouteKind::Leaf { route } => entries.push(RouteEntry {
                key: node.key.clone(),
                name: node.name.clone(),
                path: route.clone(),
                requirement: node.requirement.clone(),
                protected: node.protected,
                visible_in_sidebar: node.visible_in_sidebar,
                view: node.view.clone(),
            }),
            RouteKind::Branch { children, .. } => collect(children, keys, entries, paths)?,
        }
    }
    Ok(())
}

fn normalize_path(path: &str) -> String {
    let path = path.split(['?', '#']).next().unwrap_or_default().trim();
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        return "/".to_owned();
    }
    if trimmed.starts_with('/') {
        trimmed.to_owned()
    } else {
        format!("/{trimmed}")
    }
}
