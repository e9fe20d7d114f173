//! Segment trie used for route matching
//!
//! Paths are split on `/` and every non-empty segment becomes one level of the tree:
//!
//! - Literal segments (e.g. `users`) are stored in a map keyed by their exact text
//! - A parameter segment (e.g. `:id`) becomes the node's single parameter child
//! - Route descriptors live at terminal nodes, keyed by HTTP method
//!
//! Matching prefers literal children at every level and only falls back to the
//! parameter child when no literal subtree produces a match, backtracking the
//! parameter binding when the parameter subtree fails too. Lookup is O(k) in the
//! number of path segments plus backtracking, independent of the number of routes.
//!
//! Only one parameter name can occupy a given position: registering `/users/:id`
//! and then `/users/:name` is rejected with [`RouteError::ParameterConflict`].

use http::Method;
use smallvec::SmallVec;
use std::collections::HashMap;
use std::sync::Arc;

use super::core::{ParamVec, RouteDescriptor};
use super::error::RouteError;

/// Parsed pattern segment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Segment<'a> {
    Literal(&'a str),
    Param(&'a str),
}

/// Split a path into its non-empty `/` separated segments
pub(crate) fn split_path(path: &str) -> SmallVec<[&str; 8]> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}

/// Parse a registration pattern into segments, rejecting bare `:` segments
pub(crate) fn parse_pattern(pattern: &str) -> Result<SmallVec<[Segment<'_>; 8]>, RouteError> {
    split_path(pattern)
        .into_iter()
        .map(|raw| match raw.strip_prefix(':') {
            Some("") => Err(RouteError::EmptyParameterName {
                pattern: pattern.to_string(),
            }),
            Some(name) => Ok(Segment::Param(name)),
            None => Ok(Segment::Literal(raw)),
        })
        .collect()
}

#[derive(Default)]
struct TreeNode {
    /// Parameter name if this node captures a segment
    param_name: Option<Arc<str>>,
    /// Literal children keyed by their exact segment text
    children: HashMap<Box<str>, TreeNode>,
    /// At most one parameter child per node
    param_child: Option<Box<TreeNode>>,
    /// Terminal routes for the path ending at this node, per method
    routes: HashMap<Method, Arc<RouteDescriptor>>,
}

impl TreeNode {
    fn param(name: &str) -> Self {
        Self {
            param_name: Some(Arc::from(name)),
            ..Self::default()
        }
    }

    /// Walk the existing tree along `segments` and report the first parameter
    /// position whose name disagrees with the requested one.
    fn check_conflict(&self, segments: &[Segment<'_>]) -> Option<(Arc<str>, String)> {
        let (first, rest) = segments.split_first()?;
        match first {
            Segment::Literal(text) => self.children.get(*text)?.check_conflict(rest),
            Segment::Param(name) => {
                let child = self.param_child.as_ref()?;
                match &child.param_name {
                    Some(existing) if existing.as_ref() != *name => {
                        Some((Arc::clone(existing), (*name).to_string()))
                    }
                    _ => child.check_conflict(rest),
                }
            }
        }
    }

    fn insert(
        &mut self,
        segments: &[Segment<'_>],
        route: Arc<RouteDescriptor>,
    ) -> Option<Arc<RouteDescriptor>> {
        let Some((first, rest)) = segments.split_first() else {
            return self.routes.insert(route.method().clone(), route);
        };

        let child = match first {
            Segment::Literal(text) => self.children.entry(Box::from(*text)).or_default(),
            Segment::Param(name) => self
                .param_child
                .get_or_insert_with(|| Box::new(TreeNode::param(name))),
        };
        child.insert(rest, route)
    }

    fn search(
        &self,
        segments: &[&str],
        method: &Method,
        params: &mut ParamVec,
    ) -> Option<Arc<RouteDescriptor>> {
        let Some((segment, rest)) = segments.split_first() else {
            return self.routes.get(method).cloned();
        };

        if let Some(child) = self.children.get(*segment) {
            if let Some(route) = child.search(rest, method, params) {
                return Some(route);
            }
        }

        let child = self.param_child.as_ref()?;
        let name = child.param_name.as_ref()?;
        params.push((Arc::clone(name), (*segment).to_string()));
        if let Some(route) = child.search(rest, method, params) {
            return Some(route);
        }
        // Backtrack: this parameter subtree did not match
        params.pop();
        None
    }

    fn collect(&self, out: &mut Vec<Arc<RouteDescriptor>>) {
        out.extend(self.routes.values().cloned());
        for child in self.children.values() {
            child.collect(out);
        }
        if let Some(child) = &self.param_child {
            child.collect(out);
        }
    }
}

/// Route table shared by a root router and all of its groups
#[derive(Default)]
pub(crate) struct PathTree {
    root: TreeNode,
}

impl PathTree {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Insert a route at the descriptor's pattern.
    ///
    /// Returns the descriptor previously registered for the same method and pattern.
    /// The tree is left untouched when the pattern is rejected.
    pub(crate) fn insert(
        &mut self,
        route: Arc<RouteDescriptor>,
    ) -> Result<Option<Arc<RouteDescriptor>>, RouteError> {
        let pattern = route.pattern().to_string();
        let segments = parse_pattern(&pattern)?;
        if let Some((existing, requested)) = self.root.check_conflict(&segments) {
            return Err(RouteError::ParameterConflict {
                pattern: route.pattern().to_string(),
                existing: existing.to_string(),
                requested,
            });
        }
        Ok(self.root.insert(&segments, route))
    }

    /// Find the route for `method` at `path`, with the bound path parameters
    pub(crate) fn find(
        &self,
        method: &Method,
        path: &str,
    ) -> Option<(Arc<RouteDescriptor>, ParamVec)> {
        let segments = split_path(path);
        let mut params = ParamVec::new();
        let route = self.root.search(&segments, method, &mut params)?;
        Some((route, params))
    }

    /// Every registered descriptor, in no particular order
    pub(crate) fn routes(&self) -> Vec<Arc<RouteDescriptor>> {
        let mut out = Vec::new();
        self.root.collect(&mut out);
        out
    }
}
