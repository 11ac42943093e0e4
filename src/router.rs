//! Radix-tree routing table.
//!
//! One tree per HTTP method, O(path-length) lookup via [`matchit`]. The table
//! knows nothing about middleware: groups hand it finished endpoints.

use std::collections::HashMap;

use http::Method;
use matchit::Router as MatchitRouter;

use crate::error::{Error, Result};
use crate::lifecycle::Endpoint;

/// Path parameters captured by the route that matched a request.
///
/// For a route `/users/{id}`, a request to `/users/42` yields `id = "42"`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Params(Vec<(String, String)>);

impl Params {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.iter().find(|(k, _)| k == name).map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Params {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

#[derive(Default)]
pub(crate) struct Router {
    routes: HashMap<Method, MatchitRouter<Endpoint>>,
}

impl Router {
    /// Installs `endpoint` under `method` + `path`. A path that conflicts with
    /// an existing route for the same method is rejected.
    pub(crate) fn insert(&mut self, method: Method, path: &str, endpoint: Endpoint) -> Result<()> {
        self.routes
            .entry(method)
            .or_default()
            .insert(path, endpoint)
            .map_err(|source| Error::Route { path: path.to_owned(), source })
    }

    pub(crate) fn lookup(&self, method: &Method, path: &str) -> Option<(Endpoint, Params)> {
        let tree = self.routes.get(method)?;
        let matched = tree.at(path).ok()?;
        let params = matched.params.iter().collect();
        Some((matched.value.clone(), params))
    }
}
