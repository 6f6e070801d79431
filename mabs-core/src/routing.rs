// Routing system for HTTP requests

use crate::logging::{debug, trace};
use crate::route::{Route, normalize_path};
use crate::{Error, HttpMethod, HttpRequest, HttpResponse, Result};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Default)]
struct RouteTable {
    by_method: HashMap<HttpMethod, Vec<Arc<Route>>>,
    by_name: HashMap<String, Arc<Route>>,
}

/// Router for managing routes and dispatching requests.
///
/// Routes are indexed per HTTP method and tried in registration order;
/// the first route whose pattern matches wins.
pub struct Router {
    table: RwLock<RouteTable>,
    next_id: AtomicU64,
}

impl Router {
    pub fn new() -> Self {
        Self {
            table: RwLock::new(RouteTable::default()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Register `route` under `methods`, or under every method when empty.
    ///
    /// A route without a name gets the next free `route_<n>` from a counter
    /// local to this router. Mounting a name again replaces the earlier route
    /// in place.
    pub fn mount(&self, mut route: Route, methods: &[HttpMethod]) -> &Self {
        let methods: &[HttpMethod] = if methods.is_empty() {
            &HttpMethod::ALL
        } else {
            methods
        };

        let mut table = self.table.write();
        let name = match route.name() {
            Some(name) => name.to_string(),
            None => {
                // Skip counter values already taken by explicit names.
                let name = loop {
                    let id = self.next_id.fetch_add(1, Ordering::SeqCst);
                    let candidate = format!("route_{}", id);
                    if !table.by_name.contains_key(&candidate) {
                        break candidate;
                    }
                };
                route.name = Some(name.clone());
                name
            }
        };
        let route = Arc::new(route);

        if table.by_name.insert(name.clone(), Arc::clone(&route)).is_some() {
            // Drop the old route from methods it is no longer mounted under.
            for (method, routes) in table.by_method.iter_mut() {
                if !methods.contains(method) {
                    routes.retain(|existing| existing.name() != Some(name.as_str()));
                }
            }
        }

        for method in methods {
            let routes = table.by_method.entry(*method).or_default();
            match routes
                .iter_mut()
                .find(|existing| existing.name() == Some(name.as_str()))
            {
                Some(existing) => *existing = Arc::clone(&route),
                None => routes.push(Arc::clone(&route)),
            }
        }

        debug!(
            route = %name,
            path = route.path(),
            methods = ?methods,
            "Route mounted"
        );
        self
    }

    /// Route the request and run the matched handler.
    ///
    /// Unknown methods and unmatched paths produce a 404 response; errors
    /// raised by the handler are returned to the caller.
    pub fn handle(&self, request: &mut HttpRequest) -> Result<HttpResponse> {
        let path = match request.path.split_once('?') {
            Some((path, query)) => {
                let path = path.to_string();
                request.query_params.extend(parse_query_string(query));
                path
            }
            None => request.path.clone(),
        };

        let Some(method) = HttpMethod::from_str(&request.method) else {
            debug!(method = %request.method, "Unsupported HTTP method");
            return Ok(HttpResponse::not_found());
        };

        let candidates = match self.table.read().by_method.get(&method) {
            Some(routes) => routes.clone(),
            None => {
                debug!(%method, "No routes registered for method");
                return Ok(HttpResponse::not_found());
            }
        };

        let normalized = normalize_path(&path);
        for route in candidates {
            trace!(route = route.name(), pattern = route.path(), "Trying route");
            if let Some(params) = route.match_normalized(&normalized) {
                debug!(route = route.name(), %method, path = %path, "Route matched");
                for (name, value) in params.iter() {
                    if let Some(value) = value {
                        request.query_params.insert(name.to_string(), value.to_string());
                        request.path_params.insert(name.to_string(), value.to_string());
                    }
                }
                request.route_params = params;
                return route.handler().invoke(request);
            }
        }

        debug!(%method, path = %path, "No route matched");
        Ok(HttpResponse::not_found())
    }

    /// Build a path for the named route.
    ///
    /// Both `{key}` and `{key?}` are substituted. Placeholders without a
    /// supplied value are left in the output untouched.
    pub fn generate_url<I, K, V>(&self, name: &str, params: I) -> Result<String>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let route = self
            .route(name)
            .ok_or_else(|| Error::RouteNotFound(name.to_string()))?;

        let mut path = route.path().to_string();
        for (key, value) in params {
            let (key, value) = (key.as_ref(), value.as_ref());
            path = path
                .replace(&format!("{{{}}}", key), value)
                .replace(&format!("{{{}?}}", key), value);
        }
        Ok(path)
    }

    /// Look up a route by name.
    pub fn route(&self, name: &str) -> Option<Arc<Route>> {
        self.table.read().by_name.get(name).cloned()
    }

    /// Routes mounted for `method`, in match order.
    pub fn routes_for(&self, method: HttpMethod) -> Vec<Arc<Route>> {
        self.table
            .read()
            .by_method
            .get(&method)
            .cloned()
            .unwrap_or_default()
    }

    /// Number of distinct named routes.
    pub fn len(&self) -> usize {
        self.table.read().by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.read().by_name.is_empty()
    }
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Router {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let table = self.table.read();
        let mut names: Vec<&String> = table.by_name.keys().collect();
        names.sort();
        f.debug_struct("Router").field("routes", &names).finish()
    }
}

/// Parse a query string into a map of parameters
fn parse_query_string(query: &str) -> HashMap<String, String> {
    query
        .split('&')
        .filter(|part| !part.is_empty())
        .filter_map(|part| {
            let mut split = part.splitn(2, '=');
            let key = decode(split.next()?);
            let value = decode(split.next().unwrap_or(""));
            Some((key, value))
        })
        .collect()
}

fn decode(raw: &str) -> String {
    let raw = raw.replace('+', " ");
    urlencoding::decode(&raw)
        .map(|decoded| decoded.into_owned())
        .unwrap_or(raw)
}
