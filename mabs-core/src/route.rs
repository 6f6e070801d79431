// Route definitions and path pattern compilation

use crate::http::{HttpRequest, HttpResponse, IntoResponse};
use crate::{Error, Result};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use std::fmt;
use std::sync::Arc;

/// `{name?}` is tried before `{name}` so optional tokens are never read as required ones.
static PLACEHOLDER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\{([A-Za-z0-9_]+)\?\}|\{([A-Za-z0-9_]+)\}").expect("placeholder pattern is valid")
});

const REQUIRED_CAPTURE: &str = "([A-Za-z0-9_]+)";
const OPTIONAL_CAPTURE: &str = "([A-Za-z0-9_]*)";

/// A route handler function type
pub type HandlerFn = Arc<dyn Fn(&HttpRequest) -> Result<HttpResponse> + Send + Sync>;

/// What a route does once matched.
#[derive(Clone)]
pub enum RouteHandler {
    /// Invoked with the request; parameters are available on it.
    Callable(HandlerFn),
    /// Emitted as-is as the body of a 200 response.
    Static(String),
}

impl RouteHandler {
    pub fn from_fn<F, R>(handler: F) -> Self
    where
        F: Fn(&HttpRequest) -> R + Send + Sync + 'static,
        R: IntoResponse,
    {
        RouteHandler::Callable(Arc::new(move |request: &HttpRequest| {
            handler(request).into_response()
        }))
    }

    pub fn invoke(&self, request: &HttpRequest) -> Result<HttpResponse> {
        match self {
            RouteHandler::Callable(handler) => handler(request),
            RouteHandler::Static(body) => Ok(HttpResponse::html(body.clone())),
        }
    }
}

impl fmt::Debug for RouteHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RouteHandler::Callable(_) => f.write_str("Callable(..)"),
            RouteHandler::Static(body) => f.debug_tuple("Static").field(body).finish(),
        }
    }
}

/// A `{name}` or `{name?}` segment of a route path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placeholder {
    pub name: String,
    pub optional: bool,
}

/// Parameters extracted from a matched path, in declaration order.
///
/// An optional placeholder that matched nothing holds `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteParams {
    entries: Vec<(String, Option<String>)>,
}

impl RouteParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, name: impl Into<String>, value: Option<String>) {
        self.entries.push((name.into(), value));
    }

    /// Value by placeholder name.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(key, _)| key == name)
            .and_then(|(_, value)| value.as_deref())
    }

    /// Value by declaration position.
    pub fn positional(&self, index: usize) -> Option<&str> {
        self.entries.get(index).and_then(|(_, value)| value.as_deref())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|(key, _)| key == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&str>)> {
        self.entries
            .iter()
            .map(|(key, value)| (key.as_str(), value.as_deref()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Strip one leading slash and make sure there is exactly one trailing slash.
pub fn normalize_path(path: &str) -> String {
    let trimmed = path.strip_prefix('/').unwrap_or(path);
    if trimmed.ends_with('/') {
        trimmed.to_string()
    } else {
        format!("{}/", trimmed)
    }
}

/// A path pattern bound to a handler.
#[derive(Debug, Clone)]
pub struct Route {
    path: String,
    normalized: String,
    pub(crate) name: Option<String>,
    handler: RouteHandler,
    placeholders: Vec<Placeholder>,
    matcher: Regex,
}

impl Route {
    /// Create a route whose handler is a closure.
    pub fn new<F, R>(path: impl Into<String>, handler: F) -> Result<Self>
    where
        F: Fn(&HttpRequest) -> R + Send + Sync + 'static,
        R: IntoResponse,
    {
        Self::with_handler(path, RouteHandler::from_fn(handler))
    }

    /// Create a route that always answers with a fixed body.
    pub fn fixed(path: impl Into<String>, body: impl Into<String>) -> Result<Self> {
        Self::with_handler(path, RouteHandler::Static(body.into()))
    }

    pub fn with_handler(path: impl Into<String>, handler: RouteHandler) -> Result<Self> {
        let path = path.into();
        let normalized = normalize_path(&path);
        let (matcher, placeholders) = compile(&path, &normalized)?;
        Ok(Self {
            path,
            normalized,
            name: None,
            handler,
            placeholders,
            matcher,
        })
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Explicit name, or the one assigned when the route was mounted.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn handler(&self) -> &RouteHandler {
        &self.handler
    }

    pub fn placeholders(&self) -> &[Placeholder] {
        &self.placeholders
    }

    /// The compiled, anchored matcher for the normalized path.
    pub fn to_matcher(&self) -> &Regex {
        &self.matcher
    }

    /// Match an already normalized path.
    ///
    /// The exact string comparison runs first and yields no parameters.
    pub fn match_normalized(&self, path: &str) -> Option<RouteParams> {
        if path == self.normalized {
            return Some(RouteParams::new());
        }
        self.matcher
            .captures(path)
            .map(|captures| self.extract_parameters(&captures))
    }

    /// Map placeholder names, left to right, to their captured values.
    pub fn extract_parameters(&self, captures: &Captures<'_>) -> RouteParams {
        let mut params = RouteParams::new();
        for (index, placeholder) in self.placeholders.iter().enumerate() {
            let value = captures
                .get(index + 1)
                .map(|capture| capture.as_str().to_string());
            params.push(placeholder.name.clone(), value);
        }
        params
    }
}

fn compile(path: &str, normalized: &str) -> Result<(Regex, Vec<Placeholder>)> {
    let mut pattern = String::from("^");
    let mut placeholders = Vec::new();
    let mut last = 0;

    for captures in PLACEHOLDER.captures_iter(normalized) {
        let Some(token) = captures.get(0) else {
            continue;
        };
        let literal = &normalized[last..token.start()];

        if let Some(name) = captures.get(1) {
            // The slash before an optional segment is optional too.
            match literal.strip_suffix('/') {
                Some(prefix) => {
                    pattern.push_str(&regex::escape(prefix));
                    pattern.push_str("(?:/");
                    pattern.push_str(OPTIONAL_CAPTURE);
                    pattern.push_str(")?");
                }
                None => {
                    pattern.push_str(&regex::escape(literal));
                    pattern.push_str(OPTIONAL_CAPTURE);
                }
            }
            placeholders.push(Placeholder {
                name: name.as_str().to_string(),
                optional: true,
            });
        } else if let Some(name) = captures.get(2) {
            pattern.push_str(&regex::escape(literal));
            pattern.push_str(REQUIRED_CAPTURE);
            placeholders.push(Placeholder {
                name: name.as_str().to_string(),
                optional: false,
            });
        }

        last = token.end();
    }

    pattern.push_str(&regex::escape(&normalized[last..]));
    pattern.push('$');

    let matcher = Regex::new(&pattern).map_err(|e| Error::InvalidRoute {
        path: path.to_string(),
        reason: e.to_string(),
    })?;

    Ok((matcher, placeholders))
}
