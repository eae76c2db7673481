//! Route table and path matching.

use crate::http::{
    request::Request,
    response::Response,
    types::{Method, Methods, StatusCode},
};
use std::fmt;

/// Code that turns a [`Request`] into a [`Response`].
///
/// Implemented for every `Fn(&Request) -> Response` closure, so most routes
/// never name this trait. Handlers run on the single worker, one at a time;
/// a slow handler delays every queued connection.
///
/// # Examples
/// ```
/// use simplehttp::{Handler, Request, Response, StatusCode};
/// use std::sync::atomic::{AtomicBool, Ordering};
///
/// struct Lamp {
///     on: AtomicBool,
/// }
///
/// impl Handler for Lamp {
///     fn handle(&self, _: &Request) -> Response {
///         let on = !self.on.fetch_xor(true, Ordering::Relaxed);
///         Response::text(StatusCode::Ok, if on { "on" } else { "off" })
///     }
/// }
/// ```
pub trait Handler: Send + Sync + 'static {
    /// Answers one request. Path parameters captured by `?` are available
    /// through [`Request::path_params`].
    fn handle(&self, request: &Request) -> Response;
}

impl<F> Handler for F
where
    F: Fn(&Request) -> Response + Send + Sync + 'static,
{
    #[inline]
    fn handle(&self, request: &Request) -> Response {
        self(request)
    }
}

struct WithContext<T, F> {
    context: T,
    f: F,
}

impl<T, F> Handler for WithContext<T, F>
where
    T: Send + Sync + 'static,
    F: Fn(&Request, &T) -> Response + Send + Sync + 'static,
{
    #[inline]
    fn handle(&self, request: &Request) -> Response {
        (self.f)(request, &self.context)
    }
}

/// One entry of the route table: accepted methods, a path pattern, a handler.
///
/// # Patterns
/// - literal bytes match themselves exactly (case-sensitive, no decoding);
/// - `?` matches one non-empty path segment, up to the next `/` or the end,
///   and captures it as a path parameter (raw, not percent-decoded);
/// - a final `*` matches the remainder of the path, which may be empty.
///
/// # Examples
/// ```
/// use simplehttp::{Method, Request, Response, Route, StatusCode};
///
/// let posts = Route::get("/users/?/posts/?", |req: &Request| {
///     let [user, post] = req.path_params() else {
///         unreachable!()
///     };
///     Response::text(StatusCode::Ok, format!("{user}:{post}"))
/// });
///
/// let files = Route::new(Method::Get | Method::Head, "/static/*", |_: &Request| {
///     Response::empty(StatusCode::NotFound)
/// });
/// ```
///
/// # Panics
/// Panics when `*` appears anywhere but at the end of the pattern.
pub struct Route {
    methods: Methods,
    pattern: Box<str>,
    handler: Box<dyn Handler>,
}

impl Route {
    /// Creates a route answering `methods` on `pattern`.
    #[track_caller]
    pub fn new<M, H>(methods: M, pattern: &str, handler: H) -> Self
    where
        M: Into<Methods>,
        H: Handler,
    {
        Self::boxed(methods.into(), pattern, Box::new(handler))
    }

    /// Creates a route whose handler also receives `context`.
    ///
    /// ```
    /// use simplehttp::{Method, Request, Response, Route, StatusCode};
    ///
    /// let greeting = String::from("hello");
    /// let route = Route::with_context(Method::Get, "/", greeting, |_: &Request, text: &String| {
    ///     Response::text(StatusCode::Ok, text.clone())
    /// });
    /// ```
    #[track_caller]
    pub fn with_context<M, T, F>(methods: M, pattern: &str, context: T, f: F) -> Self
    where
        M: Into<Methods>,
        T: Send + Sync + 'static,
        F: Fn(&Request, &T) -> Response + Send + Sync + 'static,
    {
        Self::boxed(methods.into(), pattern, Box::new(WithContext { context, f }))
    }

    #[track_caller]
    fn boxed(methods: Methods, pattern: &str, handler: Box<dyn Handler>) -> Self {
        if let Some(pos) = pattern.find('*') {
            assert!(
                pos == pattern.len() - 1,
                "Wildcard `*` is only allowed at the end of a route pattern"
            );
        }

        Self {
            methods,
            pattern: pattern.into(),
            handler,
        }
    }

    #[inline]
    pub fn methods(&self) -> Methods {
        self.methods
    }

    #[inline]
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    #[inline]
    pub fn handler(&self) -> &dyn Handler {
        self.handler.as_ref()
    }
}

macro_rules! method_shortcuts {
    ($($fn_name:ident => $method:ident;)*) => {
        impl Route { $(
            #[doc = concat!("Route answering only `", stringify!($method), "` requests.")]
            #[inline]
            #[track_caller]
            pub fn $fn_name<H: Handler>(pattern: &str, handler: H) -> Self {
                Self::new(Methods::$method, pattern, handler)
            }
        )* }
    };
}

method_shortcuts! {
    get => GET;
    post => POST;
    put => PUT;
    patch => PATCH;
    delete => DELETE;
    options => OPTIONS;
    head => HEAD;
}

impl fmt::Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route")
            .field("methods", &self.methods)
            .field("pattern", &self.pattern)
            .finish_non_exhaustive()
    }
}

/// A matched route and the path segments captured by its `?`s.
#[derive(Debug)]
pub struct Resolved<'a> {
    pub route: &'a Route,
    pub params: Vec<String>,
}

/// Ordered route table.
///
/// Routes are tried in registration order; the first one whose pattern
/// matches the path *and* whose methods contain the request method wins. A
/// route with a matching pattern but the wrong method is skipped, so an
/// earlier `GET /x` and a later `POST /x` can coexist.
#[derive(Debug, Default)]
pub struct Router {
    routes: Vec<Route>,
    append_slashes: bool,
}

impl Router {
    /// Creates a router. With `append_slashes`, one trailing `/` is ignored
    /// on every path except `/` itself.
    pub fn new<I: IntoIterator<Item = Route>>(routes: I, append_slashes: bool) -> Self {
        Self {
            routes: routes.into_iter().collect(),
            append_slashes,
        }
    }

    #[inline]
    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    /// Finds the route for `path` and `method`.
    pub fn resolve(&self, path: &str, method: Method) -> Option<Resolved<'_>> {
        let path = match self.append_slashes {
            true if path.len() > 1 => path.strip_suffix('/').unwrap_or(path),
            _ => path,
        };

        self.routes
            .iter()
            .filter(|route| route.methods.contains(method))
            .find_map(|route| {
                match_pattern(route.pattern.as_bytes(), path.as_bytes())
                    .map(|params| Resolved { route, params })
            })
    }

    /// Runs the handler of the matching route, or answers `404 Not Found`.
    pub fn dispatch(&self, mut request: Request) -> Response {
        match self.resolve(request.path(), request.method()) {
            Some(Resolved { route, params }) => {
                request.path_params = params;
                route.handler.handle(&request)
            }
            None => Response::empty(StatusCode::NotFound),
        }
    }
}

/// Matches `path` against `pattern`, returning the captured segments.
fn match_pattern(pattern: &[u8], path: &[u8]) -> Option<Vec<String>> {
    let mut params = Vec::new();
    let (mut p, mut i) = (0, 0);

    while p < pattern.len() {
        match pattern[p] {
            b'*' => return Some(params),
            b'?' => {
                let len = path[i..].iter().position(|&b| b == b'/').unwrap_or(path.len() - i);
                if len == 0 {
                    return None;
                }
                // Paths reaching the router are valid UTF-8 and `/` is ASCII.
                params.push(String::from_utf8_lossy(&path[i..i + len]).into_owned());
                i += len;
            }
            byte => {
                if path.get(i) != Some(&byte) {
                    return None;
                }
                i += 1;
            }
        }
        p += 1;
    }

    (i == path.len()).then_some(params)
}
