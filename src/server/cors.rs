use http::Method;

use crate::codec::{Response, Status};

/// Fixed CORS policy: the preflight answer and the header added to every
/// other response.
#[derive(Debug, Clone)]
pub struct CorsPolicy {
    allowed_origins: Vec<String>,
    allowed_headers: Vec<String>,
    allowed_methods: Vec<Method>,
}

impl CorsPolicy {
    pub fn new(
        allowed_origins: Vec<String>,
        allowed_headers: Vec<String>,
        allowed_methods: Vec<Method>,
    ) -> Self {
        Self {
            allowed_origins,
            allowed_headers,
            allowed_methods,
        }
    }

    fn origins(&self) -> String {
        self.allowed_origins.join(", ")
    }

    fn methods(&self) -> String {
        self.allowed_methods
            .iter()
            .map(Method::as_str)
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// 204 answer to an OPTIONS request. Never reaches a handler.
    pub fn preflight(&self) -> Response {
        Response::empty(Status::NoContent)
            .with_header("Access-Control-Allow-Origin", self.origins())
            .with_header("Access-Control-Allow-Methods", self.methods())
            .with_header("Access-Control-Allow-Headers", self.allowed_headers.join(", "))
    }

    /// Add the allow-origin header to a normal response.
    pub fn decorate(&self, response: Response) -> Response {
        response.with_header("Access-Control-Allow-Origin", self.origins())
    }
}

/// Wildcard origin, all five served methods, `Content-Type` as the only
/// allowed request header.
impl Default for CorsPolicy {
    fn default() -> Self {
        Self {
            allowed_origins: vec!["*".into()],
            allowed_headers: vec!["Content-Type".into()],
            allowed_methods: vec![
                Method::GET,
                Method::POST,
                Method::PUT,
                Method::DELETE,
                Method::OPTIONS,
            ],
        }
    }
}
