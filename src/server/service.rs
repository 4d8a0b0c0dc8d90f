use std::sync::Arc;

use http::Method;
use tracing::{error, info};

use super::cors::CorsPolicy;
use crate::browser::FileBrowser;
use crate::codec::{parse_form, FormValue, Request, Response, Status};
use crate::error::{ParseError, ServeError};
use crate::router::Router;

/// Request dispatcher shared by every connection of an [`HttpServer`].
///
/// Order: OPTIONS preflight, exact route, browse prefix, not found.
///
/// [`HttpServer`]: super::HttpServer
#[derive(Clone, Default)]
pub struct AppService {
    router: Router,
    browser: Option<Arc<FileBrowser>>,
    cors: CorsPolicy,
}

/// Status used when a handler returns a bare body.
pub fn default_status(method: &Method) -> Status {
    match *method {
        Method::POST | Method::PUT => Status::Created,
        _ => Status::Ok,
    }
}

impl AppService {
    pub fn new(router: Router) -> Self {
        Self {
            router,
            ..Self::default()
        }
    }

    pub fn with_browser(mut self, browser: FileBrowser) -> Self {
        self.browser = Some(Arc::new(browser));
        self
    }

    pub fn with_cors(mut self, cors: CorsPolicy) -> Self {
        self.cors = cors;
        self
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    pub fn browser(&self) -> Option<&FileBrowser> {
        self.browser.as_deref()
    }

    /// Dispatch one parsed request and log the outcome.
    pub fn call(&self, req: &Request) -> Response {
        let response = match self.dispatch(req) {
            Ok(resp) => resp,
            Err(err) => self.error_response(req, err),
        };
        let response = response.with_version(req.version.clone());
        info!(
            method = %req.method,
            path = %req.raw_path,
            version = %req.version,
            status = response.status.code(),
            "HTTP request handled"
        );
        response
    }

    fn dispatch(&self, req: &Request) -> Result<Response, ServeError> {
        if req.method == Method::OPTIONS {
            return Ok(self.cors.preflight());
        }

        if let Some(route) = self.router.lookup(&req.method, &req.path) {
            let args = if req.method == Method::GET {
                route.bind(|name| req.query.get(name).cloned().map(FormValue::Text))
            } else {
                let form = parse_form(req)?;
                route.bind(|name| form.get(name).cloned())
            };
            let reply = route.invoke(&args)?;
            let (status, body) = reply.into_parts(default_status(&req.method));
            return Ok(self.cors.decorate(Response::new(status, body)));
        }

        if let Some(browser) = self.browser.as_ref().filter(|b| b.matches(&req.path)) {
            return Ok(self.cors.decorate(browser.handle(req)));
        }

        Err(ServeError::NotFound(req.path.clone()))
    }

    fn error_response(&self, req: &Request, err: ServeError) -> Response {
        let response = match &err {
            ServeError::NotFound(path) => {
                let status = if req.method == Method::GET {
                    Status::NotFound
                } else {
                    Status::BadRequest
                };
                Response::new(status, format!("{} {}: {}", status.code(), status.reason(), path))
            }
            ServeError::Parse(e) => bad_request(e),
            ServeError::Resource(e) => Response::json(
                e.status(),
                serde_json::json!({ "status": 1, "info": e.info() }),
            ),
            ServeError::Handler(_) | ServeError::Transport(_) => {
                error!(method = %req.method, path = %req.path, error = %err, "Request handler failed");
                Response::new(Status::InternalServerError, "500 Internal Server Error")
            }
        };
        self.cors.decorate(response)
    }
}

/// Plain 400 answer for requests that could not be parsed.
pub fn bad_request(err: &ParseError) -> Response {
    Response::new(Status::BadRequest, format!("400 Bad Request: {err}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{parse_request_head, Body};
    use crate::error::HandlerError;
    use crate::router::Reply;
    use serde_json::json;

    fn service() -> AppService {
        let router = Router::new();
        router.get("/echo", &["name"], |args| {
            Ok(json!({ "msg": args.get("name") }).into())
        });
        router.post("/form", &["a", "missing"], |args| {
            Ok(format!("{:?}/{:?}", args.get("a"), args.get("missing")).into())
        });
        router.put("/accept", &[], |_| Ok(Reply::with_status(Status::Accepted, Body::Empty)));
        router.delete("/fail", &[], |_| Err(HandlerError::failed("nope")));
        AppService::new(router)
    }

    fn call(svc: &AppService, raw: &[u8]) -> Response {
        svc.call(&parse_request_head(raw).unwrap())
    }

    #[test]
    fn test_get_binds_query() {
        let resp = call(&service(), b"GET /echo?name=Ada HTTP/1.1\r\n\r\n");
        assert_eq!(resp.status, Status::Ok);
        assert!(matches!(resp.body, Body::Json(ref v) if v == &json!({"msg": "Ada"})));
    }

    #[test]
    fn test_missing_param_is_absent() {
        let resp = call(&service(), b"GET /echo HTTP/1.1\r\n\r\n");
        assert!(matches!(resp.body, Body::Json(ref v) if v == &json!({"msg": null})));
    }

    #[test]
    fn test_post_binds_form_with_default_201() {
        let raw = b"POST /form HTTP/1.1\r\nContent-Type: application/x-www-form-urlencoded\r\nContent-Length: 3\r\n\r\na=1";
        let resp = call(&service(), raw);
        assert_eq!(resp.status, Status::Created);
        assert!(matches!(resp.body, Body::Text(ref s) if s == "Some(\"1\")/None"));
    }

    #[test]
    fn test_status_override_and_handler_error() {
        let svc = service();
        assert_eq!(call(&svc, b"PUT /accept HTTP/1.1\r\n\r\n").status, Status::Accepted);
        assert_eq!(
            call(&svc, b"DELETE /fail HTTP/1.1\r\n\r\n").status,
            Status::InternalServerError
        );
    }

    #[test]
    fn test_unmatched_paths() {
        let svc = service();
        assert_eq!(call(&svc, b"GET /nope HTTP/1.1\r\n\r\n").status, Status::NotFound);
        assert_eq!(call(&svc, b"POST /nope HTTP/1.1\r\n\r\n").status, Status::BadRequest);
        assert_eq!(call(&svc, b"DELETE /nope HTTP/1.1\r\n\r\n").status, Status::BadRequest);
    }

    #[test]
    fn test_options_short_circuits() {
        let resp = call(&service(), b"OPTIONS /echo HTTP/1.1\r\n\r\n");
        assert_eq!(resp.status, Status::NoContent);
    }

    #[test]
    fn test_response_echoes_request_version() {
        let resp = call(&service(), b"GET /echo HTTP/1.0\r\n\r\n");
        assert_eq!(resp.version, "HTTP/1.0");
    }
}
