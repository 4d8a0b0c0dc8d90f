//! Demo handlers registered by `edgeserve serve`.

use serde_json::{json, Value};

use crate::router::{HandlerArgs, RpcHandler, RpcRegistry, Router};

/// `GET /echo?name=..` answers `{"msg": name}`; `name` is `null` when absent.
pub fn register_demo_routes(router: &Router) {
    router.get("/echo", &["name"], |args: &HandlerArgs| {
        Ok(json!({ "msg": args.get("name") }).into())
    });
}

/// `ping()` → `"pong"`, `echo(*args)` → the argument list.
pub fn register_demo_rpcs(registry: &RpcRegistry) {
    registry.register(RpcHandler::new("ping", |_| Ok(json!("pong"))).with_doc("ping() -> 'pong'"));
    registry.register(
        RpcHandler::new("echo", |params: &[Value]| Ok(Value::Array(params.to_vec())))
            .with_doc("echo(*args) -> args as a list"),
    );
}
