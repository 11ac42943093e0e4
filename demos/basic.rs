//! Minimal weft example: grouped middleware, JSON endpoints, health checks.
//!
//! Run with:
//!   RUST_LOG=info cargo run --example basic
//!
//! Try:
//!   curl http://localhost:3000/api/v1/users/42
//!   curl -X POST http://localhost:3000/api/v1/users \
//!        -H 'x-api-key: secret' \
//!        -d '{"name":"alice"}'
//!   curl -X DELETE -H 'x-api-key: secret' http://localhost:3000/api/v1/users/42
//!   curl http://localhost:3000/healthz

use http::header::LOCATION;
use http::{HeaderValue, StatusCode};
use serde::{Deserialize, Serialize};
use weft::{Context, Handler, Middleware, Server, TracingLogSink, handler_fn, health, middleware, middleware_fn};

#[derive(Serialize)]
struct User {
    id: String,
    name: String,
}

#[derive(Deserialize, Serialize)]
struct CreateUser {
    name: String,
}

#[tokio::main]
async fn main() -> weft::Result<()> {
    tracing_subscriber::fmt::init();

    let server = Server::builder()
        .request_logger(|c| Box::new(TracingLogSink::for_request(c).panic_on_fatal_bug(cfg!(debug_assertions))))
        .build();

    server
        .handler_group("")
        .get("/healthz", health::liveness)?
        .get("/readyz", health::readiness)?;

    let mut api = server.handler_group("/api");
    api.add_middleware([middleware::trace()]);

    let mut v1 = api.handler_group("/v1");
    v1.get("/users/{id}", get_user)?;

    // Writes need a key; reads above were registered before this was added.
    v1.add_middleware([require_api_key("secret")]);
    v1.post("/users", create_user)?.delete("/users/{id}", delete_user)?;

    server.serve("0.0.0.0:3000").await
}

/// Rejects requests without the right `x-api-key` header.
fn require_api_key(key: &'static str) -> Middleware {
    middleware_fn(move |next: Handler| {
        handler_fn(move |c| {
            let next = next.clone();
            Box::pin(async move {
                if c.header("x-api-key") != Some(key) {
                    c.log().warning("missing or wrong api key");
                    return c.response().string(StatusCode::UNAUTHORIZED, "unauthorized").await;
                }
                next(c).await
            })
        })
    })
}

// GET /api/v1/users/{id}
fn get_user(c: &mut Context) -> weft::BoxFuture<'_, weft::Result<()>> {
    Box::pin(async move {
        let id = c.request().param("id").unwrap_or("unknown").to_owned();
        let user = User { id, name: "alice".into() };
        c.response().struct_(StatusCode::OK, &user).await
    })
}

// POST /api/v1/users
fn create_user(c: &mut Context) -> weft::BoxFuture<'_, weft::Result<()>> {
    Box::pin(async move {
        let input: CreateUser = match c.request().body_struct().await {
            Ok(input) => input,
            Err(e) => return c.response().string(StatusCode::BAD_REQUEST, e.to_string()).await,
        };
        c.validate_struct(&input)?;
        c.response().header().insert(LOCATION, HeaderValue::from_static("/api/v1/users/99"));
        let user = User { id: "99".into(), name: input.name };
        c.response().struct_(StatusCode::CREATED, &user).await
    })
}

// DELETE /api/v1/users/{id}
fn delete_user(c: &mut Context) -> weft::BoxFuture<'_, weft::Result<()>> {
    Box::pin(async move { c.response().status(StatusCode::NO_CONTENT).await })
}
