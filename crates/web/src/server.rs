//! Web surface over the session dispatcher

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use pizzasim_session::{dispatch, Outcome, SessionState, SimRequest, SimResponse};

use crate::proxy::PassThroughProxy;

/// Request bodies larger than this are rejected outright.
const BODY_LIMIT: usize = 2 * 1024 * 1024;

/// Configuration for one simulator surface
#[derive(Debug, Clone, Default)]
pub struct SimServerConfig {
    /// Upstream origin for pass-through requests, e.g. `http://127.0.0.1:3000`
    pub upstream: Option<String>,
}

/// Web surface wrapping one session's state
#[derive(Clone)]
pub struct SimServer {
    state: Arc<ServerState>,
}

struct ServerState {
    session: Arc<SessionState>,
    proxy: PassThroughProxy,
}

impl SimServer {
    pub fn new(session: Arc<SessionState>, cfg: SimServerConfig) -> Self {
        Self {
            state: Arc::new(ServerState {
                session,
                proxy: PassThroughProxy::new(cfg.upstream),
            }),
        }
    }

    /// Router with the readiness route plus a catch-all into the dispatcher
    pub fn router(&self) -> Router {
        Router::new()
            .route("/healthz", get(health_handler))
            .fallback(sim_handler)
            .layer(
                CorsLayer::new()
                    .allow_origin(Any)
                    .allow_methods(Any)
                    .allow_headers(Any),
            )
            .layer(TraceLayer::new_for_http())
            .with_state(self.state.clone())
    }

    /// Start the surface on the given address
    pub async fn serve(self, addr: SocketAddr) -> anyhow::Result<()> {
        let listener = tokio::net::TcpListener::bind(addr).await?;
        info!("PizzaSim surface on http://{}", listener.local_addr()?);
        axum::serve(listener, self.router()).await?;
        Ok(())
    }

    /// Serve on an already-bound listener until `shutdown` resolves.
    /// Binding first lets the caller learn the ephemeral port.
    pub async fn serve_on(
        self,
        listener: tokio::net::TcpListener,
        shutdown: impl std::future::Future<Output = ()> + Send + 'static,
    ) -> anyhow::Result<()> {
        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown)
            .await?;
        Ok(())
    }
}

async fn health_handler() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "pizzasim-web"
    }))
}

async fn sim_handler(State(state): State<Arc<ServerState>>, req: Request) -> Response {
    let (parts, body) = req.into_parts();
    let bytes = match axum::body::to_bytes(body, BODY_LIMIT).await {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!(error = %e, "failed to buffer request body");
            return (
                StatusCode::PAYLOAD_TOO_LARGE,
                Json(serde_json::json!({ "message": "request body too large" })),
            )
                .into_response();
        }
    };

    let sim_req = SimRequest {
        method: parts.method.as_str().to_string(),
        path: parts.uri.path().to_string(),
        query: parts.uri.query().unwrap_or_default().to_string(),
        body: bytes.to_vec(),
    };

    match dispatch(&state.session, &sim_req) {
        Outcome::Fulfill(resp) => fulfill_response(resp),
        Outcome::PassThrough => state.proxy.forward(parts, bytes).await,
    }
}

fn fulfill_response(sim: SimResponse) -> Response {
    let status = StatusCode::from_u16(sim.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let mut response = if sim.body.is_null() {
        status.into_response()
    } else {
        (status, Json(sim.body)).into_response()
    };
    for (name, value) in sim.headers {
        if let (Ok(name), Ok(value)) = (
            HeaderName::try_from(name.as_str()),
            HeaderValue::try_from(value.as_str()),
        ) {
            response.headers_mut().insert(name, value);
        }
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request as HttpRequest;
    use pizzasim_common::{Role, RoleAssignment, User};
    use pizzasim_session::SeedState;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    fn surface(seed: SeedState, upstream: Option<String>) -> Router {
        let session = Arc::new(SessionState::install(seed));
        SimServer::new(session, SimServerConfig { upstream }).router()
    }

    async fn body_json(response: Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn healthz_reports_ok() {
        let app = surface(SeedState::default(), None);
        let resp = app
            .oneshot(
                HttpRequest::builder()
                    .uri("/healthz")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let json = body_json(resp).await;
        assert_eq!(json["status"], "ok");
    }

    #[tokio::test]
    async fn login_flows_through_the_dispatcher() {
        let seed = SeedState::new().with_session_user(User::new(
            5,
            "Pizza Diner",
            "pizza.diner@jwt.com",
            "diner",
            vec![RoleAssignment::new(Role::Diner)],
        ));
        let app = surface(seed, None);

        let resp = app
            .oneshot(
                HttpRequest::builder()
                    .method("PUT")
                    .uri("/api/auth")
                    .header("content-type", "application/json")
                    .body(Body::from(
                        json!({ "email": "pizza.diner@jwt.com", "password": "diner" }).to_string(),
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let json = body_json(resp).await;
        assert_eq!(json["user"]["email"], "pizza.diner@jwt.com");
        assert!(json["token"].is_string());
    }

    #[tokio::test]
    async fn preflight_answers_204_with_cors_headers() {
        let app = surface(SeedState::default(), None);
        let resp = app
            .oneshot(
                HttpRequest::builder()
                    .method("OPTIONS")
                    .uri("/api/order")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NO_CONTENT);
        assert_eq!(
            resp.headers()
                .get("Access-Control-Allow-Origin")
                .and_then(|v| v.to_str().ok()),
            Some("*")
        );
    }

    #[tokio::test]
    async fn unmatched_without_upstream_is_bad_gateway() {
        let app = surface(SeedState::default(), None);
        let resp = app
            .oneshot(
                HttpRequest::builder()
                    .uri("/version.json")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
        let json = body_json(resp).await;
        assert!(json["message"].is_string());
    }

    #[tokio::test]
    async fn unmatched_with_upstream_is_forwarded() {
        let upstream_app =
            Router::new().route("/version.json", get(|| async { Json(json!({ "version": "1.2.3" })) }));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, upstream_app).await.unwrap();
        });

        let app = surface(SeedState::default(), Some(format!("http://{}", addr)));
        let resp = app
            .oneshot(
                HttpRequest::builder()
                    .uri("/version.json")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let json = body_json(resp).await;
        assert_eq!(json["version"], "1.2.3");
    }
}
