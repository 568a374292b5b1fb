//! Pure request dispatcher over the session store
//!
//! Matching is substring on path and exact on method, evaluated in a
//! fixed order, the same discipline the page-under-test's interceptors
//! apply. Anything unmatched is handed back for pass-through.

use serde::Serialize;
use serde_json::{json, Value};
use tracing::debug;

use pizzasim_common::{FranchiseAdmin, Order};

use crate::state::SessionState;

/// A captured request, reduced to what the dispatcher needs.
#[derive(Debug, Clone)]
pub struct SimRequest {
    pub method: String,
    pub path: String,
    pub query: String,
    pub body: Vec<u8>,
}

impl SimRequest {
    pub fn new(method: &str, path: &str) -> Self {
        Self {
            method: method.to_uppercase(),
            path: path.to_string(),
            query: String::new(),
            body: Vec::new(),
        }
    }

    pub fn with_query(mut self, query: &str) -> Self {
        self.query = query.to_string();
        self
    }

    pub fn with_json(mut self, body: Value) -> Self {
        self.body = body.to_string().into_bytes();
        self
    }

    fn query_param(&self, key: &str) -> Option<String> {
        self.query.split('&').find_map(|pair| {
            let mut parts = pair.splitn(2, '=');
            match (parts.next(), parts.next()) {
                (Some(k), Some(v)) if k == key => Some(v.to_string()),
                _ => None,
            }
        })
    }

    fn page(&self) -> usize {
        self.query_param("page")
            .and_then(|p| p.parse().ok())
            .unwrap_or(1)
    }

    fn json_body(&self) -> Value {
        serde_json::from_slice(&self.body).unwrap_or(Value::Null)
    }
}

/// A scripted response to fulfill locally.
#[derive(Debug, Clone)]
pub struct SimResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Value,
}

impl SimResponse {
    pub fn json(status: u16, body: Value) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body,
        }
    }

    pub fn message(status: u16, message: &str) -> Self {
        Self::json(status, json!({ "message": message }))
    }

    fn preflight() -> Self {
        Self {
            status: 204,
            headers: vec![
                ("Access-Control-Allow-Origin".to_string(), "*".to_string()),
                (
                    "Access-Control-Allow-Methods".to_string(),
                    "GET, POST, PUT, DELETE, OPTIONS".to_string(),
                ),
                (
                    "Access-Control-Allow-Headers".to_string(),
                    "Content-Type, Authorization".to_string(),
                ),
            ],
            body: Value::Null,
        }
    }
}

/// What to do with a captured request.
#[derive(Debug, Clone)]
pub enum Outcome {
    Fulfill(SimResponse),
    PassThrough,
}

fn to_json<T: Serialize>(value: &T) -> Value {
    serde_json::to_value(value).unwrap_or(Value::Null)
}

/// Path segment directly following `marker`, up to the next `/` or `?`.
fn segment_after<'a>(path: &'a str, marker: &str) -> Option<&'a str> {
    let start = path.find(marker)? + marker.len();
    let rest = &path[start..];
    let end = rest.find(|c| c == '/' || c == '?').unwrap_or(rest.len());
    let segment = &rest[..end];
    if segment.is_empty() {
        None
    } else {
        Some(segment)
    }
}

/// Answer one captured request against the session store.
pub fn dispatch(state: &SessionState, req: &SimRequest) -> Outcome {
    let method = req.method.as_str();
    let path = req.path.as_str();

    if method == "OPTIONS" {
        if path.contains("/api/") {
            return Outcome::Fulfill(SimResponse::preflight());
        }
        return Outcome::PassThrough;
    }

    if let Some(failure) = state.take_failure(method, path) {
        debug!(method, path, status = failure.status, "injected failure");
        return Outcome::Fulfill(SimResponse::message(failure.status, &failure.message));
    }

    if path.contains("/api/auth") {
        return dispatch_auth(state, req);
    }
    if path.contains("/api/user/me") && method == "GET" {
        return Outcome::Fulfill(SimResponse::json(200, to_json(&state.session_user())));
    }
    if path.contains("/api/user") {
        return dispatch_user(state, req);
    }
    if path.contains("/api/order/menu") && method == "GET" {
        return Outcome::Fulfill(SimResponse::json(200, to_json(&state.menu())));
    }
    if path.contains("/api/order/verify") && method == "POST" {
        return dispatch_verify(state, req);
    }
    if path.contains("/api/order") {
        return dispatch_order(state, req);
    }
    if path.contains("/api/franchise") {
        return dispatch_franchise(state, req);
    }

    debug!(method, path, "no match, passing through");
    Outcome::PassThrough
}

fn dispatch_auth(state: &SessionState, req: &SimRequest) -> Outcome {
    match req.method.as_str() {
        "PUT" => {
            let body = req.json_body();
            let email = body["email"].as_str().unwrap_or_default();
            let password = body["password"].as_str().unwrap_or_default();
            match state.login(email, password) {
                Some((user, token)) => Outcome::Fulfill(SimResponse::json(
                    200,
                    json!({ "user": to_json(&user), "token": token }),
                )),
                None => Outcome::Fulfill(SimResponse::message(401, "unauthorized")),
            }
        }
        "POST" => {
            let body = req.json_body();
            let (user, token) = state.register(
                body["name"].as_str().unwrap_or_default(),
                body["email"].as_str().unwrap_or_default(),
                body["password"].as_str().unwrap_or_default(),
            );
            Outcome::Fulfill(SimResponse::json(
                200,
                json!({ "user": to_json(&user), "token": token }),
            ))
        }
        "DELETE" => Outcome::Fulfill(SimResponse::message(200, "logout successful")),
        _ => Outcome::PassThrough,
    }
}

fn dispatch_user(state: &SessionState, req: &SimRequest) -> Outcome {
    match req.method.as_str() {
        "GET" => {
            let filter = req.query_param("name");
            let (users, more) = state.list_users(filter.as_deref(), req.page());
            Outcome::Fulfill(SimResponse::json(
                200,
                json!({ "users": to_json(&users), "more": more }),
            ))
        }
        "PUT" => {
            let body = req.json_body();
            let (user, token) = state.update_profile(
                body["name"].as_str(),
                body["email"].as_str(),
                body["password"].as_str(),
            );
            Outcome::Fulfill(SimResponse::json(
                200,
                json!({ "user": to_json(&user), "token": token }),
            ))
        }
        "DELETE" => {
            if let Some(segment) = segment_after(&req.path, "/user/") {
                state.delete_user(segment);
            }
            Outcome::Fulfill(SimResponse::message(200, "user deleted"))
        }
        _ => Outcome::PassThrough,
    }
}

fn dispatch_verify(state: &SessionState, req: &SimRequest) -> Outcome {
    let body = req.json_body();
    let jwt = body["jwt"].as_str().unwrap_or_default();
    let payload = match state.lookup_delivery(jwt) {
        Some(order_id) => json!({ "orderId": to_json(&order_id) }),
        None => json!({}),
    };
    Outcome::Fulfill(SimResponse::json(
        200,
        json!({ "message": "valid", "payload": payload }),
    ))
}

fn dispatch_order(state: &SessionState, req: &SimRequest) -> Outcome {
    match req.method.as_str() {
        "GET" => Outcome::Fulfill(SimResponse::json(
            200,
            json!({ "orders": to_json(&state.orders()) }),
        )),
        "POST" => match serde_json::from_value::<Order>(req.json_body()) {
            Ok(order) => {
                let (recorded, jwt) = state.submit_order(order);
                Outcome::Fulfill(SimResponse::json(
                    200,
                    json!({ "order": to_json(&recorded), "jwt": jwt }),
                ))
            }
            Err(e) => Outcome::Fulfill(SimResponse::message(400, &format!("invalid order: {}", e))),
        },
        _ => Outcome::PassThrough,
    }
}

fn dispatch_franchise(state: &SessionState, req: &SimRequest) -> Outcome {
    let path = req.path.as_str();

    if path.contains("/store") {
        let franchise = segment_after(path, "/franchise/").unwrap_or_default();
        return match req.method.as_str() {
            "POST" => {
                let body = req.json_body();
                let store =
                    state.create_store(franchise, body["name"].as_str().unwrap_or_default());
                Outcome::Fulfill(SimResponse::json(200, to_json(&store)))
            }
            "DELETE" => {
                if let Some(store) = segment_after(path, "/store/") {
                    state.delete_store(franchise, store);
                }
                Outcome::Fulfill(SimResponse::message(200, "store deleted"))
            }
            _ => Outcome::PassThrough,
        };
    }

    match req.method.as_str() {
        "GET" => match segment_after(path, "/franchise/") {
            Some(user_segment) => Outcome::Fulfill(SimResponse::json(
                200,
                to_json(&state.franchises_for_user(user_segment)),
            )),
            None => {
                let (franchises, more) = state.list_franchises(req.page());
                Outcome::Fulfill(SimResponse::json(
                    200,
                    json!({ "franchises": to_json(&franchises), "more": more }),
                ))
            }
        },
        "POST" => {
            let body = req.json_body();
            let admins: Vec<FranchiseAdmin> = body
                .get("admins")
                .cloned()
                .and_then(|v| serde_json::from_value(v).ok())
                .unwrap_or_default();
            let franchise =
                state.create_franchise(body["name"].as_str().unwrap_or_default(), admins);
            Outcome::Fulfill(SimResponse::json(200, to_json(&franchise)))
        }
        "DELETE" => {
            if let Some(segment) = segment_after(path, "/franchise/") {
                state.delete_franchise(segment);
            }
            Outcome::Fulfill(SimResponse::message(200, "franchise deleted"))
        }
        _ => Outcome::PassThrough,
    }
}
