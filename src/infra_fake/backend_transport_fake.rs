use crate::domain_model::*;
use crate::domain_port::*;
use serde_json::{Value, json};
use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

/// How the fake answers `auth/refresh`.
#[derive(Debug, Clone)]
pub enum RefreshBehavior {
    /// Consume the presented refresh token and issue a fresh, accepted pair.
    Rotate,
    /// Always answer with this pair (accepted only if registered separately).
    Issue(Credential),
    /// Always answer with this status.
    Respond(u16),
}

struct FakeState {
    access_tokens: HashSet<String>,
    refresh_tokens: HashSet<String>,
    users: HashMap<String, String>,
    collections: HashMap<String, Value>,
    overrides: HashMap<String, (u16, Value)>,
    refresh_behavior: RefreshBehavior,
    refresh_latency: Duration,
    resource_latency: Duration,
    offline: bool,
    issued: u64,
}

/// In-process emulation of the backend API, for tests and offline demos.
///
/// Minimal by intent: it knows about bearer tokens, the three auth endpoints
/// and canned collection payloads. Every request it receives is recorded.
pub struct FakeBackendTransport {
    state: Mutex<FakeState>,
    requests: Mutex<Vec<PreparedRequest>>,
}

impl FakeBackendTransport {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(FakeState {
                access_tokens: HashSet::new(),
                refresh_tokens: HashSet::new(),
                users: HashMap::new(),
                collections: HashMap::new(),
                overrides: HashMap::new(),
                refresh_behavior: RefreshBehavior::Rotate,
                refresh_latency: Duration::ZERO,
                resource_latency: Duration::ZERO,
                offline: false,
                issued: 0,
            }),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// A fake with one user (`admin` / `admin`) and a few dashboard
    /// collections, for running the CLI without a backend.
    pub fn seeded() -> Self {
        let fake = Self::new();
        fake.add_user("admin", "admin");
        fake.insert_collection(
            "orders",
            json!([
                { "id": 1001, "customer": "Northwind", "total": 412.50, "status": "shipped" },
                { "id": 1002, "customer": "Contoso", "total": 89.99, "status": "pending" },
            ]),
        );
        fake.insert_collection(
            "inventory",
            json!([
                { "sku": "CH-001", "name": "Office chair", "stock": 14 },
                { "sku": "DK-210", "name": "Standing desk", "stock": 3 },
            ]),
        );
        fake.insert_collection(
            "employees",
            json!([{ "id": 7, "name": "R. Okafor", "role": "warehouse lead" }]),
        );
        fake
    }

    pub fn add_user(&self, username: &str, password: &str) {
        self.state()
            .users
            .insert(username.to_string(), password.to_string());
    }

    pub fn accept_access_token(&self, token: &str) {
        self.state().access_tokens.insert(token.to_string());
    }

    pub fn revoke_access_token(&self, token: &str) {
        self.state().access_tokens.remove(token);
    }

    pub fn accept_refresh_token(&self, token: &str) {
        self.state().refresh_tokens.insert(token.to_string());
    }

    pub fn insert_collection(&self, name: &str, items: Value) {
        self.state().collections.insert(name.to_string(), items);
    }

    /// Answer authenticated requests to `path` with a fixed status and body.
    pub fn respond_with(&self, path: &str, status: u16, body: Value) {
        self.state()
            .overrides
            .insert(normalize(path).to_string(), (status, body));
    }

    pub fn set_refresh_behavior(&self, behavior: RefreshBehavior) {
        self.state().refresh_behavior = behavior;
    }

    pub fn set_refresh_latency(&self, latency: Duration) {
        self.state().refresh_latency = latency;
    }

    /// Delay before answering anything outside `auth/`. Token checks happen
    /// after the delay.
    pub fn set_resource_latency(&self, latency: Duration) {
        self.state().resource_latency = latency;
    }

    /// While offline every dispatch fails without a response.
    pub fn set_offline(&self, offline: bool) {
        self.state().offline = offline;
    }

    pub fn requests(&self) -> Vec<PreparedRequest> {
        self.requests
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn requests_to(&self, path: &str) -> Vec<PreparedRequest> {
        let path = normalize(path);
        self.requests()
            .into_iter()
            .filter(|request| normalize(&request.path) == path)
            .collect()
    }

    pub fn refresh_calls(&self) -> usize {
        self.requests_to("auth/refresh").len()
    }

    fn state(&self) -> MutexGuard<'_, FakeState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn record(&self, request: &PreparedRequest) {
        self.requests
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(request.clone());
    }

    fn issue_pair(state: &mut FakeState) -> Credential {
        state.issued += 1;
        let credential = Credential::new(
            format!("fake-access-{}", state.issued),
            format!("fake-refresh-{}", state.issued),
        );
        state
            .access_tokens
            .insert(credential.access_token.0.clone());
        state
            .refresh_tokens
            .insert(credential.refresh_token.0.clone());
        credential
    }

    fn refresh(&self, request: &PreparedRequest) -> ApiResponse {
        let presented = json_field(&request.body, "refreshToken");
        let mut state = self.state();
        match state.refresh_behavior.clone() {
            RefreshBehavior::Respond(status) => {
                ApiResponse::json_body(status, &json!({ "error": "refresh refused" }))
            }
            RefreshBehavior::Issue(credential) => ApiResponse::json_body(200, &json!(credential)),
            RefreshBehavior::Rotate => {
                let consumed = presented.is_some_and(|token| state.refresh_tokens.remove(&token));
                if consumed {
                    let credential = Self::issue_pair(&mut state);
                    ApiResponse::json_body(200, &json!(credential))
                } else {
                    unauthorized("invalid refresh token")
                }
            }
        }
    }

    fn login(&self, request: &PreparedRequest) -> ApiResponse {
        let username = json_field(&request.body, "username");
        let password = json_field(&request.body, "password");
        let mut state = self.state();
        let known = match (&username, &password) {
            (Some(username), Some(password)) => state.users.get(username) == Some(password),
            _ => false,
        };
        if known {
            let credential = Self::issue_pair(&mut state);
            ApiResponse::json_body(200, &json!(credential))
        } else {
            unauthorized("invalid username or password")
        }
    }

    fn logout(&self, request: &PreparedRequest) -> ApiResponse {
        if let Some(token) = json_field(&request.body, "refreshToken") {
            self.state().refresh_tokens.remove(&token);
        }
        ApiResponse::new(204, Headers::new(), Vec::new())
    }

    fn resource(&self, request: &PreparedRequest) -> ApiResponse {
        let state = self.state();
        let authorized = request
            .headers
            .get("Authorization")
            .and_then(|value| value.strip_prefix("Bearer "))
            .is_some_and(|token| state.access_tokens.contains(token));
        if !authorized {
            return unauthorized("access token expired");
        }

        let path = normalize(&request.path);
        if let Some((status, body)) = state.overrides.get(path) {
            return ApiResponse::json_body(*status, body);
        }
        match (request.method, state.collections.get(path)) {
            (Method::Get, Some(items)) => ApiResponse::json_body(200, &json!({ path: items })),
            (Method::Get, None) => {
                ApiResponse::json_body(404, &json!({ "error": format!("no collection {path}") }))
            }
            (_, _) => match &request.body {
                Body::Json(value) => ApiResponse::json_body(201, value),
                _ => ApiResponse::new(204, Headers::new(), Vec::new()),
            },
        }
    }
}

impl Default for FakeBackendTransport {
    fn default() -> Self {
        Self::new()
    }
}

fn normalize(path: &str) -> &str {
    path.trim_matches('/')
}

fn unauthorized(message: &str) -> ApiResponse {
    ApiResponse::json_body(401, &json!({ "error": message }))
}

fn json_field(body: &Body, field: &str) -> Option<String> {
    match body {
        Body::Json(value) => value.get(field)?.as_str().map(str::to_string),
        _ => None,
    }
}

#[async_trait::async_trait]
impl BackendTransport for FakeBackendTransport {
    async fn dispatch(&self, request: PreparedRequest) -> Result<ApiResponse, TransportError> {
        self.record(&request);

        let (offline, refresh_latency, resource_latency) = {
            let state = self.state();
            (state.offline, state.refresh_latency, state.resource_latency)
        };
        if offline {
            return Err(TransportError::Connect("fake backend is offline".to_string()));
        }

        let response = match normalize(&request.path) {
            "auth/refresh" => {
                if !refresh_latency.is_zero() {
                    tokio::time::sleep(refresh_latency).await;
                }
                self.refresh(&request)
            }
            "auth/login" => self.login(&request),
            "auth/logout" => self.logout(&request),
            _ => {
                if !resource_latency.is_zero() {
                    tokio::time::sleep(resource_latency).await;
                }
                self.resource(&request)
            }
        };
        Ok(response)
    }
}
