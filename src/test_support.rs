// In-process mock of the chat backend for tests

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const RESET_TOKEN: &str = "reset-ok";

#[derive(Clone, Debug)]
pub struct MockUser {
    pub id: u32,
    pub email: String,
    pub password: String,
    pub is_admin: bool,
    pub character_ids: Vec<u32>,
}

pub struct MockState {
    pub users: Mutex<Vec<MockUser>>,
    pub catalog: Vec<(u32, String)>,
    pub catalog_visible: bool,
    pub embed_characters: bool,
    pub my_characters_path: Option<String>,
    pub failing_characters: Vec<u32>,
    pub register_assigns: Vec<u32>,
    pub report_counts: bool,
    pub send_delay: Duration,
    pub fail_sends: AtomicBool,
    /// (user id, character id) -> count
    pub counts: Mutex<HashMap<(u32, u32), u32>>,
    /// (user id, character id) -> messages
    pub history: Mutex<HashMap<(u32, u32), Vec<Value>>>,
    pub hits: Mutex<Vec<String>>,
}

pub struct MockBackend {
    pub base_url: String,
    pub state: Arc<MockState>,
}

pub struct MockBackendBuilder {
    users: Vec<MockUser>,
    catalog: Vec<(u32, String)>,
    catalog_visible: bool,
    embed_characters: bool,
    my_characters_path: Option<String>,
    failing_characters: Vec<u32>,
    register_assigns: Vec<u32>,
    report_counts: bool,
    send_delay: Duration,
    counts: HashMap<(u32, u32), u32>,
}

impl MockBackend {
    pub fn builder() -> MockBackendBuilder {
        MockBackendBuilder {
            users: Vec::new(),
            catalog: vec![
                (1, "Maya".to_string()),
                (2, "Leo".to_string()),
                (3, "Ana".to_string()),
                (7, "Iris".to_string()),
                (8, "Noor".to_string()),
            ],
            catalog_visible: true,
            embed_characters: false,
            my_characters_path: None,
            failing_characters: Vec::new(),
            register_assigns: vec![1, 2],
            report_counts: true,
            send_delay: Duration::ZERO,
            counts: HashMap::new(),
        }
    }

    pub fn set_fail_sends(&self, fail: bool) {
        self.state.fail_sends.store(fail, Ordering::SeqCst);
    }

    pub fn hits(&self) -> Vec<String> {
        self.state.hits.lock().unwrap().clone()
    }

    pub fn count_for(&self, email: &str, character_id: u32) -> u32 {
        let user_id = self
            .state
            .users
            .lock()
            .unwrap()
            .iter()
            .find(|u| u.email == email)
            .map(|u| u.id)
            .unwrap();
        self.state
            .counts
            .lock()
            .unwrap()
            .get(&(user_id, character_id))
            .copied()
            .unwrap_or(0)
    }
}

impl MockBackendBuilder {
    pub fn user(mut self, email: &str, password: &str, character_ids: &[u32]) -> Self {
        let id = self.users.len() as u32 + 1;
        self.users.push(MockUser {
            id,
            email: email.to_string(),
            password: password.to_string(),
            is_admin: false,
            character_ids: character_ids.to_vec(),
        });
        self
    }

    pub fn admin(mut self, email: &str, password: &str) -> Self {
        self = self.user(email, password, &[1]);
        if let Some(user) = self.users.last_mut() {
            user.is_admin = true;
        }
        self
    }

    /// Seed the backend count for the most recently added user
    pub fn count(mut self, character_id: u32, count: u32) -> Self {
        let user_id = self.users.last().map(|u| u.id).unwrap_or(1);
        self.counts.insert((user_id, character_id), count);
        self
    }

    pub fn hide_catalog(mut self) -> Self {
        self.catalog_visible = false;
        self
    }

    pub fn embed_characters(mut self) -> Self {
        self.embed_characters = true;
        self
    }

    pub fn my_characters_path(mut self, path: &str) -> Self {
        self.my_characters_path = Some(path.to_string());
        self
    }

    pub fn failing_character(mut self, id: u32) -> Self {
        self.failing_characters.push(id);
        self
    }

    pub fn register_assigns(mut self, ids: &[u32]) -> Self {
        self.register_assigns = ids.to_vec();
        self
    }

    pub fn without_counts(mut self) -> Self {
        self.report_counts = false;
        self
    }

    pub fn send_delay(mut self, delay: Duration) -> Self {
        self.send_delay = delay;
        self
    }

    pub async fn spawn(self) -> MockBackend {
        let state = Arc::new(MockState {
            users: Mutex::new(self.users),
            catalog: self.catalog,
            catalog_visible: self.catalog_visible,
            embed_characters: self.embed_characters,
            my_characters_path: self.my_characters_path,
            failing_characters: self.failing_characters,
            register_assigns: self.register_assigns,
            report_counts: self.report_counts,
            send_delay: self.send_delay,
            fail_sends: AtomicBool::new(false),
            counts: Mutex::new(self.counts),
            history: Mutex::new(HashMap::new()),
            hits: Mutex::new(Vec::new()),
        });

        let app = Router::new()
            .route("/auth/register", post(register))
            .route("/auth/login", post(login))
            .route("/auth/me", get(me))
            .route("/auth/forgot-password", post(forgot_password))
            .route("/auth/reset-password", post(reset_password))
            .route("/characters", get(catalog))
            .route("/characters/my-characters", get(my_characters))
            .route("/characters/my", get(my_characters))
            .route("/api/characters/my-characters", get(my_characters))
            .route("/api/characters/my", get(my_characters))
            .route("/characters/{id}", get(character))
            .route("/chat", post(send))
            .route("/chat/send", post(send))
            .route("/chat/{id}", get(history))
            .route("/survey-status", get(survey_status))
            .route("/admin/conversations", get(admin_conversations))
            .route("/admin/conversations/{id}/messages", get(admin_messages))
            .route("/admin/users/{id}/role", post(admin_role))
            .with_state(Arc::clone(&state));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        MockBackend {
            base_url: format!("http://{}", addr),
            state,
        }
    }
}

type Shared = State<Arc<MockState>>;

fn error(status: StatusCode, detail: &str) -> Response {
    (status, Json(json!({ "detail": detail }))).into_response()
}

fn hit(state: &MockState, label: String) {
    state.hits.lock().unwrap().push(label);
}

fn character_json(state: &MockState, id: u32) -> Option<Value> {
    state
        .catalog
        .iter()
        .find(|(cid, _)| *cid == id)
        .map(|(cid, name)| {
            json!({
                "id": cid,
                "name": name,
                "description": format!("{} has EI=5/10 and CI=6/10.", name),
            })
        })
}

fn authed(state: &MockState, headers: &HeaderMap) -> Option<MockUser> {
    let token = headers
        .get("authorization")?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")?;
    let id: u32 = token.strip_prefix("token-")?.parse().ok()?;
    state.users.lock().unwrap().iter().find(|u| u.id == id).cloned()
}

async fn register(State(state): Shared, Json(body): Json<Value>) -> Response {
    hit(&state, "POST /auth/register".to_string());
    let email = body["email"].as_str().unwrap_or_default().to_string();
    let password = body["password"].as_str().unwrap_or_default().to_string();

    let mut users = state.users.lock().unwrap();
    if users.iter().any(|u| u.email == email) {
        return error(StatusCode::BAD_REQUEST, "Email already registered");
    }
    if password.len() < 8 {
        return error(StatusCode::UNPROCESSABLE_ENTITY, "Password too short");
    }

    let user = MockUser {
        id: users.len() as u32 + 1,
        email,
        password,
        is_admin: false,
        character_ids: state.register_assigns.clone(),
    };
    users.push(user.clone());

    let characters: Vec<Value> = user
        .character_ids
        .iter()
        .filter_map(|id| character_json(&state, *id))
        .collect();

    Json(json!({ "id": user.id, "email": user.email, "characters": characters })).into_response()
}

async fn login(State(state): Shared, Json(body): Json<Value>) -> Response {
    hit(&state, "POST /auth/login".to_string());
    let users = state.users.lock().unwrap();
    match users
        .iter()
        .find(|u| Some(u.email.as_str()) == body["email"].as_str())
    {
        Some(user) if Some(user.password.as_str()) == body["password"].as_str() => Json(json!({
            "access_token": format!("token-{}", user.id),
            "token_type": "bearer",
        }))
        .into_response(),
        _ => error(StatusCode::BAD_REQUEST, "Incorrect email or password"),
    }
}

async fn me(State(state): Shared, headers: HeaderMap) -> Response {
    hit(&state, "GET /auth/me".to_string());
    let Some(user) = authed(&state, &headers) else {
        return error(StatusCode::UNAUTHORIZED, "Could not validate credentials");
    };

    let mut body = json!({
        "id": user.id,
        "email": user.email,
        "is_admin": user.is_admin,
        "character_ids": user.character_ids,
    });

    if state.embed_characters {
        let counts = state.counts.lock().unwrap();
        let characters: Vec<Value> = user
            .character_ids
            .iter()
            .filter_map(|id| {
                let mut character = character_json(&state, *id)?;
                character["message_count"] = json!(counts.get(&(user.id, *id)).copied().unwrap_or(0));
                Some(character)
            })
            .collect();
        body["characters"] = json!(characters);
    }

    Json(body).into_response()
}

async fn forgot_password(State(state): Shared, Json(_body): Json<Value>) -> Response {
    hit(&state, "POST /auth/forgot-password".to_string());
    Json(json!({ "message": "If the account exists, a reset link was sent" })).into_response()
}

async fn reset_password(State(state): Shared, Json(body): Json<Value>) -> Response {
    hit(&state, "POST /auth/reset-password".to_string());
    if body["token"].as_str() == Some(RESET_TOKEN) && body["new_password"].is_string() {
        Json(json!({ "message": "Password reset successfully" })).into_response()
    } else {
        error(StatusCode::BAD_REQUEST, "Invalid or expired token")
    }
}

async fn catalog(State(state): Shared) -> Response {
    hit(&state, "GET /characters".to_string());
    let characters: Vec<Value> = if state.catalog_visible {
        state
            .catalog
            .iter()
            .filter_map(|(id, _)| character_json(&state, *id))
            .collect()
    } else {
        Vec::new()
    };
    Json(json!({ "characters": characters })).into_response()
}

async fn my_characters(State(state): Shared, headers: HeaderMap, uri: axum::http::Uri) -> Response {
    let path = uri.path().to_string();
    hit(&state, format!("GET {}", path));

    if state.my_characters_path.as_deref() != Some(path.as_str()) {
        return error(StatusCode::NOT_FOUND, "Not Found");
    }
    let Some(user) = authed(&state, &headers) else {
        return error(StatusCode::UNAUTHORIZED, "Could not validate credentials");
    };

    let counts = state.counts.lock().unwrap();
    let characters: Vec<Value> = user
        .character_ids
        .iter()
        .filter_map(|id| {
            let mut character = character_json(&state, *id)?;
            character["interaction_count"] = json!(counts.get(&(user.id, *id)).copied().unwrap_or(0));
            Some(character)
        })
        .collect();
    Json(json!(characters)).into_response()
}

async fn character(State(state): Shared, Path(id): Path<u32>) -> Response {
    hit(&state, format!("GET /characters/{}", id));
    if state.failing_characters.contains(&id) {
        return error(StatusCode::INTERNAL_SERVER_ERROR, "boom");
    }
    match character_json(&state, id) {
        Some(character) => Json(character).into_response(),
        None => error(StatusCode::NOT_FOUND, "Character not found"),
    }
}

async fn send(State(state): Shared, headers: HeaderMap, uri: axum::http::Uri, Json(body): Json<Value>) -> Response {
    hit(&state, format!("POST {}", uri.path()));
    let Some(user) = authed(&state, &headers) else {
        return error(StatusCode::UNAUTHORIZED, "Could not validate credentials");
    };

    if !state.send_delay.is_zero() {
        tokio::time::sleep(state.send_delay).await;
    }

    if state.fail_sends.load(Ordering::SeqCst) {
        return error(StatusCode::INTERNAL_SERVER_ERROR, "LLM unavailable");
    }

    let character_id = body["character_id"].as_u64().unwrap_or_default() as u32;
    let text = body["user_message"].as_str().unwrap_or_default().to_string();
    let reply = format!("echo: {}", text);

    let count = {
        let mut counts = state.counts.lock().unwrap();
        let count = counts.entry((user.id, character_id)).or_insert(0);
        *count += 1;
        *count
    };

    {
        let mut history = state.history.lock().unwrap();
        let thread = history.entry((user.id, character_id)).or_default();
        let n = thread.len();
        thread.push(json!({
            "role": "user",
            "content": text,
            "character_id": character_id,
            "created_at": format!("2024-05-01T10:00:{:02}", n % 60),
        }));
        thread.push(json!({
            "role": "assistant",
            "content": reply,
            "character_id": character_id,
            "created_at": format!("2024-05-01T10:00:{:02}", (n + 1) % 60),
        }));
    }

    if state.report_counts {
        Json(json!({ "reply": reply, "interaction_count": count })).into_response()
    } else {
        Json(json!({ "reply": reply })).into_response()
    }
}

async fn history(State(state): Shared, headers: HeaderMap, Path(id): Path<u32>) -> Response {
    hit(&state, format!("GET /chat/{}", id));
    let Some(user) = authed(&state, &headers) else {
        return error(StatusCode::UNAUTHORIZED, "Could not validate credentials");
    };

    let messages = state
        .history
        .lock()
        .unwrap()
        .get(&(user.id, id))
        .cloned()
        .unwrap_or_default();

    let mut body = json!({ "messages": messages });
    if state.report_counts {
        let counts: HashMap<String, u32> = state
            .counts
            .lock()
            .unwrap()
            .iter()
            .filter(|((uid, _), _)| *uid == user.id)
            .map(|((_, cid), count)| (cid.to_string(), *count))
            .collect();
        body["interaction_counts"] = json!(counts);
    }
    Json(body).into_response()
}

async fn survey_status(State(state): Shared, headers: HeaderMap) -> Response {
    hit(&state, "GET /survey-status".to_string());
    let Some(user) = authed(&state, &headers) else {
        return error(StatusCode::UNAUTHORIZED, "Could not validate credentials");
    };
    let counts = state.counts.lock().unwrap();
    let done = !user.character_ids.is_empty()
        && user
            .character_ids
            .iter()
            .all(|id| counts.get(&(user.id, *id)).copied().unwrap_or(0) >= 15);
    Json(json!({ "showSurvey": done })).into_response()
}

async fn admin_conversations(State(state): Shared, headers: HeaderMap) -> Response {
    hit(&state, "GET /admin/conversations".to_string());
    match authed(&state, &headers) {
        Some(user) if user.is_admin => Json(json!({
            "conversations": [
                { "id": 11, "user_email": "ana@example.com", "character_name": "Maya", "created_at": "2024-05-01T10:00:00Z" },
                { "id": 12, "user": { "email": "leo@example.com" }, "character": { "name": "Leo" } },
            ]
        }))
        .into_response(),
        Some(_) => error(StatusCode::FORBIDDEN, "Admin access required"),
        None => error(StatusCode::UNAUTHORIZED, "Could not validate credentials"),
    }
}

async fn admin_messages(State(state): Shared, headers: HeaderMap, Path(id): Path<u32>) -> Response {
    hit(&state, format!("GET /admin/conversations/{}/messages", id));
    match authed(&state, &headers) {
        Some(user) if user.is_admin => Json(json!([
            { "role": "user", "content": "hello", "created_at": "2024-05-01T10:00:00" },
            { "role": "assistant", "content": "hi there", "created_at": "2024-05-01T10:00:01" },
        ]))
        .into_response(),
        Some(_) => error(StatusCode::FORBIDDEN, "Admin access required"),
        None => error(StatusCode::UNAUTHORIZED, "Could not validate credentials"),
    }
}

async fn admin_role(
    State(state): Shared,
    headers: HeaderMap,
    Path(id): Path<u32>,
    Json(body): Json<Value>,
) -> Response {
    hit(&state, format!("POST /admin/users/{}/role", id));
    match authed(&state, &headers) {
        Some(user) if user.is_admin => {
            let mut users = state.users.lock().unwrap();
            match users.iter_mut().find(|u| u.id == id) {
                Some(target) => {
                    target.is_admin = body["is_admin"].as_bool().unwrap_or(false);
                    Json(json!({ "message": "Role updated" })).into_response()
                }
                None => error(StatusCode::NOT_FOUND, "User not found"),
            }
        }
        Some(_) => error(StatusCode::FORBIDDEN, "Admin access required"),
        None => error(StatusCode::UNAUTHORIZED, "Could not validate credentials"),
    }
}
