//! Shared test harness for `better-auth-bridge`.
//!
//! Provides:
//! - [`TestAuth`]: an in-memory stand-in for the wrapped auth library,
//!   answering the email/password, session and sign-out routes.
//! - [`TestApp`]: a `ServerAuth` wired to [`TestAuth`], with an instance
//!   counter and the axum router used by the integration tests.
//! - Request builders and cookie helpers.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use argon2::password_hash::{PasswordHash, SaltString};
use argon2::{Algorithm, Argon2, Params, PasswordHasher, PasswordVerifier, Version};
use async_trait::async_trait;
use axum::{
    Json, Router,
    body::Body,
    http::{Method, Request},
    response::Response,
    routing::get,
};
use better_auth_bridge::{
    AuthError, AuthInstance, AuthOptions, AuthRequest, AuthResponse, AuthResult, AxumIntegration,
    CurrentUserSession, DatabaseProvider, HttpMethod, HydrationPayload, OptionalUserSession,
    RequestAuth, RouteAuth, RouteGuard, RouteRules, RuntimeConfig, ServerAuth, SignInEmail,
    SignUpEmail, SsrSession, UserAuthOptions, UserMatch, route_guard,
};
use chrono::{Duration, Utc};
use serde_json::{Value, json};

pub const SECRET: &str = "test-secret-key-that-is-at-least-32-characters-long";
pub const SESSION_COOKIE: &str = "better-auth.session_token";

// ---------------------------------------------------------------------------
// Unique email generator
// ---------------------------------------------------------------------------

static EMAIL_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Generate a unique email address for testing, avoiding hard-coded collisions.
pub fn unique_email(prefix: &str) -> String {
    let n = EMAIL_COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("{prefix}_{n}@test.com")
}

// ---------------------------------------------------------------------------
// In-memory auth library
// ---------------------------------------------------------------------------

struct StoredUser {
    user: Value,
    password_hash: String,
}

struct StoredSession {
    id: String,
    user_id: String,
    expires_at: chrono::DateTime<Utc>,
}

/// Database handle of the test library: users by email, sessions by token.
#[derive(Default)]
pub struct MemoryStore {
    users: Mutex<HashMap<String, StoredUser>>,
    sessions: Mutex<HashMap<String, StoredSession>>,
    session_lookups: AtomicUsize,
}

impl MemoryStore {
    pub fn set_role(&self, email: &str, role: &str) {
        if let Some(stored) = self.users.lock().unwrap().get_mut(email) {
            stored.user["role"] = json!(role);
        }
    }

    /// Number of `get-session` calls answered so far.
    pub fn session_lookups(&self) -> usize {
        self.session_lookups.load(Ordering::SeqCst)
    }

    pub fn session_count(&self) -> usize {
        self.sessions.lock().unwrap().len()
    }

    fn user_by_id(&self, id: &str) -> Option<Value> {
        self.users
            .lock()
            .unwrap()
            .values()
            .find(|stored| stored.user["id"] == id)
            .map(|stored| stored.user.clone())
    }

    fn create_session(&self, user_id: &str) -> (String, Value) {
        let token = uuid::Uuid::new_v4().simple().to_string();
        let session = StoredSession {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            expires_at: Utc::now() + Duration::days(7),
        };
        let wire = session_json(&session, &token);
        self.sessions.lock().unwrap().insert(token.clone(), session);
        (token, wire)
    }
}

fn session_json(session: &StoredSession, token: &str) -> Value {
    json!({
        "id": session.id,
        "token": token,
        "userId": session.user_id,
        "expiresAt": session.expires_at.to_rfc3339(),
        "ipAddress": "127.0.0.1",
    })
}

fn hasher() -> Argon2<'static> {
    // Cheap parameters keep the suite fast.
    let params = Params::new(1024, 1, 1, None).unwrap();
    Argon2::new(Algorithm::Argon2id, Version::V0x13, params)
}

fn hash_password(password: &str) -> String {
    let salt = SaltString::encode_b64(uuid::Uuid::new_v4().as_bytes()).unwrap();
    hasher()
        .hash_password(password.as_bytes(), &salt)
        .unwrap()
        .to_string()
}

fn verify_password(password: &str, hash: &str) -> bool {
    PasswordHash::new(hash)
        .map(|parsed| hasher().verify_password(password.as_bytes(), &parsed).is_ok())
        .unwrap_or(false)
}

/// Extract the session token from `Authorization: Bearer` or the session
/// cookie.
fn session_token(req: &AuthRequest) -> Option<String> {
    if let Some(auth_header) = req.header("authorization")
        && let Some(token) = auth_header.strip_prefix("Bearer ")
    {
        return Some(token.to_string());
    }

    let cookie_header = req.header("cookie")?;
    cookie_header.split(';').find_map(|part| {
        part.trim()
            .strip_prefix(&format!("{SESSION_COOKIE}="))
            .filter(|value| !value.is_empty())
            .map(str::to_string)
    })
}

fn session_cookie(token: &str) -> String {
    format!("{SESSION_COOKIE}={token}; Path=/; HttpOnly; SameSite=Lax; Max-Age=604800")
}

fn clear_session_cookie() -> String {
    format!("{SESSION_COOKIE}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0")
}

fn json_response(status: u16, body: Value) -> AuthResponse {
    AuthResponse::json(status, &body).unwrap()
}

/// The wrapped auth library, as far as the tests need it.
pub struct TestAuth {
    db: Arc<MemoryStore>,
    base_path: String,
    min_password_length: usize,
}

impl TestAuth {
    pub fn new(options: AuthOptions<MemoryStore>) -> AuthResult<Self> {
        let db = options
            .database
            .map(|binding| binding.handle)
            .ok_or_else(|| AuthError::config("test auth requires a database"))?;
        assert_eq!(options.secret, SECRET);

        Ok(Self {
            db,
            base_path: options.base_path,
            min_password_length: options.user.email_and_password.min_password_length.unwrap_or(8),
        })
    }

    fn sign_up(&self, req: &AuthRequest) -> AuthResult<AuthResponse> {
        let body: SignUpEmail = req.body_as_json()?;
        if body.password.len() < self.min_password_length {
            return Err(AuthError::bad_request(format!(
                "Password must be at least {} characters",
                self.min_password_length
            )));
        }

        let mut users = self.db.users.lock().unwrap();
        if users.contains_key(&body.email) {
            return Ok(json_response(
                422,
                json!({ "code": "USER_ALREADY_EXISTS", "message": "User already exists" }),
            ));
        }

        let user = json!({
            "id": uuid::Uuid::new_v4().to_string(),
            "email": body.email,
            "name": body.name,
            "emailVerified": false,
            "role": "user",
            "createdAt": Utc::now().to_rfc3339(),
        });
        users.insert(
            body.email.clone(),
            StoredUser {
                user: user.clone(),
                password_hash: hash_password(&body.password),
            },
        );
        drop(users);

        let user_id = user["id"].as_str().unwrap_or_default().to_string();
        let (token, _) = self.db.create_session(&user_id);
        Ok(json_response(200, json!({ "token": token, "user": user }))
            .with_header("set-cookie", session_cookie(&token)))
    }

    fn sign_in(&self, req: &AuthRequest) -> AuthResult<AuthResponse> {
        let body: SignInEmail = req.body_as_json()?;
        let user = {
            let users = self.db.users.lock().unwrap();
            users
                .get(&body.email)
                .filter(|stored| verify_password(&body.password, &stored.password_hash))
                .map(|stored| stored.user.clone())
        };

        let Some(user) = user else {
            return Ok(json_response(
                401,
                json!({ "code": "INVALID_EMAIL_OR_PASSWORD", "message": "Invalid email or password" }),
            ));
        };

        let user_id = user["id"].as_str().unwrap_or_default().to_string();
        let (token, _) = self.db.create_session(&user_id);
        Ok(
            json_response(200, json!({ "redirect": false, "token": token, "user": user }))
                .with_header("set-cookie", session_cookie(&token)),
        )
    }

    fn get_session(&self, req: &AuthRequest) -> AuthResponse {
        self.db.session_lookups.fetch_add(1, Ordering::SeqCst);
        let found = session_token(req).and_then(|token| {
            let sessions = self.db.sessions.lock().unwrap();
            sessions
                .get(&token)
                .filter(|session| session.expires_at > Utc::now())
                .map(|session| (session_json(session, &token), session.user_id.clone()))
        });

        match found.and_then(|(session, user_id)| Some((session, self.db.user_by_id(&user_id)?))) {
            Some((session, user)) => json_response(200, json!({ "session": session, "user": user })),
            None => json_response(200, Value::Null),
        }
    }

    fn sign_out(&self, req: &AuthRequest) -> AuthResponse {
        if let Some(token) = session_token(req) {
            self.db.sessions.lock().unwrap().remove(&token);
        }
        json_response(200, json!({ "success": true }))
            .with_header("set-cookie", clear_session_cookie())
    }
}

#[async_trait]
impl AuthInstance for TestAuth {
    fn base_path(&self) -> &str {
        &self.base_path
    }

    async fn handler(&self, req: AuthRequest) -> AuthResponse {
        let route = req
            .path
            .strip_prefix(&self.base_path)
            .unwrap_or(&req.path)
            .to_string();

        let result = match (req.method, route.as_str()) {
            (HttpMethod::Post, "/sign-up/email") => self.sign_up(&req),
            (HttpMethod::Post, "/sign-in/email") => self.sign_in(&req),
            (HttpMethod::Get, "/get-session") => Ok(self.get_session(&req)),
            (HttpMethod::Post, "/sign-out") => Ok(self.sign_out(&req)),
            (HttpMethod::Get, "/ok") => Ok(json_response(200, json!({ "ok": true }))),
            _ => Ok(json_response(404, json!({ "message": "Not found" }))),
        };

        result.unwrap_or_else(AuthError::into_response)
    }
}

// ---------------------------------------------------------------------------
// Application under test
// ---------------------------------------------------------------------------

/// `ServerAuth` backed by [`TestAuth`], plus handles the tests inspect.
pub struct TestApp {
    pub auth: Arc<ServerAuth<MemoryStore>>,
    pub db: Arc<MemoryStore>,
    pub instances_created: Arc<AtomicUsize>,
}

impl TestApp {
    pub fn new() -> Self {
        let db = Arc::new(MemoryStore::default());
        let instances_created = Arc::new(AtomicUsize::new(0));
        let counter = instances_created.clone();

        let auth = ServerAuth::builder(RuntimeConfig::new(SECRET).site_url("http://localhost:3000"))
            .shared_database(db.clone(), DatabaseProvider::Sqlite)
            .configure(|_ctx| {
                UserAuthOptions::new()
                    .app_name("Bridge Test")
                    .email_and_password(true)
                    .min_password_length(8)
            })
            .build(
                move |options: AuthOptions<MemoryStore>| -> AuthResult<Arc<dyn AuthInstance>> {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok(Arc::new(TestAuth::new(options)?))
                },
            )
            .expect("Failed to build test ServerAuth");

        Self {
            auth: Arc::new(auth),
            db,
            instances_created,
        }
    }

    pub fn instances_created(&self) -> usize {
        self.instances_created.load(Ordering::SeqCst)
    }

    /// Rules used by the integration router.
    pub fn rules() -> RouteRules {
        let admins = UserMatch::new().field("role", "admin");
        RouteRules::new()
            .rule("/api/test/public", RouteAuth::Public)
            .rule("/api/test/**", RouteAuth::User)
            .rule("/api", RouteAuth::User)
            .rule("/account", RouteAuth::User)
            .rule("/protected", RouteAuth::User)
            .rule("/login", RouteAuth::Guest)
            .rule(
                "/admin/**",
                RouteAuth::Match {
                    user: admins.clone(),
                    redirect: Some("/forbidden".to_string()),
                },
            )
            .rule(
                "/api/admin/**",
                RouteAuth::Match {
                    user: admins,
                    redirect: None,
                },
            )
    }

    /// Router mirroring a small application: auth proxy, guarded pages and
    /// APIs, and a server-rendered page.
    pub fn router(&self) -> Router {
        let guard = RouteGuard::new(self.auth.clone(), Self::rules());

        Router::new()
            .merge(self.auth.clone().axum_router())
            .route("/api/test/public", get(|| async { Json(json!({ "status": "ok" })) }))
            .route("/api/test/me", get(me))
            .route("/api/test/instance", get(instance_probe))
            .route("/api/admin/stats", get(|| async { Json(json!({ "users": 1 })) }))
            .route("/protected", get(|| async { "protected page" }))
            .route("/login", get(|| async { "login page" }))
            .route("/admin", get(|| async { "admin page" }))
            .route("/api", get(|| async { Json(json!({ "version": 1 })) }))
            .route("/ssr", get(ssr_page))
            .route("/account", get(ssr_page))
            .layer(axum::middleware::from_fn_with_state(
                guard,
                route_guard::<MemoryStore>,
            ))
            .with_state(self.auth.clone())
    }
}

async fn me(CurrentUserSession(session): CurrentUserSession) -> Json<Value> {
    Json(json!({ "user": session.user }))
}

async fn instance_probe(
    RequestAuth(first): RequestAuth,
    OptionalUserSession(session): OptionalUserSession,
    RequestAuth(second): RequestAuth,
) -> Json<Value> {
    Json(json!({
        "same_instance": Arc::ptr_eq(&first, &second),
        "logged_in": session.is_some(),
    }))
}

async fn ssr_page(SsrSession(session): SsrSession) -> Json<HydrationPayload> {
    Json(HydrationPayload::rendered(session.state()))
}

// ---------------------------------------------------------------------------
// Request helpers
// ---------------------------------------------------------------------------

/// Build a JSON POST request.
pub fn post_json(uri: &str, body: Value, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header("content-type", "application/json");
    if let Some(cookie) = cookie {
        builder = builder.header("cookie", cookie);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

/// Build a GET request, optionally with a cookie.
pub fn get_request(uri: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(Method::GET).uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header("cookie", cookie);
    }
    builder.body(Body::empty()).unwrap()
}

/// `name=value` part of the response's `set-cookie` header, if any.
pub fn cookie_from(response: &Response) -> Option<String> {
    response
        .headers()
        .get("set-cookie")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(';').next())
        .map(str::to_string)
}

/// Read the response body as JSON (`Value::Null` when empty).
pub async fn body_json(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    if bytes.is_empty() {
        return Value::Null;
    }
    serde_json::from_slice(&bytes)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).to_string()))
}

pub fn sign_up_body(email: &str) -> Value {
    json!({ "email": email, "password": "password123", "name": "A" })
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
