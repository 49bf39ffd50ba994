// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Cookie-keyed HTTP sessions.
//!
//! [`SessionManager::layer`] loads (or creates) a [`WebSession`] for every
//! request, exposes it as a request extension and, once the handler has
//! produced its response:
//!
//! - expired session: deletes it and sends a cookie dated 2000-01-01
//! - modified session: saves it and (re)sends the cookie
//! - otherwise: leaves store and cookie alone

use crate::config::{CookieConfig, SessionConfig};
use axum::extract::{Request, State};
use axum::http::header::{self, HeaderMap, HeaderValue};
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::Router;
use cookie::time::{Date, Duration, Month, OffsetDateTime};
use cookie::Cookie;
use parking_lot::Mutex;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Generate a fresh session key (32 lowercase hex digits).
pub fn generate_key() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

fn is_valid_key(sid: &str) -> bool {
    (32..=64).contains(&sid.len()) && sid.bytes().all(|b| b.is_ascii_hexdigit())
}

// ---------------------------------------------------------------------------
// WebSession
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct SessionState {
    sid: String,
    data: Map<String, Value>,
    new: bool,
    modified: bool,
    expired: bool,
}

/// A cookie session shared between the middleware and the handler.
#[derive(Debug, Clone)]
pub struct WebSession {
    state: Arc<Mutex<SessionState>>,
}

impl WebSession {
    fn from_parts(sid: String, data: Map<String, Value>, new: bool) -> Self {
        Self {
            state: Arc::new(Mutex::new(SessionState {
                sid,
                data,
                new,
                modified: false,
                expired: false,
            })),
        }
    }

    pub fn sid(&self) -> String {
        self.state.lock().sid.clone()
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.state.lock().data.get(key).cloned()
    }

    pub fn insert(&self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        let mut state = self.state.lock();
        state.modified = true;
        state.data.insert(key.into(), value.into())
    }

    pub fn remove(&self, key: &str) -> Option<Value> {
        let mut state = self.state.lock();
        let removed = state.data.remove(key);
        if removed.is_some() {
            state.modified = true;
        }
        removed
    }

    /// Snapshot of the session data.
    pub fn data(&self) -> Map<String, Value> {
        self.state.lock().data.clone()
    }

    pub fn is_new(&self) -> bool {
        self.state.lock().new
    }

    pub fn is_modified(&self) -> bool {
        self.state.lock().modified
    }

    pub fn is_expired(&self) -> bool {
        self.state.lock().expired
    }

    /// Whether the store should persist this session.
    pub fn should_save(&self) -> bool {
        self.state.lock().modified
    }

    /// Mark the session for deletion at the end of the request.
    pub fn expire(&self) {
        self.state.lock().expired = true;
    }

    /// Move the session to a fresh key (e.g. after login).
    pub fn rekey(&self) {
        let mut state = self.state.lock();
        state.sid = generate_key();
        state.modified = true;
    }

    fn mark_saved(&self) {
        let mut state = self.state.lock();
        state.new = false;
        state.modified = false;
    }
}

// ---------------------------------------------------------------------------
// Stores
// ---------------------------------------------------------------------------

/// Persistence backend for web sessions.
pub trait SessionStore: Send + Sync + 'static {
    /// Load session data for `sid`; `None` when unknown.
    fn load(&self, sid: &str) -> io::Result<Option<Map<String, Value>>>;

    fn save(&self, sid: &str, data: &Map<String, Value>) -> io::Result<()>;

    fn delete(&self, sid: &str) -> io::Result<()>;

    /// A brand-new empty session.
    fn new_session(&self) -> WebSession {
        WebSession::from_parts(generate_key(), Map::new(), true)
    }

    /// The session for `sid`. Malformed keys yield a new session; unknown
    /// keys yield an empty, non-new session under the same key.
    fn get(&self, sid: &str) -> io::Result<WebSession> {
        if !is_valid_key(sid) {
            return Ok(self.new_session());
        }
        let data = self.load(sid)?.unwrap_or_default();
        Ok(WebSession::from_parts(sid.to_string(), data, false))
    }
}

/// Sessions as JSON files, one per key.
#[derive(Debug, Clone)]
pub struct FilesystemSessionStore {
    path: PathBuf,
}

impl FilesystemSessionStore {
    pub fn new(path: impl Into<PathBuf>) -> io::Result<Self> {
        let path = path.into();
        std::fs::create_dir_all(&path)?;
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn file_for(&self, sid: &str) -> PathBuf {
        self.path.join(format!("spire-session-{}.json", sid))
    }
}

impl SessionStore for FilesystemSessionStore {
    fn load(&self, sid: &str) -> io::Result<Option<Map<String, Value>>> {
        let content = match std::fs::read(self.file_for(sid)) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e),
        };
        match serde_json::from_slice(&content) {
            Ok(data) => Ok(Some(data)),
            Err(e) => {
                tracing::warn!("discarding unreadable session {}: {}", sid, e);
                Ok(None)
            }
        }
    }

    fn save(&self, sid: &str, data: &Map<String, Value>) -> io::Result<()> {
        let target = self.file_for(sid);
        let partial = target.with_extension("json.tmp");
        std::fs::write(&partial, serde_json::to_vec(data)?)?;
        std::fs::rename(partial, target)
    }

    fn delete(&self, sid: &str) -> io::Result<()> {
        match std::fs::remove_file(self.file_for(sid)) {
            Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
            _ => Ok(()),
        }
    }
}

/// Sessions kept in process memory.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    sessions: Mutex<HashMap<String, Map<String, Value>>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.sessions.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.lock().is_empty()
    }
}

impl SessionStore for MemorySessionStore {
    fn load(&self, sid: &str) -> io::Result<Option<Map<String, Value>>> {
        Ok(self.sessions.lock().get(sid).cloned())
    }

    fn save(&self, sid: &str, data: &Map<String, Value>) -> io::Result<()> {
        self.sessions.lock().insert(sid.to_string(), data.clone());
        Ok(())
    }

    fn delete(&self, sid: &str) -> io::Result<()> {
        self.sessions.lock().remove(sid);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Middleware
// ---------------------------------------------------------------------------

/// Attaches web sessions to requests.
pub struct SessionManager {
    config: SessionConfig,
    store: Arc<dyn SessionStore>,
}

impl SessionManager {
    pub fn new(config: SessionConfig, store: Arc<dyn SessionStore>) -> Self {
        Self { config, store }
    }

    /// Manager backed by a [`FilesystemSessionStore`] at the configured path
    /// (the system temp dir by default).
    pub fn from_config(config: SessionConfig) -> io::Result<Self> {
        let path = config
            .store
            .path
            .clone()
            .unwrap_or_else(std::env::temp_dir);
        let store = FilesystemSessionStore::new(path)?;
        Ok(Self::new(config, Arc::new(store)))
    }

    pub fn store(&self) -> &dyn SessionStore {
        self.store.as_ref()
    }

    /// Wrap `router` with the session middleware.
    pub fn layer(self: Arc<Self>, router: Router) -> Router {
        router.layer(middleware::from_fn_with_state(self, session_middleware))
    }

    fn load(&self, headers: &HeaderMap) -> WebSession {
        let sid = read_cookie(headers, &self.config.cookie.name);
        let loaded = match sid {
            Some(sid) => self.store.get(&sid),
            None => Ok(self.store.new_session()),
        };
        loaded.unwrap_or_else(|e| {
            tracing::warn!("session store failed to load, starting fresh: {}", e);
            self.store.new_session()
        })
    }

    fn finish(&self, session: &WebSession, headers: &mut HeaderMap) {
        let sid = session.sid();
        let cookie = if session.is_expired() {
            if let Err(e) = self.store.delete(&sid) {
                tracing::warn!("failed to delete session {}: {}", sid, e);
            }
            Some(build_cookie(&self.config.cookie, &sid, true))
        } else if session.should_save() {
            match self.store.save(&sid, &session.data()) {
                Ok(()) => {
                    session.mark_saved();
                    Some(build_cookie(&self.config.cookie, &sid, false))
                }
                Err(e) => {
                    tracing::warn!("failed to save session {}: {}", sid, e);
                    None
                }
            }
        } else {
            None
        };

        if let Some(cookie) = cookie {
            match HeaderValue::from_str(&cookie.to_string()) {
                Ok(value) => {
                    headers.append(header::SET_COOKIE, value);
                }
                Err(_) => tracing::warn!("session cookie is not a valid header value"),
            }
        }
    }
}

async fn session_middleware(
    State(manager): State<Arc<SessionManager>>,
    mut request: Request,
    next: Next,
) -> Response {
    if !manager.config.enabled {
        return next.run(request).await;
    }
    let session = manager.load(request.headers());
    request.extensions_mut().insert(session.clone());
    let mut response = next.run(request).await;
    manager.finish(&session, response.headers_mut());
    response
}

/// Value of cookie `name` in the request's `Cookie` headers.
fn read_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(Cookie::split_parse)
        .filter_map(Result::ok)
        .find(|cookie| cookie.name() == name)
        .map(|cookie| cookie.value_trimmed().to_string())
}

/// Expiry sent when a session is unset.
fn unset_expiry() -> OffsetDateTime {
    Date::from_calendar_date(2000, Month::January, 1)
        .map(|date| date.midnight().assume_utc())
        .unwrap_or(OffsetDateTime::UNIX_EPOCH)
}

/// The `Set-Cookie` for `sid`. `unset` dates the cookie in the past.
fn build_cookie(config: &CookieConfig, sid: &str, unset: bool) -> Cookie<'static> {
    let mut builder = Cookie::build((config.name.clone(), sid.to_string()))
        .path(config.path.clone())
        .secure(config.secure)
        .http_only(config.http_only);
    if let Some(domain) = &config.domain {
        builder = builder.domain(domain.clone());
    }

    if unset {
        builder = builder.expires(unset_expiry());
    } else if let Some(age) = config.max_age.and_then(|age| i64::try_from(age).ok()) {
        let age = Duration::seconds(age);
        builder = builder.max_age(age);
        if let Some(expires) = OffsetDateTime::now_utc().checked_add(age) {
            builder = builder.expires(expires);
        }
    }
    builder.build()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::StatusCode;
    use axum::routing::get;
    use axum::Extension;
    use tower::ServiceExt;

    fn app(manager: Arc<SessionManager>) -> Router {
        let routes = Router::new()
            .route(
                "/login",
                get(|Extension(session): Extension<WebSession>| async move {
                    session.insert("user", "alice");
                    StatusCode::OK
                }),
            )
            .route(
                "/whoami",
                get(|Extension(session): Extension<WebSession>| async move {
                    session
                        .get("user")
                        .and_then(|v| v.as_str().map(str::to_string))
                        .unwrap_or_default()
                }),
            )
            .route(
                "/logout",
                get(|Extension(session): Extension<WebSession>| async move {
                    session.expire();
                    StatusCode::OK
                }),
            );
        manager.layer(routes)
    }

    fn manager(store: Arc<MemorySessionStore>) -> Arc<SessionManager> {
        Arc::new(SessionManager::new(SessionConfig::default(), store))
    }

    fn request(uri: &str, cookie: Option<&str>) -> Request {
        let mut builder = Request::builder().uri(uri);
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        builder.body(Body::empty()).unwrap()
    }

    fn set_cookie(response: &Response) -> Option<String> {
        response
            .headers()
            .get(header::SET_COOKIE)
            .map(|v| v.to_str().unwrap().to_string())
    }

    #[test]
    fn reads_named_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; sessionid=\"abc\"; lang=en"),
        );
        assert_eq!(read_cookie(&headers, "sessionid").as_deref(), Some("abc"));
        assert_eq!(read_cookie(&headers, "missing"), None);
    }

    #[test]
    fn reads_cookie_across_headers_and_skips_garbage() {
        let mut headers = HeaderMap::new();
        headers.append(header::COOKIE, HeaderValue::from_static("=orphan; theme"));
        headers.append(header::COOKIE, HeaderValue::from_static("sessionid=def; x=1"));
        assert_eq!(read_cookie(&headers, "sessionid").as_deref(), Some("def"));
        assert_eq!(read_cookie(&headers, "theme"), None);
    }

    #[test]
    fn cookie_attributes() {
        let config = CookieConfig {
            max_age: Some(60),
            secure: true,
            domain: Some("example.com".into()),
            ..CookieConfig::default()
        };
        let cookie = build_cookie(&config, "abc", false);
        assert_eq!((cookie.name(), cookie.value()), ("sessionid", "abc"));
        assert_eq!(cookie.max_age(), Some(Duration::seconds(60)));
        assert!(cookie.expires_datetime().is_some());
        assert_eq!(cookie.domain(), Some("example.com"));
        assert_eq!(cookie.path(), Some("/"));
        assert_eq!(cookie.secure(), Some(true));
        assert_eq!(cookie.http_only(), Some(true));

        let unset = build_cookie(&CookieConfig::default(), "abc", true);
        assert_eq!(unset.expires_datetime(), Some(unset_expiry()));
        assert_eq!(unset.max_age(), None);
        assert!(unset
            .to_string()
            .contains("Expires=Sat, 01 Jan 2000 00:00:00 GMT"));
    }

    #[test]
    fn oversized_max_age_keeps_cookie_valid() {
        let config = CookieConfig {
            max_age: Some(u64::MAX),
            ..CookieConfig::default()
        };
        let cookie = build_cookie(&config, "abc", false);
        assert_eq!(cookie.max_age(), None);
        assert!(HeaderValue::from_str(&cookie.to_string()).is_ok());
    }

    #[test]
    fn malformed_keys_start_new_sessions() {
        let store = MemorySessionStore::new();
        let session = store.get("../../etc/passwd").unwrap();
        assert!(session.is_new());
        assert_ne!(session.sid(), "../../etc/passwd");
    }

    #[tokio::test]
    async fn untouched_session_sets_no_cookie() {
        let store = Arc::new(MemorySessionStore::new());
        let response = app(manager(Arc::clone(&store)))
            .oneshot(request("/whoami", None))
            .await
            .unwrap();
        assert!(set_cookie(&response).is_none());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn login_then_whoami_then_logout() {
        let store = Arc::new(MemorySessionStore::new());
        let app = app(manager(Arc::clone(&store)));

        let response = app.clone().oneshot(request("/login", None)).await.unwrap();
        let cookie = set_cookie(&response).expect("login sets a cookie");
        let pair = cookie.split(';').next().unwrap().to_string();
        assert_eq!(store.len(), 1);

        let response = app
            .clone()
            .oneshot(request("/whoami", Some(&pair)))
            .await
            .unwrap();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&body[..], b"alice");

        let response = app.oneshot(request("/logout", Some(&pair))).await.unwrap();
        let cleared = set_cookie(&response).expect("logout clears the cookie");
        assert!(cleared.contains("2000"));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn disabled_manager_attaches_nothing() {
        let store = Arc::new(MemorySessionStore::new());
        let config = SessionConfig {
            enabled: false,
            ..SessionConfig::default()
        };
        let manager = Arc::new(SessionManager::new(config, store));
        let app = manager.layer(Router::new().route(
            "/",
            get(|session: Option<Extension<WebSession>>| async move {
                if session.is_some() {
                    StatusCode::OK
                } else {
                    StatusCode::NO_CONTENT
                }
            }),
        ));
        let response = app.oneshot(request("/", None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
    }

    #[test]
    fn filesystem_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FilesystemSessionStore::new(dir.path()).unwrap();

        let session = store.new_session();
        session.insert("cart", serde_json::json!([1, 2, 3]));
        store.save(&session.sid(), &session.data()).unwrap();

        let loaded = store.get(&session.sid()).unwrap();
        assert!(!loaded.is_new());
        assert_eq!(loaded.get("cart"), Some(serde_json::json!([1, 2, 3])));

        store.delete(&session.sid()).unwrap();
        assert!(store.load(&session.sid()).unwrap().is_none());
        store.delete(&session.sid()).unwrap();
    }

    #[test]
    fn rekey_changes_sid_and_marks_modified() {
        let session = MemorySessionStore::new().new_session();
        let before = session.sid();
        session.rekey();
        assert_ne!(session.sid(), before);
        assert!(session.should_save());
    }
}
