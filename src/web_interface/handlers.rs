//! Request handling behind the HTTP routes.
//!
//! `DemoService` owns the server state and implements each endpoint as a plain
//! method, so the routing layer only deals with extraction and status codes.

use std::sync::{Arc, LazyLock, Mutex};

use chrono::{DateTime, Utc};
use log::{info, warn};
use regex::Regex;
use serde_json::{Map, Value};
use uuid::Uuid;
use warp::http::StatusCode;

use super::types::*;
use crate::error_handling::types::{SessionError, StorageError};
use crate::session_management::SessionManager;
use crate::storage::types::{Message, User};
use crate::storage::Storage;

pub const DEFAULT_PAGE_SIZE: usize = 10;
pub const DEFAULT_SEARCH_LIMIT: usize = 10;
pub const MAX_SEARCH_LIMIT: usize = 100;
const SEARCH_CATEGORIES: [&str; 4] = ["articles", "products", "users", "documents"];

/// Failure of a handler, carrying the HTTP status it maps to.
#[derive(Debug, PartialEq)]
pub struct ServiceError {
    pub status: StatusCode,
    pub message: String,
}

impl ServiceError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, message)
    }

    fn internal() -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
    }
}

impl From<StorageError> for ServiceError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Conflict(_) => Self::new(StatusCode::CONFLICT, "Username already exists"),
            StorageError::NotFound(_) => Self::new(StatusCode::NOT_FOUND, "User not found"),
            StorageError::LockPoisoned => Self::internal(),
        }
    }
}

impl From<SessionError> for ServiceError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::NotFound => Self::unauthorized("Invalid session token"),
            SessionError::Expired => Self::unauthorized("Session expired"),
            SessionError::LockPoisoned => Self::internal(),
        }
    }
}

static USERNAME_PATTERN: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_.-]{1,64}$").ok());

/// Usernames: 1 to 64 characters from `[A-Za-z0-9_.-]`.
fn is_valid_username(username: &str) -> bool {
    USERNAME_PATTERN
        .as_ref()
        .is_some_and(|re| re.is_match(username))
}

/// Server state shared by every route.
///
/// # Fields Overview
///
/// - `storage`: accounts and messages
/// - `sessions`: login tokens
/// - `account_guard`: serializes register, login, logout and delete so that
///   account and session changes are applied together
/// - `large_dataset_size`: item count of `GET /data/large`
pub struct DemoService {
    storage: Arc<dyn Storage>,
    sessions: Arc<SessionManager>,
    account_guard: Mutex<()>,
    large_dataset_size: usize,
    started_at: DateTime<Utc>,
}

impl DemoService {
    pub fn new(
        storage: Arc<dyn Storage>,
        sessions: Arc<SessionManager>,
        large_dataset_size: usize,
    ) -> Self {
        Self {
            storage,
            sessions,
            account_guard: Mutex::new(()),
            large_dataset_size,
            started_at: Utc::now(),
        }
    }

    pub fn sessions(&self) -> Arc<SessionManager> {
        self.sessions.clone()
    }

    pub fn root(&self) -> RootResponse {
        RootResponse {
            message: "Hello from the trafficlab demo server!".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    pub fn health(&self) -> Result<HealthResponse, ServiceError> {
        let now = Utc::now();
        Ok(HealthResponse {
            status: "healthy".to_string(),
            timestamp: now,
            uptime_secs: (now - self.started_at).num_seconds(),
            users: self.storage.user_count()?,
            messages: self.storage.message_count()?,
            active_sessions: self.sessions.get_active_session_count()?,
        })
    }

    pub fn register(&self, req: RegisterRequest) -> Result<RegisterResponse, ServiceError> {
        if !is_valid_username(&req.username) {
            return Err(ServiceError::bad_request(
                "Username must be 1-64 characters of letters, digits, '_', '.' or '-'",
            ));
        }
        if req.password.is_empty() {
            return Err(ServiceError::bad_request("Password must not be empty"));
        }

        let _guard = self.account_guard.lock().map_err(|_| ServiceError::internal())?;
        let username = req.username.clone();
        self.storage
            .insert_user(User::new(req.username, req.email, req.password))?;
        info!("Registered user {}", username);

        Ok(RegisterResponse {
            message: "User registered successfully".to_string(),
            username,
        })
    }

    pub fn login(&self, req: LoginRequest) -> Result<LoginResponse, ServiceError> {
        let _guard = self.account_guard.lock().map_err(|_| ServiceError::internal())?;
        let user = match self.storage.get_user(&req.username) {
            Ok(user) => user,
            Err(StorageError::NotFound(_)) => {
                warn!("Login attempt for unknown user {}", req.username);
                return Err(ServiceError::unauthorized("Invalid credentials"));
            }
            Err(e) => return Err(e.into()),
        };
        if user.password != req.password {
            warn!("Bad password for user {}", req.username);
            return Err(ServiceError::unauthorized("Invalid credentials"));
        }

        let session = self.sessions.create_session(&user.username)?;
        self.storage.record_login(&user.username, session.created_at)?;
        info!("User {} logged in", user.username);

        Ok(LoginResponse {
            token: session.token,
            username: session.username,
            expires_in: self.sessions.session_timeout().as_secs(),
        })
    }

    pub fn logout(&self, req: LogoutRequest) -> Result<MessageResponse, ServiceError> {
        let _guard = self.account_guard.lock().map_err(|_| ServiceError::internal())?;
        let session = self.sessions.validate(&req.token)?;
        self.sessions.remove_session(&session.token)?;
        info!("User {} logged out", session.username);

        Ok(MessageResponse {
            message: "Logged out".to_string(),
        })
    }

    pub fn get_user(&self, username: &str) -> Result<UserProfile, ServiceError> {
        Ok(self.storage.get_user(username)?.into())
    }

    /// Removes the account and every session that references it.
    pub fn delete_user(&self, username: &str) -> Result<DeleteUserResponse, ServiceError> {
        let _guard = self.account_guard.lock().map_err(|_| ServiceError::internal())?;
        self.storage.remove_user(username)?;
        let sessions_invalidated = self.sessions.invalidate_user(username)?;
        info!(
            "Deleted user {} ({} session(s) invalidated)",
            username, sessions_invalidated
        );

        Ok(DeleteUserResponse {
            message: "User deleted".to_string(),
            username: username.to_string(),
            sessions_invalidated,
        })
    }

    pub fn post_message(&self, req: NewMessage) -> Result<Message, ServiceError> {
        let message = Message::new(req.sender, req.recipient, req.content);
        self.storage.append_message(message.clone())?;
        Ok(message)
    }

    pub fn list_messages(&self, page: Pagination) -> Result<MessagePage, ServiceError> {
        let limit = page.limit.unwrap_or(DEFAULT_PAGE_SIZE);
        let offset = page.offset.unwrap_or(0);
        Ok(MessagePage {
            messages: self.storage.list_messages(limit, offset)?,
            total: self.storage.message_count()?,
            limit,
            offset,
        })
    }

    pub fn data(&self) -> DataResponse {
        DataResponse {
            status: "success".to_string(),
            data: vec![1, 2, 3, 4, 5],
        }
    }

    pub fn large_data(&self) -> LargeDataResponse {
        let data: Vec<LargeDataItem> = (0..self.large_dataset_size)
            .map(|i| LargeDataItem {
                id: i,
                name: format!("item_{:05}", i),
                value: ((i * 37) % 1000) as f64 / 10.0,
                description: format!(
                    "Synthetic record {} generated to produce a sizeable response body",
                    i
                ),
                tags: vec![
                    SEARCH_CATEGORIES[i % SEARCH_CATEGORIES.len()].to_string(),
                    format!("batch-{}", i / 100),
                ],
            })
            .collect();

        LargeDataResponse {
            status: "success".to_string(),
            count: data.len(),
            data,
        }
    }

    /// Fabricates results from the query alone; the same inputs always give
    /// the same answer. Scores decrease with rank and stay within `(0, 1]`.
    pub fn search(&self, query: SearchQuery) -> SearchResponse {
        let q = query.q.unwrap_or_default();
        let category = query.category.unwrap_or_else(|| "all".to_string());
        let limit = query
            .limit
            .unwrap_or(DEFAULT_SEARCH_LIMIT)
            .min(MAX_SEARCH_LIMIT);
        let relevance = if q.is_empty() { 0.5 } else { 1.0 };

        let results: Vec<SearchResult> = (0..limit)
            .map(|rank| {
                let result_category = if category == "all" {
                    SEARCH_CATEGORIES[(q.len() + rank) % SEARCH_CATEGORIES.len()].to_string()
                } else {
                    category.clone()
                };
                let score = relevance / (1.0 + rank as f64 * 0.1);
                SearchResult {
                    id: rank + 1,
                    title: format!("Result {} for '{}'", rank + 1, q),
                    category: result_category,
                    score: (score * 10_000.0).round() / 10_000.0,
                }
            })
            .collect();

        SearchResponse {
            query: q,
            category,
            total: results.len(),
            results,
        }
    }

    pub fn upload_metadata(&self, meta: UploadMetadata) -> Result<UploadAck, ServiceError> {
        if meta.filename.trim().is_empty() {
            return Err(ServiceError::bad_request("filename must not be empty"));
        }
        Ok(UploadAck {
            status: "received".to_string(),
            upload_id: Uuid::new_v4(),
            filename: meta.filename,
            size: meta.size,
            received_at: Utc::now(),
        })
    }

    pub fn echo(&self, body: Map<String, Value>) -> EchoResponse {
        EchoResponse {
            received: body,
            echo: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;
    use std::time::Duration;

    fn service() -> DemoService {
        DemoService::new(
            Arc::new(MemoryStorage::new()),
            Arc::new(SessionManager::new(Duration::from_secs(3600))),
            50,
        )
    }

    fn register(service: &DemoService, name: &str, password: &str) {
        service
            .register(RegisterRequest {
                username: name.into(),
                email: format!("{}@example.com", name),
                password: password.into(),
            })
            .unwrap();
    }

    fn login(service: &DemoService, name: &str, password: &str) -> Result<LoginResponse, ServiceError> {
        service.login(LoginRequest {
            username: name.into(),
            password: password.into(),
        })
    }

    #[test]
    fn test_register_twice_conflicts() {
        let service = service();
        register(&service, "alice", "pw");

        let err = service
            .register(RegisterRequest {
                username: "alice".into(),
                email: "other@example.com".into(),
                password: "pw2".into(),
            })
            .unwrap_err();
        assert_eq!(err.status, StatusCode::CONFLICT);
    }

    #[test]
    fn test_register_rejects_malformed_username() {
        let service = service();
        let too_long = "x".repeat(65);
        for bad in ["", "has space", "slash/name", too_long.as_str()] {
            let err = service
                .register(RegisterRequest {
                    username: bad.to_string(),
                    email: "e@example.com".into(),
                    password: "pw".into(),
                })
                .unwrap_err();
            assert_eq!(err.status, StatusCode::BAD_REQUEST, "username {:?}", bad);
        }
    }

    #[test]
    fn test_login_wrong_password_is_unauthorized() {
        let service = service();
        register(&service, "alice", "pw");

        assert_eq!(login(&service, "alice", "nope").unwrap_err().status, StatusCode::UNAUTHORIZED);
        assert_eq!(login(&service, "nobody", "pw").unwrap_err().status, StatusCode::UNAUTHORIZED);
        assert!(service.get_user("alice").unwrap().last_login.is_none());
    }

    #[test]
    fn test_login_sets_last_login() {
        let service = service();
        register(&service, "alice", "pw");

        let response = login(&service, "alice", "pw").unwrap();
        assert!(!response.token.is_empty());
        assert_eq!(response.username, "alice");
        assert_eq!(response.expires_in, 3600);
        assert!(service.get_user("alice").unwrap().last_login.is_some());
    }

    #[test]
    fn test_logout_twice() {
        let service = service();
        register(&service, "alice", "pw");
        let token = login(&service, "alice", "pw").unwrap().token;

        service.logout(LogoutRequest { token: token.clone() }).unwrap();
        let err = service.logout(LogoutRequest { token }).unwrap_err();
        assert_eq!(err.status, StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_delete_user_invalidates_sessions() {
        let service = service();
        register(&service, "alice", "pw");
        register(&service, "bob", "pw");
        let a1 = login(&service, "alice", "pw").unwrap().token;
        let a2 = login(&service, "alice", "pw").unwrap().token;
        let b = login(&service, "bob", "pw").unwrap().token;

        let response = service.delete_user("alice").unwrap();
        assert_eq!(response.sessions_invalidated, 2);
        assert!(service.sessions().validate(&a1).is_err());
        assert!(service.sessions().validate(&a2).is_err());
        assert!(service.sessions().validate(&b).is_ok());
        assert_eq!(service.get_user("alice").unwrap_err().status, StatusCode::NOT_FOUND);
        assert_eq!(service.delete_user("alice").unwrap_err().status, StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_list_messages_in_insertion_order() {
        let service = service();
        for i in 0..7 {
            service
                .post_message(NewMessage {
                    sender: "a".into(),
                    recipient: "b".into(),
                    content: format!("m{}", i),
                })
                .unwrap();
        }

        let page = service
            .list_messages(Pagination {
                limit: Some(5),
                offset: Some(0),
            })
            .unwrap();
        assert_eq!(page.total, 7);
        assert_eq!(
            page.messages.iter().map(|m| m.content.as_str()).collect::<Vec<_>>(),
            vec!["m0", "m1", "m2", "m3", "m4"]
        );

        let page = service
            .list_messages(Pagination {
                limit: Some(50),
                offset: None,
            })
            .unwrap();
        assert_eq!(page.messages.len(), 7);

        let page = service.list_messages(Pagination::default()).unwrap();
        assert_eq!(page.limit, DEFAULT_PAGE_SIZE);
        assert_eq!(page.offset, 0);
    }

    #[test]
    fn test_search_is_deterministic() {
        let service = service();
        let query = || SearchQuery {
            q: Some("rust".into()),
            category: None,
            limit: Some(5),
        };
        let a = service.search(query());
        let b = service.search(query());

        assert_eq!(a.total, 5);
        assert_eq!(a.category, "all");
        for (x, y) in a.results.iter().zip(b.results.iter()) {
            assert_eq!(x.title, y.title);
            assert_eq!(x.category, y.category);
            assert_eq!(x.score, y.score);
        }
        assert!(a.results.windows(2).all(|w| w[0].score >= w[1].score));
        assert!(a.results.iter().all(|r| r.score > 0.0 && r.score <= 1.0));
    }

    #[test]
    fn test_search_caps_limit_and_keeps_category() {
        let service = service();
        let response = service.search(SearchQuery {
            q: None,
            category: Some("products".into()),
            limit: Some(10_000),
        });
        assert_eq!(response.total, MAX_SEARCH_LIMIT);
        assert!(response.results.iter().all(|r| r.category == "products"));
    }

    #[test]
    fn test_large_data_size() {
        let response = service().large_data();
        assert_eq!(response.count, 50);
        assert_eq!(response.data.len(), 50);
        assert_eq!(response.data[49].name, "item_00049");
    }

    #[test]
    fn test_upload_metadata_requires_filename() {
        let service = service();
        let err = service
            .upload_metadata(UploadMetadata {
                filename: " ".into(),
                size: 10,
                content_type: None,
            })
            .unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);

        let ack = service
            .upload_metadata(UploadMetadata {
                filename: "report.pdf".into(),
                size: 2048,
                content_type: Some("application/pdf".into()),
            })
            .unwrap();
        assert_eq!(ack.status, "received");
        assert_eq!(ack.size, 2048);
    }

    #[test]
    fn test_health_counts() {
        let service = service();
        register(&service, "alice", "pw");
        login(&service, "alice", "pw").unwrap();

        let health = service.health().unwrap();
        assert_eq!(health.status, "healthy");
        assert_eq!(health.users, 1);
        assert_eq!(health.messages, 0);
        assert_eq!(health.active_sessions, 1);
    }

    #[test]
    fn test_username_pattern() {
        assert!(is_valid_username("a"));
        assert!(is_valid_username("user_flow.01-x"));
        assert!(is_valid_username(&"x".repeat(64)));
        assert!(!is_valid_username(&"x".repeat(65)));
        assert!(!is_valid_username("trailing\n"));
        assert!(!is_valid_username("üser"));
    }

    #[test]
    fn test_login_racing_delete_leaves_no_session() {
        let service = Arc::new(service());

        for round in 0..200 {
            let name = format!("racer{}", round);
            register(&service, &name, "pw");

            std::thread::scope(|scope| {
                for _ in 0..3 {
                    scope.spawn(|| {
                        let _ = login(&service, &name, "pw");
                    });
                }
                scope.spawn(|| {
                    service.delete_user(&name).unwrap();
                });
            });

            assert_eq!(service.sessions().invalidate_user(&name).unwrap(), 0, "round {}", round);
        }
        assert_eq!(service.health().unwrap().active_sessions, 0);
    }
}
