use std::convert::Infallible;
use std::sync::Arc;

use log::error;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use warp::{http::StatusCode, reply, Filter, Rejection, Reply};

use super::handlers::{DemoService, ServiceError};
use super::types::*;

fn with_service(
    service: Arc<DemoService>,
) -> impl Filter<Extract = (Arc<DemoService>,), Error = Infallible> + Clone {
    warp::any().map(move || service.clone())
}

fn json_body<T: DeserializeOwned + Send>(
    max_body_bytes: u64,
) -> impl Filter<Extract = (T,), Error = Rejection> + Clone {
    warp::body::content_length_limit(max_body_bytes).and(warp::body::json())
}

fn error_reply(status: StatusCode, message: String) -> reply::Response {
    reply::with_status(reply::json(&ApiError { message }), status).into_response()
}

/// Turns a handler result into a JSON response with `status` on success.
fn respond<T: Serialize>(result: Result<T, ServiceError>, status: StatusCode) -> reply::Response {
    match result {
        Ok(body) => reply::with_status(reply::json(&body), status).into_response(),
        Err(e) => error_reply(e.status, e.message),
    }
}

/// GET /
pub fn root_route(
    service: Arc<DemoService>,
) -> impl Filter<Extract = (reply::Response,), Error = Rejection> + Clone {
    warp::path::end()
        .and(warp::get())
        .and(with_service(service))
        .map(|service: Arc<DemoService>| reply::json(&service.root()).into_response())
}

/// GET /health
pub fn health_route(
    service: Arc<DemoService>,
) -> impl Filter<Extract = (reply::Response,), Error = Rejection> + Clone {
    warp::path!("health")
        .and(warp::get())
        .and(with_service(service))
        .map(|service: Arc<DemoService>| respond(service.health(), StatusCode::OK))
}

/// POST /users/register
pub fn register_route(
    service: Arc<DemoService>,
    max_body_bytes: u64,
) -> impl Filter<Extract = (reply::Response,), Error = Rejection> + Clone {
    warp::path!("users" / "register")
        .and(warp::post())
        .and(json_body::<RegisterRequest>(max_body_bytes))
        .and(with_service(service))
        .map(|req: RegisterRequest, service: Arc<DemoService>| {
            respond(service.register(req), StatusCode::CREATED)
        })
}

/// POST /users/login
pub fn login_route(
    service: Arc<DemoService>,
    max_body_bytes: u64,
) -> impl Filter<Extract = (reply::Response,), Error = Rejection> + Clone {
    warp::path!("users" / "login")
        .and(warp::post())
        .and(json_body::<LoginRequest>(max_body_bytes))
        .and(with_service(service))
        .map(|req: LoginRequest, service: Arc<DemoService>| {
            respond(service.login(req), StatusCode::OK)
        })
}

/// POST /users/logout
pub fn logout_route(
    service: Arc<DemoService>,
    max_body_bytes: u64,
) -> impl Filter<Extract = (reply::Response,), Error = Rejection> + Clone {
    warp::path!("users" / "logout")
        .and(warp::post())
        .and(json_body::<LogoutRequest>(max_body_bytes))
        .and(with_service(service))
        .map(|req: LogoutRequest, service: Arc<DemoService>| {
            respond(service.logout(req), StatusCode::OK)
        })
}

/// GET /users/:username
pub fn get_user_route(
    service: Arc<DemoService>,
) -> impl Filter<Extract = (reply::Response,), Error = Rejection> + Clone {
    warp::path!("users" / String)
        .and(warp::get())
        .and(with_service(service))
        .map(|username: String, service: Arc<DemoService>| {
            respond(service.get_user(&username), StatusCode::OK)
        })
}

/// DELETE /users/:username
pub fn delete_user_route(
    service: Arc<DemoService>,
) -> impl Filter<Extract = (reply::Response,), Error = Rejection> + Clone {
    warp::path!("users" / String)
        .and(warp::delete())
        .and(with_service(service))
        .map(|username: String, service: Arc<DemoService>| {
            respond(service.delete_user(&username), StatusCode::OK)
        })
}

/// POST /messages
pub fn post_message_route(
    service: Arc<DemoService>,
    max_body_bytes: u64,
) -> impl Filter<Extract = (reply::Response,), Error = Rejection> + Clone {
    warp::path!("messages")
        .and(warp::post())
        .and(json_body::<NewMessage>(max_body_bytes))
        .and(with_service(service))
        .map(|req: NewMessage, service: Arc<DemoService>| {
            respond(service.post_message(req), StatusCode::CREATED)
        })
}

/// GET /messages?limit=&offset=
pub fn list_messages_route(
    service: Arc<DemoService>,
) -> impl Filter<Extract = (reply::Response,), Error = Rejection> + Clone {
    warp::path!("messages")
        .and(warp::get())
        .and(warp::query::<Pagination>())
        .and(with_service(service))
        .map(|page: Pagination, service: Arc<DemoService>| {
            respond(service.list_messages(page), StatusCode::OK)
        })
}

/// GET /data
pub fn data_route(
    service: Arc<DemoService>,
) -> impl Filter<Extract = (reply::Response,), Error = Rejection> + Clone {
    warp::path!("data")
        .and(warp::get())
        .and(with_service(service))
        .map(|service: Arc<DemoService>| reply::json(&service.data()).into_response())
}

/// GET /data/large
pub fn large_data_route(
    service: Arc<DemoService>,
) -> impl Filter<Extract = (reply::Response,), Error = Rejection> + Clone {
    warp::path!("data" / "large")
        .and(warp::get())
        .and(with_service(service))
        .map(|service: Arc<DemoService>| reply::json(&service.large_data()).into_response())
}

/// GET /search?q=&category=&limit=
pub fn search_route(
    service: Arc<DemoService>,
) -> impl Filter<Extract = (reply::Response,), Error = Rejection> + Clone {
    warp::path!("search")
        .and(warp::get())
        .and(warp::query::<SearchQuery>())
        .and(with_service(service))
        .map(|query: SearchQuery, service: Arc<DemoService>| {
            reply::json(&service.search(query)).into_response()
        })
}

/// POST /upload/metadata
pub fn upload_metadata_route(
    service: Arc<DemoService>,
    max_body_bytes: u64,
) -> impl Filter<Extract = (reply::Response,), Error = Rejection> + Clone {
    warp::path!("upload" / "metadata")
        .and(warp::post())
        .and(json_body::<UploadMetadata>(max_body_bytes))
        .and(with_service(service))
        .map(|meta: UploadMetadata, service: Arc<DemoService>| {
            respond(service.upload_metadata(meta), StatusCode::OK)
        })
}

/// POST /echo
pub fn echo_route(
    service: Arc<DemoService>,
    max_body_bytes: u64,
) -> impl Filter<Extract = (reply::Response,), Error = Rejection> + Clone {
    warp::path!("echo")
        .and(warp::post())
        .and(json_body::<Map<String, Value>>(max_body_bytes))
        .and(with_service(service))
        .map(|body: Map<String, Value>, service: Arc<DemoService>| {
            reply::json(&service.echo(body)).into_response()
        })
}

/// Every endpoint, with JSON error bodies for rejections and access logging.
pub fn api_routes(
    service: Arc<DemoService>,
    max_body_bytes: u64,
) -> impl Filter<Extract = impl Reply, Error = Infallible> + Clone {
    let users = register_route(service.clone(), max_body_bytes)
        .or(login_route(service.clone(), max_body_bytes))
        .unify()
        .or(logout_route(service.clone(), max_body_bytes))
        .unify()
        .or(get_user_route(service.clone()))
        .unify()
        .or(delete_user_route(service.clone()))
        .unify();

    let messages = post_message_route(service.clone(), max_body_bytes)
        .or(list_messages_route(service.clone()))
        .unify();

    let misc = root_route(service.clone())
        .or(health_route(service.clone()))
        .unify()
        .or(data_route(service.clone()))
        .unify()
        .or(large_data_route(service.clone()))
        .unify()
        .or(search_route(service.clone()))
        .unify()
        .or(upload_metadata_route(service.clone(), max_body_bytes))
        .unify()
        .or(echo_route(service, max_body_bytes))
        .unify();

    users
        .or(messages)
        .unify()
        .or(misc)
        .unify()
        .recover(handle_rejection)
        .with(warp::log("trafficlab::access"))
}

/// Maps warp rejections to `{message}` bodies with the matching status.
pub async fn handle_rejection(err: Rejection) -> Result<reply::Response, Infallible> {
    let (status, message) = if err.is_not_found() {
        (StatusCode::NOT_FOUND, "Not found".to_string())
    } else if let Some(e) = err.find::<warp::filters::body::BodyDeserializeError>() {
        (StatusCode::BAD_REQUEST, format!("Invalid request body: {}", e))
    } else if let Some(e) = err.find::<warp::reject::InvalidQuery>() {
        (StatusCode::BAD_REQUEST, format!("Invalid query string: {}", e))
    } else if err.find::<warp::reject::PayloadTooLarge>().is_some() {
        (StatusCode::PAYLOAD_TOO_LARGE, "Request body too large".to_string())
    } else if err.find::<warp::reject::LengthRequired>().is_some() {
        (StatusCode::LENGTH_REQUIRED, "Content-Length required".to_string())
    } else if err.find::<warp::reject::UnsupportedMediaType>().is_some() {
        (
            StatusCode::UNSUPPORTED_MEDIA_TYPE,
            "Expected application/json".to_string(),
        )
    } else if err.find::<warp::reject::MethodNotAllowed>().is_some() {
        (StatusCode::METHOD_NOT_ALLOWED, "Method not allowed".to_string())
    } else {
        error!("Unhandled rejection: {:?}", err);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Internal server error".to_string(),
        )
    };

    Ok(error_reply(status, message))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session_management::SessionManager;
    use crate::storage::MemoryStorage;
    use std::time::Duration;
    use warp::test::request;

    fn service() -> Arc<DemoService> {
        Arc::new(DemoService::new(
            Arc::new(MemoryStorage::new()),
            Arc::new(SessionManager::new(Duration::from_secs(3600))),
            20,
        ))
    }

    fn body_json(body: &[u8]) -> Value {
        serde_json::from_slice(body).unwrap()
    }

    #[tokio::test]
    async fn test_root_and_health() {
        let api = api_routes(service(), 1024);

        let res = request().method("GET").path("/").reply(&api).await;
        assert_eq!(res.status(), StatusCode::OK);
        assert!(body_json(res.body())["message"].is_string());

        let res = request().method("GET").path("/health").reply(&api).await;
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(body_json(res.body())["status"], "healthy");
    }

    #[tokio::test]
    async fn test_register_conflict_over_http() {
        let api = api_routes(service(), 1024);
        let body = RegisterRequest {
            username: "alice".into(),
            email: "alice@example.com".into(),
            password: "pw".into(),
        };

        let res = request()
            .method("POST")
            .path("/users/register")
            .json(&body)
            .reply(&api)
            .await;
        assert_eq!(res.status(), StatusCode::CREATED);

        let res = request()
            .method("POST")
            .path("/users/register")
            .json(&body)
            .reply(&api)
            .await;
        assert_eq!(res.status(), StatusCode::CONFLICT);
        assert_eq!(body_json(res.body())["message"], "Username already exists");
    }

    #[tokio::test]
    async fn test_login_and_user_lifecycle() {
        let api = api_routes(service(), 1024);
        request()
            .method("POST")
            .path("/users/register")
            .json(&RegisterRequest {
                username: "bob".into(),
                email: "bob@example.com".into(),
                password: "hunter2".into(),
            })
            .reply(&api)
            .await;

        let res = request()
            .method("POST")
            .path("/users/login")
            .json(&LoginRequest {
                username: "bob".into(),
                password: "wrong".into(),
            })
            .reply(&api)
            .await;
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

        let res = request()
            .method("POST")
            .path("/users/login")
            .json(&LoginRequest {
                username: "bob".into(),
                password: "hunter2".into(),
            })
            .reply(&api)
            .await;
        assert_eq!(res.status(), StatusCode::OK);
        let login: LoginResponse = serde_json::from_slice(res.body()).unwrap();
        assert_eq!(login.expires_in, 3600);

        let res = request().method("GET").path("/users/bob").reply(&api).await;
        assert_eq!(res.status(), StatusCode::OK);
        let profile = body_json(res.body());
        assert!(profile.get("password").is_none());
        assert!(profile["last_login"].is_string());

        let res = request().method("DELETE").path("/users/bob").reply(&api).await;
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(body_json(res.body())["sessions_invalidated"], 1);

        let res = request()
            .method("POST")
            .path("/users/logout")
            .json(&LogoutRequest { token: login.token })
            .reply(&api)
            .await;
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

        let res = request().method("GET").path("/users/bob").reply(&api).await;
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_messages_pagination_over_http() {
        let api = api_routes(service(), 1024);
        for i in 0..4 {
            let res = request()
                .method("POST")
                .path("/messages")
                .json(&NewMessage {
                    sender: "a".into(),
                    recipient: "b".into(),
                    content: format!("hello {}", i),
                })
                .reply(&api)
                .await;
            assert_eq!(res.status(), StatusCode::CREATED);
        }

        let res = request()
            .method("GET")
            .path("/messages?limit=3&offset=0")
            .reply(&api)
            .await;
        assert_eq!(res.status(), StatusCode::OK);
        let page: MessagePage = serde_json::from_slice(res.body()).unwrap();
        assert_eq!(page.messages.len(), 3);
        assert_eq!(page.total, 4);
        assert_eq!(page.messages[0].content, "hello 0");

        let res = request()
            .method("GET")
            .path("/messages?limit=abc")
            .reply(&api)
            .await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_echo_requires_object() {
        let api = api_routes(service(), 1024);

        let res = request()
            .method("POST")
            .path("/echo")
            .json(&serde_json::json!({"name": "test", "value": 42}))
            .reply(&api)
            .await;
        assert_eq!(res.status(), StatusCode::OK);
        let body = body_json(res.body());
        assert_eq!(body["echo"], true);
        assert_eq!(body["received"]["value"], 42);

        let res = request()
            .method("POST")
            .path("/echo")
            .json(&serde_json::json!([1, 2, 3]))
            .reply(&api)
            .await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_body_limit() {
        let api = api_routes(service(), 64);
        let res = request()
            .method("POST")
            .path("/echo")
            .json(&serde_json::json!({"blob": "x".repeat(500)}))
            .reply(&api)
            .await;
        assert_eq!(res.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn test_data_search_and_unknown_route() {
        let api = api_routes(service(), 1024);

        let res = request().method("GET").path("/data").reply(&api).await;
        assert_eq!(body_json(res.body())["data"], serde_json::json!([1, 2, 3, 4, 5]));

        let res = request().method("GET").path("/data/large").reply(&api).await;
        assert_eq!(body_json(res.body())["count"], 20);

        let res = request()
            .method("GET")
            .path("/search?q=flows&category=articles&limit=3")
            .reply(&api)
            .await;
        let search: SearchResponse = serde_json::from_slice(res.body()).unwrap();
        assert_eq!(search.total, 3);
        assert_eq!(search.query, "flows");

        let res = request().method("GET").path("/nope").reply(&api).await;
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_json(res.body())["message"], "Not found");
    }
}
