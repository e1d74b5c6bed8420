use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::{error, info, instrument};

use crate::{
    auth::{
        dto::{LoginRequest, LoginResponse, PublicUser, RegisterRequest, StoreStatus},
        extractors::AuthUser,
        jwt::JwtKeys,
        repo_types::User,
        services::{self, AuthError},
    },
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
}

pub fn me_routes() -> Router<AppState> {
    Router::new().route("/me", get(get_me))
}

pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/users", get(list_users).delete(clear_users))
        .route("/store", get(store_status))
}

// storage details stay in the log, the client gets a generic message
fn reject(e: AuthError, generic: &str) -> (StatusCode, String) {
    let status = e.status();
    match e {
        AuthError::Storage(inner) => {
            error!(error = %inner, "{}", generic);
            (status, generic.to_string())
        }
        AuthError::DuplicateUsername(username) => {
            info!(%username, "registration rejected: username taken");
            (status, "Username already exists".to_string())
        }
        other => (status, other.to_string()),
    }
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<PublicUser>), (StatusCode, String)> {
    let user = services::register(&state.users, payload)
        .await
        .map_err(|e| reject(e, "Registration failed"))?;
    Ok((StatusCode::CREATED, Json(user.into())))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, (StatusCode, String)> {
    let user = services::login(&state.users, payload)
        .await
        .map_err(|e| reject(e, "Login failed"))?;

    let Some(user_id) = user.id else {
        error!(username = %user.username, "stored user has no id");
        return Err((StatusCode::INTERNAL_SERVER_ERROR, "Login failed".into()));
    };

    let access_token = JwtKeys::from_config(&state.config.jwt)
        .sign(user_id)
        .map_err(|e| {
            error!(error = %e, "jwt sign failed");
            (StatusCode::INTERNAL_SERVER_ERROR, "Login failed".to_string())
        })?;

    Ok(Json(LoginResponse {
        access_token,
        user: user.into(),
    }))
}

#[instrument(skip(state))]
pub async fn get_me(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<PublicUser>, (StatusCode, String)> {
    let user = state
        .users
        .find_by_id(user_id)
        .await
        .map_err(|e| reject(e.into(), "Lookup failed"))?
        .ok_or_else(|| (StatusCode::UNAUTHORIZED, "User not found".to_string()))?;
    Ok(Json(user.into()))
}

#[instrument(skip(state))]
pub async fn list_users(
    State(state): State<AppState>,
) -> Result<Json<Vec<User>>, (StatusCode, String)> {
    let users = state
        .users
        .list_users()
        .await
        .map_err(|e| reject(e.into(), "Failed to list users"))?;
    Ok(Json(users))
}

#[instrument(skip(state))]
pub async fn clear_users(State(state): State<AppState>) -> Result<StatusCode, (StatusCode, String)> {
    state
        .users
        .clear_all()
        .await
        .map_err(|e| reject(e.into(), "Failed to clear users"))?;
    info!("users cleared via api");
    Ok(StatusCode::NO_CONTENT)
}

pub async fn store_status(State(state): State<AppState>) -> Json<StoreStatus> {
    Json(StoreStatus {
        available: state.users.is_available(),
        backend: state.users.backend_name().to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::build_app;
    use axum::body::{to_bytes, Body};
    use crate::kv::KeyValueStore;
    use axum::http::Request;
    use tower::ServiceExt;

    async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Vec<u8>) {
        let res = app.clone().oneshot(req).await.unwrap();
        let status = res.status();
        let body = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        (status, body.to_vec())
    }

    fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::post(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn register_login_me_flow() {
        let app = build_app(AppState::fake());

        let (status, body) = send(
            &app,
            post_json(
                "/api/v1/auth/register",
                serde_json::json!({"username": "alice", "password": "secret1", "confirm_password": "secret1"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let created: PublicUser = serde_json::from_slice(&body).unwrap();
        assert_eq!(created.username, "alice");

        let (status, body) = send(
            &app,
            post_json(
                "/api/v1/auth/login",
                serde_json::json!({"username": "alice", "password": "secret1"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let login: LoginResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(login.user, created);

        let req = Request::get("/api/v1/me")
            .header("authorization", format!("Bearer {}", login.access_token))
            .body(Body::empty())
            .unwrap();
        let (status, body) = send(&app, req).await;
        assert_eq!(status, StatusCode::OK);
        let me: PublicUser = serde_json::from_slice(&body).unwrap();
        assert_eq!(me, created);
    }

    #[tokio::test]
    async fn bad_login_and_duplicate_register() {
        let app = build_app(AppState::fake());
        let body = serde_json::json!({"username": "alice", "password": "pw", "confirm_password": "pw"});
        let (status, _) = send(&app, post_json("/api/v1/auth/register", body.clone())).await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, msg) = send(&app, post_json("/api/v1/auth/register", body)).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(String::from_utf8(msg).unwrap(), "Username already exists");

        let (status, msg) = send(
            &app,
            post_json("/api/v1/auth/login", serde_json::json!({"username": "alice", "password": "bad"})),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(String::from_utf8(msg).unwrap(), "Invalid username or password");
    }

    #[tokio::test]
    async fn me_requires_token() {
        let app = build_app(AppState::fake());
        let req = Request::get("/api/v1/me").body(Body::empty()).unwrap();
        let (status, _) = send(&app, req).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn list_and_clear_users() {
        let state = AppState::fake();
        state.users.create_user("alice", "a").await.unwrap();
        state.users.create_user("bob", "b").await.unwrap();
        let app = build_app(state);

        let (status, body) = send(&app, Request::get("/api/v1/users").body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::OK);
        let users: Vec<User> = serde_json::from_slice(&body).unwrap();
        assert_eq!(users.len(), 2);
        assert!(users.iter().all(|u| u.password.is_empty()));

        let (status, _) = send(&app, Request::delete("/api/v1/users").body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (_, body) = send(&app, Request::get("/api/v1/users").body(Body::empty()).unwrap()).await;
        let users: Vec<User> = serde_json::from_slice(&body).unwrap();
        assert!(users.is_empty());
    }

    #[tokio::test]
    async fn store_status_and_health() {
        let app = build_app(AppState::fake());
        let (status, body) = send(&app, Request::get("/api/v1/store").body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::OK);
        let s: StoreStatus = serde_json::from_slice(&body).unwrap();
        assert!(s.available);
        assert_eq!(s.backend, "memory");

        let (status, body) = send(&app, Request::get("/api/v1/health").body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, b"ok");
    }

    #[tokio::test]
    async fn storage_failure_returns_generic_message() {
        let (state, kv) = AppState::fake_with_kv();
        let key = state.config.storage.users_key.clone();
        kv.set_item(&key, "{not json").await.unwrap();
        let app = build_app(state);

        let (status, msg) = send(
            &app,
            post_json(
                "/api/v1/auth/register",
                serde_json::json!({"username": "alice", "password": "pw", "confirm_password": "pw"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(String::from_utf8(msg).unwrap(), "Registration failed");

        let (status, msg) = send(
            &app,
            post_json("/api/v1/auth/login", serde_json::json!({"username": "alice", "password": "pw"})),
        )
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(String::from_utf8(msg).unwrap(), "Login failed");

        // the raw blob is left as it was
        assert_eq!(kv.get_item(&key).await.unwrap().as_deref(), Some("{not json"));
    }

    #[tokio::test]
    async fn me_rejects_token_of_cleared_user() {
        let state = AppState::fake();
        state.users.create_user("alice", "secret1").await.unwrap();
        let app = build_app(state);

        let (status, body) = send(
            &app,
            post_json(
                "/api/v1/auth/login",
                serde_json::json!({"username": "alice", "password": "secret1"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let login: LoginResponse = serde_json::from_slice(&body).unwrap();

        let (status, _) = send(&app, Request::delete("/api/v1/users").body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let req = Request::get("/api/v1/me")
            .header("authorization", format!("Bearer {}", login.access_token))
            .body(Body::empty())
            .unwrap();
        let (status, msg) = send(&app, req).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(String::from_utf8(msg).unwrap(), "User not found");
    }

    #[tokio::test]
    async fn missing_register_field_is_validation_error() {
        let app = build_app(AppState::fake());
        let (status, msg) = send(
            &app,
            post_json("/api/v1/auth/register", serde_json::json!({"username": "a", "password": "b"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(String::from_utf8(msg).unwrap(), "Please fill in all fields");

        let (status, msg) = send(&app, post_json("/api/v1/auth/login", serde_json::json!({"username": "a"}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(String::from_utf8(msg).unwrap(), "Please fill in all fields");
    }
}
