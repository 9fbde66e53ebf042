use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{Path, Query};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use libstagehand::api::{Backend, HttpBackend};
use libstagehand::crud::{trigger, TriggerForm};
use libstagehand::error::ApiError;
use libstagehand::model::{Credentials, HostGroupForm, TaskStatus};
use libstagehand::session::{
    AuthStore, MemoryTokenStore, TokenStore, ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY,
};
use serde_json::{json, Value};

type Reply = Result<Json<Value>, (StatusCode, Json<Value>)>;

fn authorized(headers: &HeaderMap) -> Result<(), (StatusCode, Json<Value>)> {
    match headers.get("authorization").and_then(|v| v.to_str().ok()) {
        Some("Bearer good-token") => Ok(()),
        _ => Err((
            StatusCode::UNAUTHORIZED,
            Json(json!({"detail": "Given token not valid for any token type"})),
        )),
    }
}

fn task_json(id: u64, status: &str) -> Value {
    json!({
        "id": id,
        "playbook": 3,
        "playbook_name": "site.yml",
        "target_spec": "all",
        "status": status,
        "celery_task_id": null,
        "executed_by": 1,
        "executed_by_username": "admin",
        "created_at": "2024-05-01T12:00:00.123456Z",
        "started_at": null,
        "completed_at": null
    })
}

async fn login(Json(body): Json<Value>) -> Reply {
    if body["username"] == "admin" && body["password"] == "secret" {
        Ok(Json(json!({"access": "good-token", "refresh": "good-refresh"})))
    } else {
        Err((
            StatusCode::UNAUTHORIZED,
            Json(json!({"detail": "No active account found with the given credentials"})),
        ))
    }
}

async fn current_user(headers: HeaderMap) -> Reply {
    authorized(&headers)?;
    Ok(Json(json!({
        "id": 1,
        "username": "admin",
        "email": "admin@example.com",
        "first_name": "",
        "last_name": "",
        "profile": {"role": "admin"}
    })))
}

async fn logout() -> StatusCode {
    StatusCode::INTERNAL_SERVER_ERROR
}

async fn create_host_group(headers: HeaderMap, Json(body): Json<Value>) -> Reply {
    authorized(&headers)?;
    if body["name"] == "webservers" {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(json!({"name": ["host group with this name already exists."]})),
        ));
    }
    Ok(Json(json!({"id": 8, "name": body["name"], "description": body["description"]})))
}

async fn list_tasks(headers: HeaderMap, Query(query): Query<HashMap<String, String>>) -> Reply {
    authorized(&headers)?;
    match query.get("playbook_id").map(String::as_str) {
        Some("3") => Ok(Json(json!([task_json(1, "running"), task_json(2, "succeeded")]))),
        _ => Ok(Json(json!([]))),
    }
}

async fn trigger_task(headers: HeaderMap, Json(body): Json<Value>) -> Reply {
    authorized(&headers)?;
    let mut task = task_json(57, "pending");
    task["target_spec"] = body["target_spec"].clone();
    Ok(Json(task))
}

async fn task_log(
    headers: HeaderMap,
    Path(id): Path<u64>,
) -> Result<String, (StatusCode, Json<Value>)> {
    authorized(&headers)?;
    Ok(format!("PLAY [all] ***\nok: [web-1] task {id}\n"))
}

async fn spawn_backend() -> String {
    let app = Router::new()
        .route("/api/v1/auth/login/", post(login))
        .route("/api/v1/auth/user/", get(current_user))
        .route("/api/v1/auth/logout/", post(logout))
        .route("/api/v1/hostgroups/", post(create_host_group))
        .route("/api/v1/taskexecutions/", get(list_tasks).post(trigger_task))
        .route("/api/v1/taskexecutions/:id/log_content/", get(task_log));

    let addr = SocketAddr::from(([127, 0, 0, 1], 0));
    let server = axum::Server::bind(&addr).serve(app.into_make_service());
    let addr = server.local_addr();
    tokio::spawn(server);
    format!("http://{addr}/api/v1/")
}

#[tokio::test]
async fn test_that_requests_carry_the_bearer_token() -> Result<(), ApiError> {
    let base = spawn_backend().await;
    let tokens = Arc::new(MemoryTokenStore::with_tokens("good-token", "good-refresh"));
    let backend = HttpBackend::new(base, tokens);

    let tasks = backend.task_executions(Some(3)).await?;
    assert_eq!(2, tasks.len());
    assert_eq!(TaskStatus::Running, tasks[0].status);
    assert!(backend.task_executions(None).await?.is_empty());

    let log = backend.task_log(1).await?;
    assert!(log.contains("ok: [web-1] task 1"));
    Ok(())
}

#[tokio::test]
async fn test_that_field_errors_are_flattened() {
    let base = spawn_backend().await;
    let tokens = Arc::new(MemoryTokenStore::with_tokens("good-token", "good-refresh"));
    let backend = HttpBackend::new(base, tokens);

    let err = backend
        .create_host_group(&HostGroupForm::new("webservers", ""))
        .await
        .unwrap_err();
    assert_eq!(Some(400), err.status());
    assert_eq!("name: host group with this name already exists.", err.to_string());
}

#[tokio::test]
async fn test_that_bad_tokens_end_the_session() -> Result<(), ApiError> {
    let base = spawn_backend().await;
    let tokens = Arc::new(MemoryTokenStore::with_tokens("expired", "expired-refresh"));
    let backend = Arc::new(HttpBackend::new(base, tokens.clone()));
    let auth = AuthStore::new(backend, tokens.clone());

    let state = auth.check_auth_status().await;
    assert!(!state.is_authenticated);
    assert_eq!(None, state.user);
    assert_eq!(None, tokens.get(ACCESS_TOKEN_KEY).await?);
    assert_eq!(None, tokens.get(REFRESH_TOKEN_KEY).await?);
    Ok(())
}

#[tokio::test]
async fn test_that_login_trigger_and_logout_work_end_to_end() -> Result<(), ApiError> {
    let base = spawn_backend().await;
    let tokens = Arc::new(MemoryTokenStore::new());
    let backend = Arc::new(HttpBackend::new(base, tokens.clone()));
    let auth = AuthStore::new(backend.clone(), tokens.clone());

    assert_eq!(Err(ApiError::NotAuthenticated), backend.current_user().await);

    let bad = Credentials {
        username: "admin".into(),
        password: "wrong".into(),
    };
    let err = auth.login(&bad).await.unwrap_err();
    assert_eq!(
        "No active account found with the given credentials",
        err.to_string()
    );

    let good = Credentials {
        username: "admin".into(),
        password: "secret".into(),
    };
    let user = auth.login(&good).await?;
    assert_eq!("admin", user.username);

    let form = TriggerForm {
        playbook: Some(3),
        target_spec: "webservers".into(),
    };
    let (task, route) = trigger(backend.as_ref(), &form).await?;
    assert_eq!("webservers", task.target_spec);
    assert_eq!("/tasks/57", route.to_string());

    // The backend's logout endpoint fails; the local session ends anyway.
    auth.logout().await;
    assert!(!auth.state().is_authenticated);
    assert_eq!(None, tokens.get(ACCESS_TOKEN_KEY).await?);
    Ok(())
}
