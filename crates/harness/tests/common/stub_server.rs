//! In-process stand-in for the external resource server.
//!
//! Reproduces the observable behavior the suite asserts on: bearer-protected
//! `/posts`, unauthenticated `/register` and `/users`, the
//! `application/json; charset=utf-8` content type, `{}` bodies on 404, a
//! 500 with a text diagnostic on duplicate ids, the empty 200 on PUT to a
//! missing post, and a JSON store file rewritten after every mutation.
//!
//! [`Faults`] injects failures for the synchronizer tests.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use serde_json::{Map, Value, json};
use tempfile::TempDir;
use tokio::task::JoinHandle;

const JSON_UTF8: &str = "application/json; charset=utf-8";

/// Failures the stub can be told to produce.
#[derive(Debug, Clone, Default)]
pub struct Faults {
    /// `DELETE /posts/:id` answers 500 for this id.
    pub fail_delete_post: Option<u64>,
    /// `POST /posts` answers 500 for this id.
    pub fail_create_post: Option<u64>,
    /// `PUT` on a missing post answers 404 instead of an empty 200.
    pub strict_put: bool,
    /// JSON responses declare `application/json` without a charset.
    pub bare_content_type: bool,
    /// `PATCH` replaces the post instead of merging into it.
    pub patch_replaces: bool,
}

#[derive(Debug)]
struct Inner {
    posts: Vec<Map<String, Value>>,
    users: Vec<Value>,
    tokens: HashSet<String>,
    issued: u64,
    db_path: PathBuf,
    faults: Faults,
}

impl Inner {
    fn persist(&self) {
        let document = json!({ "posts": self.posts, "users": self.users });
        let bytes = serde_json::to_vec_pretty(&document).expect("serialize store");
        std::fs::write(&self.db_path, bytes).expect("write store file");
    }

    fn position(&self, id: u64) -> Option<usize> {
        self.posts.iter().position(|post| post_id(post) == Some(id))
    }
}

/// Shared, inspectable stub state.
#[derive(Debug, Clone)]
pub struct StubState {
    inner: Arc<Mutex<Inner>>,
}

impl StubState {
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().expect("stub state poisoned")
    }

    pub fn set_faults(&self, faults: Faults) {
        self.lock().faults = faults;
    }

    /// Replaces the collection without going through HTTP.
    pub fn put_posts(&self, posts: Vec<Value>) {
        let mut inner = self.lock();
        inner.posts = posts
            .into_iter()
            .filter_map(|post| post.as_object().cloned())
            .collect();
        inner.persist();
    }

    pub fn post_ids(&self) -> Vec<u64> {
        self.lock().posts.iter().filter_map(post_id).collect()
    }

    pub fn user_count(&self) -> usize {
        self.lock().users.len()
    }
}

/// A running stub bound to an ephemeral port.
pub struct StubServer {
    pub base_url: String,
    pub db_path: PathBuf,
    pub state: StubState,
    handle: JoinHandle<()>,
    _dir: TempDir,
}

impl StubServer {
    pub async fn start() -> Self {
        Self::start_with(Faults::default()).await
    }

    pub async fn start_with(faults: Faults) -> Self {
        let dir = tempfile::tempdir().expect("create temp dir");
        let db_path = dir.path().join("db.json");

        let inner = Inner {
            posts: Vec::new(),
            users: Vec::new(),
            tokens: HashSet::new(),
            issued: 0,
            db_path: db_path.clone(),
            faults,
        };
        inner.persist();
        let state = StubState {
            inner: Arc::new(Mutex::new(inner)),
        };

        let app = Router::new()
            .route("/register", axum::routing::post(register))
            .route("/users", get(list_users))
            .route("/users/{id}", axum::routing::delete(delete_user))
            .route("/posts", get(list_posts).post(create_post))
            .route(
                "/posts/{id}",
                get(read_post)
                    .put(replace_post)
                    .patch(patch_post)
                    .delete(delete_post),
            )
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind stub listener");
        let addr = listener.local_addr().expect("stub address");
        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.expect("stub server");
        });

        Self {
            base_url: format!("http://{}", addr),
            db_path,
            state,
            handle,
            _dir: dir,
        }
    }
}

impl Drop for StubServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn post_id(post: &Map<String, Value>) -> Option<u64> {
    post.get("id").and_then(Value::as_u64)
}

fn json_response(inner: &Inner, status: StatusCode, body: Value) -> Response {
    let content_type = if inner.faults.bare_content_type {
        "application/json"
    } else {
        JSON_UTF8
    };
    (status, [(header::CONTENT_TYPE, content_type)], body.to_string()).into_response()
}

fn server_error(message: &str) -> Response {
    let page = format!(
        concat!(
            "<!DOCTYPE html>\n",
            "<html lang=\"en\">\n",
            "<head><meta charset=\"utf-8\"><title>Error</title></head>\n",
            "<body><pre>{}<br> &nbsp; &nbsp;at Function.insert</pre></body>\n",
            "</html>\n",
        ),
        message
    );
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        [(header::CONTENT_TYPE, "text/html; charset=utf-8")],
        page,
    )
        .into_response()
}

fn authorize(inner: &Inner, headers: &HeaderMap) -> Result<(), Response> {
    let token = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "));
    match token {
        Some(token) if inner.tokens.contains(token) => Ok(()),
        Some(_) => Err(json_response(
            inner,
            StatusCode::UNAUTHORIZED,
            json!("jwt malformed"),
        )),
        None => Err(json_response(
            inner,
            StatusCode::UNAUTHORIZED,
            json!("Missing authorization header"),
        )),
    }
}

async fn register(State(state): State<StubState>, Json(body): Json<Value>) -> Response {
    let mut inner = state.lock();
    let email = body.get("email").and_then(Value::as_str).unwrap_or_default();
    let password = body.get("password").and_then(Value::as_str).unwrap_or_default();
    if email.is_empty() || password.is_empty() {
        return json_response(
            &inner,
            StatusCode::BAD_REQUEST,
            json!("Email and password are required"),
        );
    }
    if inner
        .users
        .iter()
        .any(|user| user.get("email").and_then(Value::as_str) == Some(email))
    {
        return json_response(&inner, StatusCode::BAD_REQUEST, json!("Email already exists"));
    }

    let id = inner
        .users
        .iter()
        .filter_map(|user| user.get("id").and_then(Value::as_u64))
        .max()
        .unwrap_or(0)
        + 1;
    inner.issued += 1;
    let token = format!("stub-token-{}", inner.issued);
    inner.tokens.insert(token.clone());
    inner.users.push(json!({
        "id": id,
        "email": email,
        "password": format!("$2a$10$stubhash{}", id),
    }));
    inner.persist();

    json_response(
        &inner,
        StatusCode::CREATED,
        json!({ "accessToken": token, "user": { "id": id, "email": email } }),
    )
}

async fn list_users(State(state): State<StubState>) -> Response {
    let inner = state.lock();
    json_response(&inner, StatusCode::OK, Value::Array(inner.users.clone()))
}

async fn delete_user(State(state): State<StubState>, Path(id): Path<u64>) -> Response {
    let mut inner = state.lock();
    let before = inner.users.len();
    inner
        .users
        .retain(|user| user.get("id").and_then(Value::as_u64) != Some(id));
    if inner.users.len() == before {
        return json_response(&inner, StatusCode::NOT_FOUND, json!({}));
    }
    inner.persist();
    json_response(&inner, StatusCode::OK, json!({}))
}

async fn list_posts(
    State(state): State<StubState>,
    headers: HeaderMap,
    Query(params): Query<Vec<(String, String)>>,
) -> Response {
    let inner = state.lock();
    if let Err(denied) = authorize(&inner, &headers) {
        return denied;
    }

    let wanted: Vec<&str> = params
        .iter()
        .filter(|(key, _)| key == "id")
        .map(|(_, value)| value.as_str())
        .collect();
    let posts: Vec<Value> = inner
        .posts
        .iter()
        .filter(|post| {
            wanted.is_empty()
                || post_id(post).is_some_and(|id| wanted.contains(&id.to_string().as_str()))
        })
        .cloned()
        .map(Value::Object)
        .collect();

    json_response(&inner, StatusCode::OK, Value::Array(posts))
}

async fn read_post(
    State(state): State<StubState>,
    headers: HeaderMap,
    Path(id): Path<u64>,
) -> Response {
    let inner = state.lock();
    if let Err(denied) = authorize(&inner, &headers) {
        return denied;
    }
    match inner.position(id) {
        Some(index) => {
            let post = Value::Object(inner.posts[index].clone());
            json_response(&inner, StatusCode::OK, post)
        }
        None => json_response(&inner, StatusCode::NOT_FOUND, json!({})),
    }
}

async fn create_post(
    State(state): State<StubState>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let mut inner = state.lock();
    if let Err(denied) = authorize(&inner, &headers) {
        return denied;
    }
    let Some(mut post) = body.as_object().cloned() else {
        return json_response(&inner, StatusCode::BAD_REQUEST, json!({}));
    };

    let id = match post_id(&post) {
        Some(id) => id,
        None => {
            let next = inner.posts.iter().filter_map(post_id).max().unwrap_or(0) + 1;
            post.insert("id".to_string(), json!(next));
            next
        }
    };
    if inner.faults.fail_create_post == Some(id) {
        return server_error("Error: injected create failure");
    }
    if inner.position(id).is_some() {
        return server_error("Error: Insert failed, duplicate id");
    }

    inner.posts.push(post.clone());
    inner.persist();
    json_response(&inner, StatusCode::CREATED, Value::Object(post))
}

async fn replace_post(
    State(state): State<StubState>,
    headers: HeaderMap,
    Path(id): Path<u64>,
    Json(body): Json<Value>,
) -> Response {
    let mut inner = state.lock();
    if let Err(denied) = authorize(&inner, &headers) {
        return denied;
    }
    let Some(index) = inner.position(id) else {
        let status = if inner.faults.strict_put {
            StatusCode::NOT_FOUND
        } else {
            StatusCode::OK
        };
        return json_response(&inner, status, json!({}));
    };

    let mut post = body.as_object().cloned().unwrap_or_default();
    post.insert("id".to_string(), json!(id));
    inner.posts[index] = post.clone();
    inner.persist();
    json_response(&inner, StatusCode::OK, Value::Object(post))
}

async fn patch_post(
    State(state): State<StubState>,
    headers: HeaderMap,
    Path(id): Path<u64>,
    Json(body): Json<Value>,
) -> Response {
    let mut inner = state.lock();
    if let Err(denied) = authorize(&inner, &headers) {
        return denied;
    }
    let Some(index) = inner.position(id) else {
        return json_response(&inner, StatusCode::NOT_FOUND, json!({}));
    };

    let fields = body.as_object().cloned().unwrap_or_default();
    let mut post = if inner.faults.patch_replaces {
        Map::new()
    } else {
        inner.posts[index].clone()
    };
    post.extend(fields);
    post.insert("id".to_string(), json!(id));
    inner.posts[index] = post.clone();
    inner.persist();
    json_response(&inner, StatusCode::OK, Value::Object(post))
}

async fn delete_post(
    State(state): State<StubState>,
    headers: HeaderMap,
    Path(id): Path<u64>,
) -> Response {
    let mut inner = state.lock();
    if let Err(denied) = authorize(&inner, &headers) {
        return denied;
    }
    if inner.faults.fail_delete_post == Some(id) {
        return server_error("Error: injected delete failure");
    }
    let Some(index) = inner.position(id) else {
        return json_response(&inner, StatusCode::NOT_FOUND, json!({}));
    };

    inner.posts.remove(index);
    inner.persist();
    json_response(&inner, StatusCode::OK, json!({}))
}
