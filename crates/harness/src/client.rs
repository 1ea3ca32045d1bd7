//! HTTP client for the resource server.
//!
//! [`ApiClient`] wraps a `reqwest::Client` bound to the configured base URL.
//! Every exchange is captured as an [`ApiResponse`] holding the status,
//! headers and the full body text, so scenarios can assert on all three and
//! expected-negative responses (404, 500) are values rather than errors.
//!
//! The typed helpers (`list_posts`, `delete_post`, ...) are for calls that
//! must succeed, such as the resync loops: any non-2xx status becomes a
//! [`ClientError::UnexpectedStatus`].

use std::time::Duration;

use reqwest::header::{CONTENT_TYPE, HeaderMap};
use reqwest::{Method, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;
use url::Url;

use crate::error::ClientError;
use crate::model::{Credential, Post, Principal, PrincipalDescriptor};

/// Content type every JSON response of the resource server declares.
pub const JSON_UTF8: &str = "application/json; charset=utf-8";

/// Collection path of the resource under test.
pub const POSTS_PATH: &str = "/posts";
/// Principal listing path.
pub const USERS_PATH: &str = "/users";
/// Principal registration path.
pub const REGISTER_PATH: &str = "/register";

/// Maximum number of body characters quoted in error messages.
const ERROR_BODY_LIMIT: usize = 512;

/// Returns the path of a single post.
pub fn post_path(id: u64) -> String {
    format!("{}/{}", POSTS_PATH, id)
}

/// Returns the path of a single principal.
pub fn user_path(id: u64) -> String {
    format!("{}/{}", USERS_PATH, id)
}

/// HTTP client bound to a resource server base URL.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: Url,
}

impl ApiClient {
    /// Creates a client for `base_url`.
    ///
    /// `timeout` applies per request; `None` leaves the transport default.
    pub fn new(base_url: &str, timeout: Option<Duration>) -> Result<Self, ClientError> {
        let base_url = Url::parse(base_url).map_err(|source| ClientError::Url {
            path: base_url.to_string(),
            source,
        })?;

        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder.build().map_err(ClientError::Build)?;

        Ok(Self { http, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Resolves a path against the base URL, keeping any base path prefix.
    pub fn url(&self, path: &str) -> Result<Url, ClientError> {
        let joined = format!("{}{}", self.base_url.as_str().trim_end_matches('/'), path);
        Url::parse(&joined).map_err(|source| ClientError::Url {
            path: path.to_string(),
            source,
        })
    }

    /// Starts a request.
    pub fn request(&self, method: Method, path: &str) -> Result<ApiRequest, ClientError> {
        let url = self.url(path)?;
        Ok(ApiRequest {
            builder: self.http.request(method.clone(), url),
            method,
            path: path.to_string(),
        })
    }

    pub fn get(&self, path: &str) -> Result<ApiRequest, ClientError> {
        self.request(Method::GET, path)
    }

    pub fn post(&self, path: &str) -> Result<ApiRequest, ClientError> {
        self.request(Method::POST, path)
    }

    pub fn put(&self, path: &str) -> Result<ApiRequest, ClientError> {
        self.request(Method::PUT, path)
    }

    pub fn patch(&self, path: &str) -> Result<ApiRequest, ClientError> {
        self.request(Method::PATCH, path)
    }

    pub fn delete(&self, path: &str) -> Result<ApiRequest, ClientError> {
        self.request(Method::DELETE, path)
    }

    /// `GET /posts`, requiring success.
    pub async fn list_posts(&self, credential: &Credential) -> Result<Vec<Post>, ClientError> {
        self.get(POSTS_PATH)?
            .bearer(credential)
            .send()
            .await?
            .error_for_status()?
            .json()
    }

    /// `GET /posts`, requiring success, without assuming the item shape.
    pub async fn list_post_items(
        &self,
        credential: &Credential,
    ) -> Result<Vec<Value>, ClientError> {
        self.get(POSTS_PATH)?
            .bearer(credential)
            .send()
            .await?
            .error_for_status()?
            .json()
    }

    /// `POST /posts`, requiring success. Returns the persisted post.
    pub async fn create_post(
        &self,
        credential: &Credential,
        post: &Post,
    ) -> Result<Post, ClientError> {
        self.post(POSTS_PATH)?
            .bearer(credential)
            .json(post)
            .send()
            .await?
            .error_for_status()?
            .json()
    }

    /// `DELETE /posts/:id`, requiring success.
    pub async fn delete_post(&self, credential: &Credential, id: u64) -> Result<(), ClientError> {
        self.delete(&post_path(id))?
            .bearer(credential)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    /// `GET /users`, requiring success. Unauthenticated.
    pub async fn list_users(&self) -> Result<Vec<Principal>, ClientError> {
        self.get(USERS_PATH)?.send().await?.error_for_status()?.json()
    }

    /// `DELETE /users/:id`, requiring success. Unauthenticated.
    pub async fn delete_user(&self, id: u64) -> Result<(), ClientError> {
        self.delete(&user_path(id))?
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    /// `POST /register`. The caller interprets the response.
    pub async fn register(
        &self,
        descriptor: &PrincipalDescriptor,
    ) -> Result<ApiResponse, ClientError> {
        self.post(REGISTER_PATH)?.json(descriptor).send().await
    }
}

/// A request under construction.
#[derive(Debug)]
pub struct ApiRequest {
    builder: reqwest::RequestBuilder,
    method: Method,
    path: String,
}

impl ApiRequest {
    /// Attaches `Authorization: Bearer <token>`.
    pub fn bearer(mut self, credential: &Credential) -> Self {
        self.builder = self.builder.bearer_auth(credential.token());
        self
    }

    /// Appends query parameters. Repeated keys are kept, so
    /// `&[("id", 2), ("id", 4)]` yields `?id=2&id=4`.
    pub fn query<T: Serialize + ?Sized>(mut self, query: &T) -> Self {
        self.builder = self.builder.query(query);
        self
    }

    /// Sets a JSON body.
    pub fn json<T: Serialize + ?Sized>(mut self, body: &T) -> Self {
        self.builder = self.builder.json(body);
        self
    }

    /// Returns `METHOD /path` for messages.
    pub fn label(&self) -> String {
        format!("{} {}", self.method, self.path)
    }

    /// Sends the request and buffers the whole response body.
    pub async fn send(self) -> Result<ApiResponse, ClientError> {
        let method = self.method.to_string();
        let transport = |source| ClientError::Transport {
            method: method.clone(),
            path: self.path.clone(),
            source,
        };

        let response = self.builder.send().await.map_err(transport)?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.text().await.map_err(transport)?;

        debug!(
            method = %method,
            path = %self.path,
            status = status.as_u16(),
            bytes = body.len(),
            "Request completed"
        );

        Ok(ApiResponse {
            method,
            path: self.path,
            status,
            headers,
            body,
        })
    }
}

/// A fully buffered response.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    method: String,
    path: String,
    status: StatusCode,
    headers: HeaderMap,
    body: String,
}

impl ApiResponse {
    /// Assembles a response from its parts.
    pub fn from_parts(
        method: &Method,
        path: impl Into<String>,
        status: StatusCode,
        headers: HeaderMap,
        body: impl Into<String>,
    ) -> Self {
        Self {
            method: method.to_string(),
            path: path.into(),
            status,
            headers,
            body: body.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn status_code(&self) -> u16 {
        self.status.as_u16()
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Returns the `Content-Type` header, if present and valid UTF-8.
    pub fn content_type(&self) -> Option<&str> {
        self.headers
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
    }

    pub fn text(&self) -> &str {
        &self.body
    }

    /// Returns `METHOD /path` of the originating request.
    pub fn request(&self) -> String {
        format!("{} {}", self.method, self.path)
    }

    /// Decodes the body.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, ClientError> {
        serde_json::from_str(&self.body).map_err(|source| ClientError::Decode {
            method: self.method.clone(),
            path: self.path.clone(),
            source,
        })
    }

    /// Decodes the body as an untyped JSON value.
    pub fn json_value(&self) -> Result<Value, ClientError> {
        self.json()
    }

    /// Whether the body carries no data: zero-length, whitespace only or
    /// the empty JSON object `{}`.
    pub fn is_empty_body(&self) -> bool {
        let trimmed = self.body.trim();
        if trimmed.is_empty() {
            return true;
        }
        matches!(
            serde_json::from_str::<Value>(trimmed),
            Ok(Value::Object(ref map)) if map.is_empty()
        )
    }

    /// Converts a non-2xx response into [`ClientError::UnexpectedStatus`].
    pub fn error_for_status(self) -> Result<Self, ClientError> {
        if self.status.is_success() {
            return Ok(self);
        }
        let mut body = self.body;
        if body.len() > ERROR_BODY_LIMIT {
            let mut cut = ERROR_BODY_LIMIT;
            while !body.is_char_boundary(cut) {
                cut -= 1;
            }
            body.truncate(cut);
            body.push_str("...");
        }
        Err(ClientError::UnexpectedStatus {
            method: self.method,
            path: self.path,
            status: self.status.as_u16(),
            body,
        })
    }
}
