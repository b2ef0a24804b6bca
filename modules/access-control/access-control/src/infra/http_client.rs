//! HTTP client for the console backend.
//!
//! Implements [`PermissionSource`] and [`AdminAuthClient`] over a pooled
//! `hyper-util` client with rustls. Authenticated requests carry the
//! session's bearer token; a `401` is reported as
//! [`AccessControlError::Unauthorized`] so the caller can drop the session.

use std::sync::Arc;
use std::time::Duration;

use access_control_sdk::{
    AccessControlError, AdminAuthClient, GrantsEnvelope, LoginGrant, PermissionGrant,
    PermissionSource,
};
use async_trait::async_trait;
use bytes::Bytes;
use console_security::{RoleIds, SessionContext, SessionUser};
use http::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use http::{Method, Request, StatusCode};
use http_body_util::{BodyExt, Full};
use hyper_rustls::HttpsConnector;
use hyper_util::client::legacy::Client;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::rt::TokioExecutor;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::Url;

const PERMISSIONS_PATH: &str = "user/permissions/roles";
const LOGIN_PATH: &str = "auth/admin_login";
const LOGIN_FAILED: &str = "Login failed";
const INCORRECT_CREDENTIALS: &str = "Incorrect credentials";

#[derive(Serialize)]
struct LoginRequest<'a> {
    identifier: &'a str,
    password: &'a str,
}

#[derive(Deserialize)]
struct LoginData {
    access_token: String,
    #[serde(flatten)]
    user: SessionUser,
}

/// Console backend client.
pub struct ConsoleHttpClient {
    base_url: Url,
    session: Arc<SessionContext>,
    client: Client<HttpsConnector<HttpConnector>, Full<Bytes>>,
    request_timeout: Duration,
}

impl ConsoleHttpClient {
    /// # Errors
    ///
    /// Returns `Internal` if `base_url` is not an absolute URL.
    pub fn new(
        base_url: &str,
        session: Arc<SessionContext>,
        request_timeout: Duration,
    ) -> Result<Self, AccessControlError> {
        let mut url = Url::parse(base_url).map_err(|e| {
            AccessControlError::Internal(format!("invalid backend url '{base_url}': {e}"))
        })?;
        // `Url::join` replaces the last segment unless the path ends with '/'.
        if !url.path().ends_with('/') {
            let path = format!("{}/", url.path());
            url.set_path(&path);
        }

        let connector = hyper_rustls::HttpsConnectorBuilder::new()
            .with_webpki_roots()
            .https_or_http()
            .enable_http1()
            .build();
        let client = Client::builder(TokioExecutor::new()).build(connector);

        Ok(Self {
            base_url: url,
            session,
            client,
            request_timeout,
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url, AccessControlError> {
        self.base_url
            .join(path)
            .map_err(|e| AccessControlError::Internal(format!("invalid endpoint '{path}': {e}")))
    }

    async fn send(
        &self,
        request: Request<Full<Bytes>>,
    ) -> Result<(StatusCode, Bytes), AccessControlError> {
        let exchange = async {
            let response = self
                .client
                .request(request)
                .await
                .map_err(|e| AccessControlError::Transport(e.to_string()))?;
            let status = response.status();
            let body = response
                .into_body()
                .collect()
                .await
                .map_err(|e| AccessControlError::Transport(e.to_string()))?
                .to_bytes();
            Ok::<_, AccessControlError>((status, body))
        };
        tokio::time::timeout(self.request_timeout, exchange)
            .await
            .map_err(|_| AccessControlError::Timeout(self.request_timeout))?
    }
}

impl std::fmt::Debug for ConsoleHttpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConsoleHttpClient")
            .field("base_url", &self.base_url.as_str())
            .field("request_timeout", &self.request_timeout)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl PermissionSource for ConsoleHttpClient {
    #[tracing::instrument(skip_all, fields(role_ids = %role_ids))]
    async fn role_grants(
        &self,
        role_ids: &RoleIds,
    ) -> Result<Vec<PermissionGrant>, AccessControlError> {
        let mut url = self.endpoint(PERMISSIONS_PATH)?;
        url.set_query(Some(&format!("ids={}", role_ids.join())));

        let mut builder = Request::builder()
            .method(Method::GET)
            .uri(url.as_str())
            .header(ACCEPT, "application/json");
        if let Some(token) = self.session.bearer_token() {
            builder = builder.header(AUTHORIZATION, bearer(&token));
        }
        let request = builder
            .body(Full::new(Bytes::new()))
            .map_err(|e| AccessControlError::Internal(e.to_string()))?;

        let (status, body) = self.send(request).await?;
        if status == StatusCode::UNAUTHORIZED {
            return Err(AccessControlError::Unauthorized(
                error_message(&body).unwrap_or_else(|| "session token rejected".to_owned()),
            ));
        }
        if !status.is_success() {
            return Err(AccessControlError::Status {
                status: status.as_u16(),
                message: error_message(&body).unwrap_or_else(|| status.to_string()),
            });
        }

        let envelope: GrantsEnvelope = serde_json::from_slice(&body)
            .map_err(|e| AccessControlError::InvalidResponse(e.to_string()))?;
        tracing::debug!(grants = envelope.data.len(), "Fetched role permissions");
        Ok(envelope.data)
    }
}

#[async_trait]
impl AdminAuthClient for ConsoleHttpClient {
    #[tracing::instrument(skip(self, password))]
    async fn login(
        &self,
        identifier: &str,
        password: &SecretString,
    ) -> Result<LoginGrant, AccessControlError> {
        let payload = serde_json::to_vec(&LoginRequest {
            identifier,
            password: password.expose_secret(),
        })
        .map_err(|e| AccessControlError::Internal(e.to_string()))?;

        let request = Request::builder()
            .method(Method::POST)
            .uri(self.endpoint(LOGIN_PATH)?.as_str())
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, "application/json")
            .body(Full::new(Bytes::from(payload)))
            .map_err(|e| AccessControlError::Internal(e.to_string()))?;

        let (status, body) = self.send(request).await?;
        if status.is_server_error() {
            return Err(AccessControlError::Status {
                status: status.as_u16(),
                message: error_message(&body).unwrap_or_else(|| LOGIN_FAILED.to_owned()),
            });
        }
        if !status.is_success() {
            return Err(AccessControlError::LoginRejected(
                error_message(&body).unwrap_or_else(|| LOGIN_FAILED.to_owned()),
            ));
        }

        let reply: Value = serde_json::from_slice(&body)
            .map_err(|e| AccessControlError::InvalidResponse(e.to_string()))?;
        if reply.get("success") != Some(&Value::Bool(true)) {
            let message = non_empty_str(reply.get("message"))
                .unwrap_or(INCORRECT_CREDENTIALS)
                .to_owned();
            return Err(AccessControlError::LoginRejected(message));
        }

        let data: LoginData = reply
            .get("data")
            .map(LoginData::deserialize)
            .transpose()
            .map_err(|e| AccessControlError::InvalidResponse(e.to_string()))?
            .ok_or_else(|| {
                AccessControlError::InvalidResponse("login reply has no data".to_owned())
            })?;
        if data.access_token.trim().is_empty() {
            return Err(AccessControlError::InvalidResponse(
                "login reply has an empty access token".to_owned(),
            ));
        }

        tracing::debug!(role = ?data.user.role, "Admin login accepted");
        Ok(LoginGrant {
            user: data.user,
            access_token: SecretString::from(data.access_token),
        })
    }
}

fn bearer(token: &SecretString) -> String {
    format!("Bearer {}", token.expose_secret())
}

fn non_empty_str(value: Option<&Value>) -> Option<&str> {
    value
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// Backend error text: `message`, then `detail`, then `non_field_errors[0]`.
fn error_message(body: &[u8]) -> Option<String> {
    let value: Value = serde_json::from_slice(body).ok()?;
    non_empty_str(value.get("message"))
        .or_else(|| non_empty_str(value.get("detail")))
        .or_else(|| non_empty_str(value.get("non_field_errors").and_then(|e| e.get(0))))
        .map(str::to_owned)
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn error_message_precedence() {
        assert_eq!(
            error_message(br#"{"message":"m","detail":"d"}"#).as_deref(),
            Some("m")
        );
        assert_eq!(
            error_message(br#"{"message":"","detail":"d"}"#).as_deref(),
            Some("d")
        );
        assert_eq!(
            error_message(br#"{"non_field_errors":["first","second"]}"#).as_deref(),
            Some("first")
        );
        assert_eq!(error_message(b"<html>bad gateway</html>"), None);
    }

    #[test]
    fn base_url_gets_trailing_slash() {
        let client = ConsoleHttpClient::new(
            "https://console.example.com/api",
            Arc::new(SessionContext::in_memory()),
            Duration::from_secs(1),
        )
        .unwrap();
        assert_eq!(
            client.endpoint(PERMISSIONS_PATH).unwrap().as_str(),
            "https://console.example.com/api/user/permissions/roles"
        );
    }

    #[test]
    fn relative_base_url_is_rejected() {
        let err = ConsoleHttpClient::new(
            "console/api",
            Arc::new(SessionContext::in_memory()),
            Duration::from_secs(1),
        )
        .unwrap_err();
        assert!(matches!(err, AccessControlError::Internal(_)));
    }
}
