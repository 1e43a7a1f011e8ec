use std::time::Duration;

use async_trait::async_trait;
use reqwest::RequestBuilder;
use serde_json::{json, Value};

use crate::models::auth::{Session, SignUpOutcome, User};

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Network error: {0}")]
    Transport(#[from] reqwest::Error),
    /// Message returned by the auth provider, e.g. "Invalid login credentials".
    #[error("{0}")]
    Rejected(String),
    #[error("Unexpected auth response: {0}")]
    Decode(String),
}

#[async_trait]
pub trait AuthApi: Send + Sync {
    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<Session, AuthError>;

    /// `metadata` is stored as the new user's free-form profile data.
    async fn sign_up(&self, email: &str, password: &str, metadata: Value) -> Result<SignUpOutcome, AuthError>;

    /// Exchanges a refresh token for a new session.
    async fn refresh_session(&self, refresh_token: &str) -> Result<Session, AuthError>;

    async fn sign_out(&self, access_token: &str) -> Result<(), AuthError>;

    async fn reset_password_for_email(&self, email: &str, redirect_to: &str) -> Result<(), AuthError>;
}

/// Client for the backend's password auth endpoints.
#[derive(Clone)]
pub struct AuthClient {
    client: reqwest::Client,
    url: String,
    anon_key: String,
}

impl AuthClient {
    pub fn new(url: &str, anon_key: &str, timeout: Duration) -> Result<Self, AuthError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            url: url.trim_end_matches('/').to_string(),
            anon_key: anon_key.to_string(),
        })
    }

    fn post(&self, path: &str, bearer: &str) -> RequestBuilder {
        self.client
            .post(format!("{}/auth/v1/{}", self.url, path))
            .header("apikey", &self.anon_key)
            .bearer_auth(bearer)
    }

    async fn send(&self, request: RequestBuilder) -> Result<Value, AuthError> {
        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            return Err(AuthError::Rejected(rejection_message(&text, status.as_u16())));
        }
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }

        serde_json::from_str(&text).map_err(|e| AuthError::Decode(e.to_string()))
    }
}

#[async_trait]
impl AuthApi for AuthClient {
    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<Session, AuthError> {
        let request = self
            .post("token", &self.anon_key)
            .query(&[("grant_type", "password")])
            .json(&json!({ "email": email, "password": password }));

        let body = self.send(request).await?;
        serde_json::from_value(body).map_err(|e| AuthError::Decode(e.to_string()))
    }

    async fn sign_up(&self, email: &str, password: &str, metadata: Value) -> Result<SignUpOutcome, AuthError> {
        let request = self
            .post("signup", &self.anon_key)
            .json(&json!({ "email": email, "password": password, "data": metadata }));

        let body = self.send(request).await?;
        parse_sign_up(body)
    }

    async fn refresh_session(&self, refresh_token: &str) -> Result<Session, AuthError> {
        let request = self
            .post("token", &self.anon_key)
            .query(&[("grant_type", "refresh_token")])
            .json(&json!({ "refresh_token": refresh_token }));

        let body = self.send(request).await?;
        serde_json::from_value(body).map_err(|e| AuthError::Decode(e.to_string()))
    }

    async fn sign_out(&self, access_token: &str) -> Result<(), AuthError> {
        let request = self.post("logout", access_token);
        self.send(request).await?;
        Ok(())
    }

    async fn reset_password_for_email(&self, email: &str, redirect_to: &str) -> Result<(), AuthError> {
        let request = self
            .post("recover", &self.anon_key)
            .query(&[("redirect_to", redirect_to)])
            .json(&json!({ "email": email }));

        self.send(request).await?;
        Ok(())
    }
}

fn parse_sign_up(body: Value) -> Result<SignUpOutcome, AuthError> {
    let decode = |e: serde_json::Error| AuthError::Decode(e.to_string());

    if body.get("access_token").is_some() {
        let session: Session = serde_json::from_value(body).map_err(decode)?;
        return Ok(SignUpOutcome {
            user: Some(session.user.clone()),
            session: Some(session),
        });
    }

    let user_value = if body.get("user").is_some() {
        body["user"].clone()
    } else {
        body
    };
    let user: Option<User> = if user_value.get("id").is_some() {
        Some(serde_json::from_value(user_value).map_err(decode)?)
    } else {
        None
    };

    Ok(SignUpOutcome { user, session: None })
}

/// The auth provider reports errors under different keys depending on the
/// endpoint and version.
fn rejection_message(body: &str, status: u16) -> String {
    let parsed: Option<Value> = serde_json::from_str(body).ok();
    let from_keys = parsed.as_ref().and_then(|value| {
        ["error_description", "msg", "message", "error"]
            .iter()
            .find_map(|key| value.get(*key).and_then(Value::as_str))
            .map(str::to_string)
    });

    match from_keys {
        Some(message) => message,
        None if !body.trim().is_empty() => body.trim().to_string(),
        None => format!("Authentication request failed with status {}", status),
    }
}
