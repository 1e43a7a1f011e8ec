//! Session context shared by everything that needs to know who is signed in.
//!
//! The context is owned by the application root. Interested parties call
//! [`AuthContext::subscribe`] and are woken on every change instead of
//! polling; dropping the [`Subscription`] ends delivery.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use serde_json::json;
use tokio::sync::watch;

use super::profiles::ProfileService;
use super::ServiceError;
use crate::models::auth::{Session, SessionState, SignUpOutcome, User};
use crate::models::profiles::ProfilePatch;
use crate::repositories::auth::AuthApi;
use crate::repositories::rest::RestClient;

/// Session persisted as JSON between runs.
#[derive(Clone, Debug)]
pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Result<Option<Session>, ServiceError> {
        if !self.path.exists() {
            return Ok(None);
        }

        let text = fs::read_to_string(&self.path).map_err(|e| ServiceError::Storage(e.to_string()))?;
        let session = serde_json::from_str(&text).map_err(|e| ServiceError::Storage(e.to_string()))?;
        Ok(Some(session))
    }

    pub fn save(&self, session: &Session) -> Result<(), ServiceError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| ServiceError::Storage(e.to_string()))?;
        }

        let text = serde_json::to_string_pretty(session).map_err(|e| ServiceError::Storage(e.to_string()))?;
        fs::write(&self.path, text).map_err(|e| ServiceError::Storage(e.to_string()))
    }

    pub fn clear(&self) -> Result<(), ServiceError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(ServiceError::Storage(e.to_string())),
        }
    }
}

/// Receiving end of the session context.
pub struct Subscription {
    receiver: watch::Receiver<SessionState>,
}

impl Subscription {
    pub fn current(&self) -> SessionState {
        self.receiver.borrow().clone()
    }

    /// Waits for the next change. Returns `None` once the context is gone.
    pub async fn changed(&mut self) -> Option<SessionState> {
        self.receiver.changed().await.ok()?;
        Some(self.receiver.borrow_and_update().clone())
    }

    pub fn unsubscribe(self) {}
}

/// Optional profile fields collected at sign-up.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SignUpProfile {
    pub display_name: Option<String>,
    pub username: Option<String>,
}

pub struct AuthContext {
    auth: Arc<dyn AuthApi>,
    profiles: ProfileService,
    site_url: String,
    store: Option<SessionStore>,
    rest: Option<RestClient>,
    state: watch::Sender<SessionState>,
}

impl AuthContext {
    pub fn new(auth: Arc<dyn AuthApi>, profiles: ProfileService, site_url: &str) -> Self {
        let (state, _) = watch::channel(SessionState::default());

        Self {
            auth,
            profiles,
            site_url: site_url.trim_end_matches('/').to_string(),
            store: None,
            rest: None,
            state,
        }
    }

    pub fn with_store(mut self, store: SessionStore) -> Self {
        self.store = Some(store);
        self
    }

    /// Keeps the data client's bearer token in step with the session.
    pub fn with_rest_client(mut self, rest: RestClient) -> Self {
        self.rest = Some(rest);
        self
    }

    pub fn subscribe(&self) -> Subscription {
        Subscription {
            receiver: self.state.subscribe(),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.state.receiver_count()
    }

    pub fn current(&self) -> SessionState {
        self.state.borrow().clone()
    }

    pub fn user(&self) -> Option<User> {
        self.state.borrow().user().cloned()
    }

    pub fn is_loading(&self) -> bool {
        self.state.borrow().loading
    }

    /// The signed-in user, or an authentication error for screens that
    /// require one.
    pub fn require_user(&self) -> Result<User, ServiceError> {
        self.user()
            .ok_or_else(|| ServiceError::Authentication("You need to be signed in.".to_string()))
    }

    /// Loads the persisted session, if any, and publishes it. Expired
    /// sessions are refreshed once; failures leave the user signed out.
    /// Profile creation for a restored user is best effort.
    pub async fn restore(&self) -> SessionState {
        let stored = match &self.store {
            Some(store) => store.load().unwrap_or_else(|e| {
                log::warn!("Ignoring unreadable session at {}: {}", store.path().display(), e);
                None
            }),
            None => None,
        };

        let session = match stored {
            Some(session) if is_expired(&session) => self.refresh(session).await,
            other => other,
        };

        self.publish(session);

        if let Some(user) = self.user() {
            if let Err(e) = self.profiles.ensure_profile(&user, None).await {
                log::warn!("Could not ensure profile for {}: {}", user.id, e);
            }
        }

        self.current()
    }

    pub async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<User, ServiceError> {
        let session = self.auth.sign_in_with_password(email, password).await?;
        let user = session.user.clone();

        self.persist(&session);
        self.publish(Some(session));
        log::info!("Signed in as {}.", user.id);

        self.profiles.ensure_profile(&user, None).await?;
        Ok(user)
    }

    /// Registers a new account. When the backend hands back a session
    /// straight away the profile is created with the given fields;
    /// otherwise they ride along as user metadata and the profile is
    /// created on first sign-in.
    pub async fn sign_up_with_password(
        &self,
        email: &str,
        password: &str,
        profile: &SignUpProfile,
    ) -> Result<SignUpOutcome, ServiceError> {
        let display_name = non_empty(profile.display_name.as_deref());
        let username = non_empty(profile.username.as_deref());
        let metadata = json!({
            "display_name": display_name,
            "username": username,
        });

        let outcome = self.auth.sign_up(email, password, metadata).await?;

        match (&outcome.session, &outcome.user) {
            (Some(session), Some(user)) => {
                self.persist(session);
                self.publish(Some(session.clone()));

                let overrides = ProfilePatch {
                    display_name: Some(display_name),
                    username: Some(username),
                    avatar_url: None,
                };
                self.profiles.ensure_profile(user, Some(&overrides)).await?;
            }
            (None, Some(user)) => {
                log::info!("Sign-up for {} is awaiting email confirmation.", user.id);
            }
            _ => {}
        }

        Ok(outcome)
    }

    pub async fn sign_out(&self) -> Result<(), ServiceError> {
        let token = self.state.borrow().access_token().map(str::to_string);
        if let Some(token) = token {
            self.auth.sign_out(&token).await?;
        }

        if let Some(store) = &self.store {
            store.clear()?;
        }
        self.publish(None);
        Ok(())
    }

    /// Sends a recovery email whose link lands on the app's auth page.
    pub async fn reset_password(&self, email: &str) -> Result<(), ServiceError> {
        let redirect_to = format!("{}/auth", self.site_url);
        self.auth.reset_password_for_email(email, &redirect_to).await?;
        Ok(())
    }

    async fn refresh(&self, session: Session) -> Option<Session> {
        let result = match session.refresh_token.as_deref() {
            Some(refresh_token) => self.auth.refresh_session(refresh_token).await.map_err(|e| e.to_string()),
            None => Err("no refresh token".to_string()),
        };

        match result {
            Ok(fresh) => {
                self.persist(&fresh);
                Some(fresh)
            }
            Err(e) => {
                log::warn!("Session for {} expired and could not be refreshed: {}", session.user.id, e);
                if let Some(store) = &self.store {
                    if let Err(e) = store.clear() {
                        log::warn!("Could not clear stale session: {}", e);
                    }
                }
                None
            }
        }
    }

    fn persist(&self, session: &Session) {
        if let Some(store) = &self.store {
            if let Err(e) = store.save(session) {
                log::warn!("Could not persist session to {}: {}", store.path().display(), e);
            }
        }
    }

    fn publish(&self, session: Option<Session>) {
        if let Some(rest) = &self.rest {
            rest.set_access_token(session.as_ref().map(|s| s.access_token.clone()));
        }

        self.state.send_replace(SessionState {
            session,
            loading: false,
        });
    }
}

fn is_expired(session: &Session) -> bool {
    session
        .expires_at
        .is_some_and(|expires_at| expires_at <= Utc::now().timestamp())
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
