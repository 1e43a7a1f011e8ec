use std::sync::Arc;
use std::time::Duration;

use crate::repositories::auth::{AuthClient, AuthError};
use crate::repositories::goals::RestGoalRepository;
use crate::repositories::profiles::RestProfileRepository;
use crate::repositories::rest::RestClient;
use crate::repositories::RepositoryError;
use crate::settings::Settings;

pub mod deposit;
pub mod goals;
pub mod profiles;
pub mod session;
pub mod summary;

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    Authentication(String),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error("{0}")]
    NotFound(String),
    #[error("A deposit for goal {0} is already in progress.")]
    DepositInFlight(String),
    #[error("Cannot {0} a deposit that is {1}.")]
    InvalidTransition(&'static str, &'static str),
    #[error("Session storage error: {0}")]
    Storage(String),
}

impl From<AuthError> for ServiceError {
    fn from(error: AuthError) -> Self {
        ServiceError::Authentication(error.to_string())
    }
}

/// Everything the application root owns: the shared REST client, the
/// session context and the per-screen services built on top of them.
pub struct AppServices {
    pub rest: RestClient,
    pub session: session::AuthContext,
    pub profiles: profiles::ProfileService,
    pub goals: goals::GoalBoard,
}

impl AppServices {
    pub fn new(settings: &Settings) -> Result<Self, anyhow::Error> {
        let timeout = Duration::from_secs(settings.backend.timeout_secs);
        let rest = RestClient::new(&settings.backend.url, &settings.backend.anon_key, timeout)?;
        let auth = AuthClient::new(&settings.backend.url, &settings.backend.anon_key, timeout)?;

        let profiles = profiles::ProfileService::new(Arc::new(RestProfileRepository::new(rest.clone())));
        let goals = goals::GoalBoard::new(Arc::new(RestGoalRepository::new(rest.clone())));
        let session = session::AuthContext::new(Arc::new(auth), profiles.clone(), &settings.backend.site_url)
            .with_store(session::SessionStore::new(settings.session_path()))
            .with_rest_client(rest.clone());

        Ok(Self {
            rest,
            session,
            profiles,
            goals,
        })
    }
}
