use async_trait::async_trait;
use serde::de::IgnoredAny;

use super::rest::RestClient;
use super::RepositoryError;
use crate::models::profiles::{NewProfile, Profile, ProfilePatch, ProfileUpdate, PROFILE_COLUMNS};

const PROFILES: &str = "profiles";

#[async_trait]
pub trait ProfileRepository: Send + Sync {
    async fn profile_exists(&self, user_id: &str) -> Result<bool, RepositoryError>;

    async fn fetch_profile(&self, user_id: &str) -> Result<Option<Profile>, RepositoryError>;

    async fn insert_profile(&self, profile: &NewProfile) -> Result<(), RepositoryError>;

    /// Writes only the fields present in `patch`.
    async fn patch_profile(&self, user_id: &str, patch: &ProfilePatch) -> Result<(), RepositoryError>;

    async fn update_profile(&self, user_id: &str, update: &ProfileUpdate) -> Result<Profile, RepositoryError>;
}

#[derive(Clone)]
pub struct RestProfileRepository {
    rest: RestClient,
}

impl RestProfileRepository {
    pub fn new(rest: RestClient) -> Self {
        Self { rest }
    }
}

#[async_trait]
impl ProfileRepository for RestProfileRepository {
    async fn profile_exists(&self, user_id: &str) -> Result<bool, RepositoryError> {
        let existing: Option<IgnoredAny> = self
            .rest
            .table(PROFILES)
            .select("id")
            .eq("id", user_id)
            .fetch_maybe_single()
            .await?;

        Ok(existing.is_some())
    }

    async fn fetch_profile(&self, user_id: &str) -> Result<Option<Profile>, RepositoryError> {
        self.rest
            .table(PROFILES)
            .select(PROFILE_COLUMNS)
            .eq("id", user_id)
            .fetch_maybe_single()
            .await
    }

    async fn insert_profile(&self, profile: &NewProfile) -> Result<(), RepositoryError> {
        self.rest.table(PROFILES).insert_minimal(profile).await?;
        log::info!("Created profile for user {}.", profile.id);
        Ok(())
    }

    async fn patch_profile(&self, user_id: &str, patch: &ProfilePatch) -> Result<(), RepositoryError> {
        self.rest
            .table(PROFILES)
            .eq("id", user_id)
            .update_minimal(patch)
            .await
    }

    async fn update_profile(&self, user_id: &str, update: &ProfileUpdate) -> Result<Profile, RepositoryError> {
        self.rest
            .table(PROFILES)
            .select(PROFILE_COLUMNS)
            .eq("id", user_id)
            .update(update)
            .await
    }
}
