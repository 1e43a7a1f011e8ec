use std::sync::Arc;

use super::ServiceError;
use crate::models::auth::User;
use crate::models::profiles::{NewProfile, Profile, ProfilePatch, ProfileUpdate};
use crate::repositories::profiles::ProfileRepository;

#[derive(Clone)]
pub struct ProfileService {
    repository: Arc<dyn ProfileRepository>,
}

impl ProfileService {
    pub fn new(repository: Arc<dyn ProfileRepository>) -> Self {
        Self { repository }
    }

    /// Makes sure `user` has a profile row.
    ///
    /// An existing row is only touched when `overrides` carries fields. A
    /// new row takes each field from `overrides`, then from the user's
    /// metadata, and finally falls back to the email's local part for the
    /// display name.
    pub async fn ensure_profile(&self, user: &User, overrides: Option<&ProfilePatch>) -> Result<(), ServiceError> {
        if self.repository.profile_exists(&user.id).await? {
            if let Some(patch) = overrides.filter(|patch| !patch.is_empty()) {
                self.repository.patch_profile(&user.id, patch).await?;
            }
            return Ok(());
        }

        let profile = new_profile(user, overrides);
        self.repository.insert_profile(&profile).await?;
        Ok(())
    }

    pub async fn fetch_profile(&self, user_id: &str) -> Result<Option<Profile>, ServiceError> {
        Ok(self.repository.fetch_profile(user_id).await?)
    }

    pub async fn update_profile(&self, user_id: &str, update: &ProfileUpdate) -> Result<Profile, ServiceError> {
        Ok(self.repository.update_profile(user_id, update).await?)
    }
}

fn new_profile(user: &User, overrides: Option<&ProfilePatch>) -> NewProfile {
    let mut display_name = overrides
        .and_then(|patch| patch.display_name.clone().flatten())
        .or_else(|| {
            user.metadata_str("display_name")
                .or_else(|| user.metadata_str("full_name"))
                .map(str::to_string)
        });
    let username = overrides
        .and_then(|patch| patch.username.clone().flatten())
        .or_else(|| user.metadata_str("username").map(str::to_string));
    let avatar_url = overrides
        .and_then(|patch| patch.avatar_url.clone().flatten())
        .or_else(|| user.metadata_str("avatar_url").map(str::to_string));

    if display_name.as_deref().map_or(true, str::is_empty) {
        if let Some(local) = user.email_local_part() {
            display_name = Some(local.to_string());
        }
    }

    NewProfile {
        id: user.id.clone(),
        display_name,
        username,
        avatar_url,
    }
}

/// Name used to greet the user: the profile's display name, else the
/// local part of their email, else "there".
pub fn greeting(profile: Option<&Profile>, email: Option<&str>) -> String {
    if let Some(name) = profile
        .and_then(|p| p.display_name.as_deref())
        .filter(|name| !name.is_empty())
    {
        return name.to_string();
    }

    match email.and_then(|email| email.split('@').next()) {
        Some(local) if !local.is_empty() => local.to_string(),
        _ => "there".to_string(),
    }
}
