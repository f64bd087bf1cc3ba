use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

use crate::client::GraphqlClient;
use crate::error::ApiError;

const GET_PROFILE: &str = "\
query GetProfile {
  profile { id displayName email institution }
}";

const UPDATE_PROFILE: &str = "\
mutation UpdateProfile($displayName: String!, $institution: String) {
  updateProfile(displayName: $displayName, institution: $institution) {
    id displayName email institution
  }
}";

const CHANGE_PASSWORD: &str = "\
mutation ChangePassword($current: String!, $new: String!) {
  changePassword(currentPassword: $current, newPassword: $new) { success message }
}";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub id: u64,
    pub display_name: String,
    pub email: String,
    #[serde(default)]
    pub institution: Option<String>,
}

/// GraphQL wrapper for account profile operations.
#[derive(Clone)]
pub struct ProfileService {
    client: Arc<GraphqlClient>,
}

impl ProfileService {
    #[must_use]
    pub fn new(client: Arc<GraphqlClient>) -> Self {
        Self { client }
    }

    /// # Errors
    ///
    /// Returns `ApiError` for any boundary failure.
    pub async fn get_profile(&self) -> Result<Profile, ApiError> {
        #[derive(Deserialize)]
        struct Data {
            profile: Profile,
        }
        let data: Data = self.client.execute(GET_PROFILE, &json!({})).await?;
        Ok(data.profile)
    }

    /// Update display name and institution, returning the stored profile.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` for any boundary failure.
    pub async fn update_profile(
        &self,
        display_name: &str,
        institution: Option<&str>,
    ) -> Result<Profile, ApiError> {
        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct Data {
            update_profile: Profile,
        }
        let variables = json!({ "displayName": display_name, "institution": institution });
        let data: Data = self.client.execute(UPDATE_PROFILE, &variables).await?;
        Ok(data.update_profile)
    }

    /// Change the account password. A `success: false` verdict carries the
    /// backend's reason and is surfaced as a backend error.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` for any boundary failure or a rejected change.
    pub async fn change_password(&self, current: &str, new: &str) -> Result<(), ApiError> {
        #[derive(Deserialize)]
        struct Verdict {
            success: bool,
            #[serde(default)]
            message: Option<String>,
        }
        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct Data {
            change_password: Verdict,
        }

        let variables = json!({ "current": current, "new": new });
        let data: Data = self.client.execute(CHANGE_PASSWORD, &variables).await?;
        if data.change_password.success {
            Ok(())
        } else {
            Err(ApiError::Backend(
                data.change_password
                    .message
                    .unwrap_or_else(|| "password change rejected".to_owned()),
            ))
        }
    }
}
