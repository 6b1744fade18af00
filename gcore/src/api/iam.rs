//! Gcore IAM API: account users

use crate::api::{client::Client, error::ApiError, Service};
use serde::{Deserialize, Serialize};

pub struct IamApi<'a> {
    client: &'a Client,
}

impl<'a> IamApi<'a> {
    pub fn new(client: &'a Client) -> Self {
        Self { client }
    }

    /// The account the API token belongs to
    pub async fn me(&self) -> Result<ClientAccount, ApiError> {
        self.client.get(Service::Iam, "/clients/me").await
    }

    /// Sends an invitation email; the user exists (not yet activated) as soon
    /// as this returns.
    pub async fn invite_user(&self, request: &InviteUserRequest) -> Result<InvitedUser, ApiError> {
        self.client
            .post(Service::Iam, "/clients/invite_user", request)
            .await
    }

    pub async fn get_user(&self, user_id: i64) -> Result<User, ApiError> {
        self.client
            .get(Service::Iam, &format!("/users/{}", user_id))
            .await
    }

    pub async fn update_user(
        &self,
        user_id: i64,
        request: &UpdateUserRequest,
    ) -> Result<User, ApiError> {
        self.client
            .patch(Service::Iam, &format!("/users/{}", user_id), request)
            .await
    }

    /// Removes the user from the account; the user's login itself survives
    pub async fn delete_user(&self, client_id: i64, user_id: i64) -> Result<(), ApiError> {
        self.client
            .delete_empty(
                Service::Iam,
                &format!("/clients/{}/client-users/{}", client_id, user_id),
            )
            .await
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ClientAccount {
    pub id: i64,
    pub email: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserGroup {
    pub id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct InviteUserRequest {
    pub client_id: i64,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub lang: String,
    pub user_role: UserGroup,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InvitedUser {
    pub user_id: i64,
}

#[derive(Debug, Clone, Serialize, Default)]
pub struct UpdateUserRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lang: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub groups: Option<Vec<UserGroup>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub name: Option<String>,
    pub lang: Option<String>,
    #[serde(default)]
    pub groups: Vec<UserGroup>,
    pub company: Option<String>,
    pub phone: Option<String>,
    #[serde(default)]
    pub activated: bool,
    #[serde(default)]
    pub deleted: bool,
    pub client: Option<i64>,
}
