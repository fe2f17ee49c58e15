use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::auth::repo_types::User;

/// Signup form body. Fields are optional so a missing one is reported, not rejected by the extractor.
#[derive(Debug, Default, Deserialize)]
pub struct SignupForm {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct LoginForm {
    pub email: Option<String>,
    pub password: Option<String>,
}

/// Validated signup input.
#[derive(Debug, PartialEq, Eq)]
pub struct NewAccount {
    pub username: String,
    pub email: String,
    pub password: String,
}

/// Public part of the user returned to the client.
#[derive(Debug, Serialize)]
pub struct PublicUser {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub bio: String,
}

impl From<User> for PublicUser {
    fn from(u: User) -> Self {
        Self {
            id: u.id,
            username: u.username,
            email: u.email,
            bio: u.bio,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub user: Option<PublicUser>,
}

/// What anyone may see of a user: no email, no password.
#[derive(Debug, Serialize)]
pub struct PublicProfile {
    pub id: i64,
    pub username: String,
    pub bio: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl From<User> for PublicProfile {
    fn from(u: User) -> Self {
        Self {
            id: u.id,
            username: u.username,
            bio: u.bio,
            created_at: u.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    pub profile: PublicProfile,
}

#[derive(Debug, Serialize)]
pub struct UserListItem {
    pub id: i64,
    pub username: String,
}

#[derive(Debug, Serialize)]
pub struct UserListResponse {
    pub users: Vec<UserListItem>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UserSearch {
    pub q: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: &'static str,
}
