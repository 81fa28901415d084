//! Supabase wire types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use jewel_models::{UserContext, UserMetadata, UserRole, UserSummary};

/// User record as returned by the auth admin API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupabaseUser {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub user_metadata: UserMetadata,
}

impl SupabaseUser {
    pub fn role(&self) -> UserRole {
        self.user_metadata.role()
    }

    /// Case-insensitive email match.
    pub fn has_email(&self, email: &str) -> bool {
        self.email
            .as_deref()
            .is_some_and(|own| own.eq_ignore_ascii_case(email.trim()))
    }

    pub fn summary(&self) -> UserSummary {
        UserSummary {
            id: self.id.clone(),
            email: self.email.clone().unwrap_or_default(),
            role: self.role(),
            created_at: self.created_at,
        }
    }

    pub fn context(&self) -> UserContext {
        UserContext::signed_in(self.id.clone(), self.email.clone(), &self.user_metadata)
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct UserList {
    #[serde(default)]
    pub users: Vec<SupabaseUser>,
}

#[derive(Debug, Serialize)]
pub(crate) struct CreateUserRequest<'a> {
    pub email: &'a str,
    pub password: &'a str,
    pub email_confirm: bool,
    pub user_metadata: UserMetadata,
}

#[derive(Debug, Serialize)]
pub(crate) struct UpdateUserRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<&'a str>,
    pub user_metadata: &'a UserMetadata,
}
