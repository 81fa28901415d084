//! Users, roles and the per-request user context.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Application role stored in the user's metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum UserRole {
    Admin,
    /// Any role that is not recognized counts as a plain user.
    #[default]
    #[serde(other)]
    User,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Admin => "ADMIN",
            UserRole::User => "USER",
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, UserRole::Admin)
    }
}

impl std::fmt::Display for UserRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Profile fields kept in the auth provider's user metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<UserRole>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub surname: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
}

impl UserMetadata {
    pub fn role(&self) -> UserRole {
        self.role.unwrap_or_default()
    }
}

/// Row of the admin user list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSummary {
    pub id: String,
    pub email: String,
    pub role: UserRole,
    pub created_at: Option<DateTime<Utc>>,
}

/// Current-user data handed explicitly to whoever needs it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserContext {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    pub name: String,
    pub surname: String,
    pub email: String,
    pub avatar_url: Option<String>,
    pub role: UserRole,
    pub is_logged_in: bool,
}

impl UserContext {
    /// Context of a visitor without a session.
    pub fn signed_out() -> Self {
        Self {
            user_id: None,
            name: String::new(),
            surname: String::new(),
            email: String::new(),
            avatar_url: None,
            role: UserRole::User,
            is_logged_in: false,
        }
    }

    /// Context of an authenticated user.
    pub fn signed_in(user_id: impl Into<String>, email: Option<String>, metadata: &UserMetadata) -> Self {
        Self {
            user_id: Some(user_id.into()),
            name: metadata.name.clone().unwrap_or_default(),
            surname: metadata.surname.clone().unwrap_or_default(),
            email: email.unwrap_or_default(),
            avatar_url: metadata.avatar_url.clone(),
            role: metadata.role(),
            is_logged_in: true,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.is_logged_in && self.role.is_admin()
    }
}

impl Default for UserContext {
    fn default() -> Self {
        Self::signed_out()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_parsing() {
        assert_eq!(serde_json::from_str::<UserRole>("\"ADMIN\"").unwrap(), UserRole::Admin);
        assert_eq!(serde_json::from_str::<UserRole>("\"USER\"").unwrap(), UserRole::User);
        assert_eq!(serde_json::from_str::<UserRole>("\"editor\"").unwrap(), UserRole::User);
    }

    #[test]
    fn test_metadata_defaults_to_user_role() {
        let meta: UserMetadata = serde_json::from_str(r#"{"name": "Asha"}"#).unwrap();
        assert_eq!(meta.role(), UserRole::User);
    }

    #[test]
    fn test_context_from_metadata() {
        let meta = UserMetadata {
            role: Some(UserRole::Admin),
            name: Some("Asha".into()),
            surname: None,
            avatar_url: Some("https://cdn/a.png".into()),
        };
        let ctx = UserContext::signed_in("u1", Some("asha@example.com".into()), &meta);
        assert!(ctx.is_admin());
        assert_eq!(ctx.surname, "");

        let json = serde_json::to_value(&ctx).unwrap();
        assert_eq!(json["isLoggedIn"], true);
        assert_eq!(json["avatarUrl"], "https://cdn/a.png");
    }

    #[test]
    fn test_signed_out_is_not_admin() {
        let mut ctx = UserContext::signed_out();
        ctx.role = UserRole::Admin;
        assert!(!ctx.is_admin());
    }
}
