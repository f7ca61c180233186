//! Token Types

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Identity attributes a token pair is issued for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimSet {
    /// Opaque user identifier (usually a UUID string).
    pub id: String,
    /// Email address.
    pub email: String,
    /// Role names. Order carries no meaning.
    pub roles: BTreeSet<String>,
}

impl ClaimSet {
    /// Build a claim set from any iterable of role names.
    pub fn new<I, S>(id: impl Into<String>, email: impl Into<String>, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            id: id.into(),
            email: email.into(),
            roles: roles.into_iter().map(Into::into).collect(),
        }
    }
}

/// Token type discriminator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    /// Short-lived access token.
    Access,
    /// Long-lived refresh token.
    Refresh,
}

impl TokenType {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Access => "access",
            Self::Refresh => "refresh",
        }
    }
}

/// Payload carried in the second segment of a signed token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPayload {
    pub user_id: String,
    pub email: String,
    pub roles: BTreeSet<String>,
    /// Shared by the access and refresh token of one issuance.
    pub session_id: String,
    #[serde(rename = "type")]
    pub token_type: TokenType,
    /// Issued at (Unix seconds).
    pub iat: i64,
    /// Expiration time (Unix seconds).
    pub exp: i64,
}

impl TokenPayload {
    /// Returns the claim set this payload was issued for.
    pub fn claims(&self) -> ClaimSet {
        ClaimSet {
            id: self.user_id.clone(),
            email: self.email.clone(),
            roles: self.roles.clone(),
        }
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.contains(role)
    }
}

/// Token pair returned on issuance and refresh.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    /// Access token lifetime in seconds.
    pub expires_in: i64,
    /// Refresh token lifetime in seconds.
    pub refresh_expires_in: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_uses_wire_field_names() {
        let payload = TokenPayload {
            user_id: "u1".into(),
            email: "a@example.com".into(),
            roles: BTreeSet::from(["user".to_string()]),
            session_id: "s1".into(),
            token_type: TokenType::Refresh,
            iat: 10,
            exp: 20,
        };

        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["userId"], "u1");
        assert_eq!(json["sessionId"], "s1");
        assert_eq!(json["type"], "refresh");
        assert_eq!(json["roles"][0], "user");
    }

    #[test]
    fn claim_set_roles_are_a_set() {
        let claims = ClaimSet::new("u1", "a@example.com", ["user", "admin", "user"]);
        assert_eq!(claims.roles.len(), 2);
        assert!(claims.roles.contains("admin"));
    }
}
