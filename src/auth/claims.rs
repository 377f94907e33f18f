/// JWT Claims structure
///
/// The signed payload of every access and refresh token. Field names are the
/// wire names existing clients rely on:
///
/// `{"user_id", "iss", "sub", "iat", "exp", "jti", "token_class"}`

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::AuthError;

/// Issuer stamped into and required from every token.
pub const ISSUER: &str = "foodgenie";

/// Which secret a token is meant to be verified with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenClass {
    Access,
    Refresh,
}

/// Claims carried by a token. Read-only once built.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Claims {
    /// Identity the token represents (UUID string)
    user_id: String,
    /// Issuer
    iss: String,
    /// Subject (username)
    sub: String,
    /// Issued at (Unix timestamp)
    iat: i64,
    /// Expiration time (Unix timestamp)
    exp: i64,
    /// Unique token id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    jti: Option<String>,
    /// Absent in tokens minted before classes existed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    token_class: Option<TokenClass>,
}

impl Claims {
    /// Build claims issued at `issued_at` (truncated to whole seconds)
    /// and expiring `ttl` later.
    pub(crate) fn new(
        user_id: Uuid,
        subject: &str,
        class: TokenClass,
        issued_at: DateTime<Utc>,
        ttl: Duration,
    ) -> Self {
        let iat = issued_at.timestamp();
        Self {
            user_id: user_id.to_string(),
            iss: ISSUER.to_string(),
            sub: subject.to_string(),
            iat,
            exp: iat.saturating_add(ttl.num_seconds()),
            jti: Some(Uuid::new_v4().to_string()),
            token_class: Some(class),
        }
    }

    /// Extract user ID from claims
    ///
    /// # Errors
    /// Returns `ClaimsInvalid` if the user ID is not a valid UUID
    pub fn user_id(&self) -> Result<Uuid, AuthError> {
        Uuid::parse_str(&self.user_id).map_err(|_| AuthError::ClaimsInvalid)
    }

    pub fn subject(&self) -> &str {
        &self.sub
    }

    pub fn issuer(&self) -> &str {
        &self.iss
    }

    pub fn issued_at(&self) -> i64 {
        self.iat
    }

    pub fn expires_at(&self) -> i64 {
        self.exp
    }

    pub fn token_id(&self) -> Option<&str> {
        self.jti.as_deref()
    }

    pub fn token_class(&self) -> Option<TokenClass> {
        self.token_class
    }

    /// True once `now` is strictly past `exp`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        is_past(now, self.exp)
    }
}

/// `now > exp` compared at sub-second precision; `exp` itself is still valid.
pub(crate) fn is_past(now: DateTime<Utc>, exp: i64) -> bool {
    (now.timestamp(), now.timestamp_subsec_nanos()) > (exp, 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_claims_creation() {
        let user_id = Uuid::new_v4();
        let claims = Claims::new(user_id, "alice", TokenClass::Access, t0(), Duration::minutes(15));

        assert_eq!(claims.user_id().unwrap(), user_id);
        assert_eq!(claims.subject(), "alice");
        assert_eq!(claims.issuer(), ISSUER);
        assert_eq!(claims.issued_at(), t0().timestamp());
        assert_eq!(claims.expires_at(), t0().timestamp() + 900);
        assert_eq!(claims.token_class(), Some(TokenClass::Access));
        assert!(claims.token_id().is_some());
    }

    #[test]
    fn test_sub_second_issue_time_is_truncated() {
        let issued = t0() + Duration::milliseconds(750);
        let claims = Claims::new(Uuid::new_v4(), "alice", TokenClass::Refresh, issued, Duration::seconds(10));

        assert_eq!(claims.issued_at(), t0().timestamp());
        assert_eq!(claims.expires_at(), t0().timestamp() + 10);
    }

    #[test]
    fn test_expiry_boundary() {
        let claims = Claims::new(Uuid::new_v4(), "alice", TokenClass::Access, t0(), Duration::seconds(60));
        let exp = t0() + Duration::seconds(60);

        assert!(!claims.is_expired_at(exp - Duration::milliseconds(1)));
        assert!(!claims.is_expired_at(exp));
        assert!(claims.is_expired_at(exp + Duration::milliseconds(1)));
    }

    #[test]
    fn test_invalid_user_id() {
        let mut claims = Claims::new(Uuid::new_v4(), "alice", TokenClass::Access, t0(), Duration::seconds(60));
        claims.user_id = "invalid-uuid".to_string();

        assert_eq!(claims.user_id(), Err(AuthError::ClaimsInvalid));
    }

    #[test]
    fn test_wire_field_names() {
        let claims = Claims::new(Uuid::new_v4(), "alice", TokenClass::Refresh, t0(), Duration::seconds(60));
        let value = serde_json::to_value(&claims).unwrap();

        for field in ["user_id", "iss", "sub", "iat", "exp", "jti", "token_class"] {
            assert!(value.get(field).is_some(), "missing {}", field);
        }
        assert_eq!(value["iss"], "foodgenie");
        assert_eq!(value["token_class"], "refresh");
    }

    #[test]
    fn test_legacy_payload_without_class() {
        let user_id = Uuid::new_v4();
        let claims: Claims = serde_json::from_value(serde_json::json!({
            "user_id": user_id.to_string(),
            "iss": "foodgenie",
            "sub": "alice",
            "iat": 1,
            "exp": 2
        }))
        .unwrap();

        assert_eq!(claims.token_class(), None);
        assert_eq!(claims.token_id(), None);
        assert_eq!(claims.user_id().unwrap(), user_id);
    }
}
