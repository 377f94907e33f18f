/// JWT Token Issuance and Validation
///
/// Tokens are compact HS256 JWS strings. Validation runs as a fixed sequence
/// and stops at the first failure:
///
/// 1. structure  -> `Malformed`
/// 2. algorithm  -> `UnsupportedAlgorithm`
/// 3. signature  -> `SignatureInvalid`
/// 4. expiry     -> `Expired`
/// 5. claims     -> `ClaimsInvalid`
///
/// The header is inspected by hand before `jsonwebtoken` gets involved, so
/// `alg: none` and other foreign algorithms are reported as such instead of
/// as a parse error, and no key is ever chosen from header contents.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::Duration;
use jsonwebtoken::{crypto, encode, Algorithm, DecodingKey, EncodingKey, Header};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::auth::claims::is_past;
use crate::auth::{AuthError, Claims, Clock, TokenClass, ISSUER};

const EXPECTED_ALG: &str = "HS256";

#[derive(Deserialize)]
struct RawHeader {
    alg: String,
}

/// Sign a new token for `user_id`.
///
/// # Arguments
/// * `user_id` - Identity the token represents
/// * `subject` - Username, stored as `sub`
/// * `class` - Access or refresh
/// * `secret` - Signing secret for `class`
/// * `ttl` - Lifetime from now
/// * `clock` - Source of the issue time
///
/// # Errors
/// `IssuanceFailure` if the claims cannot be encoded
pub fn issue_token(
    user_id: Uuid,
    subject: &str,
    class: TokenClass,
    secret: &SecretString,
    ttl: Duration,
    clock: &dyn Clock,
) -> Result<String, AuthError> {
    let claims = Claims::new(user_id, subject, class, clock.now(), ttl);

    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.expose_secret().as_bytes()),
    )
    .map_err(|e| AuthError::IssuanceFailure(e.to_string()))
}

/// Validate a token against `secret` and return its claims.
///
/// # Errors
/// The first failing stage, see the module docs.
pub fn validate_token(
    token: &str,
    secret: &SecretString,
    expected_class: TokenClass,
    clock: &dyn Clock,
) -> Result<Claims, AuthError> {
    // 1. Structural parse
    let (header_segment, payload_segment, signature_segment) = split_segments(token)?;
    let header: RawHeader = decode_segment(header_segment)?;
    let payload: Map<String, Value> = decode_segment(payload_segment)?;
    URL_SAFE_NO_PAD
        .decode(signature_segment)
        .map_err(|_| AuthError::Malformed)?;

    // 2. Algorithm check, before any key material is touched
    if header.alg != EXPECTED_ALG {
        return Err(AuthError::UnsupportedAlgorithm);
    }

    // 3. Signature verification (constant-time comparison inside jsonwebtoken)
    let signing_input = &token[..header_segment.len() + 1 + payload_segment.len()];
    let key = DecodingKey::from_secret(secret.expose_secret().as_bytes());
    let signature_ok = crypto::verify(
        signature_segment,
        signing_input.as_bytes(),
        &key,
        Algorithm::HS256,
    )
    .map_err(|_| AuthError::Malformed)?;
    if !signature_ok {
        return Err(AuthError::SignatureInvalid);
    }

    // 4. Expiry
    let exp = payload
        .get("exp")
        .and_then(Value::as_i64)
        .ok_or(AuthError::ClaimsInvalid)?;
    if is_past(clock.now(), exp) {
        return Err(AuthError::Expired);
    }

    // 5. Claims well-formedness
    let claims: Claims =
        serde_json::from_value(Value::Object(payload)).map_err(|_| AuthError::ClaimsInvalid)?;
    claims.user_id()?;
    if claims.issuer() != ISSUER {
        return Err(AuthError::ClaimsInvalid);
    }
    if let Some(class) = claims.token_class() {
        if class != expected_class {
            return Err(AuthError::ClaimsInvalid);
        }
    }

    Ok(claims)
}

fn split_segments(token: &str) -> Result<(&str, &str, &str), AuthError> {
    let mut parts = token.split('.');
    match (parts.next(), parts.next(), parts.next(), parts.next()) {
        (Some(header), Some(payload), Some(signature), None)
            if !header.is_empty() && !payload.is_empty() && !signature.is_empty() =>
        {
            Ok((header, payload, signature))
        }
        _ => Err(AuthError::Malformed),
    }
}

fn decode_segment<T: DeserializeOwned>(segment: &str) -> Result<T, AuthError> {
    let bytes = URL_SAFE_NO_PAD
        .decode(segment)
        .map_err(|_| AuthError::Malformed)?;
    serde_json::from_slice(&bytes).map_err(|_| AuthError::Malformed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::FixedClock;
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    fn secret(s: &str) -> SecretString {
        SecretString::new(s.to_string())
    }

    fn t0() -> FixedClock {
        FixedClock(Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap())
    }

    fn b64(value: &Value) -> String {
        URL_SAFE_NO_PAD.encode(serde_json::to_vec(value).unwrap())
    }

    /// Sign an arbitrary payload with HS256, bypassing `Claims`.
    fn sign_raw(payload: &Value, key: &str) -> String {
        encode(
            &Header::new(Algorithm::HS256),
            payload,
            &EncodingKey::from_secret(key.as_bytes()),
        )
        .unwrap()
    }

    fn valid_payload(clock: &FixedClock) -> Value {
        let iat = clock.0.timestamp();
        json!({
            "user_id": Uuid::new_v4().to_string(),
            "iss": "foodgenie",
            "sub": "alice",
            "iat": iat,
            "exp": iat + 60,
        })
    }

    #[test]
    fn test_round_trip() {
        let user_id = Uuid::new_v4();
        let key = secret("access-secret");
        let clock = t0();

        let token = issue_token(user_id, "alice", TokenClass::Access, &key, Duration::minutes(15), &clock)
            .expect("Failed to issue token");
        let claims = validate_token(&token, &key, TokenClass::Access, &clock)
            .expect("Failed to validate token");

        assert_eq!(claims.user_id().unwrap(), user_id);
        assert_eq!(claims.subject(), "alice");
        assert_eq!(claims.issuer(), "foodgenie");
        assert_eq!(claims.issued_at(), clock.0.timestamp());
        assert_eq!(claims.expires_at(), clock.0.timestamp() + 900);
    }

    #[test]
    fn test_valid_throughout_lifetime() {
        let key = secret("access-secret");
        let clock = t0();
        let token = issue_token(Uuid::new_v4(), "alice", TokenClass::Access, &key, Duration::minutes(15), &clock)
            .unwrap();

        for offset in [0, 1, 60, 899] {
            let later = clock.advanced(Duration::seconds(offset));
            assert!(
                validate_token(&token, &key, TokenClass::Access, &later).is_ok(),
                "rejected at +{}s",
                offset
            );
        }
    }

    #[test]
    fn test_expiry_boundary() {
        let key = secret("access-secret");
        let clock = t0();
        let ttl = Duration::minutes(15);
        let token = issue_token(Uuid::new_v4(), "alice", TokenClass::Access, &key, ttl, &clock).unwrap();

        let just_before = clock.advanced(ttl - Duration::milliseconds(1));
        assert!(validate_token(&token, &key, TokenClass::Access, &just_before).is_ok());

        let just_after = clock.advanced(ttl + Duration::milliseconds(1));
        assert_eq!(
            validate_token(&token, &key, TokenClass::Access, &just_after),
            Err(AuthError::Expired)
        );

        let much_later = clock.advanced(ttl + Duration::days(1));
        assert_eq!(
            validate_token(&token, &key, TokenClass::Access, &much_later),
            Err(AuthError::Expired)
        );
    }

    #[test]
    fn test_wrong_secret() {
        let clock = t0();
        let token = issue_token(
            Uuid::new_v4(),
            "alice",
            TokenClass::Access,
            &secret("secret-a"),
            Duration::minutes(15),
            &clock,
        )
        .unwrap();

        assert_eq!(
            validate_token(&token, &secret("secret-b"), TokenClass::Access, &clock),
            Err(AuthError::SignatureInvalid)
        );
    }

    #[test]
    fn test_signature_checked_before_expiry() {
        let clock = t0();
        let token = issue_token(
            Uuid::new_v4(),
            "alice",
            TokenClass::Access,
            &secret("secret-a"),
            Duration::seconds(1),
            &clock,
        )
        .unwrap();

        let later = clock.advanced(Duration::hours(1));
        assert_eq!(
            validate_token(&token, &secret("secret-b"), TokenClass::Access, &later),
            Err(AuthError::SignatureInvalid)
        );
    }

    #[test]
    fn test_tampered_payload() {
        let key = secret("access-secret");
        let clock = t0();
        let token = issue_token(Uuid::new_v4(), "alice", TokenClass::Access, &key, Duration::minutes(15), &clock)
            .unwrap();

        let parts: Vec<&str> = token.split('.').collect();
        let mut payload = valid_payload(&clock);
        payload["sub"] = json!("mallory");
        let forged = format!("{}.{}.{}", parts[0], b64(&payload), parts[2]);

        assert_eq!(
            validate_token(&forged, &key, TokenClass::Access, &clock),
            Err(AuthError::SignatureInvalid)
        );
    }

    #[test]
    fn test_malformed_tokens() {
        let key = secret("access-secret");
        let clock = t0();
        let header = b64(&json!({"alg": "HS256", "typ": "JWT"}));
        let payload = b64(&valid_payload(&clock));

        let cases = vec![
            String::new(),
            "invalid.token.here".to_string(),
            "onlyonesegment".to_string(),
            format!("{}.{}", header, payload),
            format!("{}.{}.", header, payload),
            format!("{}.{}.sig.extra", header, payload),
            format!("{}.{}.!!!", header, payload),
            format!("{}.{}.c2ln", b64(&json!("not-an-object")), payload),
            format!("{}.{}.c2ln", header, b64(&json!([1, 2, 3]))),
            format!("{}.{}.c2ln", b64(&json!({"typ": "JWT"})), payload),
        ];

        for token in cases {
            assert_eq!(
                validate_token(&token, &key, TokenClass::Access, &clock),
                Err(AuthError::Malformed),
                "token {:?}",
                token
            );
        }
    }

    #[test]
    fn test_alg_none_rejected_without_secret() {
        let clock = t0();
        let header = b64(&json!({"alg": "none", "typ": "JWT"}));
        let payload = b64(&valid_payload(&clock));
        let token = format!("{}.{}.c2ln", header, payload);

        assert_eq!(
            validate_token(&token, &secret(""), TokenClass::Access, &clock),
            Err(AuthError::UnsupportedAlgorithm)
        );
    }

    #[test]
    fn test_foreign_algorithms_rejected() {
        let key = secret("access-secret");
        let clock = t0();
        let payload = b64(&valid_payload(&clock));

        for alg in ["HS384", "HS512", "RS256", "ES256", "hs256", "None", ""] {
            let header = b64(&json!({"alg": alg, "typ": "JWT"}));
            let token = format!("{}.{}.c2ln", header, payload);
            assert_eq!(
                validate_token(&token, &key, TokenClass::Access, &clock),
                Err(AuthError::UnsupportedAlgorithm),
                "alg {:?}",
                alg
            );
        }
    }

    #[test]
    fn test_hs512_signed_with_same_secret_rejected() {
        let clock = t0();
        let token = encode(
            &Header::new(Algorithm::HS512),
            &valid_payload(&clock),
            &EncodingKey::from_secret(b"access-secret"),
        )
        .unwrap();

        assert_eq!(
            validate_token(&token, &secret("access-secret"), TokenClass::Access, &clock),
            Err(AuthError::UnsupportedAlgorithm)
        );
    }

    #[test]
    fn test_invalid_user_id_claim() {
        let clock = t0();
        let mut payload = valid_payload(&clock);
        payload["user_id"] = json!("not-a-uuid");
        let token = sign_raw(&payload, "access-secret");

        assert_eq!(
            validate_token(&token, &secret("access-secret"), TokenClass::Access, &clock),
            Err(AuthError::ClaimsInvalid)
        );
    }

    #[test]
    fn test_missing_claims() {
        let clock = t0();
        for field in ["user_id", "sub", "iat", "exp", "iss"] {
            let mut payload = valid_payload(&clock);
            payload.as_object_mut().unwrap().remove(field);
            let token = sign_raw(&payload, "access-secret");

            assert_eq!(
                validate_token(&token, &secret("access-secret"), TokenClass::Access, &clock),
                Err(AuthError::ClaimsInvalid),
                "missing {}",
                field
            );
        }
    }

    #[test]
    fn test_wrong_issuer() {
        let clock = t0();
        let mut payload = valid_payload(&clock);
        payload["iss"] = json!("someone-else");
        let token = sign_raw(&payload, "access-secret");

        assert_eq!(
            validate_token(&token, &secret("access-secret"), TokenClass::Access, &clock),
            Err(AuthError::ClaimsInvalid)
        );
    }

    #[test]
    fn test_class_mismatch_with_shared_secret() {
        // Only reachable when both classes are signed with the same key.
        let key = secret("shared-secret");
        let clock = t0();
        let token = issue_token(Uuid::new_v4(), "alice", TokenClass::Refresh, &key, Duration::days(7), &clock)
            .unwrap();

        assert_eq!(
            validate_token(&token, &key, TokenClass::Access, &clock),
            Err(AuthError::ClaimsInvalid)
        );
        assert!(validate_token(&token, &key, TokenClass::Refresh, &clock).is_ok());
    }

    #[test]
    fn test_legacy_token_without_class_accepted() {
        let clock = t0();
        let token = sign_raw(&valid_payload(&clock), "access-secret");

        let claims = validate_token(&token, &secret("access-secret"), TokenClass::Access, &clock)
            .expect("Legacy token should validate");
        assert_eq!(claims.token_class(), None);
    }

    #[test]
    fn test_tokens_are_unique() {
        let key = secret("access-secret");
        let clock = t0();
        let user_id = Uuid::new_v4();

        let first = issue_token(user_id, "alice", TokenClass::Access, &key, Duration::minutes(15), &clock).unwrap();
        let second = issue_token(user_id, "alice", TokenClass::Access, &key, Duration::minutes(15), &clock).unwrap();

        assert_ne!(first, second);
    }

    #[test]
    fn test_header_is_fixed_hs256() {
        let token = issue_token(
            Uuid::new_v4(),
            "alice",
            TokenClass::Access,
            &secret("access-secret"),
            Duration::minutes(15),
            &t0(),
        )
        .unwrap();

        let header = jsonwebtoken::decode_header(&token).unwrap();
        assert_eq!(header.alg, Algorithm::HS256);
        assert_eq!(header.typ.as_deref(), Some("JWT"));
    }
}
