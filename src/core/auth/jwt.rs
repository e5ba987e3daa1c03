//! Bearer token issuance and verification
//!
//! Tokens are HS256 JWTs carrying the account id (`sub`), an optional
//! privilege (`prv`), and issue/expiry instants. Nothing is stored server
//! side: a token is valid while its signature checks out under the process
//! secret and its expiry lies in the future.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::core::accounts::{AccountError, AccountStore};
use crate::core::db::models::AccountId;

/// Default token lifetime (24 hours)
pub const DEFAULT_TOKEN_TTL_HOURS: i64 = 24;

/// Longest token lifetime accepted from configuration (one year)
pub const MAX_TOKEN_TTL_HOURS: i64 = 24 * 366;

const SIGNING_ALGORITHM: Algorithm = Algorithm::HS256;

/// Algorithms accepted on verification; anything outside the HMAC family is
/// refused before the signature is looked at
const ACCEPTED_ALGORITHMS: [Algorithm; 3] = [Algorithm::HS256, Algorithm::HS384, Algorithm::HS512];

/// Token configuration
#[derive(Clone)]
pub struct TokenConfig {
    /// Secret key for signing tokens
    pub secret: String,
    /// Token lifetime in hours
    pub ttl_hours: i64,
}

impl std::fmt::Debug for TokenConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenConfig")
            .field("secret", &"[REDACTED]")
            .field("ttl_hours", &self.ttl_hours)
            .finish()
    }
}

impl TokenConfig {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            ttl_hours: DEFAULT_TOKEN_TTL_HOURS,
        }
    }

    /// Set token lifetime
    pub fn ttl_hours(mut self, hours: i64) -> Self {
        self.ttl_hours = hours;
        self
    }
}

/// Authentication errors.
///
/// Every variant but `Internal` reaches the caller as the same bare
/// `401 Unauthorized`; the variant itself only shows up in logs.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Missing or non-Bearer authorization header")]
    MissingCredentials,

    #[error("Malformed token: {0}")]
    Malformed(String),

    #[error("Token signing algorithm not accepted")]
    UnsupportedAlgorithm,

    #[error("Invalid token signature")]
    InvalidSignature,

    #[error("Token expired")]
    Expired,

    #[error("Unknown account")]
    UnknownAccount,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<jsonwebtoken::errors::Error> for AuthError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        use jsonwebtoken::errors::ErrorKind;

        match err.kind() {
            ErrorKind::InvalidSignature => AuthError::InvalidSignature,
            ErrorKind::InvalidAlgorithm | ErrorKind::InvalidAlgorithmName => {
                AuthError::UnsupportedAlgorithm
            }
            ErrorKind::ExpiredSignature => AuthError::Expired,
            _ => AuthError::Malformed(err.to_string()),
        }
    }
}

/// Verified caller identity, valid for the duration of one request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Identity {
    pub account_id: AccountId,
    pub privilege: Option<String>,
}

/// Claims written into issued tokens
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Subject: account id as a decimal string
    pub sub: String,
    /// Privilege
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prv: Option<String>,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
}

/// Turn verified raw claims into an [`Identity`].
///
/// Checks presence and type of every field; `exp` must lie strictly after
/// `now` (Unix seconds).
pub fn decode_identity(raw: &Map<String, Value>, now: i64) -> Result<Identity, AuthError> {
    let sub = match raw.get("sub") {
        Some(Value::String(sub)) => sub,
        Some(_) => return Err(AuthError::Malformed("sub is not a string".to_string())),
        None => return Err(AuthError::Malformed("sub is missing".to_string())),
    };
    let account_id = sub
        .parse::<i64>()
        .map(AccountId)
        .map_err(|_| AuthError::Malformed(format!("sub is not an account id: {sub}")))?;

    let exp = match raw.get("exp") {
        Some(exp) => exp
            .as_i64()
            .ok_or_else(|| AuthError::Malformed("exp is not an integer".to_string()))?,
        None => return Err(AuthError::Malformed("exp is missing".to_string())),
    };
    if exp <= now {
        return Err(AuthError::Expired);
    }

    let privilege = match raw.get("prv") {
        None | Some(Value::Null) => None,
        Some(Value::String(prv)) => Some(prv.clone()),
        Some(_) => return Err(AuthError::Malformed("prv is not a string".to_string())),
    };

    Ok(Identity {
        account_id,
        privilege,
    })
}

/// Token service: signs tokens for existing accounts and verifies them
#[derive(Clone)]
pub struct TokenService {
    config: TokenConfig,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    accounts: AccountStore,
}

impl TokenService {
    /// Create a new token service
    pub fn new(config: TokenConfig, accounts: AccountStore) -> Self {
        let encoding_key = EncodingKey::from_secret(config.secret.as_bytes());
        let decoding_key = DecodingKey::from_secret(config.secret.as_bytes());

        let mut validation = Validation::new(SIGNING_ALGORITHM);
        validation.algorithms = ACCEPTED_ALGORITHMS.to_vec();
        // Expiry and claim presence are checked by `decode_identity`
        validation.validate_exp = false;
        validation.required_spec_claims.clear();
        validation.leeway = 0;

        Self {
            config,
            encoding_key,
            decoding_key,
            validation,
            accounts,
        }
    }

    /// Issue a token for an existing account
    pub async fn issue_token(&self, account_id: AccountId) -> Result<String, AuthError> {
        self.issue_token_at(account_id, Utc::now()).await
    }

    /// Issue a token as if the current time were `now`
    pub async fn issue_token_at(
        &self,
        account_id: AccountId,
        now: DateTime<Utc>,
    ) -> Result<String, AuthError> {
        let privilege = match self.accounts.get_privilege(account_id).await {
            Ok(privilege) => privilege,
            Err(AccountError::NotFound) => return Err(AuthError::UnknownAccount),
            Err(err) => return Err(AuthError::Internal(err.to_string())),
        };

        let token = self.sign(
            &Identity {
                account_id,
                privilege: Some(privilege),
            },
            now,
        )?;

        tracing::info!(%account_id, "Token issued");

        Ok(token)
    }

    /// Sign claims for `identity` without consulting storage
    pub fn sign(&self, identity: &Identity, now: DateTime<Utc>) -> Result<String, AuthError> {
        let exp = Duration::try_hours(self.config.ttl_hours)
            .and_then(|ttl| now.checked_add_signed(ttl))
            .ok_or_else(|| {
                AuthError::Internal(format!(
                    "token lifetime of {}h overflows the expiry",
                    self.config.ttl_hours
                ))
            })?;

        let claims = Claims {
            sub: identity.account_id.to_string(),
            prv: identity.privilege.clone(),
            iat: now.timestamp(),
            exp: exp.timestamp(),
        };

        encode(&Header::new(SIGNING_ALGORITHM), &claims, &self.encoding_key)
            .map_err(|e| AuthError::Internal(format!("token encoding failed: {e}")))
    }

    /// Verify a token and extract the caller identity
    pub fn verify_token(&self, token: &str) -> Result<Identity, AuthError> {
        self.verify_token_at(token, Utc::now())
    }

    /// Verify a token as if the current time were `now`
    pub fn verify_token_at(&self, token: &str, now: DateTime<Utc>) -> Result<Identity, AuthError> {
        let data = decode::<Map<String, Value>>(token, &self.decoding_key, &self.validation)?;
        decode_identity(&data.claims, now.timestamp())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::db::repositories::GraphStore;
    use crate::core::id::IdGenerator;
    use base64::Engine;
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use serde_json::json;
    use std::sync::Arc;

    const TEST_SECRET: &str = "test_secret_key_for_testing_only_32bytes!";

    fn create_test_service(secret: &str) -> (TokenService, AccountStore) {
        let ids = Arc::new(IdGenerator::new(2).unwrap());
        let accounts = AccountStore::new(Arc::new(GraphStore::new()), ids);
        (
            TokenService::new(TokenConfig::new(secret), accounts.clone()),
            accounts,
        )
    }

    fn raw(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    fn encode_segment(value: &Value) -> String {
        URL_SAFE_NO_PAD.encode(serde_json::to_vec(value).unwrap())
    }

    // ========================================================================
    // TokenConfig Tests
    // ========================================================================

    #[test]
    fn test_token_config_defaults() {
        let config = TokenConfig::new("my_secret");
        assert_eq!(config.secret, "my_secret");
        assert_eq!(config.ttl_hours, 24);

        let config = config.ttl_hours(2);
        assert_eq!(config.ttl_hours, 2);
    }

    #[test]
    fn test_token_config_debug_redacts_secret() {
        let debug = format!("{:?}", TokenConfig::new("super_secret_value"));
        assert!(!debug.contains("super_secret_value"));
        assert!(debug.contains("REDACTED"));
    }

    // ========================================================================
    // Claims Decoding Tests
    // ========================================================================

    #[test]
    fn test_decode_identity_valid() {
        let identity =
            decode_identity(&raw(json!({"sub": "42", "prv": "Admin", "exp": 200})), 100).unwrap();

        assert_eq!(identity.account_id, AccountId(42));
        assert_eq!(identity.privilege.as_deref(), Some("Admin"));
    }

    #[test]
    fn test_decode_identity_without_privilege() {
        let identity = decode_identity(&raw(json!({"sub": "42", "exp": 200})), 100).unwrap();
        assert_eq!(identity.privilege, None);

        let identity =
            decode_identity(&raw(json!({"sub": "42", "exp": 200, "prv": null})), 100).unwrap();
        assert_eq!(identity.privilege, None);
    }

    #[test]
    fn test_decode_identity_rejects_bad_fields() {
        let cases = [
            json!({"exp": 200}),
            json!({"sub": 42, "exp": 200}),
            json!({"sub": "not-a-number", "exp": 200}),
            json!({"sub": "42"}),
            json!({"sub": "42", "exp": "200"}),
            json!({"sub": "42", "exp": 200.5}),
            json!({"sub": "42", "exp": 200, "prv": 7}),
        ];

        for case in cases {
            let result = decode_identity(&raw(case.clone()), 100);
            assert!(
                matches!(result, Err(AuthError::Malformed(_))),
                "expected Malformed for {case}, got {result:?}"
            );
        }
    }

    #[test]
    fn test_decode_identity_expiry_is_exclusive() {
        let claims = raw(json!({"sub": "1", "exp": 100}));

        assert!(decode_identity(&claims, 99).is_ok());
        assert!(matches!(
            decode_identity(&claims, 100),
            Err(AuthError::Expired)
        ));
        assert!(matches!(
            decode_identity(&claims, 101),
            Err(AuthError::Expired)
        ));
    }

    // ========================================================================
    // Issue / Verify Tests
    // ========================================================================

    #[tokio::test]
    async fn test_issue_and_verify_token() {
        let (service, accounts) = create_test_service(TEST_SECRET);
        let account_id = accounts.create_dev_account("alice123").await.unwrap();

        let token = service.issue_token(account_id).await.unwrap();
        let identity = service.verify_token(&token).unwrap();

        assert_eq!(identity.account_id, account_id);
        assert_eq!(identity.privilege.as_deref(), Some("Player"));
    }

    #[tokio::test]
    async fn test_issue_token_for_unknown_account() {
        let (service, _) = create_test_service(TEST_SECRET);

        let result = service.issue_token(AccountId(123_456)).await;
        assert!(matches!(result, Err(AuthError::UnknownAccount)));
    }

    #[tokio::test]
    async fn test_token_expires_after_ttl() {
        let (service, accounts) = create_test_service(TEST_SECRET);
        let account_id = accounts.create_dev_account("bob_the_dev").await.unwrap();
        let issued_at = Utc::now();

        let token = service.issue_token_at(account_id, issued_at).await.unwrap();

        assert!(service.verify_token_at(&token, issued_at).is_ok());
        assert!(
            service
                .verify_token_at(&token, issued_at + Duration::hours(24) - Duration::seconds(1))
                .is_ok()
        );
        assert!(matches!(
            service.verify_token_at(&token, issued_at + Duration::hours(24)),
            Err(AuthError::Expired)
        ));
        assert!(matches!(
            service.verify_token_at(&token, issued_at + Duration::days(30)),
            Err(AuthError::Expired)
        ));
    }

    #[test]
    fn test_sign_with_overflowing_lifetime_is_internal_error() {
        let ids = Arc::new(IdGenerator::new(2).unwrap());
        let accounts = AccountStore::new(Arc::new(GraphStore::new()), ids);
        let identity = Identity {
            account_id: AccountId(5),
            privilege: None,
        };

        for hours in [3_000_000_000, i64::MAX] {
            let service =
                TokenService::new(TokenConfig::new(TEST_SECRET).ttl_hours(hours), accounts.clone());
            assert!(matches!(
                service.sign(&identity, Utc::now()),
                Err(AuthError::Internal(_))
            ));
        }
    }

    #[test]
    fn test_verify_rejects_wrong_secret() {
        let (service_one, _) = create_test_service("secret_one");
        let (service_two, _) = create_test_service("secret_two");
        let identity = Identity {
            account_id: AccountId(5),
            privilege: None,
        };

        let token = service_one.sign(&identity, Utc::now()).unwrap();

        assert!(matches!(
            service_two.verify_token(&token),
            Err(AuthError::InvalidSignature)
        ));
    }

    #[test]
    fn test_verify_rejects_alg_none() {
        let (service, _) = create_test_service(TEST_SECRET);
        let exp = (Utc::now() + Duration::hours(1)).timestamp();

        let token = format!(
            "{}.{}.",
            encode_segment(&json!({"alg": "none", "typ": "JWT"})),
            encode_segment(&json!({"sub": "5", "exp": exp})),
        );

        assert!(service.verify_token(&token).is_err());
    }

    #[test]
    fn test_verify_rejects_asymmetric_algorithm() {
        let (service, _) = create_test_service(TEST_SECRET);
        let exp = (Utc::now() + Duration::hours(1)).timestamp();

        let token = format!(
            "{}.{}.{}",
            encode_segment(&json!({"alg": "RS256", "typ": "JWT"})),
            encode_segment(&json!({"sub": "5", "exp": exp})),
            URL_SAFE_NO_PAD.encode(b"signature"),
        );

        assert!(matches!(
            service.verify_token(&token),
            Err(AuthError::UnsupportedAlgorithm)
        ));
    }

    #[test]
    fn test_verify_rejects_tampered_payload() {
        let (service, _) = create_test_service(TEST_SECRET);
        let token = service
            .sign(
                &Identity {
                    account_id: AccountId(5),
                    privilege: Some("Player".to_string()),
                },
                Utc::now(),
            )
            .unwrap();

        let parts: Vec<&str> = token.split('.').collect();
        let exp = (Utc::now() + Duration::hours(1)).timestamp();
        let forged_payload = encode_segment(&json!({"sub": "6", "prv": "Admin", "exp": exp}));
        let forged = format!("{}.{}.{}", parts[0], forged_payload, parts[2]);

        assert!(matches!(
            service.verify_token(&forged),
            Err(AuthError::InvalidSignature)
        ));
    }

    #[test]
    fn test_verify_rejects_garbage() {
        let (service, _) = create_test_service(TEST_SECRET);

        for token in ["", "invalid.token.here", "a.b", "corrupted-token"] {
            assert!(service.verify_token(token).is_err(), "accepted {token:?}");
        }
    }

    #[test]
    fn test_subject_round_trips_as_decimal_string() {
        let (service, _) = create_test_service(TEST_SECRET);
        let identity = Identity {
            account_id: AccountId(i64::MAX),
            privilege: None,
        };

        let token = service.sign(&identity, Utc::now()).unwrap();
        let payload = token.split('.').nth(1).unwrap();
        let claims: Value = serde_json::from_slice(&URL_SAFE_NO_PAD.decode(payload).unwrap()).unwrap();

        assert_eq!(claims["sub"], json!(i64::MAX.to_string()));
        assert!(claims.get("prv").is_none());
        assert_eq!(service.verify_token(&token).unwrap(), identity);
    }

    #[test]
    fn test_jwt_error_mapping() {
        use jsonwebtoken::errors::{Error, ErrorKind};

        let err: AuthError = Error::from(ErrorKind::InvalidSignature).into();
        assert!(matches!(err, AuthError::InvalidSignature));

        let err: AuthError = Error::from(ErrorKind::InvalidAlgorithm).into();
        assert!(matches!(err, AuthError::UnsupportedAlgorithm));

        let err: AuthError = Error::from(ErrorKind::InvalidToken).into();
        assert!(matches!(err, AuthError::Malformed(_)));
    }
}
