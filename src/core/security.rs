use argon2::{password_hash::SaltString, Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::{Duration, OffsetDateTime};

use crate::core::config::Settings;

const ARGON2_MEMORY_KIB: u32 = 65_536;
const ARGON2_TIME: u32 = 2;
const ARGON2_PARALLELISM: u32 = 4;

#[derive(Debug, Error)]
pub(crate) enum SecurityError {
    #[error("password hashing failed")]
    Hashing,
    #[error("password verification failed")]
    Verification,
    #[error("jwt encoding failed")]
    JwtEncoding,
    #[error("jwt decoding failed")]
    JwtDecoding,
    #[error("unsupported jwt algorithm: {0}")]
    UnsupportedAlgorithm(String),
}

/// Access-token claims; `sub` is the user id.
#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct Claims {
    pub(crate) sub: String,
    pub(crate) exp: i64,
    pub(crate) iat: i64,
}

fn argon2() -> Result<Argon2<'static>, SecurityError> {
    let params = argon2::Params::new(ARGON2_MEMORY_KIB, ARGON2_TIME, ARGON2_PARALLELISM, None)
        .map_err(|_| SecurityError::Hashing)?;
    Ok(Argon2::new(argon2::Algorithm::Argon2id, argon2::Version::V0x13, params))
}

pub(crate) fn hash_password(password: &str) -> Result<String, SecurityError> {
    let salt = SaltString::generate(&mut OsRng);
    argon2()?
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| SecurityError::Hashing)
}

pub(crate) fn verify_password(password: &str, hash: &str) -> Result<bool, SecurityError> {
    let parsed = PasswordHash::new(hash).map_err(|_| SecurityError::Verification)?;
    let argon2 = argon2().map_err(|_| SecurityError::Verification)?;

    match argon2.verify_password(password.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(_) => Err(SecurityError::Verification),
    }
}

pub(crate) fn create_access_token(
    subject: &str,
    settings: &Settings,
    expires_in: Option<Duration>,
) -> Result<String, SecurityError> {
    let algorithm = algorithm_from_settings(settings)?;
    let now = OffsetDateTime::now_utc();
    let lifetime = expires_in.unwrap_or_else(|| {
        Duration::minutes(settings.security().access_token_expire_minutes as i64)
    });
    let claims = Claims {
        sub: subject.to_string(),
        exp: (now + lifetime).unix_timestamp(),
        iat: now.unix_timestamp(),
    };

    encode(
        &Header::new(algorithm),
        &claims,
        &EncodingKey::from_secret(settings.security().secret_key.as_bytes()),
    )
    .map_err(|_| SecurityError::JwtEncoding)
}

pub(crate) fn verify_token(token: &str, settings: &Settings) -> Result<Claims, SecurityError> {
    let mut validation = Validation::new(algorithm_from_settings(settings)?);
    validation.validate_exp = true;
    validation.set_required_spec_claims(&["exp", "sub"]);

    decode::<Claims>(
        token,
        &DecodingKey::from_secret(settings.security().secret_key.as_bytes()),
        &validation,
    )
    .map(|data| data.claims)
    .map_err(|_| SecurityError::JwtDecoding)
}

fn algorithm_from_settings(settings: &Settings) -> Result<Algorithm, SecurityError> {
    match settings.security().algorithm.as_str() {
        "HS256" => Ok(Algorithm::HS256),
        other => Err(SecurityError::UnsupportedAlgorithm(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support;

    #[test]
    fn password_hash_roundtrip() {
        let hash = hash_password("mitochondria-powerhouse").expect("hash");
        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password("mitochondria-powerhouse", &hash).unwrap());
        assert!(!verify_password("wrong-password", &hash).unwrap());
    }

    #[test]
    fn malformed_hash_is_an_error() {
        assert!(matches!(verify_password("x", "not-a-hash"), Err(SecurityError::Verification)));
    }

    #[tokio::test]
    async fn tokens_verify_and_expire() {
        let _guard = test_support::env_lock().await;
        test_support::set_test_env();
        let settings = Settings::load().expect("settings");

        let token =
            create_access_token("user-123", &settings, Some(Duration::minutes(1))).expect("token");
        assert_eq!(verify_token(&token, &settings).expect("claims").sub, "user-123");

        let expired = create_access_token("user-123", &settings, Some(Duration::minutes(-10)))
            .expect("expired token");
        assert!(verify_token(&expired, &settings).is_err());
    }
}
