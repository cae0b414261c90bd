use anyhow::{Context, Result};
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::Utc;
use common::{auth_middleware::AuthClaims, Role};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};

/// Hash a password using Argon2id; returns a PHC string
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let password_hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("failed to hash password: {e}"))?
        .to_string();
    Ok(password_hash)
}

/// Verify a password against its hash. A malformed hash is an error, a
/// mismatch is `Ok(false)`.
pub fn verify_password(password: &str, password_hash: &str) -> Result<bool> {
    let parsed_hash = PasswordHash::new(password_hash)
        .map_err(|e| anyhow::anyhow!("failed to parse password hash: {e}"))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

/// Issue an HS256 access token for `email`
pub fn generate_jwt(email: &str, role: Role, jwt_secret: &str, expiration_secs: i64) -> Result<String> {
    let now = Utc::now().timestamp();
    let claims = AuthClaims {
        sub: email.to_string(),
        role,
        exp: now + expiration_secs,
        iat: now,
    };

    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(jwt_secret.as_bytes()),
    )
    .context("failed to encode JWT")
}

/// Verify and decode an access token
pub fn verify_jwt(token: &str, jwt_secret: &str) -> Result<AuthClaims> {
    common::auth_middleware::verify_jwt_local(token, jwt_secret).map_err(anyhow::Error::msg)
}
