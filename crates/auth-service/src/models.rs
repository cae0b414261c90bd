use chrono::{DateTime, Utc};
use common::Role;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ===== User Models =====

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub password_hash: String,
    #[sqlx(try_from = "String")]
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

/// What the API returns for a user; never includes the hash
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserResponse {
    pub id: Uuid,
    pub email: String,
    pub role: Role,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            role: user.role,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateUserRequest {
    pub email: String,
    pub password: String,
    pub role: Role,
}

/// Row to insert; the password is already hashed
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub password_hash: String,
    pub role: Role,
}

// ===== Authentication Models =====

/// OAuth2 password-grant form. `username` carries the email.
#[derive(Debug, Clone, Deserialize)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
}

impl TokenResponse {
    pub fn bearer(access_token: String) -> Self {
        Self {
            access_token,
            token_type: "bearer".to_string(),
        }
    }
}

/// Loose email shape check: one `@`, non-empty local part, dotted domain
pub fn is_valid_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && !email.chars().any(char::is_whitespace)
        && domain.contains('.')
        && domain.split('.').all(|label| !label.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_email_shape() {
        assert!(is_valid_email("officer@police.gov.lk"));
        assert!(is_valid_email("a@b.co"));
        assert!(!is_valid_email("no-at-sign"));
        assert!(!is_valid_email("@gov.lk"));
        assert!(!is_valid_email("user@localhost"));
        assert!(!is_valid_email("user@gov..lk"));
        assert!(!is_valid_email("us er@gov.lk"));
        assert!(!is_valid_email("a@b@c.lk"));
    }

    #[test]
    fn test_user_response_hides_hash() {
        let user = User {
            id: Uuid::new_v4(),
            email: "clerk@dmt.gov.lk".to_string(),
            password_hash: "$argon2id$secret".to_string(),
            role: Role::Dmt,
            created_at: Utc::now(),
        };
        let json = serde_json::to_value(UserResponse::from(user)).unwrap();
        assert_eq!(json["role"], "dmt");
        assert!(json.get("password_hash").is_none());
    }
}
