//! Authentication module.

use crate::db::{Database, User, now_timestamp};
use crate::error::{AppError, Result};
use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

/// Name of the session cookie.
pub const SESSION_COOKIE: &str = "jwt_token";

/// Hash a password using Argon2.
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::Internal(format!("Failed to hash password: {}", e)))
}

/// Verify a password against a hash.
pub fn verify_password(password: &str, hash: &str) -> Result<bool> {
    let parsed_hash = PasswordHash::new(hash)
        .map_err(|e| AppError::Internal(format!("Invalid password hash: {}", e)))?;

    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

/// Session token claims.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Login name at issue time.
    pub name: String,
    /// User ID.
    pub id: i64,
    /// Issued at (unix seconds).
    pub iat: i64,
    /// Expiry (unix seconds).
    pub exp: i64,
}

/// Authentication service.
pub struct AuthService {
    db: Database,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    token_hours: u32,
}

impl AuthService {
    /// Create a new auth service signing with `secret`.
    pub fn new(db: Database, secret: &str, token_hours: u32) -> Self {
        Self {
            db,
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            token_hours,
        }
    }

    fn token_lifetime_secs(&self) -> i64 {
        i64::from(self.token_hours) * 60 * 60
    }

    /// Issue a signed token for `user`.
    pub fn issue_token(&self, user: &User) -> Result<String> {
        let iat = now_timestamp();
        let claims = Claims {
            name: user.name.clone(),
            id: user.id,
            iat,
            exp: iat + self.token_lifetime_secs(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| AppError::Internal(format!("Failed to sign token: {}", e)))
    }

    /// Decode a token. Malformed, forged and expired tokens yield `None`.
    pub fn verify_token(&self, token: &str) -> Option<Claims> {
        let validation = Validation::new(Algorithm::HS256);
        match decode::<Claims>(token, &self.decoding_key, &validation) {
            Ok(data) => Some(data.claims),
            Err(e) => {
                tracing::debug!(error = %e, "Rejected session token");
                None
            }
        }
    }

    /// Check credentials and issue a session token.
    pub fn login(&self, name: &str, password: &str) -> Result<(User, String)> {
        let user = self
            .db
            .get_user_by_name(name)?
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

        if !verify_password(password, &user.password_hash)? {
            return Err(AppError::Auth("Invalid password".to_string()));
        }

        let token = self.issue_token(&user)?;
        tracing::info!(user = %user.name, "User logged in");
        Ok((user, token))
    }

    /// Resolve a token to the user it was issued for.
    pub fn authenticate(&self, token: &str) -> Result<User> {
        let claims = self
            .verify_token(token)
            .ok_or_else(|| AppError::Auth("Invalid or expired session".to_string()))?;

        self.db
            .get_user_by_id(claims.id)?
            .ok_or_else(|| AppError::Auth("Session user no longer exists".to_string()))
    }

    /// `Set-Cookie` value carrying a fresh session token.
    pub fn session_cookie(&self, token: &str) -> String {
        format!(
            "{}={}; HttpOnly; SameSite=Strict; Path=/; Max-Age={}",
            SESSION_COOKIE,
            token,
            self.token_lifetime_secs()
        )
    }

    /// `Set-Cookie` value that removes the session.
    pub fn clear_cookie() -> String {
        format!(
            "{}=; HttpOnly; SameSite=Strict; Path=/; Max-Age=0",
            SESSION_COOKIE
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::NewUser;

    fn service_with_user() -> (AuthService, User) {
        let db = Database::open_memory().unwrap();
        let user = db
            .create_user(&NewUser {
                name: "reader".to_string(),
                real_name: None,
                email: "reader@example.com".to_string(),
                password_hash: hash_password("secret123").unwrap(),
                librarian: false,
                admin: false,
            })
            .unwrap();
        (AuthService::new(db, "test-secret", 24), user)
    }

    #[test]
    fn test_password_hash_and_verify() {
        let password = "test_password_123";
        let hash = hash_password(password).unwrap();

        assert!(verify_password(password, &hash).unwrap());
        assert!(!verify_password("wrong_password", &hash).unwrap());
    }

    #[test]
    fn test_token_carries_name_and_id() {
        let (auth, user) = service_with_user();
        let token = auth.issue_token(&user).unwrap();
        let claims = auth.verify_token(&token).unwrap();

        assert_eq!(claims.name, "reader");
        assert_eq!(claims.id, user.id);
        assert_eq!(claims.exp - claims.iat, 24 * 60 * 60);
    }

    #[test]
    fn test_token_signed_with_other_secret_rejected() {
        let (auth, user) = service_with_user();
        let other = AuthService::new(Database::open_memory().unwrap(), "other-secret", 24);
        let token = other.issue_token(&user).unwrap();

        assert!(auth.verify_token(&token).is_none());
        assert!(auth.verify_token("not-a-token").is_none());
    }

    #[test]
    fn test_expired_token_rejected() {
        let (auth, user) = service_with_user();
        let claims = Claims {
            name: user.name.clone(),
            id: user.id,
            iat: now_timestamp() - 7200,
            exp: now_timestamp() - 3600,
        };
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(b"test-secret"),
        )
        .unwrap();

        assert!(auth.verify_token(&token).is_none());
    }

    #[test]
    fn test_login_errors() {
        let (auth, _) = service_with_user();

        assert!(matches!(
            auth.login("nobody", "secret123"),
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(
            auth.login("reader", "wrong-pass1"),
            Err(AppError::Auth(_))
        ));

        let (user, token) = auth.login("reader", "secret123").unwrap();
        assert_eq!(auth.authenticate(&token).unwrap().id, user.id);
    }

    #[test]
    fn test_authenticate_deleted_user() {
        let (auth, user) = service_with_user();
        let token = auth.issue_token(&user).unwrap();
        auth.db.delete_user(user.id).unwrap();

        assert!(matches!(auth.authenticate(&token), Err(AppError::Auth(_))));
    }

    #[test]
    fn test_cookie_attributes() {
        let (auth, _) = service_with_user();
        let cookie = auth.session_cookie("abc");

        assert!(cookie.starts_with("jwt_token=abc;"));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("SameSite=Strict"));
        assert!(cookie.contains("Max-Age=86400"));
        assert!(AuthService::clear_cookie().contains("Max-Age=0"));
    }
}
