//! Account management: registration, profiles and admin user operations.

use crate::auth::hash_password;
use crate::db::{Database, Friend, NewUser, Rank, ShelfEntry, User};
use crate::error::{AppError, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z0-9._%+\-]+@[a-z0-9.\-]+\.[a-z]{2,4}$").expect("valid email regex")
});

const MIN_FIELD_CHARS: usize = 3;
const MAX_FIELD_CHARS: usize = 100;
const MIN_PASSWORD_CHARS: usize = 8;

fn check_length(field: &str, value: &str) -> Result<()> {
    let len = value.chars().count();
    if !(MIN_FIELD_CHARS..=MAX_FIELD_CHARS).contains(&len) {
        return Err(AppError::Validation(format!(
            "{} must be {}-{} characters",
            field, MIN_FIELD_CHARS, MAX_FIELD_CHARS
        )));
    }
    Ok(())
}

/// Check a login name.
pub fn validate_name(name: &str) -> Result<()> {
    check_length("Name", name)
}

/// Check an email address.
pub fn validate_email(email: &str) -> Result<()> {
    check_length("Email", email)?;
    if !EMAIL_RE.is_match(email) {
        return Err(AppError::Validation("Invalid email".to_string()));
    }
    Ok(())
}

/// Passwords need a letter, a digit and at least eight characters.
pub fn validate_password(password: &str) -> Result<()> {
    let has_letter = password.chars().any(|c| c.is_ascii_alphabetic());
    let has_digit = password.chars().any(|c| c.is_ascii_digit());

    if !has_letter || !has_digit || password.chars().count() < MIN_PASSWORD_CHARS {
        return Err(AppError::Validation(format!(
            "Password must be at least {} characters and contain a letter and a digit",
            MIN_PASSWORD_CHARS
        )));
    }
    Ok(())
}

/// Registration request.
#[derive(Debug, Clone, Deserialize)]
pub struct Registration {
    /// Login name.
    pub name: String,
    /// Display name.
    #[serde(default)]
    pub real_name: Option<String>,
    /// Email address.
    pub email: String,
    /// Plain-text password.
    pub password: String,
}

/// Admin edit of a user. Absent fields are left untouched.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct UserPatch {
    /// New login name.
    pub name: Option<String>,
    /// New display name.
    pub real_name: Option<String>,
    /// New email.
    pub email: Option<String>,
    /// New password.
    pub password: Option<String>,
    /// New rank.
    pub rank: Option<Rank>,
}

/// A user's profile page.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    /// The user.
    #[serde(flatten)]
    pub user: User,
    /// Accepted friends.
    pub friends: Vec<Friend>,
    /// Number of accepted friends.
    pub friends_number: usize,
    /// Senders of pending requests to this user.
    pub friends_pending: Vec<Friend>,
    /// Number of pending requests.
    pub friends_pending_number: usize,
    /// Shelf.
    pub books: Vec<ShelfEntry>,
}

/// Account service.
#[derive(Debug, Clone)]
pub struct AccountService {
    db: Database,
}

impl AccountService {
    /// Create a new account service.
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Self-service registration. New accounts hold no roles.
    pub fn register(&self, reg: &Registration) -> Result<User> {
        self.create_user(reg, false, false)
    }

    /// Create an account with the given roles.
    pub fn create_user(&self, reg: &Registration, librarian: bool, admin: bool) -> Result<User> {
        validate_name(&reg.name)?;
        validate_email(&reg.email)?;
        validate_password(&reg.password)?;

        let user = self.db.create_user(&NewUser {
            name: reg.name.clone(),
            real_name: reg.real_name.clone().filter(|n| !n.trim().is_empty()),
            email: reg.email.clone(),
            password_hash: hash_password(&reg.password)?,
            librarian,
            admin,
        })?;

        tracing::info!(user = %user.name, id = user.id, "Created user");
        Ok(user)
    }

    /// Get user by ID.
    pub fn get(&self, id: i64) -> Result<User> {
        self.db
            .get_user_by_id(id)?
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))
    }

    /// Get user by login name.
    pub fn get_by_name(&self, name: &str) -> Result<User> {
        self.db
            .get_user_by_name(name)?
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))
    }

    /// Assemble the profile of user `id`.
    pub fn profile(&self, id: i64) -> Result<Profile> {
        let user = self.get(id)?;

        let friends: Vec<Friend> = self
            .db
            .list_accepted(id)?
            .iter()
            .map(|req| req.other_party(id))
            .collect();
        let friends_pending: Vec<Friend> = self
            .db
            .list_incoming_pending(id)?
            .iter()
            .map(|req| req.other_party(id))
            .collect();
        let books = self.db.get_shelf(id)?;

        Ok(Profile {
            user,
            friends_number: friends.len(),
            friends,
            friends_pending_number: friends_pending.len(),
            friends_pending,
            books,
        })
    }

    /// List all users.
    pub fn list(&self) -> Result<Vec<User>> {
        self.db.list_users()
    }

    /// Apply an admin edit.
    pub fn modify(&self, id: i64, patch: UserPatch) -> Result<User> {
        let mut user = self.get(id)?;

        if let Some(name) = patch.name {
            validate_name(&name)?;
            user.name = name;
        }
        if let Some(real_name) = patch.real_name {
            user.real_name = Some(real_name).filter(|n| !n.trim().is_empty());
        }
        if let Some(email) = patch.email {
            validate_email(&email)?;
            user.email = email;
        }
        if let Some(password) = patch.password {
            validate_password(&password)?;
            user.password_hash = hash_password(&password)?;
        }
        if let Some(rank) = patch.rank {
            user.rank = rank;
        }

        self.db.update_user(&user)?;
        tracing::info!(id, user = %user.name, "Modified user");
        Ok(user)
    }

    /// Grant the librarian role, and the admin role when `admin` is set.
    pub fn promote(&self, id: i64, admin: bool) -> Result<User> {
        let mut user = self.get(id)?;
        user.librarian = true;
        user.admin = user.admin || admin;

        self.db.update_user(&user)?;
        tracing::info!(id, librarian = user.librarian, admin = user.admin, "Promoted user");
        Ok(user)
    }

    /// Replace a user's password.
    pub fn change_password(&self, id: i64, password: &str) -> Result<()> {
        validate_password(password)?;

        let mut user = self.get(id)?;
        user.password_hash = hash_password(password)?;
        self.db.update_user(&user)?;
        Ok(())
    }

    /// Delete a user and return the removed account.
    pub fn delete(&self, id: i64) -> Result<User> {
        let user = self.get(id)?;
        if !self.db.delete_user(id)? {
            return Err(AppError::NotFound("User not found".to_string()));
        }

        tracing::info!(id, user = %user.name, "Deleted user");
        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_email_validation() {
        assert!(validate_email("reader@example.com").is_ok());
        assert!(validate_email("first.last+tag@mail.example.org").is_ok());
        assert!(validate_email("no-at-sign.example.com").is_err());
        assert!(validate_email("Reader@Example.com").is_err());
        assert!(validate_email("reader@example.technology").is_err());
    }

    #[test]
    fn test_password_validation() {
        assert!(validate_password("abc").is_err());
        assert!(validate_password("abcdefgh").is_err());
        assert!(validate_password("12345678").is_err());
        assert!(validate_password("abc1234").is_err());
        assert!(validate_password("abcd1234").is_ok());
    }

    #[test]
    fn test_name_length_counts_chars() {
        assert!(validate_name("ab").is_err());
        assert!(validate_name("åäö").is_ok());
        assert!(validate_name(&"n".repeat(100)).is_ok());
        assert!(validate_name(&"n".repeat(101)).is_err());
    }
}
