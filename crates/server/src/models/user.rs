//! Back-office user accounts.

use anyhow::{Context, Result};
use argon2::password_hash::SaltString;
use argon2::password_hash::rand_core::OsRng;
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

/// Role name granted full access to the admin API.
pub const ROLE_ADMIN: &str = "admin";

/// A back-office user.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: i64,
    pub email: String,
    /// Argon2id PHC string. Never serialized.
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub full_name: String,
    pub role: String,
    pub is_active: bool,
    pub last_login: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a user.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateUser {
    pub email: String,
    pub password: String,
    pub full_name: String,
    pub role: Option<String>,
}

impl User {
    pub async fn find_by_id(pool: &PgPool, id: i64) -> Result<Option<Self>> {
        let user = sqlx::query_as::<_, Self>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await
            .context("failed to fetch user by id")?;

        Ok(user)
    }

    /// Emails are matched case-insensitively.
    pub async fn find_by_email(pool: &PgPool, email: &str) -> Result<Option<Self>> {
        let user = sqlx::query_as::<_, Self>("SELECT * FROM users WHERE LOWER(email) = LOWER($1)")
            .bind(email.trim())
            .fetch_optional(pool)
            .await
            .context("failed to fetch user by email")?;

        Ok(user)
    }

    /// Create a user; the password is hashed before it reaches the database.
    pub async fn create(pool: &PgPool, input: CreateUser) -> Result<Self> {
        let password_hash = hash_password(&input.password)?;

        let user = sqlx::query_as::<_, Self>(
            r#"
            INSERT INTO users (email, password_hash, full_name, role)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(input.email.trim().to_lowercase())
        .bind(&password_hash)
        .bind(input.full_name.trim())
        .bind(input.role.as_deref().unwrap_or(ROLE_ADMIN))
        .fetch_one(pool)
        .await
        .context("failed to create user")?;

        Ok(user)
    }

    /// Record a successful login.
    pub async fn touch_last_login(pool: &PgPool, id: i64) -> Result<()> {
        sqlx::query("UPDATE users SET last_login = NOW() WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await
            .context("failed to update last login")?;

        Ok(())
    }

    /// Replace the password hash.
    pub async fn update_password(pool: &PgPool, id: i64, new_password: &str) -> Result<bool> {
        let password_hash = hash_password(new_password)?;

        let result =
            sqlx::query("UPDATE users SET password_hash = $1, updated_at = NOW() WHERE id = $2")
                .bind(&password_hash)
                .bind(id)
                .execute(pool)
                .await
                .context("failed to update password")?;

        Ok(result.rows_affected() > 0)
    }

    /// Check a password against the stored hash.
    pub fn verify_password(&self, password: &str) -> bool {
        if self.password_hash.is_empty() {
            return false;
        }

        let Ok(parsed_hash) = PasswordHash::new(&self.password_hash) else {
            return false;
        };

        Argon2::default()
            .verify_password(password.as_bytes(), &parsed_hash)
            .is_ok()
    }
}

/// Hash a password using Argon2id.
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    let hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("failed to hash password: {e}"))?;

    Ok(hash.to_string())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn user_with_password(password: &str) -> User {
        let now = Utc::now();
        User {
            id: 1,
            email: "admin@alahas.pe".into(),
            password_hash: hash_password(password).unwrap(),
            full_name: "Admin".into(),
            role: ROLE_ADMIN.into(),
            is_active: true,
            last_login: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn hash_is_argon2_and_salted() {
        let a = hash_password("secreto123").unwrap();
        let b = hash_password("secreto123").unwrap();
        assert!(a.starts_with("$argon2"));
        assert_ne!(a, b);
    }

    #[test]
    fn verify_accepts_only_the_right_password() {
        let user = user_with_password("secreto123");
        assert!(user.verify_password("secreto123"));
        assert!(!user.verify_password("secreto124"));
        assert!(!user.verify_password(""));
    }

    #[test]
    fn empty_or_corrupt_hash_never_verifies() {
        let mut user = user_with_password("x");
        user.password_hash = String::new();
        assert!(!user.verify_password("x"));
        user.password_hash = "not-a-phc-string".into();
        assert!(!user.verify_password("x"));
    }

    #[test]
    fn password_hash_is_not_serialized() {
        let json = serde_json::to_value(user_with_password("secreto123")).unwrap();
        assert!(json.get("password_hash").is_none());
        assert_eq!(json["role"], "admin");
    }
}
