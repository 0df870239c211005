//! Staff password login.

use crate::common::error::{Result, ShopError};
use crate::domain::AdminUser;
use crate::metrics;
use crate::storage::Storage;
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use axum::body::Bytes;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, warn};

const MSG_MISSING_FIELDS: &str = "E-mail cím és jelszó megadása kötelező.";
const MSG_BAD_CREDENTIALS: &str = "Hibás e-mail cím vagy jelszó.";
const MSG_NOT_STAFF: &str = "Nincs jogosultsága az adminisztrációs felület használatához.";
const MSG_BAD_JSON: &str = "Hibás JSON formátum.";
const MSG_SERVER_ERROR: &str = "Szerver hiba történt.";

/// Argon2id PHC string for `password`.
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| ShopError::Password(e.to_string()))
}

/// False for a wrong password and for an unparsable stored hash.
pub fn verify_password(password: &str, password_hash: &str) -> bool {
    match PasswordHash::new(password_hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(e) => {
            warn!("Stored password hash is not a valid PHC string: {}", e);
            false
        }
    }
}

#[derive(Debug)]
pub enum LoginOutcome {
    Authenticated(AdminUser),
    InvalidCredentials,
    NotStaff,
}

/// Check an e-mail/password pair against the staff accounts.
pub async fn authenticate(storage: &dyn Storage, email: &str, password: &str) -> Result<LoginOutcome> {
    let Some(user) = storage.get_admin_user_by_email(email).await? else {
        return Ok(LoginOutcome::InvalidCredentials);
    };
    if !verify_password(password, &user.password_hash) {
        return Ok(LoginOutcome::InvalidCredentials);
    }
    if !user.is_staff {
        return Ok(LoginOutcome::NotStaff);
    }
    Ok(LoginOutcome::Authenticated(user))
}

#[derive(Debug, Deserialize)]
struct LoginRequest {
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    password: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct LoginUser {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub is_staff: bool,
    pub is_superuser: bool,
}

impl From<AdminUser> for LoginUser {
    fn from(user: AdminUser) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
            first_name: user.first_name,
            last_name: user.last_name,
            is_staff: user.is_staff,
            is_superuser: user.is_superuser,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<LoginUser>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

fn failure(status: StatusCode, message: &str) -> Response {
    let body = LoginResponse {
        success: false,
        user: None,
        error: Some(message.to_string()),
    };
    (status, Json(body)).into_response()
}

/// `POST /api/auth/login/`
pub async fn login_handler(Extension(storage): Extension<Arc<dyn Storage>>, body: Bytes) -> Response {
    let request: LoginRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(_) => {
            metrics::auth::login_attempt("bad_request");
            return failure(StatusCode::BAD_REQUEST, MSG_BAD_JSON);
        }
    };

    let email = request.email.unwrap_or_default().trim().to_string();
    let password = request.password.unwrap_or_default().trim().to_string();
    if email.is_empty() || password.is_empty() {
        metrics::auth::login_attempt("bad_request");
        return failure(StatusCode::BAD_REQUEST, MSG_MISSING_FIELDS);
    }

    match authenticate(storage.as_ref(), &email, &password).await {
        Ok(LoginOutcome::Authenticated(user)) => {
            metrics::auth::login_attempt("success");
            info!("Staff user {} signed in", user.username);
            Json(LoginResponse {
                success: true,
                user: Some(user.into()),
                error: None,
            })
            .into_response()
        }
        Ok(LoginOutcome::InvalidCredentials) => {
            metrics::auth::login_attempt("invalid_credentials");
            failure(StatusCode::UNAUTHORIZED, MSG_BAD_CREDENTIALS)
        }
        Ok(LoginOutcome::NotStaff) => {
            metrics::auth::login_attempt("forbidden");
            failure(StatusCode::FORBIDDEN, MSG_NOT_STAFF)
        }
        Err(e) => {
            metrics::auth::login_attempt("error");
            error!("Login failed with a storage error: {}", e);
            failure(StatusCode::INTERNAL_SERVER_ERROR, MSG_SERVER_ERROR)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::NewAdminUser;
    use crate::storage::InMemoryStorage;

    #[test]
    fn hash_verifies_only_matching_password() {
        let hash = hash_password("kávé-2025").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("kávé-2025", &hash));
        assert!(!verify_password("kave-2025", &hash));
        assert!(!verify_password("kávé-2025", "not-a-phc-string"));
    }

    #[tokio::test]
    async fn authenticate_distinguishes_outcomes() {
        let storage = InMemoryStorage::new();
        for (username, is_staff) in [("boss", true), ("guest", false)] {
            storage
                .create_admin_user(NewAdminUser {
                    username: username.to_string(),
                    email: format!("{username}@example.com"),
                    password_hash: hash_password("secret").unwrap(),
                    first_name: String::new(),
                    last_name: String::new(),
                    is_staff,
                    is_superuser: false,
                })
                .await
                .unwrap();
        }

        assert!(matches!(
            authenticate(&storage, "BOSS@example.com", "secret").await.unwrap(),
            LoginOutcome::Authenticated(user) if user.username == "boss"
        ));
        assert!(matches!(
            authenticate(&storage, "boss@example.com", "wrong").await.unwrap(),
            LoginOutcome::InvalidCredentials
        ));
        assert!(matches!(
            authenticate(&storage, "nobody@example.com", "secret").await.unwrap(),
            LoginOutcome::InvalidCredentials
        ));
        assert!(matches!(
            authenticate(&storage, "guest@example.com", "secret").await.unwrap(),
            LoginOutcome::NotStaff
        ));
    }
}
