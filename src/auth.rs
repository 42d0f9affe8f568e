use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use bcrypt::{hash, verify};
use chrono::Utc;
use rand::Rng;
use rusqlite::{params, Connection, OptionalExtension};
use tokio::task;
use uuid::Uuid;

use crate::error::AppError;
use crate::repository::timestamp;
use crate::state::AppState;

pub fn hash_password(password: &str, cost: u32) -> Result<String, AppError> {
    Ok(hash(password, cost)?)
}

pub fn verify_password(password: &str, hash: &str) -> bool {
    verify(password, hash).unwrap_or(false)
}

/// Runs bcrypt on the blocking pool so request workers stay free.
pub async fn hash_password_blocking(password: String, cost: u32) -> Result<String, AppError> {
    task::spawn_blocking(move || hash_password(&password, cost)).await?
}

pub async fn verify_password_blocking(password: String, hash: String) -> Result<bool, AppError> {
    Ok(task::spawn_blocking(move || verify_password(&password, &hash)).await?)
}

pub fn generate_token() -> String {
    rand::thread_rng()
        .sample_iter(&rand::distributions::Alphanumeric)
        .take(32)
        .map(char::from)
        .collect()
}

pub fn create_auth_token(conn: &Connection, user_id: Uuid) -> rusqlite::Result<String> {
    let token = generate_token();

    conn.execute(
        "INSERT INTO auth_tokens (token, user_id, created_at) VALUES (?1, ?2, ?3)",
        params![token, user_id.to_string(), timestamp(Utc::now())],
    )?;

    Ok(token)
}

pub fn verify_auth_token(conn: &Connection, token: &str) -> Result<Uuid, AppError> {
    let user_id: Option<String> = conn
        .query_row(
            "SELECT user_id FROM auth_tokens WHERE token = ?1",
            [token],
            |row| row.get(0),
        )
        .optional()?;

    user_id
        .and_then(|id| Uuid::parse_str(&id).ok())
        .ok_or(AppError::Unauthorized("Invalid token"))
}

pub fn revoke_auth_token(conn: &Connection, token: &str) -> rusqlite::Result<()> {
    conn.execute("DELETE FROM auth_tokens WHERE token = ?1", [token])?;
    Ok(())
}

/// Accepts either a bare token or `Bearer <token>`.
fn token_from_header(value: &str) -> Option<&str> {
    let token = value.strip_prefix("Bearer ").unwrap_or(value).trim();
    (!token.is_empty()).then_some(token)
}

/// The authenticated caller of a request, resolved from its `Authorization`
/// header. Handlers receive it as an argument instead of reading any ambient
/// session state.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub token: String,
}

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(token_from_header)
            .ok_or(AppError::Unauthorized("Missing token"))?
            .to_string();

        let user_id = verify_auth_token(&*state.db.lock().await, &token)?;

        Ok(AuthUser { user_id, token })
    }
}
