use rusqlite::{Connection, ErrorCode};
use tracing::info;
use uuid::Uuid;

use crate::auth::{create_auth_token, revoke_auth_token};
use crate::error::AppError;
use crate::models::{Session, User, UserView};
use crate::repository;
use crate::validate;

const INVALID_CREDENTIALS: &str = "Invalid credentials";

fn is_unique_violation(e: &rusqlite::Error) -> bool {
    matches!(e, rusqlite::Error::SqliteFailure(err, _) if err.code == ErrorCode::ConstraintViolation)
}

/// Validated registration fields, checked before any password is hashed.
#[derive(Debug)]
pub struct Registration<'a> {
    pub name: &'a str,
    pub email: &'a str,
}

pub fn check_registration<'a>(
    name: &'a str,
    email: &'a str,
    password: &str,
) -> Result<Registration<'a>, AppError> {
    let name = validate::required("name", name, Some(50))?;
    let email = validate::email(email)?;
    validate::required("password", password, Some(120))?;
    Ok(Registration { name, email })
}

/// Stores a new user with an already computed bcrypt hash and opens a
/// session for them.
pub fn register(
    conn: &Connection,
    registration: &Registration<'_>,
    password_hash: String,
) -> Result<Session, AppError> {
    if repository::email_exists(conn, registration.email)? {
        return Err(AppError::Conflict("Email is already taken".to_string()));
    }

    let user = User {
        id: Uuid::new_v4(),
        name: registration.name.to_string(),
        email: registration.email.to_string(),
        password_hash,
    };
    repository::insert_user(conn, &user).map_err(|e| {
        if is_unique_violation(&e) {
            AppError::Conflict("Email is already taken".to_string())
        } else {
            e.into()
        }
    })?;
    info!("Registered user {}", user.id);

    open_session(conn, &user)
}

/// Looks up the account a login attempt names. The password is checked by
/// the caller once the connection is released.
pub fn find_login(conn: &Connection, email: &str) -> Result<User, AppError> {
    repository::find_user_by_email(conn, email.trim())?
        .ok_or(AppError::Unauthorized(INVALID_CREDENTIALS))
}

pub fn rejected_login() -> AppError {
    AppError::Unauthorized(INVALID_CREDENTIALS)
}

pub fn open_session(conn: &Connection, user: &User) -> Result<Session, AppError> {
    let token = create_auth_token(conn, user.id)?;
    Ok(Session {
        user: UserView::from(user),
        token,
    })
}

pub fn logout(conn: &Connection, token: &str) -> Result<(), AppError> {
    revoke_auth_token(conn, token)?;
    Ok(())
}

pub fn current_user(conn: &Connection, user_id: Uuid) -> Result<UserView, AppError> {
    repository::get_user(conn, user_id)?
        .map(|user| UserView::from(&user))
        .ok_or_else(|| AppError::not_found(format!("User not found with id: {user_id}")))
}
