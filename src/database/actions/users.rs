use sqlx::{Pool, Postgres};

use crate::authentication::{
    cryptography::{hash_password, verify_password},
    jwt::generate_jwt_session,
};
use crate::constants::{
    MAX_EMAIL_LENGTH, MAX_PAGE_LIMIT, MAX_USERNAME_LENGTH, MIN_PASSWORD_LENGTH,
    USER_COUNT_PER_PAGE,
};
use crate::database::error::QueryError;
use crate::database::pagination::{clamp_limit, PageContext};
use crate::database::schema::{Id, Profile, User, UserRow};
use crate::error::{Error, HttpError};

use super::follows::subscribed_author_ids;

pub async fn get_user_by_email(
    pool: &Pool<Postgres>,
    email: &str,
) -> Result<Option<User>, Error> {
    let row: Option<User> = sqlx::query_as("SELECT * FROM users WHERE email = $1")
        .bind(email)
        .fetch_optional(pool)
        .await
        .map_err(|e| QueryError::from(e).into())?;

    Ok(row)
}

pub async fn get_user_by_id(pool: &Pool<Postgres>, user_id: Id) -> Result<Option<User>, Error> {
    let row: Option<User> = sqlx::query_as("SELECT * FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_optional(pool)
        .await
        .map_err(|e| QueryError::from(e).into())?;

    Ok(row)
}

/// Field-level validation for registration payloads. Uniqueness is
/// left to the insert.
pub fn validate_registration(
    email: &str,
    username: &str,
    first_name: &str,
    last_name: &str,
    password: &str,
) -> Result<(), Error> {
    if email.is_empty() || email.len() > MAX_EMAIL_LENGTH || !email.contains('@') {
        return Err(HttpError::InvalidRequest.new("Invalid email address"));
    }
    if first_name.is_empty() || last_name.is_empty() {
        return Err(HttpError::InvalidRequest.new("First and last name must not be empty"));
    }
    if password.len() < MIN_PASSWORD_LENGTH {
        return Err(HttpError::InvalidRequest.new("Password is too short"));
    }
    validate_username(username)
}

/// Letters, digits and `@ . + - _`, bounded length.
pub fn validate_username(username: &str) -> Result<(), Error> {
    if username.is_empty() || username.len() > MAX_USERNAME_LENGTH {
        return Err(HttpError::InvalidRequest.new("Username length is out of range"));
    }

    let valid = username
        .chars()
        .all(|c| c.is_alphanumeric() || matches!(c, '@' | '.' | '+' | '-' | '_'));

    if !valid {
        return Err(HttpError::InvalidRequest
            .new("Username may only contain letters, digits and @ . + - _"));
    }

    Ok(())
}

/// Creates a user; the password is stored as an argon2 hash.
pub async fn register_user(
    pool: &Pool<Postgres>,
    email: &str,
    username: &str,
    first_name: &str,
    last_name: &str,
    password: &str,
) -> Result<User, Error> {
    validate_registration(email, username, first_name, last_name, password)?;

    let password_hash = hash_password(password)
        .map_err(|_| HttpError::InternalServerError.new("Failed to hash password"))?;

    let row: Option<User> = sqlx::query_as(
        "
        INSERT INTO users (email, username, first_name, last_name, password)
        VALUES ($1, $2, $3, $4, $5)
        ON CONFLICT DO NOTHING RETURNING *;
    ",
    )
    .bind(email)
    .bind(username)
    .bind(first_name)
    .bind(last_name)
    .bind(password_hash)
    .fetch_optional(pool)
    .await
    .map_err(|e| QueryError::from(e).into())?;

    match row {
        Some(user) => Ok(user),
        None => Err(HttpError::InvalidRequest
            .new("A user with this email or username already exists")),
    }
}

pub async fn login_user(
    pool: &Pool<Postgres>,
    email: &str,
    password: &str,
) -> Result<String, Error> {
    let user = match get_user_by_email(pool, email).await? {
        Some(user) => user,
        None => return Err(HttpError::InvalidRequest.new("Invalid credentials")),
    };

    let authenticated = verify_password(password, &user.password)
        .map_err(|_| HttpError::InternalServerError.new("Stored password hash is malformed"))?;
    if !authenticated {
        return Err(HttpError::InvalidRequest.new("Invalid credentials"));
    }

    Ok(generate_jwt_session(&user))
}

pub async fn set_password(
    pool: &Pool<Postgres>,
    user_id: Id,
    current_password: &str,
    new_password: &str,
) -> Result<(), Error> {
    let user = match get_user_by_id(pool, user_id).await? {
        Some(user) => user,
        None => return Err(HttpError::NotFound.new("No user exists with specified id")),
    };

    let authenticated = verify_password(current_password, &user.password)
        .map_err(|_| HttpError::InternalServerError.new("Stored password hash is malformed"))?;
    if !authenticated {
        return Err(HttpError::InvalidRequest.new("Current password is incorrect"));
    }

    if new_password.len() < MIN_PASSWORD_LENGTH {
        return Err(HttpError::InvalidRequest.new("Password is too short"));
    }

    let password_hash = hash_password(new_password)
        .map_err(|_| HttpError::InternalServerError.new("Failed to hash password"))?;

    sqlx::query("UPDATE users SET password = $1 WHERE id = $2")
        .bind(password_hash)
        .bind(user_id)
        .execute(pool)
        .await
        .map_err(|e| QueryError::from(e).into())?;

    Ok(())
}

pub async fn fetch_users(
    pool: &Pool<Postgres>,
    viewer: Option<Id>,
    offset: i64,
    limit: Option<i64>,
) -> Result<PageContext<Profile>, Error> {
    let limit = clamp_limit(limit, USER_COUNT_PER_PAGE, MAX_PAGE_LIMIT);

    let rows: Vec<UserRow> = sqlx::query_as(
        "
        SELECT u.id, u.email, u.username, u.first_name, u.last_name, COUNT(*) OVER() AS count
        FROM users u
        ORDER BY u.id
        LIMIT $1 OFFSET $2
    ",
    )
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await
    .map_err(|e| QueryError::from(e).into())?;

    let total_count = rows.first().map(|r| r.count).unwrap_or(0);

    let ids: Vec<Id> = rows.iter().map(|r| r.id).collect();
    let subscribed = match viewer {
        Some(viewer) => subscribed_author_ids(pool, viewer, &ids).await?,
        None => Default::default(),
    };

    let profiles = rows
        .into_iter()
        .map(|row| Profile {
            is_subscribed: subscribed.contains(&row.id),
            email: row.email,
            id: row.id,
            username: row.username,
            first_name: row.first_name,
            last_name: row.last_name,
        })
        .collect();

    Ok(PageContext::from_rows(profiles, total_count, limit, offset))
}

pub async fn get_profile(
    pool: &Pool<Postgres>,
    user_id: Id,
    viewer: Option<Id>,
) -> Result<Option<Profile>, Error> {
    let user = match get_user_by_id(pool, user_id).await? {
        Some(user) => user,
        None => return Ok(None),
    };

    let is_subscribed = match viewer {
        Some(viewer) => !subscribed_author_ids(pool, viewer, &[user_id])
            .await?
            .is_empty(),
        None => false,
    };

    Ok(Some(Profile::from_user(&user, is_subscribed)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn usernames_allow_django_charset() {
        assert!(validate_username("chef.remy_2024").is_ok());
        assert!(validate_username("user@host").is_ok());
        assert!(validate_username("plain-name").is_ok());
    }

    #[test]
    fn usernames_reject_spaces_and_symbols() {
        assert!(validate_username("two words").is_err());
        assert!(validate_username("semi;colon").is_err());
        assert!(validate_username("").is_err());
        assert!(validate_username(&"x".repeat(151)).is_err());
    }

    #[test]
    fn registration_checks_each_field() {
        let ok = validate_registration("a@b.com", "cook", "A", "B", "longenough");
        assert!(ok.is_ok());

        assert!(validate_registration("not-an-email", "cook", "A", "B", "longenough").is_err());
        assert!(validate_registration("a@b.com", "cook", "", "B", "longenough").is_err());
        assert!(validate_registration("a@b.com", "cook", "A", "B", "short").is_err());
    }
}
