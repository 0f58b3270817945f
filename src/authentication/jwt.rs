use std::sync::OnceLock;

use chrono::Duration;
use chrono::Utc;
use hmac::{Hmac, Mac};
use jwt::SignWithKey;
use jwt::VerifyWithKey;
use serde::Deserialize;
use serde::Serialize;
use sha2::Sha256;

use crate::constants::SESSION_LIFETIME_HOURS;
use crate::database::schema::{User, UserRole};
use crate::error::{Error, HttpError};

use super::permissions::ActionType;

static JWT_SECRET: OnceLock<Vec<u8>> = OnceLock::new();

fn secret() -> &'static [u8] {
    JWT_SECRET.get_or_init(|| {
        std::env::var("JWT_SECRET")
            .map(String::into_bytes)
            .unwrap_or_else(|_| {
                log::warn!("JWT_SECRET is not set, using the development default");
                b"foodgram-development-secret".to_vec()
            })
    })
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct JwtSessionData {
    pub user_id: i32,
    pub email: String,
    pub username: String,
    pub role: UserRole,
    iat: i64,
    exp: i64,
}

impl JwtSessionData {
    pub fn new(id: i32, email: String, username: String, role: UserRole) -> Self {
        let now = Utc::now();
        let iat = now.timestamp();
        let exp = (now + Duration::hours(SESSION_LIFETIME_HOURS)).timestamp();

        Self {
            user_id: id,
            email,
            username,
            role,
            iat,
            exp,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SessionData {
    pub user_id: i32,
    pub email: String,
    pub username: String,
    pub role: UserRole,
    pub is_admin: bool,
}

impl SessionData {
    pub fn authenticate(&self, action: ActionType) -> Result<(), Error> {
        if !action.authenticate(self) {
            return Err(
                HttpError::Unauthorized.new("You don't have permission to perform this action")
            );
        }
        Ok(())
    }
}

impl From<JwtSessionData> for SessionData {
    fn from(data: JwtSessionData) -> Self {
        SessionData {
            user_id: data.user_id,
            email: data.email,
            username: data.username,
            is_admin: data.role == UserRole::Admin,
            role: data.role,
        }
    }
}

pub fn generate_jwt_session(user: &User) -> String {
    let key: Hmac<Sha256> = Hmac::new_from_slice(secret()).unwrap();
    let claims = JwtSessionData::new(
        user.id,
        user.email.to_owned(),
        user.username.to_owned(),
        user.role.to_owned(),
    );

    claims.sign_with_key(&key).unwrap()
}

pub fn verify_jwt_session(token: &str) -> Result<JwtSessionData, Error> {
    let key: Hmac<Sha256> = Hmac::new_from_slice(secret()).unwrap();

    token
        .verify_with_key(&key)
        .map_err(|_| HttpError::InvalidSession.new("Invalid session; Invalid token"))
        .map(|session: JwtSessionData| {
            let now = Utc::now().timestamp();

            if (session.exp - now).is_negative() {
                return Err(HttpError::InvalidSession.new("Invalid session; Token expired"));
            }
            Ok(session)
        })?
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_user() -> User {
        User {
            id: 7,
            email: String::from("cook@example.com"),
            username: String::from("cook"),
            first_name: String::from("Test"),
            last_name: String::from("Cook"),
            password: String::from("$argon2id$stub"),
            role: UserRole::User,
        }
    }

    #[test]
    fn session_round_trips() {
        let token = generate_jwt_session(&test_user());
        let session = verify_jwt_session(&token).unwrap();

        assert_eq!(session.user_id, 7);
        assert_eq!(session.email, "cook@example.com");
        assert_eq!(session.role, UserRole::User);
    }

    #[test]
    fn expired_token_is_rejected() {
        let key: Hmac<Sha256> = Hmac::new_from_slice(secret()).unwrap();
        let now = Utc::now().timestamp();
        let claims = JwtSessionData {
            user_id: 7,
            email: String::from("cook@example.com"),
            username: String::from("cook"),
            role: UserRole::User,
            iat: now - 7200,
            exp: now - 3600,
        };
        let token = claims.sign_with_key(&key).unwrap();

        let error = verify_jwt_session(&token).unwrap_err();
        assert_eq!(error.code, 401);
    }

    #[test]
    fn tampered_token_is_rejected() {
        let mut token = generate_jwt_session(&test_user());
        token.push('x');
        assert!(verify_jwt_session(&token).is_err());
    }

    #[test]
    fn admin_flag_follows_role() {
        let mut user = test_user();
        user.role = UserRole::Admin;
        let session: SessionData = verify_jwt_session(&generate_jwt_session(&user))
            .unwrap()
            .into();
        assert!(session.is_admin);
    }
}
