//! Authentication and account service

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::Utc;
use validator::Validate;

use crate::{
    config::AuthConfig,
    error::{AppError, AppResult},
    models::{
        user::{LoginRequest, SignupRequest},
        NewUser, Role, User, UserClaims, UserId,
    },
    repository::Repository,
};

#[derive(Clone)]
pub struct AuthService {
    repository: Repository,
    config: AuthConfig,
}

impl AuthService {
    pub fn new(repository: Repository, config: AuthConfig) -> Self {
        Self { repository, config }
    }

    /// Register a reader account
    pub async fn signup(&self, request: SignupRequest) -> AppResult<User> {
        request
            .validate()
            .map_err(|e| AppError::Validation(format!("Validation failed. {}", e)))?;

        if self
            .repository
            .users
            .get_by_email(&request.email)
            .await?
            .is_some()
        {
            return Err(AppError::Conflict(format!(
                "E-Mail address {} already exists!",
                request.email
            )));
        }

        let user = self
            .repository
            .users
            .create(&NewUser {
                name: request.name.trim().to_string(),
                email: request.email.trim().to_string(),
                password_hash: hash_password(&request.password)?,
                role: Role::User,
            })
            .await?;

        tracing::info!(user_id = %user.id, "User signed up");
        Ok(user)
    }

    /// Check credentials and issue a JWT
    pub async fn login(&self, request: &LoginRequest) -> AppResult<(String, User)> {
        let user = self
            .repository
            .users
            .get_by_email(&request.email)
            .await?
            .ok_or_else(|| AppError::Authentication("Wrong email or password.".to_string()))?;

        if !verify_password(&user.password, &request.password)? {
            return Err(AppError::Authentication("Wrong email or password.".to_string()));
        }

        let token = self.create_token_for_user(&user)?;
        Ok((token, user))
    }

    /// Profile of the caller, with current holdings
    pub async fn me(&self, user_id: UserId) -> AppResult<User> {
        self.repository
            .users
            .get_by_id(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Could not find user.".to_string()))
    }

    pub fn create_token_for_user(&self, user: &User) -> AppResult<String> {
        let now = Utc::now().timestamp();
        let exp = now + (self.config.jwt_expiration_hours as i64 * 3600);

        let claims = UserClaims {
            sub: user.email.clone(),
            user_id: user.id,
            role: user.role,
            exp,
            iat: now,
        };

        claims
            .create_token(&self.config.jwt_secret)
            .map_err(|e| AppError::Internal(format!("Failed to create token: {}", e)))
    }
}

/// Hash a password using Argon2
pub fn hash_password(password: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::Internal(format!("Failed to hash password: {}", e)))
}

fn verify_password(hash: &str, password: &str) -> AppResult<bool> {
    let parsed_hash = PasswordHash::new(hash)
        .map_err(|_| AppError::Internal("Invalid password hash".to_string()))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}
