use crate::{
    config::Config,
    error::{AppError, Result},
    models::user::{LoginRequest, ProfileResponse, SignupRequest, UserProfile},
    services::Database,
};
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // 用户ID
    pub exp: i64,    // 过期时间
    pub iat: i64,    // 签发时间
}

/// 已认证用户，由认证中间件放入请求扩展
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: String,
    pub username: String,
    pub email: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AuthResponse {
    pub token: String,
    pub profile: ProfileResponse,
}

#[derive(Clone)]
pub struct AuthService {
    db: Arc<Database>,
    config: Config,
}

impl AuthService {
    pub async fn new(db: Arc<Database>, config: &Config) -> Result<Self> {
        Ok(Self {
            db,
            config: config.clone(),
        })
    }

    pub fn verify_jwt(&self, token: &str) -> Result<Claims> {
        let decoding_key = DecodingKey::from_secret(self.config.jwt_secret.as_ref());
        let validation = Validation::new(Algorithm::HS256);

        match decode::<Claims>(token, &decoding_key, &validation) {
            Ok(token_data) => {
                debug!("JWT token verified for user: {}", token_data.claims.sub);
                Ok(token_data.claims)
            }
            Err(e) => {
                warn!("JWT verification failed: {}", e);
                Err(AppError::Authentication("Invalid token".to_string()))
            }
        }
    }

    pub fn issue_jwt(&self, user_id: &str) -> Result<String> {
        let now = Utc::now();
        let claims = Claims {
            sub: user_id.to_string(),
            iat: now.timestamp(),
            exp: (now + Duration::hours(self.config.jwt_expiry_hours)).timestamp(),
        };

        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.config.jwt_secret.as_ref()),
        )?;
        Ok(token)
    }

    pub async fn signup(&self, request: SignupRequest) -> Result<AuthResponse> {
        if !self.config.enable_registrations {
            return Err(AppError::forbidden("Registrations are disabled"));
        }

        request.validate().map_err(AppError::ValidatorError)?;

        // 邮箱和用户名都必须唯一
        if self
            .db
            .find_one::<UserProfile>("user_profile", "email", &request.email)
            .await?
            .is_some()
        {
            return Err(AppError::conflict("Email already registered"));
        }
        if self
            .db
            .find_one::<UserProfile>("user_profile", "username", &request.username)
            .await?
            .is_some()
        {
            return Err(AppError::conflict("Username already taken"));
        }

        let now = Utc::now();
        let profile = UserProfile {
            id: Uuid::new_v4().to_string(),
            username: request.username.clone(),
            display_name: request.display_name.unwrap_or(request.username),
            email: request.email,
            password_hash: hash_password(&request.password)?,
            bio: None,
            avatar_url: None,
            email_notification: true,
            in_app_notification: true,
            follower_count: 0,
            following_count: 0,
            created_at: now,
            updated_at: now,
        };

        let created: UserProfile = self.db.create("user_profile", profile).await?;
        info!("New user registered: {}", created.username);

        let token = self.issue_jwt(&created.id)?;
        Ok(AuthResponse {
            token,
            profile: created.into(),
        })
    }

    pub async fn login(&self, request: LoginRequest) -> Result<AuthResponse> {
        request.validate().map_err(AppError::ValidatorError)?;

        let profile: UserProfile = self
            .db
            .find_one("user_profile", "email", &request.email)
            .await?
            .ok_or_else(|| AppError::unauthorized("Invalid email or password"))?;

        if !verify_password(&request.password, &profile.password_hash) {
            return Err(AppError::unauthorized("Invalid email or password"));
        }

        let token = self.issue_jwt(&profile.id)?;
        Ok(AuthResponse {
            token,
            profile: profile.into(),
        })
    }

    pub async fn user_from_token(&self, token: &str) -> Result<AuthUser> {
        let claims = self.verify_jwt(token)?;

        let profile: UserProfile = self
            .db
            .get_by_id("user_profile", &claims.sub)
            .await?
            .ok_or_else(|| AppError::unauthorized("Unknown user"))?;

        Ok(AuthUser {
            id: profile.id,
            username: profile.username,
            email: profile.email,
        })
    }
}

fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| AppError::Internal(format!("Failed to hash password: {}", e)))?;
    Ok(hash.to_string())
}

fn verify_password(password: &str, stored_hash: &str) -> bool {
    match PasswordHash::new(stored_hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_round_trip() {
        let hash = hash_password("correct horse battery staple").unwrap();
        assert!(verify_password("correct horse battery staple", &hash));
        assert!(!verify_password("wrong password", &hash));
    }

    #[test]
    fn garbage_hash_never_verifies() {
        assert!(!verify_password("anything", "not-a-phc-string"));
    }
}
