//! Self-service account lifecycle:
//! `register -> inactive -> verify_email -> active -> login`.

use std::sync::Arc;

use chrono::Duration;
use uuid::Uuid;

use super::users::clean_name;
use crate::errors::{AppError, AppResult};
use crate::jwt::JwtConfig;
use crate::models::user::{
    normalize_email, AuthResponse, LoginRequest, NewUser, ProfileUpdateRequest, RegisterRequest,
    RegisterResponse, User, UserStatus, VerifyEmailRequest,
};
use crate::notify::Notifier;
use crate::repo::{RbacRepository, UserChanges};
use crate::utils::{generate_token, hash_password, hash_token, utc_now, verify_password};

const VERIFICATION_TTL_HOURS: i64 = 24;

#[derive(Clone)]
pub struct AccountService {
    repo: Arc<dyn RbacRepository>,
    jwt: Arc<JwtConfig>,
    notifier: Arc<dyn Notifier>,
}

impl AccountService {
    pub fn new(repo: Arc<dyn RbacRepository>, jwt: Arc<JwtConfig>, notifier: Arc<dyn Notifier>) -> Self {
        Self { repo, jwt, notifier }
    }

    /// Creates an inactive user and sends a one-time verification token.
    pub async fn register(&self, req: RegisterRequest) -> AppResult<RegisterResponse> {
        let email = normalize_email(&req.email)?;
        let name = clean_name(req.name)?;
        if self.repo.find_user_by_email(&email).await?.is_some() {
            return Err(AppError::conflict("email already in use"));
        }

        let user = self
            .repo
            .create_user(NewUser {
                email,
                password_hash: hash_password(&req.password)?,
                name,
                status: UserStatus::Inactive,
                is_admin: false,
                group_id: None,
            })
            .await?;

        // without a delivered token the account could never be activated
        if let Err(err) = self.issue_verification(&user).await {
            if let Err(cleanup) = self.repo.delete_user(user.id).await {
                tracing::error!(user_id = %user.id, error = %cleanup, "failed to roll back registration");
            }
            tracing::warn!(user_id = %user.id, error = %err, "registration rolled back");
            return Err(err);
        }

        tracing::info!(user_id = %user.id, "user registered, awaiting verification");
        Ok(RegisterResponse {
            user,
            message: "registration received, check your email to activate the account".to_string(),
        })
    }

    async fn issue_verification(&self, user: &User) -> AppResult<()> {
        let token = generate_token();
        let expires_at = utc_now() + Duration::hours(VERIFICATION_TTL_HOURS);
        self.repo
            .store_verification(user.id, &hash_token(&token), expires_at)
            .await?;
        self.notifier.send_verification(user, &token).await
    }

    pub async fn verify_email(&self, req: VerifyEmailRequest) -> AppResult<User> {
        let user_id = self
            .repo
            .consume_verification(&hash_token(&req.token), utc_now())
            .await?
            .ok_or_else(|| AppError::invalid("verification token is invalid or expired"))?;

        let user = self.repo.set_user_status(user_id, UserStatus::Active).await?;
        tracing::info!(user_id = %user.id, "email verified, account active");
        Ok(user)
    }

    /// Self-service profile edit; only the display name is writable here.
    pub async fn update_profile(&self, user_id: Uuid, req: ProfileUpdateRequest) -> AppResult<User> {
        let Some(name) = clean_name(req.name)? else {
            return self
                .repo
                .get_user(user_id)
                .await?
                .ok_or_else(|| AppError::not_found("user not found"));
        };

        let user = self
            .repo
            .update_user(
                user_id,
                UserChanges {
                    name: Some(name),
                    status: None,
                    is_admin: None,
                },
            )
            .await?;
        tracing::info!(user_id = %user.id, "profile updated");
        Ok(user)
    }

    /// Unknown email and wrong password look the same to the caller.
    pub async fn login(&self, req: LoginRequest) -> AppResult<AuthResponse> {
        let invalid = || AppError::unauthorized("invalid email or password");

        let email = normalize_email(&req.email).map_err(|_| invalid())?;
        let db_user = self.repo.find_user_by_email(&email).await?.ok_or_else(invalid)?;
        if !verify_password(&req.password, &db_user.password_hash)? {
            return Err(invalid());
        }
        if db_user.status != UserStatus::Active {
            return Err(AppError::forbidden("account is not active, verify your email first"));
        }

        let user = User::from(db_user);
        let token = self.jwt.encode(user.id)?;
        tracing::info!(user_id = %user.id, "user logged in");
        Ok(AuthResponse { token, user })
    }
}
