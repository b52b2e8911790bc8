#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use axum::body::{self, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::Value;
use sqlx::sqlite::SqliteConnectOptions;
use sqlx::SqlitePool;
use tempfile::{tempdir, TempDir};
use tower::util::ServiceExt;
use uuid::Uuid;

use storefront_rbac::authz::Actor;
use storefront_rbac::errors::AppResult;
use storefront_rbac::jwt::JwtConfig;
use storefront_rbac::models::rbac::{
    Group, GroupCreateRequest, Permission, PermissionCreateRequest, Role, RoleCreateRequest,
};
use storefront_rbac::models::user::{User, UserCreateRequest};
use storefront_rbac::notify::Notifier;
use storefront_rbac::ratelimit::{RateLimitConfig, RateLimiter};
use storefront_rbac::{create_app_with, AppState};

pub const PASSWORD: &str = "S3cure!Passw0rd";
/// In-process caller used to lay down fixtures.
pub const ACTOR: Actor = Actor::System;

/// Keeps every verification token handed out, newest last.
#[derive(Default)]
pub struct CapturingNotifier {
    sent: Mutex<Vec<(Uuid, String)>>,
}

impl CapturingNotifier {
    pub fn last_token(&self) -> Option<String> {
        self.sent
            .lock()
            .unwrap()
            .last()
            .map(|(_, token)| token.clone())
    }

    pub fn count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

#[async_trait]
impl Notifier for CapturingNotifier {
    async fn send_verification(&self, user: &User, token: &str) -> AppResult<()> {
        self.sent.lock().unwrap().push((user.id, token.to_string()));
        Ok(())
    }
}

pub async fn migrated_pool(dir: &TempDir) -> Result<SqlitePool> {
    let db_path = dir.path().join("test.db");
    let opts = SqliteConnectOptions::new()
        .filename(db_path.as_path())
        .create_if_missing(true)
        .foreign_keys(true);
    let pool = SqlitePool::connect_with(opts).await?;

    let migrator =
        sqlx::migrate::Migrator::new(std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("migrations")).await?;
    migrator.run(&pool).await?;
    Ok(pool)
}

pub struct Harness {
    _dir: TempDir,
    pub pool: SqlitePool,
    pub state: AppState,
    pub notifier: Arc<CapturingNotifier>,
}

impl Harness {
    pub async fn new() -> Result<Self> {
        Self::with_rate_limit(RateLimitConfig::new(Duration::from_secs(60), 1_000)).await
    }

    pub async fn with_rate_limit(config: RateLimitConfig) -> Result<Self> {
        let dir = tempdir()?;
        let pool = migrated_pool(&dir).await?;
        let notifier = Arc::new(CapturingNotifier::default());
        let state = AppState::new(
            pool.clone(),
            JwtConfig::new("test-secret", 24),
            notifier.clone(),
            RateLimiter::with_system_clock(config)?,
        );
        Ok(Self {
            _dir: dir,
            pool,
            state,
            notifier,
        })
    }

    pub fn app(&self) -> Router {
        create_app_with(self.state.clone())
    }

    pub fn token(&self, user_id: Uuid) -> Result<String> {
        Ok(self.state.jwt.encode(user_id)?)
    }

    pub async fn permission(&self, resource: &str, action: &str) -> Result<Permission> {
        let permission = self
            .state
            .permissions
            .create(
                ACTOR,
                PermissionCreateRequest {
                    name: format!("{resource}_{action}"),
                    resource: resource.to_string(),
                    action: action.to_string(),
                    description: None,
                },
            )
            .await?;
        Ok(permission)
    }

    pub async fn role(&self, name: &str) -> Result<Role> {
        let role = self
            .state
            .roles
            .create(
                ACTOR,
                RoleCreateRequest {
                    name: name.to_string(),
                    description: None,
                },
            )
            .await?;
        Ok(role)
    }

    pub async fn group(&self, name: &str, is_admin: bool) -> Result<Group> {
        let group = self
            .state
            .groups
            .create(
                ACTOR,
                GroupCreateRequest {
                    name: name.to_string(),
                    description: None,
                    is_admin,
                },
            )
            .await?;
        Ok(group)
    }

    pub async fn user(&self, email: &str, group_id: Option<Uuid>, is_admin: bool) -> Result<User> {
        let user = self
            .state
            .users
            .create(
                ACTOR,
                UserCreateRequest {
                    email: email.to_string(),
                    password: PASSWORD.to_string(),
                    name: None,
                    is_admin,
                    status: None,
                    group_id,
                },
            )
            .await?;
        Ok(user)
    }

    pub async fn grant(&self, role: &Role, permission: &Permission) -> Result<()> {
        self.state.roles.assign_permission(ACTOR, role.id, permission.id).await?;
        Ok(())
    }

    pub async fn attach(&self, group: &Group, role: &Role) -> Result<()> {
        self.state.groups.assign_role(ACTOR, group.id, role.id).await?;
        Ok(())
    }

    /// Fires one request at a fresh router and decodes the JSON body, if any.
    pub async fn send(
        &self,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> Result<(StatusCode, Value)> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {token}"));
        }
        let req = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))?,
            None => builder.body(Body::empty())?,
        };

        let resp = self.app().oneshot(req).await?;
        let status = resp.status();
        let bytes = body::to_bytes(resp.into_body(), 10_485_760).await?;
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        Ok((status, value))
    }
}
