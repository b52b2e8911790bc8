//! Request-pipeline authorization.
//!
//! `authenticate` resolves the bearer credential once and stores the
//! [`Principal`] in request extensions. [`RequireLayer`] then evaluates a
//! [`Requirement`] per route:
//!
//! ```text
//! no credential / bad credential  -> 401 unauthenticated
//! decision false                  -> 403 forbidden
//! checker error                   -> 500, logged
//! decision true                   -> wrapped handler runs
//! ```

use std::convert::Infallible;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use tower::{Layer, Service};

use super::checker::PermissionChecker;
use super::principal::{bearer_token, CredentialVerifier, Principal};
use crate::errors::{AppError, AppResult};
use crate::models::rbac::PermissionKey;

/// What a protected operation demands of its caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Requirement {
    Permission(PermissionKey),
    Admin,
    Any(Vec<PermissionKey>),
    All(Vec<PermissionKey>),
}

impl Requirement {
    pub fn permission(resource: &str, action: &str) -> Self {
        Requirement::Permission(PermissionKey::new(resource, action))
    }

    pub fn any<'a>(keys: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        Requirement::Any(keys.into_iter().map(|(r, a)| PermissionKey::new(r, a)).collect())
    }

    pub fn all<'a>(keys: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        Requirement::All(keys.into_iter().map(|(r, a)| PermissionKey::new(r, a)).collect())
    }
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn join(keys: &[PermissionKey]) -> String {
            keys.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
        }

        match self {
            Requirement::Permission(key) => write!(f, "{key}"),
            Requirement::Admin => f.write_str("admin"),
            Requirement::Any(keys) => write!(f, "any of [{}]", join(keys)),
            Requirement::All(keys) => write!(f, "all of [{}]", join(keys)),
        }
    }
}

#[derive(Clone)]
pub struct AuthorizationGate {
    checker: PermissionChecker,
    verifier: Arc<dyn CredentialVerifier>,
}

impl AuthorizationGate {
    pub fn new(checker: PermissionChecker, verifier: Arc<dyn CredentialVerifier>) -> Self {
        Self { checker, verifier }
    }

    pub fn checker(&self) -> &PermissionChecker {
        &self.checker
    }

    pub async fn authenticate(&self, credential: Option<&str>) -> AppResult<Principal> {
        let credential = credential.ok_or_else(|| AppError::unauthorized("missing bearer credential"))?;
        let user_id = self
            .verifier
            .verify(credential)
            .await
            .ok_or_else(|| AppError::unauthorized("invalid or expired credential"))?;
        Ok(Principal::new(user_id))
    }

    pub async fn decide(&self, principal: &Principal, requirement: &Requirement) -> AppResult<bool> {
        let user_id = principal.user_id;
        match requirement {
            Requirement::Permission(key) => {
                self.checker
                    .check_permission(user_id, &key.resource, &key.action)
                    .await
            }
            Requirement::Admin => self.checker.is_admin(user_id).await,
            Requirement::Any(keys) => self.checker.check_multiple_permissions(user_id, keys, false).await,
            Requirement::All(keys) => self.checker.check_multiple_permissions(user_id, keys, true).await,
        }
    }

    /// `Ok(())` only on an allow decision. Checker failures come back as
    /// internal errors.
    pub async fn authorize(&self, principal: &Principal, requirement: &Requirement) -> AppResult<()> {
        match self.decide(principal, requirement).await {
            Ok(true) => Ok(()),
            Ok(false) => {
                tracing::info!(
                    user_id = %principal.user_id,
                    requirement = %requirement,
                    "authorization denied"
                );
                Err(AppError::forbidden(format!("requires {requirement}")))
            }
            Err(err) => {
                tracing::error!(
                    user_id = %principal.user_id,
                    requirement = %requirement,
                    error = %err,
                    "authorization check failed, denying"
                );
                if err.is_infrastructure() {
                    Err(err)
                } else {
                    Err(AppError::internal(err.to_string()))
                }
            }
        }
    }

    /// Runs `op` only for an authenticated, authorized caller.
    pub async fn guard<F, Fut, T>(&self, credential: Option<&str>, requirement: &Requirement, op: F) -> AppResult<T>
    where
        F: FnOnce(Principal) -> Fut,
        Fut: Future<Output = AppResult<T>>,
    {
        let principal = self.authenticate(credential).await?;
        self.authorize(&principal, requirement).await?;
        op(principal).await
    }

    /// Route layer enforcing `requirement`.
    pub fn require(&self, requirement: Requirement) -> RequireLayer {
        RequireLayer {
            gate: self.clone(),
            requirement: Arc::new(requirement),
        }
    }
}

/// Resolves the bearer credential and stores the [`Principal`] in request
/// extensions.
pub async fn authenticate(
    State(gate): State<AuthorizationGate>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let credential = bearer_token(req.headers()).map(str::to_owned);
    let principal = gate.authenticate(credential.as_deref()).await?;
    req.extensions_mut().insert(principal);
    Ok(next.run(req).await)
}

// =============================================================================
// ROUTE LAYER
// =============================================================================

#[derive(Clone)]
pub struct RequireLayer {
    gate: AuthorizationGate,
    requirement: Arc<Requirement>,
}

impl<S> Layer<S> for RequireLayer {
    type Service = RequireService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RequireService {
            inner,
            gate: self.gate.clone(),
            requirement: Arc::clone(&self.requirement),
        }
    }
}

#[derive(Clone)]
pub struct RequireService<S> {
    inner: S,
    gate: AuthorizationGate,
    requirement: Arc<Requirement>,
}

impl<S> Service<Request> for RequireService<S>
where
    S: Service<Request, Response = Response, Error = Infallible> + Clone + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = Response;
    type Error = Infallible;
    type Future = Pin<Box<dyn Future<Output = Result<Response, Infallible>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request) -> Self::Future {
        // the clone may not be ready; keep the one that was polled
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);
        let gate = self.gate.clone();
        let requirement = Arc::clone(&self.requirement);

        Box::pin(async move {
            let known = req.extensions().get::<Principal>().copied();
            let principal = match known {
                Some(principal) => principal,
                None => {
                    let credential = bearer_token(req.headers()).map(str::to_owned);
                    match gate.authenticate(credential.as_deref()).await {
                        Ok(principal) => principal,
                        Err(err) => return Ok(err.into_response()),
                    }
                }
            };

            if let Err(err) = gate.authorize(&principal, &requirement).await {
                return Ok(err.into_response());
            }

            inner.call(req).await
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn requirement_display_names_every_key() {
        assert_eq!(Requirement::permission("roles", "read").to_string(), "roles:read");
        assert_eq!(Requirement::Admin.to_string(), "admin");
        assert_eq!(
            Requirement::any([("users", "read"), ("groups", "read")]).to_string(),
            "any of [users:read, groups:read]"
        );
        assert_eq!(Requirement::All(Vec::new()).to_string(), "all of []");
    }
}
