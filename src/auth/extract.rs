use std::sync::Arc;

use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;

use crate::auth::Claims;
use crate::error::AppError;
use crate::state::AppState;

const MISSING_TOKEN: &str = "Acceso denegado. Token no proporcionado.";
const INVALID_TOKEN: &str = "Token inválido o expirado.";
const ADMIN_REQUIRED: &str = "Acceso denegado. Se requiere rol de administrador.";

/// Any caller with a valid bearer token.
#[derive(Debug, Clone)]
pub struct AuthUser(pub Claims);

/// A caller whose token carries the `admin` role.
#[derive(Debug, Clone)]
pub struct AdminUser(pub Claims);

fn bearer_token(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

#[axum::async_trait]
impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)
            .ok_or_else(|| AppError::Unauthorized(MISSING_TOKEN.to_string()))?;

        let claims = state.auth.verify(token).map_err(|err| {
            tracing::debug!(error = %err, "bearer token rejected");
            AppError::Forbidden(INVALID_TOKEN.to_string())
        })?;

        Ok(AuthUser(claims))
    }
}

#[axum::async_trait]
impl FromRequestParts<Arc<AppState>> for AdminUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let AuthUser(claims) = AuthUser::from_request_parts(parts, state).await?;

        if !claims.is_admin() {
            return Err(AppError::Forbidden(ADMIN_REQUIRED.to_string()));
        }
        Ok(AdminUser(claims))
    }
}
