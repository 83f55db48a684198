use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;
use validator::{Validate, ValidationErrors};

use crate::auth::password::{hash_password, verify_password};
use crate::error::AppError;
use crate::models::user::{normalize_email, NewUser, Role, UserSummary};
use crate::state::AppState;
use crate::store::DUPLICATE_EMAIL;

const INVALID_CREDENTIALS: &str = "Credenciales inválidas";

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[serde(default)]
    #[validate(length(
        min = 3,
        max = 50,
        message = "El nombre de usuario debe tener entre 3 y 50 caracteres"
    ))]
    pub username: String,

    #[serde(default)]
    #[validate(email(message = "El correo electrónico no es válido"))]
    pub email: String,

    #[serde(default)]
    #[validate(length(min = 8, message = "La contraseña debe tener al menos 8 caracteres"))]
    pub password: String,

    pub role: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: UserSummary,
}

/// Picks one message, by field name, so responses stay stable.
fn first_message(errors: &ValidationErrors) -> String {
    let mut fields: Vec<_> = errors
        .field_errors()
        .into_iter()
        .map(|(field, errs)| (field.to_string(), errs))
        .collect();
    fields.sort_by(|a, b| a.0.cmp(&b.0));

    fields
        .into_iter()
        .find_map(|(field, errs)| {
            errs.first().map(|err| match &err.message {
                Some(message) => message.to_string(),
                None => format!("El campo {field} no es válido"),
            })
        })
        .unwrap_or_else(|| "Datos de registro no válidos".to_string())
}

async fn run_blocking<T, F>(task: F) -> Result<T, AppError>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(task)
        .await
        .map_err(|err| AppError::Internal(format!("password task failed: {err}")))
}

pub async fn register(state: &AppState, request: RegisterRequest) -> Result<UserSummary, AppError> {
    request
        .validate()
        .map_err(|errors| AppError::BadRequest(first_message(&errors)))?;

    let role = match request.role.as_deref().map(str::trim) {
        None | Some("") => Role::User,
        Some(raw) => raw
            .parse::<Role>()
            .map_err(|_| AppError::BadRequest("El rol debe ser \"user\" o \"admin\"".to_string()))?,
    };

    let email = normalize_email(&request.email);
    if state.store.find_user_by_email(&email).await?.is_some() {
        return Err(AppError::Conflict(DUPLICATE_EMAIL.to_string()));
    }

    let password = request.password;
    let password_hash = run_blocking(move || hash_password(&password)).await??;

    let user = state
        .store
        .create_user(NewUser::new(
            request.username.trim().to_string(),
            &email,
            password_hash,
            role,
        ))
        .await?;

    info!(user_id = user.id, role = %user.role, "user registered");
    Ok(UserSummary::from(&user))
}

pub async fn login(state: &AppState, request: LoginRequest) -> Result<LoginResponse, AppError> {
    let denied = || AppError::Unauthorized(INVALID_CREDENTIALS.to_string());

    let credentials = state
        .store
        .find_user_by_email(&normalize_email(&request.email))
        .await?
        .ok_or_else(denied)?;

    let stored_hash = credentials.password_hash.clone();
    let password = request.password;
    let matches = run_blocking(move || verify_password(&password, &stored_hash)).await?;

    if !matches || !credentials.user.is_active {
        return Err(denied());
    }

    let user = credentials.user;
    state.store.record_login(user.id, Utc::now()).await?;
    let token = state.auth.issue(user.id, user.role)?;

    info!(user_id = user.id, "user logged in");
    Ok(LoginResponse {
        token,
        user: UserSummary::from(&user),
    })
}

#[cfg(test)]
mod tests {
    use validator::Validate;

    use super::{first_message, RegisterRequest};

    #[test]
    fn short_password_reports_its_rule() {
        let request = RegisterRequest {
            username: "ana".to_string(),
            email: "ana@example.com".to_string(),
            password: "corta".to_string(),
            role: None,
        };

        let errors = request.validate().unwrap_err();
        assert_eq!(
            first_message(&errors),
            "La contraseña debe tener al menos 8 caracteres"
        );
    }

    #[test]
    fn fields_are_reported_in_name_order() {
        let request = RegisterRequest {
            username: "a".to_string(),
            email: "no-es-correo".to_string(),
            password: "suficientemente-larga".to_string(),
            role: None,
        };

        let errors = request.validate().unwrap_err();
        assert_eq!(first_message(&errors), "El correo electrónico no es válido");
    }
}
