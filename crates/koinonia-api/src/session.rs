//! Login and credential management handlers.

use axum::{Json, extract::State};
use koinonia_core::{person::User, store::ChurchStore};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::{
  AppState,
  auth::{AuthUser, create_token, hash_password, verify_password},
  error::ApiError,
};

#[derive(Debug, Deserialize)]
pub struct LoginBody {
  pub nombre_usuario: String,
  pub contrasena:     String,
}

#[derive(Debug, Serialize)]
pub struct UserDto {
  pub id_usuario:     i64,
  pub id_persona:     i64,
  pub nombre_usuario: String,
  pub rol:            &'static str,
}

impl From<&User> for UserDto {
  fn from(u: &User) -> Self {
    UserDto {
      id_usuario:     u.user_id,
      id_persona:     u.person_id,
      nombre_usuario: u.username.clone(),
      rol:            u.role.name(),
    }
  }
}

fn bad_credentials() -> ApiError {
  ApiError::Unauthorized(
    "usuario o contraseña incorrectos".to_string(),
  )
}

/// `POST /api/login` — the only unauthenticated endpoint.
pub async fn login<S>(
  State(state): State<AppState<S>>,
  Json(body): Json<LoginBody>,
) -> Result<Json<Value>, ApiError>
where
  S: ChurchStore + Clone + Send + Sync + 'static,
{
  let user = state
    .store
    .find_user_by_username(body.nombre_usuario.clone())
    .await
    .map_err(ApiError::store)?
    .ok_or_else(bad_credentials)?;

  // Inactive users keep their row but cannot sign in.
  if !user.active || !verify_password(&body.contrasena, &user.password_hash)
  {
    return Err(bad_credentials());
  }

  let token = create_token(&user, &state.auth.jwt_secret)
    .map_err(ApiError::internal)?;

  tracing::info!(user = %user.username, "login");
  Ok(Json(json!({
    "token":   token,
    "usuario": UserDto::from(&user),
  })))
}

#[derive(Debug, Deserialize)]
pub struct ChangePasswordBody {
  pub contrasena_actual: String,
  pub contrasena_nueva:  String,
}

/// `PUT /api/usuarios/cambiar-contrasena` — the acting user changes
/// their own password.
pub async fn change_password<S>(
  State(state): State<AppState<S>>,
  AuthUser(actor): AuthUser,
  Json(body): Json<ChangePasswordBody>,
) -> Result<Json<Value>, ApiError>
where
  S: ChurchStore + Clone + Send + Sync + 'static,
{
  let user = state
    .store
    .get_user(actor.user_id)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| {
      ApiError::store(koinonia_core::Error::UserNotFound(actor.user_id))
    })?;

  if !verify_password(&body.contrasena_actual, &user.password_hash) {
    return Err(ApiError::BadRequest(
      "la contraseña actual no es correcta".to_string(),
    ));
  }
  if body.contrasena_nueva.trim().is_empty() {
    return Err(ApiError::BadRequest(
      "la contraseña nueva no puede estar vacía".to_string(),
    ));
  }

  let hash = hash_password(&body.contrasena_nueva)
    .map_err(ApiError::internal)?;
  state
    .store
    .set_password(user.user_id, hash)
    .await
    .map_err(ApiError::store)?;

  Ok(Json(json!({ "mensaje": "Contraseña actualizada" })))
}
