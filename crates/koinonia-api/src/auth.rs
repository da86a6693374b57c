//! Bearer-token authentication: JWT issuance, verification, and the
//! [`AuthUser`] extractor.
//!
//! Token claims carry the user id and the role *name*; the extractor
//! resolves the name back through the role directory on every request,
//! so a token minted for a since-renamed role simply stops working. An
//! unknown role name is forbidden, never an error.

use argon2::{
  Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
  password_hash::SaltString,
};
use axum::{extract::FromRequestParts, http::request::Parts};
use jsonwebtoken::{
  DecodingKey, EncodingKey, Header, Validation, decode, encode,
};
use koinonia_core::{
  person::User,
  role::{Actor, Role},
  store::ChurchStore,
};
use rand_core::OsRng;
use serde::{Deserialize, Serialize};

use crate::{AppState, error::ApiError};

/// Secret used to sign and verify session tokens.
#[derive(Clone)]
pub struct AuthConfig {
  pub jwt_secret: String,
}

pub const TOKEN_TTL_HOURS: i64 = 24;

/// Signed token payload.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
  pub id_usuario: i64,
  pub rol:        String,
  pub exp:        usize,
}

/// Issue a session token for a freshly authenticated user.
pub fn create_token(
  user:   &User,
  secret: &str,
) -> Result<String, jsonwebtoken::errors::Error> {
  let exp = (chrono::Utc::now() + chrono::Duration::hours(TOKEN_TTL_HOURS))
    .timestamp() as usize;
  let claims = Claims {
    id_usuario: user.user_id,
    rol:        user.role.name().to_string(),
    exp,
  };
  encode(
    &Header::default(),
    &claims,
    &EncodingKey::from_secret(secret.as_bytes()),
  )
}

/// Verify signature and expiry, returning the claims.
pub fn decode_token(
  token:  &str,
  secret: &str,
) -> Result<Claims, jsonwebtoken::errors::Error> {
  decode::<Claims>(
    token,
    &DecodingKey::from_secret(secret.as_bytes()),
    &Validation::default(),
  )
  .map(|data| data.claims)
}

/// Hash a password into a PHC string (`$argon2id$v=19$…`).
pub fn hash_password(
  password: &str,
) -> Result<String, argon2::password_hash::Error> {
  let salt = SaltString::generate(&mut OsRng);
  Ok(
    Argon2::default()
      .hash_password(password.as_bytes(), &salt)?
      .to_string(),
  )
}

pub fn verify_password(password: &str, hash: &str) -> bool {
  PasswordHash::new(hash)
    .and_then(|parsed| {
      Argon2::default().verify_password(password.as_bytes(), &parsed)
    })
    .is_ok()
}

/// The authenticated actor, extracted from the `Authorization: Bearer`
/// header of a protected request.
pub struct AuthUser(pub Actor);

impl<S> FromRequestParts<AppState<S>> for AuthUser
where
  S: ChurchStore + Clone + Send + Sync + 'static,
{
  type Rejection = ApiError;

  async fn from_request_parts(
    parts: &mut Parts,
    state: &AppState<S>,
  ) -> Result<Self, Self::Rejection> {
    let header_val = parts
      .headers
      .get(axum::http::header::AUTHORIZATION)
      .and_then(|v| v.to_str().ok())
      .ok_or_else(|| {
        ApiError::Unauthorized("falta el token de autenticación".to_string())
      })?;

    let token = header_val.strip_prefix("Bearer ").ok_or_else(|| {
      ApiError::Unauthorized(
        "formato de autorización inválido".to_string(),
      )
    })?;

    let claims =
      decode_token(token, &state.auth.jwt_secret).map_err(|_| {
        ApiError::Unauthorized("token inválido o expirado".to_string())
      })?;

    let role_id = state
      .store
      .role_id_by_name(claims.rol.clone())
      .await
      .map_err(ApiError::store)?
      .ok_or_else(|| {
        ApiError::Forbidden("rol no reconocido".to_string())
      })?;
    let role = Role::from_id(role_id).map_err(ApiError::store)?;

    Ok(AuthUser(Actor { user_id: claims.id_usuario, role }))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn user(role: Role) -> User {
    User {
      user_id:       7,
      person_id:     3,
      role,
      username:      "ana.pérez".to_string(),
      password_hash: hash_password("clave123").unwrap(),
      active:        true,
    }
  }

  #[test]
  fn token_round_trips_id_and_role() {
    let token = create_token(&user(Role::Leader), "secreto").unwrap();
    let claims = decode_token(&token, "secreto").unwrap();
    assert_eq!(claims.id_usuario, 7);
    assert_eq!(claims.rol, "Lider");
  }

  #[test]
  fn wrong_secret_rejected() {
    let token = create_token(&user(Role::Member), "secreto").unwrap();
    assert!(decode_token(&token, "otro-secreto").is_err());
  }

  #[test]
  fn password_hash_verifies() {
    let hash = hash_password("clave123").unwrap();
    assert!(verify_password("clave123", &hash));
    assert!(!verify_password("clave124", &hash));
  }
}
